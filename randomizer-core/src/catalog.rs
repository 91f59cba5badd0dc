use std::collections::HashMap;

use crate::{RandomizerError, Result};

pub const SHOP_SLOTS: usize = 8;
pub const TRADE_SLOTS: usize = 3;
pub const MASTER_SLOTS: usize = 6;
pub const MONSTER_SKILLS: usize = 4;
pub const FORMATION_SLOTS: usize = 8;

/// Sentinel written into slot fields that reference no entity
/// (the original data's 0xFF / "Nothing" markers).
pub const NO_ENTITY: i64 = -1;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Item,
    Weapon,
    Armor,
    Accessory,
    KeyItem,
    Ability,
    Shop,
    Trade,
    MasterStats,
    MasterSkills,
    Monster,
    Formation,
    Level,
    BaseStats,
}

#[derive(Copy, Clone, Debug)]
pub struct FieldDef {
    pub name: &'static str,
    pub min: i64,
    pub max: i64,
    pub mutable: bool,
}

const fn field(name: &'static str, min: i64, max: i64, mutable: bool) -> FieldDef {
    FieldDef { name, min, max, mutable }
}

const ITEM_FIELDS: &[FieldDef] = &[
    field("price", 0, 65_000, true),
    field("power", 0, 255, true),
    field("category", 0, 7, false),
];

const WEAPON_FIELDS: &[FieldDef] = &[
    field("price", 0, 65_000, true),
    field("attack", 0, 500, true),
    field("weight", 0, 255, true),
    field("wearer", 0, 8, false),
    field("element", 0, 7, false),
];

const ARMOR_FIELDS: &[FieldDef] = &[
    field("price", 0, 65_000, true),
    field("defense", 0, 500, true),
    field("weight", 0, 255, true),
    field("wearer", 0, 8, false),
];

const ACCESSORY_FIELDS: &[FieldDef] = &[
    field("price", 0, 65_000, true),
    field("effect", 0, 255, true),
    field("wearer", 0, 8, false),
];

const KEY_ITEM_FIELDS: &[FieldDef] = &[
    field("story_order", 0, 255, false),
];

const ABILITY_FIELDS: &[FieldDef] = &[
    field("ap_cost", 0, 99, false),
    field("power", 0, 500, false),
    field("target", 0, 3, false),
    field("element", 0, 7, false),
    // 0 = offense, 1 = utility, 2 = healing, 3 = examine
    field("category", 0, 3, false),
];

const SHOP_FIELDS: &[FieldDef] = &[
    field("slot0_kind", 0, 3, false),
    field("slot0_item", NO_ENTITY, 4095, true),
    field("slot1_kind", 0, 3, false),
    field("slot1_item", NO_ENTITY, 4095, true),
    field("slot2_kind", 0, 3, false),
    field("slot2_item", NO_ENTITY, 4095, true),
    field("slot3_kind", 0, 3, false),
    field("slot3_item", NO_ENTITY, 4095, true),
    field("slot4_kind", 0, 3, false),
    field("slot4_item", NO_ENTITY, 4095, true),
    field("slot5_kind", 0, 3, false),
    field("slot5_item", NO_ENTITY, 4095, true),
    field("slot6_kind", 0, 3, false),
    field("slot6_item", NO_ENTITY, 4095, true),
    field("slot7_kind", 0, 3, false),
    field("slot7_item", NO_ENTITY, 4095, true),
];

const TRADE_FIELDS: &[FieldDef] = &[
    field("reward_item", 0, 4095, true),
    field("cost0_item", NO_ENTITY, 4095, true),
    field("cost0_qty", 0, 9, true),
    field("cost1_item", NO_ENTITY, 4095, true),
    field("cost1_qty", 0, 9, true),
    field("cost2_item", NO_ENTITY, 4095, true),
    field("cost2_qty", 0, 9, true),
];

const MASTER_STATS_FIELDS: &[FieldDef] = &[
    field("hp", -128, 127, true),
    field("ap", -128, 127, true),
    field("pwr", -128, 127, true),
    field("dfn", -128, 127, true),
    field("agl", -128, 127, true),
    field("int", -128, 127, true),
];

const MASTER_SKILLS_FIELDS: &[FieldDef] = &[
    field("skill0", NO_ENTITY, 4095, true),
    field("level0", 1, 50, true),
    field("skill1", NO_ENTITY, 4095, true),
    field("level1", 1, 50, true),
    field("skill2", NO_ENTITY, 4095, true),
    field("level2", 1, 50, true),
    field("skill3", NO_ENTITY, 4095, true),
    field("level3", 1, 50, true),
    field("skill4", NO_ENTITY, 4095, true),
    field("level4", 1, 50, true),
    field("skill5", NO_ENTITY, 4095, true),
    field("level5", 1, 50, true),
];

const MONSTER_FIELDS: &[FieldDef] = &[
    field("level", 1, 99, true),
    field("hp", 1, 65_535, true),
    field("ap", 0, 65_535, true),
    field("pwr", 0, 999, true),
    field("dfn", 0, 999, true),
    field("agl", 0, 999, true),
    field("int", 0, 999, true),
    field("exp", 0, 65_535, true),
    field("zenny", 0, 65_535, true),
    field("drop_item", NO_ENTITY, 4095, true),
    field("drop_rate", 0, 100, true),
    field("steal_item", NO_ENTITY, 4095, true),
    field("steal_rate", 0, 100, true),
    field("skill0", NO_ENTITY, 4095, true),
    field("skill1", NO_ENTITY, 4095, true),
    field("skill2", NO_ENTITY, 4095, true),
    field("skill3", NO_ENTITY, 4095, true),
    field("scene", 0, 255, false),
    field("boss", 0, 1, false),
];

const FORMATION_FIELDS: &[FieldDef] = &[
    field("scene", 0, 255, false),
    field("appearance_rate", 0, 100, true),
    field("monster0", NO_ENTITY, 4095, true),
    field("monster1", NO_ENTITY, 4095, true),
    field("monster2", NO_ENTITY, 4095, true),
    field("monster3", NO_ENTITY, 4095, true),
    field("monster4", NO_ENTITY, 4095, true),
    field("monster5", NO_ENTITY, 4095, true),
    field("monster6", NO_ENTITY, 4095, true),
    field("monster7", NO_ENTITY, 4095, true),
];

const LEVEL_FIELDS: &[FieldDef] = &[
    field("character", 0, 8, false),
    field("level", 1, 99, false),
    field("hp_gain", 0, 99, true),
    field("ap_gain", 0, 99, true),
    field("pwr_gain", 0, 9, true),
    field("dfn_gain", 0, 9, true),
    field("agl_gain", 0, 9, true),
    field("int_gain", 0, 9, true),
];

const BASE_STATS_FIELDS: &[FieldDef] = &[
    field("character", 0, 8, false),
    field("hp", 1, 999, true),
    field("ap", 0, 999, true),
    field("pwr", 0, 99, true),
    field("dfn", 0, 99, true),
    field("agl", 0, 99, true),
    field("int", 0, 99, true),
    field("weapon", NO_ENTITY, 4095, true),
    field("armor", NO_ENTITY, 4095, true),
    field("accessory", NO_ENTITY, 4095, true),
];

impl EntityKind {
    pub const ALL: [EntityKind; 14] = [
        EntityKind::Item,
        EntityKind::Weapon,
        EntityKind::Armor,
        EntityKind::Accessory,
        EntityKind::KeyItem,
        EntityKind::Ability,
        EntityKind::Shop,
        EntityKind::Trade,
        EntityKind::MasterStats,
        EntityKind::MasterSkills,
        EntityKind::Monster,
        EntityKind::Formation,
        EntityKind::Level,
        EntityKind::BaseStats,
    ];

    pub fn table_name(self) -> &'static str {
        match self {
            EntityKind::Item => "items",
            EntityKind::Weapon => "weapons",
            EntityKind::Armor => "armors",
            EntityKind::Accessory => "accessories",
            EntityKind::KeyItem => "key_items",
            EntityKind::Ability => "abilities",
            EntityKind::Shop => "shops",
            EntityKind::Trade => "trades",
            EntityKind::MasterStats => "master_stats",
            EntityKind::MasterSkills => "master_skills",
            EntityKind::Monster => "monsters",
            EntityKind::Formation => "formations",
            EntityKind::Level => "levels",
            EntityKind::BaseStats => "base_stats",
        }
    }

    pub fn schema(self) -> &'static [FieldDef] {
        match self {
            EntityKind::Item => ITEM_FIELDS,
            EntityKind::Weapon => WEAPON_FIELDS,
            EntityKind::Armor => ARMOR_FIELDS,
            EntityKind::Accessory => ACCESSORY_FIELDS,
            EntityKind::KeyItem => KEY_ITEM_FIELDS,
            EntityKind::Ability => ABILITY_FIELDS,
            EntityKind::Shop => SHOP_FIELDS,
            EntityKind::Trade => TRADE_FIELDS,
            EntityKind::MasterStats => MASTER_STATS_FIELDS,
            EntityKind::MasterSkills => MASTER_SKILLS_FIELDS,
            EntityKind::Monster => MONSTER_FIELDS,
            EntityKind::Formation => FORMATION_FIELDS,
            EntityKind::Level => LEVEL_FIELDS,
            EntityKind::BaseStats => BASE_STATS_FIELDS,
        }
    }

    /// Kinds this kind must be mutated after.
    pub fn runs_after(self) -> &'static [EntityKind] {
        match self {
            EntityKind::Shop => &[
                EntityKind::Item,
                EntityKind::Weapon,
                EntityKind::Armor,
                EntityKind::Accessory,
            ],
            EntityKind::Trade => &[EntityKind::Item],
            EntityKind::MasterSkills => {
                &[EntityKind::Ability, EntityKind::MasterStats]
            }
            EntityKind::Formation => &[EntityKind::Monster],
            EntityKind::BaseStats => &[EntityKind::Weapon, EntityKind::Armor],
            _ => &[],
        }
    }

    /// Primary numeric criterion the kind's candidate pool is ranked by.
    /// Abilities rank by usage contexts instead and return None here.
    pub fn rank_field(self) -> Option<&'static str> {
        match self {
            EntityKind::Item
            | EntityKind::Weapon
            | EntityKind::Armor
            | EntityKind::Accessory => Some("price"),
            EntityKind::Monster => Some("exp"),
            _ => None,
        }
    }

    /// Field that defines the exact subtype for the local rank component.
    pub fn subtype_field(self) -> Option<&'static str> {
        match self {
            EntityKind::Item => Some("category"),
            EntityKind::Weapon | EntityKind::Armor | EntityKind::Accessory => {
                Some("wearer")
            }
            _ => None,
        }
    }

    /// Kinds whose records can ever be offered as substitution candidates.
    pub fn rankable(self) -> bool {
        matches!(
            self,
            EntityKind::Item
                | EntityKind::Weapon
                | EntityKind::Armor
                | EntityKind::Accessory
                | EntityKind::Ability
                | EntityKind::Monster
        )
    }

    /// Every key item is deny-listed for substitution.
    pub fn deny_listed(self) -> bool {
        self == EntityKind::KeyItem
    }

    /// Shop slot type map, matching the original tables' 0..=3 encoding.
    pub fn from_slot_kind(value: i64) -> Result<EntityKind> {
        match value {
            0 => Ok(EntityKind::Item),
            1 => Ok(EntityKind::Weapon),
            2 => Ok(EntityKind::Armor),
            3 => Ok(EntityKind::Accessory),
            other => Err(RandomizerError::Precondition(format!(
                "unknown shop slot kind {other}"
            ))),
        }
    }

    /// Whether a record is eligible for ranking and substitution: the
    /// universal "Nothing" entry is excluded everywhere, key items are
    /// deny-listed, and boss monsters carry their own ineligibility flag.
    pub fn record_eligible(self, record: &Record) -> bool {
        if self.deny_listed() {
            return false;
        }
        if record.name.eq_ignore_ascii_case("Nothing") {
            return false;
        }
        if self == EntityKind::Monster && record.original("boss").unwrap_or(0) != 0 {
            return false;
        }
        true
    }
}

/// One table row: an immutable original snapshot plus the mutable current
/// view, both laid out in schema field order.
#[derive(Clone, Debug)]
pub struct Record {
    pub kind: EntityKind,
    pub index: usize,
    /// Type-local load-order ordinal, used as a deterministic tie-break.
    pub signature: usize,
    pub name: String,
    original: Vec<i64>,
    current: Vec<i64>,
}

impl Record {
    pub fn new(
        kind: EntityKind,
        index: usize,
        name: String,
        values: Vec<i64>,
    ) -> Result<Record> {
        if values.len() != kind.schema().len() {
            return Err(RandomizerError::Precondition(format!(
                "{} record {index} has {} fields, schema expects {}",
                kind.table_name(),
                values.len(),
                kind.schema().len()
            )));
        }
        Ok(Record {
            kind,
            index,
            signature: index,
            name,
            original: values.clone(),
            current: values,
        })
    }

    fn field_pos(&self, name: &str) -> Result<usize> {
        self.kind
            .schema()
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| {
                RandomizerError::Config(format!(
                    "{} has no field named {name}",
                    self.kind.table_name()
                ))
            })
    }

    pub fn original(&self, name: &str) -> Result<i64> {
        Ok(self.original[self.field_pos(name)?])
    }

    pub fn current(&self, name: &str) -> Result<i64> {
        Ok(self.current[self.field_pos(name)?])
    }

    /// Writes a current field, clamped into the schema bounds. Signed-byte
    /// fields stay within i8 range through the same clamp.
    pub fn set_current(&mut self, name: &str, value: i64) -> Result<()> {
        let pos = self.field_pos(name)?;
        let def = &self.kind.schema()[pos];
        self.current[pos] = value.clamp(def.min, def.max);
        Ok(())
    }

    /// Serialized original-field view used for canonical clustering.
    pub fn fingerprint(&self) -> &[i64] {
        &self.original
    }

    pub fn original_values(&self) -> &[i64] {
        &self.original
    }

    pub fn current_values(&self) -> &[i64] {
        &self.current
    }

    pub fn overwrite_current(&mut self, values: Vec<i64>) {
        self.current = values;
    }
}

/// Typed collections of records, one table per entity kind.
pub struct Catalog {
    tables: HashMap<EntityKind, Vec<Record>>,
}

impl Catalog {
    pub fn new(tables: HashMap<EntityKind, Vec<Record>>) -> Result<Catalog> {
        let catalog = Catalog { tables };
        let any_eligible = EntityKind::ALL
            .iter()
            .filter(|k| k.rankable())
            .any(|&k| {
                catalog
                    .records(k)
                    .iter()
                    .any(|r| k.record_eligible(r))
            });
        if !any_eligible {
            return Err(RandomizerError::Precondition(
                "table dump contains no eligible record in any ranked kind".to_string(),
            ));
        }
        Ok(catalog)
    }

    pub fn records(&self, kind: EntityKind) -> &[Record] {
        self.tables.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn record(&self, kind: EntityKind, index: usize) -> Result<&Record> {
        self.records(kind).get(index).ok_or_else(|| {
            RandomizerError::Precondition(format!(
                "{} index {index} out of range",
                kind.table_name()
            ))
        })
    }

    pub fn record_mut(&mut self, kind: EntityKind, index: usize) -> Result<&mut Record> {
        self.tables
            .get_mut(&kind)
            .and_then(|t| t.get_mut(index))
            .ok_or_else(|| {
                RandomizerError::Precondition(format!(
                    "{} index {index} out of range",
                    kind.table_name()
                ))
            })
    }

    pub fn len(&self, kind: EntityKind) -> usize {
        self.records(kind).len()
    }

    pub fn is_empty(&self, kind: EntityKind) -> bool {
        self.len(kind) == 0
    }

    /// Validates a field value that references another table's row.
    pub fn checked_index(&self, kind: EntityKind, value: i64) -> Result<usize> {
        let len = self.len(kind);
        if value < 0 || value as usize >= len {
            return Err(RandomizerError::Precondition(format!(
                "reference {value} out of range for {} (len {len})",
                kind.table_name()
            )));
        }
        Ok(value as usize)
    }
}
