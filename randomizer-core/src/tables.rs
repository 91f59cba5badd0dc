use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, EntityKind, Record};
use crate::{RandomizerError, Result};

/// One row of the table dump. Field names are flattened next to the name so
/// the JSON reads like the codec collaborator's own export.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawRecord {
    pub name: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, i64>,
}

/// The full table dump produced by the codec collaborator. Tables the dump
/// omits load as empty.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawTables {
    #[serde(default)]
    pub items: Vec<RawRecord>,
    #[serde(default)]
    pub weapons: Vec<RawRecord>,
    #[serde(default)]
    pub armors: Vec<RawRecord>,
    #[serde(default)]
    pub accessories: Vec<RawRecord>,
    #[serde(default)]
    pub key_items: Vec<RawRecord>,
    #[serde(default)]
    pub abilities: Vec<RawRecord>,
    #[serde(default)]
    pub shops: Vec<RawRecord>,
    #[serde(default)]
    pub trades: Vec<RawRecord>,
    #[serde(default)]
    pub master_stats: Vec<RawRecord>,
    #[serde(default)]
    pub master_skills: Vec<RawRecord>,
    #[serde(default)]
    pub monsters: Vec<RawRecord>,
    #[serde(default)]
    pub formations: Vec<RawRecord>,
    #[serde(default)]
    pub levels: Vec<RawRecord>,
    #[serde(default)]
    pub base_stats: Vec<RawRecord>,
}

impl RawTables {
    fn table(&self, kind: EntityKind) -> &[RawRecord] {
        match kind {
            EntityKind::Item => &self.items,
            EntityKind::Weapon => &self.weapons,
            EntityKind::Armor => &self.armors,
            EntityKind::Accessory => &self.accessories,
            EntityKind::KeyItem => &self.key_items,
            EntityKind::Ability => &self.abilities,
            EntityKind::Shop => &self.shops,
            EntityKind::Trade => &self.trades,
            EntityKind::MasterStats => &self.master_stats,
            EntityKind::MasterSkills => &self.master_skills,
            EntityKind::Monster => &self.monsters,
            EntityKind::Formation => &self.formations,
            EntityKind::Level => &self.levels,
            EntityKind::BaseStats => &self.base_stats,
        }
    }

    fn table_mut(&mut self, kind: EntityKind) -> &mut Vec<RawRecord> {
        match kind {
            EntityKind::Item => &mut self.items,
            EntityKind::Weapon => &mut self.weapons,
            EntityKind::Armor => &mut self.armors,
            EntityKind::Accessory => &mut self.accessories,
            EntityKind::KeyItem => &mut self.key_items,
            EntityKind::Ability => &mut self.abilities,
            EntityKind::Shop => &mut self.shops,
            EntityKind::Trade => &mut self.trades,
            EntityKind::MasterStats => &mut self.master_stats,
            EntityKind::MasterSkills => &mut self.master_skills,
            EntityKind::Monster => &mut self.monsters,
            EntityKind::Formation => &mut self.formations,
            EntityKind::Level => &mut self.levels,
            EntityKind::BaseStats => &mut self.base_stats,
        }
    }
}

/// Hydrates the typed catalog from a raw dump. Every schema field must be
/// present on every row; extra fields in the dump are rejected so a codec
/// drift surfaces here instead of as silent data loss on write-back.
pub fn load_catalog(raw: &RawTables) -> Result<Catalog> {
    let mut tables = HashMap::new();
    for kind in EntityKind::ALL {
        let schema = kind.schema();
        let mut records = Vec::new();
        for (index, row) in raw.table(kind).iter().enumerate() {
            let mut values = Vec::with_capacity(schema.len());
            for def in schema {
                let value = row.fields.get(def.name).copied().ok_or_else(|| {
                    RandomizerError::Config(format!(
                        "{} record {index} ({}) is missing field {}",
                        kind.table_name(),
                        row.name,
                        def.name
                    ))
                })?;
                values.push(value);
            }
            if row.fields.len() != schema.len() {
                let unknown: Vec<&str> = row
                    .fields
                    .keys()
                    .map(String::as_str)
                    .filter(|name| schema.iter().all(|def| def.name != *name))
                    .collect();
                return Err(RandomizerError::Config(format!(
                    "{} record {index} ({}) has unknown fields: {}",
                    kind.table_name(),
                    row.name,
                    unknown.join(", ")
                )));
            }
            records.push(Record::new(kind, index, row.name.clone(), values)?);
        }
        tables.insert(kind, records);
    }
    Catalog::new(tables)
}

/// Dehydrates the catalog back into a dump carrying current field values.
pub fn dump_catalog(catalog: &Catalog) -> RawTables {
    let mut raw = RawTables::default();
    for kind in EntityKind::ALL {
        let table = raw.table_mut(kind);
        for record in catalog.records(kind) {
            let mut fields = BTreeMap::new();
            for (def, value) in kind.schema().iter().zip(record.current_values()) {
                fields.insert(def.name.to_string(), *value);
            }
            table.push(RawRecord {
                name: record.name.clone(),
                fields,
            });
        }
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_row(name: &str, price: i64) -> RawRecord {
        let mut fields = BTreeMap::new();
        fields.insert("price".to_string(), price);
        fields.insert("power".to_string(), 5);
        fields.insert("category".to_string(), 0);
        RawRecord {
            name: name.to_string(),
            fields,
        }
    }

    #[test]
    fn load_then_dump_round_trips_untouched_tables() {
        let mut raw = RawTables::default();
        raw.items = vec![item_row("Herb", 20), item_row("Antidote", 30)];
        let catalog = load_catalog(&raw).unwrap();
        let dumped = dump_catalog(&catalog);
        assert_eq!(dumped.items.len(), 2);
        assert_eq!(dumped.items[0].fields["price"], 20);
        assert_eq!(dumped.items[1].name, "Antidote");
    }

    #[test]
    fn missing_field_is_a_config_error() {
        let mut raw = RawTables::default();
        let mut row = item_row("Herb", 20);
        row.fields.remove("power");
        raw.items = vec![row];
        assert!(matches!(
            load_catalog(&raw),
            Err(RandomizerError::Config(_))
        ));
    }

    #[test]
    fn unknown_field_is_a_config_error() {
        let mut raw = RawTables::default();
        let mut row = item_row("Herb", 20);
        row.fields.insert("mp_cost".to_string(), 3);
        raw.items = vec![row];
        assert!(matches!(
            load_catalog(&raw),
            Err(RandomizerError::Config(_))
        ));
    }

    #[test]
    fn dump_with_no_eligible_records_is_rejected() {
        let raw = RawTables::default();
        assert!(matches!(
            load_catalog(&raw),
            Err(RandomizerError::Precondition(_))
        ));
    }

    #[test]
    fn json_shape_matches_the_codec_export() {
        let mut raw = RawTables::default();
        raw.items = vec![item_row("Herb", 20)];
        let text = serde_json::to_string(&raw).unwrap();
        let parsed: RawTables = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.items[0].fields["category"], 0);
    }
}
