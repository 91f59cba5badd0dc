use log::{debug, info, warn};

use crate::balance::{balance, BundleSlot};
use crate::catalog::{
    Catalog, EntityKind, FORMATION_SLOTS, MASTER_SLOTS, MONSTER_SKILLS, NO_ENTITY,
    SHOP_SLOTS, TRADE_SLOTS,
};
use crate::constraints::{
    pool_with_fallback, substitute_unique, CategoryQuota, UniquenessGuard, CATEGORY_CAP,
};
use crate::context::RunContext;
use crate::stats::redistribute;
use crate::substitute::substitute;
use crate::walk::walk;
use crate::{execution_order, RandomizerError, RandomizerSettings, Result};

/// Numeric fields each kind's walk pass perturbs. Reference and slot fields
/// are handled by the substitution passes instead.
fn walked_fields(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Item => &["price", "power"],
        EntityKind::Weapon => &["price", "attack", "weight"],
        EntityKind::Armor => &["price", "defense", "weight"],
        EntityKind::Accessory => &["price", "effect"],
        EntityKind::Monster => &[
            "level", "hp", "ap", "pwr", "dfn", "agl", "int", "exp", "zenny",
            "drop_rate", "steal_rate",
        ],
        EntityKind::Formation => &["appearance_rate"],
        EntityKind::Level => &[
            "hp_gain", "ap_gain", "pwr_gain", "dfn_gain", "agl_gain", "int_gain",
        ],
        EntityKind::BaseStats => &["hp", "ap", "pwr", "dfn", "agl", "int"],
        _ => &[],
    }
}

/// Power-like fields take the difficulty multiplier on top of the kind
/// strength; economic fields do not.
fn is_power_field(name: &str) -> bool {
    matches!(
        name,
        "attack" | "defense" | "power" | "effect" | "level" | "hp" | "ap" | "pwr"
            | "dfn" | "agl" | "int" | "exp"
    ) || name.ends_with("_gain")
}

fn field_strength(settings: &RandomizerSettings, kind: EntityKind, name: &str) -> f64 {
    let base = settings.strength_for(kind);
    if is_power_field(name) {
        (base * settings.difficulty).clamp(0.0, 1.0)
    } else {
        base
    }
}

/// Runs every enabled per-kind pass in dependency order.
pub(crate) fn mutate_all(
    catalog: &mut Catalog,
    ctx: &mut RunContext,
    settings: &RandomizerSettings,
) -> Result<()> {
    for kind in execution_order()? {
        if !settings.enabled(kind) {
            debug!("skipping {} (disabled)", kind.table_name());
            continue;
        }
        mutate_kind(catalog, ctx, settings, kind)?;
    }
    Ok(())
}

fn mutate_kind(
    catalog: &mut Catalog,
    ctx: &mut RunContext,
    settings: &RandomizerSettings,
    kind: EntityKind,
) -> Result<()> {
    info!("mutating {}", kind.table_name());
    walk_numeric_fields(catalog, ctx, settings, kind)?;
    match kind {
        EntityKind::Shop => mutate_shops(catalog, ctx, settings),
        EntityKind::Trade => mutate_trades(catalog, ctx, settings),
        EntityKind::Monster => {
            mutate_monster_rewards(catalog, ctx, settings)?;
            mutate_monster_skills(catalog, ctx, settings)
        }
        EntityKind::Formation => mutate_formations(catalog, ctx, settings),
        EntityKind::MasterStats => mutate_master_stats(catalog, ctx, settings),
        EntityKind::MasterSkills => mutate_master_skills(catalog, ctx, settings),
        EntityKind::BaseStats => mutate_starting_equipment(catalog, ctx, settings),
        _ => Ok(()),
    }
}

fn walk_numeric_fields(
    catalog: &mut Catalog,
    ctx: &mut RunContext,
    settings: &RandomizerSettings,
    kind: EntityKind,
) -> Result<()> {
    let fields = walked_fields(kind);
    if fields.is_empty() {
        return Ok(());
    }
    for index in 0..catalog.len(kind) {
        for &name in fields {
            let strength = field_strength(settings, kind, name);
            if strength <= 0.0 {
                continue;
            }
            let def = kind
                .schema()
                .iter()
                .find(|f| f.name == name)
                .ok_or_else(|| {
                    RandomizerError::Config(format!(
                        "{} has no field named {name}",
                        kind.table_name()
                    ))
                })?;
            let value = catalog.record(kind, index)?.current(name)? as f64;
            let moved = walk(&mut ctx.rng, value, def.min as f64, def.max as f64, strength);
            catalog
                .record_mut(kind, index)?
                .set_current(name, moved.round() as i64)?;
        }
    }
    Ok(())
}

fn mutate_shops(
    catalog: &mut Catalog,
    ctx: &mut RunContext,
    settings: &RandomizerSettings,
) -> Result<()> {
    let strength = settings.strength_for(EntityKind::Shop);
    if strength <= 0.0 {
        return Ok(());
    }
    for shop_index in 0..catalog.len(EntityKind::Shop) {
        let mut original_keys = Vec::new();
        for slot in 0..SHOP_SLOTS {
            let shop = catalog.record(EntityKind::Shop, shop_index)?;
            let item = shop.original(&format!("slot{slot}_item"))?;
            if item >= 0 {
                original_keys.push((shop.original(&format!("slot{slot}_kind"))?, item));
            }
        }
        let allow = UniquenessGuard::originals_had_duplicates(&original_keys);
        let mut guard: UniquenessGuard<(i64, i64)> = UniquenessGuard::new(allow);

        for slot in 0..SHOP_SLOTS {
            let shop = catalog.record(EntityKind::Shop, shop_index)?;
            let kind_value = shop.original(&format!("slot{slot}_kind"))?;
            let item_value = shop.current(&format!("slot{slot}_item"))?;
            if item_value < 0 {
                continue;
            }
            let slot_kind = EntityKind::from_slot_kind(kind_value)?;
            let index = catalog.checked_index(slot_kind, item_value)?;
            let pool = ctx.pool(catalog, slot_kind)?;
            let chosen = substitute_unique(
                ctx,
                catalog,
                slot_kind,
                index,
                &pool,
                strength,
                None,
                &mut guard,
                |candidate| (kind_value, candidate as i64),
            )?;
            match chosen {
                Some(candidate) => {
                    catalog
                        .record_mut(EntityKind::Shop, shop_index)?
                        .set_current(&format!("slot{slot}_item"), candidate as i64)?;
                }
                None => warn!("shop {shop_index} slot {slot} kept its original stock"),
            }
        }
    }
    Ok(())
}

fn mutate_trades(
    catalog: &mut Catalog,
    ctx: &mut RunContext,
    settings: &RandomizerSettings,
) -> Result<()> {
    let strength = settings.strength_for(EntityKind::Trade);
    if strength <= 0.0 {
        return Ok(());
    }
    let item_pool = ctx.pool(catalog, EntityKind::Item)?;
    let priced: Vec<(usize, i64)> = {
        let mut priced = Vec::with_capacity(item_pool.len());
        for &member in &item_pool {
            let price = catalog.record(EntityKind::Item, member)?.original("price")?;
            priced.push((member, price));
        }
        priced
    };

    for trade_index in 0..catalog.len(EntityKind::Trade) {
        let reward_value = catalog
            .record(EntityKind::Trade, trade_index)?
            .current("reward_item")?;
        let reward_index = catalog.checked_index(EntityKind::Item, reward_value)?;
        let new_reward = substitute(
            ctx,
            catalog,
            EntityKind::Item,
            reward_index,
            &item_pool,
            strength,
            None,
        )?;
        catalog
            .record_mut(EntityKind::Trade, trade_index)?
            .set_current("reward_item", new_reward as i64)?;

        let target = catalog
            .record(EntityKind::Item, new_reward)?
            .original("price")?;
        if target <= 0 {
            continue;
        }

        let mut initial = Vec::new();
        for slot in 0..TRADE_SLOTS {
            let trade = catalog.record(EntityKind::Trade, trade_index)?;
            let item = trade.original(&format!("cost{slot}_item"))?;
            let qty = trade.original(&format!("cost{slot}_qty"))?;
            if item >= 0 && qty > 0 {
                initial.push(BundleSlot {
                    item: catalog.checked_index(EntityKind::Item, item)?,
                    qty,
                });
            }
        }
        if initial.is_empty() {
            continue;
        }

        let outcome = balance(&mut ctx.rng, initial, target, &priced, strength)?;
        if outcome.best_effort {
            warn!(
                "trade {trade_index} settled for value {} against target {target}",
                outcome.total
            );
        }
        let trade = catalog.record_mut(EntityKind::Trade, trade_index)?;
        for slot in 0..TRADE_SLOTS {
            match outcome.slots.get(slot) {
                Some(bundle) => {
                    trade.set_current(&format!("cost{slot}_item"), bundle.item as i64)?;
                    trade.set_current(&format!("cost{slot}_qty"), bundle.qty)?;
                }
                None => {
                    trade.set_current(&format!("cost{slot}_item"), NO_ENTITY)?;
                    trade.set_current(&format!("cost{slot}_qty"), 0)?;
                }
            }
        }
    }
    Ok(())
}

/// Drop and steal rewards move to items of comparable worth; the monster's
/// exp reward acts as the value ceiling when the original reward is not in
/// the catalogued pool.
fn mutate_monster_rewards(
    catalog: &mut Catalog,
    ctx: &mut RunContext,
    settings: &RandomizerSettings,
) -> Result<()> {
    let strength = settings.strength_for(EntityKind::Monster);
    if strength <= 0.0 {
        return Ok(());
    }
    let item_pool = ctx.pool(catalog, EntityKind::Item)?;
    for index in 0..catalog.len(EntityKind::Monster) {
        for field in ["drop_item", "steal_item"] {
            let monster = catalog.record(EntityKind::Monster, index)?;
            let reward = monster.current(field)?;
            if reward < 0 {
                continue;
            }
            let ceiling = monster.original("exp")?;
            let reward_index = catalog.checked_index(EntityKind::Item, reward)?;
            let chosen = substitute(
                ctx,
                catalog,
                EntityKind::Item,
                reward_index,
                &item_pool,
                strength,
                Some(ceiling),
            )?;
            catalog
                .record_mut(EntityKind::Monster, index)?
                .set_current(field, chosen as i64)?;
        }
    }
    Ok(())
}

/// Used skill slots substitute against the ability pool, unique within each
/// monster; sentinel slots stay empty.
fn mutate_monster_skills(
    catalog: &mut Catalog,
    ctx: &mut RunContext,
    settings: &RandomizerSettings,
) -> Result<()> {
    let strength = settings.strength_for(EntityKind::Monster);
    if strength <= 0.0 {
        return Ok(());
    }
    let ability_pool = ctx.pool(catalog, EntityKind::Ability)?;
    for index in 0..catalog.len(EntityKind::Monster) {
        let mut original_skills = Vec::new();
        for slot in 0..MONSTER_SKILLS {
            let skill = catalog
                .record(EntityKind::Monster, index)?
                .original(&format!("skill{slot}"))?;
            if skill >= 0 {
                original_skills.push(skill);
            }
        }
        let allow = UniquenessGuard::originals_had_duplicates(&original_skills);
        let mut guard: UniquenessGuard<usize> = UniquenessGuard::new(allow);

        for slot in 0..MONSTER_SKILLS {
            let skill = catalog
                .record(EntityKind::Monster, index)?
                .current(&format!("skill{slot}"))?;
            if skill < 0 {
                continue;
            }
            let ability = catalog.checked_index(EntityKind::Ability, skill)?;
            let chosen = substitute_unique(
                ctx,
                catalog,
                EntityKind::Ability,
                ability,
                &ability_pool,
                strength,
                None,
                &mut guard,
                |candidate| candidate,
            )?;
            match chosen {
                Some(candidate) => {
                    catalog
                        .record_mut(EntityKind::Monster, index)?
                        .set_current(&format!("skill{slot}"), candidate as i64)?;
                }
                None => warn!("monster {index} slot {slot} kept its original skill"),
            }
        }
    }
    Ok(())
}

/// Each formation slot substitutes against the monsters sharing its battle
/// scene; a scene with no eligible monsters widens to the default pool.
fn mutate_formations(
    catalog: &mut Catalog,
    ctx: &mut RunContext,
    settings: &RandomizerSettings,
) -> Result<()> {
    let strength = settings.strength_for(EntityKind::Formation);
    if strength <= 0.0 {
        return Ok(());
    }
    let monster_pool = ctx.pool(catalog, EntityKind::Monster)?;
    for formation_index in 0..catalog.len(EntityKind::Formation) {
        let scene = catalog
            .record(EntityKind::Formation, formation_index)?
            .original("scene")?;
        let same_scene: Vec<usize> = {
            let mut members = Vec::new();
            for &member in &monster_pool {
                if catalog.record(EntityKind::Monster, member)?.original("scene")? == scene
                {
                    members.push(member);
                }
            }
            members
        };
        let pool = pool_with_fallback(same_scene, monster_pool.clone());

        for slot in 0..FORMATION_SLOTS {
            let value = catalog
                .record(EntityKind::Formation, formation_index)?
                .current(&format!("monster{slot}"))?;
            if value < 0 {
                continue;
            }
            let index = catalog.checked_index(EntityKind::Monster, value)?;
            let chosen = substitute(
                ctx,
                catalog,
                EntityKind::Monster,
                index,
                &pool,
                strength,
                None,
            )?;
            catalog
                .record_mut(EntityKind::Formation, formation_index)?
                .set_current(&format!("monster{slot}"), chosen as i64)?;
        }
    }
    Ok(())
}

fn mutate_master_stats(
    catalog: &mut Catalog,
    ctx: &mut RunContext,
    settings: &RandomizerSettings,
) -> Result<()> {
    if settings.strength_for(EntityKind::MasterStats) <= 0.0 {
        return Ok(());
    }
    for index in 0..catalog.len(EntityKind::MasterStats) {
        redistribute(&mut ctx.rng, catalog, EntityKind::MasterStats, index)?;
    }
    Ok(())
}

/// Taught skills substitute under uniqueness and the per-category quota;
/// teaching levels take an ordinary walk and are re-sorted at cleanup.
fn mutate_master_skills(
    catalog: &mut Catalog,
    ctx: &mut RunContext,
    settings: &RandomizerSettings,
) -> Result<()> {
    let strength = settings.strength_for(EntityKind::MasterSkills);
    if strength <= 0.0 {
        return Ok(());
    }
    let ability_pool = ctx.pool(catalog, EntityKind::Ability)?;
    let level_bounds = EntityKind::MasterSkills
        .schema()
        .iter()
        .find(|f| f.name == "level0")
        .map(|f| (f.min, f.max))
        .unwrap_or((1, 50));

    for master_index in 0..catalog.len(EntityKind::MasterSkills) {
        let mut original_skills = Vec::new();
        for slot in 0..MASTER_SLOTS {
            let skill = catalog
                .record(EntityKind::MasterSkills, master_index)?
                .original(&format!("skill{slot}"))?;
            if skill >= 0 {
                original_skills.push(skill);
            }
        }
        let allow = UniquenessGuard::originals_had_duplicates(&original_skills);
        let mut guard: UniquenessGuard<usize> = UniquenessGuard::new(allow);
        let mut quota = CategoryQuota::new(CATEGORY_CAP);

        for slot in 0..MASTER_SLOTS {
            let master = catalog.record(EntityKind::MasterSkills, master_index)?;
            let skill = master.current(&format!("skill{slot}"))?;
            if skill < 0 {
                continue;
            }
            let index = catalog.checked_index(EntityKind::Ability, skill)?;
            let chosen = pick_master_skill(
                ctx,
                catalog,
                index,
                &ability_pool,
                strength,
                &mut guard,
                &mut quota,
            )?;
            let record = catalog.record_mut(EntityKind::MasterSkills, master_index)?;
            match chosen {
                Some(candidate) => {
                    record.set_current(&format!("skill{slot}"), candidate as i64)?;
                }
                None => {
                    warn!(
                        "master {master_index} slot {slot} dropped; no candidate passed \
                         uniqueness and quota"
                    );
                    record.set_current(&format!("skill{slot}"), NO_ENTITY)?;
                }
            }

            let level = catalog
                .record(EntityKind::MasterSkills, master_index)?
                .current(&format!("level{slot}"))? as f64;
            let moved = walk(
                &mut ctx.rng,
                level,
                level_bounds.0 as f64,
                level_bounds.1 as f64,
                strength,
            );
            catalog
                .record_mut(EntityKind::MasterSkills, master_index)?
                .set_current(&format!("level{slot}"), moved.round() as i64)?;
        }
    }
    Ok(())
}

/// One bounded retry loop covering both enforcers: a candidate must be new
/// to the destination and under its category's quota.
fn pick_master_skill(
    ctx: &mut RunContext,
    catalog: &Catalog,
    index: usize,
    pool: &[usize],
    strength: f64,
    guard: &mut UniquenessGuard<usize>,
    quota: &mut CategoryQuota,
) -> Result<Option<usize>> {
    use crate::constraints::RETRY_CEILING;

    if ctx.composite_rank(catalog, EntityKind::Ability, index)? < 0.0 {
        let category = catalog.record(EntityKind::Ability, index)?.original("category")?;
        if guard.contains(&index) || !quota.try_admit(category) {
            return Ok(None);
        }
        guard.insert(index);
        return Ok(Some(index));
    }

    let mut working: Vec<usize> = pool.to_vec();
    for _ in 0..RETRY_CEILING {
        if working.is_empty() {
            break;
        }
        let candidate = substitute(
            ctx,
            catalog,
            EntityKind::Ability,
            index,
            &working,
            strength,
            None,
        )?;
        if guard.contains(&candidate) {
            working.retain(|&member| member != candidate);
            continue;
        }
        let category = catalog
            .record(EntityKind::Ability, candidate)?
            .original("category")?;
        if !quota.try_admit(category) {
            working.retain(|&member| member != candidate);
            continue;
        }
        guard.insert(candidate);
        return Ok(Some(candidate));
    }
    Ok(None)
}

/// Starting weapon and armor substitute within the character's equippable
/// subtype, widening to the kind-default pool when the subtype has no
/// candidates.
fn mutate_starting_equipment(
    catalog: &mut Catalog,
    ctx: &mut RunContext,
    settings: &RandomizerSettings,
) -> Result<()> {
    let strength = settings.strength_for(EntityKind::BaseStats);
    if strength <= 0.0 {
        return Ok(());
    }
    for index in 0..catalog.len(EntityKind::BaseStats) {
        let character = catalog
            .record(EntityKind::BaseStats, index)?
            .original("character")?;
        for (field, kind) in [
            ("weapon", EntityKind::Weapon),
            ("armor", EntityKind::Armor),
            ("accessory", EntityKind::Accessory),
        ] {
            let value = catalog.record(EntityKind::BaseStats, index)?.current(field)?;
            if value < 0 {
                continue;
            }
            let equip_index = catalog.checked_index(kind, value)?;
            let default_pool = ctx.pool(catalog, kind)?;
            let wearable: Vec<usize> = {
                let mut members = Vec::new();
                for &member in &default_pool {
                    if catalog.record(kind, member)?.original("wearer")? == character {
                        members.push(member);
                    }
                }
                members
            };
            let pool = pool_with_fallback(wearable, default_pool);
            let chosen = substitute(ctx, catalog, kind, equip_index, &pool, strength, None)?;
            catalog
                .record_mut(EntityKind::BaseStats, index)?
                .set_current(field, chosen as i64)?;
        }
    }
    Ok(())
}

fn consistency_violation(settings: &RandomizerSettings, message: String) -> Result<()> {
    if settings.permissive {
        warn!("{message}");
        Ok(())
    } else {
        Err(RandomizerError::Consistency(message))
    }
}

/// Repairs post-mutation invariants: duplicate-cluster synchronization,
/// master skill levels re-sorted ascending, and the shop consistency check.
pub(crate) fn cleanup_all(
    catalog: &mut Catalog,
    ctx: &mut RunContext,
    settings: &RandomizerSettings,
) -> Result<()> {
    let representatives = ctx.representatives(catalog, EntityKind::Monster)?;
    crate::cluster::sync_duplicates(catalog, EntityKind::Monster, &representatives)?;

    // The re-sort repairs walk-shuffled teaching levels; when the masters
    // pass never ran there is nothing to repair, and an input dump with
    // unsorted levels must pass through untouched.
    let masters_mutated = settings.enabled(EntityKind::MasterSkills)
        && settings.strength_for(EntityKind::MasterSkills) > 0.0;
    if masters_mutated {
        let level_min = EntityKind::MasterSkills
            .schema()
            .iter()
            .find(|f| f.name == "level0")
            .map(|f| f.min)
            .unwrap_or(1);
        for master_index in 0..catalog.len(EntityKind::MasterSkills) {
            let mut taught: Vec<(i64, i64)> = Vec::new();
            for slot in 0..MASTER_SLOTS {
                let master = catalog.record(EntityKind::MasterSkills, master_index)?;
                let skill = master.current(&format!("skill{slot}"))?;
                if skill >= 0 {
                    taught.push((master.current(&format!("level{slot}"))?, skill));
                }
            }
            taught.sort_unstable();
            let record = catalog.record_mut(EntityKind::MasterSkills, master_index)?;
            for slot in 0..MASTER_SLOTS {
                match taught.get(slot) {
                    Some(&(level, skill)) => {
                        record.set_current(&format!("skill{slot}"), skill)?;
                        record.set_current(&format!("level{slot}"), level)?;
                    }
                    None => {
                        record.set_current(&format!("skill{slot}"), NO_ENTITY)?;
                        record.set_current(&format!("level{slot}"), level_min)?;
                    }
                }
            }
        }
    }

    for shop_index in 0..catalog.len(EntityKind::Shop) {
        let shop = catalog.record(EntityKind::Shop, shop_index)?;
        let mut stocked: Vec<(i64, i64)> = Vec::new();
        let mut original: Vec<(i64, i64)> = Vec::new();
        for slot in 0..SHOP_SLOTS {
            let kind_value = shop.original(&format!("slot{slot}_kind"))?;
            let current = shop.current(&format!("slot{slot}_item"))?;
            if current >= 0 {
                stocked.push((kind_value, current));
            }
            let was = shop.original(&format!("slot{slot}_item"))?;
            if was >= 0 {
                original.push((kind_value, was));
            }
        }
        if stocked.is_empty() && !original.is_empty() {
            consistency_violation(
                settings,
                format!("shop {shop_index} lost every stocked slot"),
            )?;
        }
        let mut deduped = stocked.clone();
        deduped.sort_unstable();
        deduped.dedup();
        if deduped.len() != stocked.len()
            && !UniquenessGuard::originals_had_duplicates(&original)
        {
            consistency_violation(
                settings,
                format!("shop {shop_index} stocks duplicate entries"),
            )?;
        }
    }
    Ok(())
}
