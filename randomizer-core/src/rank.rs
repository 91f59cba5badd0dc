use std::collections::HashMap;

use crate::catalog::{Catalog, EntityKind, MASTER_SLOTS, MONSTER_SKILLS};
use crate::Result;

/// Composite rank per record index: a value in [0, 1], or this sentinel for
/// records that are ineligible for substitution.
pub const INELIGIBLE: f64 = -1.0;

/// Assigns percentile positions over `members`, sorted by criterion with
/// signature and name as tie-breaks. A pool of one member ranks 0.
fn percentile_ranks(
    catalog: &Catalog,
    kind: EntityKind,
    members: &[(usize, i64)],
    out: &mut [f64],
    counts: &mut [usize],
) -> Result<()> {
    let mut sorted: Vec<(i64, usize, &str, usize)> = Vec::with_capacity(members.len());
    for &(index, criterion) in members {
        let record = catalog.record(kind, index)?;
        sorted.push((criterion, record.signature, record.name.as_str(), index));
    }
    sorted.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(b.2)));

    let n = sorted.len();
    for (pos, &(_, _, _, index)) in sorted.iter().enumerate() {
        let rank = if n <= 1 { 0.0 } else { pos as f64 / (n - 1) as f64 };
        out[index] += rank;
        counts[index] += 1;
    }
    Ok(())
}

/// Computes the composite rank table for one kind: the mean of the global
/// and subtype-local percentile positions by the kind's primary criterion.
/// Abilities rank by usage contexts instead.
pub(crate) fn compute_ranks(catalog: &Catalog, kind: EntityKind) -> Result<Vec<f64>> {
    let n = catalog.len(kind);
    if kind == EntityKind::Ability {
        return ability_context_ranks(catalog);
    }

    let Some(criterion_field) = kind.rank_field() else {
        return Ok(vec![INELIGIBLE; n]);
    };

    let mut eligible: Vec<(usize, i64)> = Vec::new();
    for record in catalog.records(kind) {
        if kind.record_eligible(record) {
            eligible.push((record.index, record.original(criterion_field)?));
        }
    }
    if eligible.is_empty() {
        return Ok(vec![INELIGIBLE; n]);
    }

    let mut sums = vec![0.0; n];
    let mut counts = vec![0usize; n];
    percentile_ranks(catalog, kind, &eligible, &mut sums, &mut counts)?;

    if let Some(subtype_field) = kind.subtype_field() {
        let mut groups: HashMap<i64, Vec<(usize, i64)>> = HashMap::new();
        for &(index, criterion) in &eligible {
            let subtype = catalog.record(kind, index)?.original(subtype_field)?;
            groups.entry(subtype).or_default().push((index, criterion));
        }
        let mut subtypes: Vec<i64> = groups.keys().copied().collect();
        subtypes.sort_unstable();
        for subtype in subtypes {
            percentile_ranks(catalog, kind, &groups[&subtype], &mut sums, &mut counts)?;
        }
    }

    let mut ranks = vec![INELIGIBLE; n];
    for index in 0..n {
        if counts[index] > 0 {
            ranks[index] = sums[index] / counts[index] as f64;
        }
    }
    Ok(ranks)
}

/// An ability's identity spans every context that references it: the level
/// masters teach it at, and the power of monsters that use it. Composite
/// rank is the unweighted mean over whichever context ranks are defined;
/// an ability no context references gets the ineligible sentinel.
fn ability_context_ranks(catalog: &Catalog) -> Result<Vec<f64>> {
    let n = catalog.len(EntityKind::Ability);
    let mut sums = vec![0.0; n];
    let mut counts = vec![0usize; n];

    // Context 1: lowest level any master teaches the ability at.
    let mut teach_level: HashMap<usize, i64> = HashMap::new();
    for master in catalog.records(EntityKind::MasterSkills) {
        for slot in 0..MASTER_SLOTS {
            let skill = master.original(&format!("skill{slot}"))?;
            if skill < 0 {
                continue;
            }
            let index = catalog.checked_index(EntityKind::Ability, skill)?;
            let level = master.original(&format!("level{slot}"))?;
            let entry = teach_level.entry(index).or_insert(level);
            if level < *entry {
                *entry = level;
            }
        }
    }

    // Context 2: lowest exp reward among monsters that use the ability.
    let mut monster_exp: HashMap<usize, i64> = HashMap::new();
    for monster in catalog.records(EntityKind::Monster) {
        for slot in 0..MONSTER_SKILLS {
            let skill = monster.original(&format!("skill{slot}"))?;
            if skill < 0 {
                continue;
            }
            let index = catalog.checked_index(EntityKind::Ability, skill)?;
            let exp = monster.original("exp")?;
            let entry = monster_exp.entry(index).or_insert(exp);
            if exp < *entry {
                *entry = exp;
            }
        }
    }

    for context in [&teach_level, &monster_exp] {
        let mut members: Vec<(usize, i64)> = Vec::new();
        for (&index, &criterion) in context {
            let record = catalog.record(EntityKind::Ability, index)?;
            if EntityKind::Ability.record_eligible(record) {
                members.push((index, criterion));
            }
        }
        if members.is_empty() {
            continue;
        }
        members.sort_unstable();
        percentile_ranks(catalog, EntityKind::Ability, &members, &mut sums, &mut counts)?;
    }

    let mut ranks = vec![INELIGIBLE; n];
    for index in 0..n {
        if counts[index] > 0 {
            ranks[index] = sums[index] / counts[index] as f64;
        }
    }
    Ok(ranks)
}

/// Builds the frozen candidate pool for a kind: eligible record indices
/// sorted ascending by composite rank, tie-broken by signature then name.
pub(crate) fn build_pool(
    catalog: &Catalog,
    kind: EntityKind,
    ranks: &[f64],
) -> Vec<usize> {
    let mut members: Vec<(f64, usize, &str, usize)> = Vec::new();
    for record in catalog.records(kind) {
        let rank = ranks[record.index];
        if rank >= 0.0 {
            members.push((rank, record.signature, record.name.as_str(), record.index));
        }
    }
    members.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(b.2)));
    members.into_iter().map(|(_, _, _, index)| index).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Record;
    use std::collections::HashMap as Map;

    fn priced_catalog(prices: &[i64]) -> Catalog {
        let mut tables = Map::new();
        let items = prices
            .iter()
            .enumerate()
            .map(|(i, &p)| {
                Record::new(
                    EntityKind::Item,
                    i,
                    format!("Item{i}"),
                    vec![p, 10, 0],
                )
                .unwrap()
            })
            .collect();
        tables.insert(EntityKind::Item, items);
        Catalog::new(tables).unwrap()
    }

    #[test]
    fn five_item_pool_ranks_in_quarter_steps() {
        let catalog = priced_catalog(&[10, 20, 30, 40, 50]);
        let ranks = compute_ranks(&catalog, EntityKind::Item).unwrap();
        assert_eq!(ranks, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn rank_is_monotone_in_the_primary_criterion() {
        let catalog = priced_catalog(&[500, 20, 340, 90, 1, 90, 7000]);
        let ranks = compute_ranks(&catalog, EntityKind::Item).unwrap();
        let mut by_price: Vec<(i64, f64)> = catalog
            .records(EntityKind::Item)
            .iter()
            .map(|r| (r.original("price").unwrap(), ranks[r.index]))
            .collect();
        by_price.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));
        for pair in by_price.windows(2) {
            assert!(pair[0].1 <= pair[1].1);
        }
    }

    #[test]
    fn singleton_pool_ranks_zero() {
        let catalog = priced_catalog(&[120]);
        let ranks = compute_ranks(&catalog, EntityKind::Item).unwrap();
        assert_eq!(ranks, vec![0.0]);
    }

    #[test]
    fn nothing_entry_gets_the_sentinel() {
        let mut tables = Map::new();
        tables.insert(
            EntityKind::Item,
            vec![
                Record::new(EntityKind::Item, 0, "Nothing".to_string(), vec![0, 0, 0])
                    .unwrap(),
                Record::new(EntityKind::Item, 1, "Herb".to_string(), vec![20, 10, 0])
                    .unwrap(),
            ],
        );
        let catalog = Catalog::new(tables).unwrap();
        let ranks = compute_ranks(&catalog, EntityKind::Item).unwrap();
        assert_eq!(ranks[0], INELIGIBLE);
        assert_eq!(ranks[1], 0.0);
    }

    #[test]
    fn pool_is_sorted_by_rank() {
        let catalog = priced_catalog(&[50, 10, 40, 20, 30]);
        let ranks = compute_ranks(&catalog, EntityKind::Item).unwrap();
        let pool = build_pool(&catalog, EntityKind::Item, &ranks);
        assert_eq!(pool, vec![1, 3, 4, 2, 0]);
    }

    #[test]
    fn untaught_ability_is_ineligible() {
        let mut tables = Map::new();
        tables.insert(
            EntityKind::Ability,
            vec![
                Record::new(
                    EntityKind::Ability,
                    0,
                    "Frost".to_string(),
                    vec![4, 60, 0, 2, 0],
                )
                .unwrap(),
                Record::new(
                    EntityKind::Ability,
                    1,
                    "Unused".to_string(),
                    vec![0, 0, 0, 0, 3],
                )
                .unwrap(),
            ],
        );
        tables.insert(
            EntityKind::MasterSkills,
            vec![Record::new(
                EntityKind::MasterSkills,
                0,
                "Mygas".to_string(),
                vec![0, 3, -1, 1, -1, 1, -1, 1, -1, 1, -1, 1],
            )
            .unwrap()],
        );
        let catalog = Catalog::new(tables).unwrap();
        let ranks = compute_ranks(&catalog, EntityKind::Ability).unwrap();
        assert_eq!(ranks[0], 0.0);
        assert_eq!(ranks[1], INELIGIBLE);
    }
}
