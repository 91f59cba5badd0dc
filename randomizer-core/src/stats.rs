use rand::{rngs::StdRng, Rng};

use crate::catalog::{Catalog, EntityKind};
use crate::{RandomizerError, Result};

/// Swappable families: fields within one family draw from a shared pool of
/// original values collected across all sibling blocks.
pub(crate) const FAMILIES: &[&[&str]] = &[&["hp", "ap"], &["pwr", "dfn", "agl", "int"]];

/// The redraw loop converges quickly over these small discrete pools;
/// running into this ceiling is a diagnostic, not a tolerated outcome.
const REDRAW_CEILING: usize = 100_000;

/// Redistributes a stat block's fields so their sum equals a sum drawn from
/// the set of original sums across sibling blocks. Each field starts from a
/// uniform draw out of its family pool, then one uniformly chosen field is
/// redrawn until the running total hits the target.
pub(crate) fn redistribute(
    rng: &mut StdRng,
    catalog: &mut Catalog,
    kind: EntityKind,
    index: usize,
) -> Result<()> {
    let fields: Vec<(&'static str, usize)> = FAMILIES
        .iter()
        .enumerate()
        .flat_map(|(family, names)| names.iter().map(move |&name| (name, family)))
        .collect();

    let mut pools: Vec<Vec<i64>> = vec![Vec::new(); FAMILIES.len()];
    let mut sums: Vec<i64> = Vec::new();
    for sibling in catalog.records(kind) {
        let mut sum = 0;
        for &(name, family) in &fields {
            let value = sibling.original(name)?;
            pools[family].push(value);
            sum += value;
        }
        sums.push(sum);
    }
    if sums.is_empty() {
        return Err(RandomizerError::EmptyPool(kind.table_name()));
    }

    let target = sums[rng.gen_range(0..sums.len())];

    let mut values: Vec<i64> = fields
        .iter()
        .map(|&(_, family)| pools[family][rng.gen_range(0..pools[family].len())])
        .collect();

    let mut redraws = 0usize;
    while values.iter().sum::<i64>() != target {
        if redraws >= REDRAW_CEILING {
            return Err(RandomizerError::Consistency(format!(
                "{} block {index} failed to converge on target sum {target}",
                kind.table_name()
            )));
        }
        let pick = rng.gen_range(0..values.len());
        let family = fields[pick].1;
        values[pick] = pools[family][rng.gen_range(0..pools[family].len())];
        redraws += 1;
    }

    let record = catalog.record_mut(kind, index)?;
    for (&(name, _), value) in fields.iter().zip(values) {
        record.set_current(name, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Record;
    use rand::SeedableRng;
    use std::collections::HashMap as Map;

    fn master(index: usize, name: &str, stats: [i64; 6]) -> Record {
        Record::new(EntityKind::MasterStats, index, name.to_string(), stats.to_vec())
            .unwrap()
    }

    fn masters_catalog() -> Catalog {
        let mut tables = Map::new();
        tables.insert(
            EntityKind::MasterStats,
            vec![
                master(0, "Mygas", [2, 4, -1, 0, 1, 3]),
                master(1, "Bunyan", [6, -2, 4, 3, -2, 0]),
                master(2, "Yggdrasil", [0, 3, -3, 2, 2, 5]),
            ],
        );
        // A ranked kind so the catalog precondition holds.
        tables.insert(
            EntityKind::Item,
            vec![Record::new(EntityKind::Item, 0, "Herb".to_string(), vec![20, 5, 0])
                .unwrap()],
        );
        Catalog::new(tables).unwrap()
    }

    #[test]
    fn redistributed_sum_equals_an_original_sibling_sum() {
        let original_sums: Vec<i64> = vec![2 + 4 - 1 + 0 + 1 + 3, 6 - 2 + 4 + 3 - 2 + 0, 0 + 3 - 3 + 2 + 2 + 5];
        for seed in 0..32 {
            let mut catalog = masters_catalog();
            let mut rng = StdRng::seed_from_u64(seed);
            redistribute(&mut rng, &mut catalog, EntityKind::MasterStats, 1).unwrap();
            let record = catalog.record(EntityKind::MasterStats, 1).unwrap();
            let sum: i64 = ["hp", "ap", "pwr", "dfn", "agl", "int"]
                .iter()
                .map(|f| record.current(f).unwrap())
                .sum();
            assert!(original_sums.contains(&sum), "sum {sum} not among originals");
        }
    }

    #[test]
    fn redistribution_is_seed_deterministic() {
        let run = |seed| {
            let mut catalog = masters_catalog();
            let mut rng = StdRng::seed_from_u64(seed);
            redistribute(&mut rng, &mut catalog, EntityKind::MasterStats, 0).unwrap();
            catalog
                .record(EntityKind::MasterStats, 0)
                .unwrap()
                .current_values()
                .to_vec()
        };
        assert_eq!(run(9), run(9));
    }

    #[test]
    fn originals_stay_untouched() {
        let mut catalog = masters_catalog();
        let mut rng = StdRng::seed_from_u64(4);
        redistribute(&mut rng, &mut catalog, EntityKind::MasterStats, 2).unwrap();
        let record = catalog.record(EntityKind::MasterStats, 2).unwrap();
        assert_eq!(record.original_values(), &[0, 3, -3, 2, 2, 5]);
    }
}
