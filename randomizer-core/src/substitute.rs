use crate::catalog::{Catalog, EntityKind};
use crate::context::RunContext;
use crate::walk::walk_index;
use crate::{RandomizerError, Result};

/// Maps a record to its replacement by walking its position within a
/// rank-ordered candidate pool. Ineligible records (composite rank below
/// zero) come back unchanged. `pool` is normally the kind-default pool from
/// the run context, but callers may pass any pre-filtered subset; the result
/// is always drawn from the pool actually supplied.
///
/// When the record is absent from the pool (a reward priced below anything
/// catalogued, or a filtered subset that excludes it), the walk starts from
/// the highest-ranked member whose criterion does not exceed
/// `value_ceiling`, or from the bottom of the pool if no ceiling applies.
pub(crate) fn substitute(
    ctx: &mut RunContext,
    catalog: &Catalog,
    kind: EntityKind,
    index: usize,
    pool: &[usize],
    strength: f64,
    value_ceiling: Option<i64>,
) -> Result<usize> {
    let rank = ctx.composite_rank(catalog, kind, index)?;
    if rank < 0.0 {
        return Ok(index);
    }
    if pool.is_empty() {
        return Err(RandomizerError::EmptyPool(kind.table_name()));
    }

    let position = match pool.iter().position(|&member| member == index) {
        Some(position) => position,
        None => fallback_position(catalog, kind, pool, value_ceiling)?,
    };

    let new_position = walk_index(&mut ctx.rng, position, pool.len(), strength);
    Ok(pool[new_position])
}

fn fallback_position(
    catalog: &Catalog,
    kind: EntityKind,
    pool: &[usize],
    value_ceiling: Option<i64>,
) -> Result<usize> {
    let (Some(ceiling), Some(criterion)) = (value_ceiling, kind.rank_field()) else {
        return Ok(0);
    };
    let mut best = 0;
    for (position, &member) in pool.iter().enumerate() {
        if catalog.record(kind, member)?.original(criterion)? <= ceiling {
            best = position;
        }
    }
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Record;
    use std::collections::HashMap as Map;

    fn priced_catalog(prices: &[i64]) -> Catalog {
        let mut tables = Map::new();
        tables.insert(
            EntityKind::Item,
            prices
                .iter()
                .enumerate()
                .map(|(i, &p)| {
                    Record::new(EntityKind::Item, i, format!("Item{i}"), vec![p, 5, 0])
                        .unwrap()
                })
                .collect(),
        );
        Catalog::new(tables).unwrap()
    }

    #[test]
    fn strength_zero_returns_the_entity_itself() {
        let catalog = priced_catalog(&[10, 20, 30, 40, 50]);
        let mut ctx = RunContext::new(0);
        let pool = ctx.pool(&catalog, EntityKind::Item).unwrap();
        let out = substitute(&mut ctx, &catalog, EntityKind::Item, 2, &pool, 0.0, None)
            .unwrap();
        assert_eq!(out, 2);
    }

    #[test]
    fn full_strength_is_reproducible_and_in_pool() {
        let catalog = priced_catalog(&[10, 20, 30, 40, 50]);
        let run = |seed| {
            let mut ctx = RunContext::new(seed);
            let pool = ctx.pool(&catalog, EntityKind::Item).unwrap();
            substitute(&mut ctx, &catalog, EntityKind::Item, 2, &pool, 1.0, None)
                .unwrap()
        };
        let first = run(1234);
        assert!(first < 5);
        assert_eq!(first, run(1234));
    }

    #[test]
    fn ineligible_entity_is_a_no_op() {
        let mut tables = Map::new();
        tables.insert(
            EntityKind::Item,
            vec![
                Record::new(EntityKind::Item, 0, "Nothing".to_string(), vec![0, 0, 0])
                    .unwrap(),
                Record::new(EntityKind::Item, 1, "Herb".to_string(), vec![20, 5, 0])
                    .unwrap(),
            ],
        );
        let catalog = Catalog::new(tables).unwrap();
        let mut ctx = RunContext::new(7);
        let pool = ctx.pool(&catalog, EntityKind::Item).unwrap();
        let out = substitute(&mut ctx, &catalog, EntityKind::Item, 0, &pool, 1.0, None)
            .unwrap();
        assert_eq!(out, 0);
    }

    #[test]
    fn empty_pool_is_fatal() {
        let catalog = priced_catalog(&[10, 20]);
        let mut ctx = RunContext::new(7);
        let err = substitute(&mut ctx, &catalog, EntityKind::Item, 0, &[], 0.5, None);
        assert!(matches!(err, Err(RandomizerError::EmptyPool(_))));
    }

    #[test]
    fn absent_entity_falls_back_under_the_value_ceiling() {
        let catalog = priced_catalog(&[10, 20, 30, 40, 50]);
        let mut ctx = RunContext::new(9);
        // Pool without item 2; ceiling 35 puts the start position on the
        // most expensive member still at or below 35.
        let pool = vec![0, 1, 3, 4];
        let out = substitute(
            &mut ctx,
            &catalog,
            EntityKind::Item,
            2,
            &pool,
            0.0,
            Some(35),
        )
        .unwrap();
        assert_eq!(out, 1);
    }

    #[test]
    fn override_pool_result_comes_from_the_supplied_subset() {
        let catalog = priced_catalog(&[10, 20, 30, 40, 50]);
        let subset = vec![1, 3];
        for seed in 0..32 {
            let mut ctx = RunContext::new(seed);
            let out =
                substitute(&mut ctx, &catalog, EntityKind::Item, 3, &subset, 1.0, None)
                    .unwrap();
            assert!(subset.contains(&out));
        }
    }
}
