use std::collections::HashMap;

use rand::{rngs::StdRng, SeedableRng};

use crate::catalog::{Catalog, EntityKind};
use crate::{cluster, rank, Result};

/// Per-run state: the single seeded generator every random decision draws
/// from, plus the memoized rank / pool / cluster caches. Built fresh for
/// each run so repeated runs in one process never share state; caches fill
/// lazily on first access and are frozen for the rest of the run.
pub struct RunContext {
    pub rng: StdRng,
    ranks: HashMap<EntityKind, Vec<f64>>,
    pools: HashMap<EntityKind, Vec<usize>>,
    clusters: HashMap<EntityKind, Vec<usize>>,
}

impl RunContext {
    pub fn new(seed: u64) -> RunContext {
        RunContext {
            rng: StdRng::seed_from_u64(seed),
            ranks: HashMap::new(),
            pools: HashMap::new(),
            clusters: HashMap::new(),
        }
    }

    fn ensure_ranks(&mut self, catalog: &Catalog, kind: EntityKind) -> Result<()> {
        if !self.ranks.contains_key(&kind) {
            let table = rank::compute_ranks(catalog, kind)?;
            self.ranks.insert(kind, table);
        }
        Ok(())
    }

    /// Composite rank of one record: [0, 1], or negative for ineligible.
    pub fn composite_rank(
        &mut self,
        catalog: &Catalog,
        kind: EntityKind,
        index: usize,
    ) -> Result<f64> {
        self.ensure_ranks(catalog, kind)?;
        Ok(self.ranks[&kind].get(index).copied().unwrap_or(rank::INELIGIBLE))
    }

    /// The kind-default candidate pool, rank-ascending. Cloned out so
    /// callers can filter or shrink it while still borrowing the context.
    pub fn pool(&mut self, catalog: &Catalog, kind: EntityKind) -> Result<Vec<usize>> {
        self.ensure_ranks(catalog, kind)?;
        if !self.pools.contains_key(&kind) {
            let pool = rank::build_pool(catalog, kind, &self.ranks[&kind]);
            self.pools.insert(kind, pool);
        }
        Ok(self.pools[&kind].clone())
    }

    /// Canonical-cluster representative per record of the kind.
    pub fn representatives(
        &mut self,
        catalog: &Catalog,
        kind: EntityKind,
    ) -> Result<Vec<usize>> {
        if !self.clusters.contains_key(&kind) {
            let reps = cluster::classify(catalog, kind);
            cluster::verify(kind, &reps)?;
            self.clusters.insert(kind, reps);
        }
        Ok(self.clusters[&kind].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Record;
    use std::collections::HashMap as Map;

    fn small_catalog() -> Catalog {
        let mut tables = Map::new();
        tables.insert(
            EntityKind::Item,
            (0..4)
                .map(|i| {
                    Record::new(
                        EntityKind::Item,
                        i,
                        format!("Item{i}"),
                        vec![10 * (i as i64 + 1), 5, 0],
                    )
                    .unwrap()
                })
                .collect(),
        );
        Catalog::new(tables).unwrap()
    }

    #[test]
    fn caches_are_computed_once_and_stable() {
        let catalog = small_catalog();
        let mut ctx = RunContext::new(3);
        let first = ctx.pool(&catalog, EntityKind::Item).unwrap();
        let second = ctx.pool(&catalog, EntityKind::Item).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn fresh_contexts_restart_the_draw_sequence() {
        use rand::Rng;
        let mut a = RunContext::new(5);
        let a_first: u64 = a.rng.gen();
        let mut b = RunContext::new(5);
        let b_first: u64 = b.rng.gen();
        assert_eq!(a_first, b_first);
    }
}
