use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use log::warn;

use crate::catalog::{Catalog, EntityKind};
use crate::context::RunContext;
use crate::substitute::substitute;
use crate::Result;

/// Retry budget for constrained substitution; hitting it degrades the
/// result instead of failing the run.
pub(crate) const RETRY_CEILING: usize = 1000;

/// Maximum accepted picks per derived ability category in one destination.
pub(crate) const CATEGORY_CAP: usize = 3;

/// Tracks the replacements already present in one destination collection.
/// Duplicates stay permitted when the original collection already had them.
pub(crate) struct UniquenessGuard<K> {
    taken: HashSet<K>,
    allow_duplicates: bool,
}

impl<K: Eq + Hash> UniquenessGuard<K> {
    pub fn new(allow_duplicates: bool) -> UniquenessGuard<K> {
        UniquenessGuard {
            taken: HashSet::new(),
            allow_duplicates,
        }
    }

    /// Detects whether the original slot values already contained
    /// duplicates, ignoring sentinel entries.
    pub fn originals_had_duplicates(original_keys: &[K]) -> bool
    where
        K: Clone,
    {
        let mut seen = HashSet::new();
        original_keys.iter().any(|k| !seen.insert(k.clone()))
    }

    pub fn contains(&self, key: &K) -> bool {
        !self.allow_duplicates && self.taken.contains(key)
    }

    pub fn insert(&mut self, key: K) {
        self.taken.insert(key);
    }
}

/// Caps accepted picks per derived category within one destination.
pub(crate) struct CategoryQuota {
    cap: usize,
    counts: HashMap<i64, usize>,
}

impl CategoryQuota {
    pub fn new(cap: usize) -> CategoryQuota {
        CategoryQuota {
            cap,
            counts: HashMap::new(),
        }
    }

    /// Admits the pick and records it, or rejects it if the category is
    /// already at its cap.
    pub fn try_admit(&mut self, category: i64) -> bool {
        let count = self.counts.entry(category).or_insert(0);
        if *count >= self.cap {
            return false;
        }
        *count += 1;
        true
    }
}

/// Type-match fallback: a filtered subset that came up empty widens to the
/// kind-default pool.
pub(crate) fn pool_with_fallback(filtered: Vec<usize>, default_pool: Vec<usize>) -> Vec<usize> {
    if filtered.is_empty() {
        default_pool
    } else {
        filtered
    }
}

/// Substitution wrapped with uniqueness-within-destination: a proposed
/// replacement already taken is excluded from the pool and redrawn, up to
/// the retry ceiling. Returns None when no admissible candidate was found;
/// the caller keeps a smaller result set instead of failing the run.
pub(crate) fn substitute_unique<K, F>(
    ctx: &mut RunContext,
    catalog: &Catalog,
    kind: EntityKind,
    index: usize,
    pool: &[usize],
    strength: f64,
    value_ceiling: Option<i64>,
    guard: &mut UniquenessGuard<K>,
    key_of: F,
) -> Result<Option<usize>>
where
    K: Eq + Hash + Clone,
    F: Fn(usize) -> K,
{
    // An ineligible record can only ever map to itself, so the answer is
    // settled before any retry.
    if ctx.composite_rank(catalog, kind, index)? < 0.0 {
        let key = key_of(index);
        if guard.contains(&key) {
            return Ok(None);
        }
        guard.insert(key);
        return Ok(Some(index));
    }

    let mut working: Vec<usize> = pool.to_vec();
    for _ in 0..RETRY_CEILING {
        if working.is_empty() {
            break;
        }
        let candidate = substitute(ctx, catalog, kind, index, &working, strength, value_ceiling)?;
        let key = key_of(candidate);
        if !guard.contains(&key) {
            guard.insert(key);
            return Ok(Some(candidate));
        }
        working.retain(|&member| member != candidate);
    }
    warn!(
        "no unique candidate left in {} pool for record {}; slot degraded",
        kind.table_name(),
        index
    );
    Ok(None)
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
    fn constrained_substitution_never_introduces_duplicates() {
        let catalog = priced_catalog(&[10, 20, 30, 40, 50]);
        let mut ctx = RunContext::new(21);
        let pool = ctx.pool(&catalog, EntityKind::Item).unwrap();
        let mut guard: UniquenessGuard<usize> = UniquenessGuard::new(false);
        let mut picked = Vec::new();
        for index in 0..5 {
            if let Some(chosen) = substitute_unique(
                &mut ctx,
                &catalog,
                EntityKind::Item,
                index,
                &pool,
                1.0,
                None,
                &mut guard,
                |c| c,
            )
            .unwrap()
            {
                picked.push(chosen);
            }
        }
        let mut dedup = picked.clone();
        dedup.sort_unstable();
        dedup.dedup();
        assert_eq!(dedup.len(), picked.len());
    }

    #[test]
    fn exhausted_pool_degrades_to_none() {
        let catalog = priced_catalog(&[10, 20]);
        let mut ctx = RunContext::new(3);
        let pool = ctx.pool(&catalog, EntityKind::Item).unwrap();
        let mut guard: UniquenessGuard<usize> = UniquenessGuard::new(false);
        guard.insert(0);
        guard.insert(1);
        let out = substitute_unique(
            &mut ctx,
            &catalog,
            EntityKind::Item,
            0,
            &pool,
            1.0,
            None,
            &mut guard,
            |c| c,
        )
        .unwrap();
        assert_eq!(out, None);
    }

    #[test]
    fn original_duplicates_keep_duplicates_permitted() {
        assert!(UniquenessGuard::originals_had_duplicates(&[3usize, 5, 3]));
        assert!(!UniquenessGuard::originals_had_duplicates(&[1usize, 2, 3]));

        let mut guard: UniquenessGuard<usize> = UniquenessGuard::new(true);
        guard.insert(4);
        assert!(!guard.contains(&4));
    }

    #[test]
    fn quota_caps_per_category_picks() {
        let mut quota = CategoryQuota::new(2);
        assert!(quota.try_admit(0));
        assert!(quota.try_admit(0));
        assert!(!quota.try_admit(0));
        assert!(quota.try_admit(1));
    }

    #[test]
    fn empty_filtered_pool_widens_to_default() {
        let widened = pool_with_fallback(vec![], vec![7, 8]);
        assert_eq!(widened, vec![7, 8]);
        let kept = pool_with_fallback(vec![1], vec![7, 8]);
        assert_eq!(kept, vec![1]);
    }
}
