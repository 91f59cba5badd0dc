use std::collections::HashMap;

use crate::catalog::{Catalog, EntityKind};
use crate::{RandomizerError, Result};

/// Groups byte-identical original records: each record maps to the earliest
/// index carrying the same original-field fingerprint. Processing ascending
/// by index means every adopted representative is already resolved, so the
/// representative chain never increases an index and cannot cycle.
pub(crate) fn classify(catalog: &Catalog, kind: EntityKind) -> Vec<usize> {
    let records = catalog.records(kind);
    let mut first_seen: HashMap<&[i64], usize> = HashMap::new();
    let mut representatives = Vec::with_capacity(records.len());
    for record in records {
        let rep = *first_seen.entry(record.fingerprint()).or_insert(record.index);
        representatives.push(rep);
    }
    representatives
}

/// A cluster root must be its own representative; anything else means the
/// cached assignment was corrupted or computed out of order.
pub(crate) fn verify(kind: EntityKind, representatives: &[usize]) -> Result<()> {
    for (index, &rep) in representatives.iter().enumerate() {
        if rep > index {
            return Err(RandomizerError::Precondition(format!(
                "{} record {index} has later-index representative {rep}",
                kind.table_name()
            )));
        }
        if representatives[rep] != rep {
            return Err(RandomizerError::Precondition(format!(
                "{} cluster root {rep} is not itself canonical",
                kind.table_name()
            )));
        }
    }
    Ok(())
}

/// Cleanup side of clustering: every non-representative record's current
/// fields are overwritten to match its representative's, keeping duplicate
/// variants synchronized after mutation.
pub(crate) fn sync_duplicates(
    catalog: &mut Catalog,
    kind: EntityKind,
    representatives: &[usize],
) -> Result<()> {
    for (index, &rep) in representatives.iter().enumerate() {
        if rep == index {
            continue;
        }
        let values = catalog.record(kind, rep)?.current_values().to_vec();
        catalog.record_mut(kind, index)?.overwrite_current(values);
    }
    Ok(())
}
