use rand::{rngs::StdRng, Rng};

use crate::{RandomizerError, Result};

/// Consecutive rejected moves tolerated before the search stops best-effort.
pub(crate) const STAGNATION_CEILING: usize = 20;

/// Accepted moves are also bounded, so a bundle that keeps churning without
/// reaching the target still terminates.
const ITERATION_CEILING: usize = 10_000;

pub(crate) const QTY_MIN: i64 = 1;
pub(crate) const QTY_MAX: i64 = 9;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct BundleSlot {
    pub item: usize,
    pub qty: i64,
}

#[derive(Debug)]
pub(crate) struct BalanceOutcome {
    pub slots: Vec<BundleSlot>,
    pub total: i64,
    pub best_effort: bool,
}

/// Iterative randomized search assembling a fixed-size bundle of
/// (candidate, quantity) slots whose aggregate value reaches `target`.
/// Candidates come from `pool` (record index, unit value), filtered to at
/// most twice the target and drawn by inverse-power sampling over the
/// value-sorted list, so low strength biases toward the cheapest members.
/// A drawn candidate already in the bundle gains quantity; otherwise it
/// replaces a uniformly chosen slot with a quantity approximating the
/// evicted sub-value. Moves leaving a quantity outside 1..=9 are rejected.
pub(crate) fn balance(
    rng: &mut StdRng,
    initial: Vec<BundleSlot>,
    target: i64,
    pool: &[(usize, i64)],
    strength: f64,
) -> Result<BalanceOutcome> {
    if initial.is_empty() {
        return Err(RandomizerError::Precondition(
            "balance requires at least one bundle slot".to_string(),
        ));
    }
    let mut candidates: Vec<(usize, i64)> = pool
        .iter()
        .copied()
        .filter(|&(_, value)| value > 0 && value <= target.saturating_mul(2))
        .collect();
    candidates.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));
    if candidates.is_empty() {
        return Err(RandomizerError::EmptyPool("balance candidates"));
    }

    // Slots are valued from the unfiltered pool: an initial item above the
    // filter cap still counts toward the running total instead of sitting
    // in the bundle as a zero-valued slot that can never be evicted.
    let value_of = |item: usize| -> i64 {
        pool.iter()
            .find(|&&(member, _)| member == item)
            .map(|&(_, value)| value)
            .unwrap_or(0)
    };

    let mut slots = initial;
    let mut stagnation = 0usize;

    for _ in 0..ITERATION_CEILING {
        let total: i64 = slots.iter().map(|s| s.qty * value_of(s.item)).sum();
        if total >= target {
            return Ok(BalanceOutcome {
                slots,
                total,
                best_effort: false,
            });
        }
        if stagnation >= STAGNATION_CEILING {
            break;
        }

        let draw: f64 = rng.gen();
        let position = if strength <= 0.0 {
            0
        } else {
            let scaled = draw.powf(1.0 / strength) * (candidates.len() - 1) as f64;
            (scaled.round() as usize).min(candidates.len() - 1)
        };
        let (item, value) = candidates[position];

        if let Some(slot) = slots.iter_mut().find(|s| s.item == item) {
            if slot.qty + 1 > QTY_MAX {
                stagnation += 1;
                continue;
            }
            slot.qty += 1;
            stagnation = 0;
            continue;
        }

        let evicted = rng.gen_range(0..slots.len());
        let evicted_value = slots[evicted].qty * value_of(slots[evicted].item);
        let qty = ((evicted_value as f64 / value as f64).round()) as i64;
        if !(QTY_MIN..=QTY_MAX).contains(&qty) {
            stagnation += 1;
            continue;
        }
        slots[evicted] = BundleSlot { item, qty };
        stagnation = 0;
    }

    let total: i64 = slots.iter().map(|s| s.qty * value_of(s.item)).sum();
    Ok(BalanceOutcome {
        slots,
        total,
        best_effort: true,
    })
}
