use tracing::debug;

use super::types::{Allocation, AssetClass};

const TARGET_TOTAL: i64 = 100;
const TOTAL_EPSILON: f64 = 0.01;

fn usable_weight(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}

/// Turns raw slider/profile weights into whole percentages summing to 100.
///
/// Excluded classes stay in the output at zero. When nothing is left to
/// allocate the fallback is returned as given.
pub fn normalize_allocation(
    raw: &Allocation,
    excluded: &[AssetClass],
    fallback: &Allocation,
) -> Allocation {
    let weights: Vec<(&AssetClass, f64)> = raw
        .iter()
        .map(|(class, weight)| {
            if excluded.contains(class) {
                (class, 0.0)
            } else {
                (class, usable_weight(weight))
            }
        })
        .collect();
    let usable: Vec<f64> = weights.iter().map(|(_, w)| *w).collect();

    let Some(shares) = proportional_shares(&usable, TARGET_TOTAL as f64) else {
        debug!(classes = raw.len(), "nothing left to allocate, using fallback allocation");
        return fallback.clone();
    };

    // Overflows to infinity for huge weights, which still takes the rescale path.
    let total: f64 = usable.iter().sum();
    let scaled = if (total - TARGET_TOTAL as f64).abs() > TOTAL_EPSILON {
        debug!(total, "rescaling allocation to 100");
        shares
    } else {
        usable
    };

    let mut values: Vec<i64> = scaled.iter().map(|w| whole_percent(*w)).collect();
    let eligible: Vec<bool> = weights.iter().map(|(_, w)| *w > 0.0).collect();
    settle_rounding_drift(&mut values, &eligible);

    Allocation::from_pairs(
        weights
            .iter()
            .zip(values)
            .map(|((class, _), value)| ((*class).clone(), value as f64)),
    )
}

/// Splits `target` across `weights` in proportion to them. Weights are
/// divided by the largest one first, so neither a sum past `f64::MAX` nor a
/// subnormal sum can overflow. `None` when every weight is zero.
fn proportional_shares(weights: &[f64], target: f64) -> Option<Vec<f64>> {
    let largest = weights.iter().copied().fold(0.0, f64::max);
    if largest <= 0.0 {
        return None;
    }
    let ratios: Vec<f64> = weights.iter().map(|w| w / largest).collect();
    let ratio_total: f64 = ratios.iter().sum();
    Some(ratios.iter().map(|r| r * target / ratio_total).collect())
}

fn whole_percent(value: f64) -> i64 {
    value.round().clamp(0.0, TARGET_TOTAL as f64) as i64
}

/// Moves one slider to `value` and rebalances the rest around it.
///
/// The other classes keep their current proportions and share `100 - value`;
/// if they are all zero they split it evenly. A class not present in
/// `previous` is appended.
pub fn rebalance_allocation(previous: &Allocation, changed: &AssetClass, value: f64) -> Allocation {
    let pinned_value = if value.is_finite() {
        value.clamp(0.0, TARGET_TOTAL as f64).round()
    } else {
        0.0
    };

    let mut entries: Vec<(AssetClass, f64)> = previous
        .iter()
        .map(|(class, weight)| (class.clone(), usable_weight(weight)))
        .collect();
    let pinned = match entries.iter().position(|(class, _)| class == changed) {
        Some(idx) => idx,
        None => {
            entries.push((changed.clone(), 0.0));
            entries.len() - 1
        }
    };

    let other_count = entries.len() - 1;
    if other_count == 0 {
        return Allocation::from_pairs([(changed.clone(), TARGET_TOTAL as f64)]);
    }

    let remainder = TARGET_TOTAL as f64 - pinned_value;
    let others: Vec<f64> = entries
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != pinned)
        .map(|(_, (_, w))| *w)
        .collect();
    let mut shares = proportional_shares(&others, remainder).map(Vec::into_iter);

    let mut values = Vec::with_capacity(entries.len());
    let mut eligible = Vec::with_capacity(entries.len());
    for (idx, (_, weight)) in entries.iter().enumerate() {
        if idx == pinned {
            values.push(pinned_value as i64);
            eligible.push(false);
        } else if let Some(share) = shares.as_mut().and_then(|s| s.next()) {
            values.push(whole_percent(share));
            eligible.push(*weight > 0.0);
        } else {
            values.push(whole_percent(remainder / other_count as f64));
            eligible.push(true);
        }
    }
    settle_rounding_drift(&mut values, &eligible);

    Allocation::from_pairs(
        entries
            .into_iter()
            .zip(values)
            .map(|((class, _), value)| (class, value as f64)),
    )
}

/// Pushes the gap between the rounded sum and 100 onto the largest eligible
/// class, first in order among ties. A class is never taken below zero; any
/// leftover moves on to the next largest.
fn settle_rounding_drift(values: &mut [i64], eligible: &[bool]) {
    let mut diff = TARGET_TOTAL - values.iter().sum::<i64>();
    while diff != 0 {
        let Some(idx) = largest_eligible(values, eligible, diff < 0) else {
            break;
        };
        let adjusted = values[idx] + diff;
        if adjusted < 0 {
            values[idx] = 0;
            diff = adjusted;
        } else {
            values[idx] = adjusted;
            diff = 0;
        }
    }
}

fn largest_eligible(values: &[i64], eligible: &[bool], needs_positive: bool) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (idx, value) in values.iter().enumerate() {
        if !eligible[idx] || (needs_positive && *value <= 0) {
            continue;
        }
        if best.is_none_or(|b| *value > values[b]) {
            best = Some(idx);
        }
    }
    best
}
