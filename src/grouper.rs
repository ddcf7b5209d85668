//! Best-fit grouping engine.
//!
//! Builds combos whose total weight lands in `[target, target * CEILING_RATIO]`
//! with as little overshoot as possible. The algorithm is a deterministic,
//! bounded-lookahead greedy heuristic, not an optimal bin packer:
//!
//! 1. Sort all candidates ascending by weight, once per run (stable sort, so
//!    equal weights keep their input order).
//! 2. Each outer pass scans every start index of the ordered remaining view.
//!    A trial extends forward, stopping at the first item that would breach
//!    the ceiling and exiting early once the total reaches the target.
//! 3. The smallest qualifying trial wins the pass (first discovery wins
//!    ties) and its members are committed; a pass without any qualifying
//!    trial ends the run and everything still unplaced becomes a leftover.
//!
//! Worst case O(n^3) over the shrinking remainder. The scan order is part of
//! the contract: identical input always yields the identical partition.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::model::{Combo, Item, RunResult, ValidationError};

/// Ceiling multiplier: a combo's running total may not exceed
/// `target * CEILING_RATIO`. Fixed by policy, not configurable.
pub const CEILING_RATIO: f64 = 1.5;

/// Upper bound a combo total may not exceed for the given target.
#[inline]
pub fn ceiling_for(target: f64) -> f64 {
    target * CEILING_RATIO
}

/// Checks the grouping precondition: the target must be a positive finite
/// number. Violations are caller-input errors, raised before any grouping
/// work starts.
pub fn validate_target(target: f64) -> Result<(), ValidationError> {
    if !target.is_finite() || target <= 0.0 {
        return Err(ValidationError::InvalidTarget(format!(
            "must be a positive finite number, got: {}",
            target
        )));
    }
    Ok(())
}

/// Why a leftover item could not be placed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeftoverReason {
    /// The item alone already exceeds the ceiling; no combo can ever hold it.
    ExceedsCeiling,
    /// No reachable combination of remaining items hit the target band.
    NoFittingCombo,
}

impl LeftoverReason {
    pub fn code(&self) -> &'static str {
        match self {
            LeftoverReason::ExceedsCeiling => "exceeds_ceiling",
            LeftoverReason::NoFittingCombo => "no_fitting_combo",
        }
    }
}

impl std::fmt::Display for LeftoverReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeftoverReason::ExceedsCeiling => {
                write!(f, "Item weight alone exceeds the combo ceiling")
            }
            LeftoverReason::NoFittingCombo => {
                write!(f, "No remaining combination reaches the target weight")
            }
        }
    }
}

/// Classifies a leftover item for reporting purposes.
pub fn classify_leftover(item: &Item, target: f64) -> LeftoverReason {
    if item.weight > ceiling_for(target) {
        LeftoverReason::ExceedsCeiling
    } else {
        LeftoverReason::NoFittingCombo
    }
}

/// Events emitted while grouping, suitable for live streaming (SSE).
#[derive(Clone, Debug, serde::Serialize)]
#[serde(tag = "type")]
pub enum GroupEvent {
    /// Grouping begins.
    Started {
        candidates: usize,
        target: f64,
        ceiling: f64,
    },
    /// A combo was committed.
    ComboCommitted {
        index: usize,
        total_weight: f64,
        item_count: usize,
        item_ids: Vec<String>,
    },
    /// An item could not be placed in any combo.
    ItemLeftOver {
        id: String,
        weight: f64,
        reason_code: String,
        reason_text: String,
    },
    /// Grouping finished.
    Finished { combos: usize, leftovers: usize },
}

/// Groups candidate items against the target weight.
///
/// # Parameters
/// * `items` - Candidate items (eligibility-filtered); may be empty
/// * `target` - Target weight per combo, must be positive and finite
///
/// # Returns
/// The `RunResult` partition: combos in commitment order plus leftovers.
pub fn group_items(items: Vec<Item>, target: f64) -> Result<RunResult, ValidationError> {
    group_items_with_progress(items, target, |_| {})
}

/// Grouping with a live progress callback.
///
/// Calls `on_event` for every committed combo and every leftover item. Event
/// emission is observational only and never influences the partition.
pub fn group_items_with_progress(
    items: Vec<Item>,
    target: f64,
    mut on_event: impl FnMut(&GroupEvent),
) -> Result<RunResult, ValidationError> {
    validate_target(target)?;
    let ceiling = ceiling_for(target);

    // One stable ascending sort for the whole run; only the remaining view
    // shrinks between passes, relative order never changes.
    let mut sorted = items;
    sorted.sort_by(|a, b| a.weight.partial_cmp(&b.weight).unwrap_or(Ordering::Equal));

    on_event(&GroupEvent::Started {
        candidates: sorted.len(),
        target,
        ceiling,
    });

    let mut used: HashSet<String> = HashSet::new();
    let mut combos: Vec<Combo> = Vec::new();

    loop {
        let remaining: Vec<&Item> = sorted.iter().filter(|it| !used.contains(&it.id)).collect();
        if remaining.is_empty() {
            break;
        }

        // Scan every start index; keep the smallest qualifying total. The
        // strict comparison makes the first discovery win ties.
        let mut best: Option<(Vec<usize>, f64)> = None;
        for start in 0..remaining.len() {
            let mut trial: Vec<usize> = Vec::new();
            let mut total = 0.0;

            for idx in start..remaining.len() {
                let weight = remaining[idx].weight;
                if total + weight > ceiling {
                    break;
                }
                trial.push(idx);
                total += weight;
                if total >= target {
                    break;
                }
            }

            if total >= target && best.as_ref().is_none_or(|(_, bw)| total < *bw) {
                best = Some((trial, total));
            }
        }

        let Some((member_indices, total_weight)) = best else {
            // No start index reaches the target under the ceiling; every
            // remaining item is a leftover.
            break;
        };

        let members: Vec<Item> = member_indices
            .into_iter()
            .map(|idx| remaining[idx])
            .cloned()
            .collect();
        for member in &members {
            used.insert(member.id.clone());
        }

        let combo = Combo {
            items: members,
            total_weight,
        };
        on_event(&GroupEvent::ComboCommitted {
            index: combos.len() + 1,
            total_weight: combo.total_weight,
            item_count: combo.item_count(),
            item_ids: combo.item_ids(),
        });
        combos.push(combo);
    }

    let leftovers: Vec<Item> = sorted
        .into_iter()
        .filter(|it| !used.contains(&it.id))
        .collect();

    for item in &leftovers {
        let reason = classify_leftover(item, target);
        on_event(&GroupEvent::ItemLeftOver {
            id: item.id.clone(),
            weight: item.weight,
            reason_code: reason.code().to_string(),
            reason_text: reason.to_string(),
        });
    }
    on_event(&GroupEvent::Finished {
        combos: combos.len(),
        leftovers: leftovers.len(),
    });

    Ok(RunResult { combos, leftovers })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    const TARGET: f64 = 1300.0;

    fn items(pairs: &[(&str, f64)]) -> Vec<Item> {
        pairs
            .iter()
            .map(|(id, weight)| Item::new(None, *id, *weight).unwrap())
            .collect()
    }

    fn ids(combo: &Combo) -> Vec<&str> {
        combo.items.iter().map(|it| it.id.as_str()).collect()
    }

    #[test]
    fn single_heavy_item_forms_its_own_combo() {
        let result = group_items(items(&[("A", 10.0), ("B", 1300.0)]), TARGET).unwrap();

        assert_eq!(result.combo_count(), 1);
        assert_eq!(ids(&result.combos[0]), vec!["B"]);
        assert_eq!(result.combos[0].total_weight, 1300.0);
        assert_eq!(result.leftovers.len(), 1);
        assert_eq!(result.leftovers[0].id, "A");
    }

    #[test]
    fn two_items_combine_under_the_ceiling() {
        let result = group_items(items(&[("A", 700.0), ("B", 700.0)]), TARGET).unwrap();

        assert_eq!(result.combo_count(), 1);
        assert_eq!(result.combos[0].total_weight, 1400.0);
        assert!(result.is_complete());
    }

    #[test]
    fn pair_breaching_the_ceiling_is_never_committed() {
        // 1000 alone < target; 1000 + 1000 = 2000 > 1950.
        let result = group_items(items(&[("A", 1000.0), ("B", 1000.0)]), TARGET).unwrap();

        assert!(result.combos.is_empty());
        assert_eq!(result.leftover_count(), 2);
    }

    #[test]
    fn four_equal_items_form_one_combo() {
        let result = group_items(
            items(&[("A", 400.0), ("B", 400.0), ("C", 400.0), ("D", 400.0)]),
            TARGET,
        )
        .unwrap();

        assert_eq!(result.combo_count(), 1);
        assert_eq!(result.combos[0].total_weight, 1600.0);
        assert!(result.is_complete());
    }

    #[test]
    fn empty_input_yields_empty_partition() {
        let result = group_items(Vec::new(), TARGET).unwrap();
        assert!(result.combos.is_empty());
        assert!(result.leftovers.is_empty());
    }

    #[test]
    fn non_positive_target_is_rejected_before_grouping() {
        assert!(group_items(items(&[("A", 100.0)]), 0.0).is_err());
        assert!(group_items(items(&[("A", 100.0)]), -5.0).is_err());
        assert!(group_items(items(&[("A", 100.0)]), f64::NAN).is_err());
        assert!(group_items(items(&[("A", 100.0)]), f64::INFINITY).is_err());
    }

    #[test]
    fn best_fit_prefers_smaller_overshoot_over_scan_order() {
        // Ascending order: 100, 700, 800, 900. The first start index reaches
        // 1600 (100+700+800); starting at 700 reaches 1500, which is closer
        // to the target and must win the pass.
        let result = group_items(
            items(&[("H7", 700.0), ("H8", 800.0), ("H9", 900.0), ("L", 100.0)]),
            TARGET,
        )
        .unwrap();

        assert_eq!(result.combo_count(), 1);
        assert_eq!(ids(&result.combos[0]), vec!["H7", "H8"]);
        assert_eq!(result.combos[0].total_weight, 1500.0);
        let leftover_ids: Vec<_> = result.leftovers.iter().map(|it| it.id.as_str()).collect();
        assert_eq!(leftover_ids, vec!["L", "H9"]);
    }

    #[test]
    fn equal_totals_resolve_to_the_first_discovery() {
        // Both [600, 700] and [1300] total exactly 1300; the scan finds the
        // pair first (start index 0) and must keep it.
        let result = group_items(items(&[("P6", 600.0), ("P7", 700.0), ("S", 1300.0)]), TARGET)
            .unwrap();

        assert_eq!(result.combo_count(), 2);
        assert_eq!(ids(&result.combos[0]), vec!["P6", "P7"]);
        assert_eq!(ids(&result.combos[1]), vec!["S"]);
        assert!(result.is_complete());
    }

    #[test]
    fn equal_weights_keep_input_order() {
        let result = group_items(
            items(&[("First", 650.0), ("Second", 650.0), ("Third", 650.0)]),
            TARGET,
        )
        .unwrap();

        assert_eq!(result.combo_count(), 1);
        assert_eq!(ids(&result.combos[0]), vec!["First", "Second"]);
        assert_eq!(result.leftovers[0].id, "Third");
    }

    #[test]
    fn partition_covers_all_candidates_exactly_once() {
        let input = items(&[
            ("A", 320.5),
            ("B", 411.25),
            ("C", 702.0),
            ("D", 1299.99),
            ("E", 88.1),
            ("F", 655.4),
            ("G", 1951.0),
            ("H", 540.0),
        ]);
        let all_ids: BTreeSet<String> = input.iter().map(|it| it.id.clone()).collect();

        let result = group_items(input, TARGET).unwrap();

        let mut seen: BTreeSet<String> = BTreeSet::new();
        for item in result.grouped_items().chain(result.leftovers.iter()) {
            assert!(seen.insert(item.id.clone()), "duplicate id {}", item.id);
        }
        assert_eq!(seen, all_ids);
    }

    #[test]
    fn every_combo_total_stays_in_the_target_band() {
        let input = items(&[
            ("A", 120.0),
            ("B", 433.33),
            ("C", 650.0),
            ("D", 700.0),
            ("E", 810.45),
            ("F", 905.0),
            ("G", 1250.0),
            ("H", 400.0),
            ("I", 333.12),
        ]);

        let result = group_items(input, TARGET).unwrap();
        assert!(result.combo_count() >= 1);
        for combo in &result.combos {
            assert!(combo.total_weight >= TARGET);
            assert!(combo.total_weight <= ceiling_for(TARGET));
        }
    }

    #[test]
    fn identical_input_yields_identical_partition() {
        let pairs = [
            ("A", 320.5),
            ("B", 411.25),
            ("C", 702.0),
            ("D", 1299.99),
            ("E", 88.1),
            ("F", 655.4),
            ("H", 540.0),
        ];

        let first = group_items(items(&pairs), TARGET).unwrap();
        let second = group_items(items(&pairs), TARGET).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn no_leftover_subset_could_still_reach_the_target() {
        let input = items(&[
            ("A", 500.0),
            ("B", 600.0),
            ("C", 1000.0),
            ("D", 2000.0),
        ]);

        let result = group_items(input, TARGET).unwrap();

        // Brute-force every non-empty subset of the leftovers.
        let leftovers = &result.leftovers;
        for mask in 1..(1u32 << leftovers.len()) {
            let total: f64 = leftovers
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, it)| it.weight)
                .sum();
            assert!(
                total < TARGET || total > ceiling_for(TARGET),
                "leftover subset {:#b} would form a valid combo ({})",
                mask,
                total
            );
        }
    }

    #[test]
    fn oversized_single_item_is_classified_as_ceiling_breach() {
        let heavy = Item::new(None, "X", 2000.0).unwrap();
        let light = Item::new(None, "Y", 10.0).unwrap();

        assert_eq!(
            classify_leftover(&heavy, TARGET),
            LeftoverReason::ExceedsCeiling
        );
        assert_eq!(
            classify_leftover(&light, TARGET),
            LeftoverReason::NoFittingCombo
        );
    }

    #[test]
    fn progress_events_mirror_the_partition() {
        let mut committed = 0usize;
        let mut leftover_events = 0usize;
        let mut finished: Option<(usize, usize)> = None;

        let result = group_items_with_progress(
            items(&[("A", 700.0), ("B", 700.0), ("C", 10.0)]),
            TARGET,
            |event| match event {
                GroupEvent::Started { candidates, .. } => assert_eq!(*candidates, 3),
                GroupEvent::ComboCommitted { .. } => committed += 1,
                GroupEvent::ItemLeftOver { .. } => leftover_events += 1,
                GroupEvent::Finished { combos, leftovers } => {
                    finished = Some((*combos, *leftovers));
                }
            },
        )
        .unwrap();

        assert_eq!(committed, result.combo_count());
        assert_eq!(leftover_events, result.leftover_count());
        assert_eq!(
            finished,
            Some((result.combo_count(), result.leftover_count()))
        );
    }

    #[test]
    fn repeated_passes_drain_the_pool() {
        // Enough material for three combos plus a remainder.
        let input = items(&[
            ("A", 650.0),
            ("B", 660.0),
            ("C", 670.0),
            ("D", 680.0),
            ("E", 690.0),
            ("F", 700.0),
            ("G", 100.0),
        ]);

        let result = group_items(input, TARGET).unwrap();
        assert_eq!(result.combo_count(), 3);
        assert_eq!(result.grouped_item_count(), 6);
        assert_eq!(result.leftover_count(), 1);
        assert_eq!(result.leftovers[0].id, "G");
    }
}
