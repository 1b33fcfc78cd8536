//! Frequency aggregation over the active rules.
//!
//! The result is a weighted mean of `spawn_frequency`, where each rule's
//! weight is `spawn_weight * entity_count`. A rule listing more entities
//! contributes proportionally more, matching the extra candidates it adds
//! to selection. Weights are divided by the heaviest active weight before
//! summing, which keeps the sums finite without changing the mean.

use std::sync::Arc;

use wavespawn_types::SpawnRule;

/// Multiplier returned when no rule has any weight.
pub const NEUTRAL_FREQUENCY: f64 = 1.0;

/// Weighted mean spawn frequency of `active`.
///
/// Returns [`NEUTRAL_FREQUENCY`] when `active` is empty or the total weight
/// is zero. Otherwise the result is a convex combination and lies within
/// the minimum and maximum frequencies of `active`.
pub fn average_frequency(active: &[Arc<SpawnRule>]) -> f64 {
    let mut scale = 0.0_f64;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for rule in active {
        scale = scale.max(rule.spawn_weight());
        min = min.min(rule.spawn_frequency());
        max = max.max(rule.spawn_frequency());
    }
    if scale <= 0.0 {
        return NEUTRAL_FREQUENCY;
    }

    // Both weights and frequencies are taken relative to their maximum so
    // neither sum can overflow.
    let mut weight_sum = 0.0_f64;
    let mut weighted_sum = 0.0_f64;
    for rule in active {
        let entity_count = u32::try_from(rule.entity_type_ids().len()).unwrap_or(u32::MAX);
        let weight = rule.spawn_weight() / scale * f64::from(entity_count);
        weight_sum += weight;
        weighted_sum += weight * (rule.spawn_frequency() / max);
    }

    let mean = weighted_sum / weight_sum * max;
    if mean.is_finite() {
        // Rounding can push the result a hair outside the convex hull.
        mean.clamp(min, max)
    } else {
        NEUTRAL_FREQUENCY
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use wavespawn_types::{EntityTypeId, RuleEnd, RuleId, SpawnRuleParts};

    use super::*;

    fn rule(id: u32, entities: &[u32], weight: f64, frequency: f64) -> Arc<SpawnRule> {
        Arc::new(
            SpawnRule::new(SpawnRuleParts {
                id: RuleId(id),
                start_time: 0,
                end_time: RuleEnd::At(30),
                entity_type_ids: entities.iter().copied().map(EntityTypeId).collect(),
                spawn_weight: weight,
                spawn_frequency: frequency,
                strength_multiplier: 1.0,
                size_multiplier: 1.0,
                enabled: true,
                description: String::new(),
            })
            .unwrap(),
        )
    }

    #[test]
    fn empty_is_neutral() {
        assert_eq!(average_frequency(&[]), 1.0);
    }

    #[test]
    fn all_zero_weight_is_neutral() {
        let active = [rule(1, &[1], 0.0, 5.0), rule(2, &[2, 3], 0.0, 3.0)];
        assert_eq!(average_frequency(&active), 1.0);
    }

    #[test]
    fn single_rule_returns_its_frequency() {
        assert_eq!(average_frequency(&[rule(1, &[1, 2, 3], 0.4, 2.5)]), 2.5);
    }

    #[test]
    fn entity_count_scales_contribution() {
        // (0.8*2*5.0 + 0.2*1*1.0) / (0.8*2 + 0.2*1) = 8.2 / 1.8
        let active = [rule(1, &[1, 2], 0.8, 5.0), rule(2, &[3], 0.2, 1.0)];
        let avg = average_frequency(&active);
        assert!((avg - 8.2 / 1.8).abs() < 1e-12, "got {avg}");
    }

    #[test]
    fn extreme_weights_keep_mean_in_bounds() {
        assert_eq!(average_frequency(&[rule(1, &[1, 2], 1e308, 5.0)]), 5.0);

        let active = [rule(1, &[1, 2], 8e307, 5.0), rule(2, &[3], 2e307, 1.0)];
        let avg = average_frequency(&active);
        assert!((avg - 8.2 / 1.8).abs() < 1e-9, "got {avg}");
    }

    #[test]
    fn extreme_frequencies_keep_mean_in_bounds() {
        let active = [rule(1, &[1, 2], 1.0, 1e308), rule(2, &[3], 1.0, 1e307)];
        let avg = average_frequency(&active);
        assert!(avg.is_finite());
        assert!((1e307..=1e308).contains(&avg), "got {avg}");
    }

    #[test]
    fn zero_weight_rule_does_not_pull_mean() {
        let active = [rule(1, &[1], 1.0, 2.0), rule(2, &[2], 0.0, 100.0)];
        let avg = average_frequency(&active);
        assert!((avg - 2.0).abs() < 1e-12, "got {avg}");
    }

    #[test]
    fn result_stays_within_bounds() {
        let weights = [0.0, 0.1, 0.33, 1.0, 7.5];
        let freqs = [0.25, 1.0, 3.0, 9.9];
        for (i, &w1) in weights.iter().enumerate() {
            for &w2 in &weights {
                for &f1 in &freqs {
                    for &f2 in &freqs {
                        let active = [rule(1, &[1, 2], w1, f1), rule(2, &[3], w2, f2)];
                        let avg = average_frequency(&active);
                        if w1 + w2 > 0.0 {
                            assert!(
                                avg >= f1.min(f2) && avg <= f1.max(f2),
                                "case {i}: {avg} outside [{f1}, {f2}]"
                            );
                        }
                    }
                }
            }
        }
    }
}
