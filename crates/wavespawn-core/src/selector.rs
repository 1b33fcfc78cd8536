//! Weighted selection of one (entity type, rule) candidate.
//!
//! Every active rule contributes one candidate per listed entity type, each
//! carrying the rule's full `spawn_weight` (the weight is not split across
//! the list). Candidate `i` is drawn with probability
//! `weight_i / sum(weight_j)`, so scaling every weight by the same positive
//! constant leaves the distribution unchanged.
//!
//! Draws use a cumulative weight table and a binary search, O(log n) per
//! draw. Weights enter the table divided by the heaviest active weight, so
//! the sums stay finite for any valid weights and a uniform scaling of the
//! table leaves it unchanged. The random source is always passed in by the
//! caller.

use std::sync::Arc;

use rand::Rng;
use serde::Serialize;
use wavespawn_types::{EntityTypeId, Modifiers, RuleId, SpawnRule};

/// Why a [`Selection`] came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionOutcome {
    /// A rule candidate was drawn.
    Rule,
    /// Rules are loaded but none can be drawn at this time.
    NoActiveRule,
    /// The engine holds no usable rule set (never loaded or last reload
    /// failed).
    Unavailable,
}

impl SelectionOutcome {
    /// Label for logs and reports.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::NoActiveRule => "no_active_rule",
            Self::Unavailable => "unavailable",
        }
    }
}

/// Result of one spawn decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Entity type to instantiate.
    pub entity_type_id: EntityTypeId,
    /// Rule that produced the candidate, `None` for a fallback.
    pub rule: Option<Arc<SpawnRule>>,
    /// How the decision was reached.
    pub outcome: SelectionOutcome,
}

impl Selection {
    /// A fallback decision for the default entity type.
    pub const fn fallback(default_entity_type: EntityTypeId, outcome: SelectionOutcome) -> Self {
        Self {
            entity_type_id: default_entity_type,
            rule: None,
            outcome,
        }
    }

    /// Stat modifiers for the spawned entity.
    pub fn modifiers(&self) -> Modifiers {
        modifiers(self.rule.as_deref())
    }

    /// Id of the originating rule, if any.
    pub fn rule_id(&self) -> Option<RuleId> {
        self.rule.as_ref().map(|r| r.id())
    }

    /// Whether no rule was involved.
    pub const fn is_fallback(&self) -> bool {
        self.rule.is_none()
    }
}

/// Strength and size multipliers of `rule`, neutral for `None`.
pub fn modifiers(rule: Option<&SpawnRule>) -> Modifiers {
    Modifiers::for_rule(rule)
}

/// One drawable entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Entity type this entry spawns.
    pub entity_type_id: EntityTypeId,
    /// Rule the entry came from.
    pub rule: Arc<SpawnRule>,
}

impl Candidate {
    /// Draw weight of this entry.
    pub fn weight(&self) -> f64 {
        self.rule.spawn_weight()
    }
}

/// Candidates of an active rule set with their cumulative weights.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateTable {
    candidates: Vec<Candidate>,
    /// `cumulative[i]` is the sum of scaled weights of candidates `0..=i`.
    cumulative: Vec<f64>,
    total: f64,
    /// Heaviest rule weight; every weight is divided by it.
    scale: f64,
}

impl CandidateTable {
    /// Expand `active` into candidates, in rule order then list order.
    pub fn build(active: &[Arc<SpawnRule>]) -> Self {
        let capacity = active.iter().map(|r| r.entity_type_ids().len()).sum();
        let mut candidates = Vec::with_capacity(capacity);
        let mut cumulative = Vec::with_capacity(capacity);
        let scale = active
            .iter()
            .map(|r| r.spawn_weight())
            .fold(0.0_f64, f64::max);
        let mut total = 0.0_f64;

        for rule in active {
            let weight = if scale > 0.0 {
                rule.spawn_weight() / scale
            } else {
                0.0
            };
            for &entity_type_id in rule.entity_type_ids() {
                total += weight;
                candidates.push(Candidate {
                    entity_type_id,
                    rule: Arc::clone(rule),
                });
                cumulative.push(total);
            }
        }

        Self {
            candidates,
            cumulative,
            total,
            scale,
        }
    }

    /// All candidates in draw-table order.
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Number of candidates.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Whether there are no candidates.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Sum of all candidate weights, relative to the heaviest rule weight.
    pub const fn total_weight(&self) -> f64 {
        self.total
    }

    /// Whether [`draw`](Self::draw) can return a candidate.
    pub fn is_drawable(&self) -> bool {
        !self.candidates.is_empty() && self.total.is_finite() && self.total > 0.0
    }

    /// Probability that candidate `index` is drawn.
    pub fn probability(&self, index: usize) -> Option<f64> {
        if !self.is_drawable() {
            return None;
        }
        self.candidates
            .get(index)
            .map(|c| c.weight() / self.scale / self.total)
    }

    /// Draw one candidate. Zero-weight candidates are never returned.
    ///
    /// Returns `None` when the table is not [drawable](Self::is_drawable).
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Candidate> {
        if !self.is_drawable() {
            return None;
        }
        let target = rng.random::<f64>() * self.total;
        // First entry whose cumulative weight exceeds the target.
        let index = self.cumulative.partition_point(|&c| c <= target);
        let index = if index < self.candidates.len() {
            index
        } else {
            // target rounded up to the total: take the last positive entry.
            self.cumulative.partition_point(|&c| c < self.total)
        };
        self.candidates.get(index)
    }
}

/// Draw a spawn decision from the active rules.
///
/// Falls back to `default_entity_type` with
/// [`SelectionOutcome::NoActiveRule`] when nothing is drawable: no active
/// rules, or active rules whose weights are all zero.
pub fn select<R: Rng + ?Sized>(
    active: &[Arc<SpawnRule>],
    default_entity_type: EntityTypeId,
    rng: &mut R,
) -> Selection {
    CandidateTable::build(active).draw(rng).map_or_else(
        || Selection::fallback(default_entity_type, SelectionOutcome::NoActiveRule),
        |candidate| Selection {
            entity_type_id: candidate.entity_type_id,
            rule: Some(Arc::clone(&candidate.rule)),
            outcome: SelectionOutcome::Rule,
        },
    )
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::float_cmp,
    clippy::indexing_slicing,
    clippy::cast_precision_loss
)]
mod tests {
    use std::collections::BTreeMap;

    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use wavespawn_types::{RuleEnd, SpawnRuleParts};

    use super::*;

    fn rule(id: u32, entities: &[u32], weight: f64) -> Arc<SpawnRule> {
        Arc::new(
            SpawnRule::new(SpawnRuleParts {
                id: RuleId(id),
                start_time: 0,
                end_time: RuleEnd::At(30),
                entity_type_ids: entities.iter().copied().map(EntityTypeId).collect(),
                spawn_weight: weight,
                spawn_frequency: 1.0,
                strength_multiplier: 1.0 + f64::from(id),
                size_multiplier: 0.5,
                enabled: true,
                description: String::new(),
            })
            .unwrap(),
        )
    }

    fn scenario() -> Vec<Arc<SpawnRule>> {
        vec![rule(1, &[1, 2], 0.8), rule(2, &[3], 0.2)]
    }

    #[test]
    fn candidates_repeat_rule_weight() {
        let table = CandidateTable::build(&scenario());
        let entries: Vec<_> = table
            .candidates()
            .iter()
            .map(|c| (c.entity_type_id.0, c.weight()))
            .collect();
        assert_eq!(entries, vec![(1, 0.8), (2, 0.8), (3, 0.2)]);
        // 1.0 + 1.0 + 0.25 once divided by the heaviest weight.
        assert!((table.total_weight() - 2.25).abs() < 1e-12);
    }

    #[test]
    fn scenario_probabilities() {
        let table = CandidateTable::build(&scenario());
        let p: Vec<f64> = (0..3).map(|i| table.probability(i).unwrap()).collect();
        assert!((p[0] - 0.8 / 1.8).abs() < 1e-12);
        assert!((p[1] - 0.8 / 1.8).abs() < 1e-12);
        assert!((p[2] - 0.2 / 1.8).abs() < 1e-12);
        assert_eq!(table.probability(3), None);
    }

    #[test]
    fn empirical_frequencies_converge() {
        let active = scenario();
        let mut rng = SmallRng::seed_from_u64(7);
        let mut counts: BTreeMap<u32, u32> = BTreeMap::new();
        let draws = 10_000_u32;
        for _ in 0..draws {
            let s = select(&active, EntityTypeId(0), &mut rng);
            *counts.entry(s.entity_type_id.0).or_default() += 1;
        }
        for (entity, expected) in [(1, 0.8 / 1.8), (2, 0.8 / 1.8), (3, 0.2 / 1.8)] {
            let observed = f64::from(counts.get(&entity).copied().unwrap_or(0)) / f64::from(draws);
            assert!(
                (observed - expected).abs() < 0.02,
                "entity {entity}: observed {observed}, expected {expected}"
            );
        }
    }

    #[test]
    fn scaling_weights_keeps_distribution() {
        let base = CandidateTable::build(&scenario());
        let scaled =
            CandidateTable::build(&[rule(1, &[1, 2], 0.8 * 37.5), rule(2, &[3], 0.2 * 37.5)]);
        for i in 0..base.len() {
            let (a, b) = (base.probability(i).unwrap(), scaled.probability(i).unwrap());
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn extreme_weights_stay_drawable() {
        let mut rng = SmallRng::seed_from_u64(8);
        let s = select(&[rule(1, &[1, 2], 1e308)], EntityTypeId(0), &mut rng);
        assert_eq!(s.outcome, SelectionOutcome::Rule);
        assert_eq!(s.rule_id(), Some(RuleId(1)));

        let base = CandidateTable::build(&scenario());
        let huge = CandidateTable::build(&[rule(1, &[1, 2], 8e307), rule(2, &[3], 2e307)]);
        assert!(huge.is_drawable());
        assert!(huge.total_weight().is_finite());
        for i in 0..base.len() {
            let (a, b) = (base.probability(i).unwrap(), huge.probability(i).unwrap());
            assert!((a - b).abs() < 1e-12, "candidate {i}: {a} vs {b}");
        }
    }

    #[test]
    fn power_of_two_scaling_gives_identical_draws() {
        // Multiplying by 4 is exact in binary floating point, so the same
        // seed must yield the very same sequence.
        let base = scenario();
        let scaled = vec![rule(1, &[1, 2], 3.2), rule(2, &[3], 0.8)];
        let mut rng_a = SmallRng::seed_from_u64(99);
        let mut rng_b = SmallRng::seed_from_u64(99);
        for _ in 0..1_000 {
            let a = select(&base, EntityTypeId(0), &mut rng_a);
            let b = select(&scaled, EntityTypeId(0), &mut rng_b);
            assert_eq!(a.entity_type_id, b.entity_type_id);
        }
    }

    #[test]
    fn zero_weight_candidates_never_drawn() {
        let active = vec![rule(1, &[1], 0.0), rule(2, &[2], 1.0), rule(3, &[3], 0.0)];
        let mut rng = SmallRng::seed_from_u64(3);
        for _ in 0..2_000 {
            assert_eq!(select(&active, EntityTypeId(0), &mut rng).entity_type_id.0, 2);
        }
    }

    #[test]
    fn empty_active_set_falls_back() {
        let mut rng = SmallRng::seed_from_u64(1);
        let s = select(&[], EntityTypeId(42), &mut rng);
        assert_eq!(s.entity_type_id, EntityTypeId(42));
        assert!(s.is_fallback());
        assert_eq!(s.outcome, SelectionOutcome::NoActiveRule);
        assert_eq!(s.modifiers(), Modifiers::NEUTRAL);
    }

    #[test]
    fn all_zero_weights_fall_back() {
        let mut rng = SmallRng::seed_from_u64(1);
        let s = select(&[rule(1, &[1, 2], 0.0)], EntityTypeId(5), &mut rng);
        assert_eq!(s.outcome, SelectionOutcome::NoActiveRule);
        assert_eq!(s.entity_type_id, EntityTypeId(5));
    }

    #[test]
    fn selection_carries_rule_modifiers() {
        let mut rng = SmallRng::seed_from_u64(11);
        let s = select(&[rule(4, &[9], 1.0)], EntityTypeId(0), &mut rng);
        assert_eq!(s.outcome, SelectionOutcome::Rule);
        assert_eq!(s.rule_id(), Some(RuleId(4)));
        let m = s.modifiers();
        assert_eq!(m.strength, 5.0);
        assert_eq!(m.size, 0.5);
    }

    /// Random source pinned to the top of `[0, 1)`.
    struct MaxRng;

    impl rand::RngCore for MaxRng {
        fn next_u32(&mut self) -> u32 {
            u32::MAX
        }

        fn next_u64(&mut self) -> u64 {
            u64::MAX
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            dst.fill(0xff);
        }
    }

    #[test]
    fn top_of_range_skips_trailing_zero_weight() {
        let active = vec![rule(1, &[1], 1.0), rule(2, &[2], 0.0)];
        let table = CandidateTable::build(&active);
        let drawn = table.draw(&mut MaxRng).unwrap();
        assert_eq!(drawn.entity_type_id, EntityTypeId(1));
    }
}
