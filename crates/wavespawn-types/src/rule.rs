//! The spawn rule record and the modifiers it applies.
//!
//! A [`SpawnRule`] is validated once, when it is built from
//! [`SpawnRuleParts`], and never mutated afterwards. Every numeric invariant
//! the selector and frequency aggregator rely on is enforced here:
//!
//! - closed windows satisfy `start_time <= end_time`
//! - the entity list is non-empty
//! - `spawn_weight` is finite and `>= 0`
//! - `spawn_frequency` and both stat multipliers are finite and `> 0`

use serde::{Deserialize, Serialize};

use crate::ids::{EntityTypeId, RuleId};

/// Elapsed simulation time in seconds, as supplied by the game loop.
pub type GameSeconds = f64;

/// Errors raised when rule fields violate a record invariant.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuleError {
    /// The rule names no entity types.
    #[error("entity type list must not be empty")]
    EmptyEntityList,

    /// A closed window ends before it starts.
    #[error("window ends before it starts: start {start} > end {end}")]
    WindowInverted {
        /// Window start in seconds.
        start: u64,
        /// Window end in seconds.
        end: u64,
    },

    /// An end time below the `-1` open sentinel.
    #[error("end time {value} is negative and not the open sentinel -1")]
    InvalidEnd {
        /// The rejected raw value.
        value: i64,
    },

    /// The spawn weight is negative, NaN, or infinite.
    #[error("spawn_weight must be finite and >= 0, got {value}")]
    InvalidWeight {
        /// The rejected value.
        value: f64,
    },

    /// A multiplier field is zero, negative, NaN, or infinite.
    #[error("{field} must be finite and > 0, got {value}")]
    InvalidMultiplier {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },
}

/// Upper bound of a rule window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleEnd {
    /// No upper bound; the rule stays active once started.
    Open,
    /// Last second (inclusive) at which the rule is active.
    At(u64),
}

impl RuleEnd {
    /// Raw table value that marks an open-ended window.
    pub const OPEN_SENTINEL: i64 = -1;

    /// Interpret a raw `end_time` column value.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::InvalidEnd`] for negative values other than
    /// [`Self::OPEN_SENTINEL`].
    pub fn from_raw(value: i64) -> Result<Self, RuleError> {
        if value == Self::OPEN_SENTINEL {
            return Ok(Self::Open);
        }
        u64::try_from(value)
            .map(Self::At)
            .map_err(|_conversion| RuleError::InvalidEnd { value })
    }

    /// Whether `t` lies at or before this bound.
    #[allow(clippy::cast_precision_loss)] // window bounds are far below 2^53 seconds
    pub fn admits(self, t: GameSeconds) -> bool {
        match self {
            Self::Open => true,
            Self::At(end) => t <= end as f64,
        }
    }

    /// Whether the window has no upper bound.
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}

impl core::fmt::Display for RuleEnd {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::At(end) => write!(f, "{end}"),
        }
    }
}

/// Unvalidated field values for a [`SpawnRule`].
///
/// This is the hand-off point between a parser and the record type; call
/// [`SpawnRule::new`] to validate it.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRuleParts {
    /// Rule identifier.
    pub id: RuleId,
    /// Window start in seconds.
    pub start_time: u64,
    /// Window end.
    pub end_time: RuleEnd,
    /// Entity types this rule may spawn, in table order.
    pub entity_type_ids: Vec<EntityTypeId>,
    /// Draw weight of each listed entity.
    pub spawn_weight: f64,
    /// Multiplier on the spawn-timer accumulation rate.
    pub spawn_frequency: f64,
    /// Stat multiplier for strength.
    pub strength_multiplier: f64,
    /// Stat multiplier for size.
    pub size_multiplier: f64,
    /// Disabled rules never take part in evaluation.
    pub enabled: bool,
    /// Free text for tooling.
    pub description: String,
}

/// A validated, immutable spawn rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpawnRule {
    id: RuleId,
    start_time: u64,
    end_time: RuleEnd,
    entity_type_ids: Vec<EntityTypeId>,
    spawn_weight: f64,
    spawn_frequency: f64,
    strength_multiplier: f64,
    size_multiplier: f64,
    enabled: bool,
    description: String,
}

impl SpawnRule {
    /// Validate `parts` and build the rule.
    ///
    /// # Errors
    ///
    /// Returns the first [`RuleError`] found, checking the window, the
    /// entity list, the weight, and then each multiplier.
    pub fn new(parts: SpawnRuleParts) -> Result<Self, RuleError> {
        if let RuleEnd::At(end) = parts.end_time {
            if parts.start_time > end {
                return Err(RuleError::WindowInverted {
                    start: parts.start_time,
                    end,
                });
            }
        }
        if parts.entity_type_ids.is_empty() {
            return Err(RuleError::EmptyEntityList);
        }
        if !parts.spawn_weight.is_finite() || parts.spawn_weight < 0.0 {
            return Err(RuleError::InvalidWeight {
                value: parts.spawn_weight,
            });
        }
        for (field, value) in [
            ("spawn_frequency", parts.spawn_frequency),
            ("strength_multiplier", parts.strength_multiplier),
            ("size_multiplier", parts.size_multiplier),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(RuleError::InvalidMultiplier { field, value });
            }
        }

        Ok(Self {
            id: parts.id,
            start_time: parts.start_time,
            end_time: parts.end_time,
            entity_type_ids: parts.entity_type_ids,
            spawn_weight: parts.spawn_weight,
            spawn_frequency: parts.spawn_frequency,
            strength_multiplier: parts.strength_multiplier,
            size_multiplier: parts.size_multiplier,
            enabled: parts.enabled,
            description: parts.description,
        })
    }

    /// Whether the rule is enabled and its window contains `t`.
    #[allow(clippy::cast_precision_loss)] // window bounds are far below 2^53 seconds
    pub fn is_active_at(&self, t: GameSeconds) -> bool {
        self.enabled && t >= self.start_time as f64 && self.end_time.admits(t)
    }

    /// Rule identifier.
    pub const fn id(&self) -> RuleId {
        self.id
    }

    /// Window start in seconds.
    pub const fn start_time(&self) -> u64 {
        self.start_time
    }

    /// Window end.
    pub const fn end_time(&self) -> RuleEnd {
        self.end_time
    }

    /// Entity types in table order (duplicates preserved).
    pub fn entity_type_ids(&self) -> &[EntityTypeId] {
        &self.entity_type_ids
    }

    /// Draw weight reused for every listed entity.
    pub const fn spawn_weight(&self) -> f64 {
        self.spawn_weight
    }

    /// Spawn-timer rate multiplier.
    pub const fn spawn_frequency(&self) -> f64 {
        self.spawn_frequency
    }

    /// Strength stat multiplier.
    pub const fn strength_multiplier(&self) -> f64 {
        self.strength_multiplier
    }

    /// Size stat multiplier.
    pub const fn size_multiplier(&self) -> f64 {
        self.size_multiplier
    }

    /// Whether the rule takes part in evaluation.
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    /// Free-text description.
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Stat scaling applied to a freshly spawned entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Modifiers {
    /// Strength multiplier.
    pub strength: f64,
    /// Size multiplier.
    pub size: f64,
}

impl Modifiers {
    /// No scaling. Used whenever no rule produced the spawn.
    pub const NEUTRAL: Self = Self {
        strength: 1.0,
        size: 1.0,
    };

    /// Modifiers of the originating rule, or [`Self::NEUTRAL`] for a
    /// fallback spawn.
    pub fn for_rule(rule: Option<&SpawnRule>) -> Self {
        rule.map_or(Self::NEUTRAL, |r| Self {
            strength: r.strength_multiplier,
            size: r.size_multiplier,
        })
    }
}

impl Default for Modifiers {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn parts() -> SpawnRuleParts {
        SpawnRuleParts {
            id: RuleId(1),
            start_time: 10,
            end_time: RuleEnd::At(30),
            entity_type_ids: vec![EntityTypeId(1), EntityTypeId(2)],
            spawn_weight: 0.8,
            spawn_frequency: 5.0,
            strength_multiplier: 1.5,
            size_multiplier: 1.2,
            enabled: true,
            description: String::from("early swarm"),
        }
    }

    #[test]
    fn valid_parts_build() {
        let rule = SpawnRule::new(parts()).unwrap();
        assert_eq!(rule.id(), RuleId(1));
        assert_eq!(rule.entity_type_ids(), &[EntityTypeId(1), EntityTypeId(2)]);
        assert_eq!(rule.description(), "early swarm");
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let rule = SpawnRule::new(parts()).unwrap();
        assert!(!rule.is_active_at(9.99));
        assert!(rule.is_active_at(10.0));
        assert!(rule.is_active_at(30.0));
        assert!(!rule.is_active_at(30.01));
    }

    #[test]
    fn open_end_never_expires() {
        let mut p = parts();
        p.end_time = RuleEnd::Open;
        let rule = SpawnRule::new(p).unwrap();
        assert!(rule.is_active_at(1.0e9));
    }

    #[test]
    fn disabled_rule_is_never_active() {
        let mut p = parts();
        p.enabled = false;
        let rule = SpawnRule::new(p).unwrap();
        assert!(!rule.is_active_at(15.0));
    }

    #[test]
    fn nan_time_is_never_active() {
        let rule = SpawnRule::new(parts()).unwrap();
        assert!(!rule.is_active_at(f64::NAN));
    }

    #[test]
    fn inverted_window_rejected() {
        let mut p = parts();
        p.start_time = 40;
        assert_eq!(
            SpawnRule::new(p),
            Err(RuleError::WindowInverted { start: 40, end: 30 })
        );
    }

    #[test]
    fn empty_entity_list_rejected() {
        let mut p = parts();
        p.entity_type_ids.clear();
        assert_eq!(SpawnRule::new(p), Err(RuleError::EmptyEntityList));
    }

    #[test]
    fn zero_weight_allowed_negative_rejected() {
        let mut p = parts();
        p.spawn_weight = 0.0;
        assert!(SpawnRule::new(p.clone()).is_ok());
        p.spawn_weight = -0.1;
        assert!(matches!(
            SpawnRule::new(p),
            Err(RuleError::InvalidWeight { .. })
        ));
    }

    #[test]
    fn non_positive_multipliers_rejected() {
        let mut p = parts();
        p.spawn_frequency = 0.0;
        assert!(matches!(
            SpawnRule::new(p.clone()),
            Err(RuleError::InvalidMultiplier {
                field: "spawn_frequency",
                ..
            })
        ));
        p.spawn_frequency = 1.0;
        p.size_multiplier = f64::INFINITY;
        assert!(matches!(
            SpawnRule::new(p),
            Err(RuleError::InvalidMultiplier {
                field: "size_multiplier",
                ..
            })
        ));
    }

    #[test]
    fn end_sentinel_parsing() {
        assert_eq!(RuleEnd::from_raw(-1), Ok(RuleEnd::Open));
        assert_eq!(RuleEnd::from_raw(0), Ok(RuleEnd::At(0)));
        assert_eq!(
            RuleEnd::from_raw(-2),
            Err(RuleError::InvalidEnd { value: -2 })
        );
    }

    #[test]
    fn modifiers_fall_back_to_neutral() {
        assert_eq!(Modifiers::for_rule(None), Modifiers::NEUTRAL);
        let rule = SpawnRule::new(parts()).unwrap();
        let m = Modifiers::for_rule(Some(&rule));
        assert_eq!(m.strength, 1.5);
        assert_eq!(m.size, 1.2);
    }
}
