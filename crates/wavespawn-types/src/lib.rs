//! Shared value types for the Wavespawn spawn-rule engine.
//!
//! Everything here is plain, immutable data: identifiers, the validated
//! [`SpawnRule`] record, and the [`Modifiers`] applied to a spawned entity.
//! Parsing and evaluation live in `wavespawn-core`.
//!
//! # Modules
//!
//! - [`ids`] -- Strongly-typed integer identifiers for entity types and rules
//! - [`rule`] -- The spawn rule record, its window, and stat modifiers

pub mod ids;
pub mod rule;

pub use ids::{EntityTypeId, RuleId};
pub use rule::{GameSeconds, Modifiers, RuleEnd, RuleError, SpawnRule, SpawnRuleParts};
