//! Time-windowed, weighted spawn-rule engine for Wavespawn.
//!
//! Each time the game loop must create an entity, this crate decides which
//! entity type to instantiate and how strongly to scale it, based on an
//! externally supplied table of time-bounded rules.
//!
//! # Modules
//!
//! - [`store`] -- Parses a rule table into an immutable [`RuleSnapshot`].
//! - [`source`] -- Rule table sources: CSV or YAML files and in-memory rows.
//! - [`snapshot`] -- The snapshot type, the unit of atomic replacement.
//! - [`filter`] -- Selects the rules whose window contains the game time.
//! - [`selector`] -- Weighted draw of one (entity type, rule) candidate.
//! - [`frequency`] -- Weighted mean of the active spawn frequencies.
//! - [`engine`] -- [`RuleEngine`], the composition root held by the game loop.
//! - [`debug`] -- Read-only projection for diagnostics tooling.
//! - [`config`] -- Configuration loading from `wavespawn-config.yaml`.
//!
//! [`RuleSnapshot`]: snapshot::RuleSnapshot
//! [`RuleEngine`]: engine::RuleEngine

pub mod config;
pub mod debug;
pub mod engine;
pub mod filter;
pub mod frequency;
pub mod selector;
pub mod snapshot;
pub mod source;
pub mod store;

pub use debug::{DebugInfo, RuleDebug};
pub use engine::{EngineSettings, RuleEngine, SpawnDecision};
pub use filter::active_rules;
pub use frequency::average_frequency;
pub use selector::{CandidateTable, Selection, SelectionOutcome, modifiers, select};
pub use snapshot::RuleSnapshot;
pub use source::{FileSource, InlineRows, RawRuleRow, RuleSource};
pub use store::{LoadError, load};
