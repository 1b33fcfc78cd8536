//! The rule engine: composition root handed to the game loop.
//!
//! # Concurrency
//!
//! The engine holds the current [`RuleSnapshot`] behind an
//! `RwLock<Arc<RuleSnapshot>>`. Readers take the lock only long enough to
//! clone the [`Arc`], then evaluate against their own reference without any
//! locking. [`RuleEngine::reload`] parses the new table before touching the
//! lock and swaps the reference under a brief write lock, so an in-flight
//! selection always sees either the complete old snapshot or the complete
//! new one. An old snapshot is freed when its last reader drops it.
//!
//! No operation on the engine panics or leaves it without a usable
//! snapshot; failures degrade to the fallback entity and neutral
//! multipliers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use rand::Rng;
use tracing::{debug, info, warn};
use wavespawn_types::{EntityTypeId, GameSeconds, Modifiers, SpawnRule};

use crate::config::RulesConfig;
use crate::debug::DebugInfo;
use crate::filter::active_rules;
use crate::frequency::{NEUTRAL_FREQUENCY, average_frequency};
use crate::selector::{Selection, SelectionOutcome, select};
use crate::snapshot::RuleSnapshot;
use crate::source::RuleSource;
use crate::store::{self, LoadError};

/// Engine construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Entity type spawned when no rule applies.
    pub default_entity_type: EntityTypeId,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_entity_type: EntityTypeId(1),
        }
    }
}

impl From<&RulesConfig> for EngineSettings {
    fn from(config: &RulesConfig) -> Self {
        Self {
            default_entity_type: EntityTypeId(config.default_entity_type),
        }
    }
}

/// Everything the game loop needs for one spawn event, taken from a single
/// snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnDecision {
    /// Entity type and originating rule.
    pub selection: Selection,
    /// Stat multipliers for the new entity.
    pub modifiers: Modifiers,
    /// Spawn-timer rate multiplier at this time.
    pub frequency: f64,
}

/// Owns the current rule snapshot and answers spawn queries against it.
#[derive(Debug)]
pub struct RuleEngine {
    current: RwLock<Arc<RuleSnapshot>>,
    settings: EngineSettings,
    /// Number of successful reloads.
    generation: AtomicU64,
}

impl RuleEngine {
    /// Create an engine with no rules loaded. Every query falls back until
    /// a [`reload`](Self::reload) succeeds.
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            current: RwLock::new(Arc::new(RuleSnapshot::unavailable())),
            settings,
            generation: AtomicU64::new(0),
        }
    }

    /// Create an engine and perform an initial load from `source`.
    ///
    /// A failed load is logged and leaves the engine unavailable.
    pub fn with_source(settings: EngineSettings, source: &impl RuleSource) -> Self {
        let engine = Self::new(settings);
        let _ = engine.reload(source);
        engine
    }

    /// Engine settings.
    pub const fn settings(&self) -> EngineSettings {
        self.settings
    }

    // -----------------------------------------------------------------------
    // Snapshot management
    // -----------------------------------------------------------------------

    /// The snapshot currently published.
    pub fn snapshot(&self) -> Arc<RuleSnapshot> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Whether the last load attempt succeeded.
    pub fn is_available(&self) -> bool {
        self.snapshot().is_available()
    }

    /// Number of successful reloads so far.
    pub fn reload_count(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Publish `snapshot` as the current one.
    pub fn install(&self, snapshot: RuleSnapshot) {
        let next = Arc::new(snapshot);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = next;
    }

    /// Load `source` and, on success, atomically replace the current
    /// snapshot. Returns the number of rules loaded.
    ///
    /// On failure the previous rules stay in place but the engine is marked
    /// unavailable, so selection falls back until a later reload succeeds.
    ///
    /// # Errors
    ///
    /// Returns the [`LoadError`] for the caller's logs. The engine is in a
    /// defined state either way.
    pub fn reload(&self, source: &impl RuleSource) -> Result<usize, LoadError> {
        match store::load(source) {
            Ok(snapshot) => {
                let rule_count = snapshot.len();
                let enabled = snapshot.rules().iter().filter(|r| r.enabled()).count();
                self.install(snapshot);
                let generation = self
                    .generation
                    .fetch_add(1, Ordering::AcqRel)
                    .saturating_add(1);
                info!(
                    source = %source.describe(),
                    rule_count,
                    enabled,
                    generation,
                    "Spawn rules loaded"
                );
                Ok(rule_count)
            }
            Err(e) => {
                let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
                let retained = guard.len();
                *guard = Arc::new(guard.with_availability(false));
                drop(guard);
                warn!(
                    source = %source.describe(),
                    error = %e,
                    missing = e.is_missing(),
                    retained_rules = retained,
                    "Failed to load spawn rules, spawning default entity until next reload"
                );
                Err(e)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Rules active at `t`. Empty while unavailable.
    pub fn active_rules(&self, t: GameSeconds) -> Vec<Arc<SpawnRule>> {
        let snapshot = self.snapshot();
        if snapshot.is_available() {
            active_rules(&snapshot, t)
        } else {
            Vec::new()
        }
    }

    /// Pick the entity type to spawn at `t`.
    pub fn select<R: Rng + ?Sized>(&self, t: GameSeconds, rng: &mut R) -> Selection {
        let snapshot = self.snapshot();
        self.select_in(&snapshot, t, rng)
    }

    /// Spawn-timer multiplier at `t`; neutral while unavailable.
    pub fn average_frequency(&self, t: GameSeconds) -> f64 {
        let snapshot = self.snapshot();
        if snapshot.is_available() {
            average_frequency(&active_rules(&snapshot, t))
        } else {
            NEUTRAL_FREQUENCY
        }
    }

    /// Selection, modifiers, and frequency for one spawn event, all read
    /// from the same snapshot.
    pub fn spawn<R: Rng + ?Sized>(&self, t: GameSeconds, rng: &mut R) -> SpawnDecision {
        let snapshot = self.snapshot();
        let selection = self.select_in(&snapshot, t, rng);
        let frequency = if snapshot.is_available() {
            average_frequency(&active_rules(&snapshot, t))
        } else {
            NEUTRAL_FREQUENCY
        };
        SpawnDecision {
            modifiers: selection.modifiers(),
            selection,
            frequency,
        }
    }

    /// Diagnostics projection at `t`.
    pub fn debug_info(&self, t: GameSeconds) -> DebugInfo {
        DebugInfo::capture(&self.snapshot(), t)
    }

    fn select_in<R: Rng + ?Sized>(
        &self,
        snapshot: &RuleSnapshot,
        t: GameSeconds,
        rng: &mut R,
    ) -> Selection {
        let default = self.settings.default_entity_type;
        if !snapshot.is_available() {
            warn!(
                game_time = t,
                default_entity = %default,
                "Spawn rules unavailable, spawning default entity"
            );
            return Selection::fallback(default, SelectionOutcome::Unavailable);
        }

        let active = active_rules(snapshot, t);
        let selection = select(&active, default, rng);
        match (selection.outcome, selection.rule_id()) {
            (SelectionOutcome::Rule, Some(rule)) => debug!(
                game_time = t,
                entity = %selection.entity_type_id,
                rule = %rule,
                active_rules = active.len(),
                "Spawn rule selected"
            ),
            _ if active.is_empty() => warn!(
                game_time = t,
                default_entity = %default,
                "No active spawn rule, spawning default entity"
            ),
            _ => warn!(
                game_time = t,
                active_rules = active.len(),
                default_entity = %default,
                "Active spawn rules have zero total weight, spawning default entity"
            ),
        }
        selection
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}
