//! The host side of the spawn contract.
//!
//! Each step advances game time, feeds the time step scaled by the current
//! frequency multiplier into a spawn timer, and asks the rule engine for one
//! decision per elapsed spawn interval. The loop itself is synchronous; the
//! binary decides how fast to drive it.

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::Serialize;
use tracing::debug;
use wavespawn_core::config::SimulationConfig;
use wavespawn_core::{RuleEngine, SelectionOutcome};
use wavespawn_types::{EntityTypeId, GameSeconds, Modifiers, RuleId};

/// Upper bound on spawns released by a single step, so a huge frequency
/// spike cannot stall the loop.
const MAX_SPAWNS_PER_STEP: u32 = 64;

/// Accumulates frequency-scaled time and releases spawns at a fixed
/// interval.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnTimer {
    accumulated: f64,
    interval: f64,
}

impl SpawnTimer {
    /// Create a timer firing every `interval` game seconds at frequency 1.0.
    pub const fn new(interval: f64) -> Self {
        Self {
            accumulated: 0.0,
            interval,
        }
    }

    /// Add `dt * frequency` and return how many spawns are now due.
    pub fn advance(&mut self, dt: f64, frequency: f64) -> u32 {
        self.accumulated += dt * frequency;
        let mut due = 0_u32;
        while self.accumulated >= self.interval && due < MAX_SPAWNS_PER_STEP {
            self.accumulated -= self.interval;
            due = due.saturating_add(1);
        }
        if due == MAX_SPAWNS_PER_STEP {
            // Drop the backlog rather than carrying it into the next step.
            self.accumulated %= self.interval;
        }
        due
    }

    /// Time accumulated toward the next spawn.
    pub const fn accumulated(&self) -> f64 {
        self.accumulated
    }
}

/// One entity the game loop would instantiate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpawnEvent {
    /// Game time of the spawn.
    pub game_time: GameSeconds,
    /// Entity type instantiated.
    pub entity_type_id: EntityTypeId,
    /// Originating rule, `None` for a fallback spawn.
    pub rule_id: Option<RuleId>,
    /// Stat multipliers applied to the entity.
    pub modifiers: Modifiers,
    /// How the rule engine reached the decision.
    pub outcome: SelectionOutcome,
    /// Frequency multiplier in effect.
    pub frequency: f64,
}

/// Drives the rule engine the way a game loop does.
#[derive(Debug)]
pub struct SpawnLoop {
    engine: Arc<RuleEngine>,
    rng: SmallRng,
    timer: SpawnTimer,
    game_time: GameSeconds,
    time_step: f64,
}

impl SpawnLoop {
    /// Create a loop at game time zero with an RNG seeded from `config`.
    pub fn new(engine: Arc<RuleEngine>, config: &SimulationConfig) -> Self {
        Self {
            engine,
            rng: SmallRng::seed_from_u64(config.seed),
            timer: SpawnTimer::new(config.base_spawn_interval_secs),
            game_time: 0.0,
            time_step: config.time_step_secs,
        }
    }

    /// Current game time.
    pub const fn game_time(&self) -> GameSeconds {
        self.game_time
    }

    /// The engine this loop queries.
    pub const fn engine(&self) -> &Arc<RuleEngine> {
        &self.engine
    }

    /// Advance one time step and return the spawns it produced.
    pub fn step(&mut self) -> Vec<SpawnEvent> {
        self.game_time += self.time_step;
        let t = self.game_time;
        let frequency = self.engine.average_frequency(t);
        let due = self.timer.advance(self.time_step, frequency);

        let mut events = Vec::with_capacity(usize::try_from(due).unwrap_or(0));
        for _ in 0..due {
            let decision = self.engine.spawn(t, &mut self.rng);
            let event = SpawnEvent {
                game_time: t,
                entity_type_id: decision.selection.entity_type_id,
                rule_id: decision.selection.rule_id(),
                modifiers: decision.modifiers,
                outcome: decision.selection.outcome,
                frequency: decision.frequency,
            };
            debug!(
                game_time = t,
                entity = %event.entity_type_id,
                rule = ?event.rule_id,
                strength = event.modifiers.strength,
                size = event.modifiers.size,
                outcome = event.outcome.as_str(),
                "Entity spawned"
            );
            events.push(event);
        }
        events
    }
}
