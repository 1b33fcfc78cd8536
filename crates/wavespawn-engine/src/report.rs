//! Run report: what the engine spawned and why.
//!
//! Tuning happens offline against these reports, so every spawn event is
//! tallied by entity, rule, and outcome, and the final rule state is
//! captured through the diagnostics projection.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;
use wavespawn_core::{DebugInfo, RuleEngine, SelectionOutcome};
use wavespawn_types::GameSeconds;

use crate::error::EngineError;
use crate::spawn_loop::SpawnEvent;

/// Why the game loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopEnd {
    /// The configured game duration elapsed.
    DurationReached,
    /// Interrupted by Ctrl-C.
    Interrupted,
}

/// Accumulates spawn events while the loop runs.
#[derive(Debug)]
pub struct ReportBuilder {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    total_spawns: u64,
    by_entity: BTreeMap<u32, u64>,
    by_rule: BTreeMap<u32, u64>,
    fallback_spawns: u64,
    unavailable_spawns: u64,
    frequency_sum: f64,
}

impl ReportBuilder {
    /// Start a new report.
    pub fn new() -> Self {
        Self {
            run_id: Uuid::now_v7(),
            started_at: Utc::now(),
            total_spawns: 0,
            by_entity: BTreeMap::new(),
            by_rule: BTreeMap::new(),
            fallback_spawns: 0,
            unavailable_spawns: 0,
            frequency_sum: 0.0,
        }
    }

    /// Tally one spawn.
    pub fn record(&mut self, event: &SpawnEvent) {
        self.total_spawns = self.total_spawns.saturating_add(1);
        let entity = self.by_entity.entry(event.entity_type_id.0).or_insert(0);
        *entity = entity.saturating_add(1);
        if let Some(rule_id) = event.rule_id {
            let rule = self.by_rule.entry(rule_id.0).or_insert(0);
            *rule = rule.saturating_add(1);
        }
        match event.outcome {
            SelectionOutcome::Rule => {}
            SelectionOutcome::NoActiveRule => {
                self.fallback_spawns = self.fallback_spawns.saturating_add(1);
            }
            SelectionOutcome::Unavailable => {
                self.unavailable_spawns = self.unavailable_spawns.saturating_add(1);
            }
        }
        self.frequency_sum += event.frequency;
    }

    /// Close the report at `game_time`, capturing the engine's final state.
    #[allow(clippy::cast_precision_loss)] // spawn counts stay far below 2^53
    pub fn finish(self, engine: &RuleEngine, game_time: GameSeconds, end: LoopEnd) -> RunReport {
        let mean_frequency = if self.total_spawns == 0 {
            1.0
        } else {
            self.frequency_sum / self.total_spawns as f64
        };
        RunReport {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            end,
            game_seconds: game_time,
            total_spawns: self.total_spawns,
            by_entity: self.by_entity,
            by_rule: self.by_rule,
            fallback_spawns: self.fallback_spawns,
            unavailable_spawns: self.unavailable_spawns,
            mean_frequency,
            reloads: engine.reload_count(),
            final_state: engine.debug_info(game_time),
        }
    }
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Unique run id (UUID v7).
    pub run_id: Uuid,
    /// Wall-clock start.
    pub started_at: DateTime<Utc>,
    /// Wall-clock end.
    pub finished_at: DateTime<Utc>,
    /// Why the loop stopped.
    pub end: LoopEnd,
    /// Game time reached.
    pub game_seconds: GameSeconds,
    /// Spawns of any kind.
    pub total_spawns: u64,
    /// Spawn counts keyed by entity type.
    pub by_entity: BTreeMap<u32, u64>,
    /// Spawn counts keyed by originating rule.
    pub by_rule: BTreeMap<u32, u64>,
    /// Spawns made while no rule was active.
    pub fallback_spawns: u64,
    /// Spawns made while the rule set was unavailable.
    pub unavailable_spawns: u64,
    /// Mean frequency multiplier across spawns.
    pub mean_frequency: f64,
    /// Successful rule reloads, including the initial load.
    pub reloads: u64,
    /// Rule state at the end of the run.
    pub final_state: DebugInfo,
}

impl RunReport {
    /// Log the summary at info level.
    pub fn log_summary(&self) {
        info!(
            run_id = %self.run_id,
            end = ?self.end,
            game_seconds = self.game_seconds,
            total_spawns = self.total_spawns,
            fallback_spawns = self.fallback_spawns,
            unavailable_spawns = self.unavailable_spawns,
            mean_frequency = self.mean_frequency,
            reloads = self.reloads,
            "Run finished"
        );
        for (entity, count) in &self.by_entity {
            info!(entity, count, "Spawns by entity type");
        }
        for line in self.final_state.summary_lines() {
            info!("{line}");
        }
    }

    /// Write the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Serialize`] or [`EngineError::ReportWrite`].
    pub fn write_json(&self, path: &Path) -> Result<(), EngineError> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| EngineError::ReportWrite {
                path: path.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, json).map_err(|source| EngineError::ReportWrite {
            path: path.to_path_buf(),
            source,
        })
    }
}
