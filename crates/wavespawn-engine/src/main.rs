//! Host binary for the Wavespawn rule engine.
//!
//! Wires configuration, logging, the rule engine, the hot-reload watcher,
//! and a game loop that spawns entities on a frequency-scaled timer. At the
//! end of the run it logs a summary and optionally writes a JSON report.
//!
//! # Startup Sequence
//!
//! 1. Load configuration (CLI argument, else `wavespawn-config.yaml`)
//! 2. Initialize structured logging (tracing)
//! 3. Create the rule engine and load the rule table
//! 4. Start the hot-reload watcher if enabled
//! 5. Run the game loop until the duration elapses or Ctrl-C
//! 6. Log the run summary and write the report

mod error;
mod report;
mod spawn_loop;
mod watcher;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use wavespawn_core::config::{LoggingConfig, SimulationConfig, WavespawnConfig};
use wavespawn_core::{EngineSettings, FileSource, RuleEngine};
use wavespawn_types::GameSeconds;

use crate::error::EngineError;
use crate::report::{LoopEnd, ReportBuilder};
use crate::spawn_loop::SpawnLoop;

/// Default configuration file, looked up in the working directory.
const DEFAULT_CONFIG_PATH: &str = "wavespawn-config.yaml";

/// Game seconds between rule state summaries at debug level.
const STATE_LOG_INTERVAL_SECS: GameSeconds = 10.0;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the report cannot be
/// written. A missing or broken rule table is not an error.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let (config, config_source) = load_config(std::env::args_os().nth(1).map(PathBuf::from))?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!("wavespawn-engine starting");
    info!(
        config = %config_source,
        rules_path = %config.rules.path.display(),
        default_entity_type = config.rules.default_entity_type,
        hot_reload = config.rules.hot_reload,
        seed = config.simulation.seed,
        duration_secs = config.simulation.duration_secs,
        time_step_secs = config.simulation.time_step_secs,
        "Configuration loaded"
    );

    // 3. Create the rule engine and load the table.
    let engine = Arc::new(RuleEngine::new(EngineSettings::from(&config.rules)));
    match engine.reload(&FileSource::new(&config.rules.path)) {
        Ok(count) => info!(rules = count, "Rule table ready"),
        Err(e) => warn!(
            error = %e,
            default_entity_type = config.rules.default_entity_type,
            "Starting without rules, spawning the default entity"
        ),
    }

    // 4. Start the hot-reload watcher.
    let watcher = config.rules.hot_reload.then(|| {
        watcher::spawn_rule_watcher(
            Arc::clone(&engine),
            config.rules.path.clone(),
            Duration::from_millis(config.rules.reload_poll_ms),
        )
    });

    // 5. Run the game loop.
    let mut spawn_loop = SpawnLoop::new(Arc::clone(&engine), &config.simulation);
    let mut report = ReportBuilder::new();
    let end = run_loop(&mut spawn_loop, &mut report, &config.simulation).await;

    if let Some(handle) = watcher {
        handle.abort();
    }

    // 6. Report.
    let report = report.finish(&engine, spawn_loop.game_time(), end);
    report.log_summary();
    if let Some(path) = &config.simulation.report_path {
        report.write_json(path)?;
        info!(path = %path.display(), "Run report written");
    }

    info!("wavespawn-engine stopped");
    Ok(())
}

/// Load configuration from `explicit`, else the default file, else defaults.
///
/// Returns the config and a label describing where it came from. Logging is
/// not initialized yet, so nothing is logged here.
fn load_config(explicit: Option<PathBuf>) -> Result<(WavespawnConfig, String), EngineError> {
    if let Some(path) = explicit {
        let config = WavespawnConfig::from_file(&path)?;
        return Ok((config, path.display().to_string()));
    }
    let default_path = Path::new(DEFAULT_CONFIG_PATH);
    if default_path.exists() {
        let config = WavespawnConfig::from_file(default_path)?;
        Ok((config, DEFAULT_CONFIG_PATH.to_owned()))
    } else {
        Ok((WavespawnConfig::parse("")?, String::from("defaults")))
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Step the loop until the configured duration elapses or Ctrl-C.
async fn run_loop(
    spawn_loop: &mut SpawnLoop,
    report: &mut ReportBuilder,
    sim: &SimulationConfig,
) -> LoopEnd {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut ticker = (sim.tick_interval_ms > 0).then(|| {
        let mut interval = tokio::time::interval(Duration::from_millis(sim.tick_interval_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });
    let mut next_state_log = STATE_LOG_INTERVAL_SECS;

    info!(
        duration_secs = sim.duration_secs,
        tick_interval_ms = sim.tick_interval_ms,
        "Game loop started"
    );

    loop {
        if sim.duration_secs > 0.0 && spawn_loop.game_time() >= sim.duration_secs {
            return LoopEnd::DurationReached;
        }

        // Pace the loop, checking for Ctrl-C between steps.
        tokio::select! {
            biased;
            res = &mut ctrl_c => {
                if let Err(e) = res {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                info!(game_time = spawn_loop.game_time(), "Interrupted");
                return LoopEnd::Interrupted;
            }
            () = pace(ticker.as_mut()) => {}
        }

        for event in spawn_loop.step() {
            report.record(&event);
        }

        let t = spawn_loop.game_time();
        if t >= next_state_log {
            next_state_log += STATE_LOG_INTERVAL_SECS;
            for line in spawn_loop.engine().debug_info(t).summary_lines() {
                debug!("{line}");
            }
        }
    }
}

/// Wait for the next tick, or just yield when running unpaced.
async fn pace(ticker: Option<&mut tokio::time::Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => tokio::task::yield_now().await,
    }
}
