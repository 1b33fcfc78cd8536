//! Integration tests for the rule engine.
//!
//! These drive [`RuleEngine`] through its public surface only: loading real
//! files, reloading under concurrent readers, and checking the statistical
//! properties of selection.

#![allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::float_cmp,
    clippy::indexing_slicing,
    clippy::cast_precision_loss
)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::SeedableRng;
use rand::rngs::SmallRng;
use wavespawn_core::{
    EngineSettings, FileSource, InlineRows, LoadError, RawRuleRow, RuleEngine, SelectionOutcome,
};
use wavespawn_types::{EntityTypeId, Modifiers, RuleId};

const HEADER: &str = "rule_id,start_time,end_time,enemy_no_list,spawn_weight,spawn_frequency,strength_multiplier,size_multiplier,enabled,description";

/// R1/R2 table used throughout: both active on `[0, 30]`.
const SCENARIO_CSV: &str = "rule_id,start_time,end_time,enemy_no_list,spawn_weight,spawn_frequency,strength_multiplier,size_multiplier,enabled,description
1,0,30,\"1,2\",0.8,5.0,1.5,1.0,true,R1
2,0,30,3,0.2,1.0,1.0,2.0,true,R2
";

/// Write `contents` to a fresh file under the system temp dir.
fn temp_file(name: &str, contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("wavespawn-tests-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn engine_with(path: &Path) -> RuleEngine {
    let engine = RuleEngine::new(EngineSettings {
        default_entity_type: EntityTypeId(0),
    });
    engine.reload(&FileSource::new(path)).unwrap();
    engine
}

#[test]
fn scenario_selection_matches_weights() {
    let path = temp_file("scenario.csv", SCENARIO_CSV);
    let engine = engine_with(&path);
    let mut rng = SmallRng::seed_from_u64(2024);

    let draws = 10_000_u32;
    let mut counts: BTreeMap<u32, u32> = BTreeMap::new();
    for _ in 0..draws {
        let s = engine.select(10.0, &mut rng);
        assert_eq!(s.outcome, SelectionOutcome::Rule);
        *counts.entry(s.entity_type_id.0).or_default() += 1;
    }

    for (entity, expected) in [(1, 0.444_4), (2, 0.444_4), (3, 0.111_1)] {
        let observed = f64::from(counts[&entity]) / f64::from(draws);
        assert!(
            (observed - expected).abs() < 0.02,
            "entity {entity}: observed {observed:.4}, expected {expected:.4}"
        );
    }
}

#[test]
fn scenario_average_frequency() {
    let path = temp_file("scenario-freq.csv", SCENARIO_CSV);
    let engine = engine_with(&path);
    let avg = engine.average_frequency(10.0);
    assert!((avg - 8.2 / 1.8).abs() < 1e-9, "got {avg}");
    assert!((avg - 4.556).abs() < 1e-3);
}

#[test]
fn modifiers_follow_originating_rule() {
    let path = temp_file("scenario-mods.csv", SCENARIO_CSV);
    let engine = engine_with(&path);
    let mut rng = SmallRng::seed_from_u64(5);
    for _ in 0..500 {
        let decision = engine.spawn(10.0, &mut rng);
        let expected = match decision.selection.rule_id() {
            Some(RuleId(1)) => Modifiers {
                strength: 1.5,
                size: 1.0,
            },
            Some(RuleId(2)) => Modifiers {
                strength: 1.0,
                size: 2.0,
            },
            other => panic!("unexpected rule {other:?}"),
        };
        assert_eq!(decision.modifiers, expected);
    }
}

#[test]
fn outside_every_window_falls_back() {
    let path = temp_file("scenario-gap.csv", SCENARIO_CSV);
    let engine = engine_with(&path);
    let mut rng = SmallRng::seed_from_u64(1);
    let decision = engine.spawn(45.0, &mut rng);
    assert_eq!(decision.selection.outcome, SelectionOutcome::NoActiveRule);
    assert_eq!(decision.selection.entity_type_id, EntityTypeId(0));
    assert!(decision.selection.rule.is_none());
    assert_eq!(decision.modifiers, Modifiers::NEUTRAL);
    assert_eq!(engine.average_frequency(45.0), 1.0);
}

#[test]
fn malformed_file_leaves_engine_unavailable() {
    let bad = format!("{HEADER}\n1,0,30,\"1,x\",0.8,5.0,1.0,1.0,true,broken\n");
    let path = temp_file("malformed.csv", &bad);
    let engine = RuleEngine::new(EngineSettings {
        default_entity_type: EntityTypeId(7),
    });
    let err = engine.reload(&FileSource::new(&path)).unwrap_err();
    assert!(matches!(err, LoadError::Malformed { row: 2, .. }));
    assert!(!engine.is_available());

    let mut rng = SmallRng::seed_from_u64(9);
    for t in [0.0, 10.0, 29.0, 1_000.0] {
        let s = engine.select(t, &mut rng);
        assert_eq!(s.entity_type_id, EntityTypeId(7));
        assert!(s.rule.is_none());
        assert_eq!(s.outcome, SelectionOutcome::Unavailable);
    }
}

#[test]
fn unquoted_comma_in_description_fails_load() {
    let text = format!("{HEADER}\n3,0,30,3,0.2,1.0,1.0,1.0,true,Brutes, slow but heavy\n");
    let path = temp_file("shifted.csv", &text);
    let engine = RuleEngine::default();
    let err = engine.reload(&FileSource::new(&path)).unwrap_err();
    assert!(matches!(err, LoadError::Csv { line: 2, .. }));
    assert!(!engine.is_available());
}

#[test]
fn missing_file_is_reported_as_missing() {
    let engine = RuleEngine::default();
    let err = engine
        .reload(&FileSource::new("/definitely/not/here/rules.csv"))
        .unwrap_err();
    assert!(err.is_missing());
    assert!(!engine.is_available());
}

#[test]
fn yaml_table_loads_like_csv() {
    let yaml = "\
- rule_id: 1
  start_time: 0
  end_time: 30
  enemy_no_list: [1, 2]
  spawn_weight: 0.8
  spawn_frequency: 5.0
  strength_multiplier: 1.5
  size_multiplier: 1.0
  enabled: True
  description: R1
- rule_id: 2
  start_time: 0
  end_time: 30
  enemy_no_list: \"3\"
  spawn_weight: 0.2
  spawn_frequency: 1.0
  strength_multiplier: 1.0
  size_multiplier: 2.0
  enabled: true
  description: R2
";
    let path = temp_file("scenario.yaml", yaml);
    let engine = engine_with(&path);
    assert_eq!(engine.snapshot().len(), 2);
    assert!((engine.average_frequency(10.0) - 8.2 / 1.8).abs() < 1e-9);
}

#[test]
fn shipped_rule_table_loads() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../data/spawn_rules.csv");
    let engine = engine_with(&path);
    let snapshot = engine.snapshot();
    assert!(snapshot.len() >= 5);
    // The disabled debug rule never shows up.
    for t in [0.0, 50.0, 100.0, 500.0] {
        assert!(engine.active_rules(t).iter().all(|r| r.enabled()));
    }
    assert!(!engine.debug_info(500.0).rules.is_empty());
}

#[test]
fn average_frequency_within_active_bounds_over_time() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../data/spawn_rules.csv");
    let engine = engine_with(&path);
    for step in 0..400_u32 {
        let t = f64::from(step) * 0.5;
        let active = engine.active_rules(t);
        let avg = engine.average_frequency(t);
        if active.is_empty() {
            assert_eq!(avg, 1.0);
            continue;
        }
        let min = active.iter().map(|r| r.spawn_frequency()).fold(f64::INFINITY, f64::min);
        let max = active
            .iter()
            .map(|r| r.spawn_frequency())
            .fold(f64::NEG_INFINITY, f64::max);
        assert!(avg >= min && avg <= max, "t={t}: {avg} not in [{min}, {max}]");
    }
}

fn uniform_rows(entity: u32) -> InlineRows {
    let rows = (1..=4)
        .map(|id| {
            RawRuleRow::new(usize::try_from(id).unwrap())
                .with("rule_id", id.to_string())
                .with("start_time", "0")
                .with("end_time", "-1")
                .with("enemy_no_list", format!("{entity},{entity}"))
                .with("spawn_weight", "1.0")
                .with("spawn_frequency", "1.0")
                .with("strength_multiplier", "1.0")
                .with("size_multiplier", "1.0")
                .with("enabled", "true")
                .with("description", format!("generation {entity}"))
        })
        .collect();
    InlineRows(rows)
}

#[test]
fn concurrent_reload_never_exposes_mixed_snapshot() {
    // Table A spawns only entity 100, table B only entity 200. A reader that
    // saw a half-applied reload would observe a snapshot mixing the two.
    let engine = Arc::new(RuleEngine::default());
    engine.reload(&uniform_rows(100)).unwrap();
    let stop = Arc::new(AtomicBool::new(false));

    std::thread::scope(|scope| {
        for seed in 0..4_u64 {
            let engine = Arc::clone(&engine);
            let stop = Arc::clone(&stop);
            scope.spawn(move || {
                let mut rng = SmallRng::seed_from_u64(seed);
                while !stop.load(Ordering::Relaxed) {
                    let snapshot = engine.snapshot();
                    let entities: Vec<u32> = snapshot
                        .rules()
                        .iter()
                        .flat_map(|r| r.entity_type_ids().iter().map(|e| e.0))
                        .collect();
                    assert!(
                        entities.iter().all(|e| *e == 100) || entities.iter().all(|e| *e == 200),
                        "mixed snapshot: {entities:?}"
                    );
                    let s = engine.select(1.0, &mut rng);
                    assert!(matches!(s.entity_type_id.0, 100 | 200));
                    assert_eq!(s.outcome, SelectionOutcome::Rule);
                }
            });
        }

        for i in 0..200 {
            let entity = if i % 2 == 0 { 200 } else { 100 };
            engine.reload(&uniform_rows(entity)).unwrap();
        }
        stop.store(true, Ordering::Relaxed);
    });

    assert_eq!(engine.reload_count(), 201);
    assert!(engine.is_available());
}
