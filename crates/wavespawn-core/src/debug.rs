//! Read-only diagnostics projection.
//!
//! [`DebugInfo`] is what tuning tools and overlays see. It is derived from a
//! snapshot and never fed back into gameplay.

use std::fmt::Write as _;

use serde::Serialize;
use wavespawn_types::{EntityTypeId, GameSeconds, RuleEnd, RuleId, SpawnRule};

use crate::filter::active_rules;
use crate::frequency::average_frequency;
use crate::snapshot::RuleSnapshot;

/// Per-rule diagnostic row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleDebug {
    /// Rule id.
    pub id: RuleId,
    /// Free-text description.
    pub description: String,
    /// Entity types the rule lists, in table order.
    pub entity_type_ids: Vec<EntityTypeId>,
    /// Draw weight per listed entity.
    pub spawn_weight: f64,
    /// Spawn-timer rate multiplier.
    pub spawn_frequency: f64,
    /// Strength multiplier.
    pub strength_multiplier: f64,
    /// Size multiplier.
    pub size_multiplier: f64,
    /// Window start in seconds.
    pub start_time: u64,
    /// Window end.
    pub end_time: RuleEnd,
}

impl From<&SpawnRule> for RuleDebug {
    fn from(rule: &SpawnRule) -> Self {
        Self {
            id: rule.id(),
            description: rule.description().to_owned(),
            entity_type_ids: rule.entity_type_ids().to_vec(),
            spawn_weight: rule.spawn_weight(),
            spawn_frequency: rule.spawn_frequency(),
            strength_multiplier: rule.strength_multiplier(),
            size_multiplier: rule.size_multiplier(),
            start_time: rule.start_time(),
            end_time: rule.end_time(),
        }
    }
}

/// State of the rule set at one game time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugInfo {
    /// Game time the projection was taken at.
    pub game_time: GameSeconds,
    /// Whether the engine holds a usable rule set.
    pub available: bool,
    /// Rules in the snapshot, including disabled ones.
    pub total_rules: usize,
    /// Rules active at `game_time`.
    pub active_rule_count: usize,
    /// Frequency multiplier the game loop would use at `game_time`.
    pub average_frequency: f64,
    /// Active rules in table order.
    pub rules: Vec<RuleDebug>,
}

impl DebugInfo {
    /// Project `snapshot` at `t`.
    ///
    /// An unavailable snapshot reports no active rules and a neutral
    /// frequency, matching what the engine hands to the game loop.
    pub fn capture(snapshot: &RuleSnapshot, t: GameSeconds) -> Self {
        let active = if snapshot.is_available() {
            active_rules(snapshot, t)
        } else {
            Vec::new()
        };
        Self {
            game_time: t,
            available: snapshot.is_available(),
            total_rules: snapshot.len(),
            active_rule_count: active.len(),
            average_frequency: average_frequency(&active),
            rules: active.iter().map(|r| RuleDebug::from(r.as_ref())).collect(),
        }
    }

    /// Compact text rendering, one line per active rule after a header.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.rules.len().saturating_add(1));
        lines.push(format!(
            "t={:.1}s available={} active={}/{} freq={:.3}",
            self.game_time,
            self.available,
            self.active_rule_count,
            self.total_rules,
            self.average_frequency,
        ));
        for rule in &self.rules {
            let mut entities = String::new();
            for (i, id) in rule.entity_type_ids.iter().enumerate() {
                if i > 0 {
                    entities.push(',');
                }
                let _ = write!(entities, "{id}");
            }
            lines.push(format!(
                "  #{} [{}..{}] w={} entities=[{}] {}",
                rule.id, rule.start_time, rule.end_time, rule.spawn_weight, entities, rule.description,
            ));
        }
        lines
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp, clippy::indexing_slicing)]
mod tests {
    use wavespawn_types::SpawnRuleParts;

    use super::*;

    fn snapshot() -> RuleSnapshot {
        let rule = |id: u32, end: RuleEnd, enabled: bool| {
            SpawnRule::new(SpawnRuleParts {
                id: RuleId(id),
                start_time: 0,
                end_time: end,
                entity_type_ids: vec![EntityTypeId(id), EntityTypeId(7)],
                spawn_weight: 0.5,
                spawn_frequency: 2.0,
                strength_multiplier: 1.0,
                size_multiplier: 1.0,
                enabled,
                description: format!("rule {id}"),
            })
            .unwrap()
        };
        RuleSnapshot::from_rules(vec![
            rule(1, RuleEnd::At(30), true),
            rule(2, RuleEnd::Open, true),
            rule(3, RuleEnd::Open, false),
        ])
        .unwrap()
    }

    #[test]
    fn capture_lists_active_rules_only() {
        let info = DebugInfo::capture(&snapshot(), 40.0);
        assert!(info.available);
        assert_eq!(info.total_rules, 3);
        assert_eq!(info.active_rule_count, 1);
        assert_eq!(info.rules[0].id, RuleId(2));
        assert_eq!(info.rules[0].description, "rule 2");
        assert_eq!(info.rules[0].entity_type_ids, vec![EntityTypeId(2), EntityTypeId(7)]);
        assert_eq!(info.average_frequency, 2.0);
    }

    #[test]
    fn unavailable_snapshot_reports_nothing_active() {
        let info = DebugInfo::capture(&snapshot().with_availability(false), 10.0);
        assert!(!info.available);
        assert_eq!(info.total_rules, 3);
        assert_eq!(info.active_rule_count, 0);
        assert_eq!(info.average_frequency, 1.0);
    }

    #[test]
    fn summary_has_header_and_rule_lines() {
        let lines = DebugInfo::capture(&snapshot(), 10.0).summary_lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("active=2/3"));
        assert!(lines[1].contains("#1 [0..30]"));
        assert!(lines[2].contains("[0..open]"));
        assert!(lines[2].contains("entities=[2,7]"));
    }

    #[test]
    fn serializes_to_json() {
        let json = serde_json::to_value(DebugInfo::capture(&snapshot(), 10.0)).unwrap();
        assert_eq!(json["active_rule_count"], 2);
        assert_eq!(json["rules"][1]["end_time"], "open");
        assert_eq!(json["rules"][0]["end_time"]["at"], 30);
    }
}
