//! Active-rule filter.
//!
//! A rule is active at game time `t` iff it is enabled, `t >= start_time`,
//! and its window is open or `t <= end_time`. The filter is pure and keeps
//! table order.

use std::sync::Arc;

use wavespawn_types::{GameSeconds, SpawnRule};

use crate::snapshot::RuleSnapshot;

/// Rules of `snapshot` active at `t`, in table order.
///
/// Availability is not consulted here; the engine decides what an
/// unavailable snapshot means for the caller.
pub fn active_rules(snapshot: &RuleSnapshot, t: GameSeconds) -> Vec<Arc<SpawnRule>> {
    snapshot
        .rules()
        .iter()
        .filter(|rule| rule.is_active_at(t))
        .cloned()
        .collect()
}
