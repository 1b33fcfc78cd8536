//! Immutable rule snapshots.
//!
//! A [`RuleSnapshot`] is built once by [`crate::store::load`] and never
//! changed. The engine replaces whole snapshots; rules are shared between
//! snapshots through [`Arc`] so marking a snapshot unavailable does not copy
//! rule data.

use std::collections::BTreeMap;
use std::sync::Arc;

use wavespawn_types::{RuleId, SpawnRule};

use crate::store::LoadError;

/// An ordered, fully validated rule set plus its availability flag.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSnapshot {
    rules: Vec<Arc<SpawnRule>>,
    available: bool,
}

impl RuleSnapshot {
    /// Build an available snapshot from rules in table order.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::DuplicateRuleId`] if two rules share an id. The
    /// reported row is the 1-based position of the second occurrence.
    pub fn from_rules(rules: Vec<SpawnRule>) -> Result<Self, LoadError> {
        let mut seen = BTreeMap::new();
        for (index, rule) in rules.iter().enumerate() {
            let row = index.saturating_add(1);
            if seen.insert(rule.id(), row).is_some() {
                return Err(LoadError::DuplicateRuleId { id: rule.id(), row });
            }
        }
        Ok(Self {
            rules: rules.into_iter().map(Arc::new).collect(),
            available: true,
        })
    }

    /// The empty snapshot an engine holds before its first successful load.
    pub const fn unavailable() -> Self {
        Self {
            rules: Vec::new(),
            available: false,
        }
    }

    /// Copy of this snapshot with a different availability flag. Rules are
    /// shared, not cloned.
    pub fn with_availability(&self, available: bool) -> Self {
        Self {
            rules: self.rules.clone(),
            available,
        }
    }

    /// All rules in table order, including disabled ones.
    pub fn rules(&self) -> &[Arc<SpawnRule>] {
        &self.rules
    }

    /// Look up a rule by id.
    pub fn find(&self, id: RuleId) -> Option<&Arc<SpawnRule>> {
        self.rules.iter().find(|r| r.id() == id)
    }

    /// Number of rules, including disabled ones.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the snapshot holds no rules at all.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether the last load attempt behind this snapshot succeeded.
    pub const fn is_available(&self) -> bool {
        self.available
    }
}

impl Default for RuleSnapshot {
    fn default() -> Self {
        Self::unavailable()
    }
}
