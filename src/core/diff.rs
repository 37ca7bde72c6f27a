//! Diff a freshly rendered template against a previously synthesized one.

use super::hasher;
use serde_json::Value;
use std::fmt;

/// Change to a single resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeAction {
    Add,
    Modify,
    Remove,
    NoChange,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "ADD"),
            Self::Modify => write!(f, "MODIFY"),
            Self::Remove => write!(f, "REMOVE"),
            Self::NoChange => write!(f, "NO-CHANGE"),
        }
    }
}

/// A single resource-level change.
#[derive(Debug, Clone)]
pub struct ResourceChange {
    pub logical_id: String,
    pub resource_type: String,
    pub action: ChangeAction,
}

/// All changes between two templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateDiff {
    pub changes: Vec<ResourceChange>,
    pub to_add: u32,
    pub to_modify: u32,
    pub to_remove: u32,
    pub unchanged: u32,
}

impl TemplateDiff {
    pub fn has_changes(&self) -> bool {
        self.to_add + self.to_modify + self.to_remove > 0
    }

    fn record(&mut self, id: &str, resource: &Value, action: ChangeAction) {
        match action {
            ChangeAction::Add => self.to_add += 1,
            ChangeAction::Modify => self.to_modify += 1,
            ChangeAction::Remove => self.to_remove += 1,
            ChangeAction::NoChange => self.unchanged += 1,
        }
        self.changes.push(ResourceChange {
            logical_id: id.to_string(),
            resource_type: resource["Type"].as_str().unwrap_or("?").to_string(),
            action,
        });
    }
}

/// Compare resources by fingerprint. New-template order first, then removals.
///
/// A missing previous template means every resource is an addition.
pub fn diff_templates(previous: Option<&Value>, current: &Value) -> TemplateDiff {
    let empty = serde_json::Map::new();
    let old = previous
        .and_then(|t| t["Resources"].as_object())
        .unwrap_or(&empty);
    let new = current["Resources"].as_object().unwrap_or(&empty);

    let mut diff = TemplateDiff::default();

    for (id, resource) in new {
        let action = match old.get(id) {
            None => ChangeAction::Add,
            Some(prev) if hasher::hash_json(prev) == hasher::hash_json(resource) => {
                ChangeAction::NoChange
            }
            Some(_) => ChangeAction::Modify,
        };
        diff.record(id, resource, action);
    }

    for (id, resource) in old {
        if !new.contains_key(id) {
            diff.record(id, resource, ChangeAction::Remove);
        }
    }

    diff
}
