use crate::pipeline::state::{ResearchState, StateUpdate, fields, is_set};
use serde_json::Value;
use std::collections::HashMap;

/// How an incoming value combines with what a field already holds
#[derive(Debug, Clone, Copy)]
pub enum MergePolicy {
    /// Keep the existing value once it is set
    FirstWins,
    /// Any non-null incoming value replaces the existing one
    LastWins,
    /// Arrays are concatenated without duplicates and objects gain missing
    /// keys. Other values behave like `FirstWins`.
    Union,
    /// `(existing, incoming) -> merged`
    Custom(fn(&Value, &Value) -> Value),
}

impl MergePolicy {
    /// Merge `incoming` into `current`. `None` means the field is left untouched.
    pub fn apply(&self, current: Option<&Value>, incoming: Value) -> Option<Value> {
        let current = current.filter(|v| is_set(v));
        match (self, current) {
            (_, None) => is_set(&incoming).then_some(incoming),
            (MergePolicy::FirstWins, Some(_)) => None,
            (MergePolicy::LastWins, Some(_)) => (!incoming.is_null()).then_some(incoming),
            (MergePolicy::Union, Some(existing)) => union(existing, incoming),
            (MergePolicy::Custom(reduce), Some(existing)) => Some(reduce(existing, &incoming)),
        }
    }
}

fn union(existing: &Value, incoming: Value) -> Option<Value> {
    match (existing, incoming) {
        (Value::Array(current), Value::Array(new)) => {
            let mut merged = current.clone();
            for item in new {
                if !merged.contains(&item) {
                    merged.push(item);
                }
            }
            (merged.len() != current.len()).then_some(Value::Array(merged))
        }
        (Value::Object(current), Value::Object(new)) => {
            let mut merged = current.clone();
            for (key, value) in new {
                merged.entry(key).or_insert(value);
            }
            (merged.len() != current.len()).then_some(Value::Object(merged))
        }
        _ => None,
    }
}

/// Per-field merge policy table for a [`ResearchState`]
#[derive(Debug, Clone)]
pub struct StateSchema {
    default: MergePolicy,
    policies: HashMap<String, MergePolicy>,
}

impl Default for StateSchema {
    fn default() -> Self {
        Self::research()
    }
}

impl StateSchema {
    /// A schema where every field uses `default`
    pub fn new(default: MergePolicy) -> Self {
        Self {
            default,
            policies: HashMap::new(),
        }
    }

    /// First write wins everywhere except `error`, where the newest error wins
    pub fn research() -> Self {
        Self::new(MergePolicy::FirstWins).with_policy(fields::ERROR, MergePolicy::LastWins)
    }

    pub fn with_policy(mut self, field: &str, policy: MergePolicy) -> Self {
        self.policies.insert(field.to_string(), policy);
        self
    }

    pub fn policy(&self, field: &str) -> MergePolicy {
        self.policies.get(field).copied().unwrap_or(self.default)
    }

    /// Applies every field of `update` to `state`. Returns the fields that changed.
    pub fn merge(&self, state: &mut ResearchState, update: StateUpdate) -> Vec<String> {
        let mut changed = Vec::new();
        for (field, incoming) in update {
            let policy = self.policy(&field);
            match policy.apply(state.get(&field), incoming) {
                Some(value) => {
                    state.put(field.clone(), value);
                    changed.push(field);
                }
                None => ::log::trace!("Merge of {} ignored ({:?})", field, policy),
            }
        }
        changed
    }
}
