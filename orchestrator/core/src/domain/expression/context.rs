// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::collections::BTreeMap;

use super::Value;

/// Flat variable scope for one evaluation
///
/// Built per request from scene state, parameter defaults and modifier
/// overrides; never shared between goals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationContext {
    variables: BTreeMap<String, Value>,
}

impl EvaluationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// Merge JSON scalars, later values overwriting earlier ones.
    /// Non-scalar entries are ignored.
    pub fn extend_from_json<'a, I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (&'a String, &'a serde_json::Value)>,
    {
        for (name, value) in entries {
            if let Some(value) = Value::from_json(value) {
                self.variables.insert(name.clone(), value);
            }
        }
    }

    pub fn merge(&mut self, other: &EvaluationContext) {
        for (name, value) in &other.variables {
            self.variables.insert(name.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.variables.iter()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn test_extend_from_json_skips_non_scalars() {
        let mut source = BTreeMap::new();
        source.insert("leg_angle".to_string(), json!(15));
        source.insert("style".to_string(), json!("modern"));
        source.insert("tags".to_string(), json!(["a"]));

        let mut context = EvaluationContext::new().with("leg_angle", 0.0);
        context.extend_from_json(&source);

        assert_eq!(context.get("leg_angle"), Some(&Value::Number(15.0)));
        assert_eq!(context.get("style"), Some(&Value::from("modern")));
        assert!(!context.contains("tags"));
        assert_eq!(context.len(), 2);
    }
}
