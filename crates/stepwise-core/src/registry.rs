//! # Kind Registry
//!
//! Maps behavior and condition type names to factories, so a document
//! naming a type can be turned back into a live leaf.
//!
//! Unknown type names are load errors: a leaf the engine cannot run would
//! otherwise leave its step stuck with no diagnosable cause.

use crate::kinds::{
    BehaviorKind, ConditionKind, Delay, EmitSignal, ExecuteChapters, SignalCondition, Timeout,
};
use crate::types::StepwiseError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;

/// Builds a behavior kind from its persisted properties.
pub type BehaviorFactory = fn(Value) -> Result<Box<dyn BehaviorKind>, serde_json::Error>;

/// Builds a condition kind from its persisted properties.
pub type ConditionFactory = fn(Value) -> Result<Box<dyn ConditionKind>, serde_json::Error>;

/// Registered leaf kinds.
#[derive(Clone)]
pub struct KindRegistry {
    behaviors: BTreeMap<String, BehaviorFactory>,
    conditions: BTreeMap<String, ConditionFactory>,
}

impl KindRegistry {
    /// Create a registry with no kinds.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            behaviors: BTreeMap::new(),
            conditions: BTreeMap::new(),
        }
    }

    /// Register (or replace) a behavior kind.
    pub fn register_behavior(&mut self, type_name: impl Into<String>, factory: BehaviorFactory) {
        self.behaviors.insert(type_name.into(), factory);
    }

    /// Register (or replace) a condition kind.
    pub fn register_condition(&mut self, type_name: impl Into<String>, factory: ConditionFactory) {
        self.conditions.insert(type_name.into(), factory);
    }

    /// Build a behavior kind by type name.
    pub fn behavior(&self, type_name: &str, properties: Value) -> Result<Box<dyn BehaviorKind>, StepwiseError> {
        let factory = self
            .behaviors
            .get(type_name)
            .ok_or_else(|| StepwiseError::UnknownKind {
                category: "behavior",
                type_name: type_name.to_string(),
            })?;
        factory(normalize(properties)).map_err(|e| invalid(type_name, e))
    }

    /// Build a condition kind by type name.
    pub fn condition(&self, type_name: &str, properties: Value) -> Result<Box<dyn ConditionKind>, StepwiseError> {
        let factory = self
            .conditions
            .get(type_name)
            .ok_or_else(|| StepwiseError::UnknownKind {
                category: "condition",
                type_name: type_name.to_string(),
            })?;
        factory(normalize(properties)).map_err(|e| invalid(type_name, e))
    }

    /// Registered behavior type names.
    pub fn behavior_types(&self) -> impl Iterator<Item = &str> {
        self.behaviors.keys().map(String::as_str)
    }

    /// Registered condition type names.
    pub fn condition_types(&self) -> impl Iterator<Item = &str> {
        self.conditions.keys().map(String::as_str)
    }
}

impl Default for KindRegistry {
    /// Registry holding the built-in kinds.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register_behavior(Delay::TYPE_NAME, behavior::<Delay>);
        registry.register_behavior(EmitSignal::TYPE_NAME, behavior::<EmitSignal>);
        registry.register_behavior(ExecuteChapters::TYPE_NAME, behavior::<ExecuteChapters>);
        registry.register_condition(Timeout::TYPE_NAME, condition::<Timeout>);
        registry.register_condition(SignalCondition::TYPE_NAME, condition::<SignalCondition>);
        registry
    }
}

impl std::fmt::Debug for KindRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KindRegistry")
            .field("behaviors", &self.behaviors.keys().collect::<Vec<_>>())
            .field("conditions", &self.conditions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Factory for any behavior kind whose properties deserialize into it.
pub fn behavior<T>(properties: Value) -> Result<Box<dyn BehaviorKind>, serde_json::Error>
where
    T: BehaviorKind + DeserializeOwned + 'static,
{
    Ok(Box::new(serde_json::from_value::<T>(properties)?))
}

/// Factory for any condition kind whose properties deserialize into it.
pub fn condition<T>(properties: Value) -> Result<Box<dyn ConditionKind>, serde_json::Error>
where
    T: ConditionKind + DeserializeOwned + 'static,
{
    Ok(Box::new(serde_json::from_value::<T>(properties)?))
}

// Missing properties mean "all defaults".
fn normalize(properties: Value) -> Value {
    if properties.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        properties
    }
}

fn invalid(type_name: &str, error: serde_json::Error) -> StepwiseError {
    StepwiseError::InvalidProperties {
        type_name: type_name.to_string(),
        reason: error.to_string(),
    }
}
