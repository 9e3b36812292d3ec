//! Per-collection endpoint rules.
//!
//! The API is inconsistent about list payloads: some endpoints return a bare
//! array, others wrap it as `{"workouts": [...]}`. Each collection gets a
//! [`Shape`] describing how to flatten its payload, plus the other
//! collections whose cached responses go stale when it is mutated.

use serde_json::Value;
use std::collections::HashMap;

/// How to normalize a collection's payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Shape {
  #[default]
  AsIs,
  /// Replace `{field: [...]}` with the inner array. Objects without an array
  /// under `field` (single records) are left alone.
  UnwrapField(String),
}

impl Shape {
  pub fn apply(&self, payload: Value) -> Value {
    let field = match self {
      Shape::AsIs => return payload,
      Shape::UnwrapField(field) => field,
    };

    match payload {
      Value::Object(mut map) => match map.remove(field.as_str()) {
        Some(inner @ Value::Array(_)) => inner,
        Some(other) => {
          map.insert(field.clone(), other);
          Value::Object(map)
        }
        None => Value::Object(map),
      },
      other => other,
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct CollectionRule {
  pub shape: Shape,
  /// Collections whose cache entries embed data from this one.
  pub dependents: Vec<String>,
}

/// Lookup table from collection name (first path segment) to its rule.
#[derive(Debug, Clone)]
pub struct EndpointRules {
  rules: HashMap<String, CollectionRule>,
}

impl EndpointRules {
  /// A table with no rules: payloads pass through, no cross-invalidation.
  pub fn empty() -> Self {
    Self {
      rules: HashMap::new(),
    }
  }

  pub fn with_shape(mut self, collection: &str, shape: Shape) -> Self {
    self.rules.entry(collection.to_string()).or_default().shape = shape;
    self
  }

  pub fn with_dependent(mut self, collection: &str, dependent: &str) -> Self {
    let rule = self.rules.entry(collection.to_string()).or_default();
    if !rule.dependents.iter().any(|d| d == dependent) {
      rule.dependents.push(dependent.to_string());
    }
    self
  }

  pub fn rule(&self, collection: &str) -> Option<&CollectionRule> {
    self.rules.get(collection)
  }

  /// Flatten `payload` according to the rule for `endpoint`'s collection.
  pub fn normalize(&self, endpoint: &str, payload: Value) -> Value {
    match collection_of(endpoint).and_then(|c| self.rules.get(c)) {
      Some(rule) => rule.shape.apply(payload),
      None => payload,
    }
  }

  pub fn dependents(&self, collection: &str) -> &[String] {
    self
      .rules
      .get(collection)
      .map(|rule| rule.dependents.as_slice())
      .unwrap_or_default()
  }
}

impl Default for EndpointRules {
  fn default() -> Self {
    Self::empty()
      .with_shape("workouts", Shape::UnwrapField("workouts".to_string()))
      .with_shape("clients", Shape::UnwrapField("clients".to_string()))
      // Workout listings embed the client's display name.
      .with_dependent("clients", "workouts")
      // Saving a scan creates a workout.
      .with_dependent("ocr", "workouts")
  }
}

/// Endpoint path without query string or fragment.
pub fn path_of(endpoint: &str) -> &str {
  endpoint
    .split(|c| c == '?' || c == '#')
    .next()
    .unwrap_or_default()
}

/// First path segment of an endpoint, e.g. `clients` for `/clients/42`.
pub fn collection_of(endpoint: &str) -> Option<&str> {
  path_of(endpoint)
    .trim_start_matches('/')
    .split('/')
    .next()
    .filter(|segment| !segment.is_empty())
}
