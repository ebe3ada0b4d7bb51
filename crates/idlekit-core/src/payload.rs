//! Structurally-typed payloads routed to extensions by their `type` tag
//!
//! Conditions, inputs, outputs, requests and bonuses all share one shape:
//! a discriminator plus an ordered map of dynamic fields. Cloning a payload
//! is a deep copy, which is what lets `modify` work on a private copy.

use crate::{Error, Result, Value, ValueMap};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A data record carrying a `type` discriminator and arbitrary fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(rename = "type")]
    kind: String,
    #[serde(flatten)]
    fields: ValueMap,
}

/// A payload evaluated by an [`Evaluator`](crate::Evaluator)
pub type Condition = Payload;
/// A payload consumed by a [`Consumer`](crate::Consumer)
pub type Input = Payload;
/// A payload produced by a [`Producer`](crate::Producer)
pub type Output = Payload;
/// A payload resolved by a [`Controller`](crate::Controller)
pub type Request = Payload;
/// A bonus query or contribution, grouped by a [`Modifier`](crate::Modifier)
pub type Bonus = Payload;

impl Payload {
    /// Create a payload with no fields
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: ValueMap::new(),
        }
    }

    /// Add a field
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// The discriminator this payload is routed by
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// All fields except the discriminator, in insertion order
    pub fn fields(&self) -> &ValueMap {
        &self.fields
    }

    /// Get a field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Set a field, returning the previous value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key.into(), value.into())
    }

    /// Get a required string field
    pub fn str_field(&self, key: &str) -> Result<&str> {
        let value = self.require(key)?;
        value
            .as_str()
            .ok_or_else(|| self.invalid(key, format!("must be a string, got {}", value.type_name())))
    }

    /// Get a required numeric field (ints are widened)
    pub fn float_field(&self, key: &str) -> Result<f64> {
        let value = self.require(key)?;
        value
            .as_float()
            .ok_or_else(|| self.invalid(key, format!("must be a number, got {}", value.type_name())))
    }

    /// Get a required integer field
    pub fn int_field(&self, key: &str) -> Result<i64> {
        let value = self.require(key)?;
        value
            .as_int()
            .ok_or_else(|| self.invalid(key, format!("must be an integer, got {}", value.type_name())))
    }

    /// Get a required nested payload
    pub fn payload_field(&self, key: &str) -> Result<Payload> {
        Payload::from_value(self.require(key)?.clone())
            .map_err(|e| self.invalid(key, format!("must be a payload ({})", e)))
    }

    /// Get a required list of nested payloads
    pub fn payload_list(&self, key: &str) -> Result<Vec<Payload>> {
        let value = self.require(key)?;
        let list = value
            .as_list()
            .ok_or_else(|| self.invalid(key, format!("must be a list, got {}", value.type_name())))?;
        list.iter()
            .cloned()
            .map(Payload::from_value)
            .collect::<Result<Vec<_>>>()
            .map_err(|e| self.invalid(key, format!("must contain payloads ({})", e)))
    }

    /// Return a copy with the numeric `amount` field multiplied by `factor`
    pub fn scaled(&self, factor: f64) -> Result<Payload> {
        let amount = self.float_field("amount")?;
        let mut copy = self.clone();
        copy.set("amount", amount * factor);
        Ok(copy)
    }

    /// Build a payload from a map value with a string `type` entry
    pub fn from_value(value: Value) -> Result<Payload> {
        let got = value.type_name();
        let mut fields = value.into_map().ok_or_else(|| Error::InvalidPayload {
            kind: "<unknown>".to_string(),
            field: "type".to_string(),
            reason: format!("payload must be a map, got {}", got),
        })?;
        match fields.shift_remove("type") {
            Some(Value::String(kind)) => Ok(Payload { kind, fields }),
            _ => Err(Error::InvalidPayload {
                kind: "<unknown>".to_string(),
                field: "type".to_string(),
                reason: "must be a string".to_string(),
            }),
        }
    }

    /// Convert into a map value with the discriminator under `type`
    pub fn into_value(self) -> Value {
        let mut map = ValueMap::with_capacity(self.fields.len() + 1);
        map.insert("type".to_string(), Value::String(self.kind));
        map.extend(self.fields);
        Value::Map(map)
    }

    fn require(&self, key: &str) -> Result<&Value> {
        self.fields
            .get(key)
            .ok_or_else(|| self.invalid(key, "is missing".to_string()))
    }

    fn invalid(&self, field: &str, reason: String) -> Error {
        Error::InvalidPayload {
            kind: self.kind.clone(),
            field: field.to_string(),
            reason,
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        for (key, value) in &self.fields {
            write!(f, " {}={}", key, value)?;
        }
        Ok(())
    }
}

impl From<Payload> for Value {
    fn from(payload: Payload) -> Self {
        payload.into_value()
    }
}
