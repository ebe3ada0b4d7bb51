//! Transactions: a requirement, an input and an output applied together
//!
//! A transaction is a value. The engine checks every present part first and
//! only then applies the input and the output, so a rejected transaction
//! never touches state.

use crate::{Condition, Input, Output, Payload};
use serde::{Deserialize, Deserializer, Serialize};

/// A requirement + input + output triple
///
/// Every part is optional; an absent part is vacuously satisfied. When
/// deserializing, each part accepts a single payload or a list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(
        default,
        deserialize_with = "optional_one_or_many",
        skip_serializing_if = "Option::is_none"
    )]
    pub requirement: Option<Vec<Condition>>,
    #[serde(
        default,
        deserialize_with = "optional_one_or_many",
        skip_serializing_if = "Option::is_none"
    )]
    pub input: Option<Vec<Input>>,
    #[serde(
        default,
        deserialize_with = "optional_one_or_many",
        skip_serializing_if = "Option::is_none"
    )]
    pub output: Option<Vec<Output>>,
}

impl Transaction {
    /// Create an empty transaction (always applicable)
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition to the requirement
    pub fn require(mut self, condition: Condition) -> Self {
        self.requirement.get_or_insert_with(Vec::new).push(condition);
        self
    }

    /// Add an input
    pub fn consume(mut self, input: Input) -> Self {
        self.input.get_or_insert_with(Vec::new).push(input);
        self
    }

    /// Add an output
    pub fn produce(mut self, output: Output) -> Self {
        self.output.get_or_insert_with(Vec::new).push(output);
        self
    }

    /// Set the whole requirement
    pub fn with_requirement(mut self, conditions: Vec<Condition>) -> Self {
        self.requirement = Some(conditions);
        self
    }

    /// Set the whole input
    pub fn with_input(mut self, inputs: Vec<Input>) -> Self {
        self.input = Some(inputs);
        self
    }

    /// Set the whole output
    pub fn with_output(mut self, outputs: Vec<Output>) -> Self {
        self.output = Some(outputs);
        self
    }
}

/// Why a transaction was or was not applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOutcome {
    /// All checks passed; input and output were applied
    Completed,
    /// The requirement evaluated to false
    RequirementNotMet,
    /// The input could not be consumed
    CannotConsume,
    /// The output could not be produced
    CannotProduce,
}

impl TransactionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TransactionOutcome::Completed)
    }
}

/// A transaction a plugin hands to the engine for the current tick
///
/// `key` is the plugin's own name for the work, such as a content id.
#[derive(Debug, Clone, PartialEq)]
pub struct Scheduled {
    pub key: String,
    pub transaction: Transaction,
}

impl Scheduled {
    pub fn new(key: impl Into<String>, transaction: Transaction) -> Self {
        Self {
            key: key.into(),
            transaction,
        }
    }
}

/// A scheduled transaction together with what the engine made of it
#[derive(Debug, Clone, PartialEq)]
pub struct Settled {
    pub key: String,
    pub transaction: Transaction,
    pub outcome: TransactionOutcome,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(Payload),
    Many(Vec<Payload>),
}

/// Deserialize a single payload or a list of payloads into a list
///
/// For content fields written either as `{"type": ..}` or `[{"type": ..}, ..]`.
pub fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<Payload>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(payload) => vec![payload],
        OneOrMany::Many(payloads) => payloads,
    })
}

/// [`one_or_many`] for an optional field; pair it with `#[serde(default)]`
pub fn optional_one_or_many<'de, D>(deserializer: D) -> Result<Option<Vec<Payload>>, D::Error>
where
    D: Deserializer<'de>,
{
    one_or_many(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_appends() {
        let tx = Transaction::new()
            .require(Payload::new("/currency/has").with("id", "gold"))
            .consume(Payload::new("/currency/spend").with("id", "gold"))
            .produce(Payload::new("/generator/activate").with("id", "farm"))
            .produce(Payload::new("/currency/gain").with("id", "gold"));

        assert_eq!(tx.requirement.as_ref().map(Vec::len), Some(1));
        assert_eq!(tx.input.as_ref().map(Vec::len), Some(1));
        assert_eq!(tx.output.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn test_empty_transaction_has_no_parts() {
        let tx = Transaction::new();
        assert!(tx.requirement.is_none() && tx.input.is_none() && tx.output.is_none());
    }

    #[test]
    fn test_deserialize_single_or_list() {
        let tx: Transaction = ron::from_str(
            r#"(
                requirement: {"type": "/currency/has", "id": "gold", "amount": 50.0},
                output: [
                    {"type": "/generator/activate", "id": "farm"},
                    {"type": "/currency/gain", "id": "gold", "amount": 10.0},
                ],
            )"#,
        )
        .unwrap();

        assert_eq!(tx.requirement.unwrap()[0].kind(), "/currency/has");
        assert!(tx.input.is_none());
        assert_eq!(tx.output.unwrap().len(), 2);
    }

    #[test]
    fn test_outcome() {
        assert!(TransactionOutcome::Completed.is_completed());
        assert!(!TransactionOutcome::CannotProduce.is_completed());
    }
}
