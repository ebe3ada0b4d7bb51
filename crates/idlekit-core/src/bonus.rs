//! Bonus aggregation
//!
//! Plugins publish contributions every tick. The engine groups them per plugin
//! by the identity string their modifier computes, and a bonus query reduces
//! every contribution sharing the query's identity.

use crate::{Bonus, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How contributions sharing an identity are combined
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Variant {
    /// `default + sum(amount)`
    Additive,
    /// `default * product(1 + amount)`
    Multiplicative,
    /// A variant name no reduction exists for; queries resolve to `0.0`
    Unknown(String),
}

impl Variant {
    /// Reduce contribution amounts, `None` for an unknown variant
    ///
    /// The default is the additive base but the multiplicative starting
    /// accumulator, so a multiplicative default of 10 scales every factor.
    pub fn reduce(&self, default: f64, amounts: impl IntoIterator<Item = f64>) -> Option<f64> {
        match self {
            Variant::Additive => Some(amounts.into_iter().fold(default, |acc, a| acc + a)),
            Variant::Multiplicative => {
                Some(amounts.into_iter().fold(default, |acc, a| acc * (1.0 + a)))
            }
            Variant::Unknown(_) => None,
        }
    }
}

impl From<&str> for Variant {
    fn from(name: &str) -> Self {
        match name {
            "additive" => Variant::Additive,
            "multiplicative" => Variant::Multiplicative,
            other => Variant::Unknown(other.to_string()),
        }
    }
}

impl From<String> for Variant {
    fn from(name: String) -> Self {
        Variant::from(name.as_str())
    }
}

impl From<Variant> for String {
    fn from(variant: Variant) -> Self {
        variant.to_string()
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Additive => write!(f, "additive"),
            Variant::Multiplicative => write!(f, "multiplicative"),
            Variant::Unknown(name) => write!(f, "{}", name),
        }
    }
}

/// One published contribution with its amount already validated
#[derive(Debug, Clone, PartialEq)]
pub struct BonusContribution {
    pub bonus: Bonus,
    pub amount: f64,
}

impl BonusContribution {
    /// Read the numeric `amount` of a published bonus
    pub fn new(bonus: Bonus) -> Result<Self> {
        let amount = bonus.float_field("amount")?;
        Ok(Self { bonus, amount })
    }
}

/// Contributions grouped by identity for one plugin
pub type ContributionSlot = IndexMap<String, Vec<BonusContribution>>;

/// `plugin name -> identity -> contributions`, rebuilt every tick
#[derive(Debug, Clone, Default)]
pub struct BonusTable {
    by_plugin: IndexMap<String, ContributionSlot>,
}

impl BonusTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty (or create) a plugin's slot
    pub fn reset_plugin(&mut self, plugin: &str) {
        self.by_plugin.insert(plugin.to_string(), ContributionSlot::new());
    }

    /// Record a contribution under a plugin and identity
    pub fn push(&mut self, plugin: &str, identity: String, contribution: BonusContribution) {
        self.by_plugin
            .entry(plugin.to_string())
            .or_default()
            .entry(identity)
            .or_default()
            .push(contribution);
    }

    /// Every contribution with this identity, across all plugins
    pub fn contributions<'a>(
        &'a self,
        identity: &'a str,
    ) -> impl Iterator<Item = &'a BonusContribution> + 'a {
        self.by_plugin
            .values()
            .filter_map(move |slot| slot.get(identity))
            .flatten()
    }

    /// A single plugin's slot
    pub fn plugin(&self, plugin: &str) -> Option<&ContributionSlot> {
        self.by_plugin.get(plugin)
    }

    /// Plugin names with a slot, in collection order
    pub fn plugins(&self) -> impl Iterator<Item = &str> {
        self.by_plugin.keys().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.by_plugin.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.by_plugin.values().all(|slot| slot.is_empty())
    }
}

/// Identity made of the bonus type followed by the listed fields
///
/// `identity(&bonus, &["id"])` on `{type: "/bonus/gain", id: "gold"}` gives
/// `"/bonus/gain:gold"`. Missing fields are an error so that a query never
/// silently matches a different group.
pub fn identity(bonus: &Bonus, keys: &[impl AsRef<str>]) -> Result<String> {
    let mut out = bonus.kind().to_string();
    for key in keys {
        let key = key.as_ref();
        let value = bonus.get(key).ok_or_else(|| crate::Error::InvalidPayload {
            kind: bonus.kind().to_string(),
            field: key.to_string(),
            reason: "is missing".to_string(),
        })?;
        out.push(':');
        out.push_str(&value.to_string());
    }
    Ok(out)
}
