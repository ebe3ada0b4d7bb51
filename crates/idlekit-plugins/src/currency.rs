//! Currencies: named amounts that can be gained, spent and checked

use idlekit_core::{
    identity, Bonus, Condition, Consumer, Engine, Error, Evaluator, Extension, Input, Modifier,
    Output, Payload, Plugin, Producer, Result, Value, ValueMap, Variant,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::any::Any;
use tracing::debug;

pub const PLUGIN_NAME: &str = "currency";

/// Bonus type scaling every gain of one currency
pub const GAIN_BONUS: &str = "/bonus/currency-gain";

/// Content definition of a currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyDefinition {
    pub id: String,
    #[serde(default)]
    pub start_amount: f64,
}

impl CurrencyDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            start_amount: 0.0,
        }
    }

    pub fn with_start_amount(mut self, amount: f64) -> Self {
        self.start_amount = amount;
        self
    }
}

/// Amount held per currency id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrencyState {
    pub amounts: IndexMap<String, f64>,
}

/// Owns every currency amount
#[derive(Debug, Default)]
pub struct CurrencyPlugin {
    definitions: IndexMap<String, CurrencyDefinition>,
    state: CurrencyState,
}

impl CurrencyPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register definitions, resetting each to its start amount
    pub fn load_content(&mut self, currencies: impl IntoIterator<Item = CurrencyDefinition>) {
        for currency in currencies {
            self.state
                .amounts
                .insert(currency.id.clone(), currency.start_amount);
            self.definitions.insert(currency.id.clone(), currency);
        }
    }

    pub fn supports(&self, id: &str) -> bool {
        self.definitions.contains_key(id)
    }

    pub fn definition(&self, id: &str) -> Result<&CurrencyDefinition> {
        self.definitions
            .get(id)
            .ok_or_else(|| Error::unknown("currency", id))
    }

    pub fn definitions(&self) -> impl Iterator<Item = &CurrencyDefinition> {
        self.definitions.values()
    }

    pub fn state(&self) -> &CurrencyState {
        &self.state
    }

    pub fn amount(&self, id: &str) -> Result<f64> {
        self.state
            .amounts
            .get(id)
            .copied()
            .ok_or_else(|| Error::unknown("currency", id))
    }

    pub fn has(&self, id: &str, amount: f64) -> Result<bool> {
        Ok(self.amount(id)? >= amount)
    }

    pub fn gain(&mut self, id: &str, amount: f64) -> Result<()> {
        *self.slot(id)? += amount;
        Ok(())
    }

    /// Subtract `amount` if it is held, reporting whether it was
    pub fn pay(&mut self, id: &str, amount: f64) -> Result<bool> {
        if !self.has(id, amount)? {
            return Ok(false);
        }
        self.lose(id, amount)?;
        Ok(true)
    }

    /// Subtract `amount` unconditionally
    pub fn lose(&mut self, id: &str, amount: f64) -> Result<()> {
        *self.slot(id)? -= amount;
        Ok(())
    }

    fn slot(&mut self, id: &str) -> Result<&mut f64> {
        self.state
            .amounts
            .get_mut(id)
            .ok_or_else(|| Error::unknown("currency", id))
    }
}

impl Plugin for CurrencyPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn save(&self) -> Value {
        let amounts: ValueMap = self
            .state
            .amounts
            .iter()
            .map(|(id, amount)| (id.clone(), Value::Float(*amount)))
            .collect();
        Value::Map(amounts)
    }

    fn load(&mut self, data: Value) -> Result<()> {
        let amounts = data
            .into_map()
            .ok_or_else(|| Error::invalid_save(PLUGIN_NAME, "expected a map of amounts"))?;
        for (id, amount) in amounts {
            let amount = amount.as_float().ok_or_else(|| {
                Error::invalid_save(PLUGIN_NAME, format!("amount of '{}' is not a number", id))
            })?;
            match self.state.amounts.get_mut(&id) {
                Some(slot) => *slot = amount,
                None => debug!(currency = %id, "skipping saved amount of unknown currency"),
            }
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn require_plugin(engine: &Engine) -> Result<()> {
    engine.plugin::<CurrencyPlugin>().map(|_| ())
}

/// `{type: "/currency/has", id, amount}`
#[derive(Debug, Clone, Copy, Default)]
pub struct HasCurrency;

impl Extension for HasCurrency {
    fn kind(&self) -> &str {
        "/currency/has"
    }

    fn attach(&self, engine: &Engine) -> Result<()> {
        require_plugin(engine)
    }
}

impl Evaluator for HasCurrency {
    fn evaluate(&self, condition: &Condition, engine: &Engine) -> Result<bool> {
        engine
            .plugin::<CurrencyPlugin>()?
            .has(condition.str_field("id")?, condition.float_field("amount")?)
    }
}

/// `{type: "/currency/spend", id, amount}`
#[derive(Debug, Clone, Copy, Default)]
pub struct SpendCurrency;

impl Extension for SpendCurrency {
    fn kind(&self) -> &str {
        "/currency/spend"
    }

    fn attach(&self, engine: &Engine) -> Result<()> {
        require_plugin(engine)
    }
}

impl Consumer for SpendCurrency {
    fn can_consume(&self, input: &Input, engine: &Engine) -> Result<bool> {
        engine
            .plugin::<CurrencyPlugin>()?
            .has(input.str_field("id")?, input.float_field("amount")?)
    }

    fn consume(&self, input: &Input, engine: &mut Engine) -> Result<()> {
        engine
            .plugin_mut::<CurrencyPlugin>()?
            .lose(input.str_field("id")?, input.float_field("amount")?)
    }
}

/// `{type: "/currency/gain", id, amount}`, scaled by the currency's gain bonus
#[derive(Debug, Clone, Copy, Default)]
pub struct GainCurrency;

impl Extension for GainCurrency {
    fn kind(&self) -> &str {
        "/currency/gain"
    }

    fn attach(&self, engine: &Engine) -> Result<()> {
        require_plugin(engine)
    }
}

impl Producer for GainCurrency {
    fn modify(&self, output: Output, engine: &Engine) -> Result<Output> {
        let query = Payload::new(GAIN_BONUS).with("id", output.str_field("id")?);
        output.scaled(engine.get_bonus(&query)?)
    }

    fn can_produce(&self, output: &Output, engine: &Engine) -> Result<bool> {
        Ok(engine
            .plugin::<CurrencyPlugin>()?
            .supports(output.str_field("id")?))
    }

    fn produce(&self, output: &Output, engine: &mut Engine) -> Result<()> {
        engine
            .plugin_mut::<CurrencyPlugin>()?
            .gain(output.str_field("id")?, output.float_field("amount")?)
    }
}

/// Multiplies gains of one currency: `{type: "/bonus/currency-gain", id, amount}`
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrencyGainModifier;

impl Extension for CurrencyGainModifier {
    fn kind(&self) -> &str {
        GAIN_BONUS
    }
}

impl Modifier for CurrencyGainModifier {
    fn variant(&self) -> Variant {
        Variant::Multiplicative
    }

    fn default_value(&self) -> f64 {
        1.0
    }

    fn stringify(&self, bonus: &Bonus) -> Result<String> {
        identity(bonus, &["id"])
    }
}

/// Register the plugin and its extensions
pub fn register(engine: &mut Engine, plugin: CurrencyPlugin) -> Result<()> {
    engine.register_plugin(plugin);
    engine.register_evaluator(HasCurrency)?;
    engine.register_consumer(SpendCurrency)?;
    engine.register_producer(GainCurrency)?;
    engine.register_modifier(CurrencyGainModifier)
}
