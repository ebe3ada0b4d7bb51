//! Generators: content that turns inputs into outputs over time
//!
//! Each tick, every generator active at the start of the tick runs one
//! transaction: its conditions as the requirement, its input and output with
//! amounts scaled by `delta`. The transactions run with the plugin registered,
//! so generators may depend on or switch other generators.

use idlekit_core::{
    transaction, Condition, Engine, Error, EventQueue, Evaluator, Extension, Input, Output,
    Payload, Plugin, Producer, Result, Scheduled, Settled, Transaction, TransactionOutcome, Value,
    ValueMap,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::any::Any;
use tracing::{debug, trace};

pub const PLUGIN_NAME: &str = "generator";

/// Content definition of a generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorDefinition {
    pub id: String,
    #[serde(deserialize_with = "transaction::one_or_many")]
    pub output: Vec<Output>,
    #[serde(
        default,
        deserialize_with = "transaction::optional_one_or_many",
        skip_serializing_if = "Option::is_none"
    )]
    pub input: Option<Vec<Input>>,
    #[serde(
        default,
        deserialize_with = "transaction::optional_one_or_many",
        skip_serializing_if = "Option::is_none"
    )]
    pub conditions: Option<Vec<Condition>>,
}

impl GeneratorDefinition {
    pub fn new(id: impl Into<String>, output: Output) -> Self {
        Self {
            id: id.into(),
            output: vec![output],
            input: None,
            conditions: None,
        }
    }

    pub fn with_input(mut self, input: Input) -> Self {
        self.input.get_or_insert_with(Vec::new).push(input);
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.get_or_insert_with(Vec::new).push(condition);
        self
    }

    /// The transaction one tick of `delta` seconds runs
    ///
    /// Payloads without an `amount` field are used as they are.
    pub fn transaction(&self, delta: f64) -> Result<Transaction> {
        let scale = |payloads: &[Payload]| -> Result<Vec<Payload>> {
            payloads
                .iter()
                .map(|p| match p.get("amount") {
                    Some(_) => p.scaled(delta),
                    None => Ok(p.clone()),
                })
                .collect()
        };

        Ok(Transaction {
            requirement: self.conditions.clone(),
            input: self.input.as_deref().map(&scale).transpose()?,
            output: Some(scale(&self.output)?),
        })
    }
}

/// Why an active generator did not run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickFailure {
    ConditionsNotMet,
    CannotConsumeInput,
    CannotProduceOutput,
}

/// Notifications queued by the generator plugin
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratorEvent {
    Activated { id: String },
    Deactivated { id: String },
    TickFailed { id: String, reason: TickFailure },
    /// A generator ran; `output` holds the amounts before producer `modify`
    Ticked {
        id: String,
        delta: f64,
        input: Option<Vec<Input>>,
        output: Vec<Output>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratorState {
    pub active: IndexMap<String, bool>,
}

/// Owns generator definitions and which of them are active
#[derive(Debug, Default)]
pub struct GeneratorPlugin {
    definitions: IndexMap<String, GeneratorDefinition>,
    state: GeneratorState,
    events: EventQueue<GeneratorEvent>,
}

impl GeneratorPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register definitions; every loaded generator starts inactive
    pub fn load_content(&mut self, generators: impl IntoIterator<Item = GeneratorDefinition>) {
        for generator in generators {
            self.state.active.insert(generator.id.clone(), false);
            self.definitions.insert(generator.id.clone(), generator);
        }
    }

    pub fn supports(&self, id: &str) -> bool {
        self.definitions.contains_key(id)
    }

    pub fn generator(&self, id: &str) -> Result<&GeneratorDefinition> {
        self.definitions
            .get(id)
            .ok_or_else(|| Error::unknown("generator", id))
    }

    pub fn generators(&self) -> impl Iterator<Item = &GeneratorDefinition> {
        self.definitions.values()
    }

    pub fn is_active(&self, id: &str) -> Result<bool> {
        self.generator(id)?;
        Ok(self.state.active.get(id).copied().unwrap_or(false))
    }

    /// Activate a generator; an event is queued only if it was inactive
    pub fn activate(&mut self, id: &str) -> Result<()> {
        if !self.set_active(id, true)? {
            self.events.push(GeneratorEvent::Activated { id: id.to_string() });
        }
        Ok(())
    }

    /// Deactivate a generator; an event is queued only if it was active
    pub fn deactivate(&mut self, id: &str) -> Result<()> {
        if self.set_active(id, false)? {
            self.events.push(GeneratorEvent::Deactivated { id: id.to_string() });
        }
        Ok(())
    }

    /// Returns the previous state
    fn set_active(&mut self, id: &str, active: bool) -> Result<bool> {
        let was = self.is_active(id)?;
        self.state.active.insert(id.to_string(), active);
        Ok(was)
    }

    pub fn state(&self) -> &GeneratorState {
        &self.state
    }

    /// Take every queued event
    ///
    /// Events are kept until drained, up to
    /// [`DEFAULT_EVENT_CAPACITY`](idlekit_core::DEFAULT_EVENT_CAPACITY); past
    /// that the oldest are dropped.
    pub fn drain_events(&mut self) -> Vec<GeneratorEvent> {
        self.events.drain()
    }
}

impl Plugin for GeneratorPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    /// One transaction per generator active at the start of the tick
    fn schedule(&self, delta: f64) -> Result<Vec<Scheduled>> {
        self.state
            .active
            .iter()
            .filter(|(_, active)| **active)
            .map(|(id, _)| {
                let transaction = self.generator(id)?.transaction(delta)?;
                Ok(Scheduled::new(id.clone(), transaction))
            })
            .collect()
    }

    fn settle(&mut self, delta: f64, settled: Vec<Settled>) -> Result<()> {
        for Settled {
            key: id,
            transaction,
            outcome,
        } in settled
        {
            let reason = match outcome {
                TransactionOutcome::Completed => {
                    trace!(generator = %id, delta, "generator ticked");
                    self.events.push(GeneratorEvent::Ticked {
                        id,
                        delta,
                        input: transaction.input,
                        output: transaction.output.unwrap_or_default(),
                    });
                    continue;
                }
                TransactionOutcome::RequirementNotMet => TickFailure::ConditionsNotMet,
                TransactionOutcome::CannotConsume => TickFailure::CannotConsumeInput,
                TransactionOutcome::CannotProduce => TickFailure::CannotProduceOutput,
            };

            debug!(generator = %id, ?reason, "generator tick failed");
            self.events.push(GeneratorEvent::TickFailed { id, reason });
        }
        Ok(())
    }

    fn save(&self) -> Value {
        let active: ValueMap = self
            .state
            .active
            .iter()
            .map(|(id, active)| (id.clone(), Value::Bool(*active)))
            .collect();
        Value::Map(active)
    }

    fn load(&mut self, data: Value) -> Result<()> {
        let active = data
            .into_map()
            .ok_or_else(|| Error::invalid_save(PLUGIN_NAME, "expected a map of flags"))?;
        for (id, flag) in active {
            let flag = flag.as_bool().ok_or_else(|| {
                Error::invalid_save(PLUGIN_NAME, format!("flag of '{}' is not a bool", id))
            })?;
            if self.supports(&id) {
                self.state.active.insert(id, flag);
            } else {
                debug!(generator = %id, "skipping saved flag of unknown generator");
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
    engine.plugin::<GeneratorPlugin>().map(|_| ())
}

fn known(output: &Output, engine: &Engine) -> Result<bool> {
    Ok(engine
        .plugin::<GeneratorPlugin>()?
        .supports(output.str_field("id")?))
}

/// `{type: "/generator/activate", id}`
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivateGenerator;

impl Extension for ActivateGenerator {
    fn kind(&self) -> &str {
        "/generator/activate"
    }

    fn attach(&self, engine: &Engine) -> Result<()> {
        require_plugin(engine)
    }
}

impl Producer for ActivateGenerator {
    fn can_produce(&self, output: &Output, engine: &Engine) -> Result<bool> {
        known(output, engine)
    }

    fn produce(&self, output: &Output, engine: &mut Engine) -> Result<()> {
        engine
            .plugin_mut::<GeneratorPlugin>()?
            .activate(output.str_field("id")?)
    }
}

/// `{type: "/generator/deactivate", id}`
#[derive(Debug, Clone, Copy, Default)]
pub struct DeactivateGenerator;

impl Extension for DeactivateGenerator {
    fn kind(&self) -> &str {
        "/generator/deactivate"
    }

    fn attach(&self, engine: &Engine) -> Result<()> {
        require_plugin(engine)
    }
}

impl Producer for DeactivateGenerator {
    fn can_produce(&self, output: &Output, engine: &Engine) -> Result<bool> {
        known(output, engine)
    }

    fn produce(&self, output: &Output, engine: &mut Engine) -> Result<()> {
        engine
            .plugin_mut::<GeneratorPlugin>()?
            .deactivate(output.str_field("id")?)
    }
}

/// `{type: "/generator/is-active", id}`
#[derive(Debug, Clone, Copy, Default)]
pub struct IsGeneratorActive;

impl Extension for IsGeneratorActive {
    fn kind(&self) -> &str {
        "/generator/is-active"
    }

    fn attach(&self, engine: &Engine) -> Result<()> {
        require_plugin(engine)
    }
}

impl Evaluator for IsGeneratorActive {
    fn evaluate(&self, condition: &Condition, engine: &Engine) -> Result<bool> {
        engine
            .plugin::<GeneratorPlugin>()?
            .is_active(condition.str_field("id")?)
    }
}

/// Register the plugin and its extensions
pub fn register(engine: &mut Engine, plugin: GeneratorPlugin) -> Result<()> {
    engine.register_plugin(plugin);
    engine.register_producer(ActivateGenerator)?;
    engine.register_producer(DeactivateGenerator)?;
    engine.register_evaluator(IsGeneratorActive)
}
