//! The engine: extension registries, plugin host and bonus table
//!
//! Every query and effect is routed by payload `type` to a registered
//! extension. Extensions are handed the engine on each call instead of
//! holding a reference to it.

use crate::{
    bonus::{BonusContribution, BonusTable},
    persistence::EngineSaveData,
    registry::{ExtensionKind, Registry},
    Bonus, Condition, Consumer, Controller, Error, Evaluator, Input, Modifier, Output, Plugin,
    Producer, Request, Result, Scheduled, Settled, Transaction, TransactionOutcome,
};
use indexmap::IndexMap;
use std::any::type_name;
use std::rc::Rc;
use tracing::{debug, error, warn};

/// Hosts plugins and extensions, and executes conditions, effects and transactions
///
/// Single-threaded by construction: extensions are shared through `Rc`, so an
/// engine can never be touched from two threads.
pub struct Engine {
    plugins: IndexMap<String, Box<dyn Plugin>>,
    evaluators: Registry<dyn Evaluator>,
    consumers: Registry<dyn Consumer>,
    producers: Registry<dyn Producer>,
    controllers: Registry<dyn Controller>,
    modifiers: Registry<dyn Modifier>,
    bonuses: BonusTable,
}

impl Engine {
    /// Create an engine with no plugins or extensions
    pub fn new() -> Self {
        Self {
            plugins: IndexMap::new(),
            evaluators: Registry::new(ExtensionKind::Evaluator),
            consumers: Registry::new(ExtensionKind::Consumer),
            producers: Registry::new(ExtensionKind::Producer),
            controllers: Registry::new(ExtensionKind::Controller),
            modifiers: Registry::new(ExtensionKind::Modifier),
            bonuses: BonusTable::new(),
        }
    }

    /// Start building an engine
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    // === Registration ===

    /// Add a plugin under its name, replacing any plugin with the same name
    pub fn register_plugin(&mut self, plugin: impl Plugin) {
        self.insert_plugin(Box::new(plugin));
    }

    fn insert_plugin(&mut self, plugin: Box<dyn Plugin>) {
        let name = plugin.name().to_string();
        debug!(plugin = %name, "registering plugin");
        if self.plugins.insert(name.clone(), plugin).is_some() {
            warn!(plugin = %name, "duplicate registration replaced the previous plugin");
        }
    }

    /// Attach and register an evaluator
    pub fn register_evaluator(&mut self, evaluator: impl Evaluator + 'static) -> Result<()> {
        self.insert_evaluator(Rc::new(evaluator))
    }

    fn insert_evaluator(&mut self, evaluator: Rc<dyn Evaluator>) -> Result<()> {
        evaluator.attach(self)?;
        debug!(extension = evaluator.kind(), "registering evaluator");
        self.evaluators.insert(evaluator);
        Ok(())
    }

    /// Attach and register a consumer
    pub fn register_consumer(&mut self, consumer: impl Consumer + 'static) -> Result<()> {
        self.insert_consumer(Rc::new(consumer))
    }

    fn insert_consumer(&mut self, consumer: Rc<dyn Consumer>) -> Result<()> {
        consumer.attach(self)?;
        debug!(extension = consumer.kind(), "registering consumer");
        self.consumers.insert(consumer);
        Ok(())
    }

    /// Attach and register a producer
    pub fn register_producer(&mut self, producer: impl Producer + 'static) -> Result<()> {
        self.insert_producer(Rc::new(producer))
    }

    fn insert_producer(&mut self, producer: Rc<dyn Producer>) -> Result<()> {
        producer.attach(self)?;
        debug!(extension = producer.kind(), "registering producer");
        self.producers.insert(producer);
        Ok(())
    }

    /// Attach and register a controller
    pub fn register_controller(&mut self, controller: impl Controller + 'static) -> Result<()> {
        self.insert_controller(Rc::new(controller))
    }

    fn insert_controller(&mut self, controller: Rc<dyn Controller>) -> Result<()> {
        controller.attach(self)?;
        debug!(extension = controller.kind(), "registering controller");
        self.controllers.insert(controller);
        Ok(())
    }

    /// Attach and register a modifier
    pub fn register_modifier(&mut self, modifier: impl Modifier + 'static) -> Result<()> {
        self.insert_modifier(Rc::new(modifier))
    }

    fn insert_modifier(&mut self, modifier: Rc<dyn Modifier>) -> Result<()> {
        modifier.attach(self)?;
        debug!(extension = modifier.kind(), "registering modifier");
        self.modifiers.insert(modifier);
        Ok(())
    }

    pub fn evaluators(&self) -> &Registry<dyn Evaluator> {
        &self.evaluators
    }

    pub fn consumers(&self) -> &Registry<dyn Consumer> {
        &self.consumers
    }

    pub fn producers(&self) -> &Registry<dyn Producer> {
        &self.producers
    }

    pub fn controllers(&self) -> &Registry<dyn Controller> {
        &self.controllers
    }

    pub fn modifiers(&self) -> &Registry<dyn Modifier> {
        &self.modifiers
    }

    // === Conditions ===

    /// Whether every condition holds; an empty slice holds
    pub fn evaluate(&self, conditions: &[Condition]) -> Result<bool> {
        for condition in conditions {
            if !self.evaluate_one(condition)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Whether a single condition holds
    pub fn evaluate_one(&self, condition: &Condition) -> Result<bool> {
        let evaluator = self.evaluators.get(condition.kind())?;
        let modified = evaluator.modify(condition.clone(), self)?;
        evaluator.evaluate(&modified, self)
    }

    /// The condition as its evaluator would see it
    pub fn modify_condition(&self, condition: &Condition) -> Result<Condition> {
        let evaluator = self.evaluators.get(condition.kind())?;
        evaluator.modify(condition.clone(), self)
    }

    // === Inputs ===

    /// Whether every input can be consumed, without side effects
    pub fn can_consume(&self, inputs: &[Input]) -> Result<bool> {
        for input in inputs {
            let consumer = self.consumers.get(input.kind())?;
            let modified = consumer.modify(input.clone(), self)?;
            if !consumer.can_consume(&modified, self)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Consume every input without checking feasibility first
    ///
    /// Call [`Engine::can_consume`] first when all-or-nothing matters.
    pub fn consume(&mut self, inputs: &[Input]) -> Result<()> {
        for input in inputs {
            let consumer = self.consumers.get(input.kind())?;
            let modified = consumer.modify(input.clone(), self)?;
            consumer.consume(&modified, self)?;
        }
        Ok(())
    }

    /// The input as its consumer would see it
    pub fn modify_input(&self, input: &Input) -> Result<Input> {
        let consumer = self.consumers.get(input.kind())?;
        consumer.modify(input.clone(), self)
    }

    // === Outputs ===

    /// Whether every output can be produced, without side effects
    pub fn can_produce(&self, outputs: &[Output]) -> Result<bool> {
        for output in outputs {
            let producer = self.producers.get(output.kind())?;
            let modified = producer.modify(output.clone(), self)?;
            if !producer.can_produce(&modified, self)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Produce every output without checking feasibility first
    ///
    /// Call [`Engine::can_produce`] first when all-or-nothing matters.
    pub fn produce(&mut self, outputs: &[Output]) -> Result<()> {
        for output in outputs {
            let producer = self.producers.get(output.kind())?;
            let modified = producer.modify(output.clone(), self)?;
            producer.produce(&modified, self)?;
        }
        Ok(())
    }

    /// The output as its producer would see it
    pub fn modify_output(&self, output: &Output) -> Result<Output> {
        let producer = self.producers.get(output.kind())?;
        producer.modify(output.clone(), self)
    }

    // === Requests ===

    /// Hand a request to its controller
    ///
    /// No feasibility check and no atomicity: the controller validates.
    pub fn request(&mut self, request: &Request) -> Result<()> {
        let controller = self.controllers.get(request.kind())?;
        controller.resolve(request, self)
    }

    // === Transactions ===

    /// Apply a transaction if every present part passes, reporting why not otherwise
    ///
    /// Nothing is applied until the requirement, input and output checks have
    /// all passed. There is no rollback: the guarantee holds as long as
    /// `can_consume`/`can_produce` predict `consume`/`produce`.
    pub fn execute_transaction(&mut self, transaction: &Transaction) -> Result<TransactionOutcome> {
        if let Some(requirement) = &transaction.requirement {
            if !self.evaluate(requirement)? {
                debug!("transaction rejected: requirement not met");
                return Ok(TransactionOutcome::RequirementNotMet);
            }
        }

        if let Some(input) = &transaction.input {
            if !self.can_consume(input)? {
                debug!("transaction rejected: input cannot be consumed");
                return Ok(TransactionOutcome::CannotConsume);
            }
        }

        if let Some(output) = &transaction.output {
            if !self.can_produce(output)? {
                debug!("transaction rejected: output cannot be produced");
                return Ok(TransactionOutcome::CannotProduce);
            }
        }

        if let Some(input) = &transaction.input {
            self.consume(input)?;
        }

        if let Some(output) = &transaction.output {
            self.produce(output)?;
        }

        Ok(TransactionOutcome::Completed)
    }

    /// Apply a transaction if every present part passes
    pub fn handle_transaction(&mut self, transaction: &Transaction) -> Result<bool> {
        Ok(self.execute_transaction(transaction)?.is_completed())
    }

    // === Bonuses ===

    /// Reduce every active contribution sharing the query's identity
    ///
    /// A modifier with an unknown variant logs an error and yields `0.0`.
    pub fn get_bonus(&self, bonus: &Bonus) -> Result<f64> {
        let modifier = self.modifiers.get(bonus.kind())?;
        let identity = modifier.stringify(bonus)?;
        let amounts = self.bonuses.contributions(&identity).map(|c| c.amount);

        let variant = modifier.variant();
        match variant.reduce(modifier.default_value(), amounts) {
            Some(total) => Ok(total),
            None => {
                error!(
                    modifier = modifier.kind(),
                    "unknown variant '{}' for modifier '{}'",
                    variant,
                    modifier.kind()
                );
                Ok(0.0)
            }
        }
    }

    /// The contributions collected at the start of the current tick
    pub fn active_bonuses(&self) -> &BonusTable {
        &self.bonuses
    }

    /// Work that must happen before any plugin or feature logic of a tick
    pub fn pre_tick(&mut self) -> Result<()> {
        self.collect_bonuses()
    }

    /// Rebuild the bonus table from every plugin's current contributions
    ///
    /// The table is built from scratch and only swapped in once every
    /// contribution has been grouped.
    fn collect_bonuses(&mut self) -> Result<()> {
        let mut table = BonusTable::new();
        for (name, plugin) in &self.plugins {
            table.reset_plugin(name);
            for bonus in plugin.bonuses() {
                let modifier = self.modifiers.get(bonus.kind())?;
                let identity = modifier.stringify(&bonus)?;
                table.push(name, identity, BonusContribution::new(bonus)?);
            }
        }
        self.bonuses = table;
        Ok(())
    }

    // === Plugins ===

    /// Look up a plugin by name
    pub fn plugin_named(&self, name: &str) -> Option<&dyn Plugin> {
        self.plugins.get(name).map(|p| &**p)
    }

    /// Check whether a plugin with this name is hosted
    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Hosted plugins in registration order
    pub fn plugins(&self) -> impl Iterator<Item = &dyn Plugin> {
        self.plugins.values().map(|p| &**p)
    }

    /// Typed access to the first hosted plugin of type `P`
    pub fn plugin<P: Plugin>(&self) -> Result<&P> {
        self.plugins
            .values()
            .find_map(|p| p.as_any().downcast_ref::<P>())
            .ok_or_else(|| Error::PluginNotFound(type_name::<P>().to_string()))
    }

    /// Typed mutable access to the first hosted plugin of type `P`
    pub fn plugin_mut<P: Plugin>(&mut self) -> Result<&mut P> {
        self.plugins
            .values_mut()
            .find_map(|p| p.as_any_mut().downcast_mut::<P>())
            .ok_or_else(|| Error::PluginNotFound(type_name::<P>().to_string()))
    }

    /// Run `f` with a plugin detached from the engine
    ///
    /// The plugin can mutate itself while calling back into the engine. It is
    /// invisible through the engine until `f` returns, and it is put back at
    /// its original position whether or not `f` fails.
    pub fn with_plugin<P, R>(&mut self, f: impl FnOnce(&mut P, &mut Engine) -> Result<R>) -> Result<R>
    where
        P: Plugin,
    {
        let index = self
            .plugins
            .values()
            .position(|p| p.as_any().is::<P>())
            .ok_or_else(|| Error::PluginNotFound(type_name::<P>().to_string()))?;

        self.detached(index, |plugin, engine| {
            let plugin = plugin
                .as_any_mut()
                .downcast_mut::<P>()
                .ok_or_else(|| Error::PluginNotFound(type_name::<P>().to_string()))?;
            f(plugin, engine)
        })
    }

    /// Advance every plugin in registration order
    ///
    /// For each plugin, its scheduled transactions run first with the plugin
    /// in place and are handed back through `settle`. Its `tick` hook then runs
    /// with the plugin detached.
    pub fn tick_plugins(&mut self, delta: f64) -> Result<()> {
        for index in 0..self.plugins.len() {
            self.run_scheduled(index, delta)?;
            self.detached(index, |plugin, engine| plugin.tick(delta, engine))?;
        }
        Ok(())
    }

    fn run_scheduled(&mut self, index: usize, delta: f64) -> Result<()> {
        let scheduled = match self.plugins.get_index(index) {
            Some((_, plugin)) => plugin.schedule(delta)?,
            None => return Ok(()),
        };
        if scheduled.is_empty() {
            return Ok(());
        }

        let mut settled = Vec::with_capacity(scheduled.len());
        for Scheduled { key, transaction } in scheduled {
            let outcome = self.execute_transaction(&transaction)?;
            settled.push(Settled {
                key,
                transaction,
                outcome,
            });
        }

        let (_, plugin) = self
            .plugins
            .get_index_mut(index)
            .ok_or_else(|| Error::PluginNotFound(format!("plugin #{}", index)))?;
        plugin.settle(delta, settled)
    }

    fn detached<R>(
        &mut self,
        index: usize,
        f: impl FnOnce(&mut dyn Plugin, &mut Engine) -> Result<R>,
    ) -> Result<R> {
        let (name, mut plugin) = self
            .plugins
            .shift_remove_index(index)
            .ok_or_else(|| Error::PluginNotFound(format!("plugin #{}", index)))?;

        let result = f(&mut *plugin, self);

        let index = index.min(self.plugins.len());
        self.plugins.shift_insert(index, name, plugin);
        result
    }

    // === Persistence ===

    /// Snapshot every plugin's state under its name
    pub fn save(&self) -> EngineSaveData {
        self.plugins
            .iter()
            .map(|(name, plugin)| (name.clone(), plugin.save()))
            .collect()
    }

    /// Restore plugins present in `data`; absent plugins are left untouched
    ///
    /// If a plugin rejects its data, every plugin is put back to the state
    /// saved just before the call and the rejection is returned.
    pub fn load(&mut self, data: EngineSaveData) -> Result<()> {
        let previous = self.save();
        if let Err(error) = self.apply(data) {
            warn!(%error, "load failed, restoring previous plugin state");
            self.apply(previous)?;
            return Err(error);
        }
        Ok(())
    }

    fn apply(&mut self, mut data: EngineSaveData) -> Result<()> {
        for (name, plugin) in self.plugins.iter_mut() {
            if let Some(state) = data.shift_remove(name) {
                debug!(plugin = %name, "loading plugin state");
                plugin.load(state)?;
            }
        }
        Ok(())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("plugins", &self.plugins.keys().collect::<Vec<_>>())
            .field("evaluators", &self.evaluators)
            .field("consumers", &self.consumers)
            .field("producers", &self.producers)
            .field("controllers", &self.controllers)
            .field("modifiers", &self.modifiers)
            .finish()
    }
}

/// Lists the plugins and extensions an [`Engine`] starts with
///
/// Plugins are registered before any extension so that `attach` can find them.
#[derive(Default)]
pub struct EngineBuilder {
    plugins: Vec<Box<dyn Plugin>>,
    evaluators: Vec<Rc<dyn Evaluator>>,
    consumers: Vec<Rc<dyn Consumer>>,
    producers: Vec<Rc<dyn Producer>>,
    controllers: Vec<Rc<dyn Controller>>,
    modifiers: Vec<Rc<dyn Modifier>>,
}

impl EngineBuilder {
    pub fn plugin(mut self, plugin: impl Plugin) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    pub fn evaluator(mut self, evaluator: impl Evaluator + 'static) -> Self {
        self.evaluators.push(Rc::new(evaluator));
        self
    }

    pub fn consumer(mut self, consumer: impl Consumer + 'static) -> Self {
        self.consumers.push(Rc::new(consumer));
        self
    }

    pub fn producer(mut self, producer: impl Producer + 'static) -> Self {
        self.producers.push(Rc::new(producer));
        self
    }

    pub fn controller(mut self, controller: impl Controller + 'static) -> Self {
        self.controllers.push(Rc::new(controller));
        self
    }

    pub fn modifier(mut self, modifier: impl Modifier + 'static) -> Self {
        self.modifiers.push(Rc::new(modifier));
        self
    }

    /// Register everything, attaching each extension
    pub fn build(self) -> Result<Engine> {
        let mut engine = Engine::new();
        for plugin in self.plugins {
            engine.insert_plugin(plugin);
        }
        for evaluator in self.evaluators {
            engine.insert_evaluator(evaluator)?;
        }
        for consumer in self.consumers {
            engine.insert_consumer(consumer)?;
        }
        for producer in self.producers {
            engine.insert_producer(producer)?;
        }
        for controller in self.controllers {
            engine.insert_controller(controller)?;
        }
        for modifier in self.modifiers {
            engine.insert_modifier(modifier)?;
        }
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Extension, Payload, Value, Variant};
    use std::any::Any;

    /// A counter plugin: `/counter/at-least` reads it, `/counter/take` and
    /// `/counter/add` change it
    #[derive(Default)]
    struct Counter {
        value: f64,
        bonus: Option<f64>,
        scheduled: Vec<Transaction>,
        settled: Vec<TransactionOutcome>,
    }

    impl Plugin for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn bonuses(&self) -> Vec<Bonus> {
            self.bonus
                .map(|amount| vec![Payload::new("/bonus/add").with("amount", amount)])
                .unwrap_or_default()
        }

        fn schedule(&self, _delta: f64) -> Result<Vec<Scheduled>> {
            Ok(self
                .scheduled
                .iter()
                .map(|tx| Scheduled::new("counter", tx.clone()))
                .collect())
        }

        fn settle(&mut self, _delta: f64, settled: Vec<Settled>) -> Result<()> {
            self.settled.extend(settled.into_iter().map(|s| s.outcome));
            Ok(())
        }

        fn tick(&mut self, delta: f64, engine: &mut Engine) -> Result<()> {
            self.value += delta;
            assert!(!engine.has_plugin("counter"));
            Ok(())
        }

        fn save(&self) -> Value {
            Value::Float(self.value)
        }

        fn load(&mut self, data: Value) -> Result<()> {
            self.value = data
                .as_float()
                .ok_or_else(|| Error::invalid_save("counter", "expected a number"))?;
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    struct AtLeast;

    impl Extension for AtLeast {
        fn kind(&self) -> &str {
            "/counter/at-least"
        }
    }

    impl Evaluator for AtLeast {
        fn modify(&self, condition: Condition, _engine: &Engine) -> Result<Condition> {
            let mut condition = condition;
            let amount = condition.float_field("amount")?;
            condition.set("amount", amount * 2.0);
            Ok(condition)
        }

        fn evaluate(&self, condition: &Condition, engine: &Engine) -> Result<bool> {
            Ok(engine.plugin::<Counter>()?.value >= condition.float_field("amount")?)
        }
    }

    struct Take;

    impl Extension for Take {
        fn kind(&self) -> &str {
            "/counter/take"
        }
    }

    impl Consumer for Take {
        fn can_consume(&self, input: &Input, engine: &Engine) -> Result<bool> {
            Ok(engine.plugin::<Counter>()?.value >= input.float_field("amount")?)
        }

        fn consume(&self, input: &Input, engine: &mut Engine) -> Result<()> {
            engine.plugin_mut::<Counter>()?.value -= input.float_field("amount")?;
            Ok(())
        }
    }

    struct Add;

    impl Extension for Add {
        fn kind(&self) -> &str {
            "/counter/add"
        }

        fn attach(&self, engine: &Engine) -> Result<()> {
            engine.plugin::<Counter>().map(|_| ())
        }
    }

    impl Producer for Add {
        fn can_produce(&self, output: &Output, _engine: &Engine) -> Result<bool> {
            Ok(output.float_field("amount")? >= 0.0)
        }

        fn produce(&self, output: &Output, engine: &mut Engine) -> Result<()> {
            engine.plugin_mut::<Counter>()?.value += output.float_field("amount")?;
            Ok(())
        }
    }

    struct Reset;

    impl Extension for Reset {
        fn kind(&self) -> &str {
            "/counter/reset"
        }
    }

    impl Controller for Reset {
        fn resolve(&self, _request: &Request, engine: &mut Engine) -> Result<()> {
            engine.plugin_mut::<Counter>()?.value = 0.0;
            Ok(())
        }
    }

    struct AddBonus(Variant, f64);

    impl Extension for AddBonus {
        fn kind(&self) -> &str {
            "/bonus/add"
        }
    }

    impl Modifier for AddBonus {
        fn variant(&self) -> Variant {
            self.0.clone()
        }

        fn default_value(&self) -> f64 {
            self.1
        }

        fn stringify(&self, bonus: &Bonus) -> Result<String> {
            Ok(bonus.kind().to_string())
        }
    }

    fn engine(value: f64) -> Engine {
        Engine::builder()
            .plugin(Counter {
                value,
                ..Counter::default()
            })
            .evaluator(AtLeast)
            .consumer(Take)
            .producer(Add)
            .controller(Reset)
            .modifier(AddBonus(Variant::Additive, 1.0))
            .build()
            .unwrap()
    }

    fn value(engine: &Engine) -> f64 {
        engine.plugin::<Counter>().unwrap().value
    }

    fn at_least(amount: f64) -> Condition {
        Payload::new("/counter/at-least").with("amount", amount)
    }

    fn take(amount: f64) -> Input {
        Payload::new("/counter/take").with("amount", amount)
    }

    fn add(amount: f64) -> Output {
        Payload::new("/counter/add").with("amount", amount)
    }

    #[test]
    fn test_evaluate_empty_is_true() {
        assert!(engine(0.0).evaluate(&[]).unwrap());
    }

    #[test]
    fn test_evaluate_single_matches_slice() {
        let engine = engine(10.0);
        for amount in [1.0, 5.0, 6.0] {
            let c = at_least(amount);
            assert_eq!(
                engine.evaluate(std::slice::from_ref(&c)).unwrap(),
                engine.evaluate_one(&c).unwrap()
            );
        }
    }

    #[test]
    fn test_modify_sees_a_copy() {
        let engine = engine(10.0);
        let condition = at_least(5.0);

        // modified threshold is 10, so the condition holds
        assert!(engine.evaluate_one(&condition).unwrap());
        assert_eq!(condition.float_field("amount").unwrap(), 5.0);
        assert_eq!(
            engine.modify_condition(&condition).unwrap().float_field("amount").unwrap(),
            10.0
        );
        assert!(!engine.evaluate_one(&at_least(6.0)).unwrap());
    }

    #[test]
    fn test_unknown_condition_type() {
        let err = engine(0.0)
            .evaluate_one(&Payload::new("/unknown"))
            .unwrap_err();
        assert!(matches!(err, Error::ConditionNotFound { ref kind, .. } if kind == "/unknown"));
        assert!(err.to_string().contains("/counter/at-least"));
    }

    #[test]
    fn test_unknown_input_output_controller_modifier() {
        let mut engine = engine(0.0);
        let unknown = Payload::new("/nope").with("amount", 1.0);

        assert!(matches!(engine.can_consume(&[unknown.clone()]), Err(Error::InputNotFound { .. })));
        assert!(matches!(engine.produce(&[unknown.clone()]), Err(Error::OutputNotFound { .. })));
        assert!(matches!(engine.request(&unknown), Err(Error::ControllerNotFound { .. })));
        assert!(matches!(engine.get_bonus(&unknown), Err(Error::ModifierNotFound { .. })));
    }

    #[test]
    fn test_transaction_applies_all() {
        let mut engine = engine(10.0);
        let tx = Transaction::new()
            .require(at_least(2.0))
            .consume(take(4.0))
            .produce(add(1.0));

        assert!(engine.handle_transaction(&tx).unwrap());
        assert_eq!(value(&engine), 7.0);
    }

    #[test]
    fn test_transaction_failures_touch_nothing() {
        let cases = [
            (
                Transaction::new().require(at_least(6.0)).consume(take(1.0)),
                TransactionOutcome::RequirementNotMet,
            ),
            (
                Transaction::new().consume(take(11.0)).produce(add(1.0)),
                TransactionOutcome::CannotConsume,
            ),
            (
                Transaction::new().consume(take(1.0)).produce(add(-1.0)),
                TransactionOutcome::CannotProduce,
            ),
        ];

        for (tx, expected) in cases {
            let mut engine = engine(10.0);
            assert_eq!(engine.execute_transaction(&tx).unwrap(), expected);
            assert_eq!(value(&engine), 10.0);
        }
    }

    #[test]
    fn test_empty_transaction_succeeds() {
        let mut engine = engine(3.0);
        assert!(engine.handle_transaction(&Transaction::new()).unwrap());
        assert_eq!(value(&engine), 3.0);
    }

    #[test]
    fn test_consume_does_not_check() {
        let mut engine = engine(1.0);
        engine.consume(&[take(5.0)]).unwrap();
        assert_eq!(value(&engine), -4.0);
    }

    #[test]
    fn test_request() {
        let mut engine = engine(8.0);
        engine.request(&Payload::new("/counter/reset")).unwrap();
        assert_eq!(value(&engine), 0.0);
    }

    #[test]
    fn test_bonus_collected_per_tick() {
        let mut engine = engine(0.0);
        let query = Payload::new("/bonus/add");

        assert_eq!(engine.get_bonus(&query).unwrap(), 1.0);

        engine.plugin_mut::<Counter>().unwrap().bonus = Some(2.0);
        assert_eq!(engine.get_bonus(&query).unwrap(), 1.0);

        engine.pre_tick().unwrap();
        assert_eq!(engine.get_bonus(&query).unwrap(), 3.0);

        engine.plugin_mut::<Counter>().unwrap().bonus = None;
        engine.pre_tick().unwrap();
        assert_eq!(engine.get_bonus(&query).unwrap(), 1.0);
        assert!(engine.active_bonuses().is_empty());
    }

    #[test]
    fn test_unknown_variant_yields_zero() {
        let mut engine = Engine::builder()
            .plugin(Counter {
                bonus: Some(5.0),
                ..Counter::default()
            })
            .modifier(AddBonus(Variant::from("exponential"), 1.0))
            .build()
            .unwrap();
        engine.pre_tick().unwrap();

        assert_eq!(engine.get_bonus(&Payload::new("/bonus/add")).unwrap(), 0.0);
    }

    #[test]
    fn test_bonus_without_modifier_fails_collection() {
        let mut engine = Engine::builder()
            .plugin(Counter {
                bonus: Some(5.0),
                ..Counter::default()
            })
            .build()
            .unwrap();

        assert!(matches!(engine.pre_tick(), Err(Error::ModifierNotFound { .. })));
    }

    #[test]
    fn test_attach_requires_plugin() {
        let result = Engine::builder().producer(Add).build();
        assert!(matches!(result, Err(Error::PluginNotFound(_))));
    }

    #[test]
    fn test_duplicate_registration_replaces() {
        let mut engine = engine(0.0);
        engine.register_modifier(AddBonus(Variant::Additive, 7.0)).unwrap();

        assert_eq!(engine.modifiers().len(), 1);
        assert_eq!(engine.get_bonus(&Payload::new("/bonus/add")).unwrap(), 7.0);
    }

    #[test]
    fn test_tick_plugins_detaches_and_restores() {
        let mut engine = engine(1.0);
        engine.tick_plugins(0.5).unwrap();

        assert_eq!(value(&engine), 1.5);
        assert!(engine.has_plugin("counter"));
    }

    #[test]
    fn test_scheduled_transactions_see_their_own_plugin() {
        let mut engine = engine(3.0);
        engine.plugin_mut::<Counter>().unwrap().scheduled = vec![
            Transaction::new().require(at_least(1.0)).produce(add(2.0)),
            Transaction::new().consume(take(100.0)),
        ];

        engine.tick_plugins(0.5).unwrap();

        // +2 from the first transaction, then +0.5 from the tick hook
        assert_eq!(value(&engine), 5.5);
        let counter = engine.plugin::<Counter>().unwrap();
        assert_eq!(
            counter.settled,
            vec![TransactionOutcome::Completed, TransactionOutcome::CannotConsume]
        );
    }

    #[test]
    fn test_with_plugin_restores_on_error() {
        let mut engine = engine(1.0);
        let result: Result<()> = engine.with_plugin::<Counter, _>(|counter, _| {
            counter.value = 2.0;
            Err(Error::InvalidContent("boom".into()))
        });

        assert!(result.is_err());
        assert_eq!(value(&engine), 2.0);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let mut engine = engine(4.25);
        let saved = engine.save();

        engine.plugin_mut::<Counter>().unwrap().value = 0.0;
        engine.load(saved).unwrap();
        assert_eq!(value(&engine), 4.25);
    }

    #[test]
    fn test_load_skips_absent_plugins() {
        let mut engine = engine(4.0);
        engine.load(EngineSaveData::new()).unwrap();
        assert_eq!(value(&engine), 4.0);
    }
}
