//! Upgrades: levelled purchases that publish bonuses

use idlekit_core::{
    Bonus, Condition, Controller, Engine, Error, EventQueue, Evaluator, Extension, Input, Plugin,
    Request, Result, Value, ValueMap,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::any::Any;
use tracing::debug;

pub const PLUGIN_NAME: &str = "upgrade";

/// Content definition of an upgrade
///
/// Level `n` (1-based) costs `cost_per_level[n - 1]` and grants
/// `bonus_per_level[n - 1]`. Both lists have one entry per level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeDefinition {
    pub id: String,
    pub cost_per_level: Vec<Input>,
    pub bonus_per_level: Vec<Bonus>,
    /// Publish the bonuses of every level reached instead of the current one
    #[serde(default)]
    pub accumulate_bonuses: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpgradeEvent {
    Bought {
        id: String,
        level: usize,
        is_max_level: bool,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpgradeState {
    pub levels: IndexMap<String, usize>,
}

#[derive(Debug, Default)]
pub struct UpgradePlugin {
    definitions: IndexMap<String, UpgradeDefinition>,
    state: UpgradeState,
    events: EventQueue<UpgradeEvent>,
}

impl UpgradePlugin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register definitions at level 0
    ///
    /// Fails on the first upgrade whose cost and bonus lists differ in length;
    /// upgrades before it stay registered.
    pub fn load_content(
        &mut self,
        upgrades: impl IntoIterator<Item = UpgradeDefinition>,
    ) -> Result<()> {
        for upgrade in upgrades {
            if upgrade.cost_per_level.len() != upgrade.bonus_per_level.len() {
                return Err(Error::InvalidContent(format!(
                    "Upgrade '{}' is defined with {} costs and {} bonuses. These should match",
                    upgrade.id,
                    upgrade.cost_per_level.len(),
                    upgrade.bonus_per_level.len()
                )));
            }
            self.state.levels.insert(upgrade.id.clone(), 0);
            self.definitions.insert(upgrade.id.clone(), upgrade);
        }
        Ok(())
    }

    pub fn supports(&self, id: &str) -> bool {
        self.definitions.contains_key(id)
    }

    pub fn upgrade(&self, id: &str) -> Result<&UpgradeDefinition> {
        self.definitions
            .get(id)
            .ok_or_else(|| Error::unknown("upgrade", id))
    }

    pub fn upgrades(&self) -> impl Iterator<Item = &UpgradeDefinition> {
        self.definitions.values()
    }

    pub fn level(&self, id: &str) -> Result<usize> {
        self.upgrade(id)?;
        Ok(self.state.levels.get(id).copied().unwrap_or(0))
    }

    pub fn max_level(&self, id: &str) -> Result<usize> {
        Ok(self.upgrade(id)?.cost_per_level.len())
    }

    pub fn is_max_level(&self, id: &str) -> Result<bool> {
        Ok(self.level(id)? >= self.max_level(id)?)
    }

    /// Cost of the next level, `None` at max level
    pub fn cost(&self, id: &str) -> Result<Option<&Input>> {
        let level = self.level(id)?;
        Ok(self.upgrade(id)?.cost_per_level.get(level))
    }

    /// Whether the next level exists and its cost can be consumed
    pub fn can_buy_upgrade(&self, id: &str, engine: &Engine) -> Result<bool> {
        match self.cost(id)? {
            Some(cost) => engine.can_consume(std::slice::from_ref(cost)),
            None => Ok(false),
        }
    }

    /// Pay for and gain the next level, reporting whether it happened
    ///
    /// Call with the plugin detached (see [`Engine::with_plugin`]) so that the
    /// cost can be consumed from other plugins.
    pub fn buy_upgrade(&mut self, id: &str, engine: &mut Engine) -> Result<bool> {
        if !self.can_buy_upgrade(id, engine)? {
            return Ok(false);
        }
        if let Some(cost) = self.cost(id)?.cloned() {
            engine.consume(&[cost])?;
        }

        let level = self.level(id)? + 1;
        self.state.levels.insert(id.to_string(), level);
        let is_max_level = self.is_max_level(id)?;
        debug!(upgrade = %id, level, "upgrade bought");
        self.events.push(UpgradeEvent::Bought {
            id: id.to_string(),
            level,
            is_max_level,
        });
        Ok(true)
    }

    pub fn state(&self) -> &UpgradeState {
        &self.state
    }

    /// Take every queued event
    ///
    /// Events are kept until drained, up to
    /// [`DEFAULT_EVENT_CAPACITY`](idlekit_core::DEFAULT_EVENT_CAPACITY); past
    /// that the oldest are dropped.
    pub fn drain_events(&mut self) -> Vec<UpgradeEvent> {
        self.events.drain()
    }
}

impl Plugin for UpgradePlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn bonuses(&self) -> Vec<Bonus> {
        let mut bonuses = Vec::new();
        for upgrade in self.definitions.values() {
            let level = self.state.levels.get(&upgrade.id).copied().unwrap_or(0);
            if level == 0 {
                continue;
            }
            if upgrade.accumulate_bonuses {
                bonuses.extend(upgrade.bonus_per_level.iter().take(level).cloned());
            } else if let Some(bonus) = upgrade.bonus_per_level.get(level - 1) {
                bonuses.push(bonus.clone());
            }
        }
        bonuses
    }

    fn save(&self) -> Value {
        let levels: ValueMap = self
            .state
            .levels
            .iter()
            .map(|(id, level)| (id.clone(), Value::Int(*level as i64)))
            .collect();
        Value::Map(levels)
    }

    fn load(&mut self, data: Value) -> Result<()> {
        let levels = data
            .into_map()
            .ok_or_else(|| Error::invalid_save(PLUGIN_NAME, "expected a map of levels"))?;
        for (id, level) in levels {
            if !self.supports(&id) {
                debug!(upgrade = %id, "skipping saved level of unknown upgrade");
                continue;
            }
            let level = level
                .as_int()
                .and_then(|l| usize::try_from(l).ok())
                .filter(|l| *l <= self.max_level(&id).unwrap_or(0))
                .ok_or_else(|| {
                    Error::invalid_save(PLUGIN_NAME, format!("level of '{}' is out of range", id))
                })?;
            self.state.levels.insert(id, level);
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
    engine.plugin::<UpgradePlugin>().map(|_| ())
}

/// `{type: "/upgrade/buy", id}`
#[derive(Debug, Clone, Copy, Default)]
pub struct BuyUpgrade;

impl Extension for BuyUpgrade {
    fn kind(&self) -> &str {
        "/upgrade/buy"
    }

    fn attach(&self, engine: &Engine) -> Result<()> {
        require_plugin(engine)
    }
}

impl Controller for BuyUpgrade {
    fn resolve(&self, request: &Request, engine: &mut Engine) -> Result<()> {
        let id = request.str_field("id")?;
        let bought = engine.with_plugin(|upgrades: &mut UpgradePlugin, engine| {
            upgrades.buy_upgrade(id, engine)
        })?;
        if !bought {
            debug!(upgrade = %id, "upgrade request declined");
        }
        Ok(())
    }
}

/// `{type: "/upgrade/level", id, level}`: the upgrade is at least at `level`
#[derive(Debug, Clone, Copy, Default)]
pub struct UpgradeLevel;

impl Extension for UpgradeLevel {
    fn kind(&self) -> &str {
        "/upgrade/level"
    }

    fn attach(&self, engine: &Engine) -> Result<()> {
        require_plugin(engine)
    }
}

impl Evaluator for UpgradeLevel {
    fn evaluate(&self, condition: &Condition, engine: &Engine) -> Result<bool> {
        let level = engine
            .plugin::<UpgradePlugin>()?
            .level(condition.str_field("id")?)?;
        Ok(level as i64 >= condition.int_field("level")?)
    }
}

/// Register the plugin and its extensions
pub fn register(engine: &mut Engine, plugin: UpgradePlugin) -> Result<()> {
    engine.register_plugin(plugin);
    engine.register_controller(BuyUpgrade)?;
    engine.register_evaluator(UpgradeLevel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::{self, CurrencyDefinition, CurrencyPlugin, GAIN_BONUS};
    use idlekit_core::Payload;

    fn spend(amount: f64) -> Input {
        Payload::new("/currency/spend").with("id", "gold").with("amount", amount)
    }

    fn boost(amount: f64) -> Bonus {
        Payload::new(GAIN_BONUS).with("id", "gold").with("amount", amount)
    }

    fn pickaxe(accumulate: bool) -> UpgradeDefinition {
        UpgradeDefinition {
            id: "pickaxe".into(),
            cost_per_level: vec![spend(10.0), spend(20.0)],
            bonus_per_level: vec![boost(0.5), boost(1.0)],
            accumulate_bonuses: accumulate,
        }
    }

    fn engine(gold: f64, accumulate: bool) -> Engine {
        let mut wallet = CurrencyPlugin::new();
        wallet.load_content([CurrencyDefinition::new("gold").with_start_amount(gold)]);
        let mut upgrades = UpgradePlugin::new();
        upgrades.load_content([pickaxe(accumulate)]).unwrap();

        let mut engine = Engine::new();
        currency::register(&mut engine, wallet).unwrap();
        register(&mut engine, upgrades).unwrap();
        engine
    }

    fn buy(engine: &mut Engine) -> bool {
        engine
            .with_plugin(|upgrades: &mut UpgradePlugin, engine| upgrades.buy_upgrade("pickaxe", engine))
            .unwrap()
    }

    fn gold(engine: &Engine) -> f64 {
        engine.plugin::<CurrencyPlugin>().unwrap().amount("gold").unwrap()
    }

    #[test]
    fn test_length_mismatch() {
        let mut broken = pickaxe(false);
        broken.bonus_per_level.pop();

        let err = UpgradePlugin::new().load_content([broken]).unwrap_err();
        assert!(matches!(err, Error::InvalidContent(_)));
        assert!(err.to_string().contains("2 costs and 1 bonuses"));
    }

    #[test]
    fn test_buy_until_max_level() {
        let mut engine = engine(100.0, false);

        assert!(buy(&mut engine));
        assert!(buy(&mut engine));
        assert!(!buy(&mut engine));
        assert_eq!(gold(&engine), 70.0);

        let upgrades = engine.plugin_mut::<UpgradePlugin>().unwrap();
        assert!(upgrades.is_max_level("pickaxe").unwrap());
        assert!(upgrades.cost("pickaxe").unwrap().is_none());
        assert_eq!(
            upgrades.drain_events(),
            vec![
                UpgradeEvent::Bought { id: "pickaxe".into(), level: 1, is_max_level: false },
                UpgradeEvent::Bought { id: "pickaxe".into(), level: 2, is_max_level: true },
            ]
        );
    }

    #[test]
    fn test_cannot_afford() {
        let mut engine = engine(5.0, false);
        assert!(!buy(&mut engine));
        assert_eq!(gold(&engine), 5.0);
        assert_eq!(engine.plugin::<UpgradePlugin>().unwrap().level("pickaxe").unwrap(), 0);
    }

    #[test]
    fn test_bonuses_current_level() {
        let mut engine = engine(100.0, false);
        let query = Payload::new(GAIN_BONUS).with("id", "gold");

        buy(&mut engine);
        buy(&mut engine);
        engine.pre_tick().unwrap();
        assert_eq!(engine.get_bonus(&query).unwrap(), 2.0);
    }

    #[test]
    fn test_bonuses_accumulate() {
        let mut engine = engine(100.0, true);
        let query = Payload::new(GAIN_BONUS).with("id", "gold");

        buy(&mut engine);
        buy(&mut engine);
        engine.pre_tick().unwrap();
        assert_eq!(engine.get_bonus(&query).unwrap(), 3.0);
    }

    #[test]
    fn test_request_and_level_condition() {
        let mut engine = engine(15.0, false);
        let at_least_one = Payload::new("/upgrade/level").with("id", "pickaxe").with("level", 1i64);
        let buy = Payload::new("/upgrade/buy").with("id", "pickaxe");

        assert!(!engine.evaluate_one(&at_least_one).unwrap());
        engine.request(&buy).unwrap();
        assert!(engine.evaluate_one(&at_least_one).unwrap());

        // second level costs 20, declined without error
        engine.request(&buy).unwrap();
        assert_eq!(gold(&engine), 5.0);
    }

    #[test]
    fn test_save_load() {
        let mut engine = engine(100.0, false);
        buy(&mut engine);
        let saved = engine.save();

        let mut fresh = self::engine(0.0, false);
        fresh.load(saved).unwrap();
        assert_eq!(fresh.plugin::<UpgradePlugin>().unwrap().level("pickaxe").unwrap(), 1);
        assert_eq!(gold(&fresh), 90.0);
    }

    #[test]
    fn test_load_rejects_level_past_max() {
        let mut upgrades = UpgradePlugin::new();
        upgrades.load_content([pickaxe(false)]).unwrap();

        let mut data = ValueMap::new();
        data.insert("pickaxe".into(), Value::Int(3));
        assert!(matches!(
            upgrades.load(Value::Map(data)),
            Err(Error::InvalidSaveData { .. })
        ));
    }

    #[test]
    fn test_definition_from_ron() {
        let upgrade: UpgradeDefinition = ron::from_str(
            r#"(
                id: "pickaxe",
                cost_per_level: [{"type": "/currency/spend", "id": "gold", "amount": 10.0}],
                bonus_per_level: [{"type": "/bonus/currency-gain", "id": "gold", "amount": 0.5}],
            )"#,
        )
        .unwrap();

        assert!(!upgrade.accumulate_bonuses);
        assert_eq!(upgrade.cost_per_level[0].float_field("amount").unwrap(), 10.0);
    }
}
