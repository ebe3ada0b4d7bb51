//! The game: tick cadence, features and periodic saves around an [`Engine`]

use crate::{
    persistence::{FeaturesSaveData, GameSaveData, MemoryStore, SaveStore},
    Condition, Engine, EventQueue, GameConfig, Request, Result, Transaction, Value,
};
use indexmap::IndexMap;
use std::any::Any;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A game-level object updated every tick after the engine
pub trait Feature: Any {
    /// Stable name, also the feature's key in the save payload
    fn name(&self) -> &str;

    /// Called once when the game is built
    fn init(&mut self, _engine: &mut Engine) -> Result<()> {
        Ok(())
    }

    /// Advance the feature by `delta` seconds
    fn update(&mut self, _delta: f64, _engine: &mut Engine) -> Result<()> {
        Ok(())
    }

    fn save(&self) -> Value {
        Value::Null
    }

    fn load(&mut self, _data: Value) -> Result<()> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any;
}

/// Notifications queued by the game
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// A save was stored under `key`
    Saved { key: String },
    /// Tick number `tick` (1-based) completed
    Ticked { tick: u64 },
}

#[derive(Debug, Clone, Copy)]
struct Timer {
    interval: Duration,
    next_due: Instant,
}

/// Drives an [`Engine`] and its features tick by tick
pub struct Game {
    engine: Engine,
    features: IndexMap<String, Box<dyn Feature>>,
    config: GameConfig,
    store: Box<dyn SaveStore>,
    next_save: f64,
    ticks: u64,
    timer: Option<Timer>,
    events: EventQueue<GameEvent>,
}

impl Game {
    /// Start building a game around an engine
    pub fn builder(engine: Engine) -> GameBuilder {
        GameBuilder {
            engine,
            features: Vec::new(),
            config: GameConfig::default(),
            store: Box::new(MemoryStore::new()),
        }
    }

    /// Advance the game by `delta` seconds
    ///
    /// Rebuilds bonuses, ticks plugins, updates features, counts down to the
    /// next automatic save and queues [`GameEvent::Ticked`]. `delta` is passed
    /// through unchecked.
    pub fn tick(&mut self, delta: f64) -> Result<()> {
        self.engine.pre_tick()?;
        self.engine.tick_plugins(delta)?;
        for feature in self.features.values_mut() {
            feature.update(delta, &mut self.engine)?;
        }

        self.next_save -= delta;
        if self.next_save <= 0.0 {
            let data = self.save();
            self.store.store(&self.config.save_key, &data)?;
            info!(key = %self.config.save_key, "game saved");
            self.events.push(GameEvent::Saved {
                key: self.config.save_key.clone(),
            });
            self.next_save = self.config.save_interval;
        }

        self.ticks += 1;
        self.events.push(GameEvent::Ticked { tick: self.ticks });
        Ok(())
    }

    /// Arm the tick timer, replacing any running one
    pub fn start(&mut self) -> Result<()> {
        self.start_at(Instant::now())
    }

    /// Arm the tick timer as if started at `now`
    pub fn start_at(&mut self, now: Instant) -> Result<()> {
        self.stop();
        let interval = self.config.tick_interval()?;
        self.timer = Some(Timer {
            interval,
            next_due: now + interval,
        });
        debug!(interval_ms = interval.as_millis() as u64, "timer started");
        Ok(())
    }

    /// Disarm the tick timer
    pub fn stop(&mut self) {
        if self.timer.take().is_some() {
            debug!("timer stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    /// Run the ticks that are due at `now`, returning how many ran
    ///
    /// Each tick advances the game by `tick_duration`. At most
    /// `max_catch_up_ticks` run per call; ticks missed beyond that are skipped
    /// and the timer is rescheduled one interval after `now`. Does nothing
    /// while the timer is stopped.
    pub fn pump(&mut self, now: Instant) -> Result<u32> {
        let Some(mut timer) = self.timer else {
            return Ok(0);
        };

        let mut ran = 0;
        while now >= timer.next_due {
            if ran == self.config.max_catch_up_ticks {
                timer.next_due = now + timer.interval;
                self.timer = Some(timer);
                debug!(ran, "timer fell behind, skipping missed ticks");
                break;
            }
            timer.next_due += timer.interval;
            self.timer = Some(timer);
            self.tick(self.config.tick_duration)?;
            ran += 1;
        }
        Ok(ran)
    }

    // === Delegation ===

    pub fn evaluate(&self, conditions: &[Condition]) -> Result<bool> {
        self.engine.evaluate(conditions)
    }

    pub fn handle_transaction(&mut self, transaction: &Transaction) -> Result<bool> {
        self.engine.handle_transaction(transaction)
    }

    pub fn request(&mut self, request: &Request) -> Result<()> {
        self.engine.request(request)
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn SaveStore {
        self.store.as_ref()
    }

    /// Seconds of game time until the next automatic save
    pub fn next_save(&self) -> f64 {
        self.next_save
    }

    /// Number of completed ticks
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Features in registration order
    pub fn features(&self) -> impl Iterator<Item = &dyn Feature> {
        self.features.values().map(|f| &**f)
    }

    /// Typed access to the first feature of type `F`
    pub fn feature<F: Feature>(&self) -> Option<&F> {
        self.features
            .values()
            .find_map(|f| f.as_any().downcast_ref::<F>())
    }

    /// Take every queued notification
    ///
    /// Notifications are kept until drained, up to
    /// [`DEFAULT_EVENT_CAPACITY`](crate::DEFAULT_EVENT_CAPACITY); past that the
    /// oldest are dropped.
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.events.drain()
    }

    // === Persistence ===

    pub fn save(&self) -> GameSaveData {
        let features: FeaturesSaveData = self
            .features
            .iter()
            .map(|(name, feature)| (name.clone(), feature.save()))
            .collect();

        GameSaveData {
            engine: self.engine.save(),
            features,
        }
    }

    /// Restore features present in `data`, then the engine
    ///
    /// If any feature or plugin rejects its data, the state saved just before
    /// the call is restored and the rejection is returned.
    pub fn load(&mut self, data: GameSaveData) -> Result<()> {
        let previous = self.save();
        if let Err(error) = self.apply(data) {
            warn!(%error, "load failed, restoring the previous game state");
            self.apply(previous)?;
            return Err(error);
        }
        Ok(())
    }

    fn apply(&mut self, mut data: GameSaveData) -> Result<()> {
        for (name, feature) in self.features.iter_mut() {
            if let Some(state) = data.features.shift_remove(name) {
                feature.load(state)?;
            }
        }
        self.engine.load(data.engine)
    }

    /// Load the save stored under the configured key; no save is not an error
    pub fn load_from_storage(&mut self) -> Result<bool> {
        match self.store.fetch(&self.config.save_key)? {
            Some(data) => {
                debug!(key = %self.config.save_key, "loading stored game");
                self.load(data)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl std::fmt::Debug for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game")
            .field("engine", &self.engine)
            .field("features", &self.features.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .field("ticks", &self.ticks)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Lists the features, configuration and store a [`Game`] starts with
pub struct GameBuilder {
    engine: Engine,
    features: Vec<Box<dyn Feature>>,
    config: GameConfig,
    store: Box<dyn SaveStore>,
}

impl GameBuilder {
    pub fn config(mut self, config: GameConfig) -> Self {
        self.config = config;
        self
    }

    pub fn feature(mut self, feature: impl Feature) -> Self {
        self.features.push(Box::new(feature));
        self
    }

    pub fn store(mut self, store: impl SaveStore + 'static) -> Self {
        self.store = Box::new(store);
        self
    }

    /// Initialize every feature and build the game
    pub fn build(self) -> Result<Game> {
        let mut engine = self.engine;
        let mut features = IndexMap::new();
        for mut feature in self.features {
            feature.init(&mut engine)?;
            features.insert(feature.name().to_string(), feature);
        }

        Ok(Game {
            engine,
            features,
            next_save: self.config.save_interval,
            config: self.config,
            store: self.store,
            ticks: 0,
            timer: None,
            events: EventQueue::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, Plugin};

    struct Clock {
        elapsed: f64,
    }

    impl Plugin for Clock {
        fn name(&self) -> &str {
            "clock"
        }

        fn tick(&mut self, delta: f64, _engine: &mut Engine) -> Result<()> {
            self.elapsed += delta;
            Ok(())
        }

        fn save(&self) -> Value {
            Value::Float(self.elapsed)
        }

        fn load(&mut self, data: Value) -> Result<()> {
            self.elapsed = data
                .as_float()
                .ok_or_else(|| Error::invalid_save("clock", "expected a number"))?;
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[derive(Default)]
    struct Updates {
        count: i64,
        saw_clock: f64,
    }

    impl Feature for Updates {
        fn name(&self) -> &str {
            "updates"
        }

        fn update(&mut self, _delta: f64, engine: &mut Engine) -> Result<()> {
            self.count += 1;
            self.saw_clock = engine.plugin::<Clock>()?.elapsed;
            Ok(())
        }

        fn save(&self) -> Value {
            Value::Int(self.count)
        }

        fn load(&mut self, data: Value) -> Result<()> {
            self.count = data.as_int().unwrap_or_default();
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn game(config: GameConfig) -> Game {
        let engine = Engine::builder()
            .plugin(Clock { elapsed: 0.0 })
            .build()
            .unwrap();
        Game::builder(engine)
            .config(config)
            .feature(Updates::default())
            .build()
            .unwrap()
    }

    fn clock(game: &Game) -> f64 {
        game.engine().plugin::<Clock>().unwrap().elapsed
    }

    #[test]
    fn test_tick_order_plugins_then_features() {
        let mut game = game(GameConfig::default());
        game.tick(1.0).unwrap();

        let updates = game.feature::<Updates>().unwrap();
        assert_eq!(updates.count, 1);
        assert_eq!(updates.saw_clock, 1.0);
        assert_eq!(game.drain_events(), vec![GameEvent::Ticked { tick: 1 }]);
    }

    #[test]
    fn test_delta_passed_through_unchecked() {
        let mut game = game(GameConfig::default());
        game.tick(-2.0).unwrap();
        game.tick(0.0).unwrap();
        assert_eq!(clock(&game), -2.0);
    }

    #[test]
    fn test_periodic_save() {
        let mut game = game(GameConfig::default().with_save_interval(2.0).with_save_key("slot"));

        game.tick(1.0).unwrap();
        assert!(game.store().fetch("slot").unwrap().is_none());

        game.tick(1.0).unwrap();
        let saved = game.store().fetch("slot").unwrap().unwrap();
        assert_eq!(saved.engine.get("clock"), Some(&Value::Float(2.0)));
        assert_eq!(saved.features.get("updates"), Some(&Value::Int(2)));
        assert_eq!(game.next_save(), 2.0);

        let events = game.drain_events();
        assert_eq!(
            events,
            vec![
                GameEvent::Ticked { tick: 1 },
                GameEvent::Saved { key: "slot".into() },
                GameEvent::Ticked { tick: 2 },
            ]
        );
    }

    #[test]
    fn test_save_load_roundtrip() {
        let mut game = game(GameConfig::default());
        game.tick(3.0).unwrap();
        let saved = game.save();

        let mut fresh = self::game(GameConfig::default());
        fresh.load(saved).unwrap();
        assert_eq!(clock(&fresh), 3.0);
        assert_eq!(fresh.feature::<Updates>().unwrap().count, 1);
    }

    #[test]
    fn test_load_from_empty_storage_is_noop() {
        let mut game = game(GameConfig::default());
        assert!(!game.load_from_storage().unwrap());
        assert_eq!(clock(&game), 0.0);
    }

    #[test]
    fn test_load_from_storage_after_autosave() {
        let mut game = game(GameConfig::default().with_save_interval(1.0));
        game.tick(1.0).unwrap();
        game.engine_mut().plugin_mut::<Clock>().unwrap().elapsed = 100.0;

        assert!(game.load_from_storage().unwrap());
        assert_eq!(clock(&game), 1.0);
    }

    #[test]
    fn test_timer_pumps_due_ticks() {
        let mut game = game(GameConfig::default().with_tick_duration(0.5));
        let t0 = Instant::now();

        assert_eq!(game.pump(t0 + Duration::from_secs(5)).unwrap(), 0);

        game.start_at(t0).unwrap();
        assert!(game.is_running());
        assert_eq!(game.pump(t0 + Duration::from_millis(400)).unwrap(), 0);
        assert_eq!(game.pump(t0 + Duration::from_millis(1600)).unwrap(), 3);
        assert_eq!(clock(&game), 1.5);

        game.stop();
        assert!(!game.is_running());
        assert_eq!(game.pump(t0 + Duration::from_secs(10)).unwrap(), 0);
    }

    #[test]
    fn test_restart_replaces_timer() {
        let mut game = game(GameConfig::default().with_tick_duration(1.0));
        let t0 = Instant::now();

        game.start_at(t0).unwrap();
        game.start_at(t0 + Duration::from_secs(10)).unwrap();

        assert_eq!(game.pump(t0 + Duration::from_secs(10)).unwrap(), 0);
        assert_eq!(game.pump(t0 + Duration::from_secs(11)).unwrap(), 1);
    }

    #[test]
    fn test_pump_caps_catch_up_after_a_pause() {
        let mut game = game(
            GameConfig::default()
                .with_tick_duration(1.0)
                .with_max_catch_up_ticks(4),
        );
        let t0 = Instant::now();
        game.start_at(t0).unwrap();

        let resumed = t0 + Duration::from_secs(100);
        assert_eq!(game.pump(resumed).unwrap(), 4);
        assert_eq!(clock(&game), 4.0);

        // missed ticks are dropped, the next one is due an interval later
        assert_eq!(game.pump(resumed + Duration::from_millis(500)).unwrap(), 0);
        assert_eq!(game.pump(resumed + Duration::from_secs(1)).unwrap(), 1);
    }

    #[test]
    fn test_undrained_game_events_stay_bounded() {
        let mut game = game(GameConfig::default());
        for _ in 0..crate::DEFAULT_EVENT_CAPACITY + 5 {
            game.tick(0.1).unwrap();
        }

        let events = game.drain_events();
        assert_eq!(events.len(), crate::DEFAULT_EVENT_CAPACITY);
        assert_eq!(
            events.last(),
            Some(&GameEvent::Ticked {
                tick: crate::DEFAULT_EVENT_CAPACITY as u64 + 5
            })
        );
    }

    #[test]
    fn test_rejected_load_restores_previous_state() {
        let mut game = game(GameConfig::default());
        game.tick(2.0).unwrap();

        let mut data = game.save();
        data.features.insert("updates".into(), Value::Int(50));
        data.engine.insert("clock".into(), Value::String("noon".into()));

        assert!(matches!(game.load(data), Err(Error::InvalidSaveData { .. })));
        assert_eq!(clock(&game), 2.0);
        assert_eq!(game.feature::<Updates>().unwrap().count, 1);
    }

    #[test]
    fn test_start_rejects_bad_tick_duration() {
        let mut game = game(GameConfig::default().with_tick_duration(0.0));
        assert!(matches!(game.start(), Err(Error::InvalidConfig(_))));
        assert!(!game.is_running());
    }
}
