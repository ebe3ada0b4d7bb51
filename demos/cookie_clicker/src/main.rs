//! Cookie Clicker Example
//!
//! Demonstrates idlekit with content loaded from RON: clicking for cookies,
//! buying a mill with a transaction, levelling an upgrade through a request
//! and letting generators run on the game timer.
//!
//! Run with `RUST_LOG=debug` to see the engine's own logging.

use idlekit_core::{Engine, Feature, Game, GameConfig, Payload, Result, Transaction, Value};
use idlekit_plugins::{CurrencyPlugin, GeneratorEvent, GeneratorPlugin, UpgradePlugin};
use idlekit_save::{ContentLoader, FileStore};
use std::any::Any;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Tracks the most cookies ever held
#[derive(Default)]
struct Stats {
    peak_cookies: f64,
}

impl Feature for Stats {
    fn name(&self) -> &str {
        "stats"
    }

    fn update(&mut self, _delta: f64, engine: &mut Engine) -> Result<()> {
        let cookies = engine.plugin::<CurrencyPlugin>()?.amount("cookies")?;
        self.peak_cookies = self.peak_cookies.max(cookies);
        Ok(())
    }

    fn save(&self) -> Value {
        Value::Float(self.peak_cookies)
    }

    fn load(&mut self, data: Value) -> Result<()> {
        self.peak_cookies = data.as_float().unwrap_or_default();
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn cookies(game: &Game) -> Result<f64> {
    game.engine().plugin::<CurrencyPlugin>()?.amount("cookies")
}

fn flour(game: &Game) -> Result<f64> {
    game.engine().plugin::<CurrencyPlugin>()?.amount("flour")
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== Idlekit Cookie Clicker Example ===\n");

    let mut loader = ContentLoader::new();
    loader.load_str(include_str!("../content.ron"))?;
    let engine = loader.finish().build_engine()?;

    let save_dir = std::env::temp_dir().join("idlekit-cookie-clicker");
    let mut game = Game::builder(engine)
        .config(
            GameConfig::default()
                .with_tick_duration(0.5)
                .with_save_interval(2.0)
                .with_save_key("cookie-clicker"),
        )
        .feature(Stats::default())
        .store(FileStore::new(&save_dir)?)
        .build()?;

    if game.load_from_storage()? {
        info!(dir = %save_dir.display(), "resumed from autosave");
    }
    println!("Starting with {:.1} cookies\n", cookies(&game)?);

    // Clicking produces cookies directly
    let click = Payload::new("/currency/gain").with("id", "cookies").with("amount", 1.0);
    for _ in 0..5 {
        game.engine_mut().produce(std::slice::from_ref(&click))?;
    }
    println!("Clicked 5 times: {:.1} cookies", cookies(&game)?);

    let buy_mill = Transaction::new()
        .require(Payload::new("/not").with(
            "condition",
            Payload::new("/generator/is-active").with("id", "mill"),
        ))
        .consume(Payload::new("/currency/spend").with("id", "cookies").with("amount", 10.0))
        .produce(Payload::new("/generator/activate").with("id", "mill"));
    println!("Buying the mill: {}", game.handle_transaction(&buy_mill)?);
    println!("Buying it again: {}", game.handle_transaction(&buy_mill)?);

    game.request(&Payload::new("/upgrade/buy").with("id", "rolling-pin"))?;
    let level = game.engine().plugin::<UpgradePlugin>()?.level("rolling-pin")?;
    println!("Rolling pin level {}: {:.1} cookies left", level, cookies(&game)?);

    game.engine_mut()
        .produce(&[Payload::new("/generator/activate").with("id", "oven")])?;

    println!("\nRunning the timer for 4 simulated seconds...\n");

    let start = Instant::now();
    game.start_at(start)?;
    for step in 1..=8u32 {
        let now = start + Duration::from_millis(500) * step;
        let ran = game.pump(now)?;
        println!(
            "t={:.1}s ({} tick(s)): {:.1} cookies, {:.1} flour",
            step as f64 * 0.5,
            ran,
            cookies(&game)?,
            flour(&game)?,
        );
    }
    game.stop();

    let events = game.engine_mut().plugin_mut::<GeneratorPlugin>()?.drain_events();
    let ticked = events
        .iter()
        .filter(|e| matches!(e, GeneratorEvent::Ticked { .. }))
        .count();
    let failed = events
        .iter()
        .filter(|e| matches!(e, GeneratorEvent::TickFailed { .. }))
        .count();
    println!("\nGenerators ran {} times, failed {} times", ticked, failed);

    if let Some(stats) = game.feature::<Stats>() {
        println!("Peak cookies: {:.1}", stats.peak_cookies);
    }
    println!("Progress saved to {}", save_dir.display());

    println!("\n=== Simulation Complete ===");
    Ok(())
}
