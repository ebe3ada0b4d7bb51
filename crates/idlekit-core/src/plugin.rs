//! Plugins: named gameplay features that own their state

use crate::{Bonus, Engine, Result, Scheduled, Settled, Value};
use std::any::Any;

/// A self-contained gameplay feature hosted by the [`Engine`]
///
/// A plugin's name is both its key in the engine and its namespace in the
/// engine save payload. The plugin exclusively owns its state; the engine only
/// reaches it through `save`/`load` and the hooks below.
pub trait Plugin: Any {
    /// Stable name of this plugin
    fn name(&self) -> &str;

    /// Bonus contributions for the current tick
    ///
    /// Called once per tick by [`Engine::pre_tick`], before any plugin or
    /// feature logic that reads bonuses.
    fn bonuses(&self) -> Vec<Bonus> {
        Vec::new()
    }

    /// Transactions to run for this tick, built from the plugin's own state
    ///
    /// The engine executes them in order with the plugin still registered, so
    /// their conditions and effects may read or change this plugin.
    fn schedule(&self, _delta: f64) -> Result<Vec<Scheduled>> {
        Ok(Vec::new())
    }

    /// Receive the outcome of every transaction returned by [`Plugin::schedule`]
    fn settle(&mut self, _delta: f64, _settled: Vec<Settled>) -> Result<()> {
        Ok(())
    }

    /// Advance the plugin by `delta` seconds, after its scheduled transactions
    ///
    /// The plugin is detached from the engine for the duration of the call, so
    /// it can mutate itself while calling back into `engine`.
    fn tick(&mut self, _delta: f64, _engine: &mut Engine) -> Result<()> {
        Ok(())
    }

    /// Snapshot of the plugin state
    fn save(&self) -> Value;

    /// Restore a snapshot produced by [`Plugin::save`]
    fn load(&mut self, data: Value) -> Result<()>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
