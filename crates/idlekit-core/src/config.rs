//! Game configuration - tick cadence and save settings

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a [`Game`](crate::Game)
///
/// # Example
///
/// ```
/// use idlekit_core::GameConfig;
///
/// let config = GameConfig::default()
///     .with_tick_duration(0.5)
///     .with_save_key("slot-1");
/// assert_eq!(config.tick_duration, 0.5);
/// assert_eq!(config.save_interval, 30.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Seconds between ticks when the timer is running
    pub tick_duration: f64,
    /// Seconds of game time between automatic saves
    pub save_interval: f64,
    /// Key saves are stored under
    pub save_key: String,
    /// Most ticks a single [`Game::pump`](crate::Game::pump) runs to catch up
    pub max_catch_up_ticks: u32,
}

impl GameConfig {
    pub fn with_tick_duration(mut self, seconds: f64) -> Self {
        self.tick_duration = seconds;
        self
    }

    pub fn with_save_interval(mut self, seconds: f64) -> Self {
        self.save_interval = seconds;
        self
    }

    pub fn with_save_key(mut self, key: impl Into<String>) -> Self {
        self.save_key = key.into();
        self
    }

    pub fn with_max_catch_up_ticks(mut self, ticks: u32) -> Self {
        self.max_catch_up_ticks = ticks;
        self
    }

    /// The tick duration as a timer interval
    ///
    /// Fails unless the duration is a positive, finite number of seconds.
    pub fn tick_interval(&self) -> Result<Duration> {
        if !(self.tick_duration > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "tick_duration must be positive, got {}",
                self.tick_duration
            )));
        }
        Duration::try_from_secs_f64(self.tick_duration)
            .map_err(|e| Error::InvalidConfig(format!("tick_duration: {}", e)))
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_duration: 0.1,
            save_interval: 30.0,
            save_key: "idlekit".to_string(),
            max_catch_up_ticks: 10,
        }
    }
}
