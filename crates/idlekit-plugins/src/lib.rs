//! Idlekit Plugins - Reference gameplay plugins
//!
//! - [`currency`]: named amounts, with has/spend/gain extensions and a gain bonus
//! - [`generator`]: content that runs a scaled transaction every tick while active
//! - [`upgrade`]: levelled purchases that publish bonuses
//!
//! Each module exposes a `register` function that adds the plugin and every
//! extension it contributes to an [`Engine`](idlekit_core::Engine).

pub mod currency;
pub mod generator;
pub mod upgrade;

pub use currency::{CurrencyDefinition, CurrencyPlugin};
pub use generator::{GeneratorDefinition, GeneratorEvent, GeneratorPlugin, TickFailure};
pub use upgrade::{UpgradeDefinition, UpgradeEvent, UpgradePlugin};
