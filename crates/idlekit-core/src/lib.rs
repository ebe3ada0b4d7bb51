//! Idlekit Core - Extension-point rules engine for incremental games
//!
//! This crate provides the engine every gameplay plugin is written against:
//! - Dynamic values and `type`-tagged payloads (`Value`, `Payload`)
//! - Extension registries keyed by payload type
//! - Condition evaluation, input/output effects and atomic transactions
//! - Per-tick bonus aggregation
//! - A plugin host (`Engine`) and a lifecycle driver (`Game`)
//!
//! ## Payload Routing
//!
//! Conditions, inputs, outputs, requests and bonuses are all [`Payload`]s. The
//! engine looks up the extension registered under the payload's `type` and
//! hands it a private copy, rewritten by the extension's `modify` hook:
//!
//! ```
//! use idlekit_core::{stdlib, Engine, Payload};
//!
//! let mut engine = Engine::new();
//! stdlib::register(&mut engine).unwrap();
//!
//! let never = Payload::new("/not").with("condition", Payload::new("/true"));
//! assert!(engine.evaluate(&[Payload::new("/true")]).unwrap());
//! assert!(!engine.evaluate_one(&never).unwrap());
//! ```
//!
//! Transactions check their requirement, input and output before applying
//! anything, so a rejected transaction leaves every plugin untouched.

mod bonus;
mod config;
mod engine;
mod error;
mod events;
mod extension;
pub mod game;
mod payload;
pub mod persistence;
mod plugin;
mod registry;
pub mod stdlib;
pub mod transaction;
mod value;

pub use bonus::{identity, BonusContribution, BonusTable, ContributionSlot, Variant};
pub use config::GameConfig;
pub use engine::{Engine, EngineBuilder};
pub use error::{Error, Result};
pub use events::{EventQueue, DEFAULT_EVENT_CAPACITY};
pub use extension::{Consumer, Controller, Evaluator, Extension, Modifier, Producer};
pub use game::{Feature, Game, GameBuilder, GameEvent};
pub use payload::{Bonus, Condition, Input, Output, Payload, Request};
pub use persistence::{EngineSaveData, FeaturesSaveData, GameSaveData, MemoryStore, SaveStore};
pub use plugin::Plugin;
pub use registry::{ExtensionKind, Registry};
pub use transaction::{Scheduled, Settled, Transaction, TransactionOutcome};
pub use value::{Value, ValueMap};
