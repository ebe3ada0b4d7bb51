//! RON content loader
//!
//! A content file lists definitions for the reference plugins plus data-driven
//! modifiers. Every section is optional:
//!
//! ```ron
//! (
//!     currencies: [(id: "gold", start_amount: 10.0)],
//!     generators: [(id: "mine", output: {"type": "/currency/gain", "id": "gold", "amount": 1.0})],
//!     upgrades: [],
//!     modifiers: [(type: "/bonus/speed", variant: "additive", default: 0.0)],
//! )
//! ```

use crate::{Error, Result};
use idlekit_core::{stdlib, stdlib::ConfiguredModifier, Engine};
use idlekit_plugins::{
    currency, generator, upgrade, CurrencyDefinition, CurrencyPlugin, GeneratorDefinition,
    GeneratorPlugin, UpgradeDefinition, UpgradePlugin,
};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Definitions gathered from one or more content files
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GameContent {
    pub currencies: Vec<CurrencyDefinition>,
    pub generators: Vec<GeneratorDefinition>,
    pub upgrades: Vec<UpgradeDefinition>,
    pub modifiers: Vec<ConfiguredModifier>,
}

impl GameContent {
    /// Build an engine with the stdlib, every reference plugin loaded with this
    /// content, and the declared modifiers
    pub fn build_engine(self) -> Result<Engine> {
        let mut currencies = CurrencyPlugin::new();
        currencies.load_content(self.currencies);
        let mut generators = GeneratorPlugin::new();
        generators.load_content(self.generators);
        let mut upgrades = UpgradePlugin::new();
        upgrades.load_content(self.upgrades)?;

        let mut engine = Engine::new();
        stdlib::register(&mut engine)?;
        currency::register(&mut engine, currencies)?;
        generator::register(&mut engine, generators)?;
        upgrade::register(&mut engine, upgrades)?;
        for modifier in self.modifiers {
            engine.register_modifier(modifier)?;
        }
        Ok(engine)
    }
}

/// Loader for RON content files
///
/// Ids must be unique per section across everything loaded.
#[derive(Debug, Default)]
pub struct ContentLoader {
    content: GameContent,
    seen: HashSet<(&'static str, String)>,
}

impl ContentLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load content from a RON string
    ///
    /// Nothing from `text` is kept if any of its ids was already loaded.
    pub fn load_str(&mut self, text: &str) -> Result<()> {
        let content: GameContent = ron::from_str(text)?;

        let ids = content
            .currencies
            .iter()
            .map(|c| ("currency", c.id.clone()))
            .chain(content.generators.iter().map(|g| ("generator", g.id.clone())))
            .chain(content.upgrades.iter().map(|u| ("upgrade", u.id.clone())))
            .chain(content.modifiers.iter().map(|m| ("modifier", m.kind.clone())));

        let mut batch = HashSet::new();
        for (section, id) in ids {
            if self.seen.contains(&(section, id.clone())) || !batch.insert((section, id.clone())) {
                return Err(Error::DuplicateDefinition(format!("{} '{}'", section, id)));
            }
        }
        self.seen.extend(batch);

        self.content.currencies.extend(content.currencies);
        self.content.generators.extend(content.generators);
        self.content.upgrades.extend(content.upgrades);
        self.content.modifiers.extend(content.modifiers);
        Ok(())
    }

    /// Load a single RON file
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading content");
        let text = fs::read_to_string(path)?;
        self.load_str(&text)
    }

    /// Load every `.ron` file of a directory, recursively, in name order
    pub fn load_directory(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Not a directory: {:?}", path),
            )));
        }

        let mut entries = fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        entries.sort();

        for entry in entries {
            if entry.is_dir() {
                self.load_directory(&entry)?;
            } else if entry.extension().is_some_and(|e| e == "ron") {
                self.load_file(&entry)?;
            }
        }
        Ok(())
    }

    /// Current content, for inspection while loading
    pub fn content(&self) -> &GameContent {
        &self.content
    }

    pub fn finish(self) -> GameContent {
        self.content
    }
}
