//! Save payload shapes and the storage boundary
//!
//! The engine and the game only produce and consume these values. How they
//! are encoded and where they are kept is up to a [`SaveStore`].

use crate::{Result, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `plugin name -> plugin state`
pub type EngineSaveData = IndexMap<String, Value>;

/// `feature name -> feature state`
pub type FeaturesSaveData = IndexMap<String, Value>;

/// Everything a [`Game`](crate::Game) persists
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameSaveData {
    pub engine: EngineSaveData,
    #[serde(default)]
    pub features: FeaturesSaveData,
}

/// Somewhere saves can be kept under a key
pub trait SaveStore {
    /// Store a save, replacing whatever was kept under `key`
    fn store(&mut self, key: &str, data: &GameSaveData) -> Result<()>;

    /// Fetch the save kept under `key`, if any
    fn fetch(&self, key: &str) -> Result<Option<GameSaveData>>;
}

/// Keeps saves in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    saves: HashMap<String, GameSaveData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a save
    pub fn len(&self) -> usize {
        self.saves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.saves.is_empty()
    }
}

impl SaveStore for MemoryStore {
    fn store(&mut self, key: &str, data: &GameSaveData) -> Result<()> {
        self.saves.insert(key.to_string(), data.clone());
        Ok(())
    }

    fn fetch(&self, key: &str) -> Result<Option<GameSaveData>> {
        Ok(self.saves.get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::new();
        assert!(store.fetch("slot").unwrap().is_none());

        let mut data = GameSaveData::default();
        data.engine.insert("currency".into(), Value::Float(5.0));
        store.store("slot", &data).unwrap();

        assert_eq!(store.fetch("slot").unwrap(), Some(data));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_features_default_when_missing() {
        let data: GameSaveData = ron::from_str(r#"(engine: {"currency": {"gold": 5.0}})"#).unwrap();
        assert!(data.features.is_empty());
        assert_eq!(data.engine.len(), 1);
    }
}
