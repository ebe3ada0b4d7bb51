//! RON encoding of save data

use crate::{Error, Result};
use idlekit_core::GameSaveData;
use ron::ser::PrettyConfig;

/// Encodes [`GameSaveData`] as RON text
#[derive(Debug, Clone)]
pub struct RonEncoder {
    pretty: Option<PrettyConfig>,
}

impl RonEncoder {
    /// Pretty-printed output
    pub fn pretty() -> Self {
        Self {
            pretty: Some(PrettyConfig::default()),
        }
    }

    /// Single-line output
    pub fn compact() -> Self {
        Self { pretty: None }
    }

    pub fn encode(&self, data: &GameSaveData) -> Result<String> {
        let encoded = match &self.pretty {
            Some(config) => ron::ser::to_string_pretty(data, config.clone()),
            None => ron::ser::to_string(data),
        };
        encoded.map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn decode(&self, text: &str) -> Result<GameSaveData> {
        Ok(ron::from_str(text)?)
    }
}

impl Default for RonEncoder {
    fn default() -> Self {
        Self::pretty()
    }
}
