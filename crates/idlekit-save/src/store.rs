//! Save files on disk, one RON file per save key

use crate::{Error, RonEncoder, Result};
use idlekit_core::{GameSaveData, SaveStore};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Keeps each save as `<dir>/<key>.ron`
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    encoder: RonEncoder,
}

impl FileStore {
    /// Use `dir` for saves, creating it if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            encoder: RonEncoder::default(),
        })
    }

    pub fn with_encoder(mut self, encoder: RonEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file a key is saved to
    pub fn path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key == "." || key == ".." {
            return Err(Error::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.ron", key)))
    }

    /// Encode and write a save, replacing the previous file only once written
    pub fn write(&self, key: &str, data: &GameSaveData) -> Result<()> {
        let path = self.path(key)?;
        let text = self.encoder.encode(data)?;

        let partial = path.with_extension("ron.tmp");
        fs::write(&partial, text)?;
        fs::rename(&partial, &path)?;
        debug!(path = %path.display(), "save written");
        Ok(())
    }

    /// Read and decode a save, `None` if the key has never been saved
    pub fn read(&self, key: &str) -> Result<Option<GameSaveData>> {
        let path = self.path(key)?;
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(self.encoder.decode(&text)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a save, reporting whether one existed
    pub fn remove(&self, key: &str) -> Result<bool> {
        match fs::remove_file(self.path(key)?) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

impl SaveStore for FileStore {
    fn store(&mut self, key: &str, data: &GameSaveData) -> idlekit_core::Result<()> {
        Ok(self.write(key, data)?)
    }

    fn fetch(&self, key: &str) -> idlekit_core::Result<Option<GameSaveData>> {
        Ok(self.read(key)?)
    }
}
