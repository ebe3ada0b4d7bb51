//! Idlekit Save - RON persistence and content loading
//!
//! - [`RonEncoder`] encodes and decodes [`GameSaveData`](idlekit_core::GameSaveData)
//! - [`FileStore`] is a [`SaveStore`](idlekit_core::SaveStore) keeping one RON file per key
//! - [`ContentLoader`] reads plugin definitions and builds a ready [`Engine`](idlekit_core::Engine)

mod encoder;
mod error;
mod loader;
mod store;

pub use encoder::RonEncoder;
pub use error::{Error, Result};
pub use loader::{ContentLoader, GameContent};
pub use store::FileStore;
