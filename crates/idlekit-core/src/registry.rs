//! Keyed extension registries

use crate::{Error, Extension, Result};
use indexmap::IndexMap;
use std::fmt;
use std::rc::Rc;
use tracing::warn;

/// The five extension kinds, each with its own not-found error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionKind {
    Evaluator,
    Consumer,
    Producer,
    Controller,
    Modifier,
}

impl ExtensionKind {
    /// Build the kind-specific lookup error for `kind`
    pub fn not_found(&self, kind: &str, registered: String) -> Error {
        let kind = kind.to_string();
        match self {
            ExtensionKind::Evaluator => Error::ConditionNotFound { kind, registered },
            ExtensionKind::Consumer => Error::InputNotFound { kind, registered },
            ExtensionKind::Producer => Error::OutputNotFound { kind, registered },
            ExtensionKind::Controller => Error::ControllerNotFound { kind, registered },
            ExtensionKind::Modifier => Error::ModifierNotFound { kind, registered },
        }
    }
}

impl fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExtensionKind::Evaluator => "evaluator",
            ExtensionKind::Consumer => "consumer",
            ExtensionKind::Producer => "producer",
            ExtensionKind::Controller => "controller",
            ExtensionKind::Modifier => "modifier",
        };
        write!(f, "{}", name)
    }
}

/// Extensions of one kind, keyed by their `type` and kept in insertion order
pub struct Registry<T: ?Sized> {
    kind: ExtensionKind,
    entries: IndexMap<String, Rc<T>>,
}

impl<T: ?Sized + Extension> Registry<T> {
    /// Create an empty registry
    pub fn new(kind: ExtensionKind) -> Self {
        Self {
            kind,
            entries: IndexMap::new(),
        }
    }

    /// Which kind of extension this registry holds
    pub fn kind(&self) -> ExtensionKind {
        self.kind
    }

    /// Store an extension under its type, replacing (and returning) any prior entry
    ///
    /// A replaced entry keeps its original position.
    pub fn insert(&mut self, extension: Rc<T>) -> Option<Rc<T>> {
        let key = extension.kind().to_string();
        let previous = self.entries.insert(key, extension);
        if let Some(previous) = &previous {
            warn!(
                extension = previous.kind(),
                "duplicate registration replaced the previous {}",
                self.kind
            );
        }
        previous
    }

    /// Look up an extension, failing with the kind-specific not-found error
    pub fn get(&self, kind: &str) -> Result<Rc<T>> {
        self.entries
            .get(kind)
            .cloned()
            .ok_or_else(|| self.kind.not_found(kind, self.registered()))
    }

    /// Check whether a type is registered
    pub fn contains(&self, kind: &str) -> bool {
        self.entries.contains_key(kind)
    }

    /// Registered types in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Registered extensions in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Rc<T>> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn registered(&self) -> String {
        self.keys().collect::<Vec<_>>().join(", ")
    }
}

impl<T: ?Sized> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("types", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
