//! Bundled resource sources
//!
//! A bundle maps resource identifiers of the form
//! `<namespace>.Native.<libraryFileName>` to library bytes.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Build the resource identifier for a bundled library
pub fn resource_id(namespace: &str, file_name: &str) -> String {
    format!("{}.Native.{}", namespace, file_name)
}

/// Source of bundled native library bytes
pub trait ResourceBundle: Send + Sync {
    /// Namespace used to derive resource identifiers
    fn namespace(&self) -> &str;

    /// Byte length of a resource, or `None` if the bundle does not have it
    fn resource_len(&self, resource_id: &str) -> Option<u64>;

    /// Load a resource's bytes; `Ok(None)` if the bundle does not have it
    fn load(&self, resource_id: &str) -> io::Result<Option<Cow<'_, [u8]>>>;
}

/// Bundle backed by bytes compiled into the binary
///
/// ```ignore
/// let bundle = EmbeddedBundle::new("Soul")
///     .with_library("libbass.so", &include_bytes!("../native/libbass.so")[..]);
/// ```
#[derive(Debug, Clone)]
pub struct EmbeddedBundle {
    namespace: String,
    resources: HashMap<String, Cow<'static, [u8]>>,
}

impl EmbeddedBundle {
    /// Create an empty bundle for a product namespace
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            resources: HashMap::new(),
        }
    }

    /// Register a library under its derived resource identifier
    pub fn with_library(
        mut self,
        file_name: &str,
        bytes: impl Into<Cow<'static, [u8]>>,
    ) -> Self {
        let id = resource_id(&self.namespace, file_name);
        self.resources.insert(id, bytes.into());
        self
    }

    /// Number of registered resources
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether no resource is registered
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl ResourceBundle for EmbeddedBundle {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn resource_len(&self, resource_id: &str) -> Option<u64> {
        self.resources.get(resource_id).map(|bytes| bytes.len() as u64)
    }

    fn load(&self, resource_id: &str) -> io::Result<Option<Cow<'_, [u8]>>> {
        Ok(self
            .resources
            .get(resource_id)
            .map(|bytes| Cow::Borrowed(bytes.as_ref())))
    }
}

/// Bundle backed by a directory of library files
///
/// Used by developer builds and the CLI, where the libraries sit next to the
/// binary instead of being compiled in.
#[derive(Debug, Clone)]
pub struct DirectoryBundle {
    namespace: String,
    directory: PathBuf,
}

impl DirectoryBundle {
    /// Create a bundle reading `<directory>/<libraryFileName>`
    pub fn new(namespace: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            namespace: namespace.into(),
            directory: directory.into(),
        }
    }

    /// Directory the bundle reads from
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn file_for(&self, resource_id: &str) -> Option<PathBuf> {
        let prefix = format!("{}.Native.", self.namespace);
        let file_name = resource_id.strip_prefix(&prefix)?;
        if file_name.is_empty() || file_name == ".." || file_name.contains(['/', '\\']) {
            return None;
        }
        Some(self.directory.join(file_name))
    }
}

impl ResourceBundle for DirectoryBundle {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn resource_len(&self, resource_id: &str) -> Option<u64> {
        let path = self.file_for(resource_id)?;
        fs::metadata(path)
            .ok()
            .filter(|meta| meta.is_file())
            .map(|meta| meta.len())
    }

    fn load(&self, resource_id: &str) -> io::Result<Option<Cow<'_, [u8]>>> {
        let Some(path) = self.file_for(resource_id) else {
            return Ok(None);
        };
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(Cow::Owned(bytes))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}
