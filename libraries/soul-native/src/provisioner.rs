//! Extraction of bundled libraries and the in-memory library catalog

use crate::bundle::{resource_id, ResourceBundle};
use crate::error::{ProvisionError, Result};
use crate::libraries;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Where and what to provision
#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    /// Base directory, normally the OS temp directory
    pub temp_root: PathBuf,
    /// Product directory name
    pub product_name: String,
    /// Module directory name
    pub module_name: String,
    /// Version directory name; a new version extracts into a fresh directory
    pub module_version: String,
    /// Resource namespace, see [`resource_id`]
    pub namespace: String,
    /// Library file names to extract
    pub libraries: Vec<String>,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            temp_root: std::env::temp_dir(),
            product_name: "SoulPlayer".to_string(),
            module_name: "soul-native".to_string(),
            module_version: env!("CARGO_PKG_VERSION").to_string(),
            namespace: "Soul".to_string(),
            libraries: libraries::bundled(),
        }
    }
}

impl ProvisionerConfig {
    /// `<temp_root>/<product>/<module>/<version>`
    pub fn target_directory(&self) -> PathBuf {
        self.temp_root
            .join(&self.product_name)
            .join(&self.module_name)
            .join(&self.module_version)
    }
}

/// Extracts bundled native libraries and resolves them by name
///
/// The catalog maps the lower-cased library file name to the absolute path of
/// the extracted file. A name is only present if its file existed on disk
/// when it was added.
pub struct LibraryProvisioner {
    config: ProvisionerConfig,
    bundle: Box<dyn ResourceBundle>,
    catalog: BTreeMap<String, PathBuf>,
    initialized: bool,
}

impl LibraryProvisioner {
    /// Create a provisioner; nothing touches the filesystem until
    /// [`LibraryProvisioner::initialize`]
    pub fn new(config: ProvisionerConfig, bundle: impl ResourceBundle + 'static) -> Self {
        Self {
            config,
            bundle: Box::new(bundle),
            catalog: BTreeMap::new(),
            initialized: false,
        }
    }

    /// Provisioner configuration
    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    /// Extract every configured library and populate the catalog
    ///
    /// Only a failure to create the target directory is fatal. A library
    /// whose resource is missing or whose extraction fails is logged and left
    /// out of the catalog. Calling this again before [`cleanup`] does nothing.
    ///
    /// An existing file with the same byte length as the resource is reused
    /// as-is; contents are not compared.
    ///
    /// [`cleanup`]: LibraryProvisioner::cleanup
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            tracing::debug!("Native libraries already provisioned");
            return Ok(());
        }

        let target = self.config.target_directory();
        fs::create_dir_all(&target).map_err(|e| ProvisionError::io(&target, e))?;

        let target = fs::canonicalize(&target).unwrap_or(target);
        tracing::info!("Provisioning native libraries into {}", target.display());

        for file_name in &self.config.libraries {
            match self.extract(&target, file_name) {
                Ok(path) => {
                    self.catalog.insert(libraries::canonical(file_name), path);
                }
                Err(e) => {
                    tracing::warn!("Skipping native library {}: {}", file_name, e);
                }
            }
        }

        tracing::info!(
            "Provisioned {} of {} native libraries",
            self.catalog.len(),
            self.config.libraries.len()
        );
        self.initialized = true;
        Ok(())
    }

    fn extract(&self, target: &Path, file_name: &str) -> Result<PathBuf> {
        let id = resource_id(&self.config.namespace, file_name);
        let expected_len = self
            .bundle
            .resource_len(&id)
            .ok_or_else(|| ProvisionError::MissingResource(id.clone()))?;

        let path = target.join(file_name);
        if let Ok(meta) = fs::metadata(&path) {
            if meta.is_file() && meta.len() == expected_len {
                tracing::debug!("{} already extracted", file_name);
                return Ok(path);
            }
        }

        let bytes = self
            .bundle
            .load(&id)
            .map_err(|e| ProvisionError::io(&path, e))?
            .ok_or_else(|| ProvisionError::MissingResource(id.clone()))?;
        fs::write(&path, bytes.as_ref()).map_err(|e| ProvisionError::io(&path, e))?;

        tracing::debug!("Extracted {} ({} bytes)", file_name, bytes.len());
        Ok(path)
    }

    /// Absolute path of a provisioned library (case-insensitive)
    pub fn get_path(&self, name: &str) -> Result<&Path> {
        self.catalog
            .get(&libraries::canonical(name))
            .map(PathBuf::as_path)
            .ok_or_else(|| ProvisionError::NotFound(name.to_string()))
    }

    /// Whether a library is in the catalog
    pub fn is_available(&self, name: &str) -> bool {
        self.catalog.contains_key(&libraries::canonical(name))
    }

    /// Directory holding the provisioned libraries
    pub fn root_directory(&self) -> Result<&Path> {
        self.catalog
            .values()
            .next()
            .and_then(|path| path.parent())
            .ok_or(ProvisionError::NotInitialized)
    }

    /// Catalog entries as `(name, path)`, sorted by name
    pub fn libraries(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.catalog
            .iter()
            .map(|(name, path)| (name.as_str(), path.as_path()))
    }

    /// Forget the catalog; extracted files stay on disk
    pub fn cleanup(&mut self) {
        tracing::debug!("Clearing native library catalog");
        self.catalog.clear();
        self.initialized = false;
    }
}

impl std::fmt::Debug for LibraryProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryProvisioner")
            .field("config", &self.config)
            .field("catalog", &self.catalog)
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::EmbeddedBundle;

    fn config(root: &Path) -> ProvisionerConfig {
        ProvisionerConfig {
            temp_root: root.to_path_buf(),
            product_name: "Product".to_string(),
            module_name: "module".to_string(),
            module_version: "1.2.3".to_string(),
            namespace: "Soul".to_string(),
            libraries: vec!["libbass.so".to_string()],
        }
    }

    #[test]
    fn target_directory_layout() {
        let config = config(Path::new("/tmp"));
        assert_eq!(
            config.target_directory(),
            Path::new("/tmp/Product/module/1.2.3")
        );
    }

    #[test]
    fn lookups_before_initialize() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner = LibraryProvisioner::new(config(dir.path()), EmbeddedBundle::new("Soul"));

        assert!(!provisioner.is_available("libbass.so"));
        assert!(matches!(
            provisioner.root_directory(),
            Err(ProvisionError::NotInitialized)
        ));
        assert_eq!(provisioner.libraries().count(), 0);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = EmbeddedBundle::new("Soul").with_library("libbass.so", vec![7u8; 8]);
        let mut provisioner = LibraryProvisioner::new(config(dir.path()), bundle);
        provisioner.initialize().unwrap();

        assert!(provisioner.is_available("LIBBASS.SO"));
        assert_eq!(
            provisioner.get_path("LibBass.so").unwrap(),
            provisioner.get_path("libbass.so").unwrap()
        );
    }
}
