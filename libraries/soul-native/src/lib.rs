//! Native library provisioning for Soul analysis
//!
//! The audio engine and its add-ons ship as shared libraries embedded in the
//! application. Before the first engine call they are extracted to a stable,
//! per-version directory under the OS temp directory, and looked up by name
//! from then on.
//!
//! ```text
//! ┌────────────────┐     ┌─────────────────────┐     ┌────────────────┐
//! │ ResourceBundle │ ──► │ LibraryProvisioner  │ ──► │ LibraryCatalog │
//! └────────────────┘     └─────────────────────┘     └────────────────┘
//!                          <tmp>/<product>/<module>/<version>/<file>
//! ```
//!
//! # Example
//!
//! ```ignore
//! use soul_native::{EmbeddedBundle, LibraryProvisioner, ProvisionerConfig};
//!
//! let bundle = EmbeddedBundle::new("Soul")
//!     .with_library("libbass.so", &include_bytes!("../native/libbass.so")[..]);
//! let mut provisioner = LibraryProvisioner::new(ProvisionerConfig::default(), bundle);
//! provisioner.initialize()?;
//! let engine_path = provisioner.get_path("libbass.so")?;
//! ```

#![forbid(unsafe_code)]

mod bundle;
mod error;
pub mod libraries;
mod provisioner;

pub use bundle::{resource_id, DirectoryBundle, EmbeddedBundle, ResourceBundle};
pub use error::{ProvisionError, Result};
pub use provisioner::{LibraryProvisioner, ProvisionerConfig};
