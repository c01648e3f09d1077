//! Soul Engine
//!
//! Orchestrates a native audio engine for offline analysis: provisioning and
//! bootstrap, scoped decode sessions, tempo detection and ReplayGain
//! measurement. Everything talks to the engine through the
//! [`soul_core::AudioEngine`] trait.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────┐     ┌─────────────────┐     ┌───────────────┐
//! │ LibraryProvisioner │ ──► │ EngineBootstrap │ ──► │ AudioEngine   │
//! └────────────────────┘     └─────────────────┘     └───────────────┘
//!                                                            ▲
//!                   ┌───────────────┐   ┌──────────────┐     │
//!                   │ TempoAnalyzer │   │ GainAnalyzer │ ────┤
//!                   └───────────────┘   └──────────────┘     │
//!                           └──────► DecodeSession ──────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use soul_engine::{EngineBootstrap, EngineConfig, GainAnalyzer};
//! use soul_native::{DirectoryBundle, LibraryProvisioner, ProvisionerConfig};
//! use std::sync::Arc;
//!
//! let provisioner = LibraryProvisioner::new(
//!     ProvisionerConfig::default(),
//!     DirectoryBundle::new("Soul", "/opt/soul/native"),
//! );
//! let bootstrap = EngineBootstrap::new(engine, provisioner, EngineConfig::default());
//!
//! let report = bootstrap.initialize();
//! assert!(report.success);
//!
//! let gain = GainAnalyzer::new(Arc::clone(bootstrap.engine()))
//!     .measure(Path::new("/music/song.flac"), None, None);
//! println!("Track gain: {:+.2} dB", gain.track_gain_db);
//!
//! bootstrap.shutdown();
//! ```

#![forbid(unsafe_code)]

pub mod bootstrap;
pub mod config;
mod gain;
mod session;
mod tempo;

pub use bootstrap::{
    EngineBootstrap, EngineState, FailedPlugin, InitializationReport, LoadedPlugin,
    PluginLoadHandle, PluginLoadProgress, NOT_IN_CATALOG,
};
pub use config::{EngineConfig, PluginStrategy};
pub use gain::{GainAnalyzer, GainMeasurement, GainResult, CHUNK_SIZE, SCAN_PRIORITY};
pub use session::{DecodeSession, LoudnessScan, SESSION_FLAGS};
pub use tempo::{TempoAnalyzer, TempoOptions, TempoResult};

// Cancellation token used by the analyzers
pub use tokio_util::sync::CancellationToken;
