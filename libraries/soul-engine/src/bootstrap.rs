//! Engine bootstrap
//!
//! Brings the engine from nothing to a ready state:
//!
//! ```text
//! Uninitialized ──initialize()──► Initializing ──► Ready(report)
//!       ▲                                     └──► Failed(report)
//!       └──────────────────shutdown()──────────────────┘
//! ```
//!
//! The report of the first `initialize()` is cached; later calls return the
//! same `Arc` without touching the engine until `shutdown()` resets the state.
//! Format plugins load on a background thread after the bootstrap has
//! returned; [`PluginLoadHandle`] tracks them.

use crate::config::{EngineConfig, PluginStrategy};
use soul_core::types::{ConfigOption, Device, DeviceInfo, PluginFormat};
use soul_core::{AudioEngine, ErrorCode, Result, SoulError};
use soul_native::{libraries, LibraryProvisioner};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::JoinHandle;
use tokio::sync::watch;

/// Failure reason for a plugin the provisioner could not supply
pub const NOT_IN_CATALOG: &str = "not available in library catalog";

/// Name of the background plugin loading thread
pub const PLUGIN_LOADER_THREAD: &str = "soul-plugin-loader";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Lifecycle state of the engine
#[derive(Debug, Clone)]
pub enum EngineState {
    Uninitialized,
    Initializing,
    Ready(Arc<InitializationReport>),
    Failed(Arc<InitializationReport>),
}

impl EngineState {
    /// Cached report of a finished bootstrap
    pub fn report(&self) -> Option<&Arc<InitializationReport>> {
        match self {
            Self::Ready(report) | Self::Failed(report) => Some(report),
            Self::Uninitialized | Self::Initializing => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// A format plugin the engine accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedPlugin {
    /// Library stem (`bassflac`)
    pub name: String,
    /// Formats the plugin adds
    pub formats: Vec<PluginFormat>,
}

/// A format plugin that could not be loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedPlugin {
    /// Library stem (`bassflac`)
    pub name: String,
    pub reason: String,
}

/// Point-in-time view of plugin loading
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginLoadProgress {
    pub loaded: Vec<LoadedPlugin>,
    pub failed: Vec<FailedPlugin>,
    pub complete: bool,
}

#[derive(Debug, Default)]
struct PluginLists {
    loaded: Vec<LoadedPlugin>,
    failed: Vec<FailedPlugin>,
}

#[derive(Debug)]
struct PluginLoadShared {
    lists: Mutex<PluginLists>,
    done: watch::Sender<bool>,
}

/// Completion handle for background plugin loading
///
/// Cheap to clone; every clone observes the same loader.
#[derive(Debug, Clone)]
pub struct PluginLoadHandle {
    shared: Arc<PluginLoadShared>,
}

impl PluginLoadHandle {
    fn new() -> Self {
        let (done, _) = watch::channel(false);
        Self {
            shared: Arc::new(PluginLoadShared {
                lists: Mutex::new(PluginLists::default()),
                done,
            }),
        }
    }

    /// A handle with nothing to load
    fn finished() -> Self {
        let handle = Self::new();
        handle.mark_complete();
        handle
    }

    /// Whether the loader has gone through every plugin
    pub fn is_complete(&self) -> bool {
        *self.shared.done.borrow()
    }

    /// Plugins loaded so far
    pub fn loaded(&self) -> Vec<LoadedPlugin> {
        lock(&self.shared.lists).loaded.clone()
    }

    /// Plugins that failed so far
    pub fn failed(&self) -> Vec<FailedPlugin> {
        lock(&self.shared.lists).failed.clone()
    }

    /// Names of the plugins loaded so far
    pub fn loaded_names(&self) -> Vec<String> {
        lock(&self.shared.lists)
            .loaded
            .iter()
            .map(|p| p.name.clone())
            .collect()
    }

    pub fn snapshot(&self) -> PluginLoadProgress {
        // Read completion first: a complete snapshot always has full lists
        let complete = self.is_complete();
        let lists = lock(&self.shared.lists);
        PluginLoadProgress {
            loaded: lists.loaded.clone(),
            failed: lists.failed.clone(),
            complete,
        }
    }

    /// Wait until plugin loading has finished
    pub async fn wait(&self) {
        let mut done = self.shared.done.subscribe();
        // The sender lives in `self`, so the channel cannot close here
        let _ = done.wait_for(|complete| *complete).await;
    }

    fn record_loaded(&self, name: String, formats: Vec<PluginFormat>) {
        lock(&self.shared.lists)
            .loaded
            .push(LoadedPlugin { name, formats });
    }

    fn record_failed(&self, name: String, reason: String) {
        lock(&self.shared.lists)
            .failed
            .push(FailedPlugin { name, reason });
    }

    fn mark_complete(&self) {
        self.shared.done.send_replace(true);
    }
}

/// Marks plugin loading complete when dropped, including on panic
struct CompletionGuard(PluginLoadHandle);

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.0.mark_complete();
    }
}

/// Outcome of a bootstrap
#[derive(Debug)]
pub struct InitializationReport {
    /// The engine is usable
    pub success: bool,
    /// The primary engine initialized
    pub engine_ready: bool,
    /// The exclusive-mode output subsystem initialized
    pub exclusive_ready: bool,
    pub error_message: Option<String>,
    /// Engine error code of the fatal failure, if it came from the engine
    pub error_code: Option<ErrorCode>,
    /// Degraded-but-continue events
    pub warnings: Vec<String>,
    /// Device the engine is using, if it could be queried
    pub device: Option<DeviceInfo>,
    /// Background plugin loading
    pub plugins: PluginLoadHandle,
}

impl InitializationReport {
    fn failure(message: String, code: Option<ErrorCode>, warnings: Vec<String>) -> Self {
        Self {
            success: false,
            engine_ready: false,
            exclusive_ready: false,
            error_message: Some(message),
            error_code: code,
            warnings,
            device: None,
            plugins: PluginLoadHandle::finished(),
        }
    }
}

/// Sets the engine search path and clears it again on drop
struct SearchPathGuard<'a> {
    engine: &'a dyn AudioEngine,
}

impl<'a> SearchPathGuard<'a> {
    fn set(engine: &'a dyn AudioEngine, dir: &Path) -> std::result::Result<Self, ErrorCode> {
        engine.set_search_path(dir)?;
        tracing::debug!("Engine search path set to {}", dir.display());
        Ok(Self { engine })
    }
}

impl Drop for SearchPathGuard<'_> {
    fn drop(&mut self) {
        if let Err(code) = self.engine.clear_search_path() {
            tracing::warn!("Failed to clear engine search path: {}", code);
        }
    }
}

/// One plugin to load, resolved against the catalog
struct PluginPlan {
    name: String,
    path: Option<PathBuf>,
}

struct Lifecycle {
    provisioner: LibraryProvisioner,
    loader: Option<JoinHandle<()>>,
}

/// Owns the engine lifecycle
pub struct EngineBootstrap {
    engine: Arc<dyn AudioEngine>,
    config: EngineConfig,
    /// Serializes initialize/shutdown
    lifecycle: Mutex<Lifecycle>,
    state: RwLock<EngineState>,
}

impl EngineBootstrap {
    pub fn new(
        engine: Arc<dyn AudioEngine>,
        provisioner: LibraryProvisioner,
        config: EngineConfig,
    ) -> Self {
        Self {
            engine,
            config,
            lifecycle: Mutex::new(Lifecycle {
                provisioner,
                loader: None,
            }),
            state: RwLock::new(EngineState::Uninitialized),
        }
    }

    pub fn engine(&self) -> &Arc<dyn AudioEngine> {
        &self.engine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> EngineState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Report of the last finished bootstrap
    pub fn report(&self) -> Option<Arc<InitializationReport>> {
        self.state().report().cloned()
    }

    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    fn set_state(&self, state: EngineState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Bring the engine up, or return the cached report
    pub fn initialize(&self) -> Arc<InitializationReport> {
        let mut lifecycle = lock(&self.lifecycle);
        if let Some(report) = self.report() {
            tracing::debug!("Engine already bootstrapped");
            return report;
        }

        self.set_state(EngineState::Initializing);
        let report = Arc::new(self.bootstrap(&mut lifecycle));

        if report.success {
            tracing::info!(
                "Engine ready (exclusive output: {}, {} warning(s))",
                report.exclusive_ready,
                report.warnings.len()
            );
            self.set_state(EngineState::Ready(Arc::clone(&report)));
        } else {
            tracing::error!(
                "Engine bootstrap failed: {}",
                report.error_message.as_deref().unwrap_or("unknown error")
            );
            self.set_state(EngineState::Failed(Arc::clone(&report)));
        }
        report
    }

    fn bootstrap(&self, lifecycle: &mut Lifecycle) -> InitializationReport {
        let engine = self.engine.as_ref();
        let mut warnings = Vec::new();

        if let Err(e) = lifecycle.provisioner.initialize() {
            return InitializationReport::failure(
                format!("Native library provisioning failed: {}", e),
                None,
                warnings,
            );
        }
        let root = match lifecycle.provisioner.root_directory() {
            Ok(root) => root.to_path_buf(),
            Err(e) => {
                return InitializationReport::failure(
                    format!("No native libraries available: {}", e),
                    None,
                    warnings,
                )
            }
        };

        let search_path = match SearchPathGuard::set(engine, &root) {
            Ok(guard) => guard,
            Err(code) => {
                return InitializationReport::failure(
                    format!("Failed to set engine search path: {}", code),
                    Some(code),
                    warnings,
                )
            }
        };

        if let Err(code) = engine.init(
            Device::Default,
            self.config.sample_rate,
            self.config.init_flags(),
        ) {
            return InitializationReport::failure(
                format!("Engine init failed: {}", code),
                Some(code),
                warnings,
            );
        }
        tracing::info!("Engine initialized at {} Hz", self.config.sample_rate);

        let mut exclusive_ready = false;
        if self.config.exclusive_mode {
            match engine.exclusive_init(self.config.sample_rate, 2, self.config.exclusive_flags()) {
                Ok(()) => {
                    tracing::info!("Exclusive output initialized");
                    exclusive_ready = true;
                }
                Err(code) => {
                    tracing::warn!("Exclusive output unavailable: {}", code);
                    warnings.push(format!("Exclusive output unavailable: {}", code));
                }
            }
        }

        self.apply_engine_config(&mut warnings);

        let plan = self.plan_plugins(&lifecycle.provisioner);
        let plugins = PluginLoadHandle::new();
        lifecycle.loader = self.dispatch_plugin_loader(plan, &plugins, &mut warnings);
        drop(search_path);

        let device = match engine.device_info() {
            Ok(device) => {
                tracing::info!(
                    "Output device: {} ({})",
                    device.name,
                    device.driver.as_deref().unwrap_or("no driver")
                );
                Some(device)
            }
            Err(code) => {
                tracing::warn!("Could not query output device: {}", code);
                warnings.push(format!("Could not query output device: {}", code));
                None
            }
        };

        InitializationReport {
            success: true,
            engine_ready: true,
            exclusive_ready,
            error_message: None,
            error_code: None,
            warnings,
            device,
            plugins,
        }
    }

    fn apply_engine_config(&self, warnings: &mut Vec<String>) {
        let options = [
            (ConfigOption::PlaybackBuffer, self.config.playback_buffer_ms),
            (ConfigOption::UpdatePeriod, self.config.update_period_ms),
            (ConfigOption::UpdateThreads, self.config.update_threads),
        ];
        for (option, value) in options {
            if let Err(code) = self.engine.set_config(option, value) {
                tracing::warn!("Engine rejected {:?} = {}: {}", option, value, code);
                warnings.push(format!("Engine rejected {:?} = {}: {}", option, value, code));
            }
        }
    }

    /// Plugins to load under the configured strategy, with catalog paths
    fn plan_plugins(&self, provisioner: &LibraryProvisioner) -> Vec<PluginPlan> {
        match self.config.plugin_strategy {
            PluginStrategy::Essential => libraries::FORMAT_PLUGINS
                .iter()
                .map(|stem| PluginPlan {
                    name: (*stem).to_string(),
                    path: provisioner
                        .get_path(&libraries::file_name(stem))
                        .ok()
                        .map(Path::to_path_buf),
                })
                .collect(),
            PluginStrategy::All => {
                let engine_library = libraries::canonical(&libraries::file_name(libraries::ENGINE));
                provisioner
                    .libraries()
                    .filter(|(name, _)| *name != engine_library)
                    .map(|(name, path)| PluginPlan {
                        name: libraries::stem(name).to_string(),
                        path: Some(path.to_path_buf()),
                    })
                    .collect()
            }
        }
    }

    fn dispatch_plugin_loader(
        &self,
        plan: Vec<PluginPlan>,
        plugins: &PluginLoadHandle,
        warnings: &mut Vec<String>,
    ) -> Option<JoinHandle<()>> {
        let names: Vec<String> = plan.iter().map(|p| p.name.clone()).collect();
        tracing::debug!("Dispatching {} plugin load(s)", names.len());

        let engine = Arc::clone(&self.engine);
        let handle = plugins.clone();
        let spawned = std::thread::Builder::new()
            .name(PLUGIN_LOADER_THREAD.to_string())
            .spawn(move || load_plugins(engine.as_ref(), plan, &handle));

        match spawned {
            Ok(thread) => Some(thread),
            Err(e) => {
                tracing::warn!("Could not start plugin loader: {}", e);
                warnings.push(format!("Could not start plugin loader: {}", e));
                for name in names {
                    plugins.record_failed(name, format!("plugin loader did not start: {}", e));
                }
                plugins.mark_complete();
                None
            }
        }
    }

    /// Tear the engine down; every step is best effort
    pub fn shutdown(&self) {
        let mut lifecycle = lock(&self.lifecycle);
        let state = self.state();
        if matches!(state, EngineState::Uninitialized) {
            tracing::debug!("Engine not bootstrapped, nothing to shut down");
            return;
        }
        tracing::info!("Shutting down engine");

        if let Some(loader) = lifecycle.loader.take() {
            if loader.join().is_err() {
                tracing::warn!("Plugin loader thread panicked");
            }
        }

        if state.report().is_some_and(|r| r.exclusive_ready) {
            if let Err(code) = self.engine.exclusive_free() {
                tracing::warn!("Failed to free exclusive output: {}", code);
            }
        }

        if let Err(code) = self.engine.free() {
            tracing::warn!("Failed to free engine: {}", code);
        }

        lifecycle.provisioner.cleanup();
        self.set_state(EngineState::Uninitialized);
    }

    /// [`initialize`](Self::initialize) on the blocking thread pool
    pub async fn initialize_async(self: &Arc<Self>) -> Result<Arc<InitializationReport>> {
        let this = Arc::clone(self);
        tokio::task::spawn_blocking(move || this.initialize())
            .await
            .map_err(|e| SoulError::Other(format!("bootstrap task failed: {}", e)))
    }

    /// [`shutdown`](Self::shutdown) on the blocking thread pool
    pub async fn shutdown_async(self: &Arc<Self>) {
        let this = Arc::clone(self);
        if let Err(e) = tokio::task::spawn_blocking(move || this.shutdown()).await {
            tracing::error!("Shutdown task failed: {}", e);
        }
    }
}

impl std::fmt::Debug for EngineBootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBootstrap")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn load_plugins(engine: &dyn AudioEngine, plan: Vec<PluginPlan>, handle: &PluginLoadHandle) {
    let _complete = CompletionGuard(handle.clone());

    for PluginPlan { name, path } in plan {
        let Some(path) = path else {
            tracing::warn!("Plugin {} {}", name, NOT_IN_CATALOG);
            handle.record_failed(name, NOT_IN_CATALOG.to_string());
            continue;
        };

        match engine.plugin_load(&path) {
            Ok(plugin) => {
                let formats = match engine.plugin_info(plugin) {
                    Ok(info) => info.formats,
                    Err(code) => {
                        tracing::debug!("No format info for plugin {}: {}", name, code);
                        Vec::new()
                    }
                };
                tracing::debug!("Loaded plugin {} ({} format(s))", name, formats.len());
                handle.record_loaded(name, formats);
            }
            Err(code) => {
                tracing::warn!("Failed to load plugin {}: {}", name, code);
                handle.record_failed(name, format!("engine rejected plugin: {}", code));
            }
        }
    }

    let progress = handle.snapshot();
    tracing::info!(
        "Plugin loading finished: {} loaded, {} failed",
        progress.loaded.len(),
        progress.failed.len()
    );
}
