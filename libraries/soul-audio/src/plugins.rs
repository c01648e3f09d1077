//! Format plugin registry
//!
//! Some container formats are only opened once the format plugin that adds
//! them has been loaded, mirroring an engine whose core decodes a fixed set of
//! formats and learns the rest from shared-library plugins.

use soul_core::types::{PluginFormat, PluginHandle, PluginInfo};
use soul_core::ErrorCode;
use std::collections::HashMap;
use std::path::Path;

struct KnownPlugin {
    stem: &'static str,
    format: &'static str,
    extensions: &'static [&'static str],
}

const KNOWN_PLUGINS: &[KnownPlugin] = &[
    KnownPlugin {
        stem: "bass_aac",
        format: "Advanced Audio Coding",
        extensions: &["aac", "m4a", "mp4"],
    },
    KnownPlugin {
        stem: "bassalac",
        format: "Apple Lossless",
        extensions: &["m4a", "mp4"],
    },
    KnownPlugin {
        stem: "bass_mpc",
        format: "Musepack",
        extensions: &["mpc", "mp+", "mpp"],
    },
    KnownPlugin {
        stem: "bass_ape",
        format: "Monkey's Audio",
        extensions: &["ape"],
    },
    KnownPlugin {
        stem: "bassflac",
        format: "FLAC",
        extensions: &["flac"],
    },
    KnownPlugin {
        stem: "bassopus",
        format: "Opus",
        extensions: &["opus"],
    },
    KnownPlugin {
        stem: "basswebm",
        format: "WebM",
        extensions: &["webm", "weba"],
    },
    KnownPlugin {
        stem: "basswv",
        format: "WavPack",
        extensions: &["wv"],
    },
];

/// Version reported for every format plugin (major in the high 16 bits)
pub const PLUGIN_VERSION: u32 = 0x0001_0000;

/// Extensions the engine decodes without any plugin
pub const NATIVE_EXTENSIONS: &[&str] = &["wav", "aiff", "aif", "mp1", "mp2", "mp3", "ogg"];

/// Library stem of a plugin file: `libbassflac.so` and `bassflac.dll` both
/// give `bassflac`
fn plugin_stem(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?.to_lowercase();
    Some(match stem.strip_prefix("lib") {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => stem,
    })
}

/// Loaded format plugins
#[derive(Default)]
pub struct PluginRegistry {
    loaded: HashMap<u32, &'static KnownPlugin>,
    next_handle: u32,
}

impl PluginRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the plugin at `path`
    ///
    /// # Errors
    /// `FileOpen` if the file does not exist, `FileForm` if it is not a known
    /// format plugin, `Already` if it is loaded
    pub fn load(&mut self, path: &Path) -> Result<PluginHandle, ErrorCode> {
        if !path.is_file() {
            return Err(ErrorCode::FileOpen);
        }
        let stem = plugin_stem(path).ok_or(ErrorCode::FileForm)?;
        let plugin = KNOWN_PLUGINS
            .iter()
            .find(|p| p.stem == stem)
            .ok_or(ErrorCode::FileForm)?;

        if self.loaded.values().any(|p| p.stem == plugin.stem) {
            return Err(ErrorCode::Already);
        }

        self.next_handle += 1;
        let handle = PluginHandle::from_raw(self.next_handle).ok_or(ErrorCode::Mem)?;
        self.loaded.insert(handle.raw(), plugin);
        Ok(handle)
    }

    /// Formats a loaded plugin adds
    pub fn info(&self, handle: PluginHandle) -> Result<PluginInfo, ErrorCode> {
        let plugin = self.loaded.get(&handle.raw()).ok_or(ErrorCode::Handle)?;
        Ok(PluginInfo {
            version: PLUGIN_VERSION,
            formats: vec![PluginFormat {
                name: plugin.format.to_string(),
                extensions: plugin.extensions.iter().map(|e| (*e).to_string()).collect(),
            }],
        })
    }

    /// Whether a file with this extension can be opened right now
    pub fn supports_extension(&self, ext: &str) -> bool {
        let ext = ext.to_lowercase();
        if NATIVE_EXTENSIONS.contains(&ext.as_str()) {
            return true;
        }
        let needs_plugin = KNOWN_PLUGINS.iter().any(|p| p.extensions.contains(&ext.as_str()));
        if !needs_plugin {
            // Unknown extension: let the prober decide from the content
            return true;
        }
        self.loaded
            .values()
            .any(|p| p.extensions.contains(&ext.as_str()))
    }

    /// Number of loaded plugins
    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    /// Whether no plugin is loaded
    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }

    /// Unload every plugin
    pub fn clear(&mut self) {
        self.loaded.clear();
    }
}
