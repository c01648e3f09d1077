/// Device, channel and plugin information reported by the engine
use serde::{Deserialize, Serialize};
use std::fmt;

/// Output device selection for engine initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    /// The system default output device
    Default,
    /// No output; decode-only operation
    NoSound,
    /// A specific device by index
    Index(u32),
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::NoSound => write!(f, "no sound"),
            Self::Index(i) => write!(f, "#{}", i),
        }
    }
}

/// Information about an output device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device name (human-readable)
    pub name: String,

    /// Driver identifier, if the engine exposes one
    pub driver: Option<String>,

    /// Is this the system default device?
    pub is_default: bool,

    /// Is the device enabled?
    pub is_enabled: bool,

    /// Has the engine initialized this device?
    pub is_initialized: bool,
}

/// Format metadata of an open stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// Sample rate in Hz
    pub frequency: u32,

    /// Number of channels
    pub channels: u16,

    /// Bits per sample of the source, if known
    pub source_bits: Option<u16>,
}

impl ChannelInfo {
    /// Bytes per second of the float sample stream produced by the engine
    pub fn float_byte_rate(&self) -> u64 {
        u64::from(self.frequency) * u64::from(self.channels) * 4
    }
}

/// A file format a plugin adds to the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginFormat {
    /// Format description
    pub name: String,

    /// File extensions, lower-case without the dot
    pub extensions: Vec<String>,
}

/// Information about a loaded plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Plugin version
    pub version: u32,

    /// Formats supported by the plugin
    pub formats: Vec<PluginFormat>,
}
