mod bpm;
mod device;
mod flags;
mod handles;

pub use bpm::BpmRange;
pub use device::{ChannelInfo, Device, DeviceInfo, PluginFormat, PluginInfo};
pub use flags::{
    ConfigOption, ExclusiveFlags, InitFlags, LoudnessMode, LoudnessModes, StreamFlags, TempoFlags,
};
pub use handles::{PluginHandle, ScanHandle, StreamHandle};
