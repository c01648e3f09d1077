/// Flag sets passed to engine calls
use serde::{Deserialize, Serialize};
use std::ops::{BitOr, BitOrAssign};

macro_rules! engine_flags {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$fmeta:meta])* const $flag:ident = $value:expr; )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            $( $(#[$fmeta])* pub const $flag: Self = Self($value); )*

            /// No flags set
            pub const fn empty() -> Self {
                Self(0)
            }

            /// Build from raw bits
            pub const fn from_bits(bits: u32) -> Self {
                Self(bits)
            }

            /// Raw bits
            pub const fn bits(self) -> u32 {
                self.0
            }

            /// Whether every bit of `other` is set
            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            /// Whether no bit is set
            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }
        }

        impl BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }
    };
}

engine_flags!(
    /// Flags for primary engine initialization
    InitFlags {
        /// Limit output to mono
        const MONO = 0x2;
        /// Measure device latency during init
        const LATENCY = 0x100;
        /// Use the requested sample rate rather than the device rate
        const FREQ = 0x4000;
        /// Limit output to stereo
        const STEREO = 0x8000;
    }
);

engine_flags!(
    /// Flags for the exclusive-mode output subsystem
    ExclusiveFlags {
        /// Request exclusive (bit-perfect) device access
        const EXCLUSIVE = 0x1;
        /// Let the subsystem pick the closest supported format
        const AUTOFORMAT = 0x2;
        /// Keep a playback buffer in addition to the device buffer
        const BUFFER = 0x4;
        /// Event-driven rather than timer-driven feeding
        const EVENT = 0x10;
    }
);

engine_flags!(
    /// Flags for stream creation
    StreamFlags {
        /// Produce 32-bit floating point samples
        const FLOAT = 0x100;
        /// Scan the whole file up front for an exact length
        const PRESCAN = 0x20000;
        /// Decode only; never routed to an output device
        const DECODE = 0x0020_0000;
    }
);

engine_flags!(
    /// Flags for tempo estimation
    TempoFlags {
        /// Run at background priority
        const BACKGROUND = 0x1;
    }
);

engine_flags!(
    /// Measurements requested from a loudness scan
    LoudnessModes {
        /// Integrated loudness (LUFS)
        const INTEGRATED = 0x1;
        /// Loudness range (LU)
        const RANGE = 0x2;
        /// True peak (linear)
        const TRUE_PEAK = 0x4;
    }
);

/// A single loudness measurement to read back from a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoudnessMode {
    /// Integrated loudness in LUFS
    Integrated,
    /// Loudness range in LU
    Range,
    /// True peak, linear amplitude
    TruePeak,
}

impl LoudnessMode {
    /// The scan mode bit required to read this measurement
    pub fn required_mode(self) -> LoudnessModes {
        match self {
            Self::Integrated => LoudnessModes::INTEGRATED,
            Self::Range => LoudnessModes::RANGE,
            Self::TruePeak => LoudnessModes::TRUE_PEAK,
        }
    }
}

/// Engine-wide configuration options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigOption {
    /// Playback buffer length in milliseconds
    PlaybackBuffer,
    /// Update period in milliseconds (0 disables automatic updates)
    UpdatePeriod,
    /// Number of update threads
    UpdateThreads,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_combine() {
        let flags = StreamFlags::DECODE | StreamFlags::FLOAT;
        assert!(flags.contains(StreamFlags::DECODE));
        assert!(flags.contains(StreamFlags::FLOAT));
        assert!(!flags.contains(StreamFlags::PRESCAN));
        assert!(StreamFlags::empty().is_empty());
    }

    #[test]
    fn loudness_modes_match_reads() {
        let modes = LoudnessModes::INTEGRATED | LoudnessModes::TRUE_PEAK;
        assert!(modes.contains(LoudnessMode::Integrated.required_mode()));
        assert!(!modes.contains(LoudnessMode::Range.required_mode()));
    }
}
