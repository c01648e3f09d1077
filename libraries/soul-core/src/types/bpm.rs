/// BPM search range and its packed wire representation
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive BPM search range for tempo estimation
///
/// The engine's tempo call takes the range as a single 32-bit parameter:
/// bits 0-15 hold the minimum BPM and bits 16-31 the maximum BPM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BpmRange {
    /// Lowest tempo considered
    pub min: u16,
    /// Highest tempo considered
    pub max: u16,
}

impl BpmRange {
    /// Default search range used for track analysis
    pub const DEFAULT: Self = Self { min: 60, max: 200 };

    /// Create a new range
    pub const fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    /// Pack into the engine parameter: `(max << 16) | (min & 0xFFFF)`
    pub const fn pack(self) -> u32 {
        ((self.max as u32) << 16) | (self.min as u32 & 0xFFFF)
    }

    /// Split an engine parameter back into its two fields
    pub const fn unpack(packed: u32) -> Self {
        Self {
            min: (packed & 0xFFFF) as u16,
            max: (packed >> 16) as u16,
        }
    }

    /// Whether the range can be searched at all
    pub fn is_valid(self) -> bool {
        self.min > 0 && self.max > self.min
    }
}

impl Default for BpmRange {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for BpmRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{} BPM", self.min, self.max)
    }
}
