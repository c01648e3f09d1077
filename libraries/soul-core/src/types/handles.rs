/// Opaque engine handle types
use std::fmt;
use std::num::NonZeroU32;

macro_rules! engine_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Wrap a raw handle; a zero handle signals failure and yields `None`
            pub fn from_raw(raw: u32) -> Option<Self> {
                NonZeroU32::new(raw).map(Self)
            }

            /// Raw handle value
            pub fn raw(self) -> u32 {
                self.0.get()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#010x}", self.0.get())
            }
        }
    };
}

engine_handle!(
    /// Handle to a decode stream opened by the engine
    StreamHandle
);

engine_handle!(
    /// Handle to a loudness scan attached to a stream
    ScanHandle
);

engine_handle!(
    /// Handle to a loaded format plugin
    PluginHandle
);
