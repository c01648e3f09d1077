/// Core error types for Soul analysis
use std::fmt;
use thiserror::Error;

/// Result type alias using `SoulError`
pub type Result<T> = std::result::Result<T, SoulError>;

/// Error code reported by the audio engine
///
/// Engine calls return the code together with the failed call, so there is no
/// global "last error" to read back later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Memory error
    Mem,
    /// Can't open the file
    FileOpen,
    /// Can't find a free/valid driver
    Driver,
    /// Invalid handle
    Handle,
    /// Unsupported sample format
    Format,
    /// Engine (or add-on) has not been initialized
    Init,
    /// Already initialized / already loaded
    Already,
    /// An illegal parameter was specified
    IllParam,
    /// Illegal device number
    Device,
    /// Requested data/action is not available
    NotAvail,
    /// Unsupported file format
    FileForm,
    /// Codec is not available/supported
    Codec,
    /// The channel has ended
    Ended,
    /// Some other mystery problem
    Unknown,
}

impl ErrorCode {
    /// Numeric code, stable across backends
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Mem => 1,
            Self::FileOpen => 2,
            Self::Driver => 3,
            Self::Handle => 5,
            Self::Format => 6,
            Self::Init => 8,
            Self::Already => 14,
            Self::IllParam => 20,
            Self::Device => 23,
            Self::NotAvail => 37,
            Self::FileForm => 41,
            Self::Codec => 44,
            Self::Ended => 45,
            Self::Unknown => -1,
        }
    }

    /// Short human-readable description
    pub fn description(self) -> &'static str {
        match self {
            Self::Mem => "memory error",
            Self::FileOpen => "can't open the file",
            Self::Driver => "no free or valid driver",
            Self::Handle => "invalid handle",
            Self::Format => "unsupported sample format",
            Self::Init => "engine not initialized",
            Self::Already => "already initialized or loaded",
            Self::IllParam => "illegal parameter",
            Self::Device => "illegal device number",
            Self::NotAvail => "not available",
            Self::FileForm => "unsupported file format",
            Self::Codec => "codec not available",
            Self::Ended => "channel has ended",
            Self::Unknown => "unknown error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.description(), self.as_i32())
    }
}

/// Core error type for Soul analysis
#[derive(Error, Debug)]
pub enum SoulError {
    /// Entity not found (library, file, plugin)
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A component was used before it was initialized
    #[error("Not initialized: {0}")]
    NotInitialized(String),

    /// The audio engine rejected a call
    #[error("Engine error during {operation}: {code}")]
    Engine {
        operation: &'static str,
        code: ErrorCode,
    },

    /// Analysis could not produce a value
    #[error("Analysis failed: {0}")]
    Analysis(String),

    /// Cooperative cancellation was observed
    #[error("Analysis cancelled")]
    Cancelled,

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl SoulError {
    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create an engine error for the named operation
    pub fn engine(operation: &'static str, code: ErrorCode) -> Self {
        Self::Engine { operation, code }
    }

    /// Create an analysis error
    pub fn analysis(msg: impl Into<String>) -> Self {
        Self::Analysis(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Engine error code, if this error came from an engine call
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Engine { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether this error is a cancellation rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
