use thiserror::Error;

/// Main error type for the KerasGalaxy system
#[derive(Error, Debug)]
pub enum KgError {
    #[error("Parameter error: {0}")]
    Param(#[from] ParamError),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Estimator is not fitted yet; call fit before {operation}")]
    NotFitted { operation: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Errors raised by the flat parameter namespace
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParamError {
    #[error("Invalid key segment {segment:?}: {reason}")]
    InvalidSegment { segment: String, reason: String },

    #[error("Unknown parameter: {key}")]
    UnknownParameter { key: String },

    #[error("Unsupported keyword {keyword:?}; accepted by {callables}: {accepted:?}")]
    UnsupportedKeyword {
        keyword: String,
        callables: String,
        accepted: Vec<String>,
    },

    #[error("Duplicate parameter key: {key}")]
    DuplicateKey { key: String },

    #[error("Invalid value for {name}: expected {expected}, found {found}")]
    InvalidValue {
        name: String,
        expected: String,
        found: String,
    },
}

/// Result type alias for parameter operations
pub type ParamResult<T> = Result<T, ParamError>;

/// Result type alias for KerasGalaxy operations
pub type KgResult<T> = Result<T, KgError>;

/// Helper trait for converting string errors
pub trait IntoKgError {
    fn into_kg_error(self) -> KgError;
}

impl IntoKgError for String {
    fn into_kg_error(self) -> KgError {
        KgError::Model(self)
    }
}

impl IntoKgError for &str {
    fn into_kg_error(self) -> KgError {
        KgError::Model(self.to_string())
    }
}

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::KgError::Validation(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::KgError::Config(format!($($arg)*))
    };
}
