// Sling Error Handling
// Error taxonomy for handler-chain setup, hook plumbing and configuration

use std::fmt;
use thiserror::Error;

// Re-export common error handling tools for convenience
pub use thiserror;

mod codes;

pub use codes::*;

/// Error kinds grouping the failures the engine itself can report.
///
/// These are never produced by user payloads: a raised value that nobody
/// catches is not an error of this crate, it simply keeps propagating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The handler chain could not be constructed
    Setup,
    /// A hook override produced something the pipeline cannot use
    Hook,
    /// Misuse detected while an exception was in flight
    Runtime,
    /// Process configuration could not be installed or parsed
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Setup => write!(f, "setup"),
            ErrorKind::Hook => write!(f, "hook"),
            ErrorKind::Runtime => write!(f, "runtime"),
            ErrorKind::Config => write!(f, "config"),
        }
    }
}

/// Error code structure for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ErrorCode(pub u32);

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

/// Standard error message format for serialization
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ErrorMessage {
    pub code: ErrorCode,
    pub kind: ErrorKind,
    pub message: String,
}

/// Errors reported by the engine itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlingError {
    /// More than one finally block in a clause list
    #[error("Setup error: a handler may declare at most one finally block")]
    DuplicateFinally,

    /// A catch clause declared after the finally block
    #[error("Setup error: catch clause #{0} follows the finally block")]
    ClauseAfterFinally(usize),

    /// A type selector naming a type nobody registered
    #[error("Setup error: unresolvable type selector '{0}'")]
    UnresolvedType(String),

    /// A key/value selector that is not exactly a pair
    #[error("Setup error: key/value selector needs 2 elements, got {0}")]
    KeyValueArity(usize),

    /// A selector of an unrecognised shape
    #[error("Setup error: malformed selector: {0}")]
    MalformedSelector(String),

    /// A type name registered twice
    #[error("Setup error: type name '{0}' is already registered")]
    DuplicateTypeName(String),

    /// A hook returned a value of a type the caller did not ask for
    #[error("Hook error: returned value is not a {expected}")]
    ReturnType { expected: &'static str },

    /// A no-payload raise issued outside any handler body
    #[error("Runtime error: rethrow called with no exception being handled")]
    NoActiveHandler,

    /// Configuration installed more than once
    #[error("Config error: configuration is already installed")]
    AlreadyConfigured,

    /// Configuration value could not be parsed
    #[error("Config error: invalid value for {key}: {value}")]
    InvalidConfig { key: String, value: String },
}

impl SlingError {
    /// Numeric code of this error
    pub fn code(&self) -> ErrorCode {
        match self {
            SlingError::DuplicateFinally => DUPLICATE_FINALLY,
            SlingError::ClauseAfterFinally(_) => CLAUSE_AFTER_FINALLY,
            SlingError::UnresolvedType(_) => UNRESOLVED_TYPE,
            SlingError::KeyValueArity(_) => KEY_VALUE_ARITY,
            SlingError::MalformedSelector(_) => MALFORMED_SELECTOR,
            SlingError::DuplicateTypeName(_) => DUPLICATE_TYPE_NAME,
            SlingError::ReturnType { .. } => RETURN_TYPE,
            SlingError::NoActiveHandler => NO_ACTIVE_HANDLER,
            SlingError::AlreadyConfigured => ALREADY_CONFIGURED,
            SlingError::InvalidConfig { .. } => INVALID_CONFIG,
        }
    }

    /// Kind this error belongs to, derived from its code range
    pub fn kind(&self) -> ErrorKind {
        match self.code().0 {
            1000..=1999 => ErrorKind::Setup,
            2000..=2999 => ErrorKind::Hook,
            3000..=3999 => ErrorKind::Runtime,
            _ => ErrorKind::Config,
        }
    }

    /// Whether this error aborts handler-chain construction
    pub fn is_setup(&self) -> bool {
        self.kind() == ErrorKind::Setup
    }

    /// Convert into the serializable message form
    pub fn to_message(&self) -> ErrorMessage {
        ErrorMessage {
            code: self.code(),
            kind: self.kind(),
            message: self.to_string(),
        }
    }

    /// Create a new unresolved type error
    pub fn unresolved_type(name: impl Into<String>) -> Self {
        SlingError::UnresolvedType(name.into())
    }

    /// Create a new malformed selector error
    pub fn malformed_selector(message: impl Into<String>) -> Self {
        SlingError::MalformedSelector(message.into())
    }

    /// Create a new invalid config error
    pub fn invalid_config(key: impl Into<String>, value: impl Into<String>) -> Self {
        SlingError::InvalidConfig {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Convenient Result type for engine operations
pub type Result<T> = std::result::Result<T, SlingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_map_to_kinds() {
        assert_eq!(SlingError::DuplicateFinally.kind(), ErrorKind::Setup);
        assert_eq!(SlingError::KeyValueArity(3).kind(), ErrorKind::Setup);
        assert_eq!(SlingError::ReturnType { expected: "i32" }.kind(), ErrorKind::Hook);
        assert_eq!(SlingError::NoActiveHandler.kind(), ErrorKind::Runtime);
        assert_eq!(SlingError::invalid_config("x", "y").kind(), ErrorKind::Config);
        assert!(SlingError::unresolved_type("Foo").is_setup());
        assert!(!SlingError::NoActiveHandler.is_setup());
    }

    #[test]
    fn test_error_message_serializes() {
        let message = SlingError::KeyValueArity(3).to_message();
        assert_eq!(message.code, KEY_VALUE_ARITY);
        assert_eq!(format!("{}", message.code), "1004");

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["kind"], "Setup");
        assert_eq!(json["message"], "Setup error: key/value selector needs 2 elements, got 3");

        let back: ErrorMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, message);
    }
}
