//! Error handling for Uartium
//!
//! This module defines custom error types and a Result alias for use
//! throughout the crate. Decoding and trigger evaluation never produce
//! errors; only operations that touch files or line sources do.

use thiserror::Error;

/// Main error type for Uartium operations
#[derive(Error, Debug)]
pub enum UartiumError {
    /// Errors related to configuration loading/saving/validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to the trigger persistence file
    #[error("Trigger file error at {path}: {reason}")]
    TriggerFile { path: String, reason: String },

    /// The line source failed to open or read
    #[error("Source error: {0}")]
    Source(String),

    /// The line source is gone (port unplugged, end of stream)
    #[error("Disconnected: {0}")]
    Disconnected(String),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// Errors related to record export
    #[error("Export error: {0}")]
    Export(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<UartiumError>,
    },
}

impl UartiumError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        UartiumError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error (or the error it wraps) means the source is gone for good
    pub fn is_disconnect(&self) -> bool {
        match self {
            UartiumError::Disconnected(_) => true,
            UartiumError::WithContext { source, .. } => source.is_disconnect(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for UartiumError {
    fn from(err: serde_json::Error) -> Self {
        UartiumError::Serialization(err.to_string())
    }
}

/// Result type alias for Uartium operations
pub type Result<T> = std::result::Result<T, UartiumError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::io::Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| UartiumError::Io(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| UartiumError::Io(e).with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = UartiumError::Config("queue_capacity must be > 0".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: queue_capacity must be > 0"
        );
    }

    #[test]
    fn test_error_with_context() {
        let err = UartiumError::Source("port busy".to_string());
        let with_ctx = err.with_context("Failed to open /dev/ttyUSB0");
        assert!(with_ctx.to_string().contains("Failed to open /dev/ttyUSB0"));
        assert!(with_ctx.to_string().contains("port busy"));
    }

    #[test]
    fn test_trigger_file_error() {
        let err = UartiumError::TriggerFile {
            path: "triggers.json".to_string(),
            reason: "missing field `trigger_type`".to_string(),
        };
        assert!(err.to_string().contains("triggers.json"));
        assert!(err.to_string().contains("trigger_type"));
    }

    #[test]
    fn test_io_result_context() {
        let res: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no such file",
        ));
        let err = res.context("reading config").unwrap_err();
        assert!(matches!(err, UartiumError::WithContext { .. }));
        assert!(err.to_string().starts_with("reading config"));
    }

    #[test]
    fn test_is_disconnect_through_context() {
        let err = UartiumError::Disconnected("end of stream".to_string()).with_context("reader");
        assert!(err.is_disconnect());
        assert!(!UartiumError::Source("x".to_string()).is_disconnect());
    }
}
