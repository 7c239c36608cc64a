//! Error types for codeweb

use thiserror::Error;

/// Result type alias for codeweb operations
pub type Result<T> = std::result::Result<T, CodewebError>;

/// Unified error type for all codeweb operations
#[derive(Error, Debug, Clone)]
pub enum CodewebError {
    /// Store unreachable at startup or during an operation's network phase
    #[error("Connection error: {0}")]
    Connection(String),

    /// An `_id` string in a filter is not a valid ObjectId
    #[error("Error converting _id '{value}' to ObjectId: {reason}")]
    Conversion { value: String, reason: String },

    /// Any other store-reported failure
    #[error("Error during {operation} in {database}.{collection}: {reason}")]
    Operation {
        operation: &'static str,
        database: String,
        collection: String,
        reason: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CodewebError {
    /// Returns true if the store could not be reached
    pub fn is_connection(&self) -> bool {
        matches!(self, CodewebError::Connection(_))
    }

    /// Returns true if this error is potentially retryable by the caller.
    ///
    /// The data-access layer never retries on its own.
    pub fn is_retryable(&self) -> bool {
        self.is_connection()
    }

    /// Returns true if the caller supplied a malformed identifier
    pub fn is_conversion(&self) -> bool {
        matches!(self, CodewebError::Conversion { .. })
    }
}

impl From<serde_json::Error> for CodewebError {
    fn from(err: serde_json::Error) -> Self {
        CodewebError::Serialization(err.to_string())
    }
}

// MongoDB-specific error conversions (when mongodb-errors feature is enabled)
#[cfg(feature = "mongodb-errors")]
impl CodewebError {
    /// Wrap a driver error raised while running `operation` on
    /// `database.collection`.
    ///
    /// Server selection, I/O and pool-cleared failures mean the store was not
    /// reachable and become [`CodewebError::Connection`]; everything else is an
    /// [`CodewebError::Operation`].
    pub fn from_store(
        operation: &'static str,
        database: &str,
        collection: &str,
        err: mongodb::error::Error,
    ) -> Self {
        use mongodb::error::ErrorKind;

        match *err.kind {
            ErrorKind::ServerSelection { .. }
            | ErrorKind::Io(_)
            | ErrorKind::ConnectionPoolCleared { .. } => CodewebError::Connection(format!(
                "{} in {}.{}: {}",
                operation, database, collection, err
            )),
            _ => CodewebError::Operation {
                operation,
                database: database.to_string(),
                collection: collection.to_string(),
                reason: err.to_string(),
            },
        }
    }
}

#[cfg(feature = "mongodb-errors")]
impl From<bson::ser::Error> for CodewebError {
    fn from(err: bson::ser::Error) -> Self {
        CodewebError::Serialization(format!("BSON serialization error: {}", err))
    }
}

#[cfg(feature = "mongodb-errors")]
impl From<bson::de::Error> for CodewebError {
    fn from(err: bson::de::Error) -> Self {
        CodewebError::Serialization(format!("BSON deserialization error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_connection() {
        let err = CodewebError::Connection("timeout".to_string());
        assert_eq!(err.to_string(), "Connection error: timeout");
    }

    #[test]
    fn test_error_display_conversion() {
        let err = CodewebError::Conversion {
            value: "not-an-id".to_string(),
            reason: "invalid hex string".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Error converting _id 'not-an-id' to ObjectId: invalid hex string"
        );
    }

    #[test]
    fn test_error_display_operation() {
        let err = CodewebError::Operation {
            operation: "find",
            database: "account".to_string(),
            collection: "user".to_string(),
            reason: "bad query".to_string(),
        };
        assert_eq!(err.to_string(), "Error during find in account.user: bad query");
    }

    #[test]
    fn test_error_display_config() {
        let err = CodewebError::Config("MONGODB_URL is not set".to_string());
        assert_eq!(err.to_string(), "Configuration error: MONGODB_URL is not set");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: CodewebError = json_err.into();
        assert!(matches!(err, CodewebError::Serialization(_)));
    }

    #[test]
    fn test_is_retryable() {
        assert!(CodewebError::Connection("down".to_string()).is_retryable());
        assert!(!CodewebError::Internal("bug".to_string()).is_retryable());
        assert!(!CodewebError::Conversion {
            value: "x".to_string(),
            reason: "y".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_is_conversion() {
        let err = CodewebError::Conversion {
            value: "x".to_string(),
            reason: "y".to_string(),
        };
        assert!(err.is_conversion());
        assert!(!err.is_connection());
    }
}
