//! Common error types for junction components.

use thiserror::Error;

/// Common errors across junction components
#[derive(Debug, Error)]
pub enum JunctionError {
    /// World-state key is absent
    #[error("World-state key not found: {0}")]
    NotFound(String),

    /// Neighbour hint has the wrong shape
    #[error("Malformed hint from junction {junction}: {reason}")]
    MalformedHint { junction: u32, reason: String },

    /// Signed hint names a publisher other than the slot's owner
    #[error("Invalid hint signature: expected junction {expected}, got {found:?}")]
    InvalidSignature { expected: u32, found: String },

    /// Hint area was never provisioned
    #[error("Hint store unavailable: {0}")]
    StoreUnavailable(String),

    /// Reading or writing a hint record failed
    #[error("Hint store I/O error on {record}: {source}")]
    HintIo {
        record: String,
        #[source]
        source: std::io::Error,
    },

    /// World-state link is broken
    #[error("World-state connection failure: {0}")]
    ConnectionFailure(#[source] std::io::Error),

    /// Stored value does not decode as its declared type
    #[error("Invalid value at {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl JunctionError {
    /// Returns true if this error must end the controller loop
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConnectionFailure(_) | Self::Config(_))
    }

    /// Returns true if the tick may carry on past this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MalformedHint { .. } | Self::InvalidSignature { .. } | Self::StoreUnavailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let broken = JunctionError::ConnectionFailure(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "gone",
        ));
        assert!(broken.is_fatal());
        assert!(!broken.is_recoverable());

        let spoofed = JunctionError::InvalidSignature {
            expected: 2,
            found: "3".to_string(),
        };
        assert!(spoofed.is_recoverable());
        assert!(!spoofed.is_fatal());

        let missing = JunctionError::NotFound("junction-1::north::vehicle_count".to_string());
        assert!(!missing.is_fatal());
        assert!(!missing.is_recoverable());
    }
}
