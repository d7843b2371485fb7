//! Error types for the earthtones pipeline

use thiserror::Error;

/// Result type alias for earthtones operations
pub type Result<T> = std::result::Result<T, EarthtonesError>;

/// Every way a palette request can fail
#[derive(Error, Debug)]
pub enum EarthtonesError {
    /// Caller supplied a bad zoom, method, provider or similar; raised before any I/O
    #[error("Invalid parameter `{parameter}`: {reason}")]
    InvalidParameter { parameter: String, reason: String },

    /// Imagery could not be retrieved from the provider
    #[error("Tile retrieval failed: {message}")]
    RetrievalFailure {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No usable pixels survived filtering
    #[error("Insufficient data: {reason}")]
    InsufficientData { reason: String },

    /// Requested number of colors cannot be drawn from the available samples
    #[error("Invalid cluster count: requested {requested}, but only 1..={available} is possible")]
    InvalidClusterCount { requested: usize, available: usize },

    /// Image bytes could not be decoded
    #[error("Failed to decode image: {message}")]
    ImageDecode {
        message: String,
        #[source]
        source: Option<image::ImageError>,
    },
}

impl EarthtonesError {
    pub fn invalid_parameter(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Create a retrieval failure wrapping the underlying transport error
    pub fn retrieval<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::RetrievalFailure {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a retrieval failure with no underlying error (e.g. a bad HTTP status)
    pub fn retrieval_message(message: impl Into<String>) -> Self {
        Self::RetrievalFailure {
            message: message.into(),
            source: None,
        }
    }

    pub fn image_decode(message: impl Into<String>, source: image::ImageError) -> Self {
        Self::ImageDecode {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn insufficient_data(reason: impl Into<String>) -> Self {
        Self::InsufficientData {
            reason: reason.into(),
        }
    }

    /// True when the caller can fix the request by changing its parameters
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            EarthtonesError::InvalidParameter { .. } | EarthtonesError::InvalidClusterCount { .. }
        )
    }
}
