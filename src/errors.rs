/*!
 * Error types for the mathcast application.
 *
 * This module contains custom error types for the different parts of the
 * pipeline, using the thiserror crate for ergonomic error definitions.
 */

use thiserror::Error;

/// Errors that can occur when talking to the generation service
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// An uploaded media file never became usable on the service side
    #[error("Media file {name} ended in state {state}")]
    FileNotReady {
        /// Service-side file name
        name: String,
        /// Last observed processing state
        state: String,
    },

    /// The service answered without any text
    #[error("Empty response from the generation service")]
    EmptyResponse,
}

/// Errors raised while turning a model response into a scene record
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RepairError {
    /// The text could not be parsed even after the tolerant pre-pass
    #[error("Malformed scene data: {message}\nRepaired text: {repaired}")]
    Format {
        /// Parser error message
        message: String,
        /// The repaired-but-still-invalid text
        repaired: String,
    },

    /// The text parsed but does not have the expected shape
    #[error("Scene data is missing or has an invalid `{field}` field")]
    Schema {
        /// Path of the offending field, e.g. `elements[1].content`
        field: String,
    },
}

impl RepairError {
    pub(crate) fn schema(field: impl Into<String>) -> Self {
        Self::Schema { field: field.into() }
    }
}

/// Errors that terminate a single pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The upload was refused (bad extension, empty file name, ...)
    #[error("Upload rejected: {0}")]
    UploadRejected(String),

    /// The transcript contained no tagged slides
    #[error("No slides found in the transcript")]
    ExtractionEmpty,

    /// The scene data returned by the service could not be repaired
    #[error("Scene data error: {0}")]
    Repair(#[from] RepairError),

    /// The renderer exited with an error or produced no artifact
    #[error("Render failed: {0}")]
    RenderFailure(String),

    /// The renderer exceeded its wall-clock budget
    #[error("Render timed out after {0} seconds")]
    RenderTimeout(u64),

    /// The generated script still had syntax errors after every attempt
    #[error("Generated script is still invalid after {attempts} attempts")]
    SyntaxRepairExhausted {
        /// Number of attempts made
        attempts: u32,
    },

    /// Error from the generation service
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from a file operation
    #[error("File error: {0}")]
    Io(String),
}

impl From<std::io::Error> for PipelineError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from a pipeline run
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Scene data that could not be repaired
    #[error("Scene data error: {0}")]
    Repair(#[from] RepairError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
