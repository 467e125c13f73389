/*!
 * Provider implementations for the transcription and generation service.
 *
 * - Gemini: Google Generative Language REST API
 * - Mock: scripted replies for tests and offline runs
 */

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt::Debug;

use crate::errors::ProviderError;

/// One part of a request, text or binary media
#[derive(Debug, Clone, PartialEq)]
pub enum RequestPart {
    Text(String),
    Media { mime_type: String, data: Bytes },
}

/// Provider-neutral generation request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Model to use
    pub model: String,
    /// Ordered parts of the single user turn
    pub parts: Vec<RequestPart>,
    /// Sampling temperature
    pub temperature: Option<f32>,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            parts: Vec::new(),
            temperature: None,
        }
    }

    /// Append a text part
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.parts.push(RequestPart::Text(text.into()));
        self
    }

    /// Append a media part
    pub fn media(mut self, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.parts.push(RequestPart::Media {
            mime_type: mime_type.into(),
            data: data.into(),
        });
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Concatenated text parts, used by logging and the mock
    pub fn prompt_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                RequestPart::Text(text) => Some(text.as_str()),
                RequestPart::Media { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn has_media(&self) -> bool {
        self.parts.iter().any(|part| matches!(part, RequestPart::Media { .. }))
    }
}

/// Text returned by the service
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResponse {
    pub text: String,
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
}

impl GenerationResponse {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            prompt_tokens: None,
            completion_tokens: None,
        }
    }
}

/// Common trait for all generation providers
///
/// Object safe so the pipeline can hold an `Arc<dyn Provider>` and tests can
/// swap in the mock.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Complete a request using this provider
    async fn complete(&self, request: GenerationRequest) -> Result<GenerationResponse, ProviderError>;

    /// Test the connection to the provider
    async fn test_connection(&self) -> Result<(), ProviderError>;

    /// Short name used in logs
    fn name(&self) -> &str;
}

pub mod gemini;
pub mod mock;

pub use gemini::Gemini;
pub use mock::MockProvider;
