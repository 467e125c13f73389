use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::{debug, error, info, warn};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use url::Url;

use crate::app_config::ProviderConfig;
use crate::errors::ProviderError;
use crate::providers::{GenerationRequest, GenerationResponse, Provider, RequestPart};

const API_VERSION: &str = "v1beta";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini client for the Generative Language REST API
#[derive(Debug, Clone)]
pub struct Gemini {
    /// HTTP client for API requests
    client: Client,
    /// API key, sent in the `x-goog-api-key` header
    api_key: String,
    /// Base URL, e.g. `https://generativelanguage.googleapis.com`
    endpoint: String,
    /// Maximum number of retry attempts
    max_retries: u32,
    /// Base backoff time in milliseconds for exponential backoff
    backoff_base_ms: u64,
    /// Media larger than this goes through the File API
    inline_media_limit: usize,
    file_poll_interval: Duration,
    file_poll_max_wait: Duration,
}

/// generateContent request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

/// A content part; exactly one field is set
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_data: Option<FileData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Serialize)]
pub struct GenerationConfig {
    temperature: f32,
}

/// generateContent response body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: Option<u64>,
    #[serde(default)]
    candidates_token_count: Option<u64>,
}

/// File resource returned by the File API
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    pub name: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Deserialize)]
struct UploadedFile {
    file: RemoteFile,
}

impl Gemini {
    /// Create a new Gemini client with default transport settings
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self::from_config(&ProviderConfig {
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            ..ProviderConfig::default()
        })
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_default(),
            api_key: config.resolve_api_key(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            max_retries: config.retry_count,
            backoff_base_ms: config.retry_backoff_ms,
            inline_media_limit: config.inline_media_limit_bytes,
            file_poll_interval: Duration::from_secs(config.file_poll_interval_secs.max(1)),
            file_poll_max_wait: Duration::from_secs(config.file_poll_max_wait_secs),
        }
    }

    fn api_url(&self, path: &str) -> Result<Url, ProviderError> {
        Url::parse(&format!("{}/{}", self.endpoint, path))
            .map_err(|e| ProviderError::RequestFailed(format!("Invalid Gemini endpoint: {}", e)))
    }

    /// Delay before retry number `attempt` (1-based), doubling from the base
    pub(crate) fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }

    /// Send a request, retrying rate limits, server errors and network failures
    async fn send_with_retry<F>(&self, what: &str, build: F) -> Result<Response, ProviderError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;
        let mut last_error = None;

        while attempt <= self.max_retries {
            match build().header(API_KEY_HEADER, &self.api_key).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    let error_text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Failed to get error response text".to_string());

                    match status {
                        StatusCode::TOO_MANY_REQUESTS => {
                            warn!("Gemini {} rate limited - attempt {}/{}", what, attempt + 1, self.max_retries + 1);
                            last_error = Some(ProviderError::RateLimitExceeded(error_text));
                        }
                        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                            error!("Gemini {} rejected credentials ({})", what, status);
                            return Err(ProviderError::AuthenticationError(error_text));
                        }
                        s if s.is_server_error() => {
                            error!(
                                "Gemini {} error ({}): {} - attempt {}/{}",
                                what,
                                s,
                                error_text,
                                attempt + 1,
                                self.max_retries + 1
                            );
                            last_error = Some(ProviderError::ApiError {
                                status_code: s.as_u16(),
                                message: error_text,
                            });
                        }
                        s => {
                            error!("Gemini {} error ({}): {}", what, s, error_text);
                            return Err(ProviderError::ApiError {
                                status_code: s.as_u16(),
                                message: error_text,
                            });
                        }
                    }
                }
                Err(e) => {
                    // Request URLs stay out of error messages
                    let e = e.without_url();
                    error!("Gemini {} network error: {} - attempt {}/{}", what, e, attempt + 1, self.max_retries + 1);
                    last_error = Some(ProviderError::ConnectionError(e.to_string()));
                }
            }

            attempt += 1;

            if attempt <= self.max_retries {
                tokio::time::sleep(self.backoff_delay(attempt)).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ProviderError::RequestFailed(format!("Gemini {} failed after {} attempts", what, self.max_retries + 1))
        }))
    }

    /// Upload media through the resumable File API
    pub async fn upload_file(&self, mime_type: &str, data: &[u8]) -> Result<RemoteFile, ProviderError> {
        let start_url = self.api_url(&format!("upload/{}/files", API_VERSION))?;
        let metadata = serde_json::json!({ "file": { "display_name": format!("mathcast-{}", uuid::Uuid::new_v4()) } });

        let start = self
            .send_with_retry("upload start", || {
                self.client
                    .post(start_url.clone())
                    .header("X-Goog-Upload-Protocol", "resumable")
                    .header("X-Goog-Upload-Command", "start")
                    .header("X-Goog-Upload-Header-Content-Length", data.len().to_string())
                    .header("X-Goog-Upload-Header-Content-Type", mime_type)
                    .json(&metadata)
            })
            .await?;

        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ProviderError::ParseError("Upload session has no x-goog-upload-url header".to_string()))?;

        let body = bytes::Bytes::copy_from_slice(data);
        let finished = self
            .send_with_retry("upload", || {
                self.client
                    .post(&upload_url)
                    .header("X-Goog-Upload-Offset", "0")
                    .header("X-Goog-Upload-Command", "upload, finalize")
                    .body(body.clone())
            })
            .await?;

        let uploaded = finished
            .json::<UploadedFile>()
            .await
            .map_err(|e| ProviderError::ParseError(format!("Failed to parse upload response: {}", e)))?;

        info!("Uploaded {} bytes as {}", data.len(), uploaded.file.name);
        Ok(uploaded.file)
    }

    /// Poll a file until processing finishes; only `ACTIVE` files are usable
    pub async fn wait_until_active(&self, mut file: RemoteFile) -> Result<RemoteFile, ProviderError> {
        let started = Instant::now();

        loop {
            match file.state.as_str() {
                "ACTIVE" => return Ok(file),
                "PROCESSING" | "STATE_UNSPECIFIED" | "" => {}
                other => {
                    return Err(ProviderError::FileNotReady {
                        name: file.name,
                        state: other.to_string(),
                    });
                }
            }

            if started.elapsed() >= self.file_poll_max_wait {
                return Err(ProviderError::FileNotReady {
                    name: file.name,
                    state: format!("{} after {}s", file.state, self.file_poll_max_wait.as_secs()),
                });
            }

            debug!("Waiting for {} to finish processing ({})", file.name, file.state);
            tokio::time::sleep(self.file_poll_interval).await;

            let url = self.api_url(&format!("{}/{}", API_VERSION, file.name))?;
            let response = self.send_with_retry("file status", || self.client.get(url.clone())).await?;
            file = response
                .json::<RemoteFile>()
                .await
                .map_err(|e| ProviderError::ParseError(format!("Failed to parse file status: {}", e)))?;
        }
    }

    async fn build_part(&self, part: &RequestPart) -> Result<GeminiPart, ProviderError> {
        match part {
            RequestPart::Text(text) => Ok(GeminiPart {
                text: Some(text.clone()),
                ..GeminiPart::default()
            }),
            RequestPart::Media { mime_type, data } if data.len() <= self.inline_media_limit => Ok(GeminiPart {
                inline_data: Some(InlineData {
                    mime_type: mime_type.clone(),
                    data: BASE64.encode(data),
                }),
                ..GeminiPart::default()
            }),
            RequestPart::Media { mime_type, data } => {
                let uploaded = self.upload_file(mime_type, data).await?;
                let active = self.wait_until_active(uploaded).await?;
                Ok(GeminiPart {
                    file_data: Some(FileData {
                        mime_type: mime_type.clone(),
                        file_uri: active.uri,
                    }),
                    ..GeminiPart::default()
                })
            }
        }
    }

    /// Map a provider-neutral request onto a generateContent body
    pub async fn build_request(&self, request: &GenerationRequest) -> Result<GeminiRequest, ProviderError> {
        let mut parts = Vec::with_capacity(request.parts.len());
        for part in &request.parts {
            parts.push(self.build_part(part).await?);
        }

        Ok(GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: request.temperature.map(|temperature| GenerationConfig { temperature }),
        })
    }

    /// Concatenate the text parts of the first candidate
    pub fn extract_text_from_response(response: &GeminiResponse) -> Result<String, ProviderError> {
        let candidate = response.candidates.first().ok_or(ProviderError::EmptyResponse)?;

        let text: String = candidate
            .content
            .as_ref()
            .map(|content| content.parts.iter().filter_map(|p| p.text.as_deref()).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            if let Some(reason) = &candidate.finish_reason {
                warn!("Gemini returned no text (finish reason {})", reason);
            }
            return Err(ProviderError::EmptyResponse);
        }

        Ok(text)
    }
}

#[async_trait]
impl Provider for Gemini {
    async fn complete(&self, request: GenerationRequest) -> Result<GenerationResponse, ProviderError> {
        let body = self.build_request(&request).await?;
        let url = self.api_url(&format!("{}/models/{}:generateContent", API_VERSION, request.model))?;

        debug!("Gemini generateContent with model {} ({} part(s))", request.model, request.parts.len());

        let response = self
            .send_with_retry("generateContent", || self.client.post(url.clone()).json(&body))
            .await?;

        let parsed = response
            .json::<GeminiResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(format!("Failed to parse Gemini response: {}", e)))?;

        let text = Self::extract_text_from_response(&parsed)?;
        let usage = parsed.usage_metadata.as_ref();

        Ok(GenerationResponse {
            text,
            prompt_tokens: usage.and_then(|u| u.prompt_token_count),
            completion_tokens: usage.and_then(|u| u.candidates_token_count),
        })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let url = self.api_url(&format!("{}/models", API_VERSION))?;
        self.send_with_retry("list models", || self.client.get(url.clone())).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
