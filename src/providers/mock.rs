/*!
 * Mock provider for tests and offline runs.
 *
 * - `MockProvider::scripted(..)` - replies with queued texts in order
 * - `MockProvider::echo()` - replies with the request's prompt text
 * - `MockProvider::failing()` - always fails with an error
 * - `MockProvider::empty()` - always replies with an empty text
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::errors::ProviderError;
use crate::providers::{GenerationRequest, GenerationResponse, Provider};

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Pops replies from the script; falls back to the last reply once empty
    Scripted,
    /// Returns the prompt text
    Echo,
    /// Always fails with an error
    Failing,
    /// Returns empty response
    Empty,
    /// Simulates slow response before replying like `Scripted`
    Slow { delay_ms: u64 },
}

/// Mock provider with shared call bookkeeping
#[derive(Debug, Clone)]
pub struct MockProvider {
    behavior: MockBehavior,
    replies: Arc<Mutex<VecDeque<String>>>,
    last_reply: Arc<Mutex<Option<String>>>,
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
    request_count: Arc<AtomicUsize>,
}

impl MockProvider {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            replies: Arc::new(Mutex::new(VecDeque::new())),
            last_reply: Arc::new(Mutex::new(None)),
            requests: Arc::new(Mutex::new(Vec::new())),
            request_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Reply with the given texts in order
    pub fn scripted<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let provider = Self::new(MockBehavior::Scripted);
        provider.push_replies(replies);
        provider
    }

    pub fn echo() -> Self {
        Self::new(MockBehavior::Echo)
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Queue more replies; clones share the queue
    pub fn push_replies<I, S>(&self, replies: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replies.lock().extend(replies.into_iter().map(Into::into));
    }

    /// Number of `complete` calls so far
    pub fn call_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Every request received, in order
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }

    fn next_scripted(&self) -> Result<String, ProviderError> {
        let next = self.replies.lock().pop_front();
        match next {
            Some(reply) => {
                *self.last_reply.lock() = Some(reply.clone());
                Ok(reply)
            }
            None => self.last_reply.lock().clone().ok_or(ProviderError::EmptyResponse),
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(&self, request: GenerationRequest) -> Result<GenerationResponse, ProviderError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        match self.behavior {
            MockBehavior::Scripted => self.next_scripted().map(GenerationResponse::from_text),

            MockBehavior::Echo => Ok(GenerationResponse::from_text(request.prompt_text())),

            MockBehavior::Failing => Err(ProviderError::ApiError {
                message: "Simulated provider failure".to_string(),
                status_code: 500,
            }),

            MockBehavior::Empty => Ok(GenerationResponse::from_text(String::new())),

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                self.next_scripted().map(GenerationResponse::from_text)
            }
        }
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Failing => Err(ProviderError::ConnectionError(
                "Simulated connection failure".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
