//! Mock completion backend for testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::domain::errors::BackendError;
use crate::domain::models::TokenUsage;
use crate::domain::ports::{Completion, CompletionBackend, CompletionRequest};

/// Mock response configuration.
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// Completion returned on success
    pub completion: Completion,
    /// Error returned instead of the completion
    pub error: Option<BackendError>,
    /// Simulated latency
    pub delay: Option<Duration>,
}

impl Default for MockResponse {
    fn default() -> Self {
        Self {
            completion: Completion::text("Mock completion.").with_usage(TokenUsage::new(100, 50)),
            error: None,
            delay: None,
        }
    }
}

impl MockResponse {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            completion: Completion::text(output).with_usage(TokenUsage::new(100, 50)),
            ..Default::default()
        }
    }

    pub fn failure(error: BackendError) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }

    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Scripted backend keyed by agent name.
///
/// Queued responses are consumed first, then the agent's standing response,
/// then the default. Every request is recorded so tests can count calls.
pub struct MockBackend {
    default_response: MockResponse,
    standing: HashMap<String, MockResponse>,
    queued: RwLock<HashMap<String, VecDeque<MockResponse>>>,
    requests: RwLock<Vec<CompletionRequest>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::with_default_response(MockResponse::default())
    }

    pub fn with_default_response(response: MockResponse) -> Self {
        Self {
            default_response: response,
            standing: HashMap::new(),
            queued: RwLock::new(HashMap::new()),
            requests: RwLock::new(Vec::new()),
        }
    }

    /// Answer every call from `agent` with `response`.
    #[must_use]
    pub fn with_agent_response(mut self, agent: impl Into<String>, response: MockResponse) -> Self {
        self.standing.insert(agent.into(), response);
        self
    }

    /// Answer the next call from `agent` with `response`, once.
    #[must_use]
    pub fn with_queued_response(mut self, agent: impl Into<String>, response: MockResponse) -> Self {
        self.queued
            .get_mut()
            .entry(agent.into())
            .or_default()
            .push_back(response);
        self
    }

    /// All requests received so far, in order.
    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.read().await.clone()
    }

    /// Number of calls issued on behalf of `agent`.
    pub async fn invocations(&self, agent: &str) -> usize {
        let requests = self.requests.read().await;
        requests.iter().filter(|r| r.agent_name == agent).count()
    }

    pub async fn total_invocations(&self) -> usize {
        self.requests.read().await.len()
    }

    async fn next_response(&self, agent: &str) -> MockResponse {
        let mut queued = self.queued.write().await;
        if let Some(response) = queued.get_mut(agent).and_then(VecDeque::pop_front) {
            return response;
        }
        drop(queued);
        self.standing
            .get(agent)
            .cloned()
            .unwrap_or_else(|| self.default_response.clone())
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, BackendError> {
        let response = self.next_response(&request.agent_name).await;
        self.requests.write().await.push(request);

        if let Some(delay) = response.delay {
            tokio::time::sleep(delay).await;
        }

        match response.error {
            Some(error) => Err(error),
            None => Ok(response.completion),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ModelParams;
    use crate::domain::ports::RawCompletion;

    fn request(agent: &str) -> CompletionRequest {
        CompletionRequest::new(agent, "System prompt", "User prompt", "", ModelParams::default())
    }

    #[tokio::test]
    async fn test_mock_complete_success() {
        let backend = MockBackend::new();
        let completion = backend.complete(request("categorizer")).await.unwrap();

        assert_eq!(completion.raw, RawCompletion::Text("Mock completion.".to_string()));
        assert_eq!(completion.usage.map(|u| u.total_tokens()), Some(150));
    }

    #[tokio::test]
    async fn test_mock_complete_failure() {
        let backend = MockBackend::with_default_response(MockResponse::failure(BackendError::RateLimited));
        let result = backend.complete(request("categorizer")).await;

        assert_eq!(result, Err(BackendError::RateLimited));
        assert_eq!(backend.total_invocations().await, 1);
    }

    #[tokio::test]
    async fn test_queued_response_is_consumed_before_standing() {
        let backend = MockBackend::new()
            .with_agent_response("writer", MockResponse::success("standing"))
            .with_queued_response("writer", MockResponse::failure(BackendError::EmptyResponse));

        assert!(backend.complete(request("writer")).await.is_err());
        let completion = backend.complete(request("writer")).await.unwrap();
        assert_eq!(completion.raw, RawCompletion::Text("standing".to_string()));
    }

    #[tokio::test]
    async fn test_invocations_counted_per_agent() {
        let backend = MockBackend::new();
        backend.complete(request("a")).await.unwrap();
        backend.complete(request("b")).await.unwrap();
        backend.complete(request("a")).await.unwrap();

        assert_eq!(backend.invocations("a").await, 2);
        assert_eq!(backend.invocations("b").await, 1);
        assert_eq!(backend.invocations("c").await, 0);
    }
}
