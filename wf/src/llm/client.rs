//! LlmClient trait definition

use async_trait::async_trait;

use super::{CompletionRequest, CompletionResponse, LlmError};

/// Stateless LLM client - each call is independent.
///
/// The coach never sends the full transcript; every call carries its own
/// bounded context window, so no conversation state lives in the client.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a single completion request (blocking until complete).
    ///
    /// Free-text calls pass no tools; structured calls pass exactly one tool
    /// whose input schema constrains the reply.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

#[cfg(test)]
pub mod mock {
    use std::sync::Mutex;

    use super::*;
    use crate::llm::{StopReason, TokenUsage, ToolCall};

    /// One scripted reply for the mock client
    pub enum MockReply {
        Text(String),
        Structured(serde_json::Value),
        Failure(LlmError),
    }

    /// Mock LLM client replaying scripted replies in order.
    ///
    /// The final Text/Structured entry replays indefinitely; a Failure is
    /// consumed once so tests can script a timeout followed by recovery.
    pub struct MockLlmClient {
        replies: Mutex<Vec<MockReply>>,
        calls: Mutex<Vec<CompletionRequest>>,
    }

    impl MockLlmClient {
        pub fn new(replies: Vec<MockReply>) -> Self {
            Self {
                replies: Mutex::new(replies),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// A client that answers every call with the same text
        pub fn always_text(text: impl Into<String>) -> Self {
            Self::new(vec![MockReply::Text(text.into())])
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        /// Requests seen so far (for asserting on prompts and tools)
        pub fn requests(&self) -> Vec<CompletionRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmClient for MockLlmClient {
        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            self.calls.lock().unwrap().push(request);

            let reply = {
                let mut replies = self.replies.lock().unwrap();
                if replies.is_empty() {
                    return Err(LlmError::InvalidResponse("No more mock replies".to_string()));
                }
                let consume = replies.len() > 1 || matches!(replies[0], MockReply::Failure(_));
                if consume {
                    replies.remove(0)
                } else {
                    match &replies[0] {
                        MockReply::Text(t) => MockReply::Text(t.clone()),
                        MockReply::Structured(v) => MockReply::Structured(v.clone()),
                        MockReply::Failure(_) => unreachable!("failures are always consumed"),
                    }
                }
            };

            match reply {
                MockReply::Text(text) => Ok(CompletionResponse {
                    content: Some(text),
                    tool_calls: vec![],
                    stop_reason: StopReason::EndTurn,
                    usage: TokenUsage::default(),
                }),
                MockReply::Structured(input) => Ok(CompletionResponse {
                    content: None,
                    tool_calls: vec![ToolCall {
                        id: "tool-1".to_string(),
                        name: "record_phase_output".to_string(),
                        input,
                    }],
                    stop_reason: StopReason::ToolUse,
                    usage: TokenUsage::default(),
                }),
                MockReply::Failure(err) => Err(err),
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn request() -> CompletionRequest {
            CompletionRequest {
                system_prompt: "Test".to_string(),
                messages: vec![],
                tools: vec![],
                max_tokens: 100,
            }
        }

        #[tokio::test]
        async fn test_mock_replays_in_order_then_repeats_last() {
            let client = MockLlmClient::new(vec![
                MockReply::Text("first".to_string()),
                MockReply::Text("second".to_string()),
            ]);

            let a = client.complete(request()).await.unwrap();
            assert_eq!(a.content.as_deref(), Some("first"));

            let b = client.complete(request()).await.unwrap();
            assert_eq!(b.content.as_deref(), Some("second"));

            let c = client.complete(request()).await.unwrap();
            assert_eq!(c.content.as_deref(), Some("second"));

            assert_eq!(client.call_count(), 3);
        }

        #[tokio::test]
        async fn test_mock_errors_when_empty() {
            let client = MockLlmClient::new(vec![]);
            assert!(client.complete(request()).await.is_err());
        }

        #[tokio::test]
        async fn test_mock_failure_is_consumed() {
            let client = MockLlmClient::new(vec![
                MockReply::Failure(LlmError::Timeout(std::time::Duration::from_secs(1))),
                MockReply::Text("recovered".to_string()),
            ]);

            assert!(client.complete(request()).await.is_err());
            let next = client.complete(request()).await.unwrap();
            assert_eq!(next.content.as_deref(), Some("recovered"));
        }
    }
}
