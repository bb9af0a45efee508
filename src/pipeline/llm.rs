//! Completion endpoint access: the [`Completer`] seam and the retry policy.
//!
//! Two completers ship with the crate:
//!
//! * [`HttpCompleter`] talks to an OpenAI-compatible `/chat/completions`
//!   endpoint (DeepSeek by default) over `reqwest` and classifies failures
//!   from the HTTP status.
//! * [`ProviderCompleter`] wraps any `edgequake_llm::LLMProvider`; its errors
//!   carry no status, so they are classified from the message text.
//!
//! ## Retry Strategy
//!
//! [`complete_with_retry`] wraps every call in a per-call timeout and retries
//! with a linear back-off: a timeout waits `base × attempt`, any other
//! retryable failure waits `base × attempt × 2`. Authentication and rate-limit
//! failures are terminal and surface after the first attempt. With the 2 s
//! default and three attempts a run of timeouts waits 2 s then 4 s.

use crate::config::{ProcessingConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::error::{CompletionError, Pdf2TextError};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Speaker of a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

/// A non-streaming chat completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatTurn>,
    pub temperature: f32,
    pub max_tokens: usize,
    pub stream: bool,
}

impl CompletionRequest {
    /// A system prompt followed by one user message.
    pub fn new(
        model: impl Into<String>,
        system: impl Into<String>,
        user: impl Into<String>,
        temperature: f32,
        max_tokens: usize,
    ) -> Self {
        Self {
            model: model.into(),
            messages: vec![
                ChatTurn {
                    role: Role::System,
                    content: system.into(),
                },
                ChatTurn {
                    role: Role::User,
                    content: user.into(),
                },
            ],
            temperature,
            max_tokens,
            stream: false,
        }
    }

    /// Content of the last user turn.
    pub fn user_text(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.content.as_str())
            .unwrap_or("")
    }
}

/// Something that turns a chat request into generated text.
#[async_trait]
pub trait Completer: Send + Sync {
    /// Provider name used in error messages and logs.
    fn name(&self) -> &str;

    /// Model used when the configuration names none.
    fn default_model(&self) -> &str;

    /// One attempt, no retries.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

// ── HTTP completer ───────────────────────────────────────────────────────────

/// OpenAI-compatible `/chat/completions` client.
#[derive(Clone)]
pub struct HttpCompleter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl HttpCompleter {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, Pdf2TextError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Pdf2TextError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout: request_timeout,
        })
    }

    /// The DeepSeek endpoint with its default model.
    pub fn deepseek(api_key: impl Into<String>, request_timeout: Duration) -> Result<Self, Pdf2TextError> {
        Self::new(DEFAULT_BASE_URL, api_key, DEFAULT_MODEL, request_timeout)
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

impl std::fmt::Debug for HttpCompleter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCompleter")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl Completer for HttpCompleter {
    fn name(&self) -> &str {
        "deepseek"
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout {
                        elapsed_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    CompletionError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => CompletionError::Auth(format!("HTTP {}: {}", status.as_u16(), body)),
                429 => CompletionError::RateLimited {
                    retry_after_secs,
                    detail: body,
                },
                code => CompletionError::Http { status: code, body },
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::InvalidResponse(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CompletionError::InvalidResponse("response has no message content".into()))
    }
}

// ── edgequake-llm completer ──────────────────────────────────────────────────

/// Adapter from an `edgequake_llm::LLMProvider` to [`Completer`].
///
/// The provider is bound to its model at construction; `request.model` is
/// ignored.
pub struct ProviderCompleter {
    provider: Arc<dyn LLMProvider>,
    name: String,
    model: String,
}

impl ProviderCompleter {
    pub fn new(provider: Arc<dyn LLMProvider>, name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider,
            name: name.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl Completer for ProviderCompleter {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let messages: Vec<ChatMessage> = request
            .messages
            .iter()
            .map(|turn| match turn.role {
                Role::System => ChatMessage::system(turn.content.as_str()),
                Role::User => ChatMessage::user(turn.content.as_str()),
            })
            .collect();
        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(CompletionError::from)?;
        debug!(
            "{}: {} input tokens, {} output tokens",
            self.name, response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

// ── Retry policy ─────────────────────────────────────────────────────────────

/// Bounded retry with linear back-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first; at least 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Per-attempt timeout.
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ProcessingConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.retry_backoff_ms),
            timeout: Duration::from_secs(config.api_timeout_secs),
        }
    }

    /// Wait before the next attempt after 1-based `attempt` failed with
    /// `error`, or `None` when no further attempt should be made.
    pub fn delay_for(&self, attempt: u32, error: &CompletionError) -> Option<Duration> {
        if error.is_terminal() || attempt >= self.max_attempts {
            return None;
        }
        let linear = self.base_delay.saturating_mul(attempt);
        Some(match error {
            CompletionError::Timeout { .. } => linear,
            _ => linear.saturating_mul(2),
        })
    }
}

/// Run `request` against `completer` under `policy`.
///
/// A request whose user text is empty or whitespace-only returns that text
/// unchanged without calling the completer.
///
/// # Errors
/// * [`Pdf2TextError::AuthError`] / [`Pdf2TextError::RateLimitExceeded`]
///   after one attempt
/// * [`Pdf2TextError::RetriesExhausted`] when every attempt failed
pub async fn complete_with_retry(
    completer: &dyn Completer,
    request: &CompletionRequest,
    policy: &RetryPolicy,
) -> Result<String, Pdf2TextError> {
    let input = request.user_text();
    if input.trim().is_empty() {
        return Ok(input.to_string());
    }

    let mut attempt = 0;
    loop {
        attempt += 1;
        let started = Instant::now();
        let outcome = match timeout(policy.timeout, completer.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(CompletionError::Timeout {
                elapsed_ms: started.elapsed().as_millis() as u64,
            }),
        };

        let error = match outcome {
            Ok(text) => {
                debug!(
                    "{}: completion in {:?} (attempt {})",
                    completer.name(),
                    started.elapsed(),
                    attempt
                );
                return Ok(text);
            }
            Err(e) => e,
        };

        if error.is_terminal() {
            warn!("{}: terminal error, not retrying: {}", completer.name(), error);
            return Err(error.into_fatal(completer.name()));
        }

        match policy.delay_for(attempt, &error) {
            Some(delay) => {
                warn!(
                    "{}: attempt {}/{} failed ({}), retrying in {:?}",
                    completer.name(),
                    attempt,
                    policy.max_attempts,
                    error,
                    delay
                );
                sleep(delay).await;
            }
            None => {
                return Err(Pdf2TextError::RetriesExhausted {
                    attempts: attempt,
                    last_error: error.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Scripted {
        calls: AtomicU32,
        script: Mutex<VecDeque<Result<String, CompletionError>>>,
    }

    impl Scripted {
        fn new(script: Vec<Result<String, CompletionError>>) -> Self {
            Self {
                calls: AtomicU32::new(0),
                script: Mutex::new(script.into()),
            }
        }
    }

    #[async_trait]
    impl Completer for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }
        fn default_model(&self) -> &str {
            "test-model"
        }
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, CompletionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(CompletionError::Transport("script exhausted".into())))
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
        }
    }

    fn request(text: &str) -> CompletionRequest {
        CompletionRequest::new("m", "system", text, 0.3, 100)
    }

    #[test]
    fn delays_are_linear_and_doubled_for_unclassified_errors() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_secs(2),
            timeout: Duration::from_secs(30),
        };
        let timeout = CompletionError::Timeout { elapsed_ms: 0 };
        let other = CompletionError::Http {
            status: 502,
            body: String::new(),
        };
        assert_eq!(policy.delay_for(1, &timeout), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_for(2, &timeout), Some(Duration::from_secs(4)));
        assert_eq!(policy.delay_for(1, &other), Some(Duration::from_secs(4)));
        assert_eq!(policy.delay_for(3, &other), Some(Duration::from_secs(12)));
        assert_eq!(policy.delay_for(4, &timeout), None);
        assert_eq!(policy.delay_for(1, &CompletionError::Auth("x".into())), None);
    }

    #[test]
    fn huge_backoff_saturates_instead_of_overflowing() {
        let policy = RetryPolicy {
            max_attempts: u32::MAX,
            base_delay: Duration::from_secs(u64::MAX / 2),
            timeout: Duration::from_secs(30),
        };
        let other = CompletionError::Transport("reset".into());
        assert_eq!(policy.delay_for(7, &other), Some(Duration::MAX));
        assert_eq!(
            policy.delay_for(3, &CompletionError::Timeout { elapsed_ms: 0 }),
            Some(Duration::MAX)
        );
    }

    #[test]
    fn delays_never_decrease() {
        let policy = fast_policy(10);
        let timeout = CompletionError::Timeout { elapsed_ms: 0 };
        let delays: Vec<Duration> = (1..10).filter_map(|a| policy.delay_for(a, &timeout)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn auth_error_makes_exactly_one_attempt() {
        let completer = Scripted::new(vec![Err(CompletionError::Auth("bad key".into()))]);
        let err = complete_with_retry(&completer, &request("hello"), &fast_policy(3))
            .await
            .unwrap_err();
        assert!(matches!(err, Pdf2TextError::AuthError { .. }));
        assert_eq!(completer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rate_limit_makes_exactly_one_attempt() {
        let completer = Scripted::new(vec![Err(CompletionError::RateLimited {
            retry_after_secs: Some(30),
            detail: "slow down".into(),
        })]);
        let err = complete_with_retry(&completer, &request("hello"), &fast_policy(3))
            .await
            .unwrap_err();
        match err {
            Pdf2TextError::RateLimitExceeded { retry_after_secs, .. } => {
                assert_eq!(retry_after_secs, Some(30))
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(completer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timeouts_use_every_attempt() {
        let completer = Scripted::new(vec![
            Err(CompletionError::Timeout { elapsed_ms: 1 }),
            Err(CompletionError::Timeout { elapsed_ms: 1 }),
            Err(CompletionError::Timeout { elapsed_ms: 1 }),
        ]);
        let err = complete_with_retry(&completer, &request("hello"), &fast_policy(3))
            .await
            .unwrap_err();
        match err {
            Pdf2TextError::RetriesExhausted { attempts, last_error } => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("timed out"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(completer.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn transient_failure_then_success() {
        let completer = Scripted::new(vec![
            Err(CompletionError::Transport("reset".into())),
            Ok("summary".into()),
        ]);
        let text = complete_with_retry(&completer, &request("hello"), &fast_policy(3))
            .await
            .unwrap();
        assert_eq!(text, "summary");
        assert_eq!(completer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn blank_input_short_circuits() {
        let completer = Scripted::new(vec![]);
        let text = complete_with_retry(&completer, &request("  \n "), &fast_policy(3))
            .await
            .unwrap();
        assert_eq!(text, "  \n ");
        assert_eq!(completer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn slow_call_is_cut_off_by_the_policy_timeout() {
        struct Slow;
        #[async_trait]
        impl Completer for Slow {
            fn name(&self) -> &str {
                "slow"
            }
            fn default_model(&self) -> &str {
                "m"
            }
            async fn complete(&self, _r: &CompletionRequest) -> Result<String, CompletionError> {
                sleep(Duration::from_secs(10)).await;
                Ok("late".into())
            }
        }
        let policy = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            timeout: Duration::from_millis(20),
        };
        let err = complete_with_retry(&Slow, &request("hello"), &policy).await.unwrap_err();
        assert!(matches!(err, Pdf2TextError::RetriesExhausted { attempts: 2, .. }));
    }

    fn http(server: &MockServer) -> HttpCompleter {
        HttpCompleter::new(server.uri(), "sk-test", "deepseek-chat", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn http_completer_sends_openai_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "deepseek-chat",
                "stream": false,
                "max_tokens": 100,
                "messages": [
                    {"role": "system", "content": "system"},
                    {"role": "user", "content": "hello"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "hi there"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = http(&server)
            .complete(&CompletionRequest::new("deepseek-chat", "system", "hello", 0.3, 100))
            .await
            .unwrap();
        assert_eq!(text, "hi there");
    }

    #[tokio::test]
    async fn http_statuses_are_classified() {
        let server = MockServer::start().await;
        let completer = http(&server);

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        let err = completer.complete(&request("x")).await.unwrap_err();
        assert!(matches!(err, CompletionError::Auth(_)));

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        let err = completer.complete(&request("x")).await.unwrap_err();
        assert_eq!(
            err,
            CompletionError::RateLimited {
                retry_after_secs: Some(7),
                detail: String::new()
            }
        );

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        let err = completer.complete(&request("x")).await.unwrap_err();
        assert_eq!(
            err,
            CompletionError::Http {
                status: 503,
                body: "overloaded".into()
            }
        );
    }

    #[tokio::test]
    async fn http_client_timeout_is_a_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(500))
                    .set_body_json(json!({"choices": []})),
            )
            .mount(&server)
            .await;
        let completer =
            HttpCompleter::new(server.uri(), "k", "m", Duration::from_millis(50)).unwrap();
        let err = completer.complete(&request("x")).await.unwrap_err();
        assert!(matches!(err, CompletionError::Timeout { .. }));
    }

    #[tokio::test]
    async fn empty_choices_are_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;
        let err = http(&server).complete(&request("x")).await.unwrap_err();
        assert!(matches!(err, CompletionError::InvalidResponse(_)));
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let c = HttpCompleter::new("https://api.example.com/v1/", "k", "m", Duration::from_secs(1)).unwrap();
        assert_eq!(c.endpoint(), "https://api.example.com/v1/chat/completions");
    }
}
