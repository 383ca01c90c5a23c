//! Core `ReasoningService` trait and the `ApiAgent` implementation.
//!
//! `ApiAgent` calls any OpenAI-compatible `/v1/chat/completions` endpoint
//! (Ollama, OpenAI, Groq, LM Studio, vLLM, ...).  `dispatch` never fails:
//! errors come back as a [`DispatchResult`] with `succeeded == false`.
//!
//! On success the registered [`ResponseHook`] receives a speakable summary of
//! the reply on its own task, so `dispatch` returns without waiting for
//! speech to finish.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::config::AgentConfig;
use crate::llm::prompt::{system_prompt, APOLOGY_PREFIX};
use crate::llm::summary::{estimate_cost_usd, estimated_tokens, speakable_summary, truncate_chars};

/// Tool inputs are cut to this many characters in a [`ToolInvocation`].
const TOOL_INPUT_CHARS: usize = 100;

/// Smallest prompt that proves the endpoint, key and model all work.
const PING_PROMPT: &str = "Olá, responda apenas: OK";

// ---------------------------------------------------------------------------
// LlmError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("LLM request timed out")]
    Timeout,

    #[error("LLM service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to parse LLM response: {0}")]
    Parse(String),

    #[error("LLM returned an empty response")]
    EmptyResponse,
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub name: String,
    /// Tool input, cut to 100 characters.
    pub input: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResult {
    pub succeeded: bool,
    pub tool_invocations: Vec<ToolInvocation>,
    pub response_text: String,
    pub estimated_cost_usd: f64,
    /// Why the dispatch failed, when `succeeded` is false.
    pub failure: Option<String>,
}

impl DispatchResult {
    pub fn failed(response_text: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            tool_invocations: Vec::new(),
            response_text: response_text.into(),
            estimated_cost_usd: 0.0,
            failure: Some(reason.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Side effect run after a successful dispatch.
#[async_trait]
pub trait ResponseHook: Send + Sync {
    async fn on_response(&self, summary: String);
}

#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Register the completion hook; replaces any previous one.
    fn set_response_hook(&self, hook: Arc<dyn ResponseHook>);

    async fn dispatch(&self, text: &str) -> DispatchResult;

    /// One tiny round trip to check the service is reachable.  Never
    /// fires the response hook.
    async fn ping(&self) -> Result<(), LlmError>;
}

/// Holds the registered hook and fires it on a separate task.
#[derive(Default)]
pub struct HookSlot {
    hook: RwLock<Option<Arc<dyn ResponseHook>>>,
}

impl HookSlot {
    pub fn set(&self, hook: Arc<dyn ResponseHook>) {
        match self.hook.write() {
            Ok(mut slot) => *slot = Some(hook),
            Err(poisoned) => *poisoned.into_inner() = Some(hook),
        }
    }

    /// Spawn the hook with `summary`.  Returns `false` when no hook is set
    /// or the summary is empty.
    pub fn fire(&self, summary: String) -> bool {
        if summary.is_empty() {
            return false;
        }
        let hook = match self.hook.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        let Some(hook) = hook else {
            log::warn!("agent: no response hook registered");
            return false;
        };
        tokio::spawn(async move { hook.on_response(summary).await });
        true
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ChatToolCall>,
}

#[derive(Debug, Deserialize)]
struct ChatToolCall {
    function: ChatFunction,
}

#[derive(Debug, Deserialize)]
struct ChatFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, PartialEq)]
struct AgentReply {
    text: String,
    tools: Vec<ToolInvocation>,
    tokens: Option<(u64, u64)>,
}

fn parse_reply(body: &str) -> Result<AgentReply, LlmError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| LlmError::Parse(e.to_string()))?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or(LlmError::EmptyResponse)?;

    let tools = choice
        .message
        .tool_calls
        .into_iter()
        .map(|call| ToolInvocation {
            name: call.function.name,
            input: truncate_chars(&call.function.arguments, TOOL_INPUT_CHARS),
        })
        .collect();

    Ok(AgentReply {
        text: choice.message.content.unwrap_or_default().trim().to_string(),
        tools,
        tokens: parsed.usage.map(|u| (u.prompt_tokens, u.completion_tokens)),
    })
}

// ---------------------------------------------------------------------------
// ApiAgent
// ---------------------------------------------------------------------------

/// Calls an OpenAI-compatible `/v1/chat/completions` endpoint.
///
/// All connection details (`base_url`, `api_key`, `model`) come from the
/// [`AgentConfig`] passed to [`ApiAgent::from_config`].
pub struct ApiAgent {
    client: reqwest::Client,
    config: AgentConfig,
    summary_max_chars: usize,
    hook: HookSlot,
}

impl ApiAgent {
    pub fn from_config(config: &AgentConfig, summary_max_chars: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
            summary_max_chars,
            hook: HookSlot::default(),
        }
    }

    async fn complete(&self, prompt: &str) -> Result<AgentReply, LlmError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let body = serde_json::json!({
            "model":       self.config.model,
            "messages": [
                { "role": "system", "content": system_prompt(self.config.system_prompt.as_deref()) },
                { "role": "user",   "content": prompt }
            ],
            "stream":      false,
            "temperature": self.config.temperature,
            "max_tokens":  self.config.max_tokens
        });

        let mut req = self.client.post(&url).json(&body);

        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: truncate_chars(&text, 300),
            });
        }
        parse_reply(&text)
    }
}

#[async_trait]
impl ReasoningService for ApiAgent {
    fn set_response_hook(&self, hook: Arc<dyn ResponseHook>) {
        self.hook.set(hook);
    }

    async fn dispatch(&self, text: &str) -> DispatchResult {
        let prompt = text.trim();
        if prompt.is_empty() {
            log::warn!("agent: empty prompt, nothing to dispatch");
            return DispatchResult::failed("", "empty prompt");
        }

        log::info!("agent: processing '{}'", truncate_chars(prompt, 100));

        let reply = match self.complete(prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                log::error!("agent: request failed: {e}");
                return DispatchResult::failed(format!("{APOLOGY_PREFIX}: {e}"), e.to_string());
            }
        };

        for tool in &reply.tools {
            log::info!("agent: tool used: {}", tool.name);
        }

        let cost = match reply.tokens {
            Some((input, output)) => estimate_cost_usd(input as f64, output as f64),
            None => estimate_cost_usd(estimated_tokens(prompt), estimated_tokens(&reply.text)),
        };
        log::debug!(
            "agent: reply '{}' (~${cost:.6})",
            truncate_chars(&reply.text, 100)
        );

        self.hook
            .fire(speakable_summary(&reply.text, self.summary_max_chars));

        DispatchResult {
            succeeded: true,
            tool_invocations: reply.tools,
            response_text: reply.text,
            estimated_cost_usd: cost,
            failure: None,
        }
    }

    async fn ping(&self) -> Result<(), LlmError> {
        let reply = self.complete(PING_PROMPT).await?;
        log::debug!("agent: ping answered '{}'", truncate_chars(&reply.text, 40));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockAgent  (test-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub use mock::MockAgent;


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    struct ChannelHook(mpsc::UnboundedSender<String>);

    #[async_trait]
    impl ResponseHook for ChannelHook {
        async fn on_response(&self, summary: String) {
            let _ = self.0.send(summary);
        }
    }

    fn unreachable_config() -> AgentConfig {
        AgentConfig {
            base_url: "http://127.0.0.1:9".into(),
            timeout_secs: 2,
            ..AgentConfig::default()
        }
    }

    #[test]
    fn parses_text_tools_and_usage() {
        let body = format!(
            r#"{{
                "choices": [{{"message": {{
                    "role": "assistant",
                    "content": " São 10 horas. ",
                    "tool_calls": [{{"id": "1", "type": "function",
                        "function": {{"name": "clock", "arguments": "{}"}}}}]
                }}}}],
                "usage": {{"prompt_tokens": 12, "completion_tokens": 5}}
            }}"#,
            "x".repeat(150)
        );
        let reply = parse_reply(&body).unwrap();
        assert_eq!(reply.text, "São 10 horas.");
        assert_eq!(reply.tools.len(), 1);
        assert_eq!(reply.tools[0].name, "clock");
        assert_eq!(reply.tools[0].input.chars().count(), 100);
        assert_eq!(reply.tokens, Some((12, 5)));
    }

    #[test]
    fn no_choices_is_empty_response() {
        assert!(matches!(
            parse_reply(r#"{"choices": []}"#),
            Err(LlmError::EmptyResponse)
        ));
        assert!(matches!(parse_reply("<html>"), Err(LlmError::Parse(_))));
    }

    #[tokio::test]
    async fn empty_prompt_fails_without_request() {
        let agent = ApiAgent::from_config(&unreachable_config(), 200);
        let result = agent.dispatch("   ").await;
        assert!(!result.succeeded);
        assert_eq!(result.response_text, "");
        assert_eq!(result.failure.as_deref(), Some("empty prompt"));
    }

    #[tokio::test]
    async fn transport_failure_is_a_failed_result_and_skips_hook() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let agent = ApiAgent::from_config(&unreachable_config(), 200);
        agent.set_response_hook(Arc::new(ChannelHook(tx)));

        let result = agent.dispatch("que horas são").await;
        assert!(!result.succeeded);
        assert!(result.response_text.starts_with(APOLOGY_PREFIX));
        assert!(result.failure.is_some());
        assert_eq!(result.estimated_cost_usd, 0.0);

        drop(agent);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn ping_against_an_unreachable_endpoint_is_err_and_skips_hook() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let agent = ApiAgent::from_config(&unreachable_config(), 200);
        agent.set_response_hook(Arc::new(ChannelHook(tx)));

        assert!(matches!(
            agent.ping().await,
            Err(LlmError::Request(_) | LlmError::Timeout)
        ));
        drop(agent);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn mock_ping_follows_the_scripted_result() {
        assert!(MockAgent::replying("ok").ping().await.is_ok());
        assert!(matches!(
            MockAgent::failing("HTTP 500").ping().await,
            Err(LlmError::Request(reason)) if reason == "HTTP 500"
        ));
    }

    #[tokio::test]
    async fn hook_slot_fires_on_a_separate_task() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let slot = HookSlot::default();
        assert!(!slot.fire("sem gancho".into()));

        slot.set(Arc::new(ChannelHook(tx)));
        assert!(!slot.fire(String::new()));
        assert!(slot.fire("pronto".into()));
        assert_eq!(rx.recv().await.as_deref(), Some("pronto"));
    }

    #[tokio::test]
    async fn mock_agent_fires_hook_only_when_asked() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let agent = MockAgent::replying("São 10 horas.");
        agent.set_response_hook(Arc::new(ChannelHook(tx.clone())));
        assert!(agent.dispatch("que horas são").await.succeeded);
        assert_eq!(rx.recv().await.as_deref(), Some("São 10 horas."));

        let silent = MockAgent::silent("nada");
        silent.set_response_hook(Arc::new(ChannelHook(tx)));
        assert!(silent.dispatch("oi").await.succeeded);
        assert_eq!(silent.calls(), 1);
    }
}
