//! LLM-driven scheduler over an OpenAI-compatible chat completions API (OpenRouter by default).
//!
//! The model sees the run context as JSON and must answer with `{"next_step": "...", "rationale": "..."}`.
//! Transport or upstream failures are [`SchedulerError::Unavailable`]; an answer we cannot read as a
//! step is [`SchedulerError::Unparseable`] and carries the raw text.

use crate::error::SchedulerError;
use crate::orchestrator::scheduler::Scheduler;
use crate::orchestrator::state::{RunContext, StepChoice};
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4";

const SYSTEM_PROMPT: &str = "You schedule the steps of a Know Your Business (KYB) check for a UK company. \
Available steps: verify_business, fetch_directors, screen_sanctions, score_risk, finalize. \
Rules: always verify the business first. If the business is not active, finalize immediately. \
Fetch directors only for an active business. Screen the business and all directors against sanctions. \
If there is any sanctions hit, finalize immediately. Otherwise score risk, then finalize. \
You are given the current run context as JSON. Reply with a single JSON object and nothing else: \
{\"next_step\": \"<step>\", \"rationale\": \"<one sentence>\"}";

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatReplyMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatReplyMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StepReply {
    next_step: String,
    #[serde(default)]
    rationale: Option<String>,
}

pub struct LlmScheduler {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl LlmScheduler {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_url: DEFAULT_API_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait::async_trait]
impl Scheduler for LlmScheduler {
    fn name(&self) -> &str {
        "llm"
    }

    async fn decide_next_step(&self, ctx: &RunContext<'_>) -> Result<StepChoice, SchedulerError> {
        let context_json = serde_json::to_string(ctx)
            .map_err(|e| SchedulerError::Unavailable(format!("context encoding: {e}")))?;
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: context_json,
                },
            ],
            temperature: 0.0,
            stream: false,
        };

        let res = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SchedulerError::Unavailable(format!("request: {e}")))?;
        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| SchedulerError::Unavailable(format!("response body: {e}")))?;
        if !status.is_success() {
            return Err(SchedulerError::Unavailable(format!(
                "upstream {}: {}",
                status.as_u16(),
                text.trim()
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| SchedulerError::Unavailable(format!("response envelope: {e}")))?;
        let content = parsed
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .ok_or(SchedulerError::Unparseable { raw: text })?;

        tracing::debug!(target: "kyb::scheduler", model = %self.model, reply = %content, "driver replied");
        parse_step_reply(&content)
    }
}

/// Read a driver reply as a step. Accepts the JSON object (optionally inside a code fence) or a bare
/// step name.
pub fn parse_step_reply(raw: &str) -> Result<StepChoice, SchedulerError> {
    let body = strip_code_fence(raw.trim());
    let step = match serde_json::from_str::<StepReply>(body) {
        Ok(reply) => {
            if let Some(rationale) = reply.rationale.as_deref() {
                tracing::debug!(target: "kyb::scheduler", step = %reply.next_step, rationale, "driver rationale");
            }
            StepChoice::from_name(&reply.next_step)
        }
        Err(_) => StepChoice::from_name(body.trim_matches('"')),
    };
    step.ok_or_else(|| SchedulerError::Unparseable {
        raw: raw.to_string(),
    })
}

fn strip_code_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
