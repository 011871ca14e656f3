//! Model Router: the engine's text generator, backed by a mock or a live LLM API.

use async_trait::async_trait;
use continuity_core::{top_terms, CollaboratorError, Generator, GoalName};
use serde::Deserialize;

const GENERATOR_NAME: &str = "ModelRouter";
const COLLABORATOR: &str = "generator";
const ENV_LLM_MODE: &str = "CONTINUITY_LLM_MODE";
const ENV_LLM_API_URL: &str = "CONTINUITY_LLM_API_URL";
const ENV_LLM_API_KEY: &str = "CONTINUITY_LLM_API_KEY";

/// Mode for LLM invocation: mock (deterministic local text) or live (external API).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LlmMode {
    #[default]
    Mock,
    Live,
}

impl LlmMode {
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("live") {
            LlmMode::Live
        } else {
            LlmMode::Mock
        }
    }

    /// `CONTINUITY_LLM_MODE` when set, otherwise `fallback` (usually the config's `llm_mode`).
    pub fn from_env_or(fallback: &str) -> Self {
        match std::env::var(ENV_LLM_MODE) {
            Ok(v) => Self::parse(&v),
            Err(_) => Self::parse(fallback),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LlmMode::Mock => "mock",
            LlmMode::Live => "live",
        }
    }
}

/// Reply body accepted from the live endpoint.
#[derive(Debug, Deserialize)]
struct LiveReply {
    text: Option<String>,
    generated: Option<String>,
}

/// Routes prompts to a mock generator or a live HTTP endpoint.
pub struct ModelRouter {
    mode: LlmMode,
    client: reqwest::Client,
    api_url: Option<String>,
    api_key: Option<String>,
}

impl ModelRouter {
    pub fn new() -> Self {
        Self::with_mode(LlmMode::from_env_or("mock"))
    }

    pub fn with_mode(mode: LlmMode) -> Self {
        Self {
            mode,
            client: reqwest::Client::new(),
            api_url: std::env::var(ENV_LLM_API_URL).ok().filter(|v| !v.trim().is_empty()),
            api_key: std::env::var(ENV_LLM_API_KEY).ok().filter(|v| !v.trim().is_empty()),
        }
    }

    pub fn mode(&self) -> LlmMode {
        self.mode
    }

    /// Deterministic reply: a catalog goal for goal prompts, otherwise a short
    /// first-person narrative built from the prompt's mood, goal and facts.
    fn mock_generate(&self, prompt: &str) -> String {
        if prompt.contains("Choose ONE goal") {
            return mock_goal(prompt).as_str().to_string();
        }
        mock_narrative(prompt)
    }

    /// Falls back to the mock when the endpoint or key is not configured.
    async fn live_generate(&self, prompt: &str) -> Result<String, CollaboratorError> {
        let (Some(url), Some(key)) = (self.api_url.as_deref(), self.api_key.as_deref()) else {
            tracing::debug!(target: "continuity::skills", "Live LLM not configured, using mock generation");
            return Ok(self.mock_generate(prompt));
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(key)
            .json(&serde_json::json!({ "prompt": prompt }))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CollaboratorError::failed(COLLABORATOR, e.to_string()))?;
        let reply: LiveReply = response
            .json()
            .await
            .map_err(|e| CollaboratorError::failed(COLLABORATOR, format!("unreadable reply: {}", e)))?;

        reply
            .text
            .or(reply.generated)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| CollaboratorError::failed(COLLABORATOR, "reply carried no text"))
    }
}

impl Default for ModelRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Generator for ModelRouter {
    fn name(&self) -> &str {
        GENERATOR_NAME
    }

    async fn generate(&self, prompt: &str) -> Result<String, CollaboratorError> {
        let generated = match self.mode {
            LlmMode::Mock => self.mock_generate(prompt),
            LlmMode::Live => self.live_generate(prompt).await?,
        };
        tracing::debug!(
            target: "continuity::skills",
            mode = self.mode.as_str(),
            prompt_len = prompt.len(),
            reply_len = generated.len(),
            "Generated"
        );
        Ok(generated)
    }
}

/// Text after `marker` up to the first of `ends`, trimmed.
fn field_after<'a>(prompt: &'a str, marker: &str, ends: &[char]) -> Option<&'a str> {
    let rest = prompt.split(marker).nth(1)?.trim_start();
    let end = rest.find(ends).unwrap_or(rest.len());
    Some(rest[..end].trim()).filter(|s| !s.is_empty())
}

fn mock_goal(prompt: &str) -> GoalName {
    let label = field_after(prompt, "mood:", &[' ', '(', '\n']).unwrap_or("NEUTRAL");
    match label {
        "EXHAUSTED" => GoalName::NeedRest,
        "GRUMPY" => GoalName::Complain,
        "EXCITED" => GoalName::ExpressJoy,
        "TIRED" => GoalName::Idle,
        _ => GoalName::ReflectOnLife,
    }
}

fn mock_narrative(prompt: &str) -> String {
    let name = field_after(prompt, "You are ", &['.', '\n']).unwrap_or("an engine");
    let mood = field_after(prompt, "Mood:", &[' ', '(', '\n'])
        .unwrap_or("NEUTRAL")
        .to_lowercase();
    let goal = field_after(prompt, "Current goal:", &['.', '\n'])
        .filter(|g| *g != "none")
        .map(|g| g.to_lowercase().replace('_', " "));
    let themes: Vec<String> = field_after(prompt, "Known facts:", &['\n'])
        .map(|facts| top_terms(facts, 3, 4).into_iter().collect())
        .unwrap_or_default();

    let mut out = format!("I am {}, and right now I feel {}.", name, mood);
    match goal {
        Some(goal) => out.push_str(&format!(" My attention is on {}.", goal)),
        None => out.push_str(" I have no pressing goal."),
    }
    if themes.is_empty() {
        out.push_str(" I am still learning what matters to the people I talk with.");
    } else {
        out.push_str(&format!(" I keep returning to {}.", themes.join(", ")));
    }
    out.push_str(" I am becoming someone who remembers.");
    out
}
