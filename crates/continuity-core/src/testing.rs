//! Scripted collaborators for deterministic tests without a model or index service.

use crate::collaborators::{ContradictionJudge, Generator, SimilarityIndex, StabilityCheck};
use crate::error::CollaboratorError;
use crate::knowledge::Neighbor;
use crate::shared::Mood;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// One scripted generator reply.
#[derive(Debug, Clone)]
pub enum Scripted {
    Reply(String),
    Fail(String),
    /// Sleeps before replying; pair with a short collaborator timeout.
    Hang(Duration),
}

/// Returns scripted replies in order, then repeats the fallback.
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Scripted>>,
    fallback: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: "I am still here, still curious.".to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Scripted::Reply(r.to_string())).collect())
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> Result<String, CollaboratorError> {
        self.prompts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(prompt.to_string());
        let next = self
            .script
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front();
        match next {
            Some(Scripted::Reply(text)) => Ok(text),
            Some(Scripted::Fail(message)) => Err(CollaboratorError::failed("generator", message)),
            Some(Scripted::Hang(wait)) => {
                tokio::time::sleep(wait).await;
                Ok(self.fallback.clone())
            }
            None => Ok(self.fallback.clone()),
        }
    }
}

/// Similarity index answering every query with the same neighbors.
#[derive(Default)]
pub struct StaticIndex {
    neighbors: Vec<Neighbor>,
    indexed: Mutex<Vec<String>>,
    unavailable: bool,
}

impl StaticIndex {
    pub fn new(neighbors: Vec<Neighbor>) -> Self {
        Self {
            neighbors,
            ..Self::default()
        }
    }

    /// Every call fails.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn indexed(&self) -> Vec<String> {
        self.indexed.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl SimilarityIndex for StaticIndex {
    async fn index(&self, text: &str) -> Result<String, CollaboratorError> {
        if self.unavailable {
            return Err(CollaboratorError::failed("similarity_index", "offline"));
        }
        let mut indexed = self.indexed.lock().unwrap_or_else(|p| p.into_inner());
        indexed.push(text.to_string());
        Ok(format!("fact-{}", indexed.len()))
    }

    async fn query(&self, _text: &str, k: usize) -> Result<Vec<Neighbor>, CollaboratorError> {
        if self.unavailable {
            return Err(CollaboratorError::failed("similarity_index", "offline"));
        }
        Ok(self.neighbors.iter().take(k).cloned().collect())
    }
}

/// Flags exactly the given pairs.
pub struct FixedJudge(pub Vec<(String, String)>);

#[async_trait]
impl ContradictionJudge for FixedJudge {
    async fn contradicting_pairs(
        &self,
        _facts: &[String],
    ) -> Result<Vec<(String, String)>, CollaboratorError> {
        Ok(self.0.clone())
    }
}

/// Always answers with the same confidence.
pub struct FixedConfidence(pub f32);

#[async_trait]
impl StabilityCheck for FixedConfidence {
    async fn assess(&self, _input: &str, _mood: &Mood) -> Result<f32, CollaboratorError> {
        Ok(self.0)
    }
}
