//! External collaborators consumed by the controller.
//!
//! Every call goes through [`bounded`], which applies the configured timeout and
//! turns an elapsed deadline into a [`CollaboratorError::Timeout`].

use crate::error::CollaboratorError;
use crate::knowledge::Neighbor;
use crate::shared::Mood;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Text generation: narratives, goal choices, replies.
#[async_trait]
pub trait Generator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, CollaboratorError>;
}

/// Nearest-neighbor lookup over previously indexed fact texts.
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// Indexes `text` and returns its id in the index.
    async fn index(&self, text: &str) -> Result<String, CollaboratorError>;

    /// Up to `k` indexed texts closest to `text`, best first.
    async fn query(&self, text: &str, k: usize) -> Result<Vec<Neighbor>, CollaboratorError>;
}

/// Judges which fact pairs contradict each other. Verdicts are stored, not checked.
#[async_trait]
pub trait ContradictionJudge: Send + Sync {
    async fn contradicting_pairs(
        &self,
        facts: &[String],
    ) -> Result<Vec<(String, String)>, CollaboratorError>;
}

/// Stability/confidence check run before an interaction is recorded.
#[async_trait]
pub trait StabilityCheck: Send + Sync {
    /// Confidence in `[0, 1]` for recording this interaction.
    async fn assess(&self, input: &str, mood: &Mood) -> Result<f32, CollaboratorError>;
}

/// The collaborators a controller talks to. Only the generator is required.
#[derive(Clone)]
pub struct Collaborators {
    pub generator: Arc<dyn Generator>,
    pub similarity: Option<Arc<dyn SimilarityIndex>>,
    pub judge: Option<Arc<dyn ContradictionJudge>>,
    pub stability: Option<Arc<dyn StabilityCheck>>,
}

impl Collaborators {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            generator,
            similarity: None,
            judge: None,
            stability: None,
        }
    }

    pub fn with_similarity(mut self, index: Arc<dyn SimilarityIndex>) -> Self {
        self.similarity = Some(index);
        self
    }

    pub fn with_judge(mut self, judge: Arc<dyn ContradictionJudge>) -> Self {
        self.judge = Some(judge);
        self
    }

    pub fn with_stability(mut self, check: Arc<dyn StabilityCheck>) -> Self {
        self.stability = Some(check);
        self
    }
}

/// Runs a collaborator call under `limit`.
pub async fn bounded<T, F>(collaborator: &'static str, limit: Duration, call: F) -> Result<T, CollaboratorError>
where
    F: Future<Output = Result<T, CollaboratorError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(CollaboratorError::Timeout {
            collaborator,
            after: limit,
        }),
    }
}
