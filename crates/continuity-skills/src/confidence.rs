//! Confidence check backed by what the engine already knows: more indexed
//! facts raise confidence, contradictions among them lower it.

use crate::fact_index::SledFactIndex;
use crate::polarity::PolarityJudge;
use async_trait::async_trait;
use continuity_core::{CollaboratorError, Mood, StabilityCheck};
use std::sync::Arc;

/// Facts needed for full confidence.
const SATURATION: f32 = 5.0;
const CONTRADICTION_PENALTY: f32 = 0.1;

pub struct FactCountConfidence {
    index: Arc<SledFactIndex>,
    judge: PolarityJudge,
}

impl FactCountConfidence {
    pub fn new(index: Arc<SledFactIndex>) -> Self {
        Self {
            index,
            judge: PolarityJudge::new(),
        }
    }

    /// `clamp(n / 5, 0, 1) - 0.1 * contradictions`, floored at zero.
    pub fn score(fact_count: usize, contradictions: usize) -> f32 {
        let base = (fact_count as f32 / SATURATION).clamp(0.0, 1.0);
        (base - CONTRADICTION_PENALTY * contradictions as f32).max(0.0)
    }
}

#[async_trait]
impl StabilityCheck for FactCountConfidence {
    async fn assess(&self, _input: &str, _mood: &Mood) -> Result<f32, CollaboratorError> {
        let facts = self
            .index
            .texts()
            .map_err(|e| CollaboratorError::failed("stability_check", e.to_string()))?;
        let contradictions = self.judge.judge(&facts).len();
        Ok(Self::score(facts.len(), contradictions))
    }
}
