//! Polarity heuristic for contradiction judging: a like and a dislike of the
//! same subject contradict each other.

use async_trait::async_trait;
use continuity_core::{polarity_of, CollaboratorError, ContradictionJudge, Polarity};
use std::collections::BTreeSet;

/// Flags pairs with opposite polarity where one subject contains the other.
#[derive(Debug, Default, Clone, Copy)]
pub struct PolarityJudge;

impl PolarityJudge {
    pub fn new() -> Self {
        Self
    }

    pub fn judge(&self, facts: &[String]) -> Vec<(String, String)> {
        let stated: Vec<(&String, Polarity, BTreeSet<String>)> = facts
            .iter()
            .filter_map(|f| polarity_of(f).map(|(p, subject)| (f, p, subject)))
            .collect();

        let mut pairs = Vec::new();
        for (i, (a, pa, sa)) in stated.iter().enumerate() {
            for (b, pb, sb) in &stated[i + 1..] {
                if pa != pb && (sa.is_subset(sb) || sb.is_subset(sa)) {
                    pairs.push(((*a).clone(), (*b).clone()));
                }
            }
        }
        pairs
    }
}

#[async_trait]
impl ContradictionJudge for PolarityJudge {
    async fn contradicting_pairs(
        &self,
        facts: &[String],
    ) -> Result<Vec<(String, String)>, CollaboratorError> {
        let pairs = self.judge(facts);
        tracing::debug!(target: "continuity::skills", facts = facts.len(), flagged = pairs.len(), "Polarity sweep");
        Ok(pairs)
    }
}
