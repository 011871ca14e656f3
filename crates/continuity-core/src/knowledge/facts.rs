//! Fact Store: deduplicated facts with a stability-weighted coherence score.

use super::text::{normalize_exact, opposing_stance, overlap_ratio};
use crate::clock::Clock;
use crate::shared::{ContinuityConfig, Mood};
use crate::storage::StoreDocument;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Facts shorter than this (after trimming) are rejected.
const MIN_FACT_LEN: usize = 3;
/// Count-health is 1.0 inside this range.
const HEALTHY_COUNT: std::ops::RangeInclusive<usize> = 5..=30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactSource {
    User,
    Inferred,
}

/// Derived age class; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeBucket {
    /// Younger than the freshness threshold.
    Fresh,
    /// Older than the threshold, younger than a week.
    Recent,
    Established,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub text: String,
    pub first_seen: DateTime<Utc>,
    pub source: FactSource,
}

impl Fact {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.first_seen
    }

    pub fn age_bucket(&self, now: DateTime<Utc>, freshness: Duration) -> AgeBucket {
        let age = self.age(now);
        if age < freshness {
            AgeBucket::Fresh
        } else if age < Duration::days(7) {
            AgeBucket::Recent
        } else {
            AgeBucket::Established
        }
    }
}

/// Neighbor returned by the similarity collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub text: String,
    pub score: f32,
}

/// Why a fact was or was not stored.
#[derive(Debug, Clone, PartialEq)]
pub enum AddReason {
    Stored,
    /// Too short or blank.
    Invalid,
    ExactDuplicate { existing: String },
    SemanticDuplicate { existing: String, overlap: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddOutcome {
    pub accepted: bool,
    pub reason: AddReason,
}

impl AddOutcome {
    fn rejected(reason: AddReason) -> Self {
        Self {
            accepted: false,
            reason,
        }
    }
}

/// Candidates for the semantic duplicate test.
#[derive(Debug, Clone, Copy)]
pub enum DedupScope<'a> {
    /// Compare against every stored fact and these collaborator neighbors.
    Semantic(&'a [Neighbor]),
    /// The similarity collaborator is unavailable; exact match only.
    ExactOnly,
}

/// Tunables for dedup and coherence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactPolicy {
    pub dedup_threshold: f64,
    pub stability_weight: f64,
    pub count_weight: f64,
    pub freshness: Duration,
}

impl Default for FactPolicy {
    fn default() -> Self {
        Self::from(&ContinuityConfig::default())
    }
}

impl From<&ContinuityConfig> for FactPolicy {
    fn from(c: &ContinuityConfig) -> Self {
        Self {
            dedup_threshold: c.dedup_threshold,
            stability_weight: c.stability_weight,
            count_weight: c.count_weight,
            freshness: c.freshness(),
        }
    }
}

/// `state_checkpoint.json`: the fact set plus the current mood.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateCheckpoint {
    pub facts: Vec<Fact>,
    pub energy: f64,
    pub happiness: f64,
}

impl Default for StateCheckpoint {
    fn default() -> Self {
        let mood = Mood::default();
        Self {
            facts: Vec::new(),
            energy: mood.energy,
            happiness: mood.happiness,
        }
    }
}

impl StoreDocument for StateCheckpoint {
    const FILE_NAME: &'static str = "state_checkpoint.json";
    const STORE: &'static str = "state_checkpoint";

    fn validate(&self) -> Result<(), String> {
        for (i, fact) in self.facts.iter().enumerate() {
            let key = normalize_exact(&fact.text);
            if self.facts[..i].iter().any(|f| normalize_exact(&f.text) == key) {
                return Err(format!("duplicate fact '{}'", fact.text));
            }
        }
        if !(0.0..=100.0).contains(&self.energy) || !(0.0..=100.0).contains(&self.happiness) {
            return Err("mood out of range".into());
        }
        Ok(())
    }
}

impl StateCheckpoint {
    pub fn mood(&self) -> Mood {
        Mood::new(self.energy, self.happiness)
    }
}

/// Known facts, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct FactStore {
    facts: Vec<Fact>,
    policy: FactPolicy,
}

impl FactStore {
    pub fn new(policy: FactPolicy) -> Self {
        Self {
            facts: Vec::new(),
            policy,
        }
    }

    pub fn from_facts(facts: Vec<Fact>, policy: FactPolicy) -> Self {
        Self { facts, policy }
    }

    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    pub fn texts(&self) -> Vec<String> {
        self.facts.iter().map(|f| f.text.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Stores `text` unless it is invalid, an exact duplicate, or (in
    /// [`DedupScope::Semantic`]) a semantic duplicate of a stored fact or neighbor.
    /// A candidate with the opposite stance is never a semantic duplicate.
    pub fn add_fact(
        &mut self,
        text: &str,
        source: FactSource,
        scope: DedupScope<'_>,
        clock: &dyn Clock,
    ) -> AddOutcome {
        let text = text.trim();
        if text.chars().count() < MIN_FACT_LEN {
            return AddOutcome::rejected(AddReason::Invalid);
        }

        let key = normalize_exact(text);
        if let Some(existing) = self.facts.iter().find(|f| normalize_exact(&f.text) == key) {
            tracing::debug!(target: "continuity::facts", fact = text, "Exact duplicate rejected");
            return AddOutcome::rejected(AddReason::ExactDuplicate {
                existing: existing.text.clone(),
            });
        }

        if let DedupScope::Semantic(neighbors) = scope {
            let candidates = self
                .facts
                .iter()
                .map(|f| f.text.as_str())
                .chain(neighbors.iter().map(|n| n.text.as_str()));
            for candidate in candidates {
                let overlap = overlap_ratio(text, candidate);
                if overlap > self.policy.dedup_threshold && !opposing_stance(text, candidate) {
                    tracing::debug!(
                        target: "continuity::facts",
                        fact = text,
                        existing = candidate,
                        overlap,
                        "Semantic duplicate rejected"
                    );
                    return AddOutcome::rejected(AddReason::SemanticDuplicate {
                        existing: candidate.to_string(),
                        overlap,
                    });
                }
            }
        }

        self.facts.push(Fact {
            text: text.to_string(),
            first_seen: clock.now(),
            source,
        });
        tracing::info!(target: "continuity::facts", fact = text, total = self.facts.len(), "Fact stored");
        AddOutcome {
            accepted: true,
            reason: AddReason::Stored,
        }
    }

    /// Weighted sum of age-stability and count-health, in `[0, 1]`.
    pub fn coherence(&self, now: DateTime<Utc>) -> f64 {
        let n = self.facts.len();
        let stability = if n == 0 {
            0.0
        } else {
            let stable = self
                .facts
                .iter()
                .filter(|f| f.age(now) >= self.policy.freshness)
                .count();
            stable as f64 / n as f64
        };
        let score = self.policy.stability_weight * stability + self.policy.count_weight * count_health(n);
        score.clamp(0.0, 1.0)
    }

    /// True when coherence has fallen below `threshold`.
    pub fn identity_drift_flag(&self, now: DateTime<Utc>, threshold: f64) -> bool {
        self.coherence(now) < threshold
    }

    /// Facts no older than `max_age_days`, in insertion order. A negative or
    /// NaN age matches nothing.
    pub fn facts_by_age(&self, max_age_days: f64, now: DateTime<Utc>) -> Vec<&Fact> {
        if max_age_days.is_nan() || max_age_days < 0.0 {
            return Vec::new();
        }
        let max_age = Duration::try_milliseconds((max_age_days * 86_400_000.0) as i64)
            .unwrap_or(Duration::MAX);
        self.facts.iter().filter(|f| f.age(now) <= max_age).collect()
    }
}

fn count_health(n: usize) -> f64 {
    if n < *HEALTHY_COUNT.start() {
        n as f64 / *HEALTHY_COUNT.start() as f64
    } else if HEALTHY_COUNT.contains(&n) {
        1.0
    } else {
        let over = (n - HEALTHY_COUNT.end()) as f64;
        (1.0 - over / 100.0).max(0.5)
    }
}
