//! Identity Model: the sequence of self-narratives, their drift and the beliefs
//! that persist across them.

use crate::clock::Clock;
use crate::error::ValidationError;
use crate::knowledge::text::top_terms;
use crate::storage::StoreDocument;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

pub const DEFAULT_THEME_COUNT: usize = 8;
const MIN_THEME_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityNarrative {
    pub timestamp: DateTime<Utc>,
    pub text: String,
    /// Hex SHA-256 of `text`.
    pub content_hash: String,
    pub key_themes: BTreeSet<String>,
    pub episode_count_at_capture: u64,
}

fn content_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

/// `identity_model.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityModel {
    narratives: Vec<IdentityNarrative>,
    #[serde(skip, default = "default_theme_count")]
    theme_count: usize,
}

fn default_theme_count() -> usize {
    DEFAULT_THEME_COUNT
}

impl Default for IdentityModel {
    fn default() -> Self {
        Self::with_theme_count(DEFAULT_THEME_COUNT)
    }
}

impl StoreDocument for IdentityModel {
    const FILE_NAME: &'static str = "identity_model.json";
    const STORE: &'static str = "identity_model";

    fn validate(&self) -> Result<(), String> {
        for pair in self.narratives.windows(2) {
            if pair[1].episode_count_at_capture < pair[0].episode_count_at_capture {
                return Err("episode_count_at_capture decreases".into());
            }
            if pair[1].timestamp < pair[0].timestamp {
                return Err("narratives out of creation order".into());
            }
        }
        match self.narratives.iter().find(|n| n.content_hash != content_hash(&n.text)) {
            Some(n) => Err(format!("content hash mismatch for narrative at {}", n.timestamp)),
            None => Ok(()),
        }
    }
}

impl IdentityModel {
    pub fn with_theme_count(theme_count: usize) -> Self {
        Self {
            narratives: Vec::new(),
            theme_count,
        }
    }

    pub fn set_theme_count(&mut self, theme_count: usize) {
        self.theme_count = theme_count;
    }

    pub fn narratives(&self) -> &[IdentityNarrative] {
        &self.narratives
    }

    pub fn latest(&self) -> Option<&IdentityNarrative> {
        self.narratives.last()
    }

    pub fn len(&self) -> usize {
        self.narratives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.narratives.is_empty()
    }

    /// True when `text` hashes the same as the latest narrative.
    pub fn is_unchanged(&self, text: &str) -> bool {
        self.latest()
            .map(|n| n.content_hash == content_hash(text.trim()))
            .unwrap_or(false)
    }

    /// Appends a narrative snapshot. Episode counts must never decrease.
    /// A clock that stepped backwards is clamped to the previous timestamp.
    pub fn record_narrative(
        &mut self,
        text: &str,
        episode_count: u64,
        clock: &dyn Clock,
    ) -> Result<&IdentityNarrative, ValidationError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyNarrative);
        }
        let mut timestamp = clock.now();
        if let Some(prev) = self.latest() {
            if episode_count < prev.episode_count_at_capture {
                return Err(ValidationError::NonMonotonicEpisodeCount {
                    previous: prev.episode_count_at_capture,
                    given: episode_count,
                });
            }
            if timestamp < prev.timestamp {
                tracing::warn!(
                    target: "continuity::identity",
                    now = %timestamp,
                    previous = %prev.timestamp,
                    "Clock went backwards, keeping narrative order"
                );
                timestamp = prev.timestamp;
            }
        }

        let narrative = IdentityNarrative {
            timestamp,
            text: text.to_string(),
            content_hash: content_hash(text),
            key_themes: top_terms(text, self.theme_count, MIN_THEME_LEN),
            episode_count_at_capture: episode_count,
        };
        tracing::info!(
            target: "continuity::identity",
            episodes = episode_count,
            themes = ?narrative.key_themes,
            "Narrative recorded"
        );
        self.narratives.push(narrative);
        Ok(&self.narratives[self.narratives.len() - 1])
    }

    /// `1 − Jaccard(themes)`. Two narratives without themes do not drift.
    pub fn drift_between(a: &IdentityNarrative, b: &IdentityNarrative) -> f64 {
        let union = a.key_themes.union(&b.key_themes).count();
        if union == 0 {
            return 0.0;
        }
        let shared = a.key_themes.intersection(&b.key_themes).count();
        1.0 - shared as f64 / union as f64
    }

    /// Drift between the last two narratives.
    pub fn latest_drift(&self) -> Option<f64> {
        match self.narratives.as_slice() {
            [.., prev, last] => Some(Self::drift_between(prev, last)),
            _ => None,
        }
    }

    pub fn detect_major_shift(&self, threshold: f64) -> bool {
        self.latest_drift().map(|d| d > threshold).unwrap_or(false)
    }

    /// Themes present in more than half of all narratives.
    pub fn extract_core_beliefs(&self) -> BTreeSet<String> {
        let total = self.narratives.len();
        let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
        for theme in self.narratives.iter().flat_map(|n| n.key_themes.iter()) {
            *seen.entry(theme.as_str()).or_default() += 1;
        }
        seen.into_iter()
            .filter(|(_, count)| count * 2 > total)
            .map(|(theme, _)| theme.to_string())
            .collect()
    }

    pub fn trajectory(&self) -> Vec<(DateTime<Utc>, &BTreeSet<String>)> {
        self.narratives
            .iter()
            .map(|n| (n.timestamp, &n.key_themes))
            .collect()
    }
}
