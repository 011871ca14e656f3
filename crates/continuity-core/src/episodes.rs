//! Episode Log: append-only record of interactions.

use crate::clock::Clock;
use crate::goals::GoalName;
use crate::shared::Mood;
use crate::storage::StoreDocument;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// One interaction, frozen at append time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub input_text: String,
    pub output_text: String,
    #[serde(default)]
    pub reflection: String,
    pub state_before: Mood,
    pub state_after: Mood,
    /// Texts of the facts learned in this interaction.
    pub facts_extracted: Vec<String>,
    /// Goal names on the stack, bottom to top.
    pub goals_active: Vec<GoalName>,
    pub duration_ms: u64,
    #[serde(default = "default_true")]
    pub success: bool,
    /// Result of the stability/confidence check, when it answered.
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// Episode contents before the log assigns an id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEpisode {
    pub input_text: String,
    pub output_text: String,
    pub reflection: String,
    pub state_before: Mood,
    pub state_after: Mood,
    pub facts_extracted: Vec<String>,
    pub goals_active: Vec<GoalName>,
    pub duration_ms: u64,
    pub success: bool,
    pub confidence: Option<f32>,
}

impl NewEpisode {
    pub fn new(input: impl Into<String>, output: impl Into<String>, before: Mood, after: Mood) -> Self {
        Self {
            input_text: input.into(),
            output_text: output.into(),
            reflection: String::new(),
            state_before: before,
            state_after: after,
            facts_extracted: Vec::new(),
            goals_active: Vec::new(),
            duration_ms: 0,
            success: true,
            confidence: None,
        }
    }

    pub fn with_facts<I, S>(mut self, facts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.facts_extracted = facts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_goals(mut self, goals: impl IntoIterator<Item = GoalName>) -> Self {
        self.goals_active = goals.into_iter().collect();
        self
    }

    pub fn with_reflection(mut self, reflection: impl Into<String>) -> Self {
        self.reflection = reflection.into();
        self
    }

    pub fn with_duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = ms;
        self
    }

    pub fn with_confidence(mut self, confidence: Option<f32>) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn failed(mut self) -> Self {
        self.success = false;
        self
    }
}

/// Where and when a fact was learned.
#[derive(Debug, Clone, PartialEq)]
pub struct FactAttribution {
    pub fact: String,
    pub episode_id: u64,
    pub learned_at: DateTime<Utc>,
}

/// A pair of facts flagged as contradictory, earlier first.
#[derive(Debug, Clone, PartialEq)]
pub struct Contradiction {
    pub earlier: FactAttribution,
    pub later: FactAttribution,
}

/// `episode_log.json`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EpisodeLog {
    episodes: Vec<Episode>,
    next_id: u64,
}

impl StoreDocument for EpisodeLog {
    const FILE_NAME: &'static str = "episode_log.json";
    const STORE: &'static str = "episode_log";

    fn validate(&self) -> Result<(), String> {
        if self.episodes.windows(2).any(|w| w[0].id >= w[1].id) {
            return Err("episode ids are not strictly increasing".into());
        }
        match self.episodes.last() {
            Some(last) if last.id >= self.next_id => {
                Err(format!("next_id {} does not follow episode {}", self.next_id, last.id))
            }
            _ => Ok(()),
        }
    }
}

impl EpisodeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns the next id and the current time. The only mutation of the log.
    pub fn append(&mut self, new: NewEpisode, clock: &dyn Clock) -> &Episode {
        let id = self.next_id;
        self.next_id += 1;
        self.episodes.push(Episode {
            id,
            timestamp: clock.now(),
            input_text: new.input_text,
            output_text: new.output_text,
            reflection: new.reflection,
            state_before: new.state_before,
            state_after: new.state_after,
            facts_extracted: new.facts_extracted,
            goals_active: new.goals_active,
            duration_ms: new.duration_ms,
            success: new.success,
            confidence: new.confidence,
        });
        tracing::debug!(target: "continuity::episodes", episode_id = id, total = self.episodes.len(), "Episode appended");
        &self.episodes[self.episodes.len() - 1]
    }

    pub fn episodes(&self) -> &[Episode] {
        &self.episodes
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Every learned fact with its episode timestamp, oldest first.
    pub fn facts_timeline(&self) -> Vec<(DateTime<Utc>, &str)> {
        self.episodes
            .iter()
            .flat_map(|e| e.facts_extracted.iter().map(move |f| (e.timestamp, f.as_str())))
            .collect()
    }

    pub fn goals_timeline(&self) -> Vec<(DateTime<Utc>, &[GoalName])> {
        self.episodes
            .iter()
            .map(|e| (e.timestamp, e.goals_active.as_slice()))
            .collect()
    }

    /// Energy after each episode.
    pub fn energy_trajectory(&self) -> Vec<(DateTime<Utc>, f64)> {
        self.episodes
            .iter()
            .map(|e| (e.timestamp, e.state_after.energy))
            .collect()
    }

    /// The last `n` episodes, oldest first.
    pub fn recent(&self, n: usize) -> &[Episode] {
        let start = self.episodes.len().saturating_sub(n);
        &self.episodes[start..]
    }

    /// Episodes with `start <= timestamp <= end`.
    pub fn between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<&Episode> {
        self.episodes
            .iter()
            .filter(|e| e.timestamp >= start && e.timestamp <= end)
            .collect()
    }

    /// Pairs of facts learned in distinct episodes for which
    /// `contradicts(earlier, later)` holds.
    ///
    /// The predicate is expected to wrap the inference collaborator's verdicts;
    /// the log only attributes each side to the episode that learned it.
    pub fn find_contradictions<F>(&self, mut contradicts: F) -> Vec<Contradiction>
    where
        F: FnMut(&str, &str) -> bool,
    {
        let learned: Vec<FactAttribution> = self
            .episodes
            .iter()
            .flat_map(|e| {
                e.facts_extracted.iter().map(move |f| FactAttribution {
                    fact: f.clone(),
                    episode_id: e.id,
                    learned_at: e.timestamp,
                })
            })
            .collect();

        let mut found = Vec::new();
        for (i, earlier) in learned.iter().enumerate() {
            for later in &learned[i + 1..] {
                if later.episode_id != earlier.episode_id && contradicts(&earlier.fact, &later.fact) {
                    found.push(Contradiction {
                        earlier: earlier.clone(),
                        later: later.clone(),
                    });
                }
            }
        }
        if !found.is_empty() {
            tracing::info!(target: "continuity::episodes", count = found.len(), "Contradictions attributed");
        }
        found
    }
}
