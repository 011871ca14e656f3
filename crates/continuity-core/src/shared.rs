//! Shared types used across the continuity crates.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine configuration. Load from TOML or env.
///
/// Thresholds and weights have no derivation behind them; they are tunables, not
/// constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinuityConfig {
    /// Name used in narrative prompts and logs.
    pub app_name: String,
    /// Directory holding the four store documents.
    pub storage_path: String,
    /// LLM mode for the generator ("mock" or "live").
    pub llm_mode: String,

    /// Overlap ratio above which a new fact is a semantic duplicate.
    pub dedup_threshold: f64,
    /// Neighbors requested from the similarity collaborator per dedup check.
    pub neighbor_k: usize,
    /// Weight of the age-stability term in coherence.
    pub stability_weight: f64,
    /// Weight of the count-health term in coherence.
    pub count_weight: f64,
    /// Facts older than this count as stable.
    pub freshness_days: f64,

    /// Completed goals kept in history.
    pub completed_history_cap: usize,
    /// Maximum idle time for a goal to stay current across a restart.
    pub resume_window_secs: u64,

    /// Key themes extracted per narrative.
    pub key_theme_count: usize,
    /// Latest drift above this is a major identity shift.
    pub major_shift_threshold: f64,
    /// Coherence below this flags identity drift.
    pub identity_drift_threshold: f64,

    pub introspection_interval_secs: u64,
    pub goal_eval_interval_secs: u64,
    pub metabolism_interval_secs: u64,
    /// Timeout applied to every collaborator call.
    pub collaborator_timeout_ms: u64,

    /// Energy spent per interaction.
    pub interaction_energy_cost: f64,
    /// Energy lost per metabolism tick.
    pub metabolism_decay: f64,
    /// Energy regained per metabolism tick while a rest goal is active.
    pub rest_recovery: f64,
}

impl Default for ContinuityConfig {
    fn default() -> Self {
        Self {
            app_name: "Continuity Engine".to_string(),
            storage_path: "./data/continuity".to_string(),
            llm_mode: "mock".to_string(),
            dedup_threshold: 0.85,
            neighbor_k: 5,
            stability_weight: 0.6,
            count_weight: 0.4,
            freshness_days: 1.0,
            completed_history_cap: 20,
            resume_window_secs: 600,
            key_theme_count: 8,
            major_shift_threshold: 0.6,
            identity_drift_threshold: 0.3,
            introspection_interval_secs: 180,
            goal_eval_interval_secs: 30,
            metabolism_interval_secs: 5,
            collaborator_timeout_ms: 10_000,
            interaction_energy_cost: 2.0,
            metabolism_decay: 0.5,
            rest_recovery: 10.0,
        }
    }
}

impl ContinuityConfig {
    /// Load config from file and environment. Precedence: env `CONTINUITY__*` >
    /// file at `CONTINUITY_CONFIG` (default `config/continuity.toml`) > defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONTINUITY_CONFIG").unwrap_or_else(|_| "config/continuity".to_string());
        let d = Self::default();
        let builder = config::Config::builder()
            .set_default("app_name", d.app_name)?
            .set_default("storage_path", d.storage_path)?
            .set_default("llm_mode", d.llm_mode)?
            .set_default("dedup_threshold", d.dedup_threshold)?
            .set_default("neighbor_k", d.neighbor_k as i64)?
            .set_default("stability_weight", d.stability_weight)?
            .set_default("count_weight", d.count_weight)?
            .set_default("freshness_days", d.freshness_days)?
            .set_default("completed_history_cap", d.completed_history_cap as i64)?
            .set_default("resume_window_secs", d.resume_window_secs as i64)?
            .set_default("key_theme_count", d.key_theme_count as i64)?
            .set_default("major_shift_threshold", d.major_shift_threshold)?
            .set_default("identity_drift_threshold", d.identity_drift_threshold)?
            .set_default("introspection_interval_secs", d.introspection_interval_secs as i64)?
            .set_default("goal_eval_interval_secs", d.goal_eval_interval_secs as i64)?
            .set_default("metabolism_interval_secs", d.metabolism_interval_secs as i64)?
            .set_default("collaborator_timeout_ms", d.collaborator_timeout_ms as i64)?
            .set_default("interaction_energy_cost", d.interaction_energy_cost)?
            .set_default("metabolism_decay", d.metabolism_decay)?
            .set_default("rest_recovery", d.rest_recovery)?;

        let path = Path::new(&config_path);
        let with_ext = path.with_extension("toml");
        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else if with_ext.exists() {
            builder.add_source(config::File::from(with_ext.as_path()))
        } else {
            builder
        };

        let built = builder
            .add_source(config::Environment::with_prefix("CONTINUITY").separator("__"))
            .build()?;

        built.try_deserialize()
    }

    pub fn resume_window(&self) -> Duration {
        Duration::seconds(self.resume_window_secs as i64)
    }

    pub fn freshness(&self) -> Duration {
        Duration::milliseconds((self.freshness_days * 86_400_000.0) as i64)
    }

    pub fn collaborator_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.collaborator_timeout_ms)
    }
}

pub const MAX_LEVEL: f64 = 100.0;

/// Energy and happiness snapshot, both in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mood {
    pub energy: f64,
    pub happiness: f64,
}

impl Default for Mood {
    fn default() -> Self {
        Self {
            energy: MAX_LEVEL,
            happiness: 50.0,
        }
    }
}

/// Coarse mood description used in prompts and episodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MoodLabel {
    Exhausted,
    Tired,
    Grumpy,
    Excited,
    Neutral,
}

impl MoodLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoodLabel::Exhausted => "EXHAUSTED",
            MoodLabel::Tired => "TIRED",
            MoodLabel::Grumpy => "GRUMPY",
            MoodLabel::Excited => "EXCITED",
            MoodLabel::Neutral => "NEUTRAL",
        }
    }
}

impl Mood {
    pub fn new(energy: f64, happiness: f64) -> Self {
        Self {
            energy: energy.clamp(0.0, MAX_LEVEL),
            happiness: happiness.clamp(0.0, MAX_LEVEL),
        }
    }

    pub fn label(&self) -> MoodLabel {
        if self.energy < 20.0 {
            MoodLabel::Exhausted
        } else if self.energy < 50.0 {
            MoodLabel::Tired
        } else if self.happiness < 30.0 {
            MoodLabel::Grumpy
        } else if self.happiness > 70.0 {
            MoodLabel::Excited
        } else {
            MoodLabel::Neutral
        }
    }

    /// Spends energy, saturating at zero.
    pub fn spend(self, energy: f64) -> Self {
        Self::new(self.energy - energy, self.happiness)
    }

    /// Regains energy, saturating at the maximum.
    pub fn recover(self, energy: f64) -> Self {
        Self::new(self.energy + energy, self.happiness)
    }

    /// Moves happiness one step toward the neutral midpoint.
    pub fn settle(self) -> Self {
        let step = (50.0 - self.happiness).clamp(-1.0, 1.0);
        Self::new(self.energy, self.happiness + step)
    }
}
