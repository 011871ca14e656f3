//! Continuity Controller: the single owner of the four stores.
//!
//! Interactions are routed in a fixed order (stability check, fact dedup, episode
//! append, goal update) against working copies that replace the live stores only
//! after every document has been saved. Collaborator calls happen before any store
//! lock is taken, and every one of them is bounded by the configured timeout.

mod control_loop;

pub use control_loop::{run_control_loop, ControlLoopHandle};

use crate::clock::{Clock, SystemClock};
use crate::collaborators::{bounded, Collaborators};
use crate::episodes::{Contradiction, Episode, EpisodeLog, NewEpisode};
use crate::error::{CollaboratorError, Result, ValidationError};
use crate::goals::{evaluate_reflex, Goal, GoalName, GoalStack, ResumeDecision};
use crate::identity::{IdentityModel, IdentityNarrative};
use crate::knowledge::{AddOutcome, DedupScope, Fact, FactPolicy, FactSource, FactStore, StateCheckpoint};
use crate::shared::{ContinuityConfig, Mood, MoodLabel};
use crate::storage::{load_document, save_document, FileStorage, LoadOutcome, StorageBackend};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Process-lifetime context: configuration, time source and storage.
#[derive(Clone)]
pub struct ContinuityContext {
    pub config: ContinuityConfig,
    pub clock: Arc<dyn Clock>,
    pub storage: Arc<dyn StorageBackend>,
}

impl ContinuityContext {
    pub fn new(config: ContinuityConfig, clock: Arc<dyn Clock>, storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            config,
            clock,
            storage,
        }
    }

    /// Wall clock and file storage under `config.storage_path`.
    pub fn from_config(config: ContinuityConfig) -> std::io::Result<Self> {
        let storage = FileStorage::open_path(&config.storage_path)?;
        Ok(Self::new(config, Arc::new(SystemClock), Arc::new(storage)))
    }
}

fn default_true() -> bool {
    true
}

fn default_source() -> FactSource {
    FactSource::User
}

/// A fact proposed by an interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateFact {
    pub text: String,
    #[serde(default = "default_source")]
    pub source: FactSource,
}

/// One interaction event to record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub input: String,
    pub output: String,
    #[serde(default)]
    pub reflection: String,
    #[serde(default)]
    pub facts: Vec<CandidateFact>,
    /// Goal the interaction asks to pursue next.
    #[serde(default)]
    pub goal_request: Option<GoalName>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default = "default_true")]
    pub success: bool,
}

impl Interaction {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            reflection: String::new(),
            facts: Vec::new(),
            goal_request: None,
            duration_ms: 0,
            success: true,
        }
    }

    pub fn with_fact(mut self, text: impl Into<String>, source: FactSource) -> Self {
        self.facts.push(CandidateFact {
            text: text.into(),
            source,
        });
        self
    }

    pub fn with_goal_request(mut self, goal: GoalName) -> Self {
        self.goal_request = Some(goal);
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
}

/// What happened while opening the stores.
#[derive(Debug)]
pub struct StartupReport {
    /// One line per store that had to be reinitialized empty.
    pub warnings: Vec<String>,
    pub resume: ResumeDecision,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InteractionReport {
    pub episode_id: u64,
    pub facts: Vec<(String, AddOutcome)>,
    pub confidence: Option<f32>,
    pub mood: Mood,
    pub active_goal: Option<GoalName>,
    /// Collaborator failures the interaction degraded around.
    pub degraded: Vec<CollaboratorError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub coherence: f64,
    pub latest_drift: Option<f64>,
    pub major_shift: bool,
    /// Coherence fell below the identity drift threshold.
    pub identity_drift: bool,
    pub fact_count: usize,
    pub episode_count: usize,
    pub narrative_count: usize,
    pub active_goal: Option<GoalName>,
    pub goal_stale: bool,
    pub mood: Mood,
    pub mood_label: MoodLabel,
    pub core_beliefs: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IntrospectionOutcome {
    Captured {
        narrative: IdentityNarrative,
        status: StatusReport,
        contradictions: Vec<Contradiction>,
    },
    /// The generator failed; retried at the next interval.
    Skipped { reason: CollaboratorError },
}

/// Result of one goal evaluation tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalEvaluation {
    /// Top goal is current and stays.
    Kept(GoalName),
    /// Low energy forced a rest goal.
    Reflex(GoalName),
    /// Energy recovered; the rest goal was completed.
    Recovered(GoalName),
    /// An interrupted or stale goal was picked up again.
    Resumed(GoalName),
    /// The generator chose a new goal.
    Chosen(GoalName),
}

struct LiveState {
    facts: FactStore,
    mood: Mood,
}

impl LiveState {
    fn checkpoint(&self) -> StateCheckpoint {
        StateCheckpoint {
            facts: self.facts.facts().to_vec(),
            energy: self.mood.energy,
            happiness: self.mood.happiness,
        }
    }
}

fn note_load(warnings: &mut Vec<String>, outcome: LoadOutcome) {
    if let LoadOutcome::Recovered(err) = outcome {
        warnings.push(err.to_string());
    }
}

/// Owns the Fact Store, Episode Log, Goal Stack and Identity Model.
///
/// Each store sits behind its own lock. Locks are always taken in the order
/// state, episodes, goals, identity, and never across a collaborator call.
pub struct ContinuityController {
    ctx: ContinuityContext,
    collaborators: Collaborators,
    state: Mutex<LiveState>,
    episodes: Mutex<EpisodeLog>,
    goals: Mutex<GoalStack>,
    identity: Mutex<IdentityModel>,
}

impl ContinuityController {
    /// Loads all four stores. A store that cannot be loaded starts empty and is
    /// reported in [`StartupReport::warnings`]; the others are unaffected.
    pub fn open(ctx: ContinuityContext, collaborators: Collaborators) -> (Self, StartupReport) {
        let storage = ctx.storage.as_ref();
        let cfg = &ctx.config;
        let mut warnings = Vec::new();

        let (checkpoint, outcome) = load_document::<StateCheckpoint>(storage);
        note_load(&mut warnings, outcome);
        let (episodes, outcome) = load_document::<EpisodeLog>(storage);
        note_load(&mut warnings, outcome);
        let (mut goals, outcome) = load_document::<GoalStack>(storage);
        note_load(&mut warnings, outcome);
        let (mut identity, outcome) = load_document::<IdentityModel>(storage);
        note_load(&mut warnings, outcome);

        goals.set_history_cap(cfg.completed_history_cap);
        identity.set_theme_count(cfg.key_theme_count);
        let resume = goals.resume_or_default(cfg.resume_window(), ctx.clock.now());

        let mood = checkpoint.mood();
        let facts = FactStore::from_facts(checkpoint.facts, FactPolicy::from(cfg));

        tracing::info!(
            target: "continuity::controller",
            facts = facts.len(),
            episodes = episodes.len(),
            goals = goals.hierarchy().len(),
            narratives = identity.len(),
            warnings = warnings.len(),
            "Continuity engine opened"
        );

        let controller = Self {
            collaborators,
            state: Mutex::new(LiveState { facts, mood }),
            episodes: Mutex::new(episodes),
            goals: Mutex::new(goals),
            identity: Mutex::new(identity),
            ctx,
        };
        (controller, StartupReport { warnings, resume })
    }

    pub fn config(&self) -> &ContinuityConfig {
        &self.ctx.config
    }

    fn clock(&self) -> &dyn Clock {
        self.ctx.clock.as_ref()
    }

    fn storage(&self) -> &dyn StorageBackend {
        self.ctx.storage.as_ref()
    }

    /// Records one interaction. Either every store is updated and saved, or none is.
    pub async fn process_interaction(&self, interaction: Interaction) -> Result<InteractionReport> {
        let cfg = &self.ctx.config;
        let limit = cfg.collaborator_timeout();
        let mut degraded = Vec::new();

        // 1. stability/confidence
        let mood_snapshot = self.state.lock().await.mood;
        let confidence = match &self.collaborators.stability {
            Some(check) => match bounded("stability_check", limit, check.assess(&interaction.input, &mood_snapshot)).await {
                Ok(c) => Some(c.clamp(0.0, 1.0)),
                Err(e) => {
                    tracing::warn!(target: "continuity::controller", error = %e, "Stability check unavailable, recording without confidence");
                    degraded.push(e);
                    None
                }
            },
            None => None,
        };

        // Neighbor lookups for step 2 happen before any store is locked.
        let mut candidates = Vec::with_capacity(interaction.facts.len());
        for fact in &interaction.facts {
            let neighbors = match &self.collaborators.similarity {
                Some(index) => match bounded("similarity_index", limit, index.query(&fact.text, cfg.neighbor_k)).await {
                    Ok(found) => Some(found),
                    Err(e) => {
                        tracing::warn!(target: "continuity::controller", error = %e, "Similarity lookup failed, exact-match dedup only");
                        degraded.push(e);
                        None
                    }
                },
                None => Some(Vec::new()),
            };
            candidates.push((fact, neighbors));
        }

        let clock = self.clock();
        let mut state = self.state.lock().await;
        let mut episodes = self.episodes.lock().await;
        let mut goals = self.goals.lock().await;

        // 2. dedup-checked fact insertion
        let mut facts = state.facts.clone();
        let mut outcomes = Vec::with_capacity(candidates.len());
        let mut learned = Vec::new();
        for (fact, neighbors) in &candidates {
            let scope = match neighbors {
                Some(found) => DedupScope::Semantic(found.as_slice()),
                None => DedupScope::ExactOnly,
            };
            let outcome = facts.add_fact(&fact.text, fact.source, scope, clock);
            if outcome.accepted {
                learned.push(fact.text.trim().to_string());
            }
            outcomes.push((fact.text.clone(), outcome));
        }

        // 3. episode append
        let before = state.mood;
        let after = before.spend(cfg.interaction_energy_cost);
        let mut log = episodes.clone();
        let mut episode = NewEpisode::new(interaction.input.as_str(), interaction.output.as_str(), before, after)
            .with_facts(learned.iter().cloned())
            .with_goals(goals.hierarchy().iter().map(|g| g.name))
            .with_reflection(interaction.reflection.as_str())
            .with_duration_ms(interaction.duration_ms)
            .with_confidence(confidence);
        if !interaction.success {
            episode = episode.failed();
        }
        let episode_id = log.append(episode, clock).id;

        // 4. goal stack read/update
        let mut stack = goals.clone();
        match interaction.goal_request {
            Some(name) if stack.active_goal().map(|g| g.name) == Some(name) => {
                stack.resume(clock);
            }
            Some(name) => stack.push_new(name, clock)?,
            None => stack.touch(clock),
        }

        let checkpoint = StateCheckpoint {
            facts: facts.facts().to_vec(),
            energy: after.energy,
            happiness: after.happiness,
        };
        let storage = self.storage();
        save_document(storage, &checkpoint)?;
        if let Err(e) = save_document(storage, &log).and_then(|_| save_document(storage, &stack)) {
            // put the files back in line with the state that stays live
            let rollback = [
                save_document(storage, &state.checkpoint()),
                save_document(storage, &*episodes),
            ];
            for failed in rollback.into_iter().filter_map(|r| r.err()) {
                tracing::error!(
                    target: "continuity::controller",
                    error = %failed,
                    "Rollback failed, saved store is ahead of live state"
                );
            }
            tracing::warn!(target: "continuity::controller", error = %e, "Interaction not recorded");
            return Err(e.into());
        }

        state.facts = facts;
        state.mood = after;
        *episodes = log;
        *goals = stack;
        let active_goal = goals.active_goal().map(|g| g.name);
        drop(goals);
        drop(episodes);
        drop(state);

        if let Some(index) = &self.collaborators.similarity {
            for text in &learned {
                if let Err(e) = bounded("similarity_index", limit, index.index(text)).await {
                    tracing::warn!(target: "continuity::controller", error = %e, fact = %text, "Fact not indexed");
                    degraded.push(e);
                }
            }
        }

        tracing::info!(
            target: "continuity::controller",
            episode_id,
            learned = learned.len(),
            energy = after.energy,
            goal = ?active_goal,
            "Interaction recorded"
        );
        Ok(InteractionReport {
            episode_id,
            facts: outcomes,
            confidence,
            mood: after,
            active_goal,
            degraded,
        })
    }

    /// Fast tick: energy decays, or recovers while a rest goal is active.
    /// Mood is saved with the next interaction, introspection or shutdown.
    pub async fn metabolism_tick(&self) -> Mood {
        let cfg = &self.ctx.config;
        let mut state = self.state.lock().await;
        let resting = self
            .goals
            .lock()
            .await
            .active_goal()
            .map(|g| g.name.is_rest())
            .unwrap_or(false);
        let next = if resting {
            state.mood.recover(cfg.rest_recovery)
        } else {
            state.mood.spend(cfg.metabolism_decay)
        }
        .settle();
        state.mood = next;
        tracing::trace!(target: "continuity::controller", energy = next.energy, happiness = next.happiness, resting, "Metabolism tick");
        next
    }

    /// Mid-frequency tick: reflex goals first, then keep, resume or choose a goal.
    pub async fn evaluate_goals(&self) -> Result<GoalEvaluation> {
        let clock = self.clock();
        let mood = self.state.lock().await.mood;
        let reflex = evaluate_reflex(&mood);

        {
            let mut goals = self.goals.lock().await;
            let mut stack = goals.clone();
            let top = stack.active_goal().map(|g| (g.name, g.is_current(), g.stale));
            let decision = match (reflex, top) {
                (Some(_), Some((name, _, _))) if name.is_rest() => {
                    stack.touch(clock);
                    Some(GoalEvaluation::Kept(name))
                }
                (Some(wanted), _) => {
                    stack.push_new(wanted, clock)?;
                    Some(GoalEvaluation::Reflex(wanted))
                }
                (None, Some((name, _, _))) if name.is_rest() => {
                    stack.pop(clock);
                    Some(GoalEvaluation::Recovered(name))
                }
                (None, Some((name, true, _))) => {
                    stack.touch(clock);
                    Some(GoalEvaluation::Kept(name))
                }
                (None, Some((name, false, false))) => {
                    stack.resume(clock);
                    Some(GoalEvaluation::Resumed(name))
                }
                _ => None,
            };
            if let Some(decision) = decision {
                save_document(self.storage(), &stack)?;
                *goals = stack;
                tracing::debug!(target: "continuity::goals", ?decision, "Goals evaluated");
                return Ok(decision);
            }
        }

        // empty or stale: ask the generator, without holding the lock
        let chosen = self.choose_goal(&mood).await;
        let decision = self
            .update_goals(|stack, clock| match stack.active_goal() {
                Some(top) if top.name == chosen => {
                    stack.resume(clock);
                    Ok(GoalEvaluation::Resumed(chosen))
                }
                Some(_) => {
                    stack.interrupt(clock);
                    stack.push_new(chosen, clock)?;
                    Ok(GoalEvaluation::Chosen(chosen))
                }
                None => {
                    stack.push_new(chosen, clock)?;
                    Ok(GoalEvaluation::Chosen(chosen))
                }
            })
            .await?;
        tracing::info!(target: "continuity::goals", ?decision, "Goals evaluated");
        Ok(decision)
    }

    async fn choose_goal(&self, mood: &Mood) -> GoalName {
        let catalog = GoalName::all()
            .iter()
            .map(|g| g.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let prompt = format!(
            "You are {}. Current mood: {} (energy {:.0}, happiness {:.0}).\nChoose ONE goal from [{}]. Reply with the goal name only.",
            self.ctx.config.app_name,
            mood.label().as_str(),
            mood.energy,
            mood.happiness,
            catalog
        );
        let limit = self.ctx.config.collaborator_timeout();
        match bounded("generator", limit, self.collaborators.generator.generate(&prompt)).await {
            Ok(reply) => GoalName::find_in(&reply).unwrap_or_else(|| {
                tracing::debug!(target: "continuity::goals", reply = %reply, "Reply outside the goal catalog, using IDLE");
                GoalName::Idle
            }),
            Err(e) => {
                tracing::warn!(target: "continuity::goals", error = %e, "Goal choice unavailable, using IDLE");
                GoalName::Idle
            }
        }
    }

    /// Slow tick: capture a narrative and report drift and coherence.
    ///
    /// A generator failure skips the cycle; nothing is recorded and the next
    /// interval tries again.
    pub async fn introspect(&self) -> Result<IntrospectionOutcome> {
        let contradictions = match self.contradictions().await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(target: "continuity::controller", error = %e, "Contradiction sweep skipped");
                Vec::new()
            }
        };

        let prompt = self.narrative_prompt(&contradictions).await;
        let limit = self.ctx.config.collaborator_timeout();
        let text = match bounded("generator", limit, self.collaborators.generator.generate(&prompt)).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => return Ok(skipped(CollaboratorError::failed("generator", "empty narrative"))),
            Err(e) => return Ok(skipped(e)),
        };

        let episode_count = self.episodes.lock().await.len() as u64;
        let narrative = {
            let mut identity = self.identity.lock().await;
            let mut model = identity.clone();
            if model.is_unchanged(&text) {
                tracing::debug!(target: "continuity::identity", "Narrative unchanged since last capture");
            }
            let narrative = model.record_narrative(&text, episode_count, self.clock())?.clone();
            save_document(self.storage(), &model)?;
            *identity = model;
            narrative
        };

        {
            let state = self.state.lock().await;
            if let Err(e) = save_document(self.storage(), &state.checkpoint()) {
                tracing::warn!(target: "continuity::controller", error = %e, "Checkpoint not saved after introspection");
            }
        }

        let status = self.status().await;
        tracing::info!(
            target: "continuity::controller",
            coherence = status.coherence,
            drift = ?status.latest_drift,
            narratives = status.narrative_count,
            contradictions = contradictions.len(),
            "Introspection captured"
        );
        if status.major_shift {
            tracing::warn!(target: "continuity::identity", drift = ?status.latest_drift, "Major identity shift");
        }
        if status.identity_drift {
            tracing::warn!(target: "continuity::identity", coherence = status.coherence, "Fact coherence below identity drift threshold");
        }
        Ok(IntrospectionOutcome::Captured {
            narrative,
            status,
            contradictions,
        })
    }

    async fn narrative_prompt(&self, contradictions: &[Contradiction]) -> String {
        let (mood, facts) = {
            let state = self.state.lock().await;
            (state.mood, state.facts.texts())
        };
        let recent: Vec<String> = {
            let episodes = self.episodes.lock().await;
            episodes
                .recent(5)
                .iter()
                .map(|e| format!("- \"{}\" -> \"{}\"", e.input_text, e.output_text))
                .collect()
        };
        let goal = self.goals.lock().await.active_goal().map(|g| g.name);
        let beliefs = self.identity.lock().await.extract_core_beliefs();

        let mut prompt = format!(
            "You are {}. Mood: {} (energy {:.0}, happiness {:.0}). Current goal: {}.\n",
            self.ctx.config.app_name,
            mood.label().as_str(),
            mood.energy,
            mood.happiness,
            goal.map(|g| g.as_str()).unwrap_or("none"),
        );
        if !facts.is_empty() {
            prompt.push_str(&format!("Known facts: {}.\n", facts.join("; ")));
        }
        if !recent.is_empty() {
            prompt.push_str("Recent interactions:\n");
            prompt.push_str(&recent.join("\n"));
            prompt.push('\n');
        }
        if !beliefs.is_empty() {
            let beliefs: Vec<&str> = beliefs.iter().map(String::as_str).collect();
            prompt.push_str(&format!("Core beliefs so far: {}.\n", beliefs.join(", ")));
        }
        for c in contradictions {
            prompt.push_str(&format!(
                "Unresolved: \"{}\" (episode {}) vs \"{}\" (episode {}).\n",
                c.earlier.fact, c.earlier.episode_id, c.later.fact, c.later.episode_id
            ));
        }
        prompt.push_str("Describe who you are becoming in three to five first-person sentences.");
        prompt
    }

    /// Asks the contradiction judge about the known facts and attributes each
    /// flagged pair to the episodes that learned them.
    pub async fn contradictions(&self) -> Result<Vec<Contradiction>> {
        let Some(judge) = &self.collaborators.judge else {
            return Ok(Vec::new());
        };
        let facts = self.state.lock().await.facts.texts();
        if facts.len() < 2 {
            return Ok(Vec::new());
        }
        let limit = self.ctx.config.collaborator_timeout();
        let pairs = bounded("contradiction_judge", limit, judge.contradicting_pairs(&facts)).await?;
        let flagged: HashSet<(String, String)> = pairs
            .into_iter()
            .flat_map(|(a, b)| [(a.clone(), b.clone()), (b, a)])
            .collect();

        let episodes = self.episodes.lock().await;
        Ok(episodes.find_contradictions(|a, b| flagged.contains(&(a.to_string(), b.to_string()))))
    }

    pub async fn status(&self) -> StatusReport {
        let cfg = &self.ctx.config;
        let now = self.clock().now();
        let state = self.state.lock().await;
        let episodes = self.episodes.lock().await;
        let goals = self.goals.lock().await;
        let identity = self.identity.lock().await;

        StatusReport {
            coherence: state.facts.coherence(now),
            latest_drift: identity.latest_drift(),
            major_shift: identity.detect_major_shift(cfg.major_shift_threshold),
            identity_drift: state.facts.identity_drift_flag(now, cfg.identity_drift_threshold),
            fact_count: state.facts.len(),
            episode_count: episodes.len(),
            narrative_count: identity.len(),
            active_goal: goals.active_goal().map(|g| g.name),
            goal_stale: goals.is_stale(),
            mood: state.mood,
            mood_label: state.mood.label(),
            core_beliefs: identity.extract_core_beliefs(),
        }
    }

    /// Saves every store; used at shutdown.
    pub async fn save_all(&self) -> Result<()> {
        let storage = self.storage();
        let state = self.state.lock().await;
        let episodes = self.episodes.lock().await;
        let goals = self.goals.lock().await;
        let identity = self.identity.lock().await;
        save_document(storage, &state.checkpoint())?;
        save_document(storage, &*episodes)?;
        save_document(storage, &*goals)?;
        save_document(storage, &*identity)?;
        tracing::info!(target: "continuity::controller", "All stores saved");
        Ok(())
    }

    async fn update_goals<T, F>(&self, change: F) -> Result<T>
    where
        F: FnOnce(&mut GoalStack, &dyn Clock) -> std::result::Result<T, ValidationError> + Send,
    {
        let mut goals = self.goals.lock().await;
        let mut stack = goals.clone();
        let out = change(&mut stack, self.clock())?;
        save_document(self.storage(), &stack)?;
        *goals = stack;
        Ok(out)
    }

    pub async fn push_goal(&self, name: GoalName) -> Result<()> {
        self.update_goals(|stack, clock| stack.push_new(name, clock)).await
    }

    /// Completes the active goal.
    pub async fn complete_goal(&self) -> Result<Option<Goal>> {
        self.update_goals(|stack, clock| Ok(stack.pop(clock))).await
    }

    pub async fn interrupt_goal(&self) -> Result<Option<GoalName>> {
        self.update_goals(|stack, clock| Ok(stack.interrupt(clock).map(|g| g.name)))
            .await
    }

    pub async fn resume_goal(&self) -> Result<Option<GoalName>> {
        self.update_goals(|stack, clock| Ok(stack.resume(clock).map(|g| g.name)))
            .await
    }

    pub async fn mood(&self) -> Mood {
        self.state.lock().await.mood
    }

    pub async fn facts(&self) -> Vec<Fact> {
        self.state.lock().await.facts.facts().to_vec()
    }

    pub async fn episodes(&self) -> Vec<Episode> {
        self.episodes.lock().await.episodes().to_vec()
    }

    /// Active goals, bottom to top.
    pub async fn goal_hierarchy(&self) -> Vec<Goal> {
        self.goals.lock().await.hierarchy().to_vec()
    }

    pub async fn completed_goals(&self) -> Vec<Goal> {
        self.goals.lock().await.completed_history().iter().cloned().collect()
    }

    pub async fn narratives(&self) -> Vec<IdentityNarrative> {
        self.identity.lock().await.narratives().to_vec()
    }
}

fn skipped(reason: CollaboratorError) -> IntrospectionOutcome {
    tracing::warn!(target: "continuity::controller", error = %reason, "Introspection skipped, retrying next interval");
    IntrospectionOutcome::Skipped { reason }
}

#[cfg(test)]
mod tests;
