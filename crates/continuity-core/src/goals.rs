//! Goal Stack: a persistent LIFO of goals with a bounded completed history.
//!
//! The top of `active_stack` is the active goal. `pop` completes it and moves it to
//! `completed_history`; `interrupt` only marks it non-current. Whether a goal is
//! still current after a restart is decided from its persisted `last_active_at`,
//! never from in-memory elapsed time.

use crate::clock::Clock;
use crate::error::ValidationError;
use crate::shared::Mood;
use crate::storage::StoreDocument;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_HISTORY_CAP: usize = 20;
/// Deepest the active stack gets before the oldest goal below the top is retired.
pub const MAX_ACTIVE_DEPTH: usize = 8;

/// Energy below which sleep preempts everything.
const CRITICAL_ENERGY: f64 = 15.0;
/// Energy below which rest is requested.
const LOW_ENERGY: f64 = 30.0;

/// The closed goal catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GoalName {
    CriticalSleep,
    NeedRest,
    SeekAttention,
    Complain,
    ExpressJoy,
    ReflectOnLife,
    Idle,
}

impl GoalName {
    pub fn all() -> [Self; 7] {
        [
            GoalName::CriticalSleep,
            GoalName::NeedRest,
            GoalName::SeekAttention,
            GoalName::Complain,
            GoalName::ExpressJoy,
            GoalName::ReflectOnLife,
            GoalName::Idle,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GoalName::CriticalSleep => "CRITICAL_SLEEP",
            GoalName::NeedRest => "NEED_REST",
            GoalName::SeekAttention => "SEEK_ATTENTION",
            GoalName::Complain => "COMPLAIN",
            GoalName::ExpressJoy => "EXPRESS_JOY",
            GoalName::ReflectOnLife => "REFLECT_ON_LIFE",
            GoalName::Idle => "IDLE",
        }
    }

    pub fn default_priority(&self) -> Priority {
        match self {
            GoalName::CriticalSleep => Priority::Critical,
            GoalName::NeedRest => Priority::High,
            GoalName::Idle => Priority::Low,
            _ => Priority::Normal,
        }
    }

    /// Rest goals let energy recover and are completed once it has.
    pub fn is_rest(&self) -> bool {
        matches!(self, GoalName::CriticalSleep | GoalName::NeedRest)
    }

    /// First catalog name mentioned in free text such as a collaborator reply.
    pub fn find_in(text: &str) -> Option<Self> {
        let upper = text.to_uppercase().replace([' ', '-'], "_");
        Self::all()
            .into_iter()
            .filter_map(|g| upper.find(g.as_str()).map(|at| (at, g)))
            .min_by_key(|(at, _)| *at)
            .map(|(_, g)| g)
    }
}

impl fmt::Display for GoalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GoalName {
    type Err = ValidationError;

    /// Accepts catalog names in any case, with spaces or hyphens for underscores.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '.')
            .to_uppercase()
            .replace([' ', '-'], "_");
        Self::all()
            .into_iter()
            .find(|g| g.as_str() == key)
            .ok_or_else(|| ValidationError::UnknownGoal(s.trim().to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Normal,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub name: GoalName,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    /// Last time the goal was pushed, resumed or worked on.
    pub last_active_at: DateTime<Utc>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    /// Set by `interrupt`; the goal stays on the stack.
    #[serde(default)]
    pub interrupted_at: Option<DateTime<Utc>>,
    /// Set when a restart finds the goal older than the resume window.
    #[serde(skip)]
    pub stale: bool,
}

impl Goal {
    pub fn new(name: GoalName, now: DateTime<Utc>) -> Self {
        Self::with_priority(name, name.default_priority(), now)
    }

    pub fn with_priority(name: GoalName, priority: Priority, now: DateTime<Utc>) -> Self {
        Self {
            name,
            priority,
            created_at: now,
            last_active_at: now,
            completed: false,
            completed_at: None,
            interrupted_at: None,
            stale: false,
        }
    }

    /// Not completed, not interrupted and not stale.
    pub fn is_current(&self) -> bool {
        !self.completed && self.interrupted_at.is_none() && !self.stale
    }
}

/// What `resume_or_default` found on the stack top.
#[derive(Debug, Clone, PartialEq)]
pub enum ResumeDecision {
    Empty,
    /// Inside the resume window; kept active.
    Resumed(Goal),
    /// Outside the window; flagged stale for the caller to re-evaluate.
    Stale(Goal),
}

/// `goal_stack.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalStack {
    active_stack: Vec<Goal>,
    completed_history: VecDeque<Goal>,
    #[serde(skip, default = "default_history_cap")]
    history_cap: usize,
}

fn default_history_cap() -> usize {
    DEFAULT_HISTORY_CAP
}

impl Default for GoalStack {
    fn default() -> Self {
        Self::with_history_cap(DEFAULT_HISTORY_CAP)
    }
}

impl StoreDocument for GoalStack {
    const FILE_NAME: &'static str = "goal_stack.json";
    const STORE: &'static str = "goal_stack";

    fn validate(&self) -> Result<(), String> {
        if let Some(g) = self.active_stack.iter().find(|g| g.completed) {
            return Err(format!("completed goal {} on the active stack", g.name));
        }
        if let Some(g) = self.completed_history.iter().find(|g| !g.completed) {
            return Err(format!("uncompleted goal {} in history", g.name));
        }
        Ok(())
    }
}

impl GoalStack {
    pub fn with_history_cap(cap: usize) -> Self {
        Self {
            active_stack: Vec::new(),
            completed_history: VecDeque::new(),
            history_cap: cap,
        }
    }

    /// Applies a history cap to a loaded stack, evicting the oldest entries over it.
    pub fn set_history_cap(&mut self, cap: usize) {
        self.history_cap = cap;
        while self.completed_history.len() > cap {
            self.completed_history.pop_front();
        }
    }

    /// Pushes `goal` as the new active goal. Equal priorities are not reordered.
    /// Past [`MAX_ACTIVE_DEPTH`] the oldest goal below the top is completed.
    pub fn push(&mut self, mut goal: Goal) -> Result<(), ValidationError> {
        if goal.completed {
            return Err(ValidationError::CompletedGoal(goal.name.to_string()));
        }
        goal.stale = false;
        let now = goal.last_active_at;
        tracing::info!(
            target: "continuity::goals",
            goal = %goal.name,
            priority = ?goal.priority,
            depth = self.active_stack.len() + 1,
            "Goal pushed"
        );
        self.active_stack.push(goal);
        self.retire_overflow(now);
        Ok(())
    }

    /// Completes goals below the top until the stack fits [`MAX_ACTIVE_DEPTH`],
    /// oldest interrupted or stale goals first.
    fn retire_overflow(&mut self, now: DateTime<Utc>) {
        while self.active_stack.len() > MAX_ACTIVE_DEPTH {
            let below_top = &self.active_stack[..self.active_stack.len() - 1];
            let index = below_top.iter().position(|g| !g.is_current()).unwrap_or(0);
            let goal = self.active_stack.remove(index);
            tracing::info!(target: "continuity::goals", goal = %goal.name, "Superseded goal retired");
            self.archive(goal, now);
        }
    }

    fn archive(&mut self, mut goal: Goal, now: DateTime<Utc>) -> Goal {
        goal.completed = true;
        goal.completed_at = Some(now);
        goal.stale = false;
        self.completed_history.push_back(goal.clone());
        while self.completed_history.len() > self.history_cap {
            self.completed_history.pop_front();
        }
        goal
    }

    /// Pushes a fresh goal with the catalog's default priority.
    pub fn push_new(&mut self, name: GoalName, clock: &dyn Clock) -> Result<(), ValidationError> {
        self.push(Goal::new(name, clock.now()))
    }

    /// Removes and completes the active goal.
    pub fn pop(&mut self, clock: &dyn Clock) -> Option<Goal> {
        let goal = self.active_stack.pop()?;
        let now = clock.now();
        let goal = self.archive(goal, now);
        tracing::info!(
            target: "continuity::goals",
            goal = %goal.name,
            active_secs = (now - goal.created_at).num_seconds(),
            "Goal completed"
        );
        Some(goal)
    }

    /// Marks the active goal non-current without removing or completing it.
    pub fn interrupt(&mut self, clock: &dyn Clock) -> Option<&Goal> {
        let goal = self.active_stack.last_mut()?;
        goal.interrupted_at = Some(clock.now());
        tracing::info!(target: "continuity::goals", goal = %goal.name, "Goal interrupted");
        Some(goal)
    }

    /// Makes the top goal current again.
    pub fn resume(&mut self, clock: &dyn Clock) -> Option<&Goal> {
        let goal = self.active_stack.last_mut()?;
        goal.interrupted_at = None;
        goal.stale = false;
        goal.last_active_at = clock.now();
        Some(goal)
    }

    /// Records activity on the top goal so it survives the next restart check.
    pub fn touch(&mut self, clock: &dyn Clock) {
        if let Some(goal) = self.active_stack.last_mut() {
            goal.last_active_at = clock.now();
            goal.stale = false;
        }
    }

    pub fn active_goal(&self) -> Option<&Goal> {
        self.active_stack.last()
    }

    /// Active stack, bottom to top.
    pub fn hierarchy(&self) -> &[Goal] {
        &self.active_stack
    }

    pub fn completed_history(&self) -> &VecDeque<Goal> {
        &self.completed_history
    }

    pub fn is_stale(&self) -> bool {
        self.active_goal().map(|g| g.stale).unwrap_or(false)
    }

    /// How long `goal` has been pursued; `None` once completed.
    pub fn duration_active(&self, goal: &Goal, now: DateTime<Utc>) -> Option<Duration> {
        if goal.completed {
            None
        } else {
            Some(now - goal.created_at)
        }
    }

    /// Decides after a restart whether the top goal is still current.
    pub fn resume_or_default(&mut self, resume_window: Duration, now: DateTime<Utc>) -> ResumeDecision {
        let Some(goal) = self.active_stack.last_mut() else {
            return ResumeDecision::Empty;
        };
        let idle = now - goal.last_active_at;
        goal.stale = idle >= resume_window;
        if goal.stale {
            tracing::info!(
                target: "continuity::goals",
                goal = %goal.name,
                idle_secs = idle.num_seconds(),
                "Goal outside resume window, flagged stale"
            );
            ResumeDecision::Stale(goal.clone())
        } else {
            tracing::info!(target: "continuity::goals", goal = %goal.name, "Goal resumed");
            ResumeDecision::Resumed(goal.clone())
        }
    }
}

/// Goal forced by low energy, if any.
pub fn evaluate_reflex(mood: &Mood) -> Option<GoalName> {
    if mood.energy < CRITICAL_ENERGY {
        Some(GoalName::CriticalSleep)
    } else if mood.energy < LOW_ENERGY {
        Some(GoalName::NeedRest)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::{load_document, save_document, LoadOutcome, MemoryStorage, StorageBackend};
    use chrono::TimeZone;

    fn clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 10, 8, 0, 0).unwrap())
    }

    #[test]
    fn push_push_pop_leaves_first_goal_active() {
        let clock = clock();
        let mut stack = GoalStack::default();
        stack.push_new(GoalName::SeekAttention, &clock).unwrap();
        clock.advance(Duration::seconds(30));
        stack.push_new(GoalName::ExpressJoy, &clock).unwrap();
        clock.advance(Duration::seconds(30));

        let done = stack.pop(&clock).unwrap();
        assert_eq!(done.name, GoalName::ExpressJoy);
        assert_eq!(stack.active_goal().unwrap().name, GoalName::SeekAttention);

        let history: Vec<_> = stack.completed_history().iter().collect();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].name, GoalName::ExpressJoy);
        assert!(history[0].completed);
        assert_eq!(history[0].completed_at, Some(clock.now()));
    }

    #[test]
    fn pop_on_empty_stack_is_none() {
        let clock = clock();
        let mut stack = GoalStack::default();
        assert!(stack.pop(&clock).is_none());
        assert!(stack.completed_history().is_empty());
    }

    #[test]
    fn history_evicts_oldest_past_cap() {
        let clock = clock();
        let mut stack = GoalStack::default();
        for i in 0..25 {
            let name = GoalName::all()[i % 7];
            stack.push_new(name, &clock).unwrap();
            clock.advance(Duration::seconds(1));
            stack.pop(&clock).unwrap();
        }
        assert_eq!(stack.completed_history().len(), DEFAULT_HISTORY_CAP);
        // goal #5 is the oldest survivor
        assert_eq!(stack.completed_history()[0].name, GoalName::all()[5 % 7]);
    }

    #[test]
    fn equal_priority_keeps_request_order() {
        let clock = clock();
        let mut stack = GoalStack::default();
        stack.push_new(GoalName::Complain, &clock).unwrap();
        stack.push_new(GoalName::ReflectOnLife, &clock).unwrap();
        let names: Vec<_> = stack.hierarchy().iter().map(|g| g.name).collect();
        assert_eq!(names, vec![GoalName::Complain, GoalName::ReflectOnLife]);
        assert_eq!(stack.active_goal().unwrap().name, GoalName::ReflectOnLife);
    }

    #[test]
    fn deep_stack_retires_oldest_interrupted_goal() {
        let clock = clock();
        let mut stack = GoalStack::default();
        stack.push_new(GoalName::Idle, &clock).unwrap();
        stack.push_new(GoalName::Complain, &clock).unwrap();
        stack.interrupt(&clock);
        for _ in 0..MAX_ACTIVE_DEPTH - 1 {
            clock.advance(Duration::minutes(1));
            stack.push_new(GoalName::ReflectOnLife, &clock).unwrap();
        }

        assert_eq!(stack.hierarchy().len(), MAX_ACTIVE_DEPTH);
        assert_eq!(stack.hierarchy()[0].name, GoalName::Idle);
        assert!(stack.hierarchy().iter().all(|g| g.name != GoalName::Complain));
        let retired = stack.completed_history().back().unwrap();
        assert_eq!(retired.name, GoalName::Complain);
        assert_eq!(retired.completed_at, Some(clock.now()));

        clock.advance(Duration::minutes(1));
        stack.push_new(GoalName::ExpressJoy, &clock).unwrap();
        assert_eq!(stack.hierarchy().len(), MAX_ACTIVE_DEPTH);
        assert_eq!(stack.completed_history().back().unwrap().name, GoalName::Idle);
        assert_eq!(stack.active_goal().unwrap().name, GoalName::ExpressJoy);
    }

    #[test]
    fn interrupt_keeps_goal_on_stack() {
        let clock = clock();
        let mut stack = GoalStack::default();
        stack.push_new(GoalName::ReflectOnLife, &clock).unwrap();
        stack.interrupt(&clock).unwrap();

        let top = stack.active_goal().unwrap();
        assert_eq!(stack.hierarchy().len(), 1);
        assert!(!top.completed);
        assert!(!top.is_current());

        clock.advance(Duration::minutes(2));
        stack.resume(&clock).unwrap();
        let top = stack.active_goal().unwrap();
        assert!(top.is_current());
        assert_eq!(top.last_active_at, clock.now());
    }

    #[test]
    fn completed_goal_cannot_be_pushed_back() {
        let clock = clock();
        let mut stack = GoalStack::default();
        stack.push_new(GoalName::Idle, &clock).unwrap();
        let done = stack.pop(&clock).unwrap();
        assert_eq!(
            stack.push(done),
            Err(ValidationError::CompletedGoal("IDLE".into()))
        );
        assert!(stack.hierarchy().is_empty());
    }

    #[test]
    fn duration_active_only_while_open() {
        let clock = clock();
        let mut stack = GoalStack::default();
        stack.push_new(GoalName::SeekAttention, &clock).unwrap();
        clock.advance(Duration::minutes(3));
        let goal = stack.active_goal().unwrap().clone();
        assert_eq!(stack.duration_active(&goal, clock.now()), Some(Duration::minutes(3)));
        let done = stack.pop(&clock).unwrap();
        assert_eq!(stack.duration_active(&done, clock.now()), None);
    }

    #[test]
    fn resume_window_is_judged_from_persisted_timestamps() {
        let clock = clock();
        let backend = MemoryStorage::new();
        let mut stack = GoalStack::default();
        stack.push_new(GoalName::ReflectOnLife, &clock).unwrap();
        save_document(&backend, &stack).unwrap();

        // restart five minutes later
        clock.advance(Duration::minutes(5));

        let (mut reloaded, outcome) = load_document::<GoalStack>(&backend);
        assert!(matches!(outcome, LoadOutcome::Restored));
        let decision = reloaded.resume_or_default(Duration::minutes(10), clock.now());
        assert!(matches!(decision, ResumeDecision::Resumed(ref g) if g.name == GoalName::ReflectOnLife));
        assert!(!reloaded.active_goal().unwrap().stale);
        assert_eq!(reloaded.active_goal(), stack.active_goal());

        let (mut reloaded, _) = load_document::<GoalStack>(&backend);
        let decision = reloaded.resume_or_default(Duration::minutes(1), clock.now());
        assert!(matches!(decision, ResumeDecision::Stale(_)));
        assert!(reloaded.active_goal().unwrap().stale);
        assert!(reloaded.is_stale());
    }

    #[test]
    fn save_load_save_is_idempotent() {
        let clock = clock();
        let backend = MemoryStorage::new();
        let mut stack = GoalStack::default();
        stack.push_new(GoalName::NeedRest, &clock).unwrap();
        stack.push_new(GoalName::Complain, &clock).unwrap();
        stack.pop(&clock).unwrap();
        stack.interrupt(&clock).unwrap();
        save_document(&backend, &stack).unwrap();
        let first = backend.read("goal_stack.json").unwrap().unwrap();

        let (loaded, _) = load_document::<GoalStack>(&backend);
        assert_eq!(loaded, stack);
        save_document(&backend, &loaded).unwrap();
        assert_eq!(backend.read("goal_stack.json").unwrap().unwrap(), first);
    }

    #[test]
    fn completed_goal_on_active_stack_is_rejected_at_load() {
        let backend = MemoryStorage::new();
        backend.put_raw(
            "goal_stack.json",
            r#"{"active_stack":[{"name":"IDLE","priority":"low","created_at":"2024-01-01T00:00:00Z","last_active_at":"2024-01-01T00:00:00Z","completed":true,"completed_at":"2024-01-01T00:01:00Z"}],"completed_history":[]}"#,
        );
        let (stack, outcome) = load_document::<GoalStack>(&backend);
        assert!(stack.hierarchy().is_empty());
        assert!(matches!(outcome, LoadOutcome::Recovered(_)));

        backend.put_raw("goal_stack.json", r#"{"active_stack":[{"name":"DANCE"}],"completed_history":[]}"#);
        let (_, outcome) = load_document::<GoalStack>(&backend);
        assert!(matches!(outcome, LoadOutcome::Recovered(_)));
    }

    #[test]
    fn goal_names_parse_at_the_boundary() {
        assert_eq!("need_rest".parse::<GoalName>(), Ok(GoalName::NeedRest));
        assert_eq!(" Express Joy. ".parse::<GoalName>(), Ok(GoalName::ExpressJoy));
        assert_eq!("reflect-on-life".parse::<GoalName>(), Ok(GoalName::ReflectOnLife));
        assert_eq!(
            "DANCE".parse::<GoalName>(),
            Err(ValidationError::UnknownGoal("DANCE".into()))
        );
        assert_eq!(
            GoalName::find_in("I think SEEK_ATTENTION fits, or maybe IDLE"),
            Some(GoalName::SeekAttention)
        );
        assert_eq!(GoalName::find_in("nothing relevant"), None);
    }

    #[test]
    fn reflex_follows_energy_thresholds() {
        assert_eq!(evaluate_reflex(&Mood::new(10.0, 50.0)), Some(GoalName::CriticalSleep));
        assert_eq!(evaluate_reflex(&Mood::new(20.0, 50.0)), Some(GoalName::NeedRest));
        assert_eq!(evaluate_reflex(&Mood::new(60.0, 50.0)), None);
    }
}
