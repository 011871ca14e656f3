use super::*;
use crate::clock::ManualClock;
use crate::error::ContinuityError;
use crate::knowledge::{AddReason, Neighbor};
use crate::storage::{MemoryStorage, StoreDocument};
use crate::testing::{FixedConfidence, FixedJudge, Scripted, ScriptedGenerator, StaticIndex};
use chrono::{Duration, TimeZone, Utc};

struct Harness {
    clock: Arc<ManualClock>,
    storage: Arc<MemoryStorage>,
    config: ContinuityConfig,
}

impl Harness {
    fn new() -> Self {
        Self {
            clock: Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 9, 1, 8, 0, 0).unwrap())),
            storage: Arc::new(MemoryStorage::new()),
            config: ContinuityConfig {
                app_name: "Pip".to_string(),
                ..ContinuityConfig::default()
            },
        }
    }

    fn open(&self, collaborators: Collaborators) -> (ContinuityController, StartupReport) {
        let ctx = ContinuityContext::new(self.config.clone(), self.clock.clone(), self.storage.clone());
        ContinuityController::open(ctx, collaborators)
    }

    fn raw(&self, name: &str) -> Vec<u8> {
        self.storage.read(name).unwrap().unwrap_or_default()
    }
}

fn replying(replies: &[&str]) -> Collaborators {
    Collaborators::new(Arc::new(ScriptedGenerator::replying(replies)))
}

fn pizza(text: &str) -> Interaction {
    Interaction::new("let me tell you about food", "noted").with_fact(text, FactSource::User)
}

#[tokio::test]
async fn interaction_updates_every_store_and_survives_restart() {
    let h = Harness::new();
    let (c, report) = h.open(replying(&[]));
    assert!(report.warnings.is_empty());
    assert_eq!(report.resume, ResumeDecision::Empty);

    c.push_goal(GoalName::ReflectOnLife).await.unwrap();
    let r = c
        .process_interaction(
            Interaction::new("I love pizza", "Noted!")
                .with_fact("User likes pizza", FactSource::User)
                .with_fact("Pizza is my favorite food", FactSource::User),
        )
        .await
        .unwrap();
    assert_eq!(r.episode_id, 0);
    assert!(r.facts[0].1.accepted);
    assert!(matches!(r.facts[1].1.reason, AddReason::SemanticDuplicate { .. }));
    assert_eq!(r.mood.energy, 98.0);
    assert_eq!(r.active_goal, Some(GoalName::ReflectOnLife));

    h.clock.advance(Duration::seconds(20));
    let r = c.process_interaction(pizza("User hates pizza")).await.unwrap();
    assert_eq!(r.episode_id, 1);
    assert!(r.facts[0].1.accepted);

    let episodes = c.episodes().await;
    assert_eq!(episodes[0].state_before.energy, 100.0);
    assert_eq!(episodes[0].state_after.energy, 98.0);
    assert_eq!(episodes[0].facts_extracted, vec!["User likes pizza".to_string()]);
    assert_eq!(episodes[0].goals_active, vec![GoalName::ReflectOnLife]);
    assert_eq!(c.facts().await.len(), 2);

    let (facts, goals, mood) = (c.facts().await, c.goal_hierarchy().await, c.mood().await);
    drop(c);

    h.clock.advance(Duration::minutes(2));
    let (c, report) = h.open(replying(&[]));
    assert!(report.warnings.is_empty());
    assert!(matches!(report.resume, ResumeDecision::Resumed(ref g) if g.name == GoalName::ReflectOnLife));
    assert_eq!(c.facts().await, facts);
    assert_eq!(c.episodes().await, episodes);
    assert_eq!(c.goal_hierarchy().await, goals);
    assert_eq!(c.mood().await, mood);
}

#[tokio::test]
async fn similarity_outage_falls_back_to_exact_match() {
    let h = Harness::new();
    let collaborators = replying(&[]).with_similarity(Arc::new(StaticIndex::unavailable()));
    let (c, _) = h.open(collaborators);

    let r = c.process_interaction(pizza("User likes pizza")).await.unwrap();
    assert!(r.facts[0].1.accepted);
    // one failed query, one failed index call
    assert_eq!(r.degraded.len(), 2);

    let r = c.process_interaction(pizza("Pizza is my favorite food")).await.unwrap();
    assert!(r.facts[0].1.accepted);

    let r = c.process_interaction(pizza("user likes PIZZA")).await.unwrap();
    assert!(matches!(r.facts[0].1.reason, AddReason::ExactDuplicate { .. }));
    assert_eq!(c.facts().await.len(), 2);
    assert_eq!(c.episodes().await.len(), 3);
}

#[tokio::test]
async fn neighbors_dedup_and_accepted_facts_are_indexed() {
    let h = Harness::new();
    let index = Arc::new(StaticIndex::new(vec![Neighbor {
        text: "The user loves pizza".into(),
        score: 0.93,
    }]));
    let (c, _) = h.open(replying(&[]).with_similarity(index.clone()));

    let r = c.process_interaction(pizza("User likes pizza")).await.unwrap();
    assert!(!r.facts[0].1.accepted);
    let r = c.process_interaction(pizza("User owns a red bicycle")).await.unwrap();
    assert!(r.facts[0].1.accepted);
    assert!(r.degraded.is_empty());
    assert_eq!(index.indexed(), vec!["User owns a red bicycle".to_string()]);
}

#[tokio::test]
async fn failed_save_leaves_interaction_unrecorded() {
    let h = Harness::new();
    let (c, _) = h.open(replying(&[]));

    h.storage.set_fail_writes(true);
    let err = c.process_interaction(pizza("User likes pizza")).await.unwrap_err();
    assert!(matches!(err, ContinuityError::Persistence(_)));
    assert!(c.facts().await.is_empty());
    assert!(c.episodes().await.is_empty());
    assert_eq!(c.mood().await, Mood::default());

    h.storage.set_fail_writes(false);
    let r = c.process_interaction(pizza("User likes pizza")).await.unwrap();
    assert_eq!(r.episode_id, 0);
}

#[tokio::test]
async fn later_save_failure_rolls_back_earlier_files() {
    let h = Harness::new();
    let (c, _) = h.open(replying(&[]));
    c.process_interaction(pizza("User likes pizza")).await.unwrap();
    let checkpoint = h.raw(StateCheckpoint::FILE_NAME);
    let log = h.raw(EpisodeLog::FILE_NAME);

    h.storage.set_fail_on(Some(GoalStack::FILE_NAME));
    let err = c.process_interaction(pizza("User plays chess")).await.unwrap_err();
    assert!(matches!(err, ContinuityError::Persistence(_)));
    assert_eq!(h.raw(StateCheckpoint::FILE_NAME), checkpoint);
    assert_eq!(h.raw(EpisodeLog::FILE_NAME), log);

    h.storage.set_fail_on(Some(EpisodeLog::FILE_NAME));
    assert!(c.process_interaction(pizza("User plays chess")).await.is_err());
    assert_eq!(h.raw(StateCheckpoint::FILE_NAME), checkpoint);
    assert_eq!(c.facts().await.len(), 1);
    assert_eq!(c.episodes().await.len(), 1);

    h.storage.set_fail_on(None);
    let r = c.process_interaction(pizza("User plays chess")).await.unwrap();
    assert_eq!(r.episode_id, 1);
}

#[tokio::test]
async fn corrupt_store_does_not_block_the_others() {
    let h = Harness::new();
    let (c, _) = h.open(replying(&[]));
    c.push_goal(GoalName::Complain).await.unwrap();
    c.process_interaction(pizza("User likes pizza")).await.unwrap();
    drop(c);

    h.storage.put_raw(GoalStack::FILE_NAME, "{\"active_stack\": [tru");
    let (c, report) = h.open(replying(&[]));
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("goal_stack"));
    assert_eq!(report.resume, ResumeDecision::Empty);
    assert!(c.goal_hierarchy().await.is_empty());
    assert_eq!(c.facts().await.len(), 1);
    assert_eq!(c.episodes().await.len(), 1);
}

#[tokio::test]
async fn introspection_records_narratives_and_reports_drift() {
    let h = Harness::new();
    let generator = Arc::new(ScriptedGenerator::replying(&[
        "I am curious about music and gardens.",
        "I am curious about music and chess.",
    ]));
    let (c, _) = h.open(Collaborators::new(generator.clone()));
    c.process_interaction(pizza("User likes pizza")).await.unwrap();

    let first = c.introspect().await.unwrap();
    let IntrospectionOutcome::Captured { narrative, status, .. } = first else {
        panic!("expected a captured narrative");
    };
    assert_eq!(narrative.episode_count_at_capture, 1);
    assert_eq!(status.latest_drift, None);

    h.clock.advance(Duration::minutes(3));
    let second = c.introspect().await.unwrap();
    let IntrospectionOutcome::Captured { status, .. } = second else {
        panic!("expected a captured narrative");
    };
    let drift = status.latest_drift.unwrap();
    assert!(drift > 0.0 && drift < 1.0);
    assert_eq!(status.narrative_count, 2);
    assert_eq!(status.fact_count, 1);
    assert!(status.core_beliefs.contains("music"));

    let prompts = generator.prompts();
    assert!(prompts[0].starts_with("You are Pip."));
    assert!(prompts[0].contains("User likes pizza"));
    assert!(!h.raw(IdentityModel::FILE_NAME).is_empty());
}

#[tokio::test(start_paused = true)]
async fn introspection_skips_when_generator_times_out() {
    let mut h = Harness::new();
    h.config.collaborator_timeout_ms = 100;
    let generator = ScriptedGenerator::new(vec![
        Scripted::Hang(std::time::Duration::from_secs(60)),
        Scripted::Fail("model overloaded".into()),
        Scripted::Reply("Calm again, still me.".into()),
    ]);
    let (c, _) = h.open(Collaborators::new(Arc::new(generator)));

    let outcome = c.introspect().await.unwrap();
    assert!(matches!(
        outcome,
        IntrospectionOutcome::Skipped {
            reason: CollaboratorError::Timeout { .. }
        }
    ));
    let outcome = c.introspect().await.unwrap();
    assert!(matches!(
        outcome,
        IntrospectionOutcome::Skipped {
            reason: CollaboratorError::Failed { .. }
        }
    ));
    assert!(c.narratives().await.is_empty());

    // interactions are unaffected by the skipped cycles
    c.process_interaction(pizza("User likes pizza")).await.unwrap();
    assert!(matches!(c.introspect().await.unwrap(), IntrospectionOutcome::Captured { .. }));
    assert_eq!(c.narratives().await.len(), 1);
}

#[tokio::test]
async fn goal_evaluation_follows_energy() {
    let h = Harness::new();
    save_document(
        h.storage.as_ref(),
        &StateCheckpoint {
            facts: Vec::new(),
            energy: 10.0,
            happiness: 50.0,
        },
    )
    .unwrap();
    let (c, _) = h.open(replying(&["EXPRESS_JOY please"]));

    assert_eq!(c.evaluate_goals().await.unwrap(), GoalEvaluation::Reflex(GoalName::CriticalSleep));
    assert_eq!(c.evaluate_goals().await.unwrap(), GoalEvaluation::Kept(GoalName::CriticalSleep));

    for _ in 0..3 {
        c.metabolism_tick().await;
    }
    assert_eq!(c.mood().await.energy, 40.0);
    assert_eq!(c.evaluate_goals().await.unwrap(), GoalEvaluation::Recovered(GoalName::CriticalSleep));
    assert_eq!(c.completed_goals().await[0].name, GoalName::CriticalSleep);

    assert_eq!(c.evaluate_goals().await.unwrap(), GoalEvaluation::Chosen(GoalName::ExpressJoy));
    assert_eq!(c.evaluate_goals().await.unwrap(), GoalEvaluation::Kept(GoalName::ExpressJoy));

    c.metabolism_tick().await;
    assert_eq!(c.mood().await.energy, 39.5);
}

#[tokio::test]
async fn unparseable_goal_reply_falls_back_to_idle() {
    let h = Harness::new();
    let (c, _) = h.open(replying(&["dance wildly"]));
    assert_eq!(c.evaluate_goals().await.unwrap(), GoalEvaluation::Chosen(GoalName::Idle));
}

#[tokio::test]
async fn stale_goal_after_restart_is_reevaluated() {
    let h = Harness::new();
    let (c, _) = h.open(replying(&[]));
    c.push_goal(GoalName::ReflectOnLife).await.unwrap();
    drop(c);

    h.clock.advance(Duration::minutes(20));
    let (c, report) = h.open(replying(&["REFLECT_ON_LIFE"]));
    assert!(matches!(report.resume, ResumeDecision::Stale(_)));
    assert!(c.status().await.goal_stale);
    assert_eq!(c.evaluate_goals().await.unwrap(), GoalEvaluation::Resumed(GoalName::ReflectOnLife));
    assert!(!c.status().await.goal_stale);
    drop(c);

    h.clock.advance(Duration::minutes(20));
    let (c, _) = h.open(replying(&["COMPLAIN"]));
    assert_eq!(c.evaluate_goals().await.unwrap(), GoalEvaluation::Chosen(GoalName::Complain));
    let stack = c.goal_hierarchy().await;
    assert_eq!(stack.len(), 2);
    assert!(stack[0].interrupted_at.is_some());
    assert_eq!(stack[1].name, GoalName::Complain);
}

#[tokio::test]
async fn interrupted_goal_is_resumed_by_evaluation() {
    let h = Harness::new();
    let (c, _) = h.open(replying(&[]));
    c.push_goal(GoalName::SeekAttention).await.unwrap();
    assert_eq!(c.interrupt_goal().await.unwrap(), Some(GoalName::SeekAttention));
    assert_eq!(c.goal_hierarchy().await.len(), 1);
    assert_eq!(c.evaluate_goals().await.unwrap(), GoalEvaluation::Resumed(GoalName::SeekAttention));
    let done = c.complete_goal().await.unwrap().unwrap();
    assert!(done.completed);
    assert!(c.goal_hierarchy().await.is_empty());
}

#[tokio::test]
async fn contradictions_are_attributed_and_surface_in_introspection() {
    let h = Harness::new();
    let generator = Arc::new(ScriptedGenerator::replying(&["I keep changing my mind about food."]));
    let judge = Arc::new(FixedJudge(vec![(
        "User hates pizza".to_string(),
        "User likes pizza".to_string(),
    )]));
    let (c, _) = h.open(Collaborators::new(generator.clone()).with_judge(judge));

    c.process_interaction(pizza("User likes pizza")).await.unwrap();
    h.clock.advance(Duration::days(1));
    c.process_interaction(pizza("User hates pizza")).await.unwrap();

    let found = c.contradictions().await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].earlier.fact, "User likes pizza");
    assert_eq!(found[0].earlier.episode_id, 0);
    assert_eq!(found[0].later.episode_id, 1);

    let IntrospectionOutcome::Captured { contradictions, .. } = c.introspect().await.unwrap() else {
        panic!("expected a captured narrative");
    };
    assert_eq!(contradictions, found);
    assert!(generator.prompts()[0].contains("Unresolved: \"User likes pizza\" (episode 0)"));
}

#[tokio::test]
async fn confidence_and_goal_requests_are_recorded() {
    let h = Harness::new();
    let collaborators = replying(&[]).with_stability(Arc::new(FixedConfidence(1.7)));
    let (c, _) = h.open(collaborators);

    let r = c
        .process_interaction(Interaction::new("notice me", "ok").with_goal_request(GoalName::SeekAttention))
        .await
        .unwrap();
    assert_eq!(r.confidence, Some(1.0));
    assert_eq!(r.active_goal, Some(GoalName::SeekAttention));

    let episodes = c.episodes().await;
    assert_eq!(episodes[0].confidence, Some(1.0));
    // goals are captured before the goal update
    assert!(episodes[0].goals_active.is_empty());
}

#[tokio::test]
async fn save_all_then_reload_is_byte_identical() {
    let h = Harness::new();
    let (c, _) = h.open(replying(&["I am patient and fond of puzzles."]));
    c.push_goal(GoalName::ReflectOnLife).await.unwrap();
    c.process_interaction(pizza("User solves puzzles daily").with_reflection("that was fun"))
        .await
        .unwrap();
    c.introspect().await.unwrap();
    c.save_all().await.unwrap();

    let names = [
        StateCheckpoint::FILE_NAME,
        EpisodeLog::FILE_NAME,
        GoalStack::FILE_NAME,
        IdentityModel::FILE_NAME,
    ];
    let before: Vec<Vec<u8>> = names.iter().map(|n| h.raw(n)).collect();
    drop(c);

    let (c, report) = h.open(replying(&[]));
    assert!(report.warnings.is_empty());
    c.save_all().await.unwrap();
    let after: Vec<Vec<u8>> = names.iter().map(|n| h.raw(n)).collect();
    assert_eq!(before, after);
}
