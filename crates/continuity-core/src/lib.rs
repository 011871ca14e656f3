//! continuity-core: persistent continuity engine (facts, episodes, goal stack,
//! identity narrative) and the controller that carries them across restarts.
//!
//! Text generation, similarity search, contradiction judging and confidence
//! scoring are collaborators behind traits; concrete adapters live in
//! continuity-skills.

mod clock;
mod collaborators;
mod episodes;
mod error;
mod goals;
mod identity;
mod knowledge;
mod orchestrator;
mod shared;
mod storage;

pub mod testing;

// Shared
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CollaboratorError, ContinuityError, PersistenceError, Result, ValidationError};
pub use shared::{ContinuityConfig, Mood, MoodLabel, MAX_LEVEL};

// Persistence
pub use storage::{
    load_document, save_document, FileStorage, LoadOutcome, MemoryStorage, StorageBackend,
    StoreDocument,
};

// Knowledge
pub use knowledge::text::{
    content_terms, is_negated, normalize_exact, opposing_stance, overlap_ratio, polarity_of, term_set,
    top_terms, Polarity,
};
pub use knowledge::{
    AddOutcome, AddReason, AgeBucket, DedupScope, Fact, FactPolicy, FactSource, FactStore, Neighbor,
    StateCheckpoint,
};

// Episodes, goals, identity
pub use episodes::{Contradiction, Episode, EpisodeLog, FactAttribution, NewEpisode};
pub use goals::{
    evaluate_reflex, Goal, GoalName, GoalStack, Priority, ResumeDecision, DEFAULT_HISTORY_CAP,
    MAX_ACTIVE_DEPTH,
};
pub use identity::{IdentityModel, IdentityNarrative, DEFAULT_THEME_COUNT};

// Collaborators and controller
pub use collaborators::{
    bounded, Collaborators, ContradictionJudge, Generator, SimilarityIndex, StabilityCheck,
};
pub use orchestrator::{
    run_control_loop, CandidateFact, ContinuityContext, ContinuityController, ControlLoopHandle,
    GoalEvaluation, InteractionReport, Interaction, IntrospectionOutcome, StartupReport,
    StatusReport,
};
