//! Collaborator adapters plugged into the continuity controller.

mod confidence;
mod fact_index;
mod model_router;
mod polarity;

pub use confidence::FactCountConfidence;
pub use fact_index::SledFactIndex;
pub use model_router::{LlmMode, ModelRouter};
pub use polarity::PolarityJudge;
