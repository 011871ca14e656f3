//! Fact knowledge: the deduplicated fact set and the text normalization it shares
//! with narrative theme extraction.

mod facts;
pub mod text;

pub use facts::{
    AddOutcome, AddReason, AgeBucket, DedupScope, Fact, FactPolicy, FactSource, FactStore, Neighbor,
    StateCheckpoint,
};
