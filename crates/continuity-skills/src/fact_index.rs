//! Sled-backed similarity index over fact texts.
//!
//! Keys are UUID v4 strings, values the UTF-8 fact text. Queries score every
//! indexed text by term overlap; the index stays small (one entry per fact).

use async_trait::async_trait;
use continuity_core::{normalize_exact, overlap_ratio, CollaboratorError, Neighbor, SimilarityIndex};
use std::cmp::Ordering;
use std::path::Path;
use uuid::Uuid;

const DEFAULT_PATH: &str = "./data/continuity_index";
const TREE_NAME: &str = "fact_index";
const COLLABORATOR: &str = "similarity_index";

pub struct SledFactIndex {
    _db: sled::Db,
    tree: sled::Tree,
}

fn unavailable(e: sled::Error) -> CollaboratorError {
    CollaboratorError::failed(COLLABORATOR, e.to_string())
}

impl SledFactIndex {
    pub fn new() -> Result<Self, sled::Error> {
        Self::open_path(DEFAULT_PATH)
    }

    /// Opens or creates the index DB at the given path.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, sled::Error> {
        let db = sled::open(path)?;
        let tree = db.open_tree(TREE_NAME)?;
        Ok(Self { _db: db, tree })
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Every indexed fact text, in key order.
    pub fn texts(&self) -> Result<Vec<String>, sled::Error> {
        Ok(self.entries()?.into_iter().map(|(_, t)| t).collect())
    }

    fn entries(&self) -> Result<Vec<(String, String)>, sled::Error> {
        self.tree
            .iter()
            .map(|kv| {
                kv.map(|(k, v)| {
                    (
                        String::from_utf8_lossy(&k).into_owned(),
                        String::from_utf8_lossy(&v).into_owned(),
                    )
                })
            })
            .collect()
    }
}

#[async_trait]
impl SimilarityIndex for SledFactIndex {
    /// Re-indexing an already indexed text returns its existing id.
    async fn index(&self, text: &str) -> Result<String, CollaboratorError> {
        let normalized = normalize_exact(text);
        if let Some((id, _)) = self
            .entries()
            .map_err(unavailable)?
            .into_iter()
            .find(|(_, t)| normalize_exact(t) == normalized)
        {
            return Ok(id);
        }

        let id = Uuid::new_v4().to_string();
        self.tree
            .insert(id.as_bytes(), text.as_bytes())
            .map_err(unavailable)?;
        self.tree.flush().map_err(unavailable)?;
        tracing::info!(
            target: "continuity::index",
            key = %id,
            bytes = text.len(),
            "Fact indexed"
        );
        Ok(id)
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<Neighbor>, CollaboratorError> {
        let mut scored: Vec<Neighbor> = self
            .entries()
            .map_err(unavailable)?
            .into_iter()
            .map(|(_, t)| Neighbor {
                score: overlap_ratio(text, &t) as f32,
                text: t,
            })
            .filter(|n| n.score > 0.0)
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.text.cmp(&b.text))
        });
        scored.truncate(k);
        Ok(scored)
    }
}
