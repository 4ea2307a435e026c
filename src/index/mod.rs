
use tracing::debug;

use crate::{ChatError, Result};

/// One search hit: the slot of the matched vector and its squared
/// Euclidean distance from the query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub slot: usize,
    pub distance: f32,
}

/// Exact nearest-neighbor index over fixed-dimension vectors, stored as
/// one contiguous buffer.
///
/// The collection is only ever replaced wholesale: `rebuild` repopulates
/// the index in a single O(n * d) pass whenever the source vectors
/// change. At the intended scale of one conversation per index this
/// stays cheap, and it keeps slot numbering dense and stable.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl VectorIndex {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of vectors currently held.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len().checked_div(self.dimension).unwrap_or(0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Replaces the entire collection with `vectors`, assigning slots in
    /// order. Every vector must match the index dimension.
    #[inline]
    pub fn rebuild(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        for (slot, vector) in vectors.iter().enumerate() {
            if vector.len() != self.dimension {
                return Err(ChatError::Index(format!(
                    "vector {} has dimension {}, index expects {}",
                    slot,
                    vector.len(),
                    self.dimension
                )));
            }
        }

        self.data.clear();
        self.data.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }

        debug!("Rebuilt vector index with {} vectors", vectors.len());
        Ok(())
    }

    /// Returns the `min(k, len)` nearest vectors to `query`, ascending
    /// by squared Euclidean distance. Ties are broken by slot order so
    /// results are deterministic. An empty index yields an empty result,
    /// never an error.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }

        if query.len() != self.dimension {
            return Err(ChatError::Index(format!(
                "query has dimension {}, index expects {}",
                query.len(),
                self.dimension
            )));
        }

        let mut hits: Vec<SearchHit> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(slot, vector)| SearchHit {
                slot,
                distance: squared_distance(query, vector),
            })
            .collect();

        hits.sort_unstable_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.slot.cmp(&b.slot))
        });
        hits.truncate(k);

        Ok(hits)
    }
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).fold(0.0, |acc, (x, y)| {
        let diff = x - y;
        diff.mul_add(diff, acc)
    })
}
