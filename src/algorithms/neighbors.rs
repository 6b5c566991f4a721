use crate::error::{EngineError, Result};
use crate::utils;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Exhaustive cosine nearest-neighbor index over one factor matrix. Built in
/// lockstep with every retrain and tagged with the embedding's version; the
/// artifact set refuses to serve an index whose version drifts from the model
/// it was built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborIndex {
    pub version: u64,
    pub k: usize,
    ids: Vec<i64>,
    index: HashMap<i64, usize>,
    vectors: Vec<Vec<f32>>,
}

impl NeighborIndex {
    pub fn build(version: u64, ids: &[i64], vectors: &[Vec<f32>], k: usize) -> Self {
        debug_assert_eq!(ids.len(), vectors.len());
        let index = ids
            .iter()
            .enumerate()
            .map(|(row, &id)| (id, row))
            .collect();

        Self {
            version,
            k,
            ids: ids.to_vec(),
            index,
            vectors: vectors.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.index.contains_key(&id)
    }

    /// The up-to-k nearest rows to `id` by cosine similarity, descending,
    /// self excluded, mapped back to raw ids.
    pub fn neighbors_of(&self, id: i64) -> Result<Vec<(i64, f32)>> {
        let row = *self
            .index
            .get(&id)
            .ok_or(EngineError::NotFound { entity: "row", id })?;
        let query = &self.vectors[row];

        let scored: Vec<(i64, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .filter(|(other, _)| *other != row)
            .map(|(other, vector)| (self.ids[other], utils::cosine_similarity(query, vector)))
            .collect();

        Ok(utils::sort_ranked_desc(scored, self.k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> NeighborIndex {
        let ids = vec![1, 2, 3, 4];
        let vectors = vec![
            vec![1.0, 0.0],
            vec![0.9, 0.1],
            vec![0.0, 1.0],
            vec![-1.0, 0.0],
        ];
        NeighborIndex::build(7, &ids, &vectors, 20)
    }

    #[test]
    fn test_neighbors_ordered_descending_without_self() {
        let neighbors = index().neighbors_of(1).unwrap();

        assert_eq!(neighbors.len(), 3);
        assert!(neighbors.iter().all(|(id, _)| *id != 1));
        assert_eq!(neighbors[0].0, 2);
        for pair in neighbors.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
    }

    #[test]
    fn test_similarities_within_cosine_bounds() {
        for (_, similarity) in index().neighbors_of(2).unwrap() {
            assert!((-1.0..=1.0).contains(&similarity));
        }
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        assert!(index().neighbors_of(99).is_err());
    }

    #[test]
    fn test_k_truncates() {
        let ids: Vec<i64> = (1..=30).collect();
        let vectors: Vec<Vec<f32>> = (0..30).map(|i| vec![1.0, i as f32 / 30.0]).collect();
        let index = NeighborIndex::build(1, &ids, &vectors, 20);

        assert_eq!(index.neighbors_of(1).unwrap().len(), 20);
    }
}
