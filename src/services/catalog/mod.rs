use crate::models::MovieEntry;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeSet, HashMap};
use tracing::info;

/// The sentinel the catalog uses for movies without genre labels. It is not
/// part of the vocabulary; such movies carry an all-zero vector.
const NO_GENRES: &str = "(no genres listed)";

/// Binary genre vectors over a fixed vocabulary, derived once from the static
/// item catalog and immutable for its lifetime.
pub struct GenreVectorSpace {
    genres: Vec<String>,
    ids: Vec<i64>,
    titles: HashMap<i64, String>,
    vectors: HashMap<i64, Vec<f32>>,
}

impl GenreVectorSpace {
    pub fn from_catalog(entries: &[MovieEntry]) -> Self {
        let mut vocabulary: BTreeSet<String> = BTreeSet::new();
        for entry in entries {
            for genre in entry.genres.split('|') {
                let genre = genre.trim();
                if !genre.is_empty() && genre != NO_GENRES {
                    vocabulary.insert(genre.to_string());
                }
            }
        }
        let genres: Vec<String> = vocabulary.into_iter().collect();
        let positions: HashMap<&str, usize> = genres
            .iter()
            .enumerate()
            .map(|(i, g)| (g.as_str(), i))
            .collect();

        let mut ids = Vec::with_capacity(entries.len());
        let mut titles = HashMap::with_capacity(entries.len());
        let mut vectors = HashMap::with_capacity(entries.len());
        for entry in entries {
            let mut vector = vec![0.0f32; genres.len()];
            for genre in entry.genres.split('|') {
                if let Some(&i) = positions.get(genre.trim()) {
                    vector[i] = 1.0;
                }
            }
            ids.push(entry.movie_id);
            titles.insert(entry.movie_id, entry.title.clone());
            vectors.insert(entry.movie_id, vector);
        }

        info!(
            "Built genre vector space: {} movies over {} genres",
            ids.len(),
            genres.len()
        );

        Self {
            genres,
            ids,
            titles,
            vectors,
        }
    }

    pub fn genres(&self) -> &[String] {
        &self.genres
    }

    pub fn dimension(&self) -> usize {
        self.genres.len()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn vector(&self, movie_id: i64) -> Option<&[f32]> {
        self.vectors.get(&movie_id).map(|v| v.as_slice())
    }

    pub fn title(&self, movie_id: i64) -> Option<&str> {
        self.titles.get(&movie_id).map(|t| t.as_str())
    }

    /// Catalog ids in randomized order, for tie-breaking diversity across
    /// repeated scans with the same input.
    pub fn shuffled_ids(&self, rng: &mut impl Rng) -> Vec<i64> {
        let mut ids = self.ids.clone();
        ids.shuffle(rng);
        ids
    }

    /// A random sample of up to `n` (id, vector) pairs.
    pub fn sample(&self, n: usize, rng: &mut impl Rng) -> Vec<(i64, &[f32])> {
        let mut ids = self.ids.clone();
        ids.shuffle(rng);
        ids.truncate(n);
        ids.into_iter()
            .map(|id| (id, self.vectors[&id].as_slice()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn entry(movie_id: i64, title: &str, genres: &str) -> MovieEntry {
        MovieEntry {
            movie_id,
            title: title.to_string(),
            genres: genres.to_string(),
        }
    }

    fn space() -> GenreVectorSpace {
        GenreVectorSpace::from_catalog(&[
            entry(1, "Heat (1995)", "Action|Crime|Thriller"),
            entry(2, "Sabrina (1995)", "Comedy|Romance"),
            entry(3, "Pulse (2001)", NO_GENRES),
        ])
    }

    #[test]
    fn test_vocabulary_excludes_sentinel() {
        let space = space();
        assert_eq!(
            space.genres(),
            &["Action", "Comedy", "Crime", "Romance", "Thriller"]
        );
    }

    #[test]
    fn test_binary_vectors() {
        let space = space();
        assert_eq!(space.vector(1).unwrap(), &[1.0, 0.0, 1.0, 0.0, 1.0]);
        assert_eq!(space.vector(2).unwrap(), &[0.0, 1.0, 0.0, 1.0, 0.0]);
        // Sentinel-only movies stay in the catalog with a zero vector.
        assert_eq!(space.vector(3).unwrap(), &[0.0; 5]);
        assert!(space.vector(99).is_none());
    }

    #[test]
    fn test_sample_bounds() {
        let space = space();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(space.sample(2, &mut rng).len(), 2);
        assert_eq!(space.sample(10, &mut rng).len(), 3);
    }
}
