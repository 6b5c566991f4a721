pub mod boosting;
pub mod initializer;
pub mod neighbors;
pub mod scaler;

use crate::error::{EngineError, Result};
use crate::models::{RankedItem, RatingEvent};
use crate::utils;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorHyperParams {
    pub k: usize,
    pub lambda: f32,
}

/// Biased latent-factor model over the ratings matrix. Score for a pair is
/// `global_mean + user_bias + item_bias + a_u . b_i`. Rebuilt wholesale on
/// retrain; read-only at serve time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixFactorization {
    pub version: u64,
    pub k: usize,
    pub lambda: f32,
    pub global_mean: f32,
    pub user_ids: Vec<i64>,
    pub item_ids: Vec<i64>,
    pub user_index: HashMap<i64, usize>,
    pub item_index: HashMap<i64, usize>,
    pub user_factors: Vec<Vec<f32>>,
    pub item_factors: Vec<Vec<f32>>,
    pub user_bias: Vec<f32>,
    pub item_bias: Vec<f32>,
}

impl MatrixFactorization {
    /// Fit factors and biases with plain SGD over the event log. Row order and
    /// initialization are derived from sorted ids and the given seed, so the
    /// same inputs always produce the same model.
    pub fn train(
        events: &[RatingEvent],
        params: FactorHyperParams,
        epochs: usize,
        learning_rate: f32,
        seed: u64,
    ) -> Self {
        let mut user_ids: Vec<i64> = events.iter().map(|e| e.user_id).collect();
        user_ids.sort_unstable();
        user_ids.dedup();
        let mut item_ids: Vec<i64> = events.iter().map(|e| e.movie_id).collect();
        item_ids.sort_unstable();
        item_ids.dedup();

        let user_index: HashMap<i64, usize> = user_ids
            .iter()
            .enumerate()
            .map(|(row, &id)| (id, row))
            .collect();
        let item_index: HashMap<i64, usize> = item_ids
            .iter()
            .enumerate()
            .map(|(row, &id)| (id, row))
            .collect();

        let global_mean = if events.is_empty() {
            0.0
        } else {
            events.iter().map(|e| e.rating).sum::<f32>() / events.len() as f32
        };

        let mut init = initializer::FactorInitializer::new(seed, params.k);
        let mut user_factors: Vec<DVector<f32>> = init
            .factor_matrix(user_ids.len())
            .into_iter()
            .map(DVector::from_vec)
            .collect();
        let mut item_factors: Vec<DVector<f32>> = init
            .factor_matrix(item_ids.len())
            .into_iter()
            .map(DVector::from_vec)
            .collect();
        let mut user_bias = vec![0.0f32; user_ids.len()];
        let mut item_bias = vec![0.0f32; item_ids.len()];

        let lr = learning_rate;
        let lambda = params.lambda;

        for _ in 0..epochs {
            for event in events {
                let u = user_index[&event.user_id];
                let i = item_index[&event.movie_id];

                let prediction =
                    global_mean + user_bias[u] + item_bias[i] + user_factors[u].dot(&item_factors[i]);
                let error = event.rating - prediction;

                user_bias[u] += lr * (error - lambda * user_bias[u]);
                item_bias[i] += lr * (error - lambda * item_bias[i]);

                let user_gradient = &item_factors[i] * error - &user_factors[u] * lambda;
                let item_gradient = &user_factors[u] * error - &item_factors[i] * lambda;

                user_factors[u] += user_gradient * lr;
                item_factors[i] += item_gradient * lr;
            }
        }

        Self {
            version: 0,
            k: params.k,
            lambda,
            global_mean,
            user_ids,
            item_ids,
            user_index,
            item_index,
            user_factors: user_factors
                .into_iter()
                .map(|v| v.as_slice().to_vec())
                .collect(),
            item_factors: item_factors
                .into_iter()
                .map(|v| v.as_slice().to_vec())
                .collect(),
            user_bias,
            item_bias,
        }
    }

    fn score(&self, u: usize, i: usize) -> f32 {
        let dot: f32 = self.user_factors[u]
            .iter()
            .zip(self.item_factors[i].iter())
            .map(|(a, b)| a * b)
            .sum();
        self.global_mean + self.user_bias[u] + self.item_bias[i] + dot
    }

    pub fn user_row(&self, user_id: i64) -> Result<usize> {
        self.user_index
            .get(&user_id)
            .copied()
            .ok_or(EngineError::user_not_found(user_id))
    }

    pub fn item_row(&self, movie_id: i64) -> Result<usize> {
        self.item_index
            .get(&movie_id)
            .copied()
            .ok_or(EngineError::movie_not_found(movie_id))
    }

    pub fn predict(&self, user_id: i64, movie_id: i64) -> Result<f32> {
        let u = self.user_row(user_id)?;
        let i = self.item_row(movie_id)?;
        Ok(self.score(u, i))
    }

    pub fn top_n(
        &self,
        user_id: i64,
        exclude: &HashSet<i64>,
        n: usize,
    ) -> Result<Vec<RankedItem>> {
        let u = self.user_row(user_id)?;

        let scored: Vec<(i64, f32)> = self
            .item_ids
            .iter()
            .enumerate()
            .filter(|&(_, id)| !exclude.contains(id))
            .map(|(i, &id)| (id, self.score(u, i)))
            .collect();

        Ok(utils::sort_ranked_desc(scored, n)
            .into_iter()
            .map(|(movie_id, score)| RankedItem::new(movie_id, score))
            .collect())
    }

    /// Brute-force cosine scan over all user rows. Matches at or below the
    /// threshold are dropped; an empty result is a legitimate outcome.
    pub fn similar_users(&self, user_id: i64, threshold: f32) -> Result<Vec<(i64, f32)>> {
        let u = self.user_row(user_id)?;
        Ok(Self::scan_similar(
            &self.user_factors,
            &self.user_ids,
            u,
            threshold,
        ))
    }

    pub fn similar_movies(&self, movie_id: i64, threshold: f32) -> Result<Vec<(i64, f32)>> {
        let i = self.item_row(movie_id)?;
        Ok(Self::scan_similar(
            &self.item_factors,
            &self.item_ids,
            i,
            threshold,
        ))
    }

    fn scan_similar(
        factors: &[Vec<f32>],
        ids: &[i64],
        row: usize,
        threshold: f32,
    ) -> Vec<(i64, f32)> {
        let query = &factors[row];
        let matches: Vec<(i64, f32)> = factors
            .iter()
            .enumerate()
            .filter(|(other, _)| *other != row)
            .map(|(other, vector)| (ids[other], utils::cosine_similarity(query, vector)))
            .filter(|(_, similarity)| *similarity > threshold)
            .collect();

        utils::sort_ranked_desc(matches, ids.len())
    }

    /// In-sample mean squared reconstruction error over the training events.
    pub fn mse(&self, events: &[RatingEvent]) -> f32 {
        let mut total = 0.0f64;
        let mut count = 0usize;

        for event in events {
            if let (Some(&u), Some(&i)) = (
                self.user_index.get(&event.user_id),
                self.item_index.get(&event.movie_id),
            ) {
                let error = event.rating - self.score(u, i);
                total += (error * error) as f64;
                count += 1;
            }
        }

        if count > 0 {
            (total / count as f64) as f32
        } else {
            0.0
        }
    }
}
