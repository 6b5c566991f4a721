use chrono::{DateTime, Timelike, Utc};

pub mod validation;

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}

pub fn normalize_vector(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// Element-wise mean of `vectors`, each scaled by its weight first. Vectors
/// with a dimension different from the first entry are skipped.
pub fn weighted_mean(vectors: &[(Vec<f32>, f32)]) -> Vec<f32> {
    if vectors.is_empty() {
        return Vec::new();
    }

    let dim = vectors[0].0.len();
    let mut result = vec![0.0; dim];
    let mut count = 0usize;

    for (vector, weight) in vectors {
        if vector.len() != dim {
            continue;
        }
        for i in 0..dim {
            result[i] += vector[i] * weight;
        }
        count += 1;
    }

    if count > 0 {
        for x in result.iter_mut() {
            *x /= count as f32;
        }
    }

    result
}

/// Linear min-max rescale into [0, 1]. A constant input maps to all zeros.
pub fn min_max_normalize(values: &[f32]) -> Vec<f32> {
    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);

    if values.is_empty() || (max - min).abs() < f32::EPSILON {
        return vec![0.0; values.len()];
    }

    values.iter().map(|&v| (v - min) / (max - min)).collect()
}

pub fn top_k_indices(scores: &[f32], k: usize) -> Vec<usize> {
    let mut indexed_scores: Vec<(usize, f32)> = scores
        .iter()
        .enumerate()
        .map(|(i, &score)| (i, score))
        .collect();

    indexed_scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    indexed_scores.into_iter().take(k).map(|(i, _)| i).collect()
}

/// UTC hour-of-day of an epoch-second timestamp. The zone is fixed so the
/// derived profile feature is identical across environments.
pub fn hour_of_day_utc(timestamp: i64) -> f32 {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|dt| dt.hour() as f32)
        .unwrap_or(0.0)
}

/// Sort (id, score) pairs by score descending with a deterministic id
/// tie-break, truncating to `n`.
pub fn sort_ranked_desc(mut ranked: Vec<(i64, f32)>, n: usize) -> Vec<(i64, f32)> {
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    ranked.truncate(n);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);

        let a = vec![1.0, 1.0];
        let b = vec![1.0, 1.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);

        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_vector() {
        let mut v = vec![3.0, 4.0];
        normalize_vector(&mut v);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_weighted_mean() {
        let vectors = vec![(vec![1.0, 0.0, 0.0], 5.0), (vec![0.0, 1.0, 0.0], 1.0)];
        let mean = weighted_mean(&vectors);
        assert_eq!(mean, vec![2.5, 0.5, 0.0]);
    }

    #[test]
    fn test_min_max_normalize() {
        let normalized = min_max_normalize(&[2.5, 0.5, 0.0]);
        assert!((normalized[0] - 1.0).abs() < 1e-6);
        assert!((normalized[1] - 0.2).abs() < 1e-6);
        assert!((normalized[2] - 0.0).abs() < 1e-6);

        let constant = min_max_normalize(&[3.0, 3.0, 3.0]);
        assert_eq!(constant, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_top_k_indices() {
        let scores = vec![0.1, 0.5, 0.3, 0.9, 0.2];
        let top_2 = top_k_indices(&scores, 2);
        assert_eq!(top_2, vec![3, 1]);
    }

    #[test]
    fn test_hour_of_day_utc() {
        // 2020-01-01T13:30:00Z
        assert_eq!(hour_of_day_utc(1577885400), 13.0);
        assert_eq!(hour_of_day_utc(0), 0.0);
    }

    #[test]
    fn test_sort_ranked_desc() {
        let ranked = sort_ranked_desc(vec![(1, 0.2), (2, 0.9), (3, 0.9), (4, 0.1)], 3);
        assert_eq!(ranked, vec![(2, 0.9), (3, 0.9), (1, 0.2)]);
    }
}
