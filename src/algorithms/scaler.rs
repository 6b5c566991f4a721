use serde::{Deserialize, Serialize};

/// Per-feature standardization fit once at training time and frozen for
/// inference. Persisted and version-tagged together with the ranking model:
/// applying a scaler fit on different statistics than the model saw during
/// training silently skews every prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    pub version: u64,
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

impl StandardScaler {
    pub fn fit(rows: &[Vec<f32>]) -> Self {
        let dim = rows.first().map(|r| r.len()).unwrap_or(0);
        let n = rows.len().max(1) as f32;

        let mut mean = vec![0.0f32; dim];
        for row in rows {
            for (m, &x) in mean.iter_mut().zip(row.iter()) {
                *m += x;
            }
        }
        for m in mean.iter_mut() {
            *m /= n;
        }

        let mut std = vec![0.0f32; dim];
        for row in rows {
            for ((s, &m), &x) in std.iter_mut().zip(mean.iter()).zip(row.iter()) {
                *s += (x - m) * (x - m);
            }
        }
        for s in std.iter_mut() {
            *s = (*s / n).sqrt();
            if *s < f32::EPSILON {
                *s = 1.0;
            }
        }

        Self {
            version: 0,
            mean,
            std,
        }
    }

    pub fn transform(&self, row: &[f32]) -> Vec<f32> {
        row.iter()
            .zip(self.mean.iter())
            .zip(self.std.iter())
            .map(|((&x, &m), &s)| (x - m) / s)
            .collect()
    }
}
