use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub fn xavier_uniform(size: usize, rng: &mut impl Rng) -> Vec<f32> {
    let limit = (6.0 / size as f32).sqrt();
    (0..size).map(|_| rng.gen_range(-limit..limit)).collect()
}

/// Seeded factor-matrix initialization. The same seed always yields the same
/// starting point, which keeps grid-search results reproducible per run.
pub struct FactorInitializer {
    rng: StdRng,
    dimension: usize,
}

impl FactorInitializer {
    pub fn new(seed: u64, dimension: usize) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            dimension,
        }
    }

    pub fn factor_row(&mut self) -> Vec<f32> {
        xavier_uniform(self.dimension, &mut self.rng)
    }

    pub fn factor_matrix(&mut self, rows: usize) -> Vec<Vec<f32>> {
        (0..rows).map(|_| self.factor_row()).collect()
    }
}
