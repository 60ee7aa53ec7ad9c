//! Product quantization: splits a vector into `m` equal subvectors, learns a
//! small codebook (up to 256 centroids) per subspace with k-means, and
//! encodes each subvector as the index of its nearest centroid (spec.md
//! §4.5 "Product"). No teacher or pack precedent exists for this scheme;
//! built in the same shape as [`super::scalar::ScalarQuantizer`] (a fixed
//! trained-state struct implementing [`super::Quantizer`]) with its own
//! from-scratch k-means trainer, deterministic xorshift64 PRNG for
//! centroid seeding rather than pulling `rand` into production code.

use super::{require_nonempty_sample, Code, Quantizer, QuantizerStats};
use crate::error::{Error, Result};

const MAX_CENTROIDS: usize = 256;
const KMEANS_ITERATIONS: usize = 25;

struct Xorshift64(u64);

impl Xorshift64 {
    fn new(seed: u64) -> Self {
        Self(if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed })
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn below(&mut self, bound: usize) -> usize {
        (self.next_u64() % bound as u64) as usize
    }
}

/// One subspace's trained codebook: `centroids[c]` is a `sub_dim`-length
/// vector, the reconstruction for code value `c`.
#[derive(Debug, Clone, Default)]
struct Codebook {
    centroids: Vec<Vec<f32>>,
}

impl Codebook {
    fn train(samples: &[&[f32]], seed: u64) -> Self {
        let k = MAX_CENTROIDS.min(samples.len()).max(1);
        let mut rng = Xorshift64::new(seed);

        let mut centroids: Vec<Vec<f32>> = Vec::with_capacity(k);
        let mut used = std::collections::HashSet::new();
        while centroids.len() < k {
            let idx = rng.below(samples.len());
            if used.insert(idx) {
                centroids.push(samples[idx].to_vec());
            }
        }

        let sub_dim = samples[0].len();
        let mut assignment = vec![0usize; samples.len()];
        for _ in 0..KMEANS_ITERATIONS {
            let mut changed = false;
            for (i, s) in samples.iter().enumerate() {
                let mut best = 0usize;
                let mut best_dist = f32::MAX;
                for (c, centroid) in centroids.iter().enumerate() {
                    let d = squared_distance(s, centroid);
                    if d < best_dist {
                        best_dist = d;
                        best = c;
                    }
                }
                if assignment[i] != best {
                    assignment[i] = best;
                    changed = true;
                }
            }

            let mut sums = vec![vec![0.0f32; sub_dim]; k];
            let mut counts = vec![0usize; k];
            for (i, s) in samples.iter().enumerate() {
                let c = assignment[i];
                counts[c] += 1;
                for (d, &v) in s.iter().enumerate() {
                    sums[c][d] += v;
                }
            }
            for c in 0..k {
                if counts[c] == 0 {
                    continue;
                }
                for d in 0..sub_dim {
                    centroids[c][d] = sums[c][d] / counts[c] as f32;
                }
            }

            if !changed {
                break;
            }
        }

        Self { centroids }
    }

    fn nearest(&self, sub: &[f32]) -> u8 {
        let mut best = 0usize;
        let mut best_dist = f32::MAX;
        for (c, centroid) in self.centroids.iter().enumerate() {
            let d = squared_distance(sub, centroid);
            if d < best_dist {
                best_dist = d;
                best = c;
            }
        }
        best as u8
    }
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Subspace product quantizer.
#[derive(Debug, Clone, Default)]
pub struct ProductQuantizer {
    dimension: usize,
    subvector_count: usize,
    sub_dims: Vec<usize>,
    codebooks: Vec<Codebook>,
    training_set_size: usize,
}

impl ProductQuantizer {
    /// Creates an untrained quantizer that will split each vector into
    /// `subvector_count` subspaces at train time. `subvector_count` must
    /// evenly divide the trained dimension; remainders are rejected rather
    /// than silently padded.
    #[must_use]
    pub fn new(subvector_count: usize) -> Self {
        Self {
            subvector_count: subvector_count.max(1),
            ..Self::default()
        }
    }

    fn ensure_trained(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(Error::Invalid("product quantizer has not been trained".into()));
        }
        Ok(())
    }

    fn bounds(&self, sub: usize) -> (usize, usize) {
        let start = self.sub_dims[..sub].iter().sum();
        (start, start + self.sub_dims[sub])
    }
}

impl Quantizer for ProductQuantizer {
    fn train(&mut self, sample: &[Vec<f32>]) -> Result<()> {
        let dimension = require_nonempty_sample(sample)?;
        if dimension % self.subvector_count != 0 {
            return Err(Error::Invalid(format!(
                "dimension {dimension} is not divisible by subvector count {}",
                self.subvector_count
            )));
        }

        let sub_dim = dimension / self.subvector_count;
        let sub_dims = vec![sub_dim; self.subvector_count];
        let mut codebooks = Vec::with_capacity(self.subvector_count);

        for sub in 0..self.subvector_count {
            let start = sub * sub_dim;
            let end = start + sub_dim;
            let slices: Vec<&[f32]> = sample.iter().map(|v| &v[start..end]).collect();
            let seed = 0x9E37_79B9_7F4A_7C15u64 ^ ((sub as u64 + 1) * 0x1000_0000_01B3);
            codebooks.push(Codebook::train(&slices, seed));
        }

        self.dimension = dimension;
        self.sub_dims = sub_dims;
        self.codebooks = codebooks;
        self.training_set_size = sample.len();
        Ok(())
    }

    fn encode(&self, vector: &[f32]) -> Result<Code> {
        self.ensure_trained()?;
        if vector.len() != self.dimension {
            return Err(Error::Invalid(format!(
                "dimension mismatch: expected {}, got {}",
                self.dimension,
                vector.len()
            )));
        }
        let mut code = Vec::with_capacity(self.subvector_count);
        for sub in 0..self.subvector_count {
            let (start, end) = self.bounds(sub);
            code.push(self.codebooks[sub].nearest(&vector[start..end]));
        }
        Ok(code)
    }

    fn decode(&self, code: &[u8]) -> Result<Vec<f32>> {
        self.ensure_trained()?;
        if code.len() != self.subvector_count {
            return Err(Error::Invalid(format!(
                "code length mismatch: expected {}, got {}",
                self.subvector_count,
                code.len()
            )));
        }
        let mut out = Vec::with_capacity(self.dimension);
        for (sub, &c) in code.iter().enumerate() {
            out.extend_from_slice(&self.codebooks[sub].centroids[c as usize]);
        }
        Ok(out)
    }

    fn distance(&self, query: &[f32], code: &[u8]) -> Result<f32> {
        self.ensure_trained()?;
        if query.len() != self.dimension || code.len() != self.subvector_count {
            return Err(Error::Invalid("dimension mismatch in asymmetric distance".into()));
        }
        let mut sum = 0.0f32;
        for (sub, &c) in code.iter().enumerate() {
            let (start, end) = self.bounds(sub);
            sum += squared_distance(&query[start..end], &self.codebooks[sub].centroids[c as usize]);
        }
        Ok(sum)
    }

    fn stats(&self) -> QuantizerStats {
        QuantizerStats {
            bytes_per_code: self.subvector_count,
            bytes_per_raw_vector: self.dimension * std::mem::size_of::<f32>(),
            training_set_size: self.training_set_size,
        }
    }
}

#[cfg(test)]
#[path = "product_tests.rs"]
mod tests;
