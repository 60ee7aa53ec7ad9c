//! Scalar quantization: one `u8` per dimension, learned from a per-
//! dimension min/max (spec.md §4.5 "Scalar"). Grounded on the teacher
//! crate's `index/hnsw/native/quantization.rs::ScalarQuantizer`.

use super::{require_nonempty_sample, Code, Quantizer, QuantizerStats};
use crate::error::{Error, Result};

/// Per-dimension 8-bit scalar quantizer.
#[derive(Debug, Clone, Default)]
pub struct ScalarQuantizer {
    dimension: usize,
    min_vals: Vec<f32>,
    scales: Vec<f32>,
    inv_scales: Vec<f32>,
    training_set_size: usize,
}

impl ScalarQuantizer {
    /// Creates an untrained quantizer. Call [`Quantizer::train`] before use.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_trained(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(Error::Invalid("scalar quantizer has not been trained".into()));
        }
        Ok(())
    }
}

impl Quantizer for ScalarQuantizer {
    fn train(&mut self, sample: &[Vec<f32>]) -> Result<()> {
        let dimension = require_nonempty_sample(sample)?;

        let mut min_vals = vec![f32::MAX; dimension];
        let mut max_vals = vec![f32::MIN; dimension];
        for vector in sample {
            for (i, &v) in vector.iter().enumerate() {
                min_vals[i] = min_vals[i].min(v);
                max_vals[i] = max_vals[i].max(v);
            }
        }

        let scales: Vec<f32> = min_vals
            .iter()
            .zip(&max_vals)
            .map(|(&min, &max)| {
                let range = max - min;
                if range.abs() < 1e-10 {
                    1.0
                } else {
                    255.0 / range
                }
            })
            .collect();
        let inv_scales: Vec<f32> = scales.iter().map(|&s| 1.0 / s).collect();

        self.dimension = dimension;
        self.min_vals = min_vals;
        self.scales = scales;
        self.inv_scales = inv_scales;
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
        Ok(vector
            .iter()
            .zip(&self.min_vals)
            .zip(&self.scales)
            .map(|((&v, &min), &scale)| ((v - min) * scale).round().clamp(0.0, 255.0) as u8)
            .collect())
    }

    fn decode(&self, code: &[u8]) -> Result<Vec<f32>> {
        self.ensure_trained()?;
        if code.len() != self.dimension {
            return Err(Error::Invalid(format!(
                "code length mismatch: expected {}, got {}",
                self.dimension,
                code.len()
            )));
        }
        Ok(code
            .iter()
            .zip(&self.min_vals)
            .zip(&self.inv_scales)
            .map(|((&q, &min), &inv_scale)| f32::from(q) * inv_scale + min)
            .collect())
    }

    fn distance(&self, query: &[f32], code: &[u8]) -> Result<f32> {
        self.ensure_trained()?;
        if query.len() != self.dimension || code.len() != self.dimension {
            return Err(Error::Invalid("dimension mismatch in asymmetric distance".into()));
        }
        let mut sum = 0.0f32;
        for i in 0..self.dimension {
            let dequantized = f32::from(code[i]) * self.inv_scales[i] + self.min_vals[i];
            let d = query[i] - dequantized;
            sum += d * d;
        }
        Ok(sum)
    }

    fn stats(&self) -> QuantizerStats {
        QuantizerStats {
            bytes_per_code: self.dimension,
            bytes_per_raw_vector: self.dimension * std::mem::size_of::<f32>(),
            training_set_size: self.training_set_size,
        }
    }
}

#[cfg(test)]
#[path = "scalar_tests.rs"]
mod tests;
