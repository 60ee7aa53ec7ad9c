//! Vector compression: trains on a sample, encodes/decodes vectors to a
//! compact code, and computes distance directly against a code (spec.md
//! §4.5).
//!
//! Two variants, grounded on the teacher crate's [`ScalarQuantizer`]
//! (`index/hnsw/native/quantization.rs`), generalized from its fixed
//! "int8 vs float32 query" shape into the [`Quantizer`] capability this
//! spec asks for, plus a product-quantization variant the teacher does
//! not carry (no precedent for product quantization anywhere in the
//! example pack; built from the spec's own description of the PQ
//! algorithm in the same idiom as the scalar quantizer).
//!
//! [`ScalarQuantizer`]: scalar::ScalarQuantizer

pub mod product;
pub mod scalar;

use crate::error::{Error, Result};

pub use product::ProductQuantizer;
pub use scalar::ScalarQuantizer;

/// An encoded vector: an opaque byte code whose length and meaning are
/// defined by the [`Quantizer`] that produced it.
pub type Code = Vec<u8>;

/// Memory-savings report, returned by [`Quantizer::stats`].
#[derive(Debug, Clone, Copy)]
pub struct QuantizerStats {
    /// Bytes one encoded vector occupies.
    pub bytes_per_code: usize,
    /// Bytes the same vector would occupy at full `f32` precision.
    pub bytes_per_raw_vector: usize,
    /// Number of vectors the quantizer has been trained on.
    pub training_set_size: usize,
}

impl QuantizerStats {
    /// Ratio of raw to encoded size; `4.0` means 4x smaller.
    #[must_use]
    pub fn compression_ratio(&self) -> f64 {
        if self.bytes_per_code == 0 {
            1.0
        } else {
            self.bytes_per_raw_vector as f64 / self.bytes_per_code as f64
        }
    }
}

/// Capability set implemented by every quantization scheme (spec.md §4.5,
/// §9 "independently-optional capabilities attached via composition").
pub trait Quantizer: Send + Sync {
    /// Learns encoding parameters from a representative sample. Must be
    /// called before [`Self::encode`]/[`Self::decode`]/[`Self::distance`].
    ///
    /// # Errors
    ///
    /// Returns `Error::Invalid` if `sample` is empty or vectors within it
    /// have inconsistent lengths.
    fn train(&mut self, sample: &[Vec<f32>]) -> Result<()>;

    /// Encodes a full-precision vector to this quantizer's code.
    ///
    /// # Errors
    ///
    /// Returns `Error::Invalid` if the quantizer has not been trained, or
    /// `vector`'s length does not match the training dimension.
    fn encode(&self, vector: &[f32]) -> Result<Code>;

    /// Decodes a code back to an approximate full-precision vector.
    ///
    /// # Errors
    ///
    /// Returns `Error::Invalid` if the quantizer has not been trained, or
    /// `code` does not have this quantizer's expected length.
    fn decode(&self, code: &[u8]) -> Result<Vec<f32>>;

    /// Asymmetric distance: a full-precision query against a stored code,
    /// without fully decoding it first.
    ///
    /// # Errors
    ///
    /// Returns `Error::Invalid` if the quantizer has not been trained, or
    /// dimensions/code length disagree.
    fn distance(&self, query: &[f32], code: &[u8]) -> Result<f32>;

    /// Memory-savings report for the currently-trained parameters.
    fn stats(&self) -> QuantizerStats;
}

pub(crate) fn require_nonempty_sample(sample: &[Vec<f32>]) -> Result<usize> {
    let Some(first) = sample.first() else {
        return Err(Error::Invalid("quantizer training sample is empty".into()));
    };
    let dimension = first.len();
    if sample.iter().any(|v| v.len() != dimension) {
        return Err(Error::Invalid(
            "quantizer training sample has inconsistent vector lengths".into(),
        ));
    }
    Ok(dimension)
}
