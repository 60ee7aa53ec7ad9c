//! Distance metrics for vector similarity calculations.
//!
//! Three pure, deterministic functions over equal-length vectors: squared
//! Euclidean (`l2`), negated dot product (`inner_product`, so that "smaller
//! is closer" holds for every metric), and cosine distance (`cosine`).
//! Each has a scalar reference path and a `wide`-backed vectorized path;
//! the two must agree bit-for-bit in the scalar path and within 1 ULP·dim
//! in the vectorized one.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use wide::f32x8;

/// Distance metric fixed at database-creation time and shared by every
/// search against a given index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// `1 - cosine_similarity(a, b)`. Stored vectors are normalized on read
    /// so that the dot product of two normalized vectors gives the cosine
    /// similarity directly (see DESIGN.md for the normalize-on-read vs.
    /// normalize-on-ingest decision).
    Cosine,
    /// Squared Euclidean distance. Monotonic with the true distance and
    /// therefore sufficient for ordering.
    L2,
    /// Negated inner product, so that smaller is always closer.
    InnerProduct,
}

impl std::str::FromStr for DistanceMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cosine" => Ok(Self::Cosine),
            "l2" => Ok(Self::L2),
            "inner_product" => Ok(Self::InnerProduct),
            other => Err(Error::Invalid(format!("unknown metric: {other}"))),
        }
    }
}

/// Computes the distance between `a` and `b` under `metric`.
///
/// # Errors
///
/// Returns `Error::Invalid` if `a.len() != b.len()`.
pub fn distance(metric: DistanceMetric, a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(Error::Invalid(format!(
            "dimension mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    Ok(match metric {
        DistanceMetric::L2 => l2(a, b),
        DistanceMetric::InnerProduct => inner_product(a, b),
        DistanceMetric::Cosine => cosine(a, b),
    })
}

/// Squared Euclidean distance, scalar reference path.
#[must_use]
pub fn l2(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Squared Euclidean distance, `wide`-vectorized path (8-lane f32).
#[must_use]
pub fn l2_simd(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let chunks = a.len() / 8;
    let mut acc = f32x8::ZERO;
    for i in 0..chunks {
        let base = i * 8;
        let va = f32x8::from(<[f32; 8]>::try_from(&a[base..base + 8]).unwrap());
        let vb = f32x8::from(<[f32; 8]>::try_from(&b[base..base + 8]).unwrap());
        let diff = va - vb;
        acc += diff * diff;
    }
    let mut sum: f32 = acc.to_array().iter().sum();
    for i in (chunks * 8)..a.len() {
        let d = a[i] - b[i];
        sum += d * d;
    }
    sum
}

/// Negated dot product, scalar reference path.
#[must_use]
pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    -a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>()
}

/// `1 - cosine_similarity(a, b)`. Falls back to the maximal distance (2.0)
/// when either vector has zero norm, since direction is undefined.
#[must_use]
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 2.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

/// Normalizes `v` in place to unit length. No-op on a zero vector.
///
/// Used by storage backends under `DistanceMetric::Cosine` so that distance
/// computation can fall back to `1 - dot(a, b)` once vectors are known to be
/// unit-length (invariant 6 in spec.md §3).
pub fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Returns true if every element of `v` is finite (rejects NaN and ±∞).
#[must_use]
pub fn all_finite(v: &[f32]) -> bool {
    v.iter().all(|x| x.is_finite())
}

#[cfg(test)]
#[path = "distance_tests.rs"]
mod tests;
