use serde::{Deserialize, Serialize};

/// A fixed-length face descriptor produced by the encoder.
///
/// Immutable once constructed. The dimensionality is whatever the encoder
/// model emits (512 for the bundled ArcFace weights); all embeddings that
/// are compared against each other must share it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Euclidean (L2) distance to `other`, accumulated in `f64`.
    ///
    /// Mismatched dimensionality is a programmer error and fails fast.
    pub fn distance(&self, other: &Embedding) -> f64 {
        assert_eq!(
            self.dim(),
            other.dim(),
            "embedding dimensionality mismatch: {} vs {}",
            self.dim(),
            other.dim()
        );
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| {
                let d = (*a as f64) - (*b as f64);
                d * d
            })
            .sum::<f64>()
            .sqrt()
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}
