//! Distance functions for comparing embedding vectors.
//!
//! Lower distance means more similar for every metric. Vectors are compared
//! in f32; stored f16 embeddings are widened once when the index is built.

use crate::error::RagError;
use serde::{Deserialize, Serialize};

/// How two embeddings are compared during search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cos(a, b)`, in `[0, 2]`. A zero vector is at distance 1 from everything.
    #[default]
    Cosine,
    /// Straight-line distance `|a - b|`
    Euclidean,
}

impl DistanceMetric {
    /// Distance between `a` and `b`, given their precomputed magnitudes.
    pub fn distance(&self, a: &[f32], mag_a: f32, b: &[f32], mag_b: f32) -> f32 {
        match self {
            DistanceMetric::Cosine => 1.0 - cosine_similarity(a, mag_a, b, mag_b),
            DistanceMetric::Euclidean => euclidean_distance_squared(a, b).sqrt(),
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistanceMetric::Cosine => write!(f, "cosine"),
            DistanceMetric::Euclidean => write!(f, "euclidean"),
        }
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" | "cos" => Ok(DistanceMetric::Cosine),
            "euclidean" | "l2" => Ok(DistanceMetric::Euclidean),
            _ => Err(RagError::config(format!(
                "Invalid distance metric: '{s}'. Valid values are: cosine, euclidean"
            ))),
        }
    }
}

pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

pub fn euclidean_distance_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Cosine similarity in `[-1, 1]`; 0 when either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], mag_a: f32, b: &[f32], mag_b: f32) -> f32 {
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    (dot / (mag_a * mag_b)).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        DistanceMetric::Cosine.distance(a, magnitude(a), b, magnitude(b))
    }

    #[test]
    fn test_cosine_distance() {
        assert!(cosine(&[1.0, 0.0], &[2.0, 0.0]).abs() < 1e-6);
        assert!((cosine(&[1.0, 0.0], &[0.0, 3.0]) - 1.0).abs() < 1e-6);
        assert!((cosine(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 1.0]), 1.0);
    }

    #[test]
    fn test_euclidean_distance() {
        let a = [0.0, 3.0];
        let b = [4.0, 0.0];
        let d = DistanceMetric::Euclidean.distance(&a, magnitude(&a), &b, magnitude(&b));
        assert!((d - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_metric_parsing() {
        assert_eq!("cosine".parse::<DistanceMetric>().unwrap(), DistanceMetric::Cosine);
        assert_eq!("L2".parse::<DistanceMetric>().unwrap(), DistanceMetric::Euclidean);
        assert!("manhattan".parse::<DistanceMetric>().is_err());
        assert_eq!(DistanceMetric::default(), DistanceMetric::Cosine);
        assert_eq!(DistanceMetric::Euclidean.to_string(), "euclidean");
    }
}
