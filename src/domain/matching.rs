//! Distance-based match decision between two plaintext embeddings.

use serde::{Deserialize, Serialize};

use super::FaceEmbedding;

/// Default decision threshold; the usual cut-off for 128-d face encodings.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.6;

/// The two vectors have different lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Dimension mismatch: expected {expected}, got {actual}")]
pub struct DimensionMismatch {
    pub expected: usize,
    pub actual: usize,
}

/// Euclidean (L2) norm of `a - b`.
///
/// # Errors
/// Returns `DimensionMismatch` if the slices differ in length.
pub fn distance(a: &[f64], b: &[f64]) -> Result<f64, DimensionMismatch> {
    if a.len() != b.len() {
        return Err(DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let sum_sq: f64 = a
        .iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum();
    Ok(sum_sq.sqrt())
}

/// Returns `(distance < threshold, distance)`.
///
/// # Errors
/// Returns `DimensionMismatch` if the slices differ in length.
pub fn is_match(a: &[f64], b: &[f64], threshold: f64) -> Result<(bool, f64), DimensionMismatch> {
    let d = distance(a, b)?;
    Ok((d < threshold, d))
}

/// Tunable decision policy. Not a scheme parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchPolicy {
    pub threshold: f64,
}

impl MatchPolicy {
    #[must_use]
    pub fn with_threshold(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Compare an enrolled embedding against a fresh capture.
    ///
    /// # Errors
    /// Returns `DimensionMismatch` if the embeddings differ in length.
    pub fn evaluate(
        &self,
        enrolled: &FaceEmbedding,
        probe: &FaceEmbedding,
    ) -> Result<MatchOutcome, DimensionMismatch> {
        let (matched, distance) = is_match(enrolled.as_slice(), probe.as_slice(), self.threshold)?;
        Ok(MatchOutcome {
            matched,
            distance,
            threshold: self.threshold,
        })
    }
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self::with_threshold(DEFAULT_MATCH_THRESHOLD)
    }
}

/// Result of a verification comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub matched: bool,
    pub distance: f64,
    pub threshold: f64,
}

impl std::fmt::Display for MatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.matched {
            write!(f, "match (distance={:.2})", self.distance)
        } else {
            write!(
                f,
                "no match (distance={:.2} is not below threshold {:.2})",
                self.distance, self.threshold
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_identity() {
        let v = vec![0.1, -0.7, 3.25, 0.0];
        assert_eq!(distance(&v, &v).expect("same length"), 0.0);
    }

    #[test]
    fn test_distance_symmetry() {
        let a = vec![0.31, -1.2, 0.05, 7.5];
        let b = vec![-0.4, 0.9, 0.15, 7.0];
        assert_eq!(
            distance(&a, &b).expect("same length"),
            distance(&b, &a).expect("same length")
        );
    }

    #[test]
    fn test_distance_known_value() {
        let d = distance(&[0.0, 0.0], &[3.0, 4.0]).expect("same length");
        assert!((d - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_distance_dimension_mismatch() {
        let err = distance(&[1.0, 2.0], &[1.0]).expect_err("must fail");
        assert_eq!(err, DimensionMismatch { expected: 2, actual: 1 });
    }

    #[test]
    fn test_threshold_is_strict() {
        let (matched, d) = is_match(&[0.0], &[0.6], DEFAULT_MATCH_THRESHOLD).expect("same length");
        assert_eq!(d, 0.6);
        assert!(!matched, "distance equal to the threshold must not match");

        let (matched, _) = is_match(&[0.0], &[0.59], DEFAULT_MATCH_THRESHOLD).expect("same length");
        assert!(matched);
    }

    #[test]
    fn test_policy_override() {
        let enrolled = FaceEmbedding::new(vec![0.0, 0.0]);
        let probe = FaceEmbedding::new(vec![0.0, 0.7]);

        let strict = MatchPolicy::default().evaluate(&enrolled, &probe).expect("same length");
        assert!(!strict.matched);

        let lenient = MatchPolicy::with_threshold(0.75)
            .evaluate(&enrolled, &probe)
            .expect("same length");
        assert!(lenient.matched);
        assert_eq!(lenient.threshold, 0.75);
    }

    #[test]
    fn test_outcome_display() {
        let outcome = MatchOutcome {
            matched: false,
            distance: 11.3137,
            threshold: 0.6,
        };
        assert_eq!(
            outcome.to_string(),
            "no match (distance=11.31 is not below threshold 0.60)"
        );
    }
}
