//! Inspection oracle: the image classifier seen as an opaque capability.
//!
//! The workflow never looks inside the classifier. It hands over image
//! bytes and receives a score and ranked labels.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use qualitrace_core::Label;

/// Errors reported by an inspection oracle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    /// The classifier could not be reached or loaded.
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    /// The classifier refused the input (empty or undecodable image).
    #[error("oracle rejected input: {0}")]
    InvalidInput(String),

    /// The classifier produced output that cannot be turned into a verdict.
    #[error("oracle produced invalid output: {0}")]
    InvalidOutput(String),
}

/// A classifier's answer for one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleVerdict {
    /// Quality score, expected in `0..=100`.
    pub score: u8,
    /// Labels with confidences, expected in `0..=100`.
    pub labels: Vec<Label>,
}

impl OracleVerdict {
    pub fn new(score: u8, labels: Vec<Label>) -> Self {
        Self { score, labels }
    }

    /// Build a verdict from raw class probabilities in `[0, 1]`.
    ///
    /// Probabilities become whole percentages and the score is the
    /// confidence of the most probable class.
    pub fn from_probabilities<I, S>(predictions: I) -> Result<Self, OracleError>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut labels = Vec::new();
        for (label, probability) in predictions {
            let label = label.into();
            if !(0.0..=1.0).contains(&probability) {
                return Err(OracleError::InvalidOutput(format!(
                    "probability {} for {:?} is outside [0, 1]",
                    probability, label
                )));
            }
            labels.push(Label::new(label, (probability * 100.0).round() as u8));
        }

        let score = labels
            .iter()
            .map(|l| l.confidence)
            .max()
            .ok_or_else(|| OracleError::InvalidOutput("no predictions".into()))?;

        Ok(Self { score, labels })
    }
}

/// Capability that scores a product image.
#[async_trait]
pub trait InspectionOracle: Send + Sync {
    async fn classify(&self, image: &[u8]) -> Result<OracleVerdict, OracleError>;
}

#[async_trait]
impl<T: InspectionOracle + ?Sized> InspectionOracle for Arc<T> {
    async fn classify(&self, image: &[u8]) -> Result<OracleVerdict, OracleError> {
        (**self).classify(image).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_probabilities() {
        let verdict =
            OracleVerdict::from_probabilities(vec![("widget", 0.921), ("gadget", 0.05)]).unwrap();
        assert_eq!(verdict.score, 92);
        assert_eq!(
            verdict.labels,
            vec![Label::new("widget", 92), Label::new("gadget", 5)]
        );
    }

    #[test]
    fn test_from_probabilities_rejects_bad_input() {
        assert!(OracleVerdict::from_probabilities(Vec::<(String, f64)>::new()).is_err());
        assert!(OracleVerdict::from_probabilities(vec![("x", 1.5)]).is_err());
        assert!(OracleVerdict::from_probabilities(vec![("x", f64::NAN)]).is_err());
    }
}
