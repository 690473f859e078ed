//! Turns a class-probability distribution into the served score pair.

use crate::artifact::Classifier;
use crate::error::ScoringError;

/// Index of the "direct advice" class in the artifact's class ordering.
pub const POSITIVE_CLASS: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    /// Probability of the positive class.
    pub prediction: f64,
    /// Margin between the two most probable classes.
    pub confidence: f64,
}

/// Difference between the two highest probabilities. Needs at least two entries.
pub fn margin(probabilities: &[f64]) -> Result<f64, ScoringError> {
    if probabilities.len() < 2 { return Err(ScoringError::Degenerate(probabilities.len())); }
    let mut sorted = probabilities.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    Ok(sorted[0] - sorted[1])
}

pub fn score_distribution(probabilities: &[f64]) -> Result<Score, ScoringError> {
    if probabilities.iter().any(|p| !p.is_finite()) { return Err(ScoringError::NonFinite); }
    let confidence = margin(probabilities)?;
    Ok(Score { prediction: probabilities[POSITIVE_CLASS], confidence })
}

pub fn score_text(model: &dyn Classifier, text: &str) -> Result<Score, ScoringError> {
    let probabilities = model.predict_proba(text)?;
    score_distribution(&probabilities)
}

pub fn interpretation(score: &Score) -> String {
    format!(
        "There is a {:.1}% likelihood that this situation would receive direct advice or guidance, \
         as opposed to empathetic listening or exploratory questions. Confidence: {:.1}%",
        score.prediction * 100.0,
        score.confidence * 100.0,
    )
}
