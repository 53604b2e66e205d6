/// Percentage weights of the three sub-scores. Must sum to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringWeights {
    pub job_match: u32,
    pub ats: u32,
    pub clarity: u32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            job_match: 40,
            ats: 30,
            clarity: 30,
        }
    }
}

/// Overall score: 0.4*job_match + 0.3*ats + 0.3*clarity.
pub fn aggregate(job_match: u8, ats: u8, clarity: u8) -> u8 {
    compute_overall(job_match, ats, clarity, &ScoringWeights::default())
}

/// Weighted sum rounded half-up to the nearest integer.
///
/// Inputs are clamped to [0, 100] first since they come from an LLM payload.
/// The sum is computed in integer hundredths so that `.5` boundaries round
/// the same way on every platform.
pub fn compute_overall(job_match: u8, ats: u8, clarity: u8, weights: &ScoringWeights) -> u8 {
    let total_weight = weights.job_match + weights.ats + weights.clarity;
    if total_weight == 0 {
        return 0;
    }

    let weighted = weights.job_match * u32::from(job_match.min(100))
        + weights.ats * u32::from(ats.min(100))
        + weights.clarity * u32::from(clarity.min(100));

    let rounded = (weighted + total_weight / 2) / total_weight;
    rounded.min(100) as u8
}
