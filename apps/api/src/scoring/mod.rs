//! Resume scores: the clarity heuristic, semantic job fit, and the weighted
//! overall aggregate.

pub mod aggregate;
pub mod clarity;
pub mod semantic;

pub use aggregate::{aggregate, compute_overall, ScoringWeights};
pub use clarity::{clarity_score, ClarityBand, ClaritySignals};
pub use semantic::SemanticMatcher;
