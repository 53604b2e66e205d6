use serde::{Deserialize, Serialize};

use crate::extraction::normalize::count_sections;

pub const BULLET: char = '•';

const BASE_SCORE: u8 = 40;
const LENGTH_BONUS: u8 = 20;
const BULLET_BONUS: u8 = 15;
const SECTION_BONUS: u8 = 25;

const MIN_WORDS: usize = 300;
const MIN_BULLETS: usize = 4;
const MIN_SECTIONS: usize = 3;

/// Human-readable band for a clarity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClarityBand {
    Excellent,
    Moderate,
    NeedsWork,
}

impl ClarityBand {
    pub fn for_score(score: u8) -> Self {
        match score {
            80.. => ClarityBand::Excellent,
            60..=79 => ClarityBand::Moderate,
            _ => ClarityBand::NeedsWork,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ClarityBand::Excellent => "Excellent",
            ClarityBand::Moderate => "Moderate",
            ClarityBand::NeedsWork => "Needs Work",
        }
    }
}

/// Structural signals the clarity heuristic looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClaritySignals {
    pub words: usize,
    pub bullets: usize,
    pub sections: usize,
}

impl ClaritySignals {
    pub fn of(normalized: &str) -> Self {
        Self {
            words: normalized.split_whitespace().count(),
            bullets: normalized.matches(BULLET).count(),
            sections: count_sections(normalized),
        }
    }
}

/// Heuristic 0–100 readability score over normalized resume text.
///
/// Base 40, +20 for more than 300 words, +15 for at least 4 bullets,
/// +25 for at least 3 section markers, capped at 100.
pub fn clarity_score(normalized: &str) -> u8 {
    score_signals(ClaritySignals::of(normalized))
}

pub fn score_signals(signals: ClaritySignals) -> u8 {
    let mut score = BASE_SCORE;
    if signals.words > MIN_WORDS {
        score += LENGTH_BONUS;
    }
    if signals.bullets >= MIN_BULLETS {
        score += BULLET_BONUS;
    }
    if signals.sections >= MIN_SECTIONS {
        score += SECTION_BONUS;
    }
    score.min(100)
}
