use serde::Serialize;
use serde_json::{Map, Value};

/// Keys the prompt asks the model to return.
pub const RESULT_KEYS: [&str; 8] = [
    "technical_skills",
    "soft_skills",
    "suggested_job_roles",
    "job_match_score",
    "ats_compatibility_score",
    "clarity_score",
    "one_sentence_summary",
    "top_tips",
];

/// Structured assessment returned by the model that answered.
///
/// Model output is untrusted: missing or mistyped fields default to 0 or
/// empty, scores are clamped to [0, 100].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub technical_skills: Vec<String>,
    pub soft_skills: Vec<String>,
    pub suggested_job_roles: Vec<String>,
    pub job_match_score: u8,
    pub ats_compatibility_score: u8,
    pub clarity_score: u8,
    pub one_sentence_summary: String,
    pub top_tips: Vec<String>,
    pub model_used: String,
    /// Whether the payload carried a usable `clarity_score`.
    #[serde(skip)]
    pub clarity_reported: bool,
}

impl AnalysisResult {
    pub fn from_object(obj: &Map<String, Value>, model: &str) -> Self {
        let clarity = obj.get("clarity_score").and_then(read_score);
        Self {
            technical_skills: read_list(obj.get("technical_skills")),
            soft_skills: read_list(obj.get("soft_skills")),
            suggested_job_roles: read_list(obj.get("suggested_job_roles")),
            job_match_score: obj.get("job_match_score").and_then(read_score).unwrap_or(0),
            ats_compatibility_score: obj
                .get("ats_compatibility_score")
                .and_then(read_score)
                .unwrap_or(0),
            clarity_score: clarity.unwrap_or(0),
            one_sentence_summary: read_text(obj.get("one_sentence_summary")),
            top_tips: read_list(obj.get("top_tips")),
            model_used: model.to_string(),
            clarity_reported: clarity.is_some(),
        }
    }

    /// The model's clarity score when it gave one, otherwise `heuristic`.
    pub fn effective_clarity(&self, heuristic: u8) -> u8 {
        if self.clarity_reported {
            self.clarity_score
        } else {
            heuristic
        }
    }
}

/// Numbers and numeric strings ("85", "85%", "85.5") become a clamped,
/// rounded score. Anything else is treated as missing.
fn read_score(value: &Value) -> Option<u8> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if raw.is_nan() {
        return None;
    }
    Some(raw.clamp(0.0, 100.0).round() as u8)
}

fn read_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        // Some models return "a, b, c" instead of an array.
        Some(Value::String(s)) => s
            .split([',', '\n'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

fn read_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
