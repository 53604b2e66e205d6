use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JsonExtractError {
    #[error("no JSON object found in model output")]
    NoObject,

    #[error("invalid JSON object: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Parses the JSON object embedded in free-form model output.
///
/// Code-fence markers are removed anywhere in the text, then everything from
/// the first `{` to the last `}` (inclusive) is parsed. Surrounding prose is
/// ignored.
pub fn parse_first_json_object(raw: &str) -> Result<Map<String, Value>, JsonExtractError> {
    let text = strip_json_fences(raw);

    let start = text.find('{').ok_or(JsonExtractError::NoObject)?;
    let end = text.rfind('}').ok_or(JsonExtractError::NoObject)?;
    if end < start {
        return Err(JsonExtractError::NoObject);
    }

    Ok(serde_json::from_str(&text[start..=end])?)
}

/// Removes every ```json and ``` marker from LLM output.
fn strip_json_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "")
}
