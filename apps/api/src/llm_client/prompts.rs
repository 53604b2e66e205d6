// Cross-cutting prompt fragments. Prompts tied to one feature live next to
// that feature (see `analysis::prompts`).

/// System message for every analysis call.
pub const JSON_ONLY_SYSTEM: &str = "You are a JSON-only assistant.";
