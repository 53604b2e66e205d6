//! Resume text normalization.
//!
//! Collapses whitespace and tags section headings in a single left-to-right
//! pass over whitespace-separated tokens. A heading becomes
//! `\n\n**🔹 <Section>**\n`. Markers already present in the input are
//! recognized and re-emitted as-is, so `normalize(normalize(t)) == normalize(t)`.

/// Section headings in canonical spelling. Matching is case-insensitive and
/// whole-token; a single trailing ':' is tolerated (`Skills:`).
pub const SECTION_KEYWORDS: [&str; 5] = [
    "Experience",
    "Projects",
    "Certifications",
    "Education",
    "Skills",
];

/// Glyph that opens every section marker. Clarity scoring counts it.
pub const SECTION_MARKER: &str = "🔹";

pub fn normalize(text: &str) -> String {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let mut out = String::with_capacity(text.len() + 32);

    let mut i = 0;
    while i < tokens.len() {
        if let Some((section, consumed)) = match_section(&tokens[i..]) {
            push_marker(&mut out, section);
            i += consumed;
            continue;
        }

        if !out.is_empty() && !out.ends_with('\n') {
            out.push(' ');
        }
        out.push_str(tokens[i]);
        i += 1;
    }

    out.trim().to_string()
}

/// Number of section markers in normalized text.
pub fn count_sections(normalized: &str) -> usize {
    normalized.matches(SECTION_MARKER).count()
}

/// Returns the canonical section name and the number of tokens it spans.
fn match_section(tokens: &[&str]) -> Option<(&'static str, usize)> {
    let first = *tokens.first()?;

    // An existing `**🔹 Section**` marker splits into two tokens.
    if first.strip_prefix("**") == Some(SECTION_MARKER) {
        if let Some(name) = tokens.get(1).and_then(|t| t.strip_suffix("**")) {
            if let Some(section) = SECTION_KEYWORDS.iter().find(|kw| **kw == name) {
                return Some((section, 2));
            }
        }
    }

    let word = first.strip_suffix(':').unwrap_or(first);
    SECTION_KEYWORDS
        .iter()
        .find(|kw| kw.eq_ignore_ascii_case(word))
        .map(|kw| (*kw, 1))
}

fn push_marker(out: &mut String, section: &str) {
    let kept = out.trim_end().len();
    out.truncate(kept);
    out.push_str("\n\n**");
    out.push_str(SECTION_MARKER);
    out.push(' ');
    out.push_str(section);
    out.push_str("**\n");
}
