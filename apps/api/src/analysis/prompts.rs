use crate::config::AnalysisLimits;

use super::result::RESULT_KEYS;

/// Builds the analysis prompt.
///
/// The resume is cut to `max_resume_prompt_chars` characters and the job
/// description, when present and non-blank, to `max_job_prompt_chars`.
pub fn build_analysis_prompt(
    resume_text: &str,
    job_text: Option<&str>,
    limits: &AnalysisLimits,
) -> String {
    let resume = truncate_chars(resume_text, limits.max_resume_prompt_chars);

    let mut prompt = format!(
        "You are an expert ATS evaluator and career AI analyst.\n\
         Analyze the resume below and return ONLY valid JSON with keys:\n\
         {keys}.\n\
         Scores are integers from 0 to 100; skills, roles and tips are arrays of strings.\n\
         \n\
         Resume:\n\
         {resume}\n",
        keys = RESULT_KEYS.join(", "),
    );

    if let Some(job) = job_text.map(str::trim).filter(|j| !j.is_empty()) {
        prompt.push_str("\nTarget Job Description:\n");
        prompt.push_str(truncate_chars(job, limits.max_job_prompt_chars));
    }

    prompt.push_str("\nReturn JSON only.");
    prompt
}

/// Longest prefix of `text` holding at most `max` characters.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
