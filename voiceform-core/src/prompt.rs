//! Deterministic extraction-prompt construction.
//!
//! A [`Schema`] maps field names to free-text type descriptions, e.g.
//! `"age" -> "integer"`. `generate_prompt` renders the schema and a transcript
//! into the single prompt string handed to the language model. The function is
//! pure: same inputs, same output, no I/O.

use std::collections::BTreeMap;

/// Field name → natural-language type/description.
///
/// A `BTreeMap` keeps iteration (and therefore prompt rendering) independent
/// of insertion order.
pub type Schema = BTreeMap<String, String>;

/// Base instruction block prepended to every prompt.
const SYSTEM_PREAMBLE: &str = "You are a deterministic structured-extraction engine.\n\
\n\
RULES:\n\
- Return ONLY valid JSON.\n\
- Do not add any extra text.\n\
- Do not invent values.\n\
- If a value is not explicit in the transcript, use null.\n\
- Strictly respect the declared types.";

/// Trailing cue that tells the model to answer now.
const ANSWER_CUE: &str = "JSON:";

/// Build the extraction prompt for one transcript.
///
/// - Schema entries render as `"key": description` lines inside a brace block.
/// - A non-blank `extra_instruction` is appended under its own delimited
///   sub-section; otherwise the base preamble is used verbatim.
/// - The transcript is embedded literally, unescaped.
///
/// An empty schema renders an empty object block and an empty transcript is a
/// valid degenerate input — downstream extraction then yields `{}`.
pub fn generate_prompt(
    transcript: &str,
    fields: &Schema,
    extra_instruction: Option<&str>,
) -> String {
    let schema_lines = fields
        .iter()
        .map(|(key, description)| format!("  \"{key}\": {description}"))
        .collect::<Vec<_>>()
        .join(",\n");

    let mut prompt = String::with_capacity(
        SYSTEM_PREAMBLE.len() + schema_lines.len() + transcript.len() + 64,
    );
    prompt.push_str(SYSTEM_PREAMBLE);

    if let Some(extra) = extra_instruction.map(str::trim).filter(|s| !s.is_empty()) {
        prompt.push_str("\n\nADDITIONAL INSTRUCTIONS:\n");
        prompt.push_str(extra);
    }

    prompt.push_str("\n\nSCHEMA:\n{\n");
    prompt.push_str(&schema_lines);
    prompt.push_str("\n}\n\nTRANSCRIPT:\n");
    prompt.push_str(transcript);
    prompt.push_str("\n\n");
    prompt.push_str(ANSWER_CUE);
    prompt
}
