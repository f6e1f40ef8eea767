//! Prompt construction for the Gemini explain requests.
//! Pure functions: the input text is wrapped verbatim between delimiter
//! lines, never interpolated into control syntax, so callers never escape.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What kind of input the user pasted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Code,
    Error,
    Library,
    Auto,
}

impl Default for ContentType {
    fn default() -> Self {
        ContentType::Auto
    }
}

impl FromStr for ContentType {
    type Err = std::convert::Infallible;

    /// Unknown values fall back to `Auto` rather than failing.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "code" => ContentType::Code,
            "error" => ContentType::Error,
            "library" => ContentType::Library,
            _ => ContentType::Auto,
        })
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ContentType::Code => "code",
            ContentType::Error => "error",
            ContentType::Library => "library",
            ContentType::Auto => "auto",
        };
        write!(f, "{s}")
    }
}

/// How thorough the explanation should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplainLevel {
    Simple,
    Detailed,
}

impl Default for ExplainLevel {
    fn default() -> Self {
        ExplainLevel::Simple
    }
}

impl FromStr for ExplainLevel {
    type Err = std::convert::Infallible;

    /// Unknown values fall back to `Simple` rather than failing.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "detailed" => ExplainLevel::Detailed,
            _ => ExplainLevel::Simple,
        })
    }
}

impl std::fmt::Display for ExplainLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExplainLevel::Simple => "simple",
            ExplainLevel::Detailed => "detailed",
        };
        write!(f, "{s}")
    }
}

const BEGIN_MARKER: &str = "===BEGIN INPUT===";
const END_MARKER: &str = "===END INPUT===";

fn type_hint(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::Code => {
            "Explain the purpose of the code, its structure, and anything to watch out for."
        }
        ContentType::Error => {
            "Explain why the error occurred and how to resolve it."
        }
        ContentType::Library => {
            "Explain concisely what the library is, how it is used, and its caveats."
        }
        ContentType::Auto => {
            "Pick the most suitable format for the content and explain it."
        }
    }
}

fn level_instruction(level: ExplainLevel) -> &'static str {
    match level {
        ExplainLevel::Simple => {
            "Use short, plain wording that a beginner can follow."
        }
        ExplainLevel::Detailed => {
            "Include the underlying concepts and background where they help, and explain carefully."
        }
    }
}

/// Build the standard S-C-A-F-T explainer prompt.
pub fn build(text: &str, content_type: ContentType, level: ExplainLevel) -> String {
    format!(
        "You are an excellent technical explainer. Explain the input below \
following the S-C-A-F-T framework, in a calm and logical register.

Input kind: {content_type}
Explanation level: {level}

{hint}
{instruction}

Output format:
1. Situation
   State briefly what the input is about and its context.

2. Cause
   Explain the technical reason the content exists or occurred.

3. Analysis
   Walk through the details: mechanism, structure, important elements.

4. Fix or Feature
   If there is a problem, give the fix; otherwise give applications, caveats, or practical examples.

5. Terminology
   If jargon or abbreviations appear, add a one-line beginner-friendly note for each (omit if unnecessary).

Constraints:
- Do not repeat the input back.
- Do not use emoji or decoration characters (#, *, ** and similar).
- Aim for at most 600 words.
- Keep the tone flat; prefer facts and structure.

{BEGIN_MARKER}
{text}
{END_MARKER}
",
        hint = type_hint(content_type),
        instruction = level_instruction(level),
    )
}

/// Build the regenerate prompt: the previous explanation was not enough,
/// ask for a more detailed pass over the same input.
pub fn build_regenerate(original_text: &str, previous_result: &str) -> String {
    format!(
        "You are an excellent technical explainer. The previous explanation of \
the input below was not sufficient for the reader; produce a clearer, more \
detailed explanation.

Original input:
{BEGIN_MARKER}
{original_text}
{END_MARKER}

Previous explanation:
{previous_result}

Instructions:
1. Explain the purpose, behavior, and key parts in more depth than before.
2. Briefly define any technical terms you use.
3. Make the flow and order of execution explicit.
4. Where possible, suggest improvements or pitfalls.

Output format:
1. Situation
   State briefly what the input is about and its context.

2. Cause
   Explain the technical reason the content exists or occurred.

3. Analysis
   Walk through the details: mechanism, structure, important elements.

4. Fix or Feature
   If there is a problem, give the fix; otherwise give applications, caveats, or practical examples.

5. Terminology
   If jargon or abbreviations appear, add a one-line beginner-friendly note for each.

Constraints:
- Do not repeat the input back.
- Do not use emoji or decoration characters (#, *, ** and similar).
"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeds_text_verbatim_between_markers() {
        let text = "fn main() { println!(\"{}\", 1 + 1); }";
        let prompt = build(text, ContentType::Code, ExplainLevel::Simple);
        let wrapped = format!("{BEGIN_MARKER}\n{text}\n{END_MARKER}");
        assert!(prompt.contains(&wrapped));
    }

    #[test]
    fn same_inputs_same_prompt() {
        let a = build("x", ContentType::Error, ExplainLevel::Detailed);
        let b = build("x", ContentType::Error, ExplainLevel::Detailed);
        assert_eq!(a, b);
    }

    #[test]
    fn templates_differ_by_type_and_level() {
        let code = build("x", ContentType::Code, ExplainLevel::Simple);
        let error = build("x", ContentType::Error, ExplainLevel::Simple);
        let detailed = build("x", ContentType::Code, ExplainLevel::Detailed);
        assert_ne!(code, error);
        assert_ne!(code, detailed);
    }

    #[test]
    fn unknown_strings_fall_back() {
        assert_eq!("mystery".parse::<ContentType>().unwrap(), ContentType::Auto);
        assert_eq!("".parse::<ExplainLevel>().unwrap(), ExplainLevel::Simple);
        assert_eq!("code".parse::<ContentType>().unwrap(), ContentType::Code);
        assert_eq!("detailed".parse::<ExplainLevel>().unwrap(), ExplainLevel::Detailed);
    }

    #[test]
    fn regenerate_embeds_both_texts() {
        let prompt = build_regenerate("let x = 5;", "It binds five.");
        assert!(prompt.contains("let x = 5;"));
        assert!(prompt.contains("It binds five."));
    }
}
