//! System prompts for summarisation and text optimisation.
//!
//! Every prompt lives here so that prompt regressions show up in unit tests
//! without a completion endpoint. Callers extend them through
//! [`crate::config::ProcessingConfig::custom_instructions`] rather than
//! replacing them.

use crate::config::{OptimizationKind, SummaryLength};

/// Output-token budget for optimisation requests.
pub const OPTIMIZE_MAX_TOKENS: usize = 4000;

const SUMMARY_RULES: &str = r#"Requirements:
1. Keep the key information and the main points
2. Use clear and concise language
3. Keep the logic coherent
4. Do not add information that is not in the source text
5. Write in the language of the source text

Return only the summary, without explanations or commentary."#;

/// The length-specific instruction that opens a summary prompt.
fn length_instruction(length: SummaryLength) -> &'static str {
    match length {
        SummaryLength::Short => {
            "Summarise the core content and key points of the following text in 100-200 words."
        }
        SummaryLength::Medium => {
            "Summarise the main content, key arguments and important details of the following text in 300-500 words."
        }
        SummaryLength::Long => {
            "Write a detailed 500-800 word summary of the following text covering its main arguments, supporting evidence and important details."
        }
    }
}

/// Build the system prompt for a summary of the given length.
pub fn summary_prompt(length: SummaryLength, custom_instructions: Option<&str>) -> String {
    let prompt = format!(
        "You are a professional text summarisation expert. {}\n\n{}",
        length_instruction(length),
        SUMMARY_RULES
    );
    with_custom_instructions(prompt, custom_instructions)
}

/// Build the system prompt for an optimisation pass.
pub fn optimization_prompt(kind: OptimizationKind, custom_instructions: Option<&str>) -> String {
    let prompt = match kind {
        OptimizationKind::General => {
            "You are an expert text editor. Improve the following text by:\n\
1. Correcting grammar and spelling errors\n\
2. Improving sentence structure and readability\n\
3. Enhancing logical flow\n\
4. Maintaining the original meaning and tone\n\
Return only the improved text without explanations."
        }
        OptimizationKind::Grammar => {
            "You are a professional proofreader. Correct all grammar, spelling and punctuation errors in the following text.\n\
Maintain the original structure and meaning. Return only the corrected text."
        }
        OptimizationKind::Semantic => {
            "You are a content optimiser. Enhance the following text by:\n\
1. Improving clarity and coherence\n\
2. Strengthening logical connections\n\
3. Refining word choices\n\
4. Ensuring smooth transitions\n\
Return only the optimised text."
        }
        OptimizationKind::Terminology => {
            "You are a terminology specialist. Ensure consistent use of technical terms and standardise terminology throughout the text.\n\
Return only the text with unified terminology."
        }
    };
    with_custom_instructions(prompt.to_string(), custom_instructions)
}

fn with_custom_instructions(mut prompt: String, custom: Option<&str>) -> String {
    if let Some(extra) = custom.map(str::trim).filter(|s| !s.is_empty()) {
        prompt.push_str("\n\nAdditional instructions: ");
        prompt.push_str(extra);
    }
    prompt
}
