use crate::openai::{AiError, GenerationRequest, TextGenerator};
use crate::paper::Paper;

const SYSTEM_PROMPT: &str = "You are a research analyst. Given a list of academic papers and a research interest,
identify potential research gaps, emerging trends, and opportunities for novel contributions.
Be specific and actionable in your analysis.";

const MAX_PAPERS: usize = 10;
const ABSTRACT_PREVIEW_CHARS: usize = 200;

/// Ask the text-generation provider for themes, gaps, and opportunities across the top papers.
pub async fn research_gaps(
    generator: &impl TextGenerator,
    interest: &str,
    papers: &[Paper],
) -> Result<String, AiError> {
    let prompt = build_prompt(interest, papers);
    generator
        .generate(&GenerationRequest {
            system: SYSTEM_PROMPT,
            user: &prompt,
            max_tokens: 500,
            temperature: 0.5,
        })
        .await
}

fn build_prompt(interest: &str, papers: &[Paper]) -> String {
    let summary: Vec<String> = papers
        .iter()
        .take(MAX_PAPERS)
        .map(|p| {
            let year = p.year.map(|y| y.to_string()).unwrap_or_else(|| "n.d.".to_string());
            let preview: String = p.abstract_text.chars().take(ABSTRACT_PREVIEW_CHARS).collect();
            format!("- {} ({year}): {preview}...", p.title)
        })
        .collect();

    format!(
        "Research Interest: {interest}\n\nFound Papers:\n{}\n\nPlease analyze:\n\
         1. Key themes and trends\n\
         2. Potential research gaps\n\
         3. Opportunities for novel contributions",
        summary.join("\n")
    )
}
