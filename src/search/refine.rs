use std::time::Duration;

use tracing::{info, warn};

use super::outcome::Outcome;
use crate::openai::{AiError, GenerationRequest, TextGenerator};

const SYSTEM_PROMPT: &str = "You are a research assistant helping to find academic papers.
Given a user's research interest, generate an optimized search query that will find relevant papers.

Include:
- Key technical terms and their synonyms
- Related concepts
- Common abbreviations in the field

Output ONLY the search query, no explanations. Keep it under 100 words.";

const MAX_TOKENS: u32 = 150;
const TEMPERATURE: f32 = 0.3;

/// Rewrites a free-text research interest into an expanded search string.
pub struct QueryRefiner<'a, G> {
    generator: Option<&'a G>,
    timeout: Duration,
}

impl<'a, G: TextGenerator> QueryRefiner<'a, G> {
    pub fn new(generator: Option<&'a G>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    /// Never fails: any problem yields the original query as a degraded outcome.
    pub async fn refine(&self, query: &str) -> Outcome<String> {
        let Some(generator) = self.generator else {
            return Outcome::degraded(query.to_string(), AiError::ApiKeyNotSet);
        };

        let user = format!("Research interest: {query}");
        let request = GenerationRequest {
            system: SYSTEM_PROMPT,
            user: &user,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let result = tokio::time::timeout(self.timeout, generator.generate(&request)).await;
        match result {
            Ok(Ok(refined)) => {
                info!(query = %query, refined = %refined, "query refined");
                Outcome::Ok(refined)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "query refinement failed (using original query)");
                Outcome::degraded(query.to_string(), e)
            }
            Err(_) => {
                warn!("query refinement timed out (using original query)");
                Outcome::degraded(query.to_string(), "refinement timed out")
            }
        }
    }
}
