use std::pin::pin;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::filter::sort_by_citations;
use super::outcome::Outcome;
use crate::config::RankSettings;
use crate::openai::Embedder;
use crate::paper::{Paper, Relevance};

/// Embedding progress for the current ranking pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RankProgress {
    pub completed: usize,
    pub total: usize,
}

/// Dot product over the product of magnitudes.
///
/// Returns 0 for mismatched lengths or when either vector has zero magnitude,
/// and clamps rounding error so the result stays in [-1, 1].
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0) as f32
}

/// Scores papers by embedding similarity to the user's query.
pub struct SimilarityRanker<'a, E> {
    embedder: &'a E,
    settings: RankSettings,
    timeout: Duration,
}

impl<'a, E: Embedder> SimilarityRanker<'a, E> {
    pub fn new(embedder: &'a E, settings: RankSettings, timeout: Duration) -> Self {
        Self {
            embedder,
            settings,
            timeout,
        }
    }

    /// Rank `papers` (in merge order) against the raw `query`.
    ///
    /// A failed query embedding aborts ranking and returns citation order. Per-paper failures
    /// leave that paper `Unscored`; unscored papers follow all scored ones in citation order.
    pub async fn rank(
        &self,
        query: &str,
        mut papers: Vec<Paper>,
        progress: Option<&watch::Sender<RankProgress>>,
    ) -> Outcome<Vec<Paper>> {
        let query_vec = match self.embed(query).await {
            Ok(v) => v,
            Err(reason) => {
                warn!(error = %reason, "query embedding failed (falling back to citation order)");
                sort_by_citations(&mut papers);
                return Outcome::degraded(papers, reason);
            }
        };

        let total = papers.len().min(self.settings.candidates);
        publish(progress, 0, total);

        let jobs: Vec<(usize, String)> = papers
            .iter()
            .take(total)
            .map(Paper::embedding_text)
            .enumerate()
            .collect();

        let mut results = pin!(
            stream::iter(jobs)
                .map(|(index, text)| async move { (index, self.embed(&text).await) })
                .buffer_unordered(self.settings.concurrency.max(1))
        );

        let mut completed = 0;
        let mut failed = 0;
        while let Some((index, result)) = results.next().await {
            completed += 1;
            match result {
                Ok(vec) => {
                    papers[index].relevance = Relevance::Scored(cosine_similarity(&query_vec, &vec));
                }
                Err(reason) => {
                    failed += 1;
                    warn!(paper = %papers[index].id, error = %reason, "paper embedding failed (left unscored)");
                }
            }
            publish(progress, completed, total);
        }

        let (mut scored, mut unscored): (Vec<Paper>, Vec<Paper>) =
            papers.into_iter().partition(|p| p.relevance.is_scored());
        scored.sort_by(|a, b| by_score_desc(a, b));
        sort_by_citations(&mut unscored);

        info!(scored = scored.len(), unscored = unscored.len(), "ranking complete");
        scored.extend(unscored);

        if failed > 0 {
            Outcome::degraded(scored, format!("{failed} of {total} paper embeddings failed"))
        } else {
            Outcome::Ok(scored)
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, String> {
        match tokio::time::timeout(self.timeout, self.embedder.embed(text)).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err("embedding request timed out".to_string()),
        }
    }
}

fn by_score_desc(a: &Paper, b: &Paper) -> std::cmp::Ordering {
    let a = a.relevance.score().unwrap_or(f32::MIN);
    let b = b.relevance.score().unwrap_or(f32::MIN);
    b.total_cmp(&a)
}

fn publish(progress: Option<&watch::Sender<RankProgress>>, completed: usize, total: usize) {
    if let Some(tx) = progress {
        tx.send_replace(RankProgress { completed, total });
    }
    debug!(completed, total, "ranking progress");
}
