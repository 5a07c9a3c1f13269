use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use super::filter::{apply_filters, dedup_by_title, sort_by_citations};
use super::outcome::Outcome;
use super::rank::{RankProgress, SimilarityRanker};
use super::refine::QueryRefiner;
use super::session::SearchSession;
use crate::config::RankSettings;
use crate::openai::{Embedder, TextGenerator};
use crate::paper::{Paper, SearchOptions};
use crate::sources::{PaperSource, search_or_empty};

/// Fans a query out to both sources, then merges, filters, and orders the results.
///
/// `ai` is `None` when no AI credential is configured; refinement and ranking are skipped.
pub struct Pipeline<'a, B, P, A> {
    pub bibliographic: &'a B,
    pub preprint: &'a P,
    pub ai: Option<&'a A>,
    pub rank: RankSettings,
    pub timeout: Duration,
}

impl<'a, B, P, A> Pipeline<'a, B, P, A>
where
    B: PaperSource,
    P: PaperSource,
    A: TextGenerator + Embedder,
{
    pub async fn execute(
        &self,
        query: &str,
        options: &SearchOptions,
        progress: Option<&watch::Sender<RankProgress>>,
    ) -> SearchSession {
        let mut degradations = Vec::new();

        let effective_query = if options.refine {
            let refined = QueryRefiner::new(self.ai, self.timeout).refine(query).await;
            note(&mut degradations, &refined);
            refined.into_value()
        } else {
            query.to_string()
        };

        info!(query = %effective_query, "searching sources");
        let (bibliographic, preprint) = tokio::join!(
            self.search_source(self.bibliographic, &effective_query, options),
            self.search_source(self.preprint, &effective_query, options),
        );

        let mut outcomes = [
            (self.bibliographic.kind(), bibliographic),
            (self.preprint.kind(), preprint),
        ];
        outcomes.sort_by_key(|(kind, _)| kind.priority());

        let mut merged: Vec<Paper> = Vec::new();
        for (_, outcome) in outcomes {
            note(&mut degradations, &outcome);
            merged.extend(outcome.into_value());
        }

        let fetched = merged.len();
        let deduped = dedup_by_title(merged);
        let mut papers = apply_filters(deduped, options);
        info!(fetched, kept = papers.len(), "merged and filtered");

        papers = match self.ai {
            Some(ai) if options.rank && !papers.is_empty() => {
                let ranked = SimilarityRanker::new(ai, self.rank, self.timeout)
                    .rank(query, papers, progress)
                    .await;
                note(&mut degradations, &ranked);
                ranked.into_value()
            }
            _ => {
                sort_by_citations(&mut papers);
                papers
            }
        };
        papers.truncate(options.limit);

        let mut session = SearchSession::new(query, effective_query, papers);
        session.degradations = degradations;
        session
    }

    /// Disabled sources contribute nothing; enabled ones are absorbed into an `Outcome`.
    async fn search_source(
        &self,
        source: &impl PaperSource,
        query: &str,
        options: &SearchOptions,
    ) -> Outcome<Vec<Paper>> {
        if !options.sources.is_enabled(source.kind()) {
            return Outcome::Ok(Vec::new());
        }
        search_or_empty(source, query, options, self.timeout).await
    }
}

fn note<T>(degradations: &mut Vec<String>, outcome: &Outcome<T>) {
    if let Some(reason) = outcome.reason() {
        debug!(reason, "search stage degraded");
        degradations.push(reason.to_string());
    }
}
