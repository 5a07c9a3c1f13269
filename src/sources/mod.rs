//! Paper source adapters: each turns one external search service into canonical `Paper`s.

pub mod arxiv;
pub mod semantic_scholar;

use std::time::Duration;

use tracing::{info, warn};

use crate::paper::{Paper, SearchOptions, SourceKind};
use crate::search::outcome::Outcome;

pub use arxiv::ArxivClient;
pub use semantic_scholar::SemanticScholarClient;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("{0} rate limit exceeded")]
    RateLimited(SourceKind),

    #[error("{service} returned HTTP {code}")]
    Status { service: SourceKind, code: u16 },

    #[error("malformed {service} response: {message}")]
    Parse { service: SourceKind, message: String },

    #[error("{0} request timed out")]
    Timeout(SourceKind),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid request URL: {0}")]
    Url(#[from] url::ParseError),
}

/// One external paper-search service.
/// Implemented by the HTTP clients in this module; mock implementations used in tests.
pub trait PaperSource {
    fn kind(&self) -> SourceKind;

    async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<Paper>, SourceError>;
}

/// Runs one adapter under a deadline and absorbs every failure into an empty result.
pub async fn search_or_empty(
    source: &impl PaperSource,
    query: &str,
    options: &SearchOptions,
    deadline: Duration,
) -> Outcome<Vec<Paper>> {
    let kind = source.kind();
    let result = tokio::time::timeout(deadline, source.search(query, options))
        .await
        .unwrap_or(Err(SourceError::Timeout(kind)));

    match result {
        Ok(papers) => {
            info!(source = %kind, papers = papers.len(), "source search complete");
            Outcome::Ok(papers)
        }
        Err(e) => {
            warn!(source = %kind, error = %e, "source search failed (treating as no results)");
            Outcome::degraded(Vec::new(), e)
        }
    }
}

fn classify_status(service: SourceKind, status: reqwest::StatusCode) -> SourceError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        SourceError::RateLimited(service)
    } else {
        SourceError::Status {
            service,
            code: status.as_u16(),
        }
    }
}

/// Fallback identifier for records the service did not identify.
fn local_id(source: SourceKind, index: usize) -> String {
    format!("{source}:local-{index}")
}

/// Collapse the runs of whitespace and newlines that feeds embed in titles and abstracts.
fn squash_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip resolver prefixes so DOIs compare equal across sources.
fn normalize_doi(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    let stripped = ["https://doi.org/", "http://doi.org/", "https://dx.doi.org/", "doi:"]
        .iter()
        .find(|p| lower.starts_with(*p))
        .map(|p| &trimmed[p.len()..])
        .unwrap_or(trimmed)
        .trim();
    if stripped.is_empty() {
        None
    } else {
        Some(stripped.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FixedSource {
        result: Option<Vec<Paper>>,
        slow: bool,
        called: AtomicBool,
    }

    impl PaperSource for FixedSource {
        fn kind(&self) -> SourceKind {
            SourceKind::Arxiv
        }

        async fn search(&self, _: &str, _: &SearchOptions) -> Result<Vec<Paper>, SourceError> {
            self.called.store(true, Ordering::SeqCst);
            if self.slow {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            self.result.clone().ok_or(SourceError::Status {
                service: SourceKind::Arxiv,
                code: 503,
            })
        }
    }

    #[tokio::test]
    async fn failure_becomes_empty_degraded_result() {
        let source = FixedSource {
            result: None,
            slow: false,
            called: AtomicBool::new(false),
        };
        let outcome =
            search_or_empty(&source, "q", &SearchOptions::default(), Duration::from_secs(1)).await;
        assert!(outcome.is_degraded());
        assert!(outcome.reason().unwrap().contains("503"));
        assert!(outcome.into_value().is_empty());
    }

    #[tokio::test]
    async fn timeout_becomes_empty_degraded_result() {
        let source = FixedSource {
            result: Some(vec![Paper::new("1", "T", SourceKind::Arxiv)]),
            slow: true,
            called: AtomicBool::new(false),
        };
        let outcome = search_or_empty(
            &source,
            "q",
            &SearchOptions::default(),
            Duration::from_millis(20),
        )
        .await;
        assert!(source.called.load(Ordering::SeqCst));
        assert!(outcome.reason().unwrap().contains("timed out"));
        assert!(outcome.into_value().is_empty());
    }

    #[tokio::test]
    async fn success_passes_papers_through() {
        let source = FixedSource {
            result: Some(vec![Paper::new("1", "T", SourceKind::Arxiv)]),
            slow: false,
            called: AtomicBool::new(false),
        };
        let outcome =
            search_or_empty(&source, "q", &SearchOptions::default(), Duration::from_secs(1)).await;
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.into_value().len(), 1);
    }

    #[test]
    fn normalize_doi_strips_resolver_prefixes() {
        assert_eq!(normalize_doi("https://doi.org/10.1/ABC").as_deref(), Some("10.1/ABC"));
        assert_eq!(normalize_doi("doi:10.1/x").as_deref(), Some("10.1/x"));
        assert_eq!(normalize_doi(" 10.1/x ").as_deref(), Some("10.1/x"));
        assert_eq!(normalize_doi("  "), None);
    }

    #[test]
    fn squash_whitespace_collapses_newlines() {
        assert_eq!(squash_whitespace("Deep\n  Learning\tfor  X"), "Deep Learning for X");
    }

    #[test]
    fn classify_429_as_rate_limited() {
        let err = classify_status(SourceKind::Arxiv, reqwest::StatusCode::TOO_MANY_REQUESTS);
        assert!(matches!(err, SourceError::RateLimited(SourceKind::Arxiv)));
    }
}
