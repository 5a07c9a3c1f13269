use std::fmt;

use serde::{Deserialize, Serialize};

/// Which adapter produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    SemanticScholar,
    Arxiv,
}

impl SourceKind {
    /// Merge priority: lower values come first in the concatenated result list.
    pub fn priority(self) -> u8 {
        match self {
            SourceKind::SemanticScholar => 0,
            SourceKind::Arxiv => 1,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceKind::SemanticScholar => "semantic_scholar",
            SourceKind::Arxiv => "arxiv",
        })
    }
}

/// Embedding-based relevance. `Unscored` is distinct from a computed score of zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relevance {
    Scored(f32),
    #[default]
    Unscored,
}

impl Relevance {
    pub fn score(self) -> Option<f32> {
        match self {
            Relevance::Scored(s) => Some(s),
            Relevance::Unscored => None,
        }
    }

    pub fn is_scored(self) -> bool {
        matches!(self, Relevance::Scored(_))
    }
}

/// Canonical, source-agnostic paper record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    pub id: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub doi: Option<String>,
    pub arxiv_id: Option<String>,
    pub url: Option<String>,
    pub pdf_url: Option<String>,
    pub source: SourceKind,
    pub citations: u32,
    pub venue: String,
    pub fields: Vec<String>,
    #[serde(default)]
    pub relevance: Relevance,
}

impl Paper {
    /// Minimal record with every optional attribute unset.
    #[cfg(test)]
    pub fn new(id: impl Into<String>, title: impl Into<String>, source: SourceKind) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            abstract_text: String::new(),
            authors: Vec::new(),
            year: None,
            doi: None,
            arxiv_id: None,
            url: None,
            pdf_url: None,
            source,
            citations: 0,
            venue: String::new(),
            fields: Vec::new(),
            relevance: Relevance::Unscored,
        }
    }

    /// Key used for cross-source deduplication.
    pub fn dedup_key(&self) -> String {
        self.title.trim().to_lowercase()
    }

    pub fn has_pdf(&self) -> bool {
        self.pdf_url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }

    /// Text submitted to the embedding provider for this paper.
    pub fn embedding_text(&self) -> String {
        format!("{}\n\n{}", self.title, self.abstract_text)
    }
}

/// Inclusive publication year range, open-ended on either side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct YearRange {
    pub start: Option<i32>,
    pub end: Option<i32>,
}

impl YearRange {
    pub fn new(start: Option<i32>, end: Option<i32>) -> Option<Self> {
        if start.is_none() && end.is_none() {
            None
        } else {
            Some(Self { start, end })
        }
    }

    pub fn contains(&self, year: i32) -> bool {
        self.start.is_none_or(|s| year >= s) && self.end.is_none_or(|e| year <= e)
    }

    /// Semantic Scholar `year` parameter: `2019-2023`, `2019-`, or `-2023`.
    pub fn to_query_value(&self) -> String {
        let start = self.start.map(|s| s.to_string()).unwrap_or_default();
        let end = self.end.map(|e| e.to_string()).unwrap_or_default();
        format!("{start}-{end}")
    }
}

/// Which adapters a search should consult.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSelection {
    pub semantic_scholar: bool,
    pub arxiv: bool,
}

impl Default for SourceSelection {
    fn default() -> Self {
        Self {
            semantic_scholar: true,
            arxiv: true,
        }
    }
}

impl SourceSelection {
    pub fn is_enabled(&self, kind: SourceKind) -> bool {
        match kind {
            SourceKind::SemanticScholar => self.semantic_scholar,
            SourceKind::Arxiv => self.arxiv,
        }
    }
}

/// Filter and request configuration for one search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub limit: usize,
    pub year_range: Option<YearRange>,
    pub min_citations: u32,
    pub fields: Vec<String>,
    pub sources: SourceSelection,
    pub rank: bool,
    pub refine: bool,
    pub pdf_only: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 20,
            year_range: None,
            min_citations: 0,
            fields: Vec::new(),
            sources: SourceSelection::default(),
            rank: true,
            refine: false,
            pdf_only: false,
        }
    }
}

impl SearchOptions {
    /// Number of results each adapter is asked for, leaving headroom for filtering.
    /// Adapters clamp this to their own caps.
    pub fn fetch_limit(&self) -> usize {
        self.limit.saturating_mul(2).max(1)
    }
}
