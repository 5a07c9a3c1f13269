use std::path::PathBuf;

use clap::{Args, ValueEnum};

use super::errors::CommandError;
use crate::paper::{SearchOptions, SourceKind, SourceSelection, YearRange};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceArg {
    #[value(name = "semantic_scholar", alias = "s2")]
    SemanticScholar,
    Arxiv,
}

impl From<SourceArg> for SourceKind {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::SemanticScholar => SourceKind::SemanticScholar,
            SourceArg::Arxiv => SourceKind::Arxiv,
        }
    }
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Free-text research query
    pub query: String,
    /// Maximum number of results
    #[arg(short = 'n', long, default_value_t = 20)]
    pub limit: usize,
    /// Only papers published in or after this year
    #[arg(long)]
    pub year_start: Option<i32>,
    /// Only papers published in or before this year
    #[arg(long)]
    pub year_end: Option<i32>,
    /// Minimum citation count
    #[arg(short = 'c', long, default_value_t = 0)]
    pub min_citations: u32,
    /// Fields of study filter (repeatable)
    #[arg(short = 'f', long = "field")]
    pub fields: Vec<String>,
    /// Sources to search (repeatable, default: all)
    #[arg(short = 's', long = "source", value_enum)]
    pub sources: Vec<SourceArg>,
    /// Order by citations instead of embedding similarity
    #[arg(long)]
    pub no_rank: bool,
    /// Rewrite the query with the text-generation provider before searching
    #[arg(long)]
    pub refine: bool,
    /// Only papers with an open-access PDF
    #[arg(long)]
    pub pdf_only: bool,
    /// Also write the results to this JSON file
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
    /// Show abstracts
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl SearchArgs {
    pub fn to_options(&self) -> Result<SearchOptions, CommandError> {
        if self.query.trim().is_empty() {
            return Err(CommandError::InvalidArgs("query must not be empty".into()));
        }
        if self.limit == 0 {
            return Err(CommandError::InvalidArgs("--limit must be at least 1".into()));
        }
        if let (Some(start), Some(end)) = (self.year_start, self.year_end)
            && start > end
        {
            return Err(CommandError::InvalidArgs(format!(
                "--year-start {start} is after --year-end {end}"
            )));
        }

        let sources = if self.sources.is_empty() {
            SourceSelection::default()
        } else {
            let kinds: Vec<SourceKind> = self.sources.iter().map(|&s| s.into()).collect();
            SourceSelection {
                semantic_scholar: kinds.contains(&SourceKind::SemanticScholar),
                arxiv: kinds.contains(&SourceKind::Arxiv),
            }
        };

        Ok(SearchOptions {
            limit: self.limit,
            year_range: YearRange::new(self.year_start, self.year_end),
            min_citations: self.min_citations,
            fields: self
                .fields
                .iter()
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .collect(),
            sources,
            rank: !self.no_rank,
            refine: self.refine,
            pdf_only: self.pdf_only,
        })
    }
}

#[derive(Args, Debug)]
pub struct PushArgs {
    /// Papers to push: "1,2,3", "1-5", or "all"
    #[arg(short = 'i', long, default_value = "all")]
    pub indices: String,
    /// Collection name (created if missing; default: ZOTERO_COLLECTION)
    #[arg(short = 'c', long)]
    pub collection: Option<String>,
    /// Skip papers whose title is already in the library
    #[arg(long)]
    pub no_duplicates: bool,
    /// Do not link PDFs to the created items
    #[arg(long)]
    pub no_pdf: bool,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Research interest to analyze
    pub query: String,
    /// Number of papers to gather
    #[arg(short = 'n', long, default_value_t = 30)]
    pub limit: usize,
}
