use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::paper::Paper;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no saved search at {0} (run `paper-finder search` first)")]
    Missing(PathBuf),

    #[error("cannot access session file: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt session file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Results of the most recent completed search plus the user's selection over them.
///
/// Selection indices are 0-based positions into `results` and are meaningless for any other
/// result list, so a session is always created with an empty selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSession {
    pub query: String,
    /// Query string actually sent to the sources (differs when refinement succeeded).
    pub effective_query: String,
    pub results: Vec<Paper>,
    #[serde(default)]
    pub selection: BTreeSet<usize>,
    /// Reasons any stage fell back during the search. Diagnostic only.
    #[serde(skip)]
    pub degradations: Vec<String>,
}

impl SearchSession {
    pub fn new(query: impl Into<String>, effective_query: impl Into<String>, results: Vec<Paper>) -> Self {
        Self {
            query: query.into(),
            effective_query: effective_query.into(),
            results,
            selection: BTreeSet::new(),
            degradations: Vec::new(),
        }
    }

    /// Replace the selection from a 1-based expression: `all`, `3`, `1,2,5`, `1-5`, or mixes
    /// such as `1-3,7`. Malformed parts and out-of-range positions are ignored.
    /// Returns the number of selected papers.
    pub fn select(&mut self, expr: &str) -> usize {
        let len = self.results.len();
        self.selection = if expr.trim().eq_ignore_ascii_case("all") {
            (0..len).collect()
        } else {
            parse_positions(expr, len)
                .into_iter()
                .map(|n| n - 1)
                .collect()
        };
        self.selection.len()
    }

    /// Selected papers in result-list order.
    pub fn selected_papers(&self) -> Vec<&Paper> {
        self.selection
            .iter()
            .filter_map(|&i| self.results.get(i))
            .collect()
    }

    pub fn save(&self, path: &Path) -> Result<(), SessionError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        debug!(path = %path.display(), papers = self.results.len(), "session saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, SessionError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SessionError::Missing(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&text)?)
    }
}

/// 1-based positions named by `expr`, restricted to `1..=len`.
fn parse_positions(expr: &str, len: usize) -> BTreeSet<usize> {
    let mut positions = BTreeSet::new();
    for part in expr.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if let Some((start, end)) = part.split_once('-') {
            if let (Ok(start), Ok(end)) = (start.trim().parse::<usize>(), end.trim().parse::<usize>()) {
                positions.extend(start.max(1)..=end.min(len));
            }
        } else if let Ok(n) = part.parse::<usize>()
            && (1..=len).contains(&n)
        {
            positions.insert(n);
        }
    }
    positions
}
