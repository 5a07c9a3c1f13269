use chrono::{DateTime, Datelike};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use reqwest::Client;
use tracing::debug;

use super::{PaperSource, SourceError, classify_status, local_id, normalize_doi, squash_whitespace};
use crate::paper::{Paper, SearchOptions, SourceKind, YearRange};

const API_BASE: &str = "https://export.arxiv.org/api/query";
const PDF_BASE: &str = "https://arxiv.org/pdf";
pub const MAX_RESULTS: usize = 200;
const VENUE: &str = "arXiv";

/// Client for the arXiv Atom query API.
#[derive(Clone)]
pub struct ArxivClient {
    http: Client,
    base_url: String,
}

impl ArxivClient {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            base_url: API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }

    fn search_url(&self, query: &str, options: &SearchOptions) -> Result<url::Url, SourceError> {
        let limit = options.fetch_limit().min(MAX_RESULTS).to_string();
        let search_query = build_search_query(query, options.year_range);
        Ok(url::Url::parse_with_params(
            &self.base_url,
            &[
                ("search_query", search_query.as_str()),
                ("start", "0"),
                ("max_results", limit.as_str()),
                ("sortBy", "relevance"),
                ("sortOrder", "descending"),
            ],
        )?)
    }
}

impl PaperSource for ArxivClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Arxiv
    }

    async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<Paper>, SourceError> {
        let url = self.search_url(query, options)?;

        let response = self
            .http
            .get(url)
            .header("User-Agent", crate::USER_AGENT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(SourceKind::Arxiv, status));
        }

        let xml = response.text().await?;
        let papers = parse_feed(&xml)?;
        debug!(papers = papers.len(), "arxiv feed parsed");
        Ok(papers)
    }
}

/// Year ranges are the only filter arXiv can express natively; fields and citations are not.
fn build_search_query(query: &str, year_range: Option<YearRange>) -> String {
    match year_range {
        None => query.to_string(),
        Some(range) => {
            let from = range
                .start
                .map(|y| format!("{y:04}01010000"))
                .unwrap_or_else(|| "199101010000".to_string());
            let to = range
                .end
                .map(|y| format!("{y:04}12312359"))
                .unwrap_or_else(|| "999912312359".to_string());
            format!("({query}) AND submittedDate:[{from} TO {to}]")
        }
    }
}

#[derive(Clone, Copy)]
enum TextField {
    Id,
    Title,
    Summary,
    Published,
    AuthorName,
    Doi,
}

#[derive(Default)]
struct EntryBuilder {
    id: String,
    title: String,
    summary: String,
    published: String,
    authors: Vec<String>,
    doi: String,
    categories: Vec<String>,
    abs_url: Option<String>,
    pdf_url: Option<String>,
}

impl EntryBuilder {
    fn push_text(&mut self, field: TextField, text: &str) {
        let target = match field {
            TextField::AuthorName => {
                self.authors.push(squash_whitespace(text));
                return;
            }
            TextField::Id => &mut self.id,
            TextField::Title => &mut self.title,
            TextField::Summary => &mut self.summary,
            TextField::Published => &mut self.published,
            TextField::Doi => &mut self.doi,
        };
        if !target.is_empty() {
            target.push(' ');
        }
        target.push_str(text);
    }

    fn add_link(&mut self, e: &BytesStart<'_>) {
        let mut href = None;
        let mut rel = None;
        let mut title = None;
        let mut mime = None;
        for attr in e.attributes().flatten() {
            let Ok(value) = attr.unescape_value() else {
                continue;
            };
            match attr.key.local_name().as_ref() {
                b"href" => href = Some(value.into_owned()),
                b"rel" => rel = Some(value.into_owned()),
                b"title" => title = Some(value.into_owned()),
                b"type" => mime = Some(value.into_owned()),
                _ => {}
            }
        }
        let Some(href) = href.filter(|h| !h.is_empty()) else {
            return;
        };
        let is_pdf = title.as_deref() == Some("pdf") || mime.as_deref() == Some("application/pdf");
        if is_pdf {
            self.pdf_url.get_or_insert(href);
        } else if rel.as_deref().is_none_or(|r| r == "alternate") {
            self.abs_url.get_or_insert(href);
        }
    }

    fn add_category(&mut self, e: &BytesStart<'_>) {
        let term = e
            .attributes()
            .flatten()
            .find(|a| a.key.local_name().as_ref() == b"term")
            .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()));
        if let Some(term) = term.filter(|t| !t.is_empty()) {
            self.categories.push(term);
        }
    }

    /// Returns `None` for the pseudo-entries arXiv uses to report query errors.
    fn build(self, index: usize) -> Option<Paper> {
        let raw_id = self.id.trim();
        if raw_id.contains("/api/errors") {
            return None;
        }

        let arxiv_id = parse_arxiv_id(raw_id);
        let pdf_url = self
            .pdf_url
            .or_else(|| arxiv_id.as_ref().map(|id| format!("{PDF_BASE}/{id}")));
        let url = self
            .abs_url
            .or_else(|| (!raw_id.is_empty()).then(|| raw_id.to_string()));

        Some(Paper {
            id: arxiv_id
                .clone()
                .unwrap_or_else(|| local_id(SourceKind::Arxiv, index)),
            title: squash_whitespace(&self.title),
            abstract_text: squash_whitespace(&self.summary),
            authors: self.authors,
            year: parse_year(&self.published),
            doi: normalize_doi(&self.doi),
            arxiv_id,
            url,
            pdf_url,
            source: SourceKind::Arxiv,
            citations: 0,
            venue: VENUE.to_string(),
            fields: self.categories,
            relevance: Default::default(),
        })
    }
}

fn text_field(name: &[u8], in_author: bool) -> Option<TextField> {
    match name {
        b"id" => Some(TextField::Id),
        b"title" => Some(TextField::Title),
        b"summary" => Some(TextField::Summary),
        b"published" => Some(TextField::Published),
        b"doi" => Some(TextField::Doi),
        b"name" if in_author => Some(TextField::AuthorName),
        _ => None,
    }
}

fn parse_error(e: impl std::fmt::Display) -> SourceError {
    SourceError::Parse {
        service: SourceKind::Arxiv,
        message: e.to_string(),
    }
}

/// Parse an arXiv Atom feed. Element names are matched by local name, so the
/// `arxiv:` namespace prefix on `doi` is irrelevant.
pub(crate) fn parse_feed(xml: &str) -> Result<Vec<Paper>, SourceError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut papers = Vec::new();
    let mut entry: Option<EntryBuilder> = None;
    let mut field: Option<TextField> = None;
    let mut in_author = false;

    loop {
        match reader.read_event().map_err(parse_error)? {
            Event::Start(e) => match (e.local_name().as_ref(), entry.as_mut()) {
                (b"entry", _) => {
                    entry = Some(EntryBuilder::default());
                    field = None;
                    in_author = false;
                }
                (b"author", Some(_)) => in_author = true,
                (b"link", Some(builder)) => builder.add_link(&e),
                (b"category", Some(builder)) => builder.add_category(&e),
                (name, Some(_)) => field = text_field(name, in_author),
                _ => {}
            },
            Event::Empty(e) => {
                if let Some(builder) = entry.as_mut() {
                    match e.local_name().as_ref() {
                        b"link" => builder.add_link(&e),
                        b"category" => builder.add_category(&e),
                        _ => {}
                    }
                }
            }
            Event::Text(t) => {
                if let (Some(builder), Some(f)) = (entry.as_mut(), field) {
                    let text = t.unescape().map_err(parse_error)?;
                    builder.push_text(f, &text);
                }
            }
            Event::CData(c) => {
                if let (Some(builder), Some(f)) = (entry.as_mut(), field) {
                    builder.push_text(f, &String::from_utf8_lossy(&c));
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"entry" => {
                    if let Some(builder) = entry.take()
                        && let Some(paper) = builder.build(papers.len())
                    {
                        papers.push(paper);
                    }
                    field = None;
                    in_author = false;
                }
                b"author" => in_author = false,
                _ => field = None,
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(papers)
}

/// `http://arxiv.org/abs/2101.00001v2` → `2101.00001`; old-style ids keep their archive prefix.
fn parse_arxiv_id(entry_id: &str) -> Option<String> {
    let tail = entry_id
        .split_once("/abs/")
        .map(|(_, rest)| rest)
        .or_else(|| entry_id.rsplit('/').next())?
        .trim();
    if tail.is_empty() {
        return None;
    }
    Some(strip_version(tail).to_string())
}

fn strip_version(id: &str) -> &str {
    match id.rfind('v') {
        Some(pos)
            if pos > 0
                && pos + 1 < id.len()
                && id[pos + 1..].bytes().all(|b| b.is_ascii_digit()) =>
        {
            &id[..pos]
        }
        _ => id,
    }
}

fn parse_year(published: &str) -> Option<i32> {
    let published = published.trim();
    DateTime::parse_from_rfc3339(published)
        .map(|d| d.year())
        .ok()
        .or_else(|| published.get(..4)?.parse().ok())
}
