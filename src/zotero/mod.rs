pub mod items;
pub mod types;

pub use items::{paper_to_item, pdf_attachment};
pub use types::{Collection, ExportSummary};

use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::config::{ApiKey, Config};
use crate::paper::Paper;
use types::*;

const API_BASE: &str = "https://api.zotero.org";
const API_VERSION: &str = "3";
/// The write endpoints accept at most this many objects per request.
const WRITE_BATCH: usize = 50;
const COLLECTION_PAGE: usize = 100;
const DUPLICATE_QUERY_CHARS: usize = 50;

/// Errors returned by Zotero Web API operations.
#[derive(Debug, thiserror::Error)]
pub enum ZoteroError {
    #[error("Zotero not configured. Set ZOTERO_API_KEY and ZOTERO_USER_ID.")]
    NotConfigured,

    #[error("Zotero API rate limit exceeded. Please retry later.")]
    RateLimited,

    #[error("Access denied: {0}. Check that ZOTERO_API_KEY has write access to this library.")]
    Forbidden(String),

    #[error("Zotero API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Zotero did not return a key for the new collection '{0}'")]
    CollectionNotCreated(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid request URL: {0}")]
    Url(#[from] url::ParseError),
}

/// HTTP client for one Zotero user or group library.
#[derive(Clone)]
pub struct ZoteroClient {
    http: Client,
    api_key: ApiKey,
    /// `users/<id>` or `groups/<id>`.
    library: String,
    base_url: String,
}

impl ZoteroClient {
    pub fn from_config(http: Client, config: &Config) -> Result<Self, ZoteroError> {
        let (Some(api_key), Some(user_id)) = (&config.ref_credential, &config.ref_user_id) else {
            return Err(ZoteroError::NotConfigured);
        };
        Ok(Self {
            http,
            api_key: api_key.clone(),
            library: format!("{}/{user_id}", config.ref_library_type.path_segment()),
            base_url: API_BASE.to_string(),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_key: ApiKey::new("zot-key"),
            library: "users/42".to_string(),
            base_url: base_url.to_string(),
        }
    }

    fn url(&self, path: &str, params: &[(&str, String)]) -> Result<url::Url, ZoteroError> {
        let base = format!("{}/{}{path}", self.base_url, self.library);
        Ok(url::Url::parse_with_params(&base, params)?)
    }

    fn with_headers(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("Zotero-API-Key", self.api_key.expose())
            .header("Zotero-API-Version", API_VERSION)
            .header("User-Agent", crate::USER_AGENT)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: url::Url) -> Result<T, ZoteroError> {
        let response = self.with_headers(self.http.get(url)).send().await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<WriteResponse, ZoteroError> {
        let url = self.url(path, &[])?;
        let response = self.with_headers(self.http.post(url)).json(body).send().await?;
        Ok(check_status(response).await?.json().await?)
    }

    pub async fn collections(&self) -> Result<Vec<Collection>, ZoteroError> {
        let url = self.url("/collections", &[("limit", COLLECTION_PAGE.to_string())])?;
        let entries: Vec<CollectionEntry> = self.get_json(url).await?;
        Ok(entries.into_iter().map(Collection::from).collect())
    }

    pub async fn create_collection(&self, name: &str) -> Result<String, ZoteroError> {
        let response = self.post_json("/collections", &[NewCollection { name }]).await?;
        let key = response
            .successful
            .into_values()
            .next()
            .map(|o| o.key)
            .ok_or_else(|| ZoteroError::CollectionNotCreated(name.to_string()))?;
        info!(collection = %name, key = %key, "created Zotero collection");
        Ok(key)
    }

    /// Key of the collection named `name` (case-insensitive), creating it when absent.
    pub async fn find_or_create_collection(&self, name: &str) -> Result<String, ZoteroError> {
        let existing = self
            .collections()
            .await?
            .into_iter()
            .find(|c| c.name.eq_ignore_ascii_case(name.trim()));
        match existing {
            Some(c) => {
                debug!(collection = %name, key = %c.key, "reusing Zotero collection");
                Ok(c.key)
            }
            None => self.create_collection(name.trim()).await,
        }
    }

    /// Titles of library items matching `query` (quick search over title, creator, year).
    pub async fn search_titles(&self, query: &str, limit: usize) -> Result<Vec<String>, ZoteroError> {
        let url = self.url(
            "/items",
            &[
                ("q", query.to_string()),
                ("qmode", "titleCreatorYear".to_string()),
                ("limit", limit.to_string()),
            ],
        )?;
        let items: Vec<LibraryItem> = self.get_json(url).await?;
        Ok(items.into_iter().map(|i| i.data.title).collect())
    }

    /// Drop papers whose title already exists in the library (trimmed, case-insensitive).
    pub async fn without_duplicates<'p>(
        &self,
        papers: Vec<&'p Paper>,
    ) -> Result<Vec<&'p Paper>, ZoteroError> {
        let mut fresh = Vec::with_capacity(papers.len());
        for paper in papers {
            let query: String = paper.title.chars().take(DUPLICATE_QUERY_CHARS).collect();
            let titles = self.search_titles(&query, 5).await?;
            let key = paper.dedup_key();
            if titles.iter().any(|t| t.trim().to_lowercase() == key) {
                info!(title = %paper.title, "skipping paper already in library");
            } else {
                fresh.push(paper);
            }
        }
        Ok(fresh)
    }

    /// Create one item per paper in batches, then link PDFs for the items that were created.
    ///
    /// Per-item failures reported by Zotero are counted in the summary. A failed batch request
    /// counts its whole batch as failed and the export moves on to the next batch; the request
    /// error is only returned when no item was added at all.
    pub async fn export(
        &self,
        papers: &[&Paper],
        collection: Option<&str>,
        attach_pdfs: bool,
    ) -> Result<ExportSummary, ZoteroError> {
        let mut summary = ExportSummary::default();
        let mut attachments = Vec::new();
        let mut first_error = None;

        for batch in papers.chunks(WRITE_BATCH) {
            let items: Vec<Item> = batch.iter().map(|p| paper_to_item(p, collection)).collect();
            let response = match self.post_json("/items", &items).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, papers = batch.len(), "Zotero batch write failed");
                    summary.failed += batch.len();
                    first_error.get_or_insert(e);
                    continue;
                }
            };

            for (index, failure) in &response.failed {
                warn!(
                    index = %index,
                    code = ?failure.code,
                    message = failure.message.as_deref().unwrap_or(""),
                    "Zotero rejected item"
                );
            }
            summary.failed += batch.len().saturating_sub(response.successful.len());
            summary.added += response.successful.len();

            if attach_pdfs {
                for (index, written) in &response.successful {
                    let paper = index.parse::<usize>().ok().and_then(|i| batch.get(i));
                    if let Some(att) = paper.and_then(|p| pdf_attachment(&written.key, p)) {
                        attachments.push(att);
                    }
                }
            }
        }

        if summary.added == 0
            && let Some(e) = first_error
        {
            return Err(e);
        }

        for batch in attachments.chunks(WRITE_BATCH) {
            match self.post_json("/items", batch).await {
                Ok(response) => summary.attachments += response.successful.len(),
                Err(e) => warn!(error = %e, "could not attach PDFs (items were still added)"),
            }
        }

        info!(
            added = summary.added,
            failed = summary.failed,
            attachments = summary.attachments,
            "Zotero export complete"
        );
        Ok(summary)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ZoteroError> {
    let status = response.status();
    match status.as_u16() {
        200..=299 => Ok(response),
        429 => Err(ZoteroError::RateLimited),
        401 | 403 => Err(ZoteroError::Forbidden(
            response.text().await.unwrap_or_default().trim().to_string(),
        )),
        code => {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| format!("HTTP {status}"));
            Err(ZoteroError::Api {
                code,
                message: message.chars().take(200).collect(),
            })
        }
    }
}
