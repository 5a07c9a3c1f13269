use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{PaperSource, SourceError, classify_status, local_id, normalize_doi, squash_whitespace};
use crate::config::ApiKey;
use crate::paper::{Paper, SearchOptions, SourceKind};

const API_BASE: &str = "https://api.semanticscholar.org/graph/v1";
/// The search endpoint rejects larger pages.
pub const MAX_RESULTS: usize = 100;
const FIELDS: &str =
    "title,authors,abstract,year,citationCount,venue,externalIds,openAccessPdf,fieldsOfStudy,url";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    data: Option<Vec<ApiPaper>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPaper {
    paper_id: Option<String>,
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    authors: Option<Vec<ApiAuthor>>,
    year: Option<i32>,
    citation_count: Option<u32>,
    venue: Option<String>,
    external_ids: Option<ExternalIds>,
    open_access_pdf: Option<OpenAccessPdf>,
    fields_of_study: Option<Vec<String>>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(rename = "ArXiv")]
    arxiv: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAccessPdf {
    url: Option<String>,
}

/// Client for the Semantic Scholar Graph API paper search.
#[derive(Clone)]
pub struct SemanticScholarClient {
    http: Client,
    api_key: Option<ApiKey>,
    base_url: String,
}

impl SemanticScholarClient {
    pub fn new(http: Client, api_key: Option<ApiKey>) -> Self {
        Self {
            http,
            api_key,
            base_url: API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_key: None,
            base_url: base_url.to_string(),
        }
    }

    fn search_url(&self, query: &str, options: &SearchOptions) -> Result<url::Url, SourceError> {
        let limit = options.fetch_limit().min(MAX_RESULTS).to_string();
        let mut params = vec![("query", query.to_string()), ("limit", limit), ("fields", FIELDS.to_string())];
        if let Some(range) = options.year_range {
            params.push(("year", range.to_query_value()));
        }
        if !options.fields.is_empty() {
            params.push(("fieldsOfStudy", options.fields.join(",")));
        }
        Ok(url::Url::parse_with_params(
            &format!("{}/paper/search", self.base_url),
            &params,
        )?)
    }
}

impl PaperSource for SemanticScholarClient {
    fn kind(&self) -> SourceKind {
        SourceKind::SemanticScholar
    }

    async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<Paper>, SourceError> {
        let url = self.search_url(query, options)?;

        let mut request = self.http.get(url).header("User-Agent", crate::USER_AGENT);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key.expose());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(SourceKind::SemanticScholar, status));
        }

        let text = response.text().await?;
        let body: SearchResponse = serde_json::from_str(&text).map_err(|e| SourceError::Parse {
            service: SourceKind::SemanticScholar,
            message: e.to_string(),
        })?;

        let papers: Vec<Paper> = body
            .data
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, item)| to_paper(item, i))
            .filter(|p| p.citations >= options.min_citations)
            .collect();

        debug!(papers = papers.len(), "semantic scholar search parsed");
        Ok(papers)
    }
}

fn to_paper(item: ApiPaper, index: usize) -> Paper {
    let ids = item.external_ids;
    let (doi, arxiv_id) = match ids {
        Some(ids) => (
            ids.doi.as_deref().and_then(normalize_doi),
            ids.arxiv.filter(|a| !a.trim().is_empty()),
        ),
        None => (None, None),
    };

    Paper {
        id: item
            .paper_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| local_id(SourceKind::SemanticScholar, index)),
        title: squash_whitespace(&item.title.unwrap_or_default()),
        abstract_text: item.abstract_text.unwrap_or_default(),
        authors: item
            .authors
            .unwrap_or_default()
            .into_iter()
            .filter_map(|a| a.name)
            .collect(),
        year: item.year,
        doi,
        arxiv_id,
        url: item.url.filter(|u| !u.is_empty()),
        pdf_url: item
            .open_access_pdf
            .and_then(|p| p.url)
            .filter(|u| !u.is_empty()),
        source: SourceKind::SemanticScholar,
        citations: item.citation_count.unwrap_or(0),
        venue: item.venue.unwrap_or_default(),
        fields: item.fields_of_study.unwrap_or_default(),
        relevance: Default::default(),
    }
}

#[cfg(test)]
mod http_tests {
    use super::*;
    use crate::paper::YearRange;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_body() -> serde_json::Value {
        serde_json::json!({
            "total": 2,
            "data": [
                {
                    "paperId": "abc123",
                    "title": "Attention Is All You Need",
                    "abstract": "The dominant sequence transduction models...",
                    "authors": [{"authorId": "1", "name": "Ashish Vaswani"}, {"authorId": "2", "name": "Noam Shazeer"}],
                    "year": 2017,
                    "citationCount": 90000,
                    "venue": "NeurIPS",
                    "externalIds": {"DOI": "10.5555/3295222", "ArXiv": "1706.03762", "CorpusId": 13756489},
                    "openAccessPdf": {"url": "https://arxiv.org/pdf/1706.03762", "status": "GREEN"},
                    "fieldsOfStudy": ["Computer Science"],
                    "url": "https://www.semanticscholar.org/paper/abc123"
                },
                {
                    "paperId": null,
                    "title": "Obscure Note",
                    "abstract": null,
                    "authors": [],
                    "year": null,
                    "citationCount": null,
                    "venue": "",
                    "externalIds": null,
                    "openAccessPdf": null,
                    "fieldsOfStudy": null,
                    "url": null
                }
            ]
        })
    }

    #[tokio::test]
    async fn search_maps_fields_to_papers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/paper/search"))
            .and(query_param("query", "transformers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_body()))
            .mount(&server)
            .await;

        let client = SemanticScholarClient::with_base_url(Client::new(), &server.uri());
        let papers = client
            .search("transformers", &SearchOptions::default())
            .await
            .unwrap();

        assert_eq!(papers.len(), 2);
        let first = &papers[0];
        assert_eq!(first.id, "abc123");
        assert_eq!(first.authors, vec!["Ashish Vaswani", "Noam Shazeer"]);
        assert_eq!(first.year, Some(2017));
        assert_eq!(first.citations, 90000);
        assert_eq!(first.doi.as_deref(), Some("10.5555/3295222"));
        assert_eq!(first.arxiv_id.as_deref(), Some("1706.03762"));
        assert!(first.has_pdf());
        assert_eq!(first.fields, vec!["Computer Science"]);
        assert_eq!(first.source, SourceKind::SemanticScholar);

        let second = &papers[1];
        assert_eq!(second.id, "semantic_scholar:local-1");
        assert_eq!(second.citations, 0);
        assert!(second.abstract_text.is_empty());
        assert!(!second.has_pdf());
    }

    #[tokio::test]
    async fn search_sends_native_filters_and_clamps_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/paper/search"))
            .and(query_param("limit", "100"))
            .and(query_param("year", "2020-"))
            .and(query_param("fieldsOfStudy", "Computer Science,Medicine"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .expect(1)
            .mount(&server)
            .await;

        let options = SearchOptions {
            limit: 500,
            year_range: YearRange::new(Some(2020), None),
            fields: vec!["Computer Science".into(), "Medicine".into()],
            ..SearchOptions::default()
        };
        let client = SemanticScholarClient::with_base_url(Client::new(), &server.uri());
        let papers = client.search("q", &options).await.unwrap();
        assert!(papers.is_empty());
    }

    #[tokio::test]
    async fn min_citations_treats_missing_counts_as_zero() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/paper/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_body()))
            .mount(&server)
            .await;

        let options = SearchOptions {
            min_citations: 1,
            ..SearchOptions::default()
        };
        let client = SemanticScholarClient::with_base_url(Client::new(), &server.uri());
        let papers = client.search("q", &options).await.unwrap();
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].id, "abc123");
    }

    #[tokio::test]
    async fn missing_data_array_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/paper/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"total": 0})))
            .mount(&server)
            .await;

        let client = SemanticScholarClient::with_base_url(Client::new(), &server.uri());
        let papers = client.search("q", &SearchOptions::default()).await.unwrap();
        assert!(papers.is_empty());
    }

    #[tokio::test]
    async fn server_error_is_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/paper/search"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = SemanticScholarClient::with_base_url(Client::new(), &server.uri());
        let result = client.search("q", &SearchOptions::default()).await;
        assert!(matches!(result, Err(SourceError::Status { code: 500, .. })));
    }

    #[tokio::test]
    async fn rate_limit_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/paper/search"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = SemanticScholarClient::with_base_url(Client::new(), &server.uri());
        let result = client.search("q", &SearchOptions::default()).await;
        assert!(matches!(result, Err(SourceError::RateLimited(_))));
    }

    #[tokio::test]
    async fn malformed_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/paper/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = SemanticScholarClient::with_base_url(Client::new(), &server.uri());
        let result = client.search("q", &SearchOptions::default()).await;
        assert!(matches!(result, Err(SourceError::Parse { .. })));
    }
}
