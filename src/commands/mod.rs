mod errors;
mod params;

pub use errors::CommandError;
pub use params::{AnalyzeArgs, PushArgs, SearchArgs};

use std::io::Write;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::Config;
use crate::format;
use crate::openai::OpenAiClient;
use crate::paper::{Paper, SearchOptions};
use crate::search::{Pipeline, RankProgress, SearchSession, analyze};
use crate::sources::{ArxivClient, SemanticScholarClient};
use crate::zotero::ZoteroClient;

/// TCP connection establishment timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Upper bound for any single HTTP exchange; per-stage deadlines come from `Config::timeout`.
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_REDIRECTS: usize = 5;

/// Wires configuration and HTTP clients to the CLI commands.
pub struct Finder {
    http: Client,
    config: Config,
    semantic_scholar: SemanticScholarClient,
    arxiv: ArxivClient,
    ai: Option<OpenAiClient>,
}

impl Finder {
    pub fn new(config: Config) -> Result<Self, CommandError> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(HTTP_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        let ai = OpenAiClient::from_config(http.clone(), &config)
            .inspect_err(|e| info!("AI features disabled: {e}"))
            .ok();
        Ok(Self {
            semantic_scholar: SemanticScholarClient::new(http.clone(), config.semantic_scholar_key.clone()),
            arxiv: ArxivClient::new(http.clone()),
            http,
            config,
            ai,
        })
    }

    fn pipeline(&self) -> Pipeline<'_, SemanticScholarClient, ArxivClient, OpenAiClient> {
        Pipeline {
            bibliographic: &self.semantic_scholar,
            preprint: &self.arxiv,
            ai: self.ai.as_ref(),
            rank: self.config.rank,
            timeout: self.config.timeout,
        }
    }

    fn zotero(&self) -> Result<ZoteroClient, CommandError> {
        Ok(ZoteroClient::from_config(self.http.clone(), &self.config)?)
    }

    /// Run the pipeline with ranking progress echoed to stderr.
    async fn run_search(&self, query: &str, options: &SearchOptions) -> SearchSession {
        let (tx, mut rx) = watch::channel(RankProgress::default());
        let reporter = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let p = *rx.borrow_and_update();
                if p.total > 0 {
                    eprint!("\rRanking papers {}/{}", p.completed, p.total);
                    if p.completed == p.total {
                        eprintln!();
                    }
                }
            }
        });

        let session = self.pipeline().execute(query, options, Some(&tx)).await;
        drop(tx);
        if let Err(e) = reporter.await {
            warn!(error = %e, "progress reporter stopped");
        }
        session
    }

    pub async fn search(&self, args: &SearchArgs) -> Result<String, CommandError> {
        let options = args.to_options()?;
        if options.rank && self.ai.is_none() {
            info!("no AI credential, results ordered by citations");
        }
        info!(query = %args.query, limit = options.limit, "search");

        let session = self.run_search(&args.query, &options).await;

        if let Some(path) = &args.output {
            write_json(path, &session.results)?;
            info!(path = %path.display(), "results written");
        }
        session.save(&self.config.session_path)?;

        Ok(format::format_results(&session, args.verbose))
    }

    pub async fn push(&self, args: &PushArgs) -> Result<String, CommandError> {
        let mut session = SearchSession::load(&self.config.session_path)?;
        if session.results.is_empty() {
            return Err(CommandError::Nothing("No papers in the saved search. Run `search` first."));
        }
        if session.select(&args.indices) == 0 {
            return Err(CommandError::InvalidArgs(format!(
                "'{}' selects none of the {} saved papers",
                args.indices,
                session.results.len()
            )));
        }

        let zotero = self.zotero()?;
        let mut papers: Vec<&Paper> = session.selected_papers();
        info!(selected = papers.len(), "push");

        if args.no_duplicates {
            papers = zotero.without_duplicates(papers).await?;
            if papers.is_empty() {
                return Ok("All selected papers are already in the library.\n".to_string());
            }
        }

        let collection_name = args
            .collection
            .as_deref()
            .or(self.config.ref_collection.as_deref())
            .map(str::trim)
            .filter(|c| !c.is_empty());
        let collection_key = match collection_name {
            Some(name) => Some(zotero.find_or_create_collection(name).await?),
            None => None,
        };

        let summary = zotero
            .export(&papers, collection_key.as_deref(), !args.no_pdf)
            .await?;
        Ok(format::format_export(&summary, collection_name))
    }

    pub async fn analyze(&self, args: &AnalyzeArgs) -> Result<String, CommandError> {
        if args.query.trim().is_empty() {
            return Err(CommandError::InvalidArgs("query must not be empty".into()));
        }
        let ai = self.ai.as_ref().ok_or(crate::openai::AiError::ApiKeyNotSet)?;

        let options = SearchOptions {
            limit: args.limit.max(1),
            rank: false,
            ..SearchOptions::default()
        };
        let session = self.run_search(&args.query, &options).await;
        if session.results.is_empty() {
            return Err(CommandError::Nothing("No papers found for analysis."));
        }

        let analysis = analyze::research_gaps(ai, &args.query, &session.results).await?;
        Ok(format::format_analysis(&args.query, session.results.len(), &analysis))
    }

    pub async fn collections(&self) -> Result<String, CommandError> {
        let collections = self.zotero()?.collections().await?;
        Ok(format::format_collections(&collections))
    }

    pub fn status(&self) -> String {
        format::format_status(&self.config)
    }
}

fn write_json(path: &std::path::Path, papers: &[Paper]) -> Result<(), CommandError> {
    let output_err = |source| CommandError::Output {
        path: path.display().to_string(),
        source,
    };
    let mut file = std::fs::File::create(path).map_err(output_err)?;
    serde_json::to_writer_pretty(&mut file, papers).map_err(|e| output_err(e.into()))?;
    file.write_all(b"\n").map_err(output_err)
}
