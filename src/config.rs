use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_SESSION_FILE: &str = ".paper_finder_session.json";

pub const DEFAULT_RANK_CANDIDATES: usize = 50;
pub const DEFAULT_RANK_CONCURRENCY: usize = 5;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: '{value}'")]
    Invalid { var: &'static str, value: String },
}

/// Secret that never leaks through `Debug` output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LibraryType {
    #[default]
    User,
    Group,
}

impl LibraryType {
    /// Path segment used by the Zotero web API.
    pub fn path_segment(self) -> &'static str {
        match self {
            LibraryType::User => "users",
            LibraryType::Group => "groups",
        }
    }
}

/// Ranking knobs that are otherwise fixed constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankSettings {
    /// Only the first `candidates` merged papers are embedded.
    pub candidates: usize,
    /// Maximum embedding requests in flight.
    pub concurrency: usize,
}

impl Default for RankSettings {
    fn default() -> Self {
        Self {
            candidates: DEFAULT_RANK_CANDIDATES,
            concurrency: DEFAULT_RANK_CONCURRENCY,
        }
    }
}

/// Everything the core needs from the settings layer. Read once, never written back.
#[derive(Debug, Clone)]
pub struct Config {
    pub ai_credential: Option<ApiKey>,
    pub ai_base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub ref_credential: Option<ApiKey>,
    pub ref_user_id: Option<String>,
    pub ref_library_type: LibraryType,
    pub ref_collection: Option<String>,
    pub semantic_scholar_key: Option<ApiKey>,
    pub rank: RankSettings,
    pub timeout: Duration,
    pub session_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ai_credential: None,
            ai_base_url: DEFAULT_OPENAI_BASE.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            ref_credential: None,
            ref_user_id: None,
            ref_library_type: LibraryType::User,
            ref_collection: None,
            semantic_scholar_key: None,
            rank: RankSettings::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            session_path: PathBuf::from(DEFAULT_SESSION_FILE),
        }
    }
}

impl Config {
    /// Load from the process environment, after merging an optional `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|var| env::var(var).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let text = |var: &str| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let secret = |var: &str| text(var).filter(|v| !is_placeholder(v)).map(ApiKey::new);

        let defaults = Config::default();

        let ref_library_type = match text("ZOTERO_LIBRARY_TYPE").as_deref() {
            None | Some("user") => LibraryType::User,
            Some("group") => LibraryType::Group,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "ZOTERO_LIBRARY_TYPE",
                    value: other.to_string(),
                });
            }
        };

        let candidates = parse_var(&text, "PAPER_FINDER_RANK_CANDIDATES")?
            .unwrap_or(DEFAULT_RANK_CANDIDATES);
        let concurrency: usize = parse_var(&text, "PAPER_FINDER_RANK_CONCURRENCY")?
            .unwrap_or(DEFAULT_RANK_CONCURRENCY);
        if concurrency == 0 {
            return Err(ConfigError::Invalid {
                var: "PAPER_FINDER_RANK_CONCURRENCY",
                value: "0".into(),
            });
        }
        let timeout_secs: u64 =
            parse_var(&text, "PAPER_FINDER_TIMEOUT_SECS")?.unwrap_or(DEFAULT_TIMEOUT_SECS);

        Ok(Self {
            ai_credential: secret("OPENAI_API_KEY"),
            ai_base_url: text("OPENAI_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.ai_base_url),
            chat_model: text("OPENAI_CHAT_MODEL").unwrap_or(defaults.chat_model),
            embedding_model: text("OPENAI_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            ref_credential: secret("ZOTERO_API_KEY"),
            ref_user_id: text("ZOTERO_USER_ID"),
            ref_library_type,
            ref_collection: text("ZOTERO_COLLECTION"),
            semantic_scholar_key: secret("SEMANTIC_SCHOLAR_API_KEY"),
            rank: RankSettings {
                candidates,
                concurrency,
            },
            timeout: Duration::from_secs(timeout_secs.max(1)),
            session_path: text("PAPER_FINDER_SESSION")
                .map(PathBuf::from)
                .unwrap_or(defaults.session_path),
        })
    }

    pub fn has_ai(&self) -> bool {
        self.ai_credential.is_some()
    }

    pub fn has_reference_manager(&self) -> bool {
        self.ref_credential.is_some() && self.ref_user_id.is_some()
    }
}

fn parse_var<T: FromStr>(
    text: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    text(var)
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|_| ConfigError::Invalid { var, value })
        })
        .transpose()
}

/// Template values copied from `.env.example` count as unset.
fn is_placeholder(value: &str) -> bool {
    value.starts_with("your_") && value.ends_with("_here")
}
