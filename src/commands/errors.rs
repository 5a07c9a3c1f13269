use crate::config::ConfigError;
use crate::openai::AiError;
use crate::search::SessionError;
use crate::zotero::ZoteroError;

/// Failures a command reports to the user. Search-stage degradations never end up here.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{0}")]
    InvalidArgs(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Ai(#[from] AiError),

    #[error("{0}")]
    Zotero(#[from] ZoteroError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("cannot write {path}: {source}")]
    Output {
        path: String,
        source: std::io::Error,
    },

    #[error("could not build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Nothing(&'static str),
}

impl CommandError {
    /// One-line hint shown after the error, when there is an obvious fix.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            CommandError::Ai(AiError::ApiKeyNotSet) => {
                Some("Set OPENAI_API_KEY in the environment or a .env file.")
            }
            CommandError::Ai(AiError::RateLimited) | CommandError::Zotero(ZoteroError::RateLimited) => {
                Some("The service is rate limiting requests; wait a minute and retry.")
            }
            CommandError::Zotero(ZoteroError::NotConfigured) => {
                Some("Create a key at https://www.zotero.org/settings/keys and set ZOTERO_USER_ID.")
            }
            CommandError::Session(SessionError::Missing(_)) => {
                Some("Run `paper-finder search <query>` before `push`.")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_ai_key_has_hint() {
        let err = CommandError::from(AiError::ApiKeyNotSet);
        assert!(err.hint().unwrap().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn zotero_not_configured_has_hint() {
        let err = CommandError::from(ZoteroError::NotConfigured);
        assert!(err.to_string().contains("ZOTERO_API_KEY"));
        assert!(err.hint().is_some());
    }

    #[test]
    fn api_errors_have_no_hint() {
        let err = CommandError::from(ZoteroError::Api {
            code: 500,
            message: "oops".into(),
        });
        assert_eq!(err.hint(), None);
    }
}
