use std::env;
use std::path::PathBuf;

use crate::models::Provider;

pub const DEFAULT_INGEST_DAILY_CAP: i64 = 2;
pub const DEFAULT_OPENAI_DAILY_CAP: i64 = 10;

/// Everything read from the environment, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub ollama_base_url: Option<String>,
    pub ollama_model: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
    /// `RANK_PROVIDER`; unset defaults to ollama, unrecognized values are
    /// kept as `Err(raw)` so ranking can report them.
    pub rank_provider: Result<Provider, String>,
    pub ingest_daily_cap: i64,
    pub openai_daily_cap: i64,
    pub web3_token: Option<String>,
    pub db_path: Option<PathBuf>,
    pub profile_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            ollama_base_url: non_empty(env::var("OLLAMA_BASE_URL").ok()),
            ollama_model: non_empty(env::var("OLLAMA_MODEL").ok()),
            openai_api_key: non_empty(env::var("OPENAI_API_KEY").ok()),
            openai_model: non_empty(env::var("OPENAI_MODEL").ok()),
            rank_provider: parse_rank_provider(env::var("RANK_PROVIDER").ok().as_deref()),
            ingest_daily_cap: parse_cap(
                env::var("INGEST_DAILY_CAP").ok().as_deref(),
                DEFAULT_INGEST_DAILY_CAP,
            ),
            openai_daily_cap: parse_cap(
                env::var("OPENAI_DAILY_CAP").ok().as_deref(),
                DEFAULT_OPENAI_DAILY_CAP,
            ),
            web3_token: non_empty(env::var("WEB3_CAREER_TOKEN").ok()),
            db_path: non_empty(env::var("PURSUIT_DB").ok()).map(PathBuf::from),
            profile_path: non_empty(env::var("PURSUIT_PROFILE").ok()).map(PathBuf::from),
        }
    }

    pub fn ollama_configured(&self) -> bool {
        self.ollama_base_url.is_some() && self.ollama_model.is_some()
    }

    pub fn openai_configured(&self) -> bool {
        self.openai_api_key.is_some() && self.openai_model.is_some()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Non-numeric values fall back to the default; negatives clamp to 0
/// (a zero cap disables the governed operation).
fn parse_cap(raw: Option<&str>, default: i64) -> i64 {
    match raw.map(str::trim) {
        None | Some("") => default,
        Some(value) => match value.parse::<f64>() {
            Ok(parsed) if parsed.is_finite() => (parsed.floor() as i64).max(0),
            _ => default,
        },
    }
}

fn parse_rank_provider(raw: Option<&str>) -> Result<Provider, String> {
    match raw.map(str::trim) {
        None | Some("") => Ok(Provider::Ollama),
        Some(value) => Provider::parse(value).ok_or_else(|| value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_parsing_defaults_and_clamps() {
        assert_eq!(parse_cap(None, 2), 2);
        assert_eq!(parse_cap(Some(""), 2), 2);
        assert_eq!(parse_cap(Some("5"), 2), 5);
        assert_eq!(parse_cap(Some(" 3 "), 2), 3);
        assert_eq!(parse_cap(Some("4.9"), 2), 4);
        assert_eq!(parse_cap(Some("-1"), 2), 0);
        assert_eq!(parse_cap(Some("many"), 2), 2);
    }

    #[test]
    fn rank_provider_defaults_to_ollama() {
        assert_eq!(parse_rank_provider(None), Ok(Provider::Ollama));
        assert_eq!(parse_rank_provider(Some("")), Ok(Provider::Ollama));
        assert_eq!(parse_rank_provider(Some("openai")), Ok(Provider::OpenAi));
        assert_eq!(parse_rank_provider(Some("OLLAMA")), Ok(Provider::Ollama));
        assert_eq!(
            parse_rank_provider(Some("bedrock")),
            Err("bedrock".to_string())
        );
    }

    #[test]
    fn blank_values_count_as_unset() {
        assert_eq!(non_empty(Some("  ".to_string())), None);
        assert_eq!(non_empty(Some(" x ".to_string())), Some("x".to_string()));
        assert_eq!(non_empty(None), None);
    }
}
