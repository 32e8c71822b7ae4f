//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::game::tuning::{MatchTuning, TuningError};

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origin for CORS (any origin when unset)
    pub client_origin: Option<String>,

    /// Directory of topic JSON files
    pub question_library_dir: PathBuf,

    /// Remote data service; the local library is used when absent
    pub supabase: Option<SupabaseConfig>,

    /// Tuning applied when a start request carries none
    pub tuning: MatchTuning,
}

/// Supabase credentials (server only)
#[derive(Clone, Debug)]
pub struct SupabaseConfig {
    /// Supabase project URL
    pub url: String,
    /// Supabase service role key (bypasses RLS - server only!)
    pub service_role_key: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Render provides PORT env var, fall back to SERVER_ADDR or default
        let server_addr = if let Some(port) = lookup("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string())
        };

        let supabase = match (lookup("SUPABASE_URL"), lookup("SUPABASE_SERVICE_ROLE_KEY")) {
            (Some(url), Some(service_role_key)) => Some(SupabaseConfig {
                url,
                service_role_key,
            }),
            (Some(_), None) => return Err(ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY")),
            (None, Some(_)) => return Err(ConfigError::Missing("SUPABASE_URL")),
            (None, None) => None,
        };

        let defaults = MatchTuning::default();
        let tuning = MatchTuning {
            winning_threshold: parse_or(&lookup, "MATCH_WINNING_THRESHOLD", defaults.winning_threshold)?,
            round_duration: parse_or(&lookup, "MATCH_ROUND_DURATION", defaults.round_duration)?,
            mass: parse_or(&lookup, "MATCH_MASS", defaults.mass)?,
            friction: parse_or(&lookup, "MATCH_FRICTION", defaults.friction)?,
            pull_force_multiplier: parse_or(&lookup, "MATCH_PULL_FORCE", defaults.pull_force_multiplier)?,
        }
        .validated()?;

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            client_origin: lookup("CLIENT_ORIGIN"),

            question_library_dir: lookup("QUESTION_LIBRARY_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/topics")),

            supabase,
            tuning,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid match tuning: {0}")]
    Tuning(#[from] TuningError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = load(&[]).expect("config");
        assert_eq!(config.server_addr.port(), 8080);
        assert_eq!(config.log_level, "info");
        assert!(config.supabase.is_none());
        assert!(config.client_origin.is_none());
        assert_eq!(config.question_library_dir, PathBuf::from("data/topics"));
        assert_eq!(config.tuning, MatchTuning::default());
    }

    #[test]
    fn port_overrides_server_addr() {
        let config = load(&[("PORT", "3000"), ("SERVER_ADDR", "127.0.0.1:9000")]).expect("config");
        assert_eq!(config.server_addr.port(), 3000);
    }

    #[test]
    fn supabase_needs_both_values() {
        let err = load(&[("SUPABASE_URL", "https://x.supabase.co")]).expect_err("partial");
        assert!(matches!(err, ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY")));

        let config = load(&[
            ("SUPABASE_URL", "https://x.supabase.co"),
            ("SUPABASE_SERVICE_ROLE_KEY", "secret"),
        ])
        .expect("config");
        assert_eq!(
            config.supabase.map(|s| s.url),
            Some("https://x.supabase.co".to_string())
        );
    }

    #[test]
    fn tuning_is_parsed_and_validated() {
        let config = load(&[("MATCH_WINNING_THRESHOLD", "20"), ("MATCH_ROUND_DURATION", "10")])
            .expect("config");
        assert_eq!(config.tuning.winning_threshold, 20.0);
        assert_eq!(config.tuning.round_duration, 10);

        let err = load(&[("MATCH_MASS", "heavy")]).expect_err("unparseable");
        assert!(matches!(err, ConfigError::Invalid("MATCH_MASS")));

        let err = load(&[("MATCH_FRICTION", "2")]).expect_err("out of range");
        assert!(matches!(err, ConfigError::Tuning(TuningError::Friction(_))));
    }
}
