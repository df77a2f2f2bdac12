use log::info;
use std::env;
use std::fmt::Display;
use std::str::FromStr;

use crate::error::ConfigError;

const DEFAULT_DATABASE_URL: &str = "sqlite:photo_duel.db";
const DEFAULT_TOTAL_VOTE_LIMIT: u32 = 50;
const DEFAULT_DAILY_VOTE_LIMIT: u32 = 10;

/// Per user, per contest vote budgets enforced by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteLimits {
    pub total: u32,
    pub daily: u32,
}

impl Default for VoteLimits {
    fn default() -> Self {
        Self {
            total: DEFAULT_TOTAL_VOTE_LIMIT,
            daily: DEFAULT_DAILY_VOTE_LIMIT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub database_url: String,
    pub vote_limits: VoteLimits,
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let discord_token = lookup("DISCORD_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;

        let database_url = lookup("DATABASE_URL").unwrap_or_else(|| {
            info!("DATABASE_URL not set, using default: {}", DEFAULT_DATABASE_URL);
            DEFAULT_DATABASE_URL.to_string()
        });

        let vote_limits = VoteLimits {
            total: parse_or(&lookup, "TOTAL_VOTE_LIMIT", DEFAULT_TOTAL_VOTE_LIMIT)?,
            daily: parse_or(&lookup, "DAILY_VOTE_LIMIT", DEFAULT_DAILY_VOTE_LIMIT)?,
        };

        Ok(Self {
            discord_token,
            database_url,
            vote_limits,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        None => {
            info!("{} not set, using default: {}", key, default);
            Ok(default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_token_is_set() {
        let config = Config::from_lookup(lookup_from(&[("DISCORD_TOKEN", "abc")])).unwrap();
        assert_eq!(config.discord_token, "abc");
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.vote_limits, VoteLimits::default());
    }

    #[test]
    fn limits_are_read_from_environment() {
        let config = Config::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "abc"),
            ("DATABASE_URL", "sqlite::memory:"),
            ("TOTAL_VOTE_LIMIT", "200"),
            ("DAILY_VOTE_LIMIT", " 25 "),
        ]))
        .unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.vote_limits, VoteLimits { total: 200, daily: 25 });
    }

    #[test]
    fn missing_token_is_an_error() {
        let result = Config::from_lookup(lookup_from(&[("DISCORD_TOKEN", "  ")]));
        assert!(matches!(result, Err(ConfigError::Missing("DISCORD_TOKEN"))));
    }

    #[test]
    fn unparsable_limit_is_an_error() {
        let result = Config::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "abc"),
            ("DAILY_VOTE_LIMIT", "lots"),
        ]));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { key: "DAILY_VOTE_LIMIT", .. })
        ));
    }
}
