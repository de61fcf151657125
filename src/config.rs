use std::env;
use std::time::Duration;

/// Time the user has to answer questions.
pub const TIME_LIMIT_SECONDS: u64 = 60;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be a whole number, got {value:?}")]
    NotANumber { key: &'static str, value: String },
    #[error("{key} must be greater than 0")]
    Zero { key: &'static str },
}

/// Settings read from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Enables the ChatGPT problem source when present.
    pub api_key: Option<String>,
    pub time_limit: Duration,
    /// Fixed seed for reproducible problem sheets.
    pub seed: Option<u64>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = lookup("CHATGPT_API_KEY").filter(|key| !key.trim().is_empty());

        let time_limit = match number(&lookup, "DRILL_TIME_LIMIT_SECS")? {
            Some(0) => return Err(ConfigError::Zero { key: "DRILL_TIME_LIMIT_SECS" }),
            Some(secs) => secs,
            None => TIME_LIMIT_SECONDS,
        };
        let seed = number(&lookup, "DRILL_SEED")?;

        Ok(Self {
            api_key,
            time_limit: Duration::from_secs(time_limit),
            seed,
        })
    }
}

fn number(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<u64>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::NotANumber { key, value }),
    }
}
