/// Runtime configuration read from the environment (optionally a `.env` file).
use std::path::PathBuf;

use harvest_shared::errors::HarvestError;
use harvest_shared::gate::DEFAULT_MAX_CONCURRENT;

use crate::coordinator::DEFAULT_RETRY_LIMIT;

pub const DEFAULT_SESSION_FILE: &str = "session.session";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_id: i32,
    pub api_hash: String,
    /// Channel username without a leading `@`.
    pub channel_username: String,
    pub download_folder: PathBuf,
    pub log_file: PathBuf,
    pub max_concurrent: usize,
    pub retry_limit: u32,
    pub session_file: PathBuf,
    pub phone: Option<String>,
}

impl Config {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, HarvestError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, HarvestError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| HarvestError::Config(format!("{} must be set", key)))
        };

        let api_id = parse_number::<i32>("API_ID", &required("API_ID")?)?;
        let api_hash = required("API_HASH")?;
        let channel_username = required("CHANNEL_USERNAME")?
            .trim_start_matches('@')
            .to_string();
        let download_folder = PathBuf::from(required("DOWNLOAD_FOLDER")?);
        let log_file = PathBuf::from(required("LOG_FILE")?);

        let max_concurrent = match get("MAX_CONCURRENT_DOWNLOADS") {
            Some(v) => parse_number::<usize>("MAX_CONCURRENT_DOWNLOADS", &v)?,
            None => DEFAULT_MAX_CONCURRENT,
        };
        let retry_limit = match get("RETRY_LIMIT") {
            Some(v) => parse_number::<u32>("RETRY_LIMIT", &v)?,
            None => DEFAULT_RETRY_LIMIT,
        };
        if max_concurrent == 0 {
            return Err(HarvestError::Config("MAX_CONCURRENT_DOWNLOADS must be at least 1".into()));
        }
        if retry_limit == 0 {
            return Err(HarvestError::Config("RETRY_LIMIT must be at least 1".into()));
        }

        Ok(Self {
            api_id,
            api_hash,
            channel_username,
            download_folder,
            log_file,
            max_concurrent,
            retry_limit,
            session_file: get("SESSION_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE)),
            phone: get("TELEGRAM_PHONE"),
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, HarvestError> {
    value
        .parse()
        .map_err(|_| HarvestError::Config(format!("{} is not a valid number: {:?}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const BASE: &[(&str, &str)] = &[
        ("API_ID", "12345"),
        ("API_HASH", "abcdef"),
        ("CHANNEL_USERNAME", "@pdf_library"),
        ("DOWNLOAD_FOLDER", "./pdfs"),
        ("LOG_FILE", "logs/harvest.log"),
    ];

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_lookup(lookup(BASE)).unwrap();
        assert_eq!(config.api_id, 12345);
        assert_eq!(config.channel_username, "pdf_library");
        assert_eq!(config.max_concurrent, 5);
        assert_eq!(config.retry_limit, 3);
        assert_eq!(config.session_file, PathBuf::from("session.session"));
        assert!(config.phone.is_none());
    }

    #[test]
    fn test_missing_required_is_fatal() {
        for skip in ["API_ID", "API_HASH", "CHANNEL_USERNAME", "DOWNLOAD_FOLDER", "LOG_FILE"] {
            let pairs: Vec<_> = BASE.iter().copied().filter(|(k, _)| *k != skip).collect();
            let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
            assert!(err.to_string().contains(skip), "error should name {}: {}", skip, err);
        }
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let mut pairs = BASE.to_vec();
        pairs.retain(|(k, _)| *k != "API_HASH");
        pairs.push(("API_HASH", "   "));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        let mut pairs = BASE.to_vec();
        pairs.retain(|(k, _)| *k != "API_ID");
        pairs.push(("API_ID", "not-a-number"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());

        let mut pairs = BASE.to_vec();
        pairs.push(("MAX_CONCURRENT_DOWNLOADS", "0"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());

        let mut pairs = BASE.to_vec();
        pairs.push(("RETRY_LIMIT", "0"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn test_overrides() {
        let mut pairs = BASE.to_vec();
        pairs.extend([
            ("MAX_CONCURRENT_DOWNLOADS", "8"),
            ("RETRY_LIMIT", "5"),
            ("SESSION_FILE", "/var/lib/harvest/tg.session"),
            ("TELEGRAM_PHONE", "+15550100"),
        ]);
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.max_concurrent, 8);
        assert_eq!(config.retry_limit, 5);
        assert_eq!(config.session_file, PathBuf::from("/var/lib/harvest/tg.session"));
        assert_eq!(config.phone.as_deref(), Some("+15550100"));
    }
}
