use std::fmt::Display;
use std::str::FromStr;
use tracing::warn;
use shared::validation::DEFAULT_MAX_SUBMISSIONS_PER_USER;

pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub max_submissions_per_user: usize,
    pub sweep_interval_secs: u64,
    /// Origin prefixes answered with CORS headers.
    pub allowed_origins: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_submissions_per_user: DEFAULT_MAX_SUBMISSIONS_PER_USER,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            allowed_origins: vec![DEFAULT_ALLOWED_ORIGIN.to_string()],
        }
    }
}

impl Settings {
    pub fn from_secrets(secrets: &shuttle_runtime::SecretStore) -> Self {
        Self::from_lookup(|key| secrets.get(key))
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            max_submissions_per_user: positive_or(
                "MAX_SUBMISSIONS_PER_USER",
                lookup("MAX_SUBMISSIONS_PER_USER"),
                defaults.max_submissions_per_user,
            ),
            sweep_interval_secs: positive_or(
                "SWEEP_INTERVAL_SECS",
                lookup("SWEEP_INTERVAL_SECS"),
                defaults.sweep_interval_secs,
            ),
            allowed_origins: lookup("ALLOWED_ORIGINS")
                .map(|raw| split_list(&raw))
                .filter(|origins| !origins.is_empty())
                .unwrap_or(defaults.allowed_origins),
        }
    }
}

fn positive_or<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + PartialOrd + Default + Display + Copy,
{
    let Some(raw) = raw else { return default };
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => value,
        _ => {
            warn!("Ignoring {}={:?}, using {}", key, raw, default);
            default
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
