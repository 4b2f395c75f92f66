use std::{collections::HashMap, env, path::Path, time::Duration};

use crate::{errors::Error, Result};

/// Typed configuration for the bridge and its hosts.
#[derive(Clone, Debug)]
pub struct Config {
    // Dispatch policy
    pub cancel_superseded: bool,

    // Logging
    pub log_ansi: bool,

    // Host driver
    pub loopback_latency: Duration,
    pub drain_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cancel_superseded: false,
            log_ansi: true,
            loopback_latency: Duration::ZERO,
            drain_timeout: Duration::from_millis(5_000),
        }
    }
}

impl Config {
    /// Environment first, then an optional `.env` in the working directory.
    pub fn load() -> Result<Self> {
        Self::load_with_dotenv(Path::new(".env"))
    }

    fn load_with_dotenv(path: &Path) -> Result<Self> {
        let file = read_dotenv(path)?;
        Self::from_lookup(|key| env::var(key).ok().or_else(|| file.get(key).cloned()))
    }

    /// Build a config from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let cancel_superseded =
            env_flag(&lookup, "MCB_CANCEL_SUPERSEDED")?.unwrap_or(defaults.cancel_superseded);
        let log_ansi = env_flag(&lookup, "MCB_LOG_ANSI")?.unwrap_or(defaults.log_ansi);

        let loopback_latency = env_millis(&lookup, "MCB_LOOPBACK_LATENCY_MS")?
            .unwrap_or(defaults.loopback_latency);
        let drain_timeout =
            env_millis(&lookup, "MCB_DRAIN_TIMEOUT_MS")?.unwrap_or(defaults.drain_timeout);

        Ok(Self {
            cancel_superseded,
            log_ansi,
            loopback_latency,
            drain_timeout,
        })
    }
}

/// Variables from a dotenv file, without touching the process environment.
/// A missing file is not an error.
fn read_dotenv(path: &Path) -> Result<HashMap<String, String>> {
    let config_err = |e: dotenvy::Error| Error::Config(format!("{}: {e}", path.display()));
    match dotenvy::from_path_iter(path) {
        Ok(iter) => iter.map(|item| item.map_err(config_err)).collect(),
        Err(e) if e.not_found() => Ok(HashMap::new()),
        Err(e) => Err(config_err(e)),
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

fn env_flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<bool>> {
    let Some(raw) = non_empty(lookup, key) else {
        return Ok(None);
    };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(Error::Config(format!("{key} must be a boolean, got `{raw}`"))),
    }
}

fn env_millis(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<Duration>> {
    let Some(raw) = non_empty(lookup, key) else {
        return Ok(None);
    };
    raw.parse::<u64>()
        .map(|ms| Some(Duration::from_millis(ms)))
        .map_err(|e| Error::Config(format!("{key} must be a number of milliseconds: {e}")))
}
