//! Layered configuration loading: defaults, then a TOML file, then the
//! environment.

use std::ffi::OsString;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::ForgeConfig;

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "FORGE_";

const ENV_ALLOW: &str = "FORGE_DISCOVERY_ALLOW";
const ENV_DENY: &str = "FORGE_DISCOVERY_DENY";
const ENV_MAX_CONCURRENCY: &str = "FORGE_MAX_CONCURRENCY";
const ENV_TIMEOUT_MS: &str = "FORGE_TIMEOUT_MS";
const ENV_LOG_FILTER: &str = "FORGE_LOG_FILTER";

/// Builds a [`ForgeConfig`] from its layers.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    path: Option<PathBuf>,
    use_env: bool,
}

impl ConfigLoader {
    /// Creates a loader that starts from defaults and reads the environment.
    #[must_use]
    pub fn new() -> Self {
        Self {
            path: None,
            use_env: true,
        }
    }

    /// Reads the TOML file at `path` on top of the defaults.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Skips `FORGE_*` environment overrides.
    #[must_use]
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    /// Loads the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed, or an
    /// environment override is malformed.
    pub fn load(&self) -> ConfigResult<ForgeConfig> {
        let mut config = match &self.path {
            Some(path) => read_file(path)?,
            None => ForgeConfig::default(),
        };
        if self.use_env {
            apply_overrides(
                &mut config,
                forge_vars(std::env::vars_os()),
            )?;
        }
        Ok(config)
    }
}

impl std::str::FromStr for ForgeConfig {
    type Err = ConfigError;

    fn from_str(source: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(source)?)
    }
}

/// Keeps the `FORGE_*` variables. Entries that are not valid UTF-8 are
/// skipped.
fn forge_vars<I>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter().filter_map(|(key, value)| {
        let key = key.into_string().ok()?;
        if !key.starts_with(ENV_PREFIX) {
            return None;
        }
        match value.into_string() {
            Ok(value) => Some((key, value)),
            Err(_) => {
                warn!(key, "ignoring non UTF-8 environment override");
                None
            }
        }
    })
}

fn read_file(path: &Path) -> ConfigResult<ForgeConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "loaded config file");
    content.parse()
}

/// Applies `FORGE_*` overrides from `vars` to `config`.
///
/// Unknown `FORGE_*` keys are ignored.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidOverride`] when a value cannot be parsed.
pub fn apply_overrides<I, K, V>(config: &mut ForgeConfig, vars: I) -> ConfigResult<()>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    for (key, value) in vars {
        let (key, value) = (key.as_ref(), value.as_ref());
        match key {
            ENV_ALLOW => config.discovery.allow = split_list(value),
            ENV_DENY => config.discovery.deny = split_list(value),
            ENV_MAX_CONCURRENCY => {
                config.scheduler.max_concurrency = value
                    .trim()
                    .parse::<NonZeroUsize>()
                    .map_err(|err| invalid(key, value, &err))?;
            }
            ENV_TIMEOUT_MS => {
                config.invocation.timeout_ms = if value.trim().is_empty() {
                    None
                } else {
                    Some(
                        value
                            .trim()
                            .parse::<u64>()
                            .map_err(|err| invalid(key, value, &err))?,
                    )
                };
            }
            ENV_LOG_FILTER => config.telemetry.log_filter = value.to_owned(),
            _ => continue,
        }
        debug!(key, "applied environment override");
    }
    Ok(())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

fn invalid(key: &str, value: &str, err: &dyn std::fmt::Display) -> ConfigError {
    ConfigError::InvalidOverride {
        key: key.to_owned(),
        value: value.to_owned(),
        reason: err.to_string(),
    }
}
