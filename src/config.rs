//! Configuration file management.
//!
//! Named configuration values are read from a TOML file (`.vaultvar.toml`
//! by default). Values may be overridden by `VAULTVAR_<NAME>` environment
//! variables.

use std::path::Path;
use std::str::FromStr;

use tracing::debug;

use crate::error::{ErrorCategory, ErrorKind, Result, VaultvarError};

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".vaultvar.toml";

/// Configuration key naming the secret file.
pub const VAULT_PATH_KEY: &str = "vault_path";

/// Secret file used when `vault_path` is not configured.
pub const DEFAULT_VAULT_PATH: &str = "vault";

/// Configuration key for the display width of listed entries.
pub const WIDTH_KEY: &str = "width";

/// Configuration key for the indentation unit of cipher blocks.
pub const INDENT_KEY: &str = "indent";

const DEFAULT_WIDTH: usize = 80;
const DEFAULT_INDENT: usize = 4;

const ENV_PREFIX: &str = "VAULTVAR_";

/// Read access to named configuration values.
pub trait ConfigSource {
    fn value(&self, name: &str) -> Option<String>;
}

#[derive(Debug, Default, Clone)]
pub struct Config {
    values: toml::Table,
}

impl Config {
    /// Loads the configuration at `path`. The file must exist.
    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading config");
        let text = std::fs::read_to_string(path).map_err(|e| {
            VaultvarError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::Config,
                format!("failed to read config {}", path.display()),
                e,
            )
        })?;
        text.parse::<Config>()
            .map_err(|e| e.with_context(format!("invalid config {}", path.display())))
    }

    /// Loads `path` if given, else the default file if present, else empty.
    pub fn discover(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::load(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Applies `VAULTVAR_<NAME>` overrides from the given variables.
    pub fn apply_env(&mut self, vars: impl IntoIterator<Item = (String, String)>) {
        for (name, value) in vars {
            if let Some(key) = name.strip_prefix(ENV_PREFIX) {
                if key.is_empty() || key == "LOG" {
                    continue;
                }
                debug!(key = %key.to_lowercase(), "config overridden from environment");
                self.values
                    .insert(key.to_lowercase(), toml::Value::String(value));
            }
        }
    }

    /// Width available to listed entries.
    pub fn width(&self) -> Result<usize> {
        self.usize_value(WIDTH_KEY, DEFAULT_WIDTH)
    }

    /// Indentation unit for cipher block lines.
    pub fn indent(&self) -> Result<usize> {
        self.usize_value(INDENT_KEY, DEFAULT_INDENT)
    }

    fn usize_value(&self, name: &str, default: usize) -> Result<usize> {
        let invalid = || {
            VaultvarError::with_kind(
                ErrorCategory::User,
                ErrorKind::Config,
                format!("config value {} must be a positive integer", name),
            )
        };
        match self.values.get(name) {
            None => Ok(default),
            Some(toml::Value::Integer(n)) => usize::try_from(*n)
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(invalid),
            Some(toml::Value::String(s)) => {
                s.trim().parse::<usize>().ok().filter(|n| *n > 0).ok_or_else(invalid)
            }
            Some(_) => Err(invalid()),
        }
    }
}

impl FromStr for Config {
    type Err = VaultvarError;

    fn from_str(s: &str) -> Result<Self> {
        let values = toml::from_str::<toml::Table>(s).map_err(|e| {
            VaultvarError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::Config,
                format!("failed to parse config: {}", e.message()),
                e,
            )
        })?;
        Ok(Self { values })
    }
}

impl ConfigSource for Config {
    fn value(&self, name: &str) -> Option<String> {
        match self.values.get(name)? {
            toml::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}
