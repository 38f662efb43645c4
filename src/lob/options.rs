use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest in-memory threshold a LOB is created with.
pub const DEFAULT_BUF_SIZE: usize = 4096;
/// Largest in-memory threshold a LOB is created with.
pub const MAX_BUF_SIZE: usize = 32768;

/// Configuration for LOB storage owned by a [`super::LobSession`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LobOptions {
    /// Promotion threshold for LOBs created empty or from small seeds.
    pub default_buffer_size: usize,
    /// Upper bound for the promotion threshold of seeded LOBs.
    pub max_buffer_size: usize,
    /// Directory for spilled LOB files; the system temp dir when unset.
    pub temp_dir: Option<PathBuf>,
    /// File name prefix for spilled LOB files.
    pub temp_prefix: String,
}

impl Default for LobOptions {
    fn default() -> Self {
        Self {
            default_buffer_size: DEFAULT_BUF_SIZE,
            max_buffer_size: MAX_BUF_SIZE,
            temp_dir: None,
            temp_prefix: "lob".to_string(),
        }
    }
}

impl LobOptions {
    /// Sets the default promotion threshold.
    pub fn default_buffer_size(mut self, bytes: usize) -> Self {
        self.default_buffer_size = bytes;
        self
    }

    /// Sets the maximum promotion threshold.
    pub fn max_buffer_size(mut self, bytes: usize) -> Self {
        self.max_buffer_size = bytes;
        self
    }

    /// Sets the directory used for spilled LOB files.
    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Sets the file name prefix used for spilled LOB files.
    pub fn temp_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.temp_prefix = prefix.into();
        self
    }

    /// Directory that receives spilled LOB files.
    pub fn resolved_temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Promotion threshold for a LOB seeded with `initial_len` bytes.
    pub fn buffer_size_for(&self, initial_len: usize) -> usize {
        initial_len
            .max(self.default_buffer_size)
            .min(self.max_buffer_size)
    }

    /// Checks that the thresholds are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "default_buffer_size must be greater than zero",
            ));
        }
        if self.max_buffer_size < self.default_buffer_size {
            return Err(ConfigError::Invalid(
                "max_buffer_size must not be smaller than default_buffer_size",
            ));
        }
        Ok(())
    }

    /// Parses options from a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let options: LobOptions =
            toml::from_str(contents).map_err(|source| ConfigError::Parse {
                origin: "<inline>".to_string(),
                source,
            })?;
        options.validate()?;
        Ok(options)
    }

    /// Loads options from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let options: LobOptions =
            toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                origin: path.display().to_string(),
                source,
            })?;
        options.validate()?;
        Ok(options)
    }
}

/// Errors raised while loading [`LobOptions`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read LOB config {path}: {source}")]
    Read {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The configuration is not valid TOML for [`LobOptions`].
    #[error("failed to parse LOB config {origin}: {source}")]
    Parse {
        /// File being parsed, or `<inline>` for in-memory documents.
        origin: String,
        /// Underlying parse error.
        source: toml::de::Error,
    },
    /// The values parsed but are inconsistent.
    #[error("invalid LOB config: {0}")]
    Invalid(&'static str),
}
