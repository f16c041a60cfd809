use serde::Deserialize;
use serde_inline_default::serde_inline_default;
use thiserror::Error;

const DEFAULT_CONFIG: &str = include_str!("../../default.toml");

#[derive(Error, Debug)]
pub enum Error {
    #[error("read {path}: {err}")]
    ReadFile {
        err: std::io::Error,
        path: String,
    },

    #[error("deserialize: {0}")]
    Deserialize(#[from] toml::de::Error),
}

/// Process settings, read from a trivy-processor.toml file.
///
/// These describe how the process itself runs. Everything the report
/// pipeline needs to talk to the registry lives in
/// [RuntimeConfig](super::runtime::RuntimeConfig) instead.
#[serde_inline_default]
#[derive(Deserialize, Debug, Clone)]
pub struct File {
    pub description: Option<String>,
    #[serde_inline_default("0.0.0.0:8080".to_string())]
    pub listen: String,
    #[serde_inline_default("TRIVY_PROCESSOR_".to_string())]
    pub env_prefix: String,
    #[serde_inline_default("/etc/trivy-processor".to_string())]
    pub config_dir: String,
    #[serde_inline_default(10)]
    pub http_timeout_secs: u64,
}

impl Default for File {
    fn default() -> Self {
        // The default config is compiled into the program, so
        // make sure to test default() to catch panics compile-time.
        toml::from_str(DEFAULT_CONFIG).expect("built-in default.toml must parse")
    }
}

impl File {
    /// Read a user supplied settings file. Keys missing from the file
    /// fall back to the same values as the built-in defaults.
    pub fn from_path(path: &str) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path).map_err(|err| Error::ReadFile {
            err,
            path: path.to_string(),
        })?;
        Ok(toml::from_str(&contents)?)
    }
}
