use std::collections::HashMap;
use std::ffi::OsString;
use std::path::Path;
use log::{debug, info, warn};
use thiserror::Error;

/// Well-known runtime configuration keys, in their camelCase form.
pub mod keys {
    /// Base URL of the GitLab project API, e.g. `https://gitlab.example.com/api/v4/projects/42`.
    pub const GITLAB_URL: &str = "gitlabUrl";
    /// Comma separated `name=value` list of headers sent with every outbound request.
    pub const GITLAB_ADDITIONAL_HEADERS: &str = "gitlabAdditionalHeaders";
    /// Generic package project name.
    pub const GITLAB_PROJECT: &str = "gitlabProject";
    /// Full upload URL with a `%s` placeholder for the version.
    pub const GITLAB_UPLOAD_URL: &str = "gitlabUploadUrl";
    pub const GITLAB_PIPELINE_REF: &str = "gitlabPipelineRef";
    pub const GITLAB_PIPELINE_ENABLED: &str = "gitlabPipelineEnabled";
    pub const VERSIONING_POLICY: &str = "versioningPolicy";
    pub const NAMING_SCHEME: &str = "namingScheme";
}

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("required configuration key '{0}' is not set")]
    Missing(&'static str),

    #[error("configuration key '{key}' has unsupported value '{value}'")]
    Invalid {
        key: &'static str,
        value: String,
    },
}

/// Immutable key/value configuration, resolved once at startup.
#[derive(Debug, Default, Clone)]
pub struct RuntimeConfig {
    values: HashMap<String, String>,
}

impl RuntimeConfig {
    /// Resolve configuration from the process environment and `config_dir`.
    pub fn from_env(env_prefix: &str, config_dir: &Path) -> Self {
        Self::resolve(env_prefix, std::env::vars_os(), config_dir)
    }

    /// Environment values are read first, then every file in `config_dir`.
    /// File values win when both produce the same key.
    pub fn resolve<I>(env_prefix: &str, vars: I, config_dir: &Path) -> Self
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let mut cfg = Self::default();
        cfg.merge_env(env_prefix, vars);
        cfg.merge_dir(config_dir);
        cfg
    }

    /// Variables whose name or value is not valid UTF-8 are skipped.
    fn merge_env<I>(&mut self, env_prefix: &str, vars: I)
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        for (name, value) in vars {
            let (name, value) = match (name.into_string(), value.into_string()) {
                (Ok(name), Ok(value)) => (name, value),
                (name, _) => {
                    debug!("Skipping environment variable that is not valid UTF-8: {name:?}");
                    continue;
                }
            };
            let Some(suffix) = name.strip_prefix(env_prefix) else {
                continue;
            };
            let key = to_camel_case(suffix);
            info!("Environment variable {name} found and used in configuration as {key}");
            self.values.insert(key, value);
        }
    }

    fn merge_dir(&mut self, config_dir: &Path) {
        let entries = match std::fs::read_dir(config_dir) {
            Ok(entries) => entries,
            Err(err) => {
                debug!("Configuration directory {} not used: {err}", config_dir.display());
                return;
            }
        };

        for entry in entries.flatten() {
            let file_name = entry.file_name().to_string_lossy().to_string();
            if file_name.starts_with('.') {
                continue;
            }
            // Follows symlinks, so mounted ConfigMap entries count as files.
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let contents = match std::fs::read_to_string(&path) {
                Ok(contents) => contents,
                Err(err) => {
                    warn!("Skipping configuration file {}: {err}", path.display());
                    continue;
                }
            };

            let key = to_camel_case(&file_name.to_uppercase());
            if self.values.contains_key(&key) {
                warn!("Key {key} already exists in configuration, overwriting with value from file {file_name}");
            }
            info!("File {file_name} found and used in configuration as {key}");
            self.values
                .insert(key, contents.trim_end_matches(['\r', '\n']).to_string());
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn require(&self, key: &'static str) -> Result<&str, Error> {
        self.get(key).ok_or(Error::Missing(key))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RuntimeConfig {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// `GITLAB_ADDITIONAL_HEADERS` becomes `gitlabAdditionalHeaders`.
pub fn to_camel_case(s: &str) -> String {
    s.split('_')
        .enumerate()
        .map(|(i, segment)| {
            let lower = segment.to_lowercase();
            if i == 0 {
                return lower;
            }
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect()
}
