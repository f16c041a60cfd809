use log::warn;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// Extra headers from the `gitlabAdditionalHeaders` configuration key,
/// in the order they were configured.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HeaderSet(Vec<(String, String)>);

impl HeaderSet {
    /// Parse `NAME=value,NAME=value`. Segments without `=` are skipped.
    pub fn parse(raw: &str) -> Self {
        Self(
            raw.split(',')
                .filter_map(|segment| segment.split_once('='))
                .map(|(name, value)| (name.trim(), value.trim()))
                .filter(|(name, _)| !name.is_empty())
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Set every header on `headers`, replacing existing values with the same name.
    /// Names or values that are not valid in HTTP are logged and left out.
    pub fn apply(&self, headers: &mut HeaderMap) {
        for (name, value) in self.iter() {
            let parsed = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            );
            match parsed {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!("Skipping invalid additional header {name}"),
            }
        }
    }
}
