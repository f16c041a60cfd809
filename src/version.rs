use std::str::FromStr;
use chrono::{Datelike, Timelike};
use crate::report::{self, TimestampError};

/// Major version of every timestamp-derived package version.
const TIMESTAMP_MAJOR: u32 = 25;

/// Prefix of every content-hash-derived package version.
const CONTENT_HASH_PREFIX: &str = "v1.0.0";

const CONTENT_HASH_SUFFIX_LENGTH: usize = 8;

/// How package versions are generated. Exactly one policy is active per process.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum VersioningPolicy {
    /// `25.{month}.{day}-{HHMM}` from the report's creation timestamp in UTC.
    /// Reproducible, but two reports created within the same minute collide.
    #[default]
    TimestampDerived,

    /// `v1.0.0-{hash}`, unique on every call.
    ContentHashDerived,
}

impl FromStr for VersioningPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "timestamp" => Ok(Self::TimestampDerived),
            "content-hash" => Ok(Self::ContentHashDerived),
            _ => Err(s.to_string()),
        }
    }
}

impl VersioningPolicy {
    pub fn generate(&self, creation_timestamp: &str, raw_report: &[u8]) -> Result<String, TimestampError> {
        match self {
            Self::TimestampDerived => from_timestamp(creation_timestamp),
            Self::ContentHashDerived => Ok(from_content_hash(raw_report)),
        }
    }
}

pub fn from_timestamp(creation_timestamp: &str) -> Result<String, TimestampError> {
    let timestamp = report::parse_timestamp(creation_timestamp)?;
    Ok(format!(
        "{TIMESTAMP_MAJOR}.{}.{}-{:02}{:02}",
        timestamp.month(),
        timestamp.day(),
        timestamp.hour(),
        timestamp.minute(),
    ))
}

/// Hash 16 fresh random bytes together with the report, so that the same
/// report uploaded twice still gets two distinct versions.
pub fn from_content_hash(raw_report: &[u8]) -> String {
    let seed: [u8; 16] = rand::random();
    let mut data = hex::encode(seed).into_bytes();
    data.extend_from_slice(raw_report);
    let digest = sha256::digest(data);
    format!("{CONTENT_HASH_PREFIX}-{}", &digest[..CONTENT_HASH_SUFFIX_LENGTH])
}
