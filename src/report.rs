use chrono::{DateTime, Utc};
use thiserror::Error;

const LABEL_NAMESPACE: &str = "trivy-operator.resource.namespace";
const LABEL_KIND: &str = "trivy-operator.resource.kind";
const LABEL_NAME: &str = "trivy-operator.resource.name";
const LABEL_CONTAINER: &str = "trivy-operator.container.name";

#[derive(Error, Debug)]
pub enum Error {
    #[error("deserialize: {0}")]
    Deserialize(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
#[error("creation timestamp '{timestamp}' is not RFC3339: {err}")]
pub struct TimestampError {
    pub timestamp: String,
    pub err: chrono::ParseError,
}

/// The parts of a Trivy report that are used for naming and versioning the package.
///
/// Fields missing from the report are empty strings.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReportDescriptor {
    pub namespace: String,
    pub resource_kind: String,
    pub resource_name: String,
    pub container_name: String,
    /// RFC3339, unvalidated.
    pub creation_timestamp: String,
}

impl ReportDescriptor {
    pub fn parse(raw_report: &[u8]) -> Result<Self, Error> {
        let parsed = serde_json::from_slice::<json::Report>(raw_report)?;
        let metadata = parsed.metadata;
        let label = |name: &str| {
            metadata
                .labels
                .get(name)
                .map(json::string_or_empty)
                .unwrap_or_default()
        };

        Ok(Self {
            namespace: label(LABEL_NAMESPACE),
            resource_kind: label(LABEL_KIND),
            resource_name: label(LABEL_NAME),
            container_name: label(LABEL_CONTAINER),
            creation_timestamp: json::string_or_empty(&metadata.creation_timestamp),
        })
    }

    /// The creation timestamp in UTC. Versions and names are both derived from this.
    pub fn created_at(&self) -> Result<DateTime<Utc>, TimestampError> {
        parse_timestamp(&self.creation_timestamp)
    }
}

pub fn parse_timestamp(timestamp: &str) -> Result<DateTime<Utc>, TimestampError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| TimestampError {
            timestamp: timestamp.to_string(),
            err,
        })
}

mod json {
    use serde::Deserialize;
    use serde_json::Value;
    use std::collections::HashMap;

    #[derive(Deserialize, Default)]
    #[serde(rename_all = "camelCase")]
    pub struct Metadata {
        #[serde(default)]
        pub labels: HashMap<String, Value>,
        #[serde(default)]
        pub creation_timestamp: Value,
    }

    #[derive(Deserialize)]
    pub struct Report {
        #[serde(default)]
        pub metadata: Metadata,
    }

    pub fn string_or_empty(value: &Value) -> String {
        value.as_str().unwrap_or_default().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::ReportDescriptor;

    #[test]
    fn extracts_labels_and_timestamp() {
        let raw = br#"{
            "metadata": {
                "labels": {
                    "trivy-operator.resource.namespace": "ns1",
                    "trivy-operator.resource.kind": "Pod",
                    "trivy-operator.resource.name": "app1",
                    "trivy-operator.container.name": "nginx"
                },
                "creationTimestamp": "2024-03-05T10:15:00Z"
            },
            "report": {"vulnerabilities": []}
        }"#;

        let descriptor = ReportDescriptor::parse(raw).unwrap();
        assert_eq!(
            descriptor,
            ReportDescriptor {
                namespace: "ns1".into(),
                resource_kind: "Pod".into(),
                resource_name: "app1".into(),
                container_name: "nginx".into(),
                creation_timestamp: "2024-03-05T10:15:00Z".into(),
            }
        );
    }

    #[test]
    fn missing_fields_are_empty() {
        assert_eq!(ReportDescriptor::parse(b"{}").unwrap(), ReportDescriptor::default());

        let raw = br#"{"metadata": {"labels": {"trivy-operator.resource.kind": 7}}}"#;
        let descriptor = ReportDescriptor::parse(raw).unwrap();
        assert_eq!(descriptor.resource_kind, "");
        assert_eq!(descriptor.creation_timestamp, "");
    }

    #[test]
    fn created_at_is_utc() {
        let descriptor = ReportDescriptor {
            creation_timestamp: "2024-03-05T01:15:00+02:00".into(),
            ..Default::default()
        };
        assert_eq!(descriptor.created_at().unwrap().to_rfc3339(), "2024-03-04T23:15:00+00:00");

        let err = ReportDescriptor::default().created_at().unwrap_err();
        assert_eq!(err.timestamp, "");
    }

    #[test]
    fn rejects_non_json() {
        assert!(ReportDescriptor::parse(b"not json").is_err());
    }
}
