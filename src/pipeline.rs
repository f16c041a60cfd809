use log::info;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Method, Request, StatusCode, Url};
use serde::Serialize;
use thiserror::Error;
use crate::config::runtime::{self, keys, RuntimeConfig};
use crate::headers::HeaderSet;
use crate::package::PackageCoordinate;
use crate::transport::Transport;

const DEFAULT_REF: &str = "main";

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid pipeline URL '{url}': {err}")]
    Url {
        url: String,
        err: url::ParseError,
    },

    #[error("serialize pipeline request: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("trigger {url}: {err}")]
    Transport {
        url: String,
        err: reqwest::Error,
    },

    #[error("trigger {url} failed with status {status}")]
    Status {
        url: String,
        status: StatusCode,
    },
}

#[derive(Serialize, Debug, PartialEq)]
struct PipelineVariable<'a> {
    key: &'a str,
    value: &'a str,
}

/// Body of `POST /projects/:id/pipeline`.
#[derive(Serialize, Debug, PartialEq)]
struct PipelineRequest<'a> {
    #[serde(rename = "ref")]
    git_ref: &'a str,
    variables: Vec<PipelineVariable<'a>>,
}

impl<'a> PipelineRequest<'a> {
    fn new(git_ref: &'a str, coordinate: &'a PackageCoordinate) -> Self {
        Self {
            git_ref,
            variables: vec![
                PipelineVariable {
                    key: "REPORT_VERSION",
                    value: &coordinate.version,
                },
                PipelineVariable {
                    key: "REPORT_NAME",
                    value: &coordinate.name,
                },
            ],
        }
    }
}

/// Starts the downstream pipeline for a published package.
pub struct PipelineTrigger<'a> {
    url: String,
    git_ref: String,
    headers: HeaderSet,
    transport: &'a dyn Transport,
}

impl<'a> PipelineTrigger<'a> {
    pub fn new(cfg: &RuntimeConfig, transport: &'a dyn Transport) -> Result<Self, runtime::Error> {
        let base_url = cfg.require(keys::GITLAB_URL)?;
        Ok(Self {
            url: format!("{}/pipeline", base_url.trim_end_matches('/')),
            git_ref: cfg
                .get(keys::GITLAB_PIPELINE_REF)
                .unwrap_or(DEFAULT_REF)
                .to_string(),
            headers: HeaderSet::parse(cfg.get(keys::GITLAB_ADDITIONAL_HEADERS).unwrap_or_default()),
            transport,
        })
    }

    /// Whether the pipeline should be triggered at all. Only an explicit `false` disables it.
    pub fn enabled(cfg: &RuntimeConfig) -> bool {
        !cfg
            .get(keys::GITLAB_PIPELINE_ENABLED)
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("false"))
    }

    pub async fn trigger(&self, coordinate: &PackageCoordinate) -> Result<(), Error> {
        let parsed = Url::parse(&self.url).map_err(|err| Error::Url {
            url: self.url.clone(),
            err,
        })?;
        let body = serde_json::to_vec(&PipelineRequest::new(&self.git_ref, coordinate))?;

        let mut request = Request::new(Method::POST, parsed);
        request
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.headers.apply(request.headers_mut());
        *request.body_mut() = Some(body.into());

        let response = self
            .transport
            .execute(request)
            .await
            .map_err(|err| Error::Transport {
                url: self.url.clone(),
                err,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                url: self.url.clone(),
                status,
            });
        }
        info!("Pipeline triggered on {} for {coordinate}", self.git_ref);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use crate::transport::fake::FakeTransport;
    use super::*;

    fn coordinate() -> PackageCoordinate {
        PackageCoordinate {
            name: "vulnerability-report-ns1-Pod-app1".into(),
            version: "25.3.5-1015".into(),
        }
    }

    fn config(pairs: &[(&str, &str)]) -> RuntimeConfig {
        pairs.iter().copied().collect()
    }

    #[test]
    fn request_body() {
        let coordinate = coordinate();
        let body = serde_json::to_value(PipelineRequest::new("main", &coordinate)).unwrap();
        assert_eq!(
            body,
            json!({
                "ref": "main",
                "variables": [
                    {"key": "REPORT_VERSION", "value": "25.3.5-1015"},
                    {"key": "REPORT_NAME", "value": "vulnerability-report-ns1-Pod-app1"},
                ]
            })
        );
    }

    #[test]
    fn enabled_unless_false() {
        assert!(PipelineTrigger::enabled(&config(&[])));
        assert!(PipelineTrigger::enabled(&config(&[("gitlabPipelineEnabled", "true")])));
        assert!(!PipelineTrigger::enabled(&config(&[("gitlabPipelineEnabled", "False")])));
    }

    #[test]
    fn missing_base_url() {
        let transport = FakeTransport::default();
        let err = PipelineTrigger::new(&config(&[]), &transport).err().unwrap();
        assert_eq!(err, runtime::Error::Missing("gitlabUrl"));
    }

    #[tokio::test]
    async fn trigger_posts_coordinates() {
        let transport = FakeTransport::default().route("/pipeline", 201, "{\"id\":1}");
        let cfg = config(&[
            ("gitlabUrl", "https://gitlab.example.com/api/v4/projects/42"),
            ("gitlabAdditionalHeaders", "PRIVATE-TOKEN=secret"),
            ("gitlabPipelineRef", "release"),
        ]);

        let trigger = PipelineTrigger::new(&cfg, &transport).unwrap();
        trigger.trigger(&coordinate()).await.unwrap();

        let recorded = transport.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].method, Method::POST);
        assert_eq!(recorded[0].url, "https://gitlab.example.com/api/v4/projects/42/pipeline");
        assert_eq!(recorded[0].headers["private-token"], "secret");
        assert_eq!(recorded[0].json()["ref"], "release");
        assert_eq!(recorded[0].json()["variables"][1]["value"], "vulnerability-report-ns1-Pod-app1");
    }

    #[tokio::test]
    async fn trigger_rejects_non_success_status() {
        let transport = FakeTransport::default().route("/pipeline", 400, "{\"message\":\"bad ref\"}");
        let cfg = config(&[("gitlabUrl", "https://gitlab.example.com/api/v4/projects/42")]);

        let trigger = PipelineTrigger::new(&cfg, &transport).unwrap();
        let err = trigger.trigger(&coordinate()).await.unwrap_err();
        assert!(matches!(err, Error::Status { status, .. } if status == StatusCode::BAD_REQUEST));
    }
}
