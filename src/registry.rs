use log::{debug, info};
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Method, Request, StatusCode, Url};
use thiserror::Error;
use crate::config::runtime::{self, keys, RuntimeConfig};
use crate::headers::HeaderSet;
use crate::package::PackageCoordinate;
use crate::transport::Transport;

const DEFAULT_PROJECT: &str = "trivy-reports";

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid upload URL '{url}': {err}")]
    Url {
        url: String,
        err: url::ParseError,
    },

    #[error("upload to {url}: {err}")]
    Transport {
        url: String,
        err: reqwest::Error,
    },

    #[error("upload to {url} failed with status {status}")]
    Status {
        url: String,
        status: StatusCode,
    },
}

/// Where and how a report is uploaded.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadTarget {
    /// `PUT {base}/packages/generic/{project}/{version}/{name}.json`
    GenericPackage {
        base_url: String,
        project: String,
    },

    /// `POST` to a configured URL, with the version substituted for `%s`.
    Templated(String),
}

impl UploadTarget {
    /// A configured upload URL template takes priority over the generic package API.
    pub fn from_config(cfg: &RuntimeConfig) -> Result<Self, runtime::Error> {
        if let Some(template) = cfg.get(keys::GITLAB_UPLOAD_URL) {
            return Ok(Self::Templated(template.to_string()));
        }
        Ok(Self::GenericPackage {
            base_url: cfg.require(keys::GITLAB_URL)?.to_string(),
            project: cfg
                .get(keys::GITLAB_PROJECT)
                .unwrap_or(DEFAULT_PROJECT)
                .to_string(),
        })
    }

    pub fn method(&self) -> Method {
        match self {
            Self::GenericPackage { .. } => Method::PUT,
            Self::Templated(_) => Method::POST,
        }
    }

    pub fn url(&self, coordinate: &PackageCoordinate) -> String {
        match self {
            Self::GenericPackage { base_url, project } => format!(
                "{}/packages/generic/{}/{}/{}.json",
                base_url.trim_end_matches('/'),
                project,
                coordinate.version,
                coordinate.name,
            ),
            Self::Templated(template) => template.replacen("%s", &coordinate.version, 1),
        }
    }
}

/// Uploads reports to the package registry.
pub struct ReportPublisher<'a> {
    target: UploadTarget,
    headers: HeaderSet,
    transport: &'a dyn Transport,
}

impl<'a> ReportPublisher<'a> {
    pub fn new(cfg: &RuntimeConfig, transport: &'a dyn Transport) -> Result<Self, runtime::Error> {
        Ok(Self {
            target: UploadTarget::from_config(cfg)?,
            headers: HeaderSet::parse(cfg.get(keys::GITLAB_ADDITIONAL_HEADERS).unwrap_or_default()),
            transport,
        })
    }

    pub async fn publish(&self, coordinate: &PackageCoordinate, raw_report: &[u8]) -> Result<(), Error> {
        let url = self.target.url(coordinate);
        let parsed = Url::parse(&url).map_err(|err| Error::Url {
            url: url.clone(),
            err,
        })?;

        let mut request = Request::new(self.target.method(), parsed);
        request
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.headers.apply(request.headers_mut());
        *request.body_mut() = Some(raw_report.to_vec().into());

        debug!("Uploading {coordinate} to {url}");
        let response = self
            .transport
            .execute(request)
            .await
            .map_err(|err| Error::Transport {
                url: url.clone(),
                err,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status { url, status });
        }
        info!("Published {coordinate} to {url}");
        Ok(())
    }
}
