//! The `/report` endpoint.
//!
//! Every report runs through the same steps: parse, name and version it,
//! upload it to the registry and finally start the downstream pipeline.
//! Nothing is shared between requests except the read-only configuration.

use std::sync::Arc;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, put};
use axum::Router;
use log::{debug, error};
use serde_json::{json, Map, Value};
use thiserror::Error;
use crate::config::runtime::{self, keys, RuntimeConfig};
use crate::package::{NamingScheme, PackageCoordinate};
use crate::pipeline::{self, PipelineTrigger};
use crate::registry::{self, ReportPublisher};
use crate::report::{self, ReportDescriptor, TimestampError};
use crate::transport::Transport;
use crate::version::VersioningPolicy;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("invalid report body: {0}")]
    InvalidInput(serde_json::Error),

    #[error("serialize report: {0}")]
    Serialization(serde_json::Error),

    #[error("read report metadata: {0}")]
    Descriptor(#[from] report::Error),

    #[error("configuration: {0}")]
    Config(#[from] runtime::Error),

    #[error("package name and version: {0}")]
    Timestamp(#[from] TimestampError),

    #[error("publish: {0}")]
    Publish(#[from] registry::Error),

    #[error("{coordinate} was published, but the pipeline did not start: {err}")]
    Trigger {
        coordinate: PackageCoordinate,
        err: pipeline::Error,
    },
}

impl ReportError {
    fn status_and_message(&self) -> (StatusCode, &'static str) {
        match self {
            Self::InvalidInput(_) => (StatusCode::BAD_REQUEST, "Invalid JSON"),
            Self::Serialization(_) | Self::Descriptor(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to process JSON")
            }
            Self::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Invalid server configuration"),
            Self::Timestamp(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to derive package name and version")
            }
            Self::Publish(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Failed to send report to GitLab"),
            Self::Trigger { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "Failed to trigger pipeline"),
        }
    }
}

/// Details stay in the log; callers only see a generic message.
impl IntoResponse for ReportError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            error!("{self}");
        } else {
            debug!("{self}");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// How reports are turned into package coordinates. Chosen once at startup.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Policies {
    pub versioning: VersioningPolicy,
    pub naming: NamingScheme,
}

impl Policies {
    pub fn from_config(cfg: &RuntimeConfig) -> Result<Self, runtime::Error> {
        let versioning = match cfg.get(keys::VERSIONING_POLICY) {
            None => VersioningPolicy::default(),
            Some(value) => value.parse().map_err(|value| runtime::Error::Invalid {
                key: keys::VERSIONING_POLICY,
                value,
            })?,
        };
        let naming = match cfg.get(keys::NAMING_SCHEME) {
            None => NamingScheme::default(),
            Some(value) => value.parse().map_err(|value| runtime::Error::Invalid {
                key: keys::NAMING_SCHEME,
                value,
            })?,
        };
        Ok(Self { versioning, naming })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RuntimeConfig>,
    pub policies: Policies,
    pub transport: Arc<dyn Transport>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/report", put(receive_report))
        .route("/healthz", get(healthz))
        // Reports for large images easily exceed axum's 2 MiB default.
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// PUT /report
async fn receive_report(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ReportError> {
    let document: Map<String, Value> =
        serde_json::from_slice(&body).map_err(ReportError::InvalidInput)?;
    let raw_report = serde_json::to_vec(&document).map_err(ReportError::Serialization)?;
    debug!("Report received: {}", String::from_utf8_lossy(&raw_report));

    process_report(&state, &raw_report).await?;
    Ok(Json(json!({ "status": "Report received" })))
}

/// Name, version, publish and trigger. The pipeline is only started once the
/// report is in the registry.
pub async fn process_report(state: &AppState, raw_report: &[u8]) -> Result<PackageCoordinate, ReportError> {
    let publisher = ReportPublisher::new(&state.config, state.transport.as_ref())?;
    let trigger = if PipelineTrigger::enabled(&state.config) {
        Some(PipelineTrigger::new(&state.config, state.transport.as_ref())?)
    } else {
        None
    };

    let descriptor = ReportDescriptor::parse(raw_report)?;
    let coordinate = PackageCoordinate {
        name: state.policies.naming.name(&descriptor)?,
        version: state
            .policies
            .versioning
            .generate(&descriptor.creation_timestamp, raw_report)?,
    };

    publisher.publish(&coordinate, raw_report).await?;

    if let Some(trigger) = trigger {
        if let Err(err) = trigger.trigger(&coordinate).await {
            return Err(ReportError::Trigger { coordinate, err });
        }
    }
    Ok(coordinate)
}
