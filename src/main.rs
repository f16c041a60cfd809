/// Trivy processor
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use clap::Parser;
use thiserror::Error;
use log::{error, info};
use crate::config::runtime::RuntimeConfig;
use crate::server::{AppState, Policies};

mod config;
mod headers;
mod package;
mod pipeline;
mod registry;
mod report;
mod server;
mod transport;
mod version;

/// Receive Trivy vulnerability reports and publish them as GitLab generic packages.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a trivy-processor.toml settings file.
    #[arg(long)]
    config: Option<String>,

    /// Address to listen on, overrides the settings file.
    #[arg(long)]
    listen: Option<String>,

    /// Directory with one runtime configuration value per file, overrides the settings file.
    #[arg(long)]
    config_dir: Option<String>,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration file: {0}")]
    ConfigParse(#[from] config::file::Error),

    #[error("configuration: {0}")]
    Config(#[from] config::runtime::Error),

    #[error("http client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("listen on {addr}: {err}")]
    Listen {
        addr: String,
        err: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(std::io::Error),
}

/// Read the settings file given on the command line, or fall back to the
/// [built-in defaults](../default.toml). Command line flags win over both.
fn read_settings(args: &Cli) -> Result<config::file::File, Error> {
    let mut settings = match &args.config {
        Some(path) => config::file::File::from_path(path)?,
        None => config::file::File::default(),
    };
    if let Some(listen) = &args.listen {
        settings.listen = listen.clone();
    }
    if let Some(config_dir) = &args.config_dir {
        settings.config_dir = config_dir.clone();
    }
    Ok(settings)
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(_) => std::process::exit(0),
        Err(err) => {
            error!("fatal: {}", err.to_string());
            std::process::exit(1)
        }
    }
}

async fn run() -> Result<(), Error> {
    env_logger::init();

    let args = Cli::parse();
    let settings = read_settings(&args)?;

    info!("Trivy processor {}", env!("CARGO_PKG_VERSION"));

    let runtime_config = RuntimeConfig::from_env(&settings.env_prefix, Path::new(&settings.config_dir));
    info!("{} runtime configuration keys resolved", runtime_config.len());

    let policies = Policies::from_config(&runtime_config)?;
    info!("Versioning policy: {:?}, naming scheme: {:?}", policies.versioning, policies.naming);

    let transport = transport::client(Duration::from_secs(settings.http_timeout_secs))?;
    let state = AppState {
        config: Arc::new(runtime_config),
        policies,
        transport: Arc::new(transport),
    };

    let listener = tokio::net::TcpListener::bind(&settings.listen)
        .await
        .map_err(|err| Error::Listen {
            addr: settings.listen.clone(),
            err,
        })?;
    info!("Listening on {}", settings.listen);

    axum::serve(listener, server::router(state))
        .await
        .map_err(Error::Serve)
}
