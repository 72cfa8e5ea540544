use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use supernote_core::ListingClient;
use thiserror::Error;
use tracing::{error, info};

use crate::discovery::{DiscoveryConfig, DiscoveryError, Subnet, discover};
use crate::sync::convert::{CommandConverter, Converter};
use crate::sync::engine::{EngineConfig, EngineError, RunStats, SyncEngine};
use crate::sync::transfer::{Downloader, TransferClient, WgetDownloader};

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DownloadBackend {
    /// Stream the file with the built-in HTTP client.
    Http,
    /// Hand the transfer to `wget`.
    Wget,
}

#[derive(Clone, Debug)]
pub struct DaemonConfig {
    pub output_dir: PathBuf,
    /// Listing root; discovered on the local subnet when absent.
    pub url: Option<String>,
    pub poll_interval: Duration,
    /// Run a single sync and exit instead of polling.
    pub once: bool,
    pub note_to_pdf: bool,
    pub converter_program: String,
    pub downloader: DownloadBackend,
    pub engine: EngineConfig,
    pub subnet: Subnet,
    pub discovery: DiscoveryConfig,
}

/// Why a poll cycle did not complete.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("can't connect to supernote: {0}")]
    Connectivity(#[source] EngineError),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Engine(EngineError),
}

impl CycleError {
    /// Whether the poll loop should log and try again after the interval.
    pub fn is_transient(&self) -> bool {
        !matches!(self, CycleError::Engine(_))
    }
}

impl From<EngineError> for CycleError {
    fn from(err: EngineError) -> Self {
        if err.is_connectivity() {
            CycleError::Connectivity(err)
        } else {
            CycleError::Engine(err)
        }
    }
}

pub struct DaemonRuntime {
    config: DaemonConfig,
    listing: ListingClient,
    engine: SyncEngine,
    discovered: Option<String>,
}

impl DaemonRuntime {
    pub async fn bootstrap(config: DaemonConfig) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&config.output_dir)
            .await
            .with_context(|| format!("failed to create output dir at {:?}", config.output_dir))?;

        // One client for listings and downloads so both share a connection pool.
        let http = reqwest::Client::builder()
            .build()
            .context("failed to build http client")?;
        let listing = ListingClient::with_http(http.clone());
        let engine = SyncEngine::new(
            Arc::new(listing.clone()),
            build_downloader(config.downloader, http),
            config.output_dir.clone(),
        )
        .with_config(config.engine);
        let engine = match build_converter(&config) {
            Some(converter) => engine.with_converter(converter),
            None => engine,
        };

        Ok(Self {
            config,
            listing,
            engine,
            discovered: None,
        })
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        info!(
            output_dir = %self.config.output_dir.display(),
            url = self.config.url.as_deref().unwrap_or("<discover>"),
            note_to_pdf = self.config.note_to_pdf,
            workers = self.engine.config().workers,
            max_downloads = self.engine.config().download_concurrency,
            "started"
        );

        loop {
            match self.run_cycle().await {
                Ok(_) => {}
                Err(err) if err.is_transient() && !self.config.once => {
                    error!(error = %err, "sync cycle abandoned");
                }
                Err(err) => return Err(err.into()),
            }
            if self.config.once {
                return Ok(());
            }

            info!("Polling after {} seconds", self.config.poll_interval.as_secs());
            tokio::select! {
                () = tokio::time::sleep(self.config.poll_interval) => {}
                signal = tokio::signal::ctrl_c() => {
                    signal.context("failed to listen for shutdown signal")?;
                    info!("shutdown requested");
                    return Ok(());
                }
            }
        }
    }

    /// One poll cycle: resolve the endpoint, then mirror the whole tree.
    pub async fn run_cycle(&mut self) -> Result<RunStats, CycleError> {
        let root_url = self.resolve_endpoint().await?;
        self.engine.run(&root_url).await.map_err(|err| {
            let err = CycleError::from(err);
            if matches!(err, CycleError::Connectivity(_)) && self.discovered.take().is_some() {
                info!("forgetting discovered endpoint");
            }
            err
        })
    }

    async fn resolve_endpoint(&mut self) -> Result<String, DiscoveryError> {
        if let Some(url) = &self.config.url {
            return Ok(url.clone());
        }
        if let Some(url) = &self.discovered {
            return Ok(url.clone());
        }
        let hosts = self.config.subnet.hosts();
        info!(hosts = hosts.len(), port = self.config.discovery.port, "discovering supernote");
        let url = discover(&self.listing, &hosts, &self.config.discovery).await?;
        self.discovered = Some(url.clone());
        Ok(url)
    }
}

include!("daemon_helpers.rs");

#[cfg(test)]
#[path = "daemon_tests.rs"]
mod tests;
