use std::{
    io,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use url::Url;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("{program} exited with {status}: {stderr}")]
    Program {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
}

/// Fetches one remote file to a local path in a single shot.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, url: &str, target: &Path) -> Result<(), DownloadError>;
}

/// Streams the response body with a shared HTTP client.
#[derive(Clone, Default)]
pub struct TransferClient {
    http: Client,
}

impl TransferClient {
    pub fn new() -> Self {
        Self::with_http(Client::new())
    }

    pub fn with_http(http: Client) -> Self {
        Self { http }
    }

    pub async fn download_to_path(&self, href: &str, target: &Path) -> Result<(), DownloadError> {
        let url = Url::parse(href)?;
        let response = self.http.get(url).send().await?.error_for_status()?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let partial = partial_path(target);
        let file = tokio::fs::File::create(&partial).await?;
        if let Err(err) = write_body(response, file, &partial, target).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(err);
        }
        Ok(())
    }
}

#[async_trait]
impl Downloader for TransferClient {
    async fn download(&self, url: &str, target: &Path) -> Result<(), DownloadError> {
        self.download_to_path(url, target).await
    }
}

/// Delegates the transfer to `wget`, which copes with the device refusing
/// ranged and chunked reads.
#[derive(Debug, Clone)]
pub struct WgetDownloader {
    program: String,
}

impl WgetDownloader {
    pub fn new() -> Self {
        Self::with_program("wget")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for WgetDownloader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Downloader for WgetDownloader {
    async fn download(&self, url: &str, target: &Path) -> Result<(), DownloadError> {
        let url = Url::parse(url)?;
        let partial = partial_path(target);
        let output = tokio::process::Command::new(&self.program)
            .arg("-q")
            .arg("-O")
            .arg(&partial)
            .arg(url.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(DownloadError::Program {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        if let Err(err) = tokio::fs::rename(&partial, target).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(err.into());
        }
        Ok(())
    }
}

/// Streams `response` into `file`, then moves the finished `partial` onto `target`.
async fn write_body(
    response: reqwest::Response,
    mut file: tokio::fs::File,
    partial: &Path,
    target: &Path,
) -> Result<(), DownloadError> {
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        file.write_all(&chunk?).await?;
    }
    file.flush().await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(partial, target).await?;
    Ok(())
}

fn partial_path(target: &Path) -> PathBuf {
    target.with_extension(format!(
        "{}partial",
        target
            .extension()
            .map(|ext| format!("{}.", ext.to_string_lossy()))
            .unwrap_or_default()
    ))
}
