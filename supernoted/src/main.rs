use std::path::PathBuf;

use clap::Parser;
use supernoted::daemon::{
    DEFAULT_POLL_INTERVAL_SECS, DaemonConfig, DaemonRuntime, DownloadBackend,
    poll_interval_from_secs,
};
use supernoted::discovery::{DEFAULT_DISCOVERY_PORT, DEFAULT_SUBNET, DiscoveryConfig, Subnet};
use supernoted::sync::convert::DEFAULT_CONVERTER_PROGRAM;
use supernoted::sync::engine::{DEFAULT_DOWNLOAD_CONCURRENCY, DEFAULT_WORKERS, EngineConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Keep a local directory in one-way sync with a Supernote's browse-and-access share.
#[derive(Debug, Parser)]
#[command(name = "supernoted", version)]
struct Cli {
    /// Directory the device tree is mirrored into.
    output_dir: PathBuf,

    /// Full URL of the device's browsing page; discovered on the local subnet when omitted.
    #[arg(long, env = "SUPERNOTE_URL")]
    url: Option<String>,

    /// Seconds to sleep between syncs.
    #[arg(long, env = "SUPERNOTE_POLL_INTERVAL", default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
    poll_interval: u64,

    /// Render downloaded .note files to PDF next to the downloaded file.
    #[arg(long, overrides_with = "no_conversion")]
    note_to_pdf: bool,

    /// Skip post-download conversion (the default).
    #[arg(long, overrides_with = "note_to_pdf")]
    no_conversion: bool,

    /// Run a single sync and exit.
    #[arg(long)]
    once: bool,

    /// Subnet probed for the device when no URL is given.
    #[arg(long, env = "SUPERNOTE_SUBNET", default_value = DEFAULT_SUBNET)]
    subnet: Subnet,

    /// Port probed during discovery.
    #[arg(long, env = "SUPERNOTE_PORT", default_value_t = DEFAULT_DISCOVERY_PORT)]
    port: u16,

    /// Number of sync workers.
    #[arg(long, env = "SUPERNOTE_WORKERS", default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Maximum simultaneous downloads.
    #[arg(long, env = "SUPERNOTE_DOWNLOAD_CONCURRENCY", default_value_t = DEFAULT_DOWNLOAD_CONCURRENCY)]
    max_downloads: usize,

    /// How file contents are fetched.
    #[arg(long, value_enum, default_value_t = DownloadBackend::Http)]
    downloader: DownloadBackend,

    /// Program used for .note to PDF conversion.
    #[arg(long, env = "SUPERNOTE_CONVERTER", default_value = DEFAULT_CONVERTER_PROGRAM)]
    converter: String,
}

impl Cli {
    fn into_config(self) -> DaemonConfig {
        DaemonConfig {
            output_dir: self.output_dir,
            url: self.url.filter(|url| !url.trim().is_empty()),
            poll_interval: poll_interval_from_secs(self.poll_interval),
            once: self.once,
            note_to_pdf: self.note_to_pdf && !self.no_conversion,
            converter_program: self.converter,
            downloader: self.downloader,
            engine: EngineConfig::new(self.workers, self.max_downloads),
            subnet: self.subnet,
            discovery: DiscoveryConfig {
                port: self.port,
                ..DiscoveryConfig::default()
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "supernoted=info,supernote_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Cli::parse().into_config();
    let daemon = DaemonRuntime::bootstrap(config).await?;
    daemon.run().await
}
