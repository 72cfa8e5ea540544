fn build_downloader(backend: DownloadBackend, http: reqwest::Client) -> Arc<dyn Downloader> {
    match backend {
        DownloadBackend::Http => Arc::new(TransferClient::with_http(http)),
        DownloadBackend::Wget => Arc::new(WgetDownloader::new()),
    }
}

fn build_converter(config: &DaemonConfig) -> Option<Arc<dyn Converter>> {
    if !config.note_to_pdf {
        return None;
    }
    Some(Arc::new(CommandConverter::with_program(
        config.converter_program.clone(),
    )))
}

pub fn poll_interval_from_secs(secs: u64) -> Duration {
    Duration::from_secs(secs.max(1))
}
