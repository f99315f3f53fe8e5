use anyhow::{Context, Result};
use clap::Parser;
use ytcrawl::cli::DownloadCli;
use ytcrawl::downloader::{download_all, DownloadRequest};
use ytcrawl::model::settings::DownloadSettings;
use ytcrawl::sys::config::Config;
use ytcrawl::sys::download::YtDlpDownloader;
use ytcrawl::sys::{deps, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DownloadCli::parse();
    let config = Config::load(cli.config.as_deref());
    let settings = DownloadSettings::resolve(&cli, config)?;

    logging::init_logger(settings.log_level, settings.log_file.clone())
        .context("Failed to initialise logging")?;

    let version = deps::check_yt_dlp(&settings.ytdlp_path).map_err(|e| {
        log::error!("Dependency check failed: {}", e);
        e
    })?;
    log::info!("yt-dlp version: {}", version);

    let downloader = YtDlpDownloader::new(settings.ytdlp_path.clone());
    let report = download_all(&downloader, &DownloadRequest::from(&settings)).await?;

    if !report.failed.is_empty() {
        log::warn!(
            "Failed to download {} of {} videos",
            report.failed.len(),
            report.attempted
        );
    }
    println!(
        "{} of {} videos available in {}",
        report.available(),
        report.attempted,
        settings.output_dir.display()
    );

    Ok(())
}
