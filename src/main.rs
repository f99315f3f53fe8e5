use anyhow::{Context, Result};
use clap::Parser;
use ytcrawl::cli::Cli;
use ytcrawl::crawler::{crawl, CrawlRequest};
use ytcrawl::model::settings::Settings;
use ytcrawl::sys::api::DataApi;
use ytcrawl::sys::config::{Backend, Config};
use ytcrawl::sys::platform::VideoPlatform;
use ytcrawl::sys::yt::YtDlp;
use ytcrawl::sys::{deps, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref());

    // Validation happens before logging is set up and before any network call
    let settings = Settings::resolve(&cli, config)?;

    logging::init_logger(settings.log_level, settings.log_file.clone())
        .context("Failed to initialise logging")?;

    let platform = build_platform(&settings)?;
    log::debug!("Using {} backend", platform.name());

    let report = crawl(platform.as_ref(), &CrawlRequest::from(&settings)).await?;

    if !report.skipped.is_empty() {
        log::warn!(
            "Skipped {} of {} videos",
            report.skipped.len(),
            report.attempted
        );
    }
    println!(
        "Saved {} video details to {}",
        report.written(),
        report.output_path.display()
    );

    Ok(())
}

fn build_platform(settings: &Settings) -> Result<Box<dyn VideoPlatform>> {
    match settings.backend {
        Backend::YtDlp => {
            let version = deps::check_yt_dlp(&settings.ytdlp_path).map_err(|e| {
                log::error!("Dependency check failed: {}", e);
                e
            })?;
            log::info!("yt-dlp version: {}", version);
            Ok(Box::new(YtDlp::new(settings)))
        }
        Backend::Api => {
            let key = settings
                .api_key
                .clone()
                .context("the api backend needs an API key")?;
            Ok(Box::new(DataApi::new(settings, key)?))
        }
    }
}
