use crate::sys::config::Backend;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "ytcrawl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(help_template = "NAME:
   {name} - YouTube search crawler

USAGE:
   ytcrawl --query <QUERY> [options]

VERSION:
   {version}

DESCRIPTION:
   {name} searches YouTube, fetches metadata for the top results and
   writes them to a JSON file. Videos that cannot be fetched are logged
   and skipped.

OPTIONS:
{options}
")]
pub struct Cli {
    /// Search query to run
    #[arg(short, long)]
    pub query: String,

    /// Maximum number of videos to collect [default: 5, or max_videos from the config file]
    #[arg(short = 'n', long, allow_negative_numbers = true)]
    pub max_videos: Option<i64>,

    /// Output format of the results file
    #[arg(long, default_value = "json")]
    pub output_format: String,

    /// Log level (OFF, ERROR, WARN, INFO, DEBUG, TRACE)
    #[arg(long, default_value = "INFO")]
    pub log_level: String,

    /// Where to write the results [default: youtube_results_<query>.json]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Platform backend used for search and metadata
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// YouTube Data API key, required by the api backend
    #[arg(long, env = "YOUTUBE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Number of metadata requests in flight
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Include the available stream formats of each video (yt-dlp backend)
    #[arg(long)]
    pub include_formats: bool,

    /// Read configuration from this file instead of the default location
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Also append log lines to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "ytcrawl-download")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(help_template = "NAME:
   {name} - download videos listed in a ytcrawl results file

USAGE:
   ytcrawl-download <INPUT> [options]

VERSION:
   {version}

DESCRIPTION:
   {name} reads the JSON written by ytcrawl and downloads each video with
   yt-dlp into one directory per channel, next to an _info.json file with
   the crawled metadata and the format that was fetched.

OPTIONS:
{options}
")]
pub struct DownloadCli {
    /// Results file written by ytcrawl
    pub input: PathBuf,

    /// Directory to save videos into [default: downloads, or download_dir from the config file]
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// best, worst, or a maximum height such as 720
    #[arg(short, long, default_value = "best")]
    pub resolution: String,

    /// Preferred container, also used for merged streams
    #[arg(short = 'f', long = "format", default_value = "mp4")]
    pub file_format: String,

    /// Only download the first N videos
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Log level (OFF, ERROR, WARN, INFO, DEBUG, TRACE)
    #[arg(long, default_value = "INFO")]
    pub log_level: String,

    /// Read configuration from this file instead of the default location
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Also append log lines to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}
