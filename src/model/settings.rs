use crate::cli::{Cli, DownloadCli};
use crate::error::ValidationError;
use crate::model::download::Resolution;
use crate::sys::config::{Backend, Config};
use std::path::PathBuf;

/// Effective run parameters: the config file with command-line overrides
/// applied, already validated.
#[derive(Debug, Clone)]
pub struct Settings {
    pub query: String,
    pub max_videos: usize,
    pub output_path: PathBuf,
    pub log_level: log::LevelFilter,
    pub log_file: Option<PathBuf>,

    pub backend: Backend,
    pub api_key: Option<String>,
    pub ytdlp_path: String,
    pub timeout_secs: u64,
    pub concurrency: usize,
    pub include_formats: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let config = Config::default();
        Self {
            query: String::new(),
            max_videos: config.max_videos as usize,
            output_path: PathBuf::from("youtube_results.json"),
            log_level: log::LevelFilter::Info,
            log_file: None,
            backend: config.backend,
            api_key: None,
            ytdlp_path: config.ytdlp_path,
            timeout_secs: config.timeout_secs,
            concurrency: config.concurrency,
            include_formats: false,
        }
    }
}

impl Settings {
    pub fn resolve(cli: &Cli, config: Config) -> Result<Self, ValidationError> {
        let query = cli.query.trim().to_string();
        if query.is_empty() {
            return Err(ValidationError::EmptyQuery);
        }

        let max_videos = cli.max_videos.unwrap_or(config.max_videos);
        if max_videos <= 0 {
            return Err(ValidationError::NonPositiveMaxVideos(max_videos));
        }

        if !cli.output_format.eq_ignore_ascii_case("json") {
            return Err(ValidationError::UnsupportedOutputFormat(
                cli.output_format.clone(),
            ));
        }

        let log_level = parse_log_level(&cli.log_level)?;

        let concurrency = cli.concurrency.unwrap_or(config.concurrency);
        if concurrency == 0 {
            return Err(ValidationError::ZeroConcurrency);
        }

        let backend = cli.backend.unwrap_or(config.backend);
        let api_key = cli
            .api_key
            .clone()
            .or(config.api_key)
            .filter(|k| !k.trim().is_empty());
        if backend == Backend::Api && api_key.is_none() {
            return Err(ValidationError::MissingApiKey);
        }

        let output_path = cli.output.clone().unwrap_or_else(|| {
            Config::expand_tilde(&config.output_dir).join(default_output_name(&query))
        });

        let log_file = cli
            .log_file
            .clone()
            .or_else(|| config.log_file.as_deref().map(Config::expand_tilde));

        Ok(Self {
            query,
            max_videos: max_videos as usize,
            output_path,
            log_level,
            log_file,
            backend,
            api_key,
            ytdlp_path: Config::expand_tilde(&config.ytdlp_path)
                .to_string_lossy()
                .to_string(),
            timeout_secs: cli.timeout.unwrap_or(config.timeout_secs).max(1),
            concurrency,
            include_formats: cli.include_formats || config.include_formats,
        })
    }
}

/// Effective parameters of a download run.
#[derive(Debug, Clone)]
pub struct DownloadSettings {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub resolution: Resolution,
    pub file_format: String,
    pub limit: Option<usize>,
    pub log_level: log::LevelFilter,
    pub log_file: Option<PathBuf>,
    pub ytdlp_path: String,
}

impl DownloadSettings {
    pub fn resolve(cli: &DownloadCli, config: Config) -> Result<Self, ValidationError> {
        let resolution = cli.resolution.parse::<Resolution>()?;

        let file_format = cli.file_format.trim().to_ascii_lowercase();
        if file_format.is_empty() || !file_format.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ValidationError::InvalidFileFormat(cli.file_format.clone()));
        }

        if cli.limit == Some(0) {
            return Err(ValidationError::ZeroLimit);
        }

        let log_level = parse_log_level(&cli.log_level)?;

        let output_dir = cli
            .output_dir
            .clone()
            .unwrap_or_else(|| Config::expand_tilde(&config.download_dir));

        let log_file = cli
            .log_file
            .clone()
            .or_else(|| config.log_file.as_deref().map(Config::expand_tilde));

        Ok(Self {
            input: cli.input.clone(),
            output_dir,
            resolution,
            file_format,
            limit: cli.limit,
            log_level,
            log_file,
            ytdlp_path: Config::expand_tilde(&config.ytdlp_path)
                .to_string_lossy()
                .to_string(),
        })
    }
}

/// Accepts the usual level names case-insensitively; `WARNING` is an alias for `WARN`.
pub fn parse_log_level(level: &str) -> Result<log::LevelFilter, ValidationError> {
    let normalized = level.trim().to_ascii_uppercase();
    let normalized = if normalized == "WARNING" { "WARN".to_string() } else { normalized };
    normalized
        .parse::<log::LevelFilter>()
        .map_err(|_| ValidationError::InvalidLogLevel(level.to_string()))
}

/// Strips characters that are not allowed in file names and replaces spaces.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|'))
        .collect::<String>()
        .replace(' ', "_")
}

pub fn default_output_name(query: &str) -> String {
    format!("youtube_results_{}.json", sanitize_filename(query))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["ytcrawl"];
        full.extend_from_slice(args);
        Cli::try_parse_from(full).unwrap()
    }

    #[test]
    fn cli_overrides_config() {
        let config = Config {
            max_videos: 20,
            concurrency: 2,
            ..Config::default()
        };
        let settings =
            Settings::resolve(&cli(&["-q", "rust", "-n", "3", "--concurrency", "8"]), config)
                .unwrap();
        assert_eq!(settings.max_videos, 3);
        assert_eq!(settings.concurrency, 8);
        assert_eq!(settings.output_path, PathBuf::from("./youtube_results_rust.json"));
    }

    #[test]
    fn config_fills_unset_options() {
        let config = Config {
            max_videos: 7,
            output_dir: "/tmp/out".to_string(),
            ..Config::default()
        };
        let settings = Settings::resolve(&cli(&["-q", "a cat video"]), config).unwrap();
        assert_eq!(settings.max_videos, 7);
        assert_eq!(
            settings.output_path,
            PathBuf::from("/tmp/out/youtube_results_a_cat_video.json")
        );
    }

    #[test]
    fn non_positive_max_videos_is_rejected() {
        for n in ["0", "-1"] {
            let err = Settings::resolve(&cli(&["-q", "x", "--max-videos", n]), Config::default())
                .unwrap_err();
            assert_eq!(err, ValidationError::NonPositiveMaxVideos(n.parse().unwrap()));
        }
    }

    #[test]
    fn blank_query_is_rejected() {
        let err = Settings::resolve(&cli(&["-q", "   "]), Config::default()).unwrap_err();
        assert_eq!(err, ValidationError::EmptyQuery);
    }

    #[test]
    fn only_json_output_is_supported() {
        let err = Settings::resolve(&cli(&["-q", "x", "--output-format", "csv"]), Config::default())
            .unwrap_err();
        assert_eq!(err, ValidationError::UnsupportedOutputFormat("csv".to_string()));
        assert!(Settings::resolve(&cli(&["-q", "x", "--output-format", "JSON"]), Config::default()).is_ok());
    }

    #[test]
    fn api_backend_requires_key() {
        let config = Config {
            backend: Backend::Api,
            api_key: Some("  ".to_string()),
            ..Config::default()
        };
        let mut args = cli(&["-q", "x"]);
        args.api_key = None;
        let err = Settings::resolve(&args, config.clone()).unwrap_err();
        assert_eq!(err, ValidationError::MissingApiKey);

        args.api_key = Some("k".to_string());
        let settings = Settings::resolve(&args, config).unwrap();
        assert_eq!(settings.api_key.as_deref(), Some("k"));
    }

    #[test]
    fn log_levels_parse_case_insensitively() {
        assert_eq!(parse_log_level("info").unwrap(), log::LevelFilter::Info);
        assert_eq!(parse_log_level("WARNING").unwrap(), log::LevelFilter::Warn);
        assert_eq!(parse_log_level("off").unwrap(), log::LevelFilter::Off);
        assert_eq!(
            parse_log_level("loud").unwrap_err(),
            ValidationError::InvalidLogLevel("loud".to_string())
        );
    }

    fn download_cli(args: &[&str]) -> DownloadCli {
        let mut full = vec!["ytcrawl-download", "results.json"];
        full.extend_from_slice(args);
        DownloadCli::try_parse_from(full).unwrap()
    }

    #[test]
    fn download_settings_resolve() {
        let config = Config {
            download_dir: "/tmp/videos".to_string(),
            ..Config::default()
        };
        let settings =
            DownloadSettings::resolve(&download_cli(&["-r", "720p", "-f", "WebM"]), config).unwrap();
        assert_eq!(settings.output_dir, PathBuf::from("/tmp/videos"));
        assert_eq!(settings.resolution, Resolution::AtMost(720));
        assert_eq!(settings.file_format, "webm");
        assert_eq!(settings.ytdlp_path, "yt-dlp");

        let settings =
            DownloadSettings::resolve(&download_cli(&["-o", "cats"]), Config::default()).unwrap();
        assert_eq!(settings.output_dir, PathBuf::from("cats"));
        assert_eq!(settings.resolution, Resolution::Best);
    }

    #[test]
    fn bad_download_options_are_rejected() {
        let resolve = |args: &[&str]| {
            DownloadSettings::resolve(&download_cli(args), Config::default()).unwrap_err()
        };
        assert_eq!(
            resolve(&["-r", "huge"]),
            ValidationError::InvalidResolution("huge".to_string())
        );
        assert_eq!(
            resolve(&["-f", "mp4;rm"]),
            ValidationError::InvalidFileFormat("mp4;rm".to_string())
        );
        assert_eq!(resolve(&["-l", "0"]), ValidationError::ZeroLimit);
    }

    #[test]
    fn filenames_are_sanitized() {
        assert_eq!(sanitize_filename("a/b:c? d*e"), "abc_de");
        assert_eq!(default_output_name("data science"), "youtube_results_data_science.json");
    }
}
