use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// Spawn the yt-dlp executable
    #[default]
    YtDlp,
    /// YouTube Data API v3 (needs an API key)
    Api,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_max_videos")]
    pub max_videos: i64,
    #[serde(default)]
    pub backend: Backend,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: String,
    #[serde(default)]
    pub include_formats: bool,
    #[serde(default)]
    pub log_file: Option<String>,
    #[serde(default = "default_download_dir")]
    pub download_dir: String,
}

fn default_max_videos() -> i64 { 5 }
fn default_timeout_secs() -> u64 { 30 }
fn default_concurrency() -> usize { 4 }
fn default_output_dir() -> String { ".".to_string() }
fn default_ytdlp_path() -> String { "yt-dlp".to_string() }
fn default_download_dir() -> String { "downloads".to_string() }

impl Default for Config {
    fn default() -> Self {
        Self {
            max_videos: default_max_videos(),
            backend: Backend::default(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            concurrency: default_concurrency(),
            output_dir: default_output_dir(),
            ytdlp_path: default_ytdlp_path(),
            include_formats: false,
            log_file: None,
            download_dir: default_download_dir(),
        }
    }
}

impl Config {
    pub fn get_config_path() -> PathBuf {
        ProjectDirs::from("com", "ytcrawl", "ytcrawl")
            .map(|proj_dirs| proj_dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")).unwrap_or_else(|_| ".".to_string());
                Path::new(&home).join(".ytcrawl").join("config.toml")
            })
    }

    /// Loads the config file, falling back to defaults when it is missing or
    /// cannot be parsed.
    pub fn load(path: Option<&Path>) -> Self {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::get_config_path);
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content).unwrap_or_else(|e| {
                eprintln!("Ignoring invalid config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(e) => {
                eprintln!("Cannot read config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn expand_tilde(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }
}
