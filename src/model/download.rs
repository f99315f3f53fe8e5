use crate::error::ValidationError;
use crate::model::VideoRecord;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Which quality to ask yt-dlp for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
    #[default]
    Best,
    Worst,
    /// Best stream no taller than this many lines.
    AtMost(u32),
}

impl FromStr for Resolution {
    type Err = ValidationError;

    /// Accepts `best`, `worst`, `720` or `720p`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().to_ascii_lowercase();
        match trimmed.as_str() {
            "best" => Ok(Self::Best),
            "worst" => Ok(Self::Worst),
            other => other
                .strip_suffix('p')
                .unwrap_or(other)
                .parse::<u32>()
                .ok()
                .filter(|h| *h > 0)
                .map(Self::AtMost)
                .ok_or_else(|| ValidationError::InvalidResolution(s.to_string())),
        }
    }
}

impl Resolution {
    /// yt-dlp `-f` selector preferring `ext`, falling back to whatever
    /// container is available.
    pub fn format_selector(&self, ext: &str) -> String {
        match self {
            Self::Best => format!("bestvideo[ext={ext}]+bestaudio/best[ext={ext}]/best"),
            Self::Worst => format!("worstvideo[ext={ext}]+worstaudio/worst[ext={ext}]/worst"),
            Self::AtMost(h) => format!(
                "bestvideo[height<={h}][ext={ext}]+bestaudio/best[height<={h}][ext={ext}]/best[height<={h}]"
            ),
        }
    }
}

/// The stream yt-dlp actually picked for a download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadedFormat {
    pub format_id: String,
    pub resolution: String,
    pub quality: String,
}

impl DownloadedFormat {
    pub fn unknown() -> Self {
        Self {
            format_id: "unknown".to_string(),
            resolution: "unknown".to_string(),
            quality: "unknown".to_string(),
        }
    }
}

/// Sidecar written next to each downloaded file: the crawled record plus the
/// format that was fetched.
#[derive(Debug, Serialize)]
pub struct DownloadInfo<'a> {
    #[serde(flatten)]
    pub video: &'a VideoRecord,
    pub downloaded_format: &'a DownloadedFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStatus {
    Downloaded(PathBuf),
    /// The target file was already on disk; nothing was fetched.
    AlreadyPresent(PathBuf),
}

/// One `[download]` progress line from yt-dlp.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadProgress {
    pub percent: f64,
    pub total_size: String,
    pub speed: String,
    pub eta: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolutions_parse() {
        assert_eq!("best".parse::<Resolution>().unwrap(), Resolution::Best);
        assert_eq!("WORST".parse::<Resolution>().unwrap(), Resolution::Worst);
        assert_eq!("720".parse::<Resolution>().unwrap(), Resolution::AtMost(720));
        assert_eq!("1080p".parse::<Resolution>().unwrap(), Resolution::AtMost(1080));
        assert_eq!(
            "hd".parse::<Resolution>().unwrap_err(),
            ValidationError::InvalidResolution("hd".to_string())
        );
        assert!("0".parse::<Resolution>().is_err());
    }

    #[test]
    fn selectors_follow_resolution() {
        assert_eq!(
            Resolution::Best.format_selector("mp4"),
            "bestvideo[ext=mp4]+bestaudio/best[ext=mp4]/best"
        );
        assert_eq!(
            Resolution::Worst.format_selector("webm"),
            "worstvideo[ext=webm]+worstaudio/worst[ext=webm]/worst"
        );
        assert_eq!(
            Resolution::AtMost(720).format_selector("mp4"),
            "bestvideo[height<=720][ext=mp4]+bestaudio/best[height<=720][ext=mp4]/best[height<=720]"
        );
    }
}
