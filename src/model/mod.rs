use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod download;
pub mod settings;

pub const YOUTUBE_BASE_URL: &str = "https://www.youtube.com";

pub fn watch_url(id: &str) -> String {
    format!("{}/watch?v={}", YOUTUBE_BASE_URL, id)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub url: String,
}

impl Channel {
    /// Builds a channel, resolving site-relative urls ("/@handle") against youtube.com
    /// and falling back to the canonical `/channel/<id>` page.
    pub fn new(id: impl Into<String>, name: impl Into<String>, url: Option<&str>) -> Self {
        let id = id.into();
        let url = match url {
            Some(u) if u.starts_with("http") => u.to_string(),
            Some(u) if !u.is_empty() => format!("{}{}", YOUTUBE_BASE_URL, u),
            _ if !id.is_empty() => format!("{}/channel/{}", YOUTUBE_BASE_URL, id),
            _ => String::new(),
        };
        Self {
            id,
            name: name.into(),
            url,
        }
    }
}

/// Metadata for one video, built once by a platform backend and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: String,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub channel: Channel,
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    pub comment_count: Option<u64>,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, with = "duration_secs")]
    pub duration: Option<Duration>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub formats: Vec<VideoFormat>,
}

impl VideoRecord {
    /// Human readable duration, e.g. "10:05" or "1:02:03".
    pub fn duration_string(&self) -> String {
        match self.duration {
            Some(d) => format_duration(d),
            None => "--:--".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFormat {
    pub format_id: String,
    pub ext: String,
    pub mime_type: Option<String>,
    pub resolution: String, // e.g. "1920x1080" or "audio only"
    pub quality: String,    // e.g. "1080p"
}

pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.as_secs();
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

/// Appends `#hashtags` found in the description to the tag list, skipping
/// ones already present.
pub fn merge_hashtags(mut tags: Vec<String>, description: &str) -> Vec<String> {
    static HASHTAG: std::sync::LazyLock<regex::Regex> =
        std::sync::LazyLock::new(|| regex::Regex::new(r"#\w+").expect("static regex"));

    for m in HASHTAG.find_iter(description) {
        let tag = m.as_str();
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}
