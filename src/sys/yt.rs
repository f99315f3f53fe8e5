use crate::error::RetrievalError;
use crate::model::settings::Settings;
use crate::model::{merge_hashtags, watch_url, Channel, VideoFormat, VideoRecord};
use crate::sys::platform::{
    align_to_ids, dedup_limit, fail_batch, fail_missing, FetchOutcome, VideoPlatform,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{ChildStderr, ChildStdout, Command};

/// Ids handed to a single yt-dlp process when resolving metadata.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Platform backed by the `yt-dlp` executable.
pub struct YtDlp {
    program: String,
    timeout_secs: u64,
    include_formats: bool,
    batch_size: usize,
}

impl YtDlp {
    pub fn new(settings: &Settings) -> Self {
        Self {
            program: settings.ytdlp_path.clone(),
            timeout_secs: settings.timeout_secs,
            include_formats: settings.include_formats,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn build_base_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--no-warnings")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, err: std::io::Error) -> RetrievalError {
        RetrievalError::Unreachable(format!("failed to spawn {}: {}", self.program, err))
    }

    async fn run(&self, mut cmd: Command) -> Result<Output, RetrievalError> {
        log::debug!("yt-dlp command: {:?}", cmd);

        let child = cmd.spawn().map_err(|e| self.spawn_error(e))?;

        match tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            child.wait_with_output(),
        )
        .await
        {
            Ok(output) => output.map_err(|e| RetrievalError::Unreachable(e.to_string())),
            Err(_) => Err(RetrievalError::Timeout(self.timeout_secs)),
        }
    }

    /// Resolves one batch in a single process. Entries are parsed as yt-dlp
    /// prints them, so a timeout only fails the ids that had not arrived yet.
    async fn fetch_chunk(&self, ids: &[String]) -> Vec<FetchOutcome> {
        let mut cmd = self.build_base_command();
        cmd.args(["--dump-json", "--skip-download", "--no-playlist", "--ignore-errors"]);
        for id in ids {
            cmd.arg(watch_url(id));
        }
        log::debug!("yt-dlp command: {:?}", cmd);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return fail_batch(ids, &self.spawn_error(e)),
        };
        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            let _ = child.start_kill();
            let err = RetrievalError::Unreachable("yt-dlp output was not captured".to_string());
            return fail_batch(ids, &err);
        };

        let mut found: HashMap<String, Result<VideoRecord, RetrievalError>> = HashMap::new();
        let finished = tokio::time::timeout(Duration::from_secs(self.timeout_secs), async {
            let (read, stderr) = tokio::join!(
                read_entries(stdout, self.include_formats, &mut found),
                read_lossy(stderr),
            );
            read?;
            let stderr = stderr?;
            child.wait().await?;
            Ok::<_, std::io::Error>(stderr)
        })
        .await;

        match finished {
            Ok(Ok(stderr)) => {
                for (id, message) in parse_error_lines(&stderr) {
                    found.entry(id).or_insert_with(|| Err(classify_error(&message)));
                }
            }
            Ok(Err(e)) => {
                log::warn!("Reading yt-dlp output failed: {}", e);
                fail_missing(ids, &mut found, &RetrievalError::Unreachable(e.to_string()));
            }
            Err(_) => {
                let _ = child.start_kill();
                log::warn!(
                    "yt-dlp batch timed out after {}s with {}/{} entries",
                    self.timeout_secs,
                    found.len(),
                    ids.len()
                );
                fail_missing(ids, &mut found, &RetrievalError::Timeout(self.timeout_secs));
            }
        }

        align_to_ids(ids, found)
    }
}

/// Parses `--dump-json` lines into `found` as they arrive.
async fn read_entries(
    stdout: ChildStdout,
    include_formats: bool,
    found: &mut HashMap<String, Result<VideoRecord, RetrievalError>>,
) -> std::io::Result<()> {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();

    while reader.read_until(b'\n', &mut buf).await? > 0 {
        {
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim();
            if !line.is_empty() {
                match serde_json::from_str::<Value>(line) {
                    Ok(val) => match parse_video(&val, include_formats) {
                        Ok(record) => {
                            found.insert(record.id.clone(), Ok(record));
                        }
                        Err(e) => log::warn!("Skipping unparseable yt-dlp entry: {}", e),
                    },
                    Err(e) => log::warn!("Failed to parse yt-dlp JSON line: {}", e),
                }
            }
        }
        buf.clear();
    }
    Ok(())
}

pub(crate) async fn read_lossy(stderr: ChildStderr) -> std::io::Result<String> {
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[async_trait]
impl VideoPlatform for YtDlp {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>, RetrievalError> {
        let mut cmd = self.build_base_command();
        cmd.args(["--dump-json", "--flat-playlist"])
            .arg(format!("ytsearch{}:{}", limit, query));

        let output = self.run(cmd).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        let ids = parse_search_lines(&stdout);

        if ids.is_empty() {
            if !output.status.success() {
                let err = String::from_utf8_lossy(&output.stderr);
                return Err(RetrievalError::Platform {
                    status: exit_status_code(output.status.code()),
                    message: err.lines().next().unwrap_or("Unknown error").to_string(),
                });
            }
            return Err(RetrievalError::NoResults);
        }

        Ok(dedup_limit(ids, limit))
    }

    async fn fetch(&self, id: &str) -> Result<VideoRecord, RetrievalError> {
        let ids = [id.to_string()];
        self.fetch_chunk(&ids)
            .await
            .pop()
            .map(|(_, result)| result)
            .unwrap_or_else(|| Err(RetrievalError::Unavailable(id.to_string())))
    }

    async fn fetch_many(&self, ids: &[String], concurrency: usize) -> Vec<FetchOutcome> {
        let chunks: Vec<Vec<String>> = ids
            .chunks(self.batch_size)
            .map(<[String]>::to_vec)
            .collect();
        let results: Vec<Vec<FetchOutcome>> = stream::iter(chunks)
            .map(move |chunk| async move { self.fetch_chunk(&chunk).await })
            .buffered(concurrency.max(1))
            .collect()
            .await;
        results.into_iter().flatten().collect()
    }
}

/// Ids from `--flat-playlist --dump-json` output. Only plain video entries
/// are kept; channels and playlists in the result page are ignored.
pub fn parse_search_lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter(|val| {
            let item_type = val["_type"].as_str().unwrap_or("video");
            let ie_key = val["ie_key"].as_str().unwrap_or("Youtube");
            matches!(item_type, "video" | "url" | "url_transparent") && ie_key == "Youtube"
        })
        .filter_map(|val| val["id"].as_str().map(|s| s.to_string()))
        .collect()
}

/// Maps one `--dump-json` object onto a record.
pub fn parse_video(val: &Value, include_formats: bool) -> Result<VideoRecord, RetrievalError> {
    let id = val["id"]
        .as_str()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| RetrievalError::Parse("entry has no id".to_string()))?
        .to_string();

    let title = val["title"].as_str().unwrap_or_default().to_string();
    let description = val["description"].as_str().unwrap_or_default().to_string();

    let channel = Channel::new(
        val["channel_id"].as_str().unwrap_or_default(),
        val["channel"]
            .as_str()
            .or_else(|| val["uploader"].as_str())
            .unwrap_or("Unknown"),
        val["channel_url"]
            .as_str()
            .or_else(|| val["uploader_url"].as_str()),
    );

    let published_at = val["timestamp"]
        .as_i64()
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
        .or_else(|| val["upload_date"].as_str().and_then(parse_upload_date));

    let duration = val["duration"]
        .as_f64()
        .filter(|d| *d >= 0.0)
        .map(|d| Duration::from_secs(d as u64));

    let tags = val["tags"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    // Largest thumbnail by width, falling back to the generic field
    let thumbnail_url = val["thumbnails"]
        .as_array()
        .and_then(|arr| arr.iter().max_by_key(|t| t["width"].as_u64().unwrap_or(0)))
        .and_then(|t| t["url"].as_str())
        .or_else(|| val["thumbnail"].as_str())
        .map(|s| s.to_string());

    let formats = if include_formats {
        parse_formats(val)
    } else {
        Vec::new()
    };

    Ok(VideoRecord {
        url: val["webpage_url"]
            .as_str()
            .map(|s| s.to_string())
            .unwrap_or_else(|| watch_url(&id)),
        id,
        title,
        tags: merge_hashtags(tags, &description),
        description,
        channel,
        view_count: val["view_count"].as_u64(),
        like_count: val["like_count"].as_u64(),
        comment_count: val["comment_count"].as_u64(),
        published_at,
        duration,
        thumbnail_url,
        formats,
    })
}

fn parse_upload_date(s: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(s, "%Y%m%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn parse_formats(val: &Value) -> Vec<VideoFormat> {
    let mut formats = Vec::new();

    if let Some(list) = val["formats"].as_array() {
        for f in list {
            let format_id = f["format_id"].as_str().unwrap_or("").to_string();
            let ext = f["ext"].as_str().unwrap_or("").to_string();
            let vcodec = f["vcodec"].as_str().unwrap_or("none");
            let acodec = f["acodec"].as_str().unwrap_or("none");

            // Skip storyboards, images, and data-only formats
            if (vcodec == "none" && acodec == "none")
                || ext == "mhtml"
                || format_id.contains("storyboard")
            {
                continue;
            }

            let audio_only = vcodec == "none";
            let resolution = if audio_only {
                "audio only".to_string()
            } else {
                match (f["width"].as_u64(), f["height"].as_u64()) {
                    (Some(w), Some(h)) => format!("{}x{}", w, h),
                    _ => f["resolution"].as_str().unwrap_or("unknown").to_string(),
                }
            };

            let quality = f["format_note"]
                .as_str()
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .or_else(|| f["height"].as_u64().map(|h| format!("{}p", h)))
                .unwrap_or_else(|| "unknown".to_string());

            let mime_type = if ext.is_empty() {
                None
            } else if audio_only {
                Some(format!("audio/{}", ext))
            } else {
                Some(format!("video/{}", ext))
            };

            formats.push(VideoFormat {
                format_id,
                ext,
                mime_type,
                resolution,
                quality,
            });
        }
    }

    // Videos first (highest resolution), then audio only
    let height = |res: &str| {
        res.split('x')
            .next_back()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(0)
    };
    formats.sort_by(|a, b| {
        let a_audio = a.resolution == "audio only";
        let b_audio = b.resolution == "audio only";
        a_audio
            .cmp(&b_audio)
            .then_with(|| height(&b.resolution).cmp(&height(&a.resolution)))
    });

    formats
}

/// Exit code as a status number. Signals count as 1; codes that do not fit
/// saturate.
pub(crate) fn exit_status_code(code: Option<i32>) -> u16 {
    code.map_or(1, |code| u16::try_from(code).unwrap_or(u16::MAX))
}

/// Pulls `ERROR: [youtube] <id>: <message>` lines out of yt-dlp's stderr.
pub fn parse_error_lines(stderr: &str) -> Vec<(String, String)> {
    stderr
        .lines()
        .filter_map(|line| line.strip_prefix("ERROR: "))
        .filter_map(|rest| {
            let rest = rest.strip_prefix('[')?;
            let (_extractor, rest) = rest.split_once("] ")?;
            let (id, message) = rest.split_once(": ")?;
            Some((id.trim().to_string(), message.trim().to_string()))
        })
        .collect()
}

fn classify_error(message: &str) -> RetrievalError {
    let lower = message.to_lowercase();
    if lower.contains("429") || lower.contains("too many requests") || lower.contains("rate limit") {
        RetrievalError::RateLimited(message.to_string())
    } else {
        RetrievalError::Unavailable(message.to_string())
    }
}
