//! Downloads the videos listed in a results file, one directory per channel.

use crate::error::DownloadError;
use crate::model::download::{DownloadInfo, DownloadStatus, Resolution};
use crate::model::settings::{sanitize_filename, DownloadSettings};
use crate::model::VideoRecord;
use crate::sys::download::VideoDownloader;
use crate::sys::output::save_json;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub resolution: Resolution,
    pub file_format: String,
    pub limit: Option<usize>,
}

impl From<&DownloadSettings> for DownloadRequest {
    fn from(settings: &DownloadSettings) -> Self {
        Self {
            input: settings.input.clone(),
            output_dir: settings.output_dir.clone(),
            resolution: settings.resolution,
            file_format: settings.file_format.clone(),
            limit: settings.limit,
        }
    }
}

#[derive(Debug, Default)]
pub struct DownloadReport {
    pub attempted: usize,
    pub downloaded: Vec<PathBuf>,
    pub already_present: Vec<PathBuf>,
    pub failed: Vec<(String, DownloadError)>,
}

impl DownloadReport {
    /// Videos that are on disk after the run.
    pub fn available(&self) -> usize {
        self.downloaded.len() + self.already_present.len()
    }
}

/// Reads the records written by a crawl.
pub async fn load_records(path: &Path) -> Result<Vec<VideoRecord>, DownloadError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| DownloadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&contents).map_err(|source| DownloadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// `<output_dir>/<channel>/<title>_<id>.<ext>` and the matching
/// `<title>_<id>_info.json`.
pub fn target_paths(record: &VideoRecord, output_dir: &Path, ext: &str) -> (PathBuf, PathBuf) {
    let channel = match sanitize_filename(&record.channel.name) {
        name if name.is_empty() => "unknown_channel".to_string(),
        name => name,
    };
    let title = match sanitize_filename(&record.title) {
        title if title.is_empty() => record.id.clone(),
        title => title,
    };
    let dir = output_dir.join(channel);
    let stem = format!("{}_{}", title, record.id);
    (
        dir.join(format!("{}.{}", stem, ext)),
        dir.join(format!("{}_info.json", stem)),
    )
}

/// Downloads one video and writes its sidecar. A file that is already on
/// disk is left alone.
pub async fn download_video(
    downloader: &dyn VideoDownloader,
    record: &VideoRecord,
    request: &DownloadRequest,
) -> Result<DownloadStatus, DownloadError> {
    let (video_path, info_path) = target_paths(record, &request.output_dir, &request.file_format);

    if tokio::fs::try_exists(&video_path).await.unwrap_or(false) {
        log::info!("Video already downloaded: {}", video_path.display());
        return Ok(DownloadStatus::AlreadyPresent(video_path));
    }

    if let Some(dir) = video_path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| DownloadError::Directory {
                path: dir.to_path_buf(),
                source,
            })?;
    }

    log::info!("Initializing download for video ID: {}", record.id);
    let selector = request.resolution.format_selector(&request.file_format);
    let format = downloader
        .download(&record.url, &selector, &request.file_format, &video_path)
        .await
        .map_err(|source| DownloadError::Fetch {
            id: record.id.clone(),
            source,
        })?;
    log::info!(
        "Downloaded {} as {} ({})",
        record.id,
        format.resolution,
        format.format_id
    );

    let info = DownloadInfo {
        video: record,
        downloaded_format: &format,
    };
    save_json(&info, &info_path).await?;

    Ok(DownloadStatus::Downloaded(video_path))
}

/// Downloads every record of `request.input` in file order, one at a time.
/// Per-video failures are logged and skipped.
pub async fn download_all(
    downloader: &dyn VideoDownloader,
    request: &DownloadRequest,
) -> Result<DownloadReport, DownloadError> {
    let mut records = load_records(&request.input).await?;
    if records.is_empty() {
        return Err(DownloadError::Empty(request.input.clone()));
    }
    log::info!(
        "Loaded {} videos from {}",
        records.len(),
        request.input.display()
    );

    if let Some(limit) = request.limit.filter(|l| *l < records.len()) {
        records.truncate(limit);
        log::info!("Limited to downloading {} videos", limit);
    }

    let total = records.len();
    let mut report = DownloadReport {
        attempted: total,
        ..DownloadReport::default()
    };

    for (i, record) in records.iter().enumerate() {
        log::info!("Processing video {}/{}: {}", i + 1, total, record.title);
        match download_video(downloader, record, request).await {
            Ok(DownloadStatus::Downloaded(path)) => report.downloaded.push(path),
            Ok(DownloadStatus::AlreadyPresent(path)) => report.already_present.push(path),
            Err(err) => {
                log::error!("Failed to download video {}: {}", record.id, err);
                report.failed.push((record.id.clone(), err));
            }
        }
    }

    log::info!(
        "Download complete. {}/{} videos available in {}",
        report.available(),
        total,
        request.output_dir.display()
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{watch_url, Channel};

    fn record(id: &str, title: &str, channel: &str) -> VideoRecord {
        VideoRecord {
            id: id.to_string(),
            url: watch_url(id),
            title: title.to_string(),
            description: String::new(),
            channel: Channel::new("UC1", channel, None),
            view_count: None,
            like_count: None,
            comment_count: None,
            published_at: None,
            duration: None,
            tags: Vec::new(),
            thumbnail_url: None,
            formats: Vec::new(),
        }
    }

    #[test]
    fn paths_group_by_channel() {
        let (video, info) = target_paths(
            &record("abcdefghijk", "Cats: the movie?", "Cat TV"),
            Path::new("downloads"),
            "mp4",
        );
        assert_eq!(
            video,
            PathBuf::from("downloads/Cat_TV/Cats_the_movie_abcdefghijk.mp4")
        );
        assert_eq!(
            info,
            PathBuf::from("downloads/Cat_TV/Cats_the_movie_abcdefghijk_info.json")
        );
    }

    #[test]
    fn blank_names_fall_back() {
        let (video, _) = target_paths(&record("abcdefghijk", "???", ""), Path::new("d"), "webm");
        assert_eq!(
            video,
            PathBuf::from("d/unknown_channel/abcdefghijk_abcdefghijk.webm")
        );
    }
}
