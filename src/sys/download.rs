use crate::error::RetrievalError;
use crate::model::download::{DownloadProgress, DownloadedFormat};
use crate::sys::yt::{exit_status_code, read_lossy};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStdout, Command};

/// Prefix of the line yt-dlp prints once the file is in place.
const FORMAT_MARKER: &str = "ytcrawl-format";

/// Fetches one video file to a fixed path.
#[async_trait]
pub trait VideoDownloader: Send + Sync {
    /// Downloads `url` with the yt-dlp format `selector` into `output`,
    /// merging separate streams into `ext`.
    async fn download(
        &self,
        url: &str,
        selector: &str,
        ext: &str,
        output: &Path,
    ) -> Result<DownloadedFormat, RetrievalError>;
}

/// Downloader backed by the `yt-dlp` executable.
pub struct YtDlpDownloader {
    program: String,
}

impl YtDlpDownloader {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn build_command(&self, url: &str, selector: &str, ext: &str, output: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--no-warnings")
            .arg("--no-playlist")
            .arg("--newline")
            .arg("--progress")
            .arg("-f")
            .arg(selector)
            .arg("--merge-output-format")
            .arg(ext)
            .arg("-o")
            .arg(output_template(output))
            .arg("--print")
            .arg(format!(
                "after_move:{} %(format_id)s %(width)s %(height)s",
                FORMAT_MARKER
            ))
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl VideoDownloader for YtDlpDownloader {
    async fn download(
        &self,
        url: &str,
        selector: &str,
        ext: &str,
        output: &Path,
    ) -> Result<DownloadedFormat, RetrievalError> {
        let mut cmd = self.build_command(url, selector, ext, output);
        log::debug!("Download command: {:?}", cmd);

        let mut child = cmd.spawn().map_err(|e| {
            RetrievalError::Unreachable(format!("failed to spawn {}: {}", self.program, e))
        })?;
        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            let _ = child.start_kill();
            return Err(RetrievalError::Unreachable(
                "yt-dlp output was not captured".to_string(),
            ));
        };

        let (format, stderr) = tokio::join!(watch_progress(stdout, url), read_lossy(stderr));
        let status = child
            .wait()
            .await
            .map_err(|e| RetrievalError::Unreachable(e.to_string()))?;

        if !status.success() {
            let stderr = stderr.unwrap_or_default();
            let message = stderr
                .lines()
                .find(|l| l.starts_with("ERROR:"))
                .or_else(|| stderr.lines().next())
                .unwrap_or("Unknown error")
                .to_string();
            return Err(RetrievalError::Platform {
                status: exit_status_code(status.code()),
                message,
            });
        }

        let format = format.unwrap_or_else(|e| {
            log::warn!("Lost yt-dlp output for {}: {}", url, e);
            None
        });
        Ok(format.unwrap_or_else(DownloadedFormat::unknown))
    }
}

/// Logs progress lines and returns the format reported at the end, if any.
async fn watch_progress(
    stdout: ChildStdout,
    url: &str,
) -> std::io::Result<Option<DownloadedFormat>> {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    let mut format = None;

    while reader.read_until(b'\n', &mut buf).await? > 0 {
        {
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim();
            if let Some(progress) = parse_progress(line) {
                log::debug!(
                    "{}: {:.1}% of {} at {} ETA {}",
                    url,
                    progress.percent,
                    progress.total_size,
                    progress.speed,
                    progress.eta
                );
            } else if let Some(parsed) = parse_format_line(line) {
                format = Some(parsed);
            }
        }
        buf.clear();
    }
    Ok(format)
}

/// yt-dlp treats `%` in `-o` as a template field.
fn output_template(output: &Path) -> String {
    output.to_string_lossy().replace('%', "%%")
}

/// Parses `[download]  45.0% of ~4.30MiB at 2.50MiB/s ETA 00:01`.
pub fn parse_progress(line: &str) -> Option<DownloadProgress> {
    if !line.starts_with("[download]") {
        return None;
    }

    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 4 || parts[2] != "of" {
        return None;
    }

    let percent = parts[1].trim_end_matches('%').parse::<f64>().ok()?;
    let total_size = parts[3].trim_start_matches('~').to_string();

    // "at" and "ETA" move around or go missing depending on the stage
    let value_after = |key: &str| {
        parts
            .windows(2)
            .skip(4)
            .find(|w| w[0] == key)
            .map(|w| w[1].to_string())
            .unwrap_or_default()
    };

    Some(DownloadProgress {
        percent,
        total_size,
        speed: value_after("at"),
        eta: value_after("ETA"),
    })
}

/// Parses the `--print after_move:` line into the format that was fetched.
pub fn parse_format_line(line: &str) -> Option<DownloadedFormat> {
    let mut parts = line.strip_prefix(FORMAT_MARKER)?.split_whitespace();
    let format_id = parts.next()?.to_string();
    let width = parts.next().and_then(|w| w.parse::<u32>().ok());
    let height = parts.next().and_then(|h| h.parse::<u32>().ok());

    Some(DownloadedFormat {
        format_id,
        resolution: match (width, height) {
            (Some(w), Some(h)) => format!("{}x{}", w, h),
            _ => "unknown".to_string(),
        },
        quality: height
            .map(|h| format!("{}p", h))
            .unwrap_or_else(|| "unknown".to_string()),
    })
}
