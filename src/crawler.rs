//! Search, fetch, write: the whole crawl as one linear pass.

use crate::error::{CrawlError, RetrievalError, Result};
use crate::model::settings::Settings;
use crate::model::VideoRecord;
use crate::sys::output::save_json;
use crate::sys::platform::VideoPlatform;
use std::path::PathBuf;

/// Parameters of one crawl.
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    pub query: String,
    pub max_videos: usize,
    pub concurrency: usize,
    pub output_path: PathBuf,
}

impl From<&Settings> for CrawlRequest {
    fn from(settings: &Settings) -> Self {
        Self {
            query: settings.query.clone(),
            max_videos: settings.max_videos,
            concurrency: settings.concurrency,
            output_path: settings.output_path.clone(),
        }
    }
}

#[derive(Debug)]
pub struct CrawlReport {
    /// Successfully fetched records, in search order.
    pub records: Vec<VideoRecord>,
    /// Number of ids returned by the search.
    pub attempted: usize,
    /// Ids that could not be fetched, with the reason.
    pub skipped: Vec<(String, RetrievalError)>,
    pub output_path: PathBuf,
}

impl CrawlReport {
    pub fn written(&self) -> usize {
        self.records.len()
    }
}

/// Runs the search. An empty result is not an error here: it is logged and
/// turned into an empty list.
pub async fn run_query(
    platform: &dyn VideoPlatform,
    query: &str,
    max_videos: usize,
) -> Result<Vec<String>> {
    log::info!("Searching for up to {} videos...", max_videos);

    match platform.search(query, max_videos).await {
        Ok(mut ids) => {
            ids.truncate(max_videos);
            log::info!("Found {} video IDs", ids.len());
            Ok(ids)
        }
        Err(RetrievalError::NoResults) => {
            log::warn!("Search for '{}' returned no results", query);
            Ok(Vec::new())
        }
        Err(source) => {
            log::error!("Search for '{}' via {} failed: {}", query, platform.name(), source);
            Err(CrawlError::Search {
                query: query.to_string(),
                source,
            })
        }
    }
}

/// Fetches metadata for every id. Failures are logged and skipped, the
/// successful records keep the order of `ids`.
pub async fn fetch_metadata(
    platform: &dyn VideoPlatform,
    query: &str,
    ids: &[String],
    concurrency: usize,
) -> (Vec<VideoRecord>, Vec<(String, RetrievalError)>) {
    let total = ids.len();
    let mut records = Vec::with_capacity(total);
    let mut skipped = Vec::new();

    let outcomes = platform.fetch_many(ids, concurrency).await;

    for (i, (id, result)) in outcomes.into_iter().enumerate() {
        log::info!("Processing video {}/{}: {}", i + 1, total, id);
        match result {
            Ok(record) if record.id == id => {
                log::info!(
                    "Successfully extracted details for video: {} ({})",
                    record.title,
                    record.duration_string()
                );
                records.push(record);
            }
            Ok(record) => {
                let err = RetrievalError::Parse(format!(
                    "platform returned id {} for request {}",
                    record.id, id
                ));
                log::error!("Error processing video {} (query '{}'): {}", id, query, err);
                skipped.push((id, err));
            }
            Err(err) => {
                log::error!("Error processing video {} (query '{}'): {}", id, query, err);
                skipped.push((id, err));
            }
        }
    }

    (records, skipped)
}

/// Search, fetch every hit, write the successes to `request.output_path`.
pub async fn crawl(platform: &dyn VideoPlatform, request: &CrawlRequest) -> Result<CrawlReport> {
    log::info!("Starting YouTube crawler for: '{}'", request.query);

    let ids = run_query(platform, &request.query, request.max_videos).await?;
    let (records, skipped) =
        fetch_metadata(platform, &request.query, &ids, request.concurrency).await;

    save_json(&records, &request.output_path).await.map_err(|e| {
        log::error!("Failed to write results: {}", e);
        e
    })?;

    log::info!(
        "Completed with {}/{} records, saved to {}",
        records.len(),
        ids.len(),
        request.output_path.display()
    );

    Ok(CrawlReport {
        records,
        attempted: ids.len(),
        skipped,
        output_path: request.output_path.clone(),
    })
}
