use crate::error::RetrievalError;
use crate::model::VideoRecord;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};

pub type FetchOutcome = (String, Result<VideoRecord, RetrievalError>);

/// The two operations the crawler needs from a video platform.
#[async_trait]
pub trait VideoPlatform: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &'static str;

    /// Ids matching `query` in relevance order. At most `limit` are returned.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>, RetrievalError>;

    /// Metadata for a single id.
    async fn fetch(&self, id: &str) -> Result<VideoRecord, RetrievalError>;

    /// Metadata for many ids, one outcome per id in input order.
    ///
    /// The default issues one `fetch` per id with up to `concurrency` requests
    /// in flight. Backends that can batch should override it.
    async fn fetch_many(&self, ids: &[String], concurrency: usize) -> Vec<FetchOutcome> {
        stream::iter(ids.iter().cloned())
            .map(|id| async move {
                let result = self.fetch(&id).await;
                (id, result)
            })
            .buffered(concurrency.max(1))
            .collect()
            .await
    }
}

/// Drops duplicate ids, keeping the first occurrence, then truncates to `limit`.
pub fn dedup_limit<I>(ids: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = std::collections::HashSet::new();
    ids.into_iter()
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .take(limit)
        .collect()
}

/// Reorders batched results to follow `ids`. Ids the batch did not return are
/// reported as unavailable.
pub fn align_to_ids(
    ids: &[String],
    mut found: std::collections::HashMap<String, Result<VideoRecord, RetrievalError>>,
) -> Vec<FetchOutcome> {
    ids.iter()
        .map(|id| {
            let result = found
                .remove(id)
                .unwrap_or_else(|| Err(RetrievalError::Unavailable(id.clone())));
            (id.clone(), result)
        })
        .collect()
}

/// Reports one batch-wide failure against every id of the batch.
pub fn fail_batch(ids: &[String], err: &RetrievalError) -> Vec<FetchOutcome> {
    ids.iter().map(|id| (id.clone(), Err(err.clone()))).collect()
}

/// Records `err` for every id of the batch that has no outcome yet.
pub fn fail_missing(
    ids: &[String],
    found: &mut std::collections::HashMap<String, Result<VideoRecord, RetrievalError>>,
    err: &RetrievalError,
) {
    for id in ids {
        found
            .entry(id.clone())
            .or_insert_with(|| Err(err.clone()));
    }
}
