use crate::error::RetrievalError;
use crate::model::settings::Settings;
use crate::model::{merge_hashtags, watch_url, Channel, VideoRecord};
use crate::sys::platform::{align_to_ids, dedup_limit, fail_batch, FetchOutcome, VideoPlatform};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// `search.list` and `videos.list` both cap `maxResults` / `id` at 50.
pub const MAX_PAGE_SIZE: usize = 50;

/// YouTube Data API v3 backend.
pub struct DataApi {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout_secs: u64,
}

impl DataApi {
    pub fn new(settings: &Settings, api_key: String) -> Result<Self, RetrievalError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(concat!("ytcrawl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RetrievalError::Unreachable(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_API_BASE.to_string(),
            timeout_secs: settings.timeout_secs,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, RetrievalError> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url, path))
            .map_err(|e| RetrievalError::Unreachable(format!("bad api url: {}", e)))?;
        url.query_pairs_mut()
            .extend_pairs(params)
            .append_pair("key", &self.api_key);
        Ok(url)
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, url: Url) -> Result<T, RetrievalError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), &body));
        }

        let body = response.text().await.map_err(|e| self.request_error(e))?;
        Ok(serde_json::from_str(&body)?)
    }

    fn request_error(&self, err: reqwest::Error) -> RetrievalError {
        if err.is_timeout() {
            RetrievalError::Timeout(self.timeout_secs)
        } else {
            RetrievalError::Unreachable(err.to_string())
        }
    }

    async fn fetch_chunk(&self, ids: &[String]) -> Vec<FetchOutcome> {
        let joined = ids.join(",");
        let url = match self.endpoint(
            "videos",
            &[("part", "snippet,statistics,contentDetails"), ("id", joined.as_str())],
        ) {
            Ok(url) => url,
            Err(e) => return fail_batch(ids, &e),
        };

        let response: VideoListResponse = match self.get(url).await {
            Ok(r) => r,
            Err(e) => return fail_batch(ids, &e),
        };

        let found: HashMap<_, _> = response
            .items
            .into_iter()
            .map(|item| (item.id.clone(), Ok(item.into_record())))
            .collect();

        align_to_ids(ids, found)
    }
}

#[async_trait]
impl VideoPlatform for DataApi {
    fn name(&self) -> &'static str {
        "youtube-data-api"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>, RetrievalError> {
        let page_size = limit.clamp(1, MAX_PAGE_SIZE).to_string();
        let url = self.endpoint(
            "search",
            &[
                ("part", "id"),
                ("type", "video"),
                ("order", "relevance"),
                ("maxResults", page_size.as_str()),
                ("q", query),
            ],
        )?;

        let response: SearchListResponse = self.get(url).await?;
        let ids = dedup_limit(
            response.items.into_iter().filter_map(|item| item.id.video_id),
            limit,
        );

        if ids.is_empty() {
            return Err(RetrievalError::NoResults);
        }
        Ok(ids)
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
            .chunks(MAX_PAGE_SIZE)
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

/// Maps an HTTP error status onto the taxonomy. Quota exhaustion is a 403
/// with reason `quotaExceeded`.
pub fn status_error(status: u16, body: &str) -> RetrievalError {
    let message = serde_json::from_str::<ApiErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.chars().take(200).collect());

    match status {
        429 => RetrievalError::RateLimited(message),
        403 if body.contains("quotaExceeded") || body.contains("rateLimitExceeded") => {
            RetrievalError::RateLimited(message)
        }
        404 => RetrievalError::Unavailable(message),
        _ => RetrievalError::Platform { status, message },
    }
}

/// Parses ISO 8601 durations of the form `PT1H2M3S` (optionally with a day
/// component, as live archives sometimes report).
pub fn parse_iso8601_duration(s: &str) -> Option<Duration> {
    static ISO_DURATION: std::sync::LazyLock<regex::Regex> = std::sync::LazyLock::new(|| {
        regex::Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$")
            .expect("static regex")
    });

    let captures = ISO_DURATION.captures(s)?;
    let part = |i: usize| {
        captures
            .get(i)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };
    Some(Duration::from_secs(
        part(1) * 86_400 + part(2) * 3600 + part(3) * 60 + part(4),
    ))
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct SearchListResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    #[serde(default)]
    snippet: Snippet,
    #[serde(default)]
    statistics: Statistics,
    #[serde(default)]
    content_details: ContentDetails,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    channel_id: String,
    #[serde(default)]
    channel_title: String,
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    thumbnails: HashMap<String, Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
    width: Option<u64>,
}

// Counters arrive as decimal strings
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    view_count: Option<String>,
    like_count: Option<String>,
    comment_count: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

impl VideoItem {
    fn into_record(self) -> VideoRecord {
        let snippet = self.snippet;
        let count = |v: Option<String>| v.and_then(|s| s.parse::<u64>().ok());

        let thumbnail_url = snippet
            .thumbnails
            .values()
            .max_by_key(|t| t.width.unwrap_or(0))
            .map(|t| t.url.clone());

        VideoRecord {
            url: watch_url(&self.id),
            channel: Channel::new(snippet.channel_id, snippet.channel_title, None),
            tags: merge_hashtags(snippet.tags, &snippet.description),
            id: self.id,
            title: snippet.title,
            description: snippet.description,
            view_count: count(self.statistics.view_count),
            like_count: count(self.statistics.like_count),
            comment_count: count(self.statistics.comment_count),
            published_at: snippet.published_at,
            duration: self
                .content_details
                .duration
                .as_deref()
                .and_then(parse_iso8601_duration),
            thumbnail_url,
            formats: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Local HTTP server answering every request with `status` and `body`.
    /// Returns its base url and the request lines it has seen.
    async fn stub_server(
        status: &'static str,
        body: String,
    ) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let request = String::from_utf8_lossy(&request);
                if let Some(line) = request.lines().next() {
                    log.lock().unwrap().push(line.to_string());
                }

                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}", addr), seen)
    }

    fn api(base: &str) -> DataApi {
        let settings = Settings {
            timeout_secs: 2,
            ..Settings::default()
        };
        DataApi::new(&settings, "secret".to_string())
            .unwrap()
            .with_base_url(base)
    }

    #[test]
    fn endpoint_carries_params_and_key() {
        let url = api("http://localhost:8080/youtube/v3/")
            .endpoint("search", &[("q", "data science"), ("maxResults", "5")])
            .unwrap();
        assert_eq!(url.path(), "/youtube/v3/search");
        let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["q"], "data science");
        assert_eq!(pairs["maxResults"], "5");
        assert_eq!(pairs["key"], "secret");
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        // Port 9 (discard) is not expected to accept connections
        let err = api("http://127.0.0.1:9").search("x", 1).await.unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::Unreachable(_) | RetrievalError::Timeout(2)
        ));

        let outcomes = api("http://127.0.0.1:9")
            .fetch_many(&["a".to_string(), "b".to_string()], 1)
            .await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|(_, r)| r.is_err()));
    }

    #[tokio::test]
    async fn search_returns_video_ids_in_order() {
        let body = json!({
            "items": [
                {"id": {"kind": "youtube#video", "videoId": "aaaaaaaaaaa"}},
                {"id": {"kind": "youtube#channel", "channelId": "UC1"}},
                {"id": {"kind": "youtube#video", "videoId": "bbbbbbbbbbb"}},
                {"id": {"kind": "youtube#video", "videoId": "aaaaaaaaaaa"}}
            ]
        });
        let (base, seen) = stub_server("200 OK", body.to_string()).await;

        let ids = api(&base).search("data science", 5).await.unwrap();
        assert_eq!(ids, vec!["aaaaaaaaaaa", "bbbbbbbbbbb"]);

        let request = seen.lock().unwrap()[0].clone();
        assert!(request.starts_with("GET /search?"), "{}", request);
        assert!(request.contains("q=data+science"), "{}", request);
        assert!(request.contains("maxResults=5"), "{}", request);
    }

    #[tokio::test]
    async fn empty_search_is_no_results() {
        let (base, _) = stub_server("200 OK", json!({"items": []}).to_string()).await;
        assert_eq!(
            api(&base).search("nothing matches", 5).await,
            Err(RetrievalError::NoResults)
        );
    }

    #[tokio::test]
    async fn video_missing_from_reply_is_unavailable() {
        // The reply leaves out the private video and lists the rest out of order
        let body = json!({
            "items": [
                {"id": "ccccccccccc", "snippet": {"title": "Third"}},
                {"id": "aaaaaaaaaaa", "snippet": {"title": "First"}}
            ]
        });
        let (base, seen) = stub_server("200 OK", body.to_string()).await;
        let ids: Vec<String> = ["aaaaaaaaaaa", "bbbbbbbbbbb", "ccccccccccc"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let outcomes = api(&base).fetch_many(&ids, 2).await;

        let order: Vec<&str> = outcomes.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(order, vec!["aaaaaaaaaaa", "bbbbbbbbbbb", "ccccccccccc"]);
        assert_eq!(outcomes[0].1.as_ref().unwrap().title, "First");
        assert_eq!(
            outcomes[1].1,
            Err(RetrievalError::Unavailable("bbbbbbbbbbb".to_string()))
        );
        assert_eq!(outcomes[2].1.as_ref().unwrap().title, "Third");

        let requests = seen.lock().unwrap().clone();
        assert_eq!(requests.len(), 1, "three ids fit in one videos.list call");
        assert!(requests[0].starts_with("GET /videos?"), "{}", requests[0]);
    }

    #[tokio::test]
    async fn quota_and_throttling_reach_caller_as_rate_limits() {
        let quota = json!({
            "error": {
                "code": 403,
                "message": "quota exhausted",
                "errors": [{"reason": "quotaExceeded"}]
            }
        });
        let (base, _) = stub_server("403 Forbidden", quota.to_string()).await;
        assert_eq!(
            api(&base).search("x", 3).await,
            Err(RetrievalError::RateLimited("quota exhausted".to_string()))
        );

        let (base, _) = stub_server("429 Too Many Requests", "slow down".to_string()).await;
        let outcomes = api(&base)
            .fetch_many(&["aaaaaaaaaaa".to_string(), "bbbbbbbbbbb".to_string()], 1)
            .await;
        assert_eq!(outcomes.len(), 2);
        for (_, result) in outcomes {
            assert_eq!(result, Err(RetrievalError::RateLimited("slow down".to_string())));
        }
    }

    #[test]
    fn parses_iso_durations() {
        assert_eq!(parse_iso8601_duration("PT3M32S"), Some(Duration::from_secs(212)));
        assert_eq!(parse_iso8601_duration("PT1H"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_iso8601_duration("P1DT2S"), Some(Duration::from_secs(86_402)));
        assert_eq!(parse_iso8601_duration("P0D"), Some(Duration::ZERO));
        assert_eq!(parse_iso8601_duration("3:32"), None);
    }

    #[test]
    fn video_item_maps_to_record() {
        let body = json!({
            "items": [{
                "id": "abcdefghijk",
                "snippet": {
                    "title": "Intro to data science",
                    "description": "Course #datascience",
                    "channelId": "UC1",
                    "channelTitle": "Stats Lab",
                    "publishedAt": "2023-04-01T12:30:00Z",
                    "tags": ["python", "pandas"],
                    "thumbnails": {
                        "default": {"url": "https://i.ytimg.com/d.jpg", "width": 120},
                        "high": {"url": "https://i.ytimg.com/h.jpg", "width": 480}
                    }
                },
                "statistics": {"viewCount": "1024", "likeCount": "12"},
                "contentDetails": {"duration": "PT10M5S"}
            }]
        });
        let response: VideoListResponse = serde_json::from_value(body).unwrap();
        let record = response.items.into_iter().next().unwrap().into_record();

        assert_eq!(record.id, "abcdefghijk");
        assert_eq!(record.channel.url, "https://www.youtube.com/channel/UC1");
        assert_eq!(record.view_count, Some(1024));
        assert_eq!(record.like_count, Some(12));
        assert_eq!(record.comment_count, None);
        assert_eq!(record.duration_string(), "10:05");
        assert_eq!(record.tags, vec!["python", "pandas", "#datascience"]);
        assert_eq!(record.thumbnail_url.as_deref(), Some("https://i.ytimg.com/h.jpg"));
        assert_eq!(
            record.published_at.map(|d| d.to_rfc3339()),
            Some("2023-04-01T12:30:00+00:00".to_string())
        );
    }

    #[test]
    fn search_items_without_video_ids_are_dropped() {
        let body = json!({
            "items": [
                {"id": {"kind": "youtube#video", "videoId": "aaaaaaaaaaa"}},
                {"id": {"kind": "youtube#channel", "channelId": "UC1"}},
                {"id": {"kind": "youtube#video", "videoId": "bbbbbbbbbbb"}}
            ]
        });
        let response: SearchListResponse = serde_json::from_value(body).unwrap();
        let ids: Vec<_> = response.items.into_iter().filter_map(|i| i.id.video_id).collect();
        assert_eq!(ids, vec!["aaaaaaaaaaa", "bbbbbbbbbbb"]);
    }

    #[test]
    fn quota_errors_are_rate_limits() {
        let body = json!({
            "error": {
                "code": 403,
                "message": "The request cannot be completed because you have exceeded your quota.",
                "errors": [{"reason": "quotaExceeded"}]
            }
        })
        .to_string();
        assert!(matches!(status_error(403, &body), RetrievalError::RateLimited(m) if m.contains("quota")));
        assert!(matches!(
            status_error(500, "oops"),
            RetrievalError::Platform { status: 500, .. }
        ));
    }
}
