//! Client for the YouTube Data API v3 endpoints used by trend lookup.
//!
//! `search` discovers recent videos for a keyword query; `videos` and
//! `channels` resolve view and subscriber counts so the results can be turned
//! into [`VideoCandidate`]s for the ranker.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::core::trends::VideoCandidate;
use crate::error::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3/";
const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

pub const DEFAULT_SEARCH_MAX_RESULTS: u32 = 25;
/// `videos` and `channels` accept at most 50 ids per call.
const MAX_IDS_PER_CALL: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub video_id: String,
    pub title: String,
    pub channel_id: String,
    pub channel_title: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: Option<SearchSnippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    channel_id: String,
    #[serde(default)]
    channel_title: String,
}

#[derive(Debug, Deserialize)]
struct StatisticsResponse<S> {
    #[serde(default = "Vec::new")]
    items: Vec<StatisticsItem<S>>,
}

#[derive(Debug, Deserialize)]
struct StatisticsItem<S> {
    id: String,
    statistics: Option<S>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    view_count: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelStatistics {
    subscriber_count: Option<String>,
    #[serde(default)]
    hidden_subscriber_count: bool,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    reason: String,
}

pub struct YouTubeClient {
    client: Client,
    api_key: String,
    base_url: Url,
}

impl YouTubeClient {
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Same as [`YouTubeClient::new`] but aimed at another host (mock servers in tests).
    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| Error::custom(format!("invalid YouTube base URL '{base_url}': {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url,
        })
    }

    pub async fn search(
        &self,
        query: &str,
        max_results: u32,
        published_after: DateTime<Utc>,
    ) -> Result<Vec<SearchHit>> {
        let published_after = published_after.to_rfc3339_opts(SecondsFormat::Secs, true);
        let max_results = max_results.clamp(1, 50).to_string();
        let response: SearchResponse = self
            .get_json(
                "search",
                &[
                    ("part", "snippet"),
                    ("type", "video"),
                    ("order", "viewCount"),
                    ("q", query),
                    ("maxResults", &max_results),
                    ("publishedAfter", &published_after),
                ],
            )
            .await?;

        Ok(response
            .items
            .into_iter()
            .filter_map(|item| {
                let video_id = item.id.video_id?;
                let snippet = item.snippet?;
                Some(SearchHit {
                    video_id,
                    title: snippet.title,
                    channel_id: snippet.channel_id,
                    channel_title: snippet.channel_title,
                })
            })
            .collect())
    }

    /// Map of video id to view count. Videos without public statistics are absent.
    pub async fn video_views(&self, ids: &[String]) -> Result<HashMap<String, i64>> {
        let mut views = HashMap::new();
        for chunk in ids.chunks(MAX_IDS_PER_CALL) {
            let joined = chunk.join(",");
            let response: StatisticsResponse<VideoStatistics> = self
                .get_json("videos", &[("part", "statistics"), ("id", &joined)])
                .await?;
            for item in response.items {
                if let Some(count) = item
                    .statistics
                    .and_then(|s| s.view_count)
                    .and_then(|c| c.parse::<i64>().ok())
                {
                    views.insert(item.id, count);
                }
            }
        }
        Ok(views)
    }

    /// Map of channel id to subscriber count. Hidden counts are reported as 0.
    pub async fn channel_subscribers(&self, ids: &[String]) -> Result<HashMap<String, i64>> {
        let mut subscribers = HashMap::new();
        for chunk in ids.chunks(MAX_IDS_PER_CALL) {
            let joined = chunk.join(",");
            let response: StatisticsResponse<ChannelStatistics> = self
                .get_json("channels", &[("part", "statistics"), ("id", &joined)])
                .await?;
            for item in response.items {
                let count = item
                    .statistics
                    .filter(|s| !s.hidden_subscriber_count)
                    .and_then(|s| s.subscriber_count)
                    .and_then(|c| c.parse::<i64>().ok())
                    .unwrap_or(0);
                subscribers.insert(item.id, count);
            }
        }
        Ok(subscribers)
    }

    /// Searches for `keywords` (OR-joined) and resolves statistics, keeping
    /// discovery order.
    pub async fn trending_candidates(
        &self,
        keywords: &[String],
        max_results: u32,
        published_after: DateTime<Utc>,
    ) -> Result<Vec<VideoCandidate>> {
        if keywords.is_empty() {
            return Ok(Vec::new());
        }
        let query = keywords.join("|");
        let hits = self.search(&query, max_results, published_after).await?;
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let video_ids: Vec<String> = hits.iter().map(|h| h.video_id.clone()).collect();
        let mut channel_ids: Vec<String> = Vec::new();
        for hit in &hits {
            if !channel_ids.contains(&hit.channel_id) {
                channel_ids.push(hit.channel_id.clone());
            }
        }

        let views = self.video_views(&video_ids).await?;
        let subscribers = self.channel_subscribers(&channel_ids).await?;
        tracing::debug!(
            hits = hits.len(),
            channels = channel_ids.len(),
            "resolved trend statistics"
        );

        Ok(hits
            .into_iter()
            .map(|hit| VideoCandidate {
                url: format!("{WATCH_URL}{}", hit.video_id),
                view_count: views.get(&hit.video_id).copied().unwrap_or(0),
                subscriber_count: subscribers.get(&hit.channel_id).copied().unwrap_or(0),
                title: hit.title,
                channel_name: hit.channel_title,
            })
            .collect())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let mut url = self
            .base_url
            .join(endpoint)
            .map_err(|e| Error::custom(format!("invalid endpoint '{endpoint}': {e}")))?;
        url.query_pairs_mut()
            .extend_pairs(params.iter().copied())
            .append_pair("key", &self.api_key);

        tracing::debug!(endpoint, "YouTube request");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &raw));
        }
        Ok(response.json::<T>().await?)
    }
}

/// YouTube reports quota exhaustion as 403 `quotaExceeded`; fold that into
/// a 429 so the retry classifier treats it as throttling.
fn api_error(status: u16, raw: &str) -> Error {
    match serde_json::from_str::<ApiErrorEnvelope>(raw) {
        Ok(envelope) => {
            let reasons: Vec<&str> = envelope
                .error
                .errors
                .iter()
                .map(|e| e.reason.as_str())
                .filter(|r| !r.is_empty())
                .collect();
            let throttled = reasons.iter().any(|r| {
                matches!(*r, "quotaExceeded" | "rateLimitExceeded" | "userRateLimitExceeded")
            });
            Error::Api {
                status: if throttled { 429 } else { status },
                message: if reasons.is_empty() {
                    envelope.error.message
                } else {
                    format!("{} ({})", envelope.error.message, reasons.join(", "))
                },
            }
        }
        Err(_) => Error::Api {
            status,
            message: raw.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::retry::is_rate_limited;
    use chrono::TimeZone;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> YouTubeClient {
        YouTubeClient::with_base_url("test-key", base_url)
            .expect("client construction should not fail")
    }

    fn since() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 11, 0, 0, 0).unwrap()
    }

    fn search_body() -> serde_json::Value {
        serde_json::json!({
            "items": [
                {
                    "id": {"kind": "youtube#video", "videoId": "vid1"},
                    "snippet": {
                        "title": "Linen shirt styling",
                        "channelId": "chanA",
                        "channelTitle": "Small Shop",
                        "thumbnails": {"high": {"url": "https://i.ytimg.com/vi/vid1/hq.jpg"}}
                    }
                },
                {
                    "id": {"kind": "youtube#video", "videoId": "vid2"},
                    "snippet": {
                        "title": "Summer haul",
                        "channelId": "chanB",
                        "channelTitle": "Big Brand",
                        "thumbnails": {}
                    }
                },
                {
                    "id": {"kind": "youtube#channel", "channelId": "chanC"},
                    "snippet": {"title": "not a video", "channelId": "chanC", "channelTitle": "C"}
                }
            ]
        })
    }

    async fn mount_statistics(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/videos"))
            .and(query_param("part", "statistics"))
            .and(query_param("id", "vid1,vid2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    {"id": "vid1", "statistics": {"viewCount": "12000"}},
                    {"id": "vid2", "statistics": {"viewCount": "500"}}
                ]
            })))
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/channels"))
            .and(query_param("id", "chanA,chanB"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    {"id": "chanA", "statistics": {"subscriberCount": "4000", "hiddenSubscriberCount": false}},
                    {"id": "chanB", "statistics": {"hiddenSubscriberCount": true}}
                ]
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn search_sends_expected_query_and_skips_non_videos() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("part", "snippet"))
            .and(query_param("type", "video"))
            .and(query_param("order", "viewCount"))
            .and(query_param("q", "linen|summer"))
            .and(query_param("maxResults", "10"))
            .and(query_param("publishedAfter", "2026-10-11T00:00:00Z"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_body()))
            .mount(&server)
            .await;

        let hits = test_client(&server.uri())
            .search("linen|summer", 10, since())
            .await
            .expect("should parse search results");

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].video_id, "vid1");
        assert_eq!(hits[0].channel_title, "Small Shop");
        assert_eq!(hits[1].title, "Summer haul");
    }

    #[tokio::test]
    async fn trending_candidates_join_statistics() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_body()))
            .mount(&server)
            .await;
        mount_statistics(&server).await;

        let keywords = vec!["linen".to_string(), "summer".to_string()];
        let candidates = test_client(&server.uri())
            .trending_candidates(&keywords, 25, since())
            .await
            .expect("should build candidates");

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].title, "Linen shirt styling");
        assert_eq!(candidates[0].url, "https://www.youtube.com/watch?v=vid1");
        assert_eq!(candidates[0].view_count, 12_000);
        assert_eq!(candidates[0].subscriber_count, 4_000);
        assert_eq!(candidates[1].subscriber_count, 0, "hidden count maps to 0");
    }

    #[tokio::test]
    async fn no_keywords_makes_no_requests() {
        let server = MockServer::start().await;
        let candidates = test_client(&server.uri())
            .trending_candidates(&[], 25, since())
            .await
            .unwrap();
        assert!(candidates.is_empty());
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn quota_exceeded_maps_to_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": {
                    "code": 403,
                    "message": "The request cannot be completed because you have exceeded your quota.",
                    "errors": [{"reason": "quotaExceeded", "domain": "youtube.quota"}]
                }
            })))
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .search("linen", 5, since())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Api { status: 429, .. }));
        assert!(is_rate_limited(&err));
    }

    #[tokio::test]
    async fn other_errors_keep_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad things"))
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .search("linen", 5, since())
            .await
            .unwrap_err();
        match err {
            Error::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "bad things");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }
}
