use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::time::Duration;

use super::{SearchQuery, VideoSearch};
use crate::models::VideoCandidate;
use crate::{CorpusError, Result};

const SEARCH_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/search";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: ItemId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: String,
    #[serde(default)]
    description: String,
    published_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: u16,
    message: String,
}

/// YouTube Data API v3 `search.list` client
pub struct YoutubeSearch {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl YoutubeSearch {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: SEARCH_ENDPOINT.to_string(),
        })
    }

    /// Point the client at a different endpoint (API mocks, proxies)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn query_params(&self, query: &SearchQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("key", self.api_key.clone()),
            ("q", query.query.clone()),
            ("part", "snippet".to_string()),
            ("type", "video".to_string()),
            ("regionCode", query.region_code.clone()),
            (
                "publishedAfter",
                query.published_after.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            ("maxResults", query.max_results.to_string()),
            ("relevanceLanguage", query.relevance_language.clone()),
            ("videoDuration", query.video_duration.clone()),
        ];

        if let Some(event_type) = &query.event_type {
            params.push(("eventType", event_type.clone()));
        }

        params
    }
}

#[async_trait]
impl VideoSearch for YoutubeSearch {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<VideoCandidate>> {
        tracing::info!(
            "Searching videos: region={}, after={}, max={}",
            query.region_code,
            query.published_after,
            query.max_results
        );

        let response = self
            .client
            .get(&self.endpoint)
            .query(&self.query_params(query))
            .send()
            .await
            .map_err(|e| CorpusError::SearchFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CorpusError::SearchFailed(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
                .map(|envelope| format!("{} {}", envelope.error.code, envelope.error.message))
                .unwrap_or_else(|_| format!("HTTP {}", status));
            return Err(CorpusError::SearchFailed(message).into());
        }

        let candidates = parse_search_response(&body)?;
        tracing::info!("Search returned {} candidate(s)", candidates.len());
        Ok(candidates)
    }
}

/// Convert a `search.list` response body into candidates, keeping API order
pub fn parse_search_response(body: &str) -> Result<Vec<VideoCandidate>> {
    let response: SearchResponse =
        serde_json::from_str(body).context("Failed to parse search response")?;

    Ok(response
        .items
        .into_iter()
        .filter_map(|item| {
            let id = item.id.video_id?;
            Some(VideoCandidate {
                id,
                title: item.snippet.title,
                description: item.snippet.description,
                published_at: item.snippet.published_at,
            })
        })
        .collect())
}
