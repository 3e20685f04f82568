use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod youtube_api;
pub mod ytdlp;

use crate::models::{CaptionSegment, TrackKind, VideoCandidate};
use crate::Result;

/// Parameters for a candidate search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,

    pub region_code: String,

    pub relevance_language: String,

    /// Lower bound on publication time
    pub published_after: DateTime<Utc>,

    pub max_results: u32,

    pub video_duration: String,

    pub event_type: Option<String>,
}

impl SearchQuery {
    /// Build a query from config, with the recency window ending now
    pub fn from_config(search: &crate::config::SearchConfig) -> Result<Self> {
        let published_after = chrono::Duration::try_hours(search.published_within_hours)
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Search window of {}h is out of range",
                    search.published_within_hours
                )
            })?;

        Ok(Self {
            query: search.query.clone(),
            region_code: search.region_code.clone(),
            relevance_language: search.relevance_language.clone(),
            published_after,
            max_results: search.max_results,
            video_duration: search.video_duration.clone(),
            event_type: search.event_type.clone(),
        })
    }
}

/// A caption track that can be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackHandle {
    pub language: String,
    pub kind: TrackKind,
    /// Provider specific location of the track content
    pub url: String,
}

/// Caption tracks available for one video
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackList {
    tracks: Vec<TrackHandle>,
}

impl TrackList {
    pub fn new(tracks: Vec<TrackHandle>) -> Self {
        Self { tracks }
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[TrackHandle] {
        &self.tracks
    }

    /// First track of `kind` matching the language list, tried in list order
    pub fn find(&self, kind: TrackKind, languages: &[String]) -> Option<&TrackHandle> {
        languages.iter().find_map(|language| {
            self.tracks
                .iter()
                .find(|track| track.kind == kind && track.language == *language)
        })
    }

    pub fn find_manual(&self, languages: &[String]) -> Option<&TrackHandle> {
        self.find(TrackKind::Manual, languages)
    }

    pub fn find_generated(&self, languages: &[String]) -> Option<&TrackHandle> {
        self.find(TrackKind::Generated, languages)
    }
}

/// Audio extraction options handed to the downloader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioOptions {
    /// Target container, e.g. wav
    pub format: String,

    pub quality: String,

    pub concurrent_fragments: u32,

    pub player_client: Option<String>,

    pub js_runtime: Option<String>,
}

impl From<&crate::config::AudioConfig> for AudioOptions {
    fn from(audio: &crate::config::AudioConfig) -> Self {
        Self {
            format: audio.format.clone(),
            quality: audio.quality.clone(),
            concurrent_fragments: audio.concurrent_fragments,
            player_client: audio.player_client.clone(),
            js_runtime: audio.js_runtime.clone(),
        }
    }
}

/// Discovers candidate videos
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VideoSearch: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<VideoCandidate>>;
}

/// Lists and fetches caption tracks
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaptionProvider: Send + Sync {
    /// List available tracks; errors when captions are disabled or the video is unavailable
    async fn list_tracks(&self, video_id: &str) -> Result<TrackList>;

    /// Fetch the segments of one track in temporal order
    async fn fetch(&self, track: &TrackHandle) -> Result<Vec<CaptionSegment>>;
}

/// Downloads and transcodes the audio of a video.
///
/// Implementations write `<output_dir>/<stem>.<format>`; callers check for that file.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioFetcher: Send + Sync {
    async fn fetch_audio(
        &self,
        url: &str,
        output_dir: &Path,
        stem: &str,
        options: &AudioOptions,
    ) -> Result<()>;
}
