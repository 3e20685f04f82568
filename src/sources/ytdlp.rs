use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::{AudioFetcher, AudioOptions, CaptionProvider, TrackHandle, TrackList};
use crate::models::{CaptionSegment, TrackKind, VideoCandidate};
use crate::{CorpusError, Result};

/// Caption format requested from the timedtext endpoint
const CAPTION_FORMAT: &str = "json3";

/// Caption, metadata and audio access through yt-dlp
pub struct YtDlp {
    yt_dlp_path: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct Json3Captions {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
struct Json3Event {
    segs: Option<Vec<Json3Seg>>,
}

#[derive(Debug, Deserialize)]
struct Json3Seg {
    #[serde(default)]
    utf8: String,
}

impl YtDlp {
    pub fn new(yt_dlp_path: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            yt_dlp_path: yt_dlp_path.into(),
            http,
        })
    }

    /// Get video information using yt-dlp
    async fn get_video_info(&self, url: &str) -> Result<Value> {
        tracing::debug!("Extracting video info for: {}", url);

        let output = Command::new(&self.yt_dlp_path)
            .args(["--dump-json", "--skip-download", "--no-playlist", "--no-warnings", url])
            .kill_on_drop(true)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.yt_dlp_path))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp failed: {}", error.trim());
        }

        let json_str = String::from_utf8(output.stdout)?;
        let info: Value = serde_json::from_str(&json_str)?;

        Ok(info)
    }

    /// Build a candidate for a video that did not come from search
    pub async fn video_metadata(&self, video_id: &str) -> Result<VideoCandidate> {
        let info = self.get_video_info(&crate::utils::watch_url(video_id)).await?;
        candidate_from_info(video_id, &info)
    }
}

/// Command line for extracting one video's audio into `<output_dir>/<stem>.<format>`
pub fn audio_args(url: &str, output_dir: &Path, stem: &str, options: &AudioOptions) -> Vec<String> {
    let template = output_dir.join(format!("{}.%(ext)s", stem));

    let mut args = vec![
        "--format".to_string(),
        "bestaudio/best".to_string(),
        "--extract-audio".to_string(),
        "--audio-format".to_string(),
        options.format.clone(),
        "--audio-quality".to_string(),
        options.quality.clone(),
        "--output".to_string(),
        template.to_string_lossy().into_owned(),
        // Fragments one at a time; parallel fetches get throttled or blocked
        "--concurrent-fragments".to_string(),
        options.concurrent_fragments.to_string(),
        "--no-playlist".to_string(),
        "--quiet".to_string(),
        "--no-warnings".to_string(),
    ];

    if let Some(client) = &options.player_client {
        args.push("--extractor-args".to_string());
        args.push(format!("youtube:player_client={}", client));
    }

    if let Some(runtime) = &options.js_runtime {
        args.push("--js-runtimes".to_string());
        args.push(runtime.clone());
    }

    args.push(url.to_string());
    args
}

/// Read manual (`subtitles`) and generated (`automatic_captions`) tracks from `--dump-json` output.
///
/// Machine-translated auto captions are dropped; `xx-orig` keys map to `xx`.
pub fn parse_track_list(info: &Value) -> TrackList {
    let mut tracks: Vec<TrackHandle> = Vec::new();

    for (field, kind) in [
        ("subtitles", TrackKind::Manual),
        ("automatic_captions", TrackKind::Generated),
    ] {
        let Some(languages) = info.get(field).and_then(Value::as_object) else {
            continue;
        };

        for (key, formats) in languages {
            if key == "live_chat" {
                continue;
            }

            let language = key.strip_suffix("-orig").unwrap_or(key).to_string();

            let Some(url) = formats
                .as_array()
                .into_iter()
                .flatten()
                .filter(|format| format["ext"].as_str() == Some(CAPTION_FORMAT))
                .filter_map(|format| format["url"].as_str())
                .find(|url| kind == TrackKind::Manual || !url.contains("tlang="))
            else {
                continue;
            };

            let duplicate = tracks
                .iter()
                .any(|track| track.kind == kind && track.language == language);
            if !duplicate {
                tracks.push(TrackHandle {
                    language,
                    kind,
                    url: url.to_string(),
                });
            }
        }
    }

    TrackList::new(tracks)
}

/// Turn a json3 caption document into ordered segments, one per cue
pub fn parse_json3(body: &str) -> Result<Vec<CaptionSegment>> {
    let captions: Json3Captions =
        serde_json::from_str(body).context("Failed to parse json3 captions")?;

    Ok(captions
        .events
        .into_iter()
        .filter_map(|event| {
            let text = event
                .segs?
                .iter()
                .map(|seg| seg.utf8.as_str())
                .collect::<String>()
                .replace('\n', " ");
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            (!text.is_empty()).then(|| CaptionSegment::new(text))
        })
        .collect())
}

fn candidate_from_info(video_id: &str, info: &Value) -> Result<VideoCandidate> {
    let published_at = info["timestamp"]
        .as_i64()
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
        .or_else(|| {
            info["upload_date"]
                .as_str()
                .and_then(|date| NaiveDate::parse_from_str(date, "%Y%m%d").ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| Utc.from_utc_datetime(&naive))
        })
        .with_context(|| format!("No publication date reported for {}", video_id))?;

    Ok(VideoCandidate {
        id: video_id.to_string(),
        title: info["title"].as_str().unwrap_or_default().to_string(),
        description: info["description"].as_str().unwrap_or_default().to_string(),
        published_at,
    })
}

#[async_trait]
impl CaptionProvider for YtDlp {
    async fn list_tracks(&self, video_id: &str) -> Result<TrackList> {
        let info = self.get_video_info(&crate::utils::watch_url(video_id)).await?;
        let tracks = parse_track_list(&info);
        tracing::debug!("{} caption track(s) listed for {}", tracks.tracks().len(), video_id);
        Ok(tracks)
    }

    async fn fetch(&self, track: &TrackHandle) -> Result<Vec<CaptionSegment>> {
        let response = self
            .http
            .get(&track.url)
            .send()
            .await
            .context("Failed to download captions")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to download captions: HTTP {}", response.status());
        }

        let body = response.text().await.context("Failed to read captions")?;
        parse_json3(&body)
    }
}

#[async_trait]
impl AudioFetcher for YtDlp {
    async fn fetch_audio(
        &self,
        url: &str,
        output_dir: &Path,
        stem: &str,
        options: &AudioOptions,
    ) -> Result<()> {
        tracing::debug!("Downloading audio for: {}", url);

        let output = Command::new(&self.yt_dlp_path)
            .args(audio_args(url, output_dir, stem, options))
            .kill_on_drop(true)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| CorpusError::AudioDownloadFailed(e.to_string()))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(CorpusError::AudioDownloadFailed(error.trim().to_string()).into());
        }

        Ok(())
    }
}
