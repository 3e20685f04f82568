use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use url::Url;

use crate::CorpusError;

const WATCH_URL_BASE: &str = "https://www.youtube.com/watch?v=";

/// Canonical watch URL for a video id
pub fn watch_url(video_id: &str) -> String {
    format!("{}{}", WATCH_URL_BASE, video_id)
}

/// Derive a stable local identifier for a video URL.
///
/// Understands `watch?v=`, `youtu.be/<id>`, `/shorts/<id>` and `/embed/<id>`;
/// anything else falls back to the sanitized last path segment.
pub fn video_id_from_url(input: &str) -> Option<String> {
    let parsed = match Url::parse(input.trim()) {
        Ok(parsed) => parsed,
        Err(_) => {
            let bare = sanitize_filename(input);
            return (!bare.is_empty()).then_some(bare);
        }
    };

    if let Some((_, id)) = parsed.query_pairs().find(|(key, _)| key == "v") {
        let id = id.trim();
        if !id.is_empty() {
            return Some(sanitize_filename(id));
        }
    }

    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let id = match segments.as_slice() {
        ["shorts", id, ..] | ["embed", id, ..] | ["v", id, ..] => Some(*id),
        [.., last] => Some(*last),
        [] => None,
    }?;

    let id = sanitize_filename(id);
    (!id.is_empty()).then_some(id)
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Sanitize filename for safe filesystem usage
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            match c {
                c if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' => c,
                _ => '_',
            }
        })
        .collect::<String>()
        .trim_matches(|c| c == '_' || c == '.')
        .to_string()
}

/// Lowercase a language code and keep only its primary subtag (`en-US` -> `en`)
pub fn primary_language_subtag(lang: &str) -> String {
    lang.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Run a stage future with an upper time bound, mapping expiry to [`CorpusError::Timeout`]
pub async fn with_timeout<T, F>(stage: &str, limit: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(CorpusError::Timeout {
            stage: stage.to_string(),
            limit,
        }
        .into()),
    }
}

/// Check if the current environment has required tools
pub async fn check_dependencies(yt_dlp: &str, whisper: &str) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(yt_dlp, "--version").await {
        missing.push(format!("{} - required for captions and audio download", yt_dlp));
    }

    // yt-dlp needs it to transcode to WAV
    if !check_command_available("ffmpeg", "-version").await {
        missing.push("ffmpeg - required for audio extraction".to_string());
    }

    if !check_command_available(whisper, "--help").await {
        missing.push(format!("{} - required for audio transcription", whisper));
    }

    missing
}

/// Check if a command is available in PATH
pub async fn check_command_available(command: &str, check_arg: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg(check_arg)
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30.0), "30s");
        assert_eq!(format_duration(90.0), "1m 30s");
        assert_eq!(format_duration(3661.0), "1h 1m 1s");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Hello World!"), "Hello_World");
        assert_eq!(sanitize_filename("test/file?name"), "test_file_name");
        assert_eq!(sanitize_filename("dQw4w9WgXcQ"), "dQw4w9WgXcQ");
    }

    #[test]
    fn test_video_id_from_url() {
        assert_eq!(
            video_id_from_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            video_id_from_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=120").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            video_id_from_url("https://youtu.be/dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            video_id_from_url("https://www.youtube.com/shorts/dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(video_id_from_url("dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(video_id_from_url("https://www.youtube.com/"), None);
    }

    #[test]
    fn test_watch_url() {
        assert_eq!(watch_url("abc"), "https://www.youtube.com/watch?v=abc");
    }

    #[test]
    fn test_primary_language_subtag() {
        assert_eq!(primary_language_subtag("en-US"), "en");
        assert_eq!(primary_language_subtag("SI"), "si");
        assert_eq!(primary_language_subtag("pt_BR"), "pt");
    }

    #[tokio::test]
    async fn test_with_timeout_maps_expiry() {
        let result: Result<()> = with_timeout("captions", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CorpusError>(),
            Some(CorpusError::Timeout { .. })
        ));
        assert_eq!(err.to_string(), "captions timed out after 10ms");
    }
}
