use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source label written into every corpus record
pub const SOURCE_YOUTUBE: &str = "YouTube";

/// A video returned by the search stage, awaiting content extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoCandidate {
    /// Platform video identifier
    pub id: String,

    pub title: String,

    pub description: String,

    /// Publication timestamp reported by the platform
    pub published_at: DateTime<Utc>,
}

impl VideoCandidate {
    /// Canonical watch URL for this candidate
    pub fn url(&self) -> String {
        crate::utils::watch_url(&self.id)
    }
}

/// Whether a caption track was authored by a person or generated by speech recognition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Manual,
    Generated,
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Manual => write!(f, "manual"),
            TrackKind::Generated => write!(f, "generated"),
        }
    }
}

/// A single caption cue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionSegment {
    pub text: String,
}

impl CaptionSegment {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Fetched caption track, segments in temporal order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionTrack {
    pub language: String,
    pub kind: TrackKind,
    pub segments: Vec<CaptionSegment>,
}

impl CaptionTrack {
    /// Join all segment texts with a single space, preserving order
    pub fn joined_text(&self) -> String {
        self.segments
            .iter()
            .map(|segment| segment.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// True when no segment carries any visible text
    pub fn is_blank(&self) -> bool {
        self.segments.iter().all(|segment| segment.text.trim().is_empty())
    }
}

/// One corpus entry as persisted to the output JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub video_id: String,

    pub title: String,

    pub published: DateTime<Utc>,

    pub source: String,

    pub url: String,

    /// Normalized English text; `null` when the item failed
    pub content_en: Option<String>,

    /// Failure note, only present on failed items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResultRecord {
    /// Record for a successfully processed candidate
    pub fn completed(candidate: &VideoCandidate, content_en: String) -> Self {
        Self {
            video_id: candidate.id.clone(),
            title: candidate.title.clone(),
            published: candidate.published_at,
            source: SOURCE_YOUTUBE.to_string(),
            url: candidate.url(),
            content_en: Some(content_en),
            error: None,
        }
    }

    /// Record for a candidate whose acquisition failed
    pub fn failed(candidate: &VideoCandidate, error: String) -> Self {
        Self {
            video_id: candidate.id.clone(),
            title: candidate.title.clone(),
            published: candidate.published_at,
            source: SOURCE_YOUTUBE.to_string(),
            url: candidate.url(),
            content_en: None,
            error: Some(error),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candidate() -> VideoCandidate {
        VideoCandidate {
            id: "abc123".to_string(),
            title: "Budget debate".to_string(),
            description: String::new(),
            published_at: Utc.with_ymd_and_hms(2025, 3, 1, 8, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_joined_text_uses_single_spaces() {
        let track = CaptionTrack {
            language: "si".to_string(),
            kind: TrackKind::Manual,
            segments: vec![
                CaptionSegment::new("a"),
                CaptionSegment::new("b"),
                CaptionSegment::new("c"),
            ],
        };
        assert_eq!(track.joined_text(), "a b c");
        assert!(!track.is_blank());
    }

    #[test]
    fn test_completed_record_has_exact_keys() {
        let record = ResultRecord::completed(&candidate(), "hello".to_string());
        let value = serde_json::to_value(&record).unwrap();
        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            vec!["content_en", "published", "source", "title", "url", "video_id"]
        );
        assert_eq!(value["source"], "YouTube");
        assert_eq!(value["url"], "https://www.youtube.com/watch?v=abc123");
        assert_eq!(value["published"], "2025-03-01T08:30:00Z");
    }

    #[test]
    fn test_failed_record_marks_error() {
        let record = ResultRecord::failed(&candidate(), "Audio file not created".to_string());
        let value = serde_json::to_value(&record).unwrap();
        assert!(value["content_en"].is_null());
        assert_eq!(value["error"], "Audio file not created");
        assert!(record.is_failed());
    }
}
