//! Video Corpus - A Rust CLI tool for building text datasets from recent videos
//!
//! This library discovers recently published videos for a topical query, extracts their
//! text (captions first, Whisper transcription as fallback), normalizes it to English and
//! persists one JSON record per video.

pub mod captions;
pub mod cli;
pub mod config;
pub mod models;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod sources;
pub mod transcribe;
pub mod utils;

pub use cli::{Cli, Commands, FailurePolicy};
pub use config::Config;
pub use models::{CaptionSegment, CaptionTrack, ResultRecord, TrackKind, VideoCandidate};
pub use pipeline::{BatchDriver, ItemOutcome, Orchestrator, RunSummary};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to the corpus pipeline
#[derive(thiserror::Error, Debug)]
pub enum CorpusError {
    #[error("Video search failed: {0}")]
    SearchFailed(String),

    #[error("Audio download failed: {0}")]
    AudioDownloadFailed(String),

    #[error("Audio file not created: {0}")]
    AudioMissing(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Could not detect language: {0}")]
    LanguageUndetected(String),

    #[error("Translation failed: {0}")]
    TranslationFailed(String),

    #[error("{stage} timed out after {limit:?}")]
    Timeout {
        stage: String,
        limit: std::time::Duration,
    },
}
