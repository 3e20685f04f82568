use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use crate::sources::{AudioFetcher, AudioOptions};
use crate::utils::{sanitize_filename, video_id_from_url, with_timeout};
use crate::CorpusError;

pub mod whisper;

pub use whisper::WhisperCli;

/// What the speech model should produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechTask {
    /// Text in the spoken language
    Transcribe,
    /// English text regardless of the spoken language
    Translate,
}

/// Floating point precision used for inference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    Fp16,
    Fp32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeechOptions {
    pub task: SpeechTask,
    pub precision: Precision,
}

impl SpeechOptions {
    /// Translate-to-English in full precision, safe on CPU-only hosts
    pub fn translate_to_english() -> Self {
        Self {
            task: SpeechTask::Translate,
            precision: Precision::Fp32,
        }
    }
}

/// Speech-to-text model, loaded once and shared read-only
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechModel: Send + Sync {
    async fn transcribe(&self, audio_path: &Path, options: &SpeechOptions) -> Result<String>;
}

/// Downloaded audio for one item; the directory is removed on drop
#[derive(Debug)]
pub struct AudioArtifact {
    path: PathBuf,
    _scratch: TempDir,
}

impl AudioArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Fallback used when a video has no usable captions
pub struct AudioTranscriber {
    fetcher: Arc<dyn AudioFetcher>,
    model: Arc<dyn SpeechModel>,
    options: AudioOptions,
    work_dir: PathBuf,
    keep_audio_dir: Option<PathBuf>,
    timeout: Duration,
}

impl AudioTranscriber {
    pub fn new(
        fetcher: Arc<dyn AudioFetcher>,
        model: Arc<dyn SpeechModel>,
        options: AudioOptions,
        work_dir: PathBuf,
        timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            model,
            options,
            work_dir,
            keep_audio_dir: None,
            timeout,
        }
    }

    /// Copy every downloaded artifact into `dir` before it is cleaned up
    pub fn keep_audio_in(mut self, dir: PathBuf) -> Self {
        self.keep_audio_dir = Some(dir);
        self
    }

    /// Download the audio of `video_url` into a scoped directory.
    ///
    /// Fails with [`CorpusError::AudioMissing`] when the downloader reports success but the
    /// expected file is not there.
    pub async fn acquire_audio(&self, video_url: &str) -> Result<AudioArtifact> {
        let stem = video_id_from_url(video_url)
            .ok_or_else(|| anyhow::anyhow!("Cannot derive a video id from {}", video_url))?;

        fs_err::create_dir_all(&self.work_dir)?;
        let scratch = tempfile::Builder::new()
            .prefix(&format!("{}-", stem))
            .tempdir_in(&self.work_dir)
            .context("Failed to create audio work directory")?;

        let audio_path = scratch
            .path()
            .join(format!("{}.{}", stem, self.options.format));

        tracing::info!("Downloading audio to: {}", audio_path.display());

        with_timeout(
            "audio download",
            self.timeout,
            self.fetcher
                .fetch_audio(video_url, scratch.path(), &stem, &self.options),
        )
        .await?;

        if !audio_path.exists() {
            return Err(CorpusError::AudioMissing(audio_path.display().to_string()).into());
        }

        if let Some(dir) = &self.keep_audio_dir {
            if let Err(e) = self.preserve_audio_file(&audio_path, dir, &stem) {
                tracing::warn!("Could not keep audio for {}: {:#}", stem, e);
            }
        }

        Ok(AudioArtifact {
            path: audio_path,
            _scratch: scratch,
        })
    }

    /// Run the shared speech model over an acquired artifact, translating to English
    pub async fn transcribe_artifact(&self, artifact: &AudioArtifact) -> Result<String> {
        tracing::info!("Transcribing {}", artifact.path().display());

        with_timeout(
            "transcription",
            self.timeout,
            self.model
                .transcribe(artifact.path(), &SpeechOptions::translate_to_english()),
        )
        .await
    }

    /// Acquire and transcribe in one step
    pub async fn transcribe(&self, video_url: &str) -> Result<String> {
        let artifact = self.acquire_audio(video_url).await?;
        self.transcribe_artifact(&artifact).await
    }

    fn preserve_audio_file(&self, audio_path: &Path, dir: &Path, stem: &str) -> Result<PathBuf> {
        fs_err::create_dir_all(dir)?;
        let output_path = dir.join(format!(
            "{}.{}",
            sanitize_filename(stem),
            self.options.format
        ));
        fs_err::copy(audio_path, &output_path)?;
        tracing::debug!("Audio kept at {}", output_path.display());
        Ok(output_path)
    }
}
