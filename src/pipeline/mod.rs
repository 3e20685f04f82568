use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

pub mod batch;

pub use batch::{BatchDriver, RunSummary};

use crate::captions::CaptionResolver;
use crate::config::Config;
use crate::models::{ResultRecord, VideoCandidate};
use crate::normalize::{GoogleTranslator, TextNormalizer, WhatlangDetector};
use crate::sources::ytdlp::YtDlp;
use crate::sources::AudioOptions;
use crate::transcribe::{AudioTranscriber, SpeechModel};
use crate::CorpusError;

/// Which strategy produced an item's text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionPath {
    Captions,
    AudioTranscription,
}

/// Stage at which an item failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AudioAcquisition,
    Transcription,
    Detection,
    Translation,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::AudioAcquisition => write!(f, "audio acquisition"),
            Stage::Transcription => write!(f, "transcription"),
            Stage::Detection => write!(f, "language detection"),
            Stage::Translation => write!(f, "translation"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemState {
    Pending,
    CaptionsChecked,
    CaptionsFound,
    CaptionsAbsent,
    TranscribedViaAudio,
    Normalized,
    Recorded,
    Failed(Stage),
}

fn transition(video_id: &str, state: ItemState) {
    tracing::debug!(video_id, state = ?state, "item state");
}

/// Result of processing one candidate
#[derive(Debug)]
pub enum ItemOutcome {
    Recorded {
        record: ResultRecord,
        path: AcquisitionPath,
    },
    Failed {
        /// Record with `content_en: null` and an error note
        record: ResultRecord,
        stage: Stage,
        error: anyhow::Error,
    },
}

impl ItemOutcome {
    pub fn record(&self) -> &ResultRecord {
        match self {
            ItemOutcome::Recorded { record, .. } | ItemOutcome::Failed { record, .. } => record,
        }
    }

    pub fn into_record(self) -> ResultRecord {
        match self {
            ItemOutcome::Recorded { record, .. } | ItemOutcome::Failed { record, .. } => record,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ItemOutcome::Failed { .. })
    }
}

/// Captions, then audio transcription, then normalization, for one candidate at a time
pub struct Orchestrator {
    captions: CaptionResolver,
    audio: AudioTranscriber,
    normalizer: TextNormalizer,
}

impl Orchestrator {
    pub fn new(captions: CaptionResolver, audio: AudioTranscriber, normalizer: TextNormalizer) -> Self {
        Self {
            captions,
            audio,
            normalizer,
        }
    }

    /// Wire the production collaborators. `model` must already be loaded.
    pub fn from_config(config: &Config, work_dir: PathBuf, model: Arc<dyn SpeechModel>) -> Result<Self> {
        let yt_dlp = Arc::new(YtDlp::new(&config.audio.yt_dlp_path, config.request_timeout())?);

        let captions = CaptionResolver::new(
            yt_dlp.clone(),
            config.caption_policy(),
            config.request_timeout(),
        );

        let mut audio = AudioTranscriber::new(
            yt_dlp,
            model,
            AudioOptions::from(&config.audio),
            work_dir,
            config.stage_timeout(),
        );
        if config.audio.keep_audio {
            audio = audio.keep_audio_in(config.audio.audio_dir.clone());
        }

        let detector = if config.normalize.require_reliable_detection {
            WhatlangDetector::new().reliable_only()
        } else {
            WhatlangDetector::new()
        };

        let normalizer = TextNormalizer::new(
            Arc::new(detector),
            Arc::new(GoogleTranslator::new(
                &config.normalize.translate_endpoint,
                config.request_timeout(),
            )?),
            &config.normalize,
            config.request_timeout(),
        );

        Ok(Self::new(captions, audio, normalizer))
    }

    /// Produce the corpus record for one candidate; never panics or aborts on stage failure
    pub async fn process_one(&self, candidate: &VideoCandidate) -> ItemOutcome {
        let video_id = candidate.id.as_str();
        transition(video_id, ItemState::Pending);

        let url = candidate.url();
        let captions = self.captions.resolve(video_id).await;
        transition(video_id, ItemState::CaptionsChecked);

        let (text, path) = match captions {
            Some(resolved) => {
                transition(video_id, ItemState::CaptionsFound);
                tracing::info!(
                    "Using {} {} captions for {}",
                    resolved.kind,
                    resolved.language,
                    url
                );
                (resolved.text, AcquisitionPath::Captions)
            }
            None => {
                transition(video_id, ItemState::CaptionsAbsent);

                let artifact = match self.audio.acquire_audio(&url).await {
                    Ok(artifact) => artifact,
                    Err(e) => return self.fail(candidate, Stage::AudioAcquisition, e),
                };

                let text = match self.audio.transcribe_artifact(&artifact).await {
                    Ok(text) => text,
                    Err(e) => return self.fail(candidate, Stage::Transcription, e),
                };
                drop(artifact);

                transition(video_id, ItemState::TranscribedViaAudio);
                tracing::info!("No captions for {}, transcribed audio instead", url);
                (text, AcquisitionPath::AudioTranscription)
            }
        };

        let normalized = match self.normalizer.normalize(&text).await {
            Ok(normalized) => normalized,
            Err(e) => {
                let stage = match e.downcast_ref::<CorpusError>() {
                    Some(CorpusError::LanguageUndetected(_)) => Stage::Detection,
                    _ => Stage::Translation,
                };
                return self.fail(candidate, stage, e);
            }
        };
        transition(video_id, ItemState::Normalized);

        let record = ResultRecord::completed(candidate, normalized.text);
        transition(video_id, ItemState::Recorded);

        ItemOutcome::Recorded { record, path }
    }

    fn fail(&self, candidate: &VideoCandidate, stage: Stage, error: anyhow::Error) -> ItemOutcome {
        tracing::warn!("{} failed at {}: {:#}", candidate.url(), stage, error);
        transition(&candidate.id, ItemState::Failed(stage));

        let record = ResultRecord::failed(candidate, format!("{} failed: {:#}", stage, error));
        ItemOutcome::Failed {
            record,
            stage,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CaptionSegment, TrackKind};
    use crate::normalize::{MockLanguageDetector, MockTranslator};
    use crate::sources::{MockAudioFetcher, MockCaptionProvider, TrackHandle, TrackList};
    use crate::transcribe::MockSpeechModel;
    use chrono::Utc;
    use std::time::Duration;

    fn candidate(id: &str) -> VideoCandidate {
        VideoCandidate {
            id: id.to_string(),
            title: format!("title {}", id),
            description: String::new(),
            published_at: Utc::now(),
        }
    }

    fn orchestrator(
        captions: MockCaptionProvider,
        fetcher: MockAudioFetcher,
        model: MockSpeechModel,
        detector: MockLanguageDetector,
        translator: MockTranslator,
        work_dir: PathBuf,
    ) -> Orchestrator {
        let config = Config::default();
        Orchestrator::new(
            CaptionResolver::new(Arc::new(captions), config.caption_policy(), Duration::from_secs(5)),
            AudioTranscriber::new(
                Arc::new(fetcher),
                Arc::new(model),
                AudioOptions::from(&config.audio),
                work_dir,
                Duration::from_secs(5),
            ),
            TextNormalizer::new(
                Arc::new(detector),
                Arc::new(translator),
                &config.normalize,
                Duration::from_secs(5),
            ),
        )
    }

    #[tokio::test]
    async fn test_captions_skip_audio_and_get_translated() {
        let work = tempfile::tempdir().unwrap();

        let mut captions = MockCaptionProvider::new();
        captions.expect_list_tracks().returning(|_| {
            Ok(TrackList::new(vec![TrackHandle {
                language: "si".to_string(),
                kind: TrackKind::Manual,
                url: "si".to_string(),
            }]))
        });
        captions
            .expect_fetch()
            .returning(|_| Ok(vec![CaptionSegment::new("අයවැය"), CaptionSegment::new("සම්මතයි")]));

        let mut fetcher = MockAudioFetcher::new();
        fetcher.expect_fetch_audio().times(0);

        let mut detector = MockLanguageDetector::new();
        detector.expect_detect().returning(|_| Ok("si".to_string()));
        let mut translator = MockTranslator::new();
        translator
            .expect_translate()
            .withf(|text, _, _| text == "අයවැය සම්මතයි")
            .returning(|_, _, _| Ok("Budget approved".to_string()));

        let outcome = orchestrator(
            captions,
            fetcher,
            MockSpeechModel::new(),
            detector,
            translator,
            work.path().to_path_buf(),
        )
        .process_one(&candidate("v1"))
        .await;

        match outcome {
            ItemOutcome::Recorded { record, path } => {
                assert_eq!(path, AcquisitionPath::Captions);
                assert_eq!(record.content_en.as_deref(), Some("Budget approved"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transcription_failure_is_item_failure() {
        let work = tempfile::tempdir().unwrap();

        let mut captions = MockCaptionProvider::new();
        captions
            .expect_list_tracks()
            .returning(|_| Err(anyhow::anyhow!("Transcripts disabled")));

        let mut fetcher = MockAudioFetcher::new();
        fetcher.expect_fetch_audio().returning(|_, dir, stem, options| {
            std::fs::write(dir.join(format!("{}.{}", stem, options.format)), b"RIFF")?;
            Ok(())
        });

        let mut model = MockSpeechModel::new();
        model
            .expect_transcribe()
            .returning(|_, _| Err(CorpusError::TranscriptionFailed("out of memory".to_string()).into()));

        let mut detector = MockLanguageDetector::new();
        detector.expect_detect().times(0);

        let outcome = orchestrator(
            captions,
            fetcher,
            model,
            detector,
            MockTranslator::new(),
            work.path().to_path_buf(),
        )
        .process_one(&candidate("v2"))
        .await;

        match &outcome {
            ItemOutcome::Failed { record, stage, .. } => {
                assert_eq!(*stage, Stage::Transcription);
                assert!(record.content_en.is_none());
                assert!(record.error.as_deref().unwrap().contains("out of memory"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(outcome.is_failed());
    }

    #[tokio::test]
    async fn test_detection_failure_is_classified() {
        let work = tempfile::tempdir().unwrap();

        let mut captions = MockCaptionProvider::new();
        captions.expect_list_tracks().returning(|_| {
            Ok(TrackList::new(vec![TrackHandle {
                language: "en".to_string(),
                kind: TrackKind::Generated,
                url: "en".to_string(),
            }]))
        });
        captions
            .expect_fetch()
            .returning(|_| Ok(vec![CaptionSegment::new("ok")]));

        let mut detector = MockLanguageDetector::new();
        detector
            .expect_detect()
            .returning(|_| Err(anyhow::anyhow!("too short")));

        let outcome = orchestrator(
            captions,
            MockAudioFetcher::new(),
            MockSpeechModel::new(),
            detector,
            MockTranslator::new(),
            work.path().to_path_buf(),
        )
        .process_one(&candidate("v3"))
        .await;

        match outcome {
            ItemOutcome::Failed { stage, .. } => assert_eq!(stage, Stage::Detection),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
