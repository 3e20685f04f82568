use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::captions::CaptionPreference;
use crate::cli::FailurePolicy;
use crate::models::TrackKind;

const DEFAULT_QUERY: &str = "Sri Lanka politics OR economy OR parliament OR election OR budget \
     OR IMF OR inflation OR government";

/// YouTube Data API hard cap for `maxResults`
pub const MAX_SEARCH_RESULTS: u32 = 50;

/// Longest search window accepted, ten years
pub const MAX_WINDOW_HOURS: i64 = 24 * 365 * 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Video discovery settings
    pub search: SearchConfig,

    /// Caption preference settings
    pub captions: CaptionsConfig,

    /// Audio acquisition settings
    pub audio: AudioConfig,

    /// Speech model settings
    pub whisper: WhisperConfig,

    /// Language normalization settings
    pub normalize: NormalizeConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// YouTube Data API key (prefer the YOUTUBE_API_KEY environment variable)
    pub api_key: Option<String>,

    /// Free-text search query
    pub query: String,

    /// ISO 3166-1 region code
    pub region_code: String,

    /// Language the results should be relevant to
    pub relevance_language: String,

    /// Only videos published within this many hours
    pub published_within_hours: i64,

    /// Number of candidates to request
    pub max_results: u32,

    /// short | medium | long | any
    pub video_duration: String,

    /// Optional event type filter (completed, live, upcoming)
    pub event_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionsConfig {
    /// Native language of the corpus region
    pub primary_language: String,

    /// Fallback caption language
    pub secondary_language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Path to the yt-dlp binary
    pub yt_dlp_path: String,

    /// Canonical audio container produced for transcription
    pub format: String,

    /// Audio quality passed to the extractor
    pub quality: String,

    /// Parallel fragment downloads; 1 keeps throttling down
    pub concurrent_fragments: u32,

    /// YouTube player client to request
    pub player_client: Option<String>,

    /// JavaScript runtime yt-dlp should use for signature solving
    pub js_runtime: Option<String>,

    /// Copy downloaded audio into `audio_dir` before cleanup
    pub keep_audio: bool,

    /// Destination for kept audio files
    pub audio_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperConfig {
    /// Path to the whisper CLI
    pub binary: String,

    /// Model name (tiny, base, small, ...)
    pub model: String,

    /// Optional directory holding downloaded model weights
    pub model_dir: Option<PathBuf>,

    /// Inference device, e.g. "cpu"
    pub device: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Language that gets machine translated
    pub source_language: String,

    /// Target language of the corpus
    pub target_language: String,

    /// Translation endpoint
    pub translate_endpoint: String,

    /// Maximum characters per translation request
    pub max_chunk_chars: usize,

    /// Treat low-confidence language detection as a failure
    #[serde(default)]
    pub require_reliable_detection: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Output JSON file
    pub output: PathBuf,

    /// Temporary directory for downloads
    pub temp_dir: Option<PathBuf>,

    /// Rewrite the output after every item
    pub checkpoint: bool,

    /// What to do with an item that could not be processed
    pub on_failure: FailurePolicy,

    /// Timeout for audio download and transcription, in seconds
    pub stage_timeout_secs: u64,

    /// Timeout for caption, search and translation requests, in seconds
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search: SearchConfig {
                api_key: None,
                query: DEFAULT_QUERY.to_string(),
                region_code: "LK".to_string(),
                relevance_language: "si".to_string(),
                published_within_hours: 24,
                max_results: 1,
                video_duration: "short".to_string(),
                event_type: Some("completed".to_string()),
            },
            captions: CaptionsConfig {
                primary_language: "si".to_string(),
                secondary_language: "en".to_string(),
            },
            audio: AudioConfig {
                yt_dlp_path: "yt-dlp".to_string(),
                format: "wav".to_string(),
                quality: "192K".to_string(),
                concurrent_fragments: 1,
                player_client: Some("android".to_string()),
                js_runtime: Some("node".to_string()),
                keep_audio: false,
                audio_dir: PathBuf::from("audio"),
            },
            whisper: WhisperConfig {
                binary: "whisper".to_string(),
                model: "base".to_string(),
                model_dir: None,
                device: Some("cpu".to_string()),
            },
            normalize: NormalizeConfig {
                source_language: "si".to_string(),
                target_language: "en".to_string(),
                translate_endpoint: "https://translate.googleapis.com/translate_a/single"
                    .to_string(),
                max_chunk_chars: 5000,
                require_reliable_detection: false,
            },
            app: AppConfig {
                output: PathBuf::from("sri_lanka_political_economic_text.json"),
                temp_dir: None,
                checkpoint: true,
                on_failure: FailurePolicy::Record,
                stage_timeout_secs: 900,
                request_timeout_secs: 60,
            },
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load(explicit: Option<&Path>) -> Result<Self> {
        let config_path = match explicit {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config: Config = serde_yaml::from_str(&content)
                .context("Failed to parse config file")?;

            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save(&config_path).await?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub async fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs_err::create_dir_all(parent)?;
            }
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("video-corpus").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.search.max_results == 0 || self.search.max_results > MAX_SEARCH_RESULTS {
            anyhow::bail!(
                "search.max_results must be between 1 and {}",
                MAX_SEARCH_RESULTS
            );
        }

        if self.search.published_within_hours <= 0
            || self.search.published_within_hours > MAX_WINDOW_HOURS
        {
            anyhow::bail!(
                "search.published_within_hours must be between 1 and {}",
                MAX_WINDOW_HOURS
            );
        }

        if self.captions.primary_language.trim().is_empty()
            || self.captions.secondary_language.trim().is_empty()
        {
            anyhow::bail!("Caption languages must not be empty");
        }

        if self.normalize.source_language.trim().is_empty()
            || self.normalize.target_language.trim().is_empty()
        {
            anyhow::bail!("Normalization languages must not be empty");
        }

        if self.normalize.max_chunk_chars == 0 {
            anyhow::bail!("normalize.max_chunk_chars must be positive");
        }

        if self.audio.concurrent_fragments == 0 {
            anyhow::bail!("audio.concurrent_fragments must be at least 1");
        }

        if self.app.stage_timeout_secs == 0 || self.app.request_timeout_secs == 0 {
            anyhow::bail!("Timeouts must be positive");
        }

        Ok(())
    }

    /// Caption preference chain, highest priority first
    pub fn caption_policy(&self) -> Vec<CaptionPreference> {
        let primary = self.captions.primary_language.clone();
        let secondary = self.captions.secondary_language.clone();

        vec![
            CaptionPreference::new(TrackKind::Manual, [primary.clone()]),
            CaptionPreference::new(TrackKind::Manual, [secondary.clone()]),
            CaptionPreference::new(TrackKind::Generated, [primary, secondary]),
        ]
    }

    /// API key from config or the environment
    pub fn api_key(&self) -> Option<String> {
        self.search
            .api_key
            .clone()
            .or_else(|| std::env::var("YOUTUBE_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.app.stage_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.app.request_timeout_secs)
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Query: {}", self.search.query);
        println!("  Region: {}", self.search.region_code);
        println!("  Relevance Language: {}", self.search.relevance_language);
        println!("  Window: last {}h", self.search.published_within_hours);
        println!("  Max Results: {}", self.search.max_results);
        println!(
            "  API Key: {}",
            if self.api_key().is_some() { "set" } else { "missing" }
        );
        println!(
            "  Caption Languages: {} then {}",
            self.captions.primary_language, self.captions.secondary_language
        );
        println!("  Whisper Model: {}", self.whisper.model);
        println!(
            "  Translate: {} -> {}",
            self.normalize.source_language, self.normalize.target_language
        );
        println!("  Output: {}", self.app.output.display());
        println!("  Checkpoint: {}", self.app.checkpoint);
        println!("  On Failure: {}", self.app.on_failure);
        println!("  Keep Audio: {}", self.audio.keep_audio);
    }
}
