use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "vidcorpus",
    about = "Video Corpus - Build an English text corpus from recent YouTube videos",
    version,
    long_about = "Searches YouTube for recent videos on a topic, extracts their text from captions or Whisper transcription, translates it to English and writes a JSON corpus."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (defaults to ./config.yaml or the user config directory)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search for videos and build the corpus
    Run {
        /// Search query (overrides config)
        #[arg(long, value_name = "QUERY")]
        query: Option<String>,

        /// Output JSON file (overrides config)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Maximum number of videos to fetch (1-50)
        #[arg(short = 'n', long, value_name = "COUNT")]
        max_results: Option<u32>,

        /// Region code for the search, e.g. LK
        #[arg(long, value_name = "CODE")]
        region: Option<String>,

        /// Relevance language for the search, e.g. si
        #[arg(long, value_name = "LANG")]
        relevance_language: Option<String>,

        /// Only videos published within this many hours
        #[arg(long, value_name = "HOURS")]
        within_hours: Option<i64>,

        /// YouTube Data API key
        #[arg(long, env = "YOUTUBE_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// What to do with videos that cannot be processed
        #[arg(long, value_enum)]
        on_failure: Option<FailurePolicy>,
    },

    /// Process specific videos without searching
    Process {
        /// Video ids or watch URLs
        #[arg(value_name = "VIDEO_ID_OR_URL", required = true)]
        videos: Vec<String>,

        /// Output JSON file (overrides config)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// What to do with videos that cannot be processed
        #[arg(long, value_enum)]
        on_failure: Option<FailurePolicy>,
    },

    /// Show configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// Check that external tools are installed
    Check,
}

/// How the batch treats an item whose acquisition failed
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Keep the item with `content_en: null` and an error note
    Record,
    /// Leave the item out of the output
    Skip,
    /// Stop the run, still writing what completed
    Abort,
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailurePolicy::Record => write!(f, "record"),
            FailurePolicy::Skip => write!(f, "skip"),
            FailurePolicy::Abort => write!(f, "abort"),
        }
    }
}
