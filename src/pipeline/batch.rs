use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use super::{AcquisitionPath, ItemOutcome, Orchestrator};
use crate::cli::FailurePolicy;
use crate::models::{ResultRecord, VideoCandidate};
use crate::output::CorpusWriter;
use crate::sources::{SearchQuery, VideoSearch};
use crate::utils::with_timeout;

/// Counters for one batch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub candidates: usize,
    pub via_captions: usize,
    pub via_audio: usize,
    pub failed: usize,
    /// Records written to the output file
    pub written: usize,
    /// True when the abort policy stopped the loop early
    pub aborted: bool,
    pub output: PathBuf,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn display(&self) {
        println!("Data extraction complete");
        println!("  Candidates: {}", self.candidates);
        println!("  From captions: {}", self.via_captions);
        println!("  From audio: {}", self.via_audio);
        println!("  Failed: {}", self.failed);
        if self.aborted {
            println!("  Run aborted after first failure");
        }
        println!("  Written: {} -> {}", self.written, self.output.display());
        println!(
            "  Elapsed: {}",
            crate::utils::format_duration(self.elapsed.as_secs_f64())
        );
    }
}

/// Drives the orchestrator over every candidate in order and persists the results
pub struct BatchDriver {
    orchestrator: Orchestrator,
    writer: CorpusWriter,
    policy: FailurePolicy,
    show_progress: bool,
}

impl BatchDriver {
    pub fn new(orchestrator: Orchestrator, writer: CorpusWriter, policy: FailurePolicy) -> Self {
        Self {
            orchestrator,
            writer,
            policy,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Search for candidates, then process them.
    ///
    /// A search failure is returned before anything is written.
    pub async fn run(
        &self,
        search: &dyn VideoSearch,
        query: &SearchQuery,
        timeout: Duration,
    ) -> Result<RunSummary> {
        let candidates = with_timeout("search", timeout, search.search(query)).await?;
        self.run_candidates(&candidates).await
    }

    /// Process the given candidates sequentially, always ending with a written output file
    pub async fn run_candidates(&self, candidates: &[VideoCandidate]) -> Result<RunSummary> {
        let start = Instant::now();
        let mut summary = RunSummary {
            candidates: candidates.len(),
            output: self.writer.path().to_path_buf(),
            ..RunSummary::default()
        };
        let mut records: Vec<ResultRecord> = Vec::with_capacity(candidates.len());

        let progress = self.progress_bar(candidates.len() as u64);

        for candidate in candidates {
            progress.set_message(candidate.id.clone());

            let outcome = self.orchestrator.process_one(candidate).await;
            let stop = match outcome {
                ItemOutcome::Recorded { record, path } => {
                    match path {
                        AcquisitionPath::Captions => summary.via_captions += 1,
                        AcquisitionPath::AudioTranscription => summary.via_audio += 1,
                    }
                    records.push(record);
                    false
                }
                ItemOutcome::Failed { record, .. } => {
                    summary.failed += 1;
                    match self.policy {
                        FailurePolicy::Record => {
                            records.push(record);
                            false
                        }
                        FailurePolicy::Skip => false,
                        FailurePolicy::Abort => true,
                    }
                }
            };

            if let Err(e) = self.writer.checkpoint(&records) {
                tracing::warn!("Checkpoint failed: {:#}", e);
            }

            progress.inc(1);

            if stop {
                tracing::warn!("Stopping run after failure of {}", candidate.id);
                summary.aborted = true;
                break;
            }
        }

        progress.finish_and_clear();

        self.writer.finish(&records)?;
        summary.written = records.len();
        summary.elapsed = start.elapsed();

        Ok(summary)
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let progress = ProgressBar::new(len);
        progress.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        progress
    }
}
