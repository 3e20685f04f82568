use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tempfile::TempDir;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use video_corpus::cli::{Cli, Commands};
use video_corpus::config::Config;
use video_corpus::output::CorpusWriter;
use video_corpus::pipeline::{BatchDriver, Orchestrator};
use video_corpus::sources::youtube_api::YoutubeSearch;
use video_corpus::sources::ytdlp::YtDlp;
use video_corpus::sources::SearchQuery;
use video_corpus::transcribe::WhisperCli;
use video_corpus::utils;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; the key may come from the real environment
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "video_corpus=debug,vidcorpus=debug"
    } else {
        "video_corpus=info,vidcorpus=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::load(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Run {
            query,
            output,
            max_results,
            region,
            relevance_language,
            within_hours,
            api_key,
            on_failure,
        } => {
            if let Some(query) = query {
                config.search.query = query;
            }
            if let Some(max_results) = max_results {
                config.search.max_results = max_results;
            }
            if let Some(region) = region {
                config.search.region_code = region;
            }
            if let Some(language) = relevance_language {
                config.search.relevance_language = language;
            }
            if let Some(hours) = within_hours {
                config.search.published_within_hours = hours;
            }
            if let Some(output) = output {
                config.app.output = output;
            }
            if let Some(policy) = on_failure {
                config.app.on_failure = policy;
            }
            config.validate()?;

            let api_key = api_key
                .or_else(|| config.api_key())
                .context("YouTube API key missing: set YOUTUBE_API_KEY or search.api_key")?;

            warn_missing_dependencies(&config).await;

            let (driver, _work_dir) = build_driver(&config, cli.quiet).await?;
            let search = YoutubeSearch::new(api_key, config.request_timeout())?;
            let query = SearchQuery::from_config(&config.search)?;

            let summary = driver
                .run(&search, &query, config.request_timeout())
                .await?;
            summary.display();
        }
        Commands::Process {
            videos,
            output,
            on_failure,
        } => {
            if let Some(output) = output {
                config.app.output = output;
            }
            if let Some(policy) = on_failure {
                config.app.on_failure = policy;
            }
            config.validate()?;

            warn_missing_dependencies(&config).await;

            let yt_dlp = YtDlp::new(&config.audio.yt_dlp_path, config.request_timeout())?;
            let mut candidates = Vec::with_capacity(videos.len());
            for input in &videos {
                let id = utils::video_id_from_url(input)
                    .with_context(|| format!("Not a video id or URL: {}", input))?;

                match yt_dlp.video_metadata(&id).await {
                    Ok(candidate) => candidates.push(candidate),
                    Err(e) => tracing::error!("Skipping {}: metadata lookup failed: {:#}", id, e),
                }
            }

            if candidates.is_empty() {
                anyhow::bail!("No video metadata could be retrieved");
            }

            let (driver, _work_dir) = build_driver(&config, cli.quiet).await?;
            let summary = driver.run_candidates(&candidates).await?;
            summary.display();
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                let path = match &cli.config {
                    Some(path) => path.clone(),
                    None => Config::config_path()?,
                };
                println!("Configuration file: {}", path.display());
                println!("Use --show to print the current settings.");
            }
        }
        Commands::Check => {
            let missing =
                utils::check_dependencies(&config.audio.yt_dlp_path, &config.whisper.binary).await;
            if missing.is_empty() {
                println!("All external tools are available.");
            } else {
                println!("Missing tools:");
                for dep in missing {
                    println!("  • {}", dep);
                }
            }
        }
    }

    Ok(())
}

/// Load the speech model once and wire the orchestrator around a per-run work directory
async fn build_driver(config: &Config, quiet: bool) -> Result<(BatchDriver, TempDir)> {
    let model = Arc::new(WhisperCli::load(&config.whisper).await?);

    let work_dir = match &config.app.temp_dir {
        Some(dir) => {
            fs_err::create_dir_all(dir)?;
            TempDir::new_in(dir)
        }
        None => TempDir::new(),
    }
    .context("Failed to create temporary directory")?;

    let orchestrator = Orchestrator::from_config(config, work_dir.path().to_path_buf(), model)?;
    let writer = CorpusWriter::new(config.app.output.clone(), config.app.checkpoint);

    let driver = BatchDriver::new(orchestrator, writer, config.app.on_failure).with_progress(!quiet);
    Ok((driver, work_dir))
}

/// Check for required external dependencies (non-fatal)
async fn warn_missing_dependencies(config: &Config) {
    let missing = utils::check_dependencies(&config.audio.yt_dlp_path, &config.whisper.binary).await;
    if !missing.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }
}
