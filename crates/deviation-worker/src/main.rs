//! Repertoire deviation worker
//!
//! Compiles repertoire studies from disk, walks a batch of played games
//! against them and writes the findings as JSON.
//!
//! Usage: deviation-worker [--studies GLOB] [--games GLOB] [--username NAME] [--out PATH]
//!
//! Flags override STUDY_GLOB, GAMES_GLOB, PLAYER_USERNAME and OUTPUT_PATH.

use std::time::{Duration, Instant};

use deviation_worker::config::WorkerConfig;
use deviation_worker::input::{load_games, load_studies};
use deviation_worker::output::{write_output, BookSummary, RejectedChapter, RunOutput};
use deviation_worker::runner::run_batch;
use repertoire::compile_repertoire;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Load .env file for local dev
    let _ = dotenvy::dotenv();

    let config = WorkerConfig::load()?;
    let start = Instant::now();

    // Compile books (single-threaded, before the fan-out)
    let studies = load_studies(&config.study_glob)?;
    let compilation = compile_repertoire(&studies.chapters);
    let mut rejected = studies.rejected;
    rejected.extend(compilation.rejected);
    if compilation.books.is_empty() {
        warn!(pattern = %config.study_glob, "No repertoire books compiled");
    }
    for error in &rejected {
        warn!(chapter = %error.chapter(), error = %error, "Chapter rejected");
    }
    let books = compilation.books;
    let summaries: Vec<BookSummary> = books.iter().map(BookSummary::from).collect();

    // Load and pre-filter games
    let games = load_games(&config.games_glob)?;
    let loaded = games.len();
    let games: Vec<_> = games
        .into_iter()
        .filter(|game| match game {
            Ok(data) => config.filter.accepts(data, &config.username),
            Err(_) => true,
        })
        .collect();
    let filtered_out = loaded - games.len();
    info!(loaded, filtered_out, books = books.len(), "Inputs ready");

    let timeout = (config.analysis_timeout_secs > 0).then(|| Duration::from_secs(config.analysis_timeout_secs));
    let report = run_batch(
        games,
        books,
        &config.username,
        config.batch.clone(),
        config.worker_threads,
        timeout,
    )
    .await?;

    info!(
        matched = report.matched_games,
        total = report.total_games,
        skipped = report.skipped_games(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "{} of {} games matched your openings",
        report.matched_games,
        report.total_games
    );

    let output = RunOutput {
        books: summaries,
        rejected_chapters: rejected.iter().map(RejectedChapter::from).collect(),
        filtered_out,
        report,
    };
    write_output(&config.output_path, &output)?;

    Ok(())
}
