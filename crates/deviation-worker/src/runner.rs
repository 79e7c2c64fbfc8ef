//! Parallel batch run: one blocking task per game, bounded by a semaphore.

use std::sync::Arc;
use std::time::Duration;

use chess_core::GameData;
use repertoire::game::game_id;
use repertoire::{analyze_record, BatchOptions, BatchReport, Book, CancelFlag, GameError, GameOutcome};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::error::WorkerError;

/// Everything a game task needs, shared read-only across workers.
struct Shared {
    books: Vec<Book>,
    username: String,
    options: BatchOptions,
}

/// Analyze `games` on up to `workers` threads. After `timeout`, games not yet
/// started are dropped and the report is marked cancelled; games already
/// running finish and are kept.
pub async fn run_batch(
    games: Vec<Result<GameData, GameError>>,
    books: Vec<Book>,
    username: &str,
    options: BatchOptions,
    workers: usize,
    timeout: Option<Duration>,
) -> Result<BatchReport, WorkerError> {
    let shared = Arc::new(Shared {
        books,
        username: username.to_string(),
        options,
    });
    let cancel = CancelFlag::new();
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let deadline = timeout.map(|limit| Instant::now() + limit);

    let timer = timeout.map(|limit| {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            warn!(timeout_secs = limit.as_secs(), "Analysis deadline reached");
            cancel.cancel();
        })
    });

    let mut report = BatchReport::for_games(games.len());
    info!(games = report.total_games, workers, "Starting batch");

    let mut pending = Vec::with_capacity(games.len());
    for game in games {
        let record = match game {
            Ok(record) => record,
            Err(e) => {
                pending.push(Pending::Ready(GameOutcome::Failed(e)));
                continue;
            }
        };

        let permit = semaphore.clone().acquire_owned().await?;
        if deadline.is_some_and(|d| Instant::now() >= d) {
            cancel.cancel();
        }
        if cancel.is_cancelled() {
            break;
        }

        let shared = shared.clone();
        let cancel = cancel.clone();
        let game_id = game_id(&record);
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit; // Hold until done
            if cancel.is_cancelled() {
                return None;
            }
            Some(analyze_record(&record, &shared.username, &shared.books, &shared.options))
        });
        pending.push(Pending::Running { game_id, handle });
    }

    collect(pending, &mut report, &shared.options).await;

    if let Some(timer) = timer {
        timer.abort();
    }
    report.cancelled = report.skipped_games() > 0;

    info!(
        total = report.total_games,
        processed = report.processed_games,
        matched = report.matched_games,
        findings = report.findings.len(),
        errors = report.errors.len(),
        cancelled = report.cancelled,
        "Batch complete"
    );
    Ok(report)
}

enum Pending {
    Ready(GameOutcome),
    Running {
        game_id: String,
        handle: JoinHandle<Option<GameOutcome>>,
    },
}

/// Fold outcomes in input order. A task that never started its game adds
/// nothing; a task that died is a failure of that game.
async fn collect(pending: Vec<Pending>, report: &mut BatchReport, options: &BatchOptions) {
    for item in pending {
        match item {
            Pending::Ready(outcome) => report.record(outcome, options),
            Pending::Running { game_id, handle } => match handle.await {
                Ok(Some(outcome)) => report.record(outcome, options),
                Ok(None) => {}
                Err(e) => {
                    error!(game_id = %game_id, error = %e, "Game task failed");
                    report.record_failure(game_id, format!("worker task failed: {e}"));
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_core::{parse_pgn, PgnError};
    use repertoire::{compile, AnnotatedLine, FindingKind};

    fn books() -> Vec<Book> {
        let chapters = vec![
            AnnotatedLine::from_moves("Open Game", "Open Game: e5", &["e4", "e5", "Nf3"]),
            AnnotatedLine::from_moves("Open Game", "Open Game: c5", &["e4", "c5", "Nf3"]),
        ];
        vec![compile("Open Game", &chapters).book]
    }

    fn record(id: u32, moves: &str) -> Result<GameData, GameError> {
        Ok(parse_pgn(&format!(
            "[White \"me\"]\n[Black \"you\"]\n[Link \"https://example.com/game/{id}\"]\n\n{moves} *"
        ))
        .unwrap())
    }

    fn games() -> Vec<Result<GameData, GameError>> {
        vec![
            record(1, "1. e4 e5 2. Nc3"),
            Err(GameError::Unreadable {
                game_id: "broken".into(),
                source: PgnError::NoMoves,
            }),
            record(2, "1. e4 d5"),
            record(3, "1. d4 d5"),
            record(4, "1. e4 e5 2. Nf3"),
        ]
    }

    #[tokio::test]
    async fn test_parallel_run_keeps_input_order() {
        let report = run_batch(games(), books(), "me", BatchOptions::default(), 4, None)
            .await
            .unwrap();
        assert_eq!(report.total_games, 5);
        assert_eq!(report.processed_games, 5);
        assert_eq!(report.matched_games, 3);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].game_id, "broken");
        let kinds: Vec<FindingKind> = report.findings.iter().map(|f| f.kind()).collect();
        assert_eq!(kinds, vec![FindingKind::UserDeviation, FindingKind::OpponentLeftBook]);
        assert_eq!(report.findings[0].game_id, "1");
        assert!(!report.cancelled);
    }

    #[tokio::test]
    async fn test_single_worker_matches_parallel() {
        let one = run_batch(games(), books(), "me", BatchOptions::default(), 1, None)
            .await
            .unwrap();
        let many = run_batch(games(), books(), "me", BatchOptions::default(), 8, None)
            .await
            .unwrap();
        assert_eq!(one.findings, many.findings);
        assert_eq!(one.counts, many.counts);
    }

    #[tokio::test]
    async fn test_expired_deadline_keeps_supplied_count() {
        let full = run_batch(games(), books(), "me", BatchOptions::default(), 2, None)
            .await
            .unwrap();
        let report = run_batch(games(), books(), "me", BatchOptions::default(), 2, Some(Duration::ZERO))
            .await
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.total_games, 5);
        assert!(report.processed_games < report.total_games);
        assert_eq!(report.skipped_games(), report.total_games - report.processed_games);
        assert!(full.findings.starts_with(&report.findings));
        assert!(report.matched_games <= full.matched_games);
    }

    #[tokio::test]
    async fn test_generous_deadline_finishes_everything() {
        let report = run_batch(games(), books(), "me", BatchOptions::default(), 2, Some(Duration::from_secs(60)))
            .await
            .unwrap();
        assert!(!report.cancelled);
        assert_eq!(report.processed_games, 5);
        assert_eq!(report.skipped_games(), 0);
        assert_eq!(report.findings.len(), 2);
    }

    #[tokio::test]
    async fn test_panicked_task_is_a_game_failure() {
        let options = BatchOptions::default();
        let pending = vec![
            Pending::Running {
                game_id: "boom".into(),
                handle: tokio::task::spawn_blocking(|| -> Option<GameOutcome> { panic!("analysis blew up") }),
            },
            Pending::Ready(GameOutcome::Unmatched { game_id: "quiet".into() }),
        ];
        let mut report = BatchReport::for_games(2);
        collect(pending, &mut report, &options).await;

        assert_eq!(report.processed_games, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].game_id, "boom");
        assert_eq!(report.unmatched_games(), 1);
        assert!(!report.cancelled);
    }

    #[tokio::test]
    async fn test_empty_run() {
        let report = run_batch(Vec::new(), books(), "me", BatchOptions::default(), 2, None)
            .await
            .unwrap();
        assert_eq!(report.total_games, 0);
        assert!(report.findings.is_empty());
    }
}
