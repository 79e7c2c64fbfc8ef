//! Batch analysis: every game walked independently, findings aggregated.
//!
//! Each game is a pure function of the (immutable) books and the game, so
//! callers may fan games out however they like and fold the outcomes back
//! with [`BatchReport::record`].

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chess_core::GameData;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::book::Book;
use crate::error::GameError;
use crate::finding::{Finding, FindingKind, DEFAULT_LINK_TEMPLATE};
use crate::game::PlayedGame;
use crate::index::{find_book, NameMatching};
use crate::walker::{walk, WalkOptions};

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Keep games that never left the book.
    pub include_no_deviation: bool,
    /// Kinds to keep; `None` keeps every deviation kind.
    pub kinds: Option<BTreeSet<FindingKind>>,
    pub name_matching: NameMatching,
    pub walk: WalkOptions,
    pub link_template: String,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            include_no_deviation: false,
            kinds: None,
            name_matching: NameMatching::Exact,
            walk: WalkOptions::default(),
            link_template: DEFAULT_LINK_TEMPLATE.to_string(),
        }
    }
}

impl BatchOptions {
    /// Whether a finding of this kind goes into the report's list.
    pub fn retains(&self, kind: FindingKind) -> bool {
        match kind {
            FindingKind::NoDeviation => self.include_no_deviation,
            _ => self.kinds.as_ref().map_or(true, |kinds| kinds.contains(&kind)),
        }
    }
}

/// What happened to one game.
#[derive(Debug, Clone)]
pub enum GameOutcome {
    Finding(Finding),
    Unmatched { game_id: String },
    Failed(GameError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FindingCounts {
    pub no_deviation: usize,
    pub user_deviation: usize,
    pub opponent_left_book: usize,
}

impl FindingCounts {
    fn add(&mut self, kind: FindingKind) {
        match kind {
            FindingKind::NoDeviation => self.no_deviation += 1,
            FindingKind::UserDeviation => self.user_deviation += 1,
            FindingKind::OpponentLeftBook => self.opponent_left_book += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameFailure {
    pub game_id: String,
    pub error: String,
}

/// Findings plus the counts behind "X of Y games matched your openings".
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub findings: Vec<Finding>,
    /// Games supplied, whether or not the batch got to them.
    pub total_games: usize,
    /// Games that were run before the batch finished or was cancelled.
    pub processed_games: usize,
    pub matched_games: usize,
    /// Games that were matched and walked to a result.
    pub analyzed_games: usize,
    /// Per kind, over every analyzed game, retained or not.
    pub counts: FindingCounts,
    pub errors: Vec<GameFailure>,
    pub cancelled: bool,
}

impl BatchReport {
    /// Empty report for a batch of `total_games` games.
    pub fn for_games(total_games: usize) -> Self {
        Self {
            total_games,
            ..Default::default()
        }
    }

    /// Fold one game's outcome into the report.
    pub fn record(&mut self, outcome: GameOutcome, options: &BatchOptions) {
        self.processed_games += 1;
        match outcome {
            GameOutcome::Finding(finding) => {
                self.matched_games += 1;
                self.analyzed_games += 1;
                let kind = finding.kind();
                self.counts.add(kind);
                if options.retains(kind) {
                    self.findings.push(finding);
                }
            }
            GameOutcome::Unmatched { game_id } => {
                debug!(game_id = %game_id, "No book matched");
            }
            GameOutcome::Failed(error) => {
                warn!(game_id = error.game_id(), error = %error, "Skipping game");
                self.errors.push(GameFailure {
                    game_id: error.game_id().to_string(),
                    error: error.to_string(),
                });
            }
        }
    }

    /// A game whose analysis failed outside the engine, e.g. a worker panic.
    pub fn record_failure(&mut self, game_id: impl Into<String>, error: impl Into<String>) {
        self.processed_games += 1;
        let failure = GameFailure {
            game_id: game_id.into(),
            error: error.into(),
        };
        warn!(game_id = %failure.game_id, error = %failure.error, "Game analysis failed");
        self.errors.push(failure);
    }

    /// Processed games no book matched.
    pub fn unmatched_games(&self) -> usize {
        self.processed_games - self.matched_games - self.errors.len()
    }

    /// Supplied games the batch never got to.
    pub fn skipped_games(&self) -> usize {
        self.total_games - self.processed_games
    }
}

/// Match and walk one game.
pub fn analyze_game(game: &PlayedGame, books: &[Book], options: &BatchOptions) -> GameOutcome {
    let Some(matched) = find_book(game, books, options.name_matching) else {
        return GameOutcome::Unmatched {
            game_id: game.id.clone(),
        };
    };
    let result = walk(matched.book, game, options.walk);
    GameOutcome::Finding(Finding::from_walk(game, &matched, &result, &options.link_template))
}

/// Parse, match and walk one game record.
pub fn analyze_record(record: &GameData, username: &str, books: &[Book], options: &BatchOptions) -> GameOutcome {
    match PlayedGame::from_game_data(record, username) {
        Ok(game) => analyze_game(&game, books, options),
        Err(e) => GameOutcome::Failed(e),
    }
}

/// Walk every game against the books.
pub fn analyze(games: &[PlayedGame], books: &[Book], options: &BatchOptions) -> BatchReport {
    let mut report = BatchReport::for_games(games.len());
    for game in games {
        report.record(analyze_game(game, books, options), options);
    }
    log_summary(&report);
    report
}

/// [`analyze`] over raw records, checking `cancel` between games.
pub fn analyze_records(
    records: &[GameData],
    username: &str,
    books: &[Book],
    options: &BatchOptions,
    cancel: &CancelFlag,
) -> BatchReport {
    let mut report = BatchReport::for_games(records.len());
    for record in records {
        if cancel.is_cancelled() {
            warn!(
                done = report.processed_games,
                remaining = report.skipped_games(),
                "Batch cancelled"
            );
            report.cancelled = true;
            break;
        }
        report.record(analyze_record(record, username, books, options), options);
    }
    log_summary(&report);
    report
}

fn log_summary(report: &BatchReport) {
    info!(
        total = report.total_games,
        processed = report.processed_games,
        matched = report.matched_games,
        user_deviations = report.counts.user_deviation,
        opponent_left_book = report.counts.opponent_left_book,
        no_deviation = report.counts.no_deviation,
        errors = report.errors.len(),
        "Batch analysis complete"
    );
}

/// Shared cancellation token, checked between games.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::compile;
    use crate::chapter::AnnotatedLine;
    use crate::side::Side;
    use chess_core::parse_pgn;

    fn example_book() -> Vec<Book> {
        let chapters = vec![
            AnnotatedLine::from_moves("Open Game", "Open Game: e5", &["e4", "e5", "Nf3"]),
            AnnotatedLine::from_moves("Open Game", "Open Game: c5", &["e4", "c5", "Nf3"]),
        ];
        vec![compile("Open Game", &chapters).book]
    }

    fn games() -> Vec<PlayedGame> {
        vec![
            PlayedGame::from_sans("A", Side::White, &["e4", "e5", "Nc3"]).unwrap(),
            PlayedGame::from_sans("B", Side::White, &["e4", "d5"]).unwrap(),
            PlayedGame::from_sans("C", Side::White, &["e4", "e5", "Nf3"]).unwrap(),
            PlayedGame::from_sans("D", Side::White, &["d4", "d5"]).unwrap(),
        ]
    }

    #[test]
    fn test_end_to_end_example() {
        let options = BatchOptions {
            include_no_deviation: true,
            ..Default::default()
        };
        let report = analyze(&games(), &example_book(), &options);
        assert_eq!(report.total_games, 4);
        assert_eq!(report.matched_games, 3);
        assert_eq!(report.unmatched_games(), 1);

        let a = &report.findings[0];
        assert_eq!(a.game_id, "A");
        assert_eq!(a.kind(), FindingKind::UserDeviation);
        assert_eq!(a.ply, 3);
        assert_eq!(a.divergent_move().unwrap().san, "Nc3");
        assert_eq!(a.expected_moves().iter().map(|m| m.san.as_str()).collect::<Vec<_>>(), vec!["Nf3"]);

        let b = &report.findings[1];
        assert_eq!(b.kind(), FindingKind::OpponentLeftBook);
        assert_eq!(b.ply, 2);
        assert_eq!(b.divergent_move().unwrap().san, "d5");
        assert_eq!(b.expected_moves().iter().map(|m| m.san.as_str()).collect::<Vec<_>>(), vec!["c5", "e5"]);

        assert_eq!(report.findings[2].kind(), FindingKind::NoDeviation);
        assert_eq!(report.counts, FindingCounts { no_deviation: 1, user_deviation: 1, opponent_left_book: 1 });
    }

    #[test]
    fn test_no_deviation_dropped_by_default() {
        let report = analyze(&games(), &example_book(), &BatchOptions::default());
        let ids: Vec<&str> = report.findings.iter().map(|f| f.game_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
        // Still counted.
        assert_eq!(report.counts.no_deviation, 1);
    }

    #[test]
    fn test_kind_filter() {
        let options = BatchOptions {
            kinds: Some(BTreeSet::from([FindingKind::OpponentLeftBook])),
            ..Default::default()
        };
        let report = analyze(&games(), &example_book(), &options);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].game_id, "B");
        assert_eq!(report.matched_games, 3);
    }

    #[test]
    fn test_empty_inputs_are_zero_results() {
        let report = analyze(&[], &example_book(), &BatchOptions::default());
        assert_eq!((report.total_games, report.matched_games), (0, 0));
        let report = analyze(&games(), &[], &BatchOptions::default());
        assert_eq!((report.total_games, report.matched_games), (4, 0));
        assert!(report.findings.is_empty());
    }

    #[test]
    fn test_bad_record_does_not_abort_batch() {
        let good = parse_pgn("[White \"me\"]\n[Black \"you\"]\n[Link \"https://x/g/1\"]\n\n1. e4 e5 2. Nc3 *").unwrap();
        let mut bad = good.clone();
        bad.moves = vec!["e4".into(), "Ke7".into()];
        bad.metadata.link = Some("https://x/g/2".into());
        let stranger = parse_pgn("[White \"a\"]\n[Black \"b\"]\n[Link \"https://x/g/3\"]\n\n1. e4 *").unwrap();

        let report = analyze_records(
            &[good, bad, stranger],
            "ME",
            &example_book(),
            &BatchOptions::default(),
            &CancelFlag::new(),
        );
        assert_eq!(report.total_games, 3);
        assert_eq!(report.matched_games, 1);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].game_id, "2");
        assert_eq!(report.errors[1].game_id, "3");
        assert_eq!(report.unmatched_games(), 0);
    }

    #[test]
    fn test_cancelled_batch_keeps_partial_results() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let record = parse_pgn("[White \"me\"]\n[Black \"you\"]\n\n1. e4 e5 2. Nc3 *").unwrap();
        let report = analyze_records(&[record], "me", &example_book(), &BatchOptions::default(), &cancel);
        assert!(report.cancelled);
        assert_eq!(report.total_games, 1);
        assert_eq!(report.processed_games, 0);
        assert_eq!(report.skipped_games(), 1);
        assert_eq!(report.unmatched_games(), 0);
    }

    #[test]
    fn test_cancelled_batch_still_reports_games_supplied() {
        let game = |id: u32| {
            parse_pgn(&format!(
                "[White \"me\"]\n[Black \"you\"]\n[Link \"https://x/g/{id}\"]\n\n1. e4 e5 2. Nc3 *"
            ))
            .unwrap()
        };
        let records = vec![game(1), game(2), game(3)];
        let cancel = CancelFlag::new();
        cancel.cancel();
        let report = analyze_records(&records, "me", &example_book(), &BatchOptions::default(), &cancel);
        assert_eq!(report.total_games, 3);
        assert_eq!(report.processed_games, 0);
        assert_eq!(report.matched_games, 0);
        assert!(report.cancelled);

        let full = analyze_records(&records, "me", &example_book(), &BatchOptions::default(), &CancelFlag::new());
        assert_eq!((full.total_games, full.processed_games, full.skipped_games()), (3, 3, 0));
        assert!(!full.cancelled);
    }

    #[test]
    fn test_record_failure_counts_as_processed_error() {
        let mut report = BatchReport::for_games(2);
        report.record_failure("7", "worker panicked");
        assert_eq!(report.processed_games, 1);
        assert_eq!(report.errors, vec![GameFailure { game_id: "7".into(), error: "worker panicked".into() }]);
        assert_eq!(report.unmatched_games(), 0);
        assert_eq!(report.skipped_games(), 1);
    }

    #[test]
    fn test_retains() {
        let default = BatchOptions::default();
        assert!(!default.retains(FindingKind::NoDeviation));
        assert!(default.retains(FindingKind::UserDeviation));
        let only_user = BatchOptions {
            kinds: Some(BTreeSet::from([FindingKind::UserDeviation])),
            include_no_deviation: true,
            ..Default::default()
        };
        assert!(only_user.retains(FindingKind::NoDeviation));
        assert!(!only_user.retains(FindingKind::OpponentLeftBook));
    }
}
