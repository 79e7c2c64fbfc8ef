use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::book::{Book, NodeId};
use crate::chapter::ChapterRef;
use crate::game::PlayedGame;
use crate::index::BookMatch;
use crate::side::Side;
use crate::walker::{Walk, WalkResult};

/// Chess.com analysis board for a game, opened at a ply.
pub const DEFAULT_LINK_TEMPLATE: &str = "https://www.chess.com/analysis/game/live/{game_id}?move={ply}";

const BOARD_EDITOR_URL: &str = "https://lichess.org/analysis/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    NoDeviation,
    UserDeviation,
    OpponentLeftBook,
}

impl FindingKind {
    pub const ALL: [FindingKind; 3] = [
        FindingKind::NoDeviation,
        FindingKind::UserDeviation,
        FindingKind::OpponentLeftBook,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FindingKind::NoDeviation => "no_deviation",
            FindingKind::UserDeviation => "user_deviation",
            FindingKind::OpponentLeftBook => "opponent_left_book",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        FindingKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized || kind.as_str().replace('_', "") == normalized)
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A move in both notations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveText {
    pub uci: String,
    pub san: String,
}

/// A book reply and how many lines continue through it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookMove {
    pub uci: String,
    pub san: String,
    pub lines: usize,
}

/// What happened at the finding's ply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Divergence {
    NoDeviation {
        plies_matched: u32,
    },
    UserDeviation {
        played_move: MoveText,
        /// Book replies, sorted by canonical key.
        expected_moves: Vec<BookMove>,
        /// Number of book replies at this position.
        variation_count: usize,
    },
    OpponentLeftBook {
        opponent_move: MoveText,
        expected_moves: Vec<BookMove>,
    },
}

/// One game's result against its matched book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub game_id: String,
    pub game_url: Option<String>,
    pub date: Option<NaiveDate>,
    pub user_color: Side,
    pub opening_name: String,
    pub matched_chapter: Option<ChapterRef>,
    pub reported_opening: Option<String>,
    /// Ply of the divergent move, or plies matched for `no_deviation`.
    pub ply: u32,
    pub move_number: u32,
    #[serde(flatten)]
    pub divergence: Divergence,
    pub transposed: bool,
    /// Position before the divergent ply (after the last matched ply otherwise).
    pub fen: String,
    pub analysis_url: String,
    pub board_url: String,
}

impl Finding {
    pub fn kind(&self) -> FindingKind {
        match self.divergence {
            Divergence::NoDeviation { .. } => FindingKind::NoDeviation,
            Divergence::UserDeviation { .. } => FindingKind::UserDeviation,
            Divergence::OpponentLeftBook { .. } => FindingKind::OpponentLeftBook,
        }
    }

    /// Book replies at the divergence, empty for `no_deviation`.
    pub fn expected_moves(&self) -> &[BookMove] {
        match &self.divergence {
            Divergence::NoDeviation { .. } => &[],
            Divergence::UserDeviation { expected_moves, .. }
            | Divergence::OpponentLeftBook { expected_moves, .. } => expected_moves,
        }
    }

    /// The move that left the book, if any.
    pub fn divergent_move(&self) -> Option<&MoveText> {
        match &self.divergence {
            Divergence::NoDeviation { .. } => None,
            Divergence::UserDeviation { played_move, .. } => Some(played_move),
            Divergence::OpponentLeftBook { opponent_move, .. } => Some(opponent_move),
        }
    }

    /// Assemble the finding for a finished walk.
    pub fn from_walk(game: &PlayedGame, matched: &BookMatch<'_>, walk: &Walk, link_template: &str) -> Finding {
        let book = matched.book;
        let (ply, divergence) = match walk.result {
            WalkResult::NoDeviation { plies_matched, .. } => (plies_matched, Divergence::NoDeviation { plies_matched }),
            WalkResult::UserDeviation { ply, node } => (
                ply,
                Divergence::UserDeviation {
                    played_move: played_move(game, ply),
                    expected_moves: expected_moves(book, node),
                    variation_count: book.node(node).children.len(),
                },
            ),
            WalkResult::OpponentLeftBook { ply, node } => (
                ply,
                Divergence::OpponentLeftBook {
                    opponent_move: played_move(game, ply),
                    expected_moves: expected_moves(book, node),
                },
            ),
        };

        // Position before the next unplayed ply.
        let next = match walk.result {
            WalkResult::NoDeviation { plies_matched, .. } => plies_matched as usize,
            _ => ply as usize - 1,
        };
        let fen = game
            .moves
            .get(next)
            .map(|m| m.fen_before.clone())
            .unwrap_or_else(|| game.final_fen.clone());

        // A transposed walk can end on a node outside the matched prefix.
        let matched_chapter = book.best_chapter(walk.result.node()).or(matched.chapter);

        Finding {
            game_id: game.id.clone(),
            game_url: game.url.clone(),
            date: game.date,
            user_color: game.user_color,
            opening_name: book.opening_name().to_string(),
            matched_chapter: matched_chapter.cloned(),
            reported_opening: game.reported_opening.clone(),
            ply,
            move_number: (ply + 1) / 2,
            divergence,
            transposed: walk.transposed,
            analysis_url: analysis_url(link_template, &game.id, ply),
            board_url: board_url(&fen),
            fen,
        }
    }
}

fn played_move(game: &PlayedGame, ply: u32) -> MoveText {
    let mv = &game.moves[ply as usize - 1];
    MoveText {
        uci: mv.key.uci(),
        san: mv.san.clone(),
    }
}

/// Book replies at `node`, in canonical key order.
pub fn expected_moves(book: &Book, node: NodeId) -> Vec<BookMove> {
    book.node(node)
        .children
        .iter()
        .map(|(key, &child)| BookMove {
            uci: key.uci(),
            san: book.node(child).san.clone().unwrap_or_else(|| key.uci()),
            lines: book.variation_count_at(child),
        })
        .collect()
}

/// Game deep link from a template with `{game_id}` and `{ply}` placeholders.
pub fn analysis_url(template: &str, game_id: &str, ply: u32) -> String {
    template
        .replace("{game_id}", game_id)
        .replace("{ply}", &ply.to_string())
}

/// Board-editor link for a FEN.
pub fn board_url(fen: &str) -> String {
    format!("{BOARD_EDITOR_URL}{}", fen.replace(' ', "_"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::compile;
    use crate::chapter::AnnotatedLine;
    use crate::index::{find_book, NameMatching};
    use crate::walker::{walk, WalkOptions};

    fn finding(book_lines: &[&str], color: Side, moves: &str) -> Finding {
        let chapters: Vec<AnnotatedLine> = book_lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                let line: Vec<&str> = line.split_whitespace().collect();
                AnnotatedLine::from_moves("Open Game", &format!("Open Game: {}", i + 1), &line)
            })
            .collect();
        let books = vec![compile("Open Game", &chapters).book];
        let moves: Vec<&str> = moves.split_whitespace().collect();
        let game = PlayedGame::from_sans("777", color, &moves).unwrap();
        let matched = find_book(&game, &books, NameMatching::Exact).unwrap();
        let w = walk(matched.book, &game, WalkOptions::default());
        Finding::from_walk(&game, &matched, &w, DEFAULT_LINK_TEMPLATE)
    }

    #[test]
    fn test_user_deviation_finding() {
        let f = finding(&["e4 e5 Nf3", "e4 c5 Nf3"], Side::White, "e4 e5 Nc3");
        assert_eq!(f.kind(), FindingKind::UserDeviation);
        assert_eq!(f.ply, 3);
        assert_eq!(f.move_number, 2);
        assert_eq!(f.divergent_move().map(|m| m.san.as_str()), Some("Nc3"));
        let expected: Vec<&str> = f.expected_moves().iter().map(|m| m.san.as_str()).collect();
        assert_eq!(expected, vec!["Nf3"]);
        assert_eq!(f.matched_chapter.as_ref().map(ChapterRef::as_str), Some("Open Game: 1"));
        assert_eq!(f.analysis_url, "https://www.chess.com/analysis/game/live/777?move=3");
        assert_eq!(f.fen, "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2");
        assert_eq!(
            f.board_url,
            "https://lichess.org/analysis/rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR_w_KQkq_-_0_2"
        );
    }

    #[test]
    fn test_opponent_left_book_finding() {
        let f = finding(&["e4 e5 Nf3", "e4 c5 Nf3"], Side::White, "e4 d5");
        assert_eq!(f.kind(), FindingKind::OpponentLeftBook);
        assert_eq!(f.ply, 2);
        assert_eq!(f.move_number, 1);
        // Sorted by canonical key: c7c5 before e7e5.
        let expected: Vec<&str> = f.expected_moves().iter().map(|m| m.san.as_str()).collect();
        assert_eq!(expected, vec!["c5", "e5"]);
        assert_eq!(f.matched_chapter.as_ref().map(ChapterRef::as_str), Some("Open Game: 1"));
    }

    #[test]
    fn test_no_deviation_finding() {
        let f = finding(&["e4 e5 Nf3"], Side::Black, "e4 e5 Nf3");
        assert_eq!(f.kind(), FindingKind::NoDeviation);
        assert_eq!(f.ply, 3);
        assert!(f.expected_moves().is_empty());
        assert!(f.divergent_move().is_none());
        assert!(f.fen.contains(" b KQkq "));
    }

    #[test]
    fn test_serialized_shape() {
        let f = finding(&["e4 e5 Nf3", "e4 c5 Nf3"], Side::White, "e4 e5 Nc3");
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json["kind"], "user_deviation");
        assert_eq!(json["user_color"], "white");
        assert_eq!(json["played_move"]["uci"], "b1c3");
        assert_eq!(json["expected_moves"][0]["uci"], "g1f3");
        assert_eq!(json["variation_count"], 1);
        assert_eq!(json["matched_chapter"], "Open Game: 1");
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!(FindingKind::parse("user_deviation"), Some(FindingKind::UserDeviation));
        assert_eq!(FindingKind::parse("Opponent-Left-Book"), Some(FindingKind::OpponentLeftBook));
        assert_eq!(FindingKind::parse("nodeviation"), Some(FindingKind::NoDeviation));
        assert_eq!(FindingKind::parse("blunder"), None);
    }

    #[test]
    fn test_links() {
        assert_eq!(
            analysis_url("https://lichess.org/{game_id}#{ply}", "AbC", 12),
            "https://lichess.org/AbC#12"
        );
        assert_eq!(
            board_url("8/8/8/8/8/8/8/K6k w - - 0 1"),
            "https://lichess.org/analysis/8/8/8/8/8/8/8/K6k_w_-_-_0_1"
        );
    }
}
