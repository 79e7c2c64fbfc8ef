//! Lightweight regex-based PGN parser for played games.
//!
//! Only the mainline is kept: comments, NAGs and (nested) variations are
//! stripped before SAN tokens are collected. Repertoire studies, where the
//! variations matter, are read by the `repertoire` crate instead.

use std::sync::LazyLock;

use regex::Regex;

use crate::game_data::{GameData, GameMetadata};

const STANDARD_START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\[(\w+)\s+"([^"]*)"\]"#).expect("header regex"));
static HEADER_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*\[[^\]]*\]\s*$").expect("header line regex"));
static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^}]*\}|;[^\n]*").expect("comment regex"));
static MOVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[KQRBN]?[a-h]?[1-8]?x?[a-h][1-8](?:=?[QRBN])?[+#]?|O-O-O[+#]?|O-O[+#]?|0-0-0[+#]?|0-0[+#]?")
        .expect("move regex")
});

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PgnError {
    #[error("game has no moves")]
    NoMoves,

    #[error("game starts from a non-standard position: {0}")]
    NonStandardStart(String),
}

/// Parse a single-game PGN string into a GameData struct.
pub fn parse_pgn(pgn: &str) -> Result<GameData, PgnError> {
    let mut metadata = GameMetadata {
        white: "Unknown".to_string(),
        black: "Unknown".to_string(),
        result: "*".to_string(),
        ..Default::default()
    };
    let mut setup = None;
    let mut fen = None;

    for cap in HEADER_RE.captures_iter(pgn) {
        let value = cap[2].to_string();
        match &cap[1] {
            "White" => metadata.white = value,
            "Black" => metadata.black = value,
            "Result" => metadata.result = value,
            // Chess.com's `Date` is local; `UTCDate` is preferred when present.
            "UTCDate" => metadata.date = Some(value),
            "Date" => {
                metadata.date.get_or_insert(value);
            }
            "TimeControl" => metadata.time_control = Some(value),
            "ECO" => metadata.eco = Some(value),
            "ECOUrl" => metadata.eco_url = Some(value),
            "Opening" => metadata.opening = Some(value),
            "Event" => metadata.event = Some(value),
            "Site" => metadata.site = Some(value),
            "Link" => metadata.link = Some(value),
            "SetUp" => setup = Some(value),
            "FEN" => fen = Some(value),
            _ => {}
        }
    }

    if let Some(f) = fen {
        if setup.as_deref() == Some("1") && f != STANDARD_START_FEN {
            return Err(PgnError::NonStandardStart(f));
        }
    }

    let moves = extract_moves(pgn);
    if moves.is_empty() {
        return Err(PgnError::NoMoves);
    }

    Ok(GameData {
        metadata,
        moves,
        pgn: pgn.to_string(),
        rated: None,
        time_class: None,
    })
}

/// Split a multi-game PGN file into one string per game.
///
/// A new game starts at the first tag line that follows movetext.
pub fn split_games(text: &str) -> Vec<String> {
    let mut games = Vec::new();
    let mut current = String::new();
    let mut seen_movetext = false;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') && seen_movetext {
            games.push(std::mem::take(&mut current));
            seen_movetext = false;
        } else if !trimmed.is_empty() && !trimmed.starts_with('[') {
            seen_movetext = true;
        }
        current.push_str(line);
        current.push('\n');
    }

    if current.trim().is_empty() {
        return games;
    }
    games.push(current);
    games
}

/// Extract mainline SAN moves from PGN text.
fn extract_moves(pgn: &str) -> Vec<String> {
    // Headers first: tag values may contain `;` or `{`.
    let no_headers = HEADER_LINE_RE.replace_all(pgn, " ");
    let no_comments = COMMENT_RE.replace_all(&no_headers, " ");
    let mainline = strip_variations(&no_comments);

    MOVE_RE
        .find_iter(&mainline)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Remove parenthesised variations, including nested ones.
fn strip_variations(movetext: &str) -> String {
    let mut depth = 0usize;
    let mut out = String::with_capacity(movetext.len());
    for c in movetext.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}
