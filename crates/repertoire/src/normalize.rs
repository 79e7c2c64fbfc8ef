//! Move normalization: any accepted notation for a ply, resolved against the
//! position it is played in, becomes one canonical key.

use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Serialize, Serializer};
use shakmaty::fen::Fen;
use shakmaty::san::San;
use shakmaty::{Chess, EnPassantMode, File, Move, Position, Role, Square};

use crate::error::MalformedMoveError;

static PROMOTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-h](?:x[a-h])?[18])=?([QRBNqrbn])$").expect("promotion regex")
});

/// Notation-independent identity of a move: piece, from, to, promotion.
///
/// Castling is keyed by the king's destination square (g- or c-file), so
/// `O-O`, `0-0`, `e1g1` and `e1h1` all share one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanonicalMove {
    pub role: Role,
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Role>,
}

impl CanonicalMove {
    /// `None` for drops, which standard chess never produces.
    pub fn from_move(mv: &Move) -> Option<Self> {
        let key = match *mv {
            Move::Normal { role, from, to, promotion, .. } => CanonicalMove { role, from, to, promotion },
            Move::EnPassant { from, to } => CanonicalMove {
                role: Role::Pawn,
                from,
                to,
                promotion: None,
            },
            Move::Castle { king, rook } => {
                let file = if rook.file() > king.file() { File::G } else { File::C };
                CanonicalMove {
                    role: Role::King,
                    from: king,
                    to: Square::from_coords(file, king.rank()),
                    promotion: None,
                }
            }
            Move::Put { .. } => return None,
        };
        Some(key)
    }

    /// UCI coordinate text, e.g. `e2e4`, `e7e8q`.
    pub fn uci(&self) -> String {
        self.to_string()
    }

    fn sort_key(&self) -> (u8, u8, u8, u8) {
        (
            self.from as u8,
            self.to as u8,
            self.promotion.map_or(0, |r| r as u8),
            self.role as u8,
        )
    }
}

impl Ord for CanonicalMove {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for CanonicalMove {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for CanonicalMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(role) = self.promotion {
            write!(f, "{}", role.char())?;
        }
        Ok(())
    }
}

impl Serialize for CanonicalMove {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A move text resolved against a position.
#[derive(Debug, Clone)]
pub struct ResolvedMove {
    pub key: CanonicalMove,
    pub mv: Move,
    /// Plain SAN without check or annotation suffixes.
    pub san: String,
}

/// Canonical key of `raw` played in `pos`.
pub fn normalize(raw: &str, pos: &Chess) -> Result<CanonicalMove, MalformedMoveError> {
    resolve(raw, pos).map(|resolved| resolved.key)
}

/// Resolve SAN (with any decorations) or UCI text to a legal move in `pos`.
pub fn resolve(raw: &str, pos: &Chess) -> Result<ResolvedMove, MalformedMoveError> {
    let text = clean(raw);
    let malformed = |reason: String| MalformedMoveError {
        text: raw.to_string(),
        fen: fen_of(pos),
        reason,
    };

    if text.is_empty() {
        return Err(malformed("empty move".to_string()));
    }

    let san_error = match text.parse::<San>() {
        Ok(san) => match san.to_move(pos) {
            Ok(mv) => return finish(pos, mv).ok_or_else(|| malformed("unsupported move".into())),
            Err(e) => e.to_string(),
        },
        Err(e) => e.to_string(),
    };

    match resolve_uci(&text, pos) {
        Some(mv) => finish(pos, mv).ok_or_else(|| malformed("unsupported move".into())),
        None => Err(malformed(san_error)),
    }
}

fn finish(pos: &Chess, mv: Move) -> Option<ResolvedMove> {
    let key = CanonicalMove::from_move(&mv)?;
    let san = San::from_move(pos, mv.clone()).to_string();
    Some(ResolvedMove { key, mv, san })
}

/// Strip notation decorations so only the move itself remains.
fn clean(raw: &str) -> String {
    let mut text = raw.trim();
    for suffix in ["e.p.", "ep"] {
        if let Some(stripped) = text.strip_suffix(suffix) {
            if stripped.ends_with(|c: char| c.is_ascii_digit() || c.is_whitespace()) {
                text = stripped.trim_end();
            }
        }
    }
    let text = text.trim_end_matches(['+', '#', '!', '?']);

    match text {
        "0-0" | "o-o" => return "O-O".to_string(),
        "0-0-0" | "o-o-o" => return "O-O-O".to_string(),
        _ => {}
    }

    if let Some(cap) = PROMOTION_RE.captures(text) {
        return format!("{}={}", &cap[1], cap[2].to_ascii_uppercase());
    }

    // Explicit pawn letter, e.g. `Pe4`.
    if let Some(rest) = text.strip_prefix('P') {
        if rest.starts_with(|c: char| ('a'..='h').contains(&c)) {
            return rest.to_string();
        }
    }

    text.to_string()
}

/// UCI coordinates. Castling may be given as king-to-destination or
/// king-takes-rook.
fn resolve_uci(text: &str, pos: &Chess) -> Option<Move> {
    let bytes = text.as_bytes();
    if !(bytes.len() == 4 || bytes.len() == 5) {
        return None;
    }
    let from = Square::from_ascii(&bytes[0..2]).ok()?;
    let to = Square::from_ascii(&bytes[2..4]).ok()?;
    let promotion = match bytes.get(4) {
        Some(&c) => Some(Role::from_char(char::from(c).to_ascii_lowercase())?),
        None => None,
    };

    pos.legal_moves().into_iter().find(|m| {
        if let Move::Castle { king, rook } = *m {
            if king == from && rook == to {
                return true;
            }
        }
        CanonicalMove::from_move(m)
            .map(|key| key.from == from && key.to == to && key.promotion == promotion)
            .unwrap_or(false)
    })
}

/// Full FEN of a position.
pub fn fen_of(pos: &Chess) -> String {
    Fen::from_position(pos, EnPassantMode::Legal).to_string()
}

/// Position identity: FEN without move counters.
pub fn position_key(pos: &Chess) -> String {
    normalize_fen(&fen_of(pos))
}

/// Strips move counters from FEN, keeping only position + side + castling + ep.
pub fn normalize_fen(fen: &str) -> String {
    fen.split_whitespace().take(4).collect::<Vec<_>>().join(" ")
}
