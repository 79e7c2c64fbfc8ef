use chess_core::{GameData, TimeClass};
use chrono::NaiveDate;
use serde::Serialize;
use shakmaty::{Chess, Position};

use crate::error::GameError;
use crate::normalize::{fen_of, position_key, resolve};
use crate::side::Side;

/// One ply of a played game, resolved against the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayedMove {
    /// 1-based half-move number.
    pub ply: u32,
    pub key: crate::normalize::CanonicalMove,
    pub san: String,
    /// Full FEN before the move.
    pub fen_before: String,
    /// Position key after the move.
    pub position_after: String,
}

/// A historical game, ready to be walked against a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayedGame {
    pub id: String,
    pub url: Option<String>,
    pub date: Option<NaiveDate>,
    pub user_color: Side,
    pub rated: Option<bool>,
    pub time_class: Option<TimeClass>,
    pub reported_opening: Option<String>,
    pub moves: Vec<PlayedMove>,
    /// FEN after the last move.
    pub final_fen: String,
}

impl PlayedGame {
    /// Replay move texts from the standard start. Stops at the first move
    /// that does not resolve.
    pub fn from_sans<S: AsRef<str>>(id: &str, user_color: Side, sans: &[S]) -> Result<Self, GameError> {
        let mut pos = Chess::default();
        let mut moves = Vec::with_capacity(sans.len());

        for (i, text) in sans.iter().enumerate() {
            let resolved = resolve(text.as_ref(), &pos).map_err(|source| GameError::Malformed {
                game_id: id.to_string(),
                source,
            })?;
            let fen_before = fen_of(&pos);
            pos.play_unchecked(resolved.mv);
            moves.push(PlayedMove {
                ply: i as u32 + 1,
                key: resolved.key,
                san: resolved.san,
                fen_before,
                position_after: position_key(&pos),
            });
        }

        Ok(PlayedGame {
            id: id.to_string(),
            url: None,
            date: None,
            user_color,
            rated: None,
            time_class: None,
            reported_opening: None,
            moves,
            final_fen: fen_of(&pos),
        })
    }

    /// Build from a parsed game record. The user's color is whichever side
    /// `username` played.
    pub fn from_game_data(data: &GameData, username: &str) -> Result<Self, GameError> {
        let meta = &data.metadata;
        let id = game_id(data);

        let user_color = if meta.white.eq_ignore_ascii_case(username) {
            Side::White
        } else if meta.black.eq_ignore_ascii_case(username) {
            Side::Black
        } else {
            return Err(GameError::NotAParticipant {
                game_id: id,
                username: username.to_string(),
            });
        };

        let mut game = PlayedGame::from_sans(&id, user_color, &data.moves)?;
        game.url = meta.url().map(str::to_string);
        game.date = meta.parsed_date();
        game.rated = data.rated();
        game.time_class = data.time_class();
        game.reported_opening = meta.reported_opening();
        Ok(game)
    }

    /// Side making the move at a 1-based ply.
    pub fn mover(&self, ply: u32) -> Side {
        Side::of_ply(ply)
    }

    pub fn is_user_move(&self, ply: u32) -> bool {
        self.mover(ply) == self.user_color
    }
}

/// Game id from the record's URL, or a synthetic one from its players and date.
pub fn game_id(data: &GameData) -> String {
    let meta = &data.metadata;
    meta.game_id().unwrap_or_else(|| {
        format!(
            "{}-vs-{}-{}",
            meta.white,
            meta.black,
            meta.date.as_deref().unwrap_or("undated")
        )
    })
}
