//! Engine error types.
//!
//! Every error is scoped to the smallest unit that can be skipped: one move
//! (reported through its game or chapter), one chapter, or one game.

use chess_core::PgnError;
use thiserror::Error;

use crate::chapter::{ChapterRef, MoveIntent};

/// A move text that cannot be resolved against the position it is played in.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot resolve move '{text}' in position {fen}: {reason}")]
pub struct MalformedMoveError {
    pub text: String,
    pub fen: String,
    pub reason: String,
}

/// Two chapters annotate the same move in the same position with opposite intent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "chapter '{chapter}' marks {san} as {intent} in {fen}, \
     but chapter '{conflicting_chapter}' marks it as {conflicting_intent}"
)]
pub struct ConflictingRepertoireError {
    pub chapter: ChapterRef,
    pub conflicting_chapter: ChapterRef,
    pub fen: String,
    pub san: String,
    pub intent: MoveIntent,
    pub conflicting_intent: MoveIntent,
}

/// Why a chapter was left out of its book.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChapterError {
    #[error("chapter '{chapter}': {source}")]
    Malformed {
        chapter: ChapterRef,
        #[source]
        source: MalformedMoveError,
    },

    #[error(transparent)]
    Conflict(#[from] ConflictingRepertoireError),

    #[error("chapter '{0}' starts from a non-standard position")]
    NonStandardStart(ChapterRef),
}

impl ChapterError {
    pub fn chapter(&self) -> &ChapterRef {
        match self {
            ChapterError::Malformed { chapter, .. } => chapter,
            ChapterError::Conflict(conflict) => &conflict.chapter,
            ChapterError::NonStandardStart(chapter) => chapter,
        }
    }
}

/// Why a single game could not be analyzed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("game {game_id}: {source}")]
    Malformed {
        game_id: String,
        #[source]
        source: MalformedMoveError,
    },

    #[error("game {game_id}: {username} played neither side")]
    NotAParticipant { game_id: String, username: String },

    #[error("game {game_id}: {source}")]
    Unreadable {
        game_id: String,
        #[source]
        source: PgnError,
    },
}

impl GameError {
    pub fn game_id(&self) -> &str {
        match self {
            GameError::Malformed { game_id, .. }
            | GameError::NotAParticipant { game_id, .. }
            | GameError::Unreadable { game_id, .. } => game_id,
        }
    }
}

#[derive(Error, Debug)]
pub enum RepertoireError {
    #[error("PGN read error: {0}")]
    Io(#[from] std::io::Error),
}
