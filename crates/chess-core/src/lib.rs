//! Played-game records: PGN headers, mainline moves and game metadata.

pub mod game_data;
pub mod pgn;

pub use game_data::{GameData, GameMetadata, TimeClass};
pub use pgn::{parse_pgn, split_games, PgnError};
