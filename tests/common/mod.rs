#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use repertoire::{compile_repertoire, read_chapters, AnnotatedLine, Book};

pub const USERNAME: &str = "opening_student";

/// Two-chapter study: 1.e4 e5 2.Nf3 and 1.e4 c5 2.Nf3.
pub const OPEN_GAME_STUDY: &str = r#"[Event "Open Game: e5"]
[StudyName "Open Game"]
[ChapterName "e5"]
[Orientation "white"]

1. e4 e5 2. Nf3 *

[Event "Open Game: c5"]
[StudyName "Open Game"]
[ChapterName "c5"]
[Orientation "white"]

1. e4 c5 2. Nf3 *
"#;

/// Generate a unique suffix based on timestamp to avoid collisions.
pub fn unique_suffix() -> String {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{}", ts % 1_000_000_000)
}

/// Fresh scratch directory under the system temp dir.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("deviation-{}-{}", name, unique_suffix()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// One game as PGN, the test user playing `user_side`.
pub fn game_pgn(id: u32, user_side: &str, movetext: &str) -> String {
    let (white, black) = if user_side == "white" {
        (USERNAME, "rival")
    } else {
        ("rival", USERNAME)
    };
    format!(
        "[Event \"Live Chess\"]\n[White \"{white}\"]\n[Black \"{black}\"]\n[Result \"*\"]\n[UTCDate \"2025.03.0{d}\"]\n[TimeControl \"180\"]\n[Link \"https://www.chess.com/game/live/{id}\"]\n\n{movetext} *\n\n",
        d = id % 9 + 1
    )
}

/// Games A-D: user deviation at ply 3, opponent leaves at ply 2, clean
/// game, and a game no book covers.
pub fn example_games_pgn() -> String {
    [
        game_pgn(1, "white", "1. e4 e5 2. Nc3"),
        game_pgn(2, "white", "1. e4 d5"),
        game_pgn(3, "white", "1. e4 e5 2. Nf3"),
        game_pgn(4, "white", "1. d4 d5"),
    ]
    .concat()
}

pub fn chapters(pgn: &str) -> Vec<AnnotatedLine> {
    read_chapters(pgn, None)
        .unwrap()
        .into_iter()
        .map(|c| c.unwrap())
        .collect()
}

pub fn books(pgn: &str) -> Vec<Book> {
    let compilation = compile_repertoire(&chapters(pgn));
    assert!(compilation.rejected.is_empty(), "{:?}", compilation.rejected);
    compilation.books
}
