//! Reading studies and game archives from disk.

use std::fs;
use std::path::{Path, PathBuf};

use chess_core::{parse_pgn, split_games, GameData, TimeClass};
use repertoire::{read_chapters, AnnotatedLine, ChapterError, GameError};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::WorkerError;

/// Chapters from every study file, plus the ones rejected while reading.
#[derive(Debug, Default)]
pub struct LoadedStudies {
    pub chapters: Vec<AnnotatedLine>,
    pub rejected: Vec<ChapterError>,
}

/// Expand a glob into a sorted file list.
pub fn expand(pattern: &str) -> Result<Vec<PathBuf>, WorkerError> {
    let mut paths: Vec<PathBuf> = glob::glob(pattern)?.filter_map(|p| p.ok()).collect();
    paths.sort();
    Ok(paths)
}

/// Read every study matched by `pattern`, in path order.
pub fn load_studies(pattern: &str) -> Result<LoadedStudies, WorkerError> {
    let mut loaded = LoadedStudies::default();
    for path in expand(pattern)? {
        let text = fs::read_to_string(&path).map_err(|e| WorkerError::io(path.display(), e))?;
        let chapters = read_chapters(&text, None)?;
        info!(path = %path.display(), chapters = chapters.len(), "Read study");
        for chapter in chapters {
            match chapter {
                Ok(line) => loaded.chapters.push(line),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping chapter");
                    loaded.rejected.push(e);
                }
            }
        }
    }
    Ok(loaded)
}

/// Read every game file matched by `pattern`. Unparseable games are kept as
/// per-game errors so they still count toward the totals.
pub fn load_games(pattern: &str) -> Result<Vec<Result<GameData, GameError>>, WorkerError> {
    let mut games = Vec::new();
    for path in expand(pattern)? {
        let text = fs::read_to_string(&path).map_err(|e| WorkerError::io(path.display(), e))?;
        let before = games.len();
        if is_json(&path) {
            games.extend(parse_archive(&text, &path)?);
        } else {
            games.extend(parse_pgn_file(&text, &path));
        }
        info!(path = %path.display(), games = games.len() - before, "Read games");
    }
    Ok(games)
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Every game of a multi-game PGN file.
pub fn parse_pgn_file(text: &str, path: &Path) -> Vec<Result<GameData, GameError>> {
    split_games(text)
        .into_iter()
        .enumerate()
        .map(|(i, pgn)| {
            parse_pgn(&pgn).map_err(|source| GameError::Unreadable {
                game_id: format!("{}#{}", path.display(), i + 1),
                source,
            })
        })
        .collect()
}

/// A Chess.com monthly archive: `{"games": [{"url", "pgn", "rated", "time_class", "rules"}, ...]}`.
pub fn parse_archive(text: &str, path: &Path) -> Result<Vec<Result<GameData, GameError>>, WorkerError> {
    let data: Value = serde_json::from_str(text)?;
    let entries = data["games"].as_array().cloned().unwrap_or_default();
    let mut games = Vec::with_capacity(entries.len());

    for (i, game) in entries.iter().enumerate() {
        // Skip variant games
        let rules = game.get("rules").and_then(|v| v.as_str()).unwrap_or("chess");
        if rules != "chess" {
            continue;
        }

        let url = game.get("url").and_then(|v| v.as_str());
        let Some(pgn) = game.get("pgn").and_then(|v| v.as_str()) else {
            continue;
        };

        let parsed = parse_pgn(pgn).map(|mut data| {
            if data.metadata.link.is_none() {
                data.metadata.link = url.map(str::to_string);
            }
            data.rated = game.get("rated").and_then(|v| v.as_bool());
            data.time_class = game
                .get("time_class")
                .and_then(|v| v.as_str())
                .and_then(TimeClass::parse);
            data
        });

        games.push(parsed.map_err(|source| GameError::Unreadable {
            game_id: url
                .map(str::to_string)
                .unwrap_or_else(|| format!("{}#{}", path.display(), i + 1)),
            source,
        }));
    }
    Ok(games)
}
