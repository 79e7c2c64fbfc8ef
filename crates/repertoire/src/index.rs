//! Opening index: which book, if any, a played game should be walked against.
//!
//! Two policies, tried in order:
//! 1. name: the game's reported opening against each book's name;
//! 2. prefix: the longest run of the game's opening moves found in a book.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::book::Book;
use crate::chapter::ChapterRef;
use crate::game::PlayedGame;
use crate::names::{exact_match, fuzzy_match};

/// How the name policy compares opening names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameMatching {
    #[default]
    Exact,
    /// Exact first, then the concept match.
    Fuzzy,
    /// Skip the name policy entirely.
    Disabled,
}

impl NameMatching {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "exact" => Some(NameMatching::Exact),
            "fuzzy" => Some(NameMatching::Fuzzy),
            "off" | "none" | "disabled" => Some(NameMatching::Disabled),
            _ => None,
        }
    }
}

/// Which policy produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    Name,
    Prefix,
}

#[derive(Debug, Clone, Copy)]
pub struct BookMatch<'a> {
    pub book: &'a Book,
    pub book_index: usize,
    /// Earliest-declared chapter behind the deepest node of the game's prefix.
    pub chapter: Option<&'a ChapterRef>,
    pub policy: MatchPolicy,
    pub prefix_len: usize,
}

/// Books whose declared side (if any) is the user's color in this game.
fn candidates<'a>(game: &'a PlayedGame, books: &'a [Book]) -> impl Iterator<Item = (usize, &'a Book)> + 'a {
    books
        .iter()
        .enumerate()
        .filter(move |(_, book)| book.side().map_or(true, |side| side == game.user_color))
}

/// Unique book whose name matches the game's reported opening.
pub fn match_by_name(game: &PlayedGame, books: &[Book], matching: NameMatching) -> Option<usize> {
    let reported = game.reported_opening.as_deref()?;

    let unique = |hits: Vec<usize>| if hits.len() == 1 { Some(hits[0]) } else { None };

    match matching {
        NameMatching::Disabled => None,
        NameMatching::Exact => unique(
            candidates(game, books)
                .filter(|(_, book)| exact_match(book.opening_name(), reported))
                .map(|(i, _)| i)
                .collect(),
        ),
        NameMatching::Fuzzy => match_by_name(game, books, NameMatching::Exact).or_else(|| {
            unique(
                candidates(game, books)
                    .filter(|(_, book)| fuzzy_match(book.opening_name(), reported))
                    .map(|(i, _)| i)
                    .collect(),
            )
        }),
    }
}

/// Book sharing the longest opening-move prefix with the game, with its
/// prefix length. Ties go to the earlier-declared book; zero is no match.
pub fn match_by_prefix(game: &PlayedGame, books: &[Book]) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    for (i, book) in candidates(game, books) {
        let (_, depth) = book.follow(game.moves.iter().map(|m| &m.key));
        if depth > best.map_or(0, |(_, d)| d) {
            best = Some((i, depth));
        }
    }
    best
}

/// Match a game to a book. `None` is a normal outcome, not an error.
pub fn find_book<'a>(game: &PlayedGame, books: &'a [Book], matching: NameMatching) -> Option<BookMatch<'a>> {
    let (book_index, policy) = match match_by_name(game, books, matching) {
        Some(i) => (i, MatchPolicy::Name),
        None => (match_by_prefix(game, books)?.0, MatchPolicy::Prefix),
    };

    let book = &books[book_index];
    let (node, prefix_len) = book.follow(game.moves.iter().map(|m| &m.key));
    debug!(
        game_id = %game.id,
        opening = book.opening_name(),
        policy = ?policy,
        prefix_len,
        "Matched book"
    );

    Some(BookMatch {
        book,
        book_index,
        chapter: book.best_chapter(node),
        policy,
        prefix_len,
    })
}
