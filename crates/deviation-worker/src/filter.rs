//! Selection pre-filters, applied before games reach the engine.

use chess_core::{GameData, TimeClass};
use chrono::NaiveDate;
use repertoire::Side;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GameFilter {
    /// Empty means every time class.
    pub time_classes: Vec<TimeClass>,
    pub rated_only: bool,
    pub color: Option<Side>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

impl GameFilter {
    pub fn is_empty(&self) -> bool {
        *self == GameFilter::default()
    }

    /// Whether `game` passes every configured filter. A game missing the
    /// data a filter needs (no date, unknown time class) does not pass it.
    pub fn accepts(&self, game: &GameData, username: &str) -> bool {
        if !self.time_classes.is_empty() {
            match game.time_class() {
                Some(tc) if self.time_classes.contains(&tc) => {}
                _ => return false,
            }
        }

        if self.rated_only && game.rated() != Some(true) {
            return false;
        }

        if let Some(color) = self.color {
            let name = match color {
                Side::White => &game.metadata.white,
                Side::Black => &game.metadata.black,
            };
            if !name.eq_ignore_ascii_case(username) {
                return false;
            }
        }

        if self.from_date.is_some() || self.to_date.is_some() {
            let Some(date) = game.metadata.parsed_date() else {
                return false;
            };
            if self.from_date.is_some_and(|from| date < from) || self.to_date.is_some_and(|to| date > to) {
                return false;
            }
        }

        true
    }
}

/// Parse a comma-separated list of time classes.
pub fn parse_time_classes(list: &str) -> Option<Vec<TimeClass>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(TimeClass::parse)
        .collect()
}

/// `YYYY-MM-DD` or PGN-style `YYYY.MM.DD`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y.%m.%d"))
        .ok()
}
