use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameMetadata {
    pub white: String,
    pub black: String,
    pub result: String, // "1-0", "0-1", "1/2-1/2"
    pub date: Option<String>,
    pub time_control: Option<String>,
    pub eco: Option<String>,
    pub eco_url: Option<String>,
    pub opening: Option<String>,
    pub event: Option<String>,
    pub site: Option<String>,
    pub link: Option<String>,
}

impl GameMetadata {
    /// Game URL: Chess.com puts it in `Link`, Lichess in `Site`.
    pub fn url(&self) -> Option<&str> {
        self.link
            .as_deref()
            .or(self.site.as_deref())
            .filter(|s| s.starts_with("http"))
    }

    /// Trailing path segment of the game URL.
    pub fn game_id(&self) -> Option<String> {
        let url = self.url()?;
        let id = url
            .split(['?', '#'])
            .next()?
            .trim_end_matches('/')
            .rsplit('/')
            .next()?;
        if id.is_empty() { None } else { Some(id.to_string()) }
    }

    /// Opening name as reported by the game source.
    ///
    /// Prefers the `Opening` tag (Lichess), then the slug of Chess.com's
    /// `ECOUrl`, e.g. `.../openings/Sicilian-Defense-Old-Sicilian-Variation`
    /// becomes `Sicilian Defense Old Sicilian Variation`.
    pub fn reported_opening(&self) -> Option<String> {
        if let Some(opening) = self.opening.as_deref().filter(|o| !o.is_empty() && *o != "?") {
            return Some(opening.to_string());
        }
        let slug = self.eco_url.as_deref()?.trim_end_matches('/').rsplit('/').next()?;
        let name = slug
            .split('-')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if name.is_empty() { None } else { Some(name) }
    }

    /// `Date` tag as a calendar date. PGN uses `YYYY.MM.DD` with `??` for unknowns.
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        let date = self.date.as_deref()?;
        NaiveDate::parse_from_str(date, "%Y.%m.%d")
            .or_else(|_| NaiveDate::parse_from_str(date, "%Y-%m-%d"))
            .ok()
    }

    /// Lichess encodes the rated flag in the event name ("Rated Blitz game").
    pub fn rated_from_event(&self) -> Option<bool> {
        let event = self.event.as_deref()?.to_lowercase();
        if event.starts_with("rated") {
            Some(true)
        } else if event.starts_with("casual") {
            Some(false)
        } else {
            None
        }
    }
}

/// Speed category of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeClass {
    Bullet,
    Blitz,
    Rapid,
    Daily,
}

impl TimeClass {
    /// Classify a PGN `TimeControl` value such as `180`, `300+2` or `1/86400`.
    ///
    /// Uses the estimated duration `base + 40 * increment`.
    pub fn from_time_control(time_control: &str) -> Option<Self> {
        let tc = time_control.trim();
        if tc.contains('/') {
            return Some(TimeClass::Daily);
        }
        let mut parts = tc.split('+');
        let base: f64 = parts.next()?.parse().ok()?;
        let increment: f64 = parts.next().and_then(|i| i.parse().ok()).unwrap_or(0.0);
        let estimate = base + 40.0 * increment;
        Some(if estimate < 180.0 {
            TimeClass::Bullet
        } else if estimate < 600.0 {
            TimeClass::Blitz
        } else {
            TimeClass::Rapid
        })
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "bullet" => Some(TimeClass::Bullet),
            "blitz" => Some(TimeClass::Blitz),
            "rapid" | "classical" => Some(TimeClass::Rapid),
            "daily" | "correspondence" => Some(TimeClass::Daily),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameData {
    pub metadata: GameMetadata,
    pub moves: Vec<String>, // SAN notation
    pub pgn: String,
    /// Supplied by the game source when known (Chess.com archives carry it).
    pub rated: Option<bool>,
    pub time_class: Option<TimeClass>,
}

impl GameData {
    pub fn rated(&self) -> Option<bool> {
        self.rated.or_else(|| self.metadata.rated_from_event())
    }

    pub fn time_class(&self) -> Option<TimeClass> {
        self.time_class.or_else(|| {
            self.metadata
                .time_control
                .as_deref()
                .and_then(TimeClass::from_time_control)
        })
    }
}
