//! Repertoire chapters read from study PGN exports.
//!
//! A study export holds one PGN game per chapter. Unlike played games, the
//! variations (RAVs) and move annotations are the point, so they are kept:
//! every RAV becomes an alternative to the move it follows.

use std::fmt;
use std::ops::ControlFlow;

use pgn_reader::{Nag, RawTag, Reader, SanPlus, Skip, Visitor};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ChapterError, RepertoireError};
use crate::normalize::normalize_fen;
use crate::side::Side;

const STANDARD_START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -";

/// What the repertoire author says about a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveIntent {
    Recommended,
    Dubious,
}

impl MoveIntent {
    /// `!` and `!!` recommend; `?`, `??` and `?!` mark a move dubious.
    /// `!?` and every other NAG say nothing about intent.
    pub fn from_nag(nag: u8) -> Option<Self> {
        match nag {
            1 | 3 => Some(MoveIntent::Recommended),
            2 | 4 | 6 => Some(MoveIntent::Dubious),
            _ => None,
        }
    }
}

impl fmt::Display for MoveIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveIntent::Recommended => f.write_str("recommended"),
            MoveIntent::Dubious => f.write_str("dubious"),
        }
    }
}

/// Chapter label, "Study: Chapter" style.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChapterRef(pub String);

impl ChapterRef {
    pub fn new(label: impl Into<String>) -> Self {
        ChapterRef(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChapterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One recorded move plus the alternatives given for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedMove {
    /// Raw move text, resolved later against the position it is played in.
    pub text: String,
    pub intent: Option<MoveIntent>,
    /// Lines playable instead of this move, each starting from the same position.
    pub variations: Vec<Vec<AnnotatedMove>>,
}

impl AnnotatedMove {
    pub fn new(text: impl Into<String>) -> Self {
        AnnotatedMove {
            text: text.into(),
            intent: None,
            variations: Vec::new(),
        }
    }

    pub fn with_intent(mut self, intent: MoveIntent) -> Self {
        self.intent = Some(intent);
        self
    }

    pub fn with_variation(mut self, line: Vec<AnnotatedMove>) -> Self {
        self.variations.push(line);
        self
    }
}

/// A chapter: a mainline from the standard start, with optional RAVs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedLine {
    pub chapter: ChapterRef,
    pub opening_name: String,
    /// Board orientation of the chapter, when the export records it.
    pub side: Option<Side>,
    pub moves: Vec<AnnotatedMove>,
}

impl AnnotatedLine {
    /// Plain mainline without annotations.
    pub fn from_moves<S: AsRef<str>>(opening_name: &str, chapter: &str, moves: &[S]) -> Self {
        AnnotatedLine {
            chapter: ChapterRef::new(chapter),
            opening_name: opening_name.to_string(),
            side: None,
            moves: moves.iter().map(|m| AnnotatedMove::new(m.as_ref())).collect(),
        }
    }

    pub fn with_side(mut self, side: Side) -> Self {
        self.side = Some(side);
        self
    }
}

/// Read every chapter of a study export.
///
/// `opening_name` names the book the chapters belong to; without it the
/// study name from the tags is used. Each chapter is returned on its own so
/// a rejected chapter does not hide the others.
pub fn read_chapters(
    pgn: &str,
    opening_name: Option<&str>,
) -> Result<Vec<Result<AnnotatedLine, ChapterError>>, RepertoireError> {
    let mut reader = Reader::new(pgn.as_bytes());
    let mut visitor = StudyReader {
        opening_name: opening_name.map(str::to_string),
        chapters_seen: 0,
    };

    let mut chapters = Vec::new();
    while let Some(chapter) = reader.read_game(&mut visitor)? {
        chapters.push(chapter);
    }
    Ok(chapters)
}

/// Tags collected during header parsing.
#[derive(Default)]
struct ChapterTags {
    event: Option<String>,
    study_name: Option<String>,
    chapter_name: Option<String>,
    orientation: Option<String>,
    fen: Option<String>,
}

impl ChapterTags {
    /// Study name and chapter label.
    ///
    /// Lichess writes `StudyName`/`ChapterName` and an `Event` of the form
    /// "Study: Chapter"; either is enough.
    fn labels(&self, ordinal: usize) -> (Option<String>, String) {
        let event = self.event.as_deref().filter(|e| !e.is_empty() && *e != "?");
        let (event_study, event_chapter) = match event.and_then(|e| e.split_once(": ")) {
            Some((study, chapter)) => (Some(study.trim().to_string()), Some(chapter.trim().to_string())),
            None => (event.map(str::to_string), None),
        };

        let study = self.study_name.clone().or(event_study);
        let chapter = self
            .chapter_name
            .clone()
            .or(event_chapter)
            .unwrap_or_else(|| format!("Chapter {ordinal}"));

        let label = match &study {
            Some(study) => format!("{study}: {chapter}"),
            None => chapter,
        };
        (study, label)
    }
}

/// State during movetext parsing: a stack of lines, innermost variation last.
struct ChapterState {
    chapter: ChapterRef,
    opening_name: String,
    side: Option<Side>,
    lines: Vec<Vec<AnnotatedMove>>,
}

impl ChapterState {
    fn current(&mut self) -> &mut Vec<AnnotatedMove> {
        if self.lines.is_empty() {
            self.lines.push(Vec::new());
        }
        let last = self.lines.len() - 1;
        &mut self.lines[last]
    }
}

struct StudyReader {
    opening_name: Option<String>,
    chapters_seen: usize,
}

impl Visitor for StudyReader {
    type Tags = ChapterTags;
    type Movetext = ChapterState;
    type Output = Result<AnnotatedLine, ChapterError>;

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, ChapterTags> {
        self.chapters_seen += 1;
        ControlFlow::Continue(ChapterTags::default())
    }

    fn tag(&mut self, tags: &mut ChapterTags, name: &[u8], value: RawTag<'_>) -> ControlFlow<Self::Output> {
        let value = value.decode_utf8_lossy().trim().to_string();
        match name {
            b"Event" => tags.event = Some(value),
            b"StudyName" => tags.study_name = Some(value),
            b"ChapterName" => tags.chapter_name = Some(value),
            b"Orientation" => tags.orientation = Some(value),
            b"FEN" => tags.fen = Some(value),
            _ => {}
        }
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, tags: ChapterTags) -> ControlFlow<Self::Output, ChapterState> {
        let (study, label) = tags.labels(self.chapters_seen);
        let chapter = ChapterRef(label);

        if let Some(fen) = tags.fen.as_deref() {
            if normalize_fen(fen) != STANDARD_START {
                return ControlFlow::Break(Err(ChapterError::NonStandardStart(chapter)));
            }
        }

        let opening_name = self
            .opening_name
            .clone()
            .or(study)
            .unwrap_or_else(|| chapter.0.clone());

        ControlFlow::Continue(ChapterState {
            chapter,
            opening_name,
            side: tags.orientation.as_deref().and_then(Side::parse),
            lines: vec![Vec::new()],
        })
    }

    fn san(&mut self, state: &mut ChapterState, san_plus: SanPlus) -> ControlFlow<Self::Output> {
        state.current().push(AnnotatedMove::new(san_plus.san.to_string()));
        ControlFlow::Continue(())
    }

    fn nag(&mut self, state: &mut ChapterState, nag: Nag) -> ControlFlow<Self::Output> {
        if let Some(intent) = MoveIntent::from_nag(nag.0) {
            if let Some(last) = state.current().last_mut() {
                last.intent = Some(intent);
            }
        }
        ControlFlow::Continue(())
    }

    fn begin_variation(&mut self, state: &mut ChapterState) -> ControlFlow<Self::Output, Skip> {
        state.lines.push(Vec::new());
        ControlFlow::Continue(Skip(false))
    }

    fn end_variation(&mut self, state: &mut ChapterState) -> ControlFlow<Self::Output> {
        if state.lines.len() > 1 {
            if let Some(variation) = state.lines.pop() {
                if variation.is_empty() {
                    return ControlFlow::Continue(());
                }
                // A RAV replaces the move it follows.
                match state.current().last_mut() {
                    Some(parent) => parent.variations.push(variation),
                    None => warn!(
                        chapter = %state.chapter,
                        first_move = %variation[0].text,
                        "Dropping variation that precedes the first move"
                    ),
                }
            }
        }
        ControlFlow::Continue(())
    }

    fn end_game(&mut self, mut state: ChapterState) -> Self::Output {
        // Unbalanced parentheses: fold any open variations back in.
        while state.lines.len() > 1 {
            let _ = self.end_variation(&mut state);
        }
        Ok(AnnotatedLine {
            chapter: state.chapter,
            opening_name: state.opening_name,
            side: state.side,
            moves: state.lines.pop().unwrap_or_default(),
        })
    }
}
