//! Repertoire matching engine.
//!
//! Compiles annotated study chapters into one move tree per opening, then
//! walks played games against the matching tree and reports where each game
//! first left the book, and who left it.

pub mod batch;
pub mod book;
pub mod chapter;
pub mod error;
pub mod finding;
pub mod game;
pub mod index;
pub mod names;
pub mod normalize;
pub mod side;
pub mod walker;

pub use batch::{
    analyze, analyze_game, analyze_record, analyze_records, BatchOptions, BatchReport, CancelFlag, FindingCounts,
    GameFailure, GameOutcome,
};
pub use book::{compile, compile_repertoire, Book, BookCompiler, Compilation, MoveTreeNode, NodeId, RepertoireCompilation};
pub use chapter::{read_chapters, AnnotatedLine, AnnotatedMove, ChapterRef, MoveIntent};
pub use error::{ChapterError, ConflictingRepertoireError, GameError, MalformedMoveError, RepertoireError};
pub use finding::{BookMove, Divergence, Finding, FindingKind, MoveText, DEFAULT_LINK_TEMPLATE};
pub use game::{PlayedGame, PlayedMove};
pub use index::{find_book, match_by_name, match_by_prefix, BookMatch, MatchPolicy, NameMatching};
pub use normalize::{normalize, position_key, resolve, CanonicalMove};
pub use side::Side;
pub use walker::{walk, Walk, WalkOptions, WalkResult};
