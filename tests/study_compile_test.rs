//! Study export to book: variations, transpositions and rejected chapters.

mod common;

use common::{chapters, USERNAME};
use repertoire::{
    compile, compile_repertoire, normalize, read_chapters, BatchOptions, CancelFlag, ChapterError, FindingKind, Side,
    WalkOptions,
};
use shakmaty::Chess;

const ITALIAN: &str = r#"[Event "Italian: Giuoco Piano"]
[Orientation "white"]

1. e4 e5 2. Nf3 Nc6 3. Bc4 Bc5 (3... Nf6 4. d3) 4. c3 *

[Event "Italian: Two Knights"]
[Orientation "white"]

1. e4 e5 2. Bc4 Nf6 3. Nf3 Nc6 4. d3 *
"#;

#[test]
fn test_variations_become_lines() {
    let compilation = compile_repertoire(&chapters(ITALIAN));
    assert!(compilation.rejected.is_empty());
    let book = &compilation.books[0];

    assert_eq!(book.opening_name(), "Italian");
    assert_eq!(book.side(), Some(Side::White));
    assert_eq!(book.chapters().len(), 2);
    // Giuoco mainline, the 3...Nf6 sideline, and the Bc4-first order.
    assert_eq!(book.variation_count_at(book.root()), 3);

    let e4 = normalize("e4", &Chess::default()).unwrap();
    let after_e4 = book.child(book.root(), &e4).unwrap();
    assert_eq!(book.variation_count_at(after_e4), 3);
}

const QGD: &str = r#"[Event "QGD: Nimzo order"]
[Orientation "white"]

1. d4 Nf6 2. c4 e6 3. Nc3 Bb4 *

[Event "QGD: English order"]
[Orientation "white"]

1. c4 e6 2. Nc3 Nf6 3. d4 d5 4. cxd5 *
"#;

#[test]
fn test_transposition_rejoins_book() {
    let books = vec![compile("QGD", &chapters(QGD)).book];
    let records: Vec<_> = deviation_worker::input::parse_pgn_file(
        &common::game_pgn(20, "white", "1. d4 Nf6 2. c4 e6 3. Nc3 d5 4. Bg5"),
        std::path::Path::new("t.pgn"),
    )
    .into_iter()
    .map(|g| g.unwrap())
    .collect();

    let strict = repertoire::analyze_records(&records, USERNAME, &books, &BatchOptions::default(), &CancelFlag::new());
    let finding = &strict.findings[0];
    assert_eq!(finding.kind(), FindingKind::OpponentLeftBook);
    assert_eq!(finding.ply, 6);
    assert_eq!(finding.expected_moves()[0].san, "Bb4");
    assert!(!finding.transposed);

    // 3...d5 reaches the English-order position after 3...d5.
    let options = BatchOptions {
        walk: WalkOptions {
            follow_transpositions: true,
        },
        ..Default::default()
    };
    let relaxed = repertoire::analyze_records(&records, USERNAME, &books, &options, &CancelFlag::new());
    let finding = &relaxed.findings[0];
    assert!(finding.transposed);
    assert_eq!(finding.kind(), FindingKind::UserDeviation);
    assert_eq!(finding.ply, 7);
    assert_eq!(finding.divergent_move().unwrap().san, "Bg5");
    assert_eq!(finding.expected_moves()[0].san, "cxd5");
    assert_eq!(finding.matched_chapter.as_ref().map(|c| c.as_str()), Some("QGD: English order"));
}

#[test]
fn test_conflicting_chapter_is_rejected_whole() {
    let pgn = r#"[Event "London: Main"]

1. d4 d5 2. Bf4 $1 Nf6 3. e3 *

[Event "London: Early Nf3"]

1. d4 d5 2. Bf4 $2 c5 3. c3 *

[Event "London: Kings Indian setup"]

1. d4 Nf6 2. Bf4 g6 3. e3 *
"#;
    let compilation = compile_repertoire(&chapters(pgn));
    assert_eq!(compilation.books.len(), 1);
    assert_eq!(compilation.rejected.len(), 1);
    match &compilation.rejected[0] {
        ChapterError::Conflict(conflict) => {
            assert_eq!(conflict.chapter.as_str(), "London: Early Nf3");
            assert_eq!(conflict.conflicting_chapter.as_str(), "London: Main");
            assert_eq!(conflict.san, "Bf4");
        }
        other => panic!("expected a conflict, got {other:?}"),
    }

    let book = &compilation.books[0];
    assert_eq!(book.chapters().len(), 2);
    // The rejected chapter's ...c5 line never made it in.
    assert_eq!(book.variation_count_at(book.root()), 2);
}

#[test]
fn test_malformed_chapter_keeps_the_rest() {
    let pgn = r#"[Event "Scandi: Main"]
[Orientation "black"]

1. e4 d5 2. exd5 Qxd5 *

[Event "Scandi: Broken"]
[Orientation "black"]

1. e4 d5 2. Nf3 Qxd5 *
"#;
    let lines = chapters(pgn);
    assert_eq!(lines.len(), 2);
    let compilation = compile_repertoire(&lines);
    assert_eq!(compilation.rejected.len(), 1);
    assert!(matches!(
        &compilation.rejected[0],
        ChapterError::Malformed { chapter, .. } if chapter.as_str() == "Scandi: Broken"
    ));
    assert_eq!(compilation.books[0].chapters().len(), 1);
}

#[test]
fn test_studies_group_by_opening_name() {
    let pgn = r#"[Event "Sicilian: Najdorf"]
[Orientation "black"]

1. e4 c5 2. Nf3 d6 *

[Event "London: Main"]
[Orientation "white"]

1. d4 d5 2. Bf4 *

[Event "sicilian: Dragon"]
[Orientation "black"]

1. e4 c5 2. Nf3 d6 3. d4 cxd4 4. Nxd4 Nf6 5. Nc3 g6 *
"#;
    let compilation = compile_repertoire(&read_chapters(pgn, None).unwrap().into_iter().map(|c| c.unwrap()).collect::<Vec<_>>());
    let names: Vec<&str> = compilation.books.iter().map(|b| b.opening_name()).collect();
    assert_eq!(names, vec!["Sicilian", "London"]);
    assert_eq!(compilation.books[0].chapters().len(), 2);
}
