//! JSON run report.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use repertoire::{BatchReport, Book, ChapterError, Side};
use serde::Serialize;

use crate::error::WorkerError;

#[derive(Debug, Serialize)]
pub struct BookSummary {
    pub opening_name: String,
    pub side: Option<Side>,
    pub chapters: usize,
    pub lines: usize,
}

impl From<&Book> for BookSummary {
    fn from(book: &Book) -> Self {
        Self {
            opening_name: book.opening_name().to_string(),
            side: book.side(),
            chapters: book.chapters().len(),
            lines: book.variation_count_at(book.root()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RejectedChapter {
    pub chapter: String,
    pub error: String,
}

impl From<&ChapterError> for RejectedChapter {
    fn from(error: &ChapterError) -> Self {
        Self {
            chapter: error.chapter().to_string(),
            error: error.to_string(),
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub books: Vec<BookSummary>,
    pub rejected_chapters: Vec<RejectedChapter>,
    /// Games removed by the pre-filters before analysis.
    pub filtered_out: usize,
    #[serde(flatten)]
    pub report: BatchReport,
}

/// Write `output` as pretty JSON to `path`, or stdout for `-`.
pub fn write_output(path: &str, output: &RunOutput) -> Result<(), WorkerError> {
    if path == "-" {
        let stdout = io::stdout();
        let mut writer = BufWriter::new(stdout.lock());
        serde_json::to_writer_pretty(&mut writer, output)?;
        writeln!(writer).map_err(|e| WorkerError::io(path, e))?;
        return Ok(());
    }

    let path_ref = Path::new(path);
    if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| WorkerError::io(parent.display(), e))?;
    }
    let file = File::create(path_ref).map_err(|e| WorkerError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, output)?;
    writer.flush().map_err(|e| WorkerError::io(path, e))?;
    Ok(())
}
