// src/parse/mod.rs
pub mod lines;
pub mod split;
pub mod value;

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};
use thiserror::Error;
use tracing::{debug, info};

pub use lines::LogicalLines;
pub use split::split_csv_line;
pub use value::{parse_value, Record, Value};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("reading CSV input: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV ended with unterminated quoted field (opened on line {line})")]
    UnterminatedQuote { line: usize },
}

/// Turns logical lines into generic records.
///
/// The first logical line is the header row; every header is trimmed and read
/// as a dotted path. Each following line is zipped against the headers by
/// position: extra fields are dropped, missing ones count as empty text.
pub struct CsvRecords<R> {
    lines: LogicalLines<R>,
    headers: Option<Vec<String>>,
}

impl<R: BufRead> CsvRecords<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: LogicalLines::new(reader),
            headers: None,
        }
    }

    /// Header paths, once the header row has been read.
    pub fn headers(&self) -> Option<&[String]> {
        self.headers.as_deref()
    }

    fn materialize(headers: &[String], line: &str) -> Record {
        let values = split_csv_line(line);
        let mut rec = Record::new();
        for (i, header) in headers.iter().enumerate() {
            let raw = values.get(i).map(String::as_str).unwrap_or("");
            rec.set_path(header, parse_value(raw));
        }
        rec
    }
}

impl<R: BufRead> Iterator for CsvRecords<R> {
    type Item = Result<Record, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(l) => l,
                Err(e) => return Some(Err(e)),
            };

            if let Some(headers) = &self.headers {
                return Some(Ok(Self::materialize(headers, &line)));
            }

            // spreadsheet exports often lead with a UTF-8 byte order mark
            let line = line.strip_prefix('\u{feff}').unwrap_or(&line);
            let headers: Vec<String> = split_csv_line(line)
                .into_iter()
                .map(|h| h.trim().to_string())
                .collect();
            debug!(columns = headers.len(), "read CSV header");
            self.headers = Some(headers);
        }
    }
}

/// Parse the whole file at `path` into generic records.
#[tracing::instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn parse_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Record>, ParseError> {
    let file = File::open(&path)?;
    let rows = CsvRecords::new(BufReader::new(file)).collect::<Result<Vec<_>, _>>()?;
    info!(rows = rows.len(), "parsed CSV rows");
    Ok(rows)
}
