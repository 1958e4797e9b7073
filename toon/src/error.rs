//! Structured errors: `(kind, message, line, column)`, per `spec.md` §7.

use std::fmt;

use ariadne::{Label, Report, ReportKind, Source};

/// Result alias used across the crate's public API.
pub type Result<T> = std::result::Result<T, Error>;

/// The broad category a decode-time failure falls into.
///
/// Matches the four families named in `spec.md` §7: lexical, indentation,
/// structural, and resource errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unterminated string, invalid escape, invalid number shape, illegal character.
    Lexical,
    /// Non-multiple-of-indent-size spaces, tab in indentation, unseen dedent level.
    Indentation,
    /// Missing colon/header parts, length or width mismatch, misplaced delimiter.
    Structural,
    /// Nesting depth or number length limit exceeded.
    Resource,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Lexical => "lexical",
            ErrorKind::Indentation => "indentation",
            ErrorKind::Structural => "structural",
            ErrorKind::Resource => "resource",
        };
        f.write_str(name)
    }
}

/// A single codec error, always carrying a 1-based line and 0-based column.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("{kind} error at line {line}, column {column}: {message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>, line: u32, column: u32) -> Self {
        Error {
            kind,
            message: message.into(),
            line,
            column,
        }
    }

    pub fn lexical(message: impl Into<String>, line: u32, column: u32) -> Self {
        Error::new(ErrorKind::Lexical, message, line, column)
    }

    pub fn indentation(message: impl Into<String>, line: u32, column: u32) -> Self {
        Error::new(ErrorKind::Indentation, message, line, column)
    }

    pub fn structural(message: impl Into<String>, line: u32, column: u32) -> Self {
        Error::new(ErrorKind::Structural, message, line, column)
    }

    pub fn resource(message: impl Into<String>, line: u32, column: u32) -> Self {
        Error::new(ErrorKind::Resource, message, line, column)
    }

    /// Render a source-annotated diagnostic for this error using `ariadne`.
    ///
    /// This is a presentation layer only: `self` remains the source of
    /// truth for `(kind, message, line, column)`.
    pub fn report(&self, source_name: &str, source: &str) -> String {
        let offset = line_col_to_offset(source, self.line, self.column);
        let mut buf = Vec::new();
        let build = Report::build(ReportKind::Error, source_name, offset)
            .with_message(&self.message)
            .with_label(
                Label::new((source_name, offset..(offset + 1).min(source.len())))
                    .with_message(format!("{} error", self.kind)),
            )
            .finish();
        // `ariadne` writes UTF-8; this only fails on an I/O error, which an
        // in-memory `Vec<u8>` never produces.
        build
            .write((source_name, Source::from(source)), &mut buf)
            .expect("writing to an in-memory buffer cannot fail");
        String::from_utf8_lossy(&buf).into_owned()
    }
}

fn line_col_to_offset(source: &str, line: u32, column: u32) -> usize {
    let mut offset = 0;
    for (idx, text) in source.split('\n').enumerate() {
        if idx as u32 + 1 == line {
            return offset + (column as usize).min(text.len());
        }
        offset += text.len() + 1;
    }
    source.len()
}
