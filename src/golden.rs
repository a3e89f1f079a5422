//! Golden-file comparison.
//!
//! A case's golden file holds the program's expected stdout followed by one
//! final line with its expected exit code. The runner appends the observed
//! exit code to the captured stdout with [`append_exit_code`] and then checks
//! both at once with [`compare_files`].

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

/// Result of comparing captured output against a golden file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    Match,
    Mismatch(Mismatch),
}

/// The normalized texts of a failed comparison, kept so a reporter can
/// render a diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub expected: String,
    pub actual: String,
}

impl Comparison {
    #[cfg(test)]
    pub(crate) fn is_match(&self) -> bool {
        matches!(self, Comparison::Match)
    }
}

/// Appends `code` as its own line to the file at `path`, first terminating a
/// non-empty unterminated last line.
pub fn append_exit_code(path: &Path, code: i32) -> io::Result<()> {
    let content = fs::read(path)?;
    let mut file = OpenOptions::new().append(true).open(path)?;
    if content.last().is_some_and(|&b| b != b'\n') {
        file.write_all(b"\n")?;
    }
    writeln!(file, "{code}")
}

/// Compares two files line by line, ignoring trailing blanks and carriage
/// returns at the end of each line.
pub fn compare_files(actual: &Path, expected: &Path) -> io::Result<Comparison> {
    let actual = fs::read(actual)?;
    let expected = fs::read(expected)?;
    Ok(compare_bytes(&actual, &expected))
}

/// Compares raw output bytes. Lines are compared as bytes; text is only
/// decoded (lossily) to build the [`Mismatch`] shown to the user.
pub fn compare_bytes(actual: &[u8], expected: &[u8]) -> Comparison {
    let actual = normalize(actual);
    let expected = normalize(expected);
    if actual == expected {
        Comparison::Match
    } else {
        Comparison::Mismatch(Mismatch {
            expected: render(&expected),
            actual: render(&actual),
        })
    }
}

/// Splits into lines with trailing spaces, tabs and CRs removed. A missing
/// final newline is not a difference; an extra empty line is.
fn normalize(bytes: &[u8]) -> Vec<&[u8]> {
    if bytes.is_empty() {
        return Vec::new();
    }
    let body = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    body.split(|&b| b == b'\n').map(trim_blank_end).collect()
}

fn trim_blank_end(mut line: &[u8]) -> &[u8] {
    while let [rest @ .., b' ' | b'\t' | b'\r'] = line {
        line = rest;
    }
    line
}

fn render(lines: &[&[u8]]) -> String {
    lines
        .iter()
        .map(|line| String::from_utf8_lossy(line))
        .collect::<Vec<_>>()
        .join("\n")
}
