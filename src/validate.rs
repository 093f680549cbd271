//! Quick check whether a file plausibly is delimited text in the given dialect.

use tracing::debug;

use crate::error::Result;
use crate::parse::CsvStreamParser;

/// Minimum share of letters and digits among the characters of the first two rows.
pub const VALID_CHARS_MIN_RATIO: f64 = 0.5;

/// Why a file was rejected by [`check_format`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatIssue {
    FileMissing,
    NoHeader,
    NoColumns,
    NoData,
    ColumnCountMismatch,
    TooManyStrangeCharacters,
}

impl FormatIssue {
    pub fn description(&self) -> &'static str {
        match self {
            FormatIssue::FileMissing => "file does not exist",
            FormatIssue::NoHeader => "could not get header",
            FormatIssue::NoColumns => "header had no columns",
            FormatIssue::NoData => "has header but has no data",
            FormatIssue::ColumnCountMismatch => {
                "header column count does not match data column count"
            }
            FormatIssue::TooManyStrangeCharacters => "too many non-alphanumeric characters",
        }
    }
}

/// Inspect the first two rows of the file.
///
/// Returns `Ok(None)` when the file looks valid.
pub fn check_format(parser: &CsvStreamParser) -> Result<Option<FormatIssue>> {
    if !parser.path().is_file() {
        return Ok(Some(FormatIssue::FileMissing));
    }

    let mut rows = parser.open()?;

    let Some(header) = rows.next().transpose()? else {
        return Ok(Some(FormatIssue::NoHeader));
    };
    if header.is_empty() || (header.len() == 1 && header[0].is_empty()) {
        return Ok(Some(FormatIssue::NoColumns));
    }

    let Some(data) = rows.next().transpose()? else {
        return Ok(Some(FormatIssue::NoData));
    };
    if header.len() != data.len() {
        return Ok(Some(FormatIssue::ColumnCountMismatch));
    }

    let (total, valid) = header
        .iter()
        .chain(&data)
        .flat_map(|cell| cell.chars())
        .fold((0usize, 0usize), |(total, valid), c| {
            (total + 1, valid + usize::from(c.is_alphanumeric()))
        });

    if (valid as f64) < VALID_CHARS_MIN_RATIO * total as f64 {
        return Ok(Some(FormatIssue::TooManyStrangeCharacters));
    }

    Ok(None)
}

/// Whether the file looks like valid delimited text. Reasons for rejection
/// and parse errors are logged.
pub fn is_format_valid(parser: &CsvStreamParser) -> bool {
    let path = parser.path().display();
    match check_format(parser) {
        Ok(None) => true,
        Ok(Some(issue)) => {
            debug!("{path} is not a valid CSV file: {}", issue.description());
            false
        }
        Err(e) => {
            debug!("{path} is not a valid CSV file: failed with {e}");
            false
        }
    }
}
