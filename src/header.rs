//! Header detection and column name synthesis.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use foldhash::{HashSet, HashSetExt};
use regex::Regex;

use crate::error::IngestError;

static LETTERS_NUMBERS_PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\p{L}\p{N}\p{P}\s]+$").expect("Invalid letters/numbers/punctuation pattern")
});

static LETTERS_NUMBERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}\p{N}\s]+$").expect("Invalid letters/numbers pattern"));

static LETTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}\s]+$").expect("Invalid letters pattern"));

static LATIN_LETTERS_NUMBERS_PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\p{Latin}0-9\p{P}\s]+$")
        .expect("Invalid Latin letters/numbers/punctuation pattern")
});

static LATIN_LETTERS_NUMBERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\p{Latin}0-9\s]+$").expect("Invalid Latin letters/numbers pattern")
});

static LATIN_LETTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{Latin}\s]+$").expect("Invalid Latin letters pattern"));

/// Rule deciding whether the first row is a header or data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HeaderDetection {
    /// The first row is data.
    NoHeader,
    /// The first row is always the header.
    AssumeHeader,
    #[default]
    AllLettersNumbersPunctuation,
    AllLettersNumbers,
    AllLetters,
    LatinLettersNumbersPunctuation,
    LatinLettersNumbers,
    LatinLetters,
}

impl HeaderDetection {
    fn pattern(&self) -> Option<&'static Regex> {
        let pattern = match self {
            HeaderDetection::NoHeader | HeaderDetection::AssumeHeader => return None,
            HeaderDetection::AllLettersNumbersPunctuation => &LETTERS_NUMBERS_PUNCTUATION,
            HeaderDetection::AllLettersNumbers => &LETTERS_NUMBERS,
            HeaderDetection::AllLetters => &LETTERS,
            HeaderDetection::LatinLettersNumbersPunctuation => &LATIN_LETTERS_NUMBERS_PUNCTUATION,
            HeaderDetection::LatinLettersNumbers => &LATIN_LETTERS_NUMBERS,
            HeaderDetection::LatinLetters => &LATIN_LETTERS,
        };
        Some(LazyLock::force(pattern))
    }

    /// Whether a single header cell satisfies the rule. Blank cells always do.
    pub fn accepts(&self, cell: &str) -> bool {
        match self {
            HeaderDetection::NoHeader => false,
            HeaderDetection::AssumeHeader => true,
            _ => is_blank(cell) || self.pattern().is_some_and(|re| re.is_match(cell)),
        }
    }

    /// Whether `row` looks like a header under this rule.
    pub fn is_header(&self, row: &[String]) -> bool {
        row.iter().all(|cell| self.accepts(cell))
    }
}

fn is_blank(cell: &str) -> bool {
    cell.trim().is_empty()
}

/// Template for generated column names, e.g. `c{0}` counting from 1.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HeaderFormat {
    template: String,
    start: usize,
}

impl HeaderFormat {
    /// Placeholder replaced by the column number.
    pub const PLACEHOLDER: &'static str = "{0}";

    /// Create a format; a template without the placeholder gets it appended.
    pub fn new(template: &str, one_based: bool) -> Self {
        let template = if template.contains(Self::PLACEHOLDER) {
            template.to_string()
        } else {
            format!("{template}{}", Self::PLACEHOLDER)
        };
        Self {
            template,
            start: usize::from(one_based),
        }
    }

    /// Name of the column at 0-based `index`.
    pub fn format(&self, index: usize) -> String {
        self.template
            .replace(Self::PLACEHOLDER, &(index + self.start).to_string())
    }
}

impl Default for HeaderFormat {
    fn default() -> Self {
        Self::new("c", true)
    }
}

impl fmt::Display for HeaderFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(0))
    }
}

/// Parses `c{0}` (1-based), or a sample name whose trailing `0`/`1` gives the
/// base: `c1`, `Column0`.
impl FromStr for HeaderFormat {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains(Self::PLACEHOLDER) {
            return Ok(Self::new(s, true));
        }
        match s.char_indices().last() {
            Some((i, '0')) if i > 0 => Ok(Self::new(&s[..i], false)),
            Some((i, '1')) if i > 0 => Ok(Self::new(&s[..i], true)),
            _ => Err(IngestError::InvalidConfig(format!(
                "header format {s:?} must contain {{0}} or end with 0 or 1"
            ))),
        }
    }
}

/// Outcome of header resolution for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedHeader {
    /// Unique column names.
    pub names: Vec<String>,
    /// The first row was data and must be emitted as the first row.
    pub first_row_is_data: bool,
}

/// Decide whether `first_row` is a header and produce unique column names.
///
/// Without `add_header` the first row is always used as the header.
pub fn resolve_header(
    first_row: &[String],
    detection: HeaderDetection,
    format: &HeaderFormat,
    add_header: bool,
) -> ResolvedHeader {
    let is_header = !add_header || detection.is_header(first_row);

    if is_header {
        ResolvedHeader {
            names: unique_names(first_row, format),
            first_row_is_data: false,
        }
    } else {
        ResolvedHeader {
            names: synthesize_names(first_row.len(), format),
            first_row_is_data: true,
        }
    }
}

/// Generated names for `count` columns.
pub fn synthesize_names(count: usize, format: &HeaderFormat) -> Vec<String> {
    (0..count).map(|i| format.format(i)).collect()
}

/// Keep non-blank names; replace blank and repeated ones with generated names.
///
/// Uniqueness is case-insensitive. A generated name is probed from the
/// column's own index upwards until it clashes with nothing.
pub fn unique_names(row: &[String], format: &HeaderFormat) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::with_capacity(row.len());
    let kept: Vec<Option<&str>> = row
        .iter()
        .map(|cell| {
            let name = cell.trim();
            (!name.is_empty() && taken.insert(name.to_lowercase())).then_some(name)
        })
        .collect();

    kept.into_iter()
        .enumerate()
        .map(|(i, name)| match name {
            Some(name) => name.to_string(),
            None => {
                let mut index = i;
                loop {
                    let candidate = format.format(index);
                    if taken.insert(candidate.to_lowercase()) {
                        break candidate;
                    }
                    index += 1;
                }
            }
        })
        .collect()
}
