//! Ingestion options.
//!
//! [`IngestOptions`] is the externally supplied configuration surface. Out of
//! range values are corrected instead of rejected.

use tracing::warn;

use crate::dialect::{DialectConfig, FileLocking, StrictMode, TrimMode, parse_delimiter};
use crate::encoding::EncodingChoice;
use crate::header::{HeaderDetection, HeaderFormat};
use crate::intern::StringComparer;
use crate::paths::{FileType, FilesOrderBy};

/// Largest accepted number of leading rows to skip.
pub const MAX_SKIP_LEADING_ROWS: usize = 999;

/// Everything that controls one ingestion run.
///
/// # Example
///
/// ```
/// use csv_ingest::{HeaderDetection, IngestOptions};
///
/// let mut options = IngestOptions::new();
/// options
///     .files("data/**.csv\n# archived\n# old/*.csv")
///     .delimiter(";")
///     .header_detection(HeaderDetection::AllLetters)
///     .intern_strings(true);
///
/// assert_eq!(options.dialect().delimiter.as_deref(), Some(";"));
/// ```
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub(crate) files: String,
    pub(crate) file_type: FileType,
    pub(crate) recursive_folders: bool,
    pub(crate) files_order: FilesOrderBy,
    pub(crate) delimiter: Option<String>,
    pub(crate) auto_detect_encoding: bool,
    pub(crate) fallback_encoding: EncodingChoice,
    pub(crate) allow_comments: bool,
    pub(crate) comment_char: Option<char>,
    pub(crate) quote_char: Option<char>,
    pub(crate) escape_char: Option<char>,
    pub(crate) ignore_bad_data: bool,
    pub(crate) ignore_blank_lines: bool,
    pub(crate) add_header: bool,
    pub(crate) header_detection: HeaderDetection,
    pub(crate) header_format: HeaderFormat,
    pub(crate) strict_mode: StrictMode,
    pub(crate) trim_mode: TrimMode,
    pub(crate) skip_leading_rows: usize,
    pub(crate) file_locking: FileLocking,
    pub(crate) intern_strings: bool,
    pub(crate) intern_comparer: StringComparer,
    pub(crate) string_comparer: StringComparer,
    pub(crate) ignore_invalid_files: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestOptions {
    pub fn new() -> Self {
        let dialect = DialectConfig::default();
        Self {
            files: String::new(),
            file_type: FileType::default(),
            recursive_folders: false,
            files_order: FilesOrderBy::default(),
            delimiter: None,
            auto_detect_encoding: true,
            fallback_encoding: EncodingChoice::default(),
            allow_comments: dialect.comments_enabled,
            comment_char: dialect.comment_char,
            quote_char: dialect.quote,
            escape_char: dialect.escape,
            ignore_bad_data: dialect.bad_data_tolerant,
            ignore_blank_lines: dialect.blank_lines_ignored,
            add_header: true,
            header_detection: HeaderDetection::default(),
            header_format: HeaderFormat::default(),
            strict_mode: dialect.strict_mode,
            trim_mode: dialect.trim_mode,
            skip_leading_rows: dialect.leading_rows_to_skip,
            file_locking: dialect.file_locking,
            intern_strings: false,
            intern_comparer: StringComparer::Ordinal,
            string_comparer: StringComparer::Ordinal,
            ignore_invalid_files: false,
        }
    }

    /// Multi-line path specification.
    pub fn files(&mut self, files: impl Into<String>) -> &mut Self {
        self.files = files.into();
        self
    }

    /// File type whose mask expands bare folders.
    pub fn file_type(&mut self, file_type: FileType) -> &mut Self {
        self.file_type = file_type;
        self
    }

    /// Expand bare folders recursively.
    pub fn recursive_folders(&mut self, recursive: bool) -> &mut Self {
        self.recursive_folders = recursive;
        self
    }

    pub fn files_order(&mut self, order: FilesOrderBy) -> &mut Self {
        self.files_order = order;
        self
    }

    /// Field delimiter; an empty string means auto-detect. Escapes such as
    /// `\t` are accepted.
    pub fn delimiter(&mut self, delimiter: &str) -> &mut Self {
        self.delimiter = parse_delimiter(delimiter);
        self
    }

    pub fn auto_detect_encoding(&mut self, enabled: bool) -> &mut Self {
        self.auto_detect_encoding = enabled;
        self
    }

    /// Encoding used when detection is disabled or inconclusive.
    pub fn fallback_encoding(&mut self, encoding: EncodingChoice) -> &mut Self {
        self.fallback_encoding = encoding;
        self
    }

    pub fn allow_comments(&mut self, enabled: bool) -> &mut Self {
        self.allow_comments = enabled;
        self
    }

    pub fn comment_char(&mut self, comment: Option<char>) -> &mut Self {
        self.comment_char = comment;
        self
    }

    pub fn quote_char(&mut self, quote: Option<char>) -> &mut Self {
        self.quote_char = quote;
        self
    }

    pub fn escape_char(&mut self, escape: Option<char>) -> &mut Self {
        self.escape_char = escape;
        self
    }

    pub fn ignore_bad_data(&mut self, enabled: bool) -> &mut Self {
        self.ignore_bad_data = enabled;
        self
    }

    pub fn ignore_blank_lines(&mut self, enabled: bool) -> &mut Self {
        self.ignore_blank_lines = enabled;
        self
    }

    /// Synthesize a header when the first row does not look like one.
    pub fn add_header(&mut self, enabled: bool) -> &mut Self {
        self.add_header = enabled;
        self
    }

    pub fn header_detection(&mut self, detection: HeaderDetection) -> &mut Self {
        self.header_detection = detection;
        self
    }

    pub fn header_format(&mut self, format: HeaderFormat) -> &mut Self {
        self.header_format = format;
        self
    }

    pub fn strict_mode(&mut self, mode: StrictMode) -> &mut Self {
        self.strict_mode = mode;
        self
    }

    pub fn trim_mode(&mut self, mode: TrimMode) -> &mut Self {
        self.trim_mode = mode;
        self
    }

    /// Physical lines skipped at the start of every file. Values above
    /// [`MAX_SKIP_LEADING_ROWS`] fall back to 0.
    pub fn skip_leading_rows(&mut self, rows: usize) -> &mut Self {
        self.skip_leading_rows = if rows > MAX_SKIP_LEADING_ROWS {
            warn!("Leading rows to skip {rows} exceeds {MAX_SKIP_LEADING_ROWS}, using 0");
            0
        } else {
            rows
        };
        self
    }

    pub fn file_locking(&mut self, locking: FileLocking) -> &mut Self {
        self.file_locking = locking;
        self
    }

    /// Share one stored value between equal cells across all tables.
    pub fn intern_strings(&mut self, enabled: bool) -> &mut Self {
        self.intern_strings = enabled;
        self
    }

    /// Equality used by the intern pool.
    pub fn intern_comparer(&mut self, comparer: StringComparer) -> &mut Self {
        self.intern_comparer = comparer;
        self
    }

    /// Equality used for column name matching and value filters.
    pub fn string_comparer(&mut self, comparer: StringComparer) -> &mut Self {
        self.string_comparer = comparer;
        self
    }

    /// Skip files that fail the format check.
    pub fn ignore_invalid_files(&mut self, enabled: bool) -> &mut Self {
        self.ignore_invalid_files = enabled;
        self
    }

    /// Dialect built from these options; the delimiter stays `None` when it
    /// is to be detected per file.
    pub fn dialect(&self) -> DialectConfig {
        DialectConfig {
            delimiter: self.delimiter.clone(),
            quote: self.quote_char,
            escape: self.escape_char,
            comment_char: self.comment_char,
            comments_enabled: self.allow_comments,
            bad_data_tolerant: self.ignore_bad_data,
            blank_lines_ignored: self.ignore_blank_lines,
            trim_mode: self.trim_mode,
            strict_mode: self.strict_mode,
            leading_rows_to_skip: self.skip_leading_rows,
            file_locking: self.file_locking,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_dialect_defaults() {
        let options = IngestOptions::default();
        assert_eq!(options.dialect(), DialectConfig::default());
        assert!(options.add_header);
        assert!(options.auto_detect_encoding);
        assert!(!options.intern_strings);
    }

    #[test]
    fn test_skip_leading_rows_out_of_range_resets() {
        let mut options = IngestOptions::new();
        options.skip_leading_rows(MAX_SKIP_LEADING_ROWS);
        assert_eq!(options.skip_leading_rows, MAX_SKIP_LEADING_ROWS);
        options.skip_leading_rows(MAX_SKIP_LEADING_ROWS + 1);
        assert_eq!(options.skip_leading_rows, 0);
    }

    #[test]
    fn test_delimiter_is_unescaped() {
        let mut options = IngestOptions::new();
        options.delimiter("\\t");
        assert_eq!(options.dialect().delimiter.as_deref(), Some("\t"));
        options.delimiter("");
        assert_eq!(options.dialect().delimiter, None);
    }

    #[test]
    fn test_dialect_reflects_setters() {
        let mut options = IngestOptions::new();
        options
            .allow_comments(true)
            .comment_char(Some(';'))
            .escape_char(Some('\\'))
            .trim_mode(TrimMode::Both)
            .strict_mode(StrictMode::NoEscape)
            .file_locking(FileLocking::Shared);

        let dialect = options.dialect();
        assert_eq!(dialect.active_comment(), Some(';'));
        assert_eq!(dialect.escape, Some('\\'));
        assert_eq!(dialect.trim_mode, TrimMode::Both);
        assert_eq!(dialect.strict_mode, StrictMode::NoEscape);
        assert_eq!(dialect.file_locking, FileLocking::Shared);
    }
}
