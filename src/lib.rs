//! csv-ingest: dialect-inferring ingestion of loosely specified CSV files
//!
//! Turns a multi-line path specification into tables of lazily parsed rows.
//! For every file the encoding, delimiter and header are inferred unless
//! configured explicitly; failures are collected per file instead of
//! aborting the run.
//!
//! # Quick Start
//!
//! ```no_run
//! use csv_ingest::{IngestOptions, IngestionContext};
//!
//! let mut options = IngestOptions::new();
//! options
//!     .files("data/**.csv\n# scratch files are ignored\nexports/")
//!     .intern_strings(true);
//!
//! let catalog = IngestionContext::new(options).build();
//!
//! for table in &catalog.tables {
//!     println!("{}: {:?}", table.path().display(), table.header());
//!     for row in table.rows() {
//!         println!("  {}", row.unwrap());
//!     }
//! }
//! for exception in &catalog.exceptions {
//!     eprintln!("{exception}");
//! }
//! ```
//!
//! # Typed rows
//!
//! Implement [`RowShape`] to read rows into your own type. Fields are matched
//! to header columns by name; the mapping is built once per shape, dialect
//! and header and shared through the context.
//!
//! # Pipeline
//!
//! 1. [`PathResolver`] expands the path specification (`*`, `?`, recursive `**`)
//! 2. [`detect_encoding`] inspects an 8 KiB prefix (BOM, UTF-16 heuristic,
//!    UTF-8 validation, statistical guess)
//! 3. [`detect_delimiter`] counts candidates on the first line
//! 4. [`resolve_header`] decides whether the first row is a header
//! 5. [`Table::rows`] streams rows through [`CsvStreamParser`]

mod context;
mod delimiter;
mod dialect;
mod encoding;
mod error;
mod header;
mod intern;
mod options;
mod parse;
mod paths;
mod row;
mod table;
mod validate;

pub use context::{Catalog, IngestionContext};
pub use delimiter::{CSV_CANDIDATES, TSV_CANDIDATES, detect_delimiter, detect_delimiter_in_line};
pub use dialect::{DialectConfig, FileLocking, StrictMode, TrimMode, parse_delimiter};
pub use encoding::{
    DETECTION_PREFIX_LEN, EncodingChoice, TextEncoding, code_page_encoding, detect_encoding,
    detect_stream_encoding, is_utf8,
};
pub use error::{IngestError, IngestionException, Result};
pub use header::{
    HeaderDetection, HeaderFormat, ResolvedHeader, resolve_header, synthesize_names, unique_names,
};
pub use intern::{StringComparer, StringInternPool};
pub use options::{IngestOptions, MAX_SKIP_LEADING_ROWS};
pub use parse::{CsvStreamParser, RawRows};
pub use paths::{
    FileType, FilesOrderBy, PathEntry, PathResolver, classify_entry, inline_comment_content,
    longest_common_prefix_path, mask_regex, order_files, spec_lines, strip_trailing_comment,
};
pub use row::{
    Cell, ColumnMapping, MappingCache, RawRow, Record, RecordShape, RowMaterializer, RowShape,
};
pub use table::{Rows, Table};
pub use validate::{FormatIssue, check_format, is_format_valid};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api() {
        let _options = IngestOptions::new();
        let _dialect = DialectConfig::default();
        let _format = HeaderFormat::default();
        let _pool = StringInternPool::new(StringComparer::OrdinalIgnoreCase);
        let _resolver = PathResolver::new(FileType::Tsv);
        assert_eq!(EncodingChoice::default().resolve(), TextEncoding::UTF_8);
    }

    #[test]
    fn test_builder_pattern() {
        let mut options = IngestOptions::new();
        options
            .file_type(FileType::Tsv)
            .files_order(FilesOrderBy::NameAsc)
            .header_detection(HeaderDetection::LatinLetters)
            .trim_mode(TrimMode::Trim)
            .skip_leading_rows(2);

        assert_eq!(options.dialect().leading_rows_to_skip, 2);
    }
}
