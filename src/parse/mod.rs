//! Restartable streaming CSV parser.
//!
//! [`CsvStreamParser`] is a factory: every call to [`CsvStreamParser::open`]
//! opens the file again and returns an independent lazy [`RawRows`] iterator.

pub mod source;
pub mod tokenizer;

use std::fs::{File, TryLockError};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::dialect::{DialectConfig, FileLocking};
use crate::encoding::TextEncoding;
use crate::error::{IngestError, Result};
use source::CharSource;
use tokenizer::Tokenizer;

/// Open `path` for reading with the requested locking mode.
pub fn open_file(path: &Path, locking: FileLocking) -> Result<File> {
    let file = File::open(path)?;

    if locking == FileLocking::Exclusive {
        match file.try_lock_shared() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => {
                return Err(IngestError::Locked(path.to_path_buf()));
            }
            Err(TryLockError::Error(e)) if e.kind() == io::ErrorKind::Unsupported => {
                debug!("File locking not supported for {}", path.display());
            }
            Err(TryLockError::Error(e)) => return Err(e.into()),
        }
    }

    Ok(file)
}

/// Parser configuration for one file: path, dialect and encoding.
#[derive(Debug, Clone)]
pub struct CsvStreamParser {
    path: PathBuf,
    dialect: DialectConfig,
    encoding: TextEncoding,
}

impl CsvStreamParser {
    pub fn new(path: impl Into<PathBuf>, dialect: DialectConfig, encoding: TextEncoding) -> Self {
        Self {
            path: path.into(),
            dialect,
            encoding,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dialect(&self) -> &DialectConfig {
        &self.dialect
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Open the file and return a lazy row iterator positioned at the start.
    pub fn open(&self) -> Result<RawRows<File>> {
        let file = open_file(&self.path, self.dialect.file_locking)?;
        Ok(RawRows::new(file, &self.dialect, self.encoding))
    }

    /// First physical line after the skipped leading rows.
    pub fn first_line(&self) -> Result<Option<String>> {
        let file = open_file(&self.path, self.dialect.file_locking)?;
        let mut source = CharSource::new(file, self.encoding);
        for _ in 0..self.dialect.leading_rows_to_skip {
            if source.read_line()?.is_none() {
                return Ok(None);
            }
        }
        Ok(source.read_line()?)
    }
}

/// Lazy sequence of raw records from one open reader.
///
/// Yields `Err` at most once; the iterator is exhausted afterwards. The
/// reader (and its file handle) is released when the iterator is dropped.
pub struct RawRows<R> {
    source: CharSource<R>,
    tokenizer: Tokenizer,
    rows_to_skip: usize,
    done: bool,
}

impl<R: Read> RawRows<R> {
    pub fn new(reader: R, dialect: &DialectConfig, encoding: TextEncoding) -> Self {
        Self {
            source: CharSource::new(reader, encoding),
            tokenizer: Tokenizer::new(dialect),
            rows_to_skip: dialect.leading_rows_to_skip,
            done: false,
        }
    }

    /// Line the next record starts on.
    pub fn line(&self) -> usize {
        self.tokenizer.line()
    }

    fn read_next(&mut self) -> Result<Option<Vec<String>>> {
        while self.rows_to_skip > 0 {
            self.rows_to_skip -= 1;
            if !self.tokenizer.skip_line(&mut self.source)? {
                return Ok(None);
            }
        }
        self.tokenizer.read_record(&mut self.source)
    }
}

impl<R: Read> Iterator for RawRows<R> {
    type Item = Result<Vec<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_next() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: Read> std::iter::FusedIterator for RawRows<R> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    #[test]
    fn test_skip_leading_rows() {
        let dialect = DialectConfig {
            leading_rows_to_skip: 2,
            ..DialectConfig::default().with_delimiter(',')
        };
        let data = "generated by tool \"x\nexported 2024\na,b\n1,2\n";
        let rows: Vec<_> = RawRows::new(Cursor::new(data), &dialect, TextEncoding::UTF_8)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(rows, vec![vec!["a", "b"], vec!["1", "2"]]);
    }

    #[test]
    fn test_skip_more_rows_than_present() {
        let dialect = DialectConfig {
            leading_rows_to_skip: 5,
            ..DialectConfig::default().with_delimiter(',')
        };
        let mut rows = RawRows::new(Cursor::new("a\nb\n"), &dialect, TextEncoding::UTF_8);
        assert!(rows.next().is_none());
    }

    #[test]
    fn test_error_is_yielded_once() {
        let dialect = DialectConfig::default().with_delimiter(',');
        let mut rows = RawRows::new(Cursor::new("a\n\"open"), &dialect, TextEncoding::UTF_8);
        assert!(rows.next().unwrap().is_ok());
        assert!(rows.next().unwrap().is_err());
        assert!(rows.next().is_none());
    }

    #[test]
    fn test_parser_is_restartable() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"a;b\n1;2\n").unwrap();
        file.flush().unwrap();

        let parser = CsvStreamParser::new(
            file.path(),
            DialectConfig::default().with_delimiter(';'),
            TextEncoding::UTF_8,
        );
        let first: Vec<_> = parser.open().unwrap().collect::<Result<_>>().unwrap();
        let second: Vec<_> = parser.open().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(parser.first_line().unwrap().as_deref(), Some("a;b"));
    }

    #[test]
    fn test_exclusive_open_fails_while_locked() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"a\n1\n").unwrap();
        file.flush().unwrap();

        let holder = File::open(file.path()).unwrap();
        holder.lock().unwrap();
        assert!(matches!(
            open_file(file.path(), FileLocking::Exclusive),
            Err(IngestError::Locked(path)) if path == file.path()
        ));
        assert!(open_file(file.path(), FileLocking::Shared).is_ok());

        holder.unlock().unwrap();
        assert!(open_file(file.path(), FileLocking::Exclusive).is_ok());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let parser = CsvStreamParser::new(
            "/definitely/not/here.csv",
            DialectConfig::default(),
            TextEncoding::UTF_8,
        );
        assert!(matches!(parser.open(), Err(IngestError::Io(_))));
    }
}
