//! The ingestion pipeline over every file of a path specification.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::delimiter::detect_delimiter;
use crate::encoding::{TextEncoding, detect_stream_encoding};
use crate::error::{IngestionException, Result};
use crate::header::resolve_header;
use crate::intern::StringInternPool;
use crate::options::IngestOptions;
use crate::parse::CsvStreamParser;
use crate::paths::{PathResolver, order_files};
use crate::row::MappingCache;
use crate::table::Table;

/// Tables built from one path specification, plus everything that went wrong.
pub struct Catalog {
    pub tables: Vec<Table>,
    pub exceptions: Vec<IngestionException>,
}

impl Catalog {
    pub fn table(&self, path: &Path) -> Option<&Table> {
        self.tables.iter().find(|t| t.path() == path)
    }
}

/// Owns the caches shared by all tables of one ingestion run.
///
/// Tables keep the caches alive; clones of a context share them.
#[derive(Clone)]
pub struct IngestionContext {
    options: Arc<IngestOptions>,
    pool: Option<Arc<StringInternPool>>,
    mappings: Arc<MappingCache>,
}

impl IngestionContext {
    pub fn new(options: IngestOptions) -> Self {
        let pool = options
            .intern_strings
            .then(|| Arc::new(StringInternPool::new(options.intern_comparer)));
        Self {
            options: Arc::new(options),
            pool,
            mappings: Arc::new(MappingCache::new()),
        }
    }

    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    /// The intern pool, when interning is enabled.
    pub fn intern_pool(&self) -> Option<&Arc<StringInternPool>> {
        self.pool.as_ref()
    }

    pub fn mapping_cache(&self) -> &MappingCache {
        &self.mappings
    }

    /// Resolve and order the files named by the options.
    pub fn resolve_files(&self, exceptions: &mut Vec<IngestionException>) -> Vec<PathBuf> {
        let mut resolver = PathResolver::new(self.options.file_type);
        resolver.recursive(self.options.recursive_folders);
        let files = resolver.resolve(&self.options.files, exceptions);
        order_files(files, self.options.files_order)
    }

    /// Encoding of `path`: detected from its prefix when enabled, otherwise
    /// (or when detection is inconclusive) the configured fallback.
    pub fn detect_encoding(&self, path: &Path) -> TextEncoding {
        let fallback = self.options.fallback_encoding.resolve();
        if !self.options.auto_detect_encoding {
            return fallback;
        }

        let detected = File::open(path).and_then(|mut file| detect_stream_encoding(&mut file));
        match detected {
            Ok(Some(encoding)) => {
                debug!("Detected {encoding} for {}", path.display());
                encoding
            }
            Ok(None) => {
                debug!("No encoding detected for {}, using {fallback}", path.display());
                fallback
            }
            Err(e) => {
                warn!("Encoding detection failed for {}: {e}, using {fallback}", path.display());
                fallback
            }
        }
    }

    /// Detect the encoding, delimiter and header of `path` and build its table.
    pub fn open_table(&self, path: &Path) -> Result<Table> {
        let encoding = self.detect_encoding(path);

        let mut dialect = self.options.dialect();
        if dialect.delimiter.is_none() {
            let probe = CsvStreamParser::new(path, dialect.clone(), encoding);
            let first_line = probe.first_line()?;
            let delimiter = detect_delimiter(path, first_line.as_deref());
            dialect = dialect.with_delimiter(char::from(delimiter));
        }

        let parser = CsvStreamParser::new(path, dialect, encoding);
        let first_row = parser.open()?.next().transpose()?.unwrap_or_default();
        let header = resolve_header(
            &first_row,
            self.options.header_detection,
            &self.options.header_format,
            self.options.add_header,
        );
        debug!(
            "{}: {} columns, {}",
            path.display(),
            header.names.len(),
            parser.dialect()
        );

        Ok(Table::new(
            parser,
            header,
            self.options.string_comparer,
            self.pool.clone(),
            Arc::clone(&self.mappings),
        ))
    }

    /// Run the pipeline over every resolved file.
    ///
    /// Failures are recorded per file; they never stop the run.
    pub fn build(&self) -> Catalog {
        let mut exceptions = Vec::new();
        let files = self.resolve_files(&mut exceptions);

        let mut tables = Vec::with_capacity(files.len());
        for path in files {
            match self.open_table(&path) {
                Ok(table) if self.options.ignore_invalid_files && !table.is_format_valid() => {
                    info!("Skipping {}: not a valid CSV file", path.display());
                }
                Ok(table) => tables.push(table),
                Err(e) => {
                    warn!("Failed to open {}: {e}", path.display());
                    exceptions.push(IngestionException::from_error(&path, &e));
                }
            }
        }

        info!(
            "Built {} tables, {} exceptions",
            tables.len(),
            exceptions.len()
        );
        Catalog { tables, exceptions }
    }
}
