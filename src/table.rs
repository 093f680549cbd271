//! Per-file table with a restartable row sequence.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::dialect::DialectConfig;
use crate::encoding::TextEncoding;
use crate::error::{IngestError, Result};
use crate::header::ResolvedHeader;
use crate::intern::{StringComparer, StringInternPool};
use crate::parse::{CsvStreamParser, RawRows};
use crate::row::{
    ColumnMapping, MappingCache, MappingKey, RawRow, RecordShape, RowMaterializer, RowShape,
};
use crate::validate;

/// One ingested file.
///
/// Rows are not cached: every call to [`Table::rows`] reopens and reparses
/// the file.
pub struct Table<S: RowShape = RecordShape> {
    parser: CsvStreamParser,
    header: Arc<[String]>,
    first_row_is_data: bool,
    comparer: StringComparer,
    pool: Option<Arc<StringInternPool>>,
    mappings: Arc<MappingCache>,
    materializer: Arc<RowMaterializer<S>>,
}

impl Table<RecordShape> {
    /// Create a table yielding [`Record`](crate::Record)s over the resolved header.
    pub fn new(
        parser: CsvStreamParser,
        header: ResolvedHeader,
        comparer: StringComparer,
        pool: Option<Arc<StringInternPool>>,
        mappings: Arc<MappingCache>,
    ) -> Self {
        let columns: Arc<[String]> = header.names.into();
        let shape = RecordShape::new(Arc::clone(&columns));
        let materializer = build_materializer(shape, &parser, &columns, comparer, &pool, &mappings);
        Self {
            parser,
            header: columns,
            first_row_is_data: header.first_row_is_data,
            comparer,
            pool,
            mappings,
            materializer: Arc::new(materializer),
        }
    }
}

impl<S: RowShape> Table<S> {
    /// The same file read into rows of another shape.
    pub fn with_shape<T: RowShape>(&self, shape: T) -> Table<T> {
        let materializer = build_materializer(
            shape,
            &self.parser,
            &self.header,
            self.comparer,
            &self.pool,
            &self.mappings,
        );
        Table {
            parser: self.parser.clone(),
            header: Arc::clone(&self.header),
            first_row_is_data: self.first_row_is_data,
            comparer: self.comparer,
            pool: self.pool.clone(),
            mappings: Arc::clone(&self.mappings),
            materializer: Arc::new(materializer),
        }
    }

    pub fn path(&self) -> &Path {
        self.parser.path()
    }

    /// Effective dialect, with the detected delimiter filled in.
    pub fn dialect(&self) -> &DialectConfig {
        self.parser.dialect()
    }

    pub fn encoding(&self) -> TextEncoding {
        self.parser.encoding()
    }

    /// Unique column names.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Whether the header was synthesized and the first row is data.
    pub fn first_row_is_data(&self) -> bool {
        self.first_row_is_data
    }

    pub fn comparer(&self) -> StringComparer {
        self.comparer
    }

    /// Position of the column named `name` under the table's comparer.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|c| self.comparer.equals(c, name))
    }

    pub fn is_format_valid(&self) -> bool {
        validate::is_format_valid(&self.parser)
    }

    /// Lazy rows; the file is opened on the first pull.
    pub fn rows(&self) -> Rows<S> {
        Rows {
            parser: self.parser.clone(),
            raw: None,
            skip_header: !self.first_row_is_data,
            width: self.header.len(),
            materializer: Arc::clone(&self.materializer),
            done: false,
        }
    }

    /// Rows whose selected value is one of `values` under the table's comparer.
    ///
    /// This is a linear scan over [`Table::rows`]; `column_name` identifies
    /// the selected column for diagnostics only.
    pub fn where_indexed<'a, F>(
        &self,
        selector: F,
        column_name: &str,
        values: &'a [&'a str],
    ) -> impl Iterator<Item = Result<S::Row>> + 'a
    where
        F: Fn(&S::Row) -> Option<&str> + 'a,
        S: 'a,
    {
        debug!(
            "Scanning {} for {column_name} in {} values",
            self.path().display(),
            values.len()
        );
        let comparer = self.comparer;
        self.rows().filter(move |row| match row {
            Ok(row) => selector(row)
                .is_some_and(|value| values.iter().any(|v| comparer.equals(value, v))),
            Err(_) => true,
        })
    }
}

fn build_materializer<S: RowShape>(
    shape: S,
    parser: &CsvStreamParser,
    header: &[String],
    comparer: StringComparer,
    pool: &Option<Arc<StringInternPool>>,
    mappings: &MappingCache,
) -> RowMaterializer<S> {
    let fields = shape.fields();
    let key = MappingKey {
        shape: shape.fingerprint(),
        dialect: parser.dialect().clone(),
        header: header.to_vec(),
        comparer,
    };
    let mapping = mappings.get_or_build(key, || ColumnMapping::build(&fields, header, comparer));
    RowMaterializer::new(shape, mapping, pool.clone())
}

/// Lazy row sequence of one table enumeration.
///
/// A fatal error is yielded once, after which the sequence ends. Dropping
/// the iterator closes the file.
pub struct Rows<S: RowShape> {
    parser: CsvStreamParser,
    raw: Option<RawRows<File>>,
    skip_header: bool,
    width: usize,
    materializer: Arc<RowMaterializer<S>>,
    done: bool,
}

impl<S: RowShape> Rows<S> {
    fn fail(&mut self, error: IngestError) -> Option<Result<S::Row>> {
        self.done = true;
        self.raw = None;
        Some(Err(error))
    }
}

impl<S: RowShape> Iterator for Rows<S> {
    type Item = Result<S::Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.raw.is_none() {
            match self.parser.open() {
                Ok(raw) => self.raw = Some(raw),
                Err(e) => return self.fail(e),
            }
        }

        loop {
            let raw = self.raw.as_mut()?;
            let line = raw.line();
            let cells = match raw.next() {
                Some(Ok(cells)) => cells,
                Some(Err(e)) => return self.fail(e),
                None => {
                    self.done = true;
                    self.raw = None;
                    return None;
                }
            };

            if self.skip_header {
                self.skip_header = false;
                continue;
            }

            let tolerant = self.parser.dialect().bad_data_tolerant;
            return match fit_width(cells, self.width, tolerant, line) {
                Ok(row) => Some(Ok(self.materializer.materialize(row))),
                Err(e) => self.fail(e),
            };
        }
    }
}

impl<S: RowShape> std::iter::FusedIterator for Rows<S> {}

/// Fix a record to `width` cells: tolerant mode pads with nulls or truncates.
fn fit_width(cells: Vec<String>, width: usize, tolerant: bool, line: usize) -> Result<RawRow> {
    if cells.len() != width && !tolerant {
        return Err(IngestError::ColumnCountMismatch {
            line,
            expected: width,
            found: cells.len(),
        });
    }
    if cells.len() != width {
        debug!("Fitting row at line {line} from {} to {width} cells", cells.len());
    }

    let mut row: RawRow = cells.into_iter().take(width).map(Some).collect();
    row.resize(width, None);
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{HeaderDetection, HeaderFormat, resolve_header};
    use crate::row::Cell;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn table_for(
        file: &NamedTempFile,
        dialect: DialectConfig,
        detection: HeaderDetection,
    ) -> Table {
        let parser = CsvStreamParser::new(file.path(), dialect, TextEncoding::UTF_8);
        let first = parser
            .open()
            .unwrap()
            .next()
            .transpose()
            .unwrap()
            .unwrap_or_default();
        let header = resolve_header(&first, detection, &HeaderFormat::default(), true);
        let mappings = Arc::new(MappingCache::new());
        Table::new(parser, header, StringComparer::Ordinal, None, mappings)
    }

    fn comma() -> DialectConfig {
        DialectConfig::default().with_delimiter(',')
    }

    fn values(table: &Table) -> Vec<Vec<Option<String>>> {
        table.rows().map(|row| row.unwrap().to_vec()).collect()
    }

    fn some(cells: &[&str]) -> Vec<Option<String>> {
        cells.iter().map(|c| Some(c.to_string())).collect()
    }

    #[test]
    fn test_header_row_is_not_emitted() {
        let file = write_csv("a,b,c\n1,2,3\n4,5,6");
        let table = table_for(&file, comma(), HeaderDetection::default());
        assert_eq!(table.header(), ["a", "b", "c"]);
        assert_eq!(values(&table), vec![some(&["1", "2", "3"]), some(&["4", "5", "6"])]);
    }

    #[test]
    fn test_data_first_row_is_emitted() {
        let file = write_csv("1,2,3\n4,5,6");
        let table = table_for(&file, comma(), HeaderDetection::AllLetters);
        assert_eq!(table.header(), ["c1", "c2", "c3"]);
        assert!(table.first_row_is_data());
        assert_eq!(values(&table), vec![some(&["1", "2", "3"]), some(&["4", "5", "6"])]);
    }

    #[test]
    fn test_rows_are_restartable() {
        let file = write_csv("a\n1\n2\n");
        let table = table_for(&file, comma(), HeaderDetection::default());
        let mut partial = table.rows();
        assert!(partial.next().is_some());
        drop(partial);
        assert_eq!(values(&table), values(&table));
        assert_eq!(table.rows().count(), 2);
    }

    #[test]
    fn test_column_count_mismatch_is_fatal() {
        let file = write_csv("a,b\n1,2\n3\n4,5\n");
        let table = table_for(&file, comma(), HeaderDetection::default());
        let rows: Vec<_> = table.rows().collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].is_ok());
        assert!(matches!(
            rows[1],
            Err(IngestError::ColumnCountMismatch {
                line: 3,
                expected: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn test_column_count_mismatch_tolerated() {
        let file = write_csv("a,b\n1\n2,3,4\n");
        let dialect = DialectConfig {
            bad_data_tolerant: true,
            ..comma()
        };
        let table = table_for(&file, dialect, HeaderDetection::default());
        assert_eq!(
            values(&table),
            vec![vec![Some("1".to_string()), None], some(&["2", "3"])]
        );
    }

    #[test]
    fn test_where_indexed_uses_comparer() {
        let file = write_csv("country,city\nUSA,Boston\nusa,Austin\nFrance,Paris\n");
        let table = table_for(&file, comma(), HeaderDetection::default());
        let country = table.column_index("country").unwrap();

        let wanted = ["USA"];
        let hits: Vec<_> = table
            .where_indexed(move |row| row.get_index(country), "country", &wanted)
            .map(|r| r.unwrap().get("city").map(str::to_string))
            .collect();
        assert_eq!(hits, vec![Some("Boston".to_string())]);
    }

    struct Cities;

    impl RowShape for Cities {
        type Row = Option<String>;
        fn fields(&self) -> Vec<String> {
            vec!["City".to_string()]
        }
        fn build(&self, cells: Vec<Cell>) -> Option<String> {
            cells.into_iter().next().flatten().map(|c| c.to_string())
        }
    }

    fn cities_table(
        file: &NamedTempFile,
        comparer: StringComparer,
        mappings: &Arc<MappingCache>,
    ) -> Table {
        let parser = CsvStreamParser::new(file.path(), comma(), TextEncoding::UTF_8);
        let first = ["country".to_string(), "city".to_string()];
        let header =
            resolve_header(&first, HeaderDetection::default(), &HeaderFormat::default(), true);
        Table::new(parser, header, comparer, None, Arc::clone(mappings))
    }

    #[test]
    fn test_with_shape_projects_columns() {
        let file = write_csv("country,city\nUSA,Boston\n");
        let mappings = Arc::new(MappingCache::new());
        let table = cities_table(&file, StringComparer::OrdinalIgnoreCase, &mappings);

        let cities = table.with_shape(Cities);
        let rows: Vec<_> = cities.rows().collect::<Result<_>>().unwrap();
        assert_eq!(rows, vec![Some("Boston".to_string())]);
        assert_eq!(mappings.len(), 2);
    }

    #[test]
    fn test_shared_mapping_cache_respects_comparer() {
        let file = write_csv("country,city\nUSA,Boston\n");
        let mappings = Arc::new(MappingCache::new());
        let exact = cities_table(&file, StringComparer::Ordinal, &mappings);
        let loose = cities_table(&file, StringComparer::OrdinalIgnoreCase, &mappings);

        let exact_rows: Vec<_> = exact.with_shape(Cities).rows().collect::<Result<_>>().unwrap();
        let loose_rows: Vec<_> = loose.with_shape(Cities).rows().collect::<Result<_>>().unwrap();
        assert_eq!(exact_rows, vec![None]);
        assert_eq!(loose_rows, vec![Some("Boston".to_string())]);
    }

    #[test]
    fn test_missing_file_yields_error_once() {
        let file = write_csv("a\n1\n");
        let table = table_for(&file, comma(), HeaderDetection::default());
        let path = file.path().to_path_buf();
        drop(file);
        assert!(!path.exists());

        let mut rows = table.rows();
        assert!(matches!(rows.next(), Some(Err(IngestError::Io(_)))));
        assert!(rows.next().is_none());
    }
}
