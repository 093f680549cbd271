//! Integration tests for csv-ingest

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use csv_ingest::{
    EncodingChoice, FileType, FilesOrderBy, HeaderDetection, IngestError, IngestOptions,
    IngestionContext, IngestionException, PathResolver, Record, Result, StringComparer, Table,
    TextEncoding,
};
use tempfile::{NamedTempFile, TempDir};

fn write(dir: &Path, name: &str, content: &[u8]) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn resolve(spec: &str) -> (Vec<String>, Vec<IngestionException>) {
    let mut exceptions = Vec::new();
    let files = PathResolver::new(FileType::Csv).resolve(spec, &mut exceptions);
    let names = files
        .iter()
        .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    (names, exceptions)
}

fn rows(table: &Table) -> Vec<Vec<String>> {
    table
        .rows()
        .map(|row| {
            row.unwrap()
                .iter()
                .map(|(_, v)| v.unwrap_or("<null>").to_string())
                .collect()
        })
        .collect()
}

/// Table over a temporary file; the file lives as long as the returned handle.
fn single_table(
    content: &str,
    configure: impl FnOnce(&mut IngestOptions),
) -> (NamedTempFile, Table) {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();

    let mut options = IngestOptions::new();
    configure(&mut options);
    let table = IngestionContext::new(options).open_table(file.path()).unwrap();
    (file, table)
}

#[test]
fn test_header_row_detected() {
    let (_file, table) = single_table("a,b,c\n1,2,3\n4,5,6", |_| {});
    assert_eq!(table.header(), ["a", "b", "c"]);
    assert_eq!(rows(&table), vec![vec!["1", "2", "3"], vec!["4", "5", "6"]]);
}

#[test]
fn test_numeric_first_row_is_data() {
    let (_file, table) = single_table("1,2,3\n4,5,6", |options| {
        options
            .header_detection(HeaderDetection::AllLetters)
            .header_format("c{0}".parse().unwrap());
    });
    assert_eq!(table.header(), ["c1", "c2", "c3"]);
    assert_eq!(rows(&table), vec![vec!["1", "2", "3"], vec!["4", "5", "6"]]);
}

#[test]
fn test_tsv_prefers_tab() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "data.tsv", b"a\tb,c\n1\t2,3\n");

    let mut options = IngestOptions::new();
    options.files(dir.path().join("data.tsv").to_string_lossy());
    let catalog = IngestionContext::new(options).build();

    assert!(catalog.exceptions.is_empty());
    assert_eq!(catalog.tables[0].dialect().delimiter_char(), Some('\t'));
    assert_eq!(catalog.tables[0].header(), ["a", "b,c"]);
}

#[test]
fn test_recursive_mask_finds_subfolders() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "data/x.csv", b"a\n1\n");
    write(dir.path(), "data/sub/y.csv", b"a\n2\n");
    let data = dir.path().join("data");

    let (flat, _) = resolve(&data.join("*.csv").to_string_lossy());
    let (recursive, exceptions) = resolve(&data.join("**.csv").to_string_lossy());

    assert_eq!(flat, vec!["x.csv"]);
    assert_eq!(recursive, vec!["x.csv", "y.csv"]);
    assert!(exceptions.is_empty());
}

#[test]
fn test_comment_lines_resolve_nothing() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "x.csv", b"a\n1\n");
    let file = dir.path().join("x.csv");

    let spec = format!("# {}\n  #{}", file.display(), dir.path().display());
    let (names, _) = resolve(&spec);
    assert!(names.is_empty());

    let (names, _) = resolve(&format!("{}\n# {}", file.display(), file.display()));
    assert_eq!(names, vec!["x.csv"]);
}

#[test]
fn test_duplicate_entries_resolve_once() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "x.csv", b"a\n1\n");
    let file = dir.path().join("x.csv");
    let upper = file.to_string_lossy().to_uppercase();

    let spec = format!(
        "{}\n{upper}\n{}/\n{}",
        file.display(),
        dir.path().display(),
        dir.path().join("*.CSV").display()
    );
    let (names, exceptions) = resolve(&spec);
    assert_eq!(names, vec!["x.csv"]);
    assert!(exceptions.is_empty());
}

#[test]
fn test_missing_file_silent_missing_directory_reported() {
    let dir = TempDir::new().unwrap();
    let (names, exceptions) = resolve(&dir.path().join("nope.csv").to_string_lossy());
    assert!(names.is_empty());
    assert!(exceptions.is_empty());

    let spec = format!(
        "{}\n{}/",
        dir.path().join("missing").join("*.csv").display(),
        dir.path().join("typo").display()
    );
    let (names, exceptions) = resolve(&spec);
    assert!(names.is_empty());
    assert_eq!(exceptions.len(), 2);
    assert!(exceptions.iter().all(|e| e.message == "directory does not exist"));
}

#[test]
fn test_trailing_comment_after_path() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "x.csv", b"a\n1\n");

    let spec = format!("{}   # sales data", dir.path().join("x.csv").display());
    let (names, exceptions) = resolve(&spec);
    assert_eq!(names, vec!["x.csv"]);
    assert!(exceptions.is_empty());
}

#[test]
fn test_interning_across_files() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.csv", b"country,city\nUSA,Boston\n");
    write(dir.path(), "b.csv", b"name,country\nAda,USA\n");

    let mut options = IngestOptions::new();
    options
        .files(format!("{}/", dir.path().display()))
        .files_order(FilesOrderBy::NameAsc)
        .intern_strings(true);
    let context = IngestionContext::new(options);
    let catalog = context.build();
    assert_eq!(catalog.tables.len(), 2);

    let first: Record = catalog.tables[0].rows().next().unwrap().unwrap();
    let second: Record = catalog.tables[1].rows().next().unwrap().unwrap();
    let a = first.cell(0).unwrap();
    let b = second.cell(1).unwrap();
    assert_eq!(&**a, "USA");
    assert!(Arc::ptr_eq(a, b));

    let pool = context.intern_pool().unwrap();
    assert!(!pool.is_empty());
}

#[test]
fn test_interning_ignore_case_returns_first_value() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.csv", b"country\nUSA\nusa\n");

    let mut options = IngestOptions::new();
    options
        .files(dir.path().join("a.csv").to_string_lossy())
        .intern_strings(true)
        .intern_comparer(StringComparer::OrdinalIgnoreCase);
    let catalog = IngestionContext::new(options).build();

    let values: Vec<String> = catalog.tables[0]
        .rows()
        .map(|r| r.unwrap().get("country").unwrap().to_string())
        .collect();
    assert_eq!(values, vec!["USA", "USA"]);
}

#[test]
fn test_rows_restart_from_file() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.csv", b"v\n1\n");
    let path = dir.path().join("a.csv");

    let mut options = IngestOptions::new();
    options.files(path.to_string_lossy());
    let catalog = IngestionContext::new(options).build();
    let table = &catalog.tables[0];

    assert_eq!(rows(table), vec![vec!["1"]]);
    fs::write(&path, "v\n1\n2\n").unwrap();
    assert_eq!(rows(table), vec![vec!["1"], vec!["2"]]);
}

#[test]
fn test_bad_data_fails_only_that_table() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.csv", b"x,y\n1,2\n3,\"4\n");
    write(dir.path(), "b.csv", b"x,y\n5,6\n");

    let mut options = IngestOptions::new();
    options.files(format!("{}/", dir.path().display()));
    let catalog = IngestionContext::new(options).build();
    assert_eq!(catalog.tables.len(), 2);

    let results: Vec<Result<Record>> = catalog.tables[0].rows().collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(IngestError::BadData { .. })));

    assert_eq!(rows(&catalog.tables[1]), vec![vec!["5", "6"]]);
}

#[test]
fn test_bad_data_tolerated() {
    let (_file, table) = single_table("x,y\n1,a\"b\n", |options| {
        options.ignore_bad_data(true);
    });
    assert_eq!(rows(&table), vec![vec!["1", "a\"b"]]);
}

#[test]
fn test_leading_rows_and_comments() {
    let (_file, table) = single_table(
        "exported by tool;v2\n\nid,name\n# removed row\n1,Ada\n   # indented\n2,Grace\n",
        |options| {
            options.skip_leading_rows(2).allow_comments(true);
        },
    );
    assert_eq!(table.dialect().delimiter_char(), Some(','));
    assert_eq!(table.header(), ["id", "name"]);
    assert_eq!(rows(&table), vec![vec!["1", "Ada"], vec!["2", "Grace"]]);
}

#[test]
fn test_blank_and_duplicate_header_names() {
    let (_file, table) = single_table("id,,ID,name\n1,2,3,4\n", |_| {});
    assert_eq!(table.header(), ["id", "c2", "c3", "name"]);
}

#[test]
fn test_utf16_with_bom() {
    let mut bytes = vec![0xFF, 0xFE];
    for unit in "name;city\nZoë;Köln\n".encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    let dir = TempDir::new().unwrap();
    write(dir.path(), "u16.csv", &bytes);

    let mut options = IngestOptions::new();
    options.files(dir.path().join("u16.csv").to_string_lossy());
    let catalog = IngestionContext::new(options).build();
    let table = &catalog.tables[0];

    assert_eq!(table.encoding(), TextEncoding::Whatwg(encoding_rs::UTF_16LE));
    assert_eq!(table.header(), ["name", "city"]);
    assert_eq!(rows(table), vec![vec!["Zoë", "Köln"]]);
}

#[test]
fn test_fallback_encoding_for_ascii_file() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "plain.csv", b"a,b\n1,2\n");

    let mut options = IngestOptions::new();
    options
        .files(dir.path().join("plain.csv").to_string_lossy())
        .fallback_encoding(EncodingChoice::CodePage(1252));
    let catalog = IngestionContext::new(options).build();
    assert_eq!(
        catalog.tables[0].encoding(),
        TextEncoding::Whatwg(encoding_rs::WINDOWS_1252)
    );
}

#[test]
fn test_column_count_mismatch_is_reported() {
    let (_file, table) = single_table("a,b\n1,2\n3\n", |_| {});
    let results: Vec<_> = table.rows().collect();
    assert!(matches!(
        results.last(),
        Some(Err(IngestError::ColumnCountMismatch { expected: 2, found: 1, .. }))
    ));
}
