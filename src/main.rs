//! csv-ingest CLI - inspect how a set of delimited files is ingested

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use clap::Parser;
use csv_ingest::{
    EncodingChoice, FileLocking, FileType, FilesOrderBy, HeaderDetection, HeaderFormat,
    IngestOptions, IngestionContext, Record, StrictMode, StringComparer, Table, TrimMode,
    longest_common_prefix_path,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Ingest delimited text files with inferred encoding, delimiter and header.
///
/// Each PATH is one line of a path specification: a file, a folder, or a
/// mask like `data/*.csv` (`**` in the mask searches subfolders). Log output
/// is controlled by RUST_LOG.
#[derive(Parser, Debug)]
#[command(name = "csv-ingest")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Files, folders or masks to ingest
    #[arg(required = true)]
    paths: Vec<String>,

    /// File type used to expand folders
    #[arg(short = 't', long, default_value = "csv")]
    file_type: FileTypeArg,

    /// Expand folders recursively
    #[arg(short = 'r', long)]
    recursive: bool,

    /// Order of the resolved files
    #[arg(long, default_value = "none")]
    order: OrderArg,

    /// Field delimiter (`\t` for tab); detected per file when omitted
    #[arg(short = 'd', long)]
    delimiter: Option<String>,

    /// Encoding when detection is disabled or inconclusive: utf-8, utf-16le,
    /// utf-16be, utf-32le, utf-32be, ascii, system, user, or a code page number
    #[arg(short = 'e', long, default_value = "utf-8", value_parser = parse_encoding)]
    encoding: EncodingChoice,

    /// Do not detect encodings
    #[arg(long)]
    no_detect_encoding: bool,

    /// Skip lines starting with the comment character
    #[arg(long)]
    comments: bool,

    /// Comment character
    #[arg(long, default_value = "#")]
    comment_char: char,

    /// Quote character, or `none`
    #[arg(short = 'q', long, default_value = "\"")]
    quote: CharArg,

    /// Escape character, or `none`
    #[arg(long, default_value = "\"")]
    escape: CharArg,

    /// Quote handling
    #[arg(long, default_value = "rfc4180")]
    strict: StrictArg,

    /// Whitespace trimming
    #[arg(long, default_value = "none")]
    trim: TrimArg,

    /// Keep malformed fields instead of failing the file
    #[arg(long)]
    ignore_bad_data: bool,

    /// Emit blank lines as rows
    #[arg(long)]
    keep_blank_lines: bool,

    /// Always use the first row as the header
    #[arg(long)]
    no_add_header: bool,

    /// Rule deciding whether the first row is a header
    #[arg(long, default_value = "letters-numbers-punctuation")]
    header_detection: DetectionArg,

    /// Generated column names, e.g. `c{0}`, `c1` or `Column0`
    #[arg(long, default_value = "c{0}")]
    header_format: HeaderFormat,

    /// Physical lines to skip at the start of each file
    #[arg(short = 's', long, default_value = "0")]
    skip_rows: usize,

    /// Read without locking
    #[arg(long)]
    shared: bool,

    /// Intern cell values
    #[arg(long)]
    intern: bool,

    /// Match column names and values case-insensitively
    #[arg(short = 'i', long)]
    ignore_case: bool,

    /// Skip files that do not look like valid CSV
    #[arg(long)]
    ignore_invalid: bool,

    /// Rows to print per file
    #[arg(short = 'n', long, default_value = "10")]
    rows: usize,

    /// Output format
    #[arg(short = 'f', long, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum FileTypeArg {
    Csv,
    Tsv,
    Txt,
    Log,
    All,
}

impl From<FileTypeArg> for FileType {
    fn from(arg: FileTypeArg) -> Self {
        match arg {
            FileTypeArg::Csv => FileType::Csv,
            FileTypeArg::Tsv => FileType::Tsv,
            FileTypeArg::Txt => FileType::Text,
            FileTypeArg::Log => FileType::Log,
            FileTypeArg::All => FileType::All,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OrderArg {
    None,
    Name,
    NameDesc,
    Size,
    SizeDesc,
    Modified,
    ModifiedDesc,
}

impl From<OrderArg> for FilesOrderBy {
    fn from(arg: OrderArg) -> Self {
        match arg {
            OrderArg::None => FilesOrderBy::None,
            OrderArg::Name => FilesOrderBy::NameAsc,
            OrderArg::NameDesc => FilesOrderBy::NameDesc,
            OrderArg::Size => FilesOrderBy::SizeAsc,
            OrderArg::SizeDesc => FilesOrderBy::SizeDesc,
            OrderArg::Modified => FilesOrderBy::LastWriteTimeAsc,
            OrderArg::ModifiedDesc => FilesOrderBy::LastWriteTimeDesc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum StrictArg {
    Rfc4180,
    Escape,
    NoEscape,
}

impl From<StrictArg> for StrictMode {
    fn from(arg: StrictArg) -> Self {
        match arg {
            StrictArg::Rfc4180 => StrictMode::Rfc4180,
            StrictArg::Escape => StrictMode::Escape,
            StrictArg::NoEscape => StrictMode::NoEscape,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum TrimArg {
    None,
    Trim,
    InsideQuotes,
    Both,
}

impl From<TrimArg> for TrimMode {
    fn from(arg: TrimArg) -> Self {
        match arg {
            TrimArg::None => TrimMode::None,
            TrimArg::Trim => TrimMode::Trim,
            TrimArg::InsideQuotes => TrimMode::InsideQuotes,
            TrimArg::Both => TrimMode::Both,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum DetectionArg {
    NoHeader,
    AssumeHeader,
    LettersNumbersPunctuation,
    LettersNumbers,
    Letters,
    LatinLettersNumbersPunctuation,
    LatinLettersNumbers,
    LatinLetters,
}

impl From<DetectionArg> for HeaderDetection {
    fn from(arg: DetectionArg) -> Self {
        match arg {
            DetectionArg::NoHeader => HeaderDetection::NoHeader,
            DetectionArg::AssumeHeader => HeaderDetection::AssumeHeader,
            DetectionArg::LettersNumbersPunctuation => {
                HeaderDetection::AllLettersNumbersPunctuation
            }
            DetectionArg::LettersNumbers => HeaderDetection::AllLettersNumbers,
            DetectionArg::Letters => HeaderDetection::AllLetters,
            DetectionArg::LatinLettersNumbersPunctuation => {
                HeaderDetection::LatinLettersNumbersPunctuation
            }
            DetectionArg::LatinLettersNumbers => HeaderDetection::LatinLettersNumbers,
            DetectionArg::LatinLetters => HeaderDetection::LatinLetters,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Csv,
}

fn parse_encoding(s: &str) -> Result<EncodingChoice, String> {
    let choice = match s.to_ascii_lowercase().replace('_', "-").as_str() {
        "utf-8" | "utf8" => EncodingChoice::Utf8,
        "utf-16le" | "utf-16" => EncodingChoice::Utf16Le,
        "utf-16be" => EncodingChoice::Utf16Be,
        "utf-32le" | "utf-32" => EncodingChoice::Utf32Le,
        "utf-32be" => EncodingChoice::Utf32Be,
        "ascii" => EncodingChoice::Ascii,
        "system" => EncodingChoice::SystemCodePage,
        "user" => EncodingChoice::UserCodePage,
        other => {
            let code_page = other
                .trim_start_matches("cp")
                .parse()
                .map_err(|_| format!("unknown encoding {s:?}"))?;
            EncodingChoice::CodePage(code_page)
        }
    };
    Ok(choice)
}

/// A single character, or `none`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CharArg(Option<char>);

impl FromStr for CharArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("none") {
            return Ok(CharArg(None));
        }
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(CharArg(Some(c))),
            _ => Err(format!("expected a single character or `none`, got {s:?}")),
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let context = IngestionContext::new(build_options(&args));
    let catalog = context.build();

    let paths: Vec<PathBuf> = catalog.tables.iter().map(|t| t.path().to_path_buf()).collect();
    let base = longest_common_prefix_path(&paths);

    let mut exit_code = ExitCode::SUCCESS;

    for table in &catalog.tables {
        let name = display_name(table.path(), &base);
        let printed = match args.format {
            OutputFormat::Text => print_text_output(&name, table, args.rows),
            OutputFormat::Csv => print_csv_output(table, args.rows),
        };
        if let Err(e) = printed {
            eprintln!("Error processing {name}: {e}");
            exit_code = ExitCode::FAILURE;
        }
    }

    for exception in &catalog.exceptions {
        eprintln!("{exception}");
        exit_code = ExitCode::FAILURE;
    }

    exit_code
}

fn build_options(args: &Args) -> IngestOptions {
    let comparer = if args.ignore_case {
        StringComparer::OrdinalIgnoreCase
    } else {
        StringComparer::Ordinal
    };

    let mut options = IngestOptions::new();
    options
        .files(args.paths.join("\n"))
        .file_type(args.file_type.into())
        .recursive_folders(args.recursive)
        .files_order(args.order.into())
        .delimiter(args.delimiter.as_deref().unwrap_or_default())
        .auto_detect_encoding(!args.no_detect_encoding)
        .fallback_encoding(args.encoding)
        .allow_comments(args.comments)
        .comment_char(Some(args.comment_char))
        .quote_char(args.quote.0)
        .escape_char(args.escape.0)
        .strict_mode(args.strict.into())
        .trim_mode(args.trim.into())
        .ignore_bad_data(args.ignore_bad_data)
        .ignore_blank_lines(!args.keep_blank_lines)
        .add_header(!args.no_add_header)
        .header_detection(args.header_detection.into())
        .header_format(args.header_format.clone())
        .skip_leading_rows(args.skip_rows)
        .file_locking(if args.shared {
            FileLocking::Shared
        } else {
            FileLocking::Exclusive
        })
        .intern_strings(args.intern)
        .intern_comparer(comparer)
        .string_comparer(comparer)
        .ignore_invalid_files(args.ignore_invalid);
    options
}

fn display_name(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn print_text_output(name: &str, table: &Table, limit: usize) -> csv_ingest::Result<()> {
    println!("File: {name}");
    println!("  Encoding: {}", table.encoding());
    println!("  Dialect: {}", table.dialect());
    println!(
        "  Header: {}{}",
        table.header().join(", "),
        if table.first_row_is_data() {
            " (generated)"
        } else {
            ""
        }
    );

    for row in table.rows().take(limit) {
        println!("    {}", row?);
    }

    println!();
    Ok(())
}

fn print_csv_output(table: &Table, limit: usize) -> csv_ingest::Result<()> {
    println!("{}", csv_line(table.header().iter().map(String::as_str)));
    for row in table.rows().take(limit) {
        let row: Record = row?;
        println!("{}", csv_line(row.values().iter().map(|v| v.as_deref().unwrap_or(""))));
    }
    Ok(())
}

fn csv_line<'a>(cells: impl Iterator<Item = &'a str>) -> String {
    cells
        .map(|cell| {
            if cell.contains([',', '"', '\n', '\r']) {
                format!("\"{}\"", cell.replace('"', "\"\""))
            } else {
                cell.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}
