//! Expansion of multi-line path specifications into concrete files.
//!
//! Every non-blank line of a specification is one entry: a file, a folder
//! (expanded with the default mask) or a mask such as `data/*.csv`. A `**`
//! in the mask's file stem searches subdirectories too. Lines starting with
//! `#` are comments; a `#` after whitespace ends an entry early
//! (`data/x.csv  # sales`).

use std::cmp::Ordering;
use std::fs;
use std::path::{self, Component, Path, PathBuf};
use std::time::SystemTime;

use foldhash::{HashSet, HashSetExt};
use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{IngestError, IngestionException};

/// Marker in a mask's file stem that enables recursive search.
pub const RECURSIVE_MASK_MARKER: &str = "**";

/// Line prefix marking a comment.
pub const INLINE_COMMENT: &str = "#";

/// Extensions recognised as data files.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["csv", "tsv", "txt", "log"];

/// Default file type; determines the mask used for bare folders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FileType {
    #[default]
    Csv,
    Tsv,
    Text,
    Log,
    All,
}

impl FileType {
    pub fn extension(&self) -> &'static str {
        match self {
            FileType::Csv => "csv",
            FileType::Tsv => "tsv",
            FileType::Text => "txt",
            FileType::Log => "log",
            FileType::All => "",
        }
    }

    /// Mask for this file type, e.g. `*.csv` or `**.csv`.
    pub fn mask(&self, recursive: bool) -> String {
        let prefix = if recursive { RECURSIVE_MASK_MARKER } else { "*" };
        match self {
            FileType::All => format!("{prefix}.*"),
            _ => format!("{prefix}.{}", self.extension()),
        }
    }
}

/// Ordering applied to resolved files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilesOrderBy {
    /// Keep resolution order.
    #[default]
    None,
    NameAsc,
    NameDesc,
    SizeAsc,
    SizeDesc,
    LastWriteTimeAsc,
    LastWriteTimeDesc,
}

/// One classified line of a path specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathEntry {
    /// Folder expanded with the default mask.
    Folder(PathBuf),
    /// Base directory plus a file name mask.
    Glob { dir: PathBuf, mask: String },
    /// A path without wildcards that looks like a file.
    File(PathBuf),
}

fn has_wildcard(s: &str) -> bool {
    s.contains(['*', '?'])
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

/// Whether `line` is a full-line comment.
pub fn is_inline_comment(line: &str) -> bool {
    line.trim_start().starts_with(INLINE_COMMENT)
}

/// Text of a comment line without the comment marker.
pub fn inline_comment_content(line: &str) -> &str {
    line.trim().trim_start_matches(INLINE_COMMENT)
}

/// Cut a trailing comment (a `#` preceded by whitespace) from an entry.
pub fn strip_trailing_comment(line: &str) -> &str {
    let cut = line
        .match_indices(INLINE_COMMENT)
        .find(|&(i, _)| line[..i].ends_with(char::is_whitespace));
    match cut {
        Some((i, _)) => line[..i].trim_end(),
        None => line,
    }
}

/// Entries of a specification: trimmed, without comments and blank lines,
/// deduplicated case-insensitively.
pub fn spec_lines(spec: &str) -> Vec<&str> {
    let mut seen = HashSet::new();
    spec.split(['\r', '\n'])
        .map(str::trim)
        .filter(|line| !is_inline_comment(line))
        .map(strip_trailing_comment)
        .filter(|line| !line.is_empty())
        .filter(|line| seen.insert(line.to_lowercase()))
        .collect()
}

/// Classify a specification entry as folder, mask or file.
pub fn classify_entry(line: &str) -> PathEntry {
    if line.ends_with(path::is_separator) {
        return PathEntry::Folder(PathBuf::from(line));
    }

    let path = Path::new(line);
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();

    if has_wildcard(file_name) {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        return PathEntry::Glob {
            dir,
            mask: file_name.to_string(),
        };
    }

    if has_supported_extension(path) {
        PathEntry::File(path.to_path_buf())
    } else {
        PathEntry::Folder(path.to_path_buf())
    }
}

/// Whether a mask requests a recursive search.
pub fn is_recursive_mask(mask: &str) -> bool {
    let stem = Path::new(mask)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(mask);
    stem.contains(RECURSIVE_MASK_MARKER)
}

/// Compile a file name mask into a case-insensitive regex.
///
/// `*` (and `**`) match any run of characters, `?` exactly one.
pub fn mask_regex(mask: &str) -> Result<Regex, regex::Error> {
    let mut pattern = String::with_capacity(mask.len() + 8);
    pattern.push('^');
    for c in mask.chars() {
        match c {
            '*' => {
                if !pattern.ends_with(".*") {
                    pattern.push_str(".*");
                }
            }
            '?' => pattern.push('.'),
            c => pattern.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    pattern.push('$');

    RegexBuilder::new(&pattern).case_insensitive(true).build()
}

/// Expands path specifications into deduplicated absolute file paths.
#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    file_type: FileType,
    recursive: bool,
}

impl PathResolver {
    pub fn new(file_type: FileType) -> Self {
        Self {
            file_type,
            recursive: false,
        }
    }

    /// Search subdirectories of bare folder entries.
    pub fn recursive(&mut self, recursive: bool) -> &mut Self {
        self.recursive = recursive;
        self
    }

    pub fn default_mask(&self) -> String {
        self.file_type.mask(self.recursive)
    }

    /// Resolve `spec`, recording per-entry failures in `exceptions`.
    pub fn resolve(
        &self,
        spec: &str,
        exceptions: &mut Vec<IngestionException>,
    ) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();

        for line in spec_lines(spec) {
            for file in self.enumerate(line, exceptions) {
                let file = match path::absolute(&file) {
                    Ok(file) => file,
                    Err(e) => {
                        let message = format!("processing failed: {e}");
                        exceptions.push(IngestionException::new(&file, message));
                        continue;
                    }
                };
                if seen.insert(file.to_string_lossy().to_lowercase()) {
                    files.push(file);
                }
            }
        }

        files
    }

    fn enumerate(&self, line: &str, exceptions: &mut Vec<IngestionException>) -> Vec<PathBuf> {
        match classify_entry(line) {
            PathEntry::File(path) if path.is_file() => vec![path],
            PathEntry::File(path) if path.is_dir() => {
                self.walk(&path, &self.default_mask(), exceptions)
            }
            PathEntry::File(path) => {
                debug!("File {} does not exist", path.display());
                Vec::new()
            }
            PathEntry::Folder(path) if path.is_file() => vec![path],
            PathEntry::Folder(dir) => self.walk(&dir, &self.default_mask(), exceptions),
            PathEntry::Glob { dir, mask } => self.walk(&dir, &mask, exceptions),
        }
    }

    /// List files under `dir` whose names match `mask`.
    ///
    /// A missing `dir` and entries that fail (permissions, vanished
    /// directories, broken links) are recorded; the walk continues. Files come
    /// before subdirectories.
    fn walk(
        &self,
        dir: &Path,
        mask: &str,
        exceptions: &mut Vec<IngestionException>,
    ) -> Vec<PathBuf> {
        if !dir.is_dir() {
            warn!("Directory {} does not exist", dir.display());
            exceptions.push(IngestionException::new(dir, "directory does not exist"));
            return Vec::new();
        }

        let matcher = match mask_regex(mask) {
            Ok(matcher) => matcher,
            Err(e) => {
                let message = format!("invalid mask {mask:?}: {e}");
                exceptions.push(IngestionException::new(dir, message));
                return Vec::new();
            }
        };
        let recursive = is_recursive_mask(mask);
        let walker = WalkDir::new(dir)
            .follow_links(true)
            .min_depth(1)
            .max_depth(if recursive { usize::MAX } else { 1 })
            .sort_by(|a, b| {
                let kind = a.file_type().is_dir().cmp(&b.file_type().is_dir());
                kind.then_with(|| a.file_name().cmp(b.file_name()))
            });

        let mut files = Vec::new();
        for entry in walker {
            match entry {
                Ok(entry) => {
                    let matches = entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| matcher.is_match(name));
                    if entry.file_type().is_file() && matches {
                        files.push(entry.into_path());
                    }
                }
                Err(e) => {
                    let path = e.path().unwrap_or(dir).to_path_buf();
                    warn!("File enumeration failed for {}: {e}", path.display());
                    exceptions.push(IngestionException::from_error(&path, &IngestError::Walk(e)));
                }
            }
        }

        files
    }
}

/// Sort files by the given policy. Files whose metadata cannot be read sort
/// as empty and oldest.
pub fn order_files(mut files: Vec<PathBuf>, order: FilesOrderBy) -> Vec<PathBuf> {
    fn name_key(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }
    fn size(path: &Path) -> u64 {
        fs::metadata(path).map(|m| m.len()).unwrap_or_else(|e| {
            debug!("Failed to get {} size: {e}", path.display());
            0
        })
    }
    fn modified(path: &Path) -> SystemTime {
        fs::metadata(path)
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH)
    }

    let compare: fn(&PathBuf, &PathBuf) -> Ordering = match order {
        FilesOrderBy::None => return files,
        FilesOrderBy::NameAsc => |a, b| name_key(a).cmp(&name_key(b)),
        FilesOrderBy::NameDesc => |a, b| name_key(b).cmp(&name_key(a)),
        FilesOrderBy::SizeAsc => |a, b| size(a).cmp(&size(b)),
        FilesOrderBy::SizeDesc => |a, b| size(b).cmp(&size(a)),
        FilesOrderBy::LastWriteTimeAsc => |a, b| modified(a).cmp(&modified(b)),
        FilesOrderBy::LastWriteTimeDesc => |a, b| modified(b).cmp(&modified(a)),
    };
    files.sort_by(compare);
    files
}

/// Longest directory prefix shared by all paths, compared case-insensitively.
pub fn longest_common_prefix_path(paths: &[PathBuf]) -> PathBuf {
    let Some(first) = paths.first() else {
        return PathBuf::new();
    };
    let base = first.parent().unwrap_or(first);

    let mut common: Vec<Component<'_>> = base.components().collect();
    for path in &paths[1..] {
        let shared = common
            .iter()
            .zip(path.components())
            .take_while(|(a, b)| {
                a.as_os_str().to_string_lossy().to_lowercase()
                    == b.as_os_str().to_string_lossy().to_lowercase()
            })
            .count();
        common.truncate(shared);
    }

    common.iter().collect()
}
