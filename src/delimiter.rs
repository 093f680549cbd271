//! Field delimiter detection from the first line of a file.

use std::path::Path;

use tracing::{debug, info};

/// Candidates for TSV files, ordered by priority.
pub const TSV_CANDIDATES: &[u8] = b"\t,;";

/// Candidates for CSV and every other file type, ordered by priority.
pub const CSV_CANDIDATES: &[u8] = b",;\t";

/// Priority-ordered delimiter candidates for a file, selected by extension.
pub fn candidates_for(path: &Path) -> &'static [u8] {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => TSV_CANDIDATES,
        _ => CSV_CANDIDATES,
    }
}

/// Pick the most frequent candidate in `line`.
///
/// Ties go to the candidate listed first; when no candidate occurs the first
/// candidate is returned. `candidates` must not be empty.
pub fn detect_delimiter_in_line(line: &str, candidates: &[u8]) -> u8 {
    let bytes = line.as_bytes();
    let mut best = candidates[0];
    let mut best_count = 0;

    for &candidate in candidates {
        let count = bytecount::count(bytes, candidate);
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }

    best
}

/// Detect the delimiter of `path` from its first line.
///
/// A `None` line (unreadable or empty file) falls back to the highest priority
/// candidate.
pub fn detect_delimiter(path: &Path, first_line: Option<&str>) -> u8 {
    let candidates = candidates_for(path);
    let default = candidates[0];

    let Some(line) = first_line else {
        debug!(
            "No first line in {}, using delimiter {:?}",
            path.display(),
            default as char
        );
        return default;
    };

    let delimiter = detect_delimiter_in_line(line, candidates);
    if delimiter != default {
        info!(
            "Using delimiter {:?} for {}",
            delimiter as char,
            path.display()
        );
    }

    delimiter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_by_extension() {
        assert_eq!(candidates_for(Path::new("a.TSV")), TSV_CANDIDATES);
        assert_eq!(candidates_for(Path::new("a.csv")), CSV_CANDIDATES);
        assert_eq!(candidates_for(Path::new("a.log")), CSV_CANDIDATES);
        assert_eq!(candidates_for(Path::new("noext")), CSV_CANDIDATES);
    }

    #[test]
    fn test_tie_goes_to_tab_for_tsv() {
        assert_eq!(detect_delimiter(Path::new("data.tsv"), Some("a\tb,c")), b'\t');
        assert_eq!(detect_delimiter(Path::new("data.csv"), Some("a\tb,c")), b',');
    }

    #[test]
    fn test_most_frequent_wins() {
        assert_eq!(detect_delimiter(Path::new("x.csv"), Some("a;b;c,d")), b';');
        assert_eq!(detect_delimiter(Path::new("x.csv"), Some("a\tb\tc")), b'\t');
    }

    #[test]
    fn test_no_candidate_falls_back() {
        assert_eq!(detect_delimiter(Path::new("x.tsv"), Some("single")), b'\t');
        assert_eq!(detect_delimiter(Path::new("x.csv"), None), b',');
    }

    #[test]
    fn test_detection_is_deterministic() {
        let line = "a;b,c\td;e,f";
        let first = detect_delimiter_in_line(line, CSV_CANDIDATES);
        for _ in 0..10 {
            assert_eq!(detect_delimiter_in_line(line, CSV_CANDIDATES), first);
        }
        assert_eq!(first, b',');
    }
}
