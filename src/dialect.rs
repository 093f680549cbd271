//! Parse-affecting options bundled into one immutable value.

use std::fmt;

/// Characters trimmed by [`TrimMode`], before removing the delimiter.
pub const WHITESPACE: &[char] = &[' ', '\t'];

/// Whitespace trimming applied to field content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TrimMode {
    /// Keep whitespace as is.
    #[default]
    None,
    /// Trim around unquoted fields and around the quotes of quoted fields.
    Trim,
    /// Trim the content inside quotes.
    InsideQuotes,
    /// Both [`TrimMode::Trim`] and [`TrimMode::InsideQuotes`].
    Both,
}

impl TrimMode {
    pub fn trims_outside(&self) -> bool {
        matches!(self, TrimMode::Trim | TrimMode::Both)
    }

    pub fn trims_inside_quotes(&self) -> bool {
        matches!(self, TrimMode::InsideQuotes | TrimMode::Both)
    }
}

/// Which of the quote and escape characters are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StrictMode {
    /// Quotes delimit fields; the escape character escapes quotes inside them.
    #[default]
    Rfc4180,
    /// No quoting; the escape character makes the next character literal.
    Escape,
    /// Quotes delimit fields; no escape processing.
    NoEscape,
}

/// How the file is opened while it is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FileLocking {
    /// Hold a shared advisory lock so that cooperating writers are kept out.
    #[default]
    Exclusive,
    /// Plain read; other processes may modify the file meanwhile.
    Shared,
}

/// CSV dialect: every option that governs how bytes are split into fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DialectConfig {
    /// Field delimiter; `None` means auto-detect.
    pub delimiter: Option<String>,
    pub quote: Option<char>,
    pub escape: Option<char>,
    pub comment_char: Option<char>,
    pub comments_enabled: bool,
    pub bad_data_tolerant: bool,
    pub blank_lines_ignored: bool,
    pub trim_mode: TrimMode,
    pub strict_mode: StrictMode,
    /// Physical lines dropped before the header/data stream begins.
    pub leading_rows_to_skip: usize,
    pub file_locking: FileLocking,
}

impl Default for DialectConfig {
    fn default() -> Self {
        Self {
            delimiter: None,
            quote: Some('"'),
            escape: Some('"'),
            comment_char: Some('#'),
            comments_enabled: false,
            bad_data_tolerant: false,
            blank_lines_ignored: true,
            trim_mode: TrimMode::None,
            strict_mode: StrictMode::Rfc4180,
            leading_rows_to_skip: 0,
            file_locking: FileLocking::Exclusive,
        }
    }
}

impl DialectConfig {
    /// Copy of this dialect with a resolved single-character delimiter.
    pub fn with_delimiter(&self, delimiter: char) -> Self {
        Self {
            delimiter: Some(delimiter.to_string()),
            ..self.clone()
        }
    }

    /// The delimiter the tokenizer splits on (first char of the configured one).
    pub fn delimiter_char(&self) -> Option<char> {
        self.delimiter.as_deref().and_then(|d| d.chars().next())
    }

    /// Whitespace characters subject to trimming.
    ///
    /// A single-character delimiter is never trimmed.
    pub fn whitespace_chars(&self) -> Vec<char> {
        let single = self
            .delimiter
            .as_deref()
            .filter(|d| d.chars().count() == 1)
            .and_then(|d| d.chars().next());

        WHITESPACE
            .iter()
            .copied()
            .filter(|&c| Some(c) != single)
            .collect()
    }

    /// Quote character if quoting is active in the current mode.
    pub fn active_quote(&self) -> Option<char> {
        match self.strict_mode {
            StrictMode::Rfc4180 | StrictMode::NoEscape => self.quote,
            StrictMode::Escape => None,
        }
    }

    /// Escape character if escaping is active in the current mode.
    pub fn active_escape(&self) -> Option<char> {
        match self.strict_mode {
            StrictMode::Rfc4180 | StrictMode::Escape => self.escape,
            StrictMode::NoEscape => None,
        }
    }

    /// Comment character if comment skipping is enabled.
    pub fn active_comment(&self) -> Option<char> {
        self.comment_char.filter(|_| self.comments_enabled)
    }
}

impl fmt::Display for DialectConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |c: Option<char>| c.map_or_else(|| "none".to_string(), |c| format!("{c:?}"));
        write!(
            f,
            "delimiter={} quote={} escape={} comment={} mode={:?} trim={:?} skip={}",
            self.delimiter
                .as_deref()
                .map_or_else(|| "auto".to_string(), |d| format!("{d:?}")),
            show(self.active_quote()),
            show(self.active_escape()),
            show(self.active_comment()),
            self.strict_mode,
            self.trim_mode,
            self.leading_rows_to_skip,
        )
    }
}

/// Parse a user supplied delimiter.
///
/// Empty input means auto-detect; `\t` style escapes are unescaped.
pub fn parse_delimiter(raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('s') => out.push(' '),
            Some('\\') | None => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
        }
    }

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_excludes_delimiter() {
        let dialect = DialectConfig::default().with_delimiter('\t');
        assert_eq!(dialect.whitespace_chars(), vec![' ']);

        let dialect = DialectConfig::default().with_delimiter(',');
        assert_eq!(dialect.whitespace_chars(), vec![' ', '\t']);

        let dialect = DialectConfig {
            delimiter: Some(" \t".to_string()),
            ..DialectConfig::default()
        };
        assert_eq!(dialect.whitespace_chars(), vec![' ', '\t']);
    }

    #[test]
    fn test_mode_controls_quote_and_escape() {
        let mut dialect = DialectConfig {
            escape: Some('\\'),
            ..DialectConfig::default()
        };
        assert_eq!(dialect.active_quote(), Some('"'));
        assert_eq!(dialect.active_escape(), Some('\\'));

        dialect.strict_mode = StrictMode::Escape;
        assert_eq!(dialect.active_quote(), None);
        assert_eq!(dialect.active_escape(), Some('\\'));

        dialect.strict_mode = StrictMode::NoEscape;
        assert_eq!(dialect.active_quote(), Some('"'));
        assert_eq!(dialect.active_escape(), None);
    }

    #[test]
    fn test_comment_requires_enable_flag() {
        let mut dialect = DialectConfig::default();
        assert_eq!(dialect.active_comment(), None);
        dialect.comments_enabled = true;
        assert_eq!(dialect.active_comment(), Some('#'));
    }

    #[test]
    fn test_parse_delimiter() {
        assert_eq!(parse_delimiter(""), None);
        assert_eq!(parse_delimiter("\\t").as_deref(), Some("\t"));
        assert_eq!(parse_delimiter(";").as_deref(), Some(";"));
        assert_eq!(parse_delimiter("a\\\\b").as_deref(), Some("a\\b"));
    }
}
