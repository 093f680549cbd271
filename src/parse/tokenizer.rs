//! Field tokenizer driven by a [`DialectConfig`].

use std::io::Read;

use tracing::debug;

use super::source::CharSource;
use crate::dialect::{DialectConfig, StrictMode};
use crate::error::{IngestError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Reading an unquoted field.
    Unquoted,
    /// Inside a quoted section.
    InQuotes,
    /// Right after the closing quote of a quoted field.
    AfterQuote,
}

/// How a record ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordEnd {
    Newline,
    Eof,
}

/// Splits a character stream into records of fields.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    delimiter: char,
    quote: Option<char>,
    escape: Option<char>,
    comment: Option<char>,
    whitespace: Vec<char>,
    trim_outside: bool,
    trim_inside: bool,
    blank_lines_ignored: bool,
    bad_data_tolerant: bool,
    mode: StrictMode,
    /// 1-based physical line of the next character.
    line: usize,
}

impl Tokenizer {
    /// Build a tokenizer; a dialect without a resolved delimiter splits on commas.
    pub fn new(dialect: &DialectConfig) -> Self {
        Self {
            delimiter: dialect.delimiter_char().unwrap_or(','),
            quote: dialect.active_quote(),
            escape: dialect.active_escape(),
            comment: dialect.active_comment(),
            whitespace: dialect.whitespace_chars(),
            trim_outside: dialect.trim_mode.trims_outside(),
            trim_inside: dialect.trim_mode.trims_inside_quotes(),
            blank_lines_ignored: dialect.blank_lines_ignored,
            bad_data_tolerant: dialect.bad_data_tolerant,
            mode: dialect.strict_mode,
            line: 1,
        }
    }

    /// Line number the next record starts on.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Consume one physical line without tokenizing it.
    pub fn skip_line<R: Read>(&mut self, source: &mut CharSource<R>) -> Result<bool> {
        let skipped = source.read_line()?.is_some();
        if skipped {
            self.line += 1;
        }
        Ok(skipped)
    }

    fn is_whitespace(&self, c: char) -> bool {
        self.whitespace.contains(&c)
    }

    fn trim(&self, value: &str) -> String {
        value.trim_matches(|c| self.is_whitespace(c)).to_string()
    }

    fn bad_data(&self, message: &str) -> Result<()> {
        if self.bad_data_tolerant {
            debug!("Ignoring bad data at line {}: {message}", self.line);
            Ok(())
        } else {
            Err(IngestError::BadData {
                line: self.line,
                message: message.to_string(),
            })
        }
    }

    /// Consume the rest of the current line, including its terminator.
    fn skip_rest_of_line<R: Read>(&mut self, source: &mut CharSource<R>) -> Result<()> {
        source.read_line()?;
        self.line += 1;
        Ok(())
    }

    /// Consume a line terminator whose first character was `c`.
    fn end_line<R: Read>(&mut self, source: &mut CharSource<R>, c: char) -> Result<()> {
        if c == '\r' {
            source.eat('\n')?;
        }
        self.line += 1;
        Ok(())
    }

    /// Read the next record, skipping comment and blank lines as configured.
    ///
    /// Returns `Ok(None)` at end of input.
    pub fn read_record<R: Read>(
        &mut self,
        source: &mut CharSource<R>,
    ) -> Result<Option<Vec<String>>> {
        loop {
            if source.peek()?.is_none() {
                return Ok(None);
            }

            // Leading whitespace decides whether the line is blank or a comment.
            let mut lead = String::new();
            while let Some(c) = source.peek()? {
                if !self.is_whitespace(c) {
                    break;
                }
                lead.push(c);
                source.next_char()?;
            }

            match source.peek()? {
                Some(c) if Some(c) == self.comment => {
                    self.skip_rest_of_line(source)?;
                    continue;
                }
                None | Some('\n') | Some('\r') => {
                    if let Some(c) = source.next_char()? {
                        self.end_line(source, c)?;
                    }
                    if self.blank_lines_ignored {
                        continue;
                    }
                    let cell = if self.trim_outside { String::new() } else { lead };
                    return Ok(Some(vec![cell]));
                }
                Some(_) => return self.read_fields(source, lead).map(Some),
            }
        }
    }

    fn read_fields<R: Read>(
        &mut self,
        source: &mut CharSource<R>,
        lead: String,
    ) -> Result<Vec<String>> {
        let mut fields = Vec::new();
        let mut field = lead;
        loop {
            let (value, end) = self.read_field(source, field)?;
            fields.push(value);
            match end {
                Some(RecordEnd::Newline) | Some(RecordEnd::Eof) => return Ok(fields),
                None => field = String::new(),
            }
        }
    }

    /// Read one field starting with `field` as already consumed content.
    ///
    /// Returns the finished value and, when the record ended, how it ended.
    fn read_field<R: Read>(
        &mut self,
        source: &mut CharSource<R>,
        mut field: String,
    ) -> Result<(String, Option<RecordEnd>)> {
        let mut state = State::Unquoted;
        let mut quoted = false;
        // Unquoted content written so far is only whitespace that may be trimmed.
        let mut at_start = true;

        loop {
            let Some(c) = source.next_char()? else {
                if state == State::InQuotes {
                    self.bad_data("unterminated quoted field")?;
                }
                return Ok((self.finish(field, quoted), Some(RecordEnd::Eof)));
            };

            match state {
                State::Unquoted | State::AfterQuote if c == self.delimiter => {
                    return Ok((self.finish(field, quoted), None));
                }
                State::Unquoted | State::AfterQuote if c == '\n' || c == '\r' => {
                    self.end_line(source, c)?;
                    return Ok((self.finish(field, quoted), Some(RecordEnd::Newline)));
                }
                State::Unquoted => {
                    if Some(c) == self.quote {
                        let blank_so_far = field.is_empty()
                            || (self.trim_outside && field.chars().all(|c| self.is_whitespace(c)));
                        if at_start && blank_so_far {
                            field.clear();
                            quoted = true;
                            state = State::InQuotes;
                        } else if self.mode == StrictMode::NoEscape {
                            field.push(c);
                        } else {
                            self.bad_data("quote in unquoted field")?;
                            field.push(c);
                        }
                        continue;
                    }

                    if self.mode == StrictMode::Escape && Some(c) == self.escape {
                        match source.next_char()? {
                            Some(next) => {
                                if next == '\n' || next == '\r' {
                                    if next == '\r' && source.eat('\n')? {
                                        field.push('\r');
                                        field.push('\n');
                                    } else {
                                        field.push(next);
                                    }
                                    self.line += 1;
                                } else {
                                    field.push(next);
                                }
                            }
                            None => {
                                self.bad_data("escape character at end of input")?;
                                field.push(c);
                            }
                        }
                        at_start = false;
                        continue;
                    }

                    if !self.is_whitespace(c) {
                        at_start = false;
                    }
                    field.push(c);
                }
                State::InQuotes => {
                    if c == '\n' || (c == '\r' && source.peek()? != Some('\n')) {
                        self.line += 1;
                    }

                    if self.mode == StrictMode::Rfc4180 && Some(c) == self.escape {
                        if self.escape == self.quote {
                            // Doubled quote, or the closing quote.
                            if source.eat(c)? {
                                field.push(c);
                            } else {
                                state = State::AfterQuote;
                            }
                            continue;
                        }
                        match source.peek()? {
                            Some(next) if Some(next) == self.quote || next == c => {
                                source.next_char()?;
                                field.push(next);
                            }
                            _ => field.push(c),
                        }
                        continue;
                    }

                    if Some(c) == self.quote {
                        state = State::AfterQuote;
                    } else {
                        field.push(c);
                    }
                }
                State::AfterQuote => {
                    if self.mode == StrictMode::NoEscape && Some(c) == self.quote {
                        state = State::InQuotes;
                    } else if self.trim_outside && self.is_whitespace(c) {
                        // Padding between the closing quote and the delimiter.
                    } else {
                        self.bad_data("text after closing quote")?;
                        field.push(c);
                        state = State::Unquoted;
                        at_start = false;
                    }
                }
            }
        }
    }

    fn finish(&self, field: String, quoted: bool) -> String {
        let trim = if quoted {
            self.trim_inside
        } else {
            self.trim_outside
        };
        if trim { self.trim(&field) } else { field }
    }
}
