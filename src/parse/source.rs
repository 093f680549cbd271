//! Streaming character source over an encoded byte reader.

use std::io::{self, ErrorKind, Read};

use crate::encoding::{TextDecoder, TextEncoding};

/// Bytes read from the underlying reader per refill.
const CHUNK_SIZE: usize = 64 * 1024;

/// Decodes a byte reader chunk by chunk and hands out characters.
///
/// Only one decoded chunk is held in memory at a time.
pub struct CharSource<R> {
    reader: R,
    decoder: TextDecoder,
    bytes: Vec<u8>,
    text: String,
    pos: usize,
    eof: bool,
}

impl<R: Read> CharSource<R> {
    pub fn new(reader: R, encoding: TextEncoding) -> Self {
        Self {
            reader,
            decoder: encoding.decoder(),
            bytes: vec![0; CHUNK_SIZE],
            text: String::new(),
            pos: 0,
            eof: false,
        }
    }

    /// Make sure decoded text is available. Returns false at end of input.
    fn fill(&mut self) -> io::Result<bool> {
        while self.pos >= self.text.len() {
            if self.eof {
                return Ok(false);
            }
            self.text.clear();
            self.pos = 0;

            let read = loop {
                match self.reader.read(&mut self.bytes) {
                    Ok(n) => break n,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            };

            if read == 0 {
                self.eof = true;
                self.decoder.decode(&[], &mut self.text, true);
            } else {
                self.decoder.decode(&self.bytes[..read], &mut self.text, false);
            }
        }
        Ok(true)
    }

    /// Look at the next character without consuming it.
    pub fn peek(&mut self) -> io::Result<Option<char>> {
        if !self.fill()? {
            return Ok(None);
        }
        Ok(self.text[self.pos..].chars().next())
    }

    /// Consume and return the next character.
    pub fn next_char(&mut self) -> io::Result<Option<char>> {
        let c = self.peek()?;
        if let Some(c) = c {
            self.pos += c.len_utf8();
        }
        Ok(c)
    }

    /// Consume `expected` if it is the next character.
    pub fn eat(&mut self, expected: char) -> io::Result<bool> {
        if self.peek()? == Some(expected) {
            self.pos += expected.len_utf8();
            return Ok(true);
        }
        Ok(false)
    }

    /// Read one physical line without its terminator (`\n`, `\r\n` or `\r`).
    ///
    /// Returns `None` at end of input.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        loop {
            match self.next_char()? {
                None if line.is_empty() => return Ok(None),
                None | Some('\n') => return Ok(Some(line)),
                Some('\r') => {
                    self.eat('\n')?;
                    return Ok(Some(line));
                }
                Some(c) => line.push(c),
            }
        }
    }
}
