//! Encoding detection and streaming decoding using chardetng and `encoding_rs`.

use std::env;
use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};

use chardetng::EncodingDetector;
use encoding_rs::{CoderResult, Decoder, Encoding};
use tracing::debug;

/// Maximum number of bytes inspected by [`detect_stream_encoding`].
pub const DETECTION_PREFIX_LEN: usize = 8 * 1024;

/// Check if the given bytes are valid UTF-8.
///
/// Uses SIMD-accelerated validation for performance.
pub fn is_utf8(data: &[u8]) -> bool {
    simdutf8::basic::from_utf8(data).is_ok()
}

/// Like [`is_utf8`], but accepts a multi-byte sequence cut off at the end of the
/// buffer. Detection works on a prefix, so the last character may be incomplete.
pub fn is_utf8_prefix(data: &[u8]) -> bool {
    match simdutf8::compat::from_utf8(data) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none() && data.len() - e.valid_up_to() < 4,
    }
}

/// Check if the data starts with a UTF-8 BOM (Byte Order Mark).
///
/// The UTF-8 BOM is the byte sequence: EF BB BF
pub fn has_utf8_bom(data: &[u8]) -> bool {
    data.starts_with(&[0xEF, 0xBB, 0xBF])
}

/// A concrete text encoding the parser can decode.
///
/// `encoding_rs` covers the WHATWG encodings; UTF-32 is decoded by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Whatwg(&'static Encoding),
    Utf32Le,
    Utf32Be,
}

impl TextEncoding {
    pub const UTF_8: TextEncoding = TextEncoding::Whatwg(encoding_rs::UTF_8);

    /// Canonical name of the encoding.
    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Whatwg(encoding) => encoding.name(),
            TextEncoding::Utf32Le => "UTF-32LE",
            TextEncoding::Utf32Be => "UTF-32BE",
        }
    }

    /// Create a fresh streaming decoder. A leading BOM is removed.
    pub fn decoder(&self) -> TextDecoder {
        match self {
            TextEncoding::Whatwg(encoding) => TextDecoder::Whatwg(encoding.new_decoder()),
            TextEncoding::Utf32Le => TextDecoder::Utf32(Utf32Decoder::new(false)),
            TextEncoding::Utf32Be => TextDecoder::Utf32(Utf32Decoder::new(true)),
        }
    }
}

impl Default for TextEncoding {
    fn default() -> Self {
        TextEncoding::UTF_8
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Streaming decoder producing UTF-8 text from encoded bytes.
pub enum TextDecoder {
    Whatwg(Decoder),
    Utf32(Utf32Decoder),
}

impl TextDecoder {
    /// Decode `src`, appending to `dst`. Set `last` on the final chunk so that
    /// incomplete trailing sequences are flushed as replacement characters.
    pub fn decode(&mut self, src: &[u8], dst: &mut String, last: bool) {
        match self {
            TextDecoder::Whatwg(decoder) => {
                if let Some(needed) = decoder.max_utf8_buffer_length(src.len()) {
                    dst.reserve(needed);
                }
                let mut consumed = 0;
                loop {
                    let (result, read, _) =
                        decoder.decode_to_string(&src[consumed..], dst, last);
                    consumed += read;
                    match result {
                        CoderResult::InputEmpty => break,
                        CoderResult::OutputFull => {
                            let remaining = src.len() - consumed;
                            dst.reserve(
                                decoder
                                    .max_utf8_buffer_length(remaining)
                                    .unwrap_or(remaining * 4 + 16),
                            );
                        }
                    }
                }
            }
            TextDecoder::Utf32(decoder) => decoder.decode(src, dst, last),
        }
    }
}

/// Hand-written UTF-32 decoder (not part of the WHATWG encoding standard).
pub struct Utf32Decoder {
    big_endian: bool,
    pending: Vec<u8>,
    at_start: bool,
}

impl Utf32Decoder {
    fn new(big_endian: bool) -> Self {
        Self {
            big_endian,
            pending: Vec::with_capacity(4),
            at_start: true,
        }
    }

    fn decode(&mut self, src: &[u8], dst: &mut String, last: bool) {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(src);

        let mut units = bytes.chunks_exact(4);
        for unit in &mut units {
            let unit: [u8; 4] = [unit[0], unit[1], unit[2], unit[3]];
            let value = if self.big_endian {
                u32::from_be_bytes(unit)
            } else {
                u32::from_le_bytes(unit)
            };
            if std::mem::take(&mut self.at_start) && value == 0xFEFF {
                continue;
            }
            dst.push(char::from_u32(value).unwrap_or(char::REPLACEMENT_CHARACTER));
        }

        let rest = units.remainder();
        if last {
            if !rest.is_empty() {
                dst.push(char::REPLACEMENT_CHARACTER);
            }
        } else {
            self.pending.extend_from_slice(rest);
        }
    }
}

/// Fallback encoding applied when byte-level detection is disabled or inconclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EncodingChoice {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
    /// 7-bit ASCII, decoded as its windows-1252 superset.
    Ascii,
    /// Code page of the system locale (`LANG`).
    SystemCodePage,
    /// Code page of the user locale (`LC_ALL`, `LC_CTYPE`, then `LANG`).
    UserCodePage,
    /// Explicit Windows code page number, e.g. 1251.
    CodePage(u16),
}

impl EncodingChoice {
    /// Map the choice to a concrete encoding.
    pub fn resolve(&self) -> TextEncoding {
        match self {
            EncodingChoice::Utf8 => TextEncoding::UTF_8,
            EncodingChoice::Utf16Le => TextEncoding::Whatwg(encoding_rs::UTF_16LE),
            EncodingChoice::Utf16Be => TextEncoding::Whatwg(encoding_rs::UTF_16BE),
            EncodingChoice::Utf32Le => TextEncoding::Utf32Le,
            EncodingChoice::Utf32Be => TextEncoding::Utf32Be,
            EncodingChoice::Ascii => TextEncoding::Whatwg(encoding_rs::WINDOWS_1252),
            EncodingChoice::SystemCodePage => locale_encoding(&["LANG"]),
            EncodingChoice::UserCodePage => locale_encoding(&["LC_ALL", "LC_CTYPE", "LANG"]),
            EncodingChoice::CodePage(code_page) => code_page_encoding(*code_page)
                .unwrap_or_else(|| {
                    debug!("Unknown code page {code_page}, using UTF-8");
                    TextEncoding::UTF_8
                }),
        }
    }
}

/// Map a Windows code page number to an encoding.
pub fn code_page_encoding(code_page: u16) -> Option<TextEncoding> {
    use encoding_rs::*;

    let encoding = match code_page {
        866 => IBM866,
        874 => WINDOWS_874,
        932 => SHIFT_JIS,
        936 => GBK,
        949 => EUC_KR,
        950 => BIG5,
        1200 => UTF_16LE,
        1201 => UTF_16BE,
        1250 => WINDOWS_1250,
        1251 => WINDOWS_1251,
        1252 | 20127 | 28591 => WINDOWS_1252,
        1253 => WINDOWS_1253,
        1254 => WINDOWS_1254,
        1255 => WINDOWS_1255,
        1256 => WINDOWS_1256,
        1257 => WINDOWS_1257,
        1258 => WINDOWS_1258,
        10000 => MACINTOSH,
        10007 => X_MAC_CYRILLIC,
        12000 => return Some(TextEncoding::Utf32Le),
        12001 => return Some(TextEncoding::Utf32Be),
        20866 => KOI8_R,
        21866 => KOI8_U,
        20932 | 51932 => EUC_JP,
        28592 => ISO_8859_2,
        28593 => ISO_8859_3,
        28594 => ISO_8859_4,
        28595 => ISO_8859_5,
        28596 => ISO_8859_6,
        28597 => ISO_8859_7,
        28598 => ISO_8859_8,
        28603 => ISO_8859_13,
        28605 => ISO_8859_15,
        50220 => ISO_2022_JP,
        54936 => GB18030,
        65001 => UTF_8,
        _ => return None,
    };

    Some(TextEncoding::Whatwg(encoding))
}

/// Resolve the charset part of a POSIX locale (`ru_RU.CP1251@euro`).
fn locale_encoding(vars: &[&str]) -> TextEncoding {
    let charset = vars
        .iter()
        .filter_map(|var| env::var(var).ok())
        .find(|value| !value.is_empty())
        .and_then(|locale| {
            let charset = locale.split_once('.')?.1;
            Some(charset.split('@').next().unwrap_or(charset).to_string())
        });

    charset
        .and_then(|charset| {
            let label = charset.to_ascii_lowercase();
            let label = label.strip_prefix("cp").map_or(label.clone(), |n| format!("windows-{n}"));
            Encoding::for_label(label.as_bytes())
                .or_else(|| Encoding::for_label(charset.as_bytes()))
        })
        .map_or(TextEncoding::Whatwg(encoding_rs::WINDOWS_1252), TextEncoding::Whatwg)
}

/// Detect an encoding from its byte order mark.
///
/// Returns the encoding and the BOM length. UTF-32LE must be checked before
/// UTF-16LE because its BOM starts with the UTF-16LE one.
pub fn sniff_bom(data: &[u8]) -> Option<(TextEncoding, usize)> {
    if data.starts_with(&[0xFF, 0xFE, 0x00, 0x00]) {
        Some((TextEncoding::Utf32Le, 4))
    } else if data.starts_with(&[0x00, 0x00, 0xFE, 0xFF]) {
        Some((TextEncoding::Utf32Be, 4))
    } else if has_utf8_bom(data) {
        Some((TextEncoding::UTF_8, 3))
    } else if data.starts_with(&[0xFF, 0xFE]) {
        Some((TextEncoding::Whatwg(encoding_rs::UTF_16LE), 2))
    } else if data.starts_with(&[0xFE, 0xFF]) {
        Some((TextEncoding::Whatwg(encoding_rs::UTF_16BE), 2))
    } else {
        None
    }
}

/// Guess UTF-16 without a BOM from the distribution of zero bytes.
///
/// Mostly-ASCII UTF-16 text has a zero in every other byte.
fn sniff_utf16_without_bom(data: &[u8]) -> Option<TextEncoding> {
    let pairs = data.len() / 2;
    if pairs < 2 {
        return None;
    }

    let (mut even_zeros, mut odd_zeros) = (0usize, 0usize);
    for pair in data.chunks_exact(2) {
        even_zeros += usize::from(pair[0] == 0);
        odd_zeros += usize::from(pair[1] == 0);
    }

    if odd_zeros * 10 >= pairs * 4 && even_zeros * 10 < pairs {
        Some(TextEncoding::Whatwg(encoding_rs::UTF_16LE))
    } else if even_zeros * 10 >= pairs * 4 && odd_zeros * 10 < pairs {
        Some(TextEncoding::Whatwg(encoding_rs::UTF_16BE))
    } else {
        None
    }
}

/// Detect the encoding of a buffer.
///
/// Returns `None` when the data is inconclusive (empty or pure ASCII), in which
/// case the caller applies its fallback encoding.
pub fn detect_encoding(data: &[u8]) -> Option<TextEncoding> {
    if let Some((encoding, _)) = sniff_bom(data) {
        return Some(encoding);
    }

    if let Some(encoding) = sniff_utf16_without_bom(data) {
        return Some(encoding);
    }

    if data.is_ascii() {
        return None;
    }

    if is_utf8_prefix(data) {
        return Some(TextEncoding::UTF_8);
    }

    // Ambiguous single-byte data: fall back to the statistical detector.
    let mut detector = EncodingDetector::new();
    if !detector.feed(data, true) {
        return None;
    }
    Some(TextEncoding::Whatwg(detector.guess(None, true)))
}

/// Detect the encoding of a seekable stream from a bounded prefix.
///
/// The stream is rewound to the start afterwards so the parser sees the
/// complete content.
pub fn detect_stream_encoding<R: Read + Seek>(reader: &mut R) -> io::Result<Option<TextEncoding>> {
    let mut prefix = Vec::with_capacity(DETECTION_PREFIX_LEN);
    let read = reader
        .by_ref()
        .take(DETECTION_PREFIX_LEN as u64)
        .read_to_end(&mut prefix);
    reader.seek(SeekFrom::Start(0))?;
    read?;

    Ok(detect_encoding(&prefix))
}
