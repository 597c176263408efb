//! Character encoding support: detection, conversion and byte order marks.
//!
//! Readers and writers never convert text themselves, they go through a
//! [`Transcoder`]. [`DefaultTranscoder`] is backed by `encoding_rs` and is what
//! the builders use unless another implementation is supplied.

use std::borrow::Cow;

use encoding_rs::{Decoder, EncoderResult, Encoding, REPLACEMENT, UTF_16BE, UTF_16LE, UTF_8};

use crate::{
    core::dialect::TranslitPolicy,
    error::{CsvError, CsvResult},
};

/// Byte order mark table.
pub mod bom;

/// Heuristic encoding detection.
pub mod detect;

/// ASCII fallbacks used by the transliterate policy.
pub mod translit;

/// Streaming decoder to UTF-8.
pub mod reader;

pub use detect::DetectionConfig;
pub use reader::DecodingReader;

/// Whether every ASCII character is encoded as its own single byte in
/// `label`, so CSV structure can be matched on raw bytes.
///
/// # Errors
///
/// [`CsvError::UnsupportedEncoding`] when the label is unknown.
pub fn is_ascii_compatible(label: &str) -> CsvResult<bool> {
    Charset::resolve(label).map(|charset| charset.is_ascii_compatible())
}

/// Encoding collaborator used by readers and writers.
pub trait Transcoder {
    /// Guesses the encoding of `sample`, or returns `fallback` when nothing
    /// can be said.
    fn detect(&self, sample: &[u8], fallback: &str) -> String;

    /// Converts `input` from one encoding to another.
    ///
    /// # Errors
    ///
    /// - [`CsvError::UnsupportedEncoding`] when either label is unknown.
    /// - [`CsvError::MalformedInput`] / [`CsvError::Unmappable`] under the
    ///   strict policy.
    fn convert(
        &self,
        input: &[u8],
        from: &str,
        to: &str,
        policy: TranslitPolicy,
    ) -> CsvResult<Vec<u8>>;
}

/// Resolved encoding label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Charset {
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
    Legacy(&'static Encoding),
}

impl Charset {
    fn resolve(label: &str) -> CsvResult<Self> {
        let normalized = label.trim().to_ascii_uppercase().replace('_', "-");

        match normalized.as_str() {
            "UTF-32LE" | "UTF-32" => return Ok(Charset::Utf32Le),
            "UTF-32BE" => return Ok(Charset::Utf32Be),
            _ => {}
        }

        let encoding = Encoding::for_label(label.trim().as_bytes())
            .or_else(|| Encoding::for_label(normalized.as_bytes()));

        match encoding {
            Some(encoding) if encoding == UTF_8 => Ok(Charset::Utf8),
            Some(encoding) if encoding == UTF_16LE => Ok(Charset::Utf16Le),
            Some(encoding) if encoding == UTF_16BE => Ok(Charset::Utf16Be),
            Some(encoding) if encoding != REPLACEMENT => Ok(Charset::Legacy(encoding)),
            _ => Err(CsvError::UnsupportedEncoding(label.to_string())),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Charset::Utf8 => "UTF-8",
            Charset::Utf16Le => "UTF-16LE",
            Charset::Utf16Be => "UTF-16BE",
            Charset::Utf32Le => "UTF-32LE",
            Charset::Utf32Be => "UTF-32BE",
            Charset::Legacy(encoding) => encoding.name(),
        }
    }

    fn is_ascii_compatible(&self) -> bool {
        match self {
            Charset::Utf8 => true,
            Charset::Legacy(encoding) => encoding.is_ascii_compatible(),
            _ => false,
        }
    }

    /// Streaming `encoding_rs` decoder, `None` for UTF-32 which it does not
    /// know.
    fn new_decoder(&self) -> Option<Decoder> {
        let encoding = match self {
            Charset::Utf32Le | Charset::Utf32Be => return None,
            Charset::Utf8 => UTF_8,
            Charset::Utf16Le => UTF_16LE,
            Charset::Utf16Be => UTF_16BE,
            Charset::Legacy(encoding) => *encoding,
        };

        Some(encoding.new_decoder_without_bom_handling())
    }

    fn utf32_char(&self, bytes: [u8; 4]) -> Option<char> {
        let unit = match self {
            Charset::Utf32Be => u32::from_be_bytes(bytes),
            _ => u32::from_le_bytes(bytes),
        };
        char::from_u32(unit)
    }

    fn decode<'a>(&self, input: &'a [u8], policy: TranslitPolicy) -> CsvResult<Cow<'a, str>> {
        let encoding = match self {
            Charset::Utf32Le | Charset::Utf32Be => return self.decode_utf32(input, policy),
            Charset::Utf8 => UTF_8,
            Charset::Utf16Le => UTF_16LE,
            Charset::Utf16Be => UTF_16BE,
            Charset::Legacy(encoding) => *encoding,
        };

        let (text, had_errors) = encoding.decode_without_bom_handling(input);
        if !had_errors {
            return Ok(text);
        }

        match policy {
            TranslitPolicy::Strict => Err(CsvError::MalformedInput {
                encoding: self.name().to_string(),
            }),
            TranslitPolicy::Ignore => Ok(Cow::Owned(text.replace('\u{FFFD}', ""))),
            TranslitPolicy::Transliterate => Ok(text),
        }
    }

    fn decode_utf32<'a>(&self, input: &[u8], policy: TranslitPolicy) -> CsvResult<Cow<'a, str>> {
        let mut text = String::with_capacity(input.len() / 4);
        for chunk in input.chunks(4) {
            let decoded = <[u8; 4]>::try_from(chunk)
                .ok()
                .and_then(|bytes| self.utf32_char(bytes));

            match (decoded, policy) {
                (Some(c), _) => text.push(c),
                (None, TranslitPolicy::Strict) => {
                    return Err(CsvError::MalformedInput {
                        encoding: self.name().to_string(),
                    });
                }
                (None, TranslitPolicy::Ignore) => {}
                (None, TranslitPolicy::Transliterate) => text.push('\u{FFFD}'),
            }
        }

        Ok(Cow::Owned(text))
    }

    fn encode(&self, text: &str, policy: TranslitPolicy) -> CsvResult<Vec<u8>> {
        let bytes = match self {
            Charset::Utf8 => text.as_bytes().to_vec(),
            Charset::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            Charset::Utf16Be => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
            Charset::Utf32Le => text.chars().flat_map(|c| (c as u32).to_le_bytes()).collect(),
            Charset::Utf32Be => text.chars().flat_map(|c| (c as u32).to_be_bytes()).collect(),
            Charset::Legacy(encoding) => return encode_legacy(*encoding, text, policy),
        };

        Ok(bytes)
    }
}

fn encode_legacy(
    encoding: &'static Encoding,
    text: &str,
    policy: TranslitPolicy,
) -> CsvResult<Vec<u8>> {
    let mut encoder = encoding.new_encoder();
    let mut output = Vec::with_capacity(text.len() + 16);
    let mut rest = text;

    loop {
        let (result, read) =
            encoder.encode_from_utf8_to_vec_without_replacement(rest, &mut output, true);
        rest = &rest[read..];

        match result {
            EncoderResult::InputEmpty => return Ok(output),
            EncoderResult::OutputFull => output.reserve(rest.len() + 16),
            EncoderResult::Unmappable(character) => match policy {
                TranslitPolicy::Strict => {
                    return Err(CsvError::Unmappable {
                        character,
                        encoding: encoding.name().to_string(),
                    });
                }
                TranslitPolicy::Ignore => {}
                TranslitPolicy::Transliterate => {
                    let (bytes, _, unmappable) = encoding.encode(translit::transliterate(character));
                    if unmappable {
                        output.extend_from_slice(translit::UNKNOWN.as_bytes());
                    } else {
                        output.extend_from_slice(&bytes);
                    }
                }
            },
        }
    }
}

/// [`Transcoder`] backed by `encoding_rs`.
///
/// Understands every WHATWG label (`CP1252`, `windows-1252`, `ISO-8859-15`,
/// `Shift_JIS`, ...) plus UTF-32LE/BE. UTF-7 is not supported.
///
/// # Examples
///
/// ```
/// use dialect_csv::core::dialect::TranslitPolicy;
/// use dialect_csv::encoding::{DefaultTranscoder, Transcoder};
///
/// let transcoder = DefaultTranscoder::new();
///
/// let latin = transcoder
///     .convert("prénom".as_bytes(), "UTF-8", "CP1252", TranslitPolicy::Strict)
///     .unwrap();
/// assert_eq!(latin, b"pr\xe9nom");
///
/// assert_eq!(transcoder.detect(&latin, "UTF-8"), "windows-1252");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTranscoder {
    detection: DetectionConfig,
}

impl DefaultTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_detection_config(detection: DetectionConfig) -> Self {
        Self { detection }
    }
}

impl Transcoder for DefaultTranscoder {
    fn detect(&self, sample: &[u8], fallback: &str) -> String {
        detect::detect_encoding(sample, self.detection)
            .map(str::to_string)
            .unwrap_or_else(|| fallback.to_string())
    }

    fn convert(
        &self,
        input: &[u8],
        from: &str,
        to: &str,
        policy: TranslitPolicy,
    ) -> CsvResult<Vec<u8>> {
        let from = Charset::resolve(from)?;
        let to = Charset::resolve(to)?;

        if from == to && to != Charset::Utf8 {
            return Ok(input.to_vec());
        }

        let text = from.decode(input, policy)?;
        to.encode(&text, policy)
    }
}
