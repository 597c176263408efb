use std::io::{self, ErrorKind, Read, Seek, SeekFrom};

use encoding_rs::{Decoder, DecoderResult};

use crate::{
    core::dialect::TranslitPolicy,
    error::{CsvError, CsvResult},
};

use super::Charset;

const CHUNK_SIZE: usize = 8 * 1024;
const REPLACEMENT_CHARACTER: &str = "\u{FFFD}";

/// [`Read`] adapter turning a stream in any supported encoding into UTF-8.
///
/// Malformed input follows the policy: it becomes U+FFFD when
/// transliterating and is dropped when ignoring. Under the strict policy the
/// text decoded so far is handed out first, then the next read fails with an
/// [`ErrorKind::InvalidData`] error wrapping [`CsvError::MalformedInput`].
/// Reading may go on after that error, past the faulty bytes.
///
/// A BOM is not interpreted: it comes out as U+FEFF.
///
/// # Examples
///
/// ```
/// use std::io::Read;
///
/// use dialect_csv::core::dialect::TranslitPolicy;
/// use dialect_csv::encoding::DecodingReader;
///
/// let utf16: &[u8] = &[b'n', 0, 0xE9, 0, b'\n', 0];
/// let mut reader = DecodingReader::new(utf16, "UTF-16LE", TranslitPolicy::Strict).unwrap();
///
/// let mut text = String::new();
/// reader.read_to_string(&mut text).unwrap();
/// assert_eq!(text, "né\n");
/// ```
pub struct DecodingReader<R> {
    inner: R,
    charset: Charset,
    policy: TranslitPolicy,
    decoder: Option<Decoder>,
    input: Vec<u8>,
    input_done: bool,
    finished: bool,
    output: Vec<u8>,
    output_pos: usize,
    malformed: bool,
}

impl<R> DecodingReader<R> {
    /// Wraps `inner`, read as `encoding`.
    ///
    /// # Errors
    ///
    /// [`CsvError::UnsupportedEncoding`] when the label is unknown.
    pub fn new(inner: R, encoding: &str, policy: TranslitPolicy) -> CsvResult<Self> {
        let charset = Charset::resolve(encoding)?;

        Ok(Self {
            inner,
            charset,
            policy,
            decoder: charset.new_decoder(),
            input: Vec::new(),
            input_done: false,
            finished: false,
            output: Vec::new(),
            output_pos: 0,
            malformed: false,
        })
    }

    /// Canonical name of the source encoding.
    pub fn encoding(&self) -> &'static str {
        self.charset.name()
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn reset(&mut self) {
        self.decoder = self.charset.new_decoder();
        self.input.clear();
        self.input_done = false;
        self.finished = false;
        self.output.clear();
        self.output_pos = 0;
        self.malformed = false;
    }

    /// Decodes buffered input into `output` and returns how many input bytes
    /// were used.
    fn decode_input(&mut self, last: bool) -> usize {
        let Some(decoder) = self.decoder.as_mut() else {
            return self.decode_utf32(last);
        };

        let mut buffer = [0u8; CHUNK_SIZE];
        let mut read = 0;

        loop {
            let (result, consumed, written) =
                decoder.decode_to_utf8_without_replacement(&self.input[read..], &mut buffer, last);
            read += consumed;
            self.output.extend_from_slice(&buffer[..written]);

            match result {
                DecoderResult::InputEmpty => return read,
                DecoderResult::OutputFull => {}
                DecoderResult::Malformed(_, _) => match self.policy {
                    TranslitPolicy::Strict => {
                        self.malformed = true;
                        return read;
                    }
                    TranslitPolicy::Ignore => {}
                    TranslitPolicy::Transliterate => self
                        .output
                        .extend_from_slice(REPLACEMENT_CHARACTER.as_bytes()),
                },
            }
        }
    }

    fn decode_utf32(&mut self, last: bool) -> usize {
        let mut read = 0;

        for chunk in self.input.chunks(4) {
            let decoded = match <[u8; 4]>::try_from(chunk) {
                Ok(bytes) => self.charset.utf32_char(bytes),
                // Wait for the rest of the code unit.
                Err(_) if !last => return read,
                Err(_) => None,
            };
            read += chunk.len();

            match (decoded, self.policy) {
                (Some(c), _) => self
                    .output
                    .extend_from_slice(c.encode_utf8(&mut [0; 4]).as_bytes()),
                (None, TranslitPolicy::Strict) => {
                    self.malformed = true;
                    return read;
                }
                (None, TranslitPolicy::Ignore) => {}
                (None, TranslitPolicy::Transliterate) => self
                    .output
                    .extend_from_slice(REPLACEMENT_CHARACTER.as_bytes()),
            }
        }

        read
    }
}

impl<R: Read> DecodingReader<R> {
    /// Refills `output`. Leaves it empty only at end of stream.
    fn fill_output(&mut self) -> io::Result<()> {
        self.output.clear();
        self.output_pos = 0;

        while self.output.is_empty() {
            if self.malformed {
                self.malformed = false;
                return Err(io::Error::new(
                    ErrorKind::InvalidData,
                    CsvError::MalformedInput {
                        encoding: self.charset.name().to_string(),
                    },
                ));
            }
            if self.finished {
                return Ok(());
            }

            if !self.input_done {
                let mut chunk = [0u8; CHUNK_SIZE];
                let read = loop {
                    match self.inner.read(&mut chunk) {
                        Ok(read) => break read,
                        Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                        Err(err) => return Err(err),
                    }
                };

                if read == 0 {
                    self.input_done = true;
                } else {
                    self.input.extend_from_slice(&chunk[..read]);
                }
            }

            let last = self.input_done;
            let used = self.decode_input(last);
            self.input.drain(..used);

            if last && self.input.is_empty() && !self.malformed {
                self.finished = true;
            }
        }

        Ok(())
    }
}

impl<R: Read> Read for DecodingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.output_pos >= self.output.len() {
            self.fill_output()?;
        }

        let pending = &self.output[self.output_pos..];
        let amount = pending.len().min(buf.len());
        buf[..amount].copy_from_slice(&pending[..amount]);
        self.output_pos += amount;

        Ok(amount)
    }
}

impl<R: Read + Seek> Seek for DecodingReader<R> {
    /// Moves to an offset counted in decoded bytes.
    ///
    /// Only [`SeekFrom::Start`] is supported. The source is decoded again from
    /// its beginning up to the target.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let SeekFrom::Start(target) = pos else {
            return Err(io::Error::new(
                ErrorKind::Unsupported,
                "decoded streams only seek from the start",
            ));
        };

        self.inner.seek(SeekFrom::Start(0))?;
        self.reset();
        if target == 0 {
            return Ok(0);
        }

        // Faulty bytes decode to nothing under both policies.
        let policy = self.policy;
        if policy == TranslitPolicy::Strict {
            self.policy = TranslitPolicy::Ignore;
        }
        let skipped = io::copy(&mut self.by_ref().take(target), &mut io::sink());
        self.policy = policy;

        skipped
    }
}
