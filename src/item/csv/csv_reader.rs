use std::{
    fs::File,
    io::{self, BufRead, BufReader, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use log::{debug, warn};

use crate::{
    core::{
        dialect::{Dialect, TranslitPolicy},
        item::{ItemReader, ItemReaderResult, Row},
    },
    encoding::{self, DecodingReader, DefaultTranscoder, Transcoder},
    error::{CsvError, CsvResult, Mode},
};

use super::{is_empty_row, tokenizer::Tokenizer, trim_field};

/// Physical lines sampled when the source encoding has to be detected.
pub const DEFAULT_DETECTION_SAMPLE_LINES: usize = 100;

#[derive(Debug, Clone, PartialEq)]
enum Cursor {
    BeforeFirst,
    OnRow { index: usize, row: Row },
    Exhausted,
}

/// The bound stream. Sources in an ASCII compatible encoding are tokenized
/// as they are, the others are decoded to UTF-8 first.
enum Source<R> {
    Raw(R),
    Decoded(DecodingReader<R>),
}

impl<R> Source<R> {
    fn new(source: R, label: &str, policy: TranslitPolicy) -> CsvResult<Self> {
        // Unknown labels are reported by the first field conversion.
        if encoding::is_ascii_compatible(label).unwrap_or(true) {
            return Ok(Source::Raw(source));
        }

        debug!("Decoding {} source to UTF-8 before tokenizing", label);
        Ok(Source::Decoded(DecodingReader::new(source, label, policy)?))
    }

    /// Encoding of the fields the tokenizer hands out.
    fn field_encoding<'a>(&self, encoding: &'a str) -> &'a str {
        match self {
            Source::Raw(_) => encoding,
            Source::Decoded(_) => "UTF-8",
        }
    }
}

impl<R: Read> Read for Source<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Source::Raw(source) => source.read(buf),
            Source::Decoded(source) => source.read(buf),
        }
    }
}

impl<R: Read + Seek> Seek for Source<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Source::Raw(source) => source.seek(pos),
            Source::Decoded(source) => source.seek(pos),
        }
    }
}

/// Reads up to `lines` physical lines from the start of `source`, then puts
/// it back at the start.
fn sample_lines<R: Read + Seek>(source: &mut R, lines: usize) -> io::Result<Vec<u8>> {
    source.seek(SeekFrom::Start(0))?;

    let mut sample = Vec::new();
    {
        let mut reader = BufReader::new(source.by_ref());
        for _ in 0..lines {
            if reader.read_until(b'\n', &mut sample)? == 0 {
                break;
            }
        }
    }

    source.seek(SeekFrom::Start(0))?;
    Ok(sample)
}

/// Per-pass state: the BOM is looked for and the header row captured once
/// each time reading restarts from the beginning of the stream.
#[derive(Debug, Default)]
struct Pass {
    bom_checked: bool,
    headers: Option<Row>,
}

/// Turns raw records into rows: BOM strip, transcoding, trimming, empty row
/// skipping and header capture.
struct RowPipeline<'a> {
    dialect: &'a Dialect,
    transcoder: &'a dyn Transcoder,
    encoding: &'a str,
}

impl RowPipeline<'_> {
    fn decode(&self, raw: Vec<Vec<u8>>) -> CsvResult<Row> {
        raw.into_iter()
            .map(|field| {
                let bytes = self.transcoder.convert(
                    &field,
                    self.encoding,
                    "UTF-8",
                    self.dialect.translit(),
                )?;
                let text = String::from_utf8(bytes).map_err(|_| CsvError::MalformedInput {
                    encoding: self.encoding.to_string(),
                })?;

                Ok(if self.dialect.trim() {
                    trim_field(&text).to_string()
                } else {
                    text
                })
            })
            .collect()
    }

    fn next_row<R: Read>(
        &self,
        tokenizer: &mut Tokenizer<R>,
        pass: &mut Pass,
    ) -> CsvResult<Option<Row>> {
        loop {
            if !pass.bom_checked {
                pass.bom_checked = true;
                if self.dialect.use_bom() && tokenizer.skip_bom(self.encoding)? {
                    debug!("Skipped {} byte order mark", self.encoding);
                }
            }

            let Some(raw) = tokenizer.read_record()? else {
                return Ok(None);
            };

            let row = self.decode(raw)?;

            if self.dialect.skip_empty_lines() && is_empty_row(&row) {
                continue;
            }

            if self.dialect.first_row_header() && pass.headers.is_none() {
                debug!("Header row: {:?}", row);
                pass.headers = Some(row);
                continue;
            }

            return Ok(Some(row));
        }
    }
}

/// A dialect-aware CSV reader.
///
/// Rows come out as vectors of UTF-8 strings whatever the source encoding.
/// The reader is a cursor over the stream: [`advance`](CsvReader::advance)
/// moves to the next row, [`current`](CsvReader::current) and
/// [`position`](CsvReader::position) describe where it stands, and
/// [`rewind`](CsvReader::rewind) starts over. A quoted field may span several
/// physical lines.
///
/// Structural characters are matched byte-wise. Sources in an encoding that
/// is not ASCII compatible (UTF-16, UTF-32...) are decoded to UTF-8 before
/// being split.
///
/// # Examples
///
/// ```
/// use dialect_csv::core::dialect::Dialect;
/// use dialect_csv::item::csv::csv_reader::CsvReaderBuilder;
/// use std::io::Cursor;
///
/// let data = b"nom;pr\xe9nom\r\nMartin;Aur\xe9lie\r\n".to_vec();
///
/// let mut reader = CsvReaderBuilder::new()
///     .dialect(Dialect::excel())
///     .from_reader(Cursor::new(data))
///     .unwrap();
///
/// assert_eq!(reader.count().unwrap(), 2);
///
/// let rows = reader.rows().unwrap();
/// assert_eq!(rows[1], vec!["Martin", "Aurélie"]);
/// ```
pub struct CsvReader<R> {
    dialect: Dialect,
    transcoder: Box<dyn Transcoder>,
    sample_lines: usize,
    path: Option<PathBuf>,
    reopen: Option<fn(&Path) -> io::Result<R>>,
    tokenizer: Option<Tokenizer<Source<R>>>,
    encoding: String,
    pass: Pass,
    cursor: Cursor,
}

impl<R> CsvReader<R> {
    /// The dialect this reader parses.
    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// Encoding the source is decoded from: the dialect's, or the detected
    /// one once a stream has been opened with detection enabled.
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// The row under the cursor.
    pub fn current(&self) -> Option<&Row> {
        match &self.cursor {
            Cursor::OnRow { row, .. } => Some(row),
            _ => None,
        }
    }

    /// Zero-based index of the current row among the emitted rows.
    pub fn position(&self) -> Option<usize> {
        match self.cursor {
            Cursor::OnRow { index, .. } => Some(index),
            _ => None,
        }
    }

    /// Header row captured when the dialect has `first_row_header`, empty
    /// before the first read.
    pub fn headers(&self) -> &[String] {
        self.pass.headers.as_deref().unwrap_or(&[])
    }

    /// Whether a stream is currently bound.
    pub fn is_open(&self) -> bool {
        self.tokenizer.is_some()
    }

    /// Releases the bound stream. Calling it twice is harmless.
    ///
    /// A reader built from a path keeps the path and reopens it on the next
    /// [`rewind`](CsvReader::rewind).
    pub fn close(&mut self) {
        if self.tokenizer.take().is_some() {
            debug!("Reader closed");
        }
        self.cursor = Cursor::BeforeFirst;
    }

    fn restart(&mut self) {
        self.pass = Pass::default();
        self.cursor = Cursor::BeforeFirst;
    }
}

impl<R: Read + Seek> CsvReader<R> {
    /// Binds a new stream, closing the previous one first.
    ///
    /// Reading starts from the beginning of the stream. When the dialect
    /// forces detection the encoding is guessed here, once, from the first
    /// lines of the stream and kept for every later pass.
    pub fn open(&mut self, source: R) -> CsvResult<()> {
        self.close();
        self.path = None;
        self.reopen = None;
        self.bind(source)
    }

    fn bind(&mut self, mut source: R) -> CsvResult<()> {
        let detect = self.dialect.force_encoding_detection() || self.dialect.encoding().is_empty();
        self.encoding = if detect {
            let sample = sample_lines(&mut source, self.sample_lines)?;
            let detected = self.transcoder.detect(&sample, self.dialect.encoding());
            debug!("Detected encoding: {}", detected);
            detected
        } else {
            source.seek(SeekFrom::Start(0))?;
            self.dialect.encoding().to_string()
        };

        let source = Source::new(source, &self.encoding, self.dialect.translit())?;
        self.tokenizer = Some(Tokenizer::new(source, &self.dialect));
        self.restart();

        Ok(())
    }

    fn tokenizer(&mut self) -> CsvResult<&mut Tokenizer<Source<R>>> {
        if self.tokenizer.is_none() {
            let (Some(path), Some(reopen)) = (self.path.clone(), self.reopen) else {
                return Err(CsvError::InvalidFileHandle(Mode::Reading));
            };

            debug!("Reopening {}", path.display());
            let source = reopen(&path).map_err(|source| CsvError::InvalidHandle {
                path,
                mode: Mode::Reading,
                source,
            })?;
            let source = Source::new(source, &self.encoding, self.dialect.translit())?;
            self.tokenizer = Some(Tokenizer::new(source, &self.dialect));
            self.restart();
        }

        self.tokenizer
            .as_mut()
            .ok_or(CsvError::InvalidFileHandle(Mode::Reading))
    }

    /// Moves to the next row and returns it, `None` once the stream is
    /// exhausted.
    ///
    /// With `skip_empty_lines` rows whose fields are all empty after
    /// processing are passed over. When a record cannot be decoded the error
    /// is returned, the record is consumed and the cursor keeps its previous
    /// row.
    pub fn advance(&mut self) -> CsvResult<Option<&Row>> {
        let Some(tokenizer) = self.tokenizer.as_mut() else {
            return Err(CsvError::InvalidFileHandle(Mode::Reading));
        };
        if self.cursor == Cursor::Exhausted {
            return Ok(None);
        }

        let next = match &self.cursor {
            Cursor::OnRow { index, .. } => index + 1,
            _ => 0,
        };

        let pipeline = RowPipeline {
            dialect: &self.dialect,
            transcoder: self.transcoder.as_ref(),
            encoding: tokenizer.get_ref().field_encoding(&self.encoding),
        };
        let row = pipeline.next_row(tokenizer, &mut self.pass)?;

        self.cursor = match row {
            Some(row) => Cursor::OnRow { index: next, row },
            None => {
                debug!("End of stream after {} rows", next);
                Cursor::Exhausted
            }
        };

        Ok(self.current())
    }

    /// Goes back to the start of the stream and returns the first row.
    ///
    /// # Errors
    ///
    /// [`CsvError::InvalidFileHandle`] when no stream is bound and none can be
    /// reopened from a path.
    pub fn rewind(&mut self) -> CsvResult<Option<&Row>> {
        self.tokenizer()?.seek_to(0)?;
        self.restart();
        self.advance()
    }

    /// Same as [`advance`](CsvReader::advance) but hands the row over.
    pub fn read_row(&mut self) -> CsvResult<Option<Row>> {
        Ok(self.advance()?.cloned())
    }

    /// Lazily yields every row from the beginning of the stream.
    ///
    /// The first call to `next` rewinds, so the sequence can be walked again
    /// by calling `iter` again.
    pub fn iter(&mut self) -> Rows<'_, R> {
        Rows {
            reader: self,
            started: false,
            done: false,
        }
    }

    /// Every row of the stream.
    pub fn rows(&mut self) -> CsvResult<Vec<Row>> {
        self.iter().collect()
    }

    /// Number of rows a full pass yields.
    ///
    /// The count runs a separate pass through the same pipeline, then puts
    /// the stream back where it was: the cursor is not disturbed. The header
    /// row is not counted.
    pub fn count(&mut self) -> CsvResult<usize> {
        let tokenizer = self.tokenizer()?;
        let resume = tokenizer.offset();
        tokenizer.seek_to(0)?;

        let Some(tokenizer) = self.tokenizer.as_mut() else {
            return Err(CsvError::InvalidFileHandle(Mode::Reading));
        };
        let pipeline = RowPipeline {
            dialect: &self.dialect,
            transcoder: self.transcoder.as_ref(),
            encoding: tokenizer.get_ref().field_encoding(&self.encoding),
        };

        let mut pass = Pass::default();
        let mut count = 0;
        let result = loop {
            match pipeline.next_row(tokenizer, &mut pass) {
                Ok(Some(_)) => count += 1,
                Ok(None) => break Ok(count),
                Err(err) => break Err(err),
            }
        };

        tokenizer.seek_to(resume)?;
        result
    }
}

impl CsvReader<File> {
    /// Opens `path` and binds it, closing any previous stream.
    ///
    /// # Errors
    ///
    /// - [`CsvError::FileNotFound`] when nothing exists at `path`.
    /// - [`CsvError::InvalidHandle`] when the file cannot be opened.
    pub fn open_path<P: AsRef<Path>>(&mut self, path: P) -> CsvResult<()> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(CsvError::FileNotFound(path.to_path_buf()));
        }

        let file = File::open(path).map_err(|source| CsvError::InvalidHandle {
            path: path.to_path_buf(),
            mode: Mode::Reading,
            source,
        })?;

        self.close();
        self.path = Some(path.to_path_buf());
        self.reopen = Some(|path: &Path| File::open(path));
        debug!("Reading {}", path.display());

        self.bind(file)
    }
}

impl<R: Read + Seek> ItemReader<Row> for CsvReader<R> {
    /// Pulls the next row, so that a reader plugs into a [`Step`](crate::core::step::Step).
    fn read(&mut self) -> ItemReaderResult<Row> {
        self.read_row()
    }
}

/// Iterator returned by [`CsvReader::iter`].
pub struct Rows<'a, R> {
    reader: &'a mut CsvReader<R>,
    started: bool,
    done: bool,
}

impl<R: Read + Seek> Iterator for Rows<'_, R> {
    type Item = CsvResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let step = if self.started {
            self.reader.advance()
        } else {
            self.started = true;
            self.reader.rewind()
        };

        match step {
            Ok(Some(row)) => Some(Ok(row.clone())),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                if matches!(err, CsvError::Io(_) | CsvError::InvalidFileHandle(_)) {
                    self.done = true;
                }
                Some(Err(err))
            }
        }
    }
}

/// A builder for [`CsvReader`].
///
/// # Examples
///
/// ```
/// use dialect_csv::core::dialect::Dialect;
/// use dialect_csv::item::csv::csv_reader::CsvReaderBuilder;
/// use std::io::Cursor;
///
/// let mut reader = CsvReaderBuilder::new()
///     .dialect(Dialect::unix().to_builder().first_row_header(true).build())
///     .from_reader(Cursor::new("name,age\nAlice,30\n"))
///     .unwrap();
///
/// assert_eq!(reader.read_row().unwrap(), Some(vec!["Alice".to_string(), "30".to_string()]));
/// assert_eq!(reader.headers(), ["name", "age"]);
/// ```
pub struct CsvReaderBuilder {
    dialect: Dialect,
    transcoder: Option<Box<dyn Transcoder>>,
    sample_lines: usize,
}

impl Default for CsvReaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvReaderBuilder {
    /// Excel dialect, default transcoder, 100 detection lines.
    pub fn new() -> Self {
        Self {
            dialect: Dialect::default(),
            transcoder: None,
            sample_lines: DEFAULT_DETECTION_SAMPLE_LINES,
        }
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Replaces the [`DefaultTranscoder`].
    pub fn transcoder<T: Transcoder + 'static>(mut self, transcoder: T) -> Self {
        self.transcoder = Some(Box::new(transcoder));
        self
    }

    /// Number of lines sampled for encoding detection.
    pub fn detection_sample_lines(mut self, lines: usize) -> Self {
        if lines == 0 {
            warn!("Detection needs at least one line, keeping {}", self.sample_lines);
        } else {
            self.sample_lines = lines;
        }
        self
    }

    /// A reader with no stream bound yet, see [`CsvReader::open`].
    pub fn build<R>(self) -> CsvReader<R> {
        let encoding = self.dialect.encoding().to_string();

        CsvReader {
            dialect: self.dialect,
            transcoder: self
                .transcoder
                .unwrap_or_else(|| Box::new(DefaultTranscoder::new())),
            sample_lines: self.sample_lines,
            path: None,
            reopen: None,
            tokenizer: None,
            encoding,
            pass: Pass::default(),
            cursor: Cursor::BeforeFirst,
        }
    }

    /// Builds a reader over any seekable stream.
    pub fn from_reader<R: Read + Seek>(self, rdr: R) -> CsvResult<CsvReader<R>> {
        let mut reader = self.build();
        reader.open(rdr)?;
        Ok(reader)
    }

    /// Builds a reader over a file.
    ///
    /// # Errors
    ///
    /// See [`CsvReader::open_path`].
    pub fn from_path<P: AsRef<Path>>(self, path: P) -> CsvResult<CsvReader<File>> {
        let mut reader = self.build();
        reader.open_path(path)?;
        Ok(reader)
    }
}
