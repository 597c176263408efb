use std::{
    borrow::Cow,
    fs::File,
    io::{self, Write},
    path::{Path, PathBuf},
};

use log::debug;

use crate::{
    core::{
        dialect::{Dialect, QuotingMode},
        item::{ItemWriter, ItemWriterResult, Row},
    },
    encoding::{bom, DefaultTranscoder, Transcoder},
    error::{CsvError, CsvResult, Mode},
};

use super::trim_field;

/// Formats one field: trim, escape, then wrap in quotes when the quoting mode
/// asks for it.
fn format_field<'a>(dialect: &Dialect, value: &'a str) -> Cow<'a, str> {
    let value = if dialect.trim() {
        trim_field(value)
    } else {
        value
    };

    let quote = dialect.quote() as char;
    let delimiter = dialect.delimiter() as char;

    let escaped = if value.contains(quote) {
        let replacement = if dialect.escape_double() {
            format!("{quote}{quote}")
        } else {
            format!("{}{quote}", dialect.escape() as char)
        };
        Cow::Owned(value.replace(quote, &replacement))
    } else {
        Cow::Borrowed(value)
    };

    let wrap = match dialect.quoting_mode() {
        QuotingMode::All => true,
        QuotingMode::Minimal => escaped.contains(|c: char| {
            c == quote || c == delimiter || c == '\r' || c == '\n'
        }),
        QuotingMode::NonNumeric => !value.chars().all(|c| c.is_ascii_digit() || c == '.'),
    };

    if wrap {
        Cow::Owned(format!("{quote}{escaped}{quote}"))
    } else {
        escaped
    }
}

/// Serializes a row to a UTF-8 line, line ending included.
///
/// # Examples
///
/// ```
/// use dialect_csv::core::dialect::{Dialect, QuotingMode};
/// use dialect_csv::item::csv::csv_writer::format_row;
///
/// let dialect = Dialect::unix().to_builder().quoting_mode(QuotingMode::All).build();
///
/// assert_eq!(format_row(&dialect, &["Martin", "28.5"]), "\"Martin\",\"28.5\"\n");
/// ```
pub fn format_row<S: AsRef<str>>(dialect: &Dialect, fields: &[S]) -> String {
    let mut line = String::new();

    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            line.push(dialect.delimiter() as char);
        }
        line.push_str(&format_field(dialect, field.as_ref()));
    }

    line.push_str(dialect.line_ending().as_str());
    line
}

/// A dialect-aware CSV writer.
///
/// Every row is formatted in UTF-8 then converted to the dialect's encoding
/// before it reaches the sink. When the dialect sets `use_bom` the encoding's
/// BOM is written as soon as a sink is bound, followed by the header row if
/// one was configured.
///
/// # Examples
///
/// ```
/// use dialect_csv::core::dialect::Dialect;
/// use dialect_csv::item::csv::csv_writer::CsvWriterBuilder;
///
/// let mut writer = CsvWriterBuilder::new()
///     .dialect(Dialect::excel())
///     .headers(["nom", "prénom"])
///     .from_writer(Vec::new())
///     .unwrap();
///
/// writer.write_row(&["Martin", "Aurélie"]).unwrap();
///
/// assert_eq!(
///     writer.into_inner().unwrap(),
///     b"nom;pr\xe9nom\r\nMartin;Aur\xe9lie\r\n"
/// );
/// ```
pub struct CsvWriter<W: Write> {
    dialect: Dialect,
    transcoder: Box<dyn Transcoder>,
    headers: Option<Row>,
    path: Option<PathBuf>,
    create: Option<fn(&Path) -> io::Result<W>>,
    sink: Option<W>,
}

impl<W: Write> CsvWriter<W> {
    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub fn is_open(&self) -> bool {
        self.sink.is_some()
    }

    /// Binds a new sink, closing the previous one first, and writes the BOM
    /// and header row.
    pub fn open(&mut self, sink: W) -> CsvResult<()> {
        self.close()?;
        self.path = None;
        self.create = None;
        self.bind(sink)
    }

    fn encode_row<S: AsRef<str>>(&self, fields: &[S]) -> CsvResult<Vec<u8>> {
        let line = format_row(&self.dialect, fields);

        self.transcoder.convert(
            line.as_bytes(),
            "UTF-8",
            self.dialect.encoding(),
            self.dialect.translit(),
        )
    }

    fn bind(&mut self, mut sink: W) -> CsvResult<()> {
        if self.dialect.use_bom() {
            match bom::for_encoding(self.dialect.encoding()) {
                Some(bom) => {
                    sink.write_all(bom)?;
                    debug!("Wrote {} byte order mark", self.dialect.encoding());
                }
                None => debug!("No byte order mark for {}", self.dialect.encoding()),
            }
        }

        if let Some(headers) = &self.headers {
            sink.write_all(&self.encode_row(headers.as_slice())?)?;
        }

        self.sink = Some(sink);
        Ok(())
    }

    fn sink(&mut self) -> CsvResult<&mut W> {
        if self.sink.is_none() {
            let (Some(path), Some(create)) = (self.path.clone(), self.create) else {
                return Err(CsvError::NoOutput);
            };

            debug!("Writing {}", path.display());
            let sink = create(&path).map_err(|source| CsvError::InvalidHandle {
                path,
                mode: Mode::Writing,
                source,
            })?;
            self.bind(sink)?;
        }

        self.sink.as_mut().ok_or(CsvError::NoOutput)
    }

    /// Writes one row, opening the configured path first if needed.
    ///
    /// # Errors
    ///
    /// - [`CsvError::NoOutput`] when neither a sink nor a path is configured.
    /// - [`CsvError::InvalidHandle`] when the path cannot be created.
    /// - [`CsvError::Unmappable`] under the strict policy.
    pub fn write_row<S: AsRef<str>>(&mut self, fields: &[S]) -> CsvResult<()> {
        let bytes = self.encode_row(fields)?;
        self.sink()?.write_all(&bytes)?;
        Ok(())
    }

    /// Writes rows one after the other. Rows written before a failure stay
    /// written.
    pub fn write_rows<I, T, S>(&mut self, rows: I) -> CsvResult<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[S]>,
        S: AsRef<str>,
    {
        for row in rows {
            self.write_row(row.as_ref())?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> CsvResult<()> {
        if let Some(sink) = self.sink.as_mut() {
            sink.flush()?;
        }
        Ok(())
    }

    /// Flushes and releases the sink. Calling it twice is harmless; a path
    /// based writer reopens its path (truncating it) on the next write.
    pub fn close(&mut self) -> CsvResult<()> {
        self.flush()?;
        if self.sink.take().is_some() {
            debug!("Writer closed");
        }
        Ok(())
    }

    /// Flushes and hands the sink back.
    pub fn into_inner(mut self) -> CsvResult<W> {
        self.flush()?;
        self.sink.take().ok_or(CsvError::NoOutput)
    }
}

impl CsvWriter<File> {
    /// Points the writer at `path`, created on the first write.
    pub fn set_path<P: AsRef<Path>>(&mut self, path: P) -> CsvResult<()> {
        self.close()?;
        self.path = Some(path.as_ref().to_path_buf());
        self.create = Some(|path: &Path| File::create(path));
        Ok(())
    }
}

impl<W: Write> ItemWriter<Row> for CsvWriter<W> {
    fn write(&mut self, items: &[Row]) -> ItemWriterResult {
        self.write_rows(items)
    }

    fn flush(&mut self) -> ItemWriterResult {
        CsvWriter::flush(self)
    }

    /// Makes sure the sink exists, so a step without rows still produces a
    /// file holding the BOM and header row.
    fn open(&mut self) -> ItemWriterResult {
        self.sink().map(|_| ())
    }
}

/// A builder for [`CsvWriter`].
pub struct CsvWriterBuilder {
    dialect: Dialect,
    transcoder: Option<Box<dyn Transcoder>>,
    headers: Option<Row>,
}

impl Default for CsvWriterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvWriterBuilder {
    pub fn new() -> Self {
        Self {
            dialect: Dialect::default(),
            transcoder: None,
            headers: None,
        }
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn transcoder<T: Transcoder + 'static>(mut self, transcoder: T) -> Self {
        self.transcoder = Some(Box::new(transcoder));
        self
    }

    /// Header row written once, right after the BOM.
    pub fn headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers = Some(headers.into_iter().map(Into::into).collect());
        self
    }

    /// A writer with no sink bound yet, see [`CsvWriter::open`].
    pub fn build<W: Write>(self) -> CsvWriter<W> {
        CsvWriter {
            dialect: self.dialect,
            transcoder: self
                .transcoder
                .unwrap_or_else(|| Box::new(DefaultTranscoder::new())),
            headers: self.headers,
            path: None,
            create: None,
            sink: None,
        }
    }

    /// Builds a writer over `wtr`; the BOM and headers are written at once.
    pub fn from_writer<W: Write>(self, wtr: W) -> CsvResult<CsvWriter<W>> {
        let mut writer = self.build();
        writer.open(wtr)?;
        Ok(writer)
    }

    /// Builds a writer over a file created on the first write.
    pub fn from_path<P: AsRef<Path>>(self, path: P) -> CsvResult<CsvWriter<File>> {
        let mut writer = self.build();
        writer.set_path(path)?;
        Ok(writer)
    }
}
