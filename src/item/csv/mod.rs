/// Dialect-driven CSV reading and writing.
///
/// Both sides are configured by a [`Dialect`](crate::core::dialect::Dialect):
/// delimiter, quote and escape characters, quoting mode, line ending, target
/// encoding and row policies (trim, empty row skipping, BOM, header row).
///
/// # Module Architecture
///
/// 1. **CsvReader**: a cursor over a seekable byte stream. A private byte
///    level tokenizer splits logical records (quoted fields may span lines),
///    then each record goes through BOM stripping, transcoding to UTF-8,
///    trimming and empty row skipping.
///
/// 2. **CsvWriter**: formats rows field by field (escape, then quote per the
///    quoting mode), converts the line to the target encoding and appends it
///    to the sink. The BOM and header row are written when the sink is bound.
///
/// Both follow the builder pattern and implement the crate's `ItemReader` /
/// `ItemWriter` traits so they can be chained by a
/// [`Step`](crate::core::step::Step).
///
/// # Examples
///
/// ## Round trip
///
/// ```
/// use dialect_csv::core::dialect::Dialect;
/// use dialect_csv::item::csv::csv_reader::CsvReaderBuilder;
/// use dialect_csv::item::csv::csv_writer::CsvWriterBuilder;
/// use std::io::Cursor;
///
/// let rows = vec![
///     vec!["nom", "prénom", "age"],
///     vec!["Martin", "Durand", "28"],
/// ];
///
/// let mut writer = CsvWriterBuilder::new()
///     .dialect(Dialect::unix())
///     .from_writer(Vec::new())
///     .unwrap();
/// writer.write_rows(&rows).unwrap();
/// let bytes = writer.into_inner().unwrap();
///
/// assert_eq!(bytes, "nom,prénom,age\nMartin,Durand,28\n".as_bytes());
///
/// let mut reader = CsvReaderBuilder::new()
///     .dialect(Dialect::unix())
///     .from_reader(Cursor::new(bytes))
///     .unwrap();
///
/// assert_eq!(reader.rows().unwrap(), rows);
/// ```
///
/// ## Skipping empty rows
///
/// ```
/// use dialect_csv::core::dialect::Dialect;
/// use dialect_csv::item::csv::csv_reader::CsvReaderBuilder;
/// use std::io::Cursor;
///
/// let dialect = Dialect::unix().to_builder().skip_empty_lines(true).build();
///
/// let mut reader = CsvReaderBuilder::new()
///     .dialect(dialect)
///     .from_reader(Cursor::new("a,b\n\n,\nc,d\n"))
///     .unwrap();
///
/// assert_eq!(reader.count().unwrap(), 2);
/// ```
pub mod csv_reader;

/// A module providing facilities for writing CSV data records.
pub mod csv_writer;

mod tokenizer;

/// Characters removed from both ends of a field when the dialect trims.
const TRIMMED: &[char] = &[' ', '\t', '\r', '\n', '\0', '\x0B'];

pub(crate) fn trim_field(value: &str) -> &str {
    value.trim_matches(TRIMMED)
}

/// A row is empty when every one of its fields is.
pub(crate) fn is_empty_row<S: AsRef<str>>(row: &[S]) -> bool {
    row.iter().all(|field| field.as_ref().is_empty())
}
