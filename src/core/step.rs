use std::time::{Duration, Instant};

use log::{debug, error};

use crate::error::{CsvError, CsvResult};

use super::item::{ItemReader, ItemWriter};

#[derive(Debug, PartialEq)]
enum ChunkStatus {
    Error,
    Finished,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Error,
    Success,
    Started,
}

/// Outcome of a [`Step::execute`] run.
#[derive(Debug)]
pub struct StepResult {
    pub start: Instant,
    pub end: Instant,
    pub duration: Duration,
    pub status: StepStatus,
    pub read_count: usize,
    pub write_count: usize,
    pub read_error_count: usize,
    pub write_error_count: usize,
}

/// Moves every item of a reader into a writer, a chunk at a time.
///
/// Used to convert a file from one dialect to another: read with the source
/// dialect, write with the target one. Failed reads and failed chunk writes
/// are tolerated up to `skip_limit`, after which the step stops with
/// [`StepStatus::Error`].
///
/// # Examples
///
/// ```
/// use dialect_csv::core::dialect::Dialect;
/// use dialect_csv::core::item::Row;
/// use dialect_csv::core::step::{StepBuilder, StepStatus};
/// use dialect_csv::item::csv::csv_reader::CsvReaderBuilder;
/// use dialect_csv::item::csv::csv_writer::CsvWriterBuilder;
/// use std::io::Cursor;
///
/// let mut reader = CsvReaderBuilder::new()
///     .dialect(Dialect::builder().encoding("UTF-8").build())
///     .from_reader(Cursor::new("a;b\r\nc;d\r\n"))
///     .unwrap();
/// let mut writer = CsvWriterBuilder::new()
///     .dialect(Dialect::unix())
///     .from_writer(Vec::new())
///     .unwrap();
///
/// let result = StepBuilder::<Row>::new()
///     .reader(&mut reader)
///     .writer(&mut writer)
///     .chunk(10)
///     .build()
///     .unwrap()
///     .execute()
///     .unwrap();
///
/// assert_eq!(result.status, StepStatus::Success);
/// assert_eq!(result.write_count, 2);
/// assert_eq!(writer.into_inner().unwrap(), b"a,b\nc,d\n");
/// ```
pub struct Step<'a, T> {
    reader: &'a mut dyn ItemReader<T>,
    writer: &'a mut dyn ItemWriter<T>,
    chunk_size: usize,
    skip_limit: usize,
    read_count: usize,
    write_count: usize,
    read_error_count: usize,
    write_error_count: usize,
}

impl<T> Step<'_, T> {
    /// Runs the step to completion.
    ///
    /// # Errors
    ///
    /// Fails only when the writer cannot be opened or closed; read and write
    /// failures are reported through the returned status and counters.
    pub fn execute(&mut self) -> CsvResult<StepResult> {
        let start = Instant::now();

        debug!("Start of step");

        self.writer.open()?;

        let mut items: Vec<T> = Vec::with_capacity(self.chunk_size);

        let status = loop {
            let read_status = self.read_chunk(&mut items);

            if read_status == ChunkStatus::Error {
                break StepStatus::Error;
            }

            let write_status = self.write_chunk(&items);

            if write_status == ChunkStatus::Error {
                break StepStatus::Error;
            }

            if read_status == ChunkStatus::Finished {
                break StepStatus::Success;
            }
        };

        self.writer.close()?;

        debug!("End of step");

        Ok(StepResult {
            start,
            end: Instant::now(),
            duration: start.elapsed(),
            status,
            read_count: self.read_count,
            write_count: self.write_count,
            read_error_count: self.read_error_count,
            write_error_count: self.write_error_count,
        })
    }

    fn is_skip_limit_reached(&self) -> bool {
        self.read_error_count + self.write_error_count > self.skip_limit
    }

    fn read_chunk(&mut self, items: &mut Vec<T>) -> ChunkStatus {
        debug!("Start reading chunk");
        items.clear();

        loop {
            match self.reader.read() {
                Ok(Some(item)) => {
                    items.push(item);
                    self.read_count += 1;
                }
                Ok(None) => {
                    debug!("End reading chunk: FINISHED");
                    return ChunkStatus::Finished;
                }
                Err(CsvError::Io(err)) => {
                    // The stream itself is broken, retrying would loop forever.
                    self.read_error_count += 1;
                    error!("Error occured during read item: {}", err);
                    return ChunkStatus::Error;
                }
                Err(err) => {
                    self.read_error_count += 1;
                    error!("Error occured during read item: {}", err);
                    if self.is_skip_limit_reached() {
                        return ChunkStatus::Error;
                    }
                }
            }

            if items.len() == self.chunk_size {
                debug!("End reading chunk: FULL");
                return ChunkStatus::Full;
            }
        }
    }

    fn write_chunk(&mut self, items: &[T]) -> ChunkStatus {
        if items.is_empty() {
            return ChunkStatus::Full;
        }

        debug!("Start writing chunk");

        let result = self.writer.write(items).and_then(|_| self.writer.flush());

        match result {
            Ok(()) => {
                self.write_count += items.len();
                debug!("End writing chunk");
                ChunkStatus::Full
            }
            Err(err) => {
                self.write_error_count += items.len();
                error!("ItemWriter error: {}", err);
                if self.is_skip_limit_reached() {
                    ChunkStatus::Error
                } else {
                    ChunkStatus::Full
                }
            }
        }
    }
}

pub struct StepBuilder<'a, T> {
    reader: Option<&'a mut dyn ItemReader<T>>,
    writer: Option<&'a mut dyn ItemWriter<T>>,
    chunk_size: usize,
    skip_limit: usize,
}

impl<T> Default for StepBuilder<'_, T> {
    fn default() -> Self {
        Self {
            reader: None,
            writer: None,
            chunk_size: 1,
            skip_limit: 0,
        }
    }
}

impl<'a, T> StepBuilder<'a, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reader(mut self, reader: &'a mut impl ItemReader<T>) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn writer(mut self, writer: &'a mut impl ItemWriter<T>) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Number of items written per chunk (at least one).
    pub fn chunk(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn skip_limit(mut self, skip_limit: usize) -> Self {
        self.skip_limit = skip_limit;
        self
    }

    /// # Errors
    ///
    /// Returns [`CsvError::InvalidArgument`] when the reader or the writer is
    /// missing.
    pub fn build(self) -> CsvResult<Step<'a, T>> {
        let reader = self
            .reader
            .ok_or_else(|| CsvError::InvalidArgument("a step needs a reader".to_string()))?;
        let writer = self
            .writer
            .ok_or_else(|| CsvError::InvalidArgument("a step needs a writer".to_string()))?;

        Ok(Step {
            reader,
            writer,
            chunk_size: self.chunk_size,
            skip_limit: self.skip_limit,
            read_count: 0,
            write_count: 0,
            read_error_count: 0,
            write_error_count: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::core::item::{ItemReaderResult, ItemWriterResult};

    struct ScriptedReader {
        results: VecDeque<ItemReaderResult<u32>>,
    }

    impl ItemReader<u32> for ScriptedReader {
        fn read(&mut self) -> ItemReaderResult<u32> {
            self.results.pop_front().unwrap_or(Ok(None))
        }
    }

    #[derive(Default)]
    struct VecWriter {
        items: Vec<u32>,
        chunks: usize,
        fail: bool,
        opened: bool,
        closed: bool,
    }

    impl ItemWriter<u32> for VecWriter {
        fn write(&mut self, items: &[u32]) -> ItemWriterResult {
            if self.fail {
                return Err(CsvError::InvalidArgument("refused".to_string()));
            }
            self.items.extend_from_slice(items);
            self.chunks += 1;
            Ok(())
        }

        fn open(&mut self) -> ItemWriterResult {
            self.opened = true;
            Ok(())
        }

        fn close(&mut self) -> ItemWriterResult {
            self.closed = true;
            Ok(())
        }
    }

    fn reader_of(results: Vec<ItemReaderResult<u32>>) -> ScriptedReader {
        ScriptedReader {
            results: results.into(),
        }
    }

    #[test]
    fn items_should_be_written_by_chunks() -> CsvResult<()> {
        let mut reader = reader_of((1..=5).map(|i| Ok(Some(i))).collect());
        let mut writer = VecWriter::default();

        let result = StepBuilder::new()
            .reader(&mut reader)
            .writer(&mut writer)
            .chunk(2)
            .build()?
            .execute()?;

        assert_eq!(result.status, StepStatus::Success);
        assert_eq!(result.read_count, 5);
        assert_eq!(result.write_count, 5);
        assert_eq!(writer.items, vec![1, 2, 3, 4, 5]);
        assert_eq!(writer.chunks, 3);
        assert!(writer.opened);
        assert!(writer.closed);

        Ok(())
    }

    #[test]
    fn read_errors_should_be_skipped_up_to_the_limit() -> CsvResult<()> {
        let unmappable = || {
            Err(CsvError::MalformedInput {
                encoding: "UTF-8".to_string(),
            })
        };

        let mut reader = reader_of(vec![Ok(Some(1)), unmappable(), Ok(Some(3))]);
        let mut writer = VecWriter::default();
        let result = StepBuilder::new()
            .reader(&mut reader)
            .writer(&mut writer)
            .skip_limit(1)
            .build()?
            .execute()?;

        assert_eq!(result.status, StepStatus::Success);
        assert_eq!(result.read_error_count, 1);
        assert_eq!(writer.items, vec![1, 3]);

        let mut reader = reader_of(vec![Ok(Some(1)), unmappable(), unmappable()]);
        let mut writer = VecWriter::default();
        let result = StepBuilder::new()
            .reader(&mut reader)
            .writer(&mut writer)
            .skip_limit(1)
            .build()?
            .execute()?;

        assert_eq!(result.status, StepStatus::Error);
        assert_eq!(result.read_error_count, 2);

        Ok(())
    }

    #[test]
    fn write_errors_should_stop_the_step_without_skip_limit() -> CsvResult<()> {
        let mut reader = reader_of(vec![Ok(Some(1)), Ok(Some(2))]);
        let mut writer = VecWriter {
            fail: true,
            ..VecWriter::default()
        };

        let result = StepBuilder::new()
            .reader(&mut reader)
            .writer(&mut writer)
            .build()?
            .execute()?;

        assert_eq!(result.status, StepStatus::Error);
        assert_eq!(result.write_count, 0);
        assert_eq!(result.write_error_count, 1);
        assert!(writer.closed);

        Ok(())
    }

    #[test]
    fn builder_should_require_reader_and_writer() {
        let mut writer = VecWriter::default();
        let result = StepBuilder::<u32>::new().writer(&mut writer).build();

        assert!(matches!(result, Err(CsvError::InvalidArgument(_))));
    }
}
