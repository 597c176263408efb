use crate::error::CsvError;

/// One CSV record: an ordered sequence of fields.
pub type Row = Vec<String>;

/// Result of a single read: `Ok(None)` once the source is exhausted.
pub type ItemReaderResult<R> = Result<Option<R>, CsvError>;

/// Result of writing a batch of items.
pub type ItemWriterResult = Result<(), CsvError>;

/// A source of items pulled one at a time.
pub trait ItemReader<R> {
    /// Reads the next item, or `Ok(None)` when there is nothing left.
    fn read(&mut self) -> ItemReaderResult<R>;
}

/// A sink receiving items a chunk at a time.
pub trait ItemWriter<W> {
    fn write(&mut self, items: &[W]) -> ItemWriterResult;

    fn flush(&mut self) -> ItemWriterResult {
        Ok(())
    }

    fn open(&mut self) -> ItemWriterResult {
        Ok(())
    }

    fn close(&mut self) -> ItemWriterResult {
        Ok(())
    }
}
