use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};

use crate::{core::dialect::Dialect, encoding::bom};

/// Raw fields of one logical record, still in the source encoding.
pub(crate) type RawRecord = Vec<Vec<u8>>;

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    StartField,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

/// Byte level CSV scanner.
///
/// Splits a stream into logical records honoring the dialect's delimiter and
/// quote. A quoted field may span several physical lines. `\n`, `\r` and
/// `\r\n` all end a record. Inside quotes a doubled quote is a literal quote,
/// and so is `escape` followed by a quote when the dialect does not escape by
/// doubling.
pub(crate) struct Tokenizer<R> {
    reader: BufReader<R>,
    delimiter: u8,
    quote: u8,
    escape: Option<u8>,
    offset: u64,
}

impl<R: Read> Tokenizer<R> {
    pub(crate) fn new(source: R, dialect: &Dialect) -> Self {
        let escape = if dialect.escape_double() || dialect.escape() == dialect.quote() {
            None
        } else {
            Some(dialect.escape())
        };

        Self {
            reader: BufReader::new(source),
            delimiter: dialect.delimiter(),
            quote: dialect.quote(),
            escape,
            offset: 0,
        }
    }

    /// Number of bytes consumed since the start of the stream.
    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }

    fn peek(&mut self) -> io::Result<Option<u8>> {
        Ok(self.reader.fill_buf()?.first().copied())
    }

    fn consume(&mut self, amount: usize) {
        self.reader.consume(amount);
        self.offset += amount as u64;
    }

    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        let byte = self.peek()?;
        if byte.is_some() {
            self.consume(1);
        }
        Ok(byte)
    }

    fn end_of_line(&mut self, byte: u8) -> io::Result<()> {
        if byte == b'\r' && self.peek()? == Some(b'\n') {
            self.consume(1);
        }
        Ok(())
    }

    /// Skips the BOM of `encoding` if the unread input starts with it.
    pub(crate) fn skip_bom(&mut self, encoding: &str) -> io::Result<bool> {
        let found = bom::find(encoding, self.reader.fill_buf()?);

        match found {
            Some(length) => {
                self.consume(length);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub(crate) fn get_ref(&self) -> &R {
        self.reader.get_ref()
    }

    /// Reads the next logical record, `None` at end of stream.
    pub(crate) fn read_record(&mut self) -> io::Result<Option<RawRecord>> {
        if self.peek()?.is_none() {
            return Ok(None);
        }

        let mut fields = Vec::new();
        let mut field = Vec::new();
        let mut state = State::StartField;

        while let Some(byte) = self.next_byte()? {
            let is_newline = byte == b'\n' || byte == b'\r';

            match state {
                State::Quoted => {
                    if Some(byte) == self.escape && self.peek()? == Some(self.quote) {
                        self.consume(1);
                        field.push(self.quote);
                    } else if byte == self.quote {
                        state = State::QuoteInQuoted;
                    } else {
                        field.push(byte);
                    }
                }
                State::QuoteInQuoted if byte == self.quote => {
                    field.push(self.quote);
                    state = State::Quoted;
                }
                State::StartField if byte == self.quote => {
                    state = State::Quoted;
                }
                _ if byte == self.delimiter => {
                    fields.push(std::mem::take(&mut field));
                    state = State::StartField;
                }
                _ if is_newline => {
                    self.end_of_line(byte)?;
                    fields.push(field);
                    return Ok(Some(fields));
                }
                _ => {
                    // Text after a closing quote is kept as is.
                    field.push(byte);
                    state = State::Unquoted;
                }
            }
        }

        fields.push(field);
        Ok(Some(fields))
    }
}

impl<R: Read + Seek> Tokenizer<R> {
    /// Moves to an absolute byte offset, dropping any buffered input.
    pub(crate) fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        self.reader.seek(SeekFrom::Start(offset))?;
        self.offset = offset;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{error::Error, io::Cursor};

    use super::*;

    fn records(input: &str, dialect: &Dialect) -> io::Result<Vec<Vec<String>>> {
        let mut tokenizer = Tokenizer::new(Cursor::new(input.as_bytes().to_vec()), dialect);
        let mut records = Vec::new();

        while let Some(record) = tokenizer.read_record()? {
            records.push(
                record
                    .into_iter()
                    .map(|field| String::from_utf8_lossy(&field).into_owned())
                    .collect(),
            );
        }

        Ok(records)
    }

    #[test]
    fn plain_records_should_be_split() -> Result<(), Box<dyn Error>> {
        let records = records("a;b;c\r\nd;;f\r\n", &Dialect::excel())?;

        assert_eq!(records, vec![vec!["a", "b", "c"], vec!["d", "", "f"]]);

        Ok(())
    }

    #[test]
    fn every_line_ending_should_end_a_record() -> Result<(), Box<dyn Error>> {
        let records = records("a,1\nb,2\rc,3\r\nd,4", &Dialect::unix())?;

        assert_eq!(
            records,
            vec![vec!["a", "1"], vec!["b", "2"], vec!["c", "3"], vec!["d", "4"]]
        );

        Ok(())
    }

    #[test]
    fn quoted_fields_may_hold_delimiters_quotes_and_newlines() -> Result<(), Box<dyn Error>> {
        let input = "\"a,b\",\"say \"\"hi\"\"\",\"two\nlines\"\n\"\",x\n";
        let records = records(input, &Dialect::unix())?;

        assert_eq!(
            records,
            vec![vec!["a,b", "say \"hi\"", "two\nlines"], vec!["", "x"]]
        );

        Ok(())
    }

    #[test]
    fn escape_before_quote_should_give_a_quote() -> Result<(), Box<dyn Error>> {
        let dialect = Dialect::unix().to_builder().escape_double(false).build();
        let records = records("\"say \\\"hi\\\"\",\"c:\\dir\"\n", &dialect)?;

        assert_eq!(records, vec![vec!["say \"hi\"", "c:\\dir"]]);

        Ok(())
    }

    #[test]
    fn escape_should_be_literal_when_quotes_are_doubled() -> Result<(), Box<dyn Error>> {
        let records = records("\"a\\\",b\n", &Dialect::unix())?;

        assert_eq!(records, vec![vec!["a\\", "b"]]);

        Ok(())
    }

    #[test]
    fn blank_lines_should_give_a_single_empty_field() -> Result<(), Box<dyn Error>> {
        let records = records("a,b\n\n,\nc,d\n", &Dialect::unix())?;

        assert_eq!(
            records,
            vec![vec!["a", "b"], vec![""], vec!["", ""], vec!["c", "d"]]
        );

        Ok(())
    }

    #[test]
    fn unterminated_quote_should_run_to_end_of_stream() -> Result<(), Box<dyn Error>> {
        let records = records("a,\"b\nc", &Dialect::unix())?;

        assert_eq!(records, vec![vec!["a", "b\nc"]]);

        Ok(())
    }

    #[test]
    fn text_after_closing_quote_should_be_kept() -> Result<(), Box<dyn Error>> {
        let records = records("\"ab\"cd,e\n", &Dialect::unix())?;

        assert_eq!(records, vec![vec!["abcd", "e"]]);

        Ok(())
    }

    #[test]
    fn seeking_back_should_restart_the_scan() -> Result<(), Box<dyn Error>> {
        let dialect = Dialect::unix();
        let mut tokenizer = Tokenizer::new(Cursor::new(b"\xEF\xBB\xBFa,b\nc,d\n".to_vec()), &dialect);

        assert!(tokenizer.skip_bom("UTF-8")?);
        assert_eq!(tokenizer.read_record()?, Some(vec![b"a".to_vec(), b"b".to_vec()]));
        let resume = tokenizer.offset();
        assert_eq!(resume, 7);

        tokenizer.seek_to(0)?;
        assert!(!tokenizer.skip_bom("UTF-16LE")?);
        assert_eq!(tokenizer.offset(), 0);

        tokenizer.seek_to(resume)?;
        assert_eq!(tokenizer.read_record()?, Some(vec![b"c".to_vec(), b"d".to_vec()]));
        assert_eq!(tokenizer.read_record()?, None);

        Ok(())
    }
}
