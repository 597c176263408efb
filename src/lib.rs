#![cfg_attr(docsrs, feature(doc_cfg))]
//#![warn(missing_docs)]

/*!
 # Dialect CSV

 A CSV reader and writer driven by **dialects**: named, immutable bundles of
 formatting choices (delimiter, quote and escape characters, quoting mode,
 line ending, text encoding, BOM, trimming and empty row policy).

 Files exchanged with spreadsheet software rarely agree on these choices. A
 French Excel export is `;` separated, CP1252 encoded and CRLF terminated;
 the same data on a Unix box is `,` separated UTF-8 with LF. This crate reads
 either into plain UTF-8 rows and writes rows back in whatever dialect the
 consumer expects.

 ## Core Concepts

- **Dialect:** the configuration value. Built from presets (`excel`, `unix`), a builder, or a
  loosely typed option map where unknown keys are ignored and bad values fall back to defaults.
- **CsvReader:** a cursor over a seekable stream. Detects the encoding when asked, strips the BOM,
  splits quoted and delimited fields, converts them to UTF-8, then trims and skips empty rows.
- **CsvWriter:** quotes and escapes fields per the quoting mode, converts each line to the target
  encoding and writes it, BOM first.
- **Transcoder:** the encoding collaborator. `DefaultTranscoder` is backed by `encoding_rs`.
- **Step:** moves rows from any `ItemReader` to any `ItemWriter` in chunks, e.g. to convert a file
  from one dialect to another.

 ## Features

| **Feature**   | **Description**                                               |
|---------------|---------------------------------------------------------------|
| logger        | Enables a logger `ItemWriter`, useful for debugging purposes  |
| full          | Enables all available features                                |

 ## Getting Started

```rust
# use dialect_csv::{
#     core::{
#         dialect::Dialect,
#         item::Row,
#         step::{StepBuilder, StepStatus},
#     },
#     error::CsvError,
#     item::csv::{csv_reader::CsvReaderBuilder, csv_writer::CsvWriterBuilder},
# };
# use std::io::Cursor;
fn main() -> Result<(), CsvError> {
    // An Excel export: CP1252, `;` separated, CRLF.
    let export = b"nom;pr\xe9nom;age\r\nMartin;Aur\xe9lie;28\r\n\r\n".to_vec();

    let mut reader = CsvReaderBuilder::new()
        .dialect(Dialect::excel().to_builder().skip_empty_lines(true).build())
        .from_reader(Cursor::new(export))?;

    let mut writer = CsvWriterBuilder::new()
        .dialect(Dialect::unix())
        .from_writer(Vec::new())?;

    let result = StepBuilder::<Row>::new()
        .reader(&mut reader)
        .writer(&mut writer)
        .chunk(100)
        .build()?
        .execute()?;

    assert_eq!(result.status, StepStatus::Success);
    assert_eq!(writer.into_inner()?, "nom,prénom,age\nMartin,Aurélie,28\n".as_bytes());

    Ok(())
}
```

 ## License
 Licensed under either of

 -   Apache License, Version 2.0
     ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
 -   MIT license
     ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)

 at your option.

 */

/// Core module: dialect, reader/writer traits and the transfer step
pub mod core;

/// Encoding collaborator: detection, conversion and byte order marks
pub mod encoding;

/// Error types
pub mod error;

#[doc(inline)]
pub use error::*;

/// CSV reader and writer
pub mod item;
