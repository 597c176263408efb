pub mod common;

use std::{
    error::Error,
    fs::{self, File},
    io::Cursor,
};

use dialect_csv::{
    core::{
        dialect::{Dialect, LineEnding, QuotingMode},
        item::Row,
    },
    item::csv::{
        csv_reader::{CsvReader, CsvReaderBuilder},
        csv_writer::CsvWriterBuilder,
    },
};
use rand::distr::{Alphanumeric, SampleString};
use serde_json::json;

use common::{init_logger, temp_csv_path};

fn rows(data: &[&[&str]]) -> Vec<Row> {
    data.iter()
        .map(|row| row.iter().map(|field| field.to_string()).collect())
        .collect()
}

fn write_all(dialect: &Dialect, rows: &[Row]) -> Result<Vec<u8>, Box<dyn Error>> {
    let mut writer = CsvWriterBuilder::new()
        .dialect(dialect.clone())
        .from_writer(Vec::new())?;
    writer.write_rows(rows)?;
    Ok(writer.into_inner()?)
}

fn read_all(dialect: &Dialect, bytes: Vec<u8>) -> Result<Vec<Row>, Box<dyn Error>> {
    let mut reader = CsvReaderBuilder::new()
        .dialect(dialect.clone())
        .from_reader(Cursor::new(bytes))?;
    Ok(reader.rows()?)
}

#[test]
fn unix_rows_should_round_trip() -> Result<(), Box<dyn Error>> {
    init_logger();

    let dialect = Dialect::from_options(
        json!({"delimiter": ",", "enclosure": "\"", "eol": "\n", "encoding": "UTF-8"})
            .as_object()
            .ok_or("not an object")?,
    )?;
    let expected = rows(&[&["nom", "prénom", "age"], &["Martin", "Durand", "28"]]);

    let bytes = write_all(&dialect, &expected)?;
    assert_eq!(bytes, "nom,prénom,age\nMartin,Durand,28\n".as_bytes());

    assert_eq!(read_all(&dialect, bytes)?, expected);

    Ok(())
}

#[test]
fn cp1252_file_should_round_trip() -> Result<(), Box<dyn Error>> {
    init_logger();

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("people.csv");
    let expected = rows(&[&["nom", "prénom"], &["Martin", "Aurélie"], &["Lefèvre", "Zoé"]]);

    let mut writer = CsvWriterBuilder::new()
        .dialect(Dialect::excel())
        .from_path(&path)?;
    writer.write_rows(&expected)?;
    writer.close()?;

    assert_eq!(
        fs::read(&path)?,
        b"nom;pr\xe9nom\r\nMartin;Aur\xe9lie\r\nLef\xe8vre;Zo\xe9\r\n"
    );

    let mut reader = CsvReaderBuilder::new()
        .dialect(Dialect::excel())
        .from_path(&path)?;

    assert_eq!(reader.count()?, 3);
    assert_eq!(reader.rows()?, expected);

    Ok(())
}

#[test]
fn bom_should_survive_a_round_trip() -> Result<(), Box<dyn Error>> {
    let dialect = Dialect::unix().to_builder().use_bom(true).build();
    let expected = rows(&[&["\"quoted\" first", "x"], &["y", "z"]]);

    let bytes = write_all(&dialect, &expected)?;
    assert!(bytes.starts_with(&[0xEF, 0xBB, 0xBF, b'"']));

    assert_eq!(read_all(&dialect, bytes)?, expected);

    Ok(())
}

#[test]
fn utf16_output_should_start_with_its_bom() -> Result<(), Box<dyn Error>> {
    let dialect = Dialect::unix()
        .to_builder()
        .encoding("UTF-16LE")
        .use_bom(true)
        .build();

    let bytes = write_all(&dialect, &rows(&[&["a", "b"]]))?;

    assert_eq!(bytes, [0xFF, 0xFE, b'a', 0, b',', 0, b'b', 0, b'\n', 0]);

    Ok(())
}

#[test]
fn wide_encodings_should_round_trip() -> Result<(), Box<dyn Error>> {
    let expected = rows(&[
        &["nom", "âge"],
        &["Martin", "28"],
        &["\"Zoé\", 😀", "multi\nline"],
    ]);

    for encoding in ["UTF-16LE", "UTF-16BE", "UTF-32LE", "UTF-32BE"] {
        for use_bom in [false, true] {
            let dialect = Dialect::unix()
                .to_builder()
                .encoding(encoding)
                .use_bom(use_bom)
                .build();

            let bytes = write_all(&dialect, &expected)?;
            assert_eq!(read_all(&dialect, bytes)?, expected, "{:?}", dialect);
        }
    }

    Ok(())
}

#[test]
fn utf16_file_should_be_counted_and_rewound() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("wide.csv");
    let dialect = Dialect::excel()
        .to_builder()
        .encoding("UTF-16BE")
        .use_bom(true)
        .skip_empty_lines(true)
        .build();
    let expected = rows(&[&["a", "1"], &["", ""], &["b", "2"]]);

    let mut writer = CsvWriterBuilder::new()
        .dialect(dialect.clone())
        .from_path(&path)?;
    writer.write_rows(&expected)?;
    writer.close()?;

    let mut reader = CsvReaderBuilder::new().dialect(dialect).from_path(&path)?;

    assert_eq!(reader.read_row()?, Some(vec!["a".to_string(), "1".to_string()]));
    assert_eq!(reader.count()?, 2);
    assert_eq!(reader.read_row()?, Some(vec!["b".to_string(), "2".to_string()]));
    assert_eq!(reader.position(), Some(1));
    assert_eq!(
        reader.rewind()?.cloned(),
        Some(vec!["a".to_string(), "1".to_string()])
    );

    Ok(())
}

#[test]
fn quotes_should_survive_both_escape_modes() -> Result<(), Box<dyn Error>> {
    let expected = rows(&[
        &["say \"hi\"", "\"", "plain"],
        &["a;b", "multi\r\nline", "\"\""],
    ]);

    for escape_double in [true, false] {
        for mode in [QuotingMode::Minimal, QuotingMode::All, QuotingMode::NonNumeric] {
            let dialect = Dialect::excel()
                .to_builder()
                .encoding("UTF-8")
                .escape_double(escape_double)
                .quoting_mode(mode)
                .build();

            let bytes = write_all(&dialect, &expected)?;
            assert_eq!(read_all(&dialect, bytes)?, expected, "{:?}", dialect);
        }
    }

    Ok(())
}

#[test]
fn random_fields_should_round_trip() -> Result<(), Box<dyn Error>> {
    let mut rng = rand::rng();
    let dialect = Dialect::excel();

    let expected: Vec<Row> = (0..50)
        .map(|i| {
            (0..4)
                .map(|j| {
                    let text = Alphanumeric.sample_string(&mut rng, 1 + (i + j) % 12);
                    match j {
                        1 => format!("{text};\"é\""),
                        2 => format!("{text}\r\n{text}"),
                        _ => text,
                    }
                })
                .collect()
        })
        .collect();

    let bytes = write_all(&dialect, &expected)?;
    assert_eq!(read_all(&dialect, bytes)?, expected);

    Ok(())
}

#[test]
fn empty_rows_should_follow_the_skip_policy() -> Result<(), Box<dyn Error>> {
    let data = b"a;b\r\n\r\n;\r\n  ;\t\r\nc;d\r\n".to_vec();

    let skipping = Dialect::excel()
        .to_builder()
        .skip_empty_lines(true)
        .trim(true)
        .build();
    let mut reader = CsvReaderBuilder::new()
        .dialect(skipping)
        .from_reader(Cursor::new(data.clone()))?;

    let lazy: Vec<Row> = reader.iter().collect::<Result<_, _>>()?;
    assert_eq!(lazy, rows(&[&["a", "b"], &["c", "d"]]));
    assert_eq!(reader.rows()?, lazy);
    assert_eq!(reader.count()?, 2);

    let keeping = read_all(&Dialect::excel(), data)?;
    assert_eq!(keeping.len(), 5);
    assert_eq!(keeping[1], vec![""]);
    assert_eq!(keeping[3], vec!["  ", "\t"]);

    Ok(())
}

#[test]
fn output_should_be_readable_by_the_csv_crate() -> Result<(), Box<dyn Error>> {
    let expected = rows(&[
        &["id", "comment"],
        &["1", "with, comma"],
        &["2", "with \"quotes\""],
        &["3", "on\ntwo lines"],
    ]);

    let bytes = write_all(&Dialect::unix(), &expected)?;

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(bytes.as_slice());
    let parsed: Vec<Row> = rdr
        .records()
        .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
        .collect::<Result<_, csv::Error>>()?;

    assert_eq!(parsed, expected);

    Ok(())
}

#[test]
fn csv_crate_output_should_be_readable() -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b';')
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());
    wtr.write_record(["city", "note"])?;
    wtr.write_record(["Boston", "a \"big\" one"])?;
    wtr.write_record(["Concord", "two\r\nlines; really"])?;
    let bytes = wtr.into_inner()?;

    let dialect = Dialect::excel().to_builder().encoding("UTF-8").build();

    assert_eq!(
        read_all(&dialect, bytes)?,
        rows(&[
            &["city", "note"],
            &["Boston", "a \"big\" one"],
            &["Concord", "two\r\nlines; really"],
        ])
    );

    Ok(())
}

#[test]
fn header_row_should_be_written_and_read_apart() -> Result<(), Box<dyn Error>> {
    let dialect = Dialect::unix().to_builder().first_row_header(true).build();

    let mut writer = CsvWriterBuilder::new()
        .dialect(dialect.clone())
        .headers(["name", "age"])
        .from_writer(Vec::new())?;
    writer.write_row(&["Alice", "30"])?;
    let bytes = writer.into_inner()?;
    assert_eq!(bytes, b"name,age\nAlice,30\n");

    let mut reader = CsvReaderBuilder::new()
        .dialect(dialect)
        .from_reader(Cursor::new(bytes))?;

    assert_eq!(reader.count()?, 1);
    assert_eq!(reader.rows()?, rows(&[&["Alice", "30"]]));
    assert_eq!(reader.headers(), ["name", "age"]);

    Ok(())
}

#[test]
fn detected_encoding_should_win_over_the_configured_one() -> Result<(), Box<dyn Error>> {
    let path = temp_csv_path();
    fs::write(&path, b"nom,pr\xe9nom\nMartin,Aur\xe9lie\n")?;

    let dialect = Dialect::unix()
        .to_builder()
        .force_encoding_detection(true)
        .build();
    let mut reader = CsvReaderBuilder::new()
        .dialect(dialect)
        .detection_sample_lines(1)
        .from_path(&path)?;

    assert_eq!(reader.encoding(), "windows-1252");
    assert_eq!(
        reader.rows()?,
        rows(&[&["nom", "prénom"], &["Martin", "Aurélie"]])
    );

    fs::remove_file(&path)?;

    Ok(())
}

#[test]
fn closed_path_reader_should_reopen_on_rewind() -> Result<(), Box<dyn Error>> {
    let path = temp_csv_path();
    fs::write(&path, "a,1\nb,2\n")?;

    let mut reader: CsvReader<File> = CsvReaderBuilder::new()
        .dialect(Dialect::unix())
        .from_path(&path)?;

    assert_eq!(reader.rows()?.len(), 2);
    reader.close();
    assert!(!reader.is_open());

    let first = reader.rewind()?.cloned();
    assert_eq!(first, Some(vec!["a".to_string(), "1".to_string()]));
    assert!(reader.is_open());

    fs::remove_file(&path)?;

    Ok(())
}

#[test]
fn path_writer_should_create_its_file_lazily() -> Result<(), Box<dyn Error>> {
    let path = temp_csv_path();
    let dialect = Dialect::unix()
        .to_builder()
        .line_ending(LineEnding::CrLf)
        .build();

    let mut writer = CsvWriterBuilder::new().dialect(dialect).from_path(&path)?;
    assert!(!path.exists());

    writer.write_row(&["x", "y"])?;
    writer.flush()?;
    assert!(path.exists());
    writer.close()?;

    assert_eq!(fs::read_to_string(&path)?, "x,y\r\n");

    fs::remove_file(&path)?;

    Ok(())
}
