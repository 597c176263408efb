use std::{fmt, io, path::PathBuf};

use thiserror::Error;

/// Direction of a CSV component.
///
/// Set once on the reader and writer types so error messages never have to
/// inspect the underlying stream to know what it was opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Reading,
    Writing,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Reading => write!(f, "reading"),
            Mode::Writing => write!(f, "writing"),
        }
    }
}

#[derive(Error, Debug)]
/// CSV error
pub enum CsvError {
    #[error("The file \"{}\" does not exist.", .0.display())]
    FileNotFound(PathBuf),

    #[error("Could not open file \"{}\" for {mode}: {source}", .path.display())]
    InvalidHandle {
        path: PathBuf,
        mode: Mode,
        #[source]
        source: io::Error,
    },

    #[error("A valid file handle must be bound before {0}.")]
    InvalidFileHandle(Mode),

    #[error("No output stream or path has been configured.")]
    NoOutput,

    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Malformed input for encoding {encoding}")]
    MalformedInput { encoding: String },

    #[error("Character {character:?} cannot be represented in {encoding}")]
    Unmappable { character: char, encoding: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Io(io::Error),
}

impl From<io::Error> for CsvError {
    /// Unwraps a [`CsvError`] carried by an I/O error, as the decoding reader
    /// reports malformed input. Any other I/O error becomes [`CsvError::Io`].
    fn from(err: io::Error) -> Self {
        if !err
            .get_ref()
            .is_some_and(|inner| inner.is::<CsvError>())
        {
            return CsvError::Io(err);
        }

        let kind = err.kind();
        match err.into_inner().map(|inner| inner.downcast::<CsvError>()) {
            Some(Ok(inner)) => *inner,
            Some(Err(inner)) => CsvError::Io(io::Error::new(kind, inner)),
            None => CsvError::Io(io::Error::from(kind)),
        }
    }
}

pub type CsvResult<T> = Result<T, CsvError>;
