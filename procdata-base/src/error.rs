// Every fallible call in the workspace returns this one Error. It carries:
// 1. A backtrace taken where the error was built or first converted into ours
// 2. A single construction point, so one breakpoint on Error::new traps any failure
// 3. An error! event per failure, emitted at that same point
// 4. A coarse kind tag, so a proc (or a test) can tell a caller bug from a host mismatch

use std::{any::Any, borrow::Cow};
use backtrace_error::DynBacktraceError;
use tracing::error;

/// The failure classes a proc can observe. None of them are retried; the
/// host treats process exit without a results manifest as the signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    /// Missing control file path, unsupported manifest version.
    Configuration,
    /// Malformed manifest contents, such as an unknown column type code.
    Format,
    /// Index outside the column, negative table size.
    Range,
    /// Append or extend past the declared row count.
    Capacity,
    /// Mapping, remapping, truncation or locking failed.
    Io,
    /// Read past the end of a read-only buffer.
    EndOfData,
    /// Value does not fit the column, or the column cannot take the operation.
    Type,
    /// Table or column name not present.
    Key,
    /// Argument rejected before any mutation.
    Validation,
    Other,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "configuration error",
            ErrorKind::Format => "format error",
            ErrorKind::Range => "range error",
            ErrorKind::Capacity => "capacity error",
            ErrorKind::Io => "i/o error",
            ErrorKind::EndOfData => "end of data",
            ErrorKind::Type => "type error",
            ErrorKind::Key => "key error",
            ErrorKind::Validation => "validation error",
            ErrorKind::Other => "error",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
#[allow(dead_code)]
pub struct Error {
    kind: ErrorKind,
    msg: String,
    inner: DynBacktraceError,
}
pub type Result<T> = std::result::Result<T, Error>;

struct SimpleErr(Cow<'static, str>);
impl std::fmt::Debug for SimpleErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::fmt::Display for SimpleErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for SimpleErr {}

impl<E: std::error::Error + Send + Sync + 'static> From<E> for Error {
    fn from(err: E) -> Error {
        let kind = if (&err as &dyn Any).is::<std::io::Error>() {
            ErrorKind::Io
        } else {
            ErrorKind::Other
        };
        Error::new(kind, err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.msg)
    }
}

impl Error {
    pub fn new<E: std::error::Error + Send + Sync + 'static>(kind: ErrorKind, err: E) -> Error {
        error!(target: "procdata", kind = ?kind, "{:?}", err);
        let msg = err.to_string();
        let inner = DynBacktraceError::from(err);
        Error { kind, msg, inner }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.msg
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

pub fn err(kind: ErrorKind, msg: impl Into<Cow<'static, str>>) -> Error {
    let err = SimpleErr(msg.into());
    Error::new(kind, err)
}

/// Shorthand for the common `return Err(err(..))`.
pub fn fail<T>(kind: ErrorKind, msg: impl Into<Cow<'static, str>>) -> Result<T> {
    Err(err(kind, msg))
}
