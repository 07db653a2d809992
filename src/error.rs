//! Error types for the mongory-core crate.

use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// Classification of failures reported by the arena and the compiler.
///
/// The evaluator itself never reports errors; a value that cannot be matched
/// simply does not match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Memory,
    InvalidType,
    OutOfBounds,
    UnsupportedOperation,
    InvalidArgument,
    Io,
    Parse,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Memory => "Memory Allocation Error",
            ErrorKind::InvalidType => "Invalid Type Error",
            ErrorKind::OutOfBounds => "Out of Bounds Error",
            ErrorKind::UnsupportedOperation => "Unsupported Operation Error",
            ErrorKind::InvalidArgument => "Invalid Argument Error",
            ErrorKind::Io => "I/O Error",
            ErrorKind::Parse => "Parse Error",
            ErrorKind::Unknown => "Unknown Error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error with its classification and a short message.
///
/// Errors accumulate on the [`Arena`](crate::arena::Arena) used by the failing
/// operation; callers check the arena after compilation or builder calls.
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The shared allocation-failure error.
    pub fn memory() -> Self {
        Self::new(ErrorKind::Memory, "allocation failed")
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}
