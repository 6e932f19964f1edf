//! Error kinds for the bootstrap pipeline.
//!
//! Nothing in the pipeline recovers locally: every error unwinds to `main`,
//! which prints it once and exits with status 1.

use std::fmt;

pub type Result<T> = std::result::Result<T, SetupError>;

/// What went wrong, grouped by the phase that raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown package name or malformed descriptor line
    Selection,
    /// Unsupported location scheme, missing download, bad archive layout
    Acquisition,
    /// An external command exited with a non-zero status
    Execution,
    /// The user declined the confirmation prompt
    Cancelled,
    /// A file or directory that should exist does not
    Filesystem,
}

impl ErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::Selection => "selection error",
            ErrorKind::Acquisition => "acquisition error",
            ErrorKind::Execution => "execution error",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Filesystem => "filesystem error",
        }
    }
}

#[derive(Debug)]
pub struct SetupError {
    pub kind: ErrorKind,
    pub message: String,
}

impl SetupError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn selection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Selection, message)
    }

    pub fn acquisition(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Acquisition, message)
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Execution, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, message)
    }

    pub fn filesystem(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Filesystem, message)
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.label(), self.message)
    }
}

impl std::error::Error for SetupError {}

impl From<std::io::Error> for SetupError {
    fn from(e: std::io::Error) -> Self {
        SetupError::filesystem(e.to_string())
    }
}
