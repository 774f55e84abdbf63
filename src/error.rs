//! Error types for treestat operations
//!
//! Every variant names the operation that failed (open, resolve, insert,
//! commit) so a failed run can be diagnosed from the message alone. Nothing in
//! this crate retries: the first error aborts the run.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::store::node::Pointer;

/// Result type alias for treestat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Write-side operation that produced a [`Error::Write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Insert,
    Commit,
}

impl fmt::Display for WriteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteOp::Insert => f.write_str("insert"),
            WriteOp::Commit => f.write_str("commit"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// An inspection tool was pointed at a path that holds no store
    #[error("Tree does not exist: {}", path.display())]
    StoreMissing { path: PathBuf },

    /// The store directory or its meta record could not be opened
    #[error("Open error at {}: {message}", path.display())]
    Open { path: PathBuf, message: String },

    /// A lazy reference points at missing or corrupt backing data
    #[error("Resolution error at {ptr}: {message}")]
    Resolution { ptr: Pointer, message: String },

    /// I/O failure while inserting or committing
    #[error("Write error during {op}: {message}")]
    Write { op: WriteOp, message: String },

    /// Invalid or unreadable configuration
    #[error("Config error: {message}")]
    Config { message: String },

    /// Failure writing tool output
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl Error {
    pub fn store_missing<P: Into<PathBuf>>(path: P) -> Self {
        Error::StoreMissing { path: path.into() }
    }

    pub fn open<P: Into<PathBuf>, S: Into<String>>(path: P, msg: S) -> Self {
        Error::Open {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn resolution<S: Into<String>>(ptr: Pointer, msg: S) -> Self {
        Error::Resolution {
            ptr,
            message: msg.into(),
        }
    }

    pub fn insert<S: Into<String>>(msg: S) -> Self {
        Error::Write {
            op: WriteOp::Insert,
            message: msg.into(),
        }
    }

    pub fn commit<S: Into<String>>(msg: S) -> Self {
        Error::Write {
            op: WriteOp::Commit,
            message: msg.into(),
        }
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config {
            message: msg.into(),
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_operation() {
        let ptr = Pointer::new(2, 128, 77);
        let err = Error::resolution(ptr, "short read");
        assert_eq!(err.to_string(), "Resolution error at file-2:128(77): short read");

        let err = Error::commit("disk full");
        assert_eq!(err.to_string(), "Write error during commit: disk full");

        let err = Error::insert("bad key");
        assert!(err.to_string().contains("during insert"));

        let err = Error::store_missing("./tree");
        assert_eq!(err.to_string(), "Tree does not exist: ./tree");
    }
}
