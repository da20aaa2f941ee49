//! Error types for geodat.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Error type for geodat operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Input ended before a varint terminator byte
    #[error("truncated data: varint at offset {offset} has no terminator byte")]
    TruncatedData { offset: usize },

    /// Varint longer than a 64-bit value allows
    #[error("varint at offset {offset} overflows 64 bits")]
    VarintOverflow { offset: usize },

    /// Top-level field uses a wire type the reader cannot skip
    #[error("unsupported wire type {wire_type} at offset {offset}")]
    UnsupportedWireType { wire_type: u8, offset: usize },

    /// Length-delimited field runs past the end of the input
    #[error("field at offset {offset} declares {declared} bytes but only {available} remain")]
    FieldOverrun {
        offset: usize,
        declared: u64,
        available: usize,
    },

    /// A value cannot be represented in the target format
    #[error("encoding failure: {0}")]
    EncodingFailure(String),

    /// Category code is empty or otherwise unusable
    #[error("invalid category code: {0:?}")]
    InvalidCategoryCode(String),

    /// Category entry holds both address and domain records
    #[error("category {0} mixes address and domain records")]
    MixedRecordKinds(String),

    /// Category record kind does not match the database it is merged into
    #[error("category {code} holds {found} records but {database} expects {expected}")]
    RecordKindMismatch {
        code: String,
        database: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    /// Merged output did not read back as expected
    #[error("verification failed: {0}")]
    Verification(String),

    /// An expected input file does not exist
    #[error("missing input file: {}", .0.display())]
    MissingInputFile(PathBuf),

    /// A source produced no usable data
    #[error("missing source data: {0}")]
    MissingSourceData(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error from the GitHub API or raw file host
    #[error("HTTP error: {0}")]
    Http(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Download error
    #[error("download error: {0}")]
    Download(#[from] reqwest::Error),
}

/// Result type alias for geodat operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a single input line was not turned into a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The line does not parse as the expected IP/CIDR or domain form
    MalformedInput(String),
    /// The value parsed but cannot be encoded
    EncodingFailure(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::MalformedInput(msg) => write!(f, "malformed input: {}", msg),
            RejectReason::EncodingFailure(msg) => write!(f, "encoding failure: {}", msg),
        }
    }
}

/// A rejected input line together with the reason it was skipped.
///
/// Rejections never abort a batch; they are collected, logged and counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Original line as it was supplied
    pub line: String,
    /// Reason for the rejection
    pub reason: RejectReason,
}

impl Rejection {
    pub fn malformed(line: &str, msg: impl Into<String>) -> Self {
        Self {
            line: line.to_string(),
            reason: RejectReason::MalformedInput(msg.into()),
        }
    }

    pub fn encoding(line: &str, msg: impl Into<String>) -> Self {
        Self {
            line: line.to_string(),
            reason: RejectReason::EncodingFailure(msg.into()),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.reason, self.line)
    }
}
