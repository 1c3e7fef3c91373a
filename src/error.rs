//! Error types for SimH tape image operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Problems found in the framing of an existing tape image.
///
/// These are produced by the frame reader and are either reported as
/// diagnostics (scanner) or turned into a fatal error (dumper in fail-fast mode).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// The trailing length marker of a record does not equal the leading one.
    #[error("record at offset {offset}: leading marker {leading} does not match trailing marker {trailing}")]
    MarkerMismatch {
        offset: u64,
        leading: u32,
        trailing: u32,
    },

    /// The image ended in the middle of a record.
    #[error("record at offset {offset}: truncated, expected {expected} more bytes but found {found}")]
    TruncatedRecord {
        offset: u64,
        expected: usize,
        found: usize,
    },

    /// The image ended in the middle of a length marker.
    #[error("marker at offset {offset}: truncated after {found} bytes")]
    TruncatedMarker { offset: u64, found: usize },

    /// A marker uses a reserved class and cannot be interpreted.
    #[error("marker at offset {offset}: reserved value {value:#010x}")]
    ReservedMarker { offset: u64, value: u32 },

    /// A record carries the SimH bad-data flag.
    #[error("record at offset {offset}: flagged as bad data ({length} bytes)")]
    BadRecord { offset: u64, length: u32 },

    /// A record is longer than the configured bound.
    #[error("record at offset {offset}: length {length} exceeds maximum of {max}")]
    OversizedRecord { offset: u64, length: u32, max: u32 },

    /// Data records were not closed by a tape mark before the image ended.
    #[error("file ending at offset {offset} has no closing tape mark")]
    MissingTapeMark { offset: u64 },

    /// The image ended without an end-of-medium marker.
    #[error("image ends at offset {offset} without an end-of-medium marker")]
    MissingEndOfMedium { offset: u64 },

    /// Bytes were found after the end-of-medium marker.
    #[error("{count} bytes found after end-of-medium at offset {offset}")]
    DataAfterEndOfMedium { offset: u64, count: u64 },
}

impl FormatError {
    /// Byte offset in the image where the problem was found.
    pub fn offset(&self) -> u64 {
        match self {
            FormatError::MarkerMismatch { offset, .. }
            | FormatError::TruncatedRecord { offset, .. }
            | FormatError::TruncatedMarker { offset, .. }
            | FormatError::ReservedMarker { offset, .. }
            | FormatError::BadRecord { offset, .. }
            | FormatError::OversizedRecord { offset, .. }
            | FormatError::MissingTapeMark { offset }
            | FormatError::MissingEndOfMedium { offset }
            | FormatError::DataAfterEndOfMedium { offset, .. } => *offset,
        }
    }

    /// Whether a reader can keep going after this problem.
    ///
    /// Truncation and reserved markers leave the stream position unknown.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            FormatError::TruncatedRecord { .. }
                | FormatError::TruncatedMarker { .. }
                | FormatError::ReservedMarker { .. }
        )
    }
}

/// Broad classification of a [`TapeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input detected before any I/O: unsupported block size, bad definition row.
    Configuration,
    /// A file could not be opened or created.
    Resource,
    /// A read or write failed for a reason other than end of stream.
    Io,
    /// The framing of an existing image is invalid.
    Format,
    /// The caller used a writer in the wrong state.
    State,
}

/// How a consumer of the frame reader reacts to a [`FormatError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Stop at the first format error.
    #[default]
    FailFast,
    /// Record the problem and keep reading where the stream allows it.
    Collect,
}

/// The main error type for tape image operations.
#[derive(Debug, Error)]
pub enum TapeError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A block size outside the supported set was requested.
    #[error("unsupported block size {0}, expected one of 2048, 4096, 8192 or 16384")]
    UnsupportedBlockSize(String),

    /// A row of the definition file could not be used.
    #[error("definition row {row}: {reason}")]
    InvalidDefinition { row: usize, reason: String },

    /// A CSV definition could not be parsed or a CSV report could not be written.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A source file could not be opened.
    #[error("could not open input file {}: {source}", path.display())]
    OpenSource {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An output file could not be created.
    #[error("could not create file {}: {source}", path.display())]
    CreateFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading a source file failed part way through.
    #[error("error reading input file {}: {source}", path.display())]
    ReadSource {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing an extracted file failed.
    #[error("error writing output file {}: {source}", path.display())]
    WriteOutput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The image framing is invalid.
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// Zero-length records cannot be represented; the marker would read as a tape mark.
    #[error("cannot write an empty record")]
    EmptyRecord,

    /// A record is longer than the marker can describe.
    #[error("record of {0} bytes exceeds the maximum record length")]
    RecordTooLarge(usize),

    /// An earlier error left the writer unusable.
    #[error("tape writer has failed and cannot be used")]
    WriterFailed,

    /// Attempted to write to an image that has already been finished.
    #[error("writing a finished image")]
    WritingFinishedImage,
}

impl TapeError {
    /// Maps the error onto the taxonomy used for reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TapeError::UnsupportedBlockSize(_)
            | TapeError::InvalidDefinition { .. }
            | TapeError::Csv(_)
            | TapeError::EmptyRecord
            | TapeError::RecordTooLarge(_) => ErrorKind::Configuration,
            TapeError::OpenSource { .. } | TapeError::CreateFile { .. } => ErrorKind::Resource,
            TapeError::Io(_) | TapeError::ReadSource { .. } | TapeError::WriteOutput { .. } => {
                ErrorKind::Io
            }
            TapeError::Format(_) => ErrorKind::Format,
            TapeError::WriterFailed | TapeError::WritingFinishedImage => ErrorKind::State,
        }
    }
}

/// A specialized Result type for tape image operations.
pub type Result<T> = std::result::Result<T, TapeError>;
