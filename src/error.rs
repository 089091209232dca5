use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RawIoError>;

/// Broad classification of a [`RawIoError`].
///
/// Range and State errors are caller-correctable. SourceFormat errors are
/// fatal for the reader instance that raised them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An index, sample window or time window is out of bounds
    Range,
    /// The reader is not in a state that allows the query
    State,
    /// The underlying data is malformed or unreadable
    SourceFormat,
    /// The reader lacks the requested capability
    Unsupported,
}

/// Errors raised by raw readers.
#[derive(Error, Debug)]
pub enum RawIoError {
    #[error("block index {index} out of range: recording has {count} block(s) (valid: 0..{count})")]
    BlockIndex { index: usize, count: usize },

    #[error("segment index {index} out of range for block {block_index}: block has {count} segment(s) (valid: 0..{count})")]
    SegmentIndex {
        block_index: usize,
        index: usize,
        count: usize,
    },

    #[error("{table} channel index {index} out of range: {count} channel(s) declared (valid: 0..{count})")]
    ChannelIndex {
        table: &'static str,
        index: usize,
        count: usize,
    },

    #[error("{table} channel {key:?} not found")]
    ChannelNotFound { table: &'static str, key: String },

    #[error("sample window [{i_start}, {i_stop}) invalid for a segment of {num_samples} samples (need i_start <= i_stop <= {num_samples})")]
    SampleWindow {
        i_start: usize,
        i_stop: usize,
        num_samples: usize,
    },

    #[error("time window [{t_start}, {t_stop}] invalid (need t_start <= t_stop, neither NaN)")]
    TimeWindow { t_start: f64, t_stop: f64 },

    #[error("chunk has {actual} column(s) but {expected} channel index(es) were given")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("{operation} called before parse_header() on {source_name:?}")]
    HeaderNotParsed {
        operation: &'static str,
        source_name: String,
    },

    #[error("parse_header() already called on {0:?}; one reader parses one source once")]
    HeaderAlreadyParsed(String),

    #[error("{operation} called on {source_name:?} after its header failed to parse")]
    HeaderParseFailed {
        operation: &'static str,
        source_name: String,
    },

    #[error("{operation} called on closed reader for {source_name:?}")]
    Closed {
        operation: &'static str,
        source_name: String,
    },

    #[error("malformed source {source_name:?}: {reason}")]
    SourceFormat { source_name: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("{operation} is not supported by {reader}")]
    Unsupported {
        operation: &'static str,
        reader: String,
    },
}

impl RawIoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RawIoError::BlockIndex { .. }
            | RawIoError::SegmentIndex { .. }
            | RawIoError::ChannelIndex { .. }
            | RawIoError::ChannelNotFound { .. }
            | RawIoError::SampleWindow { .. }
            | RawIoError::TimeWindow { .. }
            | RawIoError::ShapeMismatch { .. } => ErrorKind::Range,
            RawIoError::HeaderNotParsed { .. }
            | RawIoError::HeaderAlreadyParsed(_)
            | RawIoError::HeaderParseFailed { .. }
            | RawIoError::Closed { .. } => ErrorKind::State,
            RawIoError::SourceFormat { .. } | RawIoError::Io(_) => ErrorKind::SourceFormat,
            RawIoError::Unsupported { .. } => ErrorKind::Unsupported,
        }
    }

    pub(crate) fn source_format(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        RawIoError::SourceFormat {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }
}
