use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A topology record could not be used. Always fatal for the topology being parsed.
    #[error("malformed topology record (at line {line}): {details}")]
    MalformedTopologyRecord { line: usize, details: String },

    /// Frames with 9 atoms or fewer are stored uncompressed and cannot back a model.
    #[error("a frame with {natoms} atoms cannot be attached to a model (more than 9 are required)")]
    UnsupportedFrameSize { natoms: usize },

    #[error("corrupt frame: {details}")]
    CorruptFrame { details: String },

    #[error("frame holds {found} atoms, but the topology describes {expected}")]
    AtomCountMismatch { expected: usize, found: usize },

    #[error("I/O operation failed: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl Error {
    pub fn malformed(line: usize, details: impl Into<String>) -> Self {
        Self::MalformedTopologyRecord {
            line,
            details: details.into(),
        }
    }

    pub fn corrupt(details: impl Into<String>) -> Self {
        Self::CorruptFrame {
            details: details.into(),
        }
    }

    /// Whether this error is an unexpected end of the underlying stream.
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Io { source } if source.kind() == std::io::ErrorKind::UnexpectedEof)
    }
}
