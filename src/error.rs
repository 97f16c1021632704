//! Error type shared by every layer of the demultiplexer.

use std::collections::TryReserveError;
use std::fmt;
use std::path::PathBuf;

/// Errors raised while demultiplexing or parsing PSI/SI tables.
#[derive(Debug, thiserror::Error)]
pub enum DemuxError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Byte-level format violation (sync byte, truncation, loop overrun, head inconsistency).
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("packet on PID 0x{0:04X} has no registered filter")]
    UnknownPidPacket(u16),

    #[error("table 0x{table_id:02X} exceeded {limit} records")]
    TableFull { table_id: u8, limit: usize },

    #[error("allocation failed: {0}")]
    AllocationFailed(#[from] TryReserveError),

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("end of data")]
    EndOfData,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DemuxError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        DemuxError::InvalidData(msg.into())
    }

    /// Coarse classification of the error, stable across messages.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DemuxError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            DemuxError::InvalidData(_) => ErrorKind::InvalidData,
            DemuxError::UnknownPidPacket(_) => ErrorKind::UnknownPidPacket,
            DemuxError::TableFull { .. } => ErrorKind::TableFull,
            DemuxError::AllocationFailed(_) => ErrorKind::MallocFailed,
            DemuxError::FileNotFound(_) => ErrorKind::FileNotFound,
            DemuxError::EndOfData => ErrorKind::EndOfData,
            DemuxError::Io(_) => ErrorKind::Io,
        }
    }
}

/// Fieldless error kind, printed by the CLI on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    InvalidData,
    UnknownPidPacket,
    TableFull,
    MallocFailed,
    FileNotFound,
    EndOfData,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::InvalidData => "InvalidData",
            ErrorKind::UnknownPidPacket => "UnknownPidPacket",
            ErrorKind::TableFull => "TableFull",
            ErrorKind::MallocFailed => "MallocFailed",
            ErrorKind::FileNotFound => "FileNotFound",
            ErrorKind::EndOfData => "EndOfData",
            ErrorKind::Io => "Io",
        };
        f.write_str(name)
    }
}

/// Result type for demultiplexing operations
pub type Result<T> = std::result::Result<T, DemuxError>;
