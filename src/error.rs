//! Error types for the memory model and the file front end.

use std::path::PathBuf;
use std::process::ExitCode;

use thiserror::Error;

/// Result type alias for file and command handling
pub type Result<T> = std::result::Result<T, VmError>;

/// Bounds violations inside the simulated hardware
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    #[error("physical address {0} is outside physical memory")]
    AddressOutOfRange(i64),

    #[error("frame {0} does not exist")]
    FrameOutOfRange(usize),

    #[error("disk block {0} does not exist")]
    BlockOutOfRange(usize),
}

/// Failures while reading init/command files or writing results
#[derive(Error, Debug)]
pub enum VmError {
    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("init file is empty")]
    EmptyInit,

    #[error("{table} line has {count} tokens, expected a multiple of 3")]
    TokenCount { table: &'static str, count: usize },

    #[error("invalid {what}: {token}")]
    InvalidNumber { what: &'static str, token: String },

    #[error("segment number {0} exceeds max {max}", max = crate::constants::MAX_SEGMENTS - 1)]
    SegmentOutOfRange(u32),

    #[error("page number {0} exceeds max {max}", max = crate::constants::PT_SIZE - 1)]
    PageOutOfRange(u32),

    #[error("line {line}: unknown command `{command}`")]
    UnknownCommand { line: usize, command: String },

    #[error("line {line}: `{command}` expects an integer operand")]
    MissingOperand { line: usize, command: &'static str },

    #[error("line {line}: invalid operand `{token}`")]
    InvalidOperand { line: usize, token: String },
}

impl VmError {
    /// Numeric status the CLI exits with
    pub fn status(&self) -> u8 {
        match self {
            Self::ReadFile { .. } => 3,
            Self::Io(_) => 7,
            Self::EmptyInit
            | Self::TokenCount { .. }
            | Self::InvalidNumber { .. }
            | Self::SegmentOutOfRange(_)
            | Self::PageOutOfRange(_) => 4,
            Self::UnknownCommand { .. }
            | Self::MissingOperand { .. }
            | Self::InvalidOperand { .. } => 5,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.status())
    }
}
