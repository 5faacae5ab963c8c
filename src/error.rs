//! Structured error taxonomy for the load generator core.
//!
//! Every variant maps onto one bit of the historical exit-status mask so that
//! operator tooling built against the old bitmask keeps working even though
//! callers inside the crate match on a real enum.

use thiserror::Error;

/// `0x01` - source path missing, unreadable, or wrong type.
pub const SOURCE_DIRECTORY: u32 = 0x01;
/// `0x02` - target path cannot be resolved, created, or written.
pub const TARGET_DIRECTORY: u32 = 0x02;
/// `0x04` - open/read failure, short read, or verification failure.
pub const INPUT_FILE_ERROR: u32 = 0x04;
/// `0x08` - create failure or short/failed write.
pub const OUTPUT_FILE_ERROR: u32 = 0x08;
/// `0x80` - allocation failure, pinning failure, or thread creation failure.
pub const RESOURCE_ERROR: u32 = 0x80;

/// One of the five error categories a worker can report.
#[derive(Debug, Error, Clone)]
pub enum LoadgenError {
    #[error("source directory error: {0}")]
    SourceDirectory(String),

    #[error("target directory error: {0}")]
    TargetDirectory(String),

    #[error("input file error: {0}")]
    InputFile(String),

    #[error("output file error: {0}")]
    OutputFile(String),

    #[error("resource error: {0}")]
    Resource(String),
}

impl LoadgenError {
    /// The bit this error contributes to a worker's `exit_status`.
    pub fn bits(&self) -> u32 {
        match self {
            LoadgenError::SourceDirectory(_) => SOURCE_DIRECTORY,
            LoadgenError::TargetDirectory(_) => TARGET_DIRECTORY,
            LoadgenError::InputFile(_) => INPUT_FILE_ERROR,
            LoadgenError::OutputFile(_) => OUTPUT_FILE_ERROR,
            LoadgenError::Resource(_) => RESOURCE_ERROR,
        }
    }

    /// Short category string, used as the `problem` diagnostic in zombie mode.
    pub fn problem(&self) -> &'static str {
        match self {
            LoadgenError::SourceDirectory(_) => "source directory access",
            LoadgenError::TargetDirectory(_) => "target directory access",
            LoadgenError::InputFile(_) => "input file error",
            LoadgenError::OutputFile(_) => "output file error",
            LoadgenError::Resource(_) => "resource error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_match_historical_mask() {
        assert_eq!(LoadgenError::SourceDirectory("x".into()).bits(), 0x01);
        assert_eq!(LoadgenError::TargetDirectory("x".into()).bits(), 0x02);
        assert_eq!(LoadgenError::InputFile("x".into()).bits(), 0x04);
        assert_eq!(LoadgenError::OutputFile("x".into()).bits(), 0x08);
        assert_eq!(LoadgenError::Resource("x".into()).bits(), 0x80);
    }
}
