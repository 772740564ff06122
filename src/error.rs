//! error defines the pipeline error surface.

extern crate thiserror;

use std::io;
use std::path::PathBuf;

/// PipelineError enumerates the failure kinds surfaced by the parse
/// pipeline, the markable stream adapters, and the makefile locators.
///
/// ParseCancelled is the grammar's end-of-input signal. It is caught by
/// the target emitter and converted into normal end-of-stream; it never
/// reaches callers of the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// MalformedLine reports a line constructed from text with an
    /// interior line break.
    #[error("string has multiple line breaks: {0:?}")]
    MalformedLine(String),

    /// ReadPastEnd reports a consume or text read past the end of a
    /// stream.
    #[error("cannot read past end of stream")]
    ReadPastEnd,

    /// ReleasedPosition reports a seek or text read targeting a
    /// position no longer reachable in a stream buffer.
    #[error("cannot seek to released position {0}")]
    ReleasedPosition(isize),

    /// ParseCancelled is the grammar's end-of-input signal.
    #[error("parse cancelled")]
    ParseCancelled,

    /// Parse wraps a failure from a grammar or stream adapter.
    #[error("parse pipeline failure: {0}")]
    Parse(String),

    /// Locator reports a filesystem or permission failure during
    /// makefile discovery.
    #[error("locator failure: {}: {}", path.display(), source)]
    Locator {
        /// path denotes the directory or file that failed.
        path: PathBuf,

        /// source denotes the underlying I/O failure.
        source: io::Error,
    },

    /// InvalidArguments reports unusable make-style arguments.
    #[error("invalid make arguments: {0}")]
    InvalidArguments(String),

    /// Config reports an unreadable or unparseable configuration
    /// file.
    #[error("configuration failure: {0}")]
    Config(String),

    /// Io wraps I/O failures at the orchestration boundary.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl PipelineError {
    /// locator wraps an I/O failure with the path that produced it.
    pub fn locator<P: Into<PathBuf>>(path: P, source: io::Error) -> PipelineError {
        PipelineError::Locator {
            path: path.into(),
            source,
        }
    }

    /// is_parse_cancelled reports whether this error is the grammar's
    /// end-of-input signal.
    pub fn is_parse_cancelled(&self) -> bool {
        matches!(self, PipelineError::ParseCancelled)
    }
}

#[test]
fn test_parse_cancelled_detection() {
    assert!(PipelineError::ParseCancelled.is_parse_cancelled());
    assert!(!PipelineError::ReadPastEnd.is_parse_cancelled());
}

#[test]
fn test_display() {
    assert_eq!(
        PipelineError::MalformedLine("a\nb".to_string()).to_string(),
        "string has multiple line breaks: \"a\\nb\""
    );
    assert_eq!(
        PipelineError::ReleasedPosition(-1).to_string(),
        "cannot seek to released position -1"
    );
}
