//! Error types for table loading and game archives.
//!
//! The board and playout hot path never returns errors; contract
//! violations there are debug assertions.

use thiserror::Error;

/// Errors produced by the library.
#[derive(Error, Debug)]
pub enum Error {
    /// Board size outside 2..=19.
    #[error("unsupported board size {0} (expected 2..=19)")]
    UnsupportedBoardSize(usize),

    /// Malformed record in a probability table file.
    #[error("table line {line}: {reason}")]
    Table { line: usize, reason: String },

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive does not start with the `'G'` header.
    #[error("bad archive signature")]
    BadSignature,

    /// Game record does not start with `'g'`.
    #[error("bad game signature {0:#04x}")]
    BadGameSignature(u8),

    /// Archive written for another board size.
    #[error("archive board size {found} does not match {expected}")]
    BoardSizeMismatch { expected: usize, found: usize },

    /// Game result outside {-1, 0, 1}.
    #[error("bad game result {0}")]
    BadResult(i8),

    /// Move or removal position outside the board.
    #[error("invalid position {0}")]
    InvalidPosition(u16),

    /// Stone placed on an occupied point.
    #[error("board not empty at {0}")]
    Occupied(u16),

    /// Removal of a point that does not hold an opponent stone.
    #[error("unexpected removal at {0}")]
    UnexpectedRemoval(u16),

    /// `end_game` called with no game open.
    #[error("no game in progress")]
    GameNotStarted,

    /// Record ended in the middle of a field.
    #[error("incomplete record ({0})")]
    Truncated(&'static str),
}

/// Result alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;
