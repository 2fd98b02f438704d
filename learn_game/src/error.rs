use crate::board::Move;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid move: {mv}. Possible moves are: {possible:?}")]
    InvalidMove { mv: Move, possible: Vec<Move> },

    #[error("no valid moves available")]
    NoValidMoves,

    #[error("invalid board key '{key}'")]
    InvalidBoardKey { key: String },

    #[error("failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    #[error("malformed Q-table: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("archive error: {0}")]
    Archive(#[from] serde_pickle::Error),
}

impl Error {
    pub(crate) fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            operation: operation.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
