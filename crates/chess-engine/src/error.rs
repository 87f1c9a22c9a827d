//! Engine error types.

use chess_core::FenError;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    InvalidFen(#[from] FenError),

    #[error("not a coordinate move: '{0}'")]
    InvalidMoveText(String),

    #[error("illegal move {mv} in position {fen}")]
    IllegalMove { mv: String, fen: String },

    #[error("a search is already running")]
    SearchInProgress,

    #[error("could not allocate a transposition table of {entries} entries")]
    TableAllocation { entries: usize },

    #[error("failed to start search thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    #[error("search thread panicked")]
    SearchPanicked,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fen_errors_convert() {
        let err: EngineError = chess_core::Fen::parse("bogus").unwrap_err().into();
        assert!(matches!(err, EngineError::InvalidFen(FenError::InvalidPartCount(1))));
        assert!(err.to_string().contains("expected 4 or 6 fields"));
    }

    #[test]
    fn messages() {
        let err = EngineError::IllegalMove {
            mv: "e2e5".into(),
            fen: "startpos".into(),
        };
        assert_eq!(err.to_string(), "illegal move e2e5 in position startpos");
        assert_eq!(
            EngineError::SearchInProgress.to_string(),
            "a search is already running"
        );
    }
}
