//! Bitboard chess engine: legal move generation, hashing and search.
//!
//! This crate provides:
//! - [`Bitboard`] - 64-bit square sets with shift and iteration helpers
//! - [`Position`] - board state with an undo stack and Zobrist hashing
//! - [`generate_moves`] - legal move generation, plus [`perft`] for checking it
//! - [`evaluate`] and the draw rules in [`draw`]
//! - [`TranspositionTable`] - lock-free, checksum-validated search cache
//! - [`Engine`] - iterative-deepening alpha-beta search on a background thread
//!
//! # Layout
//!
//! Squares are numbered from a8 (0) to h1 (63), rank by rank, so bit `n` of a
//! bitboard is square `n` and "north" is a right shift by 8.
//!
//! # Example
//!
//! ```
//! use chess_engine::{generate_moves, perft, Position};
//!
//! let mut position = Position::startpos();
//! assert_eq!(generate_moves(&position).len(), 20);
//! assert_eq!(perft(&mut position, 3), 8902);
//! ```

mod bitboard;
pub mod book;
pub mod config;
pub mod draw;
mod engine;
mod error;
pub mod eval;
pub mod movegen;
mod position;
pub mod search;
pub mod time;
pub mod tt;
mod zobrist;

pub use bitboard::Bitboard;
pub use book::{BookMove, MemoryBook, OpeningBook};
pub use config::{ConfigError, EngineConfig};
pub use draw::{draw_reason, DrawReason};
pub use engine::{Engine, SearchHandle};
pub use error::EngineError;
pub use eval::evaluate;
pub use movegen::perft::{perft, perft_divide};
pub use movegen::{find_move, generate_moves, in_check, MoveList};
pub use position::{GameState, Position, STATE_STACK_CAPACITY};
pub use search::{
    InfoSink, SearchControl, SearchInfo, SearchLimits, SearchOutcome, SearchResult, TracingSink,
    MATE,
};
pub use time::Clock;
pub use tt::{Bound, TranspositionTable, TtEntry};
pub use zobrist::{ZobristKeys, ZOBRIST};
