//! Core types for chess.
//!
//! This crate provides the vocabulary shared by the engine:
//! - [`Piece`] and [`Color`]
//! - [`Square`], [`File`], and [`Rank`], numbered a8 = 0 through h1 = 63
//! - [`Move`], a 16-bit move with [`MoveFlag`] tags
//! - [`CastlingRights`]
//! - [`Fen`] parsing and serialization

mod castling;
mod color;
mod fen;
mod mov;
mod piece;
mod square;

pub use castling::{CastleSide, CastlingRights};
pub use color::Color;
pub use fen::{Fen, FenError, Occupant};
pub use mov::{Move, MoveFlag, UciMove};
pub use piece::Piece;
pub use square::{File, Rank, Square};
