//! FEN (Forsyth-Edwards Notation) parsing and serialization.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::{CastlingRights, Color, Piece, Rank, Square};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FenError {
    #[error("invalid FEN: expected 4 or 6 fields, got {0}")]
    InvalidPartCount(usize),

    #[error("invalid piece placement: {0}")]
    InvalidPiecePlacement(String),

    #[error("invalid active color: expected 'w' or 'b', got '{0}'")]
    InvalidActiveColor(String),

    #[error("invalid castling rights: {0}")]
    InvalidCastlingRights(String),

    #[error("invalid en passant square: {0}")]
    InvalidEnPassantSquare(String),

    #[error("invalid halfmove clock: {0}")]
    InvalidHalfmoveClock(String),

    #[error("invalid fullmove number: {0}")]
    InvalidFullmoveNumber(String),

    #[error("{color} must have exactly one king, found {count}")]
    KingCount { color: Color, count: usize },
}

/// Contents of a square in a parsed placement.
pub type Occupant = Option<(Piece, Color)>;

/// A fully parsed FEN record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fen {
    /// Indexed by [`Square::index`] (a8 = 0).
    pub board: [Occupant; 64],
    pub side_to_move: Color,
    pub castling: CastlingRights,
    pub en_passant: Option<Square>,
    pub halfmove_clock: u32,
    pub fullmove_number: u32,
}

impl Fen {
    pub const STARTPOS: &'static str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    /// Parses a FEN string. The two clock fields may be omitted.
    pub fn parse(fen: &str) -> Result<Self, FenError> {
        let parts: Vec<&str> = fen.split_whitespace().collect();
        if parts.len() != 4 && parts.len() != 6 {
            return Err(FenError::InvalidPartCount(parts.len()));
        }

        let board = parse_placement(parts[0])?;

        let side_to_move = match parts[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(FenError::InvalidActiveColor(other.to_string())),
        };

        let castling = CastlingRights::from_fen(parts[2])
            .ok_or_else(|| FenError::InvalidCastlingRights(parts[2].to_string()))?;

        let en_passant = parse_en_passant(parts[3])?;

        let (halfmove_clock, fullmove_number) = if parts.len() == 6 {
            let halfmove = parts[4]
                .parse::<u32>()
                .map_err(|_| FenError::InvalidHalfmoveClock(parts[4].to_string()))?;
            let fullmove = parts[5]
                .parse::<u32>()
                .ok()
                .filter(|&n| n > 0)
                .ok_or_else(|| FenError::InvalidFullmoveNumber(parts[5].to_string()))?;
            (halfmove, fullmove)
        } else {
            (0, 1)
        };

        Ok(Fen {
            board,
            side_to_move,
            castling,
            en_passant,
            halfmove_clock,
            fullmove_number,
        })
    }

    /// Renders just the piece placement field.
    pub fn placement(&self) -> String {
        let mut out = String::with_capacity(72);
        for (row, squares) in self.board.chunks(8).enumerate() {
            let mut empty = 0;
            for occupant in squares {
                match occupant {
                    Some((piece, color)) => {
                        if empty > 0 {
                            out.push(char::from(b'0' + empty));
                            empty = 0;
                        }
                        out.push(piece.to_fen_char(*color));
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                out.push(char::from(b'0' + empty));
            }
            if row < 7 {
                out.push('/');
            }
        }
        out
    }
}

impl Default for Fen {
    fn default() -> Self {
        Self::parse(Self::STARTPOS).expect("start position FEN is valid")
    }
}

impl FromStr for Fen {
    type Err = FenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Fen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} ",
            self.placement(),
            self.side_to_move.fen_char(),
            self.castling
        )?;
        match self.en_passant {
            Some(sq) => write!(f, "{sq}")?,
            None => f.write_str("-")?,
        }
        write!(f, " {} {}", self.halfmove_clock, self.fullmove_number)
    }
}

fn parse_placement(placement: &str) -> Result<[Occupant; 64], FenError> {
    let rows: Vec<&str> = placement.split('/').collect();
    if rows.len() != 8 {
        return Err(FenError::InvalidPiecePlacement(format!(
            "expected 8 ranks, got {}",
            rows.len()
        )));
    }

    let mut board = [None; 64];
    let mut kings = [0usize; 2];

    // FEN lists rank 8 first, which is also index order.
    for (row, text) in rows.iter().enumerate() {
        let rank_label = 8 - row;
        let mut file = 0usize;
        for c in text.chars() {
            if let Some(run) = c.to_digit(10).filter(|d| (1..=8).contains(d)) {
                file += run as usize;
            } else if let Some((piece, color)) = Piece::from_fen_char(c) {
                if file >= 8 {
                    return Err(FenError::InvalidPiecePlacement(format!(
                        "rank {rank_label} has more than 8 squares"
                    )));
                }
                if piece == Piece::King {
                    kings[color.index()] += 1;
                }
                board[row * 8 + file] = Some((piece, color));
                file += 1;
            } else {
                return Err(FenError::InvalidPiecePlacement(format!(
                    "invalid character '{c}' in rank {rank_label}"
                )));
            }
        }
        if file != 8 {
            return Err(FenError::InvalidPiecePlacement(format!(
                "rank {rank_label} has {file} squares, expected 8"
            )));
        }
    }

    for color in Color::BOTH {
        let count = kings[color.index()];
        if count != 1 {
            return Err(FenError::KingCount { color, count });
        }
    }

    Ok(board)
}

fn parse_en_passant(field: &str) -> Result<Option<Square>, FenError> {
    if field == "-" {
        return Ok(None);
    }
    match Square::from_algebraic(field) {
        Some(sq) if sq.rank() == Rank::R3 || sq.rank() == Rank::R6 => Ok(Some(sq)),
        _ => Err(FenError::InvalidEnPassantSquare(field.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

    #[test]
    fn parse_startpos() {
        let fen = Fen::parse(Fen::STARTPOS).unwrap();
        assert_eq!(fen.side_to_move, Color::White);
        assert_eq!(fen.castling, CastlingRights::ALL);
        assert_eq!(fen.en_passant, None);
        assert_eq!(fen.halfmove_clock, 0);
        assert_eq!(fen.fullmove_number, 1);
        assert_eq!(fen.board[0], Some((Piece::Rook, Color::Black)));
        assert_eq!(fen.board[Square::E1.index() as usize], Some((Piece::King, Color::White)));
        assert_eq!(fen.board[36], None);
    }

    #[test]
    fn roundtrip() {
        for text in [
            Fen::STARTPOS,
            KIWIPETE,
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3",
        ] {
            assert_eq!(Fen::parse(text).unwrap().to_string(), text);
        }
    }

    #[test]
    fn clocks_may_be_omitted() {
        let fen: Fen = "4k3/8/8/8/8/8/8/4K3 b -  -".parse().unwrap();
        assert_eq!(fen.halfmove_clock, 0);
        assert_eq!(fen.fullmove_number, 1);
        assert_eq!(fen.side_to_move, Color::Black);
    }

    #[test]
    fn wrong_field_count() {
        assert_eq!(Fen::parse("invalid"), Err(FenError::InvalidPartCount(1)));
        assert!(matches!(
            Fen::parse("4k3/8/8/8/8/8/8/4K3 w - - 0"),
            Err(FenError::InvalidPartCount(5))
        ));
    }

    #[test]
    fn bad_placement() {
        for placement in [
            "4k3/8/8/8/8/8/4K3",
            "4k3/8/8/8/8/8/8/4KX2",
            "4k4/8/8/8/8/8/8/4K3",
            "4k3/8/8/8/8/8/8/4K2",
            "4k3/8/8/8/8/8/8/09",
        ] {
            let text = format!("{placement} w - - 0 1");
            assert!(
                matches!(Fen::parse(&text), Err(FenError::InvalidPiecePlacement(_))),
                "{text}"
            );
        }
    }

    #[test]
    fn kings_are_required() {
        assert_eq!(
            Fen::parse("8/8/8/8/8/8/8/4K3 w - - 0 1"),
            Err(FenError::KingCount {
                color: Color::Black,
                count: 0
            })
        );
        assert!(matches!(
            Fen::parse("4k3/8/8/8/8/8/8/3KK3 w - - 0 1"),
            Err(FenError::KingCount { count: 2, .. })
        ));
    }

    #[test]
    fn bad_side_castling_and_en_passant() {
        assert!(matches!(
            Fen::parse("4k3/8/8/8/8/8/8/4K3 x - - 0 1"),
            Err(FenError::InvalidActiveColor(_))
        ));
        assert!(matches!(
            Fen::parse("4k3/8/8/8/8/8/8/4K3 w XYZ - 0 1"),
            Err(FenError::InvalidCastlingRights(_))
        ));
        assert!(matches!(
            Fen::parse("4k3/8/8/8/8/8/8/4K3 w - e4 0 1"),
            Err(FenError::InvalidEnPassantSquare(_))
        ));
        assert!(matches!(
            Fen::parse("4k3/8/8/8/8/8/8/4K3 w - x3 0 1"),
            Err(FenError::InvalidEnPassantSquare(_))
        ));
    }

    #[test]
    fn bad_clocks() {
        assert!(matches!(
            Fen::parse("4k3/8/8/8/8/8/8/4K3 w - - abc 1"),
            Err(FenError::InvalidHalfmoveClock(_))
        ));
        assert!(matches!(
            Fen::parse("4k3/8/8/8/8/8/8/4K3 w - - 0 xyz"),
            Err(FenError::InvalidFullmoveNumber(_))
        ));
        assert!(matches!(
            Fen::parse("4k3/8/8/8/8/8/8/4K3 w - - 0 0"),
            Err(FenError::InvalidFullmoveNumber(_))
        ));
    }

    #[test]
    fn error_messages_name_the_input() {
        let err = Fen::parse("4k3/8/8/8/8/8/8/4K3 w - z9 0 1").unwrap_err();
        assert!(err.to_string().contains("z9"));
        let err = Fen::parse("8/8/8/8/8/8/8/8 w - - 0 1").unwrap_err();
        assert!(err.to_string().contains("White"));
    }
}
