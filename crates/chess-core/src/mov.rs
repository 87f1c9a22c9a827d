//! Move encoding.
//!
//! A [`Move`] packs into 16 bits: origin square (bits 0-5), destination
//! square (bits 6-11) and a 4-bit [`MoveFlag`] (bits 12-15). Within the
//! flag, bit 3 marks a promotion and bit 2 marks a capture; the low two
//! bits select the castling side or the promotion piece.

use crate::{Piece, Square};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MoveFlag {
    Quiet = 0,
    DoublePush = 1,
    KingCastle = 2,
    QueenCastle = 3,
    Capture = 4,
    EnPassant = 5,
    PromoteKnight = 8,
    PromoteBishop = 9,
    PromoteRook = 10,
    PromoteQueen = 11,
    CapturePromoteKnight = 12,
    CapturePromoteBishop = 13,
    CapturePromoteRook = 14,
    CapturePromoteQueen = 15,
}

impl MoveFlag {
    const PROMOTION_BIT: u8 = 0b1000;
    const CAPTURE_BIT: u8 = 0b0100;

    /// Decodes the 4-bit field. Codes 6 and 7 are unused and yield `None`.
    #[inline]
    pub const fn from_bits(bits: u8) -> Option<Self> {
        Some(match bits {
            0 => MoveFlag::Quiet,
            1 => MoveFlag::DoublePush,
            2 => MoveFlag::KingCastle,
            3 => MoveFlag::QueenCastle,
            4 => MoveFlag::Capture,
            5 => MoveFlag::EnPassant,
            8 => MoveFlag::PromoteKnight,
            9 => MoveFlag::PromoteBishop,
            10 => MoveFlag::PromoteRook,
            11 => MoveFlag::PromoteQueen,
            12 => MoveFlag::CapturePromoteKnight,
            13 => MoveFlag::CapturePromoteBishop,
            14 => MoveFlag::CapturePromoteRook,
            15 => MoveFlag::CapturePromoteQueen,
            _ => return None,
        })
    }

    /// Promotion flag for `piece`, or `None` when the piece cannot be promoted to.
    pub const fn promotion(piece: Piece, capture: bool) -> Option<Self> {
        let low = match piece {
            Piece::Knight => 0,
            Piece::Bishop => 1,
            Piece::Rook => 2,
            Piece::Queen => 3,
            _ => return None,
        };
        let capture_bit = if capture { Self::CAPTURE_BIT } else { 0 };
        Self::from_bits(Self::PROMOTION_BIT | low | capture_bit)
    }

    #[inline]
    pub const fn is_capture(self) -> bool {
        (self as u8) & Self::CAPTURE_BIT != 0
    }

    #[inline]
    pub const fn is_promotion(self) -> bool {
        (self as u8) & Self::PROMOTION_BIT != 0
    }

    #[inline]
    pub const fn is_castling(self) -> bool {
        matches!(self, MoveFlag::KingCastle | MoveFlag::QueenCastle)
    }

    #[inline]
    pub const fn promotion_piece(self) -> Option<Piece> {
        if self.is_promotion() {
            Piece::from_index(((self as u8) & 0b11) as usize + 1)
        } else {
            None
        }
    }
}

/// A move, meaningful only relative to the position it was generated in.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move(u16);

impl Move {
    /// Placeholder that is never a legal move (a8 to a8).
    pub const NULL: Move = Move(0);

    #[inline]
    pub const fn new(from: Square, to: Square, flag: MoveFlag) -> Self {
        Move((from.index() as u16) | ((to.index() as u16) << 6) | ((flag as u16) << 12))
    }

    #[inline]
    pub const fn quiet(from: Square, to: Square) -> Self {
        Self::new(from, to, MoveFlag::Quiet)
    }

    #[inline]
    pub const fn from(self) -> Square {
        // SAFETY: masked to 6 bits
        unsafe { Square::from_index_unchecked((self.0 & 0x3F) as u8) }
    }

    #[inline]
    pub const fn to(self) -> Square {
        // SAFETY: masked to 6 bits
        unsafe { Square::from_index_unchecked(((self.0 >> 6) & 0x3F) as u8) }
    }

    #[inline]
    pub const fn flag(self) -> MoveFlag {
        match MoveFlag::from_bits((self.0 >> 12) as u8) {
            Some(flag) => flag,
            None => MoveFlag::Quiet,
        }
    }

    #[inline]
    pub const fn is_capture(self) -> bool {
        self.flag().is_capture()
    }

    #[inline]
    pub const fn is_promotion(self) -> bool {
        self.flag().is_promotion()
    }

    #[inline]
    pub const fn promotion_piece(self) -> Option<Piece> {
        self.flag().promotion_piece()
    }

    #[inline]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Coordinate notation, e.g. `e2e4` or `e7e8q`.
    pub fn to_uci(self) -> String {
        match self.promotion_piece() {
            Some(p) => format!("{}{}{}", self.from(), self.to(), p.to_char()),
            None => format!("{}{}", self.from(), self.to()),
        }
    }

    /// Parses coordinate notation into its squares and optional promotion.
    ///
    /// The flags can only be recovered against a position, so the result is
    /// a [`UciMove`] to be matched against the legal move list.
    pub fn parse_uci(s: &str) -> Option<UciMove> {
        if !s.is_ascii() || s.len() < 4 || s.len() > 5 {
            return None;
        }
        let from = Square::from_algebraic(&s[0..2])?;
        let to = Square::from_algebraic(&s[2..4])?;
        let promotion = match s.as_bytes().get(4) {
            None => None,
            Some(&c) => match Piece::from_fen_char(c as char) {
                Some((p, _)) if p != Piece::Pawn && p != Piece::King => Some(p),
                _ => return None,
            },
        };
        Some(UciMove {
            from,
            to,
            promotion,
        })
    }
}

impl fmt::Debug for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Move({} {:?})", self.to_uci(), self.flag())
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uci())
    }
}

/// Coordinate-notation move before it is resolved against a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UciMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Piece>,
}

impl UciMove {
    /// True if `mv` has the same squares and promotion piece.
    pub fn matches(&self, mv: Move) -> bool {
        mv.from() == self.from && mv.to() == self.to && mv.promotion_piece() == self.promotion
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{File, Rank};

    fn sq(s: &str) -> Square {
        Square::from_algebraic(s).unwrap()
    }

    #[test]
    fn fields_roundtrip() {
        let m = Move::new(sq("e2"), sq("e4"), MoveFlag::DoublePush);
        assert_eq!(m.from(), sq("e2"));
        assert_eq!(m.to(), sq("e4"));
        assert_eq!(m.flag(), MoveFlag::DoublePush);
        assert!(!m.is_capture());
    }

    #[test]
    fn flag_bits() {
        assert!(MoveFlag::Capture.is_capture());
        assert!(MoveFlag::EnPassant.is_capture());
        assert!(MoveFlag::CapturePromoteRook.is_capture());
        assert!(!MoveFlag::PromoteRook.is_capture());
        assert!(!MoveFlag::KingCastle.is_capture());
        assert!(MoveFlag::PromoteKnight.is_promotion());
        assert!(!MoveFlag::EnPassant.is_promotion());
        assert_eq!(MoveFlag::from_bits(6), None);
        assert_eq!(MoveFlag::from_bits(7), None);
    }

    #[test]
    fn promotion_flags_map_to_pieces() {
        for piece in Piece::PROMOTIONS {
            for capture in [false, true] {
                let flag = MoveFlag::promotion(piece, capture).unwrap();
                assert_eq!(flag.promotion_piece(), Some(piece));
                assert_eq!(flag.is_capture(), capture);
            }
        }
        assert_eq!(MoveFlag::promotion(Piece::King, false), None);
        assert_eq!(MoveFlag::Quiet.promotion_piece(), None);
    }

    #[test]
    fn uci_text() {
        let e7 = Square::new(File::E, Rank::R7);
        let e8 = Square::new(File::E, Rank::R8);
        assert_eq!(Move::quiet(sq("g1"), sq("f3")).to_uci(), "g1f3");
        assert_eq!(Move::new(e7, e8, MoveFlag::PromoteQueen).to_uci(), "e7e8q");
        assert_eq!(
            Move::new(e7, sq("d8"), MoveFlag::CapturePromoteKnight).to_string(),
            "e7d8n"
        );
    }

    #[test]
    fn parse_uci() {
        let m = Move::parse_uci("e2e4").unwrap();
        assert_eq!((m.from, m.to, m.promotion), (sq("e2"), sq("e4"), None));

        let p = Move::parse_uci("a7a8R").unwrap();
        assert_eq!(p.promotion, Some(Piece::Rook));

        assert!(Move::parse_uci("e7e8k").is_none());
        assert!(Move::parse_uci("e7e8x").is_none());
        assert!(Move::parse_uci("e2e9").is_none());
        assert!(Move::parse_uci("e2").is_none());
        assert!(Move::parse_uci("e2e4qq").is_none());
    }

    #[test]
    fn uci_move_matches_by_squares_and_promotion() {
        let parsed = Move::parse_uci("b7b8q").unwrap();
        assert!(parsed.matches(Move::new(sq("b7"), sq("b8"), MoveFlag::PromoteQueen)));
        assert!(!parsed.matches(Move::new(sq("b7"), sq("b8"), MoveFlag::PromoteKnight)));
        assert!(!parsed.matches(Move::new(sq("b7"), sq("a8"), MoveFlag::CapturePromoteQueen)));
    }

    #[test]
    fn null_move() {
        assert_eq!(Move::NULL.from(), Move::NULL.to());
        assert_eq!(Move::NULL.raw(), 0);
    }
}
