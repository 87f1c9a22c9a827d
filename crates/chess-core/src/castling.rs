//! Castling rights.

use crate::Color;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastleSide {
    King,
    Queen,
}

impl CastleSide {
    pub const BOTH: [CastleSide; 2] = [CastleSide::King, CastleSide::Queen];
}

/// The four castling rights as a bit set.
///
/// Bit order is white kingside, white queenside, black kingside, black
/// queenside; [`CastlingRights::index`] follows the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CastlingRights(u8);

impl CastlingRights {
    pub const NONE: CastlingRights = CastlingRights(0);
    pub const ALL: CastlingRights = CastlingRights(0b1111);

    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        CastlingRights(bits & 0b1111)
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Position of the right in the bit set (0-3).
    #[inline]
    pub const fn index(color: Color, side: CastleSide) -> usize {
        let side = match side {
            CastleSide::King => 0,
            CastleSide::Queen => 1,
        };
        color.index() * 2 + side
    }

    #[inline]
    pub const fn has(self, color: Color, side: CastleSide) -> bool {
        self.0 & (1 << Self::index(color, side)) != 0
    }

    #[inline]
    pub fn insert(&mut self, color: Color, side: CastleSide) {
        self.0 |= 1 << Self::index(color, side);
    }

    #[inline]
    pub fn remove(&mut self, color: Color, side: CastleSide) {
        self.0 &= !(1 << Self::index(color, side));
    }

    #[inline]
    pub fn remove_color(&mut self, color: Color) {
        self.0 &= !(0b11 << (color.index() * 2));
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Parses the FEN castling field (`KQkq` subset or `-`).
    pub fn from_fen(field: &str) -> Option<Self> {
        if field == "-" {
            return Some(Self::NONE);
        }
        if field.is_empty() {
            return None;
        }
        let mut rights = Self::NONE;
        for c in field.chars() {
            let (color, side) = match c {
                'K' => (Color::White, CastleSide::King),
                'Q' => (Color::White, CastleSide::Queen),
                'k' => (Color::Black, CastleSide::King),
                'q' => (Color::Black, CastleSide::Queen),
                _ => return None,
            };
            rights.insert(color, side);
        }
        Some(rights)
    }
}

impl fmt::Display for CastlingRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("-");
        }
        for (i, c) in ['K', 'Q', 'k', 'q'].into_iter().enumerate() {
            if self.0 & (1 << i) != 0 {
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}
