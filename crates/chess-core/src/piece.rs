//! Piece kinds.

use crate::Color;

/// Kind of a piece. An empty square is `None` wherever a square may be vacant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Piece {
    Pawn = 0,
    Knight = 1,
    Bishop = 2,
    Rook = 3,
    Queen = 4,
    King = 5,
}

impl Piece {
    pub const ALL: [Piece; 6] = [
        Piece::Pawn,
        Piece::Knight,
        Piece::Bishop,
        Piece::Rook,
        Piece::Queen,
        Piece::King,
    ];

    /// Pieces a pawn may promote to, in encoding order.
    pub const PROMOTIONS: [Piece; 4] = [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < 6 {
            Some(Self::ALL[index])
        } else {
            None
        }
    }

    /// Lower-case letter used in FEN and coordinate notation.
    pub const fn to_char(self) -> char {
        match self {
            Piece::Pawn => 'p',
            Piece::Knight => 'n',
            Piece::Bishop => 'b',
            Piece::Rook => 'r',
            Piece::Queen => 'q',
            Piece::King => 'k',
        }
    }

    pub const fn to_fen_char(self, color: Color) -> char {
        let c = self.to_char();
        match color {
            Color::White => c.to_ascii_uppercase(),
            Color::Black => c,
        }
    }

    /// Parses a FEN letter; upper case is White.
    pub const fn from_fen_char(c: char) -> Option<(Piece, Color)> {
        let color = if c.is_ascii_uppercase() {
            Color::White
        } else {
            Color::Black
        };
        let piece = match c.to_ascii_lowercase() {
            'p' => Piece::Pawn,
            'n' => Piece::Knight,
            'b' => Piece::Bishop,
            'r' => Piece::Rook,
            'q' => Piece::Queen,
            'k' => Piece::King,
            _ => return None,
        };
        Some((piece, color))
    }

    #[inline]
    pub const fn is_slider(self) -> bool {
        matches!(self, Piece::Bishop | Piece::Rook | Piece::Queen)
    }
}

impl std::fmt::Display for Piece {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Piece::Pawn => "Pawn",
            Piece::Knight => "Knight",
            Piece::Bishop => "Bishop",
            Piece::Rook => "Rook",
            Piece::Queen => "Queen",
            Piece::King => "King",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fen_letters_roundtrip() {
        for piece in Piece::ALL {
            for color in Color::BOTH {
                let c = piece.to_fen_char(color);
                assert_eq!(Piece::from_fen_char(c), Some((piece, color)));
            }
        }
        assert_eq!(Piece::from_fen_char('x'), None);
    }

    #[test]
    fn promotion_pieces_are_indexed_one_to_four() {
        for (i, p) in Piece::PROMOTIONS.iter().enumerate() {
            assert_eq!(p.index(), i + 1);
        }
    }

    #[test]
    fn sliders() {
        let sliders: Vec<_> = Piece::ALL.iter().filter(|p| p.is_slider()).collect();
        assert_eq!(sliders, vec![&Piece::Bishop, &Piece::Rook, &Piece::Queen]);
    }
}
