//! Board coordinates.
//!
//! Squares are numbered rank-major from the top-left corner as seen from
//! White: a8 = 0, b8 = 1, ..., h8 = 7, a7 = 8, ..., h1 = 63.

use std::fmt;

/// A file (column), a through h.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum File {
    A = 0,
    B = 1,
    C = 2,
    D = 3,
    E = 4,
    F = 5,
    G = 6,
    H = 7,
}

impl File {
    pub const ALL: [File; 8] = [
        File::A,
        File::B,
        File::C,
        File::D,
        File::E,
        File::F,
        File::G,
        File::H,
    ];

    #[inline]
    pub const fn from_index(index: u8) -> Option<Self> {
        if index < 8 {
            Some(Self::ALL[index as usize])
        } else {
            None
        }
    }

    /// Parses `'a'..='h'` (case-insensitive).
    #[inline]
    pub const fn from_char(c: char) -> Option<Self> {
        let lower = c.to_ascii_lowercase();
        if lower >= 'a' && lower <= 'h' {
            Self::from_index(lower as u8 - b'a')
        } else {
            None
        }
    }

    #[inline]
    pub const fn index(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn to_char(self) -> char {
        (b'a' + self as u8) as char
    }
}

impl fmt::Display for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// A rank (row), 1 through 8. `R1` has index 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Rank {
    R1 = 0,
    R2 = 1,
    R3 = 2,
    R4 = 3,
    R5 = 4,
    R6 = 5,
    R7 = 6,
    R8 = 7,
}

impl Rank {
    pub const ALL: [Rank; 8] = [
        Rank::R1,
        Rank::R2,
        Rank::R3,
        Rank::R4,
        Rank::R5,
        Rank::R6,
        Rank::R7,
        Rank::R8,
    ];

    #[inline]
    pub const fn from_index(index: u8) -> Option<Self> {
        if index < 8 {
            Some(Self::ALL[index as usize])
        } else {
            None
        }
    }

    #[inline]
    pub const fn from_char(c: char) -> Option<Self> {
        if c >= '1' && c <= '8' {
            Self::from_index(c as u8 - b'1')
        } else {
            None
        }
    }

    #[inline]
    pub const fn index(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn to_char(self) -> char {
        (b'1' + self as u8) as char
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// A square on the board, indexed 0-63 with a8 = 0 and h1 = 63.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Square(u8);

impl Square {
    #[inline]
    pub const fn new(file: File, rank: Rank) -> Self {
        Square((7 - rank.index()) * 8 + file.index())
    }

    #[inline]
    pub const fn from_index(index: u8) -> Option<Self> {
        if index < 64 {
            Some(Square(index))
        } else {
            None
        }
    }

    /// Creates a square from an index the caller has already range-checked.
    ///
    /// # Safety
    /// The index must be in the range 0-63.
    #[inline]
    pub const unsafe fn from_index_unchecked(index: u8) -> Self {
        debug_assert!(index < 64);
        Square(index)
    }

    /// Parses algebraic notation such as `"e4"`.
    pub const fn from_algebraic(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return None;
        }
        let file = match File::from_char(bytes[0] as char) {
            Some(f) => f,
            None => return None,
        };
        let rank = match Rank::from_char(bytes[1] as char) {
            Some(r) => r,
            None => return None,
        };
        Some(Square::new(file, rank))
    }

    #[inline]
    pub const fn index(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn file(self) -> File {
        File::ALL[(self.0 & 7) as usize]
    }

    #[inline]
    pub const fn rank(self) -> Rank {
        Rank::ALL[(7 - (self.0 >> 3)) as usize]
    }

    /// Mirrors the square vertically (a8 <-> a1).
    #[inline]
    pub const fn flip(self) -> Self {
        Square(self.0 ^ 56)
    }

    /// Shifts the square by a signed index delta, if the result stays on the board.
    #[inline]
    pub const fn offset(self, delta: i8) -> Option<Self> {
        let target = self.0 as i16 + delta as i16;
        if target >= 0 && target < 64 {
            Some(Square(target as u8))
        } else {
            None
        }
    }

    /// True for the dark squares (a1, c1, ..., h8).
    #[inline]
    pub const fn is_dark(self) -> bool {
        (self.file().index() + self.rank().index()) % 2 == 0
    }

    pub fn to_algebraic(self) -> String {
        format!("{}{}", self.file(), self.rank())
    }

    /// Single-bit mask for this square.
    #[inline]
    pub const fn bitboard(self) -> u64 {
        1u64 << self.0
    }

    pub const A8: Square = Square(0);
    pub const B8: Square = Square(1);
    pub const C8: Square = Square(2);
    pub const D8: Square = Square(3);
    pub const E8: Square = Square(4);
    pub const F8: Square = Square(5);
    pub const G8: Square = Square(6);
    pub const H8: Square = Square(7);
    pub const A1: Square = Square(56);
    pub const B1: Square = Square(57);
    pub const C1: Square = Square(58);
    pub const D1: Square = Square(59);
    pub const E1: Square = Square(60);
    pub const F1: Square = Square(61);
    pub const G1: Square = Square(62);
    pub const H1: Square = Square(63);
}

impl fmt::Debug for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Square({})", self.to_algebraic())
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_algebraic())
    }
}
