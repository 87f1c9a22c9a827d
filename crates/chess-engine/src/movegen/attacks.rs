//! Attack tables for leaping pieces, the `between` table and castling geometry.
//!
//! Sliding-piece attacks live in [`super::magics`] and are re-exported here so
//! callers only need one import path.

use std::sync::OnceLock;

use crate::Bitboard;
use chess_core::{CastleSide, Color, Square};

pub use super::magics::{bishop_attacks, queen_attacks, rook_attacks};

const KNIGHT_DELTAS: [(i8, i8); 8] = [
    (-2, -1),
    (-2, 1),
    (-1, -2),
    (-1, 2),
    (1, -2),
    (1, 2),
    (2, -1),
    (2, 1),
];

const KING_DELTAS: [(i8, i8); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

// Row deltas are in index order: -1 is one rank toward rank 8.
const WHITE_PAWN_DELTAS: [(i8, i8); 2] = [(-1, -1), (-1, 1)];
const BLACK_PAWN_DELTAS: [(i8, i8); 2] = [(1, -1), (1, 1)];

const KNIGHT_ATTACKS: [Bitboard; 64] = leaper_table(&KNIGHT_DELTAS);
const KING_ATTACKS: [Bitboard; 64] = leaper_table(&KING_DELTAS);
const PAWN_ATTACKS: [[Bitboard; 64]; 2] = [
    leaper_table(&WHITE_PAWN_DELTAS),
    leaper_table(&BLACK_PAWN_DELTAS),
];

#[inline]
pub fn knight_attacks(sq: Square) -> Bitboard {
    KNIGHT_ATTACKS[sq.index() as usize]
}

#[inline]
pub fn king_attacks(sq: Square) -> Bitboard {
    KING_ATTACKS[sq.index() as usize]
}

/// Squares a pawn of `color` standing on `sq` attacks.
///
/// Read the other way, `pawn_attacks(sq, !color)` is where pawns of `color`
/// must stand to attack `sq`.
#[inline]
pub fn pawn_attacks(sq: Square, color: Color) -> Bitboard {
    PAWN_ATTACKS[color.index()][sq.index() as usize]
}

const fn leaper_table(deltas: &[(i8, i8)]) -> [Bitboard; 64] {
    let mut table = [Bitboard::EMPTY; 64];
    let mut sq = 0;
    while sq < 64 {
        let row = (sq / 8) as i8;
        let file = (sq % 8) as i8;
        let mut bits = 0u64;
        let mut i = 0;
        while i < deltas.len() {
            let (dr, df) = deltas[i];
            let r = row + dr;
            let f = file + df;
            if r >= 0 && r < 8 && f >= 0 && f < 8 {
                bits |= 1u64 << (r * 8 + f);
            }
            i += 1;
        }
        table[sq] = Bitboard(bits);
        sq += 1;
    }
    table
}

static BETWEEN: OnceLock<Box<[[Bitboard; 64]; 64]>> = OnceLock::new();

/// Squares strictly between `a` and `b` when they share a rank, file or
/// diagonal; empty otherwise.
#[inline]
pub fn between(a: Square, b: Square) -> Bitboard {
    BETWEEN.get_or_init(compute_between)[a.index() as usize][b.index() as usize]
}

fn compute_between() -> Box<[[Bitboard; 64]; 64]> {
    let mut table = Box::new([[Bitboard::EMPTY; 64]; 64]);
    for from in 0..64i8 {
        for (dr, df) in KING_DELTAS {
            let mut path = Bitboard::EMPTY;
            let (mut r, mut f) = (from / 8 + dr, from % 8 + df);
            while (0..8).contains(&r) && (0..8).contains(&f) {
                let to = (r * 8 + f) as usize;
                table[from as usize][to] = path;
                path.0 |= 1u64 << to;
                r += dr;
                f += df;
            }
        }
    }
    table
}

/// Fixed squares and masks of one castling move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CastlingPath {
    pub king_from: Square,
    pub king_to: Square,
    pub rook_from: Square,
    pub rook_to: Square,
    /// Must be vacant.
    pub clear: Bitboard,
    /// The king may not pass through or land on an attacked square here.
    pub safe: Bitboard,
}

static CASTLING_PATHS: [[CastlingPath; 2]; 2] = [
    [
        CastlingPath {
            king_from: Square::E1,
            king_to: Square::G1,
            rook_from: Square::H1,
            rook_to: Square::F1,
            clear: Bitboard(0x6000_0000_0000_0000),
            safe: Bitboard(0x6000_0000_0000_0000),
        },
        CastlingPath {
            king_from: Square::E1,
            king_to: Square::C1,
            rook_from: Square::A1,
            rook_to: Square::D1,
            clear: Bitboard(0x0E00_0000_0000_0000),
            safe: Bitboard(0x0C00_0000_0000_0000),
        },
    ],
    [
        CastlingPath {
            king_from: Square::E8,
            king_to: Square::G8,
            rook_from: Square::H8,
            rook_to: Square::F8,
            clear: Bitboard(0x60),
            safe: Bitboard(0x60),
        },
        CastlingPath {
            king_from: Square::E8,
            king_to: Square::C8,
            rook_from: Square::A8,
            rook_to: Square::D8,
            clear: Bitboard(0x0E),
            safe: Bitboard(0x0C),
        },
    ],
];

#[inline]
pub fn castling_path(color: Color, side: CastleSide) -> &'static CastlingPath {
    let side = match side {
        CastleSide::King => 0,
        CastleSide::Queen => 1,
    };
    &CASTLING_PATHS[color.index()][side]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        Square::from_algebraic(s).unwrap()
    }

    fn squares(list: &[&str]) -> Bitboard {
        list.iter().fold(Bitboard::EMPTY, |bb, s| bb | Bitboard::from(sq(s)))
    }

    #[test]
    fn knight_counts() {
        assert_eq!(knight_attacks(sq("d4")).count(), 8);
        assert_eq!(knight_attacks(Square::A1).count(), 2);
        assert_eq!(knight_attacks(sq("a4")).count(), 4);
        assert_eq!(
            knight_attacks(sq("e4")),
            squares(&["d6", "f6", "g5", "g3", "f2", "d2", "c3", "c5"])
        );
    }

    #[test]
    fn king_counts() {
        assert_eq!(king_attacks(sq("d4")).count(), 8);
        assert_eq!(king_attacks(Square::H8).count(), 3);
        assert_eq!(king_attacks(sq("a4")).count(), 5);
    }

    #[test]
    fn pawn_attack_direction() {
        assert_eq!(pawn_attacks(sq("d4"), Color::White), squares(&["c5", "e5"]));
        assert_eq!(pawn_attacks(sq("d4"), Color::Black), squares(&["c3", "e3"]));
        assert_eq!(pawn_attacks(sq("a2"), Color::White), squares(&["b3"]));
        assert!(pawn_attacks(sq("h8"), Color::White).is_empty());
    }

    #[test]
    fn between_lines() {
        assert_eq!(between(Square::E1, Square::E8), squares(&["e2", "e3", "e4", "e5", "e6", "e7"]));
        assert_eq!(between(Square::A1, Square::H8), between(Square::H8, Square::A1));
        assert_eq!(between(sq("c1"), sq("f4")), squares(&["d2", "e3"]));
        assert_eq!(between(Square::A1, Square::B1), Bitboard::EMPTY);
        assert_eq!(between(Square::A1, sq("b3")), Bitboard::EMPTY);
        assert_eq!(between(Square::E1, Square::E1), Bitboard::EMPTY);
    }

    #[test]
    fn castling_masks() {
        let wk = castling_path(Color::White, CastleSide::King);
        assert_eq!(wk.clear, squares(&["f1", "g1"]));
        let wq = castling_path(Color::White, CastleSide::Queen);
        assert_eq!(wq.clear, squares(&["b1", "c1", "d1"]));
        assert_eq!(wq.safe, squares(&["c1", "d1"]));
        let bq = castling_path(Color::Black, CastleSide::Queen);
        assert_eq!(bq.clear, squares(&["b8", "c8", "d8"]));
        assert_eq!(bq.rook_to, Square::D8);
        let bk = castling_path(Color::Black, CastleSide::King);
        assert_eq!(bk.safe, squares(&["f8", "g8"]));
    }
}
