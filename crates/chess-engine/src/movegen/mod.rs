//! Legal move generation.
//!
//! Moves are generated legal by construction: king-danger squares are
//! computed with our king lifted off the board, checks narrow every
//! non-king move to a capture-or-block mask, and pinned pieces are held to
//! the line through their pinner. Nothing is made and unmade to test
//! legality.

pub mod attacks;
mod magics;
pub mod perft;

use crate::position::en_passant_victim;
use crate::{Bitboard, EngineError, Position};
use chess_core::{CastleSide, Color, Move, MoveFlag, Piece, Rank, Square};

use attacks::{
    between, bishop_attacks, castling_path, king_attacks, knight_attacks, pawn_attacks,
    queen_attacks, rook_attacks,
};

/// A list of moves with a fixed maximum capacity.
///
/// Chess positions have at most 218 legal moves, so a fixed-size array
/// avoids heap allocation during generation.
#[derive(Clone)]
pub struct MoveList {
    moves: [Move; Self::MAX_MOVES],
    len: usize,
}

impl MoveList {
    pub const MAX_MOVES: usize = 256;

    #[inline]
    pub const fn new() -> Self {
        MoveList {
            moves: [Move::NULL; Self::MAX_MOVES],
            len: 0,
        }
    }

    #[inline]
    pub fn push(&mut self, m: Move) {
        debug_assert!(self.len < Self::MAX_MOVES);
        self.moves[self.len] = m;
        self.len += 1;
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_slice(&self) -> &[Move] {
        &self.moves[..self.len]
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Move> {
        self.as_slice().iter()
    }

    /// Position of `m` in generation order.
    pub fn position_of(&self, m: Move) -> Option<usize> {
        self.as_slice().iter().position(|&x| x == m)
    }

    #[inline]
    pub fn contains(&self, m: Move) -> bool {
        self.position_of(m).is_some()
    }
}

impl Default for MoveList {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Index<usize> for MoveList {
    type Output = Move;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        debug_assert!(index < self.len);
        &self.moves[index]
    }
}

impl<'a> IntoIterator for &'a MoveList {
    type Item = &'a Move;
    type IntoIter = std::slice::Iter<'a, Move>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}

impl std::fmt::Debug for MoveList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

/// Every piece of either color that attacks `sq`, given `occupied` as blockers.
pub fn attackers(position: &Position, sq: Square, occupied: Bitboard) -> Bitboard {
    let pawns = (pawn_attacks(sq, Color::Black) & position.pieces(Piece::Pawn, Color::White))
        | (pawn_attacks(sq, Color::White) & position.pieces(Piece::Pawn, Color::Black));
    let knights = position.pieces(Piece::Knight, Color::White)
        | position.pieces(Piece::Knight, Color::Black);
    let kings =
        position.pieces(Piece::King, Color::White) | position.pieces(Piece::King, Color::Black);
    let diagonal =
        position.diagonal_sliders(Color::White) | position.diagonal_sliders(Color::Black);
    let orthogonal =
        position.orthogonal_sliders(Color::White) | position.orthogonal_sliders(Color::Black);

    pawns
        | (knight_attacks(sq) & knights)
        | (king_attacks(sq) & kings)
        | (bishop_attacks(sq, occupied) & diagonal)
        | (rook_attacks(sq, occupied) & orthogonal)
}

#[inline]
pub fn is_square_attacked(position: &Position, sq: Square, by: Color) -> bool {
    (attackers(position, sq, position.occupied()) & position.occupancy(by)).is_not_empty()
}

#[inline]
pub fn in_check(position: &Position) -> bool {
    let us = position.side_to_move();
    is_square_attacked(position, position.king_square(us), !us)
}

/// Squares attacked by the opponent of `us`, with `us`'s king removed from
/// the blockers so it cannot hide behind itself along a slider's ray.
pub fn king_danger(position: &Position, us: Color) -> Bitboard {
    let them = !us;
    let blockers = position.occupied() ^ position.pieces(Piece::King, us);
    let mut danger = Bitboard::EMPTY;
    for sq in position.pieces(Piece::Pawn, them) {
        danger |= pawn_attacks(sq, them);
    }
    for sq in position.pieces(Piece::Knight, them) {
        danger |= knight_attacks(sq);
    }
    for sq in position.diagonal_sliders(them) {
        danger |= bishop_attacks(sq, blockers);
    }
    for sq in position.orthogonal_sliders(them) {
        danger |= rook_attacks(sq, blockers);
    }
    danger | king_attacks(position.king_square(them))
}

/// Per-square movement masks for pinned pieces of `us`.
///
/// A pinned piece gets the squares between its king and the pinner plus the
/// pinner's square; every other square maps to [`Bitboard::FULL`].
pub fn pin_lines(position: &Position, us: Color) -> [Bitboard; 64] {
    let them = !us;
    let king = position.king_square(us);
    let allies = position.occupancy(us);
    let enemies = position.occupancy(them);
    let mut lines = [Bitboard::FULL; 64];

    // Rays cast through our own pieces stop only at enemies.
    let pinners = (rook_attacks(king, enemies) & position.orthogonal_sliders(them))
        | (bishop_attacks(king, enemies) & position.diagonal_sliders(them));
    for pinner in pinners {
        let ray = between(king, pinner);
        let shielding = ray & allies;
        if let (Some(pinned), false) = (shielding.lsb(), shielding.more_than_one()) {
            lines[pinned.index() as usize] = ray | Bitboard::from(pinner);
        }
    }
    lines
}

/// Generates every legal move for the side to move.
///
/// An empty list means checkmate when [`in_check`] holds, stalemate otherwise.
pub fn generate_moves(position: &Position) -> MoveList {
    let mut moves = MoveList::new();
    Generator::new(position).generate(&mut moves);
    moves
}

/// Resolves coordinate notation against the legal moves of `position`.
pub fn find_move(position: &Position, text: &str) -> Result<Move, EngineError> {
    let parsed =
        Move::parse_uci(text).ok_or_else(|| EngineError::InvalidMoveText(text.to_string()))?;
    generate_moves(position)
        .iter()
        .copied()
        .find(|&m| parsed.matches(m))
        .ok_or_else(|| EngineError::IllegalMove {
            mv: text.to_string(),
            fen: position.to_fen(),
        })
}

struct Generator<'a> {
    position: &'a Position,
    us: Color,
    king: Square,
    occupied: Bitboard,
    allies: Bitboard,
    enemies: Bitboard,
    danger: Bitboard,
    checkers: Bitboard,
    /// Capture-or-block targets for non-king moves.
    legal: Bitboard,
    pins: [Bitboard; 64],
}

impl<'a> Generator<'a> {
    fn new(position: &'a Position) -> Self {
        let us = position.side_to_move();
        let king = position.king_square(us);
        let occupied = position.occupied();
        let enemies = position.occupancy(!us);
        let checkers = attackers(position, king, occupied) & enemies;
        let legal = match checkers.lsb() {
            None => Bitboard::FULL,
            Some(checker) => checkers | between(king, checker),
        };
        Generator {
            position,
            us,
            king,
            occupied,
            allies: position.occupancy(us),
            enemies,
            danger: king_danger(position, us),
            checkers,
            legal,
            pins: pin_lines(position, us),
        }
    }

    fn generate(&self, moves: &mut MoveList) {
        self.king_moves(moves);
        if self.checkers.more_than_one() {
            return;
        }
        self.pawn_moves(moves);
        for from in self.position.pieces(Piece::Knight, self.us) {
            self.piece_moves(moves, from, knight_attacks(from));
        }
        for from in self.position.pieces(Piece::Bishop, self.us) {
            self.piece_moves(moves, from, bishop_attacks(from, self.occupied));
        }
        for from in self.position.pieces(Piece::Rook, self.us) {
            self.piece_moves(moves, from, rook_attacks(from, self.occupied));
        }
        for from in self.position.pieces(Piece::Queen, self.us) {
            self.piece_moves(moves, from, queen_attacks(from, self.occupied));
        }
        if self.checkers.is_empty() {
            self.castling_moves(moves);
        }
    }

    #[inline]
    fn pin(&self, sq: Square) -> Bitboard {
        self.pins[sq.index() as usize]
    }

    #[inline]
    fn push_tagged(&self, moves: &mut MoveList, from: Square, to: Square) {
        let flag = if self.enemies.contains(to) {
            MoveFlag::Capture
        } else {
            MoveFlag::Quiet
        };
        moves.push(Move::new(from, to, flag));
    }

    fn piece_moves(&self, moves: &mut MoveList, from: Square, reach: Bitboard) {
        for to in reach & !self.allies & self.legal & self.pin(from) {
            self.push_tagged(moves, from, to);
        }
    }

    fn king_moves(&self, moves: &mut MoveList) {
        for to in king_attacks(self.king) & !self.allies & !self.danger {
            self.push_tagged(moves, self.king, to);
        }
    }

    fn castling_moves(&self, moves: &mut MoveList) {
        let rights = self.position.castling();
        for side in CastleSide::BOTH {
            if !rights.has(self.us, side) {
                continue;
            }
            let path = castling_path(self.us, side);
            let rook_home = self.position.piece_at(path.rook_from) == Some((Piece::Rook, self.us));
            if self.king == path.king_from
                && rook_home
                && (self.occupied & path.clear).is_empty()
                && (self.danger & path.safe).is_empty()
            {
                let flag = match side {
                    CastleSide::King => MoveFlag::KingCastle,
                    CastleSide::Queen => MoveFlag::QueenCastle,
                };
                moves.push(Move::new(path.king_from, path.king_to, flag));
            }
        }
    }

    fn pawn_moves(&self, moves: &mut MoveList) {
        let push = self.us.pawn_push();
        let start_rank = match self.us {
            Color::White => Rank::R2,
            Color::Black => Rank::R7,
        };
        let en_passant = self.position.en_passant();

        for from in self.position.pieces(Piece::Pawn, self.us) {
            let allowed = self.legal & self.pin(from);

            if let Some(one) = from.offset(push).filter(|&sq| !self.occupied.contains(sq)) {
                if allowed.contains(one) {
                    self.pawn_advance(moves, from, one, false);
                }
                if from.rank() == start_rank {
                    if let Some(two) = one.offset(push) {
                        if !self.occupied.contains(two) && allowed.contains(two) {
                            moves.push(Move::new(from, two, MoveFlag::DoublePush));
                        }
                    }
                }
            }

            let reach = pawn_attacks(from, self.us);
            for to in reach & self.enemies & allowed {
                self.pawn_advance(moves, from, to, true);
            }

            if let Some(target) = en_passant.filter(|&t| reach.contains(t)) {
                if self.en_passant_is_legal(from, target) {
                    moves.push(Move::new(from, target, MoveFlag::EnPassant));
                }
            }
        }
    }

    /// Pushes a pawn move, expanding it into all four promotions on the last rank.
    fn pawn_advance(&self, moves: &mut MoveList, from: Square, to: Square, capture: bool) {
        if to.rank() == self.us.promotion_rank() {
            for piece in Piece::PROMOTIONS {
                if let Some(flag) = MoveFlag::promotion(piece, capture) {
                    moves.push(Move::new(from, to, flag));
                }
            }
        } else {
            let flag = if capture { MoveFlag::Capture } else { MoveFlag::Quiet };
            moves.push(Move::new(from, to, flag));
        }
    }

    fn en_passant_is_legal(&self, from: Square, target: Square) -> bool {
        let victim = en_passant_victim(target);
        let resolves_check = self.legal.contains(target) || self.legal.contains(victim);
        if !resolves_check || !self.pin(from).contains(target) {
            return false;
        }
        // Both pawns leave their rank at once, which a plain pin mask cannot
        // see: replay the capture on the occupancy and look for exposed sliders.
        let after = (self.occupied ^ Bitboard::from(from) ^ Bitboard::from(victim))
            | Bitboard::from(target);
        let them = !self.us;
        let exposed = (rook_attacks(self.king, after) & self.position.orthogonal_sliders(them))
            | (bishop_attacks(self.king, after) & self.position.diagonal_sliders(them));
        exposed.is_empty()
    }
}
