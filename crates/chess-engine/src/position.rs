//! Board state with an undo stack and incremental hashing.

use std::fmt;

use chess_core::{
    CastleSide, CastlingRights, Color, Fen, FenError, Move, MoveFlag, Occupant, Piece, Square,
};

use crate::movegen::attacks::{castling_path, pawn_attacks};
use crate::zobrist::ZOBRIST;
use crate::Bitboard;

/// Initial capacity of the state stack; it grows past this if needed.
pub const STATE_STACK_CAPACITY: usize = 512;

/// Everything `undo_move` needs to restore that the board itself does not hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameState {
    pub hash: u64,
    pub halfmove_clock: u32,
    pub fullmove_number: u32,
    pub en_passant: Option<Square>,
    pub castling: CastlingRights,
    pub side_to_move: Color,
    /// Piece removed by the move that produced this state.
    pub captured: Option<Piece>,
    /// Ply of the most recent capture, pawn move or castling-rights change.
    pub irreversible_ply: usize,
}

/// A chess position plus the history of states since it was loaded.
///
/// The mailbox and the bitboards are kept in agreement square by square, and
/// the top of the state stack always describes the current position.
#[derive(Clone, PartialEq, Eq)]
pub struct Position {
    board: [Occupant; 64],
    pieces: [[Bitboard; 6]; 2],
    occupancy: [Bitboard; 2],
    states: Vec<GameState>,
}

impl Position {
    pub fn startpos() -> Self {
        Self::from_fen(Fen::STARTPOS).expect("start position FEN is valid")
    }

    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        Ok(Self::from_parsed(&Fen::parse(fen)?))
    }

    /// Replaces this position with `fen`, resetting history to ply 0.
    ///
    /// On error the position is left untouched.
    pub fn load_fen(&mut self, fen: &str) -> Result<(), FenError> {
        *self = Self::from_fen(fen)?;
        Ok(())
    }

    pub fn from_parsed(fen: &Fen) -> Self {
        let mut position = Position {
            board: [None; 64],
            pieces: [[Bitboard::EMPTY; 6]; 2],
            occupancy: [Bitboard::EMPTY; 2],
            states: Vec::with_capacity(STATE_STACK_CAPACITY),
        };
        for (index, occupant) in fen.board.iter().enumerate() {
            if let Some((piece, color)) = *occupant {
                // SAFETY: the board has exactly 64 entries
                let sq = unsafe { Square::from_index_unchecked(index as u8) };
                position.put(sq, piece, color);
            }
        }
        position.states.push(GameState {
            hash: 0,
            halfmove_clock: fen.halfmove_clock,
            fullmove_number: fen.fullmove_number,
            en_passant: fen.en_passant,
            castling: fen.castling,
            side_to_move: fen.side_to_move,
            captured: None,
            irreversible_ply: 0,
        });
        let hash = position.compute_hash();
        position.state_mut().hash = hash;
        position
    }

    pub fn to_fen(&self) -> String {
        let state = self.state();
        Fen {
            board: self.board,
            side_to_move: state.side_to_move,
            castling: state.castling,
            en_passant: state.en_passant,
            halfmove_clock: state.halfmove_clock,
            fullmove_number: state.fullmove_number,
        }
        .to_string()
    }

    #[inline]
    pub fn piece_at(&self, sq: Square) -> Occupant {
        self.board[sq.index() as usize]
    }

    #[inline]
    pub fn pieces(&self, piece: Piece, color: Color) -> Bitboard {
        self.pieces[color.index()][piece.index()]
    }

    #[inline]
    pub fn occupancy(&self, color: Color) -> Bitboard {
        self.occupancy[color.index()]
    }

    #[inline]
    pub fn occupied(&self) -> Bitboard {
        self.occupancy[0] | self.occupancy[1]
    }

    /// Bishops and queens of `color`.
    #[inline]
    pub fn diagonal_sliders(&self, color: Color) -> Bitboard {
        self.pieces(Piece::Bishop, color) | self.pieces(Piece::Queen, color)
    }

    /// Rooks and queens of `color`.
    #[inline]
    pub fn orthogonal_sliders(&self, color: Color) -> Bitboard {
        self.pieces(Piece::Rook, color) | self.pieces(Piece::Queen, color)
    }

    #[inline]
    pub fn king_square(&self, color: Color) -> Square {
        self.pieces(Piece::King, color)
            .lsb()
            .expect("every position has one king per side")
    }

    #[inline]
    pub fn state(&self) -> &GameState {
        self.states.last().expect("state stack is never empty")
    }

    #[inline]
    fn state_mut(&mut self) -> &mut GameState {
        self.states.last_mut().expect("state stack is never empty")
    }

    /// All states from the loaded position (index 0) to the current one.
    #[inline]
    pub fn states(&self) -> &[GameState] {
        &self.states
    }

    /// Plies played since the position was loaded.
    #[inline]
    pub fn ply(&self) -> usize {
        self.states.len() - 1
    }

    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.state().side_to_move
    }

    #[inline]
    pub fn hash(&self) -> u64 {
        self.state().hash
    }

    #[inline]
    pub fn castling(&self) -> CastlingRights {
        self.state().castling
    }

    #[inline]
    pub fn en_passant(&self) -> Option<Square> {
        self.state().en_passant
    }

    #[inline]
    pub fn halfmove_clock(&self) -> u32 {
        self.state().halfmove_clock
    }

    #[inline]
    pub fn last_irreversible_ply(&self) -> usize {
        self.state().irreversible_ply
    }

    /// Hash with the en-passant term kept only when a pawn of the side to move
    /// can actually make the capture.
    pub fn transposition_key(&self) -> u64 {
        let state = self.state();
        match state.en_passant {
            Some(target) if !self.en_passant_capturable(target) => {
                state.hash ^ ZOBRIST.en_passant(target.file())
            }
            _ => state.hash,
        }
    }

    fn en_passant_capturable(&self, target: Square) -> bool {
        let us = self.side_to_move();
        (pawn_attacks(target, !us) & self.pieces(Piece::Pawn, us)).is_not_empty()
    }

    /// Hash of the current position computed from nothing.
    pub fn compute_hash(&self) -> u64 {
        let state = self.state();
        let mut hash = ZOBRIST.castling_rights(state.castling);
        for (index, occupant) in self.board.iter().enumerate() {
            if let Some((piece, color)) = *occupant {
                // SAFETY: the board has exactly 64 entries
                let sq = unsafe { Square::from_index_unchecked(index as u8) };
                hash ^= ZOBRIST.piece(piece, color, sq);
            }
        }
        if let Some(target) = state.en_passant {
            hash ^= ZOBRIST.en_passant(target.file());
        }
        if state.side_to_move == Color::White {
            hash ^= ZOBRIST.side();
        }
        hash
    }

    /// Plays `mv`, which must have been generated for this position.
    pub fn make_move(&mut self, mv: Move) {
        let prev = *self.state();
        let us = prev.side_to_move;
        let them = !us;
        let (from, to, flag) = (mv.from(), mv.to(), mv.flag());
        let Some((moving, owner)) = self.piece_at(from) else {
            debug_assert!(false, "no piece on {from} for {mv:?}");
            return;
        };
        debug_assert_eq!(owner, us, "{mv:?} moves an opponent piece");

        let mut hash = prev.hash;
        let mut next = GameState {
            captured: None,
            en_passant: None,
            ..prev
        };

        if let Some(target) = prev.en_passant {
            hash ^= ZOBRIST.en_passant(target.file());
        }

        if flag == MoveFlag::EnPassant {
            let victim = en_passant_victim(to);
            self.take(victim);
            hash ^= ZOBRIST.piece(Piece::Pawn, them, victim);
            next.captured = Some(Piece::Pawn);
        } else if flag.is_capture() {
            let (captured, _) = self.take(to);
            hash ^= ZOBRIST.piece(captured, them, to);
            next.captured = Some(captured);
        }

        self.take(from);
        hash ^= ZOBRIST.piece(moving, us, from);
        let placed = mv.promotion_piece().unwrap_or(moving);
        self.put(to, placed, us);
        hash ^= ZOBRIST.piece(placed, us, to);

        if let Some(side) = castle_side(flag) {
            let path = castling_path(us, side);
            self.take(path.rook_from);
            self.put(path.rook_to, Piece::Rook, us);
            hash ^= ZOBRIST.piece(Piece::Rook, us, path.rook_from)
                ^ ZOBRIST.piece(Piece::Rook, us, path.rook_to);
        }

        if moving == Piece::King {
            next.castling.remove_color(us);
        }
        for sq in [from, to] {
            if let Some((color, side)) = rook_home(sq) {
                next.castling.remove(color, side);
            }
        }
        if next.castling != prev.castling {
            hash ^= ZOBRIST.castling_rights(prev.castling) ^ ZOBRIST.castling_rights(next.castling);
        }

        let resets_clock = moving == Piece::Pawn || next.captured.is_some();
        next.halfmove_clock = if resets_clock { 0 } else { prev.halfmove_clock + 1 };
        if us == Color::Black {
            next.fullmove_number += 1;
        }
        if resets_clock || next.castling != prev.castling {
            next.irreversible_ply = self.states.len();
        }

        if flag == MoveFlag::DoublePush {
            // SAFETY: the midpoint of two squares is a square
            let target = unsafe { Square::from_index_unchecked((from.index() + to.index()) / 2) };
            next.en_passant = Some(target);
            hash ^= ZOBRIST.en_passant(target.file());
        }

        next.side_to_move = them;
        hash ^= ZOBRIST.side();
        next.hash = hash;
        self.states.push(next);
    }

    /// Reverts `mv`, which must be the last move made.
    pub fn undo_move(&mut self, mv: Move) {
        if self.states.len() < 2 {
            debug_assert!(false, "undo_move({mv:?}) at the root position");
            return;
        }
        let Some(undone) = self.states.pop() else {
            return;
        };
        let us = !undone.side_to_move;
        let (from, to, flag) = (mv.from(), mv.to(), mv.flag());

        if let Some(side) = castle_side(flag) {
            let path = castling_path(us, side);
            self.take(path.rook_to);
            self.put(path.rook_from, Piece::Rook, us);
        }

        let (placed, owner) = self.take(to);
        debug_assert_eq!(owner, us, "{mv:?} was not the last move made");
        let original = if mv.is_promotion() { Piece::Pawn } else { placed };
        self.put(from, original, us);

        if let Some(captured) = undone.captured {
            let sq = if flag == MoveFlag::EnPassant {
                en_passant_victim(to)
            } else {
                to
            };
            self.put(sq, captured, !us);
        }
    }

    #[inline]
    fn put(&mut self, sq: Square, piece: Piece, color: Color) {
        debug_assert!(self.board[sq.index() as usize].is_none(), "{sq} is occupied");
        self.board[sq.index() as usize] = Some((piece, color));
        self.pieces[color.index()][piece.index()].set(sq);
        self.occupancy[color.index()].set(sq);
    }

    #[inline]
    fn take(&mut self, sq: Square) -> (Piece, Color) {
        let (piece, color) = self.board[sq.index() as usize]
            .take()
            .expect("board and move disagree about an occupied square");
        self.pieces[color.index()][piece.index()].clear(sq);
        self.occupancy[color.index()].clear(sq);
        (piece, color)
    }
}

/// The pawn taken by an en-passant capture landing on `target`.
#[inline]
pub(crate) fn en_passant_victim(target: Square) -> Square {
    // Targets sit on rank 3 or 6; the victim is one rank closer to the centre.
    // SAFETY: flipping bit 3 keeps the index within 0-63
    unsafe { Square::from_index_unchecked(target.index() ^ 8) }
}

#[inline]
fn castle_side(flag: MoveFlag) -> Option<CastleSide> {
    match flag {
        MoveFlag::KingCastle => Some(CastleSide::King),
        MoveFlag::QueenCastle => Some(CastleSide::Queen),
        _ => None,
    }
}

/// Castling right tied to a rook's starting square.
#[inline]
fn rook_home(sq: Square) -> Option<(Color, CastleSide)> {
    match sq {
        Square::H1 => Some((Color::White, CastleSide::King)),
        Square::A1 => Some((Color::White, CastleSide::Queen)),
        Square::H8 => Some((Color::Black, CastleSide::King)),
        Square::A8 => Some((Color::Black, CastleSide::Queen)),
        _ => None,
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::startpos()
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Position({} @ ply {})", self.to_fen(), self.ply())
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (row, squares) in self.board.chunks(8).enumerate() {
            write!(f, "{} ", 8 - row)?;
            for occupant in squares {
                let c = occupant.map_or('.', |(piece, color)| piece.to_fen_char(color));
                write!(f, "{c} ")?;
            }
            writeln!(f)?;
        }
        writeln!(f, "  a b c d e f g h")?;
        write!(f, "{}", self.to_fen())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        Square::from_algebraic(s).unwrap()
    }

    fn mv(from: &str, to: &str, flag: MoveFlag) -> Move {
        Move::new(sq(from), sq(to), flag)
    }

    #[test]
    fn startpos_fen_roundtrip() {
        let pos = Position::startpos();
        assert_eq!(pos.to_fen(), Fen::STARTPOS);
        assert_eq!(pos.ply(), 0);
        assert_eq!(pos.occupied().count(), 32);
        assert_eq!(pos.king_square(Color::White), Square::E1);
        assert_eq!(pos.piece_at(Square::D8), Some((Piece::Queen, Color::Black)));
    }

    #[test]
    fn load_fen_failure_keeps_position() {
        let mut pos = Position::startpos();
        pos.make_move(mv("e2", "e4", MoveFlag::DoublePush));
        let before = pos.clone();
        assert!(pos.load_fen("not a fen").is_err());
        assert_eq!(pos, before);
        pos.load_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert_eq!(pos.ply(), 0);
    }

    #[test]
    fn double_push_sets_en_passant_and_hash() {
        let mut pos = Position::startpos();
        pos.make_move(mv("e2", "e4", MoveFlag::DoublePush));
        assert_eq!(pos.en_passant(), Some(sq("e3")));
        assert_eq!(pos.side_to_move(), Color::Black);
        assert_eq!(pos.hash(), pos.compute_hash());
        assert_eq!(
            pos.to_fen(),
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1"
        );
    }

    #[test]
    fn en_passant_capture_and_undo() {
        let fen = "rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3";
        let mut pos = Position::from_fen(fen).unwrap();
        let before = pos.clone();
        let ep = mv("e5", "f6", MoveFlag::EnPassant);
        pos.make_move(ep);
        assert_eq!(pos.piece_at(sq("f5")), None);
        assert_eq!(pos.piece_at(sq("f6")), Some((Piece::Pawn, Color::White)));
        assert_eq!(pos.state().captured, Some(Piece::Pawn));
        assert_eq!(pos.hash(), pos.compute_hash());
        pos.undo_move(ep);
        assert_eq!(pos, before);
    }

    #[test]
    fn castling_moves_rook_and_clears_rights() {
        let fen = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1";
        let mut pos = Position::from_fen(fen).unwrap();
        let before = pos.clone();
        let castle = mv("e1", "c1", MoveFlag::QueenCastle);
        pos.make_move(castle);
        assert_eq!(pos.piece_at(sq("d1")), Some((Piece::Rook, Color::White)));
        assert_eq!(pos.piece_at(Square::A1), None);
        assert_eq!(pos.castling().to_string(), "kq");
        assert_eq!(pos.last_irreversible_ply(), 1);
        assert_eq!(pos.hash(), pos.compute_hash());
        pos.undo_move(castle);
        assert_eq!(pos, before);
    }

    #[test]
    fn capturing_a_home_rook_clears_the_right() {
        let fen = "r3k2r/8/8/8/8/8/6B1/R3K2R w KQkq - 0 1";
        let mut pos = Position::from_fen(fen).unwrap();
        pos.make_move(mv("g2", "a8", MoveFlag::Capture));
        assert_eq!(pos.castling().to_string(), "KQk");
        assert_eq!(pos.hash(), pos.compute_hash());
    }

    #[test]
    fn promotion_and_undo() {
        let fen = "1r2k3/P7/8/8/8/8/8/4K3 w - - 5 40";
        let mut pos = Position::from_fen(fen).unwrap();
        let before = pos.clone();
        let promo = mv("a7", "b8", MoveFlag::CapturePromoteKnight);
        pos.make_move(promo);
        assert_eq!(pos.piece_at(sq("b8")), Some((Piece::Knight, Color::White)));
        assert_eq!(pos.halfmove_clock(), 0);
        assert_eq!(pos.hash(), pos.compute_hash());
        pos.undo_move(promo);
        assert_eq!(pos, before);
    }

    #[test]
    fn clocks_advance() {
        let mut pos = Position::startpos();
        pos.make_move(mv("g1", "f3", MoveFlag::Quiet));
        assert_eq!(pos.halfmove_clock(), 1);
        assert_eq!(pos.state().fullmove_number, 1);
        pos.make_move(mv("g8", "f6", MoveFlag::Quiet));
        assert_eq!(pos.halfmove_clock(), 2);
        assert_eq!(pos.state().fullmove_number, 2);
        assert_eq!(pos.last_irreversible_ply(), 0);
    }

    #[test]
    fn transposition_key_ignores_uncapturable_en_passant() {
        let mut pushed = Position::startpos();
        pushed.make_move(mv("e2", "e4", MoveFlag::DoublePush));
        let quiet = Position::from_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1")
            .unwrap();
        assert_ne!(pushed.hash(), quiet.hash());
        assert_eq!(pushed.transposition_key(), quiet.transposition_key());
    }

    #[test]
    fn transposition_key_keeps_capturable_en_passant() {
        let with_ep =
            Position::from_fen("rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3")
                .unwrap();
        let without =
            Position::from_fen("rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq - 0 3")
                .unwrap();
        assert_ne!(with_ep.transposition_key(), without.transposition_key());
    }

    #[test]
    fn move_order_transposition_gives_same_hash() {
        let mut a = Position::startpos();
        for m in [
            mv("g1", "f3", MoveFlag::Quiet),
            mv("g8", "f6", MoveFlag::Quiet),
            mv("b1", "c3", MoveFlag::Quiet),
        ] {
            a.make_move(m);
        }
        let mut b = Position::startpos();
        for m in [
            mv("b1", "c3", MoveFlag::Quiet),
            mv("g8", "f6", MoveFlag::Quiet),
            mv("g1", "f3", MoveFlag::Quiet),
        ] {
            b.make_move(m);
        }
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.to_fen(), b.to_fen());
    }

    #[test]
    fn display_draws_board() {
        let text = Position::startpos().to_string();
        assert!(text.starts_with("8 r n b q k b n r"));
        assert!(text.contains("  a b c d e f g h"));
    }
}
