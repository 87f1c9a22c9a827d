//! Move ordering for the alpha-beta search.

use chess_core::{Move, MoveFlag, Piece};

use crate::movegen::MoveList;
use crate::Position;

/// Priority given to the move the transposition table remembers as best.
/// Higher than any capture score.
pub const TT_MOVE_SCORE: i32 = 100;

/// Most valuable victim, least valuable attacker: `(victim + 1) * 10 - attacker`
/// using piece indices, so PxQ scores 50 and QxP scores 6. Quiet moves score 0.
pub fn mvv_lva(position: &Position, mv: Move) -> i32 {
    if !mv.is_capture() {
        return 0;
    }
    let victim = if mv.flag() == MoveFlag::EnPassant {
        Piece::Pawn
    } else {
        match position.piece_at(mv.to()) {
            Some((piece, _)) => piece,
            None => return 0,
        }
    };
    let attacker = match position.piece_at(mv.from()) {
        Some((piece, _)) => piece,
        None => return 0,
    };
    (victim.index() as i32 + 1) * 10 - attacker.index() as i32
}

/// Hands out moves best-score first.
///
/// Each call to `next` does one pass of a selection sort over the moves not
/// yet returned. That is quadratic in the worst case, but a cutoff usually
/// comes within the first few moves and the rest are never sorted.
pub struct MovePicker {
    entries: [(u8, i32); MoveList::MAX_MOVES],
    len: usize,
    cursor: usize,
}

impl MovePicker {
    /// `tt_index` is the generation-order index of the remembered best move.
    pub fn new(position: &Position, moves: &MoveList, tt_index: Option<u8>) -> Self {
        let mut entries = [(0u8, 0i32); MoveList::MAX_MOVES];
        for (index, &mv) in moves.iter().enumerate() {
            let score = if tt_index == Some(index as u8) {
                TT_MOVE_SCORE
            } else {
                mvv_lva(position, mv)
            };
            entries[index] = (index as u8, score);
        }
        MovePicker {
            entries,
            len: moves.len(),
            cursor: 0,
        }
    }
}

/// Yields generation indices into the move list the picker was built from.
impl Iterator for MovePicker {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.cursor >= self.len {
            return None;
        }
        let mut best = self.cursor;
        for i in self.cursor + 1..self.len {
            if self.entries[i].1 > self.entries[best].1 {
                best = i;
            }
        }
        self.entries.swap(self.cursor, best);
        let (index, _) = self.entries[self.cursor];
        self.cursor += 1;
        Some(index as usize)
    }
}
