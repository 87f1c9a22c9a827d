//! Draw detection: repetition, insufficient material and the fifty-move rule.
//!
//! Stalemate is not handled here; it falls out of move generation.

use chess_core::{Color, Piece};

use crate::{Bitboard, Position};

/// Half-moves without a capture or pawn move after which the game is drawn.
pub const FIFTY_MOVE_PLIES: u32 = 100;

/// Why a position counts as drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawReason {
    /// The current position occurred for the third time.
    ThreefoldRepetition,
    /// Neither side can deliver mate.
    InsufficientMaterial,
    /// 100 half-moves without a pawn move or capture.
    FiftyMoveRule,
}

/// The first draw condition that holds for `position`, if any.
pub fn draw_reason(position: &Position) -> Option<DrawReason> {
    if is_fifty_move_draw(position) {
        Some(DrawReason::FiftyMoveRule)
    } else if is_insufficient_material(position) {
        Some(DrawReason::InsufficientMaterial)
    } else if is_repetition(position) {
        Some(DrawReason::ThreefoldRepetition)
    } else {
        None
    }
}

#[inline]
pub fn is_draw(position: &Position) -> bool {
    draw_reason(position).is_some()
}

pub fn is_fifty_move_draw(position: &Position) -> bool {
    position.halfmove_clock() >= FIFTY_MOVE_PLIES
}

/// True when the current position has now occurred three times.
///
/// Only states since the last irreversible move can match, and only every
/// second one has the same side to move.
pub fn is_repetition(position: &Position) -> bool {
    let states = position.states();
    let current = states.len() - 1;
    let hash = states[current].hash;
    let floor = position.last_irreversible_ply();

    let mut seen = 1;
    let mut index = current;
    while index >= floor + 2 {
        index -= 2;
        if states[index].hash == hash {
            seen += 1;
            if seen >= 3 {
                return true;
            }
        }
    }
    false
}

/// K v K, K+minor v K, and K+B v K+B with both bishops on one square colour.
pub fn is_insufficient_material(position: &Position) -> bool {
    let heavy_or_pawns = Color::BOTH.iter().any(|&color| {
        [Piece::Pawn, Piece::Rook, Piece::Queen]
            .iter()
            .any(|&piece| position.pieces(piece, color).is_not_empty())
    });
    if heavy_or_pawns {
        return false;
    }

    let knights = [
        position.pieces(Piece::Knight, Color::White),
        position.pieces(Piece::Knight, Color::Black),
    ];
    let bishops = [
        position.pieces(Piece::Bishop, Color::White),
        position.pieces(Piece::Bishop, Color::Black),
    ];
    let minors = (knights[0] | knights[1] | bishops[0] | bishops[1]).count();

    match minors {
        0 | 1 => true,
        2 => {
            let one_bishop_each = bishops[0].count() == 1 && bishops[1].count() == 1;
            let all = bishops[0] | bishops[1];
            let dark = (all & Bitboard::DARK_SQUARES).count();
            one_bishop_each && (dark == 0 || dark == 2)
        }
        _ => false,
    }
}
