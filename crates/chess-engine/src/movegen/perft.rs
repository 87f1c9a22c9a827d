//! Perft: exhaustive leaf counting for validating the move generator.

use chess_core::Move;

use super::generate_moves;
use crate::Position;

/// Counts leaf nodes `depth` plies below `position`.
///
/// The position is walked with make/undo and is back in its original state
/// when this returns.
pub fn perft(position: &mut Position, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }

    let moves = generate_moves(position);
    if depth == 1 {
        return moves.len() as u64;
    }

    let mut nodes = 0u64;
    for &mv in &moves {
        position.make_move(mv);
        nodes += perft(position, depth - 1);
        position.undo_move(mv);
    }
    nodes
}

/// Leaf counts per root move, sorted by coordinate notation.
pub fn perft_divide(position: &mut Position, depth: u32) -> Vec<(Move, u64)> {
    let moves = generate_moves(position);
    let mut results = Vec::with_capacity(moves.len());

    for &mv in &moves {
        position.make_move(mv);
        let nodes = perft(position, depth.saturating_sub(1));
        position.undo_move(mv);
        results.push((mv, nodes));
    }

    results.sort_by_key(|(mv, _)| mv.to_uci());
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
    const POSITION_3: &str = "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1";
    const POSITION_4: &str = "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1";
    const POSITION_5: &str = "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 0 1";

    fn count(fen: &str, depth: u32) -> u64 {
        let mut position = Position::from_fen(fen).unwrap();
        let before = position.clone();
        let nodes = perft(&mut position, depth);
        assert_eq!(position, before, "perft left the position modified");
        nodes
    }

    #[test]
    fn startpos_shallow() {
        let mut position = Position::startpos();
        assert_eq!(perft(&mut position, 0), 1);
        assert_eq!(perft(&mut position, 1), 20);
        assert_eq!(perft(&mut position, 2), 400);
        assert_eq!(perft(&mut position, 3), 8902);
    }

    #[test]
    fn startpos_depth_4() {
        assert_eq!(count(chess_core::Fen::STARTPOS, 4), 197_281);
    }

    #[test]
    fn kiwipete() {
        assert_eq!(count(KIWIPETE, 1), 48);
        assert_eq!(count(KIWIPETE, 2), 2039);
        assert_eq!(count(KIWIPETE, 3), 97_862);
    }

    #[test]
    fn position_3() {
        assert_eq!(count(POSITION_3, 1), 14);
        assert_eq!(count(POSITION_3, 2), 191);
        assert_eq!(count(POSITION_3, 3), 2812);
        assert_eq!(count(POSITION_3, 4), 43_238);
    }

    #[test]
    fn position_4() {
        assert_eq!(count(POSITION_4, 1), 6);
        assert_eq!(count(POSITION_4, 2), 264);
        assert_eq!(count(POSITION_4, 3), 9467);
    }

    #[test]
    fn position_5() {
        assert_eq!(count(POSITION_5, 1), 44);
        assert_eq!(count(POSITION_5, 2), 1486);
        assert_eq!(count(POSITION_5, 3), 62_379);
    }

    #[test]
    fn divide_sums_to_perft() {
        let mut position = Position::from_fen(KIWIPETE).unwrap();
        let split = perft_divide(&mut position, 2);
        assert_eq!(split.len(), 48);
        assert_eq!(split.iter().map(|(_, n)| n).sum::<u64>(), 2039);
        let names: Vec<_> = split.iter().map(|(m, _)| m.to_uci()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
