//! Opening book interface and an in-memory weighted book.

use std::collections::HashMap;
use std::sync::Mutex;

use chess_core::Move;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::movegen::find_move;
use crate::{EngineError, Position};

/// Source of opening moves. Suggestions are checked against the legal moves
/// before they are played, so a book may return anything.
pub trait OpeningBook: Send + Sync {
    fn lookup(&self, position: &Position) -> Option<Move>;
}

/// A candidate move with its relative frequency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookMove {
    pub mv: Move,
    pub weight: u32,
}

/// Book held in memory, keyed by the position's transposition key, so
/// different move orders reaching the same position share entries.
#[derive(Debug)]
pub struct MemoryBook {
    positions: HashMap<u64, Vec<BookMove>>,
    rng: Mutex<StdRng>,
}

impl Default for MemoryBook {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBook {
    #[must_use]
    pub fn new() -> Self {
        MemoryBook {
            positions: HashMap::new(),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// A book whose choices are reproducible.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        MemoryBook {
            positions: HashMap::new(),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// A small book of common first moves and replies.
    #[must_use]
    pub fn builtin() -> Self {
        let mut book = Self::new();
        for (line, weight) in BUILTIN_LINES {
            book.add_line(line, *weight).expect("built-in book lines are legal");
        }
        book
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Number of distinct positions with at least one move.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Adds `uci` as a candidate in `position`. Re-adding a move raises its weight.
    pub fn add(&mut self, position: &Position, uci: &str, weight: u32) -> Result<(), EngineError> {
        let mv = find_move(position, uci)?;
        let moves = self.positions.entry(position.transposition_key()).or_default();
        match moves.iter_mut().find(|m| m.mv == mv) {
            Some(existing) => existing.weight = existing.weight.saturating_add(weight),
            None => moves.push(BookMove { mv, weight }),
        }
        Ok(())
    }

    /// Adds every move of `line`, played from the start position, with `weight`.
    pub fn add_line(&mut self, line: &[&str], weight: u32) -> Result<(), EngineError> {
        let mut position = Position::startpos();
        for uci in line {
            self.add(&position, uci, weight)?;
            let mv = find_move(&position, uci)?;
            position.make_move(mv);
        }
        Ok(())
    }

    #[must_use]
    pub fn candidates(&self, position: &Position) -> Option<&[BookMove]> {
        self.positions
            .get(&position.transposition_key())
            .map(|v| v.as_slice())
    }

    /// Picks a candidate at random, weighted by frequency.
    pub fn select<R: Rng>(&self, position: &Position, rng: &mut R) -> Option<Move> {
        let moves = self.candidates(position)?;
        if moves.is_empty() {
            return None;
        }

        let total: u32 = moves.iter().map(|m| m.weight).sum();
        if total == 0 {
            return moves.choose(rng).map(|m| m.mv);
        }

        let mut choice = rng.gen_range(0..total);
        for candidate in moves {
            if choice < candidate.weight {
                return Some(candidate.mv);
            }
            choice -= candidate.weight;
        }
        moves.last().map(|m| m.mv)
    }
}

impl OpeningBook for MemoryBook {
    fn lookup(&self, position: &Position) -> Option<Move> {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.select(position, &mut *rng)
    }
}

const BUILTIN_LINES: &[(&[&str], u32)] = &[
    (&["e2e4", "e7e5", "g1f3", "b8c6"], 80),
    (&["e2e4", "c7c5", "g1f3", "d7d6"], 70),
    (&["e2e4", "e7e6", "d2d4", "d7d5"], 40),
    (&["e2e4", "c7c6", "d2d4", "d7d5"], 30),
    (&["d2d4", "d7d5", "c2c4", "e7e6"], 50),
    (&["d2d4", "g8f6", "c2c4", "e7e6"], 40),
    (&["d2d4", "g8f6", "c2c4", "g7g6"], 30),
    (&["c2c4", "e7e5", "b1c3", "g8f6"], 40),
    (&["g1f3", "d7d5", "g2g3", "g8f6"], 30),
];
