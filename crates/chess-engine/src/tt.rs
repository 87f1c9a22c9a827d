//! Lock-free transposition table.
//!
//! Each slot holds two words: the packed entry and the entry XOR the full
//! position hash. A reader accepts a slot only when the two agree, which
//! rejects both index collisions and words torn by a concurrent writer.
//! Writes are best effort; a racing reader sees either a valid entry or a
//! miss.

use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::EngineError;

/// How the stored score relates to the true value of the position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Bound {
    Exact = 0,
    /// The search failed low; the true score is at most this.
    UpperBound = 1,
    /// The search failed high; the true score is at least this.
    LowerBound = 2,
}

impl Bound {
    /// Classifies `eval` against the window the node was searched with.
    #[inline]
    pub fn classify(eval: i32, alpha: i32, beta: i32) -> Bound {
        if eval <= alpha {
            Bound::UpperBound
        } else if eval >= beta {
            Bound::LowerBound
        } else {
            Bound::Exact
        }
    }

    #[inline]
    const fn from_bits(bits: u8) -> Option<Bound> {
        match bits {
            0 => Some(Bound::Exact),
            1 => Some(Bound::UpperBound),
            2 => Some(Bound::LowerBound),
            _ => None,
        }
    }
}

/// A decoded table entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TtEntry {
    pub eval: i32,
    /// Index of the best move in generation order, if one was found.
    pub best_move_index: Option<u8>,
    /// Remaining search depth the entry was produced with; never 0.
    pub depth: u8,
    pub bound: Bound,
}

impl TtEntry {
    const EVAL_SHIFT: u32 = 0;
    const MOVE_SHIFT: u32 = 32;
    const DEPTH_SHIFT: u32 = 40;
    const BOUND_SHIFT: u32 = 48;
    const NO_MOVE: u8 = u8::MAX;

    /// The score to return without searching, if this entry is deep enough
    /// and its bound settles the `alpha..beta` window.
    #[inline]
    pub fn cutoff(&self, alpha: i32, beta: i32, depth: u8) -> Option<i32> {
        if self.depth < depth {
            return None;
        }
        match self.bound {
            Bound::Exact => Some(self.eval),
            Bound::LowerBound if self.eval >= beta => Some(self.eval),
            Bound::UpperBound if self.eval <= alpha => Some(self.eval),
            _ => None,
        }
    }

    #[inline]
    fn pack(&self) -> u64 {
        ((self.eval as u32 as u64) << Self::EVAL_SHIFT)
            | ((self.best_move_index.unwrap_or(Self::NO_MOVE) as u64) << Self::MOVE_SHIFT)
            | ((self.depth as u64) << Self::DEPTH_SHIFT)
            | ((self.bound as u64) << Self::BOUND_SHIFT)
    }

    #[inline]
    fn unpack(data: u64) -> Option<TtEntry> {
        let depth = (data >> Self::DEPTH_SHIFT) as u8;
        if depth == 0 {
            return None;
        }
        let index = (data >> Self::MOVE_SHIFT) as u8;
        Some(TtEntry {
            eval: (data >> Self::EVAL_SHIFT) as u32 as i32,
            best_move_index: (index != Self::NO_MOVE).then_some(index),
            depth,
            bound: Bound::from_bits((data >> Self::BOUND_SHIFT) as u8)?,
        })
    }
}

#[derive(Default)]
struct Slot {
    data: AtomicU64,
    check: AtomicU64,
}

impl Slot {
    #[inline]
    fn load(&self, hash: u64) -> Option<TtEntry> {
        let data = self.data.load(Ordering::Relaxed);
        let check = self.check.load(Ordering::Relaxed);
        if data ^ check != hash {
            return None;
        }
        TtEntry::unpack(data)
    }

    #[inline]
    fn stored_depth(&self) -> u8 {
        (self.data.load(Ordering::Relaxed) >> TtEntry::DEPTH_SHIFT) as u8
    }
}

/// Fixed-capacity hash table shared between the engine and its search thread.
pub struct TranspositionTable {
    slots: Box<[Slot]>,
    mask: usize,
}

impl TranspositionTable {
    pub const ENTRY_BYTES: usize = mem::size_of::<Slot>();

    /// Allocates at least one slot; `entries` is rounded down to a power of two.
    pub fn new(entries: usize) -> Result<Self, EngineError> {
        let capacity = round_down_pow2(entries.max(1));
        let mut slots: Vec<Slot> = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| EngineError::TableAllocation { entries: capacity })?;
        slots.resize_with(capacity, Slot::default);
        Ok(TranspositionTable {
            slots: slots.into_boxed_slice(),
            mask: capacity - 1,
        })
    }

    pub fn with_megabytes(megabytes: usize) -> Result<Self, EngineError> {
        Self::new(megabytes.saturating_mul(1024 * 1024) / Self::ENTRY_BYTES)
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn slot(&self, hash: u64) -> &Slot {
        &self.slots[hash as usize & self.mask]
    }

    /// The entry for `hash`, if its slot holds one and the checksum matches.
    #[inline]
    pub fn lookup(&self, hash: u64) -> Option<TtEntry> {
        self.slot(hash).load(hash)
    }

    /// Records a search result, unless the slot already holds one at least
    /// as deep. `alpha` and `beta` are the window the node was entered with.
    pub fn store(
        &self,
        eval: i32,
        best_move_index: Option<u8>,
        hash: u64,
        alpha: i32,
        beta: i32,
        depth: u8,
    ) {
        let slot = self.slot(hash);
        if depth == 0 || slot.stored_depth() >= depth {
            return;
        }
        let entry = TtEntry {
            eval,
            best_move_index,
            depth,
            bound: Bound::classify(eval, alpha, beta),
        };
        let data = entry.pack();
        slot.data.store(data, Ordering::Relaxed);
        slot.check.store(data ^ hash, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        for slot in self.slots.iter() {
            slot.data.store(0, Ordering::Relaxed);
            slot.check.store(0, Ordering::Relaxed);
        }
    }

    /// Occupancy in per mille, sampled over the first thousand slots.
    pub fn hashfull(&self) -> u32 {
        let sample = self.capacity().min(1000);
        let used = self.slots[..sample]
            .iter()
            .filter(|slot| slot.stored_depth() != 0)
            .count();
        (used * 1000 / sample) as u32
    }

    #[cfg(test)]
    fn corrupt(&self, hash: u64) {
        self.slot(hash).check.fetch_xor(1 << 17, Ordering::Relaxed);
    }
}

fn round_down_pow2(n: usize) -> usize {
    1 << (usize::BITS - 1 - n.leading_zeros())
}
