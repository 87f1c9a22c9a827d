//! Iterative-deepening negamax search with alpha-beta pruning.

mod ordering;

pub use ordering::{mvv_lva, MovePicker, TT_MOVE_SCORE};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chess_core::Move;
use tracing::debug;

use crate::draw::is_draw;
use crate::eval::evaluate;
use crate::movegen::{generate_moves, in_check};
use crate::time::Clock;
use crate::tt::{TranspositionTable, TtEntry};
use crate::Position;

/// Score of being mated at the root. Mate `n` plies away scores `MATE - n`.
pub const MATE: i32 = 100_000;

/// Outside any reachable score.
pub const INFINITY: i32 = 1_000_000;

/// Deepest iteration the search will attempt.
pub const MAX_DEPTH: u8 = 64;

/// Scores this close to [`MATE`] announce a forced mate.
const MATE_BOUND: i32 = MATE - MAX_DEPTH as i32 - 1;

/// Bounds on a single search. Unset fields fall back to the engine's
/// configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchLimits {
    pub depth: Option<u8>,
    pub nodes: Option<u64>,
    /// Wall-clock budget measured from the start of the search.
    pub move_time: Option<Duration>,
    /// Game clock; turned into a move time, capped by `move_time` if both are set.
    pub clock: Option<Clock>,
}

impl SearchLimits {
    pub fn depth(depth: u8) -> Self {
        SearchLimits {
            depth: Some(depth),
            ..Self::default()
        }
    }

    pub fn nodes(nodes: u64) -> Self {
        SearchLimits {
            nodes: Some(nodes),
            ..Self::default()
        }
    }

    pub fn move_time(time: Duration) -> Self {
        SearchLimits {
            move_time: Some(time),
            ..Self::default()
        }
    }

    pub fn clock(clock: Clock) -> Self {
        SearchLimits {
            clock: Some(clock),
            ..Self::default()
        }
    }
}

/// Progress report emitted after every completed iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchInfo {
    pub depth: u8,
    pub nodes: u64,
    pub score: i32,
    pub best_move: Move,
    pub elapsed: Duration,
    pub nps: u64,
    pub hashfull: u32,
}

impl SearchInfo {
    /// Moves until mate, positive when the side to move delivers it.
    pub fn mate_in(&self) -> Option<i32> {
        mate_distance(self.score)
    }
}

fn mate_distance(score: i32) -> Option<i32> {
    if score >= MATE_BOUND {
        Some((MATE - score + 1) / 2)
    } else if score <= -MATE_BOUND {
        Some(-(MATE + score + 1) / 2)
    } else {
        None
    }
}

/// Receiver of search progress.
pub trait InfoSink: Send + Sync {
    fn on_iteration(&self, info: &SearchInfo);
}

/// Default sink: one `debug!` event per iteration.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl InfoSink for TracingSink {
    fn on_iteration(&self, info: &SearchInfo) {
        debug!(
            depth = info.depth,
            score = info.score,
            nodes = info.nodes,
            nps = info.nps,
            hashfull = info.hashfull,
            elapsed_ms = info.elapsed.as_millis() as u64,
            best = %info.best_move.to_uci(),
            "iteration complete"
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Every requested iteration finished, or a forced mate was proven.
    Completed,
    /// Stopped by a stop request or the node budget; the result comes from
    /// the last completed iteration.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchResult {
    /// `None` only when the side to move has no legal moves.
    pub best_move: Option<Move>,
    pub score: i32,
    /// Deepest completed iteration; 0 for book moves and positions without moves.
    pub depth: u8,
    pub nodes: u64,
    pub outcome: SearchOutcome,
    pub from_book: bool,
}

/// State shared between the engine and its search thread.
///
/// Each search claims a fresh generation in [`try_begin`](Self::try_begin).
/// A stop request names the generation it is aimed at, so a request made on
/// behalf of an earlier search cannot cancel a later one.
#[derive(Debug)]
pub struct SearchControl {
    generation: AtomicU64,
    /// Highest generation asked to stop; never ahead of `generation`.
    stopped: AtomicU64,
    nodes: AtomicU64,
    searching: AtomicBool,
}

impl Default for SearchControl {
    fn default() -> Self {
        SearchControl {
            generation: AtomicU64::new(1),
            stopped: AtomicU64::new(0),
            nodes: AtomicU64::new(0),
            searching: AtomicBool::new(false),
        }
    }
}

impl SearchControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops whichever search currently holds the control.
    #[inline]
    pub fn request_stop(&self) {
        self.request_stop_for(self.generation());
    }

    /// Stops the search of `generation`, if it is still the current one.
    #[inline]
    pub fn request_stop_for(&self, generation: u64) {
        self.stopped.fetch_max(generation, Ordering::Relaxed);
    }

    #[inline]
    pub fn should_stop(&self) -> bool {
        self.stopped.load(Ordering::Relaxed) >= self.generation()
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    #[inline]
    pub fn nodes(&self) -> u64 {
        self.nodes.load(Ordering::Relaxed)
    }

    #[inline]
    fn add_node(&self) {
        self.nodes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_searching(&self) -> bool {
        self.searching.load(Ordering::Acquire)
    }

    /// Claims the control for a new search, resets the node counter and
    /// returns the search's generation. `None` if a search already holds it.
    pub fn try_begin(&self) -> Option<u64> {
        if self
            .searching
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        self.nodes.store(0, Ordering::Relaxed);
        Some(self.generation.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub fn finish(&self) {
        self.searching.store(false, Ordering::Release);
    }
}

/// One search over a private copy of the position.
pub struct Searcher<'a> {
    position: Position,
    tt: &'a TranspositionTable,
    control: &'a SearchControl,
    sink: &'a dyn InfoSink,
    max_depth: u8,
    max_nodes: Option<u64>,
    root_best: Option<Move>,
    aborted: bool,
}

impl<'a> Searcher<'a> {
    pub fn new(
        position: Position,
        tt: &'a TranspositionTable,
        control: &'a SearchControl,
        sink: &'a dyn InfoSink,
    ) -> Self {
        Searcher {
            position,
            tt,
            control,
            sink,
            max_depth: MAX_DEPTH,
            max_nodes: None,
            root_best: None,
            aborted: false,
        }
    }

    pub fn max_depth(mut self, depth: u8) -> Self {
        self.max_depth = depth.clamp(1, MAX_DEPTH);
        self
    }

    pub fn max_nodes(mut self, nodes: Option<u64>) -> Self {
        self.max_nodes = nodes;
        self
    }

    /// Deepens one ply at a time until the depth limit, a proven mate, a
    /// stop request or the node budget. An interrupted iteration is thrown
    /// away.
    pub fn run(mut self) -> SearchResult {
        let start = Instant::now();
        let root_moves = generate_moves(&self.position);
        if root_moves.is_empty() {
            let score = if in_check(&self.position) { -MATE } else { 0 };
            return SearchResult {
                best_move: None,
                score,
                depth: 0,
                nodes: 0,
                outcome: SearchOutcome::Completed,
                from_book: false,
            };
        }

        let mut best: Option<(Move, i32, u8)> = None;
        let mut outcome = SearchOutcome::Completed;

        for depth in 1..=self.max_depth {
            self.root_best = None;
            let score = self.negamax(depth, 0, -INFINITY, INFINITY);

            if self.aborted {
                outcome = SearchOutcome::Cancelled;
                if best.is_none() {
                    // Nothing completed; a partial first iteration beats a blind pick.
                    best = Some(match self.root_best {
                        Some(mv) => (mv, score, 0),
                        None => (root_moves[0], 0, 0),
                    });
                }
                break;
            }

            let Some(mv) = self.root_best else {
                break;
            };
            best = Some((mv, score, depth));

            let elapsed = start.elapsed();
            let nodes = self.control.nodes();
            self.sink.on_iteration(&SearchInfo {
                depth,
                nodes,
                score,
                best_move: mv,
                elapsed,
                nps: nodes_per_second(nodes, elapsed),
                hashfull: self.tt.hashfull(),
            });

            if mate_distance(score).is_some_and(|n| n.unsigned_abs() * 2 <= depth as u32) {
                break;
            }
        }

        let (best_move, score, depth) = best.unwrap_or((root_moves[0], 0, 0));
        SearchResult {
            best_move: Some(best_move),
            score,
            depth,
            nodes: self.control.nodes(),
            outcome,
            from_book: false,
        }
    }

    fn negamax(&mut self, depth: u8, ply: u8, mut alpha: i32, beta: i32) -> i32 {
        if self.control.should_stop() {
            self.aborted = true;
            return 0;
        }

        let is_root = ply == 0;
        let hash = self.position.transposition_key();
        let entry = self.tt.lookup(hash).map(|e| TtEntry {
            eval: score_from_tt(e.eval, ply),
            ..e
        });
        if !is_root {
            if let Some(score) = entry.and_then(|e| e.cutoff(alpha, beta, depth)) {
                return score;
            }
        }

        let moves = generate_moves(&self.position);
        if moves.is_empty() {
            return if in_check(&self.position) {
                -(MATE - ply as i32)
            } else {
                0
            };
        }
        if !is_root && is_draw(&self.position) {
            return 0;
        }
        if depth == 0 {
            return evaluate(&self.position);
        }

        let window_alpha = alpha;
        let mut best_score = -INFINITY;
        let mut best_index = None;

        for index in MovePicker::new(&self.position, &moves, entry.and_then(|e| e.best_move_index)) {
            if self.budget_spent() {
                self.aborted = true;
                return best_score;
            }

            let mv = moves[index];
            self.position.make_move(mv);
            self.control.add_node();
            let score = -self.negamax(depth - 1, ply + 1, -beta, -alpha);
            self.position.undo_move(mv);

            if self.aborted {
                return best_score;
            }

            if score > best_score {
                best_score = score;
                best_index = Some(index as u8);
                if is_root {
                    self.root_best = Some(mv);
                }
            }
            if score > alpha {
                alpha = score;
            }
            if alpha >= beta {
                break;
            }
        }

        // The window goes through the same monotone shift so the bound is
        // classified as it would be on the unshifted scores.
        self.tt.store(
            score_to_tt(best_score, ply),
            best_index,
            hash,
            score_to_tt(window_alpha, ply),
            score_to_tt(beta, ply),
            depth,
        );
        best_score
    }

    #[inline]
    fn budget_spent(&self) -> bool {
        self.max_nodes
            .is_some_and(|limit| self.control.nodes() >= limit)
    }
}

/// Mate scores count plies from the root; the table stores them counted
/// from the node instead, so an entry reached again at another ply still
/// reports the right distance.
#[inline]
fn score_to_tt(score: i32, ply: u8) -> i32 {
    if score >= MATE_BOUND {
        score + ply as i32
    } else if score <= -MATE_BOUND {
        score - ply as i32
    } else {
        score
    }
}

#[inline]
fn score_from_tt(score: i32, ply: u8) -> i32 {
    if score >= MATE_BOUND {
        score - ply as i32
    } else if score <= -MATE_BOUND {
        score + ply as i32
    } else {
        score
    }
}

fn nodes_per_second(nodes: u64, elapsed: Duration) -> u64 {
    let micros = elapsed.as_micros().max(1);
    (nodes as u128 * 1_000_000 / micros) as u64
}
