//! Engine control: position management and background searches.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chess_core::{Fen, Move};
use tracing::{info, warn};

use crate::book::OpeningBook;
use crate::config::EngineConfig;
use crate::eval::evaluate;
use crate::movegen::perft::{perft, perft_divide};
use crate::movegen::{find_move, generate_moves};
use crate::search::{
    InfoSink, SearchControl, SearchLimits, SearchOutcome, SearchResult, Searcher, TracingSink,
};
use crate::time;
use crate::tt::TranspositionTable;
use crate::{EngineError, Position};

/// A chess engine: the current position, a transposition table kept across
/// searches, and at most one search running in the background.
///
/// ```no_run
/// use chess_engine::{Engine, EngineConfig, SearchLimits};
///
/// let mut engine = Engine::new(EngineConfig::default())?;
/// engine.set_position("startpos", &["e2e4", "e7e5"])?;
/// let result = engine.search(SearchLimits::depth(5), false)?;
/// println!("bestmove {}", result.best_move.unwrap().to_uci());
/// # Ok::<(), chess_engine::EngineError>(())
/// ```
pub struct Engine {
    config: EngineConfig,
    position: Position,
    tt: Arc<TranspositionTable>,
    control: Arc<SearchControl>,
    book: Option<Arc<dyn OpeningBook>>,
    sink: Arc<dyn InfoSink>,
}

impl Engine {
    /// Validates `config` and allocates the transposition table.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let tt = TranspositionTable::with_megabytes(config.hash_megabytes)?;
        info!(
            hash_mb = config.hash_megabytes,
            entries = tt.capacity(),
            "engine ready"
        );
        Ok(Engine {
            config,
            position: Position::startpos(),
            tt: Arc::new(tt),
            control: Arc::new(SearchControl::new()),
            book: None,
            sink: Arc::new(TracingSink),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn set_book(&mut self, book: Option<Arc<dyn OpeningBook>>) {
        self.book = book;
    }

    pub fn set_info_sink(&mut self, sink: Arc<dyn InfoSink>) {
        self.sink = sink;
    }

    pub fn is_searching(&self) -> bool {
        self.control.is_searching()
    }

    /// Loads `fen` (or `"startpos"`) and plays `moves` from it.
    ///
    /// Nothing changes unless the FEN parses and every move is legal in turn.
    pub fn set_position(&mut self, fen: &str, moves: &[&str]) -> Result<(), EngineError> {
        if self.is_searching() {
            return Err(EngineError::SearchInProgress);
        }
        let fen = if fen.trim() == "startpos" {
            Fen::STARTPOS
        } else {
            fen
        };

        let mut position = Position::from_fen(fen).inspect_err(|e| warn!(%e, "rejected FEN"))?;
        for text in moves {
            let mv = find_move(&position, text).inspect_err(|e| warn!(%e, "rejected move"))?;
            position.make_move(mv);
        }
        self.position = position;
        Ok(())
    }

    /// Plays one more move on the current position.
    pub fn play(&mut self, text: &str) -> Result<Move, EngineError> {
        if self.is_searching() {
            return Err(EngineError::SearchInProgress);
        }
        let mv = find_move(&self.position, text)?;
        self.position.make_move(mv);
        Ok(mv)
    }

    /// Back to the start position with an empty transposition table.
    pub fn new_game(&mut self) -> Result<(), EngineError> {
        if self.is_searching() {
            return Err(EngineError::SearchInProgress);
        }
        self.tt.clear();
        self.position = Position::startpos();
        Ok(())
    }

    pub fn static_eval(&self) -> i32 {
        evaluate(&self.position)
    }

    pub fn perft(&self, depth: u32) -> u64 {
        let mut position = self.position.clone();
        perft(&mut position, depth)
    }

    pub fn perft_divide(&self, depth: u32) -> Vec<(Move, u64)> {
        let mut position = self.position.clone();
        perft_divide(&mut position, depth)
    }

    /// Asks the running search, if any, to stop.
    pub fn stop(&self) {
        self.control.request_stop();
    }

    fn book_move(&self) -> Option<Move> {
        let book = self.book.as_ref()?;
        if self.position.states().len() >= self.config.book_ply_limit {
            return None;
        }
        let mv = book.lookup(&self.position)?;
        if generate_moves(&self.position).contains(mv) {
            Some(mv)
        } else {
            warn!(mv = %mv.to_uci(), fen = %self.position.to_fen(), "book move is not legal");
            None
        }
    }

    /// Starts searching the current position on a background thread.
    ///
    /// With `use_book`, a legal book move is returned immediately instead.
    pub fn start_search(
        &mut self,
        limits: SearchLimits,
        use_book: bool,
    ) -> Result<SearchHandle, EngineError> {
        if self.is_searching() {
            return Err(EngineError::SearchInProgress);
        }

        if use_book {
            if let Some(mv) = self.book_move() {
                info!(mv = %mv.to_uci(), "book move");
                return Ok(SearchHandle::ready(
                    Arc::clone(&self.control),
                    SearchResult {
                        best_move: Some(mv),
                        score: 0,
                        depth: 0,
                        nodes: 0,
                        outcome: SearchOutcome::Completed,
                        from_book: true,
                    },
                ));
            }
        }

        let Some(generation) = self.control.try_begin() else {
            return Err(EngineError::SearchInProgress);
        };

        let depth = limits.depth.unwrap_or(self.config.max_depth);
        let nodes = limits.nodes.or(self.config.max_nodes);
        let move_time = match limits.clock {
            Some(clock) => Some(time::allocate(
                clock,
                limits.move_time,
                Duration::from_millis(self.config.move_overhead_ms),
            )),
            None => limits.move_time,
        };
        let deadline = move_time.map(|t| Instant::now() + t);

        info!(
            fen = %self.position.to_fen(),
            depth,
            nodes = ?nodes,
            move_time_ms = ?move_time.map(|t| t.as_millis()),
            "search started"
        );

        let position = self.position.clone();
        let tt = Arc::clone(&self.tt);
        let control = Arc::clone(&self.control);
        let sink = Arc::clone(&self.sink);
        let (sender, receiver) = mpsc::channel();

        let spawned = thread::Builder::new()
            .name("search".into())
            .spawn(move || {
                let _release = Release(&control);
                let result = Searcher::new(position, &tt, &control, sink.as_ref())
                    .max_depth(depth)
                    .max_nodes(nodes)
                    .run();
                info!(
                    best = ?result.best_move.map(Move::to_uci),
                    score = result.score,
                    depth = result.depth,
                    nodes = result.nodes,
                    outcome = ?result.outcome,
                    "search finished"
                );
                // The receiver is gone only if the handle was dropped.
                let _ = sender.send(result);
            });

        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                self.control.finish();
                return Err(EngineError::ThreadSpawn(e));
            }
        };

        Ok(SearchHandle {
            control: Arc::clone(&self.control),
            generation,
            receiver,
            thread: Some(thread),
            deadline,
        })
    }

    /// Searches the current position and blocks until the result is in.
    ///
    /// A move time (given directly or derived from a clock) bounds the wait;
    /// once it passes the search is stopped and the last completed depth wins.
    pub fn search(
        &mut self,
        limits: SearchLimits,
        use_book: bool,
    ) -> Result<SearchResult, EngineError> {
        self.start_search(limits, use_book)?.wait()
    }
}

/// Clears the searching flag when the search thread exits, panicking or not.
struct Release<'a>(&'a SearchControl);

impl Drop for Release<'_> {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// A search running on its own thread.
///
/// Dropping the handle stops the search and joins the thread. A handle
/// only ever stops its own search, never one started after it.
pub struct SearchHandle {
    control: Arc<SearchControl>,
    generation: u64,
    receiver: Receiver<SearchResult>,
    thread: Option<JoinHandle<()>>,
    deadline: Option<Instant>,
}

impl SearchHandle {
    fn ready(control: Arc<SearchControl>, result: SearchResult) -> Self {
        let (sender, receiver) = mpsc::channel();
        let _ = sender.send(result);
        SearchHandle {
            control,
            generation: 0,
            receiver,
            thread: None,
            deadline: None,
        }
    }

    pub fn stop(&self) {
        if self.thread.is_some() {
            self.control.request_stop_for(self.generation);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Waits for the result, stopping the search at its move-time deadline.
    pub fn wait(self) -> Result<SearchResult, EngineError> {
        match self.deadline {
            Some(deadline) => self.wait_timeout(deadline),
            None => self.finish(None),
        }
    }

    /// Waits until `deadline`, then stops the search and collects what it has.
    pub fn wait_timeout(self, deadline: Instant) -> Result<SearchResult, EngineError> {
        self.finish(Some(deadline))
    }

    fn finish(mut self, deadline: Option<Instant>) -> Result<SearchResult, EngineError> {
        let received = match deadline {
            Some(deadline) => {
                let wait = deadline.saturating_duration_since(Instant::now());
                match self.receiver.recv_timeout(wait) {
                    Ok(result) => Ok(result),
                    Err(RecvTimeoutError::Timeout) => {
                        self.stop();
                        self.receiver.recv()
                    }
                    Err(RecvTimeoutError::Disconnected) => Err(mpsc::RecvError),
                }
            }
            None => self.receiver.recv(),
        };
        self.join();
        received.map_err(|_| EngineError::SearchPanicked)
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("search thread panicked");
            }
        }
    }
}

impl Drop for SearchHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.stop();
            self.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine {
        Engine::new(EngineConfig {
            hash_megabytes: 1,
            ..EngineConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn set_position_is_all_or_nothing() {
        let mut engine = engine();
        engine.set_position("startpos", &["e2e4"]).unwrap();
        let before = engine.position().to_fen();

        assert!(engine.set_position("startpos", &["e2e4", "e2e4"]).is_err());
        assert_eq!(engine.position().to_fen(), before);
        assert!(matches!(
            engine.set_position("not a fen", &[]),
            Err(EngineError::InvalidFen(_))
        ));
        assert_eq!(engine.position().to_fen(), before);
    }

    #[test]
    fn blocking_search_finds_mate() {
        let mut engine = engine();
        engine
            .set_position("6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1", &[])
            .unwrap();
        let result = engine.search(SearchLimits::depth(3), false).unwrap();
        assert_eq!(result.best_move.unwrap().to_uci(), "a1a8");
        assert!(!engine.is_searching());
    }

    #[test]
    fn perft_leaves_position_alone() {
        let engine = engine();
        assert_eq!(engine.perft(3), 8902);
        assert_eq!(engine.perft_divide(1).len(), 20);
        assert_eq!(engine.position(), &Position::startpos());
    }
}
