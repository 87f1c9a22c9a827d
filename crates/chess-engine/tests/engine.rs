//! Engine control: position setup, concurrent-search refusal and the book hook.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chess_core::{Move, Square};
use chess_engine::{
    Engine, EngineConfig, EngineError, MemoryBook, OpeningBook, Position, SearchLimits,
    SearchOutcome,
};

fn engine(config: EngineConfig) -> Engine {
    Engine::new(EngineConfig {
        hash_megabytes: 1,
        ..config
    })
    .unwrap()
}

fn sq(name: &str) -> Square {
    Square::from_algebraic(name).unwrap()
}

#[test]
fn second_search_is_refused_while_running() {
    let mut engine = engine(EngineConfig::default());
    let handle = engine.start_search(SearchLimits::default(), false).unwrap();
    assert!(engine.is_searching());

    assert!(matches!(
        engine.start_search(SearchLimits::depth(1), false),
        Err(EngineError::SearchInProgress)
    ));
    assert!(matches!(
        engine.set_position("startpos", &["e2e4"]),
        Err(EngineError::SearchInProgress)
    ));

    engine.stop();
    let result = handle.wait().unwrap();
    assert_eq!(result.outcome, SearchOutcome::Cancelled);
    assert!(!engine.is_searching());

    engine.set_position("startpos", &["e2e4"]).unwrap();
    assert!(engine.search(SearchLimits::depth(1), false).is_ok());
}

#[test]
fn wait_timeout_cancels_and_joins() {
    let mut engine = engine(EngineConfig::default());
    let handle = engine.start_search(SearchLimits::default(), false).unwrap();
    let start = Instant::now();
    let result = handle
        .wait_timeout(Instant::now() + Duration::from_millis(150))
        .unwrap();
    assert!(start.elapsed() >= Duration::from_millis(150));
    assert_eq!(result.outcome, SearchOutcome::Cancelled);
    assert!(result.best_move.is_some());
    assert!(!engine.is_searching());
}

#[test]
fn dropping_a_handle_stops_the_search() {
    let mut engine = engine(EngineConfig::default());
    let handle = engine.start_search(SearchLimits::default(), false).unwrap();
    thread::sleep(Duration::from_millis(50));
    drop(handle);
    assert!(!engine.is_searching());
}

#[test]
fn finished_handle_cannot_stop_a_later_search() {
    let mut engine = engine(EngineConfig::default());
    let first = engine.start_search(SearchLimits::depth(1), false).unwrap();
    while engine.is_searching() {
        thread::sleep(Duration::from_millis(1));
    }

    let second = engine.start_search(SearchLimits::depth(5), false).unwrap();
    first.stop();
    drop(first);
    let result = second.wait().unwrap();
    assert_eq!(result.outcome, SearchOutcome::Completed);
    assert_eq!(result.depth, 5);
}

#[test]
fn search_does_not_touch_the_engine_position() {
    let mut engine = engine(EngineConfig::default());
    engine.set_position("startpos", &["d2d4", "d7d5"]).unwrap();
    let before = engine.position().clone();
    engine.search(SearchLimits::depth(3), false).unwrap();
    assert_eq!(engine.position(), &before);
}

#[test]
fn book_is_used_only_early_in_the_game() {
    let mut engine = engine(EngineConfig {
        book_ply_limit: 3,
        ..EngineConfig::default()
    });
    let mut book = MemoryBook::with_seed(5);
    book.add_line(&["e2e4", "e7e5", "g1f3"], 1).unwrap();
    engine.set_book(Some(Arc::new(book)));

    let result = engine.search(SearchLimits::depth(2), true).unwrap();
    assert!(result.from_book);
    assert_eq!(result.best_move.unwrap().to_uci(), "e2e4");

    engine.set_position("startpos", &["e2e4"]).unwrap();
    let result = engine.search(SearchLimits::depth(2), true).unwrap();
    assert!(result.from_book);
    assert_eq!(result.best_move.unwrap().to_uci(), "e7e5");

    // Two plies in, the state stack holds three states and reaches the limit.
    engine.set_position("startpos", &["e2e4", "e7e5"]).unwrap();
    let result = engine.search(SearchLimits::depth(2), true).unwrap();
    assert!(!result.from_book);

    engine.set_position("startpos", &[]).unwrap();
    let result = engine.search(SearchLimits::depth(2), false).unwrap();
    assert!(!result.from_book, "book disabled for this search");
}

struct BrokenBook;

impl OpeningBook for BrokenBook {
    fn lookup(&self, _position: &Position) -> Option<Move> {
        Some(Move::quiet(sq("e2"), sq("e5")))
    }
}

#[test]
fn illegal_book_moves_fall_back_to_search() {
    let mut engine = engine(EngineConfig::default());
    engine.set_book(Some(Arc::new(BrokenBook)));
    let result = engine.search(SearchLimits::depth(2), true).unwrap();
    assert!(!result.from_book);
    assert_ne!(result.best_move.unwrap().to_uci(), "e2e5");
}

#[test]
fn config_defaults_apply_to_searches() {
    let mut engine = engine(EngineConfig {
        max_depth: 2,
        ..EngineConfig::default()
    });
    let result = engine.search(SearchLimits::default(), false).unwrap();
    assert_eq!(result.depth, 2);
    assert_eq!(result.outcome, SearchOutcome::Completed);

    let result = engine.search(SearchLimits::depth(3), false).unwrap();
    assert_eq!(result.depth, 3);
}

#[test]
fn invalid_config_is_rejected() {
    let err = Engine::new(EngineConfig {
        hash_megabytes: 0,
        ..EngineConfig::default()
    });
    assert!(matches!(err, Err(EngineError::Config(_))));
}

#[test]
fn new_game_resets_position() {
    let mut engine = engine(EngineConfig::default());
    engine.set_position("startpos", &["e2e4"]).unwrap();
    engine.play("c7c5").unwrap();
    assert_eq!(engine.position().ply(), 2);
    engine.new_game().unwrap();
    assert_eq!(engine.position(), &Position::startpos());
    assert!(matches!(engine.play("e2e5"), Err(EngineError::IllegalMove { .. })));
}
