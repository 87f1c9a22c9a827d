//! Search behaviour through the public engine interface.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use chess_engine::{
    generate_moves, Engine, EngineConfig, InfoSink, SearchInfo, SearchLimits, SearchOutcome, MATE,
};

fn engine_at(fen: &str) -> Engine {
    let mut engine = Engine::new(EngineConfig {
        hash_megabytes: 2,
        ..EngineConfig::default()
    })
    .unwrap();
    engine.set_position(fen, &[]).unwrap();
    engine
}

#[derive(Default)]
struct Recorder(Mutex<Vec<SearchInfo>>);

impl InfoSink for Recorder {
    fn on_iteration(&self, info: &SearchInfo) {
        self.0.lock().unwrap().push(*info);
    }
}

#[test]
fn scholars_mate() {
    let mut engine =
        engine_at("r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4");
    let result = engine.search(SearchLimits::depth(3), false).unwrap();
    assert_eq!(result.best_move.unwrap().to_uci(), "h5f7");
    assert_eq!(result.score, MATE - 1);
}

#[test]
fn rook_ladder_mate_in_two() {
    let mut engine = engine_at("7k/8/8/8/8/8/R7/1R4K1 w - - 0 1");
    let recorder = Arc::new(Recorder::default());
    engine.set_info_sink(recorder.clone());

    let result = engine.search(SearchLimits::depth(5), false).unwrap();
    assert_eq!(result.score, MATE - 3);
    assert_eq!(result.outcome, SearchOutcome::Completed);
    let infos = recorder.0.lock().unwrap();
    assert_eq!(infos.last().unwrap().mate_in(), Some(2));
}

#[test]
fn avoids_stalemating_when_winning() {
    // Qf7 would be stalemate; anything sensible keeps the win.
    let mut engine = engine_at("7k/8/6K1/8/8/8/8/5Q2 w - - 0 1");
    let result = engine.search(SearchLimits::depth(3), false).unwrap();
    assert_ne!(result.best_move.unwrap().to_uci(), "f1f7");
    assert!(result.score > 0);
}

#[test]
fn node_budget_is_respected() {
    let mut engine = engine_at(chess_core::Fen::STARTPOS);
    let result = engine.search(SearchLimits::nodes(5_000), false).unwrap();
    assert!(result.nodes <= 5_000);
    assert_eq!(result.outcome, SearchOutcome::Cancelled);
    let mv = result.best_move.unwrap();
    assert!(generate_moves(engine.position()).contains(mv));
}

#[test]
fn cancellation_returns_last_completed_depth() {
    let mut engine = engine_at(
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
    );
    let recorder = Arc::new(Recorder::default());
    engine.set_info_sink(recorder.clone());

    let handle = engine.start_search(SearchLimits::default(), false).unwrap();
    thread::sleep(Duration::from_millis(300));
    handle.stop();
    let result = handle.wait().unwrap();

    assert_eq!(result.outcome, SearchOutcome::Cancelled);
    let infos = recorder.0.lock().unwrap();
    let last = infos.last().expect("at least one iteration completes");
    assert_eq!(result.depth, last.depth);
    assert_eq!(result.best_move, Some(last.best_move));
    assert!(!engine.is_searching());
}

#[test]
fn move_time_bounds_a_blocking_search() {
    let mut engine = engine_at(chess_core::Fen::STARTPOS);
    let start = Instant::now();
    let result = engine
        .search(SearchLimits::move_time(Duration::from_millis(200)), false)
        .unwrap();
    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(result.best_move.is_some());
}

#[test]
fn checkmated_and_stalemated_roots() {
    let mut mated = engine_at("R5k1/5ppp/8/8/8/8/8/6K1 b - - 0 1");
    let result = mated.search(SearchLimits::depth(4), false).unwrap();
    assert_eq!(result.best_move, None);
    assert_eq!(result.score, -MATE);

    let mut stalemate = engine_at("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1");
    let result = stalemate.search(SearchLimits::depth(4), false).unwrap();
    assert_eq!(result.best_move, None);
    assert_eq!(result.score, 0);
}
