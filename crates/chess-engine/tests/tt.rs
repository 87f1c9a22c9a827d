//! Transposition table integrity.

use std::sync::Arc;
use std::thread;

use chess_engine::{Bound, Position, TranspositionTable};

#[test]
fn index_collisions_are_rejected() {
    let tt = TranspositionTable::new(256).unwrap();
    let key = Position::startpos().transposition_key();
    tt.store(25, Some(3), key, -50, 50, 5);

    let collider = key ^ (1 << 40);
    assert_eq!(key as usize & 255, collider as usize & 255);
    assert_eq!(tt.lookup(collider), None);
    assert_eq!(tt.lookup(key).unwrap().bound, Bound::Exact);
}

#[test]
fn concurrent_writers_never_yield_foreign_entries() {
    let tt = Arc::new(TranspositionTable::new(64).unwrap());
    let writers: Vec<_> = (0..4u64)
        .map(|id| {
            let tt = Arc::clone(&tt);
            thread::spawn(move || {
                for round in 0..20_000u64 {
                    // every writer targets the same slot with its own hash
                    let hash = (id + 1) << 32 | (round % 7) << 6;
                    tt.store(id as i32, Some(id as u8), hash & !63, -1000, 1000, (round % 50 + 1) as u8);
                }
            })
        })
        .collect();

    for _ in 0..20_000 {
        for id in 0..4u64 {
            for r in 0..7u64 {
                let hash = ((id + 1) << 32 | r << 6) & !63;
                if let Some(entry) = tt.lookup(hash) {
                    assert_eq!(entry.eval, id as i32);
                    assert_eq!(entry.best_move_index, Some(id as u8));
                }
            }
        }
    }
    for writer in writers {
        writer.join().unwrap();
    }
}

#[test]
fn table_sizes_follow_megabytes() {
    let small = TranspositionTable::with_megabytes(1).unwrap();
    let large = TranspositionTable::with_megabytes(4).unwrap();
    assert_eq!(large.capacity(), small.capacity() * 4);
    assert_eq!(small.hashfull(), 0);
}
