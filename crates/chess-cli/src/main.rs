//! Command line driver for the engine: perft, search and static evaluation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use chess_engine::{
    Clock, Engine, EngineConfig, InfoSink, MemoryBook, SearchInfo, SearchLimits, SearchOutcome,
};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chess")]
#[command(about = "Bitboard chess engine")]
struct Cli {
    /// Engine configuration file (TOML); defaults are used if it is missing
    #[arg(long, default_value = "chess-engine.toml", global = true)]
    config: PathBuf,

    /// Transposition table size in megabytes, overriding the config file
    #[arg(long, global = true)]
    hash: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct PositionArgs {
    /// Position to start from, as FEN or "startpos"
    #[arg(long, default_value = "startpos")]
    fen: String,

    /// Moves to play from that position, in coordinate notation
    #[arg(long, num_args = 1.., value_delimiter = ' ')]
    moves: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Count leaf nodes of the legal move tree
    Perft {
        #[command(flatten)]
        position: PositionArgs,
        /// Depth in plies
        #[arg(short, long, default_value = "5")]
        depth: u32,
        /// Print the count below each root move
        #[arg(long)]
        divide: bool,
    },
    /// Search for the best move
    Search {
        #[command(flatten)]
        position: PositionArgs,
        /// Maximum depth in plies
        #[arg(short, long)]
        depth: Option<u8>,
        /// Node budget
        #[arg(short, long)]
        nodes: Option<u64>,
        /// Time for this move in milliseconds
        #[arg(long)]
        movetime: Option<u64>,
        /// Remaining clock time in milliseconds
        #[arg(long)]
        time: Option<u64>,
        /// Clock increment in milliseconds
        #[arg(long, default_value = "0")]
        inc: u64,
        /// Consult the built-in opening book first
        #[arg(long)]
        book: bool,
    },
    /// Print the static evaluation of a position
    Eval {
        #[command(flatten)]
        position: PositionArgs,
    },
}

/// Prints one line per completed iteration.
struct PrintSink;

impl InfoSink for PrintSink {
    fn on_iteration(&self, info: &SearchInfo) {
        let score = match info.mate_in() {
            Some(n) => format!("mate {n}"),
            None => format!("cp {}", info.score),
        };
        println!(
            "info depth {} score {} nodes {} nps {} hashfull {} time {} pv {}",
            info.depth,
            score,
            info.nodes,
            info.nps,
            info.hashfull,
            info.elapsed.as_millis(),
            info.best_move.to_uci()
        );
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut config = EngineConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(hash) = cli.hash {
        config.hash_megabytes = hash;
    }
    let mut engine = Engine::new(config)?;

    match cli.command {
        Commands::Perft {
            position,
            depth,
            divide,
        } => {
            set_position(&mut engine, &position)?;
            let start = Instant::now();
            let nodes = if divide {
                let split = engine.perft_divide(depth);
                for (mv, count) in &split {
                    println!("{}: {}", mv.to_uci(), count);
                }
                split.iter().map(|(_, count)| count).sum()
            } else {
                engine.perft(depth)
            };
            let elapsed = start.elapsed();
            println!();
            println!("Nodes searched: {nodes}");
            println!(
                "Time: {} ms ({:.0} nps)",
                elapsed.as_millis(),
                nodes as f64 / elapsed.as_secs_f64().max(1e-9)
            );
        }
        Commands::Search {
            position,
            depth,
            nodes,
            movetime,
            time,
            inc,
            book,
        } => {
            set_position(&mut engine, &position)?;
            engine.set_info_sink(Arc::new(PrintSink));
            if book {
                engine.set_book(Some(Arc::new(MemoryBook::builtin())));
            }
            let limits = SearchLimits {
                depth,
                nodes,
                move_time: movetime.map(Duration::from_millis),
                clock: time.map(|remaining| Clock {
                    remaining: Duration::from_millis(remaining),
                    increment: Duration::from_millis(inc),
                }),
            };
            let result = engine.search(limits, book)?;
            if result.outcome == SearchOutcome::Cancelled {
                tracing::info!(depth = result.depth, "search was cut short");
            }
            match result.best_move {
                Some(mv) if result.from_book => println!("bestmove {} (book)", mv.to_uci()),
                Some(mv) => println!("bestmove {}", mv.to_uci()),
                None => println!("bestmove (none)"),
            }
        }
        Commands::Eval { position } => {
            set_position(&mut engine, &position)?;
            println!("{}", engine.position());
            println!("Static eval: {} cp (side to move)", engine.static_eval());
        }
    }

    Ok(())
}

fn set_position(engine: &mut Engine, args: &PositionArgs) -> anyhow::Result<()> {
    let moves: Vec<&str> = args.moves.iter().map(String::as_str).collect();
    engine
        .set_position(&args.fen, &moves)
        .with_context(|| format!("setting up position '{}'", args.fen))
}
