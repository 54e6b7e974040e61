use anyhow::Result;
use clap::Parser;
use log::{debug, info};

use std::io::{stdin, stdout, BufRead, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use connect4_solver::{position::Position, solver::Solver, BOOK_PATH, TABLE_LOG_SIZE};

/// Solves Connect 4 positions read from standard input, one move sequence
/// (1-indexed columns, e.g. "4453") per line
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Only compute win/draw/loss (1/0/-1) instead of exact scores
    #[arg(short, long)]
    weak: bool,

    /// Print the score of every column instead of the position score
    #[arg(short, long)]
    analyze: bool,

    /// Opening book file
    #[arg(short, long, default_value = BOOK_PATH)]
    book: PathBuf,

    /// Base 2 log of the number of transposition table entries
    #[arg(long, default_value_t = TABLE_LOG_SIZE)]
    table_log_size: u32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut solver = Solver::with_table_log_size(args.table_log_size);
    if solver.load_book(&args.book).is_err() {
        info!("continuing without an opening book");
    }

    let stdin = stdin();
    let mut out = BufWriter::new(stdout());

    for (l, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        let position = match Position::from_moves(&line) {
            Ok(position) => position,
            Err(err) => {
                eprintln!("Line {}: Invalid move {} \"{}\"", l + 1, err.number(), line);
                debug!("{}", err);
                continue;
            }
        };

        let start_time = Instant::now();
        let nodes_before = solver.node_count;
        write!(out, "{}", line)?;
        if args.analyze {
            for score in solver.analyze(&position, args.weak).iter() {
                write!(out, " {}", score)?;
            }
        } else {
            write!(out, " {}", solver.solve(&position, args.weak))?;
        }
        writeln!(out)?;
        out.flush()?;

        debug!(
            "line {}: {} nodes in {:.3}ms",
            l + 1,
            solver.node_count - nodes_before,
            start_time.elapsed().as_secs_f64() * 1000.0
        );
    }
    Ok(())
}
