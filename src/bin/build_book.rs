use anyhow::Result;
use clap::Parser;
use log::info;

use std::path::PathBuf;

use connect4_solver::{
    book_builder::{build, BookOptions},
    position::Position,
    BOOK_PATH,
};

/// Generates an opening book by solving every position up to a depth
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Maximum number of moves of the stored positions
    #[arg(long, default_value_t = 8)]
    depth: u8,

    /// Base 2 log of the number of book entries
    #[arg(long, default_value_t = 23)]
    log_size: u8,

    /// Bytes of each position key kept in the book (1, 2 or 4)
    #[arg(long, default_value_t = 2)]
    key_bytes: u8,

    /// Base 2 log of the transposition table size of each worker thread
    #[arg(long, default_value_t = 22)]
    table_log_size: u32,

    /// Only include positions following this move sequence
    #[arg(long, default_value = "")]
    root: String,

    /// Output file
    #[arg(short, long, default_value = BOOK_PATH)]
    output: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let options = BookOptions {
        root: Position::from_moves(&args.root)?,
        depth: args.depth,
        partial_key_bytes: args.key_bytes,
        log_size: args.log_size,
        table_log_size: args.table_log_size,
    };
    let book = build(&options)?;

    book.save(&args.output)?;
    info!(
        "wrote {} entries of depth {} to {}",
        book.size(),
        book.depth(),
        args.output.display()
    );
    Ok(())
}
