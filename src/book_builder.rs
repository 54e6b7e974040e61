//! Offline generation of opening books
//!
//! Every position reachable within the book depth is solved, deepest
//! positions first, so that the searches of shallower positions can already
//! stop at the entries found for deeper ones.

use anyhow::{bail, Result};
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use log::{info, warn};
use rayon::prelude::*;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::{
    next_prime, opening_book::OpeningBook, position::Position, solver::Solver, WIDTH,
};

/// Parameters of a generated opening book
#[derive(Clone, Debug)]
pub struct BookOptions {
    /// Position the book is built from, usually the empty board
    pub root: Position,
    /// Maximum number of moves of the stored positions
    pub depth: u8,
    /// Bytes of each key kept to check entries (1, 2 or 4)
    pub partial_key_bytes: u8,
    /// Base 2 log of the number of book entries
    pub log_size: u8,
    /// Base 2 log of the transposition table size of each worker
    pub table_log_size: u32,
}

impl Default for BookOptions {
    fn default() -> Self {
        Self {
            root: Position::new(),
            depth: 8,
            partial_key_bytes: 2,
            log_size: 23,
            table_log_size: 22,
        }
    }
}

/// Whether every pair of distinct positions within the book depth is told
/// apart by its slot and partial key
///
/// Keys below `size * 2^(8 * partial_key_bytes)` are unambiguous since the
/// size is prime, and base 3 keys have at most `depth + WIDTH - 1` digits.
pub fn keys_are_unambiguous(depth: u8, partial_key_bytes: u8, log_size: u8) -> bool {
    let max_key = 3u128.checked_pow(depth as u32 + WIDTH as u32 - 1);
    let capacity = (next_prime(1 << log_size) as u128) << (8 * partial_key_bytes as u32);
    match max_key {
        Some(max_key) => max_key <= capacity,
        None => false,
    }
}

/// Collects the positions reachable from `root` with at most `depth` moves,
/// grouped by number of moves
///
/// Games that are already won are not continued, and positions where the
/// player to move can win immediately are left out since the solver never
/// looks them up. Mirror images are only kept once.
pub fn collect_positions(root: Position, depth: usize) -> Vec<Vec<Position>> {
    let mut layers = vec![Vec::new(); depth + 1];
    if root.num_moves() > depth {
        return layers;
    }
    let mut seen = HashSet::new();
    let mut stack = vec![root];
    seen.insert(root.key3());

    while let Some(position) = stack.pop() {
        if !position.can_win_next() {
            layers[position.num_moves()].push(position);
        }
        if position.num_moves() == depth {
            continue;
        }
        for column in 0..WIDTH {
            if !position.can_play(column) || position.is_winning_move(column) {
                continue;
            }
            let mut next = position;
            next.play_col(column);
            if seen.insert(next.key3()) {
                stack.push(next);
            }
        }
    }
    layers
}

/// Builds an opening book by solving every position within its depth
pub fn build(options: &BookOptions) -> Result<OpeningBook> {
    let start = Instant::now();
    let depth = options.depth as usize;
    if options.root.num_moves() > depth {
        bail!(
            "root position has {} moves, more than the book depth of {}",
            options.root.num_moves(),
            depth
        );
    }
    let mut book = Arc::new(OpeningBook::new(
        options.depth,
        options.partial_key_bytes,
        options.log_size,
    )?);
    if !keys_are_unambiguous(options.depth, options.partial_key_bytes, options.log_size) {
        warn!(
            "partial keys of {} bytes in 2^{} entries can confuse positions of depth {}",
            options.partial_key_bytes, options.log_size, options.depth
        );
    }

    let layers = collect_positions(options.root, depth);
    let total = layers.iter().map(Vec::len).sum::<usize>();
    info!("found {} positions up to depth {}", total, depth);

    let progress = ProgressBar::new(total as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("Solving positions: {bar:40.cyan/blue} {pos}/{len} {msg} ~{eta} remaining")
            .progress_chars("█▓▒░  "),
    );

    for (num_moves, layer) in layers.iter().enumerate().rev() {
        if layer.is_empty() {
            continue;
        }
        progress.set_message(&format!("(depth {})", num_moves));
        let scores = solve_layer(layer, &book, options.table_log_size, &progress);

        // the workers are done with the shared book, so this does not copy it
        let writable = Arc::make_mut(&mut book);
        for (position, score) in scores {
            writable.insert(&position, score);
        }
    }
    progress.finish();

    info!(
        "opening book generation completed in {}",
        HumanDuration(Instant::now() - start)
    );
    Ok(Arc::try_unwrap(book).unwrap_or_else(|shared| (*shared).clone()))
}

// solves a layer in parallel, each chunk with its own transposition table
fn solve_layer(
    layer: &[Position],
    book: &Arc<OpeningBook>,
    table_log_size: u32,
    progress: &ProgressBar,
) -> Vec<(Position, i32)> {
    let chunk_size = (layer.len() / (4 * rayon::current_num_threads())).max(1);
    layer
        .par_chunks(chunk_size)
        .flat_map_iter(|chunk| {
            let mut solver =
                Solver::with_table_log_size(table_log_size).with_opening_book(book.clone());
            chunk
                .iter()
                .map(|position| {
                    let score = solver.solve(position, false);
                    progress.inc(1);
                    (*position, score)
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &str = "4137661616442557672363435172";

    #[test]
    fn collects_unique_positions_by_depth() {
        let layers = collect_positions(Position::new(), 2);
        assert_eq!(layers.len(), 3);
        assert_eq!(layers[0].len(), 1);
        // 7 first moves, only 4 up to symmetry
        assert_eq!(layers[1].len(), 4);
        // 49 two move games, 25 up to symmetry
        assert_eq!(layers[2].len(), 25);
    }

    #[test]
    fn skips_positions_with_immediate_wins() {
        let root = Position::from_moves("112233").unwrap();
        let layers = collect_positions(root, 6);
        assert!(layers[6].is_empty());
    }

    #[test]
    fn checks_key_ambiguity() {
        assert!(keys_are_unambiguous(8, 1, 23));
        assert!(keys_are_unambiguous(14, 2, 23));
        assert!(!keys_are_unambiguous(30, 1, 10));
    }

    #[test]
    fn rejects_roots_deeper_than_the_book() {
        let options = BookOptions {
            root: Position::from_moves(ROOT).unwrap(),
            depth: 10,
            ..BookOptions::default()
        };
        assert!(build(&options).is_err());
    }

    #[test]
    fn built_book_matches_search() -> Result<()> {
        let root = Position::from_moves(ROOT)?;
        let options = BookOptions {
            root,
            depth: root.num_moves() as u8 + 3,
            partial_key_bytes: 4,
            log_size: 12,
            table_log_size: 12,
        };
        let book = Arc::new(build(&options)?);
        assert_eq!(book.get(&root) as i32 + crate::MIN_SCORE - 1, -5);

        let mut plain = Solver::with_table_log_size(12);
        for layer in collect_positions(root, options.depth as usize) {
            for position in layer {
                let value = book.get(&position);
                assert_ne!(value, 0);
                assert_eq!(
                    value as i32 + crate::MIN_SCORE - 1,
                    plain.solve(&position, false)
                );
            }
        }

        let mut with_book = Solver::with_table_log_size(12).with_opening_book(book);
        assert_eq!(with_book.solve(&root, false), -5);
        assert_eq!(with_book.analyze(&root, false), plain.analyze(&root, false));
        Ok(())
    }
}
