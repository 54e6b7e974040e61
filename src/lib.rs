//! An exact solver for the board game 'Connect 4'
//!
//! The solver scores any reachable position under perfect play by both
//! sides, using an alpha-beta negamax search over a bitboard, a
//! transposition table and an optional opening book.
//!
//! # Basic Usage
//!
//! ```
//! use connect4_solver::{position::Position, solver::Solver};
//!
//!# use std::error::Error;
//!# fn main() -> Result<(), Box<dyn Error>> {
//! let mut solver = Solver::with_table_log_size(16);
//! let position = Position::from_moves("112233")?;
//!
//! // the first player wins immediately by playing column 4
//! assert_eq!(solver.solve(&position, false), 18);
//! assert!(position.is_winning_move(3));
//!# Ok(())
//!# }
//! ```

use static_assertions::*;
pub use anyhow;

pub mod position;

pub mod move_sorter;

pub mod transposition_table;

pub mod opening_book;

pub mod solver;

pub mod book_builder;


/// The width of the game board in tiles
pub const WIDTH: usize = 7;

/// The height of the game board in tiles
pub const HEIGHT: usize = 6;

/// Base 2 log of the default transposition table size
pub const TABLE_LOG_SIZE: u32 = 24;

/// Default opening book file name
pub const BOOK_PATH: &str = "7x6.book";

/// The minimum possible score of a position
pub const MIN_SCORE: i32 = -((WIDTH * HEIGHT) as i32) / 2 + 3;

/// The maximum possible score of a position
pub const MAX_SCORE: i32 = ((WIDTH * HEIGHT) as i32 + 1) / 2 - 3;

// ensure that the given dimensions fit in a u64 for the bitboard representation
const_assert!(WIDTH * (HEIGHT + 1) <= 64);
// the move sorter and column indices are stored in small arrays
const_assert!(WIDTH < 10);
// encoded transposition table bounds must fit in a byte
const_assert!(2 * MAX_SCORE - 2 * MIN_SCORE + 2 < 256);

/// Returns the smallest prime greater than or equal to `n`
///
/// Table sizes are prime so they are coprime with any power of two, which
/// keeps truncated keys unambiguous for the key ranges in use.
pub const fn next_prime(n: u64) -> u64 {
    if n <= 2 {
        return 2;
    }
    let mut candidate = if n % 2 == 0 { n + 1 } else { n };
    loop {
        let mut divisor = 3;
        let mut prime = true;
        while divisor * divisor <= candidate {
            if candidate % divisor == 0 {
                prime = false;
                break;
            }
            divisor += 2;
        }
        if prime {
            return candidate;
        }
        candidate += 2;
    }
}
