//! An agent to solve the game of Connect 4

use log::{debug, trace, warn};

use std::path::Path;
use std::sync::Arc;

use crate::{
    move_sorter::MoveSorter,
    opening_book::{BookError, OpeningBook},
    position::Position,
    transposition_table::TranspositionTable,
    HEIGHT, MAX_SCORE, MIN_SCORE, WIDTH,
};

/// Score reported by [`Solver::analyze`] for columns that cannot be played
pub const INVALID_MOVE: i32 = -1000;

const CELLS: i32 = (WIDTH * HEIGHT) as i32;

/// Returns the columns ordered from the middle outwards, as the middle
/// columns are often better moves
pub const fn column_order() -> [usize; WIDTH] {
    let mut column_order = [0; WIDTH];
    let mut i = 0;
    while i < WIDTH {
        column_order[i] = (WIDTH / 2) + (i % 2) * (i / 2 + 1) - (1 - i % 2) * (i / 2);
        i += 1;
    }
    column_order
}

const COLUMN_ORDER: [usize; WIDTH] = column_order();

// score of a position won by the current player with their next tile
fn immediate_win_score(position: &Position) -> i32 {
    (CELLS + 1 - position.num_moves() as i32) / 2
}

/// An agent to solve Connect 4 positions
///
/// # Notes
/// This agent uses a classical game tree search with various optimisations to
/// find the mathematically best move(s) in any position, thus 'solving' the game
///
/// # Position Scoring
/// A position is scored from the point of view of the player to move, by how
/// early a forced win comes. Winning with your last possible tile (the 21st
/// tile on a 7x6 board) scores 1, winning one tile earlier scores 2, and so on
/// up to 18 for a win with your 4th tile. Losses score the negated value of
/// the opponent's win and a drawn position scores 0.
///
/// A weak solve only tells wins, draws and losses apart, scoring them
/// 1, 0 and -1.
pub struct Solver {
    /// The number of nodes searched by this `Solver` so far (for diagnostics only)
    pub node_count: usize,
    transposition_table: TranspositionTable,
    opening_book: Option<Arc<OpeningBook>>,
}

impl Solver {
    /// Creates a new `Solver` with a default sized transposition table
    pub fn new() -> Self {
        Self::with_transposition_table(TranspositionTable::new())
    }

    /// Creates a new `Solver` with a transposition table of
    /// `next_prime(2^log_size)` entries
    pub fn with_table_log_size(log_size: u32) -> Self {
        Self::with_transposition_table(TranspositionTable::with_log_size(log_size))
    }

    /// Creates a new `Solver` with a given transposition table
    pub fn with_transposition_table(transposition_table: TranspositionTable) -> Self {
        Self {
            node_count: 0,
            transposition_table,
            opening_book: None,
        }
    }

    /// Adds an opening book to an existing `Solver`
    pub fn with_opening_book(mut self, opening_book: Arc<OpeningBook>) -> Self {
        self.opening_book = Some(opening_book);
        self
    }

    /// Loads an opening book from a file
    ///
    /// On failure the solver keeps working without any opening book.
    pub fn load_book<P: AsRef<Path>>(&mut self, path: P) -> Result<(), BookError> {
        match OpeningBook::load(path.as_ref()) {
            Ok(book) => {
                self.opening_book = Some(Arc::new(book));
                Ok(())
            }
            Err(err) => {
                warn!(
                    "could not load opening book {}: {}",
                    path.as_ref().display(),
                    err
                );
                self.opening_book = None;
                Err(err)
            }
        }
    }

    pub fn opening_book(&self) -> Option<&OpeningBook> {
        self.opening_book.as_deref()
    }

    /// Clears the node counter and the transposition table
    pub fn reset(&mut self) {
        self.node_count = 0;
        self.transposition_table.reset();
    }

    /// Performs game tree search
    ///
    /// The position must not have an immediately winning move and
    /// `alpha < beta`. Returns the score of the position (see [Position Scoring])
    /// if it lies within the window, otherwise a bound on the side of the
    /// window the score is on:
    /// - if the score is <= alpha, then score <= returned value <= alpha
    /// - if the score is >= beta, then beta <= returned value <= score
    ///
    /// [Position Scoring]: #position-scoring
    fn negamax(&mut self, position: &Position, mut alpha: i32, mut beta: i32) -> i32 {
        debug_assert!(alpha < beta);
        debug_assert!(!position.can_win_next());

        self.node_count += 1;
        let num_moves = position.num_moves() as i32;

        // look for moves that don't give the opponent a next turn win
        let non_losing_moves = position.possible_non_losing_moves();
        if non_losing_moves == 0 {
            return -(CELLS - num_moves) / 2;
        }

        // check for draw, neither player can win with the last two tiles
        if num_moves >= CELLS - 2 {
            return 0;
        }

        // lower bound of score, as the opponent cannot win next move
        let min = -(CELLS - 2 - num_moves) / 2;
        if alpha < min {
            alpha = min;
            if alpha >= beta {
                return alpha;
            }
        }

        // upper bound of score, as we cannot win immediately
        let max = (CELLS - 1 - num_moves) / 2;
        if beta > max {
            beta = max;
            if alpha >= beta {
                return beta;
            }
        }

        // try to fetch the upper/lower bound of the score from the transposition table
        let key = position.key();
        let value = self.transposition_table.get(key) as i32;
        if value != 0 {
            // check if lower bound
            if value > MAX_SCORE - MIN_SCORE + 1 {
                let min = value + 2 * MIN_SCORE - MAX_SCORE - 2;
                if alpha < min {
                    alpha = min;
                    if alpha >= beta {
                        // prune the exploration
                        return alpha;
                    }
                }
            // else upper bound
            } else {
                let max = value + MIN_SCORE - 1;
                if beta > max {
                    beta = max;
                    if alpha >= beta {
                        // prune the exploration
                        return beta;
                    }
                }
            }
        }

        if let Some(book) = &self.opening_book {
            let value = book.get(position);
            if value != 0 {
                return value as i32 + MIN_SCORE - 1;
            }
        }

        let mut moves = MoveSorter::new();
        // reversing move order to put edges first reduces the amount of sorting
        // as these moves are worse on average
        for &column in COLUMN_ORDER.iter().rev() {
            let candidate = non_losing_moves & Position::column_mask(column);
            if candidate != 0 {
                moves.add(candidate, position.move_score(candidate));
            }
        }

        // search the next level of the tree
        for candidate in moves {
            let mut next = *position;
            next.play(candidate);
            // the search window is flipped for the other player
            let score = -self.negamax(&next, -beta, -alpha);
            // if a child node's score is better than beta, we can prune the tree
            // here because a perfect opponent will not pick this branch
            if score >= beta {
                // save a lower bound of the score
                self.transposition_table
                    .put(key, (score + MAX_SCORE - 2 * MIN_SCORE + 2) as u8);
                return score;
            }
            if score > alpha {
                alpha = score;
            }
        }

        // save an upper bound, offset by one to keep 0 for empty entries
        self.transposition_table
            .put(key, (alpha - MIN_SCORE + 1) as u8);
        alpha
    }

    /// Calculates the score of a position (see [Position Scoring])
    ///
    /// With `weak` set, only the sign of the score is computed and the
    /// result is -1, 0 or 1.
    ///
    /// [Position Scoring]: #position-scoring
    pub fn solve(&mut self, position: &Position, weak: bool) -> i32 {
        // the search assumes the current player cannot win right away
        if position.can_win_next() {
            let score = immediate_win_score(position);
            return if weak { score.signum() } else { score };
        }

        let num_moves = position.num_moves() as i32;
        let (mut min, mut max) = if weak {
            (-1, 1)
        } else {
            (-(CELLS - num_moves) / 2, (CELLS + 1 - num_moves) / 2)
        };
        let start_nodes = self.node_count;

        // iteratively narrow the search window
        while min < max {
            let mut mid = min + (max - min) / 2;
            // tweak the search value for both negative and positive searches
            if mid <= 0 && min / 2 < mid {
                mid = min / 2
            } else if mid >= 0 && max / 2 > mid {
                mid = max / 2
            }
            trace!("search window [{}, {}], probing {}", min, max, mid);

            // use a null-window to determine if the actual score is greater or less that mid
            let r = self.negamax(position, mid, mid + 1);

            // r is not necessarily the exact true score, but its value indicates
            // whether the true score is above or below the search target
            if r <= mid {
                max = r
            } else {
                min = r;
            }
        }

        debug!(
            "solved position after {} moves: score {}, {} nodes",
            num_moves,
            min,
            self.node_count - start_nodes
        );
        if weak {
            min.signum()
        } else {
            min
        }
    }

    /// Calculates the score of playing each column of a position
    ///
    /// Columns that cannot be played score [`INVALID_MOVE`].
    pub fn analyze(&mut self, position: &Position, weak: bool) -> [i32; WIDTH] {
        let mut scores = [INVALID_MOVE; WIDTH];
        for (column, score) in scores.iter_mut().enumerate() {
            if !position.can_play(column) {
                continue;
            }
            *score = if position.is_winning_move(column) {
                let win = immediate_win_score(position);
                if weak {
                    win.signum()
                } else {
                    win
                }
            } else {
                let mut next = *position;
                next.play_col(column);
                -self.solve(&next, weak)
            };
        }
        scores
    }

    /// Returns the best column to play and its score, or `None` if the
    /// board is full
    pub fn best_move(&mut self, position: &Position) -> Option<(usize, i32)> {
        let scores = self.analyze(position, false);
        // prefer central columns between equal scores
        COLUMN_ORDER
            .iter()
            .filter(|&&column| scores[column] != INVALID_MOVE)
            .map(|&column| (column, scores[column]))
            .fold(None, |best, (column, score)| match best {
                Some((_, best_score)) if best_score >= score => best,
                _ => Some((column, score)),
            })
    }
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_are_explored_from_the_centre() {
        assert_eq!(column_order(), [3, 4, 2, 5, 1, 6, 0]);
    }

    #[test]
    fn score_limits_match_board_size() {
        assert_eq!(MIN_SCORE, -18);
        assert_eq!(MAX_SCORE, 18);
    }

    #[test]
    fn immediate_wins_score_the_maximum() {
        let mut solver = Solver::with_table_log_size(12);
        let position = Position::from_moves("112233").unwrap();
        assert_eq!(solver.solve(&position, false), MAX_SCORE);
        assert_eq!(solver.solve(&position, true), 1);
        // no search was needed
        assert_eq!(solver.node_count, 0);
    }

    #[test]
    fn full_board_is_a_draw() {
        let mut solver = Solver::with_table_log_size(12);
        let position = Position::from_moves("242222246341543663717511153741653355766774").unwrap();
        assert_eq!(position.num_moves(), WIDTH * HEIGHT);
        assert_eq!(solver.solve(&position, false), 0);
        assert_eq!(solver.solve(&position, true), 0);
        assert_eq!(solver.analyze(&position, false), [INVALID_MOVE; WIDTH]);
        assert_eq!(solver.best_move(&position), None);
    }

    #[test]
    fn forced_losses_are_detected() {
        // the second player faces an open three on the bottom row
        let mut solver = Solver::with_table_log_size(12);
        let position = Position::from_moves("22334").unwrap();
        // the first player wins with their 4th tile
        assert_eq!(solver.solve(&position, false), -MAX_SCORE);
        assert_eq!(solver.solve(&position, true), -1);
    }

    #[test]
    fn best_move_picks_the_highest_score() {
        let mut solver = Solver::with_table_log_size(12);
        let position = Position::from_moves("3724113431231131425622266").unwrap();
        assert_eq!(solver.best_move(&position), Some((3, 7)));
    }

    #[test]
    fn reset_clears_node_count() {
        let mut solver = Solver::with_table_log_size(12);
        let position = Position::from_moves("767461234367367216342632732271").unwrap();
        assert_eq!(solver.solve(&position, false), 4);
        assert!(solver.node_count > 0);
        solver.reset();
        assert_eq!(solver.node_count, 0);
        assert_eq!(solver.solve(&position, false), 4);
    }

    #[test]
    fn missing_book_falls_back_to_search() {
        let mut solver = Solver::with_table_log_size(12);
        assert!(solver.load_book("this/book/does/not/exist.book").is_err());
        assert!(solver.opening_book().is_none());
        let position = Position::from_moves("767461234367367216342632732271").unwrap();
        assert_eq!(solver.solve(&position, false), 4);
    }
}
