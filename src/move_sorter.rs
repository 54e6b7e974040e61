//! Ordering of candidate moves by heuristic score

use crate::WIDTH;

/// Fixed capacity container sorting at most `WIDTH` moves by score
///
/// Moves are kept in ascending score order with an insertion sort, which is
/// cheap for so few entries, and cheaper still when moves are pushed in
/// roughly ascending order. Moves with equal scores come out in reverse
/// order of insertion.
pub struct MoveSorter {
    size: usize,
    // move bitmap and score
    moves: [(u64, i32); WIDTH],
}

impl MoveSorter {
    pub fn new() -> Self {
        Self {
            size: 0,
            moves: [(0, 0); WIDTH],
        }
    }

    /// Adds a move with its score, no more than `WIDTH` moves can be added
    pub fn add(&mut self, new_move: u64, score: i32) {
        debug_assert!(self.size < WIDTH);
        let mut pos = self.size;
        self.size += 1;
        while pos != 0 && self.moves[pos - 1].1 > score {
            self.moves[pos] = self.moves[pos - 1];
            pos -= 1;
        }
        self.moves[pos] = (new_move, score);
    }

    /// Removes and returns the remaining move with the highest score, or 0
    /// when the container is empty
    pub fn get_next(&mut self) -> u64 {
        match self.size {
            0 => 0,
            _ => {
                self.size -= 1;
                self.moves[self.size].0
            }
        }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

impl Default for MoveSorter {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for MoveSorter {
    type Item = u64;

    fn next(&mut self) -> Option<Self::Item> {
        match self.get_next() {
            0 => None,
            next => Some(next),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_moves_by_descending_score() {
        let mut moves = MoveSorter::new();
        moves.add(1 << 0, 2);
        moves.add(1 << 7, 5);
        moves.add(1 << 14, 0);
        moves.add(1 << 21, 3);
        assert_eq!(moves.len(), 4);

        let order: Vec<u64> = moves.collect();
        assert_eq!(order, vec![1 << 7, 1 << 21, 1 << 0, 1 << 14]);
    }

    #[test]
    fn equal_scores_come_out_last_in_first_out() {
        let mut moves = MoveSorter::new();
        moves.add(1, 1);
        moves.add(2, 1);
        moves.add(4, 1);
        assert_eq!(moves.get_next(), 4);
        assert_eq!(moves.get_next(), 2);
        assert_eq!(moves.get_next(), 1);
    }

    #[test]
    fn empty_sorter_returns_no_move() {
        let mut moves = MoveSorter::new();
        assert!(moves.is_empty());
        assert_eq!(moves.get_next(), 0);

        moves.add(8, 0);
        assert_eq!(moves.get_next(), 8);
        assert_eq!(moves.get_next(), 0);
        assert!(moves.next().is_none());
    }

    #[test]
    fn holds_a_full_row_of_moves() {
        let mut moves = MoveSorter::new();
        for column in 0..WIDTH {
            moves.add(1 << (column * 7), (column % 3) as i32);
        }
        assert_eq!(moves.len(), WIDTH);
        let scores: Vec<u64> = moves.collect();
        assert_eq!(scores.len(), WIDTH);
    }
}
