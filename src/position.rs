use thiserror::Error;

use crate::{HEIGHT, WIDTH};

mod static_masks {
    use crate::{HEIGHT, WIDTH};

    pub const fn bottom_mask() -> u64 {
        let mut mask = 0;
        let mut column = 0;
        while column < WIDTH {
            mask |= 1 << (column * (HEIGHT + 1));
            column += 1;
        }
        mask
    }
    pub const fn full_board_mask() -> u64 {
        bottom_mask() * ((1 << HEIGHT as u64) - 1)
    }
}

/// A rejected move while replaying a move sequence
///
/// `number` is the 1-indexed position of the offending move in the sequence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoveError {
    #[error("move {number}: '{found}' is not a column between 1 and {}", WIDTH)]
    InvalidColumn { number: usize, found: char },
    #[error("move {number}: column {column} is full")]
    ColumnFull { number: usize, column: usize },
    #[error("move {number}: column {column} ends the game")]
    GameOver { number: usize, column: usize },
}

impl MoveError {
    /// The 1-indexed number of the rejected move
    pub fn number(&self) -> usize {
        match *self {
            MoveError::InvalidColumn { number, .. }
            | MoveError::ColumnFull { number, .. }
            | MoveError::GameOver { number, .. } => number,
        }
    }
}

/// A Connect 4 position stored as two bitboards
///
/// Each column is `HEIGHT + 1` bits wide, bottom tile first. The extra bit
/// on top of each column is never set, it separates the columns so that
/// alignments cannot wrap from one column into the next.
///
/// ```text
///  .  .  .  .  .  .  .
///  5 12 19 26 33 40 47
///  4 11 18 25 32 39 46
///  3 10 17 24 31 38 45
///  2  9 16 23 30 37 44
///  1  8 15 22 29 36 43
///  0  7 14 21 28 35 42
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Position {
    // mask of the current player's tiles
    current: u64,
    // mask of all tiles
    mask: u64,
    num_moves: usize,
}

impl Position {
    pub fn new() -> Self {
        Self {
            current: 0,
            mask: 0,
            num_moves: 0,
        }
    }

    /// Builds a position from a string of 1-indexed columns, e.g. `"4453"`
    pub fn from_moves<S: AsRef<str>>(moves: S) -> Result<Self, MoveError> {
        let moves = moves.as_ref();
        let mut position = Self::new();
        let played = position.play_sequence(moves);

        match moves.chars().nth(played) {
            None => Ok(position),
            Some(found) => {
                let number = played + 1;
                Err(match parse_column(found) {
                    None => MoveError::InvalidColumn { number, found },
                    Some(column) if !position.can_play(column) => MoveError::ColumnFull {
                        number,
                        column: column + 1,
                    },
                    Some(column) => MoveError::GameOver {
                        number,
                        column: column + 1,
                    },
                })
            }
        }
    }

    /// Plays a sequence of 1-indexed columns, stopping at the first move
    /// that is out of range, in a full column or would win the game
    ///
    /// Returns the number of moves played, which equals the length of
    /// `moves` only if the whole sequence was valid.
    pub fn play_sequence(&mut self, moves: &str) -> usize {
        for (i, column_char) in moves.chars().enumerate() {
            match parse_column(column_char) {
                // abort if the game would be over after this move
                Some(column) if self.can_play(column) && !self.is_winning_move(column) => {
                    self.play_col(column)
                }
                _ => return i,
            }
        }
        moves.chars().count()
    }

    /// Mask of all tiles on the board
    pub fn board_mask(&self) -> u64 {
        self.mask
    }

    pub fn top_mask(column: usize) -> u64 {
        1 << (column * (HEIGHT + 1) + (HEIGHT - 1))
    }

    pub fn bottom_mask(column: usize) -> u64 {
        1 << (column * (HEIGHT + 1))
    }

    pub fn column_mask(column: usize) -> u64 {
        ((1 << HEIGHT) - 1) << (column * (HEIGHT + 1))
    }

    pub fn num_moves(&self) -> usize {
        self.num_moves
    }

    pub fn can_play(&self, column: usize) -> bool {
        Self::top_mask(column) & self.mask == 0
    }

    /// Plays a move given as a single bit from [`possible`](Self::possible)
    pub fn play(&mut self, move_bitmap: u64) {
        // switch the current player
        self.current ^= self.mask;
        // add a cell of the previous player to the correct column
        self.mask |= move_bitmap;
        self.num_moves += 1;
    }

    /// Plays a tile in a 0-indexed column, which must be playable
    pub fn play_col(&mut self, column: usize) {
        self.play((self.mask + Self::bottom_mask(column)) & Self::column_mask(column));
    }

    /// Whether the current player wins by playing in `column`
    pub fn is_winning_move(&self, column: usize) -> bool {
        self.winning_positions() & self.possible() & Self::column_mask(column) != 0
    }

    /// Whether the current player has any immediately winning move
    pub fn can_win_next(&self) -> bool {
        self.winning_positions() & self.possible() != 0
    }

    /// Bitmap of the cells where a tile can be played this turn
    pub fn possible(&self) -> u64 {
        (self.mask + static_masks::bottom_mask()) & static_masks::full_board_mask()
    }

    /// Bitmap of the playable cells that do not give the opponent an
    /// immediate win
    ///
    /// Must only be called when the current player cannot win this turn.
    pub fn possible_non_losing_moves(&self) -> u64 {
        debug_assert!(!self.can_win_next());
        let mut possible_moves = self.possible();
        let opponent_win = self.opponent_winning_positions();
        let forced_moves = possible_moves & opponent_win;

        if forced_moves != 0 {
            // if more than one forced move exists, you can't prevent the opponent winning
            if forced_moves & (forced_moves - 1) != 0 {
                return 0;
            } else {
                possible_moves = forced_moves
            }
        }
        // avoid playing below an opponent's winning move
        possible_moves & !(opponent_win >> 1)
    }

    /// Heuristic value of a move: the number of open cells that would
    /// complete an alignment for the current player after playing it
    pub fn move_score(&self, candidate: u64) -> i32 {
        compute_winning_positions(self.current | candidate, self.mask).count_ones() as i32
    }

    fn winning_positions(&self) -> u64 {
        compute_winning_positions(self.current, self.mask)
    }

    // create a bitmap of open squares that complete alignments for the opponent
    fn opponent_winning_positions(&self) -> u64 {
        compute_winning_positions(self.current ^ self.mask, self.mask)
    }

    /// Unique key of the position for the transposition table
    ///
    /// Adding the board mask sets the bit above each column's top tile, so
    /// the sum encodes both bitboards in a single word.
    pub fn key(&self) -> u64 {
        self.current + self.mask
    }

    /// Base 3 key of the position, shared with its mirror image
    ///
    /// Each tile is a digit (1 for the current player, 2 for the opponent)
    /// and each column is terminated by a 0. Only fits a `u64` for positions
    /// with few tiles, which is all the opening book needs.
    pub fn key3(&self) -> u64 {
        let mut forward = 0u64;
        for column in 0..WIDTH {
            self.partial_key3(&mut forward, column);
        }
        let mut reverse = 0u64;
        for column in (0..WIDTH).rev() {
            self.partial_key3(&mut reverse, column);
        }
        // drop the trailing column separator
        forward.min(reverse) / 3
    }

    fn partial_key3(&self, key: &mut u64, column: usize) {
        let mut tile = Self::bottom_mask(column);
        while tile & self.mask != 0 {
            *key = key.wrapping_mul(3);
            *key = if tile & self.current != 0 {
                key.wrapping_add(1)
            } else {
                key.wrapping_add(2)
            };
            tile <<= 1;
        }
        *key = key.wrapping_mul(3);
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new()
    }
}

// 0-indexed column of a 1-indexed column digit
fn parse_column(column_char: char) -> Option<usize> {
    match column_char.to_digit(10).map(|c| c as usize) {
        Some(column @ 1..=WIDTH) => Some(column - 1),
        _ => None,
    }
}

// bitmap of the empty cells that would complete an alignment of `player_mask`
fn compute_winning_positions(player_mask: u64, board_mask: u64) -> u64 {
    // vertical
    // find the top ends of 3-alignments
    let mut r = (player_mask << 1) & (player_mask << 2) & (player_mask << 3);

    // horizontal, then both diagonals
    for &shift in [HEIGHT + 1, HEIGHT, HEIGHT + 2].iter() {
        let mut p = (player_mask << shift) & (player_mask << (2 * shift));
        // find the right ends of 3-alignments
        r |= p & (player_mask << (3 * shift));
        // find holes of the type ...O O _ O...
        r |= p & (player_mask >> shift);

        p = (player_mask >> shift) & (player_mask >> (2 * shift));
        // find the left ends of 3-alignments
        r |= p & (player_mask >> (3 * shift));
        // find holes of the type ...O _ O O...
        r |= p & (player_mask << shift);
    }

    r & (static_masks::full_board_mask() ^ board_mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stacking_in_a_column_is_legal() {
        let position = Position::from_moves("44").unwrap();
        assert_eq!(position.num_moves(), 2);
        assert_eq!(position.board_mask(), 0b11 << (3 * (HEIGHT + 1)));
    }

    #[test]
    fn seventh_tile_in_a_column_is_rejected() {
        let err = Position::from_moves("4444444").unwrap_err();
        assert_eq!(err, MoveError::ColumnFull { number: 7, column: 4 });
        assert_eq!(err.number(), 7);

        let mut position = Position::new();
        assert_eq!(position.play_sequence("4444444"), 6);
        assert_eq!(position.num_moves(), 6);
        assert!(!position.can_play(3));
    }

    #[test]
    fn bad_characters_are_rejected() {
        assert_eq!(Position::from_moves("408").unwrap_err().number(), 2);
        assert_eq!(Position::from_moves("48").unwrap_err().number(), 2);
        let mut position = Position::new();
        assert_eq!(position.play_sequence("12a"), 2);
    }

    #[test]
    fn winning_moves_end_the_sequence() {
        // the first player completes a vertical four with the 7th move
        let err = Position::from_moves("1212121").unwrap_err();
        assert_eq!(err, MoveError::GameOver { number: 7, column: 1 });
    }

    #[test]
    fn detects_winning_moves() {
        let position = Position::from_moves("112233").unwrap();
        assert!(position.can_win_next());
        assert!(position.is_winning_move(3));
        assert!(!position.is_winning_move(4));

        // vertical threat
        let position = Position::from_moves("121212").unwrap();
        assert!(position.is_winning_move(0));
        assert!(!position.is_winning_move(1));

        let position = Position::new();
        assert!(!position.can_win_next());
    }

    #[test]
    fn non_losing_moves_block_threats() {
        // three first player tiles in column 1, the second player must block
        let position = Position::from_moves("12121").unwrap();
        assert!(!position.can_win_next());
        let moves = position.possible_non_losing_moves();
        assert_eq!(moves, position.possible() & Position::column_mask(0));

        // an open three on the bottom row threatens both ends
        let position = Position::from_moves("22334").unwrap();
        assert!(!position.can_win_next());
        assert_eq!(position.possible_non_losing_moves(), 0);
    }

    #[test]
    fn keys_identify_positions() {
        let a = Position::from_moves("4453").unwrap();
        let b = Position::from_moves("5344").unwrap();
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), Position::from_moves("4435").unwrap().key());
        assert_ne!(Position::new().key(), Position::from_moves("4").unwrap().key());
    }

    #[test]
    fn key3_is_mirror_symmetric() {
        let a = Position::from_moves("1123").unwrap();
        let b = Position::from_moves("7765").unwrap();
        assert_eq!(a.key3(), b.key3());
        assert_ne!(a.key3(), Position::from_moves("1132").unwrap().key3());
        assert_eq!(Position::new().key3(), 0);
        // one tile of the opponent in the centre column: 4 separators, a 2, 3 separators
        let centre = Position::from_moves("4").unwrap();
        assert_eq!(centre.key3(), 2 * 27);
    }

    #[test]
    fn move_score_counts_new_threats() {
        let position = Position::from_moves("4455").unwrap();
        let candidate = position.possible() & Position::column_mask(5);
        // playing column 6 makes a three with both ends open
        assert_eq!(position.move_score(candidate), 2);
    }
}
