//! Precomputed scores of early positions
//!
//! # File format
//! All values are little-endian.
//!
//! | bytes                      | content                                      |
//! |----------------------------|----------------------------------------------|
//! | 1                          | board width                                  |
//! | 1                          | board height                                 |
//! | 1                          | maximum number of moves of stored positions  |
//! | 1                          | partial key size in bytes (1, 2 or 4)        |
//! | 1                          | value size in bytes (always 1)               |
//! | 1                          | base 2 log of the table size                 |
//! | `size * partial key bytes` | partial keys                                 |
//! | `size`                     | values                                       |
//!
//! where `size` is the smallest prime not below `2^log_size`.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::info;
use thiserror::Error;

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::{next_prime, position::Position, HEIGHT, MAX_SCORE, MIN_SCORE, WIDTH};

/// Largest table size accepted when reading a book
pub const MAX_LOG_SIZE: u8 = 32;

#[derive(Error, Debug)]
pub enum BookError {
    #[error("opening book is truncated")]
    Truncated,
    #[error("could not access opening book: {0}")]
    Io(#[from] io::Error),
    #[error(
        "opening book is for a {width}x{height} board with {value_bytes} byte values, expected {}x{} with 1 byte values",
        WIDTH,
        HEIGHT
    )]
    HeaderMismatch {
        width: u8,
        height: u8,
        value_bytes: u8,
    },
    #[error("unsupported partial key size of {0} bytes")]
    UnsupportedKeyBytes(u8),
    #[error("unsupported table size of 2^{0} entries")]
    UnsupportedLogSize(u8),
}

// a short read means the file is cut off, not that the disk failed
fn read_error(err: io::Error) -> BookError {
    match err.kind() {
        io::ErrorKind::UnexpectedEof => BookError::Truncated,
        _ => BookError::Io(err),
    }
}

/// Partial keys, stored at the width declared in the book header
#[derive(Clone, Debug, PartialEq, Eq)]
enum PartialKeys {
    Narrow(Vec<u8>),
    Half(Vec<u16>),
    Wide(Vec<u32>),
}

impl PartialKeys {
    fn with_size(bytes: u8, size: usize) -> Result<Self, BookError> {
        match bytes {
            1 => Ok(PartialKeys::Narrow(vec![0; size])),
            2 => Ok(PartialKeys::Half(vec![0; size])),
            4 => Ok(PartialKeys::Wide(vec![0; size])),
            _ => Err(BookError::UnsupportedKeyBytes(bytes)),
        }
    }

    fn bytes(&self) -> u8 {
        match self {
            PartialKeys::Narrow(_) => 1,
            PartialKeys::Half(_) => 2,
            PartialKeys::Wide(_) => 4,
        }
    }

    fn truncate(&self, key: u64) -> u64 {
        match self {
            PartialKeys::Narrow(_) => key & 0xff,
            PartialKeys::Half(_) => key & 0xffff,
            PartialKeys::Wide(_) => key & 0xffff_ffff,
        }
    }

    fn get(&self, index: usize) -> u64 {
        match self {
            PartialKeys::Narrow(keys) => keys[index] as u64,
            PartialKeys::Half(keys) => keys[index] as u64,
            PartialKeys::Wide(keys) => keys[index] as u64,
        }
    }

    fn set(&mut self, index: usize, key: u64) {
        match self {
            PartialKeys::Narrow(keys) => keys[index] = key as u8,
            PartialKeys::Half(keys) => keys[index] = key as u16,
            PartialKeys::Wide(keys) => keys[index] = key as u32,
        }
    }

    fn read_from<R: Read>(&mut self, reader: &mut R) -> io::Result<()> {
        match self {
            PartialKeys::Narrow(keys) => reader.read_exact(keys),
            PartialKeys::Half(keys) => reader.read_u16_into::<LittleEndian>(keys),
            PartialKeys::Wide(keys) => reader.read_u32_into::<LittleEndian>(keys),
        }
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            PartialKeys::Narrow(keys) => writer.write_all(keys)?,
            PartialKeys::Half(keys) => {
                for &key in keys.iter() {
                    writer.write_u16::<LittleEndian>(key)?;
                }
            }
            PartialKeys::Wide(keys) => {
                for &key in keys.iter() {
                    writer.write_u32::<LittleEndian>(key)?;
                }
            }
        }
        Ok(())
    }
}

/// A table of exact scores for positions up to a given number of moves
///
/// Positions are addressed by their base 3 key modulo a prime table size,
/// and only the low bytes of the key are stored to check a slot. Values
/// encode a score `s` as `s - MIN_SCORE + 1`, 0 meaning no entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpeningBook {
    depth: u8,
    log_size: u8,
    partial_keys: PartialKeys,
    values: Vec<u8>,
}

impl OpeningBook {
    /// Creates an empty book for positions of at most `depth` moves
    pub fn new(depth: u8, partial_key_bytes: u8, log_size: u8) -> Result<Self, BookError> {
        if log_size > MAX_LOG_SIZE {
            return Err(BookError::UnsupportedLogSize(log_size));
        }
        let size = next_prime(1 << log_size) as usize;
        Ok(Self {
            depth,
            log_size,
            partial_keys: PartialKeys::with_size(partial_key_bytes, size)?,
            values: vec![0; size],
        })
    }

    /// Loads a book from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, BookError> {
        let mut file = BufReader::new(File::open(path.as_ref())?);
        let book = Self::read_from(&mut file)?;
        info!(
            "loaded opening book {} (depth {}, {} entries)",
            path.as_ref().display(),
            book.depth,
            book.size()
        );
        Ok(book)
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, BookError> {
        let mut header = [0; 6];
        reader.read_exact(&mut header).map_err(read_error)?;
        let [width, height, depth, partial_key_bytes, value_bytes, log_size] = header;

        if width as usize != WIDTH || height as usize != HEIGHT || value_bytes != 1 {
            return Err(BookError::HeaderMismatch {
                width,
                height,
                value_bytes,
            });
        }

        let mut book = Self::new(depth, partial_key_bytes, log_size)?;
        book.partial_keys.read_from(reader).map_err(read_error)?;
        reader.read_exact(&mut book.values).map_err(read_error)?;
        Ok(book)
    }

    /// Writes the book to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), BookError> {
        let mut file = BufWriter::new(File::create(path)?);
        self.write_to(&mut file)?;
        file.flush()?;
        Ok(())
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), BookError> {
        writer.write_u8(WIDTH as u8)?;
        writer.write_u8(HEIGHT as u8)?;
        writer.write_u8(self.depth)?;
        writer.write_u8(self.partial_keys.bytes())?;
        writer.write_u8(1)?;
        writer.write_u8(self.log_size)?;
        self.partial_keys.write_to(writer)?;
        writer.write_all(&self.values)?;
        Ok(())
    }

    /// Maximum number of moves of the positions in the book
    pub fn depth(&self) -> usize {
        self.depth as usize
    }

    /// Number of slots in the book
    pub fn size(&self) -> usize {
        self.values.len()
    }

    pub fn partial_key_bytes(&self) -> u8 {
        self.partial_keys.bytes()
    }

    fn index(&self, key: u64) -> usize {
        (key % self.values.len() as u64) as usize
    }

    /// Returns the encoded score of a position, or 0 if it is not in the book
    pub fn get(&self, position: &Position) -> u8 {
        if position.num_moves() > self.depth as usize || self.values.is_empty() {
            return 0;
        }
        let key = position.key3();
        let index = self.index(key);
        if self.partial_keys.get(index) == self.partial_keys.truncate(key) {
            self.values[index]
        } else {
            0
        }
    }

    /// Stores the exact score of a position, replacing any entry in its slot
    pub fn insert(&mut self, position: &Position, score: i32) {
        debug_assert!((MIN_SCORE..=MAX_SCORE).contains(&score));
        debug_assert!(position.num_moves() <= self.depth as usize);
        let key = position.key3();
        let index = self.index(key);
        let partial_key = self.partial_keys.truncate(key);
        self.partial_keys.set(index, partial_key);
        self.values[index] = (score - MIN_SCORE + 1) as u8;
    }
}
