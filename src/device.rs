//! The block device adapter: fixed-size block I/O on the backing file.

use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::layout::BLOCK_SIZE;

/// A single device block.
pub type Block = [u8; BLOCK_SIZE];

/// Returns a zeroed block.
pub fn zero_block() -> Block {
    [0u8; BLOCK_SIZE]
}

/// Thin adapter treating the backing file as a linear array of `BLOCK_SIZE`-byte blocks.
///
/// No caching, no write-behind: every `write_block` is a `write_all` followed by nothing
/// else, so a crash leaves at most the in-flight block torn (see the crash-consistency
/// non-goal).
pub struct BlockDevice {
    file: File,
}

impl BlockDevice {
    /// Opens (creating if necessary) the backing file at `path`.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(Self { file })
    }

    fn seek_to(&mut self, index: u64) -> io::Result<()> {
        self.file
            .seek(SeekFrom::Start(index * BLOCK_SIZE as u64))?;
        Ok(())
    }

    /// Reads block `index` into `buf`.
    pub fn read_block(&mut self, index: u64, buf: &mut Block) -> io::Result<()> {
        self.seek_to(index)?;
        self.file.read_exact(buf)
    }

    /// Writes `buf` to block `index`.
    pub fn write_block(&mut self, index: u64, buf: &Block) -> io::Result<()> {
        self.seek_to(index)?;
        self.file.write_all(buf)
    }

    /// Attempts to read block 0. Returns `Ok(None)` when the backing file is shorter
    /// than one block (a fresh volume), `Ok(Some(buf))` on a successful read, and
    /// `Err` on any other I/O failure.
    pub fn try_read_block0(&mut self) -> io::Result<Option<Block>> {
        let mut buf = zero_block();
        match self.read_block(0, &mut buf) {
            Ok(()) => Ok(Some(buf)),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e),
        }
    }
}
