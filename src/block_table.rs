//! Shared encoding for indirect blocks and the double-indirect block: both are just a
//! table of [`TABLE_SLOTS`] 32-bit pointers, either to data blocks or to indirect
//! blocks.

use crate::device::{zero_block, Block, BlockDevice};
use crate::error::Result;
use crate::layout::{NO_BLOCK, TABLE_SLOTS};

/// A table of `TABLE_SLOTS` pointers, as stored in one indirect block or the
/// double-indirect block.
pub struct BlockTable {
    pub slots: [i32; TABLE_SLOTS],
}

impl BlockTable {
    /// A freshly allocated table: every slot set to [`NO_BLOCK`].
    pub fn empty() -> Self {
        Self {
            slots: [NO_BLOCK; TABLE_SLOTS],
        }
    }

    fn to_block(&self) -> Block {
        let mut block = zero_block();
        for (i, &slot) in self.slots.iter().enumerate() {
            block[i * 4..i * 4 + 4].copy_from_slice(&slot.to_ne_bytes());
        }
        block
    }

    fn from_block(block: &Block) -> Self {
        let mut slots = [NO_BLOCK; TABLE_SLOTS];
        for (i, slot) in slots.iter_mut().enumerate() {
            let bytes = [
                block[i * 4],
                block[i * 4 + 1],
                block[i * 4 + 2],
                block[i * 4 + 3],
            ];
            *slot = i32::from_ne_bytes(bytes);
        }
        Self { slots }
    }

    /// Reads the table stored at physical block `at`.
    pub fn read(dev: &mut BlockDevice, at: u64) -> Result<Self> {
        let mut block = zero_block();
        dev.read_block(at, &mut block)?;
        Ok(Self::from_block(&block))
    }

    /// Writes this table to physical block `at`.
    pub fn write(&self, dev: &mut BlockDevice, at: u64) -> Result<()> {
        dev.write_block(at, &self.to_block())?;
        Ok(())
    }
}
