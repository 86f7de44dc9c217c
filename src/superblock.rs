//! The superblock: volume magic, file count, and the inode bitmap.

use std::{mem, slice};

use log::info;

use crate::device::{zero_block, Block, BlockDevice};
use crate::error::{Result, SfsError};
use crate::layout::{FLAG_FREE, FLAG_USED, INDIR_DATA, MAGIC, MDATA_COUNT, MDATA_STRT, NUM_NODES};

/// On-disk layout of block 0.
///
/// Kept well under [`crate::layout::BLOCK_SIZE`]; the remainder of the block is unused
/// padding, left zeroed.
#[repr(C, packed)]
struct RawSuperblock {
    magic: u32,
    file_count: u32,
    inode_bitmap: [u8; NUM_NODES as usize],
    /// Timestamp the volume was created at, used to populate `getattr("/")` when no
    /// other root timestamp is available.
    root_time: i64,
}

/// In-memory view of the superblock, kept in sync with block 0 on every mutation.
pub struct Superblock {
    pub file_count: u32,
    pub inode_bitmap: [u8; NUM_NODES as usize],
    pub root_time: i64,
}

impl Superblock {
    fn fresh(now: i64) -> Self {
        Self {
            file_count: 0,
            inode_bitmap: [FLAG_FREE; NUM_NODES as usize],
            root_time: now,
        }
    }

    fn from_raw(raw: &RawSuperblock) -> Result<Self> {
        if raw.magic != MAGIC {
            return Err(SfsError::InvalidVolume);
        }
        Ok(Self {
            file_count: raw.file_count,
            inode_bitmap: raw.inode_bitmap,
            root_time: raw.root_time,
        })
    }

    fn to_block(&self) -> Block {
        let raw = RawSuperblock {
            magic: MAGIC,
            file_count: self.file_count,
            inode_bitmap: self.inode_bitmap,
            root_time: self.root_time,
        };
        let mut block = zero_block();
        let src = unsafe {
            slice::from_raw_parts(&raw as *const _ as *const u8, mem::size_of::<RawSuperblock>())
        };
        block[..src.len()].copy_from_slice(src);
        block
    }

    /// Loads the superblock from block 0, or initializes a fresh one (and writes it
    /// back) if the backing file was shorter than one block.
    pub fn load_or_init(dev: &mut BlockDevice, now: i64) -> Result<Self> {
        match dev.try_read_block0()? {
            Some(block) => {
                let raw = unsafe { &*(block.as_ptr() as *const RawSuperblock) };
                Self::from_raw(raw)
            }
            None => {
                info!("backing file shorter than one block, initializing a fresh volume");
                let sb = Self::fresh(now);
                sb.write(dev)?;
                init_allocator_bitmaps(dev)?;
                Ok(sb)
            }
        }
    }

    /// Writes the superblock back to block 0.
    pub fn write(&self, dev: &mut BlockDevice) -> Result<()> {
        dev.write_block(0, &self.to_block())?;
        Ok(())
    }

    /// Returns whether `index` (0-based inode slot) is allocated.
    pub fn is_allocated(&self, index: usize) -> bool {
        self.inode_bitmap[index] == FLAG_USED
    }

    /// Finds the first free inode slot, without marking it used.
    pub fn find_free_inode(&self) -> Option<usize> {
        self.inode_bitmap.iter().position(|&b| b == FLAG_FREE)
    }

    /// Marks inode slot `index` as allocated and bumps the file count.
    pub fn alloc_inode(&mut self, index: usize) {
        self.inode_bitmap[index] = FLAG_USED;
        self.file_count += 1;
    }

    /// Marks inode slot `index` as free and decrements the file count.
    pub fn free_inode(&mut self, index: usize) {
        self.inode_bitmap[index] = FLAG_FREE;
        self.file_count -= 1;
    }

    /// Iterator over the indices of all allocated inode slots, in slot order.
    pub fn allocated_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.inode_bitmap
            .iter()
            .enumerate()
            .filter(|(_, &b)| b == FLAG_USED)
            .map(|(i, _)| i)
    }
}

/// Writes all-[`FLAG_FREE`] blocks to the data-block bitmap (`MDATA_STRT` ..
/// `MDATA_STRT + MDATA_COUNT`) and the indirect-bitmap block (`INDIR_DATA`), as
/// required on first mount (spec §4.11). Without this, a brand-new backing file is
/// shorter than those regions and the first real allocation seeks past end-of-file.
fn init_allocator_bitmaps(dev: &mut BlockDevice) -> Result<()> {
    let free_block = [FLAG_FREE; crate::layout::BLOCK_SIZE];
    for b in 0..MDATA_COUNT {
        dev.write_block(MDATA_STRT + b, &free_block)?;
    }
    dev.write_block(INDIR_DATA, &free_block)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn fresh_volume_has_no_files() {
        let tmp = NamedTempFile::new().unwrap();
        let mut dev = BlockDevice::open(tmp.path()).unwrap();
        let sb = Superblock::load_or_init(&mut dev, 1_700_000_000).unwrap();
        assert_eq!(sb.file_count, 0);
        assert!(sb.inode_bitmap.iter().all(|&b| b == FLAG_FREE));
    }

    #[test]
    fn remount_preserves_state() {
        let tmp = NamedTempFile::new().unwrap();
        {
            let mut dev = BlockDevice::open(tmp.path()).unwrap();
            let mut sb = Superblock::load_or_init(&mut dev, 1).unwrap();
            sb.alloc_inode(0);
            sb.write(&mut dev).unwrap();
        }
        let mut dev = BlockDevice::open(tmp.path()).unwrap();
        let sb = Superblock::load_or_init(&mut dev, 2).unwrap();
        assert_eq!(sb.file_count, 1);
        assert!(sb.is_allocated(0));
    }

    #[test]
    fn bad_magic_is_invalid_volume() {
        let tmp = NamedTempFile::new().unwrap();
        let mut dev = BlockDevice::open(tmp.path()).unwrap();
        dev.write_block(0, &zero_block()).unwrap();
        let err = Superblock::load_or_init(&mut dev, 1).unwrap_err();
        assert!(matches!(err, SfsError::InvalidVolume));
    }
}
