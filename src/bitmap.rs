//! The indirect-block and data-block allocators.
//!
//! Both share the same discipline as the inode bitmap in [`crate::superblock`]: find
//! the first `'0'` flag, flip it to `'1'`, write the owning bitmap block back, and
//! return the physical block number the bit represents. Freeing is the converse.

use crate::block_table::BlockTable;
use crate::device::{zero_block, BlockDevice};
use crate::error::Result;
use crate::layout::{
    FLAG_FREE, FLAG_USED, IBLK_COUNT, IBLK_STRT, INDIR_DATA, MDATA_COUNT, MDATA_STRT,
};

/// Offset, within the indirect-bitmap block, of the double-indirect flag.
const DOUBLE_INDIRECT_FLAG_OFFSET: usize = IBLK_COUNT as usize;

/// Allocates a free indirect block, initializing it to an all-empty [`BlockTable`].
/// Returns `None` if the indirect pool is exhausted.
pub fn alloc_indirect(dev: &mut BlockDevice) -> Result<Option<u64>> {
    let mut flags = zero_block();
    dev.read_block(INDIR_DATA, &mut flags)?;

    let Some(i) = flags[..IBLK_COUNT as usize]
        .iter()
        .position(|&b| b == FLAG_FREE)
    else {
        return Ok(None);
    };
    flags[i] = FLAG_USED;
    dev.write_block(INDIR_DATA, &flags)?;

    let block = IBLK_STRT + i as u64;
    BlockTable::empty().write(dev, block)?;
    Ok(Some(block))
}

/// Frees indirect block `block`, allocated by a prior [`alloc_indirect`].
pub fn free_indirect(dev: &mut BlockDevice, block: u64) -> Result<()> {
    let mut flags = zero_block();
    dev.read_block(INDIR_DATA, &mut flags)?;
    let i = (block - IBLK_STRT) as usize;
    flags[i] = FLAG_FREE;
    dev.write_block(INDIR_DATA, &flags)?;
    Ok(())
}

/// Allocates the single double-indirect block, initializing it to an all-empty
/// [`BlockTable`]. Returns `None` if it is already in use.
pub fn alloc_double_indirect(dev: &mut BlockDevice) -> Result<Option<u64>> {
    let mut flags = zero_block();
    dev.read_block(INDIR_DATA, &mut flags)?;

    if flags[DOUBLE_INDIRECT_FLAG_OFFSET] == FLAG_USED {
        return Ok(None);
    }
    flags[DOUBLE_INDIRECT_FLAG_OFFSET] = FLAG_USED;
    dev.write_block(INDIR_DATA, &flags)?;

    BlockTable::empty().write(dev, crate::layout::DIBLK)?;
    Ok(Some(crate::layout::DIBLK))
}

/// Frees the double-indirect block.
pub fn free_double_indirect(dev: &mut BlockDevice) -> Result<()> {
    let mut flags = zero_block();
    dev.read_block(INDIR_DATA, &mut flags)?;
    flags[DOUBLE_INDIRECT_FLAG_OFFSET] = FLAG_FREE;
    dev.write_block(INDIR_DATA, &flags)?;
    Ok(())
}

/// Allocates a free data block. Returns `None` if the data bitmap is exhausted.
///
/// The physical block number for bitmap block `b`, flag index `i`, is always
/// `DISK_STRT + b * 512 + i` — the formula consistent with the invariant that each
/// bitmap block holds 512 flags (see `DESIGN.md` for the source's inconsistent
/// variant, not reproduced here).
pub fn alloc_data(dev: &mut BlockDevice) -> Result<Option<u64>> {
    for b in 0..MDATA_COUNT {
        let mut flags = zero_block();
        dev.read_block(MDATA_STRT + b, &mut flags)?;
        if let Some(i) = flags.iter().position(|&f| f == FLAG_FREE) {
            flags[i] = FLAG_USED;
            dev.write_block(MDATA_STRT + b, &flags)?;
            return Ok(Some(crate::layout::DISK_STRT + b * 512 + i as u64));
        }
    }
    Ok(None)
}

/// Frees data block `block`, allocated by a prior [`alloc_data`].
pub fn free_data(dev: &mut BlockDevice, block: u64) -> Result<()> {
    let offset = block - crate::layout::DISK_STRT;
    let b = offset / 512;
    let i = (offset % 512) as usize;
    let mut flags = zero_block();
    dev.read_block(MDATA_STRT + b, &mut flags)?;
    flags[i] = FLAG_FREE;
    dev.write_block(MDATA_STRT + b, &flags)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_table::BlockTable;
    use tempfile::NamedTempFile;

    fn dev() -> (NamedTempFile, BlockDevice) {
        let tmp = NamedTempFile::new().unwrap();
        let mut d = BlockDevice::open(tmp.path()).unwrap();
        // Allocators assume the bitmap blocks already exist and are zeroed/'0'-filled,
        // as `Volume::init` guarantees; tests set that up by hand.
        for b in 0..MDATA_COUNT {
            d.write_block(MDATA_STRT + b, &[FLAG_FREE; crate::layout::BLOCK_SIZE])
                .unwrap();
        }
        d.write_block(INDIR_DATA, &zero_block_filled_with_free())
            .unwrap();
        (tmp, d)
    }

    fn zero_block_filled_with_free() -> crate::device::Block {
        let mut b = [FLAG_FREE; crate::layout::BLOCK_SIZE];
        // Anything past the 193 meaningful flags is unused; leaving it '0' is harmless.
        b[..193].fill(FLAG_FREE);
        b
    }

    #[test]
    fn data_allocation_picks_first_free_and_sets_bit() {
        let (_tmp, mut d) = dev();
        let first = alloc_data(&mut d).unwrap().unwrap();
        assert_eq!(first, crate::layout::DISK_STRT);
        let second = alloc_data(&mut d).unwrap().unwrap();
        assert_eq!(second, crate::layout::DISK_STRT + 1);

        free_data(&mut d, first).unwrap();
        let third = alloc_data(&mut d).unwrap().unwrap();
        assert_eq!(third, crate::layout::DISK_STRT);
    }

    #[test]
    fn data_exhaustion_reports_none() {
        let (_tmp, mut d) = dev();
        for b in 0..MDATA_COUNT {
            d.write_block(MDATA_STRT + b, &[FLAG_USED; crate::layout::BLOCK_SIZE])
                .unwrap();
        }
        assert!(alloc_data(&mut d).unwrap().is_none());
    }

    #[test]
    fn indirect_allocation_initializes_table() {
        let (_tmp, mut d) = dev();
        let block = alloc_indirect(&mut d).unwrap().unwrap();
        assert_eq!(block, IBLK_STRT);
        let table = BlockTable::read(&mut d, block).unwrap();
        assert!(table.slots.iter().all(|&s| s == crate::layout::NO_BLOCK));

        free_indirect(&mut d, block).unwrap();
        let reused = alloc_indirect(&mut d).unwrap().unwrap();
        assert_eq!(reused, IBLK_STRT);
    }

    #[test]
    fn double_indirect_allocates_once() {
        let (_tmp, mut d) = dev();
        let first = alloc_double_indirect(&mut d).unwrap();
        assert_eq!(first, Some(crate::layout::DIBLK));
        assert!(alloc_double_indirect(&mut d).unwrap().is_none());

        free_double_indirect(&mut d).unwrap();
        assert_eq!(alloc_double_indirect(&mut d).unwrap(), Some(crate::layout::DIBLK));
    }
}
