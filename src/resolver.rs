//! Maps a logical block index within a file to a physical data-block number,
//! allocating along the way in write mode.

use crate::bitmap;
use crate::block_table::BlockTable;
use crate::device::BlockDevice;
use crate::error::{Result, SfsError};
use crate::inode::Inode;
use crate::layout::{
    DOUBLE_INDIRECT_START, MAX_LOGICAL_BLOCK, NO_BLOCK, SINGLE_INDIRECT_START, TABLE_SLOTS,
};

/// Resolves logical block `l` of `inode` to a physical data-block number.
///
/// In read mode (`writing == false`) a `-1` pointer anywhere on the path is a hole:
/// the function returns `Ok(None)` rather than an error. In write mode, every missing
/// pointer on the path is allocated in order (data-block bitmap for the leaf,
/// indirect-bitmap for missing intermediate tables, the double-indirect flag if
/// needed); a newly linked intermediate table is written back immediately. The
/// inode's own pointer fields are updated in place — it is the caller's
/// responsibility to persist `inode` afterwards, including on the `NoSpace` path,
/// since partial allocations are never rolled back.
pub fn resolve(
    dev: &mut BlockDevice,
    inode: &mut Inode,
    l: u64,
    writing: bool,
) -> Result<Option<u64>> {
    if l < crate::layout::DIRECT_COUNT as u64 {
        resolve_direct(dev, inode, l as usize, writing)
    } else if l < DOUBLE_INDIRECT_START {
        resolve_single_indirect(dev, inode, l, writing)
    } else if l < MAX_LOGICAL_BLOCK {
        resolve_double_indirect(dev, inode, l, writing)
    } else if writing {
        Err(SfsError::NoSpace)
    } else {
        Ok(None)
    }
}

fn resolve_direct(
    dev: &mut BlockDevice,
    inode: &mut Inode,
    idx: usize,
    writing: bool,
) -> Result<Option<u64>> {
    let existing = inode.direct[idx];
    if existing != NO_BLOCK {
        return Ok(Some(existing as u64));
    }
    if !writing {
        return Ok(None);
    }
    let block = bitmap::alloc_data(dev)?.ok_or(SfsError::NoSpace)?;
    inode.direct[idx] = block as i32;
    Ok(Some(block))
}

fn resolve_single_indirect(
    dev: &mut BlockDevice,
    inode: &mut Inode,
    l: u64,
    writing: bool,
) -> Result<Option<u64>> {
    let idx = l - SINGLE_INDIRECT_START;
    let table_idx = (idx / TABLE_SLOTS as u64) as usize;
    let slot_idx = (idx % TABLE_SLOTS as u64) as usize;

    let mut table_block = inode.single_indirect[table_idx];
    if table_block == NO_BLOCK {
        if !writing {
            return Ok(None);
        }
        let block = bitmap::alloc_indirect(dev)?.ok_or(SfsError::NoSpace)?;
        inode.single_indirect[table_idx] = block as i32;
        table_block = block as i32;
    }

    let mut table = BlockTable::read(dev, table_block as u64)?;
    let existing = table.slots[slot_idx];
    if existing != NO_BLOCK {
        return Ok(Some(existing as u64));
    }
    if !writing {
        return Ok(None);
    }
    let data_block = bitmap::alloc_data(dev)?.ok_or(SfsError::NoSpace)?;
    table.slots[slot_idx] = data_block as i32;
    table.write(dev, table_block as u64)?;
    Ok(Some(data_block))
}

fn resolve_double_indirect(
    dev: &mut BlockDevice,
    inode: &mut Inode,
    l: u64,
    writing: bool,
) -> Result<Option<u64>> {
    let idx = l - DOUBLE_INDIRECT_START;
    let outer_idx = (idx / TABLE_SLOTS as u64) as usize;
    let inner_idx = (idx % TABLE_SLOTS as u64) as usize;

    let mut dindirect = inode.double_indirect;
    if dindirect == NO_BLOCK {
        if !writing {
            return Ok(None);
        }
        let block = bitmap::alloc_double_indirect(dev)?.ok_or(SfsError::NoSpace)?;
        inode.double_indirect = block as i32;
        dindirect = block as i32;
    }

    let mut outer = BlockTable::read(dev, dindirect as u64)?;
    let mut inner_block = outer.slots[outer_idx];
    if inner_block == NO_BLOCK {
        if !writing {
            return Ok(None);
        }
        let block = bitmap::alloc_indirect(dev)?.ok_or(SfsError::NoSpace)?;
        outer.slots[outer_idx] = block as i32;
        outer.write(dev, dindirect as u64)?;
        inner_block = block as i32;
    }

    let mut inner = BlockTable::read(dev, inner_block as u64)?;
    let existing = inner.slots[inner_idx];
    if existing != NO_BLOCK {
        return Ok(Some(existing as u64));
    }
    if !writing {
        return Ok(None);
    }
    let data_block = bitmap::alloc_data(dev)?.ok_or(SfsError::NoSpace)?;
    inner.slots[inner_idx] = data_block as i32;
    inner.write(dev, inner_block as u64)?;
    Ok(Some(data_block))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{DIRECT_COUNT, FLAG_FREE, INDIR_DATA, MDATA_COUNT, MDATA_STRT};
    use tempfile::NamedTempFile;

    fn fresh_dev() -> (NamedTempFile, BlockDevice) {
        let tmp = NamedTempFile::new().unwrap();
        let mut d = BlockDevice::open(tmp.path()).unwrap();
        for b in 0..MDATA_COUNT {
            d.write_block(MDATA_STRT + b, &[FLAG_FREE; crate::layout::BLOCK_SIZE])
                .unwrap();
        }
        d.write_block(INDIR_DATA, &[FLAG_FREE; crate::layout::BLOCK_SIZE])
            .unwrap();
        (tmp, d)
    }

    #[test]
    fn read_of_unallocated_direct_block_is_a_hole() {
        let (_tmp, mut d) = fresh_dev();
        let mut node = Inode::new(0, "f", 0);
        assert_eq!(resolve(&mut d, &mut node, 0, false).unwrap(), None);
    }

    #[test]
    fn write_allocates_direct_block_once() {
        let (_tmp, mut d) = fresh_dev();
        let mut node = Inode::new(0, "f", 0);
        let first = resolve(&mut d, &mut node, 0, true).unwrap().unwrap();
        let again = resolve(&mut d, &mut node, 0, true).unwrap().unwrap();
        assert_eq!(first, again);
        assert_eq!(node.direct[0], first as i32);
    }

    #[test]
    fn first_single_indirect_block_allocates_table_and_data() {
        let (_tmp, mut d) = fresh_dev();
        let mut node = Inode::new(0, "f", 0);
        let l = DIRECT_COUNT as u64; // first logical block past direct range
        let block = resolve(&mut d, &mut node, l, true).unwrap().unwrap();
        assert_ne!(node.single_indirect[0], NO_BLOCK);
        assert_eq!(block, crate::layout::DISK_STRT);
    }

    #[test]
    fn double_indirect_boundary_is_first_block_past_single_indirect() {
        let (_tmp, mut d) = fresh_dev();
        let mut node = Inode::new(0, "f", 0);
        let boundary = DOUBLE_INDIRECT_START;
        let block = resolve(&mut d, &mut node, boundary, true).unwrap();
        assert!(block.is_some());
        assert_ne!(node.double_indirect, NO_BLOCK);
    }

    #[test]
    fn beyond_capacity_write_is_no_space() {
        let (_tmp, mut d) = fresh_dev();
        let mut node = Inode::new(0, "f", 0);
        let err = resolve(&mut d, &mut node, MAX_LOGICAL_BLOCK, true).unwrap_err();
        assert!(matches!(err, SfsError::NoSpace));
    }

    #[test]
    fn beyond_capacity_read_is_a_hole_not_an_error() {
        let (_tmp, mut d) = fresh_dev();
        let mut node = Inode::new(0, "f", 0);
        assert_eq!(resolve(&mut d, &mut node, MAX_LOGICAL_BLOCK, false).unwrap(), None);
    }
}
