//! The inode: per-file metadata and block pointers.

use std::ffi::CStr;
use std::{mem, slice};

use crate::device::{zero_block, Block, BlockDevice};
use crate::error::Result;
use crate::layout::{
    DIRECT_COUNT, NAME_FIELD_LEN, NODE_STRT, NO_BLOCK, SINGLE_INDIRECT_TABLES,
};

/// On-disk layout of one inode, stored one per block starting at [`NODE_STRT`].
#[repr(C, packed)]
struct RawInode {
    index: u32,
    mode: u32,
    link_count: u32,
    size: u64,
    atime: i64,
    mtime: i64,
    ctime: i64,
    direct: [i32; DIRECT_COUNT],
    single_indirect: [i32; SINGLE_INDIRECT_TABLES],
    double_indirect: i32,
    name: [u8; NAME_FIELD_LEN],
    /// Scratch field, mirroring the source's per-inode file-handle slot. Unused: the
    /// core keeps no open-file state (see `open`/`release`).
    fh: i32,
}

/// In-memory view of an inode.
#[derive(Clone)]
pub struct Inode {
    /// 0-based slot in the inode table (`physical block == slot + NODE_STRT`).
    pub slot: usize,
    pub mode: u32,
    pub link_count: u32,
    pub size: u64,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
    pub direct: [i32; DIRECT_COUNT],
    pub single_indirect: [i32; SINGLE_INDIRECT_TABLES],
    pub double_indirect: i32,
    pub name: String,
}

/// Mode bits for a regular file, full rwx for user/group/other (no permission
/// enforcement is performed, see the Non-goals).
pub const REGULAR_FILE_MODE: u32 = libc::S_IFREG | 0o777;
/// Mode bits synthesized for the single root directory.
pub const ROOT_DIR_MODE: u32 = libc::S_IFDIR | 0o777;

impl Inode {
    /// Builds a freshly-allocated inode for `name` in slot `slot`.
    pub fn new(slot: usize, name: &str, now: i64) -> Self {
        Self {
            slot,
            mode: REGULAR_FILE_MODE,
            link_count: 1,
            size: 0,
            atime: now,
            mtime: now,
            ctime: now,
            direct: [NO_BLOCK; DIRECT_COUNT],
            single_indirect: [NO_BLOCK; SINGLE_INDIRECT_TABLES],
            double_indirect: NO_BLOCK,
            name: name.to_owned(),
        }
    }

    /// Physical block holding this inode.
    pub fn block_number(&self) -> u64 {
        NODE_STRT + self.slot as u64
    }

    /// Reads the inode stored in table slot `slot`.
    pub fn read(dev: &mut BlockDevice, slot: usize) -> Result<Self> {
        let mut block = zero_block();
        dev.read_block(NODE_STRT + slot as u64, &mut block)?;
        Ok(Self::from_block(slot, &block))
    }

    /// Writes this inode back to its table slot.
    pub fn write(&self, dev: &mut BlockDevice) -> Result<()> {
        dev.write_block(self.block_number(), &self.to_block())?;
        Ok(())
    }

    fn from_block(slot: usize, block: &Block) -> Self {
        let raw = unsafe { &*(block.as_ptr() as *const RawInode) };
        let name_bytes = raw.name;
        let name = CStr::from_bytes_until_nul(&name_bytes)
            .map(|c| c.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            slot,
            mode: raw.mode,
            link_count: raw.link_count,
            size: raw.size,
            atime: raw.atime,
            mtime: raw.mtime,
            ctime: raw.ctime,
            direct: raw.direct,
            single_indirect: raw.single_indirect,
            double_indirect: raw.double_indirect,
            name,
        }
    }

    fn to_block(&self) -> Block {
        let mut name = [0u8; NAME_FIELD_LEN];
        let bytes = self.name.as_bytes();
        let len = bytes.len().min(NAME_FIELD_LEN - 1);
        name[..len].copy_from_slice(&bytes[..len]);

        let raw = RawInode {
            index: self.slot as u32,
            mode: self.mode,
            link_count: self.link_count,
            size: self.size,
            atime: self.atime,
            mtime: self.mtime,
            ctime: self.ctime,
            direct: self.direct,
            single_indirect: self.single_indirect,
            double_indirect: self.double_indirect,
            name,
            fh: 0,
        };
        let mut block = zero_block();
        let src = unsafe {
            slice::from_raw_parts(&raw as *const _ as *const u8, mem::size_of::<RawInode>())
        };
        block[..src.len()].copy_from_slice(src);
        block
    }

    /// Number of 512-byte blocks reported by `getattr`, i.e. `ceil(size / BLOCK_SIZE)`.
    pub fn block_count(&self) -> u64 {
        let block_size = crate::layout::BLOCK_SIZE as u64;
        (self.size + block_size - 1) / block_size
    }
}
