//! On-disk region boundaries and capacities.
//!
//! The device is a flat sequence of [`BLOCK_SIZE`]-byte blocks, indexed `0..DISK_END`,
//! divided into the contiguous regions below. These numbers are part of the on-disk
//! format: changing them changes what volumes this crate can read.

/// Size of a single device block, in bytes.
pub const BLOCK_SIZE: usize = 512;

/// Magic value stored at the head of block 0 that identifies a valid volume.
pub const MAGIC: u32 = 987;

/// Number of inode slots in the inode table.
pub const NUM_NODES: u32 = 128;
/// First block of the inode table (one inode per block).
pub const NODE_STRT: u64 = 1;

/// Number of blocks in the indirect-block pool.
pub const IBLK_COUNT: u64 = 192;
/// First block of the indirect-block pool.
pub const IBLK_STRT: u64 = 129;

/// The single double-indirect block.
pub const DIBLK: u64 = 321;

/// Number of blocks making up the data-block bitmap.
pub const MDATA_COUNT: u64 = 56;
/// First block of the data-block bitmap.
pub const MDATA_STRT: u64 = 322;

/// The indirect-bitmap block: 192 flags for the indirect pool plus 1 flag for the
/// double-indirect block.
pub const INDIR_DATA: u64 = 378;

/// Number of data blocks available for file payload.
pub const DATA_BLOCK_COUNT: u64 = 28672;
/// First data block.
pub const DISK_STRT: u64 = 379;

/// One past the last usable block on the device.
pub const DISK_END: u64 = DISK_STRT + DATA_BLOCK_COUNT;

/// Number of flag bytes packed into a single data-block bitmap block.
pub const FLAGS_PER_BITMAP_BLOCK: usize = BLOCK_SIZE;

/// Number of direct block pointers stored in an inode.
pub const DIRECT_COUNT: usize = 32;
/// Number of single-indirect table pointers stored in an inode.
pub const SINGLE_INDIRECT_TABLES: usize = 64;
/// Number of pointer slots in one indirect table (and in the double-indirect table).
pub const TABLE_SLOTS: usize = 128;

/// Logical block index at which the single-indirect range begins (right after direct).
pub const SINGLE_INDIRECT_START: u64 = DIRECT_COUNT as u64;
/// Logical block index at which the double-indirect range begins.
pub const DOUBLE_INDIRECT_START: u64 =
    SINGLE_INDIRECT_START + (SINGLE_INDIRECT_TABLES * TABLE_SLOTS) as u64;
/// One past the last addressable logical block index.
pub const MAX_LOGICAL_BLOCK: u64 = DOUBLE_INDIRECT_START + (TABLE_SLOTS * TABLE_SLOTS) as u64;

/// Byte-flag value meaning "free".
pub const FLAG_FREE: u8 = b'0';
/// Byte-flag value meaning "in use".
pub const FLAG_USED: u8 = b'1';

/// Sentinel stored in an unused pointer slot.
pub const NO_BLOCK: i32 = -1;

/// Maximum length of a stored file name, not counting the terminating NUL.
pub const MAX_NAME_LEN: usize = 49;
/// Size in bytes of the name field in an inode (`MAX_NAME_LEN` bytes plus NUL).
pub const NAME_FIELD_LEN: usize = MAX_NAME_LEN + 1;
