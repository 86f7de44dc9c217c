//! The request handlers: thin glue tying the inode table, the bitmap allocators and
//! the read/write engine to a single open volume.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};

use crate::bitmap;
use crate::block_table::BlockTable;
use crate::device::BlockDevice;
use crate::error::{Result, SfsError};
use crate::inode::{Inode, ROOT_DIR_MODE};
use crate::layout::{MAX_NAME_LEN, NO_BLOCK};
use crate::rw;
use crate::superblock::Superblock;

/// Attributes a handler reports back for either the synthesized root directory or a
/// regular file. The FUSE binding translates this into whatever `stat`-shaped type its
/// host framework wants.
pub struct Attr {
    pub ino: u64,
    pub is_dir: bool,
    pub mode: u32,
    pub size: u64,
    pub blocks: u64,
    pub nlink: u32,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
}

/// Current wall-clock time, seconds since the epoch.
pub fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Strips the leading `/` from a FUSE path, since names are stored without it. This
/// reimplementation only ever sees single-component paths (the flat namespace, see
/// `DESIGN.md`), so no further splitting is needed.
fn leaf_name(path: &str) -> &str {
    path.strip_prefix('/').unwrap_or(path)
}

/// FUSE inode number of the synthesized root directory. File inode numbers are
/// `slot + 2`, so they never collide with it (slot is 0-based).
pub const ROOT_INO: u64 = 1;

/// An open volume: the backing device plus its in-memory superblock.
pub struct Volume {
    dev: BlockDevice,
    superblock: Superblock,
}

impl Volume {
    /// Opens `path` as a volume, initializing a fresh one if the file is new or too
    /// short, or failing with [`SfsError::InvalidVolume`] if it exists but carries the
    /// wrong magic.
    pub fn open(path: &Path) -> Result<Self> {
        let mut dev = BlockDevice::open(path)?;
        let superblock = Superblock::load_or_init(&mut dev, now())?;
        Ok(Self { dev, superblock })
    }

    /// Closes the volume. Every mutation has already been written through, so there is
    /// nothing left to flush.
    pub fn destroy(self) {
        info!("unmounting, {} file(s) in use", self.superblock.file_count);
    }

    fn find_by_name(&mut self, name: &str) -> Result<Option<Inode>> {
        for slot in self.superblock.allocated_slots().collect::<Vec<_>>() {
            let inode = Inode::read(&mut self.dev, slot)?;
            if inode.name == name {
                return Ok(Some(inode));
            }
        }
        Ok(None)
    }

    fn attr_of(inode: &Inode) -> Attr {
        Attr {
            ino: inode.slot as u64 + 2,
            is_dir: false,
            mode: inode.mode,
            size: inode.size,
            blocks: inode.block_count(),
            nlink: inode.link_count,
            atime: inode.atime,
            mtime: inode.mtime,
            ctime: inode.ctime,
        }
    }

    /// `getattr`: synthesizes the root directory for `/`, otherwise looks up the named
    /// file.
    pub fn getattr(&mut self, path: &str) -> Result<Attr> {
        if path == "/" {
            return Ok(Attr {
                ino: ROOT_INO,
                is_dir: true,
                mode: ROOT_DIR_MODE,
                size: 0,
                blocks: 0,
                nlink: 1,
                atime: self.superblock.root_time,
                mtime: self.superblock.root_time,
                ctime: self.superblock.root_time,
            });
        }
        let inode = self
            .find_by_name(leaf_name(path))?
            .ok_or(SfsError::NotFound)?;
        Ok(Self::attr_of(&inode))
    }

    /// `create`: allocates a new, empty regular file.
    pub fn create(&mut self, path: &str) -> Result<Attr> {
        let name = leaf_name(path);
        if name.len() > MAX_NAME_LEN {
            return Err(SfsError::NameTooLong);
        }
        if self.find_by_name(name)?.is_some() {
            return Err(SfsError::Exists);
        }
        let slot = match self.superblock.find_free_inode() {
            Some(slot) => slot,
            None => {
                warn!("create({name}): inode table full");
                return Err(SfsError::NoSpace);
            }
        };

        let inode = Inode::new(slot, name, now());
        inode.write(&mut self.dev)?;
        self.superblock.alloc_inode(slot);
        self.superblock.write(&mut self.dev)?;
        debug!("created {name} in inode slot {slot}");
        Ok(Self::attr_of(&inode))
    }

    /// `unlink`: frees every block reachable from the inode, in leaf-to-root order,
    /// then the inode slot itself.
    pub fn unlink(&mut self, path: &str) -> Result<()> {
        let inode = self
            .find_by_name(leaf_name(path))?
            .ok_or(SfsError::NotFound)?;

        for &block in inode.direct.iter() {
            if block != NO_BLOCK {
                bitmap::free_data(&mut self.dev, block as u64)?;
            }
        }
        for &table_block in inode.single_indirect.iter() {
            if table_block != NO_BLOCK {
                self.free_indirect_table(table_block as u64)?;
            }
        }
        if inode.double_indirect != NO_BLOCK {
            let outer = BlockTable::read(&mut self.dev, inode.double_indirect as u64)?;
            for &table_block in outer.slots.iter() {
                if table_block != NO_BLOCK {
                    self.free_indirect_table(table_block as u64)?;
                }
            }
            bitmap::free_double_indirect(&mut self.dev)?;
        }

        self.superblock.free_inode(inode.slot);
        self.superblock.write(&mut self.dev)?;
        debug!("unlinked {} (slot {})", inode.name, inode.slot);
        Ok(())
    }

    fn free_indirect_table(&mut self, table_block: u64) -> Result<()> {
        let table = BlockTable::read(&mut self.dev, table_block)?;
        for &data_block in table.slots.iter() {
            if data_block != NO_BLOCK {
                bitmap::free_data(&mut self.dev, data_block as u64)?;
            }
        }
        bitmap::free_indirect(&mut self.dev, table_block)
    }

    /// `open`: no file-handle state is kept; this only verifies the file still exists.
    pub fn open(&mut self, path: &str) -> Result<()> {
        self.find_by_name(leaf_name(path))?
            .ok_or(SfsError::NotFound)?;
        Ok(())
    }

    /// `release`: a no-op, since `open` keeps no state to tear down.
    pub fn release(&mut self, _path: &str) -> Result<()> {
        Ok(())
    }

    /// `read`: copies up to `buf.len()` bytes of the named file's content starting at
    /// `offset`.
    pub fn read(&mut self, path: &str, buf: &mut [u8], offset: u64) -> Result<usize> {
        let mut inode = self
            .find_by_name(leaf_name(path))?
            .ok_or(SfsError::NotFound)?;
        rw::read(&mut self.dev, &mut inode, buf, offset, now())
    }

    /// `write`: writes `buf` into the named file's content starting at `offset`,
    /// allocating blocks as needed.
    pub fn write(&mut self, path: &str, buf: &[u8], offset: u64) -> Result<usize> {
        let mut inode = self
            .find_by_name(leaf_name(path))?
            .ok_or(SfsError::NotFound)?;
        let n = rw::write(&mut self.dev, &mut inode, buf, offset, now());
        if let Err(SfsError::NoSpace) = &n {
            warn!("write({path}): allocator exhausted, {} byte(s) committed", offset);
        }
        n
    }

    /// `readdir`: the names of every allocated inode, in inode-index order. Only `/`
    /// is a valid directory in this flat namespace.
    pub fn readdir(&mut self, path: &str) -> Result<Vec<String>> {
        if path != "/" {
            return Err(SfsError::NotFound);
        }
        let mut names = Vec::new();
        for slot in self.superblock.allocated_slots().collect::<Vec<_>>() {
            names.push(Inode::read(&mut self.dev, slot)?.name);
        }
        Ok(names)
    }
}
