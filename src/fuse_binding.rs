//! Wires `fuse_mt::FilesystemMT` callbacks onto the core [`Volume`] handlers.
//!
//! Every method here does the same four things: log the call, lock the volume, call
//! the matching handler, and translate the result into whatever shape `fuse_mt` wants,
//! turning an [`SfsError`] into its `errno` via [`SfsError::to_errno`].

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fuse_mt::{
    CallbackResult, DirectoryEntry, FileAttr, FileType, FilesystemMT, RequestInfo, ResultCreate,
    ResultEmpty, ResultEntry, ResultOpen, ResultReaddir, ResultSlice, ResultStatfs, ResultWrite,
    Statfs, Timespec,
};
use log::trace;

use crate::layout::BLOCK_SIZE;
use crate::volume::{Attr, Volume};

/// TTL handed back to the kernel on every entry/attr reply. Attributes never change
/// behind the kernel's back outside of requests it already knows about, so a short,
/// fixed TTL is enough.
const ATTR_TTL: Timespec = Timespec { sec: 1, nsec: 0 };

/// The `fuse_mt::FilesystemMT` adapter. Owns the core [`Volume`] behind a mutex:
/// `fuse_mt` may dispatch callbacks from more than one OS thread even though the core
/// itself assumes exclusive access for the duration of one request.
pub struct SfsFuse {
    volume: Mutex<Volume>,
}

impl SfsFuse {
    pub fn new(volume: Volume) -> Self {
        Self {
            volume: Mutex::new(volume),
        }
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn child_path(parent: &Path, name: &OsStr) -> String {
    format!(
        "{}/{}",
        path_str(parent).trim_end_matches('/'),
        name.to_string_lossy()
    )
}

fn timespec(secs: i64) -> Timespec {
    Timespec::new(secs.max(0), 0)
}

fn attr_to_fuse(attr: Attr) -> FileAttr {
    let kind = if attr.is_dir {
        FileType::Directory
    } else {
        FileType::RegularFile
    };
    FileAttr {
        ino: attr.ino,
        size: attr.size,
        blocks: attr.blocks,
        atime: timespec(attr.atime),
        mtime: timespec(attr.mtime),
        ctime: timespec(attr.ctime),
        crtime: timespec(attr.ctime),
        kind,
        perm: (attr.mode & 0o7777) as u16,
        nlink: attr.nlink,
        uid: unsafe { libc::getuid() },
        gid: unsafe { libc::getgid() },
        rdev: 0,
        flags: 0,
    }
}

impl FilesystemMT for SfsFuse {
    fn init(&self, _req: RequestInfo) -> ResultEmpty {
        trace!("init");
        Ok(())
    }

    fn destroy(&self) {
        trace!("destroy");
    }

    fn getattr(&self, _req: RequestInfo, path: &Path, _fh: Option<u64>) -> ResultEntry {
        let path = path_str(path);
        trace!("getattr({path})");
        self.volume
            .lock()
            .unwrap()
            .getattr(&path)
            .map(|attr| (ATTR_TTL, attr_to_fuse(attr)))
            .map_err(|e| e.to_errno())
    }

    fn create(
        &self,
        _req: RequestInfo,
        parent: &Path,
        name: &OsStr,
        _mode: u32,
        _flags: u32,
    ) -> ResultCreate {
        let path = child_path(parent, name);
        trace!("create({path})");
        self.volume
            .lock()
            .unwrap()
            .create(&path)
            .map(|attr| fuse_mt::CreatedEntry {
                ttl: ATTR_TTL,
                attr: attr_to_fuse(attr),
                fh: 0,
                flags: 0,
            })
            .map_err(|e| e.to_errno())
    }

    fn unlink(&self, _req: RequestInfo, parent: &Path, name: &OsStr) -> ResultEmpty {
        let path = child_path(parent, name);
        trace!("unlink({path})");
        self.volume
            .lock()
            .unwrap()
            .unlink(&path)
            .map_err(|e| e.to_errno())
    }

    fn open(&self, _req: RequestInfo, path: &Path, _flags: u32) -> ResultOpen {
        let path = path_str(path);
        trace!("open({path})");
        self.volume
            .lock()
            .unwrap()
            .open(&path)
            .map(|()| (0, 0))
            .map_err(|e| e.to_errno())
    }

    fn release(
        &self,
        _req: RequestInfo,
        path: &Path,
        _fh: u64,
        _flags: u32,
        _lock_owner: u64,
        _flush: bool,
    ) -> ResultEmpty {
        let path = path_str(path);
        trace!("release({path})");
        self.volume
            .lock()
            .unwrap()
            .release(&path)
            .map_err(|e| e.to_errno())
    }

    fn read(
        &self,
        _req: RequestInfo,
        path: &Path,
        _fh: u64,
        offset: u64,
        size: u32,
        callback: impl FnOnce(ResultSlice) -> CallbackResult,
    ) -> CallbackResult {
        let path = path_str(path);
        trace!("read({path}, offset={offset}, size={size})");
        // `buf` has to outlive the call into `Volume::read` so the callback can
        // borrow from it; `fuse_mt`'s read path is zero-copy and wants `&[u8]`,
        // not an owned `Vec<u8>`.
        let mut buf = vec![0u8; size as usize];
        let result = self.volume.lock().unwrap().read(&path, &mut buf, offset);
        match result {
            Ok(n) => callback(Ok(&buf[..n])),
            Err(e) => callback(Err(e.to_errno())),
        }
    }

    fn write(
        &self,
        _req: RequestInfo,
        path: &Path,
        _fh: u64,
        offset: u64,
        data: Vec<u8>,
        _flags: u32,
    ) -> ResultWrite {
        let path = path_str(path);
        trace!("write({path}, offset={offset}, len={})", data.len());
        self.volume
            .lock()
            .unwrap()
            .write(&path, &data, offset)
            .map(|n| n as u32)
            .map_err(|e| e.to_errno())
    }

    fn opendir(&self, _req: RequestInfo, path: &Path, _flags: u32) -> ResultOpen {
        trace!("opendir({})", path_str(path));
        Ok((0, 0))
    }

    fn releasedir(&self, _req: RequestInfo, path: &Path, _fh: u64, _flags: u32) -> ResultEmpty {
        trace!("releasedir({})", path_str(path));
        Ok(())
    }

    fn readdir(&self, _req: RequestInfo, path: &Path, _fh: u64) -> ResultReaddir {
        let path = path_str(path);
        trace!("readdir({path})");
        self.volume
            .lock()
            .unwrap()
            .readdir(&path)
            .map(|names| {
                names
                    .into_iter()
                    .map(|name| DirectoryEntry {
                        name: name.into(),
                        kind: FileType::RegularFile,
                    })
                    .collect()
            })
            .map_err(|e| e.to_errno())
    }

    /// The namespace is flat (see `DESIGN.md`): `mkdir` never creates anything
    /// persistent, it just reports success against the synthesized root, per
    /// the host-binding contract's "ok no-op".
    fn mkdir(&self, _req: RequestInfo, parent: &Path, name: &OsStr, _mode: u32) -> ResultEntry {
        trace!("mkdir({})", child_path(parent, name));
        let root = self.volume.lock().unwrap().getattr("/").map_err(|e| e.to_errno())?;
        Ok((ATTR_TTL, attr_to_fuse(root)))
    }

    fn rmdir(&self, _req: RequestInfo, parent: &Path, name: &OsStr) -> ResultEmpty {
        trace!("rmdir({})", child_path(parent, name));
        Ok(())
    }

    fn statfs(&self, _req: RequestInfo, _path: &Path) -> ResultStatfs {
        Ok(Statfs {
            blocks: crate::layout::DATA_BLOCK_COUNT,
            bfree: 0,
            bavail: 0,
            files: crate::layout::NUM_NODES as u64,
            ffree: 0,
            bsize: BLOCK_SIZE as u32,
            namelen: crate::layout::MAX_NAME_LEN as u32,
            frsize: BLOCK_SIZE as u32,
        })
    }
}

/// Resolves a mount path to an absolute `PathBuf`, as `fuse_mt::mount` requires.
pub fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    std::fs::canonicalize(path)
}
