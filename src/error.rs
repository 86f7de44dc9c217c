//! The core's error type and its single conversion point to POSIX `errno`.

use std::io;

use thiserror::Error;

/// Errors a core handler can surface to the host binding.
#[derive(Error, Debug)]
pub enum SfsError {
    /// No inode whose name matches the path tail.
    #[error("no such file")]
    NotFound,
    /// `create` against an existing name.
    #[error("file already exists")]
    Exists,
    /// `create` with a name longer than [`crate::layout::MAX_NAME_LEN`] bytes.
    #[error("file name too long")]
    NameTooLong,
    /// Inode table full, an allocator pool is exhausted, or the write is beyond the
    /// addressable range of the file.
    #[error("no space left on device")]
    NoSpace,
    /// The `readdir` filler rejected an entry.
    ///
    /// Never constructed by this crate: `fuse_mt::FilesystemMT::readdir` returns a
    /// plain `Vec<DirectoryEntry>` rather than invoking a filler callback the core
    /// could see reject an entry, so there is no call site that can observe a full
    /// buffer. Kept (with its `errno` mapping below) because it is part of the
    /// handler contract in spec §7; see `DESIGN.md`'s Open Question list for the
    /// `fuse_mt`-over-`fuser` tradeoff this follows from.
    #[error("readdir buffer full")]
    BufferFull,
    /// On mount, the magic number did not match. Fatal: the caller aborts the process.
    #[error("not an sfs volume")]
    InvalidVolume,
    /// A read or write against the backing file failed.
    #[error("device I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SfsError {
    /// Maps this error to the `errno` value the FUSE binding should report back to the
    /// kernel. This is the only place in the crate that deals in `errno` numbers.
    pub fn to_errno(&self) -> libc::c_int {
        match self {
            SfsError::NotFound => libc::ENOENT,
            SfsError::Exists => libc::EEXIST,
            SfsError::NameTooLong => libc::ENAMETOOLONG,
            SfsError::NoSpace => libc::ENOSPC,
            SfsError::BufferFull => libc::ENOMEM,
            SfsError::InvalidVolume => libc::EIO,
            SfsError::Io(_) => libc::EIO,
        }
    }
}

/// Convenience alias used throughout the core.
pub type Result<T> = std::result::Result<T, SfsError>;
