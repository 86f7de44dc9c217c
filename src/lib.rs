//! Core of the single-file block-device file system: on-disk layout, bitmap
//! allocators, block-address resolver, and read/write engine, plus the FUSE
//! binding that exposes them as a mountable file system.

pub mod bitmap;
pub mod block_table;
pub mod device;
pub mod error;
pub mod fuse_binding;
pub mod inode;
pub mod layout;
pub mod resolver;
pub mod rw;
pub mod superblock;
pub mod volume;

pub use error::{Result, SfsError};
pub use fuse_binding::SfsFuse;
pub use volume::Volume;
