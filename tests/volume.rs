//! Scenario tests driving `Volume` directly against a disposable backing file,
//! covering the capacity and reclaim boundaries that don't fit naturally as
//! `#[cfg(test)]` unit tests next to the code they exercise.

use sfs::error::SfsError;
use sfs::layout::{MAX_LOGICAL_BLOCK, NUM_NODES};
use sfs::volume::Volume;
use tempfile::NamedTempFile;

fn volume() -> (NamedTempFile, Volume) {
    let tmp = NamedTempFile::new().unwrap();
    let volume = Volume::open(tmp.path()).unwrap();
    (tmp, volume)
}

#[test]
fn fresh_mount_starts_at_magic_with_no_files() {
    let (_tmp, mut v) = volume();
    assert!(v.getattr("/").unwrap().is_dir);
    assert!(v.readdir("/").unwrap().is_empty());
}

#[test]
fn the_129th_file_reports_no_space() {
    let (_tmp, mut v) = volume();
    for i in 0..NUM_NODES {
        v.create(&format!("/f{i}")).unwrap();
    }
    assert!(matches!(
        v.create("/one-too-many").unwrap_err(),
        SfsError::NoSpace
    ));
}

#[test]
fn write_beyond_the_addressable_range_reports_no_space() {
    let (_tmp, mut v) = volume();
    v.create("/f").unwrap();
    let offset = MAX_LOGICAL_BLOCK * 512;
    assert!(matches!(
        v.write("/f", b"x", offset).unwrap_err(),
        SfsError::NoSpace
    ));
}

#[test]
fn unlink_after_a_multi_block_write_reclaims_every_allocated_bit() {
    let (_tmp, mut v) = volume();
    v.create("/big").unwrap();
    v.write("/big", &vec![0xABu8; 4096], 0).unwrap();
    v.unlink("/big").unwrap();

    // The slot is reusable, and a freshly created file gets a clean (all-hole)
    // block chain again rather than inheriting anything from the deleted one.
    v.create("/big").unwrap();
    let mut out = [0u8; 4096];
    let n = v.read("/big", &mut out, 0).unwrap();
    assert_eq!(n, 0);
}

#[test]
fn name_longer_than_49_bytes_is_rejected_before_any_allocation() {
    let (_tmp, mut v) = volume();
    let long_name = format!("/{}", "n".repeat(60));
    assert!(matches!(
        v.create(&long_name).unwrap_err(),
        SfsError::NameTooLong
    ));
    assert!(v.readdir("/").unwrap().is_empty());
}

#[test]
fn remount_sees_no_changes_from_a_pure_create_unlink_cycle() {
    let tmp = NamedTempFile::new().unwrap();
    {
        let mut v = Volume::open(tmp.path()).unwrap();
        v.create("/transient").unwrap();
        v.unlink("/transient").unwrap();
    }
    let before = std::fs::read(tmp.path()).unwrap();

    {
        let mut v = Volume::open(tmp.path()).unwrap();
        assert!(v.readdir("/").unwrap().is_empty());
    }
    let after = std::fs::read(tmp.path()).unwrap();
    assert_eq!(before, after);
}
