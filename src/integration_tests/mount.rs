//! Drive-letter mounts.

use crate::runtime::error::SandboxError;
use crate::runtime::mount::is_used;
use crate::runtime::win32::MountedDisk;
use crate::runtime::win32::mounted_disk::used_drives;

use super::util;

#[test]
fn mount_and_unmount() {
    let dir = tempfile::tempdir().unwrap();
    let target = util::temp_path(&dir);
    target.child("hello.txt").write_string("hello").unwrap();

    let mut disk = MountedDisk::mount_available(&target, 'Q').unwrap();
    let letter = disk.letter();
    assert!(is_used(letter, used_drives()));
    assert_eq!(disk.root().to_string(), format!("{letter}:\\"));
    assert_eq!(disk.root().child("hello.txt").read_string().unwrap(), "hello");

    disk.unmount().unwrap();
    assert!(!is_used(letter, used_drives()));
    // Dropping afterwards has nothing left to do.
    disk.unmount().unwrap();
}

#[test]
fn attached_letter_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let target = util::temp_path(&dir);
    let system = util::system32();
    let letter = system.to_string().chars().next().unwrap();
    assert!(is_used(letter, used_drives()));

    let err = MountedDisk::mount(&target, letter).unwrap_err();
    assert!(matches!(err, SandboxError::Configuration(_)));
    assert!(system.is_dir());
}
