//! ACL grant, deny, and clear on real files.

use crate::fs::FilePath;
use crate::runtime::error::SandboxError;
use crate::runtime::win32::acl::{
    AccessPermission, clear_access, deny_access, grant_access, has_ace_entry, string_security_descriptor,
};
use crate::runtime::win32::{TemporaryAccess, Trustee};

use super::util;

/// SDDL ACE strings that name `sid`, like `A;OICI;GA;;;S-1-15-2-...`.
fn aces_for(sddl: &str, sid: &str) -> Vec<String> {
    sddl.split('(')
        .filter_map(|ace| ace.strip_suffix(')').or_else(|| ace.split(')').next()))
        .filter(|ace| ace.ends_with(&format!(";{sid}")))
        .map(String::from)
        .collect()
}

fn scratch_file(dir: &tempfile::TempDir) -> FilePath {
    let file = util::temp_path(dir).child("data.txt");
    file.write_string("contents").unwrap();
    file
}

#[test]
fn grant_then_clear() {
    let dir = tempfile::tempdir().unwrap();
    let file = scratch_file(&dir);
    let container = util::container();
    let trustee = Trustee::app_container(&container);

    assert!(!has_ace_entry(&file, &trustee).unwrap());
    grant_access(&file, &trustee, &[AccessPermission::GenericRead, AccessPermission::GenericExecute]).unwrap();
    assert!(has_ace_entry(&file, &trustee).unwrap());

    clear_access(&file, &trustee).unwrap();
    assert!(!has_ace_entry(&file, &trustee).unwrap());
}

#[test]
fn deny_replaces_the_allow_entry() {
    let dir = tempfile::tempdir().unwrap();
    let file = scratch_file(&dir);
    let container = util::container();
    let trustee = Trustee::app_container(&container);
    let sid = trustee.sid().to_string_sid().unwrap();

    grant_access(&file, &trustee, &[AccessPermission::GenericAll]).unwrap();
    deny_access(&file, &trustee, &[AccessPermission::GenericWrite]).unwrap();

    let sddl = string_security_descriptor(&file).unwrap();
    let aces = aces_for(&sddl, &sid);
    assert!(aces.iter().any(|a| a.starts_with("D;")), "{sddl}");
    assert!(!aces.iter().any(|a| a.starts_with("A;")), "{sddl}");
}

#[test]
fn clear_after_interleaved_changes() {
    let dir = tempfile::tempdir().unwrap();
    let folder = util::temp_path(&dir);
    let container = util::container();
    let trustee = Trustee::app_container(&container);

    grant_access(&folder, &trustee, &[AccessPermission::GenericRead]).unwrap();
    deny_access(&folder, &trustee, &[AccessPermission::GenericWrite]).unwrap();
    grant_access(&folder, &trustee, &[AccessPermission::GenericExecute]).unwrap();
    deny_access(&folder, &trustee, &[AccessPermission::GenericAll]).unwrap();
    assert!(has_ace_entry(&folder, &trustee).unwrap());

    clear_access(&folder, &trustee).unwrap();
    assert!(!has_ace_entry(&folder, &trustee).unwrap());
}

#[test]
fn temporary_access_is_undone() {
    let dir = tempfile::tempdir().unwrap();
    let file = scratch_file(&dir);
    let container = util::container();
    let trustee = Trustee::app_container(&container);
    {
        let mut access = TemporaryAccess::new();
        access.grant(&file, &trustee, &[AccessPermission::GenericRead]).unwrap();
        assert_eq!(access.len(), 1);
        assert!(has_ace_entry(&file, &trustee).unwrap());
    }
    assert!(!has_ace_entry(&file, &trustee).unwrap());
}

#[test]
fn temporary_deny_is_undone() {
    let dir = tempfile::tempdir().unwrap();
    let file = scratch_file(&dir);
    let container = util::container();
    let trustee = Trustee::app_container(&container);
    let sid = trustee.sid().to_string_sid().unwrap();
    {
        let mut access = TemporaryAccess::new();
        access.deny(&file, &trustee, &[AccessPermission::GenericWrite]).unwrap();
        let sddl = string_security_descriptor(&file).unwrap();
        assert!(sddl.starts_with("D:P"), "{sddl}");
        assert!(aces_for(&sddl, &sid).iter().any(|a| a.starts_with("D;")), "{sddl}");
    }
    assert!(!has_ace_entry(&file, &trustee).unwrap());
}

#[test]
fn missing_path() {
    let dir = tempfile::tempdir().unwrap();
    let missing = util::temp_path(&dir).child("missing.txt");
    let trustee = Trustee::current_user().unwrap();
    let err = grant_access(&missing, &trustee, &[AccessPermission::GenericRead]).unwrap_err();
    assert!(matches!(err, SandboxError::NotFound(_)), "{err}");
}

#[test]
fn security_descriptor_text() {
    let dir = tempfile::tempdir().unwrap();
    let file = scratch_file(&dir);
    let sddl = string_security_descriptor(&file).unwrap();
    assert!(sddl.starts_with("D:"), "{sddl}");
}
