//! AppContainer profile lifetime.

use crate::runtime::config::{Capability, WellKnownCapability};
use crate::runtime::error::SandboxError;
use crate::runtime::win32::AppContainer;

use super::util;

#[test]
fn create_and_recreate() {
    let name = util::unique_name("SandboxTest");
    let capabilities = [Capability::WellKnown(WellKnownCapability::InternetClient)];
    let container = AppContainer::create(&name, "sandbox test", &capabilities, true).unwrap();
    let sid = container.sid().to_string_sid().unwrap();
    assert!(sid.starts_with("S-1-15-2-"), "{sid}");
    assert_eq!(container.capabilities().len(), 1);
    assert!(container.lpac());

    let err = AppContainer::create(&name, "sandbox test", &capabilities, false).err().unwrap();
    assert!(matches!(err, SandboxError::AlreadyRunning(_)), "{err}");

    drop(container);
    // The SID is derived from the name, so a new profile gets the same one.
    let again = AppContainer::create(&name, "sandbox test", &[], false).unwrap();
    assert_eq!(again.sid().to_string_sid().unwrap(), sid);
}
