//! Integration test code.
//!
//! These exercise the Windows primitives against the real operating
//! system: ACLs on scratch files, drive mounts, the broker pipe, AppContainer
//! profiles, and launching child processes.

mod acl;
mod appcontainer;
mod mount;
mod pipe;
mod process;
pub(crate) mod util;
