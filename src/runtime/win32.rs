// SPDX-License-Identifier: MIT

//! Windows implementation of the sandbox primitives.

pub mod acl;
pub mod appcontainer;
pub mod attribute_list;
pub mod broker;
mod conv;
pub mod discord;
pub mod error;
pub mod handle;
pub mod job;
pub mod mounted_disk;
pub mod mutex;
pub mod named_pipe;
pub mod process;
pub mod sid;
pub mod speech;
pub mod temporary_access;
pub mod trustee;

pub use acl::{AccessMode, AccessPermission, SecurityObject};
pub use appcontainer::AppContainer;
pub use mounted_disk::MountedDisk;
pub use named_pipe::{NamedPipeServer, PipeChannel, connect};
pub use process::SandboxedProcess;
pub use temporary_access::TemporaryAccess;
pub use trustee::Trustee;
