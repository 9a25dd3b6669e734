// SPDX-License-Identifier: MIT

//! Lets the sandbox reach a running Discord client's rich-presence pipes.

use windows_sys::Win32::Storage::FileSystem::{READ_CONTROL, WRITE_DAC};

use super::acl::{AccessPermission, KernelObject, grant_access, has_ace_entry};
use super::named_pipe::PipeChannel;
use super::trustee::Trustee;
use crate::runtime::error::Result;

const PIPE_BASE_NAME: &str = r"\\?\pipe\discord-ipc-";
const PIPE_COUNT: u32 = 10;

pub fn discord_pipe_names() -> impl Iterator<Item = String> {
    (0..PIPE_COUNT).map(|i| format!("{PIPE_BASE_NAME}{i}"))
}

/// Grant full access on every Discord pipe that exists and has no entry for the trustee yet.
///
/// Pipes that already name the trustee are left alone so an existing connection is not disturbed.
/// Returns how many pipes were changed.
pub fn grant_access_to_discord_pipes(trustee: &Trustee) -> Result<usize> {
    let mut granted = 0;
    for name in discord_pipe_names() {
        // Opening only to change the DACL.
        let Ok(pipe) = PipeChannel::open(&name, READ_CONTROL | WRITE_DAC) else {
            continue;
        };
        let object = KernelObject { name: &name, handle: pipe.raw() };
        if !has_ace_entry(&object, trustee)? {
            tracing::info!("granting access to Discord pipe {name}");
            grant_access(&object, trustee, &[AccessPermission::GenericAll])?;
            granted += 1;
        }
    }
    Ok(granted)
}
