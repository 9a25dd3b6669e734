// SPDX-License-Identifier: MIT

//! Named mutex used as a single-instance lock.

use windows::Win32::Foundation::{ERROR_ALREADY_EXISTS, GetLastError};
use windows::Win32::System::Threading::CreateMutexW;
use windows::core::PCWSTR;

use super::conv::wide;
use super::error::PlatformResultExt;
use super::handle::Handle;
use crate::runtime::error::{Result, SandboxError};

/// Held for as long as this value lives; the OS releases it when the handle closes.
pub struct NamedMutex {
    name: String,
    _handle: Handle,
}

impl NamedMutex {
    /// Create and own the mutex, failing with `AlreadyRunning` when another process already has it.
    pub fn acquire(name: &str) -> Result<Self> {
        let name_w = wide(name);
        let handle = unsafe { CreateMutexW(None, true, PCWSTR(name_w.as_ptr())) }.platform("CreateMutexW")?;
        let last = unsafe { GetLastError() };
        let handle = Handle::new(handle);
        if last == ERROR_ALREADY_EXISTS {
            return Err(SandboxError::AlreadyRunning(name.to_string()));
        }
        tracing::debug!("acquired mutex {name}");
        Ok(Self { name: name.to_string(), _handle: handle })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
