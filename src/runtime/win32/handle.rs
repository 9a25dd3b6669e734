// SPDX-License-Identifier: MIT

//! Owned kernel handle that closes itself.

use windows::Win32::Foundation::{CloseHandle, HANDLE};

use super::error::PlatformResultExt;
use crate::runtime::error::Result;

pub struct Handle {
    handle: Option<HANDLE>,
}

// Kernel handles are process-wide values; nothing ties them to a thread.
unsafe impl Send for Handle {}
unsafe impl Sync for Handle {}

impl Handle {
    pub fn new(handle: HANDLE) -> Self {
        Self { handle: Some(handle).filter(|h| !h.is_invalid()) }
    }

    /// The raw handle, or an invalid one once closed.
    pub fn raw(&self) -> HANDLE {
        self.handle.unwrap_or_default()
    }

    /// Give up ownership without closing.
    pub fn take(&mut self) -> Option<HANDLE> {
        self.handle.take()
    }

    pub fn close(&mut self) -> Result<()> {
        match self.handle.take() {
            None => Ok(()),
            Some(h) => unsafe { CloseHandle(h) }.platform("CloseHandle"),
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
