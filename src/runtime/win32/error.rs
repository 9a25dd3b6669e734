// SPDX-License-Identifier: MIT

//! Conversion of Windows failures into `SandboxError::Platform`.

use windows_result::HRESULT;
use windows_sys::Win32::Foundation::{ERROR_SUCCESS, GetLastError};

use crate::runtime::error::{Result, SandboxError};

/// Lets `windows` crate calls be tagged with the API that failed.
pub trait PlatformResultExt<T> {
    fn platform(self, context: &str) -> Result<T>;
}

impl<T> PlatformResultExt<T> for windows::core::Result<T> {
    fn platform(self, context: &str) -> Result<T> {
        self.map_err(|e| platform_error(context, &e))
    }
}

pub fn platform_error(context: &str, e: &windows::core::Error) -> SandboxError {
    SandboxError::Platform {
        context: context.to_string(),
        code: win32_code(e.code()),
        message: non_empty(e.message()),
    }
}

/// Error for a raw Win32 status code.
pub fn win32(context: &str, code: u32) -> SandboxError {
    SandboxError::Platform { context: context.to_string(), code, message: system_message(code) }
}

/// Error from the calling thread's last-error value.
pub fn last_error(context: &str) -> SandboxError {
    win32(context, unsafe { GetLastError() })
}

/// For APIs that return a status code.
pub fn check_status(context: &str, status: u32) -> Result<()> {
    if status == ERROR_SUCCESS { Ok(()) } else { Err(win32(context, status)) }
}

/// For APIs that return BOOL and set the last error.
pub fn check_bool(context: &str, ok: i32) -> Result<()> {
    if ok != 0 { Ok(()) } else { Err(last_error(context)) }
}

pub fn system_message(code: u32) -> Option<String> {
    non_empty(HRESULT::from_win32(code).message())
}

/// HRESULTs in the Win32 facility carry the original error code in the low word.
fn win32_code(hr: HRESULT) -> u32 {
    let raw = hr.0 as u32;
    if raw & 0xFFFF_0000 == 0x8007_0000 { raw & 0xFFFF } else { raw }
}

fn non_empty(message: String) -> Option<String> {
    let message = message.trim().to_string();
    if message.is_empty() { None } else { Some(message) }
}
