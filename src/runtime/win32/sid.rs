// SPDX-License-Identifier: MIT

//! Owned security identifiers.

use std::fmt;

use windows_sys::Win32::Foundation::{HLOCAL, LocalFree};
use windows_sys::Win32::Security::Authorization::{ConvertSidToStringSidW, ConvertStringSidToSidW};
use windows_sys::Win32::Security::{CopySid, EqualSid, GetLengthSid, IsValidSid, PSID};

use super::conv::{from_wide_ptr, wide};
use super::error::{check_bool, last_error};
use crate::runtime::error::{Result, SandboxError};

/// A SID copied into memory this process owns.
///
/// The buffer is `u32`-backed so the SID header stays aligned.
#[derive(Clone)]
pub struct Sid {
    buf: Vec<u32>,
}

impl Sid {
    /// Copy the SID at `psid`. The caller still owns and frees the original.
    ///
    /// # Safety
    /// `psid` must point at a valid SID.
    pub unsafe fn copy_from(psid: PSID) -> Result<Self> {
        if psid.is_null() || unsafe { IsValidSid(psid) } == 0 {
            return Err(SandboxError::Configuration("invalid SID".to_string()));
        }
        let len = unsafe { GetLengthSid(psid) };
        let mut buf = vec![0u32; (len as usize).div_ceil(size_of::<u32>())];
        check_bool("CopySid", unsafe { CopySid(len, buf.as_mut_ptr().cast(), psid) })?;
        Ok(Self { buf })
    }

    /// Parse the `S-1-...` form.
    pub fn parse(text: &str) -> Result<Self> {
        let text_w = wide(text);
        let mut psid: PSID = std::ptr::null_mut();
        if unsafe { ConvertStringSidToSidW(text_w.as_ptr(), &mut psid) } == 0 {
            return Err(last_error("ConvertStringSidToSidW"));
        }
        let ret = unsafe { Sid::copy_from(psid) };
        unsafe { LocalFree(psid as HLOCAL) };
        ret
    }

    /// Pointer for APIs that only read the SID.
    pub fn psid(&self) -> PSID {
        self.buf.as_ptr() as PSID
    }

    /// The same pointer, typed for the `windows` crate.
    pub fn as_windows_psid(&self) -> windows::Win32::Security::PSID {
        windows::Win32::Security::PSID(self.psid())
    }

    pub fn to_string_sid(&self) -> Result<String> {
        let mut text: *mut u16 = std::ptr::null_mut();
        if unsafe { ConvertSidToStringSidW(self.psid(), &mut text) } == 0 {
            return Err(last_error("ConvertSidToStringSidW"));
        }
        let ret = unsafe { from_wide_ptr(text) };
        unsafe { LocalFree(text as HLOCAL) };
        Ok(ret)
    }

    /// Compare against a SID this type does not own.
    ///
    /// # Safety
    /// `other` must point at a valid SID.
    pub unsafe fn matches(&self, other: PSID) -> bool {
        !other.is_null() && unsafe { EqualSid(self.psid(), other) } != 0
    }
}

impl PartialEq for Sid {
    fn eq(&self, other: &Self) -> bool {
        unsafe { self.matches(other.psid()) }
    }
}

impl Eq for Sid {}

impl fmt::Debug for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_string_sid() {
            Ok(s) => write!(f, "Sid({s})"),
            Err(_) => write!(f, "Sid(?)"),
        }
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_string_sid() {
            Ok(s) => f.write_str(&s),
            Err(_) => f.write_str("<invalid sid>"),
        }
    }
}

// The SID lives in an owned heap buffer.
unsafe impl Send for Sid {}
unsafe impl Sync for Sid {}
