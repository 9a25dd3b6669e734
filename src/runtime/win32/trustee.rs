// SPDX-License-Identifier: MIT

//! Identities that ACL entries name.

use windows::Win32::Foundation::HANDLE;
use windows::Win32::Security::{GetTokenInformation, TOKEN_QUERY, TOKEN_USER, TokenUser};
use windows::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};
use windows_sys::Win32::Security::Authorization::{
    NO_MULTIPLE_TRUSTEE, TRUSTEE_IS_SID, TRUSTEE_IS_USER, TRUSTEE_IS_WELL_KNOWN_GROUP, TRUSTEE_TYPE, TRUSTEE_W,
};

use super::appcontainer::AppContainer;
use super::error::PlatformResultExt;
use super::handle::Handle;
use super::sid::Sid;
use crate::runtime::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trustee {
    sid: Sid,
    user: bool,
}

impl Trustee {
    pub fn app_container(container: &AppContainer) -> Self {
        Self { sid: container.sid().clone(), user: false }
    }

    /// A group known by its `S-1-...` string, such as `S-1-15-2-1` for all application packages.
    pub fn well_known(sid: &str) -> Result<Self> {
        Ok(Self { sid: Sid::parse(sid)?, user: false })
    }

    /// The user this process runs as.
    pub fn current_user() -> Result<Self> {
        Ok(Self { sid: token_user_sid()?, user: true })
    }

    pub fn sid(&self) -> &Sid {
        &self.sid
    }

    /// Borrowed view for the ACL APIs; valid while `self` is.
    pub(crate) fn as_trustee_w(&self) -> TRUSTEE_W {
        let kind: TRUSTEE_TYPE = if self.user { TRUSTEE_IS_USER } else { TRUSTEE_IS_WELL_KNOWN_GROUP };
        TRUSTEE_W {
            pMultipleTrustee: std::ptr::null_mut(),
            MultipleTrusteeOperation: NO_MULTIPLE_TRUSTEE,
            TrusteeForm: TRUSTEE_IS_SID,
            TrusteeType: kind,
            ptstrName: self.sid.psid() as *mut u16,
        }
    }
}

fn token_user_sid() -> Result<Sid> {
    let mut token = HANDLE::default();
    unsafe { OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token) }.platform("OpenProcessToken")?;
    let token = Handle::new(token);

    // The first call only reports the size.
    let mut size = 0u32;
    let _ = unsafe { GetTokenInformation(token.raw(), TokenUser, None, 0, &mut size) };
    let mut buf = vec![0u64; (size as usize).div_ceil(size_of::<u64>()).max(1)];
    unsafe {
        GetTokenInformation(
            token.raw(),
            TokenUser,
            Some(buf.as_mut_ptr().cast()),
            (buf.len() * size_of::<u64>()) as u32,
            &mut size,
        )
    }
    .platform("GetTokenInformation")?;
    let user = buf.as_ptr().cast::<TOKEN_USER>();
    unsafe { Sid::copy_from((*user).User.Sid.0) }
}
