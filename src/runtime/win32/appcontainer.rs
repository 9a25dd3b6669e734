// SPDX-License-Identifier: MIT

//! The AppContainer principal the child runs as.
//! Because much of windows requires explicit add/remove actions,
//! wrapping it in a single struct that implements Drop will make code maintenance easier.

use windows::Win32::Security::{self, Isolation, SID_AND_ATTRIBUTES, WELL_KNOWN_SID_TYPE};
use windows::core::PCWSTR;
use windows_sys::Win32::Foundation::{HLOCAL, LocalFree};

use super::conv::wide;
use super::error::{PlatformResultExt, last_error};
use super::mutex::NamedMutex;
use super::sid::Sid;
use crate::runtime::config::{Capability, WellKnownCapability};
use crate::runtime::error::Result;

const SE_GROUP_ENABLED: u32 = 0x4;

/// Large enough for any SID.
const MAX_SID_UNITS: usize = 68 / size_of::<u32>();

pub struct AppContainer {
    name: String,
    sid: Sid,
    capabilities: Vec<Sid>,
    lpac: bool,
    // Released after the profile is deleted; fields drop after Drop::drop runs.
    _mutex: NamedMutex,
}

impl AppContainer {
    /// Create the profile, replacing a stale one left by an earlier run.
    pub fn create(name: &str, description: &str, capabilities: &[Capability], lpac: bool) -> Result<Self> {
        let mutex = NamedMutex::acquire(name)?;
        let capabilities = capabilities.iter().map(capability_sid).collect::<Result<Vec<Sid>>>()?;

        let name_w = wide(name);
        let description_w = wide(description);
        // A profile that survived a crash would make creation fail.
        if unsafe { Isolation::DeleteAppContainerProfile(PCWSTR(name_w.as_ptr())) }.is_ok() {
            tracing::debug!("removed stale AppContainer profile {name}");
        }

        let attributes: Vec<SID_AND_ATTRIBUTES> = capabilities
            .iter()
            .map(|c| SID_AND_ATTRIBUTES { Sid: c.as_windows_psid(), Attributes: SE_GROUP_ENABLED })
            .collect();
        let psid = unsafe {
            Isolation::CreateAppContainerProfile(
                PCWSTR(name_w.as_ptr()),        // pszAppContainerName: identifies the container profile
                PCWSTR(name_w.as_ptr()),        // pszDisplayName: human-readable
                PCWSTR(description_w.as_ptr()), // pszDescription
                if attributes.is_empty() { None } else { Some(attributes.as_slice()) },
            )
        }
        .platform("CreateAppContainerProfile")?;
        let sid = unsafe { Sid::copy_from(psid.0) };
        unsafe { Security::FreeSid(psid) };
        let sid = sid?;

        tracing::info!("created AppContainer {name} ({sid})");
        Ok(Self { name: name.to_string(), sid, capabilities, lpac, _mutex: mutex })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sid(&self) -> &Sid {
        &self.sid
    }

    pub fn capabilities(&self) -> &[Sid] {
        &self.capabilities
    }

    /// Whether the launcher should apply the less-privileged policy.
    pub fn lpac(&self) -> bool {
        self.lpac
    }
}

impl Drop for AppContainer {
    fn drop(&mut self) {
        let name_w = wide(&self.name);
        match unsafe { Isolation::DeleteAppContainerProfile(PCWSTR(name_w.as_ptr())) } {
            Ok(()) => tracing::debug!("deleted AppContainer {}", self.name),
            Err(e) => tracing::warn!("could not delete AppContainer {}: {}", self.name, e.message()),
        }
    }
}

fn capability_sid(capability: &Capability) -> Result<Sid> {
    match capability {
        Capability::WellKnown(kind) => well_known_sid(well_known_type(*kind)),
        Capability::Named(name) => derived_capability_sid(name),
    }
}

pub(crate) fn well_known_sid(kind: WELL_KNOWN_SID_TYPE) -> Result<Sid> {
    let mut buf = [0u32; MAX_SID_UNITS];
    let mut size = size_of_val(&buf) as u32;
    unsafe { Security::CreateWellKnownSid(kind, None, Some(Security::PSID(buf.as_mut_ptr().cast())), &mut size) }
        .platform("CreateWellKnownSid")?;
    unsafe { Sid::copy_from(buf.as_mut_ptr().cast()) }
}

/// Resolve a capability name to its derived SID.
fn derived_capability_sid(name: &str) -> Result<Sid> {
    use windows_sys::Win32::Security::{DeriveCapabilitySidsFromName, PSID};

    let name_w = wide(name);
    let mut group_sids: *mut PSID = std::ptr::null_mut();
    let mut group_count = 0u32;
    let mut sids: *mut PSID = std::ptr::null_mut();
    let mut count = 0u32;
    let ok = unsafe {
        DeriveCapabilitySidsFromName(name_w.as_ptr(), &mut group_sids, &mut group_count, &mut sids, &mut count)
    };
    if ok == 0 {
        return Err(last_error("DeriveCapabilitySidsFromName"));
    }
    let ret = if count == 0 {
        Err(last_error("DeriveCapabilitySidsFromName"))
    } else {
        unsafe { Sid::copy_from(*sids) }
    };
    unsafe {
        free_sid_array(group_sids, group_count);
        free_sid_array(sids, count);
    }
    ret
}

unsafe fn free_sid_array(array: *mut windows_sys::Win32::Security::PSID, count: u32) {
    if array.is_null() {
        return;
    }
    for i in 0..count as usize {
        unsafe { LocalFree(*array.add(i) as HLOCAL) };
    }
    unsafe { LocalFree(array as HLOCAL) };
}

fn well_known_type(kind: WellKnownCapability) -> WELL_KNOWN_SID_TYPE {
    match kind {
        WellKnownCapability::InternetClient => Security::WinCapabilityInternetClientSid,
        WellKnownCapability::InternetClientServer => Security::WinCapabilityInternetClientServerSid,
        WellKnownCapability::PrivateNetworkClientServer => Security::WinCapabilityPrivateNetworkClientServerSid,
        WellKnownCapability::PicturesLibrary => Security::WinCapabilityPicturesLibrarySid,
        WellKnownCapability::VideosLibrary => Security::WinCapabilityVideosLibrarySid,
        WellKnownCapability::MusicLibrary => Security::WinCapabilityMusicLibrarySid,
        WellKnownCapability::DocumentsLibrary => Security::WinCapabilityDocumentsLibrarySid,
        WellKnownCapability::EnterpriseAuthentication => Security::WinCapabilityEnterpriseAuthenticationSid,
        WellKnownCapability::SharedUserCertificates => Security::WinCapabilitySharedUserCertificatesSid,
        WellKnownCapability::RemovableStorage => Security::WinCapabilityRemovableStorageSid,
        WellKnownCapability::Appointments => Security::WinCapabilityAppointmentsSid,
        WellKnownCapability::Contacts => Security::WinCapabilityContactsSid,
    }
}
