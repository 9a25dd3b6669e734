// SPDX-License-Identifier: MIT

//! Reading and changing the discretionary ACL of files and kernel objects.

use std::ffi::c_void;
use std::ptr;

use windows_sys::Win32::Foundation::{HANDLE, HLOCAL, LocalFree};
use windows_sys::Win32::Security::Authorization::{
    ConvertSecurityDescriptorToStringSecurityDescriptorW, DENY_ACCESS, EXPLICIT_ACCESS_W, GRANT_ACCESS,
    GetNamedSecurityInfoW, GetSecurityInfo, SDDL_REVISION_1, SE_FILE_OBJECT, SE_KERNEL_OBJECT, SetEntriesInAclW,
    SetNamedSecurityInfoW, SetSecurityInfo,
};
use windows_sys::Win32::Security::{
    ACCESS_ALLOWED_ACE, ACE_HEADER, ACL, ACL_SIZE_INFORMATION, AclSizeInformation, CONTAINER_INHERIT_ACE,
    DACL_SECURITY_INFORMATION, DeleteAce, GetAce, GetAclInformation, NO_INHERITANCE, OBJECT_INHERIT_ACE,
    OBJECT_SECURITY_INFORMATION, PROTECTED_DACL_SECURITY_INFORMATION, PSECURITY_DESCRIPTOR,
};

use super::conv::{from_wide_ptr, wide};
use super::error::{check_bool, check_status, last_error};
use super::trustee::Trustee;
use crate::fs::FilePath;
use crate::runtime::error::{Result, SandboxError};

const ACCESS_ALLOWED_ACE_TYPE: u8 = 0;
const ACCESS_DENIED_ACE_TYPE: u8 = 1;

/// Generic access rights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessPermission {
    GenericAll,
    GenericExecute,
    GenericWrite,
    GenericRead,
}

impl AccessPermission {
    pub fn mask(self) -> u32 {
        match self {
            AccessPermission::GenericAll => 0x1000_0000,
            AccessPermission::GenericExecute => 0x2000_0000,
            AccessPermission::GenericWrite => 0x4000_0000,
            AccessPermission::GenericRead => 0x8000_0000,
        }
    }

    pub fn combine(permissions: &[AccessPermission]) -> u32 {
        permissions.iter().fold(0, |acc, p| acc | p.mask())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Inheritable allow entry, merged into the existing DACL.
    Grant,
    /// Non-inheritable deny entry; the DACL stops inheriting from the parent.
    Deny,
}

impl AccessMode {
    fn security_information(self) -> OBJECT_SECURITY_INFORMATION {
        match self {
            AccessMode::Grant => DACL_SECURITY_INFORMATION,
            AccessMode::Deny => DACL_SECURITY_INFORMATION | PROTECTED_DACL_SECURITY_INFORMATION,
        }
    }
}

/// A DACL read from an object, along with the descriptor that owns its memory.
pub struct Dacl {
    descriptor: PSECURITY_DESCRIPTOR,
    acl: *mut ACL,
}

impl Dacl {
    pub fn as_ptr(&self) -> *mut ACL {
        self.acl
    }

    /// SDDL text for the DACL portion of the descriptor.
    pub fn to_sddl(&self) -> Result<String> {
        let mut text: *mut u16 = ptr::null_mut();
        check_bool("ConvertSecurityDescriptorToStringSecurityDescriptorW", unsafe {
            ConvertSecurityDescriptorToStringSecurityDescriptorW(
                self.descriptor,
                SDDL_REVISION_1,
                DACL_SECURITY_INFORMATION,
                &mut text,
                ptr::null_mut(),
            )
        })?;
        let ret = unsafe { from_wide_ptr(text) };
        unsafe { LocalFree(text as HLOCAL) };
        Ok(ret)
    }
}

impl Drop for Dacl {
    fn drop(&mut self) {
        if !self.descriptor.is_null() {
            unsafe { LocalFree(self.descriptor as HLOCAL) };
        }
    }
}

/// Something with a DACL.
pub trait SecurityObject {
    fn describe(&self) -> String;
    fn get_dacl(&self) -> Result<Dacl>;
    fn set_dacl(&self, acl: *const ACL, mode: AccessMode) -> Result<()>;
}

impl SecurityObject for FilePath {
    fn describe(&self) -> String {
        self.to_string()
    }

    fn get_dacl(&self) -> Result<Dacl> {
        if !self.exists() {
            return Err(SandboxError::NotFound(self.to_string()));
        }
        let path = wide(&self.to_string());
        let mut dacl = Dacl { descriptor: ptr::null_mut(), acl: ptr::null_mut() };
        let status = unsafe {
            GetNamedSecurityInfoW(
                path.as_ptr(),
                SE_FILE_OBJECT,
                DACL_SECURITY_INFORMATION,
                ptr::null_mut(),
                ptr::null_mut(),
                &mut dacl.acl,
                ptr::null_mut(),
                &mut dacl.descriptor,
            )
        };
        check_status(&format!("GetNamedSecurityInfoW({self})"), status)?;
        Ok(dacl)
    }

    fn set_dacl(&self, acl: *const ACL, mode: AccessMode) -> Result<()> {
        let path = wide(&self.to_string());
        let status = unsafe {
            SetNamedSecurityInfoW(
                path.as_ptr() as *mut u16,
                SE_FILE_OBJECT,
                mode.security_information(),
                ptr::null_mut(),
                ptr::null_mut(),
                acl,
                ptr::null(),
            )
        };
        check_status(&format!("SetNamedSecurityInfoW({self})"), status)
    }
}

/// An open kernel object, such as a named pipe.
pub struct KernelObject<'a> {
    pub name: &'a str,
    pub handle: HANDLE,
}

impl SecurityObject for KernelObject<'_> {
    fn describe(&self) -> String {
        self.name.to_string()
    }

    fn get_dacl(&self) -> Result<Dacl> {
        let mut dacl = Dacl { descriptor: ptr::null_mut(), acl: ptr::null_mut() };
        let status = unsafe {
            GetSecurityInfo(
                self.handle,
                SE_KERNEL_OBJECT,
                DACL_SECURITY_INFORMATION,
                ptr::null_mut(),
                ptr::null_mut(),
                &mut dacl.acl,
                ptr::null_mut(),
                &mut dacl.descriptor,
            )
        };
        check_status(&format!("GetSecurityInfo({})", self.name), status)?;
        Ok(dacl)
    }

    fn set_dacl(&self, acl: *const ACL, mode: AccessMode) -> Result<()> {
        let status = unsafe {
            SetSecurityInfo(
                self.handle,
                SE_KERNEL_OBJECT,
                mode.security_information(),
                ptr::null_mut(),
                ptr::null_mut(),
                acl,
                ptr::null(),
            )
        };
        check_status(&format!("SetSecurityInfo({})", self.name), status)
    }
}

/// An ACL built by `SetEntriesInAclW`.
pub struct OwnedAcl {
    acl: *mut ACL,
}

impl OwnedAcl {
    /// Merge one entry per trustee into `base`, or into an empty ACL when `base` is null.
    pub fn with_entries(
        base: *const ACL,
        trustees: &[&Trustee],
        mode: AccessMode,
        permissions: &[AccessPermission],
    ) -> Result<Self> {
        let entries: Vec<EXPLICIT_ACCESS_W> = trustees
            .iter()
            .map(|t| EXPLICIT_ACCESS_W {
                grfAccessPermissions: AccessPermission::combine(permissions),
                grfAccessMode: match mode {
                    AccessMode::Grant => GRANT_ACCESS,
                    AccessMode::Deny => DENY_ACCESS,
                },
                grfInheritance: match mode {
                    AccessMode::Grant => OBJECT_INHERIT_ACE | CONTAINER_INHERIT_ACE,
                    AccessMode::Deny => NO_INHERITANCE,
                },
                Trustee: t.as_trustee_w(),
            })
            .collect();
        let mut acl: *mut ACL = ptr::null_mut();
        let status = unsafe { SetEntriesInAclW(entries.len() as u32, entries.as_ptr(), base, &mut acl) };
        check_status("SetEntriesInAclW", status)?;
        Ok(Self { acl })
    }

    pub fn as_ptr(&self) -> *mut ACL {
        self.acl
    }
}

impl Drop for OwnedAcl {
    fn drop(&mut self) {
        if !self.acl.is_null() {
            unsafe { LocalFree(self.acl as HLOCAL) };
        }
    }
}

pub fn grant_access(object: &dyn SecurityObject, trustee: &Trustee, permissions: &[AccessPermission]) -> Result<()> {
    set_access(object, trustee, AccessMode::Grant, permissions)
}

pub fn deny_access(object: &dyn SecurityObject, trustee: &Trustee, permissions: &[AccessPermission]) -> Result<()> {
    set_access(object, trustee, AccessMode::Deny, permissions)
}

pub fn set_access(
    object: &dyn SecurityObject,
    trustee: &Trustee,
    mode: AccessMode,
    permissions: &[AccessPermission],
) -> Result<()> {
    let current = object.get_dacl()?;
    let updated = OwnedAcl::with_entries(current.as_ptr(), &[trustee], mode, permissions)?;
    if mode == AccessMode::Deny {
        // An inherited allow for the same trustee would otherwise still be visible next to the deny.
        unsafe {
            remove_first_ace(updated.as_ptr(), |kind, sid| {
                kind == ACCESS_ALLOWED_ACE_TYPE && trustee.sid().matches(sid)
            })
        }?;
    }
    object.set_dacl(updated.as_ptr(), mode)?;
    tracing::debug!("{mode:?} {permissions:?} on {} for {}", object.describe(), trustee.sid());
    Ok(())
}

/// Remove every allow and deny entry naming the trustee.
pub fn clear_access(object: &dyn SecurityObject, trustee: &Trustee) -> Result<()> {
    let current = object.get_dacl()?;
    while unsafe { remove_first_ace(current.as_ptr(), |_, sid| trustee.sid().matches(sid)) }? {}
    object.set_dacl(current.as_ptr(), AccessMode::Grant)
}

/// Whether any allow or deny entry names the trustee. Not a security check.
pub fn has_ace_entry(object: &dyn SecurityObject, trustee: &Trustee) -> Result<bool> {
    let current = object.get_dacl()?;
    let mut found = false;
    unsafe {
        for_each_ace(current.as_ptr(), |_, _, sid| {
            found = found || trustee.sid().matches(sid);
            !found
        })
    }?;
    Ok(found)
}

pub fn string_security_descriptor(object: &dyn SecurityObject) -> Result<String> {
    object.get_dacl()?.to_sddl()
}

/// Visit allow and deny entries in order until `visit` returns false.
///
/// # Safety
/// `acl` must be a valid ACL.
unsafe fn for_each_ace(
    acl: *const ACL,
    mut visit: impl FnMut(u32, u8, *mut c_void) -> bool,
) -> Result<()> {
    if acl.is_null() {
        return Ok(());
    }
    let mut info = ACL_SIZE_INFORMATION { AceCount: 0, AclBytesInUse: 0, AclBytesFree: 0 };
    check_bool("GetAclInformation", unsafe {
        GetAclInformation(
            acl,
            (&mut info as *mut ACL_SIZE_INFORMATION).cast(),
            size_of_val(&info) as u32,
            AclSizeInformation,
        )
    })?;
    for index in 0..info.AceCount {
        let mut ace: *mut c_void = ptr::null_mut();
        if unsafe { GetAce(acl, index, &mut ace) } == 0 || ace.is_null() {
            return Err(last_error("GetAce"));
        }
        let header = unsafe { *(ace as *const ACE_HEADER) };
        if header.AceType != ACCESS_ALLOWED_ACE_TYPE && header.AceType != ACCESS_DENIED_ACE_TYPE {
            continue;
        }
        // Allowed and denied entries share one layout.
        let entry = ace as *const ACCESS_ALLOWED_ACE;
        let sid = unsafe { ptr::addr_of!((*entry).SidStart) } as *mut c_void;
        if !visit(index, header.AceType, sid) {
            break;
        }
    }
    Ok(())
}

/// Delete the first allow or deny entry matching `predicate`; returns whether one was removed.
///
/// # Safety
/// `acl` must be a valid, writable ACL.
unsafe fn remove_first_ace(acl: *mut ACL, mut predicate: impl FnMut(u8, *mut c_void) -> bool) -> Result<bool> {
    let mut target = None;
    unsafe {
        for_each_ace(acl, |index, kind, sid| {
            if predicate(kind, sid) {
                target = Some(index);
            }
            target.is_none()
        })
    }?;
    match target {
        None => Ok(false),
        Some(index) => {
            check_bool("DeleteAce", unsafe { DeleteAce(acl, index) })?;
            Ok(true)
        }
    }
}
