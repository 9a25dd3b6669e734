//! Process/Thread Attribute List.
//! Because much of windows requires explicit add/remove actions,
//! wrapping it in a single struct that implements Drop will make code maintenance easier.

use windows::Win32::{
    Foundation::{ERROR_INSUFFICIENT_BUFFER, GetLastError, HANDLE},
    Security::{SECURITY_CAPABILITIES, SID_AND_ATTRIBUTES},
    System::Threading,
};

use super::appcontainer::AppContainer;
use super::error::PlatformResultExt;
use crate::runtime::error::Result;

const SE_GROUP_ENABLED: u32 = 0x4;

/// PROC_THREAD_ATTRIBUTE_ALL_APPLICATION_PACKAGES_POLICY
const ALL_APPLICATION_PACKAGES_POLICY: usize = 0x0002_000F;
/// PROCESS_CREATION_ALL_APPLICATION_PACKAGES_OPT_OUT
const ALL_APPLICATION_PACKAGES_OPT_OUT: u32 = 1;

pub trait ThreadAttribute {
    fn valid(&self) -> bool;
    fn lp_value(&self) -> Option<*const core::ffi::c_void>;
    fn attribute(&self) -> usize;
    fn cb_size(&self) -> usize;
}

/// Handles the child may inherit; everything else inheritable stays behind.
pub type ThreadAttributeHandles = Vec<HANDLE>;

impl ThreadAttribute for ThreadAttributeHandles {
    fn valid(&self) -> bool {
        !self.is_empty()
    }

    fn lp_value(&self) -> Option<*const core::ffi::c_void> {
        if self.is_empty() {
            None
        } else {
            Some(self.as_ptr() as *const core::ffi::c_void)
        }
    }

    fn attribute(&self) -> usize {
        Threading::PROC_THREAD_ATTRIBUTE_HANDLE_LIST as usize
    }

    fn cb_size(&self) -> usize {
        self.len() * std::mem::size_of::<HANDLE>()
    }
}

/// The container SID and its capabilities; the SIDs are borrowed from the container.
pub struct ThreadAttributeSecurityCapabilities {
    capabilities: SECURITY_CAPABILITIES,
    _attributes: Vec<SID_AND_ATTRIBUTES>,
}

impl ThreadAttributeSecurityCapabilities {
    pub fn new(container: &AppContainer) -> Self {
        let mut attributes: Vec<SID_AND_ATTRIBUTES> = container
            .capabilities()
            .iter()
            .map(|sid| SID_AND_ATTRIBUTES { Sid: sid.as_windows_psid(), Attributes: SE_GROUP_ENABLED })
            .collect();
        let capabilities = SECURITY_CAPABILITIES {
            AppContainerSid: container.sid().as_windows_psid(),
            Capabilities: if attributes.is_empty() { std::ptr::null_mut() } else { attributes.as_mut_ptr() },
            CapabilityCount: attributes.len() as u32,
            Reserved: 0,
        };
        Self { capabilities, _attributes: attributes }
    }
}

impl ThreadAttribute for ThreadAttributeSecurityCapabilities {
    fn valid(&self) -> bool {
        true
    }

    fn lp_value(&self) -> Option<*const core::ffi::c_void> {
        Some((&self.capabilities as *const SECURITY_CAPABILITIES).cast())
    }
    fn attribute(&self) -> usize {
        Threading::PROC_THREAD_ATTRIBUTE_SECURITY_CAPABILITIES as usize
    }
    fn cb_size(&self) -> usize {
        std::mem::size_of::<SECURITY_CAPABILITIES>()
    }
}

/// Opts the child out of the ALL APPLICATION PACKAGES group, making it a less-privileged container.
pub struct ThreadAttributeLpac {
    policy: u32,
}

impl Default for ThreadAttributeLpac {
    fn default() -> Self {
        Self { policy: ALL_APPLICATION_PACKAGES_OPT_OUT }
    }
}

impl ThreadAttribute for ThreadAttributeLpac {
    fn valid(&self) -> bool {
        true
    }

    fn lp_value(&self) -> Option<*const core::ffi::c_void> {
        Some((&self.policy as *const u32).cast())
    }
    fn attribute(&self) -> usize {
        ALL_APPLICATION_PACKAGES_POLICY
    }
    fn cb_size(&self) -> usize {
        std::mem::size_of::<u32>()
    }
}

pub struct ThreadAttributeList {
    // The list points into these values, so they live as long as it does.
    _attributes: Vec<Box<dyn ThreadAttribute>>,
    // Backing memory for the list itself.
    _attr_buf: Vec<u8>,
    attr_list: Option<Threading::LPPROC_THREAD_ATTRIBUTE_LIST>,
}

impl ThreadAttributeList {
    pub fn new(attributes: Vec<Box<dyn ThreadAttribute>>) -> Result<Self> {
        let attributes: Vec<Box<dyn ThreadAttribute>> =
            attributes.into_iter().filter(|f| f.valid()).collect();
        if attributes.is_empty() {
            return Ok(Self { _attributes: vec![], _attr_buf: vec![], attr_list: None });
        }
        unsafe {
            // The sizing call reports ERROR_INSUFFICIENT_BUFFER on success.
            let mut attr_size: usize = 0;
            if let Err(e) = Threading::InitializeProcThreadAttributeList(
                None,                    // query buffer size
                attributes.len() as u32, // number of attributes to set
                Some(0),                 // must be 0
                &mut attr_size,          // output required size in bytes
            ) {
                if GetLastError() != ERROR_INSUFFICIENT_BUFFER {
                    return Err(e).platform("InitializeProcThreadAttributeList");
                }
            }

            let mut attr_buf = vec![0u8; attr_size];
            let attr_list = Threading::LPPROC_THREAD_ATTRIBUTE_LIST(attr_buf.as_mut_ptr().cast::<_>());
            Threading::InitializeProcThreadAttributeList(
                Some(attr_list),
                attributes.len() as u32,
                Some(0),
                &mut attr_size,
            )
            .platform("InitializeProcThreadAttributeList")?;
            // From here on Drop deletes the list, even if an update fails.
            let mut ret = Self { _attributes: Vec::new(), _attr_buf: attr_buf, attr_list: Some(attr_list) };

            for attr in &attributes {
                Threading::UpdateProcThreadAttribute(
                    attr_list,
                    0, // dwFlags must be 0
                    attr.attribute(),
                    attr.lp_value(),
                    attr.cb_size(),
                    None, // previous value not wanted
                    None,
                )
                .platform("UpdateProcThreadAttribute")?;
            }

            ret._attributes = attributes;
            Ok(ret)
        }
    }

    /// `None` when no attributes were given.
    pub fn list(&self) -> Option<Threading::LPPROC_THREAD_ATTRIBUTE_LIST> {
        self.attr_list
    }
}

impl Drop for ThreadAttributeList {
    fn drop(&mut self) {
        if let Some(list) = self.attr_list.take() {
            unsafe { Threading::DeleteProcThreadAttributeList(list) };
        }
    }
}
