// SPDX-License-Identifier: MIT

//! Job object that takes its member processes down with it.

use std::mem;

use windows::Win32::Foundation::HANDLE;
use windows::Win32::System::JobObjects::{
    AssignProcessToJobObject, CreateJobObjectW, JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE,
    JOBOBJECT_EXTENDED_LIMIT_INFORMATION, JobObjectExtendedLimitInformation, SetInformationJobObject,
};
use windows::core::PCWSTR;

use super::error::PlatformResultExt;
use super::handle::Handle;
use crate::runtime::error::Result;

/// Closing the last handle terminates every process in the job.
pub struct JobObject {
    handle: Handle,
}

impl JobObject {
    pub fn kill_on_close() -> Result<Self> {
        let handle = Handle::new(unsafe { CreateJobObjectW(None, PCWSTR::null()) }.platform("CreateJobObjectW")?);

        let mut limits: JOBOBJECT_EXTENDED_LIMIT_INFORMATION = unsafe { mem::zeroed() };
        limits.BasicLimitInformation.LimitFlags = JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE;
        unsafe {
            SetInformationJobObject(
                handle.raw(),
                JobObjectExtendedLimitInformation,
                &limits as *const _ as *const core::ffi::c_void,
                mem::size_of::<JOBOBJECT_EXTENDED_LIMIT_INFORMATION>() as u32,
            )
        }
        .platform("SetInformationJobObject")?;
        Ok(Self { handle })
    }

    pub fn assign(&self, process: HANDLE) -> Result<()> {
        unsafe { AssignProcessToJobObject(self.handle.raw(), process) }.platform("AssignProcessToJobObject")
    }
}
