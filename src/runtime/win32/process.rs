// SPDX-License-Identifier: MIT

//! Launch the child under the AppContainer, bound to a kill-on-close job.

use std::fs::File;
use std::mem;
use std::os::windows::io::FromRawHandle;
use std::thread;

use windows::Win32::Foundation::{
    HANDLE, HANDLE_FLAG_INHERIT, HANDLE_FLAGS, SetHandleInformation, WAIT_FAILED,
};
use windows::Win32::Security::SECURITY_ATTRIBUTES;
use windows::Win32::System::Pipes::CreatePipe;
use windows::Win32::System::Threading::{
    self, CREATE_SUSPENDED, EXTENDED_STARTUPINFO_PRESENT, GetExitCodeProcess, INFINITE, PROCESS_CREATION_FLAGS,
    PROCESS_INFORMATION, ResumeThread, STARTF_USESTDHANDLES, STARTUPINFOEXW, TerminateProcess, WaitForSingleObject,
};
use windows::core::{PCWSTR, PWSTR};

use super::appcontainer::AppContainer;
use super::attribute_list::{
    ThreadAttribute, ThreadAttributeHandles, ThreadAttributeList, ThreadAttributeLpac,
    ThreadAttributeSecurityCapabilities,
};
use super::conv::wide;
use super::error::{PlatformResultExt, last_error};
use super::handle::Handle;
use super::job::JobObject;
use crate::cmdline::quote::quote_arguments;
use crate::runtime::context::SandboxContext;
use crate::runtime::error::{Result, SandboxError};
use crate::runtime::spawn::{LaunchSpec, OutputConsumer, drain_output};

/// Exit code given to a child killed before it was resumed.
const ABANDONED_EXIT_CODE: u32 = 1;

pub struct SandboxedProcess<'a> {
    spec: LaunchSpec,
    container: Option<&'a AppContainer>,
}

impl<'a> SandboxedProcess<'a> {
    /// Without a container the child runs as the current user, still inside a job.
    pub fn new(spec: LaunchSpec, container: Option<&'a AppContainer>) -> Self {
        Self { spec, container }
    }

    /// Run to completion, streaming stdout and stderr to `output`, and return the exit code.
    pub fn run(self, ctx: &SandboxContext, mut output: Box<dyn OutputConsumer>) -> Result<i32> {
        let (read, mut write) = output_pipe()?;

        let mut attributes: Vec<Box<dyn ThreadAttribute>> = vec![Box::new(ThreadAttributeHandles::from([write.raw()]))];
        if let Some(container) = self.container {
            attributes.push(Box::new(ThreadAttributeSecurityCapabilities::new(container)));
            if container.lpac() {
                attributes.push(Box::new(ThreadAttributeLpac::default()));
            }
        }
        let attribute_list = ThreadAttributeList::new(attributes)?;

        let mut startup: STARTUPINFOEXW = unsafe { mem::zeroed() };
        startup.StartupInfo.cb = mem::size_of::<STARTUPINFOEXW>() as u32;
        startup.StartupInfo.dwFlags = STARTF_USESTDHANDLES;
        startup.StartupInfo.hStdOutput = write.raw();
        startup.StartupInfo.hStdError = write.raw();
        let mut flags: PROCESS_CREATION_FLAGS = CREATE_SUSPENDED;
        if let Some(list) = attribute_list.list() {
            startup.lpAttributeList = list;
            flags |= EXTENDED_STARTUPINFO_PRESENT;
        }

        let application = wide(&self.spec.application.to_string());
        let mut command_line = quote_arguments(&self.spec.args)?;
        let working_dir = wide(&self.spec.working_dir.to_string());

        let mut info = PROCESS_INFORMATION::default();
        unsafe {
            Threading::CreateProcessW(
                PCWSTR(application.as_ptr()),
                Some(PWSTR(command_line.as_mut_ptr())),
                None, // process attributes
                None, // thread attributes
                true, // the handle list attribute limits what is actually inherited
                flags,
                None, // inherit the environment
                PCWSTR(working_dir.as_ptr()),
                &startup.StartupInfo,
                &mut info,
            )
        }
        .platform("CreateProcessW")?;
        let mut child = SuspendedChild {
            process: Handle::new(info.hProcess),
            thread: Handle::new(info.hThread),
            resumed: false,
        };
        tracing::info!("started {} (pid {})", self.spec.application, info.dwProcessId);

        // Assigned before the child runs any code, so it cannot outlive us.
        let job = JobObject::kill_on_close()?;
        job.assign(child.process.raw())?;

        // The child holds its own copy now; end-of-stream arrives once it exits.
        write.close()?;
        drop(attribute_list);

        let drain_ctx = ctx.clone();
        let drain = thread::Builder::new()
            .name("sandbox-output".to_string())
            .spawn(move || {
                drain_ctx.in_scope(|| {
                    let mut read = read;
                    let Some(handle) = read.take() else {
                        return Ok(());
                    };
                    let mut source = unsafe { File::from_raw_handle(handle.0) };
                    drain_output(&mut source, &mut *output)
                })
            })?;

        child.resume()?;
        let exit_code = child.wait()?;
        match drain.join() {
            Ok(Ok(())) => (),
            Ok(Err(e)) => tracing::warn!("reading child output failed: {e}"),
            Err(_) => tracing::error!("child output thread panicked"),
        }
        tracing::info!("{} exited with {exit_code}", self.spec.application);
        drop(job);
        Ok(exit_code)
    }
}

/// Terminated on drop unless it was resumed.
struct SuspendedChild {
    process: Handle,
    thread: Handle,
    resumed: bool,
}

impl SuspendedChild {
    fn resume(&mut self) -> Result<()> {
        if unsafe { ResumeThread(self.thread.raw()) } == u32::MAX {
            return Err(last_error("ResumeThread"));
        }
        self.resumed = true;
        self.thread.close()
    }

    fn wait(&self) -> Result<i32> {
        if unsafe { WaitForSingleObject(self.process.raw(), INFINITE) } == WAIT_FAILED {
            return Err(last_error("WaitForSingleObject"));
        }
        let mut code = 0u32;
        unsafe { GetExitCodeProcess(self.process.raw(), &mut code) }.platform("GetExitCodeProcess")?;
        Ok(code as i32)
    }
}

impl Drop for SuspendedChild {
    fn drop(&mut self) {
        if !self.resumed {
            let _ = unsafe { TerminateProcess(self.process.raw(), ABANDONED_EXIT_CODE) };
        }
    }
}

/// Anonymous pipe whose write end (second) is inheritable and read end (first) is not.
fn output_pipe() -> Result<(Handle, Handle)> {
    let sa = SECURITY_ATTRIBUTES {
        nLength: mem::size_of::<SECURITY_ATTRIBUTES>() as u32,
        lpSecurityDescriptor: std::ptr::null_mut(),
        bInheritHandle: true.into(),
    };
    let mut read = HANDLE::default();
    let mut write = HANDLE::default();
    unsafe { CreatePipe(&mut read, &mut write, Some(&sa), 0) }.platform("CreatePipe")?;
    let (read, write) = (Handle::new(read), Handle::new(write));
    unsafe { SetHandleInformation(read.raw(), HANDLE_FLAG_INHERIT.0, HANDLE_FLAGS(0)) }.platform("SetHandleInformation")?;
    if read.raw().is_invalid() || write.raw().is_invalid() {
        return Err(SandboxError::Process("CreatePipe returned an invalid handle".to_string()));
    }
    Ok((read, write))
}
