// SPDX-License-Identifier: MIT

//! Message-mode named pipes carrying the broker protocol.

use std::fs::OpenOptions;
use std::io;
use std::os::windows::fs::OpenOptionsExt;
use std::os::windows::io::IntoRawHandle;
use std::ptr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use windows::Win32::Foundation::HANDLE;
use windows_sys::Win32::Foundation::{
    ERROR_BROKEN_PIPE, ERROR_MORE_DATA, ERROR_NO_DATA, ERROR_PIPE_CONNECTED, ERROR_PIPE_NOT_CONNECTED, GetLastError,
    INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::Security::{
    InitializeSecurityDescriptor, PSECURITY_DESCRIPTOR, SECURITY_ATTRIBUTES, SECURITY_DESCRIPTOR,
    SetSecurityDescriptorDacl,
};
use windows_sys::Win32::Storage::FileSystem::{PIPE_ACCESS_DUPLEX, ReadFile, WriteFile};
use windows_sys::Win32::System::Pipes::{
    ConnectNamedPipe, CreateNamedPipeW, DisconnectNamedPipe, PIPE_READMODE_MESSAGE, PIPE_REJECT_REMOTE_CLIENTS,
    PIPE_TYPE_MESSAGE, PIPE_WAIT, SetNamedPipeHandleState,
};

use super::acl::{AccessMode, AccessPermission, OwnedAcl};
use super::conv::wide;
use super::error::{check_bool, last_error};
use super::handle::Handle;
use super::trustee::Trustee;
use crate::comm::channel::MessageChannel;
use crate::comm::client::PipeClient;
use crate::comm::message::MAX_MESSAGE_SIZE;
use crate::comm::server::{PipeHandler, serve};
use crate::runtime::context::SandboxContext;
use crate::runtime::error::{Result, SandboxError};

const SECURITY_DESCRIPTOR_REVISION: u32 = 1;

/// One end of a connected pipe.
pub struct PipeChannel {
    handle: Handle,
}

impl PipeChannel {
    pub fn from_handle(handle: Handle) -> Self {
        Self { handle }
    }

    /// Open an existing pipe with explicit access rights.
    pub fn open(path: &str, access: u32) -> io::Result<Self> {
        let file = OpenOptions::new().access_mode(access).open(path)?;
        Ok(Self { handle: Handle::new(HANDLE(file.into_raw_handle())) })
    }

    pub fn raw(&self) -> windows_sys::Win32::Foundation::HANDLE {
        self.handle.raw().0
    }
}

impl MessageChannel for PipeChannel {
    fn read_message(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut message = Vec::new();
        let mut buf = vec![0u8; MAX_MESSAGE_SIZE];
        loop {
            let mut read = 0u32;
            let ok = unsafe { ReadFile(self.raw(), buf.as_mut_ptr(), buf.len() as u32, &mut read, ptr::null_mut()) };
            message.extend_from_slice(&buf[..read as usize]);
            if ok != 0 {
                return Ok(Some(message));
            }
            match unsafe { GetLastError() } {
                // The rest of an oversized message follows; the decoder rejects it.
                ERROR_MORE_DATA => continue,
                ERROR_BROKEN_PIPE | ERROR_PIPE_NOT_CONNECTED | ERROR_NO_DATA => return Ok(None),
                code => return Err(io::Error::from_raw_os_error(code as i32)),
            }
        }
    }

    fn write_message(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut written = 0u32;
        let ok = unsafe { WriteFile(self.raw(), bytes.as_ptr(), bytes.len() as u32, &mut written, ptr::null_mut()) };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        if written as usize != bytes.len() {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "short pipe write"));
        }
        Ok(())
    }
}

/// Connect to a broker and switch the handle to message reads.
pub fn connect(path: &str) -> Result<PipeClient<PipeChannel>> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| SandboxError::file(path, e))?;
    let channel = PipeChannel::from_handle(Handle::new(HANDLE(file.into_raw_handle())));
    let mode = PIPE_READMODE_MESSAGE;
    check_bool("SetNamedPipeHandleState", unsafe {
        SetNamedPipeHandleState(channel.raw(), &mode, ptr::null(), ptr::null())
    })?;
    Ok(PipeClient::new(channel))
}

/// Accepts a single client on a background thread and serves it until it leaves.
///
/// Only the trustees given at creation may open the pipe.
pub struct NamedPipeServer {
    path: String,
    stopping: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl NamedPipeServer {
    pub fn start(
        ctx: &SandboxContext,
        path: &str,
        trustees: &[&Trustee],
        handler: impl PipeHandler + 'static,
    ) -> Result<Self> {
        let handle = create_pipe(path, trustees)?;
        let stopping = Arc::new(AtomicBool::new(false));

        let ctx = ctx.clone();
        let thread_stopping = stopping.clone();
        let thread_path = path.to_string();
        let mut handler = handler;
        let thread = thread::Builder::new().name("sandbox-broker".to_string()).spawn(move || {
            let _guard = ctx.enter();
            let mut channel = PipeChannel::from_handle(handle);
            let connected = unsafe { ConnectNamedPipe(channel.raw(), ptr::null_mut()) } != 0
                || unsafe { GetLastError() } == ERROR_PIPE_CONNECTED;
            if !connected {
                tracing::warn!("{thread_path}: {}", last_error("ConnectNamedPipe"));
                return;
            }
            if thread_stopping.load(Ordering::SeqCst) {
                return;
            }
            tracing::debug!("broker client connected to {thread_path}");
            if let Err(e) = serve(&mut channel, &mut handler) {
                tracing::warn!("broker session on {thread_path} ended: {e}");
            }
            unsafe { DisconnectNamedPipe(channel.raw()) };
        })?;

        tracing::info!("broker listening on {path}");
        Ok(Self { path: path.to_string(), stopping, thread: Some(thread) })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Stop accepting and wait for the session thread when it can be woken.
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.stopping.store(true, Ordering::SeqCst);
        if thread.is_finished() {
            let _ = thread.join();
            return;
        }
        // A blocked accept only returns once someone connects.
        match OpenOptions::new().read(true).write(true).open(&self.path) {
            Ok(wake) => {
                drop(wake);
                let _ = thread.join();
            }
            // Still serving a client; the thread ends when that client goes away.
            Err(_) => tracing::debug!("leaving broker thread for {} to finish on its own", self.path),
        }
    }
}

impl Drop for NamedPipeServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn create_pipe(path: &str, trustees: &[&Trustee]) -> Result<Handle> {
    let acl = OwnedAcl::with_entries(ptr::null(), trustees, AccessMode::Grant, &[AccessPermission::GenericAll])?;
    let mut descriptor: SECURITY_DESCRIPTOR = unsafe { std::mem::zeroed() };
    let psd = &mut descriptor as *mut SECURITY_DESCRIPTOR as PSECURITY_DESCRIPTOR;
    check_bool("InitializeSecurityDescriptor", unsafe {
        InitializeSecurityDescriptor(psd, SECURITY_DESCRIPTOR_REVISION)
    })?;
    check_bool("SetSecurityDescriptorDacl", unsafe { SetSecurityDescriptorDacl(psd, 1, acl.as_ptr(), 0) })?;
    let attributes = SECURITY_ATTRIBUTES {
        nLength: size_of::<SECURITY_ATTRIBUTES>() as u32,
        lpSecurityDescriptor: psd,
        bInheritHandle: 0,
    };

    let name = wide(path);
    let pipe = unsafe {
        CreateNamedPipeW(
            name.as_ptr(),
            PIPE_ACCESS_DUPLEX,
            PIPE_TYPE_MESSAGE | PIPE_READMODE_MESSAGE | PIPE_WAIT | PIPE_REJECT_REMOTE_CLIENTS,
            1, // one client
            MAX_MESSAGE_SIZE as u32,
            MAX_MESSAGE_SIZE as u32,
            0,
            &attributes,
        )
    };
    if pipe == INVALID_HANDLE_VALUE || pipe.is_null() {
        return Err(last_error("CreateNamedPipeW"));
    }
    Ok(Handle::new(HANDLE(pipe)))
}
