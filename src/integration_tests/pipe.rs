//! The broker over a real named pipe.

use std::sync::{Arc, Mutex};

use windows_sys::Win32::Storage::FileSystem::{READ_CONTROL, WRITE_DAC};

use crate::comm::message::{PipeMessage, Pos, Rect, Reply};
use crate::runtime::SandboxContext;
use crate::runtime::win32::acl::{AccessPermission, KernelObject, deny_access, string_security_descriptor};
use crate::runtime::win32::broker::BrokerHandler;
use crate::runtime::win32::named_pipe::PipeChannel;
use crate::runtime::win32::{NamedPipeServer, Trustee, connect};

use super::util;

fn pipe_path() -> String {
    format!(r"\\.\pipe\{}", util::unique_name("SandboxTest"))
}

#[test]
fn session_until_exit() {
    let ctx = SandboxContext::silent();
    let path = pipe_path();
    let user = Trustee::current_user().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = seen.clone();
    let mut server = NamedPipeServer::start(&ctx, &path, &[&user], move |message: PipeMessage| {
        recorded.lock().unwrap().push(message.clone());
        match message {
            PipeMessage::Exit => None,
            _ => Some(Reply::Empty),
        }
    })
    .unwrap();
    assert_eq!(server.path(), path);

    let client = connect(&path).unwrap();
    assert_eq!(client.send(&PipeMessage::SetCursorPos(Pos { x: 10, y: 20 })).unwrap(), Some(Reply::Empty));
    assert_eq!(client.send(&PipeMessage::SpeakSkip).unwrap(), Some(Reply::Empty));
    assert_eq!(client.send(&PipeMessage::Exit).unwrap(), None);
    server.stop();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![PipeMessage::SetCursorPos(Pos { x: 10, y: 20 }), PipeMessage::SpeakSkip, PipeMessage::Exit]
    );
}

#[test]
fn broker_answers_unclip() {
    let ctx = SandboxContext::silent();
    let path = pipe_path();
    let user = Trustee::current_user().unwrap();
    let _server = NamedPipeServer::start(&ctx, &path, &[&user], BrokerHandler::new()).unwrap();

    let client = connect(&path).unwrap();
    assert_eq!(client.send(&PipeMessage::ClipCursor(Rect::UNCLIP)).unwrap(), Some(Reply::Empty));
    assert_eq!(client.send(&PipeMessage::Exit).unwrap(), None);
}

#[test]
fn only_one_client() {
    let ctx = SandboxContext::silent();
    let path = pipe_path();
    let user = Trustee::current_user().unwrap();
    let _server = NamedPipeServer::start(&ctx, &path, &[&user], BrokerHandler::new()).unwrap();

    let first = connect(&path).unwrap();
    assert!(connect(&path).is_err());
    assert_eq!(first.send(&PipeMessage::Exit).unwrap(), None);
}

#[test]
fn stop_without_client() {
    let ctx = SandboxContext::silent();
    let user = Trustee::current_user().unwrap();
    let mut server = NamedPipeServer::start(&ctx, &pipe_path(), &[&user], BrokerHandler::new()).unwrap();
    server.stop();
    server.stop();
}

#[test]
fn deny_on_a_pipe_protects_its_dacl() {
    let ctx = SandboxContext::silent();
    let path = pipe_path();
    let user = Trustee::current_user().unwrap();
    let mut server = NamedPipeServer::start(&ctx, &path, &[&user], BrokerHandler::new()).unwrap();
    let container = util::container();
    let principal = Trustee::app_container(&container);

    let pipe = PipeChannel::open(&path, READ_CONTROL | WRITE_DAC).unwrap();
    let object = KernelObject { name: &path, handle: pipe.raw() };
    deny_access(&object, &principal, &[AccessPermission::GenericAll]).unwrap();
    let sddl = string_security_descriptor(&object).unwrap();
    assert!(sddl.starts_with("D:P"), "{sddl}");

    drop(pipe);
    server.stop();
}
