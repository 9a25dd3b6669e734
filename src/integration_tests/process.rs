//! Launching child processes.

use crate::runtime::SandboxContext;
use crate::runtime::spawn::LaunchSpec;
use crate::runtime::win32::SandboxedProcess;

use super::util;

fn cmd(args: &[&str]) -> LaunchSpec {
    let system32 = util::system32();
    let mut all = vec!["cmd.exe".to_string()];
    all.extend(args.iter().map(|a| a.to_string()));
    LaunchSpec { application: system32.child("cmd.exe"), args: all, working_dir: system32 }
}

#[test]
fn output_is_collected() {
    let (output, text) = util::collector();
    let code = SandboxedProcess::new(cmd(&["/c", "echo", "hello"]), None)
        .run(&SandboxContext::silent(), output)
        .unwrap();
    assert_eq!(code, 0);
    assert_eq!(text.lock().unwrap().trim(), "hello");
}

#[test]
fn exit_code_is_returned() {
    let (output, _) = util::collector();
    let code = SandboxedProcess::new(cmd(&["/c", "exit", "3"]), None)
        .run(&SandboxContext::silent(), output)
        .unwrap();
    assert_eq!(code, 3);
}

#[test]
fn runs_inside_the_container() {
    let container = util::container();
    let (output, text) = util::collector();
    let code = SandboxedProcess::new(cmd(&["/c", "echo", "sandboxed"]), Some(&container))
        .run(&SandboxContext::silent(), output)
        .unwrap();
    assert_eq!(code, 0);
    assert_eq!(text.lock().unwrap().trim(), "sandboxed");
}

#[test]
fn missing_program() {
    let (output, _) = util::collector();
    let spec = LaunchSpec {
        application: util::system32().child("no-such-program.exe"),
        args: vec!["no-such-program.exe".to_string()],
        working_dir: util::system32(),
    };
    let err = SandboxedProcess::new(spec, None).run(&SandboxContext::silent(), output).unwrap_err();
    assert_eq!(err.platform_code(), Some(2));
}
