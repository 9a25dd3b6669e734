//! # fabric-sandbox
//!
//! Runs an unmodified Fabric Minecraft launch inside a Windows AppContainer,
//! with the game directory mounted on its own drive letter and a named-pipe
//! broker for the few operations the container may not perform itself.
//!
//! The path, command-line, and broker protocol modules are portable; the
//! parts that talk to the operating system only build on Windows.

pub mod cmdline;
pub mod comm;
pub mod fs;
pub mod runtime;

#[cfg(all(test, target_os = "windows"))]
mod integration_tests;

pub use runtime::error::{Result, SandboxError};
pub use runtime::{LaunchEnvironment, OutputConsumer, PrintOutputConsumer, SandboxConfig, SandboxContext};

#[cfg(target_os = "windows")]
pub use runtime::run_sandbox;
