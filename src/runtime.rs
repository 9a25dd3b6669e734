// SPDX-License-Identifier: MIT

//! Manages the sandbox runtime: the isolated principal, the mounted game
//! directory, the child process, and the broker it talks to.
//!
//! The `run_sandbox` function is the main entry point.  It takes a
//! `SandboxConfig` with the tunables, a `LaunchEnvironment` describing the
//! unmodified game launch, and an `OutputConsumer` for the child's output.
//! Everything it sets up is released again before it returns the child's
//! exit code, including on the error path.

pub mod config;
pub mod context;
pub mod error;
pub mod mount;
pub mod spawn;

pub use config::{Capability, LaunchEnvironment, SandboxConfig, WellKnownCapability};
pub use context::SandboxContext;
pub use spawn::{LaunchSpec, OutputConsumer, PrintOutputConsumer};

#[cfg(target_os = "windows")]
pub mod win32;

#[cfg(target_os = "windows")]
pub mod sandbox;

#[cfg(target_os = "windows")]
pub fn run_sandbox(
    ctx: &SandboxContext,
    config: SandboxConfig,
    env: &LaunchEnvironment,
    output: Box<dyn OutputConsumer>,
) -> Result<i32, error::SandboxError> {
    sandbox::FabricSandbox::new(config).run(ctx, env, output)
}
