// SPDX-License-Identifier: MIT

//! Tunables for a sandbox run, and the process inputs it starts from.

use std::env;

use crate::cmdline::expand_arg_files;
use crate::fs::FilePath;
use crate::runtime::error::{Result, SandboxError};

/// Capabilities the operating system knows by a fixed identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnownCapability {
    InternetClient,
    InternetClientServer,
    PrivateNetworkClientServer,
    PicturesLibrary,
    VideosLibrary,
    MusicLibrary,
    DocumentsLibrary,
    EnterpriseAuthentication,
    SharedUserCertificates,
    RemovableStorage,
    Appointments,
    Contacts,
}

/// One entry in the principal's capability allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    WellKnown(WellKnownCapability),
    /// Free-form capability name, resolved to a derived SID at creation time.
    Named(String),
}

impl Capability {
    pub fn named(name: impl Into<String>) -> Self {
        Capability::Named(name.into())
    }
}

impl From<WellKnownCapability> for Capability {
    fn from(value: WellKnownCapability) -> Self {
        Capability::WellKnown(value)
    }
}

/// Default drive letter for the virtual mount.
pub const DEFAULT_DRIVE: char = 'S';
pub const DEFAULT_PRINCIPAL_NAME: &str = "Fabric Sandbox";
pub const DEFAULT_PIPE_PREFIX: &str = r"\\.\pipe\FabricSandbox";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxConfig {
    pub principal_name: String,
    pub principal_description: String,
    pub capabilities: Vec<Capability>,
    /// Run the child as a less-privileged AppContainer.
    pub lpac: bool,
    /// Drive letter tried first; the next free letter is used if it is taken.
    pub preferred_drive: char,
    /// The broker pipe name is this prefix plus a random suffix.
    pub pipe_prefix: String,
    /// Added to the JVM arguments alongside the sandbox properties.
    pub extra_jvm_args: Vec<String>,
    /// Let the principal reach the Discord rich-presence pipes.
    pub grant_discord_pipes: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            principal_name: DEFAULT_PRINCIPAL_NAME.to_string(),
            principal_description: DEFAULT_PRINCIPAL_NAME.to_string(),
            capabilities: vec![
                WellKnownCapability::InternetClient.into(),
                WellKnownCapability::InternetClientServer.into(),
                WellKnownCapability::PrivateNetworkClientServer.into(),
            ],
            lpac: false,
            preferred_drive: DEFAULT_DRIVE,
            pipe_prefix: DEFAULT_PIPE_PREFIX.to_string(),
            extra_jvm_args: Vec::new(),
            grant_discord_pipes: true,
        }
    }
}

impl SandboxConfig {
    /// Checks that do not need the operating system.
    pub fn validate(&self) -> Result<()> {
        if self.principal_name.trim().is_empty() {
            return Err(SandboxError::Configuration("principal name is empty".to_string()));
        }
        if !self.preferred_drive.is_ascii_alphabetic() {
            return Err(SandboxError::Configuration(format!(
                "'{}' is not a drive letter",
                self.preferred_drive
            )));
        }
        if !self.pipe_prefix.starts_with(r"\\.\pipe\") {
            return Err(SandboxError::Configuration(format!(
                "pipe prefix {} is not a local pipe name",
                self.pipe_prefix
            )));
        }
        Ok(())
    }
}

/// External inputs of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchEnvironment {
    /// The launch command, `@argfile` tokens already expanded. The first entry is the program.
    pub args: Vec<String>,
    pub working_dir: FilePath,
    pub app_data: Option<FilePath>,
}

impl LaunchEnvironment {
    pub fn new(args: Vec<String>, working_dir: FilePath, app_data: Option<FilePath>) -> Result<Self> {
        Ok(Self { args: expand_arg_files(args)?, working_dir, app_data })
    }

    /// Reads the arguments after this program's own name, the current directory, and `APPDATA`.
    pub fn from_process() -> Result<Self> {
        let args: Vec<String> = env::args().skip(1).collect();
        let working_dir = FilePath::from_path(&env::current_dir()?);
        let app_data = env::var_os("APPDATA")
            .filter(|v| !v.is_empty())
            .map(|v| FilePath::new(v.to_string_lossy()));
        Self::new(args, working_dir, app_data)
    }

    /// `APPDATA\.minecraft`, which must already exist.
    pub fn minecraft_dir(&self) -> Result<FilePath> {
        let app_data = self
            .app_data
            .as_ref()
            .ok_or_else(|| SandboxError::Configuration("APPDATA is not set".to_string()))?;
        let dir = app_data.child(".minecraft");
        if !dir.is_dir() {
            return Err(SandboxError::NotFound(dir.to_string()));
        }
        Ok(dir)
    }
}
