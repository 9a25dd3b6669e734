// SPDX-License-Identifier: MIT

//! Runs one game session inside the sandbox: principal, mount, grants, broker, then the child.

use rand::Rng;
use rand::distr::Alphanumeric;

use crate::cmdline::{RewriteOptions, SandboxCommandLine, TEMP_DIR};
use crate::fs::FilePath;
use crate::runtime::config::{LaunchEnvironment, SandboxConfig};
use crate::runtime::context::SandboxContext;
use crate::runtime::error::{Result, SandboxError};
use crate::runtime::spawn::{LaunchSpec, OutputConsumer};
use crate::runtime::win32::acl::{AccessPermission, grant_access};
use crate::runtime::win32::broker::BrokerHandler;
use crate::runtime::win32::discord::grant_access_to_discord_pipes;
use crate::runtime::win32::{AppContainer, MountedDisk, NamedPipeServer, SandboxedProcess, TemporaryAccess, Trustee};

const PIPE_SUFFIX_LEN: usize = 10;

const READ_EXECUTE: [AccessPermission; 2] = [AccessPermission::GenericRead, AccessPermission::GenericExecute];

pub struct FabricSandbox {
    config: SandboxConfig,
}

impl FabricSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Launch the game described by `env` and block until it exits, returning its exit code.
    ///
    /// Everything set up here is torn down again before returning, in reverse order.
    pub fn run(&self, ctx: &SandboxContext, env: &LaunchEnvironment, output: Box<dyn OutputConsumer>) -> Result<i32> {
        let _log = ctx.enter();
        self.config.validate()?;

        let command_line = SandboxCommandLine::new(env.args.clone());
        let java = command_line.application_path()?;
        let java_home = command_line.java_home()?;
        let dev = command_line.is_dev_env();
        let data_dir = if dev { env.working_dir.clone() } else { env.minecraft_dir()? };
        // Only the data directory is mounted, so the game has to run somewhere inside it.
        let relative_working_dir = env
            .working_dir
            .relative_to(&data_dir)
            .ok_or_else(|| {
                SandboxError::Configuration(format!(
                    "working directory {} must be inside {data_dir}",
                    env.working_dir
                ))
            })?
            .to_vec();

        let config = &self.config;
        let container = AppContainer::create(
            &config.principal_name,
            &config.principal_description,
            &config.capabilities,
            config.lpac,
        )?;
        let principal = Trustee::app_container(&container);

        let disk = MountedDisk::mount_available(&data_dir, config.preferred_drive)?;
        let root = disk.root();
        let working_dir = relative_working_dir.iter().fold(root.clone(), |dir, part| dir.child(part));
        let temp_dir = ScratchDir::create(root.child(TEMP_DIR))?;

        if working_dir == root {
            // The game can then also write the launcher's own files; this is the common layout.
            grant_access(&root, &principal, &[AccessPermission::GenericAll])?;
        } else {
            grant_access(&root, &principal, &READ_EXECUTE)?;
            grant_access(&working_dir, &principal, &[AccessPermission::GenericAll])?;
            grant_access(temp_dir.path(), &principal, &[AccessPermission::GenericAll])?;
        }
        grant_access(&java_home, &principal, &READ_EXECUTE)?;

        let mut dev_access = TemporaryAccess::new();
        if dev {
            // Development keeps these outside the mount, so they need their own grants.
            if let Some(assets) = command_line.assets_dir() {
                dev_access.grant(&assets, &principal, &READ_EXECUTE)?;
            }
            if let Some(log_config) = command_line.log_config() {
                dev_access.grant(&log_config, &principal, &[AccessPermission::GenericRead])?;
            }
        }

        let user = Trustee::current_user()?;
        let pipe_path = format!("{}{}", config.pipe_prefix, random_suffix(PIPE_SUFFIX_LEN));
        let _broker = NamedPipeServer::start(ctx, &pipe_path, &[&principal, &user], BrokerHandler::new())?;

        if config.grant_discord_pipes {
            match grant_access_to_discord_pipes(&principal) {
                Ok(0) => (),
                Ok(count) => tracing::debug!("granted access to {count} Discord pipes"),
                Err(e) => tracing::warn!("could not grant access to Discord pipes: {e}"),
            }
        }

        let rewritten = command_line.rewrite(&RewriteOptions {
            data_dir: &data_dir,
            sandbox_root: &root,
            pipe_path: &pipe_path,
            extra_jvm_args: &config.extra_jvm_args,
        })?;
        tracing::debug!("staged {} classpath entries", rewritten.classpath.len());

        tracing::info!("launching in sandbox on {root}");
        let spec = LaunchSpec { application: java, args: rewritten.args, working_dir };
        let exit_code = SandboxedProcess::new(spec, Some(&container)).run(ctx, output)?;
        tracing::info!("exit code: {exit_code}");
        Ok(exit_code)
    }
}

/// Directory created for the run and deleted afterwards.
struct ScratchDir {
    path: FilePath,
}

impl ScratchDir {
    fn create(path: FilePath) -> Result<Self> {
        path.create_dir_all()?;
        Ok(Self { path })
    }

    fn path(&self) -> &FilePath {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = self.path.delete() {
            tracing::warn!("could not delete {}: {e}", self.path);
        }
    }
}

fn random_suffix(len: usize) -> String {
    rand::rng().sample_iter(&Alphanumeric).take(len).map(char::from).collect()
}
