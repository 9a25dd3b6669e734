// SPDX-License-Identifier: MIT

//! Drive-letter alias for a directory.

use windows::Win32::Storage::FileSystem::{DDD_REMOVE_DEFINITION, DEFINE_DOS_DEVICE_FLAGS, DefineDosDeviceW, GetLogicalDrives};
use windows::core::PCWSTR;

use super::conv::wide;
use super::error::PlatformResultExt;
use crate::fs::FilePath;
use crate::runtime::error::{Result, SandboxError};
use crate::runtime::mount::{is_used, next_available};

/// `letter:` resolves to `target` until this is unmounted or dropped.
#[derive(Debug)]
pub struct MountedDisk {
    letter: char,
    target: FilePath,
    mounted: bool,
}

impl MountedDisk {
    /// Mount on `letter`, which must not belong to an attached volume.
    pub fn mount(target: &FilePath, letter: char) -> Result<Self> {
        let letter = letter.to_ascii_uppercase();
        if !letter.is_ascii_uppercase() {
            return Err(SandboxError::Configuration(format!("'{letter}' is not a drive letter")));
        }
        if is_used(letter, used_drives()) {
            return Err(SandboxError::Configuration(format!("drive {letter}: is already in use")));
        }
        define(DEFINE_DOS_DEVICE_FLAGS(0), letter, target).platform("DefineDosDeviceW")?;
        tracing::info!("mounted {target} as {letter}:");
        Ok(Self { letter, target: target.clone(), mounted: true })
    }

    /// Mount on `preferred`, or on the next free letter after it.
    pub fn mount_available(target: &FilePath, preferred: char) -> Result<Self> {
        let letter = next_available(preferred, used_drives())
            .ok_or_else(|| SandboxError::Configuration("no drive letter is free".to_string()))?;
        Self::mount(target, letter)
    }

    pub fn letter(&self) -> char {
        self.letter
    }

    pub fn target(&self) -> &FilePath {
        &self.target
    }

    /// `S:\` for a disk on `S`.
    pub fn root(&self) -> FilePath {
        FilePath::new(format!("{}:", self.letter))
    }

    pub fn unmount(&mut self) -> Result<()> {
        if !self.mounted {
            return Ok(());
        }
        define(DDD_REMOVE_DEFINITION, self.letter, &self.target).platform("DefineDosDeviceW")?;
        self.mounted = false;
        tracing::info!("unmounted {}:", self.letter);
        Ok(())
    }
}

impl Drop for MountedDisk {
    fn drop(&mut self) {
        if let Err(e) = self.unmount() {
            tracing::error!("failed to unmount {}: {e}", self.letter);
        }
    }
}

/// Bit mask of drive letters in use, `A` in bit 0.
pub fn used_drives() -> u32 {
    unsafe { GetLogicalDrives() }
}

fn define(flags: DEFINE_DOS_DEVICE_FLAGS, letter: char, target: &FilePath) -> windows::core::Result<()> {
    let device = wide(&format!("{letter}:"));
    let target = wide(&target.to_string());
    unsafe { DefineDosDeviceW(flags, PCWSTR(device.as_ptr()), PCWSTR(target.as_ptr())) }
}
