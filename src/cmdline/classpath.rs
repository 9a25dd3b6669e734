// SPDX-License-Identifier: MIT

//! Classpath relocation into the mounted sandbox root.
//!
//! Entries inside the data directory are reachable through the mount and are
//! only re-pathed.  Anything else is copied into a staging directory on the
//! mount.  Every move is recorded so later properties that name the old
//! locations can be translated.

use std::collections::HashMap;

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::fs::FilePath;
use crate::runtime::error::Result;

pub const CLASSPATH_DIR: &str = ".classpath";
pub const REMAP_CLASSPATH_DIR: &str = ".remapClasspath";
pub const REMAP_CLASSPATH_FILE: &str = "remapClasspath.txt";

/// Old path to sandboxed path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClasspathMapping {
    entries: HashMap<FilePath, FilePath>,
}

impl ClasspathMapping {
    pub fn insert(&mut self, source: FilePath, target: FilePath) {
        self.entries.insert(source, target);
    }

    pub fn get(&self, source: &FilePath) -> Option<&FilePath> {
        self.entries.get(source)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FilePath, &FilePath)> {
        self.entries.iter()
    }

    /// Translate one entry, warning when an existing path was never relocated.
    pub fn translate(&self, entry: &str) -> String {
        let path = FilePath::new(entry);
        match self.get(&path) {
            Some(target) => target.to_string(),
            None => {
                if path.exists() {
                    warn!(path = %path, "classpath entry was not relocated into the sandbox");
                }
                entry.to_string()
            }
        }
    }
}

pub struct ClasspathStager<'a> {
    data_dir: &'a FilePath,
    sandbox_root: &'a FilePath,
    mapping: ClasspathMapping,
}

impl<'a> ClasspathStager<'a> {
    /// Clears out staging directories left by a previous run.
    pub fn new(data_dir: &'a FilePath, sandbox_root: &'a FilePath) -> Result<Self> {
        sandbox_root.child(CLASSPATH_DIR).delete()?;
        sandbox_root.child(REMAP_CLASSPATH_DIR).delete()?;
        Ok(Self { data_dir, sandbox_root, mapping: ClasspathMapping::default() })
    }

    pub fn mapping(&self) -> &ClasspathMapping {
        &self.mapping
    }

    pub fn into_mapping(self) -> ClasspathMapping {
        self.mapping
    }

    /// Rewrite a `;` separated classpath.
    pub fn rewrite_classpath(&mut self, classpath: &str) -> Result<String> {
        let staging = self.sandbox_root.child(CLASSPATH_DIR);
        let mut rewritten = vec![];
        for entry in split_entries(classpath) {
            if let Some((source, target)) = self.relocate(entry, &staging)? {
                rewritten.push(target.to_string());
                self.mapping.insert(source, target);
            }
        }
        Ok(rewritten.join(";"))
    }

    /// Rewrite the entries of a remap classpath file into a new file on the
    /// mount, returning the new file's path.
    ///
    /// These copies are not recorded in the mapping; indirect references
    /// must keep pointing at the classpath copies.
    pub fn rewrite_remap_file(&mut self, file: &str) -> Result<String> {
        let contents = FilePath::new(file).read_string()?;
        let staging = self.sandbox_root.child(REMAP_CLASSPATH_DIR);
        let mut rewritten = vec![];
        for entry in split_entries(&contents) {
            if let Some((_, target)) = self.relocate(entry, &staging)? {
                rewritten.push(target.to_string());
            }
        }
        staging.create_dir_all()?;
        let out = staging.child(REMAP_CLASSPATH_FILE);
        out.write_string(&rewritten.join(";"))?;
        Ok(out.to_string())
    }

    /// Where `entry` lives on the mount, copying it there when it is outside the data directory.
    fn relocate(&self, entry: &str, staging: &FilePath) -> Result<Option<(FilePath, FilePath)>> {
        let source = FilePath::new(entry);
        if let Some(target) = source.rebase(self.data_dir, self.sandbox_root) {
            if !source.exists() {
                warn!(path = %source, "classpath entry does not exist");
            }
            return Ok(Some((source, target)));
        }
        if !source.exists() {
            warn!(path = %source, "dropping missing classpath entry");
            return Ok(None);
        }

        let target = staging.child(staged_name(&source, staging));
        debug!(from = %source, to = %target, "staging classpath entry");
        staging.create_dir_all()?;
        source.copy_to(&target)?;
        Ok(Some((source, target)))
    }
}

fn split_entries(list: &str) -> impl Iterator<Item = &str> {
    list.split(';').map(str::trim).filter(|e| !e.is_empty())
}

/// Name for a copy in the staging directory.  Directories always get a hash
/// suffix; files only when the plain name is already taken.
fn staged_name(source: &FilePath, staging: &FilePath) -> String {
    let name = source.name().unwrap_or("root");
    if source.is_dir() {
        return format!("{name}_{}", short_hash(source));
    }
    if !staging.child(name).exists() {
        return name.to_string();
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}_{}.{ext}", short_hash(source)),
        _ => format!("{name}_{}", short_hash(source)),
    }
}

/// First 8 hex digits of the SHA-256 of the path.
fn short_hash(source: &FilePath) -> String {
    let digest = Sha256::digest(source.to_string().as_bytes());
    let hex = format!("{digest:x}");
    hex[..8].to_string()
}
