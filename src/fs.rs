// SPDX-License-Identifier: MIT

//! Canonical path handling and the filesystem primitives the sandbox needs.
//!
//! Launch command lines mix `/` and `\` freely, so paths are kept as a list
//! of components and rendered with the host separator on demand.

use std::fmt::{self, Display};
use std::fs;
use std::io;
use std::path::{MAIN_SEPARATOR, Path, PathBuf};

use walkdir::WalkDir;

use crate::runtime::error::{Result, SandboxError};

/// What comes before the first component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Root {
    Relative,
    /// `\dir`
    Rooted,
    /// `\\server\share`
    Unc,
    /// `\\?\`
    Verbatim,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilePath {
    root: Root,
    parts: Vec<String>,
}

impl FilePath {
    pub fn new(path: impl AsRef<str>) -> Self {
        let path = path.as_ref();
        let is_sep = |c: char| c == '/' || c == '\\';
        let mut chars = path.chars();
        let root = match (chars.next(), chars.next(), chars.next(), chars.next()) {
            (Some(a), Some(b), Some('?'), Some(d)) if is_sep(a) && is_sep(b) && is_sep(d) => Root::Verbatim,
            (Some(a), Some(b), _, _) if is_sep(a) && is_sep(b) => Root::Unc,
            (Some(a), _, _, _) if is_sep(a) => Root::Rooted,
            _ => Root::Relative,
        };
        let body = match root {
            Root::Verbatim => &path[4..],
            _ => path,
        };
        let mut parts: Vec<String> = Vec::new();
        for part in body.split(['/', '\\']) {
            match part {
                "" | "." => (),
                ".." => {
                    // The server and share of a UNC path are never popped.
                    let floor = if root == Root::Unc { 2 } else { 0 };
                    let poppable = parts.len() > floor && parts.last().is_some_and(|p| p != ".." && !is_drive(p));
                    if poppable {
                        parts.pop();
                    } else if root == Root::Relative && !parts.first().is_some_and(|p| is_drive(p)) {
                        parts.push("..".to_string());
                    }
                }
                p => parts.push(p.to_string()),
            }
        }
        Self { root, parts }
    }

    pub fn from_path(path: &Path) -> Self {
        Self::new(path.to_string_lossy())
    }

    pub fn is_absolute(&self) -> bool {
        self.root != Root::Relative || self.parts.first().is_some_and(|p| is_drive(p))
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// The final component, if it is not a bare drive.
    pub fn name(&self) -> Option<&str> {
        match self.parts.last() {
            Some(p) if !(self.parts.len() == 1 && is_drive(p)) => Some(p.as_str()),
            _ => None,
        }
    }

    pub fn parent(&self) -> Option<FilePath> {
        self.name()?;
        let mut parts = self.parts.clone();
        parts.pop();
        Some(Self { root: self.root, parts })
    }

    /// Append one or more components; `name` may itself contain separators.
    pub fn child(&self, name: impl AsRef<str>) -> FilePath {
        let mut ret = self.clone();
        ret.parts.extend(FilePath::new(name).parts);
        ret
    }

    /// Strictly below `other`.
    pub fn is_child_of(&self, other: &FilePath) -> bool {
        self.parts.len() > other.parts.len() && self.starts_with(other)
    }

    /// Equal to `other` or below it.
    pub fn is_within(&self, other: &FilePath) -> bool {
        self.parts.len() >= other.parts.len() && self.starts_with(other)
    }

    /// Components of `self` below `base`, or `None` when `self` is not within `base`.
    pub fn relative_to(&self, base: &FilePath) -> Option<&[String]> {
        if self.is_within(base) {
            Some(&self.parts[base.parts.len()..])
        } else {
            None
        }
    }

    /// Move `self` from under `from` to the same relative place under `to`.
    pub fn rebase(&self, from: &FilePath, to: &FilePath) -> Option<FilePath> {
        let rel = self.relative_to(from)?;
        let mut ret = to.clone();
        ret.parts.extend(rel.iter().cloned());
        Some(ret)
    }

    fn starts_with(&self, other: &FilePath) -> bool {
        self.root == other.root
            && self.parts.iter().zip(other.parts.iter()).all(|(a, b)| part_eq(a, b))
    }

    pub fn as_path_buf(&self) -> PathBuf {
        PathBuf::from(self.to_string())
    }

    pub fn exists(&self) -> bool {
        self.as_path_buf().exists()
    }

    pub fn is_dir(&self) -> bool {
        self.as_path_buf().is_dir()
    }

    pub fn is_file(&self) -> bool {
        self.as_path_buf().is_file()
    }

    pub fn is_symlink(&self) -> bool {
        self.as_path_buf().is_symlink()
    }

    pub fn create_dir_all(&self) -> Result<()> {
        fs::create_dir_all(self.as_path_buf()).map_err(|e| SandboxError::file(self, e))
    }

    /// Remove a file or a whole directory tree.  Missing paths are not an error.
    pub fn delete(&self) -> Result<()> {
        let path = self.as_path_buf();
        let ret = match fs::symlink_metadata(&path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&path),
            Ok(_) => fs::remove_file(&path),
        };
        ret.map_err(|e| SandboxError::file(self, e))
    }

    /// Copy a file, or a directory recursively, to `dest`.
    pub fn copy_to(&self, dest: &FilePath) -> Result<()> {
        let src = self.as_path_buf();
        if !src.exists() {
            return Err(SandboxError::NotFound(self.to_string()));
        }
        if src.is_file() {
            if let Some(parent) = dest.parent() {
                parent.create_dir_all()?;
            }
            fs::copy(&src, dest.as_path_buf()).map_err(|e| SandboxError::file(self, e))?;
            return Ok(());
        }
        let dest_root = dest.as_path_buf();
        for entry in WalkDir::new(&src) {
            let entry = entry.map_err(|e| SandboxError::file(self, e.into()))?;
            let rel = entry
                .path()
                .strip_prefix(&src)
                .map_err(|e| SandboxError::file(self, io::Error::other(e)))?;
            let target = dest_root.join(rel);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)
            } else {
                fs::copy(entry.path(), &target).map(|_| ())
            }
            .map_err(|e| SandboxError::file(target.display(), e))?;
        }
        Ok(())
    }

    pub fn read_string(&self) -> Result<String> {
        fs::read_to_string(self.as_path_buf()).map_err(|e| SandboxError::file(self, e))
    }

    pub fn write_string(&self, contents: &str) -> Result<()> {
        fs::write(self.as_path_buf(), contents).map_err(|e| SandboxError::file(self, e))
    }

    /// Follow a symbolic link to its final target.
    pub fn resolve_link(&self) -> Result<FilePath> {
        if !self.is_symlink() {
            return Ok(self.clone());
        }
        let target = fs::canonicalize(self.as_path_buf()).map_err(|e| SandboxError::file(self, e))?;
        // canonicalize() hands back the extended-length form; keep the plain Win32 form.
        let target = target.to_string_lossy();
        Ok(FilePath::new(target.strip_prefix(r"\\?\").unwrap_or(&target)))
    }
}

impl Display for FilePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = MAIN_SEPARATOR.to_string();
        match self.root {
            Root::Relative => (),
            Root::Rooted => f.write_str(&sep)?,
            Root::Unc => write!(f, "{sep}{sep}")?,
            Root::Verbatim => write!(f, "{sep}{sep}?{sep}")?,
        }
        match self.parts.as_slice() {
            [drive] if matches!(self.root, Root::Relative | Root::Verbatim) && is_drive(drive) => {
                write!(f, "{drive}{sep}")
            }
            parts => f.write_str(&parts.join(&sep)),
        }
    }
}

impl From<&str> for FilePath {
    fn from(value: &str) -> Self {
        FilePath::new(value)
    }
}

impl From<&Path> for FilePath {
    fn from(value: &Path) -> Self {
        FilePath::from_path(value)
    }
}

fn is_drive(part: &str) -> bool {
    part.len() == 2 && part.ends_with(':') && part.as_bytes()[0].is_ascii_alphabetic()
}

#[cfg(target_os = "windows")]
fn part_eq(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[cfg(not(target_os = "windows"))]
fn part_eq(a: &str, b: &str) -> bool {
    a == b
}

#[cfg(test)]
mod tests {
    use std::path::MAIN_SEPARATOR;

    use rstest::rstest;

    use super::FilePath;

    fn sep(s: &str) -> String {
        s.replace('\\', &MAIN_SEPARATOR.to_string())
    }

    #[rstest]
    #[case("C:\\mc\\bin\\x.jar", "C:\\mc\\bin\\x.jar")]
    #[case("C:/mc/bin/x.jar", "C:\\mc\\bin\\x.jar")]
    #[case("C:\\mc\\\\bin\\.\\x.jar", "C:\\mc\\bin\\x.jar")]
    #[case("C:\\mc\\lib\\..\\bin", "C:\\mc\\bin")]
    #[case("S:", "S:\\")]
    #[case("S:\\", "S:\\")]
    #[case("relative\\dir", "relative\\dir")]
    #[case("\\rooted\\dir", "\\rooted\\dir")]
    #[case("..\\libs\\a.jar", "..\\libs\\a.jar")]
    #[case("a\\..\\..\\b", "..\\b")]
    #[case("..\\..\\x", "..\\..\\x")]
    #[case("\\\\server\\share\\a.jar", "\\\\server\\share\\a.jar")]
    #[case("//server/share/../a.jar", "\\\\server\\share\\a.jar")]
    #[case("\\\\?\\C:\\mc\\x.jar", "\\\\?\\C:\\mc\\x.jar")]
    #[case("\\..\\dir", "\\dir")]
    fn renders_canonically(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(FilePath::new(input).to_string(), sep(expected));
    }

    #[test]
    fn parent_and_name() {
        let p = FilePath::new("C:\\mc\\bin\\x.jar");
        assert_eq!(p.name(), Some("x.jar"));
        assert_eq!(p.parent(), Some(FilePath::new("C:\\mc\\bin")));
        assert_eq!(FilePath::new("S:\\").name(), None);
        assert_eq!(FilePath::new("S:\\").parent(), None);
        assert_eq!(FilePath::new("C:\\mc").parent(), Some(FilePath::new("C:")));
    }

    #[test]
    fn child_accepts_nested_names() {
        let root = FilePath::new("S:");
        assert_eq!(root.child("temp\\bin"), FilePath::new("S:\\temp\\bin"));
        assert_eq!(root.child("assets").to_string(), sep("S:\\assets"));
    }

    #[test]
    fn descendant_checks() {
        let root = FilePath::new("C:\\mc");
        assert!(FilePath::new("C:\\mc\\bin").is_child_of(&root));
        assert!(!root.is_child_of(&root));
        assert!(root.is_within(&root));
        assert!(!FilePath::new("C:\\mcx").is_within(&root));
        assert!(!FilePath::new("D:\\mc\\bin").is_within(&root));
        assert!(!FilePath::new("C:").is_within(&root));
    }

    #[test]
    fn unc_and_local_paths_are_distinct() {
        let share = FilePath::new("\\\\server\\share\\mc");
        assert!(share.is_absolute());
        assert!(!FilePath::new("\\server\\share\\mc").is_within(&share));
        assert!(FilePath::new("\\\\server\\share\\mc\\bin").is_child_of(&share));
        assert!(!FilePath::new("..\\libs").is_absolute());
    }

    #[test]
    fn rebase_moves_under_new_root() {
        let from = FilePath::new("C:\\mc");
        let to = FilePath::new("S:");
        assert_eq!(
            FilePath::new("C:\\mc\\bin\\x.jar").rebase(&from, &to),
            Some(FilePath::new("S:\\bin\\x.jar")),
        );
        assert_eq!(FilePath::new("C:\\mc").rebase(&from, &to), Some(to.clone()));
        assert_eq!(FilePath::new("C:\\other").rebase(&from, &to), None);
    }

    #[test]
    fn copy_and_delete_directory_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let base = FilePath::from_path(tmp.path());
        let src = base.child("src");
        src.child("nested").create_dir_all().unwrap();
        src.child("a.txt").write_string("alpha").unwrap();
        src.child("nested\\b.txt").write_string("beta").unwrap();

        let dest = base.child("out\\copy");
        src.copy_to(&dest).unwrap();
        assert_eq!(dest.child("a.txt").read_string().unwrap(), "alpha");
        assert_eq!(dest.child("nested\\b.txt").read_string().unwrap(), "beta");

        dest.delete().unwrap();
        assert!(!dest.exists());
        // Deleting twice is fine.
        dest.delete().unwrap();
    }

    #[test]
    fn copy_single_file_creates_parent() {
        let tmp = tempfile::tempdir().unwrap();
        let base = FilePath::from_path(tmp.path());
        let src = base.child("x.jar");
        src.write_string("jar").unwrap();
        let dest = base.child("stage\\x.jar");
        src.copy_to(&dest).unwrap();
        assert!(dest.is_file());
    }

    #[test]
    fn copy_missing_source_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let base = FilePath::from_path(tmp.path());
        let err = base.child("missing").copy_to(&base.child("dest")).unwrap_err();
        assert!(matches!(err, crate::runtime::error::SandboxError::NotFound(_)));
    }

    #[test]
    fn resolve_link_passes_through_regular_files() {
        let tmp = tempfile::tempdir().unwrap();
        let file = FilePath::from_path(tmp.path()).child("java.exe");
        file.write_string("").unwrap();
        assert_eq!(file.resolve_link().unwrap(), file);
    }
}
