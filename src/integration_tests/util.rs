//! Utility helpers for running the tests.

use std::sync::{Arc, Mutex};

use rand::Rng;
use rand::distr::Alphanumeric;

use crate::fs::FilePath;
use crate::runtime::OutputConsumer;
use crate::runtime::win32::AppContainer;

/// A name no other test run is using, for profiles, mutexes, and pipes.
pub fn unique_name(prefix: &str) -> String {
    let suffix: String = rand::rng().sample_iter(&Alphanumeric).take(8).map(char::from).collect();
    format!("{prefix}{suffix}")
}

/// A throwaway AppContainer to use as an ACL trustee.
pub fn container() -> AppContainer {
    AppContainer::create(&unique_name("SandboxTest"), "sandbox test", &[], false).unwrap()
}

pub fn temp_path(dir: &tempfile::TempDir) -> FilePath {
    FilePath::from_path(dir.path())
}

/// Collects child output for later inspection.
pub fn collector() -> (Box<dyn OutputConsumer>, Arc<Mutex<String>>) {
    let out = Arc::new(Mutex::new(String::new()));
    let sink = out.clone();
    (Box::new(move |text: &str| sink.lock().unwrap().push_str(text)), out)
}

/// `%SystemRoot%\System32`.
pub fn system32() -> FilePath {
    let root = std::env::var("SystemRoot").unwrap_or_else(|_| r"C:\Windows".to_string());
    FilePath::new(root).child("System32")
}
