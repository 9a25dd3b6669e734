// SPDX-License-Identifier: MIT

//! Common error type.

use std::io;

use thiserror::Error;

use crate::comm::message::MessageError;

/// Errors raised while preparing, launching, or brokering for a sandboxed process.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// A privileged OS call failed.
    #[error("{context} failed with code {code:#x}{}", render_message(.message))]
    Platform {
        context: String,
        code: u32,
        message: Option<String>,
    },

    /// Bad or missing input; reported before anything is mutated where possible.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Another sandbox instance holds the single-instance lock.
    #[error("{0} is already running")]
    AlreadyRunning(String),

    /// The object to operate on does not exist.
    #[error("{0} does not exist")]
    NotFound(String),

    /// A filesystem operation on a specific path failed.
    #[error("{path}: {source}")]
    File { path: String, source: io::Error },

    #[error(transparent)]
    Io(#[from] io::Error),

    /// A broker message could not be encoded or decoded.
    #[error("broker message: {0}")]
    Message(#[from] MessageError),

    /// The child process could not be run to completion.
    #[error("process error: {0}")]
    Process(String),
}

pub type Result<T> = std::result::Result<T, SandboxError>;

impl SandboxError {
    pub fn file(path: impl ToString, source: io::Error) -> Self {
        SandboxError::File { path: path.to_string(), source }
    }

    /// Platform status code, when this is a platform failure.
    pub fn platform_code(&self) -> Option<u32> {
        match self {
            SandboxError::Platform { code, .. } => Some(*code),
            _ => None,
        }
    }
}

fn render_message(message: &Option<String>) -> String {
    match message {
        Some(m) if !m.trim().is_empty() => format!(": {}", m.trim()),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::SandboxError;

    #[test]
    fn platform_display_includes_message() {
        let err = SandboxError::Platform {
            context: "SetNamedSecurityInfoW".to_string(),
            code: 5,
            message: Some("Access is denied.\r\n".to_string()),
        };
        assert_eq!(err.to_string(), "SetNamedSecurityInfoW failed with code 0x5: Access is denied.");
        assert_eq!(err.platform_code(), Some(5));
    }

    #[test]
    fn platform_display_without_message() {
        let err = SandboxError::Platform { context: "GetAce".to_string(), code: 0x57, message: None };
        assert_eq!(err.to_string(), "GetAce failed with code 0x57");
    }

    #[test]
    fn file_error_names_path() {
        let err = SandboxError::file("C:\\mc", std::io::Error::other("boom"));
        assert_eq!(err.to_string(), "C:\\mc: boom");
        assert_eq!(err.platform_code(), None);
    }
}
