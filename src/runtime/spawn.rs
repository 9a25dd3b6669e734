// SPDX-License-Identifier: MIT

//! General model for spawning the child process and collecting its output.

use std::io::{self, Read};

use crate::fs::FilePath;

/// Size of each read from the child's output pipe.
pub const OUTPUT_BUFFER_SIZE: usize = 4096;

/// Receives the child's combined stdout and stderr as text.
pub trait OutputConsumer: Send {
    fn consume(&mut self, text: &str);
}

impl<F> OutputConsumer for F
where
    F: FnMut(&str) + Send,
{
    fn consume(&mut self, text: &str) {
        self(text)
    }
}

/// Passes child output straight through to this process' stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrintOutputConsumer;

impl OutputConsumer for PrintOutputConsumer {
    fn consume(&mut self, text: &str) {
        use std::io::Write;
        let mut out = io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }
}

/// Describes how to launch the child process.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub application: FilePath,
    /// Full argument vector; the first entry is the program name.
    pub args: Vec<String>,
    pub working_dir: FilePath,
}

/// Copy everything from `source` into the consumer until end of stream.
///
/// Multi-byte characters split across reads are held back until complete;
/// invalid sequences are replaced.
pub fn drain_output<R: Read + ?Sized, C: OutputConsumer + ?Sized>(source: &mut R, consumer: &mut C) -> io::Result<()> {
    let mut buff = [0u8; OUTPUT_BUFFER_SIZE];
    let mut pending: Vec<u8> = Vec::new();
    loop {
        let count = match source.read(&mut buff) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => break,
            Err(e) => return Err(e),
        };
        pending.extend_from_slice(&buff[..count]);
        let keep = incomplete_tail(&pending);
        let ready = pending.len() - keep;
        if ready > 0 {
            consumer.consume(&String::from_utf8_lossy(&pending[..ready]));
            pending.drain(..ready);
        }
    }
    if !pending.is_empty() {
        consumer.consume(&String::from_utf8_lossy(&pending));
    }
    Ok(())
}

/// Number of trailing bytes that start a UTF-8 sequence not yet complete.
fn incomplete_tail(bytes: &[u8]) -> usize {
    match std::str::from_utf8(bytes) {
        Ok(_) => 0,
        Err(e) if e.error_len().is_none() => bytes.len() - e.valid_up_to(),
        Err(_) => {
            // Something invalid is in there; only hold back a truncated final sequence.
            let start = bytes.len().saturating_sub(3);
            (start..bytes.len())
                .find(|&i| bytes[i] >= 0xC0 && std::str::from_utf8(&bytes[i..]).is_err_and(|e| e.error_len().is_none()))
                .map(|i| bytes.len() - i)
                .unwrap_or(0)
        }
    }
}
