//! Message-oriented transport underneath the broker.

use std::io;

/// One message per call in both directions.
///
/// A zero-length message is legal and distinct from the peer going away,
/// which `read_message` reports as `Ok(None)`.
pub trait MessageChannel {
    fn read_message(&mut self) -> io::Result<Option<Vec<u8>>>;

    fn write_message(&mut self, bytes: &[u8]) -> io::Result<()>;
}
