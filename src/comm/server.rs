//! Server side of the broker: read one request, dispatch it, answer it.

use std::io;

use tracing::{debug, warn};

use super::channel::MessageChannel;
use super::message::{PipeMessage, Reply};

/// Decides what to do with each request.
///
/// Returning `None` ends the session; the server disconnects without replying.
pub trait PipeHandler: Send {
    fn handle(&mut self, message: PipeMessage) -> Option<Reply>;
}

impl<F> PipeHandler for F
where
    F: FnMut(PipeMessage) -> Option<Reply> + Send,
{
    fn handle(&mut self, message: PipeMessage) -> Option<Reply> {
        self(message)
    }
}

/// Run one session until the handler or the client ends it.
///
/// Malformed requests are answered with an empty reply and otherwise ignored.
pub fn serve<C, H>(channel: &mut C, handler: &mut H) -> io::Result<()>
where
    C: MessageChannel + ?Sized,
    H: PipeHandler + ?Sized,
{
    loop {
        let Some(request) = channel.read_message()? else {
            debug!("broker client went away");
            return Ok(());
        };
        let message = match PipeMessage::from_bytes(&request) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, size = request.len(), "ignoring malformed broker request");
                channel.write_message(&[])?;
                continue;
            }
        };
        debug!(?message, "broker request");
        let reply = match handler.handle(message) {
            None => {
                debug!("broker session finished");
                return Ok(());
            }
            Some(reply) => reply,
        };
        let bytes = match reply.to_bytes() {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "broker reply could not be encoded; sending an empty reply");
                vec![]
            }
        };
        channel.write_message(&bytes)?;
    }
}
