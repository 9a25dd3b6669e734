//! Client side of the broker, used from inside the sandbox.

use std::sync::{Mutex, PoisonError};

use tracing::debug;

use super::channel::MessageChannel;
use super::message::{PipeMessage, Reply};
use crate::runtime::error::Result;

/// Sends one request at a time and waits for its reply.
pub struct PipeClient<C: MessageChannel> {
    channel: Mutex<C>,
}

impl<C: MessageChannel> PipeClient<C> {
    pub fn new(channel: C) -> Self {
        Self { channel: Mutex::new(channel) }
    }

    /// `Ok(None)` when the server ended the session instead of replying.
    pub fn send(&self, message: &PipeMessage) -> Result<Option<Reply>> {
        let request = message.to_bytes()?;
        let mut channel = self.channel.lock().unwrap_or_else(PoisonError::into_inner);
        channel.write_message(&request)?;
        match channel.read_message()? {
            None => {
                debug!(?message, "broker closed the session");
                Ok(None)
            }
            Some(reply) => Ok(Some(Reply::from_bytes(&reply)?)),
        }
    }
}
