//! # Broker Communication
//!
//! The sandboxed process asks its supervisor to perform a few operations it
//! cannot do itself.  Each request is a single message on a message-mode
//! channel and is answered by exactly one reply, unless the server ends the
//! session.

pub mod channel;
pub mod client;
pub mod message;
pub mod server;

mod rwutil;

pub use channel::MessageChannel;
pub use client::PipeClient;
pub use message::{MAX_MESSAGE_SIZE, MessageError, PipeMessage, Pos, Rect, Reply, Speak};
pub use server::{PipeHandler, serve};
