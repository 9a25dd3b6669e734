// SPDX-License-Identifier: MIT

//! Performs the operations the sandboxed process asks the broker for.

use windows::Win32::Foundation::RECT;
use windows::Win32::UI::WindowsAndMessaging::{ClipCursor, SetCursorPos};

use super::error::PlatformResultExt;
use super::speech::SpeechApi;
use crate::comm::message::{PipeMessage, Pos, Rect, Reply, Speak};
use crate::comm::server::PipeHandler;
use crate::runtime::error::Result;

/// Every request except `Exit` gets an empty reply, whether or not the operation worked.
#[derive(Default)]
pub struct BrokerHandler {
    // Created on first use, on the broker thread.
    speech: Option<SpeechApi>,
}

impl BrokerHandler {
    pub fn new() -> Self {
        Self::default()
    }

    fn clip_cursor(&self, rect: Rect) -> Result<()> {
        if rect.is_unclip() {
            return unsafe { ClipCursor(None) }.platform("ClipCursor");
        }
        let rect = RECT { left: rect.left, top: rect.top, right: rect.right, bottom: rect.bottom };
        unsafe { ClipCursor(Some(&rect as *const RECT)) }.platform("ClipCursor")
    }

    fn set_cursor_pos(&self, pos: Pos) -> Result<()> {
        unsafe { SetCursorPos(pos.x, pos.y) }.platform("SetCursorPos")
    }

    fn speech(&mut self) -> Result<&SpeechApi> {
        let speech = match self.speech.take() {
            Some(speech) => speech,
            None => SpeechApi::new()?,
        };
        Ok(self.speech.insert(speech))
    }

    fn speak(&mut self, speak: &Speak) -> Result<()> {
        self.speech()?.speak(&speak.text, speak.flags)
    }

    fn speak_skip(&mut self) -> Result<()> {
        self.speech()?.skip()
    }
}

impl PipeHandler for BrokerHandler {
    fn handle(&mut self, message: PipeMessage) -> Option<Reply> {
        let result = match &message {
            PipeMessage::Exit => return None,
            PipeMessage::ClipCursor(rect) => self.clip_cursor(*rect),
            PipeMessage::SetCursorPos(pos) => self.set_cursor_pos(*pos),
            PipeMessage::Speak(speak) => self.speak(speak),
            PipeMessage::SpeakSkip => self.speak_skip(),
        };
        if let Err(e) = result {
            tracing::warn!("broker request {message:?} failed: {e}");
        }
        Some(Reply::Empty)
    }
}
