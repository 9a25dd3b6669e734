//! Broker messages and their wire encoding.
//!
//! A message is a sequence of 16-bit units sent little endian.  The first
//! unit holds the discriminant; the payload layout depends on it:
//!
//! | tag | message        | payload                                        |
//! |-----|----------------|------------------------------------------------|
//! | 0   | exit           | none                                           |
//! | 1   | clip cursor    | left, top, right, bottom (i32, 4 units each)   |
//! | 2   | set cursor pos | x, y (i32, 4 units each)                       |
//! | 3   | speak          | length (2 units), UTF-16 text, flags (4 units) |
//! | 4   | speak skip     | none                                           |

use thiserror::Error;

use super::rwutil;

/// Largest message, in octets, the channel carries.
pub const MAX_MESSAGE_SIZE: usize = 4096;

const TAG_EXIT: u16 = 0;
const TAG_CLIP_CURSOR: u16 = 1;
const TAG_SET_CURSOR_POS: u16 = 2;
const TAG_SPEAK: u16 = 3;
const TAG_SPEAK_SKIP: u16 = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("empty message")]
    Empty,
    #[error("unknown message discriminant {0}")]
    UnknownTag(u16),
    #[error("message ended early")]
    Truncated,
    #[error("message has trailing data")]
    TrailingData,
    #[error("odd number of octets on the wire")]
    OddLength,
    #[error("text is not valid UTF-16")]
    InvalidText,
    #[error("text of {0} units does not fit the length prefix")]
    TextTooLong(usize),
    #[error("message of {0} octets exceeds the {MAX_MESSAGE_SIZE} octet limit")]
    TooLarge(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    /// Releases any cursor clip.
    pub const UNCLIP: Rect = Rect { left: -1, top: -1, right: -1, bottom: -1 };

    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn is_unclip(&self) -> bool {
        self.left < 0 && self.top < 0 && self.right < 0 && self.bottom < 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pos {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Speak {
    pub text: String,
    pub flags: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipeMessage {
    Exit,
    ClipCursor(Rect),
    SetCursorPos(Pos),
    Speak(Speak),
    SpeakSkip,
}

impl PipeMessage {
    pub fn tag(&self) -> u16 {
        match self {
            PipeMessage::Exit => TAG_EXIT,
            PipeMessage::ClipCursor(_) => TAG_CLIP_CURSOR,
            PipeMessage::SetCursorPos(_) => TAG_SET_CURSOR_POS,
            PipeMessage::Speak(_) => TAG_SPEAK,
            PipeMessage::SpeakSkip => TAG_SPEAK_SKIP,
        }
    }

    pub fn to_units(&self) -> Result<Vec<u16>, MessageError> {
        let mut out = vec![self.tag()];
        match self {
            PipeMessage::Exit | PipeMessage::SpeakSkip => (),
            PipeMessage::ClipCursor(rect) => {
                for v in [rect.left, rect.top, rect.right, rect.bottom] {
                    rwutil::push_le_u32(v as u32, &mut out);
                }
            }
            PipeMessage::SetCursorPos(pos) => {
                rwutil::push_le_u32(pos.x as u32, &mut out);
                rwutil::push_le_u32(pos.y as u32, &mut out);
            }
            PipeMessage::Speak(speak) => {
                let text: Vec<u16> = speak.text.encode_utf16().collect();
                let len = u16::try_from(text.len()).map_err(|_| MessageError::TextTooLong(text.len()))?;
                rwutil::push_len(len, &mut out);
                out.extend_from_slice(&text);
                rwutil::push_le_u32(speak.flags, &mut out);
            }
        }
        Ok(out)
    }

    pub fn from_units(units: &[u16]) -> Result<Self, MessageError> {
        let (&tag, payload) = units.split_first().ok_or(MessageError::Empty)?;
        let mut reader = UnitReader { units: payload };
        let message = match tag {
            TAG_EXIT => PipeMessage::Exit,
            TAG_CLIP_CURSOR => PipeMessage::ClipCursor(Rect {
                left: reader.i32()?,
                top: reader.i32()?,
                right: reader.i32()?,
                bottom: reader.i32()?,
            }),
            TAG_SET_CURSOR_POS => PipeMessage::SetCursorPos(Pos { x: reader.i32()?, y: reader.i32()? }),
            TAG_SPEAK => {
                let len = reader.text_len()? as usize;
                let text = String::from_utf16(reader.take(len)?).map_err(|_| MessageError::InvalidText)?;
                let flags = reader.u32()?;
                PipeMessage::Speak(Speak { text, flags })
            }
            TAG_SPEAK_SKIP => PipeMessage::SpeakSkip,
            other => return Err(MessageError::UnknownTag(other)),
        };
        if !reader.units.is_empty() {
            return Err(MessageError::TrailingData);
        }
        Ok(message)
    }

    /// Encode for the wire, enforcing the channel's size limit.
    pub fn to_bytes(&self) -> Result<Vec<u8>, MessageError> {
        let bytes = rwutil::units_to_bytes(&self.to_units()?);
        if bytes.len() > MAX_MESSAGE_SIZE {
            return Err(MessageError::TooLarge(bytes.len()));
        }
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MessageError> {
        if bytes.len() > MAX_MESSAGE_SIZE {
            return Err(MessageError::TooLarge(bytes.len()));
        }
        let units = rwutil::bytes_to_units(bytes).ok_or(MessageError::OddLength)?;
        Self::from_units(&units)
    }
}

/// A broker response.  `Empty` tells the client the server is still listening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Empty,
    Message(PipeMessage),
}

impl Reply {
    pub fn to_bytes(&self) -> Result<Vec<u8>, MessageError> {
        match self {
            Reply::Empty => Ok(vec![]),
            Reply::Message(m) => m.to_bytes(),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MessageError> {
        if bytes.is_empty() {
            Ok(Reply::Empty)
        } else {
            PipeMessage::from_bytes(bytes).map(Reply::Message)
        }
    }
}

struct UnitReader<'a> {
    units: &'a [u16],
}

impl<'a> UnitReader<'a> {
    fn take(&mut self, count: usize) -> Result<&'a [u16], MessageError> {
        if self.units.len() < count {
            return Err(MessageError::Truncated);
        }
        let (head, rest) = self.units.split_at(count);
        self.units = rest;
        Ok(head)
    }

    fn u32(&mut self) -> Result<u32, MessageError> {
        rwutil::get_le_u32(self.take(rwutil::U32_UNITS)?).ok_or(MessageError::Truncated)
    }

    fn i32(&mut self) -> Result<i32, MessageError> {
        self.u32().map(|v| v as i32)
    }

    fn text_len(&mut self) -> Result<u16, MessageError> {
        rwutil::get_len(self.take(rwutil::LEN_UNITS)?).ok_or(MessageError::Truncated)
    }
}
