// SPDX-License-Identifier: MIT

//! Text to speech through the SAPI voice.

use windows::Win32::Media::Speech::{ISpVoice, SpVoice};
use windows::Win32::System::Com::{CLSCTX_ALL, COINIT_MULTITHREADED, CoCreateInstance, CoInitializeEx, CoUninitialize};
use windows::core::PCWSTR;

use super::conv::wide;
use super::error::PlatformResultExt;
use crate::runtime::error::Result;

/// COM initialized for the current thread until dropped.
struct ComApartment;

impl ComApartment {
    fn enter() -> Result<Self> {
        unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) }.ok().platform("CoInitializeEx")?;
        Ok(Self)
    }
}

impl Drop for ComApartment {
    fn drop(&mut self) {
        unsafe { CoUninitialize() };
    }
}

pub struct SpeechApi {
    // Released before the apartment.
    voice: ISpVoice,
    _com: ComApartment,
}

// Created and used only on the broker thread; the value is moved there before first use.
unsafe impl Send for SpeechApi {}

impl SpeechApi {
    pub fn new() -> Result<Self> {
        let com = ComApartment::enter()?;
        let voice: ISpVoice = unsafe { CoCreateInstance(&SpVoice, None, CLSCTX_ALL) }.platform("CoCreateInstance(SpVoice)")?;
        Ok(Self { voice, _com: com })
    }

    /// `flags` are SPEAKFLAGS bits, passed through unchanged.
    pub fn speak(&self, text: &str, flags: u32) -> Result<()> {
        let text = wide(text);
        unsafe { self.voice.Speak(PCWSTR(text.as_ptr()), flags, None) }.platform("ISpVoice::Speak")
    }

    /// Skip whatever is being spoken.
    pub fn skip(&self) -> Result<()> {
        let item = wide("Sentence");
        let mut skipped = 0u32;
        unsafe { self.voice.Skip(PCWSTR(item.as_ptr()), i32::MAX, &mut skipped) }.platform("ISpVoice::Skip")
    }
}
