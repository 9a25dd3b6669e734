// SPDX-License-Identifier: MIT

//! Drive letter selection for the virtual mount.
//!
//! The in-use letters are a bitmask where bit 0 is `A:`, matching what
//! `GetLogicalDrives` reports.

const LETTER_COUNT: u8 = 26;

/// Pick a free drive letter, preferring `preferred` and then scanning the
/// letters after it, wrapping around to `A`.
pub fn next_available(preferred: char, used: u32) -> Option<char> {
    let start = letter_index(preferred).unwrap_or(0);
    (0..LETTER_COUNT)
        .map(|offset| (start + offset) % LETTER_COUNT)
        .find(|idx| used & (1 << idx) == 0)
        .map(|idx| (b'A' + idx) as char)
}

pub fn is_used(letter: char, used: u32) -> bool {
    match letter_index(letter) {
        Some(idx) => used & (1 << idx) != 0,
        None => false,
    }
}

fn letter_index(letter: char) -> Option<u8> {
    let letter = letter.to_ascii_uppercase();
    if letter.is_ascii_uppercase() {
        Some(letter as u8 - b'A')
    } else {
        None
    }
}
