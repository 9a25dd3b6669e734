//! Read & Write utility functions.
//!
//! Broker messages are built from 16-bit units.  Fixed-width numbers spend
//! one unit per octet, least significant octet first.

/// Number of units a u32/i32 occupies in a message.
pub const U32_UNITS: usize = size_of::<u32>();

/// Number of units in a text length prefix.
pub const LEN_UNITS: usize = 2;

/// Append the u32, little endian, one octet per unit.
pub fn push_le_u32(value: u32, out: &mut Vec<u16>) {
    out.extend(value.to_le_bytes().iter().map(|b| *b as u16));
}

/// Read a little endian u32 from `U32_UNITS` units.
/// `None` when the slice is short or a unit does not hold an octet.
pub fn get_le_u32(units: &[u16]) -> Option<u32> {
    let mut buff = [0u8; U32_SIZE_BYTES];
    for (i, b) in buff.iter_mut().enumerate() {
        *b = octet(*units.get(i)?)?;
    }
    Some(u32::from_le_bytes(buff))
}

/// Append a text length prefix (low octet, high octet).
pub fn push_len(len: u16, out: &mut Vec<u16>) {
    let b = len.to_le_bytes();
    out.push(b[0] as u16);
    out.push(b[1] as u16);
}

pub fn get_len(units: &[u16]) -> Option<u16> {
    let lo = octet(*units.first()?)?;
    let hi = octet(*units.get(1)?)?;
    Some(u16::from_le_bytes([lo, hi]))
}

/// Serialize units as little endian octets for the wire.
pub fn units_to_bytes(units: &[u16]) -> Vec<u8> {
    units.iter().flat_map(|u| u.to_le_bytes()).collect()
}

/// Inverse of `units_to_bytes`.  `None` for an odd number of octets.
pub fn bytes_to_units(bytes: &[u8]) -> Option<Vec<u16>> {
    let (pairs, rest) = bytes.as_chunks::<2>();
    if !rest.is_empty() {
        return None;
    }
    Some(pairs.iter().map(|p| u16::from_le_bytes(*p)).collect())
}

const U32_SIZE_BYTES: usize = size_of::<u32>();

fn octet(unit: u16) -> Option<u8> {
    u8::try_from(unit).ok()
}
