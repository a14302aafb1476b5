//! Packed binary-coded decimal as used by RTC registers.

/// Encode 0..=99 as packed BCD. Values above 99 saturate to 0x99.
#[inline]
pub fn to_bcd(value: u8) -> u8 {
    let v = value.min(99);
    ((v / 10) << 4) | (v % 10)
}

/// Decode a packed BCD byte. Nibbles above 9 are not decimal digits and yield `None`.
#[inline]
pub fn from_bcd(byte: u8) -> Option<u8> {
    let hi = byte >> 4;
    let lo = byte & 0x0F;
    if hi > 9 || lo > 9 {
        return None;
    }
    Some(hi * 10 + lo)
}
