//! Bit-packed code representation.
//!
//! Every character is stored as its offset from `a` in a 6-bit field.
//! Character `i` lives at bit offset `6 * (4 - i)`, so the first character
//! occupies the most significant field and packed values sort like strings.

use super::{Code, CODE_LEN};

const FIELD_BITS: u32 = 6;
const FIELD_MASK: u32 = (1 << FIELD_BITS) - 1;

fn shift_for(position: usize) -> u32 {
    FIELD_BITS * (CODE_LEN - 1 - position) as u32
}

/// Pack a code into a single integer.
pub fn encode(code: &Code) -> u32 {
    code.as_str()
        .bytes()
        .enumerate()
        .fold(0, |packed, (position, byte)| {
            packed | (u32::from(byte - b'a') << shift_for(position))
        })
}

/// Unpack an integer produced by [`encode`].
pub fn decode(packed: u32) -> Code {
    let s: String = (0..CODE_LEN)
        .map(|position| {
            let offset = (packed >> shift_for(position)) & FIELD_MASK;
            char::from(b'a' + offset as u8)
        })
        .collect();
    Code::from_decoded(s)
}
