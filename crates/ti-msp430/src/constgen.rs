//! Constant generator: six hard-coded immediates synthesized from the
//! (source register, `as` addressing mode) pair instead of a register read.

use crate::registers::{CG2, SR};

/// If `(source, as_mode)` names a constant-generator encoding, return the
/// synthesized immediate (as a 16-bit bit pattern; `-1` is `0xFFFF`).
/// Otherwise `None`, meaning the source should be read/fetched normally.
#[must_use]
pub fn generate(source: u8, as_mode: u8) -> Option<u16> {
    match (source, as_mode) {
        (SR, 0b10) => Some(4),
        (SR, 0b11) => Some(8),
        (CG2, 0b00) => Some(0),
        (CG2, 0b01) => Some(1),
        (CG2, 0b10) => Some(2),
        (CG2, 0b11) => Some(0xFFFF),
        _ => None,
    }
}

/// Whether `(source, as_mode)` is a constant-generator encoding at all,
/// independent of the value produced. Used to skip extension-word fetches
/// and register pre-reads for the source operand.
#[must_use]
pub fn is_active(source: u8, as_mode: u8) -> bool {
    generate(source, as_mode).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_encodings() {
        assert_eq!(generate(SR, 0b10), Some(4));
        assert_eq!(generate(SR, 0b11), Some(8));
        assert_eq!(generate(CG2, 0b00), Some(0));
        assert_eq!(generate(CG2, 0b01), Some(1));
        assert_eq!(generate(CG2, 0b10), Some(2));
        assert_eq!(generate(CG2, 0b11), Some(0xFFFF));
    }

    #[test]
    fn non_generator_encodings() {
        assert_eq!(generate(SR, 0b00), None);
        assert_eq!(generate(SR, 0b01), None);
        assert_eq!(generate(4, 0b11), None);
    }
}
