//! Typed decode failures, replacing the original C's `exit(1)`.

use core::fmt;

/// A failure that `Cpu::decode`/`Cpu::step` can return.
///
/// Invalid top-nibble words are *not* an error here: they halt the CPU
/// (`running = false`) and rewind `pc` instead, since a host can recover
/// from those without tearing down the process. This type only covers
/// decode paths that are reachable despite being architecturally
/// meaningless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreError {
    /// Format II opcode field held a value with no assigned mnemonic.
    /// The 3-bit opcode field only has eight encodings and seven are used
    /// (RRC, SWPB, RRA, SXT, PUSH, CALL, RETI); opcode 7 is this variant.
    InvalidFormatTwoOpcode(u8),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::InvalidFormatTwoOpcode(op) => {
                write!(f, "invalid Format II opcode: {op:#X}")
            }
        }
    }
}

impl std::error::Error for CoreError {}
