//! TI MSP430 instruction core: fetch, decode, execute and optionally
//! disassemble one instruction at a time against an external 16-bit
//! register file and a caller-owned 64 KiB byte-addressable bus.
//!
//! This crate models only the instruction core. Peripherals, clocking and
//! interrupt sequencing live on the other side of the [`Bus`] trait.

mod bus;
mod constgen;
mod cpu;
mod dadd;
mod disasm;
mod error;
mod flags;
mod format1;
mod format2;
mod format3;
mod operand;
mod registers;

pub use bus::{Access, Bus};
pub use cpu::Cpu;
pub use disasm::Disassembly;
pub use error::CoreError;
pub use registers::{
    CG2, PC, SP, SR, SR_C, SR_CPUOFF, SR_FLAGS_MASK, SR_GIE, SR_N, SR_OSCOFF, SR_SCG0, SR_SCG1,
    SR_V, SR_Z, Registers, reg_name_to_num, reg_num_to_name, truncate_byte,
};
