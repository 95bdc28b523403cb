//! Operand resolution: turns a (register, addressing-mode) pair plus
//! instruction-stream extension words into a resolved value/target, with
//! the constant-generator short-circuit and the PC-relative symbolic-mode
//! quirk applied.

use crate::bus::{Access, Bus};
use crate::constgen;
use crate::cpu::Cpu;
use crate::registers::{PC, SR, reg_num_to_name};

/// Where a destination operand lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestTarget {
    Register(u8),
    Memory(u16),
}

/// A resolved source operand.
pub struct SourceOperand {
    /// The value most opcodes consume.
    pub value: u16,
    /// `Some(addr)` whenever this operand lives in memory (symbolic,
    /// absolute, indexed, indirect, or indirect auto-increment), so Format
    /// II can write a result back to the same place it read from.
    pub address: Option<u16>,
    /// Set only for symbolic and absolute addressing: CALL jumps to the
    /// computed address itself rather than the memory word stored there.
    pub is_symbolic_or_absolute: bool,
    /// Auto-increment side effect already applied when this was produced.
    pub text: Option<String>,
}

/// A resolved destination operand (target only; callers pre-read the
/// current value themselves, skipping it for MOV).
pub struct DestOperand {
    pub target: DestTarget,
    pub text: Option<String>,
}

/// Resolve a source operand for addressing-mode field `as_mode` on
/// register `reg`, width `access`. Fetches 0 or 1 extension words through
/// `cpu.fetch`, advancing PC, and applies auto-increment side effects.
pub fn resolve_source<B: Bus>(
    cpu: &mut Cpu,
    bus: &mut B,
    reg: u8,
    as_mode: u8,
    access: Access,
    want_text: bool,
) -> SourceOperand {
    if let Some(constant) = constgen::generate(reg, as_mode) {
        let text = want_text.then(|| format!("#{constant:#06X}"));
        return SourceOperand {
            value: constant,
            address: None,
            is_symbolic_or_absolute: false,
            text,
        };
    }

    match as_mode {
        0b00 => {
            // Register direct.
            let value = cpu.reg(bus, reg);
            let text = want_text.then(|| reg_num_to_name(reg).to_string());
            SourceOperand {
                value,
                address: None,
                is_symbolic_or_absolute: false,
                text,
            }
        }
        0b01 => {
            if reg == PC {
                // Symbolic: PC-relative, base is PC *after* this extension
                // word fetch; the ISA offset is target - (instr_pc + 2), so
                // subtract 2 back out here.
                let offset = cpu.fetch(bus);
                let addr = cpu.pc_raw().wrapping_add(offset).wrapping_sub(2);
                let value = cpu.read_access(bus, addr, access);
                let text = want_text.then(|| format!("{addr:#06X}"));
                SourceOperand {
                    value,
                    address: Some(addr),
                    is_symbolic_or_absolute: true,
                    text,
                }
            } else if reg == SR {
                // Absolute: 16-bit unsigned address in the extension word.
                let addr = cpu.fetch(bus);
                let value = cpu.read_access(bus, addr, access);
                let text = want_text.then(|| format!("&{addr:#06X}"));
                SourceOperand {
                    value,
                    address: Some(addr),
                    is_symbolic_or_absolute: true,
                    text,
                }
            } else {
                // Indexed: register + signed offset.
                let offset = cpu.fetch(bus);
                let base = cpu.reg(bus, reg);
                let addr = base.wrapping_add(offset);
                let value = cpu.read_access(bus, addr, access);
                let text = want_text.then(|| format!("{offset:#06X}({})", reg_num_to_name(reg)));
                SourceOperand {
                    value,
                    address: Some(addr),
                    is_symbolic_or_absolute: false,
                    text,
                }
            }
        }
        0b10 => {
            // Indirect: dereference register, no extension word.
            let addr = cpu.reg(bus, reg);
            let value = cpu.read_access(bus, addr, access);
            let text = want_text.then(|| format!("@{}", reg_num_to_name(reg)));
            SourceOperand {
                value,
                address: Some(addr),
                is_symbolic_or_absolute: false,
                text,
            }
        }
        0b11 => {
            if reg == PC {
                // Immediate: the extension word itself is the value. This
                // is encoded as @PC+, so the fetch already advances PC by 2
                // exactly as the general auto-increment case would.
                let value = cpu.fetch(bus);
                let text = want_text.then(|| format!("#{value:#06X}"));
                SourceOperand {
                    value,
                    address: None,
                    is_symbolic_or_absolute: false,
                    text,
                }
            } else {
                // Indirect auto-increment: dereference, then bump by the
                // operand width (after the read). The reported address is
                // the one just read from, not the post-increment register.
                let addr = cpu.reg(bus, reg);
                let value = cpu.read_access(bus, addr, access);
                let step = if access.is_byte() { 1 } else { 2 };
                cpu.set_reg(bus, reg, addr.wrapping_add(step));
                let text = want_text.then(|| format!("@{}+", reg_num_to_name(reg)));
                SourceOperand {
                    value,
                    address: Some(addr),
                    is_symbolic_or_absolute: false,
                    text,
                }
            }
        }
        _ => unreachable!("as_mode is a 2-bit field"),
    }
}

/// Resolve a destination operand for `ad_flag` on register `reg`. There is
/// no constant generator on the destination side; `ad=0` is always
/// register direct and `ad=1` reuses the symbolic/absolute/indexed shapes
/// from the source table.
pub fn resolve_dest<B: Bus>(
    cpu: &mut Cpu,
    bus: &mut B,
    reg: u8,
    ad_flag: u8,
    want_text: bool,
) -> DestOperand {
    if ad_flag == 0 {
        let text = want_text.then(|| reg_num_to_name(reg).to_string());
        return DestOperand {
            target: DestTarget::Register(reg),
            text,
        };
    }

    if reg == PC {
        let offset = cpu.fetch(bus);
        let addr = cpu.pc_raw().wrapping_add(offset).wrapping_sub(2);
        let text = want_text.then(|| format!("{addr:#06X}"));
        DestOperand {
            target: DestTarget::Memory(addr),
            text,
        }
    } else if reg == SR {
        let addr = cpu.fetch(bus);
        let text = want_text.then(|| format!("&{addr:#06X}"));
        DestOperand {
            target: DestTarget::Memory(addr),
            text,
        }
    } else {
        let offset = cpu.fetch(bus);
        let base = cpu.reg(bus, reg);
        let addr = base.wrapping_add(offset);
        let text = want_text.then(|| format!("{offset:#06X}({})", reg_num_to_name(reg)));
        DestOperand {
            target: DestTarget::Memory(addr),
            text,
        }
    }
}
