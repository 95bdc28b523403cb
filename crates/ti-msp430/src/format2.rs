//! Format II: single-operand instructions.
//!
//! Word layout: `[0001][00C:3][B][As:2][S:4]`.

use crate::bus::{Access, Bus};
use crate::cpu::Cpu;
use crate::disasm::Disassembly;
use crate::error::CoreError;
use crate::flags;
use crate::operand;
use crate::registers::PC;

fn width_mask(access: Access) -> u16 {
    match access {
        Access::Word => 0xFFFF,
        Access::Byte => 0x00FF,
    }
}

pub(crate) fn execute<B: Bus>(
    cpu: &mut Cpu,
    bus: &mut B,
    word: u16,
    want_disasm: bool,
) -> Result<Option<Disassembly>, CoreError> {
    let opcode = ((word >> 7) & 0x7) as u8;
    let bw_flag = (word >> 6) & 0x1;
    let as_mode = ((word >> 4) & 0x3) as u8;
    let source = (word & 0xF) as u8;
    let access = if bw_flag == 1 { Access::Byte } else { Access::Word };
    let mask = width_mask(access);

    // SWPB, SXT, RETI are always word-width regardless of the BW bit; keep
    // `access` as decoded for addressing-mode resolution but force the
    // operation itself onto WORD where the ISA requires it.
    let src_auto_increment_to_pc = as_mode == 0b11 && source == PC;
    let src = operand::resolve_source(cpu, bus, source, as_mode, access, want_disasm);
    let s = src.value & mask;

    let mnemonic;
    match opcode {
        0x0 => {
            // RRC: rotate right through carry.
            mnemonic = "RRC";
            let carry_in = cpu.carry();
            let msb = if access.is_byte() { 1 << 7 } else { 1 << 15 };
            let mut result = (s >> 1) & !msb;
            if carry_in {
                result |= msb;
            }
            result &= mask;
            write_source(cpu, bus, source, src.address, result, access);
            let c = s & 1 != 0;
            cpu.set_sr_flags(c, flags::is_zero(result, access), flags::is_negative(result, access), false);
        }
        0x1 => {
            // SWPB: swap high/low byte, word only, no flags.
            mnemonic = "SWPB";
            let result = (s >> 8) | ((s & 0xFF) << 8);
            write_source(cpu, bus, source, src.address, result, Access::Word);
        }
        0x2 => {
            // RRA: arithmetic right shift, MSB preserved.
            mnemonic = "RRA";
            let msb = if access.is_byte() { s & (1 << 7) } else { s & (1 << 15) };
            let result = (msb | (s >> 1)) & mask;
            write_source(cpu, bus, source, src.address, result, access);
            let c = s & 1 != 0;
            cpu.set_sr_flags(c, flags::is_zero(result, access), flags::is_negative(result, access), false);
        }
        0x3 => {
            // SXT: sign-extend bit 7 through bit 15, word only.
            mnemonic = "SXT";
            let result = if s & (1 << 7) != 0 { s | 0xFF00 } else { s & 0x00FF };
            write_source(cpu, bus, source, src.address, result, Access::Word);
            let z = flags::is_zero(result, Access::Word);
            cpu.set_sr_flags(!z, z, flags::is_negative(result, Access::Word), false);
        }
        0x4 => {
            // PUSH: SP -= 2 always, even for byte operands.
            mnemonic = "PUSH";
            if as_mode == 0b00 {
                bus.consume_cycles(1);
            }
            let sp = cpu.sp().wrapping_sub(2);
            cpu.set_sp(sp);
            cpu.write_access(bus, sp, s, access);
        }
        0x5 => {
            // CALL: push return PC, then jump. Word-only, all addressing
            // modes. Symbolic/absolute addressing yields the computed
            // address as the jump target, not the memory word there.
            mnemonic = "CALL";
            bus.consume_cycles(1);
            let target = if src.is_symbolic_or_absolute {
                src.address.expect("symbolic/absolute always resolves an address")
            } else {
                s
            };
            let sp = cpu.sp().wrapping_sub(2);
            cpu.set_sp(sp);
            let return_pc = cpu.pc_raw();
            cpu.write_access(bus, sp, return_pc, Access::Word);
            cpu.set_pc_raw(target);
        }
        0x6 => {
            // RETI: pop SR, then pop PC.
            mnemonic = "RETI";
            bus.consume_cycles(2);
            let sp = cpu.sp();
            let sr = cpu.read_access(bus, sp, Access::Word);
            cpu.set_sr(sr);
            let sp = sp.wrapping_add(2);
            let pc = cpu.read_access(bus, sp, Access::Word);
            cpu.set_pc_raw(pc);
            cpu.set_sp(sp.wrapping_add(2));
        }
        _ => return Err(CoreError::InvalidFormatTwoOpcode(opcode)),
    }

    if src_auto_increment_to_pc {
        bus.consume_cycles(1);
    }

    if !want_disasm {
        return Ok(None);
    }

    let suffix = if access.is_byte() && matches!(opcode, 0x0 | 0x2 | 0x4) {
        ".B"
    } else {
        ""
    };
    Ok(Some(Disassembly {
        mnemonic: format!("{mnemonic}{suffix}"),
        operands: src.text.unwrap_or_default(),
        dest_is_pc: false,
    }))
}

/// Write a Format II result back to wherever the source operand came from:
/// the same register (register-direct mode) or the address it resolved to
/// (every memory-based mode). Mirrors the original's `is_saddr_virtual`
/// branch.
fn write_source<B: Bus>(
    cpu: &mut Cpu,
    bus: &mut B,
    source: u8,
    resolved_addr: Option<u16>,
    value: u16,
    access: Access,
) {
    if let Some(addr) = resolved_addr {
        cpu.write_access(bus, addr, value, access);
        return;
    }
    let value = if access.is_byte() { value & 0xFF } else { value };
    cpu.set_reg(bus, source, value);
}
