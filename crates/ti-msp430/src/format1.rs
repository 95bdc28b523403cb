//! Format I: two-operand arithmetic/logic instructions.
//!
//! Word layout: `[C:4][S:4][Ad:1][BW:1][As:2][D:4]`.

use crate::bus::{Access, Bus};
use crate::constgen;
use crate::cpu::Cpu;
use crate::dadd;
use crate::disasm::Disassembly;
use crate::flags;
use crate::operand::{self, DestTarget};
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
) -> Option<Disassembly> {
    let opcode = ((word >> 12) & 0xF) as u8;
    let source = ((word >> 8) & 0xF) as u8;
    let ad_flag = ((word >> 7) & 0x1) as u8;
    let bw_flag = (word >> 6) & 0x1;
    let as_mode = ((word >> 4) & 0x3) as u8;
    let dest = (word & 0xF) as u8;
    let access = if bw_flag == 1 { Access::Byte } else { Access::Word };
    let mask = width_mask(access);

    let cg_active = constgen::is_active(source, as_mode);
    let src = operand::resolve_source(cpu, bus, source, as_mode, access, want_disasm);
    let dst = operand::resolve_dest(cpu, bus, dest, ad_flag, want_disasm);

    let dest_is_pc = ad_flag == 0 && dest == PC;
    if dest_is_pc {
        bus.consume_cycles(if cg_active { 1 } else { 2 });
    }

    let s = src.value & mask;
    // MOV never reads the previous destination value: pre-reading it would
    // waste a cycle and misbehave for write-only memory-mapped registers.
    let d = if opcode == 0x4 {
        0
    } else {
        cpu.read_target(bus, dst.target, access) & mask
    };

    let mnemonic_base;
    let mut writes_dest = true;
    let result: u16;

    match opcode {
        0x4 => {
            mnemonic_base = "MOV";
            result = s;
        }
        0x5 => {
            mnemonic_base = "ADD";
            result = d.wrapping_add(s) & mask;
            let c = flags::is_add_carry(d, s, false, access);
            let v = flags::is_add_overflow(d, s, false, access);
            cpu.set_sr_flags(c, flags::is_zero(result, access), flags::is_negative(result, access), v);
        }
        0x6 => {
            mnemonic_base = "ADDC";
            let c_in = cpu.carry();
            result = (d.wrapping_add(s).wrapping_add(u16::from(c_in))) & mask;
            let c = flags::is_add_carry(d, s, c_in, access);
            let v = flags::is_add_overflow(d, s, c_in, access);
            cpu.set_sr_flags(c, flags::is_zero(result, access), flags::is_negative(result, access), v);
        }
        0x7 => {
            // SUBC: dst + !src + C, the manual's form.
            mnemonic_base = "SUBC";
            let c_in = cpu.carry();
            let not_s = (!s) & mask;
            result = (d.wrapping_add(not_s).wrapping_add(u16::from(c_in))) & mask;
            let c = flags::is_sub_carry(d, s, c_in, access);
            let v = flags::is_sub_overflow(d, s, c_in, access);
            cpu.set_sr_flags(c, flags::is_zero(result, access), flags::is_negative(result, access), v);
        }
        0x8 => {
            mnemonic_base = "SUB";
            let not_s = (!s) & mask;
            result = (d.wrapping_add(not_s).wrapping_add(1)) & mask;
            let c = flags::is_sub_carry(d, s, true, access);
            let v = flags::is_sub_overflow(d, s, true, access);
            cpu.set_sr_flags(c, flags::is_zero(result, access), flags::is_negative(result, access), v);
        }
        0x9 => {
            mnemonic_base = "CMP";
            let not_s = (!s) & mask;
            result = (d.wrapping_add(not_s).wrapping_add(1)) & mask;
            let c = flags::is_sub_carry(d, s, true, access);
            let v = flags::is_sub_overflow(d, s, true, access);
            cpu.set_sr_flags(c, flags::is_zero(result, access), flags::is_negative(result, access), v);
            writes_dest = false;
        }
        0xA => {
            mnemonic_base = "DADD";
            let c_in = cpu.carry();
            let (sum, carry_out) = dadd::bcd_add(d, s, c_in, access);
            result = sum & mask;
            let v = cpu.overflow_flag(); // left undefined by the ISA; preserved
            cpu.set_sr_flags(carry_out, flags::is_zero(result, access), flags::is_negative(result, access), v);
        }
        0xB => {
            mnemonic_base = "BIT";
            result = d & s;
            let z = flags::is_zero(result, access);
            cpu.set_sr_flags(!z, z, flags::is_negative(result, access), false);
            writes_dest = false;
        }
        0xC => {
            mnemonic_base = "BIC";
            result = d & !s & mask;
        }
        0xD => {
            mnemonic_base = "BIS";
            result = (d | s) & mask;
        }
        0xE => {
            mnemonic_base = "XOR";
            result = (d ^ s) & mask;
            let z = flags::is_zero(result, access);
            let v = flags::is_negative(d, access) && flags::is_negative(s, access);
            cpu.set_sr_flags(!z, z, flags::is_negative(result, access), v);
        }
        0xF => {
            mnemonic_base = "AND";
            result = d & s;
            let z = flags::is_zero(result, access);
            cpu.set_sr_flags(!z, z, flags::is_negative(result, access), false);
        }
        _ => unreachable!("opcode is a 4-bit field"),
    }
    if writes_dest {
        cpu.write_target(bus, dst.target, result, access);
    }

    if !want_disasm {
        return None;
    }

    let suffix = if access.is_byte() { ".B" } else { "" };
    let mnemonic = format!("{mnemonic_base}{suffix}");
    let operands = format!(
        "{}, {}",
        src.text.unwrap_or_default(),
        dst.text.unwrap_or_default()
    );
    Some(Disassembly {
        mnemonic,
        operands,
        dest_is_pc,
    })
}

impl Cpu {
    pub(crate) fn read_target<B: Bus>(&mut self, bus: &mut B, target: DestTarget, access: Access) -> u16 {
        match target {
            DestTarget::Register(n) => self.reg(bus, n),
            DestTarget::Memory(addr) => self.read_access(bus, addr, access),
        }
    }

    pub(crate) fn write_target<B: Bus>(
        &mut self,
        bus: &mut B,
        target: DestTarget,
        value: u16,
        access: Access,
    ) {
        match target {
            // Byte writes to a register clear the high byte entirely,
            // matching the ISA (not "preserve" or "leave unchanged" as two
            // superseded variants of the original C did).
            DestTarget::Register(n) => {
                let value = if access.is_byte() { value & 0xFF } else { value };
                self.set_reg(bus, n, value);
            }
            DestTarget::Memory(addr) => self.write_access(bus, addr, value, access),
        }
    }
}
