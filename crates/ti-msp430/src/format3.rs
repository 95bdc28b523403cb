//! Format III: conditional and unconditional jumps.
//!
//! Word layout: `[001C][CC][offset:10]`. The ten-bit field is a signed word
//! count, always even-valued once doubled, so the reachable range is
//! ±1024 bytes around the instruction following the jump.

use crate::bus::Bus;
use crate::cpu::Cpu;
use crate::disasm::Disassembly;

pub(crate) fn execute<B: Bus>(cpu: &mut Cpu, bus: &mut B, word: u16, want_disasm: bool) -> Option<Disassembly> {
    let condition = ((word >> 10) & 0x7) as u8;
    let raw = word & 0x3FF;
    let offset = if raw & 0x200 != 0 {
        (raw as i16) - 0x400
    } else {
        raw as i16
    } * 2;

    bus.consume_cycles(1);

    let (mnemonic, taken) = match condition {
        0x0 => ("JNZ", !cpu.registers().zero_flag()),
        0x1 => ("JZ", cpu.registers().zero_flag()),
        0x2 => ("JNC", !cpu.registers().carry()),
        0x3 => ("JC", cpu.registers().carry()),
        0x4 => ("JN", cpu.registers().negative_flag()),
        0x5 => ("JGE", cpu.registers().negative_flag() == cpu.registers().overflow_flag()),
        0x6 => ("JL", cpu.registers().negative_flag() != cpu.registers().overflow_flag()),
        0x7 => ("JMP", true),
        _ => unreachable!("condition is a 3-bit field"),
    };

    let target = cpu.pc_raw().wrapping_add(offset as u16);
    if taken {
        cpu.set_pc_raw(target);
    }

    if !want_disasm {
        return None;
    }

    Some(Disassembly {
        mnemonic: mnemonic.to_string(),
        operands: format!("{target:#06X}"),
        dest_is_pc: false,
    })
}
