//! Top-level fetch/decode/execute/disassemble entry point.

use emu_core::{Observable, Value};

use crate::bus::{Access, Bus};
use crate::disasm::Disassembly;
use crate::error::CoreError;
use crate::registers::{self, Registers};
use crate::{format1, format2, format3};

/// A single MSP430 core: the sixteen-register file plus a run/halt flag.
///
/// Memory lives entirely outside this type, behind the [`Bus`] a caller
/// passes to [`Cpu::step`]; the core never owns or allocates the address
/// space it operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cpu {
    regs: Registers,
    running: bool,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    /// All registers zeroed and `running` cleared, matching
    /// `initialize_msp_registers`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            regs: Registers::new(),
            running: false,
        }
    }

    #[must_use]
    pub const fn registers(&self) -> &Registers {
        &self.regs
    }

    /// Read register `n` directly, bypassing the bus notify hook. For host
    /// setup/inspection; instruction execution goes through `reg`/`set_reg`.
    #[must_use]
    pub fn register(&self, n: u8) -> u16 {
        self.regs.get(n)
    }

    /// Write register `n` directly, bypassing the bus notify hook.
    pub fn set_register(&mut self, n: u8, value: u16) {
        self.regs.set(n, value);
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    pub const fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    #[must_use]
    pub fn pc_raw(&self) -> u16 {
        self.regs.pc()
    }

    pub fn set_pc_raw(&mut self, value: u16) {
        self.regs.set_pc(value);
    }

    #[must_use]
    pub fn sp(&self) -> u16 {
        self.regs.sp()
    }

    pub fn set_sp(&mut self, value: u16) {
        self.regs.set_sp(value);
    }

    #[must_use]
    pub fn sr(&self) -> u16 {
        self.regs.sr()
    }

    pub fn set_sr(&mut self, value: u16) {
        self.regs.set_sr(value);
    }

    #[must_use]
    pub fn carry(&self) -> bool {
        self.regs.carry()
    }

    #[must_use]
    pub fn overflow_flag(&self) -> bool {
        self.regs.overflow_flag()
    }

    pub(crate) fn set_sr_flags(&mut self, carry: bool, zero: bool, negative: bool, overflow: bool) {
        self.regs.set_sr_flags(carry, zero, negative, overflow);
    }

    /// Read register `n`, notifying the bus of the register-file access.
    pub(crate) fn reg<B: Bus>(&mut self, bus: &mut B, n: u8) -> u16 {
        bus.register_read_notify(u16::from(n));
        self.regs.get(n)
    }

    /// Write register `n`, notifying the bus of the register-file access.
    pub(crate) fn set_reg<B: Bus>(&mut self, bus: &mut B, n: u8, value: u16) {
        bus.register_write_notify(u16::from(n));
        self.regs.set(n, value);
    }

    /// Fetch one instruction-stream word at PC and advance PC by 2.
    pub(crate) fn fetch<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let word = self.read_access(bus, self.pc_raw(), Access::Word);
        self.set_pc_raw(self.pc_raw().wrapping_add(2));
        word
    }

    /// Read a byte or word at `address` through the bus, low byte first.
    pub(crate) fn read_access<B: Bus>(&mut self, bus: &mut B, address: u16, access: Access) -> u16 {
        match access {
            Access::Byte => u16::from(bus.read(address)),
            Access::Word => {
                let lo = bus.read(address);
                let hi = bus.read(address.wrapping_add(1));
                u16::from(lo) | (u16::from(hi) << 8)
            }
        }
    }

    /// Write a byte or word at `address` through the bus, low byte first.
    pub(crate) fn write_access<B: Bus>(&mut self, bus: &mut B, address: u16, value: u16, access: Access) {
        match access {
            Access::Byte => bus.write(address, (value & 0xFF) as u8),
            Access::Word => {
                bus.write(address, (value & 0xFF) as u8);
                bus.write(address.wrapping_add(1), ((value >> 8) & 0xFF) as u8);
            }
        }
    }

    /// Reset to the power-on state: every register zeroed, halted.
    pub const fn reset(&mut self) {
        self.regs = Registers::new();
        self.running = false;
    }

    /// Fetch, decode and execute one instruction at the current PC.
    ///
    /// Returns `Ok(Some(_))` when `want_disasm` is set and the instruction
    /// decoded to a known opcode, `Ok(None)` when disassembly wasn't
    /// requested or the instruction left `running` false (invalid top
    /// nibble), and `Err` only for a recognized-format, invalid-opcode
    /// instruction word (Format II opcodes 7 and above).
    pub fn step<B: Bus>(
        &mut self,
        bus: &mut B,
        want_disasm: bool,
    ) -> Result<Option<Disassembly>, CoreError> {
        self.running = true;
        let word = self.fetch(bus);
        let format_id = ((word >> 12) & 0xF) as u8;

        match format_id {
            0x1 => format2::execute(self, bus, word, want_disasm),
            0x2 | 0x3 => Ok(format3::execute(self, bus, word, want_disasm)),
            0x4..=0xF => Ok(format1::execute(self, bus, word, want_disasm)),
            _ => {
                self.set_pc_raw(self.pc_raw().wrapping_sub(2));
                self.running = false;
                Ok(None)
            }
        }
    }
}

impl Observable for Cpu {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "pc" => Some(self.regs.pc().into()),
            "sp" => Some(self.regs.sp().into()),
            "sr" => Some(self.regs.sr().into()),
            "running" => Some(self.running.into()),
            "flags.c" | "c" => Some(self.regs.carry().into()),
            "flags.z" | "z" => Some(self.regs.zero_flag().into()),
            "flags.n" | "n" => Some(self.regs.negative_flag().into()),
            "flags.v" | "v" => Some(self.regs.overflow_flag().into()),
            _ => {
                let n = registers::reg_name_to_num(path);
                (0..=15).contains(&n).then(|| self.regs.get(n as u8).into())
            }
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "pc", "sp", "sr", "running", "flags.c", "flags.z", "flags.n", "flags.v", "r0", "r1",
            "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "r11", "r12", "r13", "r14",
            "r15",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestBus {
        mem: [u8; 0x10000],
    }

    impl TestBus {
        fn new() -> Self {
            Self { mem: [0; 0x10000] }
        }
    }

    impl Bus for TestBus {
        fn read(&mut self, address: u16) -> u8 {
            self.mem[address as usize]
        }

        fn write(&mut self, address: u16, value: u8) {
            self.mem[address as usize] = value;
        }
    }

    #[test]
    fn invalid_top_nibble_halts_and_rewinds_pc() {
        let mut cpu = Cpu::new();
        let mut bus = TestBus::new();
        bus.write(0x0000, 0x00);
        bus.write(0x0001, 0x00);
        cpu.set_pc_raw(0x0000);
        cpu.set_running(true);
        let result = cpu.step(&mut bus, false).unwrap();
        assert!(result.is_none());
        assert!(!cpu.is_running());
        assert_eq!(cpu.pc_raw(), 0x0000);
    }

    #[test]
    fn reset_zeroes_every_register() {
        let mut cpu = Cpu::new();
        cpu.set_pc_raw(0x1234);
        cpu.set_sp(0x5678);
        cpu.reset();
        assert_eq!(cpu.pc_raw(), 0);
        assert_eq!(cpu.sp(), 0);
        assert!(!cpu.is_running());
    }

    #[test]
    fn query_reports_pc_and_flags() {
        let cpu = Cpu::new();
        assert_eq!(cpu.query("pc"), Some(Value::U16(0)));
        assert_eq!(cpu.query("flags.c"), Some(Value::Bool(false)));
        assert_eq!(cpu.query("bogus"), None);
    }
}
