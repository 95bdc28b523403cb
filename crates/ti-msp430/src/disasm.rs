//! The transient disassembly value a `step` call can optionally produce
//! alongside execution, instead of requiring a separate decode pass.

/// One decoded-and-executed instruction, rendered for display.
///
/// `dest_is_pc` flags instructions whose destination write landed on the
/// program counter outside the normal fetch increment (a Format I MOV/ADD/
/// etc. with `dest == PC`), which callers commonly want to highlight as a
/// control-flow edge distinct from `CALL`/`JMP`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disassembly {
    pub mnemonic: String,
    pub operands: String,
    pub dest_is_pc: bool,
}

impl std::fmt::Display for Disassembly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.operands.is_empty() {
            write!(f, "{}", self.mnemonic)
        } else {
            write!(f, "{} {}", self.mnemonic, self.operands)
        }
    }
}
