//! Common infrastructure shared by all 68000-family CPU variants.

pub mod addressing;
pub mod alu;
pub mod conditions;
pub mod flags;
pub mod registers;
