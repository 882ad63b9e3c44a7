//! Assembler and disassembler for x25-32 programs.
//!
//! This module provides:
//! - A single-pass assembler (text → program words)
//! - A disassembler (program words → re-assemblable text)
//! - The binary executable container

pub mod assembler;
pub mod disasm;
pub mod exe;

pub use assembler::{assemble, assemble_line, parse_literal, EncodingError};
pub use disasm::{disassemble, disassemble_instruction};
pub use exe::{load_exe, save_exe, ExeError, ExeHeader, Executable};
