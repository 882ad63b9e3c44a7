//! # LLTP/x25-32
//!
//! A cycle-level simulator of the x25-32, a small 32-bit CPU built from a
//! register file, a microcoded ALU, three register-transfer buses, an MMU
//! and a four-phase control unit.
//!
//! The instruction codec in [`isa`] is shared by the control unit, which
//! decodes it, and the assembler in [`asm`], which encodes it.

pub mod isa;
pub mod cpu;
pub mod asm;
pub mod clock;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use isa::{decode, encode, DecodeError, Instruction, Word};
pub use cpu::{Cpu, CpuError, CpuSnapshot, CpuState, Flags, MemoryLayout, Phase};
pub use asm::{assemble, disassemble, load_exe, save_exe, EncodingError, Executable};
pub use clock::{Clock, ClockConfig, ClockMode, HaltReason, RunSummary, StopSignal};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
