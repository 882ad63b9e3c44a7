//! CPU emulation for the LLTP/x25-32.
//!
//! This module implements the register-transfer model of the machine:
//! - a register file with access rights and side-effecting registers
//! - a 6-bit microcoded ALU with latched status flags
//! - three buses (A-feed, B-feed, writeback) moving one value per selection
//! - an MMU routing addresses to RAM and a memory-mapped console
//! - a four-phase control unit driving all of the above

pub mod registers;
pub mod alu;
pub mod fabric;
pub mod mmu;
pub mod memory;
pub mod control;
pub mod execute;

pub use registers::{Access, AccessError, Register, RegisterFile, RegisterKind};
pub use alu::{compute, Alu, Flags};
pub use fabric::{Bus, Datapath, Endpoint, Fabric, FabricError, TransferPlan};
pub use mmu::{AddressFault, MemoryDevice, MemoryRegion, Mmu, MmuError, Translation};
pub use memory::{Console, Memory, SharedOutput};
pub use control::{evaluate, ControlUnit, Phase, Retired};
pub use execute::{ClockEdge, Cpu, CpuError, CpuSnapshot, CpuState, MemoryLayout, MAX_REGION_WORDS};
