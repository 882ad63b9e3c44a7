//! Instruction set of the LLTP/x25-32.
//!
//! Every instruction occupies two 32-bit words. The low word carries the
//! opcode, condition, register and ALU microcode fields; the high word
//! carries the immediate or jump target. The control unit decodes this
//! layout and the assembler encodes it, so both sides share this module.

pub mod fields;
pub mod opcode;
pub mod condition;
pub mod register;
pub mod alu_op;
pub mod instruction;

pub use opcode::{classify, InstructionType, OpCode};
pub use condition::Condition;
pub use register::RegisterCode;
pub use alu_op::AluOpcode;
pub use instruction::{decode, encode, DecodeError, Instruction};

/// The machine word: the unit of storage, transfer and arithmetic.
pub type Word = u32;

/// Number of words in one encoded instruction.
pub const INSTRUCTION_WORDS: usize = 2;
