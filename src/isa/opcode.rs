//! Opcode table and instruction-type classification.

use serde::{Deserialize, Serialize};
use crate::isa::DecodeError;

/// The three instruction encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstructionType {
    /// Register-register (R): dest, src and ALU microcode.
    Register,
    /// Register-immediate (I): dest, ALU microcode and a 32-bit immediate.
    Immediate,
    /// Jump (J): a 32-bit target.
    Jump,
}

/// Every opcode the machine recognizes.
///
/// Some of them (the flag-clearing group, multiply, shifts and rotates)
/// have a reserved encoding but no execution routine yet; the control unit
/// reports them as unimplemented instead of skipping them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpCode {
    // ==================== Jump ====================
    /// No operation
    Nop,
    /// Unconditional-by-default jump: PC := target
    Jmp,
    /// Branch: identical to JMP at execution time
    B,

    // ==================== ALU ====================
    /// ALU over two registers: dest := alu(dest, src)
    Aopr,
    /// ALU over a register and the immediate: dest := alu(dest, imm)
    Aopi,

    // ==================== Memory ====================
    /// dest := mem[src]
    Loadr,
    /// mem[src] := dest
    Storr,
    /// dest := mem[imm]
    Load,
    /// mem[imm] := dest
    Store,

    // ==================== Reserved ====================
    /// Clear the zero flag
    Clz,
    /// Clear the overflow flag
    Clof,
    /// Clear the negative flag
    Clng,
    /// Multiply
    Mul,
    /// Shift left
    Shl,
    /// Shift right
    Shr,
    /// Rotate left
    Rol,
    /// Rotate right
    Ror,
}

impl OpCode {
    /// All opcodes in table order.
    pub const ALL: [OpCode; 17] = [
        OpCode::Nop,
        OpCode::Jmp,
        OpCode::B,
        OpCode::Aopr,
        OpCode::Aopi,
        OpCode::Loadr,
        OpCode::Storr,
        OpCode::Load,
        OpCode::Store,
        OpCode::Clz,
        OpCode::Clof,
        OpCode::Clng,
        OpCode::Mul,
        OpCode::Shl,
        OpCode::Shr,
        OpCode::Rol,
        OpCode::Ror,
    ];

    /// The 6-bit encoding.
    pub const fn code(self) -> u8 {
        match self {
            OpCode::Nop => 0x00,
            OpCode::Jmp => 0x01,
            OpCode::B => 0x02,
            OpCode::Aopr => 0x08,
            OpCode::Aopi => 0x09,
            OpCode::Loadr => 0x10,
            OpCode::Storr => 0x11,
            OpCode::Load => 0x12,
            OpCode::Store => 0x13,
            OpCode::Clz => 0x18,
            OpCode::Clof => 0x19,
            OpCode::Clng => 0x1A,
            OpCode::Mul => 0x20,
            OpCode::Shl => 0x21,
            OpCode::Shr => 0x22,
            OpCode::Rol => 0x23,
            OpCode::Ror => 0x24,
        }
    }

    /// Look up an opcode by its 6-bit encoding.
    pub fn from_code(code: u8) -> Result<Self, DecodeError> {
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.code() == code)
            .ok_or(DecodeError::UnknownOpcode(code))
    }

    /// Which encoding this opcode uses.
    pub const fn instruction_type(self) -> InstructionType {
        match self {
            OpCode::Nop | OpCode::Jmp | OpCode::B => InstructionType::Jump,
            OpCode::Aopi | OpCode::Load | OpCode::Store => InstructionType::Immediate,
            OpCode::Aopr
            | OpCode::Loadr
            | OpCode::Storr
            | OpCode::Clz
            | OpCode::Clof
            | OpCode::Clng
            | OpCode::Mul
            | OpCode::Shl
            | OpCode::Shr
            | OpCode::Rol
            | OpCode::Ror => InstructionType::Register,
        }
    }

    /// Canonical mnemonic.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Nop => "NOP",
            OpCode::Jmp => "JMP",
            OpCode::B => "B",
            OpCode::Aopr => "AOPR",
            OpCode::Aopi => "AOPI",
            OpCode::Loadr => "LOADR",
            OpCode::Storr => "STORR",
            OpCode::Load => "LOAD",
            OpCode::Store => "STORE",
            OpCode::Clz => "CLZ",
            OpCode::Clof => "CLOF",
            OpCode::Clng => "CLNG",
            OpCode::Mul => "MUL",
            OpCode::Shl => "SHL",
            OpCode::Shr => "SHR",
            OpCode::Rol => "ROL",
            OpCode::Ror => "ROR",
        }
    }

    /// Whether the control unit has a microcode routine for this opcode.
    pub const fn is_implemented(self) -> bool {
        !matches!(
            self,
            OpCode::Clz
                | OpCode::Clof
                | OpCode::Clng
                | OpCode::Mul
                | OpCode::Shl
                | OpCode::Shr
                | OpCode::Rol
                | OpCode::Ror
        )
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Classify a raw 6-bit opcode.
pub fn classify(code: u8) -> Result<InstructionType, DecodeError> {
    Ok(OpCode::from_code(code)?.instruction_type())
}
