//! Typed instructions and the bit-exact codec shared by the control unit
//! and the assembler.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::isa::fields::{self, Field};
use crate::isa::{AluOpcode, Condition, InstructionType, OpCode, RegisterCode, Word};

/// A decoded instruction.
///
/// The variant always matches `opcode.instruction_type()` for
/// instructions produced by [`decode`] or by the assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instruction {
    /// R-type: ALU over two registers, register-addressed memory access,
    /// and the reserved flag/shift group.
    Register {
        opcode: OpCode,
        condition: Condition,
        dest: RegisterCode,
        src: RegisterCode,
        alu: AluOpcode,
    },
    /// I-type: ALU over a register and an immediate, immediate-addressed
    /// memory access.
    Immediate {
        opcode: OpCode,
        condition: Condition,
        dest: RegisterCode,
        alu: AluOpcode,
        immediate: Word,
    },
    /// J-type: jumps and NOP.
    Jump {
        opcode: OpCode,
        condition: Condition,
        target: Word,
    },
}

impl Instruction {
    /// A NOP that always executes.
    pub const NOP: Instruction = Instruction::Jump {
        opcode: OpCode::Nop,
        condition: Condition::Always,
        target: 0,
    };

    pub fn opcode(&self) -> OpCode {
        match *self {
            Instruction::Register { opcode, .. }
            | Instruction::Immediate { opcode, .. }
            | Instruction::Jump { opcode, .. } => opcode,
        }
    }

    pub fn condition(&self) -> Condition {
        match *self {
            Instruction::Register { condition, .. }
            | Instruction::Immediate { condition, .. }
            | Instruction::Jump { condition, .. } => condition,
        }
    }

    pub fn instruction_type(&self) -> InstructionType {
        match self {
            Instruction::Register { .. } => InstructionType::Register,
            Instruction::Immediate { .. } => InstructionType::Immediate,
            Instruction::Jump { .. } => InstructionType::Jump,
        }
    }

    /// Whether the variant agrees with the opcode's encoding type.
    pub fn is_well_formed(&self) -> bool {
        self.opcode().instruction_type() == self.instruction_type()
    }
}

/// Encode an instruction as its (low, high) word pair.
///
/// Reserved bits are always written as zero.
pub fn encode(instr: &Instruction) -> [Word; 2] {
    let header = |opcode: OpCode, condition: Condition| {
        let word = fields::OPCODE.insert(0, opcode.code() as Word);
        fields::CONDITION.insert(word, condition.code() as Word)
    };

    match *instr {
        Instruction::Register { opcode, condition, dest, src, alu } => {
            let mut low = header(opcode, condition);
            low = fields::DEST.insert(low, dest.code() as Word);
            low = fields::SRC.insert(low, src.code() as Word);
            low = fields::ALU_R.insert(low, alu.bits() as Word);
            [low, 0]
        }
        Instruction::Immediate { opcode, condition, dest, alu, immediate } => {
            let mut low = header(opcode, condition);
            low = fields::DEST.insert(low, dest.code() as Word);
            low = fields::ALU_I.insert(low, alu.bits() as Word);
            [low, immediate]
        }
        Instruction::Jump { opcode, condition, target } => [header(opcode, condition), target],
    }
}

/// Decode a (low, high) word pair.
///
/// Fails on an unknown opcode, condition or register code, and on any
/// non-zero reserved bit, so that every accepted pair re-encodes to itself.
pub fn decode(words: [Word; 2]) -> Result<Instruction, DecodeError> {
    let [low, high] = words;
    let opcode = OpCode::from_code(fields::OPCODE.extract(low) as u8)?;
    let condition = Condition::from_code(fields::CONDITION.extract(low) as u8)?;

    let instr = match opcode.instruction_type() {
        InstructionType::Register => {
            check_reserved(0, low & fields::RESERVED_R)?;
            check_reserved(1, high)?;
            Instruction::Register {
                opcode,
                condition,
                dest: register(fields::DEST, low)?,
                src: register(fields::SRC, low)?,
                alu: AluOpcode::from_bits(fields::ALU_R.extract(low) as u8),
            }
        }
        InstructionType::Immediate => {
            check_reserved(0, low & fields::RESERVED_I)?;
            Instruction::Immediate {
                opcode,
                condition,
                dest: register(fields::DEST, low)?,
                alu: AluOpcode::from_bits(fields::ALU_I.extract(low) as u8),
                immediate: high,
            }
        }
        InstructionType::Jump => {
            check_reserved(0, low & fields::RESERVED_J)?;
            Instruction::Jump {
                opcode,
                condition,
                target: high,
            }
        }
    };

    Ok(instr)
}

fn register(field: Field, word: Word) -> Result<RegisterCode, DecodeError> {
    RegisterCode::from_code(field.extract(word) as u8)
}

fn check_reserved(word: usize, bits: Word) -> Result<(), DecodeError> {
    if bits == 0 {
        Ok(())
    } else {
        Err(DecodeError::ReservedBits { word, bits })
    }
}

/// Errors raised while decoding or evaluating an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown opcode: 0x{0:02X}")]
    UnknownOpcode(u8),

    #[error("unknown condition code: {0}")]
    UnknownCondition(u8),

    #[error("unknown register code: 0x{0:02X}")]
    UnknownRegister(u8),

    #[error("reserved bits set in word {word}: 0x{bits:08X}")]
    ReservedBits { word: usize, bits: Word },

    #[error("condition {0} has no flag mapping")]
    UnmappedCondition(Condition),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_condition() -> impl Strategy<Value = Condition> {
        proptest::sample::select(Condition::ALL.to_vec())
    }

    fn any_register() -> impl Strategy<Value = RegisterCode> {
        proptest::sample::select(RegisterCode::ALL.to_vec())
    }

    fn any_opcode_of(kind: InstructionType) -> impl Strategy<Value = OpCode> {
        let ops: Vec<OpCode> = OpCode::ALL
            .iter()
            .copied()
            .filter(|op| op.instruction_type() == kind)
            .collect();
        proptest::sample::select(ops)
    }

    fn any_alu() -> impl Strategy<Value = AluOpcode> {
        (0u8..64).prop_map(AluOpcode::from_bits)
    }

    fn any_instruction() -> impl Strategy<Value = Instruction> {
        prop_oneof![
            (
                any_opcode_of(InstructionType::Register),
                any_condition(),
                any_register(),
                any_register(),
                any_alu()
            )
                .prop_map(|(opcode, condition, dest, src, alu)| Instruction::Register {
                    opcode,
                    condition,
                    dest,
                    src,
                    alu
                }),
            (
                any_opcode_of(InstructionType::Immediate),
                any_condition(),
                any_register(),
                any_alu(),
                any::<u32>()
            )
                .prop_map(|(opcode, condition, dest, alu, immediate)| Instruction::Immediate {
                    opcode,
                    condition,
                    dest,
                    alu,
                    immediate
                }),
            (any_opcode_of(InstructionType::Jump), any_condition(), any::<u32>())
                .prop_map(|(opcode, condition, target)| Instruction::Jump {
                    opcode,
                    condition,
                    target
                }),
        ]
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(instr in any_instruction()) {
            prop_assert!(instr.is_well_formed());
            prop_assert_eq!(decode(encode(&instr)).unwrap(), instr);
        }

        #[test]
        fn prop_encode_inverts_decode(
            opcode in proptest::sample::select(OpCode::ALL.to_vec()),
            body in any::<u32>(),
            high in any::<u32>(),
            clear_reserved in any::<bool>(),
            clear_high in any::<bool>(),
        ) {
            let reserved = match opcode.instruction_type() {
                InstructionType::Register => fields::RESERVED_R,
                InstructionType::Immediate => fields::RESERVED_I,
                InstructionType::Jump => fields::RESERVED_J,
            };
            let mut low = fields::OPCODE.insert(body, opcode.code() as Word);
            if clear_reserved {
                low &= !reserved;
            }
            let high = if clear_high { 0 } else { high };

            if let Ok(instr) = decode([low, high]) {
                prop_assert_eq!(encode(&instr), [low, high]);
            }
        }
    }

    #[test]
    fn test_encode_r_type_layout() {
        let instr = Instruction::Register {
            opcode: OpCode::Aopr,
            condition: Condition::Zr,
            dest: RegisterCode::Gp1,
            src: RegisterCode::Gp2,
            alu: AluOpcode::ADDITION_SIGNED,
        };
        let [low, high] = encode(&instr);
        assert_eq!(low >> 26, 0x08);
        assert_eq!((low >> 22) & 0xF, 5);
        assert_eq!((low >> 17) & 0x1F, 0x11);
        assert_eq!((low >> 12) & 0x1F, 0x12);
        assert_eq!((low >> 6) & 0x3F, 0b000010);
        assert_eq!(low & 0x3F, 0);
        assert_eq!(high, 0);
    }

    #[test]
    fn test_encode_i_type_layout() {
        let instr = Instruction::Immediate {
            opcode: OpCode::Aopi,
            condition: Condition::Always,
            dest: RegisterCode::Gp3,
            alu: AluOpcode::TRANSFER_B,
            immediate: 0xDEAD_BEEF,
        };
        let [low, high] = encode(&instr);
        assert_eq!(low >> 26, 0x09);
        assert_eq!((low >> 17) & 0x1F, 0x13);
        assert_eq!((low >> 11) & 0x3F, 0b110000);
        assert_eq!(low & 0x7FF, 0);
        assert_eq!(high, 0xDEAD_BEEF);
    }

    #[test]
    fn test_decode_rejects_reserved_bits() {
        let [low, _] = encode(&Instruction::NOP);
        assert!(matches!(
            decode([low | 1, 0]),
            Err(DecodeError::ReservedBits { word: 0, bits: 1 })
        ));

        let [low, _] = encode(&Instruction::Register {
            opcode: OpCode::Loadr,
            condition: Condition::Always,
            dest: RegisterCode::Gp0,
            src: RegisterCode::Gp1,
            alu: AluOpcode::default(),
        });
        assert!(matches!(
            decode([low, 7]),
            Err(DecodeError::ReservedBits { word: 1, bits: 7 })
        ));
    }

    #[test]
    fn test_decode_unknown_codes() {
        let bad_opcode = 0x3F << 26;
        assert!(matches!(decode([bad_opcode, 0]), Err(DecodeError::UnknownOpcode(0x3F))));

        let bad_condition = fields::CONDITION.insert(0, 12);
        assert!(matches!(decode([bad_condition, 0]), Err(DecodeError::UnknownCondition(12))));

        let bad_register = fields::DEST.insert(fields::OPCODE.insert(0, OpCode::Load.code() as Word), 0x08);
        assert!(matches!(decode([bad_register, 0]), Err(DecodeError::UnknownRegister(0x08))));
    }
}
