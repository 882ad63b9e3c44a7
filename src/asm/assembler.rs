//! Single-pass assembler for x25-32 programs.
//!
//! Syntax:
//! ```text
//! ; Comment
//!     MOV GP1, 5          ; I-type: second operand is a literal
//!     ADD GP1, GP2        ; R-type: second operand is a register
//!     SUBNZ GP1, 0x10     ; condition suffix on any mnemonic
//!     INC GP1             ; unary forms encode immediate 0
//!     STORE GP1, 0x1000   ; absolute address
//!     LOADR GP3, GP1      ; address taken from a register
//!     AOPI GP1, 3, A_Increment   ; raw ALU forms, named or 6-bit microcode
//!     JMP 0               ; absolute target, no labels
//!     .WORD 0x04000000, 0 ; two raw words
//! ```
//!
//! Every line produces exactly two words. Any error rejects the whole
//! source.

use thiserror::Error;

use crate::isa::{encode, AluOpcode, Condition, Instruction, OpCode, RegisterCode, Word};

/// Assemble source code to program words.
pub fn assemble(source: &str) -> Result<Vec<Word>, EncodingError> {
    let mut asm = Assembler::new();
    asm.assemble(source)?;
    Ok(asm.output)
}

/// Assemble a single line. Returns `None` for a blank or comment-only
/// line.
pub fn assemble_line(line: &str) -> Result<Option<[Word; 2]>, EncodingError> {
    Assembler::new().process_line(line, 1)
}

/// Mnemonics accepted before condition-suffix splitting.
const MNEMONICS: &[&str] = &[
    "MOV", "ADD", "SUB", "AND", "OR", "INC", "DEC", "NOT", "NEG", "LOAD", "STORE", "LOADR",
    "STORR", "NOP", "JMP", "B", "CLZ", "CLOF", "CLNG", "MUL", "SHL", "SHR", "ROL", "ROR", "AOPR",
    "AOPI", ".WORD",
];

/// Binary ALU aliases, usable as R- or I-type.
pub(crate) fn binary_alias(mnemonic: &str) -> Option<AluOpcode> {
    match mnemonic {
        "MOV" => Some(AluOpcode::TRANSFER_B),
        "ADD" => Some(AluOpcode::ADDITION_SIGNED),
        "SUB" => Some(AluOpcode::AB_SUBTRACTION_SIGNED),
        "AND" => Some(AluOpcode::LOGICAL_AND),
        "OR" => Some(AluOpcode::LOGICAL_OR),
        _ => None,
    }
}

/// Unary ALU aliases, always I-type with immediate 0.
pub(crate) fn unary_alias(mnemonic: &str) -> Option<AluOpcode> {
    match mnemonic {
        "INC" => Some(AluOpcode::A_INCREMENT),
        "DEC" => Some(AluOpcode::A_DECREMENT),
        "NOT" => Some(AluOpcode::A_LOGICAL_NOT),
        "NEG" => Some(AluOpcode::A_NEGATIVE),
        _ => None,
    }
}

/// Parse a numeric literal: `0b` binary, `0x` hex, otherwise decimal. A
/// leading `-` negates in two's complement. No other sign is accepted.
pub fn parse_literal(token: &str) -> Option<Word> {
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let lower = digits.to_ascii_lowercase();
    let (radix, body) = if let Some(bin) = lower.strip_prefix("0b") {
        (2, bin)
    } else if let Some(hex) = lower.strip_prefix("0x") {
        (16, hex)
    } else {
        (10, lower.as_str())
    };
    if body.is_empty() || !body.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    let magnitude = u64::from_str_radix(body, radix).ok()?;

    if negative {
        if magnitude > 1 << 31 {
            return None;
        }
        Some((magnitude as Word).wrapping_neg())
    } else {
        Word::try_from(magnitude).ok()
    }
}

/// Register names start with a letter; anything starting with a digit or
/// a sign is meant as a literal and must parse as one.
fn looks_numeric(token: &str) -> bool {
    token.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '+')
}

/// The assembler state.
struct Assembler {
    /// Output words.
    output: Vec<Word>,
}

impl Assembler {
    fn new() -> Self {
        Self { output: Vec::new() }
    }

    fn assemble(&mut self, source: &str) -> Result<(), EncodingError> {
        for (line_num, line) in source.lines().enumerate() {
            if let Some(words) = self.process_line(line, line_num + 1)? {
                self.output.extend_from_slice(&words);
            }
        }
        Ok(())
    }

    fn process_line(&self, line: &str, line_num: usize) -> Result<Option<[Word; 2]>, EncodingError> {
        // Remove comments
        let line = match line.find(';') {
            Some(idx) => &line[..idx],
            None => line,
        };

        let tokens: Vec<&str> = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .collect();
        let Some((head, operands)) = tokens.split_first() else {
            return Ok(None);
        };

        let upper = head.to_uppercase();
        let (mnemonic, condition) = split_condition(&upper, line_num)?;
        let line = Line {
            num: line_num,
            mnemonic,
            condition,
            operands,
        };
        line.encode().map(Some)
    }
}

/// Split a mnemonic into its base and condition suffix. A full match wins,
/// so `CLNG` is never read as `CL` + `NG`.
fn split_condition(upper: &str, line: usize) -> Result<(&str, Condition), EncodingError> {
    if MNEMONICS.contains(&upper) {
        return Ok((upper, Condition::Always));
    }
    let unknown = || EncodingError::UnknownMnemonic {
        line,
        mnemonic: upper.to_string(),
    };
    let split = upper.len().checked_sub(2).filter(|&i| i > 0 && upper.is_char_boundary(i));
    let Some(split) = split else {
        return Err(unknown());
    };
    let (base, suffix) = upper.split_at(split);
    if !MNEMONICS.contains(&base) {
        return Err(unknown());
    }
    match Condition::from_suffix(suffix) {
        Some(condition) => Ok((base, condition)),
        None => Err(EncodingError::UnknownCondition {
            line,
            suffix: suffix.to_string(),
        }),
    }
}

/// One tokenized source line.
struct Line<'a> {
    num: usize,
    mnemonic: &'a str,
    condition: Condition,
    operands: &'a [&'a str],
}

impl Line<'_> {
    fn encode(&self) -> Result<[Word; 2], EncodingError> {
        let condition = self.condition;
        let m = self.mnemonic;

        if m == ".WORD" {
            if condition != Condition::Always {
                return Err(EncodingError::UnknownMnemonic {
                    line: self.num,
                    mnemonic: format!("{m}{}", condition.suffix()),
                });
            }
            self.expect_operands(2)?;
            return Ok([self.literal(0)?, self.literal(1)?]);
        }

        let instr = if let Some(alu) = binary_alias(m) {
            self.expect_operands(2)?;
            let dest = self.register(0)?;
            if looks_numeric(self.operands[1]) {
                Instruction::Immediate {
                    opcode: OpCode::Aopi,
                    condition,
                    dest,
                    alu,
                    immediate: self.literal(1)?,
                }
            } else {
                Instruction::Register {
                    opcode: OpCode::Aopr,
                    condition,
                    dest,
                    src: self.register(1)?,
                    alu,
                }
            }
        } else if let Some(alu) = unary_alias(m) {
            self.expect_operands(1)?;
            Instruction::Immediate {
                opcode: OpCode::Aopi,
                condition,
                dest: self.register(0)?,
                alu,
                immediate: 0,
            }
        } else {
            let opcode = OpCode::ALL
                .iter()
                .copied()
                .find(|op| op.mnemonic() == m)
                .ok_or_else(|| EncodingError::UnknownMnemonic {
                    line: self.num,
                    mnemonic: m.to_string(),
                })?;
            self.opcode_form(opcode)?
        };

        Ok(encode(&instr))
    }

    fn opcode_form(&self, opcode: OpCode) -> Result<Instruction, EncodingError> {
        let condition = self.condition;
        let instr = match opcode {
            OpCode::Nop => {
                self.expect_operands(0)?;
                Instruction::Jump {
                    opcode,
                    condition,
                    target: 0,
                }
            }
            OpCode::Jmp | OpCode::B => {
                self.expect_operands(1)?;
                Instruction::Jump {
                    opcode,
                    condition,
                    target: self.literal(0)?,
                }
            }
            OpCode::Load | OpCode::Store => {
                self.expect_operands(2)?;
                Instruction::Immediate {
                    opcode,
                    condition,
                    dest: self.register(0)?,
                    alu: AluOpcode::default(),
                    immediate: self.literal(1)?,
                }
            }
            OpCode::Clz | OpCode::Clof | OpCode::Clng => {
                self.expect_operands(0)?;
                Instruction::Register {
                    opcode,
                    condition,
                    dest: RegisterCode::Zero,
                    src: RegisterCode::Zero,
                    alu: AluOpcode::default(),
                }
            }
            OpCode::Aopr => {
                self.expect_operands(3)?;
                Instruction::Register {
                    opcode,
                    condition,
                    dest: self.register(0)?,
                    src: self.register(1)?,
                    alu: self.alu(2)?,
                }
            }
            OpCode::Aopi => {
                self.expect_operands(3)?;
                Instruction::Immediate {
                    opcode,
                    condition,
                    dest: self.register(0)?,
                    alu: self.alu(2)?,
                    immediate: self.literal(1)?,
                }
            }
            // LOADR, STORR and the reserved two-register group
            _ => {
                self.expect_operands(2)?;
                Instruction::Register {
                    opcode,
                    condition,
                    dest: self.register(0)?,
                    src: self.register(1)?,
                    alu: AluOpcode::default(),
                }
            }
        };
        Ok(instr)
    }

    fn expect_operands(&self, expected: usize) -> Result<(), EncodingError> {
        if self.operands.len() == expected {
            Ok(())
        } else {
            Err(EncodingError::OperandCount {
                line: self.num,
                mnemonic: self.mnemonic.to_string(),
                expected,
                found: self.operands.len(),
            })
        }
    }

    fn register(&self, index: usize) -> Result<RegisterCode, EncodingError> {
        let token = self.operands[index];
        RegisterCode::from_name(token).ok_or_else(|| EncodingError::UnknownRegister {
            line: self.num,
            name: token.to_string(),
        })
    }

    fn literal(&self, index: usize) -> Result<Word, EncodingError> {
        let token = self.operands[index];
        parse_literal(token).ok_or_else(|| EncodingError::MalformedLiteral {
            line: self.num,
            token: token.to_string(),
        })
    }

    fn alu(&self, index: usize) -> Result<AluOpcode, EncodingError> {
        let token = self.operands[index];
        if let Some(op) = AluOpcode::from_name(token) {
            return Ok(op);
        }
        match parse_literal(token) {
            Some(bits) if bits <= 0x3F => Ok(AluOpcode::from_bits(bits as u8)),
            _ => Err(EncodingError::InvalidAluCode {
                line: self.num,
                token: token.to_string(),
            }),
        }
    }
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("unknown condition suffix on line {line}: {suffix}")]
    UnknownCondition { line: usize, suffix: String },

    #[error("unknown register on line {line}: {name}")]
    UnknownRegister { line: usize, name: String },

    #[error("malformed literal on line {line}: {token}")]
    MalformedLiteral { line: usize, token: String },

    #[error("invalid ALU microcode on line {line}: {token}")]
    InvalidAluCode { line: usize, token: String },

    #[error("{mnemonic} on line {line} takes {expected} operand(s), found {found}")]
    OperandCount {
        line: usize,
        mnemonic: String,
        expected: usize,
        found: usize,
    },
}

impl EncodingError {
    /// 1-based source line of the error.
    pub fn line(&self) -> usize {
        match *self {
            EncodingError::UnknownMnemonic { line, .. }
            | EncodingError::UnknownCondition { line, .. }
            | EncodingError::UnknownRegister { line, .. }
            | EncodingError::MalformedLiteral { line, .. }
            | EncodingError::InvalidAluCode { line, .. }
            | EncodingError::OperandCount { line, .. } => line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::decode;
    use rstest::rstest;

    fn decode_all(words: &[Word]) -> Vec<Instruction> {
        words
            .chunks(2)
            .map(|pair| decode([pair[0], pair[1]]).unwrap())
            .collect()
    }

    #[test]
    fn test_assemble_simple() {
        let source = r#"
            ; Simple test program
            MOV GP1, 5
            ADD GP1, 1   ; bump
            JMP 0
        "#;

        let result = assemble(source).unwrap();
        assert_eq!(result.len(), 6);
        assert_eq!(
            decode_all(&result)[0],
            Instruction::Immediate {
                opcode: OpCode::Aopi,
                condition: Condition::Always,
                dest: RegisterCode::Gp1,
                alu: AluOpcode::TRANSFER_B,
                immediate: 5,
            }
        );
    }

    #[test]
    fn test_register_or_immediate() {
        let instrs = decode_all(&assemble("ADD GP1, GP2\nADD GP1, 0x10\nor gp3, 0b101").unwrap());
        assert_eq!(
            instrs[0],
            Instruction::Register {
                opcode: OpCode::Aopr,
                condition: Condition::Always,
                dest: RegisterCode::Gp1,
                src: RegisterCode::Gp2,
                alu: AluOpcode::ADDITION_SIGNED,
            }
        );
        assert!(matches!(instrs[1], Instruction::Immediate { immediate: 0x10, .. }));
        assert!(matches!(
            instrs[2],
            Instruction::Immediate { immediate: 5, dest: RegisterCode::Gp3, alu, .. } if alu == AluOpcode::LOGICAL_OR
        ));
    }

    #[test]
    fn test_condition_suffix() {
        let instrs = decode_all(&assemble("JMPZR 4\nBNZ 8\nINCNG GP0").unwrap());
        assert_eq!(instrs[0].condition(), Condition::Zr);
        assert_eq!(instrs[1].condition(), Condition::Nz);
        assert_eq!(instrs[1].opcode(), OpCode::B);
        assert_eq!(instrs[2].condition(), Condition::Ng);
    }

    #[test]
    fn test_full_mnemonic_wins_over_suffix() {
        let instrs = decode_all(&assemble("CLNG\nCLNGNZ").unwrap());
        assert_eq!(instrs[0].opcode(), OpCode::Clng);
        assert_eq!(instrs[0].condition(), Condition::Always);
        assert_eq!(instrs[1].opcode(), OpCode::Clng);
        assert_eq!(instrs[1].condition(), Condition::Nz);
    }

    #[test]
    fn test_unary_forms_encode_zero_immediate() {
        let instrs = decode_all(&assemble("INC GP1\nDEC GP2\nNOT GP3\nNEG GP4").unwrap());
        let alus: Vec<AluOpcode> = instrs
            .iter()
            .map(|i| match *i {
                Instruction::Immediate { alu, immediate: 0, .. } => alu,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            alus,
            vec![
                AluOpcode::A_INCREMENT,
                AluOpcode::A_DECREMENT,
                AluOpcode::A_LOGICAL_NOT,
                AluOpcode::A_NEGATIVE
            ]
        );
    }

    #[test]
    fn test_raw_forms() {
        let instrs = decode_all(&assemble("AOPR GP1, GP2, BA_SubtractionSigned\nAOPI GP1, 7, 0b111111").unwrap());
        assert!(matches!(
            instrs[0],
            Instruction::Register { alu, .. } if alu == AluOpcode::BA_SUBTRACTION_SIGNED
        ));
        assert!(matches!(
            instrs[1],
            Instruction::Immediate { alu, immediate: 7, .. } if alu.bits() == 0x3F
        ));
    }

    #[test]
    fn test_literals() {
        assert_eq!(parse_literal("42"), Some(42));
        assert_eq!(parse_literal("0x1F"), Some(0x1F));
        assert_eq!(parse_literal("0XFF"), Some(0xFF));
        assert_eq!(parse_literal("0b1010"), Some(10));
        assert_eq!(parse_literal("-1"), Some(Word::MAX));
        assert_eq!(parse_literal("-2147483648"), Some(0x8000_0000));
        assert_eq!(parse_literal("4294967295"), Some(Word::MAX));
        assert_eq!(parse_literal("4294967296"), None);
        assert_eq!(parse_literal("-2147483649"), None);
        assert_eq!(parse_literal("0b102"), None);
        assert_eq!(parse_literal("GP1"), None);
        assert_eq!(parse_literal("+5"), None);
        assert_eq!(parse_literal("0x+1"), None);
        assert_eq!(parse_literal("0b-1"), None);
        assert_eq!(parse_literal("--1"), None);
        assert_eq!(parse_literal("0x"), None);
        assert_eq!(parse_literal("-"), None);
    }

    #[rstest]
    #[case("JMP +5")]
    #[case("JMP 0x+1")]
    #[case("MOV GP1, +5")]
    #[case("MOV GP1, 0x+1")]
    #[case("ADD GP1, -0x-1")]
    fn test_signed_digits_rejected(#[case] source: &str) {
        let err = assemble(source).unwrap_err();
        assert!(matches!(err, EncodingError::MalformedLiteral { line: 1, .. }), "{source}: {err:?}");
    }

    #[test]
    fn test_raw_words() {
        assert_eq!(assemble(".word 0x04000000, 7").unwrap(), vec![0x0400_0000, 7]);
    }

    #[test]
    fn test_errors_carry_line() {
        let err = assemble("NOP\nFROB GP1").unwrap_err();
        assert_eq!(
            err,
            EncodingError::UnknownMnemonic {
                line: 2,
                mnemonic: "FROB".into()
            }
        );

        let err = assemble("NOP\n\nMOV GP1, 0xZZ").unwrap_err();
        assert!(matches!(err, EncodingError::MalformedLiteral { line: 3, .. }));

        let err = assemble("MOV GP99, GP1").unwrap_err();
        assert!(matches!(err, EncodingError::UnknownRegister { line: 1, .. }));

        let err = assemble("JMPXY 0").unwrap_err();
        assert!(matches!(err, EncodingError::UnknownCondition { line: 1, .. }));

        let err = assemble("ADD GP1").unwrap_err();
        assert!(matches!(err, EncodingError::OperandCount { expected: 2, found: 1, .. }));

        let err = assemble("AOPI GP1, 1, 0x40").unwrap_err();
        assert!(matches!(err, EncodingError::InvalidAluCode { .. }));
        assert_eq!(err.line(), 1);
    }

    #[test]
    fn test_blank_and_comment_lines() {
        assert_eq!(assemble("\n   \n; only a comment\n").unwrap(), Vec::<Word>::new());
        assert_eq!(assemble_line("  ; nothing").unwrap(), None);
        assert_eq!(assemble_line("NOP").unwrap(), Some([0, 0]));
    }
}
