//! Disassembler for x25-32 programs.
//!
//! Renders program words back to assembly the assembler accepts. A pair
//! that does not decode, or whose canonical text would not re-assemble to
//! the same words, is emitted as a raw `.WORD` line.

use std::fmt;

use crate::asm::assembler::{assemble_line, binary_alias, unary_alias};
use crate::isa::{decode, AluOpcode, Instruction, OpCode, Word};

fn binary_mnemonic(alu: AluOpcode) -> Option<&'static str> {
    ["MOV", "ADD", "SUB", "AND", "OR"]
        .into_iter()
        .find(|m| binary_alias(m) == Some(alu))
}

fn unary_mnemonic(alu: AluOpcode) -> Option<&'static str> {
    ["INC", "DEC", "NOT", "NEG"]
        .into_iter()
        .find(|m| unary_alias(m) == Some(alu))
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cond = self.condition().suffix();
        match *self {
            Instruction::Register { opcode, dest, src, alu, .. } => match opcode {
                OpCode::Aopr => match binary_mnemonic(alu) {
                    Some(m) => write!(f, "{m}{cond} {dest}, {src}"),
                    None => write!(f, "AOPR{cond} {dest}, {src}, {alu}"),
                },
                OpCode::Clz | OpCode::Clof | OpCode::Clng => write!(f, "{opcode}{cond}"),
                _ => write!(f, "{opcode}{cond} {dest}, {src}"),
            },
            Instruction::Immediate { opcode, dest, alu, immediate, .. } => match opcode {
                OpCode::Aopi => match (binary_mnemonic(alu), unary_mnemonic(alu)) {
                    (_, Some(m)) if immediate == 0 => write!(f, "{m}{cond} {dest}"),
                    (Some(m), _) => write!(f, "{m}{cond} {dest}, {immediate:#x}"),
                    _ => write!(f, "AOPI{cond} {dest}, {immediate:#x}, {alu}"),
                },
                _ => write!(f, "{opcode}{cond} {dest}, {immediate:#x}"),
            },
            Instruction::Jump { opcode, target, .. } => match opcode {
                OpCode::Nop => write!(f, "NOP{cond}"),
                _ => write!(f, "{opcode}{cond} {target:#x}"),
            },
        }
    }
}

/// Disassemble one instruction's word pair to a source line.
pub fn disassemble_instruction(words: [Word; 2]) -> String {
    let raw = || format!(".WORD {:#010x}, {:#x}", words[0], words[1]);
    match decode(words) {
        Ok(instr) => {
            let text = instr.to_string();
            match assemble_line(&text) {
                Ok(Some(back)) if back == words => text,
                _ => raw(),
            }
        }
        Err(_) => raw(),
    }
}

/// Disassemble a program into a listing that re-assembles to the same
/// words. An odd trailing word is kept as a comment.
pub fn disassemble(program: &[Word]) -> String {
    let mut output = String::new();
    output.push_str("; x25-32 disassembly\n");
    output.push_str("; -----------------\n\n");

    let mut pairs = program.chunks_exact(2);
    for (i, pair) in pairs.by_ref().enumerate() {
        let line = disassemble_instruction([pair[0], pair[1]]);
        output.push_str(&format!(
            "{:<32}; {:04x}: {:08x} {:08x}\n",
            line,
            i * 2,
            pair[0],
            pair[1]
        ));
    }
    if let [last] = pairs.remainder() {
        output.push_str(&format!("; trailing word {last:#010x}\n"));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;
    use crate::isa::{encode, Condition, RegisterCode};

    #[test]
    fn test_disassemble_aliases() {
        let words = assemble("MOV GP1, 5\nADDNZ GP1, GP2\nINC GP3\nLOAD GP4, 0x10").unwrap();
        let lines: Vec<String> = words
            .chunks(2)
            .map(|p| disassemble_instruction([p[0], p[1]]))
            .collect();
        assert_eq!(
            lines,
            vec!["MOV GP1, 0x5", "ADDNZ GP1, GP2", "INC GP3", "LOAD GP4, 0x10"]
        );
    }

    #[test]
    fn test_disassemble_raw_alu() {
        let instr = Instruction::Register {
            opcode: OpCode::Aopr,
            condition: Condition::Always,
            dest: RegisterCode::Gp0,
            src: RegisterCode::Gp1,
            alu: AluOpcode::from_bits(0b101010),
        };
        assert_eq!(instr.to_string(), "AOPR GP0, GP1, 0b101010");
        assert_eq!(disassemble_instruction(encode(&instr)), "AOPR GP0, GP1, 0b101010");
    }

    #[test]
    fn test_non_canonical_falls_back_to_words() {
        // NOP with a non-zero target has no source form
        let words = [0, 5];
        assert_eq!(disassemble_instruction(words), ".WORD 0x00000000, 0x5");
        assert_eq!(assemble(&disassemble_instruction(words)).unwrap(), words.to_vec());

        // Unknown opcode
        assert!(disassemble_instruction([0xFC00_0000, 0]).starts_with(".WORD"));
    }

    #[test]
    fn test_listing_reassembles() {
        let source = "MOV GP1, 5\nADD GP1, 1\nSUBZR GP2, GP1\nSTORR GP1, GP2\nCLZ\nAOPI GP1, 9, B_Decrement\nBNN 0x20\nNOP";
        let words = assemble(source).unwrap();
        let listing = disassemble(&words);
        assert_eq!(assemble(&listing).unwrap(), words);
    }

    #[test]
    fn test_trailing_word() {
        let listing = disassemble(&[0, 0, 7]);
        assert!(listing.contains("; trailing word 0x00000007"));
        assert_eq!(assemble(&listing).unwrap(), vec![0, 0]);
    }
}
