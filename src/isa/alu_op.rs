//! ALU microcode: six control bits `(zx, nx, zy, ny, f, no)`.

use serde::{Deserialize, Serialize};

/// A 6-bit ALU control word, packed MSB→LSB as `zx nx zy ny f no`.
///
/// - `zx`/`zy`: zero the x/y input
/// - `nx`/`ny`: bitwise-negate the x/y input (after zeroing)
/// - `f`: add when set, bitwise AND when clear
/// - `no`: negate the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AluOpcode {
    pub zx: bool,
    pub nx: bool,
    pub zy: bool,
    pub ny: bool,
    pub f: bool,
    pub no: bool,
}

impl AluOpcode {
    pub const TRANSFER_A: Self = Self::from_bits(0b001100);
    pub const TRANSFER_B: Self = Self::from_bits(0b110000);
    pub const ADDITION_SIGNED: Self = Self::from_bits(0b000010);
    pub const AB_SUBTRACTION_SIGNED: Self = Self::from_bits(0b010011);
    pub const BA_SUBTRACTION_SIGNED: Self = Self::from_bits(0b000111);
    pub const A_NEGATIVE: Self = Self::from_bits(0b001111);
    pub const B_NEGATIVE: Self = Self::from_bits(0b110011);
    pub const A_INCREMENT: Self = Self::from_bits(0b011111);
    pub const B_INCREMENT: Self = Self::from_bits(0b110111);
    pub const A_DECREMENT: Self = Self::from_bits(0b001110);
    pub const B_DECREMENT: Self = Self::from_bits(0b110010);
    pub const LOGICAL_AND: Self = Self::from_bits(0b000000);
    pub const LOGICAL_OR: Self = Self::from_bits(0b010101);
    pub const A_LOGICAL_NOT: Self = Self::from_bits(0b001101);
    pub const B_LOGICAL_NOT: Self = Self::from_bits(0b110001);

    /// The named microcode table.
    pub const NAMED: [(&'static str, AluOpcode); 15] = [
        ("TransferA", Self::TRANSFER_A),
        ("TransferB", Self::TRANSFER_B),
        ("AdditionSigned", Self::ADDITION_SIGNED),
        ("AB_SubtractionSigned", Self::AB_SUBTRACTION_SIGNED),
        ("BA_SubtractionSigned", Self::BA_SUBTRACTION_SIGNED),
        ("A_Negative", Self::A_NEGATIVE),
        ("B_Negative", Self::B_NEGATIVE),
        ("A_Increment", Self::A_INCREMENT),
        ("B_Increment", Self::B_INCREMENT),
        ("A_Decrement", Self::A_DECREMENT),
        ("B_Decrement", Self::B_DECREMENT),
        ("LogicalAND", Self::LOGICAL_AND),
        ("LogicalOR", Self::LOGICAL_OR),
        ("A_LogicalNOT", Self::A_LOGICAL_NOT),
        ("B_LogicalNOT", Self::B_LOGICAL_NOT),
    ];

    /// Unpack from the low six bits of `bits`; higher bits are ignored.
    pub const fn from_bits(bits: u8) -> Self {
        Self {
            zx: bits & 0b100000 != 0,
            nx: bits & 0b010000 != 0,
            zy: bits & 0b001000 != 0,
            ny: bits & 0b000100 != 0,
            f: bits & 0b000010 != 0,
            no: bits & 0b000001 != 0,
        }
    }

    /// Pack into six bits.
    pub const fn bits(self) -> u8 {
        (self.zx as u8) << 5
            | (self.nx as u8) << 4
            | (self.zy as u8) << 3
            | (self.ny as u8) << 2
            | (self.f as u8) << 1
            | self.no as u8
    }

    /// Table name, if this pattern is one of the named operations.
    pub fn name(self) -> Option<&'static str> {
        Self::NAMED
            .iter()
            .find(|(_, op)| *op == self)
            .map(|(name, _)| *name)
    }

    /// Look up a named operation, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMED
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, op)| *op)
    }
}

impl std::fmt::Display for AluOpcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "0b{:06b}", self.bits()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_roundtrip() {
        for bits in 0..64u8 {
            assert_eq!(AluOpcode::from_bits(bits).bits(), bits);
        }
    }

    #[test]
    fn test_table_bit_order() {
        let op = AluOpcode::AB_SUBTRACTION_SIGNED;
        assert_eq!(
            (op.zx, op.nx, op.zy, op.ny, op.f, op.no),
            (false, true, false, false, true, true)
        );
        let op = AluOpcode::B_INCREMENT;
        assert_eq!(
            (op.zx, op.nx, op.zy, op.ny, op.f, op.no),
            (true, true, false, true, true, true)
        );
    }

    #[test]
    fn test_named_patterns_are_distinct() {
        for (i, (_, a)) in AluOpcode::NAMED.iter().enumerate() {
            for (_, b) in &AluOpcode::NAMED[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_names() {
        assert_eq!(AluOpcode::from_name("transfera"), Some(AluOpcode::TRANSFER_A));
        assert_eq!(AluOpcode::LOGICAL_OR.name(), Some("LogicalOR"));
        assert_eq!(AluOpcode::from_bits(0b111111).name(), None);
        assert_eq!(AluOpcode::from_bits(0b111111).to_string(), "0b111111");
    }
}
