//! Bit layout of the low instruction word.
//!
//! Bit 31 is the most significant bit of the low word:
//!
//! ```text
//!  31    26 25  22 21   17 16   12 11    6 5     0
//! | opcode | cond | dest  |  src  |  alu  |   0   |   R-type
//! | opcode | cond | dest  |  alu   |      0       |   I-type
//! | opcode | cond |             0                 |   J-type
//! ```
//!
//! The high word is the immediate (I) or jump target (J), and must be
//! zero for R-type instructions.

use super::Word;

/// A contiguous run of bits inside a word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Position of the least significant bit.
    pub shift: u32,
    /// Number of bits.
    pub width: u32,
}

impl Field {
    /// Define a field.
    pub const fn new(shift: u32, width: u32) -> Self {
        Self { shift, width }
    }

    /// Mask selecting this field in place.
    #[inline]
    pub const fn mask(self) -> Word {
        self.max() << self.shift
    }

    /// Largest value the field can hold.
    #[inline]
    pub const fn max(self) -> Word {
        ((1u64 << self.width) - 1) as Word
    }

    /// Read the field out of a word.
    #[inline]
    pub const fn extract(self, word: Word) -> Word {
        (word & self.mask()) >> self.shift
    }

    /// Return `word` with this field replaced by `value`.
    ///
    /// Bits of `value` above the field width are discarded.
    #[inline]
    pub const fn insert(self, word: Word, value: Word) -> Word {
        (word & !self.mask()) | ((value & self.max()) << self.shift)
    }
}

/// Opcode, bits 31-26.
pub const OPCODE: Field = Field::new(26, 6);
/// Condition code, bits 25-22.
pub const CONDITION: Field = Field::new(22, 4);
/// Destination register, bits 21-17 (R and I).
pub const DEST: Field = Field::new(17, 5);
/// Source register, bits 16-12 (R only).
pub const SRC: Field = Field::new(12, 5);
/// ALU microcode in an R-type word, bits 11-6.
pub const ALU_R: Field = Field::new(6, 6);
/// ALU microcode in an I-type word, bits 16-11.
pub const ALU_I: Field = Field::new(11, 6);

/// Low-word bits unused by the R-type layout.
pub const RESERVED_R: Word = 0x0000_003F;
/// Low-word bits unused by the I-type layout.
pub const RESERVED_I: Word = 0x0000_07FF;
/// Low-word bits unused by the J-type layout.
pub const RESERVED_J: Word = 0x003F_FFFF;
