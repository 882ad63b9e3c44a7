//! Register codes addressable from instruction operands.

use serde::{Deserialize, Serialize};
use crate::isa::DecodeError;

/// A 5-bit register address.
///
/// Only registers that instructions may name appear here. The ALU's
/// operand and result latches and the void sink are internal to the
/// datapath and have no code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegisterCode {
    /// Constant 0
    Zero,
    /// Constant 1
    One,
    /// Program counter
    Pc,
    /// Memory address register
    Mar,
    /// Memory data register
    Mdr,
    /// Low instruction register
    Ira,
    /// High instruction register (immediate / target)
    Irb,
    Gp0,
    Gp1,
    Gp2,
    Gp3,
    Gp4,
    Gp5,
    Gp6,
    Gp7,
    Gp8,
    Gp9,
    Gp10,
    Gp11,
    Gp12,
    Gp13,
    Gp14,
    Gp15,
}

impl RegisterCode {
    /// General-purpose registers in index order.
    pub const GP: [RegisterCode; 16] = [
        RegisterCode::Gp0,
        RegisterCode::Gp1,
        RegisterCode::Gp2,
        RegisterCode::Gp3,
        RegisterCode::Gp4,
        RegisterCode::Gp5,
        RegisterCode::Gp6,
        RegisterCode::Gp7,
        RegisterCode::Gp8,
        RegisterCode::Gp9,
        RegisterCode::Gp10,
        RegisterCode::Gp11,
        RegisterCode::Gp12,
        RegisterCode::Gp13,
        RegisterCode::Gp14,
        RegisterCode::Gp15,
    ];

    /// All addressable registers in code order.
    pub const ALL: [RegisterCode; 23] = [
        RegisterCode::Zero,
        RegisterCode::One,
        RegisterCode::Pc,
        RegisterCode::Mar,
        RegisterCode::Mdr,
        RegisterCode::Ira,
        RegisterCode::Irb,
        RegisterCode::Gp0,
        RegisterCode::Gp1,
        RegisterCode::Gp2,
        RegisterCode::Gp3,
        RegisterCode::Gp4,
        RegisterCode::Gp5,
        RegisterCode::Gp6,
        RegisterCode::Gp7,
        RegisterCode::Gp8,
        RegisterCode::Gp9,
        RegisterCode::Gp10,
        RegisterCode::Gp11,
        RegisterCode::Gp12,
        RegisterCode::Gp13,
        RegisterCode::Gp14,
        RegisterCode::Gp15,
    ];

    /// Index into the general-purpose bank, if this is a GP register.
    pub fn gp_index(self) -> Option<usize> {
        Self::GP.iter().position(|&r| r == self)
    }

    /// The 5-bit encoding. GP registers occupy 0x10..=0x1F.
    pub fn code(self) -> u8 {
        match self {
            RegisterCode::Zero => 0x00,
            RegisterCode::One => 0x01,
            RegisterCode::Pc => 0x02,
            RegisterCode::Mar => 0x03,
            RegisterCode::Mdr => 0x04,
            RegisterCode::Ira => 0x05,
            RegisterCode::Irb => 0x06,
            gp => 0x10 + gp.gp_index().unwrap_or_default() as u8,
        }
    }

    /// Look up a register by its 5-bit encoding.
    pub fn from_code(code: u8) -> Result<Self, DecodeError> {
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.code() == code)
            .ok_or(DecodeError::UnknownRegister(code))
    }

    /// Assembly name.
    pub const fn name(self) -> &'static str {
        match self {
            RegisterCode::Zero => "ZERO",
            RegisterCode::One => "ONE",
            RegisterCode::Pc => "PC",
            RegisterCode::Mar => "MAR",
            RegisterCode::Mdr => "MDR",
            RegisterCode::Ira => "IRA",
            RegisterCode::Irb => "IRB",
            RegisterCode::Gp0 => "GP0",
            RegisterCode::Gp1 => "GP1",
            RegisterCode::Gp2 => "GP2",
            RegisterCode::Gp3 => "GP3",
            RegisterCode::Gp4 => "GP4",
            RegisterCode::Gp5 => "GP5",
            RegisterCode::Gp6 => "GP6",
            RegisterCode::Gp7 => "GP7",
            RegisterCode::Gp8 => "GP8",
            RegisterCode::Gp9 => "GP9",
            RegisterCode::Gp10 => "GP10",
            RegisterCode::Gp11 => "GP11",
            RegisterCode::Gp12 => "GP12",
            RegisterCode::Gp13 => "GP13",
            RegisterCode::Gp14 => "GP14",
            RegisterCode::Gp15 => "GP15",
        }
    }

    /// Parse an assembly name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.name().eq_ignore_ascii_case(name))
    }
}

impl std::fmt::Display for RegisterCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
