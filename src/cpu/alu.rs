//! Arithmetic-logic unit.
//!
//! [`compute`] is the pure combinational function. [`Alu`] wraps it with
//! the operand latches A/B, the result latch and the status flags, which
//! are only committed while the flag-enable bit is set.

use serde::{Deserialize, Serialize};

use crate::cpu::registers::{Access, Register, RegisterKind};
use crate::isa::{AluOpcode, Word};

/// ALU status flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Flags {
    pub overflow: bool,
    pub zero: bool,
    pub negative: bool,
    /// Mirrors `overflow`; there is no separate carry logic in this ALU.
    pub carry: bool,
}

/// Evaluate one ALU operation.
///
/// Flags are always computed here; whether they are latched is up to the
/// caller. `overflow` is set when the adder's 33-bit sum does not fit in
/// 32 bits, and `carry` reports the same condition.
pub fn compute(x: Word, y: Word, op: AluOpcode) -> (Word, Flags) {
    let mut x = if op.zx { 0 } else { x };
    if op.nx {
        x = !x;
    }
    let mut y = if op.zy { 0 } else { y };
    if op.ny {
        y = !y;
    }

    let (mut out, overflow) = if op.f {
        let wide = x as u64 + y as u64;
        let out = x.wrapping_add(y);
        (out, wide != out as u64)
    } else {
        (x & y, false)
    };
    if op.no {
        out = !out;
    }

    let flags = Flags {
        overflow,
        zero: out == 0,
        negative: out >> 31 == 1,
        carry: overflow,
    };
    (out, flags)
}

/// The ALU with its latches.
#[derive(Debug, Clone)]
pub struct Alu {
    /// Operand A; writing it recomputes the result
    pub a: Register,
    /// Operand B; writing it recomputes the result
    pub b: Register,
    /// Result latch, read by the writeback bus
    pub result: Register,
    operation: AluOpcode,
    flags: Flags,
    flag_enable: bool,
}

impl Alu {
    pub fn new() -> Self {
        Self {
            a: Register::new("ALU.A", Access::WriteOnly, RegisterKind::ComputedOnWrite).special(),
            b: Register::new("ALU.B", Access::WriteOnly, RegisterKind::ComputedOnWrite).special(),
            result: Register::new("ALU.OUT", Access::ReadOnly, RegisterKind::Plain).special(),
            operation: AluOpcode::default(),
            flags: Flags::default(),
            flag_enable: false,
        }
    }

    /// Clear latches, flags and the flag-enable bit.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn operation(&self) -> AluOpcode {
        self.operation
    }

    /// Select the microcode used by the next recompute.
    pub fn set_operation(&mut self, op: AluOpcode) {
        self.operation = op;
    }

    /// The latched flags.
    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn flags_enabled(&self) -> bool {
        self.flag_enable
    }

    pub fn enable_flags(&mut self) {
        self.flag_enable = true;
    }

    pub fn disable_flags(&mut self) {
        self.flag_enable = false;
    }

    /// Latched result.
    pub fn output(&self) -> Word {
        self.result.value()
    }

    /// Re-run the combinational logic over the current operand latches.
    pub fn recompute(&mut self) {
        let (out, flags) = compute(self.a.value(), self.b.value(), self.operation);
        self.result.force(out);
        if self.flag_enable {
            self.flags = flags;
        }
    }
}

impl Default for Alu {
    fn default() -> Self {
        Self::new()
    }
}
