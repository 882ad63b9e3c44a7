//! Registers and the register file.
//!
//! The x25-32 has:
//! - two read-only constant registers (ZERO, ONE)
//! - PC and the instruction register pair IRA/IRB
//! - the memory interface pair MAR/MDR
//! - sixteen general-purpose registers GP0..GP15
//! - a write-only VOID sink used to park the writeback bus
//!
//! Access rights are enforced for fabric transfers. Host-side code (the
//! loader, debuggers, tests) uses [`Register::value`] and
//! [`Register::force`], which bypass them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::isa::{RegisterCode, Word};

/// Who may read or write a register through the fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Access {
    ReadOnly,
    ReadWrite,
    WriteOnly,
}

impl Access {
    pub const fn readable(self) -> bool {
        !matches!(self, Access::WriteOnly)
    }

    pub const fn writable(self) -> bool {
        !matches!(self, Access::ReadOnly)
    }
}

/// Whether touching a register has a side effect the fabric must run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegisterKind {
    /// Plain storage.
    Plain,
    /// Reading first refreshes the value (e.g. a memory load).
    ComputedOnRead,
    /// Writing triggers a follow-up computation (e.g. ALU recompute).
    ComputedOnWrite,
    /// Both: the memory data register loads on read and stores on write.
    ComputedOnAccess,
}

impl RegisterKind {
    pub const fn computes_on_read(self) -> bool {
        matches!(self, RegisterKind::ComputedOnRead | RegisterKind::ComputedOnAccess)
    }

    pub const fn computes_on_write(self) -> bool {
        matches!(self, RegisterKind::ComputedOnWrite | RegisterKind::ComputedOnAccess)
    }
}

/// A single-word storage cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Register {
    name: &'static str,
    value: Word,
    access: Access,
    kind: RegisterKind,
    special: bool,
}

impl Register {
    /// A zeroed register.
    pub const fn new(name: &'static str, access: Access, kind: RegisterKind) -> Self {
        Self {
            name,
            value: 0,
            access,
            kind,
            special: false,
        }
    }

    /// A read-only register holding a fixed value.
    pub const fn constant(name: &'static str, value: Word) -> Self {
        Self {
            name,
            value,
            access: Access::ReadOnly,
            kind: RegisterKind::Plain,
            special: false,
        }
    }

    /// Mark the register as internal to the datapath (not addressable by
    /// instruction operands).
    pub const fn special(mut self) -> Self {
        self.special = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn kind(&self) -> RegisterKind {
        self.kind
    }

    pub fn is_special(&self) -> bool {
        self.special
    }

    /// Current value, ignoring access rights.
    #[inline]
    pub fn value(&self) -> Word {
        self.value
    }

    /// Overwrite the value, ignoring access rights.
    #[inline]
    pub fn force(&mut self, value: Word) {
        self.value = value;
    }

    /// Read as the fabric does.
    pub fn read(&self) -> Result<Word, AccessError> {
        if self.access.readable() {
            Ok(self.value)
        } else {
            Err(AccessError {
                register: self.name,
                access: self.access,
            })
        }
    }

    /// Fail unless the fabric may write this register.
    pub fn check_write(&self) -> Result<(), AccessError> {
        if self.access.writable() {
            Ok(())
        } else {
            Err(AccessError {
                register: self.name,
                access: self.access,
            })
        }
    }

    /// Write as the fabric does.
    pub fn write(&mut self, value: Word) -> Result<(), AccessError> {
        self.check_write()?;
        self.value = value;
        Ok(())
    }
}

/// A fabric transfer violated a register's access rights.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("register {register} is {access:?}")]
pub struct AccessError {
    pub register: &'static str,
    pub access: Access,
}

/// The addressable registers plus the VOID sink.
#[derive(Debug, Clone)]
pub struct RegisterFile {
    zero: Register,
    one: Register,
    /// Program counter
    pub pc: Register,
    /// Memory address register
    pub mar: Register,
    /// Memory data register; loads on read, stores on write
    pub mdr: Register,
    /// Low instruction word
    pub ira: Register,
    /// High instruction word (immediate / jump target)
    pub irb: Register,
    /// General-purpose bank
    pub gp: [Register; 16],
    /// Write-only sink parked on the writeback bus between transfers
    pub void: Register,
}

impl RegisterFile {
    /// Create a register file with every writable register zeroed.
    pub fn new() -> Self {
        use Access::ReadWrite;
        use RegisterKind::Plain;

        Self {
            zero: Register::constant("ZERO", 0),
            one: Register::constant("ONE", 1),
            pc: Register::new("PC", ReadWrite, Plain),
            mar: Register::new("MAR", ReadWrite, Plain),
            mdr: Register::new("MDR", ReadWrite, RegisterKind::ComputedOnAccess),
            ira: Register::new("IRA", ReadWrite, Plain),
            irb: Register::new("IRB", ReadWrite, Plain),
            gp: std::array::from_fn(|i| Register::new(RegisterCode::GP[i].name(), ReadWrite, Plain)),
            void: Register::new("VOID", Access::WriteOnly, Plain).special(),
        }
    }

    /// Zero every writable register.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn get(&self, code: RegisterCode) -> &Register {
        match code {
            RegisterCode::Zero => &self.zero,
            RegisterCode::One => &self.one,
            RegisterCode::Pc => &self.pc,
            RegisterCode::Mar => &self.mar,
            RegisterCode::Mdr => &self.mdr,
            RegisterCode::Ira => &self.ira,
            RegisterCode::Irb => &self.irb,
            gp => &self.gp[gp.gp_index().unwrap_or_default()],
        }
    }

    pub fn get_mut(&mut self, code: RegisterCode) -> &mut Register {
        match code {
            RegisterCode::Zero => &mut self.zero,
            RegisterCode::One => &mut self.one,
            RegisterCode::Pc => &mut self.pc,
            RegisterCode::Mar => &mut self.mar,
            RegisterCode::Mdr => &mut self.mdr,
            RegisterCode::Ira => &mut self.ira,
            RegisterCode::Irb => &mut self.irb,
            gp => &mut self.gp[gp.gp_index().unwrap_or_default()],
        }
    }

    /// Host-side read of an addressable register.
    pub fn value(&self, code: RegisterCode) -> Word {
        self.get(code).value()
    }

    /// Host-side write of an addressable register. Constants are left alone.
    pub fn set(&mut self, code: RegisterCode, value: Word) {
        if !matches!(code, RegisterCode::Zero | RegisterCode::One) {
            self.get_mut(code).force(value);
        }
    }

    /// Values of the general-purpose bank.
    pub fn gp_values(&self) -> [Word; 16] {
        std::array::from_fn(|i| self.gp[i].value())
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        let regs = RegisterFile::new();
        assert_eq!(regs.get(RegisterCode::Zero).read(), Ok(0));
        assert_eq!(regs.get(RegisterCode::One).read(), Ok(1));
    }

    #[test]
    fn test_constant_rejects_write() {
        let mut regs = RegisterFile::new();
        let err = regs.get_mut(RegisterCode::One).write(7).unwrap_err();
        assert_eq!(err.register, "ONE");
        assert_eq!(err.access, Access::ReadOnly);

        regs.set(RegisterCode::One, 7);
        assert_eq!(regs.value(RegisterCode::One), 1);
    }

    #[test]
    fn test_void_is_write_only() {
        let mut regs = RegisterFile::new();
        assert!(regs.void.is_special());
        assert!(regs.void.write(42).is_ok());
        assert!(regs.void.read().is_err());
    }

    #[test]
    fn test_gp_lookup() {
        let mut regs = RegisterFile::new();
        regs.set(RegisterCode::Gp9, 99);
        assert_eq!(regs.gp[9].value(), 99);
        assert_eq!(regs.get(RegisterCode::Gp9).name(), "GP9");
        assert_eq!(regs.gp_values()[9], 99);
    }

    #[test]
    fn test_mdr_kind() {
        let regs = RegisterFile::new();
        assert!(regs.mdr.kind().computes_on_read());
        assert!(regs.mdr.kind().computes_on_write());
        assert!(!regs.mar.kind().computes_on_read());
    }

    #[test]
    fn test_reset() {
        let mut regs = RegisterFile::new();
        regs.set(RegisterCode::Pc, 10);
        regs.set(RegisterCode::Gp0, 3);
        regs.reset();
        assert_eq!(regs.value(RegisterCode::Pc), 0);
        assert_eq!(regs.value(RegisterCode::Gp0), 0);
        assert_eq!(regs.value(RegisterCode::One), 1);
    }
}
