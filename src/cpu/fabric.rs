//! Register-transfer fabric.
//!
//! Three standing buses connect the register file to the ALU:
//!
//! - `AFeed`: any addressable register to ALU operand A
//! - `BFeed`: any addressable register to ALU operand B
//! - `Writeback`: ALU result to any addressable register, or to VOID
//!
//! A selection is validated by [`Fabric::resolve`] and performed by
//! [`Fabric::commit`]. Committing moves exactly one value and runs the
//! side effects of the registers at either end: reading MDR loads from
//! memory at MAR, writing MDR stores to it, and writing an ALU operand
//! recomputes the ALU.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cpu::alu::Alu;
use crate::cpu::execute::CpuError;
use crate::cpu::mmu::Mmu;
use crate::cpu::registers::{AccessError, RegisterFile};
use crate::isa::{RegisterCode, Word};

/// One of the standing buses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bus {
    AFeed,
    BFeed,
    Writeback,
}

impl Bus {
    pub const ALL: [Bus; 3] = [Bus::AFeed, Bus::BFeed, Bus::Writeback];

    fn index(self) -> usize {
        match self {
            Bus::AFeed => 0,
            Bus::BFeed => 1,
            Bus::Writeback => 2,
        }
    }

    /// Whether `endpoint` may drive this bus.
    pub fn accepts_source(self, endpoint: Endpoint) -> bool {
        match self {
            Bus::AFeed | Bus::BFeed => matches!(endpoint, Endpoint::Register(_)),
            Bus::Writeback => endpoint == Endpoint::AluResult,
        }
    }

    /// Whether this bus may deliver into `endpoint`.
    pub fn accepts_destination(self, endpoint: Endpoint) -> bool {
        match self {
            Bus::AFeed => endpoint == Endpoint::AluA,
            Bus::BFeed => endpoint == Endpoint::AluB,
            Bus::Writeback => matches!(endpoint, Endpoint::Register(_) | Endpoint::Void),
        }
    }
}

impl fmt::Display for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Bus::AFeed => "A-feed",
            Bus::BFeed => "B-feed",
            Bus::Writeback => "writeback",
        };
        f.write_str(name)
    }
}

/// Something a bus can read from or write into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endpoint {
    /// An instruction-addressable register
    Register(RegisterCode),
    AluA,
    AluB,
    AluResult,
    /// Parking destination for the writeback bus
    Void,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Register(code) => write!(f, "{code}"),
            Endpoint::AluA => f.write_str("ALU.A"),
            Endpoint::AluB => f.write_str("ALU.B"),
            Endpoint::AluResult => f.write_str("ALU.OUT"),
            Endpoint::Void => f.write_str("VOID"),
        }
    }
}

impl From<RegisterCode> for Endpoint {
    fn from(code: RegisterCode) -> Self {
        Endpoint::Register(code)
    }
}

/// Fabric misuse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FabricError {
    #[error("{endpoint} is not wired to the {bus} bus")]
    IllegalAddress { bus: Bus, endpoint: Endpoint },

    #[error(transparent)]
    AccessViolation(#[from] AccessError),
}

/// A validated selection, ready to commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferPlan {
    pub bus: Bus,
    pub source: Endpoint,
    pub destination: Endpoint,
}

/// The state the fabric moves values between.
#[derive(Debug)]
pub struct Datapath {
    pub regs: RegisterFile,
    pub alu: Alu,
    pub mmu: Mmu,
}

impl Datapath {
    pub fn new(mmu: Mmu) -> Self {
        Self {
            regs: RegisterFile::new(),
            alu: Alu::new(),
            mmu,
        }
    }

    /// Read an endpoint as a bus does, running on-read side effects.
    pub fn read(&mut self, endpoint: Endpoint) -> Result<Word, CpuError> {
        match endpoint {
            Endpoint::Register(code) => {
                let reg = self.regs.get(code);
                reg.read().map_err(FabricError::from)?;
                if reg.kind().computes_on_read() {
                    let value = self.mmu.read(self.regs.mar.value())?;
                    self.regs.get_mut(code).force(value);
                }
                Ok(self.regs.value(code))
            }
            Endpoint::AluA => Ok(self.alu.a.read().map_err(FabricError::from)?),
            Endpoint::AluB => Ok(self.alu.b.read().map_err(FabricError::from)?),
            Endpoint::AluResult => Ok(self.alu.result.read().map_err(FabricError::from)?),
            Endpoint::Void => Ok(self.regs.void.read().map_err(FabricError::from)?),
        }
    }

    /// Write an endpoint as a bus does, running on-write side effects.
    pub fn write(&mut self, endpoint: Endpoint, value: Word) -> Result<(), CpuError> {
        match endpoint {
            Endpoint::Register(code) => {
                let reg = self.regs.get(code);
                reg.check_write().map_err(FabricError::from)?;
                // Store first so a fault leaves the register untouched
                if reg.kind().computes_on_write() {
                    self.mmu.write(self.regs.mar.value(), value)?;
                }
                self.regs.get_mut(code).force(value);
            }
            Endpoint::AluA => {
                self.alu.a.write(value).map_err(FabricError::from)?;
                self.alu.recompute();
            }
            Endpoint::AluB => {
                self.alu.b.write(value).map_err(FabricError::from)?;
                self.alu.recompute();
            }
            Endpoint::AluResult => self.alu.result.write(value).map_err(FabricError::from)?,
            Endpoint::Void => self.regs.void.write(value).map_err(FabricError::from)?,
        }
        Ok(())
    }
}

/// Bus selectors.
///
/// Remembers the last committed selection on each bus so front ends can
/// show the current wiring.
#[derive(Debug, Clone, Default)]
pub struct Fabric {
    selected: [Option<TransferPlan>; 3],
    transfers: u64,
}

impl Fabric {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that `source -> destination` is legal on `bus`.
    pub fn resolve(
        &self,
        bus: Bus,
        source: Endpoint,
        destination: Endpoint,
    ) -> Result<TransferPlan, FabricError> {
        if !bus.accepts_source(source) {
            return Err(FabricError::IllegalAddress {
                bus,
                endpoint: source,
            });
        }
        if !bus.accepts_destination(destination) {
            return Err(FabricError::IllegalAddress {
                bus,
                endpoint: destination,
            });
        }
        Ok(TransferPlan {
            bus,
            source,
            destination,
        })
    }

    /// Perform the transfer and record the selection. Returns the value
    /// moved.
    pub fn commit(&mut self, plan: TransferPlan, dp: &mut Datapath) -> Result<Word, CpuError> {
        let value = dp.read(plan.source)?;
        dp.write(plan.destination, value)?;

        tracing::trace!(
            bus = %plan.bus,
            source = %plan.source,
            destination = %plan.destination,
            value,
            "transfer"
        );
        self.selected[plan.bus.index()] = Some(plan);
        self.transfers += 1;
        Ok(value)
    }

    /// Resolve and commit in one step.
    pub fn select(
        &mut self,
        bus: Bus,
        source: Endpoint,
        destination: Endpoint,
        dp: &mut Datapath,
    ) -> Result<Word, CpuError> {
        let plan = self.resolve(bus, source, destination)?;
        self.commit(plan, dp)
    }

    /// Park the writeback bus on VOID.
    pub fn release_writeback(&mut self, dp: &mut Datapath) -> Result<(), CpuError> {
        self.select(Bus::Writeback, Endpoint::AluResult, Endpoint::Void, dp)?;
        Ok(())
    }

    /// The last committed selection on `bus`.
    pub fn selection(&self, bus: Bus) -> Option<TransferPlan> {
        self.selected[bus.index()]
    }

    /// Total transfers committed since construction or reset.
    pub fn transfers(&self) -> u64 {
        self.transfers
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
