//! Control unit: the fetch/decode/execute state machine and its microcode.
//!
//! Each clock pulse runs one phase. Every phase is a short sequence of
//! micro-operations, each of which picks an ALU microcode and selects
//! sources and destinations on the fabric's buses.
//!
//! | Phase   | Micro-operations                                  |
//! |---------|---------------------------------------------------|
//! | Fetch1  | PC -> MAR; MDR -> IRA                             |
//! | Fetch2  | PC + 1 -> MAR; MDR -> IRB                         |
//! | Decode  | decode (IRA, IRB); PC + 2 -> PC                   |
//! | Execute | test the condition, run the opcode's routine      |

use serde::{Deserialize, Serialize};

use crate::cpu::alu::Flags;
use crate::cpu::execute::CpuError;
use crate::cpu::fabric::{Bus, Datapath, Endpoint, Fabric};
use crate::isa::{decode, AluOpcode, Condition, DecodeError, Instruction, OpCode, RegisterCode, Word};

/// Control unit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Fetch1,
    Fetch2,
    Decode,
    Execute,
}

impl Phase {
    pub fn next(self) -> Phase {
        match self {
            Phase::Fetch1 => Phase::Fetch2,
            Phase::Fetch2 => Phase::Decode,
            Phase::Decode => Phase::Execute,
            Phase::Execute => Phase::Fetch1,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Fetch1 => "FETCH1",
            Phase::Fetch2 => "FETCH2",
            Phase::Decode => "DECODE",
            Phase::Execute => "EXECUTE",
        };
        f.write_str(name)
    }
}

/// An instruction that has been through Execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retired {
    /// Address the instruction was fetched from
    pub address: Word,
    pub instruction: Instruction,
    /// Whether the condition held and the routine ran
    pub executed: bool,
}

/// Evaluate a condition against latched flags.
///
/// EQ and NE have no flag mapping and report
/// [`DecodeError::UnmappedCondition`].
pub fn evaluate(condition: Condition, flags: Flags) -> Result<bool, DecodeError> {
    Ok(match condition {
        Condition::Always => true,
        Condition::Of => flags.overflow,
        Condition::No => !flags.overflow,
        Condition::Zr => flags.zero,
        Condition::Nz => !flags.zero,
        Condition::Ng => flags.negative,
        Condition::Nn => !flags.negative,
        Condition::Eq | Condition::Ne => {
            return Err(DecodeError::UnmappedCondition(condition))
        }
    })
}

/// The state machine.
#[derive(Debug, Clone, Default)]
pub struct ControlUnit {
    phase: Phase,
    fetched_at: Word,
    current: Option<Instruction>,
    retired: Option<Retired>,
}

impl ControlUnit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// The phase the next pulse will run.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The instruction held between Decode and Execute.
    pub fn current(&self) -> Option<Instruction> {
        self.current
    }

    /// The most recent instruction to finish Execute.
    pub fn last_retired(&self) -> Option<Retired> {
        self.retired
    }

    /// Run the pending phase and move to the next one. Returns the phase
    /// that ran.
    ///
    /// On error the phase does not advance.
    pub fn tick(&mut self, fabric: &mut Fabric, dp: &mut Datapath) -> Result<Phase, CpuError> {
        let phase = self.phase;
        let _span = tracing::trace_span!("phase", %phase).entered();

        let mut micro = Micro { fabric, dp };
        match phase {
            Phase::Fetch1 => {
                self.fetched_at = micro.dp.regs.pc.value();
                micro.transfer(RegisterCode::Pc, RegisterCode::Mar)?;
                micro.load(RegisterCode::Ira)?;
            }
            Phase::Fetch2 => {
                micro.alu(AluOpcode::A_INCREMENT);
                micro.feed_a(RegisterCode::Pc)?;
                micro.write_back(RegisterCode::Mar)?;
                micro.load(RegisterCode::Irb)?;
            }
            Phase::Decode => {
                let words = [micro.dp.regs.ira.value(), micro.dp.regs.irb.value()];
                let instr = decode(words)?;
                for _ in 0..2 {
                    micro.alu(AluOpcode::A_INCREMENT);
                    micro.feed_a(RegisterCode::Pc)?;
                    micro.write_back(RegisterCode::Pc)?;
                }
                tracing::trace!(?instr, "decoded");
                self.current = Some(instr);
            }
            Phase::Execute => {
                let instr = self.current.ok_or(CpuError::NothingDecoded)?;
                let executed = evaluate(instr.condition(), micro.dp.alu.flags())?;
                if executed {
                    tracing::debug!(address = self.fetched_at, %instr, "execute");
                    let outcome = micro.dispatch(&instr);
                    micro.dp.alu.disable_flags();
                    outcome?;
                } else {
                    tracing::debug!(address = self.fetched_at, %instr, "condition false, skipped");
                }
                self.retired = Some(Retired {
                    address: self.fetched_at,
                    instruction: instr,
                    executed,
                });
            }
        }

        self.phase = phase.next();
        Ok(phase)
    }
}

/// Micro-operation helpers over the fabric.
struct Micro<'a> {
    fabric: &'a mut Fabric,
    dp: &'a mut Datapath,
}

impl Micro<'_> {
    fn alu(&mut self, op: AluOpcode) {
        self.dp.alu.set_operation(op);
    }

    fn feed_a(&mut self, src: RegisterCode) -> Result<(), CpuError> {
        self.fabric.select(Bus::AFeed, src.into(), Endpoint::AluA, self.dp)?;
        Ok(())
    }

    fn feed_b(&mut self, src: RegisterCode) -> Result<(), CpuError> {
        self.fabric.select(Bus::BFeed, src.into(), Endpoint::AluB, self.dp)?;
        Ok(())
    }

    /// ALU result -> `dest`, then park the writeback bus.
    fn write_back(&mut self, dest: RegisterCode) -> Result<(), CpuError> {
        self.fabric
            .select(Bus::Writeback, Endpoint::AluResult, dest.into(), self.dp)?;
        self.fabric.release_writeback(self.dp)
    }

    /// `src` -> `dest` through operand A.
    fn transfer(&mut self, src: RegisterCode, dest: RegisterCode) -> Result<(), CpuError> {
        self.alu(AluOpcode::TRANSFER_A);
        self.feed_a(src)?;
        self.write_back(dest)
    }

    /// Memory at MAR -> `dest`, through MDR on operand B.
    fn load(&mut self, dest: RegisterCode) -> Result<(), CpuError> {
        self.alu(AluOpcode::TRANSFER_B);
        self.feed_b(RegisterCode::Mdr)?;
        self.write_back(dest)
    }

    /// `dest op operand -> dest`, latching flags.
    fn arithmetic(
        &mut self,
        op: AluOpcode,
        dest: RegisterCode,
        operand: RegisterCode,
    ) -> Result<(), CpuError> {
        self.alu(op);
        self.feed_a(dest)?;
        // Only the recompute with both operands in place may latch flags
        self.dp.alu.enable_flags();
        self.feed_b(operand)?;
        self.write_back(dest)
    }

    fn dispatch(&mut self, instr: &Instruction) -> Result<(), CpuError> {
        match *instr {
            Instruction::Register { opcode, dest, src, alu, .. } => match opcode {
                OpCode::Aopr => self.arithmetic(alu, dest, src),
                OpCode::Loadr => {
                    self.transfer(src, RegisterCode::Mar)?;
                    self.load(dest)
                }
                OpCode::Storr => {
                    self.transfer(src, RegisterCode::Mar)?;
                    self.transfer(dest, RegisterCode::Mdr)
                }
                other => Err(CpuError::UnimplementedOpcode(other)),
            },
            Instruction::Immediate { opcode, dest, alu, .. } => match opcode {
                OpCode::Aopi => self.arithmetic(alu, dest, RegisterCode::Irb),
                OpCode::Load => {
                    self.transfer(RegisterCode::Irb, RegisterCode::Mar)?;
                    self.load(dest)
                }
                OpCode::Store => {
                    self.transfer(RegisterCode::Irb, RegisterCode::Mar)?;
                    self.transfer(dest, RegisterCode::Mdr)
                }
                other => Err(CpuError::UnimplementedOpcode(other)),
            },
            Instruction::Jump { opcode, .. } => match opcode {
                OpCode::Nop => Ok(()),
                OpCode::Jmp | OpCode::B => self.transfer(RegisterCode::Irb, RegisterCode::Pc),
                other => Err(CpuError::UnimplementedOpcode(other)),
            },
        }
    }
}
