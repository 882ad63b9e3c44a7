//! CPU aggregate for the x25-32.
//!
//! Owns the datapath (registers, ALU, MMU), the fabric and the control
//! unit, and exposes the clock: one rising edge runs one control-unit
//! phase.

use std::io::Write;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::asm::Executable;
use crate::cpu::alu::Flags;
use crate::cpu::control::{ControlUnit, Phase, Retired};
use crate::cpu::fabric::{Datapath, Fabric, FabricError};
use crate::cpu::memory::{Console, Memory};
use crate::cpu::mmu::{AddressFault, Mmu, MmuError};
use crate::isa::{AluOpcode, DecodeError, OpCode, RegisterCode, Word};

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// Accepting clock pulses.
    Running,
    /// Stopped by the driver.
    Halted,
    /// A pulse failed; only `reset` recovers.
    Faulted,
}

/// A clock transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEdge {
    Rising,
    Falling,
}

/// Where RAM and the console live in the address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryLayout {
    pub ram_start: Word,
    pub ram_end: Word,
    pub console_start: Word,
    pub console_end: Word,
}

impl MemoryLayout {
    /// Words of RAM.
    pub fn ram_size(&self) -> u64 {
        span(self.ram_start, self.ram_end)
    }

    /// Words of console space.
    pub fn console_size(&self) -> u64 {
        span(self.console_start, self.console_end)
    }

    fn build_mmu(&self, sink: Box<dyn Write + Send>) -> Result<Mmu, MmuError> {
        let ram = region_len(self.ram_start, self.ram_end)?;
        let console = region_len(self.console_start, self.console_end)?;

        let mut mmu = Mmu::new();
        mmu.map(self.ram_start, self.ram_end, Box::new(Memory::new(ram)))?;
        mmu.map(
            self.console_start,
            self.console_end,
            Box::new(Console::new(console, sink)),
        )?;
        Ok(mmu)
    }
}

impl Default for MemoryLayout {
    fn default() -> Self {
        Self {
            ram_start: 0x0000,
            ram_end: 0x0FFF,
            console_start: 0x1000,
            console_end: 0x10FF,
        }
    }
}

fn span(start: Word, end: Word) -> u64 {
    (end as u64 + 1).saturating_sub(start as u64)
}

/// Largest region a layout may ask for (64 MiB of words). Layouts come
/// from executable headers, so this is checked before allocating.
pub const MAX_REGION_WORDS: u64 = 1 << 24;

fn region_len(start: Word, end: Word) -> Result<usize, MmuError> {
    if end < start {
        return Err(MmuError::InvertedRange { start, end });
    }
    let too_large = MmuError::RegionTooLarge {
        start,
        end,
        limit: MAX_REGION_WORDS,
    };
    let words = span(start, end);
    if words > MAX_REGION_WORDS {
        return Err(too_large);
    }
    usize::try_from(words).map_err(|_| too_large)
}

/// The x25-32 CPU.
pub struct Cpu {
    /// Registers, ALU and memory.
    pub datapath: Datapath,
    /// Bus selectors.
    pub fabric: Fabric,
    /// Fetch/decode/execute state machine.
    pub control: ControlUnit,
    /// Current execution state.
    pub state: CpuState,
    /// Rising edges handled (for profiling).
    pub cycles: u64,
    layout: MemoryLayout,
    entry: Word,
}

impl Cpu {
    /// Create a CPU whose console output is discarded.
    pub fn new(layout: MemoryLayout) -> Result<Self, CpuError> {
        Self::with_console(layout, Box::new(std::io::sink()))
    }

    /// Create a CPU whose console echoes to `sink`.
    pub fn with_console(layout: MemoryLayout, sink: Box<dyn Write + Send>) -> Result<Self, CpuError> {
        let mmu = layout.build_mmu(sink)?;
        let mut cpu = Self {
            datapath: Datapath::new(mmu),
            fabric: Fabric::new(),
            control: ControlUnit::new(),
            state: CpuState::Running,
            cycles: 0,
            layout,
            entry: layout.ram_start,
        };
        cpu.datapath.regs.pc.force(cpu.entry);
        Ok(cpu)
    }

    /// Build a CPU from a loaded executable: its layout, program and entry
    /// point.
    pub fn from_executable(exe: &Executable, sink: Box<dyn Write + Send>) -> Result<Self, CpuError> {
        let mut cpu = Self::with_console(exe.header.layout(), sink)?;
        cpu.load_program(&exe.program)?;
        cpu.set_entry(exe.header.entry);
        Ok(cpu)
    }

    /// Copy a program into RAM starting at the RAM region's first address.
    pub fn load_program(&mut self, program: &[Word]) -> Result<(), CpuError> {
        let available = self.layout.ram_size();
        if program.len() as u64 > available {
            return Err(CpuError::ProgramTooLarge {
                size: program.len(),
                available,
            });
        }
        for (i, &word) in program.iter().enumerate() {
            self.datapath.mmu.write(self.layout.ram_start + i as Word, word)?;
        }
        tracing::debug!(words = program.len(), start = self.layout.ram_start, "program loaded");
        Ok(())
    }

    /// Set the entry point and move PC there.
    pub fn set_entry(&mut self, entry: Word) {
        self.entry = entry;
        self.datapath.regs.pc.force(entry);
    }

    pub fn entry(&self) -> Word {
        self.entry
    }

    pub fn layout(&self) -> MemoryLayout {
        self.layout
    }

    /// Reset registers, ALU, fabric and control unit. Memory is kept and PC
    /// returns to the entry point.
    pub fn reset(&mut self) {
        self.datapath.regs.reset();
        self.datapath.alu.reset();
        self.fabric.reset();
        self.control.reset();
        self.datapath.regs.pc.force(self.entry);
        self.state = CpuState::Running;
        self.cycles = 0;
    }

    /// Stop accepting pulses until `resume` or `reset`.
    pub fn halt(&mut self) {
        if self.state == CpuState::Running {
            self.state = CpuState::Halted;
        }
    }

    pub fn resume(&mut self) {
        if self.state == CpuState::Halted {
            self.state = CpuState::Running;
        }
    }

    /// Apply one clock edge. The rising edge runs one control-unit phase
    /// and returns it; the falling edge does nothing.
    pub fn pulse(&mut self, edge: ClockEdge) -> Result<Option<Phase>, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }
        match edge {
            ClockEdge::Rising => self.rising_edge().map(Some),
            ClockEdge::Falling => Ok(None),
        }
    }

    /// One full clock cycle.
    pub fn advance(&mut self) -> Result<Phase, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }
        self.rising_edge()
    }

    fn rising_edge(&mut self) -> Result<Phase, CpuError> {
        match self.control.tick(&mut self.fabric, &mut self.datapath) {
            Ok(phase) => {
                self.cycles += 1;
                Ok(phase)
            }
            Err(err) => {
                tracing::warn!(%err, cycle = self.cycles, phase = %self.control.phase(), "cpu faulted");
                self.state = CpuState::Faulted;
                Err(err)
            }
        }
    }

    /// Advance until the next Execute phase completes.
    pub fn step_instruction(&mut self) -> Result<Retired, CpuError> {
        loop {
            if self.advance()? == Phase::Execute {
                return self.control.last_retired().ok_or(CpuError::NothingDecoded);
            }
        }
    }

    /// Run for at most `max_cycles` clock cycles.
    ///
    /// Returns the number of cycles run.
    pub fn run_limited(&mut self, max_cycles: u64) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;
        let limit = self.cycles.saturating_add(max_cycles);

        while self.state == CpuState::Running && self.cycles < limit {
            self.advance()?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Latched ALU flags.
    pub fn flags(&self) -> Flags {
        self.datapath.alu.flags()
    }

    /// The phase the next rising edge will run.
    pub fn phase(&self) -> Phase {
        self.control.phase()
    }

    pub fn pc(&self) -> Word {
        self.datapath.regs.pc.value()
    }

    pub fn register(&self, code: RegisterCode) -> Word {
        self.datapath.regs.value(code)
    }

    /// Host-side register write, bypassing the fabric.
    pub fn set_register(&mut self, code: RegisterCode, value: Word) {
        self.datapath.regs.set(code, value);
    }

    /// Host-side memory read, bypassing MAR/MDR.
    pub fn read_memory(&self, addr: Word) -> Result<Word, AddressFault> {
        self.datapath.mmu.read(addr)
    }

    /// Host-side memory write, bypassing MAR/MDR.
    pub fn write_memory(&mut self, addr: Word, value: Word) -> Result<(), AddressFault> {
        self.datapath.mmu.write(addr, value)
    }

    pub fn last_retired(&self) -> Option<Retired> {
        self.control.last_retired()
    }

    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }

    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    pub fn is_faulted(&self) -> bool {
        self.state == CpuState::Faulted
    }

    /// Copy of the architectural state, for front ends.
    pub fn snapshot(&self) -> CpuSnapshot {
        let regs = &self.datapath.regs;
        CpuSnapshot {
            state: self.state,
            phase: self.phase(),
            cycles: self.cycles,
            pc: regs.pc.value(),
            mar: regs.mar.value(),
            mdr: regs.mdr.value(),
            ira: regs.ira.value(),
            irb: regs.irb.value(),
            gp: regs.gp_values(),
            flags: self.flags(),
            alu_operation: self.datapath.alu.operation(),
            flags_enabled: self.datapath.alu.flags_enabled(),
            last_retired: self.last_retired(),
        }
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("phase", &self.phase())
            .field("regs", &self.datapath.regs)
            .field("mmu", &self.datapath.mmu)
            .finish()
    }
}

/// Serializable view of the CPU between cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub state: CpuState,
    pub phase: Phase,
    pub cycles: u64,
    pub pc: Word,
    pub mar: Word,
    pub mdr: Word,
    pub ira: Word,
    pub irb: Word,
    pub gp: [Word; 16],
    pub flags: Flags,
    pub alu_operation: AluOpcode,
    pub flags_enabled: bool,
    pub last_retired: Option<Retired>,
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("fabric error: {0}")]
    Fabric(#[from] FabricError),

    #[error(transparent)]
    AddressFault(#[from] AddressFault),

    #[error("opcode {0} is not implemented")]
    UnimplementedOpcode(OpCode),

    #[error("execute phase reached with no decoded instruction")]
    NothingDecoded,

    #[error("invalid memory layout: {0}")]
    Layout(#[from] MmuError),

    #[error("program of {size} words exceeds {available} words of RAM")]
    ProgramTooLarge { size: usize, available: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::memory::SharedOutput;
    use crate::isa::{encode, Condition, Instruction};

    fn make_program(instructions: &[Instruction]) -> Vec<Word> {
        instructions.iter().flat_map(encode).collect()
    }

    fn aopi(dest: RegisterCode, alu: AluOpcode, immediate: Word) -> Instruction {
        Instruction::Immediate {
            opcode: OpCode::Aopi,
            condition: Condition::Always,
            dest,
            alu,
            immediate,
        }
    }

    fn store(dest: RegisterCode, addr: Word) -> Instruction {
        Instruction::Immediate {
            opcode: OpCode::Store,
            condition: Condition::Always,
            dest,
            alu: AluOpcode::default(),
            immediate: addr,
        }
    }

    fn cpu_with(program: &[Instruction]) -> Cpu {
        let mut cpu = Cpu::new(MemoryLayout::default()).unwrap();
        cpu.load_program(&make_program(program)).unwrap();
        cpu
    }

    #[test]
    fn test_four_pulses_per_instruction() {
        let mut cpu = cpu_with(&[Instruction::NOP]);
        let phases: Vec<Phase> = (0..4).map(|_| cpu.advance().unwrap()).collect();
        assert_eq!(
            phases,
            vec![Phase::Fetch1, Phase::Fetch2, Phase::Decode, Phase::Execute]
        );
        assert_eq!(cpu.cycles, 4);
        assert_eq!(cpu.pc(), 2);
    }

    #[test]
    fn test_falling_edge_is_noop() {
        let mut cpu = cpu_with(&[Instruction::NOP]);
        assert_eq!(cpu.pulse(ClockEdge::Falling).unwrap(), None);
        assert_eq!(cpu.cycles, 0);
        assert_eq!(cpu.phase(), Phase::Fetch1);
        assert_eq!(cpu.pulse(ClockEdge::Rising).unwrap(), Some(Phase::Fetch1));
    }

    #[test]
    fn test_cpu_arithmetic() {
        let mut cpu = cpu_with(&[
            aopi(RegisterCode::Gp0, AluOpcode::TRANSFER_B, 10),
            aopi(RegisterCode::Gp0, AluOpcode::ADDITION_SIGNED, 5),
            aopi(RegisterCode::Gp0, AluOpcode::AB_SUBTRACTION_SIGNED, 15),
        ]);

        cpu.step_instruction().unwrap();
        cpu.step_instruction().unwrap();
        assert_eq!(cpu.register(RegisterCode::Gp0), 15);
        assert!(!cpu.flags().zero);

        cpu.step_instruction().unwrap();
        assert_eq!(cpu.register(RegisterCode::Gp0), 0);
        assert!(cpu.flags().zero);
    }

    #[test]
    fn test_console_output() {
        let out = SharedOutput::new();
        let mut cpu = Cpu::with_console(MemoryLayout::default(), Box::new(out.clone())).unwrap();
        cpu.load_program(&make_program(&[
            aopi(RegisterCode::Gp0, AluOpcode::TRANSFER_B, b'O' as Word),
            store(RegisterCode::Gp0, 0x1000),
            aopi(RegisterCode::Gp0, AluOpcode::TRANSFER_B, b'K' as Word),
            store(RegisterCode::Gp0, 0x1001),
        ]))
        .unwrap();

        for _ in 0..4 {
            cpu.step_instruction().unwrap();
        }
        assert_eq!(out.text(), "OK");
        assert_eq!(cpu.read_memory(0x1001), Ok(b'K' as Word));
    }

    #[test]
    fn test_fault_stops_cpu() {
        let mut cpu = cpu_with(&[store(RegisterCode::Gp0, 0x2000)]);
        let err = cpu.step_instruction().unwrap_err();
        assert_eq!(err, CpuError::AddressFault(AddressFault { addr: 0x2000 }));
        assert!(cpu.is_faulted());
        assert_eq!(cpu.advance(), Err(CpuError::NotRunning(CpuState::Faulted)));

        cpu.reset();
        assert!(cpu.is_running());
        assert_eq!(cpu.pc(), 0);
    }

    #[test]
    fn test_unmapped_condition_faults() {
        let mut cpu = cpu_with(&[Instruction::Jump {
            opcode: OpCode::Jmp,
            condition: Condition::Eq,
            target: 0,
        }]);
        let err = cpu.step_instruction().unwrap_err();
        assert_eq!(
            err,
            CpuError::Decode(DecodeError::UnmappedCondition(Condition::Eq))
        );
    }

    #[test]
    fn test_halt_and_resume() {
        let mut cpu = cpu_with(&[Instruction::NOP]);
        cpu.halt();
        assert_eq!(
            cpu.pulse(ClockEdge::Rising),
            Err(CpuError::NotRunning(CpuState::Halted))
        );
        cpu.resume();
        assert!(cpu.advance().is_ok());
    }

    #[test]
    fn test_reset_keeps_memory() {
        let mut cpu = cpu_with(&[aopi(RegisterCode::Gp3, AluOpcode::TRANSFER_B, 3)]);
        cpu.set_entry(0);
        cpu.step_instruction().unwrap();
        cpu.reset();
        assert_eq!(cpu.register(RegisterCode::Gp3), 0);
        assert_eq!(cpu.cycles, 0);
        cpu.step_instruction().unwrap();
        assert_eq!(cpu.register(RegisterCode::Gp3), 3);
    }

    #[test]
    fn test_program_too_large() {
        let layout = MemoryLayout {
            ram_start: 0,
            ram_end: 3,
            console_start: 4,
            console_end: 4,
        };
        let mut cpu = Cpu::new(layout).unwrap();
        let err = cpu.load_program(&[0; 6]).unwrap_err();
        assert_eq!(err, CpuError::ProgramTooLarge { size: 6, available: 4 });
    }

    #[test]
    fn test_overlapping_layout_rejected() {
        let layout = MemoryLayout {
            ram_start: 0,
            ram_end: 0x100,
            console_start: 0x100,
            console_end: 0x1FF,
        };
        assert!(matches!(
            Cpu::new(layout),
            Err(CpuError::Layout(MmuError::Overlap { .. }))
        ));
    }

    #[test]
    fn test_oversized_layout_rejected() {
        let mut exe = Executable::new(vec![0, 0]);
        exe.header.ram_end = 0xFFFF_FFFE;
        exe.header.console_start = 0xFFFF_FFFF;
        exe.header.console_end = 0xFFFF_FFFF;
        let err = Cpu::from_executable(&exe, Box::new(std::io::sink())).unwrap_err();
        assert_eq!(
            err,
            CpuError::Layout(MmuError::RegionTooLarge {
                start: 0,
                end: 0xFFFF_FFFE,
                limit: MAX_REGION_WORDS,
            })
        );

        let at_limit = MemoryLayout {
            ram_start: 0,
            ram_end: (MAX_REGION_WORDS - 1) as Word,
            console_start: MAX_REGION_WORDS as Word,
            console_end: MAX_REGION_WORDS as Word,
        };
        assert_eq!(at_limit.ram_size(), MAX_REGION_WORDS);
    }

    #[test]
    fn test_run_limited() {
        let mut cpu = cpu_with(&[
            Instruction::NOP,
            Instruction::Jump {
                opcode: OpCode::Jmp,
                condition: Condition::Always,
                target: 0,
            },
        ]);
        assert_eq!(cpu.run_limited(40).unwrap(), 40);
        assert_eq!(cpu.pc(), 0);
        assert_eq!(cpu.phase(), Phase::Fetch1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut cpu = cpu_with(&[aopi(RegisterCode::Gp2, AluOpcode::TRANSFER_B, 8)]);
        cpu.step_instruction().unwrap();
        let snapshot = cpu.snapshot();
        assert_eq!(snapshot.gp[2], 8);
        assert_eq!(snapshot.pc, 2);
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: CpuSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
