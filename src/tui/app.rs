//! Debugger application state and logic.

use std::collections::HashSet;

use crate::asm::disasm::disassemble_instruction;
use crate::asm::Executable;
use crate::cpu::{ClockEdge, Cpu, CpuError, SharedOutput};
use crate::isa::Word;

/// Debugger application state.
pub struct DebuggerApp {
    /// The CPU being debugged.
    pub cpu: Cpu,
    /// Program image, reloaded on reset.
    pub exe: Executable,
    /// What the program wrote to the console.
    pub console: SharedOutput,
    /// Breakpoints (by instruction address).
    pub breakpoints: HashSet<Word>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// Memory view scroll offset, in words from the start of RAM.
    pub mem_scroll: usize,
}

impl DebuggerApp {
    /// Create a new debugger with a loaded program.
    pub fn new(exe: Executable) -> Result<Self, CpuError> {
        let console = SharedOutput::new();
        let cpu = Cpu::from_executable(&exe, Box::new(console.clone()))?;

        Ok(Self {
            cpu,
            exe,
            console,
            breakpoints: HashSet::new(),
            running: false,
            should_quit: false,
            status: "Ready. Press 's' to pulse, 'i' to step, 'r' to run, 'q' to quit.".into(),
            mem_scroll: 0,
        })
    }

    /// Apply one rising edge.
    pub fn pulse(&mut self) {
        if !self.cpu.is_running() {
            self.stopped();
            return;
        }

        match self.cpu.pulse(ClockEdge::Rising) {
            Ok(Some(phase)) => {
                self.status = format!("Cycle {}: {} done, PC={:#06x}", self.cpu.cycles, phase, self.cpu.pc());
            }
            Ok(None) => {}
            Err(e) => self.fault(e),
        }
    }

    /// Run cycles until the next instruction retires.
    pub fn step_instruction(&mut self) {
        if !self.cpu.is_running() {
            self.stopped();
            return;
        }

        match self.cpu.step_instruction() {
            Ok(retired) => {
                let text = disassemble_instruction(crate::isa::encode(&retired.instruction));
                let skipped = if retired.executed { "" } else { " (skipped)" };
                self.status = format!("{:#06x}: {}{}", retired.address, text, skipped);
            }
            Err(e) => self.fault(e),
        }
    }

    /// Run until a breakpoint or error.
    pub fn run(&mut self) {
        self.running = true;
        self.status = "Running...".into();
    }

    /// Run one iteration of continuous execution.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        if !self.cpu.is_running() {
            self.running = false;
            self.stopped();
            return;
        }

        self.step_instruction();

        // Stop in front of a breakpointed instruction
        let pc = self.cpu.pc();
        if self.running && self.breakpoints.contains(&pc) {
            self.running = false;
            self.status = format!("Breakpoint at PC={:#06x}", pc);
        }
    }

    /// Toggle a breakpoint at the current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.cpu.pc();
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at PC={:#06x}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at PC={:#06x}", pc);
        }
    }

    /// Rebuild the CPU from the original program image.
    pub fn reset(&mut self) {
        self.console.clear();
        match Cpu::from_executable(&self.exe, Box::new(self.console.clone())) {
            Ok(cpu) => {
                self.cpu = cpu;
                self.status = "Reset. Ready.".into();
            }
            Err(e) => self.status = format!("Reset failed: {}", e),
        }
        self.running = false;
    }

    /// Disassembly around PC as `(address, text, is_current)`.
    pub fn get_disassembly(&self, lines: usize) -> Vec<(Word, String, bool)> {
        let pc = self.cpu.pc();
        let ram_start = self.cpu.layout().ram_start;
        // Instructions are two words wide; keep the window aligned to PC
        let back = (lines as Word / 2) * 2;
        let mut addr = pc.saturating_sub(back).max(ram_start);
        if (addr ^ pc) & 1 != 0 {
            addr += 1;
        }

        let mut rows = Vec::with_capacity(lines);
        while rows.len() < lines {
            let (Ok(lo), Ok(hi)) = (
                self.cpu.read_memory(addr),
                self.cpu.read_memory(addr.wrapping_add(1)),
            ) else {
                break;
            };
            rows.push((addr, disassemble_instruction([lo, hi]), addr == pc));
            addr = match addr.checked_add(2) {
                Some(next) => next,
                None => break,
            };
        }
        rows
    }

    fn fault(&mut self, err: CpuError) {
        self.status = format!("Error at PC={:#06x}: {}", self.cpu.pc(), err);
        self.running = false;
    }

    fn stopped(&mut self) {
        self.status = format!("CPU {:?} after {} cycles. Press 'x' to reset.", self.cpu.state, self.cpu.cycles);
        self.running = false;
    }
}

/// Run the debugger with a program.
pub fn run_debugger(exe: Executable) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    // Build the app before touching the terminal so errors print normally
    let mut app = DebuggerApp::new(exe)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let ram_words = app.cpu.layout().ram_size() as usize;

    // Main loop
    loop {
        // Draw
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        // Handle input
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('s') => {
                            app.running = false;
                            app.pulse();
                        }
                        KeyCode::Char('i') => {
                            app.running = false;
                            app.step_instruction();
                        }
                        KeyCode::Char('r') => app.run(),
                        KeyCode::Char('p') => {
                            app.running = false;
                            app.status = "Paused.".into();
                        }
                        KeyCode::Char('b') => app.toggle_breakpoint(),
                        KeyCode::Char('x') => app.reset(),
                        KeyCode::Up => {
                            app.mem_scroll = app.mem_scroll.saturating_sub(4);
                        }
                        KeyCode::Down => {
                            if app.mem_scroll + 4 < ram_words {
                                app.mem_scroll += 4;
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        // Tick for continuous running
        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}
