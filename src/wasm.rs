//! WebAssembly bindings for the x25-32 simulator.
//!
//! JavaScript-friendly wrappers around [`Cpu`], the assembler and the
//! disassembler.

use wasm_bindgen::prelude::*;

use crate::asm::assembler::assemble;
use crate::asm::disasm::{disassemble, disassemble_instruction};
use crate::cpu::{ClockEdge, Cpu, SharedOutput};
use crate::isa::{encode, RegisterCode, Word};
use crate::MemoryLayout;

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn js_err(e: impl std::fmt::Display) -> JsError {
    JsError::new(&e.to_string())
}

/// WebAssembly-friendly CPU wrapper.
#[wasm_bindgen]
pub struct WasmCpu {
    cpu: Cpu,
    program: Vec<Word>,
    console: SharedOutput,
}

#[wasm_bindgen]
impl WasmCpu {
    /// Create a new CPU instance with the default memory layout.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<WasmCpu, JsError> {
        let console = SharedOutput::new();
        let cpu = Cpu::with_console(MemoryLayout::default(), Box::new(console.clone())).map_err(js_err)?;
        Ok(Self {
            cpu,
            program: Vec::new(),
            console,
        })
    }

    /// Assemble `source` and load it. Returns the instruction count.
    #[wasm_bindgen]
    pub fn load_asm(&mut self, source: &str) -> Result<usize, JsError> {
        let words = assemble(source).map_err(js_err)?;
        self.program = words;
        self.reload()?;
        Ok(self.program.len() / 2)
    }

    /// One clock cycle. Returns the phase that ran.
    #[wasm_bindgen]
    pub fn step(&mut self) -> Result<String, JsError> {
        let phase = self.cpu.pulse(ClockEdge::Rising).map_err(js_err)?;
        Ok(phase.map(|p| p.to_string()).unwrap_or_default())
    }

    /// Run to the end of the next instruction. Returns it disassembled.
    #[wasm_bindgen]
    pub fn step_instruction(&mut self) -> Result<String, JsError> {
        let retired = self.cpu.step_instruction().map_err(js_err)?;
        Ok(disassemble_instruction(encode(&retired.instruction)))
    }

    /// Run up to `max_cycles` cycles. Returns the total cycle count.
    #[wasm_bindgen]
    pub fn run(&mut self, max_cycles: u32) -> Result<u64, JsError> {
        self.cpu.run_limited(max_cycles as u64).map_err(js_err)?;
        Ok(self.cpu.cycles)
    }

    /// Reload the program into a fresh CPU.
    #[wasm_bindgen]
    pub fn reset(&mut self) -> Result<(), JsError> {
        self.reload()
    }

    #[wasm_bindgen]
    pub fn is_running(&self) -> bool {
        self.cpu.is_running()
    }

    #[wasm_bindgen]
    pub fn is_faulted(&self) -> bool {
        self.cpu.is_faulted()
    }

    #[wasm_bindgen]
    pub fn cycles(&self) -> u64 {
        self.cpu.cycles
    }

    #[wasm_bindgen]
    pub fn pc(&self) -> u32 {
        self.cpu.pc()
    }

    /// Value of a register by name, e.g. `"GP3"` or `"mar"`.
    #[wasm_bindgen]
    pub fn register(&self, name: &str) -> Result<u32, JsError> {
        let code = RegisterCode::from_name(name)
            .ok_or_else(|| JsError::new(&format!("unknown register: {}", name)))?;
        Ok(self.cpu.register(code))
    }

    /// Get state as string.
    #[wasm_bindgen]
    pub fn state(&self) -> String {
        format!("{:?}", self.cpu.state)
    }

    /// Memory word at `addr`, or 0 when nothing is mapped there.
    #[wasm_bindgen]
    pub fn memory_at(&self, addr: u32) -> u32 {
        self.cpu.read_memory(addr).unwrap_or(0)
    }

    /// `count` words of memory starting at `addr`.
    #[wasm_bindgen]
    pub fn memory_range(&self, addr: u32, count: u32) -> Vec<u32> {
        (0..count)
            .map(|i| self.memory_at(addr.wrapping_add(i)))
            .collect()
    }

    /// Full CPU snapshot as JSON.
    #[wasm_bindgen]
    pub fn registers_json(&self) -> Result<String, JsError> {
        serde_json::to_string(&self.cpu.snapshot()).map_err(js_err)
    }

    /// Everything written to the console since the last reset.
    #[wasm_bindgen]
    pub fn console_output(&self) -> String {
        self.console.text()
    }
}

impl WasmCpu {
    fn reload(&mut self) -> Result<(), JsError> {
        self.console.clear();
        let mut cpu = Cpu::with_console(self.cpu.layout(), Box::new(self.console.clone())).map_err(js_err)?;
        cpu.load_program(&self.program).map_err(js_err)?;
        self.cpu = cpu;
        Ok(())
    }
}

/// Assemble source code and return the program words.
#[wasm_bindgen]
pub fn wasm_assemble(source: &str) -> Result<Vec<u32>, JsError> {
    assemble(source).map_err(js_err)
}

/// Disassemble program words into a listing.
#[wasm_bindgen]
pub fn wasm_disassemble(words: &[u32]) -> String {
    disassemble(words)
}
