//! TUI debugger for the x25-32.
//!
//! An interactive terminal front end over [`crate::Cpu`] with:
//! - Register, flag and phase panels
//! - Bus selections for the current cycle
//! - Disassembly around PC and a RAM view
//! - Console output
//! - Pulse/step/run/breakpoint controls

mod app;
mod ui;

pub use app::{run_debugger, DebuggerApp};
