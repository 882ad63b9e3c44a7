//! x25 - CLI Entry Point
//!
//! Commands:
//! - `x25 run <program>` - Run an ASM or executable file
//! - `x25 debug <program>` - Interactive debugger
//! - `x25 asm <source>` - Assemble to an executable
//! - `x25 disasm <exe>` - Disassemble an executable

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lltp::asm::disasm::disassemble_instruction;
use lltp::clock::AdvanceSignal;
use lltp::isa::RegisterCode;
use lltp::{
    assemble, disassemble, load_exe, save_exe, Clock, ClockConfig, ClockMode, Cpu, Executable,
    HaltReason, Phase,
};

#[derive(Parser)]
#[command(name = "x25")]
#[command(version = "0.1.0")]
#[command(about = "A cycle-level simulator of the LLTP/x25-32 CPU")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program
    Run {
        /// Path to the ASM or executable file
        program: String,
        /// Maximum number of clock cycles to run (default: 10000)
        #[arg(short, long, default_value = "10000")]
        max_cycles: u64,
        /// Delay between cycles in milliseconds
        #[arg(short, long, default_value = "0")]
        period_ms: u64,
        /// Advance one cycle per Enter on stdin
        #[arg(long)]
        manual: bool,
        /// Print every retired instruction
        #[arg(short, long)]
        trace: bool,
        /// Print the final CPU state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive debugger
    Debug {
        /// Path to the ASM or executable file
        program: String,
    },
    /// Assemble source to an executable
    Asm {
        /// Path to the source file
        source: String,
        /// Output executable file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble an executable to source
    Disasm {
        /// Path to the executable file
        program: String,
    },
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run {
            program,
            max_cycles,
            period_ms,
            manual,
            trace,
            json,
        }) => {
            let mode = if manual {
                ClockMode::Manual
            } else {
                ClockMode::Auto {
                    period: Duration::from_millis(period_ms),
                }
            };
            let config = ClockConfig {
                mode,
                max_cycles: Some(max_cycles),
            };
            run_program(&program, config, trace, json);
        }
        Some(Commands::Debug { program }) => {
            debug_program(&program);
        }
        Some(Commands::Asm { source, output }) => {
            assemble_file(&source, output);
        }
        Some(Commands::Disasm { program }) => {
            disassemble_file(&program);
        }
        None => {
            println!("x25 v0.1.0");
            println!("A cycle-level simulator of the LLTP/x25-32 CPU");
            println!();
            println!("Use --help for available commands");
        }
    }
}

/// Log to stderr, filtered by `RUST_LOG` (default: warnings).
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load an executable, assembling first if the path ends in `.asm`.
fn load_program(path: &str) -> Executable {
    let exe = if path.ends_with(".asm") {
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("❌ Failed to read file: {}", e);
                std::process::exit(1);
            }
        };

        match assemble(&source) {
            Ok(words) => {
                println!("📝 Assembled {} instructions", words.len() / 2);
                Executable::new(words)
            }
            Err(e) => {
                eprintln!("❌ Assembly error: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        match load_exe(path) {
            Ok(exe) => {
                println!("📂 Loaded {} instructions", exe.program.len() / 2);
                exe
            }
            Err(e) => {
                eprintln!("❌ Failed to load executable: {}", e);
                std::process::exit(1);
            }
        }
    };

    if exe.program.is_empty() {
        eprintln!("❌ No instructions to execute");
        std::process::exit(1);
    }
    exe
}

/// Manual clock source: one cycle per line on stdin, `q` or EOF to stop.
struct StdinAdvance;

impl AdvanceSignal for StdinAdvance {
    fn wait_for_advance(&mut self) -> bool {
        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => false,
            Ok(_) => line.trim() != "q",
        }
    }
}

fn run_program(path: &str, config: ClockConfig, trace: bool, json: bool) {
    println!("🔧 Running: {}", path);
    let exe = load_program(path);

    let mut cpu = match Cpu::from_executable(&exe, Box::new(std::io::stdout())) {
        Ok(cpu) => cpu,
        Err(e) => {
            eprintln!("❌ Failed to load program: {}", e);
            std::process::exit(1);
        }
    };

    println!();
    println!("━━━ Execution ━━━");
    if config.mode == ClockMode::Manual {
        println!("Press Enter to advance one cycle, q to stop");
    }

    let clock = Clock::new(config);
    let mut stdin = StdinAdvance;
    let result = clock.run(&mut cpu, Some(&mut stdin), |cpu, phase| {
        if config.mode == ClockMode::Manual {
            println!("{:>8}: {} PC={:#06x}", cpu.cycles, phase, cpu.pc());
        }
        if trace && phase == Phase::Execute {
            if let Some(retired) = cpu.last_retired() {
                let words = lltp::encode(&retired.instruction);
                let flags = cpu.flags();
                println!(
                    "{:04x}: {:<28}{} Z={} N={} O={}",
                    retired.address,
                    disassemble_instruction(words),
                    if retired.executed { "" } else { " (skipped)" },
                    flags.zero as u8,
                    flags.negative as u8,
                    flags.overflow as u8,
                );
            }
        }
    });

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("❌ CPU error at PC={:#06x}: {}", cpu.pc(), e);
            std::process::exit(1);
        }
    };

    if json {
        match serde_json::to_string_pretty(&cpu.snapshot()) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("❌ Failed to serialize state: {}", e),
        }
        return;
    }

    let flags = cpu.flags();
    println!();
    println!("━━━ Result ━━━");
    println!("Cycles: {}", summary.cycles);
    println!("State: {:?}", cpu.state);
    println!("PC:    {:#010x}", cpu.pc());
    println!(
        "Flags: zero={} negative={} overflow={} carry={}",
        flags.zero, flags.negative, flags.overflow, flags.carry
    );
    for (i, value) in cpu.datapath.regs.gp_values().iter().enumerate() {
        if *value != 0 {
            println!("{:<5}  {:#010x} ({})", RegisterCode::GP[i].name(), value, *value as i32);
        }
    }

    if summary.reason == HaltReason::CycleLimit {
        println!();
        println!(
            "⚠️  Reached max cycles limit ({}). Use --max-cycles to increase.",
            summary.cycles
        );
    }
}

#[cfg(feature = "tui")]
fn debug_program(path: &str) {
    use lltp::tui::run_debugger;

    println!("🔍 Loading: {}", path);
    let exe = load_program(path);

    println!("🚀 Launching debugger...");
    println!();

    if let Err(e) = run_debugger(exe) {
        eprintln!("❌ Debugger error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "tui"))]
fn debug_program(_path: &str) {
    eprintln!("❌ Built without the `tui` feature");
    std::process::exit(1);
}

/// Where `asm` writes its executable: `output`, or the source path with an
/// `.x25` extension. Never the source itself.
fn output_path(source_path: &str, output: Option<String>) -> Result<PathBuf, String> {
    let source = Path::new(source_path);
    let out = match output {
        Some(path) => PathBuf::from(path),
        None => source.with_extension("x25"),
    };
    if out == source {
        return Err(format!("output {} would overwrite the source", out.display()));
    }
    Ok(out)
}

fn assemble_file(source_path: &str, output: Option<String>) {
    let out_path = match output_path(source_path, output) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    println!("📝 Assembling: {} → {}", source_path, out_path.display());

    // Read source
    let source = match std::fs::read_to_string(source_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Failed to read file: {}", e);
            std::process::exit(1);
        }
    };

    // Assemble
    let words = match assemble(&source) {
        Ok(words) => words,
        Err(e) => {
            eprintln!("❌ Assembly error: {}", e);
            std::process::exit(1);
        }
    };

    println!("✓ Assembled {} instructions", words.len() / 2);

    if let Err(e) = save_exe(&out_path, &Executable::new(words)) {
        eprintln!("❌ Failed to save executable: {}", e);
        std::process::exit(1);
    }

    println!("✓ Saved to {}", out_path.display());
}

fn disassemble_file(path: &str) {
    println!("📖 Disassembling: {}", path);
    println!();

    let exe = match load_exe(path) {
        Ok(exe) => exe,
        Err(e) => {
            eprintln!("❌ Failed to load executable: {}", e);
            std::process::exit(1);
        }
    };

    let h = &exe.header;
    println!("; version {:#08x}, entry {:#x}", h.version, h.entry);
    println!(
        "; ram {:#x}..={:#x}, console {:#x}..={:#x}",
        h.ram_start, h.ram_end, h.console_start, h.console_end
    );
    println!("{}", disassemble(&exe.program));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_swaps_extension() {
        assert_eq!(output_path("prog.asm", None), Ok(PathBuf::from("prog.x25")));
        assert_eq!(output_path("prog.s", None), Ok(PathBuf::from("prog.x25")));
        assert_eq!(
            output_path("src.asm.d/prog.asm", None),
            Ok(PathBuf::from("src.asm.d/prog.x25"))
        );
        assert_eq!(output_path("prog", None), Ok(PathBuf::from("prog.x25")));
    }

    #[test]
    fn test_output_path_never_overwrites_source() {
        assert!(output_path("prog.x25", None).is_err());
        assert!(output_path("prog.asm", Some("prog.asm".into())).is_err());
        assert_eq!(
            output_path("prog.asm", Some("out.bin".into())),
            Ok(PathBuf::from("out.bin"))
        );
    }
}
