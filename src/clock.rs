//! Clock pump.
//!
//! Drives a [`Cpu`] one cycle at a time, either free-running with a fixed
//! period or waiting for an external advance signal before every cycle.
//! Stop requests are only observed between cycles, so a cycle's
//! micro-operations always complete.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cpu::{Cpu, CpuError, Phase};

/// How cycles are paced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClockMode {
    /// Free-running; sleeps `period` between cycles (zero = as fast as
    /// possible).
    Auto { period: Duration },
    /// One cycle per advance signal.
    Manual,
}

/// Clock configuration, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockConfig {
    pub mode: ClockMode,
    /// Stop after this many cycles; `None` runs until stopped.
    pub max_cycles: Option<u64>,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            mode: ClockMode::Auto {
                period: Duration::ZERO,
            },
            max_cycles: Some(10_000),
        }
    }
}

/// Shared cooperative stop flag.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the clock to stop after the current cycle.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear a previous stop request.
    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Source of manual advance requests.
pub trait AdvanceSignal {
    /// Block until the next cycle should run. Returns `false` when the
    /// source is closed and no more cycles will be requested.
    fn wait_for_advance(&mut self) -> bool;
}

impl AdvanceSignal for std::sync::mpsc::Receiver<()> {
    fn wait_for_advance(&mut self) -> bool {
        self.recv().is_ok()
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HaltReason {
    /// `max_cycles` reached.
    CycleLimit,
    /// The stop signal was raised.
    Stopped,
    /// The advance source closed (manual mode).
    SignalClosed,
    /// The CPU left the running state (halted by a callback).
    CpuHalted,
}

/// Outcome of [`Clock::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Cycles run by this call.
    pub cycles: u64,
    pub reason: HaltReason,
}

/// The clock pump.
#[derive(Debug, Clone)]
pub struct Clock {
    config: ClockConfig,
    stop: StopSignal,
}

impl Clock {
    pub fn new(config: ClockConfig) -> Self {
        Self {
            config,
            stop: StopSignal::new(),
        }
    }

    pub fn config(&self) -> ClockConfig {
        self.config
    }

    /// Handle for stopping this clock from elsewhere.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Pump cycles into `cpu` until the limit, a stop request, a closed
    /// advance source, or an error. `on_cycle` sees the CPU after every
    /// cycle along with the phase that ran.
    ///
    /// `signal` is only consulted in manual mode.
    pub fn run<F>(
        &self,
        cpu: &mut Cpu,
        signal: Option<&mut dyn AdvanceSignal>,
        mut on_cycle: F,
    ) -> Result<RunSummary, CpuError>
    where
        F: FnMut(&mut Cpu, Phase),
    {
        let mut signal = signal;
        let mut cycles = 0u64;
        tracing::debug!(config = ?self.config, "clock started");

        let reason = loop {
            if self.stop.is_stopped() {
                break HaltReason::Stopped;
            }
            if self.config.max_cycles.is_some_and(|max| cycles >= max) {
                break HaltReason::CycleLimit;
            }
            if !cpu.is_running() {
                break HaltReason::CpuHalted;
            }

            match self.config.mode {
                ClockMode::Auto { period } => {
                    if cycles > 0 && !period.is_zero() {
                        std::thread::sleep(period);
                    }
                }
                ClockMode::Manual => {
                    let open = match signal.as_deref_mut() {
                        Some(s) => s.wait_for_advance(),
                        None => false,
                    };
                    if !open {
                        break HaltReason::SignalClosed;
                    }
                }
            }

            let phase = cpu.advance()?;
            cycles += 1;
            on_cycle(cpu, phase);
        };

        tracing::debug!(cycles, ?reason, "clock stopped");
        Ok(RunSummary { cycles, reason })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;
    use crate::cpu::MemoryLayout;
    use std::sync::mpsc;

    fn looping_cpu() -> Cpu {
        let mut cpu = Cpu::new(MemoryLayout::default()).unwrap();
        cpu.load_program(&assemble("INC GP0\nJMP 0").unwrap()).unwrap();
        cpu
    }

    #[test]
    fn test_cycle_limit() {
        let mut cpu = looping_cpu();
        let clock = Clock::new(ClockConfig {
            max_cycles: Some(16),
            ..ClockConfig::default()
        });
        let summary = clock.run(&mut cpu, None, |_, _| {}).unwrap();
        assert_eq!(
            summary,
            RunSummary {
                cycles: 16,
                reason: HaltReason::CycleLimit
            }
        );
        assert_eq!(cpu.register(crate::isa::RegisterCode::Gp0), 2);
    }

    #[test]
    fn test_stop_between_cycles() {
        let mut cpu = looping_cpu();
        let clock = Clock::new(ClockConfig {
            max_cycles: None,
            ..ClockConfig::default()
        });
        let stop = clock.stop_signal();
        let summary = clock
            .run(&mut cpu, None, |cpu, phase| {
                if phase == Phase::Execute && cpu.cycles >= 8 {
                    stop.stop();
                }
            })
            .unwrap();
        assert_eq!(summary.reason, HaltReason::Stopped);
        assert_eq!(summary.cycles, 8);
        assert_eq!(cpu.phase(), Phase::Fetch1);
    }

    #[test]
    fn test_manual_mode() {
        let mut cpu = looping_cpu();
        let clock = Clock::new(ClockConfig {
            mode: ClockMode::Manual,
            max_cycles: None,
        });
        let (tx, mut rx) = mpsc::channel();
        for _ in 0..5 {
            tx.send(()).unwrap();
        }
        drop(tx);

        let summary = clock.run(&mut cpu, Some(&mut rx), |_, _| {}).unwrap();
        assert_eq!(summary.cycles, 5);
        assert_eq!(summary.reason, HaltReason::SignalClosed);
        assert_eq!(cpu.phase(), Phase::Fetch2);
    }

    #[test]
    fn test_halt_from_callback() {
        let mut cpu = looping_cpu();
        let clock = Clock::new(ClockConfig::default());
        let summary = clock
            .run(&mut cpu, None, |cpu, _| {
                if cpu.cycles == 3 {
                    cpu.halt();
                }
            })
            .unwrap();
        assert_eq!(summary.reason, HaltReason::CpuHalted);
        assert_eq!(summary.cycles, 3);
    }

    #[test]
    fn test_error_propagates() {
        let mut cpu = Cpu::new(MemoryLayout::default()).unwrap();
        cpu.load_program(&assemble("MUL GP0, GP1").unwrap()).unwrap();
        let clock = Clock::new(ClockConfig::default());
        let err = clock.run(&mut cpu, None, |_, _| {}).unwrap_err();
        assert!(matches!(err, CpuError::UnimplementedOpcode(_)));
        assert!(cpu.is_faulted());
    }
}
