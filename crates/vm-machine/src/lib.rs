//! The VM container: the single owner of the register file, memory, disk,
//! interrupt controller, DMA controller, and CPU. Everything else (the
//! console, the log sink, the real program loader) is an external
//! collaborator that talks to this container through its accessors.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use vm_core::SharedLogger;
use vm_cpu::{Cpu, CpuState};
use vm_disk::Disk;
use vm_dma::DmaController;
use vm_interrupts::InterruptController;
use vm_memory::Memory;
use vm_registers::{RegisterFile, SharedRegisters};
use vm_word::Word;

/// Writes a program into memory and reports where execution should start.
/// The core ships one implementation (`SampleProgramLoader`); a file-backed
/// loader is an external collaborator's job.
pub trait ProgramLoader {
    fn load(&self, memory: &Memory) -> i64;
}

/// The hard-coded four-word sample program from the external interfaces
/// section, loaded at base 300. Its fourth word is `45000000` (SWKERN), not
/// HALT (`40000000`) — the program as written never halts, and this loader
/// preserves that literally rather than silently correcting it.
#[derive(Debug, Default, Clone, Copy)]
pub struct SampleProgramLoader;

impl ProgramLoader for SampleProgramLoader {
    fn load(&self, memory: &Memory) -> i64 {
        const BASE: i64 = 300;
        const PROGRAM: [&str; 4] = ["00050000", "01030000", "05001200", "45000000"];
        for (offset, word) in PROGRAM.iter().enumerate() {
            memory.write_raw(BASE + offset as i64, Word::from_raw(*word));
        }
        BASE
    }
}

/// Owns one of every subsystem. Constructing a `Vm` wires the shared
/// register file and interrupt controller into memory and DMA exactly once;
/// nothing outside this module holds a second copy of any of them.
pub struct Vm {
    registers: SharedRegisters,
    memory: Arc<Memory>,
    disk: Arc<Disk>,
    interrupts: Arc<InterruptController>,
    dma: Arc<DmaController>,
    cpu: Cpu,
    logger: SharedLogger,
}

impl Vm {
    #[must_use]
    pub fn new(logger: SharedLogger) -> Self {
        Self::with_dma_word_delay(logger, Duration::from_millis(1))
    }

    /// Like `new`, but with an explicit DMA inter-word pacing delay. The
    /// console binary exposes this as `--dma-word-delay-ms`; tests use it
    /// to avoid paying the production 1ms-per-word cost.
    #[must_use]
    pub fn with_dma_word_delay(logger: SharedLogger, dma_word_delay: Duration) -> Self {
        let registers = RegisterFile::shared();
        let interrupts = Arc::new(InterruptController::new(
            Arc::clone(&registers),
            Arc::clone(&logger),
        ));
        let memory = Arc::new(Memory::new(
            Arc::clone(&registers),
            Arc::clone(&interrupts),
            Arc::clone(&logger),
        ));
        let disk = Arc::new(Disk::new(Arc::clone(&logger)));
        let dma = Arc::new(DmaController::with_word_delay(
            Arc::clone(&memory),
            Arc::clone(&disk),
            Arc::clone(&interrupts),
            Arc::clone(&logger),
            dma_word_delay,
        ));
        let cpu = Cpu::new(
            Arc::clone(&registers),
            Arc::clone(&memory),
            Arc::clone(&interrupts),
            Arc::clone(&dma),
            Arc::clone(&logger),
        );
        Self {
            registers,
            memory,
            disk,
            interrupts,
            dma,
            cpu,
            logger,
        }
    }

    #[must_use]
    pub fn registers(&self) -> &SharedRegisters {
        &self.registers
    }

    #[must_use]
    pub fn memory(&self) -> &Arc<Memory> {
        &self.memory
    }

    #[must_use]
    pub fn disk(&self) -> &Arc<Disk> {
        &self.disk
    }

    #[must_use]
    pub fn interrupts(&self) -> &Arc<InterruptController> {
        &self.interrupts
    }

    #[must_use]
    pub fn dma(&self) -> &Arc<DmaController> {
        &self.dma
    }

    #[must_use]
    pub fn cpu_state(&self) -> CpuState {
        self.cpu.state()
    }

    /// Load a program and point PC at its start address, without running it.
    pub fn load_program(&self, loader: &dyn ProgramLoader) -> i64 {
        let start = loader.load(&self.memory);
        self.registers.lock().unwrap().set_pc(start, &*self.logger);
        start
    }

    /// Transition the CPU from `Halted` to `Running`.
    pub fn init_cpu(&self) {
        self.cpu.init_cpu();
    }

    /// Advance exactly one instruction cycle.
    pub fn step(&self) -> CpuState {
        self.cpu.cycle()
    }

    /// Run cycles until the CPU halts or `max_cycles` elapses, sleeping
    /// `cycle_delay` between cycles for pacing. Returns the final state.
    /// `max_cycles = None` runs until HALT, which callers should only do
    /// for programs known to terminate.
    pub fn run(&self, cycle_delay: Duration, max_cycles: Option<u64>) -> CpuState {
        let mut cycles = 0u64;
        loop {
            let state = self.step();
            if state != CpuState::Running {
                return state;
            }
            cycles += 1;
            if let Some(limit) = max_cycles {
                if cycles >= limit {
                    return state;
                }
            }
            thread::sleep(cycle_delay);
        }
    }
}

