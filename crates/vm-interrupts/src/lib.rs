//! The interrupt controller: a static 9-slot vector, a pending-bit array,
//! and the dispatcher the CPU polls once per cycle.

use std::sync::Mutex;

use vm_core::SharedLogger;
use vm_registers::{OperationMode, SharedRegisters};

pub const INT_INVALID_SYSCALL: u8 = 0;
pub const INT_INVALID_INTERRUPT: u8 = 1;
pub const INT_SYSCALL: u8 = 2;
pub const INT_TIMER: u8 = 3;
pub const INT_IO_COMPLETION: u8 = 4;
pub const INT_INVALID_INSTRUCTION: u8 = 5;
pub const INT_INVALID_ADDRESS: u8 = 6;
pub const INT_UNDERFLOW: u8 = 7;
pub const INT_OVERFLOW: u8 = 8;

const INTERRUPT_COUNT: usize = 9;

/// Human-readable name for each code, used in log records.
fn name(code: u8) -> &'static str {
    match code {
        INT_INVALID_SYSCALL => "INVALID_SYSCALL",
        INT_INVALID_INTERRUPT => "INVALID_INTERRUPT",
        INT_SYSCALL => "SYSCALL",
        INT_TIMER => "TIMER",
        INT_IO_COMPLETION => "IO_COMPLETION",
        INT_INVALID_INSTRUCTION => "INVALID_INSTRUCTION",
        INT_INVALID_ADDRESS => "INVALID_ADDRESS",
        INT_UNDERFLOW => "UNDERFLOW",
        INT_OVERFLOW => "OVERFLOW",
        _ => "UNKNOWN",
    }
}

pub struct InterruptController {
    pending: Mutex<[bool; INTERRUPT_COUNT]>,
    registers: SharedRegisters,
    logger: SharedLogger,
}

impl InterruptController {
    #[must_use]
    pub fn new(registers: SharedRegisters, logger: SharedLogger) -> Self {
        Self {
            pending: Mutex::new([false; INTERRUPT_COUNT]),
            registers,
            logger,
        }
    }

    /// Raise an interrupt. Codes outside `[0, 8]` raise `INVALID_INTERRUPT`
    /// instead; the pending-bit latch makes this safe even though it looks
    /// recursive, since `INVALID_INTERRUPT` is itself a valid code and the
    /// latch collapses repeated triggers into one dispatch.
    pub fn trigger(&self, code: u8) {
        let target = if (code as usize) < INTERRUPT_COUNT {
            code
        } else {
            self.logger
                .error(&format!("trigger: code {code} is outside [0, 8]"));
            INT_INVALID_INTERRUPT
        };
        let interrupts_enabled = self.registers.lock().unwrap().psw.interrupt_enabled;
        if interrupts_enabled {
            self.pending.lock().unwrap()[target as usize] = true;
        } else {
            self.logger.warning(&format!(
                "trigger: {} dropped, interrupts disabled",
                name(target)
            ));
        }
    }

    /// Dispatch every pending interrupt in ascending code order, each
    /// exactly once. Called by the CPU once per cycle, after execute.
    pub fn handle_pending(&self) {
        for code in 0..INTERRUPT_COUNT as u8 {
            let is_pending = self.pending.lock().unwrap()[code as usize];
            if !is_pending {
                continue;
            }
            self.save_context();
            self.registers.lock().unwrap().psw.operation_mode = OperationMode::Kernel;
            self.run_handler(code);
            self.pending.lock().unwrap()[code as usize] = false;
            self.restore_context();
        }
    }

    /// Context save is a no-op in this core, but is a real call so a richer
    /// implementation can insert stack frames here without touching the
    /// dispatcher.
    fn save_context(&self) {}

    /// See `save_context`.
    fn restore_context(&self) {}

    fn run_handler(&self, code: u8) {
        match code {
            INT_SYSCALL => {
                self.registers.lock().unwrap().psw.operation_mode = OperationMode::Kernel;
                self.logger.interrupt(name(code));
            }
            INT_INVALID_ADDRESS => {
                let mar = self.registers.lock().unwrap().mar.as_str().to_string();
                self.logger.error(&format!("INVALID_ADDRESS: MAR={mar}"));
            }
            INT_UNDERFLOW => {
                self.registers.lock().unwrap().psw.condition_code = 7;
                self.logger.interrupt(name(code));
            }
            INT_OVERFLOW => {
                self.registers.lock().unwrap().psw.condition_code = 3;
                self.logger.interrupt(name(code));
            }
            _ => self.logger.interrupt(name(code)),
        }
    }

    #[cfg(test)]
    fn is_pending(&self, code: u8) -> bool {
        self.pending.lock().unwrap()[code as usize]
    }
}
