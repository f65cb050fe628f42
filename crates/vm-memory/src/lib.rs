//! The memory unit: a flat 2000-word array, a base/limit translator, and
//! the OS-region privilege check.

use std::sync::{Arc, Mutex};

use vm_core::SharedLogger;
use vm_interrupts::{InterruptController, INT_INVALID_ADDRESS};
use vm_registers::{OperationMode, SharedRegisters};
use vm_word::{to_int, to_word, Word};

pub const MEMORY_SIZE: i64 = 2000;
pub const OS_REGION_LEN: i64 = 300;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
enum MemoryFault {
    #[error("address outside the translated region")]
    OutOfBounds,
    #[error("user-mode access to the OS region")]
    Privileged,
}

pub struct Memory {
    cells: Mutex<Vec<Word>>,
    registers: SharedRegisters,
    interrupts: Arc<InterruptController>,
    logger: SharedLogger,
}

impl Memory {
    #[must_use]
    pub fn new(
        registers: SharedRegisters,
        interrupts: Arc<InterruptController>,
        logger: SharedLogger,
    ) -> Self {
        let mut cells = vec![Word::zero(); MEMORY_SIZE as usize];
        for cell in cells.iter_mut().take(OS_REGION_LEN as usize) {
            *cell = Word::os_reserved();
        }
        Self {
            cells: Mutex::new(cells),
            registers,
            interrupts,
            logger,
        }
    }

    /// Set the process window: `RB := base`, `RL := limit`.
    pub fn set_memory_region(&self, base: i64, limit: i64) {
        let mut regs = self.registers.lock().unwrap();
        regs.rb = to_word(base, &*self.logger);
        regs.rl = to_word(limit, &*self.logger);
    }

    fn translate(&self, logical: i64) -> Result<usize, MemoryFault> {
        let regs = self.registers.lock().unwrap();
        let rb = to_int(&regs.rb, &*self.logger);
        let rl = to_int(&regs.rl, &*self.logger);
        let mode = regs.psw.operation_mode;
        drop(regs);

        let phys = if rb == 0 && rl == 0 {
            logical
        } else {
            let phys = logical + rb;
            if phys < rb || phys >= rb + rl {
                return Err(MemoryFault::OutOfBounds);
            }
            phys
        };

        if phys < 0 || phys >= MEMORY_SIZE {
            return Err(MemoryFault::OutOfBounds);
        }
        if phys < OS_REGION_LEN && mode == OperationMode::User {
            return Err(MemoryFault::Privileged);
        }
        Ok(phys as usize)
    }

    /// Read through the logical address translator, enforcing base/limit
    /// bounds and OS-region privilege. Faults raise `INT_INVALID_ADDRESS`
    /// and return a sentinel rather than aborting the caller.
    #[must_use]
    pub fn read(&self, logical: i64) -> Word {
        match self.translate(logical) {
            Ok(phys) => {
                let word = self.cells.lock().unwrap()[phys].clone();
                self.logger
                    .debug(&format!("memory read phys={phys} -> {word:?}"));
                word
            }
            Err(MemoryFault::OutOfBounds) => {
                self.interrupts.trigger(INT_INVALID_ADDRESS);
                Word::mem_err()
            }
            Err(MemoryFault::Privileged) => {
                self.interrupts.trigger(INT_INVALID_ADDRESS);
                Word::priv_err()
            }
        }
    }

    /// Write through the logical address translator. Faults raise
    /// `INT_INVALID_ADDRESS` and leave the targeted cell untouched.
    pub fn write(&self, logical: i64, value: Word) {
        match self.translate(logical) {
            Ok(phys) => {
                self.logger.debug(&format!("memory write phys={phys}"));
                self.cells.lock().unwrap()[phys] = value;
            }
            Err(MemoryFault::OutOfBounds) => self.interrupts.trigger(INT_INVALID_ADDRESS),
            Err(MemoryFault::Privileged) => self.interrupts.trigger(INT_INVALID_ADDRESS),
        }
    }

    /// Read a physical cell directly, bypassing translation and privilege.
    /// Used by the DMA worker and the program loader, which address the
    /// bus directly rather than through a process's logical window.
    #[must_use]
    pub fn read_raw(&self, phys: i64) -> Option<Word> {
        if (0..MEMORY_SIZE).contains(&phys) {
            Some(self.cells.lock().unwrap()[phys as usize].clone())
        } else {
            None
        }
    }

    /// Write a physical cell directly. See `read_raw`.
    pub fn write_raw(&self, phys: i64, value: Word) -> bool {
        if (0..MEMORY_SIZE).contains(&phys) {
            self.cells.lock().unwrap()[phys as usize] = value;
            true
        } else {
            false
        }
    }

    /// Snapshot a contiguous physical range, for the `memory` console
    /// command. Out-of-range bounds are clamped rather than faulted.
    #[must_use]
    pub fn dump(&self, start: i64, end: i64) -> Vec<(i64, Word)> {
        let cells = self.cells.lock().unwrap();
        let start = start.clamp(0, MEMORY_SIZE);
        let end = end.clamp(start, MEMORY_SIZE);
        (start..end)
            .map(|addr| (addr, cells[addr as usize].clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vm_core::NullLogger;
    use vm_interrupts::InterruptController;
    use vm_registers::RegisterFile;

    fn wired() -> (Memory, SharedRegisters, Arc<InterruptController>) {
        let regs = RegisterFile::shared();
        let logger: SharedLogger = Arc::new(NullLogger);
        let interrupts = Arc::new(InterruptController::new(Arc::clone(&regs), Arc::clone(&logger)));
        let memory = Memory::new(Arc::clone(&regs), Arc::clone(&interrupts), logger);
        (memory, regs, interrupts)
    }

    #[test]
    fn init_reserves_the_os_region() {
        let (mem, ..) = wired();
        assert_eq!(mem.read(0).as_str(), "OS_RESERVED");
        assert_eq!(mem.read(299).as_str(), "OS_RESERVED");
        assert_eq!(mem.read(300).as_str(), "00000000");
    }

    #[test]
    fn kernel_identity_mapping_reads_os_region() {
        let (mem, regs, _ints) = wired();
        regs.lock().unwrap().psw.operation_mode = OperationMode::Kernel;
        mem.write(50, Word::from_raw("00000042"));
        assert_eq!(mem.read(50).as_str(), "00000042");
    }

    #[test]
    fn user_mode_cannot_touch_the_os_region() {
        let (mem, regs, _ints) = wired();
        {
            let mut r = regs.lock().unwrap();
            r.rb = to_word(300, &NullLogger);
            r.rl = to_word(100, &NullLogger);
            r.psw.operation_mode = OperationMode::User;
        }
        let before = mem.read_raw(0).unwrap();
        mem.write(0, Word::from_raw("99999999"));
        assert_eq!(mem.read_raw(0).unwrap(), before);
    }

    #[test]
    fn base_limit_rejects_addresses_outside_the_window() {
        let (mem, regs, _ints) = wired();
        {
            let mut r = regs.lock().unwrap();
            r.rb = to_word(300, &NullLogger);
            r.rl = to_word(10, &NullLogger);
        }
        assert_eq!(mem.read(20).as_str(), "MEM_ERR");
    }

    #[test]
    fn a_user_process_at_rb_300_may_address_logical_zero() {
        // Design note: RB=300 means logical 0 -> physical 300, which is not
        // < 300, so it passes the privilege check. Documented as
        // intentional rather than a bug.
        let (mem, regs, _ints) = wired();
        {
            let mut r = regs.lock().unwrap();
            r.rb = to_word(300, &NullLogger);
            r.rl = to_word(100, &NullLogger);
            r.psw.operation_mode = OperationMode::User;
        }
        mem.write(0, Word::from_raw("00000007"));
        assert_eq!(mem.read(0).as_str(), "00000007");
    }

    #[test]
    fn raw_access_bypasses_translation_and_privilege() {
        let (mem, regs, _ints) = wired();
        regs.lock().unwrap().psw.operation_mode = OperationMode::User;
        assert!(mem.write_raw(5, Word::from_raw("00000099")));
        assert_eq!(mem.read_raw(5).unwrap().as_str(), "00000099");
        assert!(mem.read_raw(MEMORY_SIZE).is_none());
    }
}
