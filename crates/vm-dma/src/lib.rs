//! The DMA controller: a single-worker memory↔disk transfer engine
//! arbitrated by one bus mutex, signalling completion via an interrupt.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use vm_core::SharedLogger;
use vm_disk::{Disk, CYLINDERS, SECTORS_PER_CYLINDER, TRACKS};
use vm_interrupts::{InterruptController, INT_IO_COMPLETION};
use vm_memory::{Memory, MEMORY_SIZE};
use vm_word::Word;

/// Direction of a configured transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaOperation {
    Read,
    Write,
}

/// The controller's visible state, per the spec's `IDLE -> (READING|WRITING)
/// -> IDLE|ERROR` transition rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaState {
    Idle,
    Reading,
    Writing,
    Error,
}

/// Result of the most recently completed transfer, surfaced to the CPU via
/// the DMAS opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaStatus {
    Ok,
    Err,
}

/// The controller's configuration registers. Cloned into the worker thread
/// at `start_transfer` time so the worker runs against a stable snapshot.
#[derive(Debug, Clone)]
struct DmaConfig {
    mem_addr: i64,
    disk_track: i64,
    disk_cyl: i64,
    disk_sector_base: i64,
    operation: DmaOperation,
    n_words: i64,
    state: DmaState,
    status: DmaStatus,
}

impl DmaConfig {
    fn reset() -> Self {
        Self {
            mem_addr: 0,
            disk_track: 0,
            disk_cyl: 0,
            disk_sector_base: 0,
            operation: DmaOperation::Read,
            n_words: 0,
            state: DmaState::Idle,
            status: DmaStatus::Ok,
        }
    }
}

struct DmaInner {
    config: Mutex<DmaConfig>,
    done: Condvar,
}

/// The bus-arbitrated DMA engine. One instance per VM; the worker thread
/// spawned by `start_transfer` borrows `memory` and `disk` through their own
/// internal synchronization rather than holding a lock on the controller.
pub struct DmaController {
    inner: Arc<DmaInner>,
    bus_lock: Arc<Mutex<()>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    memory: Arc<Memory>,
    disk: Arc<Disk>,
    interrupts: Arc<InterruptController>,
    logger: SharedLogger,
    word_delay: Duration,
}

impl DmaController {
    #[must_use]
    pub fn new(
        memory: Arc<Memory>,
        disk: Arc<Disk>,
        interrupts: Arc<InterruptController>,
        logger: SharedLogger,
    ) -> Self {
        Self::with_word_delay(memory, disk, interrupts, logger, Duration::from_millis(1))
    }

    /// Construct with an explicit inter-word pacing delay, so tests aren't
    /// forced to pay the production 1ms-per-word cost.
    #[must_use]
    pub fn with_word_delay(
        memory: Arc<Memory>,
        disk: Arc<Disk>,
        interrupts: Arc<InterruptController>,
        logger: SharedLogger,
        word_delay: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(DmaInner {
                config: Mutex::new(DmaConfig::reset()),
                done: Condvar::new(),
            }),
            bus_lock: Arc::new(Mutex::new(())),
            worker: Mutex::new(None),
            memory,
            disk,
            interrupts,
            logger,
            word_delay,
        }
    }

    #[must_use]
    pub fn state(&self) -> DmaState {
        self.inner.config.lock().unwrap().state
    }

    #[must_use]
    pub fn status(&self) -> DmaStatus {
        self.inner.config.lock().unwrap().status
    }

    /// `AC := dma.status` for the DMAS opcode: 0 for OK, 1 for ERR.
    #[must_use]
    pub fn status_code(&self) -> i64 {
        match self.status() {
            DmaStatus::Ok => 0,
            DmaStatus::Err => 1,
        }
    }

    /// Set the memory-side transfer address. Rejected (log only) unless
    /// `state=IDLE` or the address is out of bounds.
    pub fn set_memory_address(&self, addr: i64) {
        let mut cfg = self.inner.config.lock().unwrap();
        if cfg.state != DmaState::Idle {
            self.logger
                .warning("dma: set_memory_address ignored, controller busy");
            return;
        }
        if !(0..MEMORY_SIZE).contains(&addr) {
            self.logger
                .error(&format!("dma: set_memory_address {addr} out of bounds"));
            return;
        }
        cfg.mem_addr = addr;
    }

    /// Set the disk-side coordinates. Rejected (log only) unless
    /// `state=IDLE` or the coordinates are out of bounds.
    pub fn set_disk_location(&self, track: i64, cylinder: i64, sector: i64) {
        let mut cfg = self.inner.config.lock().unwrap();
        if cfg.state != DmaState::Idle {
            self.logger
                .warning("dma: set_disk_location ignored, controller busy");
            return;
        }
        if !(0..TRACKS).contains(&track)
            || !(0..CYLINDERS).contains(&cylinder)
            || !(0..SECTORS_PER_CYLINDER).contains(&sector)
        {
            self.logger.error(&format!(
                "dma: set_disk_location ({track},{cylinder},{sector}) out of bounds"
            ));
            return;
        }
        cfg.disk_track = track;
        cfg.disk_cyl = cylinder;
        cfg.disk_sector_base = sector;
    }

    pub fn set_io_operation(&self, operation: DmaOperation) {
        let mut cfg = self.inner.config.lock().unwrap();
        if cfg.state != DmaState::Idle {
            self.logger
                .warning("dma: set_io_operation ignored, controller busy");
            return;
        }
        cfg.operation = operation;
    }

    /// Set the word count for the next transfer. Rejected (log only) unless
    /// `state=IDLE` or the count is negative.
    pub fn set_transfer_size(&self, n_words: i64) {
        let mut cfg = self.inner.config.lock().unwrap();
        if cfg.state != DmaState::Idle {
            self.logger
                .warning("dma: set_transfer_size ignored, controller busy");
            return;
        }
        if n_words < 0 {
            self.logger
                .error(&format!("dma: set_transfer_size {n_words} is negative"));
            return;
        }
        cfg.n_words = n_words;
    }

    /// Spawn the worker thread that performs the configured transfer.
    /// Must find `state=IDLE`; otherwise warns and returns without effect.
    pub fn start_transfer(&self) {
        let snapshot = {
            let mut cfg = self.inner.config.lock().unwrap();
            if cfg.state != DmaState::Idle {
                self.logger
                    .warning("dma: start_transfer ignored, controller busy");
                return;
            }
            cfg.state = match cfg.operation {
                DmaOperation::Read => DmaState::Reading,
                DmaOperation::Write => DmaState::Writing,
            };
            cfg.clone()
        };

        if let Some(stale) = self.worker.lock().unwrap().take() {
            let _ = stale.join();
        }

        let inner = Arc::clone(&self.inner);
        let bus_lock = Arc::clone(&self.bus_lock);
        let memory = Arc::clone(&self.memory);
        let disk = Arc::clone(&self.disk);
        let interrupts = Arc::clone(&self.interrupts);
        let logger = Arc::clone(&self.logger);
        let word_delay = self.word_delay;

        let handle = thread::spawn(move || {
            let _bus = bus_lock.lock().unwrap();
            let mut errored = false;

            for i in 0..snapshot.n_words {
                let addr = snapshot.mem_addr + i;
                if !(0..MEMORY_SIZE).contains(&addr) {
                    logger.error(&format!("dma: transfer ran past memory at {addr}"));
                    errored = true;
                    break;
                }
                let sector = snapshot.disk_sector_base + i;
                match snapshot.operation {
                    DmaOperation::Read => match disk.read_sector(snapshot.disk_track, snapshot.disk_cyl, sector) {
                        Ok(word) => {
                            memory.write_raw(addr, word);
                        }
                        Err(fault) => {
                            logger.error(&format!("dma: read_sector failed: {fault}"));
                            errored = true;
                            break;
                        }
                    },
                    DmaOperation::Write => {
                        let word = memory.read_raw(addr).unwrap_or_else(Word::zero);
                        if disk
                            .write_sector(snapshot.disk_track, snapshot.disk_cyl, sector, &word)
                            .is_err()
                        {
                            logger.error("dma: write_sector failed");
                            errored = true;
                            break;
                        }
                    }
                }
                thread::sleep(word_delay);
            }

            {
                let mut cfg = inner.config.lock().unwrap();
                if errored {
                    cfg.state = DmaState::Error;
                    cfg.status = DmaStatus::Err;
                } else {
                    cfg.state = DmaState::Idle;
                    cfg.status = DmaStatus::Ok;
                }
            }
            inner.done.notify_all();
            interrupts.trigger(INT_IO_COMPLETION);
        });

        *self.worker.lock().unwrap() = Some(handle);
    }

    /// Block the caller until the current transfer leaves `READING`/`WRITING`.
    /// Returns immediately if the controller is already `IDLE` or `ERROR`.
    pub fn wait_completion(&self) {
        let cfg = self.inner.config.lock().unwrap();
        let _finished = self
            .inner
            .done
            .wait_while(cfg, |cfg| {
                matches!(cfg.state, DmaState::Reading | DmaState::Writing)
            })
            .unwrap();
    }
}
