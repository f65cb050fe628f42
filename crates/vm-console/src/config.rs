//! Console-level configuration: CLI flags layered over the literal defaults
//! `spec.md` specifies (a 2000-word memory, a 300-word OS region, `RB=0,
//! RL=1024`). No file-based config format is introduced — the command
//! surface in the external interfaces section is the configuration surface
//! this binary needs.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "vm-console", about = "A pedagogical von Neumann machine")]
pub struct Cli {
    /// Program image to load at startup (see `vm_console::loader` for the
    /// file format). Omit to start with an empty user region.
    pub program: Option<PathBuf>,

    /// Enter step mode instead of running to completion.
    #[arg(long)]
    pub debug: bool,

    /// Path to the machine's own event log (truncated on startup).
    #[arg(long, default_value = "system.log")]
    pub log_path: PathBuf,

    /// Milliseconds slept between CPU cycles during continuous execution.
    #[arg(long, default_value_t = 10)]
    pub cycle_delay_ms: u64,

    /// Milliseconds slept between words during a DMA transfer.
    #[arg(long, default_value_t = 1)]
    pub dma_word_delay_ms: u64,

    /// Override the process's initial base register (RB). Memory size
    /// (2000 words) and the OS region (300 words) are architectural
    /// constants, not configuration — only the process window they
    /// bound is adjustable here.
    #[arg(long, requires = "initial_rl")]
    pub initial_rb: Option<i64>,

    /// Override the process's initial limit register (RL).
    #[arg(long, requires = "initial_rb")]
    pub initial_rl: Option<i64>,
}

impl Cli {
    #[must_use]
    pub fn cycle_delay(&self) -> Duration {
        Duration::from_millis(self.cycle_delay_ms)
    }

    #[must_use]
    pub fn dma_word_delay(&self) -> Duration {
        Duration::from_millis(self.dma_word_delay_ms)
    }
}
