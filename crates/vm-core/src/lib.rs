//! Shared collaborator traits for the VM.
//!
//! Every subsystem crate (word codec, registers, memory, disk, interrupts,
//! DMA, CPU) logs through the same `Logger` interface rather than pulling
//! in its own logging dependency, so a single external sink (the console
//! binary's `FileLogger`) sees every record in one place.

mod logger;

pub use logger::{Logger, NullLogger, SharedLogger};
