use std::sync::Arc;

/// The core's only logging dependency: one call per level, each taking a
/// fully-formatted message. The core never knows about file handles,
/// timestamps, or formatting — that's the console binary's job.
pub trait Logger: Send + Sync {
    fn info(&self, message: &str);
    fn warning(&self, message: &str);
    fn error(&self, message: &str);
    fn interrupt(&self, message: &str);
    fn debug(&self, message: &str);
}

/// Shared handle to a `Logger`, passed around every subsystem constructor.
pub type SharedLogger = Arc<dyn Logger>;

/// A logger that discards everything. Used in unit tests that only care
/// about the value under test, not the log trail.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn info(&self, _message: &str) {}
    fn warning(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
    fn interrupt(&self, _message: &str) {}
    fn debug(&self, _message: &str) {}
}
