//! Binary entry point: the external collaborators spec.md scopes out of
//! the core — the interactive console, the file-backed event log, and a
//! file-backed program loader — wired around the `vm-machine` container.

mod config;
mod console;
mod file_logger;
mod loader;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use config::Cli;
use console::Console;
use file_logger::FileLogger;
use vm_core::SharedLogger;
use vm_machine::Vm;

/// This process's own operational log (crate startup, file-open failures,
/// console I/O errors) — independent of the simulated machine's `Logger`,
/// which records the machine's own events to `system.log`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Exit code 1 is reserved, per the external interfaces section, for the
/// log file failing to open; `run` carries that distinction by returning
/// early rather than via the generic `anyhow::Result` error path other
/// failures take.
enum Outcome {
    Ran,
    LogOpenFailed,
}

fn run(cli: &Cli) -> anyhow::Result<Outcome> {
    let logger: SharedLogger = match FileLogger::open(&cli.log_path) {
        Ok(logger) => Arc::new(logger),
        Err(err) => {
            tracing::error!("failed to open log file: {err}");
            return Ok(Outcome::LogOpenFailed);
        }
    };

    let vm = Vm::with_dma_word_delay(Arc::clone(&logger), cli.dma_word_delay());
    if let (Some(rb), Some(rl)) = (cli.initial_rb, cli.initial_rl) {
        vm.memory().set_memory_region(rb, rl);
    }

    if let Some(program) = &cli.program {
        let loader = loader::FileProgramLoader::from_path(program)
            .with_context(|| format!("loading program {}", program.display()))?;
        let start = vm.load_program(&loader);
        tracing::info!("loaded {} at {start}", program.display());
        vm.init_cpu();
        if !cli.debug {
            let state = vm.run(cli.cycle_delay(), None);
            println!("{}", console::summarize_state(&vm, state));
            return Ok(Outcome::Ran);
        }
    }

    let mut console = Console::new(&vm, cli.cycle_delay());
    console.run_interactive();
    Ok(Outcome::Ran)
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(Outcome::Ran) => ExitCode::SUCCESS,
        Ok(Outcome::LogOpenFailed) => ExitCode::from(1),
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::from(1)
        }
    }
}
