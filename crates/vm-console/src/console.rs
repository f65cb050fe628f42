//! The interactive command console: a line-oriented REPL over a `Vm`. Reads
//! commands from stdin, tokenizes them on whitespace, and dispatches by
//! the first token. The console is the only place that knows about
//! terminal I/O; everything it touches is a `Vm` accessor.

use std::io::{self, BufRead, Write};

use vm_cpu::CpuState;
use vm_machine::{ProgramLoader, Vm};
use vm_word::to_int;

use crate::loader::FileProgramLoader;

/// Whether the console should keep reading commands.
pub enum Next {
    Continue,
    Exit,
}

/// Console run mode: `Continuous` runs a loaded program to completion on
/// `run`/`continue`; `Debug` only advances on `step`, entered via `debug`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Continuous,
    Debug,
}

pub struct Console<'a> {
    vm: &'a Vm,
    cycle_delay: std::time::Duration,
    mode: Mode,
}

impl<'a> Console<'a> {
    #[must_use]
    pub fn new(vm: &'a Vm, cycle_delay: std::time::Duration) -> Self {
        Self {
            vm,
            cycle_delay,
            mode: Mode::Continuous,
        }
    }

    /// Read and dispatch commands from stdin until `exit`/`quit`/`q` or EOF.
    pub fn run_interactive(&mut self) {
        let stdin = io::stdin();
        loop {
            print!("vm> ");
            let _ = io::stdout().flush();
            let mut line = String::new();
            if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
                break; // EOF
            }
            if let Next::Exit = self.dispatch(line.trim()) {
                break;
            }
        }
    }

    /// Handle one command line. Exposed separately from `run_interactive`
    /// so tests can drive the console without real stdin.
    pub fn dispatch(&mut self, line: &str) -> Next {
        let mut tokens = line.split_whitespace();
        let Some(command) = tokens.next() else {
            return Next::Continue;
        };
        let args: Vec<&str> = tokens.collect();

        match command {
            "run" => self.cmd_run(&args),
            "debug" => self.cmd_debug(&args),
            "step" | "s" => self.cmd_step(),
            "continue" | "c" => self.cmd_continue(),
            "registers" | "reg" | "r" => self.cmd_registers(),
            "memory" | "m" => self.cmd_memory(&args),
            "disk" | "d" => self.cmd_disk(),
            "load" => self.cmd_load(&args),
            "help" | "?" | "h" => self.cmd_help(),
            "exit" | "quit" | "q" => return Next::Exit,
            other => println!("unknown command {other:?}; try 'help'"),
        }
        Next::Continue
    }

    fn load_file(&self, path: &str) -> Option<i64> {
        match FileProgramLoader::from_path(std::path::Path::new(path)) {
            Ok(loader) => Some(self.vm.load_program(&loader)),
            Err(err) => {
                println!("could not load {path:?}: {err}");
                None
            }
        }
    }

    fn cmd_run(&mut self, args: &[&str]) {
        let Some(path) = args.first() else {
            println!("usage: run <file>");
            return;
        };
        if self.load_file(path).is_none() {
            return;
        }
        self.mode = Mode::Continuous;
        self.vm.init_cpu();
        let state = self.vm.run(self.cycle_delay, None);
        println!("halted: {state:?}");
    }

    fn cmd_debug(&mut self, args: &[&str]) {
        let Some(path) = args.first() else {
            println!("usage: debug <file>");
            return;
        };
        if self.load_file(path).is_none() {
            return;
        }
        self.mode = Mode::Debug;
        self.vm.init_cpu();
        println!("debug mode: use 'step'/'s' to advance, 'continue'/'c' to run");
    }

    fn cmd_step(&mut self) {
        if self.mode != Mode::Debug {
            println!("not in debug mode; use 'debug <file>' first");
            return;
        }
        let state = self.vm.step();
        println!("{state:?}");
    }

    fn cmd_continue(&mut self) {
        if self.mode != Mode::Debug {
            println!("not in debug mode; use 'debug <file>' first");
            return;
        }
        let state = self.vm.run(self.cycle_delay, None);
        println!("halted: {state:?}");
    }

    fn cmd_registers(&self) {
        let regs = self.vm.registers().lock().unwrap();
        println!("AC  = {}", regs.ac.as_str());
        println!("MAR = {}", regs.mar.as_str());
        println!("MDR = {}", regs.mdr.as_str());
        println!("IR  = {}", regs.ir.as_str());
        println!("RB  = {}", regs.rb.as_str());
        println!("RL  = {}", regs.rl.as_str());
        println!("RX  = {}", regs.rx.as_str());
        println!("SP  = {}", regs.sp.as_str());
        println!("PC  = {}", regs.pc.as_str());
        println!(
            "PSW = cc={} mode={:?} ie={} pc_psw={} (packed {:#06x})",
            regs.psw.condition_code,
            regs.psw.operation_mode,
            regs.psw.interrupt_enabled,
            regs.psw.pc_psw,
            regs.psw.pack()
        );
    }

    fn cmd_memory(&self, args: &[&str]) {
        let start = args
            .first()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(vm_memory::OS_REGION_LEN);
        let end = args
            .get(1)
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(start + 20);
        for (addr, word) in self.vm.memory().dump(start, end) {
            println!("{addr:>5}: {}", word.as_str());
        }
    }

    fn cmd_disk(&self) {
        let head = self.vm.disk().head();
        println!(
            "geometry: {} tracks x {} cylinders x {} sectors",
            vm_disk::TRACKS,
            vm_disk::CYLINDERS,
            vm_disk::SECTORS_PER_CYLINDER
        );
        println!(
            "head: track={} cylinder={} sector={}",
            head.track, head.cylinder, head.sector
        );
        println!(
            "dma: state={:?} status={:?}",
            self.vm.dma().state(),
            self.vm.dma().status()
        );
    }

    fn cmd_load(&self, args: &[&str]) {
        let Some(path) = args.first() else {
            println!("usage: load <file>");
            return;
        };
        if let Some(start) = self.load_file(path) {
            println!("loaded {path:?} at {start}");
        }
    }

    fn cmd_help(&self) {
        println!(
            "commands: run <file> | debug <file> | step/s | continue/c | \
             registers/reg/r | memory [start [end]]/m | disk/d | load <file> | \
             help/?/h | exit/quit/q"
        );
    }
}

/// Convenience used by `main` for an AC-focused one-line status, e.g. after
/// a non-interactive `run`.
#[must_use]
pub fn summarize_state(vm: &Vm, state: CpuState) -> String {
    let ac = to_int(&vm.registers().lock().unwrap().ac, &vm_core::NullLogger);
    format!("state={state:?} ac={ac}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vm_core::NullLogger;

    #[test]
    fn help_and_unknown_commands_do_not_exit() {
        let vm = Vm::new(Arc::new(NullLogger));
        let mut console = Console::new(&vm, std::time::Duration::from_millis(0));
        assert!(matches!(console.dispatch("help"), Next::Continue));
        assert!(matches!(console.dispatch("bogus"), Next::Continue));
        assert!(matches!(console.dispatch(""), Next::Continue));
    }

    #[test]
    fn exit_quit_and_q_all_terminate() {
        let vm = Vm::new(Arc::new(NullLogger));
        for cmd in ["exit", "quit", "q"] {
            let mut console = Console::new(&vm, std::time::Duration::from_millis(0));
            assert!(matches!(console.dispatch(cmd), Next::Exit));
        }
    }

    #[test]
    fn step_outside_debug_mode_is_refused() {
        let vm = Vm::new(Arc::new(NullLogger));
        vm.init_cpu();
        let mut console = Console::new(&vm, std::time::Duration::from_millis(0));
        console.dispatch("step");
        // Still Continuous mode; PC must not have advanced via a refused step.
        assert_eq!(console.mode, Mode::Continuous);
    }

    #[test]
    fn load_then_run_via_debug_and_step() {
        let vm = Vm::new(Arc::new(NullLogger));
        let dir = std::env::temp_dir();
        let path = dir.join(format!("vm-console-console-test-{:?}.prog", std::thread::current().id()));
        std::fs::write(&path, "BASE 300\n04150000\n00030000\n05000400\n40000000\n").unwrap();

        let mut console = Console::new(&vm, std::time::Duration::from_millis(0));
        console.dispatch(&format!("debug {}", path.display()));
        for _ in 0..10 {
            console.dispatch("step");
        }
        assert_eq!(vm.cpu_state(), CpuState::Halted);
        let _ = std::fs::remove_file(&path);
    }
}
