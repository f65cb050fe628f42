//! The six end-to-end scenarios from the external interfaces section,
//! run against the public `Vm` surface almost verbatim.

use std::sync::Arc;
use std::time::Duration;

use vm_core::NullLogger;
use vm_cpu::CpuState;
use vm_machine::{ProgramLoader, SampleProgramLoader, Vm};
use vm_word::Word;

fn vm() -> Vm {
    let vm = Vm::new(Arc::new(NullLogger));
    vm.init_cpu();
    vm
}

fn poke(vm: &Vm, addr: i64, raw: &str) {
    vm.memory().write_raw(addr, Word::from_raw(raw));
}

#[test]
fn arithmetic_and_store() {
    let vm = vm();
    vm.registers().lock().unwrap().set_pc(300, &NullLogger);
    poke(&vm, 300, "04150000"); // LOAD IMM 15
    poke(&vm, 301, "00030000"); // SUM IMM 3
    poke(&vm, 302, "05000400"); // STR 400
    poke(&vm, 303, "40000000"); // HALT
    let state = vm.run(Duration::from_millis(0), Some(10));
    assert_eq!(state, CpuState::Halted);
    assert_eq!(
        vm_word::to_int(&vm.registers().lock().unwrap().ac, &NullLogger),
        18
    );
    assert_eq!(
        vm.memory().read(400).as_str(),
        vm_word::to_word(18, &NullLogger).as_str()
    );
}

#[test]
fn privilege_fault_leaves_memory_untouched() {
    let vm = vm();
    {
        let mut regs = vm.registers().lock().unwrap();
        regs.rb = vm_word::to_word(300, &NullLogger);
        regs.rl = vm_word::to_word(100, &NullLogger);
        regs.psw.operation_mode = vm_registers::OperationMode::User;
        regs.psw.interrupt_enabled = true;
        regs.set_pc(0, &NullLogger);
    }
    let before = vm.memory().read_raw(300).unwrap();
    poke(&vm, 0, "05000000"); // STR at logical 0 -> phys 300
    vm.step();
    assert_eq!(vm.memory().read_raw(300).unwrap(), before);
    // The fault dispatched within this same cycle (handle_pending runs at
    // the end of cycle()); every dispatch flips the mode to kernel.
    assert_eq!(
        vm.registers().lock().unwrap().psw.operation_mode,
        vm_registers::OperationMode::Kernel
    );
}

#[test]
fn base_limit_out_of_bounds_returns_mem_err() {
    let vm = vm();
    {
        let mut regs = vm.registers().lock().unwrap();
        regs.rb = vm_word::to_word(300, &NullLogger);
        regs.rl = vm_word::to_word(10, &NullLogger);
    }
    assert_eq!(vm.memory().read(20).as_str(), "MEM_ERR");
}

#[test]
fn unconditional_jump_loop_and_halt() {
    let vm = vm();
    vm.registers().lock().unwrap().set_pc(300, &NullLogger);
    poke(&vm, 300, "04000200"); // LOAD IMM 2
    poke(&vm, 301, "27000303"); // JMP 303
    poke(&vm, 302, "00009999"); // must not execute
    poke(&vm, 303, "40000000"); // HALT
    let state = vm.run(Duration::from_millis(0), Some(10));
    assert_eq!(state, CpuState::Halted);
    assert_eq!(
        vm_word::to_int(&vm.registers().lock().unwrap().ac, &NullLogger),
        2
    );
    assert_eq!(vm.memory().read(302).as_str(), "00000000");
}

#[test]
fn dma_round_trip_via_cpu_opcodes() {
    let vm = vm();
    vm.registers().lock().unwrap().set_pc(300, &NullLogger);
    for (i, addr) in (500..504).enumerate() {
        poke(&vm, addr, &format!("0000{:04}", i + 1));
    }
    poke(&vm, 300, "33000004"); // DMAZ 4
    poke(&vm, 301, "32000000"); // DMAC T0 C0 S0
    poke(&vm, 302, "29000500"); // DMAW 500
    poke(&vm, 303, "30000000"); // DMAWAIT
    poke(&vm, 304, "28000600"); // DMAR 600
    poke(&vm, 305, "30000000"); // DMAWAIT
    poke(&vm, 306, "40000000"); // HALT
    let state = vm.run(Duration::from_millis(0), Some(20));
    assert_eq!(state, CpuState::Halted);
    for (i, addr) in (600..604).enumerate() {
        assert_eq!(
            vm.memory().read_raw(addr).unwrap().as_str(),
            format!("0000{:04}", i + 1)
        );
    }
    assert_eq!(vm.dma().state(), vm_dma::DmaState::Idle);
}

#[test]
fn overflow_detection_sets_cc_and_kernel_mode() {
    let vm = vm();
    {
        let mut regs = vm.registers().lock().unwrap();
        regs.ac = vm_word::to_word(9_999_000, &NullLogger);
        regs.psw.interrupt_enabled = true;
        regs.set_pc(300, &NullLogger);
    }
    poke(&vm, 300, "00102000"); // SUM IMM 2000
    vm.step();
    let regs = vm.registers().lock().unwrap();
    assert_eq!(regs.psw.condition_code, 3);
    assert_eq!(regs.psw.operation_mode, vm_registers::OperationMode::Kernel);
}

#[test]
fn sample_program_loader_preserves_the_non_halting_literal_bytes() {
    let vm = vm();
    let start = vm.load_program(&SampleProgramLoader);
    assert_eq!(start, 300);
    assert_eq!(vm.memory().read_raw(303).unwrap().as_str(), "45000000");
    let state = vm.run(Duration::from_millis(0), Some(50));
    assert_eq!(state, CpuState::Running);
}
