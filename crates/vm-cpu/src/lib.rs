//! The fetch/decode/execute cycle: instruction decoding and the 46-opcode
//! instruction set (arithmetic, memory, control flow, register moves, stack,
//! DMA, I/O, and system opcodes).

use std::sync::{Arc, Mutex};

use vm_core::SharedLogger;
use vm_dma::{DmaController, DmaOperation};
use vm_interrupts::{
    InterruptController, INT_INVALID_INSTRUCTION, INT_IO_COMPLETION, INT_OVERFLOW, INT_SYSCALL,
};
use vm_memory::Memory;
use vm_registers::{OperationMode, SharedRegisters};
use vm_word::{to_int, to_word, MAX_MAGNITUDE};

/// The CPU's run state. The core only ever drives `Running` and `Halted`;
/// `WaitingIo` and `Error` exist so a richer front end has somewhere to
/// plumb them without changing this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuState {
    Halted,
    Running,
    WaitingIo,
    Error,
}

/// Addressing mode carried by the instruction's third digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    Direct,
    Immediate,
    Indexed,
}

/// The result of decoding one instruction word.
#[derive(Debug, Clone, Copy)]
struct Decoded {
    opcode: i32,
    mode: AddressingMode,
    value: i64,
}

impl Decoded {
    fn invalid() -> Self {
        Self {
            opcode: -1,
            mode: AddressingMode::Direct,
            value: 0,
        }
    }
}

/// One instruction cycle's worth of the CPU, wired to the subsystems it
/// reads and mutates. Owned by the VM container alongside memory, the
/// interrupt controller, and DMA.
pub struct Cpu {
    registers: SharedRegisters,
    memory: Arc<Memory>,
    interrupts: Arc<InterruptController>,
    dma: Arc<DmaController>,
    logger: SharedLogger,
    state: Mutex<CpuState>,
}

impl Cpu {
    #[must_use]
    pub fn new(
        registers: SharedRegisters,
        memory: Arc<Memory>,
        interrupts: Arc<InterruptController>,
        dma: Arc<DmaController>,
        logger: SharedLogger,
    ) -> Self {
        Self {
            registers,
            memory,
            interrupts,
            dma,
            logger,
            state: Mutex::new(CpuState::Halted),
        }
    }

    #[must_use]
    pub fn state(&self) -> CpuState {
        *self.state.lock().unwrap()
    }

    /// Power on: transition from the initial `Halted` state to `Running`.
    pub fn init_cpu(&self) {
        *self.state.lock().unwrap() = CpuState::Running;
    }

    fn fetch(&self) -> vm_word::Word {
        let pc_int = {
            let regs = self.registers.lock().unwrap();
            to_int(&regs.pc, &*self.logger)
        };
        {
            let mut regs = self.registers.lock().unwrap();
            regs.mar = to_word(pc_int, &*self.logger);
        }
        let word = self.memory.read(pc_int);
        let mut regs = self.registers.lock().unwrap();
        regs.mdr = word.clone();
        regs.ir = word.clone();
        regs.set_pc(pc_int + 1, &*self.logger);
        word
    }

    fn decode(&self, ir: &vm_word::Word) -> Decoded {
        let s = ir.as_str();
        let bytes = s.as_bytes();
        if bytes.len() != 8 || !bytes.iter().all(u8::is_ascii_digit) {
            return Decoded::invalid();
        }
        let opcode: i32 = s[0..2].parse().unwrap_or(-1);
        let mode = match &s[2..3] {
            "0" => AddressingMode::Direct,
            "1" => AddressingMode::Immediate,
            "2" => AddressingMode::Indexed,
            _ => return Decoded::invalid(),
        };
        let value: i64 = match s[3..8].parse() {
            Ok(v) => v,
            Err(_) => return Decoded::invalid(),
        };
        Decoded { opcode, mode, value }
    }

    fn effective_address(&self, decoded: Decoded) -> i64 {
        match decoded.mode {
            AddressingMode::Direct | AddressingMode::Immediate => decoded.value,
            AddressingMode::Indexed => {
                let ac = to_int(&self.registers.lock().unwrap().ac, &*self.logger);
                ac + decoded.value
            }
        }
    }

    /// The instruction's operand as a signed integer: `value` in IMMEDIATE
    /// mode, otherwise the int decode of `memory.read(ea)`.
    fn operand(&self, decoded: Decoded, ea: i64) -> i64 {
        if decoded.mode == AddressingMode::Immediate {
            decoded.value
        } else {
            to_int(&self.memory.read(ea), &*self.logger)
        }
    }

    fn ac_int(&self) -> i64 {
        to_int(&self.registers.lock().unwrap().ac, &*self.logger)
    }

    fn set_ac(&self, value: i64) {
        let word = to_word(value, &*self.logger);
        self.registers.lock().unwrap().ac = word;
    }

    fn flag_overflow(&self, magnitude_ok: bool) {
        if !magnitude_ok {
            self.registers.lock().unwrap().psw.condition_code = 3;
            self.interrupts.trigger(INT_OVERFLOW);
        }
    }

    /// Execute one decoded instruction against the current register state.
    fn execute(&self, decoded: Decoded) {
        let ea = self.effective_address(decoded);
        match decoded.opcode {
            0 => {
                // SUM
                let a = self.ac_int();
                let op = self.operand(decoded, ea);
                let result = a + op;
                self.set_ac(result);
                self.registers.lock().unwrap().update_condition_code(result);
                self.flag_overflow(result.abs() <= MAX_MAGNITUDE);
            }
            1 => {
                // RES
                let a = self.ac_int();
                let op = self.operand(decoded, ea);
                let result = a - op;
                self.set_ac(result);
                self.registers.lock().unwrap().update_condition_code(result);
                self.flag_overflow(result.abs() <= MAX_MAGNITUDE);
            }
            2 => {
                // MULT
                let a = self.ac_int();
                let op = self.operand(decoded, ea);
                let result = a.saturating_mul(op);
                self.set_ac(result);
                self.registers.lock().unwrap().update_condition_code(result);
                let round_trips = a == 0 || result / a == op;
                self.flag_overflow(round_trips && result.abs() <= MAX_MAGNITUDE);
            }
            3 => {
                // DIVI: silent 0 on division by zero, no interrupt
                let a = self.ac_int();
                let op = self.operand(decoded, ea);
                self.set_ac(if op == 0 { 0 } else { a / op });
            }
            4 => {
                // LOAD: preserves the raw word (including sentinels) on a
                // memory read, unlike MOV which normalizes through int.
                let word = if decoded.mode == AddressingMode::Immediate {
                    to_word(decoded.value, &*self.logger)
                } else {
                    self.memory.read(ea)
                };
                self.registers.lock().unwrap().ac = word;
            }
            5 => {
                // STR
                let ac = self.registers.lock().unwrap().ac.clone();
                self.memory.write(ea, ac);
            }
            6 => {
                // CMP
                let a = self.ac_int();
                let op = self.operand(decoded, ea);
                self.registers.lock().unwrap().update_condition_code(a - op);
            }
            7 => {
                // TST: bitwise AND on signed ints
                let a = self.ac_int();
                let op = self.operand(decoded, ea);
                self.registers.lock().unwrap().update_condition_code(a & op);
            }
            8 => {
                // MOV
                let op = self.operand(decoded, ea);
                self.set_ac(op);
            }
            9 => self.jump_if(ea, 0),  // JEQ
            10 => self.jump_if(ea, 2), // JGT
            11 => self.jump_if(ea, 1), // JLT
            12 => self.jump_if(ea, 3), // JOV
            13 => self.interrupts.trigger(INT_SYSCALL), // SVC
            14 => {
                // CALL: memory.write(SP, PC); SP -= 1; PC := EA
                let (sp, pc) = {
                    let regs = self.registers.lock().unwrap();
                    (to_int(&regs.sp, &*self.logger), regs.pc.clone())
                };
                self.memory.write(sp, pc);
                let mut regs = self.registers.lock().unwrap();
                regs.sp = to_word(sp - 1, &*self.logger);
                regs.set_pc(ea, &*self.logger);
            }
            15 => {
                // RET: SP += 1; PC := memory.read(SP)
                let sp = {
                    let mut regs = self.registers.lock().unwrap();
                    let sp = to_int(&regs.sp, &*self.logger) + 1;
                    regs.sp = to_word(sp, &*self.logger);
                    sp
                };
                let target = to_int(&self.memory.read(sp), &*self.logger);
                self.registers.lock().unwrap().set_pc(target, &*self.logger);
            }
            16 => {
                // LDR: AC := RB
                let mut regs = self.registers.lock().unwrap();
                regs.ac = regs.rb.clone();
            }
            17 => {
                // STRR: RB := AC
                let mut regs = self.registers.lock().unwrap();
                regs.rb = regs.ac.clone();
            }
            18 => {
                // LDRL: AC := RL
                let mut regs = self.registers.lock().unwrap();
                regs.ac = regs.rl.clone();
            }
            19 => {
                // STRL: RL := AC
                let mut regs = self.registers.lock().unwrap();
                regs.rl = regs.ac.clone();
            }
            25 => {
                // PUSH: memory.write(SP, AC); SP -= 1
                let (sp, ac) = {
                    let regs = self.registers.lock().unwrap();
                    (to_int(&regs.sp, &*self.logger), regs.ac.clone())
                };
                self.memory.write(sp, ac);
                let mut regs = self.registers.lock().unwrap();
                regs.sp = to_word(sp - 1, &*self.logger);
            }
            26 => {
                // POP: SP += 1; AC := memory.read(SP)
                let sp = {
                    let mut regs = self.registers.lock().unwrap();
                    let sp = to_int(&regs.sp, &*self.logger) + 1;
                    regs.sp = to_word(sp, &*self.logger);
                    sp
                };
                let word = self.memory.read(sp);
                self.registers.lock().unwrap().ac = word;
            }
            27 => {
                // JMP
                self.registers.lock().unwrap().set_pc(ea, &*self.logger);
            }
            28 => {
                // DMAR
                self.dma.set_memory_address(decoded.value);
                self.dma.set_io_operation(DmaOperation::Read);
                self.dma.start_transfer();
            }
            29 => {
                // DMAW
                self.dma.set_memory_address(decoded.value);
                self.dma.set_io_operation(DmaOperation::Write);
                self.dma.start_transfer();
            }
            30 => self.dma.wait_completion(), // DMAWAIT
            31 => self.set_ac(self.dma.status_code()), // DMAS
            32 => {
                // DMAC
                let v = decoded.value;
                self.dma.set_disk_location(v / 10_000, (v % 10_000) / 100, v % 100);
            }
            33 => self.dma.set_transfer_size(decoded.value), // DMAZ
            34 | 35 | 36 => {
                // IN / OUT / IOST: log only, raise completion
                self.logger.info("io opcode executed");
                self.interrupts.trigger(INT_IO_COMPLETION);
            }
            40 => *self.state.lock().unwrap() = CpuState::Halted, // HALT
            41 => {}                                              // NOP
            42 => self.registers.lock().unwrap().psw.interrupt_enabled = true, // EI
            43 => self.registers.lock().unwrap().psw.interrupt_enabled = false, // DI
            44 => self.registers.lock().unwrap().psw.operation_mode = OperationMode::User, // SWUSER
            45 => self.registers.lock().unwrap().psw.operation_mode = OperationMode::Kernel, // SWKERN
            _ => self.interrupts.trigger(INT_INVALID_INSTRUCTION), // reserved, -1, unknown
        }
    }

    fn jump_if(&self, ea: i64, wanted_cc: u8) {
        let cc = self.registers.lock().unwrap().psw.condition_code;
        if cc == wanted_cc {
            self.registers.lock().unwrap().set_pc(ea, &*self.logger);
        }
    }

    /// Run exactly one fetch/decode/execute cycle followed by the interrupt
    /// sweep, provided the CPU is `Running`. Returns the state afterward.
    pub fn cycle(&self) -> CpuState {
        if self.state() != CpuState::Running {
            return self.state();
        }
        let ir = self.fetch();
        let decoded = self.decode(&ir);
        self.execute(decoded);
        self.interrupts.handle_pending();
        self.state()
    }
}
