//! The register file: AC, MAR, MDR, IR, RB, RL, RX, SP, PC, and the PSW.

use std::sync::{Arc, Mutex};

use vm_core::Logger;
use vm_word::{to_word, Word};

/// Kernel/user privilege mode, per the PSW's `operation_mode` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationMode {
    User,
    Kernel,
}

/// The program-status word: condition code, privilege mode, interrupt
/// enable, and a clamped 10-bit mirror of PC kept for fast predicates.
///
/// Condition code 7 (set by the UNDERFLOW handler) is outside the
/// documented `{0,1,2,3}` set but is a valid marker value — see the
/// interrupt controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Psw {
    pub condition_code: u8,
    pub operation_mode: OperationMode,
    pub interrupt_enabled: bool,
    pub pc_psw: u16,
}

impl Psw {
    fn reset() -> Self {
        Self {
            condition_code: 0,
            operation_mode: OperationMode::Kernel,
            interrupt_enabled: false,
            pc_psw: 0,
        }
    }

    /// Pack the PSW into its 16-bit wire layout: bits 0-3 condition code,
    /// bit 4 mode, bit 5 interrupt-enable, bits 6-15 the PC mirror. This is
    /// for introspection only (the `registers` console command) — nothing
    /// in the ISA round-trips through it.
    #[must_use]
    pub fn pack(&self) -> u16 {
        let cc = u16::from(self.condition_code & 0x0F);
        let mode = u16::from(matches!(self.operation_mode, OperationMode::Kernel)) << 4;
        let ie = u16::from(self.interrupt_enabled) << 5;
        let pc = (self.pc_psw & 0x03FF) << 6;
        (cc | mode | ie | pc) & 0xFFFF
    }

    /// Inverse of `pack`, kept for symmetry even though the runtime never
    /// needs to reconstruct a PSW from its packed form.
    #[must_use]
    pub fn unpack(bits: u16) -> Self {
        Self {
            condition_code: (bits & 0x0F) as u8,
            operation_mode: if (bits >> 4) & 1 == 1 {
                OperationMode::Kernel
            } else {
                OperationMode::User
            },
            interrupt_enabled: (bits >> 5) & 1 == 1,
            pc_psw: (bits >> 6) & 0x03FF,
        }
    }
}

/// The CPU's register file.
pub struct RegisterFile {
    pub ac: Word,
    pub mar: Word,
    pub mdr: Word,
    pub ir: Word,
    pub rb: Word,
    pub rl: Word,
    pub rx: Word,
    pub sp: Word,
    pub pc: Word,
    pub psw: Psw,
}

/// Shared handle to the register file: memory, interrupts, the CPU, and DMA
/// all read or mutate it, so it lives behind one `Arc<Mutex<_>>` rather
/// than being copied around.
pub type SharedRegisters = Arc<Mutex<RegisterFile>>;

impl RegisterFile {
    /// Power-on reset state: all scalar registers zero except `RL=1024`
    /// and `SP=1023`; PSW starts in kernel mode with interrupts disabled.
    #[must_use]
    pub fn init() -> Self {
        Self {
            ac: Word::zero(),
            mar: Word::zero(),
            mdr: Word::zero(),
            ir: Word::zero(),
            rb: Word::zero(),
            rl: Word::from_raw("00001024"),
            rx: Word::zero(),
            sp: Word::from_raw("00001023"),
            pc: Word::zero(),
            psw: Psw::reset(),
        }
    }

    /// Build a fresh register file wrapped for sharing across subsystems.
    #[must_use]
    pub fn shared() -> SharedRegisters {
        Arc::new(Mutex::new(Self::init()))
    }

    /// Set PC, keeping `psw.pc_psw` as a clamped mirror of the new value.
    pub fn set_pc(&mut self, value: i64, logger: &dyn Logger) {
        self.pc = to_word(value, logger);
        self.psw.pc_psw = value.clamp(0, 1023) as u16;
    }

    /// Derive the condition code from a computed result: 0 if zero, 1 if
    /// negative, 2 if positive. Overflow (cc=3) is set only by callers that
    /// detect it themselves.
    pub fn update_condition_code(&mut self, result: i64) {
        self.psw.condition_code = match result.cmp(&0) {
            std::cmp::Ordering::Equal => 0,
            std::cmp::Ordering::Less => 1,
            std::cmp::Ordering::Greater => 2,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vm_core::NullLogger;

    #[test]
    fn init_matches_spec_defaults() {
        let regs = RegisterFile::init();
        assert_eq!(regs.rl.as_str(), "00001024");
        assert_eq!(regs.sp.as_str(), "00001023");
        assert_eq!(regs.psw.condition_code, 0);
        assert_eq!(regs.psw.operation_mode, OperationMode::Kernel);
        assert!(!regs.psw.interrupt_enabled);
        assert_eq!(regs.psw.pc_psw, 0);
    }

    #[test]
    fn set_pc_clamps_the_mirror() {
        let mut regs = RegisterFile::init();
        let logger = NullLogger;
        regs.set_pc(5000, &logger);
        assert_eq!(regs.psw.pc_psw, 1023);
        regs.set_pc(-5, &logger);
        assert_eq!(regs.psw.pc_psw, 0);
        regs.set_pc(512, &logger);
        assert_eq!(regs.psw.pc_psw, 512);
    }

    #[test]
    fn condition_code_tracks_sign() {
        let mut regs = RegisterFile::init();
        regs.update_condition_code(0);
        assert_eq!(regs.psw.condition_code, 0);
        regs.update_condition_code(-7);
        assert_eq!(regs.psw.condition_code, 1);
        regs.update_condition_code(7);
        assert_eq!(regs.psw.condition_code, 2);
    }

    #[test]
    fn psw_pack_unpack_round_trips() {
        let psw = Psw {
            condition_code: 3,
            operation_mode: OperationMode::User,
            interrupt_enabled: true,
            pc_psw: 777,
        };
        assert_eq!(Psw::unpack(psw.pack()), psw);
    }
}
