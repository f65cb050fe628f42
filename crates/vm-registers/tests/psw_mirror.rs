//! Property-based check of the PSW mirror invariant from the spec:
//! after any write to PC, `psw.pc_psw == clamp(pc, 0, 1023)`.

use proptest::prelude::*;
use vm_core::NullLogger;
use vm_registers::RegisterFile;

proptest! {
    #[test]
    fn pc_psw_mirrors_clamped_pc(pc in -10_000_000i64..10_000_000i64) {
        let mut regs = RegisterFile::init();
        let logger = NullLogger;
        regs.set_pc(pc, &logger);
        prop_assert_eq!(i64::from(regs.psw.pc_psw), pc.clamp(0, 1023));
    }
}
