//! SPARC ISA descriptor: trap-based syscalls (`ta 0x10`) and the windowed
//! output-register argument convention. Enabled by the `arch-sparc`
//! feature; `libc` doesn't give us a SPARC `user_regs_struct`, so we
//! define the kernel's `struct regs` layout ourselves.

use super::{ArgSlot, IsaDescriptor, Word};

/// Carry bit in `%psr`; set on syscall error, with the error number left
/// in `%o0` instead of a negated return value (the x86-64 convention).
pub const PSR_C: u64 = 1 << 5;

/// Mirrors `struct regs` from `<asm/ptrace.h>` on 32-bit SPARC, widened to
/// `u64` fields for uniformity with the rest of this crate; only the
/// fields the remote-syscall engine touches are kept.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SparcRegs {
    pub r_psr: u64,
    pub r_pc: u64,
    pub r_npc: u64,
    pub r_y: u64,
    pub r_g1: u64,
    pub r_g2: u64,
    pub r_g3: u64,
    pub r_g4: u64,
    pub r_g5: u64,
    pub r_g6: u64,
    pub r_g7: u64,
    pub r_o0: u64,
    pub r_o1: u64,
    pub r_o2: u64,
    pub r_o3: u64,
    pub r_o4: u64,
    pub r_o5: u64,
    pub r_o6: u64,
    pub r_o7: u64,
}

/// `ta 0x10` ("trap always, syscall"), the SPARC syscall trap instruction.
const TRAP_SYSCALL: Word = 0x91d0_2010;
/// All-ones is a reserved/illegal SPARC opcode: executing it raises an
/// illegal_instruction trap, and it's not a plausible data value either.
const POISON: Word = 0xffff_ffff_ffff_ffff;

pub struct Sparc;

impl Sparc {
    pub fn arg_register<'a>(regs: &'a mut SparcRegs, slot: ArgSlot) -> &'a mut u64 {
        match slot {
            ArgSlot::A0 => &mut regs.r_o0,
            ArgSlot::A1 => &mut regs.r_o1,
            ArgSlot::A2 => &mut regs.r_o2,
            ArgSlot::A3 => &mut regs.r_o3,
            ArgSlot::A4 => &mut regs.r_o4,
        }
    }
}

impl IsaDescriptor for Sparc {
    fn trap_syscall() -> Word {
        TRAP_SYSCALL
    }

    fn poison_word() -> Word {
        POISON
    }

    fn syscall_probe_offset() -> i64 {
        -4
    }

    fn is_in_syscall(probe_word: Word) -> bool {
        (probe_word as u32) == TRAP_SYSCALL as u32
    }
}
