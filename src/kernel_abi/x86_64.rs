//! x86-64 ISA descriptor: `syscall`/`int 0x80` trap convention, System V
//! register slots.

use super::{ArgSlot, IsaDescriptor, Word};

/// `struct user_regs_struct` from `<linux/user.h>`, field order and all —
/// this is the exact byte layout the kernel fills in for
/// `PTRACE_GETREGS`/`PTRACE_SETREGS` on x86-64.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct X86_64Regs {
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub rbp: u64,
    pub rbx: u64,
    pub r11: u64,
    pub r10: u64,
    pub r9: u64,
    pub r8: u64,
    pub rax: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub rsi: u64,
    pub rdi: u64,
    pub orig_rax: u64,
    pub rip: u64,
    pub cs: u64,
    pub eflags: u64,
    pub rsp: u64,
    pub ss: u64,
    pub fs_base: u64,
    pub gs_base: u64,
    pub ds: u64,
    pub es: u64,
    pub fs: u64,
    pub gs: u64,
}

/// `syscall` (`0f 05`), the native 64-bit ABI trap.
const TRAP_SYSCALL: Word = 0x0000_0000_0000_050f;
/// `int 0x80` (`cd 80`), the 32-bit compat ABI trap.
const TRAP_INT80: Word = 0x0000_0000_0000_80cd;
/// `int3` (`cc`) repeated to fill a word: executing it anywhere faults
/// with `SIGTRAP` immediately, and it doesn't decode as anything else.
const POISON: Word = 0xcccc_cccc_cccc_cccc;

pub struct X86_64;

impl X86_64 {
    pub fn arg_register<'a>(regs: &'a mut X86_64Regs, slot: ArgSlot) -> &'a mut u64 {
        match slot {
            ArgSlot::A0 => &mut regs.rdi,
            ArgSlot::A1 => &mut regs.rsi,
            ArgSlot::A2 => &mut regs.rdx,
            ArgSlot::A3 => &mut regs.r10,
            ArgSlot::A4 => &mut regs.r8,
        }
    }
}

impl IsaDescriptor for X86_64 {
    fn trap_syscall() -> Word {
        TRAP_SYSCALL
    }

    fn trap_syscall_compat() -> Option<Word> {
        Some(TRAP_INT80)
    }

    fn poison_word() -> Word {
        POISON
    }

    fn syscall_probe_offset() -> i64 {
        -2
    }

    fn is_in_syscall(probe_word: Word) -> bool {
        let low16 = probe_word & 0xffff;
        low16 == (TRAP_SYSCALL & 0xffff) || low16 == (TRAP_INT80 & 0xffff)
    }
}

#[cfg(feature = "verify_syscall_numbers")]
mod syscall_number_checks {
    static_assertions::const_assert_eq!(libc::SYS_lseek as i64, 8);
    static_assertions::const_assert_eq!(libc::SYS_fcntl as i64, 72);
    static_assertions::const_assert_eq!(libc::SYS_mprotect as i64, 10);
    static_assertions::const_assert_eq!(libc::SYS_rt_sigaction as i64, 13);
    static_assertions::const_assert_eq!(libc::SYS_ioctl as i64, 16);
    static_assertions::const_assert_eq!(libc::SYS_getsockopt as i64, 55);
}
