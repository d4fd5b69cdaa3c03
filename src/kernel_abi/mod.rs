//! Per-architecture ISA descriptors (§4.1).
//!
//! No component outside this module may contain architectural constants:
//! instruction bytes, poison words, or the `{nr, a0..a4, ret, error-flag}`
//! register mapping all live here, one submodule per backend.

pub mod x86_64;

#[cfg(feature = "arch-sparc")]
pub mod sparc;

/// One word, as the target's `ptrace` PEEKTEXT/POKETEXT primitives see it.
pub type Word = u64;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum SupportedArch {
    X86_64,
    #[cfg(feature = "arch-sparc")]
    Sparc,
}

/// Abstract slot positions every remote syscall marshals through.
/// The ISA descriptor alone knows which physical register each maps to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ArgSlot {
    A0,
    A1,
    A2,
    A3,
    A4,
}

/// The compile-time record described by §4.1: word size, trap-instruction
/// bytes, poison word, and the predicate that tells the engine whether a
/// stop happened mid-syscall.
pub trait IsaDescriptor {
    /// Size in bytes of one addressable word on this architecture.
    const WORD_SIZE: usize = 8;

    /// Size in bytes of one page; `backup_page`/`restore_page` operate on
    /// exactly this many bytes.
    const PAGE_SIZE: usize = 4096;

    /// The one-word "trap to kernel for syscall" instruction, native ABI.
    fn trap_syscall() -> Word;

    /// The alternative trap the legacy/compat ABI uses, if this ISA has one.
    fn trap_syscall_compat() -> Option<Word> {
        None
    }

    /// A conspicuous, guaranteed-illegal-or-trapping bit pattern stamped
    /// over scrubbed pages so stray execution or dereference fails loudly.
    fn poison_word() -> Word;

    /// Signed byte offset from the program counter at which to peek for
    /// the trap-syscall instruction that was just executed. On x86-64 the
    /// kernel leaves `rip` just past a 2-byte trap, so this is `-2`; on
    /// SPARC the trap is probed relative to `npc`.
    fn syscall_probe_offset() -> i64;

    /// True when the word peeked at `pc + syscall_probe_offset()` is a
    /// trap-syscall instruction (native or compat), i.e. the task was
    /// stopped right after entering or inside a kernel call.
    fn is_in_syscall(probe_word: Word) -> bool;
}
