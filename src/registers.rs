//! The opaque, cheap-to-clone register file (§3's `Regs` entity). Callers
//! outside this crate only ever see a `Registers` value and the accessors
//! below; the per-architecture layout is private to `kernel_abi`.

use crate::kernel_abi::x86_64::X86_64Regs;
#[cfg(feature = "arch-sparc")]
use crate::kernel_abi::sparc::SparcRegs;
use crate::kernel_abi::{ArgSlot, SupportedArch};

#[derive(Copy, Clone)]
pub enum Registers {
    X86_64(X86_64Regs),
    #[cfg(feature = "arch-sparc")]
    Sparc(SparcRegs),
}

impl Registers {
    pub fn arch(&self) -> SupportedArch {
        match self {
            Registers::X86_64(_) => SupportedArch::X86_64,
            #[cfg(feature = "arch-sparc")]
            Registers::Sparc(_) => SupportedArch::Sparc,
        }
    }

    /// Raw byte view used by `Session::get_regs`/`set_regs`, which move
    /// whole register frames in and out of the kernel via `PTRACE_GETREGS`/
    /// `PTRACE_SETREGS` without knowing their internal shape.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Registers::X86_64(r) => unsafe { struct_as_bytes(r) },
            #[cfg(feature = "arch-sparc")]
            Registers::Sparc(r) => unsafe { struct_as_bytes(r) },
        }
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        match self {
            Registers::X86_64(r) => unsafe { struct_as_bytes_mut(r) },
            #[cfg(feature = "arch-sparc")]
            Registers::Sparc(r) => unsafe { struct_as_bytes_mut(r) },
        }
    }

    pub fn program_counter(&self) -> u64 {
        match self {
            Registers::X86_64(r) => r.rip,
            #[cfg(feature = "arch-sparc")]
            Registers::Sparc(r) => r.r_npc,
        }
    }

    pub fn set_program_counter(&mut self, pc: u64) {
        match self {
            Registers::X86_64(r) => r.rip = pc,
            #[cfg(feature = "arch-sparc")]
            Registers::Sparc(r) => {
                r.r_pc = pc;
                r.r_npc = pc;
            }
        }
    }

    pub fn set_syscallno(&mut self, nr: i64) {
        match self {
            Registers::X86_64(r) => r.rax = nr as u64,
            #[cfg(feature = "arch-sparc")]
            Registers::Sparc(r) => r.r_g1 = nr as u64,
        }
    }

    pub fn set_arg(&mut self, slot: ArgSlot, value: u64) {
        match self {
            Registers::X86_64(r) => {
                *crate::kernel_abi::x86_64::X86_64::arg_register(r, slot) = value
            }
            #[cfg(feature = "arch-sparc")]
            Registers::Sparc(r) => *crate::kernel_abi::sparc::Sparc::arg_register(r, slot) = value,
        }
    }

    /// The raw syscall-result register, before error-convention translation.
    pub fn syscall_result_raw(&self) -> u64 {
        match self {
            Registers::X86_64(r) => r.rax,
            #[cfg(feature = "arch-sparc")]
            Registers::Sparc(r) => r.r_o0,
        }
    }

    /// Some ISAs (SPARC) flag a syscall error via a dedicated carry bit
    /// rather than a negative return value. `None` means "consult the
    /// negative-return-value convention instead" (§4.6 result translation).
    pub fn error_flag(&self) -> Option<bool> {
        match self {
            Registers::X86_64(_) => None,
            #[cfg(feature = "arch-sparc")]
            Registers::Sparc(r) => Some(r.r_psr & crate::kernel_abi::sparc::PSR_C != 0),
        }
    }
}

unsafe fn struct_as_bytes<T: Sized>(v: &T) -> &[u8] {
    std::slice::from_raw_parts((v as *const T) as *const u8, std::mem::size_of::<T>())
}

unsafe fn struct_as_bytes_mut<T: Sized>(v: &mut T) -> &mut [u8] {
    std::slice::from_raw_parts_mut((v as *mut T) as *mut u8, std::mem::size_of::<T>())
}
