//! The remote syscall engine (§4.6): executes one system call inside the
//! target and returns its kernel result, restoring target text and
//! registers regardless of outcome. This is the heart of the injector.

use nix::sys::signal::Signal;

use crate::error::{Error, Result};
use crate::kernel_abi::{ArgSlot, IsaDescriptor, SupportedArch};
use crate::log::log_syscall_error;
use crate::registers::Registers;
use crate::scribble::ScribbleZone;
use crate::session::Session;

/// Up to five arguments, each only installed into its register if the
/// caller actually declared it (§3's `RemoteCall`, §4.6 step 5: zeroed
/// slots can legitimately mean "don't care", so presence is tracked
/// explicitly rather than inferred from the value being non-zero).
#[derive(Clone)]
pub struct RemoteCall {
    pub nr: i64,
    pub name: &'static str,
    args: [Option<u64>; 5],
    /// Request the legacy/compat trap instruction instead of the native
    /// one, where the ISA has one (x86-64's `int 0x80`).
    pub use_compat_trap: bool,
}

impl RemoteCall {
    pub fn new(nr: i64, name: &'static str) -> RemoteCall {
        RemoteCall {
            nr,
            name,
            args: [None; 5],
            use_compat_trap: false,
        }
    }

    pub fn with_arg(mut self, slot: ArgSlot, value: u64) -> RemoteCall {
        self.args[slot_index(slot)] = Some(value);
        self
    }

    fn set_args(&self) -> impl Iterator<Item = (ArgSlot, u64)> + '_ {
        [ArgSlot::A0, ArgSlot::A1, ArgSlot::A2, ArgSlot::A3, ArgSlot::A4]
            .into_iter()
            .filter_map(move |slot| self.args[slot_index(slot)].map(|v| (slot, v)))
    }
}

fn slot_index(slot: ArgSlot) -> usize {
    match slot {
        ArgSlot::A0 => 0,
        ArgSlot::A1 => 1,
        ArgSlot::A2 => 2,
        ArgSlot::A3 => 3,
        ArgSlot::A4 => 4,
    }
}

fn trap_word(arch: SupportedArch, compat: bool) -> Result<u64> {
    match arch {
        SupportedArch::X86_64 => {
            use crate::kernel_abi::x86_64::X86_64;
            if compat {
                X86_64::trap_syscall_compat().ok_or(Error::RemoteSyscallFailed)
            } else {
                Ok(X86_64::trap_syscall())
            }
        }
        #[cfg(feature = "arch-sparc")]
        SupportedArch::Sparc => {
            use crate::kernel_abi::sparc::Sparc;
            Ok(Sparc::trap_syscall())
        }
    }
}

/// Executes `call` inside the target, following the eight-step protocol
/// of §4.6 exactly — no step is optional and no reordering is permitted.
pub fn remote_syscall(
    session: &mut Session,
    zone: &ScribbleZone,
    call: &RemoteCall,
) -> Result<u64> {
    // 1. Snapshot original registers.
    let r0 = session.get_regs()?;

    // 2. Landing address: a fixed offset into the zone so we never
    //    overwrite its first word, which callers may use for data.
    let landing = zone.landing_address();

    // 3. Snapshot the original word at the landing address.
    let old_insn = session.peek_word(landing)?;

    // 4. Write the ISA's trap-syscall instruction word.
    let trap = trap_word(session.arch(), call.use_compat_trap)?;
    session.poke_word(landing, trap)?;

    // Steps 5-7 happen inside a closure so step 8's teardown always runs,
    // on every return path, including an early failure.
    let outcome = run_one_syscall(session, &r0, landing, call);

    // 8. Restore registers, then the landing word -- unconditionally,
    // even if `outcome` already observed a failure.
    let regs_restored = session.set_regs(&r0);
    let insn_restored = session.poke_word(landing, old_insn);
    regs_restored?;
    insn_restored?;

    outcome
}

fn run_one_syscall(
    session: &mut Session,
    r0: &Registers,
    landing: u64,
    call: &RemoteCall,
) -> Result<u64> {
    // 5. Install nr + masked args, set pc, commit.
    let mut r1 = *r0;
    r1.set_syscallno(call.nr);
    for (slot, value) in call.set_args() {
        r1.set_arg(slot, value);
    }
    r1.set_program_counter(landing);
    session.set_regs(&r1)?;

    // 6. Advance across exactly one trap-syscall. A non-TRAP stop is
    //    treated as a spurious interruption: take a diagnostic snapshot,
    //    re-commit R1, and retry once. A second failure is fatal.
    let sig = session.step_once()?;
    if sig != Signal::SIGTRAP {
        if let Ok(diagnostic) = session.get_regs() {
            log!(
                crate::log::LogLevel::LogDebug,
                "{}: non-TRAP stop ({:?}) mid-call, pc={:#x} retrying once",
                call.name,
                sig,
                diagnostic.program_counter()
            );
        }
        session.set_regs(&r1)?;
        let sig2 = session.step_once()?;
        if sig2 != Signal::SIGTRAP {
            return Err(Error::RemoteSyscallFailed);
        }
    }

    // 7. Read post-call registers and translate the result.
    let r2 = session.get_regs()?;
    translate_result(session, call.name, &r2)
}

/// On ISAs that encode errors as negative return values in
/// `[-4096, -1]`, any such value becomes `KernelSyscallError`. On ISAs
/// with an explicit error-flag bit, that bit is authoritative instead.
fn translate_result(session: &Session, syscall_name: &str, regs: &Registers) -> Result<u64> {
    if let Some(is_error) = regs.error_flag() {
        if is_error {
            let errno = regs.syscall_result_raw() as i32;
            log_syscall_error(session.pid().as_raw(), syscall_name, errno);
            return Err(Error::KernelSyscallError { errno });
        }
        return Ok(regs.syscall_result_raw());
    }

    let raw = regs.syscall_result_raw() as i64;
    if (-4096..0).contains(&raw) {
        let errno = -raw as i32;
        log_syscall_error(session.pid().as_raw(), syscall_name, errno);
        return Err(Error::KernelSyscallError { errno });
    }
    Ok(regs.syscall_result_raw())
}
