//! The ptrace session (§4.2): the exclusive supervisory relationship held
//! over a target between `attach` and `detach`.

use std::ffi::c_void;
use std::fs;

use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid;

use crate::error::{Error, Result};
use crate::kernel_abi::x86_64::{X86_64Regs, X86_64};
#[cfg(feature = "arch-sparc")]
use crate::kernel_abi::sparc::{Sparc, SparcRegs};
use crate::kernel_abi::{IsaDescriptor, SupportedArch};
use crate::log::LogLevel::LogWarn;
use crate::registers::Registers;

/// How `step_once` advances the target by exactly one trap-syscall.
#[derive(Copy, Clone, Eq, PartialEq)]
enum StepMode {
    /// `PTRACE_SINGLESTEP` gives us a genuine one-instruction advance.
    SingleStep,
    /// No per-instruction stepping on this ISA (SPARC): substitute a
    /// syscall-entry/syscall-exit `PTRACE_SYSCALL` pair. One logical
    /// `step_once()` is two underlying stops.
    SyscallStepPair,
}

/// The exclusive supervisory relationship over `pid` (§3's `Session`
/// entity). `was_stopped` records whether the target was already
/// trace-stopped before we attached, so the post-attach wait can be
/// skipped (waiting would block forever) and so the orchestrator can
/// hand that fact on to the register-chunk fetcher.
pub struct Session {
    pid: Pid,
    arch: SupportedArch,
    was_stopped: bool,
    step_mode: StepMode,
    detached: bool,
}

impl Session {
    pub fn attach(pid: Pid, arch: SupportedArch) -> Result<Session> {
        let was_stopped = process_is_stopped(pid);

        let ret = unsafe { libc::ptrace(libc::PTRACE_ATTACH, pid.as_raw(), 0, 0) };
        if ret == -1 {
            return Err(Error::AttachFailed);
        }

        if !was_stopped {
            match waitpid(pid, None) {
                Ok(WaitStatus::Stopped(_, _)) => {}
                Ok(other) => {
                    log!(
                        LogWarn,
                        "attach({}) expected a stop notification, got {:?}",
                        pid,
                        other
                    );
                    return Err(Error::WaitFailed);
                }
                Err(_) => return Err(Error::WaitFailed),
            }
        }

        let step_mode = match arch {
            SupportedArch::X86_64 => StepMode::SingleStep,
            #[cfg(feature = "arch-sparc")]
            SupportedArch::Sparc => StepMode::SyscallStepPair,
        };

        Ok(Session {
            pid,
            arch,
            was_stopped,
            step_mode,
            detached: false,
        })
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn arch(&self) -> SupportedArch {
        self.arch
    }

    /// Whether the target was already trace-stopped (e.g. by an external
    /// `SIGSTOP`) before this session attached.
    pub fn was_stopped_before_attach(&self) -> bool {
        self.was_stopped
    }

    pub fn detach(mut self) -> Result<()> {
        self.detach_impl()
    }

    fn detach_impl(&mut self) -> Result<()> {
        if self.detached {
            return Ok(());
        }
        self.detached = true;
        let ret = unsafe { libc::ptrace(libc::PTRACE_DETACH, self.pid.as_raw(), 0, 0) };
        if ret == -1 {
            Err(Error::DetachFailed)
        } else {
            Ok(())
        }
    }

    /// Word-granular read of the target's text/data. `addr` must already
    /// be word-aligned; this primitive does no fix-up.
    pub fn peek_word(&self, addr: u64) -> Result<u64> {
        raw_peek(self.pid, addr).ok_or(Error::PeekFailed)
    }

    /// Word-granular write into the target's text/data.
    pub fn poke_word(&self, addr: u64, word: u64) -> Result<()> {
        let ret = unsafe {
            libc::ptrace(
                libc::PTRACE_POKETEXT,
                self.pid.as_raw(),
                addr as *mut c_void,
                word as *mut c_void,
            )
        };
        if ret == -1 {
            Err(Error::PokeFailed)
        } else {
            Ok(())
        }
    }

    pub fn get_regs(&self) -> Result<Registers> {
        let mut regs = self.blank_regs();
        let ret = unsafe {
            libc::ptrace(
                libc::PTRACE_GETREGS,
                self.pid.as_raw(),
                0,
                regs.as_bytes_mut().as_mut_ptr() as *mut c_void,
            )
        };
        if ret == -1 {
            Err(Error::GetRegsFailed)
        } else {
            Ok(regs)
        }
    }

    pub fn set_regs(&self, regs: &Registers) -> Result<()> {
        let ret = unsafe {
            libc::ptrace(
                libc::PTRACE_SETREGS,
                self.pid.as_raw(),
                0,
                regs.as_bytes().as_ptr() as *mut c_void,
            )
        };
        if ret == -1 {
            Err(Error::SetRegsFailed)
        } else {
            Ok(())
        }
    }

    fn blank_regs(&self) -> Registers {
        match self.arch {
            SupportedArch::X86_64 => Registers::X86_64(X86_64Regs::default()),
            #[cfg(feature = "arch-sparc")]
            SupportedArch::Sparc => Registers::Sparc(SparcRegs::default()),
        }
    }

    /// Advance the target across exactly one trap-syscall and block until
    /// the resulting stop. Returns the stop signal. On ISAs without
    /// per-instruction stepping this is a syscall-entry/syscall-exit pair
    /// (§4.2); the caller (the remote-syscall engine) observes the target
    /// only after both halves have completed, so the return value is
    /// materialized by the time this returns.
    pub fn step_once(&mut self) -> Result<Signal> {
        match self.step_mode {
            StepMode::SingleStep => self.ptrace_resume_and_wait(libc::PTRACE_SINGLESTEP),
            StepMode::SyscallStepPair => {
                self.ptrace_resume_and_wait(libc::PTRACE_SYSCALL)?;
                self.ptrace_resume_and_wait(libc::PTRACE_SYSCALL)
            }
        }
    }

    fn ptrace_resume_and_wait(&mut self, request: libc::c_int) -> Result<Signal> {
        let ret = unsafe { libc::ptrace(request, self.pid.as_raw(), 0, 0) };
        if ret == -1 {
            return Err(Error::StepFailed);
        }
        match waitpid(self.pid, None) {
            Ok(WaitStatus::Stopped(_, sig)) => Ok(sig),
            Ok(_) => Err(Error::WaitFailed),
            Err(_) => Err(Error::WaitFailed),
        }
    }

    /// §6's `is_in_syscall(regs)`: true if `regs` reflects a stop right
    /// after entering or inside a kernel call.
    pub fn is_in_syscall(&self, regs: &Registers) -> Result<bool> {
        let probe_offset = match self.arch {
            SupportedArch::X86_64 => X86_64::syscall_probe_offset(),
            #[cfg(feature = "arch-sparc")]
            SupportedArch::Sparc => Sparc::syscall_probe_offset(),
        };
        let probe_addr = (regs.program_counter() as i64 + probe_offset) as u64;
        let word = raw_peek(self.pid, probe_addr).ok_or(Error::PeekFailed)?;
        Ok(match self.arch {
            SupportedArch::X86_64 => X86_64::is_in_syscall(word),
            #[cfg(feature = "arch-sparc")]
            SupportedArch::Sparc => Sparc::is_in_syscall(word),
        })
    }

    /// §6's `set_syscall_return(regs, val)`.
    pub fn set_syscall_return(&self, regs: &mut Registers, val: u64) {
        match regs {
            Registers::X86_64(r) => r.rax = val,
            #[cfg(feature = "arch-sparc")]
            Registers::Sparc(r) => r.r_o0 = val,
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.detached {
            if let Err(e) = self.detach_impl() {
                log!(LogWarn, "detach on drop for pid {} failed: {}", self.pid, e);
            }
        }
    }
}

/// `PTRACE_PEEKTEXT` signals failure only through `errno`, and a
/// legitimate return value of `-1` is indistinguishable from it on the
/// wire — so we clear `errno` first and check it, not the return value.
fn raw_peek(pid: Pid, addr: u64) -> Option<u64> {
    nix::errno::Errno::clear();
    let ret = unsafe { libc::ptrace(libc::PTRACE_PEEKTEXT, pid.as_raw(), addr as *mut c_void, 0) };
    if nix::errno::Errno::last() as i32 != 0 {
        None
    } else {
        Some(ret as u64)
    }
}

/// Probes `/proc/<pid>/stat`'s third whitespace-delimited field; `T`
/// means the target is already trace-stopped.
fn process_is_stopped(pid: Pid) -> bool {
    let path = format!("/proc/{}/stat", pid.as_raw());
    let contents = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(_) => return false,
    };
    // The second field is "(comm)" and may itself contain spaces/parens,
    // so split after the last ')' rather than naively splitting on
    // whitespace from the start.
    match contents.rfind(')') {
        Some(idx) => contents[idx + 1..]
            .split_whitespace()
            .next()
            .map(|state| state == "T")
            .unwrap_or(false),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_is_stopped_parses_stat_state_field() {
        // A synthetic /proc/<pid>/stat line, comm containing a paren to
        // make sure the rfind(')') split is exercised correctly.
        let line = "1234 (my) prog) T 1 1234 1234 0 -1 4194304";
        let after_comm = &line[line.rfind(')').unwrap() + 1..];
        let state = after_comm.split_whitespace().next().unwrap();
        assert_eq!(state, "T");
    }
}
