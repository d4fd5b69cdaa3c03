//! The typed remote-syscall façade (§4.7): one wrapper per supported
//! syscall, each with a statically-fixed arity and argument mask, and
//! each bouncing any indirect buffer through the scribble zone before
//! invoking the raw engine.

use crate::error::Result;
use crate::kernel_abi::{ArgSlot, SupportedArch};
use crate::memory::{copy_from_target, copy_into_target};
use crate::remote_syscall::{remote_syscall, RemoteCall};
use crate::scribble::{
    ScribbleZone, GETSOCKOPT_OPTLEN_OFFSET, GETSOCKOPT_OPTVAL_OFFSET, IOCTL_BUF_OFFSET,
    SIGACTION_NEW_OFFSET, SIGACTION_OLD_OFFSET,
};
use crate::session::Session;

/// The kernel's `rt_sigaction` ABI struct, not libc's `sigaction`: a flat
/// handler/flags/restorer/mask layout with no architecture padding.
#[repr(C)]
#[derive(Copy, Clone, Default)]
pub struct KernelSigaction {
    pub handler: u64,
    pub flags: u64,
    pub restorer: u64,
    pub mask: u64,
}

fn as_bytes(s: &KernelSigaction) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            (s as *const KernelSigaction) as *const u8,
            std::mem::size_of::<KernelSigaction>(),
        )
    }
}

fn from_bytes(bytes: &[u8]) -> KernelSigaction {
    let mut s = KernelSigaction::default();
    let dst = unsafe {
        std::slice::from_raw_parts_mut(
            (&mut s as *mut KernelSigaction) as *mut u8,
            std::mem::size_of::<KernelSigaction>(),
        )
    };
    dst.copy_from_slice(bytes);
    s
}

fn kernel_error(result: Result<u64>) -> Result<i64> {
    result.map(|v| v as i64)
}

/// `lseek(fd, offset, whence)`.
pub fn lseek(session: &mut Session, zone: &ScribbleZone, fd: i32, offset: i64, whence: i32) -> Result<i64> {
    let call = RemoteCall::new(libc::SYS_lseek, "lseek")
        .with_arg(ArgSlot::A0, fd as u64)
        .with_arg(ArgSlot::A1, offset as u64)
        .with_arg(ArgSlot::A2, whence as u64);
    kernel_error(remote_syscall(session, zone, &call))
}

/// `fcntl(fd, cmd, arg)`. `arg` is forwarded verbatim; callers that need
/// `F_SETLK`-style indirect structures must bounce them themselves via
/// `copy_into_target` before calling this wrapper.
pub fn fcntl(session: &mut Session, zone: &ScribbleZone, fd: i32, cmd: i32, arg: u64) -> Result<i64> {
    let call = RemoteCall::new(libc::SYS_fcntl, "fcntl")
        .with_arg(ArgSlot::A0, fd as u64)
        .with_arg(ArgSlot::A1, cmd as u64)
        .with_arg(ArgSlot::A2, arg);
    kernel_error(remote_syscall(session, zone, &call))
}

/// `mprotect(addr, len, prot)`.
pub fn mprotect(session: &mut Session, zone: &ScribbleZone, addr: u64, len: u64, prot: i32) -> Result<i64> {
    let call = RemoteCall::new(libc::SYS_mprotect, "mprotect")
        .with_arg(ArgSlot::A0, addr)
        .with_arg(ArgSlot::A1, len)
        .with_arg(ArgSlot::A2, prot as u64);
    kernel_error(remote_syscall(session, zone, &call))
}

/// `rt_sigaction(signum, new, old, sigsetsize)`. Both the new and old
/// `k_sigaction` structures are bounced through disjoint sub-regions of
/// the scribble zone, since the kernel reads/writes them through the
/// target's own address space rather than ours.
///
/// The two backends disagree on arity: x86-64's kernel `rt_sigaction`
/// takes four arguments (`sig, new, old, sigsetsize`), but SPARC's takes
/// five (`sig, new, old, restorer, sigsetsize` -- an extra `restorer`
/// slot ahead of `sigsetsize`, per `__rsyscall5` in `original_source/`'s
/// SPARC backend, which always passes `restorer = NULL`). Installing
/// `sigsetsize` into the wrong slot on SPARC would silently corrupt the
/// call, so this wrapper branches on architecture rather than assuming
/// x86-64's layout everywhere.
pub fn rt_sigaction(
    session: &mut Session,
    zone: &ScribbleZone,
    signum: i32,
    new: Option<&KernelSigaction>,
    want_old: bool,
    sigsetsize: u64,
) -> Result<Option<KernelSigaction>> {
    let new_addr = zone.offset(SIGACTION_NEW_OFFSET);
    let old_addr = zone.offset(SIGACTION_OLD_OFFSET);

    let mut call = RemoteCall::new(libc::SYS_rt_sigaction, "rt_sigaction")
        .with_arg(ArgSlot::A0, signum as u64);

    match session.arch() {
        SupportedArch::X86_64 => {
            call = call.with_arg(ArgSlot::A3, sigsetsize);
        }
        #[cfg(feature = "arch-sparc")]
        SupportedArch::Sparc => {
            call = call.with_arg(ArgSlot::A3, 0).with_arg(ArgSlot::A4, sigsetsize);
        }
    }

    if let Some(new) = new {
        copy_into_target(session, new_addr, as_bytes(new))
            .map_err(|partial| partial.error)?;
        call = call.with_arg(ArgSlot::A1, new_addr);
    }
    if want_old {
        call = call.with_arg(ArgSlot::A2, old_addr);
    }

    kernel_error(remote_syscall(session, zone, &call))?;

    if want_old {
        let mut buf = [0u8; std::mem::size_of::<KernelSigaction>()];
        copy_from_target(session, &mut buf, old_addr).map_err(|partial| partial.error)?;
        Ok(Some(from_bytes(&buf)))
    } else {
        Ok(None)
    }
}

/// `ioctl(fd, request, argp)`. `buf` is bounced through the scribble zone
/// round-trip: written before the call (for requests the kernel reads
/// from), and the updated contents are copied back after.
pub fn ioctl(
    session: &mut Session,
    zone: &ScribbleZone,
    fd: i32,
    request: u64,
    buf: &mut [u8],
) -> Result<i64> {
    let buf_addr = zone.offset(IOCTL_BUF_OFFSET);
    copy_into_target(session, buf_addr, buf).map_err(|partial| partial.error)?;

    let call = RemoteCall::new(libc::SYS_ioctl, "ioctl")
        .with_arg(ArgSlot::A0, fd as u64)
        .with_arg(ArgSlot::A1, request)
        .with_arg(ArgSlot::A2, buf_addr);
    let ret = kernel_error(remote_syscall(session, zone, &call))?;

    copy_from_target(session, buf, buf_addr).map_err(|partial| partial.error)?;
    Ok(ret)
}

/// `getsockopt(sockfd, level, optname, optval, optlen)`. `optval` and
/// `optlen` are both bounced: `optlen` is an in/out word and `optval` is
/// an out-buffer of the caller-supplied capacity.
pub fn getsockopt(
    session: &mut Session,
    zone: &ScribbleZone,
    sockfd: i32,
    level: i32,
    optname: i32,
    optval: &mut [u8],
) -> Result<i64> {
    let optval_addr = zone.offset(GETSOCKOPT_OPTVAL_OFFSET);
    let optlen_addr = zone.offset(GETSOCKOPT_OPTLEN_OFFSET);

    let optlen = optval.len() as u64;
    copy_into_target(session, optlen_addr, &optlen.to_ne_bytes()).map_err(|partial| partial.error)?;

    let call = RemoteCall::new(libc::SYS_getsockopt, "getsockopt")
        .with_arg(ArgSlot::A0, sockfd as u64)
        .with_arg(ArgSlot::A1, level as u64)
        .with_arg(ArgSlot::A2, optname as u64)
        .with_arg(ArgSlot::A3, optval_addr)
        .with_arg(ArgSlot::A4, optlen_addr);
    let ret = kernel_error(remote_syscall(session, zone, &call))?;

    let mut optlen_bytes = [0u8; 8];
    copy_from_target(session, &mut optlen_bytes, optlen_addr).map_err(|partial| partial.error)?;
    let written = u64::from_ne_bytes(optlen_bytes).min(optval.len() as u64) as usize;
    copy_from_target(session, &mut optval[..written], optval_addr).map_err(|partial| partial.error)?;

    Ok(ret)
}
