use std::fmt;

/// The error taxonomy for every primitive in this crate.
///
/// `KernelSyscallError` is the odd one out: it is not a sign that the
/// core malfunctioned, it is the expected result channel for a remote
/// syscall that the kernel itself refused. Every other variant means a
/// ptrace primitive failed and the caller should treat the capture as
/// unrecoverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    AttachFailed,
    DetachFailed,
    PeekFailed,
    PokeFailed,
    GetRegsFailed,
    SetRegsFailed,
    StepFailed,
    WaitFailed,
    NoScribbleZone,
    RemoteSyscallFailed,
    KernelSyscallError { errno: i32 },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AttachFailed => write!(f, "ptrace attach failed"),
            Error::DetachFailed => write!(f, "ptrace detach failed"),
            Error::PeekFailed => write!(f, "ptrace peek failed"),
            Error::PokeFailed => write!(f, "ptrace poke failed"),
            Error::GetRegsFailed => write!(f, "ptrace getregs failed"),
            Error::SetRegsFailed => write!(f, "ptrace setregs failed"),
            Error::StepFailed => write!(f, "ptrace step failed"),
            Error::WaitFailed => write!(f, "waitpid failed"),
            Error::NoScribbleZone => write!(f, "no scribble zone has been published"),
            Error::RemoteSyscallFailed => write!(f, "remote syscall protocol failed"),
            Error::KernelSyscallError { errno } => {
                write!(f, "kernel syscall error: errno {}", errno)
            }
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
