//! A deliberately small stand-in for the `log!`/`LogLevel` machinery the
//! teacher's `replay_syscall.rs` and `thread_group.rs` call into but don't
//! define in this retrieval: everything in this crate that wants a
//! diagnostic line goes through `log!(LogLevel::LogWarn, "...", args...)`.

use std::fmt;

#[derive(Copy, Clone, Eq, PartialEq)]
pub enum LogLevel {
    LogDebug,
    LogWarn,
    LogError,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::LogDebug => write!(f, "DEBUG"),
            LogLevel::LogWarn => write!(f, "WARN"),
            LogLevel::LogError => write!(f, "ERROR"),
        }
    }
}

#[macro_export]
macro_rules! log {
    ($level:expr, $($arg:tt)+) => {
        eprintln!("[{}] {}", $level, format!($($arg)+))
    };
}

/// Used by the engine and façade for the "diagnostic messages ... with
/// the failing operation and, where applicable, the target PID, syscall
/// name, and `errno` symbol" requirement of the error handling design.
pub fn log_syscall_error(pid: libc::pid_t, syscall_name: &str, errno: i32) {
    log!(
        LogLevel::LogError,
        "[{}] {}: {}",
        pid,
        syscall_name,
        errno_name(errno)
    );
}

fn errno_name(errno: i32) -> String {
    // `nix::errno::Errno` gives us the symbolic name (e.g. "ENOMEM")
    // without us hand-maintaining a table.
    format!("{:?}", nix::errno::from_i32(errno))
}
