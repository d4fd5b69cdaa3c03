//! Core of a process-checkpointing tool: attaches to a running target via
//! `ptrace`, bridges memory and registers, and forces the target to
//! execute arbitrary system calls on the caller's behalf. Everything
//! outside this crate — VMA/fd/signal-handler enumeration, image
//! serialization, the CLI, the restore-side runtime — is an external
//! collaborator invoked through the traits and primitives exported here.

#[macro_use]
pub mod log;

pub mod error;
pub mod kernel_abi;
pub mod memory;
pub mod orchestrator;
pub mod page_backup;
pub mod registers;
pub mod remote_syscall;
pub mod scribble;
pub mod session;
pub mod syscalls;

pub use error::{Error, Result};
pub use kernel_abi::SupportedArch;
pub use memory::{copy_from_target, copy_into_target, PartialCopy};
pub use orchestrator::{capture, CaptureFlags, CaptureResult, ChunkFetcher, ChunkList, FetchContext, VmaFetcher};
pub use page_backup::{backup_page, restore_page, PageBackup};
pub use registers::Registers;
pub use remote_syscall::{remote_syscall, RemoteCall};
pub use scribble::ScribbleZone;
pub use session::Session;
