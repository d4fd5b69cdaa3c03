//! End-to-end scenarios against a real, forked tracee (§8). ptrace is
//! Linux-only and these need CAP_SYS_PTRACE or same-uid privilege over
//! the child, same as every other ptrace-based tool in the corpus.

#![cfg(target_os = "linux")]

use std::os::unix::io::AsRawFd;
use std::thread;
use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::sys::wait::waitpid;
use nix::unistd::{fork, ForkResult, Pid};

use checkpoint_core::kernel_abi::SupportedArch;
use checkpoint_core::orchestrator::{capture, CaptureFlags, ChunkFetcher, ChunkList, FetchContext, VmaFetcher};
use checkpoint_core::scribble::ScribbleZone;
use checkpoint_core::session::Session;
use checkpoint_core::{syscalls, Error};

/// A page-aligned address inside this test binary's own text segment.
/// Immediately after `fork` (no `exec`), the child's address space is
/// still a copy of ours, so writing through `ptrace` here lands on real
/// executable memory in the child -- the same trick a breakpoint-setting
/// debugger relies on (the kernel breaks the underlying COW page rather
/// than touching the file-backed mapping other processes share).
#[inline(never)]
extern "C" fn scribble_anchor() {
    std::convert::identity(());
}

fn scribble_zone_address() -> u64 {
    (scribble_anchor as usize as u64) & !0xfff
}

fn spawn_looping_child() -> Pid {
    match fork().expect("fork") {
        ForkResult::Parent { child } => child,
        ForkResult::Child => loop {
            thread::sleep(Duration::from_millis(50));
        },
    }
}

fn reap(pid: Pid) {
    let _ = signal::kill(pid, Signal::SIGKILL);
    let _ = waitpid(pid, None);
}

#[test]
fn attach_then_detach_without_modification_leaves_target_running() {
    let pid = spawn_looping_child();
    thread::sleep(Duration::from_millis(20));

    let session = Session::attach(pid, SupportedArch::X86_64).expect("attach");
    assert!(!session.was_stopped_before_attach());
    session.detach().expect("detach");

    reap(pid);
}

#[test]
fn attach_to_an_already_stopped_target_does_not_hang() {
    let pid = spawn_looping_child();
    thread::sleep(Duration::from_millis(20));
    signal::kill(pid, Signal::SIGSTOP).expect("sigstop");
    thread::sleep(Duration::from_millis(20));

    let session = Session::attach(pid, SupportedArch::X86_64).expect("attach");
    assert!(session.was_stopped_before_attach());
    session.detach().expect("detach");

    reap(pid);
}

struct RefusingVmaFetcher;

impl VmaFetcher for RefusingVmaFetcher {
    fn fetch(&mut self, _ctx: &mut FetchContext, _sink: &mut ChunkList) -> Option<(ScribbleZone, u64)> {
        None
    }
}

#[test]
fn capture_aborts_when_vma_fetcher_refuses_to_publish_a_zone() {
    let pid = spawn_looping_child();
    thread::sleep(Duration::from_millis(20));

    let mut vma = RefusingVmaFetcher;
    let mut sink = ChunkList::new();
    let result = capture(
        pid,
        SupportedArch::X86_64,
        CaptureFlags::EMPTY,
        &mut vma,
        &mut [],
        &mut sink,
    );

    assert!(matches!(result, Err(Error::NoScribbleZone)));
    reap(pid);
}

struct FixedZoneVmaFetcher {
    base: u64,
}

impl VmaFetcher for FixedZoneVmaFetcher {
    fn fetch(&mut self, ctx: &mut FetchContext, _sink: &mut ChunkList) -> Option<(ScribbleZone, u64)> {
        let zone = ScribbleZone::new(self.base);
        ctx.zone = Some(zone);
        Some((zone, 0))
    }
}

struct RecordingFetcher {
    ran: bool,
}

impl ChunkFetcher for RecordingFetcher {
    fn fetch(&mut self, ctx: &mut FetchContext, sink: &mut ChunkList) -> checkpoint_core::Result<()> {
        self.ran = true;
        assert!(ctx.zone.is_some());
        sink.push(vec![0xaa]);
        Ok(())
    }
}

#[test]
fn capture_runs_fetchers_in_order_and_restores_the_zone_page() {
    let pid = spawn_looping_child();
    thread::sleep(Duration::from_millis(20));

    let mut vma = FixedZoneVmaFetcher {
        base: scribble_zone_address(),
    };
    let mut recorder = RecordingFetcher { ran: false };
    let mut fetchers: [&mut dyn ChunkFetcher; 1] = [&mut recorder];
    let mut sink = ChunkList::new();

    let result = capture(
        pid,
        SupportedArch::X86_64,
        CaptureFlags::EMPTY,
        &mut vma,
        &mut fetchers,
        &mut sink,
    );

    assert!(result.is_ok());
    assert_eq!(sink.chunks(), &[vec![0xaa]]);
    reap(pid);
}

#[test]
fn remote_lseek_against_dev_null_matches_local_semantics() {
    let pid = match fork().expect("fork") {
        ForkResult::Parent { child } => child,
        ForkResult::Child => {
            let devnull = std::fs::File::open("/dev/null").expect("open /dev/null");
            nix::unistd::dup2(devnull.as_raw_fd(), 0).expect("dup2 onto fd 0");
            loop {
                thread::sleep(Duration::from_millis(50));
            }
        }
    };
    thread::sleep(Duration::from_millis(20));

    let mut session = Session::attach(pid, SupportedArch::X86_64).expect("attach");
    let zone = ScribbleZone::new(scribble_zone_address());

    let offset =
        syscalls::lseek(&mut session, &zone, 0, 0, libc::SEEK_CUR).expect("remote lseek");
    assert_eq!(offset, 0);

    session.detach().expect("detach");
    reap(pid);
}

#[test]
fn remote_rt_sigaction_reports_the_previous_disposition() {
    let pid = spawn_looping_child();
    thread::sleep(Duration::from_millis(20));

    let mut session = Session::attach(pid, SupportedArch::X86_64).expect("attach");
    let zone = ScribbleZone::new(scribble_zone_address());

    let new_action = syscalls::KernelSigaction {
        handler: 1, // SIG_IGN
        flags: 0,
        restorer: 0,
        mask: 0,
    };
    let old = syscalls::rt_sigaction(
        &mut session,
        &zone,
        libc::SIGUSR1,
        Some(&new_action),
        true,
        8,
    )
    .expect("remote rt_sigaction");

    // Default disposition for SIGUSR1 is SIG_DFL (0) in a freshly forked
    // child that never installed a handler.
    assert_eq!(old.expect("old action requested").handler, 0);

    session.detach().expect("detach");
    reap(pid);
}

#[test]
fn remote_ioctl_tiocgwinsz_matches_a_locally_set_size() {
    let pty = nix::pty::openpty(None, None).expect("openpty");

    // Stamp a distinctive size on the pty before forking so the remote
    // read has something non-default to confirm.
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    ws.ws_row = 24;
    ws.ws_col = 80;
    let set = unsafe {
        libc::ioctl(
            pty.master,
            libc::TIOCSWINSZ,
            &ws as *const libc::winsize as *mut libc::c_void,
        )
    };
    assert_eq!(set, 0);

    let pid = match fork().expect("fork") {
        ForkResult::Parent { child } => child,
        ForkResult::Child => loop {
            thread::sleep(Duration::from_millis(50));
        },
    };
    thread::sleep(Duration::from_millis(20));

    let mut session = Session::attach(pid, SupportedArch::X86_64).expect("attach");
    let zone = ScribbleZone::new(scribble_zone_address());

    let mut buf = [0u8; std::mem::size_of::<libc::winsize>()];
    syscalls::ioctl(&mut session, &zone, pty.slave, libc::TIOCGWINSZ as u64, &mut buf)
        .expect("remote ioctl");
    let remote_ws: libc::winsize = unsafe { std::ptr::read(buf.as_ptr() as *const libc::winsize) };

    assert_eq!(remote_ws.ws_row, 24);
    assert_eq!(remote_ws.ws_col, 80);

    session.detach().expect("detach");
    reap(pid);
}

#[test]
fn remote_mprotect_on_an_unmapped_range_reports_enomem() {
    let pid = spawn_looping_child();
    thread::sleep(Duration::from_millis(20));

    let mut session = Session::attach(pid, SupportedArch::X86_64).expect("attach");
    let zone = ScribbleZone::new(scribble_zone_address());

    // The first page is reserved (mmap_min_addr) and never backed by a
    // VMA, so this is a reliable way to force ENOMEM without first
    // having to locate a real gap in the target's address space.
    let result = syscalls::mprotect(&mut session, &zone, 0x1000, 0x1000, libc::PROT_READ);

    match result {
        Err(Error::KernelSyscallError { errno }) => assert_eq!(errno, libc::ENOMEM),
        other => panic!("expected KernelSyscallError{{errno: ENOMEM}}, got {:?}", other),
    }

    session.detach().expect("detach");
    reap(pid);
}

#[test]
fn remote_fcntl_f_getfl_matches_the_flags_the_child_opened_with() {
    const CHILD_FD: i32 = 90;
    let opened_flags = libc::O_WRONLY | libc::O_APPEND;

    let pid = match fork().expect("fork") {
        ForkResult::Parent { child } => child,
        ForkResult::Child => {
            let path = std::ffi::CString::new("/dev/null").unwrap();
            let fd = unsafe { libc::open(path.as_ptr(), opened_flags) };
            assert!(fd >= 0);
            nix::unistd::dup2(fd, CHILD_FD).expect("dup2 to fixed fd");
            loop {
                thread::sleep(Duration::from_millis(50));
            }
        }
    };
    thread::sleep(Duration::from_millis(20));

    let mut session = Session::attach(pid, SupportedArch::X86_64).expect("attach");
    let zone = ScribbleZone::new(scribble_zone_address());

    let remote_flags =
        syscalls::fcntl(&mut session, &zone, CHILD_FD, libc::F_GETFL, 0).expect("remote fcntl");

    assert_eq!(remote_flags as i32 & libc::O_APPEND, libc::O_APPEND);
    assert_eq!(
        remote_flags as i32 & libc::O_ACCMODE,
        opened_flags & libc::O_ACCMODE
    );

    session.detach().expect("detach");
    reap(pid);
}

#[test]
fn remote_getsockopt_reads_a_locally_set_socket_option() {
    const CHILD_FD: i32 = 91;

    let pid = match fork().expect("fork") {
        ForkResult::Parent { child } => child,
        ForkResult::Child => {
            let sock = nix::sys::socket::socket(
                nix::sys::socket::AddressFamily::Inet,
                nix::sys::socket::SockType::Stream,
                nix::sys::socket::SockFlag::empty(),
                None,
            )
            .expect("socket");
            nix::sys::socket::setsockopt(sock, nix::sys::socket::sockopt::ReuseAddr, &true)
                .expect("setsockopt");
            nix::unistd::dup2(sock, CHILD_FD).expect("dup2 to fixed fd");
            loop {
                thread::sleep(Duration::from_millis(50));
            }
        }
    };
    thread::sleep(Duration::from_millis(20));

    let mut session = Session::attach(pid, SupportedArch::X86_64).expect("attach");
    let zone = ScribbleZone::new(scribble_zone_address());

    let mut optval = [0u8; 4];
    syscalls::getsockopt(
        &mut session,
        &zone,
        CHILD_FD,
        libc::SOL_SOCKET,
        libc::SO_REUSEADDR,
        &mut optval,
    )
    .expect("remote getsockopt");

    assert_ne!(u32::from_ne_bytes(optval), 0);

    session.detach().expect("detach");
    reap(pid);
}
