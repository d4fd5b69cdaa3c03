//! The scribble zone (§4.5): a process-wide handle to one target-address
//! region used to host injected instructions and small transient buffers,
//! published by the (out-of-core) VMA fetcher before any remote syscall.

/// Fixed sub-offsets within the zone. The landing pad starts at `+0x10`
//  so the remote-syscall engine never overwrites the zone's very first
/// word, which callers may use for data (§4.6 step 2).
pub const LANDING_OFFSET: u64 = 0x10;
/// Where the typed façade bounces the "new" `k_sigaction` argument of
/// `rt_sigaction` (§4.7, and recovered from `original_source/`).
pub const SIGACTION_NEW_OFFSET: u64 = 0x100;
/// Where the "old" `k_sigaction` out-parameter is bounced back from,
/// disjoint from `SIGACTION_NEW_OFFSET` by one structure's worth of room.
pub const SIGACTION_OLD_OFFSET: u64 = 0x100 + 32;
/// Where `ioctl`'s argument buffer (e.g. a `struct winsize`) is bounced.
pub const IOCTL_BUF_OFFSET: u64 = 0x140;
/// Where `getsockopt`'s `optval` out-buffer is bounced.
pub const GETSOCKOPT_OPTVAL_OFFSET: u64 = 0x160;
/// Where `getsockopt`'s `optlen` in/out word is bounced.
pub const GETSOCKOPT_OPTLEN_OFFSET: u64 = 0x1a0;

/// Minimum usable size: a trap instruction plus small data (§3).
pub const MIN_SIZE: u64 = 256;

/// One target virtual address, shared read-only among chunk fetchers for
/// the duration of a single capture. Set at most once per capture by the
/// VMA fetcher; never mutated thereafter (§5).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ScribbleZone {
    base: u64,
}

impl ScribbleZone {
    /// Publishes a zone at `base`. Callers (the VMA fetcher) are
    /// responsible for having verified `base` is page-aligned,
    /// read+write+executable in the target, and at least `MIN_SIZE`
    /// bytes.
    pub fn new(base: u64) -> ScribbleZone {
        ScribbleZone { base }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn landing_address(&self) -> u64 {
        self.base + LANDING_OFFSET
    }

    /// A well-known offset for bouncing an indirect-buffer argument
    /// through the zone (§4.7). Offsets must not overlap the landing pad.
    pub fn offset(&self, offset: u64) -> u64 {
        self.base + offset
    }
}

/// SPARC-only: a target-resident address known to already contain a
/// trap-syscall instruction, published alongside the scribble zone and
/// likewise set at most once per capture (§5).
#[cfg(feature = "arch-sparc")]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SyscallLocation {
    addr: u64,
}

#[cfg(feature = "arch-sparc")]
impl SyscallLocation {
    pub fn new(addr: u64) -> SyscallLocation {
        SyscallLocation { addr }
    }

    pub fn addr(&self) -> u64 {
        self.addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landing_address_is_base_plus_fixed_offset() {
        let zone = ScribbleZone::new(0x7f00_0000_0000);
        assert_eq!(zone.landing_address(), 0x7f00_0000_0010);
    }

    #[test]
    fn sigaction_offsets_do_not_overlap_landing_pad() {
        let zone = ScribbleZone::new(0x1000);
        assert!(zone.offset(SIGACTION_NEW_OFFSET) > zone.landing_address());
    }
}
