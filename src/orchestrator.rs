//! The orchestrator (§4.8): coordinates one capture from attach through
//! detach in a fixed, dependency-respecting order. Chunk fetchers
//! (VMA/fd/signal-handler/register-chunk enumeration, image
//! serialization) are external collaborators; this module only knows
//! the two trait shapes they must implement.

use bitflags::bitflags;
use nix::unistd::Pid;

use crate::error::{Error, Result};
use crate::kernel_abi::SupportedArch;
use crate::page_backup::{backup_page, restore_page};
use crate::scribble::ScribbleZone;
use crate::session::Session;

bitflags! {
    /// The flags word of §6: opaque to the core, forwarded verbatim to
    /// every chunk fetcher. No bit is defined here on purpose -- the
    /// core doesn't interpret any of them.
    pub struct CaptureFlags: u32 {
        const EMPTY = 0;
    }
}

/// One record appended by a chunk fetcher to the capture's sink.
pub type Chunk = Vec<u8>;

/// Append-only sink of externally-defined image records (§3's
/// `ChunkList`), owned by the caller of `capture`.
#[derive(Default)]
pub struct ChunkList {
    chunks: Vec<Chunk>,
}

impl ChunkList {
    pub fn new() -> ChunkList {
        ChunkList::default()
    }

    pub fn push(&mut self, chunk: Chunk) {
        self.chunks.push(chunk);
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }
}

/// Everything a chunk fetcher may need from the core, handed fresh to
/// each fetcher invocation. `zone` is `None` until the VMA fetcher
/// publishes one.
pub struct FetchContext<'a> {
    pub session: &'a mut Session,
    pub zone: Option<ScribbleZone>,
    pub flags: CaptureFlags,
    /// Whether the target was already trace-stopped before this capture
    /// attached, so a register-chunk fetcher can reproduce that state on
    /// the restore side (§4.8, recovered from `original_source/`).
    pub was_stopped_before_attach: bool,
}

/// The VMA fetcher is the one chunk fetcher allowed to publish a
/// scribble zone, and the orchestrator always runs it first (§8's
/// Ordering invariant). Returning `None` means it couldn't find a
/// suitable page and the capture must abort.
pub trait VmaFetcher {
    /// Publishes a scribble zone and returns it along with the
    /// discovered binary load offset.
    fn fetch(
        &mut self,
        ctx: &mut FetchContext,
        sink: &mut ChunkList,
    ) -> Option<(ScribbleZone, u64)>;
}

/// Any fetcher invoked after the scribble page has been backed up (fd
/// enumeration, signal-handler enumeration, register-chunk emission, ...).
pub trait ChunkFetcher {
    fn fetch(&mut self, ctx: &mut FetchContext, sink: &mut ChunkList) -> Result<()>;
}

pub struct CaptureResult {
    pub load_offset: u64,
}

/// Runs one capture against `pid`, following the nine-step order of
/// §4.8 exactly: attach, snapshot regs, VMA fetch, assert zone, back up
/// the scribble page, run remaining fetchers, restore page, restore
/// regs, detach. Any failure at or after the scribble-page backup still
/// restores page and registers before detaching, then propagates.
pub fn capture(
    pid: Pid,
    arch: SupportedArch,
    flags: CaptureFlags,
    vma_fetcher: &mut dyn VmaFetcher,
    fetchers: &mut [&mut dyn ChunkFetcher],
    sink: &mut ChunkList,
) -> Result<CaptureResult> {
    // 1. attach
    let mut session = Session::attach(pid, arch)?;
    let was_stopped_before_attach = session.was_stopped_before_attach();

    // 2. snapshot registers
    let r0 = session.get_regs()?;

    let mut ctx = FetchContext {
        session: &mut session,
        zone: None,
        flags,
        was_stopped_before_attach,
    };

    // 3. invoke the VMA fetcher, which publishes the scribble zone as a
    //    side effect.
    let published = vma_fetcher.fetch(&mut ctx, sink);

    // 4. assert a zone was actually published, else abort.
    let (zone, load_offset) = match published {
        Some(v) => v,
        None => {
            let _ = ctx.session.set_regs(&r0);
            drop(ctx);
            let _ = session.detach();
            return Err(Error::NoScribbleZone);
        }
    };
    ctx.zone = Some(zone);

    // 5. back up the scribble page.
    let backup = match backup_page(ctx.session, zone.base()) {
        Ok(b) => b,
        Err(e) => {
            let _ = ctx.session.set_regs(&r0);
            drop(ctx);
            let _ = session.detach();
            return Err(e);
        }
    };

    // 6. invoke the remaining fetchers, in the order given.
    let mut failure = None;
    for fetcher in fetchers.iter_mut() {
        if let Err(e) = fetcher.fetch(&mut ctx, sink) {
            failure = Some(e);
            break;
        }
    }

    // 7. restore the scribble page; 8. restore registers -- both run
    //    unconditionally, whether or not step 6 failed.
    let page_restored = restore_page(ctx.session, backup);
    let regs_restored = ctx.session.set_regs(&r0);
    drop(ctx);

    // 9. detach, also unconditional.
    let detached = session.detach();

    if let Some(e) = failure {
        return Err(e);
    }
    page_restored?;
    regs_restored?;
    detached?;

    Ok(CaptureResult { load_offset })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_list_is_append_only_in_order() {
        let mut sink = ChunkList::new();
        sink.push(vec![1, 2]);
        sink.push(vec![3]);
        assert_eq!(sink.chunks(), &[vec![1, 2], vec![3]]);
    }

    #[test]
    fn capture_flags_round_trip_through_bits() {
        let flags = CaptureFlags::from_bits_truncate(0b101);
        assert_eq!(flags.bits(), 0b101);
    }
}
