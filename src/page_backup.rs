//! Page backup/restore (§4.4). `backup_page` poisons the page as it
//! reads it so any stray concurrent execution faults loudly and so the
//! scribble zone starts from a known-invalid state before the engine
//! writes its trap instruction; `restore_page` writes it back and
//! consumes the backup exactly once.

use crate::error::{Error, Result};
use crate::kernel_abi::{IsaDescriptor, SupportedArch, Word};
use crate::session::Session;

const WORD_SIZE: u64 = std::mem::size_of::<Word>() as u64;

/// Saved page bytes, linear: must be restored exactly once. Dropping one
/// without restoring it is a bug, caught at scope exit rather than
/// silently losing the target's original page contents.
pub struct PageBackup {
    addr: u64,
    words: Vec<Word>,
    restored: bool,
}

impl Drop for PageBackup {
    fn drop(&mut self) {
        if !self.restored {
            panic!(
                "PageBackup for target addr {:#x} dropped without being restored",
                self.addr
            );
        }
    }
}

fn poison_word(arch: SupportedArch) -> Word {
    match arch {
        SupportedArch::X86_64 => crate::kernel_abi::x86_64::X86_64::poison_word(),
        #[cfg(feature = "arch-sparc")]
        SupportedArch::Sparc => crate::kernel_abi::sparc::Sparc::poison_word(),
    }
}

fn page_size() -> u64 {
    4096
}

/// Reads every word of the target page at `addr` into freshly allocated
/// storage, overwriting each word with the ISA's poison pattern as it
/// goes.
pub fn backup_page(session: &Session, addr: u64) -> Result<PageBackup> {
    let word_count = (page_size() / WORD_SIZE) as usize;
    let mut words = Vec::with_capacity(word_count);
    let poison = poison_word(session.arch());

    for i in 0..word_count {
        let word_addr = addr + i as u64 * WORD_SIZE;
        let original = session.peek_word(word_addr).map_err(|_| Error::PeekFailed)?;
        words.push(original);
        session
            .poke_word(word_addr, poison)
            .map_err(|_| Error::PokeFailed)?;
    }

    Ok(PageBackup {
        addr,
        words,
        restored: false,
    })
}

/// Writes every saved word back in order and consumes `backup`. A poke
/// failure partway through still marks `backup` restored before
/// propagating the error (§4.4: "on failure the backup is freed but the
/// target page is not rolled back") -- the alternative of letting the
/// still-`restored: false` backup drop here would turn this documented,
/// anticipated failure into a panic instead of a clean `Err`.
pub fn restore_page(session: &Session, mut backup: PageBackup) -> Result<()> {
    for (i, word) in backup.words.iter().enumerate() {
        let word_addr = backup.addr + i as u64 * WORD_SIZE;
        match session.poke_word(word_addr, *word) {
            Ok(()) => {}
            Err(_) => {
                backup.restored = true;
                return Err(Error::PokeFailed);
            }
        }
    }
    backup.restored = true;
    Ok(())
}
