//! The memory bridge (§4.3): word-granular bulk copy between our address
//! space and the target's, built on `Session`'s peek/poke primitives.

use crate::error::{Error, Result};
use crate::kernel_abi::Word;
use crate::session::Session;

const WORD_SIZE: usize = std::mem::size_of::<Word>();

/// The word index at which a bulk copy failed, so a caller can report how
/// much progress it made before the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialCopy {
    pub failed_at_word: usize,
    pub error: Error,
}

/// Rounds `n` down to a multiple of the word size; callers that need
/// sub-word tails must pad themselves (§4.3: "no byte-level fix-up").
pub fn truncate_to_word_multiple(n: usize) -> usize {
    n - (n % WORD_SIZE)
}

/// Copies `src` into the target's address space at `dst`, one word at a
/// time. `n` is truncated to a whole number of words.
pub fn copy_into_target(
    session: &Session,
    dst: u64,
    src: &[u8],
) -> std::result::Result<(), PartialCopy> {
    let n = truncate_to_word_multiple(src.len());
    let word_count = n / WORD_SIZE;
    for i in 0..word_count {
        let offset = i * WORD_SIZE;
        let mut word_bytes = [0u8; WORD_SIZE];
        word_bytes.copy_from_slice(&src[offset..offset + WORD_SIZE]);
        let word = Word::from_ne_bytes(word_bytes);
        session
            .poke_word(dst + offset as u64, word)
            .map_err(|error| PartialCopy {
                failed_at_word: i,
                error,
            })?;
    }
    Ok(())
}

/// Copies `n` bytes (truncated to a whole number of words) from the
/// target's address space at `src` into `dst`.
pub fn copy_from_target(
    session: &Session,
    dst: &mut [u8],
    src: u64,
) -> std::result::Result<(), PartialCopy> {
    let n = truncate_to_word_multiple(dst.len());
    let word_count = n / WORD_SIZE;
    for i in 0..word_count {
        let offset = i * WORD_SIZE;
        let word = session
            .peek_word(src + offset as u64)
            .map_err(|error| PartialCopy {
                failed_at_word: i,
                error,
            })?;
        dst[offset..offset + WORD_SIZE].copy_from_slice(&word.to_ne_bytes());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_down_to_word_multiple() {
        assert_eq!(truncate_to_word_multiple(0), 0);
        assert_eq!(truncate_to_word_multiple(7), 0);
        assert_eq!(truncate_to_word_multiple(8), 8);
        assert_eq!(truncate_to_word_multiple(15), 8);
        assert_eq!(truncate_to_word_multiple(16), 16);
    }
}
