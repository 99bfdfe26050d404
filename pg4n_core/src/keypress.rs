//! Return-keypress detection on raw psql output.
//!
//! A plain Return makes readline echo `\r\n` as the first bytes of the next
//! chunk. Return pressed inside reverse-i-search or right after cursor
//! movement makes readline redraw the line first, so the newline shows up
//! somewhere inside the chunk, behind one of a few well known sequences.

/// Sequences readline emits around an accepted line after a redraw.
pub const RETURN_SEQUENCES: [&[u8]; 3] = [
    // bracketed paste turned off once the line is accepted
    b"\r\n\x1b[?2004l\r",
    // psql without bracketed paste support
    b"\r\n\r\r\n",
    // accepted right after a cursor move to the left
    b"\x08\r\n",
];

/// Detects a Return keypress and returns the offset right after it.
///
/// The offset is where the echo of the submitted line ends, i.e. everything
/// in front of it belongs to the statement and everything after it is the
/// server's answer.
#[must_use]
pub fn return_keypress(chunk: &[u8]) -> Option<usize> {
    if chunk.starts_with(b"\r\n") {
        return Some(2);
    }
    RETURN_SEQUENCES
        .iter()
        .filter_map(|seq| find(chunk, seq).map(|pos| (pos, pos + seq.len())))
        .min()
        .map(|(_, end)| end)
}

/// Returns `true` when the chunk carries a Return keypress.
#[must_use]
pub fn is_return_keypress(chunk: &[u8]) -> bool {
    return_keypress(chunk).is_some()
}

pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}
