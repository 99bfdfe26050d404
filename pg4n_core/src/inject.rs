//! Splicing warnings into prompt-bearing output.

use crate::prompt::find_fresh_prompt;

/// Inserts `message` on its own lines right above the fresh prompt that
/// ends `chunk`.
///
/// A chunk that carries result rows in front of the prompt becomes
/// `prefix + CRLF + message + CRLF CRLF + prompt`. A bare prompt chunk,
/// whose prefix holds no line break, already starts on a fresh line and
/// becomes `message + CRLF + chunk`. The prompt keeps the control sequences
/// psql sends in front of it. Bare `\n` in the message become `\r\n`. When
/// the chunk does not end with a fresh prompt it is returned unchanged.
#[must_use]
pub fn inject(chunk: &[u8], message: &str) -> Vec<u8> {
    let Some(found) = find_fresh_prompt(chunk) else {
        return chunk.to_vec();
    };

    let message = to_crlf(message);
    let mut out = Vec::with_capacity(chunk.len() + message.len() + 6);
    if !found.prefix.contains(&b'\n') {
        out.extend_from_slice(message.as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(chunk);
        return out;
    }

    out.extend_from_slice(found.prefix);
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(message.as_bytes());
    out.extend_from_slice(b"\r\n\r\n");
    out.extend_from_slice(found.prompt);
    out
}

/// Converts bare `\n` line endings to `\r\n`, leaving existing `\r\n` alone.
#[must_use]
pub fn to_crlf(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous = None;
    for c in text.chars() {
        if c == '\n' && previous != Some('\r') {
            out.push('\r');
        }
        out.push(c);
        previous = Some(c);
    }
    out
}
