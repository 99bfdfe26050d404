//! psql prompt grammar.
//!
//! The default psql prompts (`PROMPT1`/`PROMPT2`) render as
//! `<database><indicator><modifier>?<terminator> `, for example `pgdb=# `,
//! `pgdb=*> ` or `pgdb-# `. The indicator tells a fresh prompt apart from a
//! continuation prompt, the optional modifier reports the transaction state
//! and the terminator is `#` for superusers and `>` for everyone else.

/// Indicators of a prompt that waits for a new statement.
pub const FRESH_INDICATORS: &[u8] = b"=^!";

/// Indicators of a prompt that continues an unfinished statement.
pub const CONTINUATION_INDICATORS: &[u8] = b"-*'\"$(";

/// Transaction state markers that may follow the indicator.
pub const TRANSACTION_MODIFIERS: &[u8] = b"*!?";

/// Prompt terminators: `>` for regular users, `#` for superusers.
pub const TERMINATORS: &[u8] = b">#";

const ESC: u8 = 0x1b;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Fresh,
    Continuation,
}

/// A fresh prompt found at the end of an output chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptMatch<'a> {
    /// Everything the chunk carries before the prompt line.
    pub prefix: &'a [u8],
    /// The prompt itself, including the control sequences psql emits
    /// right before it (bracketed paste toggles and similar).
    pub prompt: &'a [u8],
    /// Database name rendered in the prompt.
    pub database: &'a [u8],
}

impl PromptMatch<'_> {
    /// Byte offset in the chunk where the prompt starts.
    #[must_use]
    pub const fn split_point(&self) -> usize {
        self.prefix.len()
    }
}

/// A prompt found at the start of a rendered screen line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinePrompt<'a> {
    pub kind: PromptKind,
    pub database: &'a str,
    /// Length of the prompt token including its trailing space, if any.
    pub len: usize,
}

/// All `<indicator><modifier>?<terminator>` combinations psql may render on
/// a continuation line.
#[must_use]
pub fn continuation_variants() -> Vec<String> {
    let mut variants = Vec::with_capacity(CONTINUATION_INDICATORS.len() * 4 * TERMINATORS.len());
    for &indicator in CONTINUATION_INDICATORS {
        for modifier in std::iter::once(None).chain(TRANSACTION_MODIFIERS.iter().map(Some)) {
            for &terminator in TERMINATORS {
                let mut variant = String::new();
                variant.push(char::from(indicator));
                if let Some(&modifier) = modifier {
                    variant.push(char::from(modifier));
                }
                variant.push(char::from(terminator));
                variants.push(variant);
            }
        }
    }
    variants
}

/// Detects a fresh, empty prompt at the very end of an output chunk and
/// splits the chunk in front of it.
///
/// The prompt has to start a line: it is either at the start of the chunk
/// or right after `\r`/`\n`, possibly behind complete CSI sequences that
/// are attributed to the prompt.
#[must_use]
pub fn find_fresh_prompt(chunk: &[u8]) -> Option<PromptMatch<'_>> {
    find_prompt(chunk).and_then(|(found, kind)| (kind == PromptKind::Fresh).then_some(found))
}

/// Returns `true` when the chunk ends with an empty prompt of either kind.
#[must_use]
pub fn has_prompt(chunk: &[u8]) -> bool {
    find_prompt(chunk).is_some()
}

fn find_prompt(chunk: &[u8]) -> Option<(PromptMatch<'_>, PromptKind)> {
    let end = chunk.len().checked_sub(1)?;
    if chunk[end] != b' ' {
        return None;
    }
    let mut db_start = token_start(chunk, end);

    // `\x1b[?2004hpgdb` scans back as one token; cut it where the escape
    // sequence ends.
    if let Some(esc) = chunk[..db_start].iter().rposition(|&b| b == ESC) {
        if let Some(seq_end) = csi_end(chunk, esc) {
            if seq_end > db_start && seq_end < end {
                db_start = seq_end;
            }
        }
    }
    let (indicator, kind) = split_prompt_token(chunk, db_start, end)?;

    let mut start = db_start;
    while let Some(esc) = chunk[..start].iter().rposition(|&b| b == ESC) {
        if csi_end(chunk, esc) == Some(start) {
            start = esc;
        } else {
            break;
        }
    }

    if start > 0 && !matches!(chunk[start - 1], b'\r' | b'\n') {
        return None;
    }

    let found = PromptMatch {
        prefix: &chunk[..start],
        prompt: &chunk[start..],
        database: &chunk[db_start..indicator],
    };
    Some((found, kind))
}

/// Returns `true` when the chunk ends with a fresh, empty prompt.
#[must_use]
pub fn has_fresh_prompt(chunk: &[u8]) -> bool {
    find_fresh_prompt(chunk).is_some()
}

/// Reads a prompt token at the start of a rendered screen line.
///
/// The token must be followed by a space or by the end of the line, since
/// the screen model trims trailing whitespace.
#[must_use]
pub fn line_prompt(line: &str) -> Option<LinePrompt<'_>> {
    let bytes = line.as_bytes();
    let end = bytes
        .iter()
        .position(|&b| is_separator(b))
        .unwrap_or(bytes.len());
    let (indicator, kind) = split_prompt_token(bytes, 0, end)?;

    let len = match bytes.get(end) {
        None => end,
        Some(b' ') => end + 1,
        Some(_) => return None,
    };

    Some(LinePrompt {
        kind,
        database: &line[..indicator],
        len,
    })
}

/// Splits the token `bytes[start..end]` as
/// `<database><indicator><modifier>?<terminator>` and returns the indicator
/// offset with the prompt kind it stands for. The database part is any
/// non-empty run, so names like `my-db` or `shop.eu` are read whole.
///
/// `!` and `*` are valid both as indicator and as modifier. The reading with
/// a modifier wins whenever the byte in front of it is an indicator too, so
/// `pgdb-!#` is a continuation prompt and `pgdb!#` a fresh one.
fn split_prompt_token(bytes: &[u8], start: usize, end: usize) -> Option<(usize, PromptKind)> {
    let terminator = end.checked_sub(1).filter(|&i| i > start)?;
    if !TERMINATORS.contains(&bytes[terminator]) {
        return None;
    }
    let before = terminator - 1;

    let with_modifier = before
        .checked_sub(1)
        .filter(|&i| i > start && TRANSACTION_MODIFIERS.contains(&bytes[before]))
        .and_then(|i| indicator_kind(bytes[i]).map(|kind| (i, kind)));
    with_modifier.or_else(|| {
        (before > start)
            .then(|| indicator_kind(bytes[before]))
            .flatten()
            .map(|kind| (before, kind))
    })
}

fn indicator_kind(b: u8) -> Option<PromptKind> {
    if FRESH_INDICATORS.contains(&b) {
        Some(PromptKind::Fresh)
    } else if CONTINUATION_INDICATORS.contains(&b) {
        Some(PromptKind::Continuation)
    } else {
        None
    }
}

/// Start of the run of non-separator bytes that ends at `end`.
fn token_start(bytes: &[u8], end: usize) -> usize {
    bytes[..end]
        .iter()
        .rposition(|&b| is_separator(b))
        .map_or(0, |pos| pos + 1)
}

const fn is_separator(b: u8) -> bool {
    b <= b' ' || b == 0x7f
}

/// Returns the offset right after a complete CSI sequence starting at `esc`.
pub(crate) fn csi_end(bytes: &[u8], esc: usize) -> Option<usize> {
    if bytes.get(esc) != Some(&ESC) || bytes.get(esc + 1) != Some(&b'[') {
        return None;
    }
    let mut pos = esc + 2;
    while bytes.get(pos).is_some_and(|b| (0x30..=0x3f).contains(b)) {
        pos += 1;
    }
    while bytes.get(pos).is_some_and(|b| (0x20..=0x2f).contains(b)) {
        pos += 1;
    }
    bytes
        .get(pos)
        .filter(|b| (0x40..=0x7e).contains(*b))
        .map(|_| pos + 1)
}
