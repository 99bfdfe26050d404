//! Debug transcript of an intercepted session.
//!
//! Every processed output chunk is appended as one JSON line, and the
//! mirrored screen is rewritten to a plain text file after each chunk.
//! Nothing here feeds back into interception.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    time::Instant,
};

use serde_derive::{Deserialize, Serialize};

use crate::{config::DebugSettings, error::Result};

/// One processed chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Milliseconds since the session started.
    pub elapsed_ms: u64,
    /// Controller phase after the chunk was processed.
    pub phase: String,
    pub original: String,
    pub output: String,
    /// Whether a warning was spliced into this chunk.
    pub injected: bool,
}

/// Writes the debug artifacts of one session.
#[derive(Debug)]
pub struct Transcript {
    chunks_path: Option<PathBuf>,
    screen_path: Option<PathBuf>,
    started: Instant,
}

impl Transcript {
    /// Returns `None` when no artifact is configured.
    #[must_use]
    pub fn new(settings: &DebugSettings) -> Option<Self> {
        if settings.transcript.is_none() && settings.screen.is_none() {
            return None;
        }
        Some(Self {
            chunks_path: settings.transcript.clone(),
            screen_path: settings.screen.clone(),
            started: Instant::now(),
        })
    }

    /// Append a chunk record as a JSON line.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened/created or JSON serialization fails.
    pub fn record_chunk(&self, phase: &str, original: &[u8], output: &[u8]) -> Result<()> {
        let Some(path) = &self.chunks_path else {
            return Ok(());
        };
        let record = ChunkRecord {
            elapsed_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
            phase: phase.to_string(),
            original: String::from_utf8_lossy(original).into_owned(),
            output: String::from_utf8_lossy(output).into_owned(),
            injected: original != output,
        };

        let mut file = open_for(path, true)?;
        let json = serde_json::to_string(&record)?;
        writeln!(file, "{json}")?;
        Ok(())
    }

    /// Replace the screen dump with the current lines.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn dump_screen(&self, lines: &[String]) -> Result<()> {
        let Some(path) = &self.screen_path else {
            return Ok(());
        };
        let mut file = open_for(path, false)?;
        for line in lines {
            writeln!(file, "{line}")?;
        }
        Ok(())
    }
}

fn open_for(path: &Path, append: bool) -> Result<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut options = OpenOptions::new();
    options.create(true);
    if append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }
    Ok(options.open(path)?)
}

/// Read back every record of a transcript file.
///
/// # Errors
/// Returns an error if the file cannot be read or a line is not a record.
pub fn read_transcript(path: &Path) -> Result<Vec<ChunkRecord>> {
    fs::read_to_string(path)?
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| Ok(serde_json::from_str(line)?))
        .collect()
}
