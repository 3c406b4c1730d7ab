//! The local metadata ledger: a JSON array of [`UploadResult`] records.
//!
//! Every save reads the whole file, appends one record and swaps a rewritten
//! copy into place. Only one process may use a ledger at a time.

use crate::api::UploadResult;
use anyhow::Context;
use log::{debug, info, warn};
use serde::Serialize;
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

pub const DEFAULT_LEDGER_PATH: &str = "meta_info.json";

pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Reads every record in the ledger.
    ///
    /// A missing, unreadable, or malformed file reads as an empty ledger. The
    /// file is always rewritten in full on the next save.
    pub fn read(&self) -> Vec<UploadResult> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(ref err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("No ledger at {} yet", self.path.display());
                return Vec::new();
            }
            Err(err) => {
                warn!("Failed to read ledger {}: {err}", self.path.display());
                return Vec::new();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(records) => records,
            Err(err) => {
                warn!(
                    "Ledger {} is not a valid record list, starting empty: {err}",
                    self.path.display()
                );
                Vec::new()
            }
        }
    }

    /// Appends `record` and rewrites the whole file.
    ///
    /// The new contents go to a temp file next to the ledger, which is then
    /// renamed over it, so a failed write leaves the old ledger intact.
    pub fn append(&self, record: UploadResult) -> anyhow::Result<()> {
        let mut records = self.read();
        records.push(record);

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let contents = to_pretty_json(&records)?;
        let mut file = tempfile::NamedTempFile::new_in(dir).with_context(|| {
            format!("Failed to create a temp file in {}", dir.display())
        })?;
        file.write_all(&contents)
            .and_then(|()| file.flush())
            .with_context(|| {
                format!("Failed to write ledger {}", self.path.display())
            })?;
        file.persist(&self.path).with_context(|| {
            format!("Failed to replace ledger {}", self.path.display())
        })?;

        info!(
            "Saved size info to {} ({} record(s))",
            self.path.display(),
            records.len()
        );
        Ok(())
    }
}

/// Pretty-print with a 4-space indent. `serde_json` never escapes non-ASCII
/// text, so captions in any language stay readable.
fn to_pretty_json<T: Serialize>(value: &T) -> anyhow::Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    value
        .serialize(&mut ser)
        .context("Failed to serialize ledger")?;
    out.push(b'\n');
    Ok(out)
}

/// Totals over the tail of the ledger, for the end-of-run summary.
#[derive(Debug, PartialEq, Eq)]
pub struct Summary {
    pub files: usize,
    pub total_size: u64,
}

impl Summary {
    /// Sums the sizes of the last `n` records (or all of them, if there are
    /// fewer than `n`).
    pub fn of_last(records: &[UploadResult], n: usize) -> Self {
        let tail = &records[records.len().saturating_sub(n)..];
        Self {
            files: tail.len(),
            total_size: tail.iter().map(|r| r.size).sum(),
        }
    }
}
