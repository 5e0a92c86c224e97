//! Per-job CSV archive of submitted readings.
//!
//! One file per job number. The header is written when the file is created;
//! each archival appends one row per reading followed by a free-text summary
//! line.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use thiserror::Error;
use tracing::{debug, info};

use crate::state_machine::{JobMeta, Reading};

pub const COLUMNS: [&str; 14] = [
    "tag_id",
    "declare_purity",
    "reading",
    "gold",
    "copper",
    "silver",
    "cadmium",
    "iridium",
    "nickel",
    "osmium",
    "platinum",
    "palladium",
    "rhodium",
    "ruthenium",
];

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to write archive {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub struct ReportArchiver {
    dir: PathBuf,
}

impl ReportArchiver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Archive path for a job number.
    ///
    /// Bytes outside `[A-Za-z0-9_-]` are percent-encoded, so distinct job
    /// numbers never share a file.
    pub fn path_for(&self, job_num: &str) -> PathBuf {
        let mut safe = String::with_capacity(job_num.len());
        for b in job_num.bytes() {
            if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
                safe.push(char::from(b));
            } else {
                safe.push_str(&format!("%{b:02X}"));
            }
        }
        self.dir.join(format!("job_{safe}.csv"))
    }

    /// Appends `readings` and a summary line to the job's archive, returning
    /// its path.
    pub fn write(
        &self,
        readings: &[Reading],
        meta: &JobMeta,
        machine_name: &str,
    ) -> Result<PathBuf, ArchiveError> {
        let path = self.path_for(&meta.job_num);
        let text = render(readings, meta, machine_name, !path.exists());
        append(&path, &text).map_err(|source| ArchiveError::Io {
            path: path.clone(),
            source,
        })?;

        info!(
            path = %path.display(),
            rows = readings.len(),
            job_num = %meta.job_num,
            "readings archived"
        );
        Ok(path)
    }
}

fn append(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(text.as_bytes())?;
    file.flush()
}

// Rendered in full before touching the file so a failure never leaves half a row.
fn render(readings: &[Reading], meta: &JobMeta, machine_name: &str, with_header: bool) -> String {
    let mut out = String::new();
    if with_header {
        out.push_str(&COLUMNS.join(","));
        out.push('\n');
    }

    for r in readings {
        let c = &r.composition;
        let fields = [
            escape(&r.tag_id),
            escape(&r.declare_purity),
            r.reading.to_string(),
            c.gold.to_string(),
            c.copper.to_string(),
            c.silver.to_string(),
        ];
        out.push_str(&fields.join(","));
        // Metals the generator does not produce.
        for _ in 6..COLUMNS.len() {
            out.push_str(",0");
        }
        out.push('\n');
    }

    let summary = format!(
        "Job Id: {}, Request No: {}, Pieces: {}, Date: {}, Machine: {}",
        meta.job_num,
        meta.request_num,
        readings.len() / 2,
        Local::now().format("%Y-%m-%d"),
        machine_name
    );
    debug!(%summary, "archive summary");
    out.push_str(&escape(&summary));
    out.push('\n');
    out
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
