use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::job::PlateJob;

#[derive(Serialize, Debug, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PlateStatus {
    Converged,
    Failed,
}

/// One JSON line per plate, written whether or not the plate succeeded.
#[derive(Serialize, Debug)]
pub struct SummaryRow<'a> {
    #[serde(flatten)]
    pub job: &'a PlateJob,
    pub status: PlateStatus,
    pub states_k: Option<u64>,
    pub output: Option<String>,
    pub workers: usize,
    pub backend: &'static str,
    pub wall_ms: u64,
    pub error: Option<String>,
}

pub struct SummaryWriter {
    out: BufWriter<File>,
}

impl SummaryWriter {
    pub fn create(path: &Path) -> std::io::Result<SummaryWriter> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(path)?;
        Ok(SummaryWriter {
            out: BufWriter::new(file),
        })
    }

    pub fn push(&mut self, row: &SummaryRow<'_>) -> anyhow::Result<()> {
        serde_json::to_writer(&mut self.out, row)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    pub fn finish(mut self) -> std::io::Result<()> {
        self.out.flush()
    }
}
