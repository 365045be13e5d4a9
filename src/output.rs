use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{CaptureError, Result};
use crate::stream::Sample;

/// Writes captured buffers as headerless CSV, one file per (repetition, class)
#[derive(Debug, Clone)]
pub struct OutputWriter {
    dir: PathBuf,
}

impl OutputWriter {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_path(&self, repetition: u32, class_index: usize) -> PathBuf {
        self.dir
            .join(format!("R_{}_C_{}.csv", repetition, class_index))
    }

    /// Writes every captured class of `repetition`, replacing files from an earlier attempt
    pub fn write_repetition(
        &self,
        repetition: u32,
        captured: &BTreeMap<usize, Vec<Sample>>,
    ) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.dir)?;

        let mut written = Vec::with_capacity(captured.len());
        for (&class_index, rows) in captured {
            let path = self.file_path(repetition, class_index);
            write_rows(&path, rows).map_err(|source| CaptureError::Output {
                path: path.clone(),
                source,
            })?;
            info!("Wrote {} samples to {:?}", rows.len(), path);
            written.push(path);
        }
        Ok(written)
    }
}

fn write_rows(path: &Path, rows: &[Sample]) -> std::result::Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_path(path)?;
    for row in rows {
        writer.write_record(row.iter().map(|v| v.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}
