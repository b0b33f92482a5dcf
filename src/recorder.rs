use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{ensure, Context, Result};

use crate::drivers::RecordingRow;

/// Writes a header row once, then recorded rows, as comma-separated text.
pub struct CsvRecorder<W: Write> {
    writer: csv::Writer<W>,
    width: usize,
    rows: usize,
}

impl CsvRecorder<BufWriter<File>> {
    pub fn create(path: &Path, columns: &[String]) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        Self::new(BufWriter::new(file), columns)
    }
}

impl<W: Write> CsvRecorder<W> {
    pub fn new(writer: W, columns: &[String]) -> Result<Self> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(columns).context("failed to write CSV header")?;
        Ok(Self { writer, width: columns.len(), rows: 0 })
    }

    pub fn write_row(&mut self, row: &RecordingRow) -> Result<()> {
        let fields = row.to_fields();
        ensure!(
            fields.len() == self.width,
            "row has {} cells but the header has {}",
            fields.len(),
            self.width
        );
        self.writer.write_record(&fields).context("failed to write CSV row")?;
        self.rows += 1;
        Ok(())
    }

    /// Flushes and returns the number of data rows written.
    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush().context("failed to flush CSV output")?;
        Ok(self.rows)
    }
}

/// One-shot export of a whole recording.
pub fn save_csv(path: &Path, columns: &[String], rows: &[RecordingRow]) -> Result<usize> {
    let mut recorder = CsvRecorder::create(path, columns)?;
    for row in rows {
        recorder.write_row(row)?;
    }
    let written = recorder.finish()?;
    log::info!("💾 saved {written} rows to {}", path.display());
    Ok(written)
}
