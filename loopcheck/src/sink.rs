//! Durable per-trial log.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::Result;
use crate::trial::TrialRecord;

/// Default CSV log file name.
pub const DEFAULT_LOG_FILE: &str = "serial_log.csv";

/// CSV header row.
pub const CSV_HEADER: &str = "timestamp,seq_no,tx_hex,rx_hex,error_type";

/// Destination for completed trial records.
pub trait RecordSink {
    /// Persist one record before the next trial starts.
    fn append(&mut self, record: &TrialRecord) -> Result<()>;
}

/// Append-only CSV file, one row per trial.
///
/// The file is reopened for every row so nothing is buffered across cycles.
#[derive(Debug, Clone)]
pub struct CsvLog {
    path: PathBuf,
}

impl CsvLog {
    /// Open `path`, writing the header if the file is new or empty.
    ///
    /// An existing non-empty file is appended to as-is.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                write_header(&mut file)?;
                debug!("Created log file {}", path.display());
            },
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                if fs::metadata(&path)?.len() == 0 {
                    let mut file = OpenOptions::new()
                        .append(true)
                        .open(&path)?;
                    write_header(&mut file)?;
                }
                debug!("Appending to existing log file {}", path.display());
            },
            Err(e) => return Err(e.into()),
        }
        Ok(Self { path })
    }

    /// Log file location.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_header(file: &mut File) -> io::Result<()> {
    writeln!(file, "{CSV_HEADER}")?;
    file.flush()
}

/// Render one CSV data row (without line terminator).
pub fn csv_row(record: &TrialRecord) -> String {
    format!(
        "{},{},{},{},{}",
        record.timestamp_text(),
        record.seq_no(),
        record.tx_hex(),
        record.rx_hex(),
        record
            .outcome()
            .label()
    )
}

impl RecordSink for CsvLog {
    fn append(&mut self, record: &TrialRecord) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", csv_row(record))?;
        file.flush()?;
        Ok(())
    }
}
