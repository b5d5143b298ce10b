//! JSONL telemetry logger with file rotation

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use super::types::TelemetryRecord;
use crate::config::TelemetryConfig;
use crate::error::Result;
use crate::protocol::message::{GpsPayload, Message, MessageBody, TelemetryPayload};

const FILE_PREFIX: &str = "telemetry_";
const FILE_EXTENSION: &str = "jsonl";

/// Appends received rover messages to rotating JSONL files
///
/// Telemetry, GPS and error messages are logged; everything else is ignored.
/// A new file is started every `max_records_per_file` records and only the
/// newest `max_files_to_keep` files are kept.
#[derive(Debug)]
pub struct TelemetryLogger {
    log_dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    writer: Option<BufWriter<File>>,
    current_file: Option<PathBuf>,
    records_in_file: usize,
    records_written: u64,
    file_seq: u32,
    latest_telemetry: Option<TelemetryPayload>,
    latest_gps: Option<GpsPayload>,
}

impl TelemetryLogger {
    /// Create a logger, creating `log_dir` if needed
    ///
    /// # Errors
    ///
    /// Returns `Io` error if the directory cannot be created
    pub fn new(config: &TelemetryConfig) -> Result<Self> {
        let log_dir = PathBuf::from(&config.log_dir);
        fs::create_dir_all(&log_dir)?;
        info!("Telemetry log directory: {}", log_dir.display());

        Ok(Self {
            log_dir,
            max_records_per_file: config.max_records_per_file.max(1),
            max_files_to_keep: config.max_files_to_keep.max(1),
            writer: None,
            current_file: None,
            records_in_file: 0,
            records_written: 0,
            file_seq: 0,
            latest_telemetry: None,
            latest_gps: None,
        })
    }

    /// Record a received message
    ///
    /// # Returns
    ///
    /// `true` if the message was written to the log
    ///
    /// # Errors
    ///
    /// Returns `Io` or `Json` error if the record could not be written
    pub fn log(&mut self, message: &Message) -> Result<bool> {
        match &message.body {
            MessageBody::Telemetry(payload) => self.latest_telemetry = Some(payload.clone()),
            MessageBody::Gps(payload) => self.latest_gps = Some(payload.clone()),
            MessageBody::Error(payload) => {
                warn!("Rover error {}: {}", payload.error_code, payload.message)
            }
            _ => return Ok(false),
        }

        let record = TelemetryRecord::from_message(message, Utc::now())?;
        self.write_record(&record)?;
        Ok(true)
    }

    fn write_record(&mut self, record: &TelemetryRecord) -> Result<()> {
        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }

        if let Some(writer) = self.writer.as_mut() {
            serde_json::to_writer(&mut *writer, record)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }

        self.records_in_file += 1;
        self.records_written += 1;
        Ok(())
    }

    /// Close the current file and start a new one
    fn rotate(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }

        let name = format!(
            "{}{}_{:04}.{}",
            FILE_PREFIX,
            Utc::now().format("%Y%m%d_%H%M%S"),
            self.file_seq,
            FILE_EXTENSION
        );
        self.file_seq = self.file_seq.wrapping_add(1);

        let path = self.log_dir.join(name);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!("Telemetry log file: {}", path.display());

        self.writer = Some(BufWriter::new(file));
        self.current_file = Some(path);
        self.records_in_file = 0;

        self.prune_old_files()
    }

    /// Delete the oldest log files beyond `max_files_to_keep`
    fn prune_old_files(&self) -> Result<()> {
        let mut files = log_files(&self.log_dir)?;
        if files.len() <= self.max_files_to_keep {
            return Ok(());
        }

        files.sort();
        let excess = files.len() - self.max_files_to_keep;
        for path in files.into_iter().take(excess) {
            match fs::remove_file(&path) {
                Ok(()) => debug!("Removed old telemetry log {}", path.display()),
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
        Ok(())
    }

    /// Flush buffered records to disk
    ///
    /// # Errors
    ///
    /// Returns `Io` error if the flush fails
    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    pub fn latest_telemetry(&self) -> Option<&TelemetryPayload> {
        self.latest_telemetry.as_ref()
    }

    pub fn latest_gps(&self) -> Option<&GpsPayload> {
        self.latest_gps.as_ref()
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn current_file(&self) -> Option<&Path> {
        self.current_file.as_deref()
    }
}

/// Telemetry log files in `dir`
fn log_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        let is_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with(FILE_PREFIX))
            .unwrap_or(false)
            && path.extension().and_then(|e| e.to_str()) == Some(FILE_EXTENSION);
        if is_log {
            files.push(path);
        }
    }
    Ok(files)
}
