//! CsvSink - appends records to a local CSV file
//!
//! Params:
//! - `path` (required)
//! - `append` (default true): keep existing rows, header only for new files
//! - `columns`: comma separated, defaults to [`DEFAULT_COLUMNS`]
//! - `delimiter`: single ASCII character or `tab` (default `,`)
//! - `include_header` (default true)
//!
//! Floats are written with six decimals, booleans lowercase, missing values as
//! empty cells. Rows are buffered; disk flushes run on the blocking pool.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use contracts::{DataSink, EgressRecord, TwinError};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument};

use super::{param_bool, param_list};

pub const DEFAULT_COLUMNS: [&str; 9] = [
    "timestamp",
    "processed_at",
    "asset_id",
    "twin_id",
    "model_version",
    "raw_value",
    "twin_estimate",
    "anomaly_flag",
    "residual",
];

/// Rows between automatic flushes
const FLUSH_EVERY: u64 = 100;

#[derive(Debug, Clone)]
pub struct CsvSinkConfig {
    pub path: PathBuf,
    pub append: bool,
    pub columns: Vec<String>,
    pub delimiter: u8,
    pub include_header: bool,
}

impl CsvSinkConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            append: true,
            columns: DEFAULT_COLUMNS.iter().map(|c| c.to_string()).collect(),
            delimiter: b',',
            include_header: true,
        }
    }

    pub fn from_params(name: &str, params: &HashMap<String, String>) -> Result<Self, TwinError> {
        let path = params
            .get("path")
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| {
                TwinError::sink(name, "csv sink requires a 'path' param").with_detail("param", "path")
            })?;

        let mut config = Self::new(path);
        config.append = param_bool(name, params, "append", true)?;
        config.include_header = param_bool(name, params, "include_header", true)?;
        if let Some(columns) = param_list(params, "columns").filter(|c| !c.is_empty()) {
            config.columns = columns;
        }
        if let Some(raw) = params.get("delimiter") {
            config.delimiter = parse_delimiter(raw).ok_or_else(|| {
                TwinError::sink(name, format!("invalid csv delimiter '{raw}'"))
                    .with_detail("param", "delimiter")
            })?;
        }
        Ok(config)
    }
}

fn parse_delimiter(raw: &str) -> Option<u8> {
    match raw {
        "tab" | "\\t" | "\t" => Some(b'\t'),
        _ => {
            let mut bytes = raw.bytes();
            match (bytes.next(), bytes.next()) {
                (Some(b), None) if b.is_ascii() && b != b'"' && b != b'\n' => Some(b),
                _ => None,
            }
        }
    }
}

/// Render one cell
fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => match (n.is_f64(), n.as_f64()) {
            (true, Some(f)) => format!("{f:.6}"),
            _ => n.to_string(),
        },
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

pub struct CsvSink {
    name: String,
    config: CsvSinkConfig,
    writer: Arc<Mutex<Option<csv::Writer<File>>>>,
    records_written: AtomicU64,
}

impl CsvSink {
    pub fn new(name: impl Into<String>, config: CsvSinkConfig) -> Self {
        Self {
            name: name.into(),
            config,
            writer: Arc::new(Mutex::new(None)),
            records_written: AtomicU64::new(0),
        }
    }

    pub fn from_params(name: &str, params: &HashMap<String, String>) -> Result<Self, TwinError> {
        Ok(Self::new(name, CsvSinkConfig::from_params(name, params)?))
    }

    pub fn path(&self) -> &PathBuf {
        &self.config.path
    }

    fn row(&self, fields: &Map<String, Value>) -> Vec<String> {
        self.config
            .columns
            .iter()
            .map(|column| cell(fields.get(column)))
            .collect()
    }

    /// Flush the buffered rows to disk off the async workers
    async fn flush_blocking(&self) -> Result<(), TwinError> {
        let writer = Arc::clone(&self.writer);
        tokio::task::spawn_blocking(move || match writer.lock().as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        })
        .await
        .map_err(|e| TwinError::sink(&self.name, format!("flush task failed: {e}")))??;
        Ok(())
    }

    fn csv_error(&self, action: &str, e: csv::Error) -> TwinError {
        TwinError::sink(&self.name, format!("failed to {action}: {e}"))
            .with_detail("path", self.config.path.display())
    }
}

#[async_trait]
impl DataSink for CsvSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "csv_sink_open", skip(self), fields(sink = %self.name, path = %self.config.path.display()))]
    async fn open(&self) -> Result<(), TwinError> {
        let path = &self.config.path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let has_rows = fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(self.config.append)
            .truncate(!self.config.append)
            .open(path)?;

        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.config.delimiter)
            .has_headers(false)
            .from_writer(file);

        if self.config.include_header && (!has_rows || !self.config.append) {
            writer
                .write_record(&self.config.columns)
                .map_err(|e| self.csv_error("write header", e))?;
            writer.flush()?;
            debug!("header written");
        }

        *self.writer.lock() = Some(writer);
        info!(columns = self.config.columns.len(), "csv sink opened");
        Ok(())
    }

    async fn write(&self, record: &EgressRecord) -> Result<(), TwinError> {
        let row = self.row(&record.to_json_map());

        {
            let mut guard = self.writer.lock();
            let writer = guard
                .as_mut()
                .ok_or_else(|| TwinError::sink(&self.name, "csv sink is not open"))?;
            writer
                .write_record(&row)
                .map_err(|e| self.csv_error("write row", e))?;
        }

        let written = self.records_written.fetch_add(1, Ordering::Relaxed) + 1;
        if written % FLUSH_EVERY == 0 {
            self.flush_blocking().await?;
        }
        Ok(())
    }

    async fn flush(&self) -> Result<(), TwinError> {
        self.flush_blocking().await
    }

    #[instrument(name = "csv_sink_close", skip(self), fields(sink = %self.name))]
    async fn close(&self) -> Result<(), TwinError> {
        let writer = self.writer.lock().take();
        if let Some(mut writer) = writer {
            tokio::task::spawn_blocking(move || writer.flush())
                .await
                .map_err(|e| TwinError::sink(&self.name, format!("close task failed: {e}")))??;
            info!(
                records = self.records_written.load(Ordering::Relaxed),
                "csv sink closed"
            );
        }
        Ok(())
    }

    async fn health_check(&self) -> Value {
        json!({
            "name": self.name,
            "type": "csv",
            "status": if self.writer.lock().is_some() { "ok" } else { "closed" },
            "path": self.config.path.display().to_string(),
            "records_written": self.records_written.load(Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::test_support::record;
    use tempfile::TempDir;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_writes_header_and_formatted_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out/twin.csv");
        let sink = CsvSink::new("csv", CsvSinkConfig::new(&path));

        sink.open().await.unwrap();
        sink.write(&record(10.0)).await.unwrap();
        sink.close().await.unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], DEFAULT_COLUMNS.join(","));
        assert_eq!(
            lines[1],
            "2025-01-15T10:30:00Z,2025-01-15T10:30:00Z,motor-001,motor-twin,1.0.0,10.000000,5.000000,false,5.000000"
        );
    }

    #[tokio::test]
    async fn test_append_skips_header_for_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("twin.csv");
        let path_str = path.to_str().unwrap();
        let sink_params = params(&[("path", path_str), ("columns", "raw_value,anomaly_flag")]);

        for _ in 0..2 {
            let sink = CsvSink::from_params("csv", &sink_params).unwrap();
            sink.open().await.unwrap();
            sink.write(&record(1.5)).await.unwrap();
            sink.close().await.unwrap();
        }

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "raw_value,anomaly_flag\n1.500000,false\n1.500000,false\n");
    }

    #[tokio::test]
    async fn test_overwrite_and_delimiter() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("twin.tsv");
        fs::write(&path, "stale\n").unwrap();

        let sink = CsvSink::from_params(
            "tsv",
            &params(&[
                ("path", path.to_str().unwrap()),
                ("append", "false"),
                ("delimiter", "tab"),
                ("columns", "asset_id,confidence"),
            ]),
        )
        .unwrap();
        sink.open().await.unwrap();
        sink.write(&record(1.0)).await.unwrap();
        sink.close().await.unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "asset_id\tconfidence\nmotor-001\t\n"
        );
    }

    #[tokio::test]
    async fn test_rows_reach_disk_on_flush_and_every_hundred() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("twin.csv");
        let mut config = CsvSinkConfig::new(&path);
        config.columns = vec!["raw_value".into()];
        let sink = CsvSink::new("csv", config);
        sink.open().await.unwrap();

        sink.write(&record(1.0)).await.unwrap();
        sink.flush().await.unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 2);

        for _ in 0..99 {
            sink.write(&record(2.0)).await.unwrap();
        }
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 101);

        sink.close().await.unwrap();
        sink.flush().await.unwrap();
    }

    #[tokio::test]
    async fn test_write_before_open_fails() {
        let dir = TempDir::new().unwrap();
        let sink = CsvSink::new("csv", CsvSinkConfig::new(dir.path().join("x.csv")));
        assert!(sink.write(&record(1.0)).await.is_err());
        assert_eq!(sink.health_check().await["status"], "closed");
    }

    #[test]
    fn test_invalid_params() {
        assert!(CsvSink::from_params("csv", &params(&[])).is_err());
        assert!(CsvSink::from_params("csv", &params(&[("path", "a.csv"), ("delimiter", ";;")])).is_err());
        let config = CsvSinkConfig::from_params("csv", &params(&[("path", "a.csv"), ("delimiter", ";")])).unwrap();
        assert_eq!(config.delimiter, b';');
    }
}
