//! Telemetry persistence
//!
//! Every outcome becomes one line of newline-delimited JSON, appended with a single write while
//! the recorder's lock is held. The stream can be tailed while a run is in progress.
use crate::error::RecorderError;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};
use volley_core::{Outcome, Record, SamplePolicy, Summary};

mod rollup;

use rollup::Rollup;

pub struct TelemetryRecorder {
    path: PathBuf,
    policy: SamplePolicy,
    pid: u32,
    start: Instant,
    state: Mutex<State>,
}

struct State {
    stream: Sink,
    csv: Option<Sink>,
    errors: Option<Sink>,
    sequence: u64,
    write_failures: u64,
    rollup: Rollup,
    summary: Option<Option<Summary>>,
}

impl TelemetryRecorder {
    /// Open (or create) the NDJSON stream at `path`, appending to whatever is already there.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, RecorderError> {
        let path = path.into();
        let stream = Sink::open(&path)?;
        debug!("Recording telemetry to {}", path.display());

        Ok(Self {
            path,
            policy: SamplePolicy::default(),
            pid: std::process::id(),
            start: Instant::now(),
            state: Mutex::new(State {
                stream,
                csv: None,
                errors: None,
                sequence: 0,
                write_failures: 0,
                rollup: Rollup::default(),
                summary: None,
            }),
        })
    }

    /// Mirror every record into a CSV file as well.
    pub fn with_csv(mut self, path: impl Into<PathBuf>) -> Result<Self, RecorderError> {
        let mut sink = Sink::open(&path.into())?;
        if sink.is_empty() {
            sink.append(rollup::CSV_HEADER.as_bytes())?;
        }
        self.state_mut().csv = Some(sink);
        Ok(self)
    }

    /// Mirror failed attempts into a separate NDJSON stream.
    pub fn with_error_stream(mut self, path: impl Into<PathBuf>) -> Result<Self, RecorderError> {
        let sink = Sink::open(&path.into())?;
        self.state_mut().errors = Some(sink);
        Ok(self)
    }

    /// Which records keep their exchange detail.
    ///
    /// A [`LoadTest`](crate::LoadTest) overrides this with its configured policy.
    pub fn sample_policy(mut self, policy: SamplePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// JSON and text summary locations, next to the telemetry stream.
    pub fn summary_paths(&self) -> (PathBuf, PathBuf) {
        let stem = self
            .path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "telemetry".to_string());
        (
            self.path.with_file_name(format!("{stem}.summary.json")),
            self.path.with_file_name(format!("{stem}.summary.txt")),
        )
    }

    /// Append one record for `outcome` and return its sequence number.
    ///
    /// A failed write is counted and returned; the recorder stays usable.
    pub fn record(&self, outcome: &Outcome) -> Result<u64, RecorderError> {
        let mut state = self.lock();
        let result = self.append(&mut state, outcome);
        if result.is_err() {
            state.write_failures += 1;
        }
        result
    }

    fn append(&self, state: &mut State, outcome: &Outcome) -> Result<u64, RecorderError> {
        let sequence = state.sequence + 1;
        let mut record = Record {
            sequence,
            pid: self.pid,
            outcome: outcome.clone(),
        };
        if !self.policy.keeps_detail(sequence) {
            record.outcome.exchange = None;
        }

        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        state.stream.append(&line)?;

        state.sequence = sequence;
        state.rollup.push(&record);

        if let Some(csv) = state.csv.as_mut() {
            csv.append(rollup::csv_line(&record).as_bytes())?;
        }
        if !record.outcome.success {
            if let Some(errors) = state.errors.as_mut() {
                errors.append(&line)?;
            }
        }

        Ok(sequence)
    }

    /// Records successfully appended so far.
    pub fn records_written(&self) -> u64 {
        self.lock().sequence
    }

    pub fn write_failures(&self) -> u64 {
        self.lock().write_failures
    }

    /// Flush every sink and write the JSON and text summaries.
    ///
    /// Nothing is written when no record was ever appended. Calling it again returns the first
    /// result without touching the files.
    pub fn finalize(&self) -> Result<Option<Summary>, RecorderError> {
        let mut state = self.lock();
        if let Some(summary) = &state.summary {
            return Ok(summary.clone());
        }

        state.stream.sync()?;
        if let Some(csv) = state.csv.as_mut() {
            csv.sync()?;
        }
        if let Some(errors) = state.errors.as_mut() {
            errors.sync()?;
        }

        let summary = state.rollup.summary(self.start.elapsed());
        if let Some(summary) = &summary {
            let (json_path, text_path) = self.summary_paths();
            let json = serde_json::to_vec_pretty(summary)?;
            write_file(&json_path, &json)?;
            write_file(&text_path, state.rollup.render_text(summary).as_bytes())?;

            info!(
                "Telemetry summary: {} records, {} failed, p95 {:.0}ms",
                summary.total, summary.failed, summary.p95_ms
            );
        } else {
            info!("No telemetry recorded, skipping summary.");
        }

        state.summary = Some(summary.clone());
        Ok(summary)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&mut self) -> &mut State {
        self.state.get_mut().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Read a telemetry stream back.
///
/// A final line without its terminating newline is treated as a write cut short and skipped.
/// Malformed lines anywhere else are an error.
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<Record>, RecorderError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| RecorderError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let complete = content.ends_with('\n');
    let lines: Vec<&str> = content.lines().collect();
    let mut records = Vec::with_capacity(lines.len());

    for (idx, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Record>(line) {
            Ok(record) => records.push(record),
            Err(_) if !complete && idx + 1 == lines.len() => {
                warn!(
                    "Skipping truncated final record in {} (line {})",
                    path.display(),
                    idx + 1
                );
            }
            Err(source) => {
                return Err(RecorderError::Parse {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    source,
                })
            }
        }
    }

    Ok(records)
}

struct Sink {
    path: PathBuf,
    file: File,
    /// Length of the file after the last complete append.
    len: u64,
    /// A failed append left bytes behind that could not be cut off.
    torn: bool,
}

impl Sink {
    fn open(path: &Path) -> Result<Self, RecorderError> {
        let open_err = |source| RecorderError::Open {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(open_err)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(open_err)?;
        let len = file.metadata().map_err(open_err)?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            len,
            torn: false,
        })
    }

    fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append `bytes` with a single write.
    ///
    /// A write that fails part way is cut back to the previous length, so the next record
    /// never lands on the tail of a half-written one. If the cut fails too, the next append
    /// starts on a fresh line instead.
    fn append(&mut self, bytes: &[u8]) -> Result<(), RecorderError> {
        let result = if self.torn {
            let mut buf = Vec::with_capacity(bytes.len() + 1);
            buf.push(b'\n');
            buf.extend_from_slice(bytes);
            self.file.write_all(&buf)
        } else {
            self.file.write_all(bytes)
        };

        match result {
            Ok(()) => {
                self.len = if self.torn {
                    self.file
                        .metadata()
                        .map(|m| m.len())
                        .unwrap_or(self.len + bytes.len() as u64 + 1)
                } else {
                    self.len + bytes.len() as u64
                };
                self.torn = false;
                Ok(())
            }
            Err(source) => {
                self.discard_partial();
                Err(RecorderError::Write {
                    path: self.path.clone(),
                    source,
                })
            }
        }
    }

    fn discard_partial(&mut self) {
        if let Err(err) = self.file.set_len(self.len) {
            debug!(
                "Could not cut {} back to {} bytes: {err}",
                self.path.display(),
                self.len
            );
            self.torn = true;
        }
    }

    fn sync(&mut self) -> Result<(), RecorderError> {
        self.file
            .flush()
            .and_then(|_| self.file.sync_all())
            .map_err(|source| RecorderError::Write {
                path: self.path.clone(),
                source,
            })
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), RecorderError> {
    fs::write(path, bytes).map_err(|source| RecorderError::Write {
        path: path.to_path_buf(),
        source,
    })
}
