/// Joint-state extraction from a JSON Lines telemetry log
///
/// Each non-blank line of the log is one message:
///
/// ```text
/// {"timestamp": 1584625339.25, "channel": "/arm/state_joint_current",
///  "message": {"position": [..6], "velocity": [..6], "effort": [..6]}}
/// ```
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Deserialize;

use super::{Dataset, TelemetryCache, LABEL_DIM, NUM_JOINTS};

#[derive(Debug, Deserialize)]
struct LogRecord {
    #[serde(default)]
    timestamp: Option<f64>,
    channel: String,
    #[serde(default)]
    message: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct JointState {
    position: Option<Vec<f64>>,
    velocity: Option<Vec<f64>>,
    effort: Option<Vec<f64>>,
}

/// Extracts (positions ++ velocities, efforts) rows from one channel.
#[derive(Debug, Clone)]
pub struct TelemetryParser {
    channel: String,
}

impl TelemetryParser {
    /// Parser for messages whose channel contains `channel`
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
        }
    }

    /// Parse the whole log in file order.
    ///
    /// Any matching message lacking `position`, `velocity` or `effort`, or
    /// carrying one with a length other than 6, aborts with
    /// `MalformedMessage`.
    pub fn parse<P: AsRef<Path>>(&self, log_path: P) -> crate::Result<Dataset> {
        let path = log_path.as_ref();
        log::info!(
            "Reading telemetry log {:?} (channel filter {:?})",
            path,
            self.channel
        );

        let reader = BufReader::new(File::open(path)?);
        self.parse_reader(reader)
    }

    /// Parse from any buffered reader
    pub fn parse_reader<R: BufRead>(&self, reader: R) -> crate::Result<Dataset> {
        // Flat row-major buffers; Vec growth is amortized
        let mut features: Vec<f64> = Vec::new();
        let mut labels: Vec<f64> = Vec::new();
        let mut scanned = 0usize;
        let mut span: Option<(f64, f64)> = None;

        // Lines are split on raw bytes; invalid UTF-8 surfaces as a bad record
        for (idx, line) in reader.split(b'\n').enumerate() {
            let line_no = idx + 1;
            let line = line?;
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            scanned += 1;

            let record: LogRecord = serde_json::from_slice(&line).map_err(|e| {
                crate::EffortError::MalformedMessage {
                    line: line_no,
                    reason: format!("invalid record: {}", e),
                }
            })?;

            if !record.channel.contains(&self.channel) {
                continue;
            }

            let state: JointState = serde_json::from_value(record.message).map_err(|e| {
                crate::EffortError::MalformedMessage {
                    line: line_no,
                    reason: format!("invalid joint state: {}", e),
                }
            })?;

            let position = require_field(state.position, "position", line_no)?;
            let velocity = require_field(state.velocity, "velocity", line_no)?;
            let effort = require_field(state.effort, "effort", line_no)?;

            features.extend_from_slice(&position);
            features.extend_from_slice(&velocity);
            labels.extend_from_slice(&effort);

            if let Some(ts) = record.timestamp {
                span = Some(match span {
                    Some((first, _)) => (first, ts),
                    None => (ts, ts),
                });
            }
        }

        let rows = labels.len() / LABEL_DIM;
        log::info!("Reading log complete: {} of {} messages matched", rows, scanned);
        if let Some((first, last)) = span {
            log::debug!("Matched messages span {:.3}s", last - first);
        }
        if rows == 0 {
            log::warn!("No messages matched channel {:?}", self.channel);
        }

        Dataset::from_flat(features, labels)
    }

    /// Parse `log_path` and, only on success, write the result to `cache`.
    ///
    /// A log with no matching message is not cached.
    pub fn parse_and_cache<P: AsRef<Path>>(
        &self,
        log_path: P,
        cache: &TelemetryCache,
    ) -> crate::Result<Dataset> {
        let dataset = self.parse(log_path)?;
        if dataset.is_empty() {
            log::warn!("Not caching an empty dataset");
        } else {
            cache.save(&dataset)?;
        }
        Ok(dataset)
    }
}

fn require_field(
    values: Option<Vec<f64>>,
    name: &str,
    line: usize,
) -> crate::Result<Vec<f64>> {
    let values = values.ok_or_else(|| crate::EffortError::MalformedMessage {
        line,
        reason: format!("missing field `{}`", name),
    })?;

    if values.len() != NUM_JOINTS {
        return Err(crate::EffortError::MalformedMessage {
            line,
            reason: format!(
                "field `{}` has {} values, expected {}",
                name,
                values.len(),
                NUM_JOINTS
            ),
        });
    }

    Ok(values)
}
