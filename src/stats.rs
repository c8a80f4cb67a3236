//! Once-per-second throughput reporting.
//!
//! The sampler is polled from every loop iteration but does real work only
//! when a one-second wall-clock boundary has passed, so the hot path stays
//! an O(1) time comparison. Rendering goes to stdout as a carriage-return
//! overwrite line; the optional progress log gets one flushed line per
//! boundary so it survives an abrupt kill with at most one record lost.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::BYTES_PER_SAMPLE;

/// Scale a magnitude down by 1000 until it fits its unit, returning the
/// scaled value and the unit prefix (space for plain bytes)
pub fn autoscale(value: f32) -> (f32, char) {
    const PREFIXES: [char; 4] = [' ', 'k', 'M', 'G'];
    let mut value = value;
    let mut tier = 0;
    while value >= 1000.0 && tier + 1 < PREFIXES.len() {
        value /= 1000.0;
        tier += 1;
    }
    (value, PREFIXES[tier])
}

/// Append-only per-second progress record file
#[derive(Debug)]
pub struct ProgressLog {
    file: File,
}

impl ProgressLog {
    /// Create `path` exclusively, failing if it already exists
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .append(true)
            .create_new(true)
            .open(path)?;
        Ok(Self { file })
    }

    fn append(&mut self, now: DateTime<Utc>, samples: u64) -> io::Result<()> {
        writeln!(
            self.file,
            "{}.{} {}",
            now.timestamp(),
            now.timestamp_subsec_micros(),
            samples
        )
    }
}

pub struct StatsSampler {
    log: Option<ProgressLog>,
    next_at: Option<DateTime<Utc>>,
    last: Option<(DateTime<Utc>, u64)>,
}

impl StatsSampler {
    pub fn new(log: Option<ProgressLog>) -> Self {
        Self {
            log,
            next_at: None,
            last: None,
        }
    }

    /// Note the cumulative byte count; emits output only on 1 s boundaries.
    /// The first boundary just records the baseline, there is no rate yet.
    pub fn observe(&mut self, written: u64) {
        self.observe_at(Utc::now(), written);
    }

    fn observe_at(&mut self, now: DateTime<Utc>, written: u64) {
        if let Some(next_at) = self.next_at {
            if now < next_at {
                return;
            }
        }
        self.next_at = Some(now + Duration::seconds(1));
        if let Some((last_at, last_written)) = self.last {
            let elapsed = (now - last_at)
                .num_microseconds()
                .unwrap_or(i64::MAX) as f32
                / 1e6;
            let (rate, rate_prefix) = autoscale((written - last_written) as f32 / elapsed);
            let (total, total_prefix) = autoscale(written as f32);
            print!("\r~{rate:5.1} {rate_prefix}B/s, total: {total:6.2} {total_prefix}B");
            let _ = io::stdout().flush();
            if let Some(log) = &mut self.log {
                if let Err(e) = log.append(now, written / BYTES_PER_SAMPLE as u64) {
                    warn!("progress log write failed: {e}");
                }
            }
        }
        self.last = Some((now, written));
    }
}
