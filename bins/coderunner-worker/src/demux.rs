//! Single-channel framing protocol
//!
//! An exec returns one combined output stream, so the instrumented run prints
//! a trailer after the program finishes:
//!
//! ```text
//! ---PROG---
//! <captured program stdout>
//! ---TIME---
//! TIME:<wall seconds>
//! MEM:<peak RSS in KB>
//! ```
//!
//! Anything before `---PROG---` is noise from the wrapper. Without both
//! markers (e.g. the exec was cut short) the whole stream is taken as stdout
//! and telemetry is absent.

pub const PROGRAM_MARKER: &str = "---PROG---";
pub const TIME_MARKER: &str = "---TIME---";
pub const TIME_TAG: &str = "TIME:";
pub const MEM_TAG: &str = "MEM:";

#[derive(Debug, Clone, PartialEq)]
pub struct Demultiplexed {
    pub stdout: String,
    pub elapsed_seconds: Option<f64>,
    pub peak_memory_kb: Option<u64>,
}

pub fn demultiplex(combined: &str) -> Demultiplexed {
    let Some(prog_at) = combined.find(PROGRAM_MARKER) else {
        return unframed(combined);
    };
    let framed = &combined[prog_at + PROGRAM_MARKER.len()..];

    // Last occurrence: the program may print the marker text itself
    let Some(time_at) = framed.rfind(TIME_MARKER) else {
        return unframed(combined);
    };

    let stdout = framed[..time_at].trim().to_string();
    let report = &framed[time_at + TIME_MARKER.len()..];

    let mut elapsed_seconds = None;
    let mut peak_memory_kb = None;
    for line in report.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix(TIME_TAG) {
            elapsed_seconds = parse_seconds(value);
        } else if let Some(value) = line.strip_prefix(MEM_TAG) {
            peak_memory_kb = value.trim().parse::<u64>().ok();
        }
    }

    Demultiplexed {
        stdout,
        elapsed_seconds,
        peak_memory_kb,
    }
}

fn unframed(combined: &str) -> Demultiplexed {
    Demultiplexed {
        stdout: combined.trim().to_string(),
        elapsed_seconds: None,
        peak_memory_kb: None,
    }
}

fn parse_seconds(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
}
