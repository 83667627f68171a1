// Upload progress across several HTTP requests.
//
// Each request reports bytes sent through its own counter, which starts at
// zero again for every request. `ProgressState` folds those counters into
// one running total for the whole operation, and `ProgressAggregator` turns
// that total into a rate-limited "speed / percent / ETA" line on stderr.

use indicatif::{ProgressBar, ProgressStyle};
use std::collections::VecDeque;
use std::fmt;
use std::io::IsTerminal;
use std::time::{Duration, Instant};

const SAMPLE_CAPACITY: usize = 20;
const RENDER_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
struct Sample {
    bytes: u64,
    elapsed: Duration,
}

/// Byte accounting for one orchestrated upload.
#[derive(Debug, Clone)]
pub struct ProgressState {
    total: u64,
    /// bytes of requests that have already finished
    confirmed: u64,
    last_raw: u64,
    last_sampled: u64,
    samples: VecDeque<Sample>,
    last_render: Instant,
}

impl ProgressState {
    pub fn new(total: u64, now: Instant) -> Self {
        Self {
            total,
            confirmed: 0,
            last_raw: 0,
            last_sampled: 0,
            samples: VecDeque::with_capacity(SAMPLE_CAPACITY),
            last_render: now,
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Bytes sent so far across all requests, never above `total`.
    pub fn sent(&self) -> u64 {
        self.confirmed.saturating_add(self.last_raw).min(self.total)
    }

    pub fn is_complete(&self) -> bool {
        self.sent() >= self.total
    }

    /// Feed the request-local counter. A value below the previous one means
    /// a new request started: the previous request's last value is folded
    /// into the confirmed total and the local baseline restarts at zero.
    pub fn observe(&mut self, raw: u64) {
        if raw < self.last_raw {
            self.confirmed = self.confirmed.saturating_add(self.last_raw).min(self.total);
            self.last_raw = 0;
        }
        self.last_raw = raw;
    }

    /// Record a speed sample if enough time passed since the last one.
    fn sample(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_render);
        if elapsed < RENDER_INTERVAL {
            return false;
        }
        let sent = self.sent();
        if self.samples.len() == SAMPLE_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(Sample {
            bytes: sent.saturating_sub(self.last_sampled),
            elapsed,
        });
        self.last_sampled = sent;
        self.last_render = now;
        true
    }

    /// Bytes per second over the sample window.
    pub fn speed(&self) -> f64 {
        let bytes: u64 = self.samples.iter().map(|s| s.bytes).sum();
        let secs: f64 = self.samples.iter().map(|s| s.elapsed.as_secs_f64()).sum();
        if secs > 0.0 {
            bytes as f64 / secs
        } else {
            0.0
        }
    }

    pub fn eta(&self) -> Eta {
        let speed = self.speed();
        if speed <= 0.0 {
            return Eta::Stalling;
        }
        let remaining = self.total.saturating_sub(self.sent()) as f64;
        Duration::try_from_secs_f64(remaining / speed)
            .map(Eta::Remaining)
            .unwrap_or(Eta::Stalling)
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.sent() as f64 * 100.0 / self.total as f64
        }
    }

    pub fn render_line(&self) -> String {
        format!(
            "{}/s uploaded: {:.1}% = {}; ETA: {}",
            format_bytes(self.speed()),
            self.percent(),
            format_bytes(self.sent() as f64),
            self.eta()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Eta {
    Remaining(Duration),
    Stalling,
}

impl fmt::Display for Eta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Eta::Stalling => f.write_str("stalling"),
            Eta::Remaining(left) => f.write_str(&format_duration(*left)),
        }
    }
}

/// Renders one progress line for a sequence of upload requests.
///
/// Call [`set_total`](Self::set_total) before the first sample and
/// [`reset`](Self::reset) when the operation ends, however it ends.
pub struct ProgressAggregator {
    interactive: bool,
    state: Option<ProgressState>,
    line: Option<ProgressBar>,
}

impl ProgressAggregator {
    pub fn new(interactive: bool) -> Self {
        Self {
            interactive,
            state: None,
            line: None,
        }
    }

    /// Aggregator that draws on stderr when stderr is a terminal.
    pub fn stderr() -> Self {
        Self::new(std::io::stderr().is_terminal())
    }

    pub fn set_total(&mut self, total: u64) {
        self.set_total_at(total, Instant::now());
    }

    pub fn set_total_at(&mut self, total: u64, now: Instant) {
        self.clear_line();
        self.state = Some(ProgressState::new(total, now));
        if self.interactive {
            let line = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("{msg}") {
                line.set_style(style);
            }
            self.line = Some(line);
        }
    }

    pub fn on_raw_sample(&mut self, raw: u64) -> Option<String> {
        self.on_raw_sample_at(raw, Instant::now())
    }

    /// Feed a request-local byte counter. Returns the rendered line when one
    /// was drawn.
    pub fn on_raw_sample_at(&mut self, raw: u64, now: Instant) -> Option<String> {
        let state = self.state.as_mut()?;
        state.observe(raw);

        if !self.interactive {
            return None;
        }
        if state.is_complete() {
            self.clear_line();
            return None;
        }
        if raw == 0 || !state.sample(now) {
            return None;
        }

        let rendered = state.render_line();
        if let Some(line) = &self.line {
            line.set_message(rendered.clone());
        }
        Some(rendered)
    }

    pub fn state(&self) -> Option<&ProgressState> {
        self.state.as_ref()
    }

    /// Retire the state of the finished operation and clear the line.
    pub fn reset(&mut self) {
        self.clear_line();
        self.state = None;
    }

    fn clear_line(&mut self) {
        if let Some(line) = self.line.take() {
            line.finish_and_clear();
        }
    }
}

/// Human readable size with binary units, e.g. `512B` or `3.25MiB`.
pub fn format_bytes(bytes: f64) -> String {
    const UNITS: [&str; 9] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB", "ZiB", "YiB"];
    const BOUNDARY: f64 = 2048.0;

    let mut value = bytes;
    let mut unit = UNITS[0];
    for candidate in UNITS {
        unit = candidate;
        if value.abs() <= BOUNDARY {
            break;
        }
        value /= 1024.0;
    }

    if unit == "B" {
        format!("{:.0}{}", value, unit)
    } else {
        format!("{:.2}{}", value, unit)
    }
}

/// `MM:SS` below an hour, `H:MM:SS` above.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64().round() as u64;
    let hours = secs / 3600;
    let minutes = (secs / 60) % 60;
    let seconds = secs % 60;
    if hours >= 1 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}
