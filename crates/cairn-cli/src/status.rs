use std::io::{self, Write};
use std::time::{Duration, Instant};

const REFRESH: Duration = Duration::from_millis(100);

/// A single rewritable terminal line for live progress.
#[derive(Default)]
pub struct StatusLine {
    last: Option<Instant>,
    dirty: bool,
}

impl StatusLine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether enough time has passed since the last update.
    pub fn will_print(&self) -> bool {
        self.last.map_or(true, |t| t.elapsed() >= REFRESH)
    }

    /// Replace the line with `msg`.
    pub fn print(&mut self, msg: &str) {
        let mut out = io::stdout().lock();
        let _ = write!(out, "\r\x1b[2K{msg}");
        let _ = out.flush();
        self.last = Some(Instant::now());
        self.dirty = true;
    }

    /// Finish the line so later output starts fresh.
    pub fn done(&mut self) {
        if self.dirty {
            println!();
            self.dirty = false;
        }
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;
    const TB: u64 = 1024 * GB;

    if bytes >= TB {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

pub fn bytes_per_sec(bytes: u64, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return format_bytes(0);
    }
    format_bytes((bytes as f64 / secs) as u64)
}

/// Elapsed time rounded to hundredths of a second.
pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.2}s", elapsed.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_units() {
        assert_eq!(format_bytes(0), "0 bytes");
        assert_eq!(format_bytes(1023), "1023 bytes");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
        assert_eq!(format_bytes(2 * 1024 * 1024 * 1024 * 1024), "2.00 TB");
    }

    #[test]
    fn throughput() {
        assert_eq!(bytes_per_sec(2048, Duration::from_secs(2)), "1.00 KB");
        assert_eq!(bytes_per_sec(2048, Duration::ZERO), "0 bytes");
    }

    #[test]
    fn elapsed() {
        assert_eq!(format_elapsed(Duration::from_millis(1234)), "1.23s");
    }

    #[test]
    fn status_throttles() {
        let mut line = StatusLine::new();
        assert!(line.will_print());
        line.last = Some(Instant::now());
        assert!(!line.will_print());
        line.done();
    }
}
