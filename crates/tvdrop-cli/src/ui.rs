//! Terminal rendering of server notifications.

use serde_json::json;

use tvdrop_core::reporter::ProgressReporter;

/// How notifications are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable lines
    Text,
    /// Only completions and failures
    Quiet,
    /// One JSON object per line
    Json,
}

/// Prints server and upload notifications to the terminal.
#[derive(Debug)]
pub struct ConsoleReporter {
    mode: OutputMode,
}

impl ConsoleReporter {
    /// Create a reporter for the given output mode.
    #[must_use]
    pub const fn new(mode: OutputMode) -> Self {
        Self { mode }
    }
}

fn emit_json(value: &serde_json::Value) {
    println!("{}", value);
}

impl ProgressReporter for ConsoleReporter {
    fn server_started(&self, url: &str) {
        match self.mode {
            OutputMode::Json => emit_json(&json!({ "event": "server_started", "url": url })),
            OutputMode::Text | OutputMode::Quiet => {
                println!("  Open {} on your TV or phone", url);
                println!();
            }
        }
    }

    fn server_stopped(&self) {
        match self.mode {
            OutputMode::Json => emit_json(&json!({ "event": "server_stopped" })),
            OutputMode::Text => println!("Server stopped."),
            OutputMode::Quiet => {}
        }
    }

    fn server_error(&self, message: &str) {
        match self.mode {
            OutputMode::Json => {
                emit_json(&json!({ "event": "server_error", "message": message }));
            }
            OutputMode::Text | OutputMode::Quiet => eprintln!("  Server error: {}", message),
        }
    }

    fn upload_progress(&self, filename: &str, bytes_written: u64, throughput_mbps: f64) {
        match self.mode {
            OutputMode::Json => emit_json(&json!({
                "event": "upload_progress",
                "filename": filename,
                "bytes": bytes_written,
                "mbps": throughput_mbps,
            })),
            OutputMode::Text => println!(
                "  ↑ {}  {}  ({})",
                filename,
                format_size(bytes_written),
                format_rate(throughput_mbps)
            ),
            OutputMode::Quiet => {}
        }
    }

    fn upload_complete(&self, filename: &str, final_size: u64) {
        match self.mode {
            OutputMode::Json => emit_json(&json!({
                "event": "upload_complete",
                "filename": filename,
                "size": final_size,
            })),
            OutputMode::Text | OutputMode::Quiet => {
                println!("  ✓ {}  {}", filename, format_size(final_size));
            }
        }
    }

    fn upload_incomplete(&self, filename: &str, bytes_written: u64) {
        match self.mode {
            OutputMode::Json => emit_json(&json!({
                "event": "upload_incomplete",
                "filename": filename,
                "bytes": bytes_written,
            })),
            OutputMode::Text | OutputMode::Quiet => println!(
                "  ! {}  kept {} after the sender went quiet",
                filename,
                format_size(bytes_written)
            ),
        }
    }

    fn upload_failed(&self, filename: &str, message: &str) {
        match self.mode {
            OutputMode::Json => emit_json(&json!({
                "event": "upload_failed",
                "filename": filename,
                "message": message,
            })),
            OutputMode::Text | OutputMode::Quiet => {
                eprintln!("  ✗ {}  {}", filename, message);
            }
        }
    }

    fn directory_error(&self, path: &str, message: &str) {
        match self.mode {
            OutputMode::Json => emit_json(&json!({
                "event": "directory_error",
                "path": path,
                "message": message,
            })),
            OutputMode::Text => eprintln!("  Cannot read {}: {}", path, message),
            OutputMode::Quiet => {}
        }
    }
}

/// Format a byte count for humans.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format a throughput in MB/s.
#[must_use]
pub fn format_rate(mbps: f64) -> String {
    if mbps >= 10.0 {
        format!("{:.0} MB/s", mbps)
    } else {
        format!("{:.1} MB/s", mbps)
    }
}
