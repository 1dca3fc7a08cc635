pub mod severity;

pub use severity::LogSeverity;

use chrono::Local;

/// Writes one line to stdout: `[SEVERITY] YYYY-MM-DD HH:MM:SS message`.
pub fn log(msg: &str, severity: LogSeverity) {
    println!(
        "[{}] {} {}",
        severity,
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        msg
    );
}
