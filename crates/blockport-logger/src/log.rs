use crate::severity::LogSeverity;
use crate::systime::now;
use once_cell::sync::Lazy;

/// Environment variable holding the minimum severity that gets printed.
pub const LOG_LEVEL_ENV: &str = "BLOCKPORT_LOG";

static MIN_SEVERITY: Lazy<LogSeverity> = Lazy::new(|| {
    std::env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|level| level.parse().ok())
        .unwrap_or(LogSeverity::Info)
});

/// Severity threshold read once from `BLOCKPORT_LOG` (default `info`).
pub fn min_severity() -> LogSeverity {
    *MIN_SEVERITY
}

/// Writes one line to stderr. Stdout is left to command output.
pub fn log(msg: String, log_severity: LogSeverity) {
    if log_severity < min_severity() {
        return;
    }
    eprintln!("[{}] {} {}", log_severity, now(), msg);
}
