pub mod log;
pub mod severity;
pub mod systime;

pub use log::{log, min_severity};
pub use severity::LogSeverity;
