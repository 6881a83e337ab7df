//! Supervision of the frpc child process.

mod error;
mod events;
mod logs;
mod process;
mod status;

pub use error::SupervisorError;
pub use events::{ProcessEvent, StopSignal};
pub use logs::{LogBuffer, LogEntry, LogSource, MAX_LOG_LINES};
pub use process::{Supervisor, SupervisorConfig};
pub use status::{ErrorRecord, ExitRecord, ProcessStatus, StatusWithConnection};
