// Guided breathing + chant sessions
//
// SessionRunner executes one session; SessionScheduler decides when, keeps
// the aggregate ChantStats and isolates faults.

pub mod record;
pub mod runner;
pub mod scheduler;

pub use record::{ChantSession, ChantStats};
pub use runner::{SessionRunner, SessionScript, SessionStep};
pub use scheduler::{SchedulerStatus, SessionCallback, SessionScheduler, TickOutcome};
