//! Concurrent execution of the pure core (`siem-kernel`): the backlog
//! registry, the reaper, the dispatcher, and the alarm-sink trait they all
//! report to.

mod alarm;
mod dispatcher;
mod engine;
mod reaper;
mod registry;

pub use alarm::{AlarmError, AlarmSink, NullAlarmSink};
pub use dispatcher::process;
pub use engine::{Collaborators, Engine};
pub use registry::{Backlog, Registry};
