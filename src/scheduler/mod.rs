mod scheduler;

pub use scheduler::{ScheduledTask, Scheduler};
