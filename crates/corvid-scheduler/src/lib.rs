pub mod cron;
pub mod engine;

pub use cron::{CronExpr, CronField};
pub use engine::{Scheduler, CRON_MAX_JOBS};
