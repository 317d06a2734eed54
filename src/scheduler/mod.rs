//! Background task scheduler: a single cooperative loop that wakes every
//! `interval` seconds, fires due tasks onto `output.text`, and recomputes
//! their `next_run`, per spec.md §4.9.

pub mod schedule;
pub mod task_repo;
pub mod tokio_scheduler;

pub use schedule::{ScheduleError, initial_next_run, recompute_next_run};
pub use task_repo::{InMemoryTaskRepository, SqliteTaskRepository, Task, TaskRepository};
pub use tokio_scheduler::{DEFAULT_INTERVAL_SECS, TokioScheduler};
