//! Queue Module
//!
//! Sequential, rate-limited execution of async calls.

pub mod error;
pub mod pending;
pub mod task_queue;

pub use error::{QueueError, TaskError};
pub use pending::PendingResult;
pub use task_queue::{QueueConfig, QueueStats, RateLimitedQueue};
