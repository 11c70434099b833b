//! Background job scheduler and job implementations.

mod pool_metrics;
mod scheduler;
mod sweeper;

pub use pool_metrics::PoolMetricsJob;
pub use scheduler::JobScheduler;
pub use sweeper::SweeperJob;
