mod error;
mod orchestrator;
mod paths;
mod scheduler;

pub use error::{ApiError, AppError, Result};
pub use orchestrator::RefreshOrchestrator;
pub use paths::{AppPaths, ensure_data_dirs};
pub use scheduler::{DEFAULT_REFRESH_INTERVAL, IntervalTicker, Ticker, run_scheduler};
