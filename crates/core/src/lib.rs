pub mod error;
pub mod evaluator;
pub mod model;
pub mod readiness;
pub mod scheduler;
pub mod time;

pub use error::Error;
pub use time::Clock;
