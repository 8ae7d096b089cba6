mod plan;
mod service;

pub use plan::{SessionPlanner, weakest_first};
pub use service::SessionPlanService;
