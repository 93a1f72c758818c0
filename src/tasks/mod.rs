pub mod orchestrator;
pub mod status;

pub use orchestrator::{TaskOrchestrator, BASE_TASKS};
pub use status::TaskStatusStore;
