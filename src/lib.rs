// Library surface for the binary, headless runs and integration tests.
pub mod app_dirs;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod plan;
pub mod plan_builder;
pub mod planner;
pub mod runtime;
pub mod session;
pub mod store;
pub mod timer;
pub mod util;

pub use orchestrator::SessionOrchestrator;
pub use plan::{PracticeMethod, PracticePlan, PracticeSection};
pub use timer::{CountdownTimer, TimerEvent, TimerPhase};
