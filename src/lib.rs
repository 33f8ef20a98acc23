pub mod cli;
pub mod config;
pub mod deeplink;
pub mod error;
pub mod gateway;
pub mod identifier;
pub mod orchestrator;
pub mod session;
pub mod telemetry;
pub mod ui;
pub mod workflow;

pub use error::AppError;
pub use identifier::{Identifier, validate};
pub use orchestrator::WorkflowOrchestrator;
pub use workflow::{State, Workflow};
