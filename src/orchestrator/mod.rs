// Cross-Service Orchestrator
// Saga steps run after local rental commits, with per-step outcomes persisted

pub mod handlers;
pub mod repository;
pub mod saga;
pub mod service;

pub use handlers::*;
pub use repository::{PgSagaLog, SagaLog};
pub use saga::*;
pub use service::Orchestrator;
