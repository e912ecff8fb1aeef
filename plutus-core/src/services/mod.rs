//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case.

mod doctor;
pub mod logging;
pub mod migration;
mod seed;
mod simulation;
mod status;
mod transfer;

pub use doctor::{CheckResult, DoctorResult, DoctorService, DoctorSummary};
pub use logging::{LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use seed::{SeedResult, SeedService};
pub use simulation::{SimulationService, SimulationSummary};
pub use status::{AccountSummary, StatusService, StatusSummary};
pub use transfer::TransferService;
