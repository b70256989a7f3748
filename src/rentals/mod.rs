// Rental State Machine
// Check-out and check-in with inspections, additional charges and contracts

pub mod charges;
pub mod contract;
pub mod handlers;
pub mod inspection;
pub mod models;
pub mod repository;
pub mod service;
pub mod status_machine;

pub use charges::{AdditionalCharges, ChargeCalculator, ChargeInput, ChargeKind, ChargeLine, ChargeRates};
pub use handlers::*;
pub use inspection::InspectionComparison;
pub use models::*;
pub use repository::{PgRentalStore, RentalStore};
pub use service::{RentalService, RentalSettings};
pub use status_machine::RentalStatusMachine;
