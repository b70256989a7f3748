// Reservation State Machine
// Reservation records, lifecycle rules, storage and HTTP surface

pub mod handlers;
pub mod models;
pub mod repository;
pub mod service;
pub mod status_machine;

pub use handlers::*;
pub use models::*;
pub use repository::{PgReservationStore, ReservationStore};
pub use service::*;
pub use status_machine::ReservationStatusMachine;
