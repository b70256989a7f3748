use crate::error::{RentalError, RentalResult};
use crate::reservations::ReservationStatus;

/// Reservation lifecycle
///
/// PENDING → CONFIRMED → ACTIVE → COMPLETED, and PENDING | CONFIRMED →
/// CANCELLED. COMPLETED and CANCELLED are terminal.
pub struct ReservationStatusMachine;

impl ReservationStatusMachine {
    /// Check whether a status transition is valid
    pub fn is_valid_transition(from: ReservationStatus, to: ReservationStatus) -> bool {
        use ReservationStatus::*;

        matches!(
            (from, to),
            (Pending, Confirmed)
                | (Confirmed, Active)
                | (Active, Completed)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
        )
    }

    /// Validate the move of reservation `id`, returning the target status
    pub fn transition(
        id: i64,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> RentalResult<ReservationStatus> {
        if Self::is_valid_transition(from, to) {
            Ok(to)
        } else {
            Err(RentalError::invalid_transition("Reservation", id, from, to))
        }
    }
}
