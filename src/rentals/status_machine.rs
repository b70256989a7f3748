use crate::error::{RentalError, RentalResult};
use crate::rentals::RentalStatus;

/// Rental lifecycle
///
/// PENDING → CHECKED_OUT → ACTIVE → CHECKED_IN → COMPLETED, plus
/// PENDING → CANCELLED. Once checked out a rental cannot be cancelled.
pub struct RentalStatusMachine;

impl RentalStatusMachine {
    pub fn is_valid_transition(from: RentalStatus, to: RentalStatus) -> bool {
        use RentalStatus::*;

        matches!(
            (from, to),
            (Pending, CheckedOut)
                | (CheckedOut, Active)
                | (Active, CheckedIn)
                | (CheckedIn, Completed)
                | (Pending, Cancelled)
        )
    }

    /// Validate the move of rental `id`, returning the target status
    pub fn transition(id: i64, from: RentalStatus, to: RentalStatus) -> RentalResult<RentalStatus> {
        if Self::is_valid_transition(from, to) {
            Ok(to)
        } else {
            Err(RentalError::invalid_transition("Rental", id, from, to))
        }
    }

    /// Statuses in which the vehicle is out with the customer
    pub fn is_in_progress(status: RentalStatus) -> bool {
        matches!(status, RentalStatus::CheckedOut | RentalStatus::Active)
    }
}
