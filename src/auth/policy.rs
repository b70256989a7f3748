// Authorization policy table
// Every handler checks its operation here before invoking core logic

use tracing::warn;

use crate::auth::{AuthenticatedUser, Role};
use crate::error::{RentalError, RentalResult};

/// Operations guarded by the policy table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    QuotePrice,
    CreateReservation,
    ViewReservation,
    ConfirmPayment,
    CancelReservation,
    ManageDiscountRules,
    CreateRental,
    ViewRental,
    ListOverdueRentals,
    CheckOutRental,
    CheckInRental,
    CompleteRental,
    CancelRental,
    SignContract,
    ReconcileOrchestration,
}

const ANY_ROLE: &[Role] = &[Role::Client, Role::Employee, Role::Admin];
const STAFF: &[Role] = &[Role::Employee, Role::Admin];
const ADMIN: &[Role] = &[Role::Admin];

/// Roles allowed to perform `operation`
pub fn required_roles(operation: Operation) -> &'static [Role] {
    match operation {
        Operation::QuotePrice
        | Operation::CreateReservation
        | Operation::ViewReservation
        | Operation::ConfirmPayment
        | Operation::CancelReservation
        | Operation::ViewRental
        | Operation::SignContract => ANY_ROLE,
        Operation::CreateRental
        | Operation::ListOverdueRentals
        | Operation::CheckOutRental
        | Operation::CheckInRental
        | Operation::CompleteRental
        | Operation::CancelRental => STAFF,
        Operation::ManageDiscountRules | Operation::ReconcileOrchestration => ADMIN,
    }
}

/// Fail with `Forbidden` when the caller's role is not in the table entry
pub fn authorize(user: &AuthenticatedUser, operation: Operation) -> RentalResult<()> {
    if required_roles(operation).contains(&user.role) {
        return Ok(());
    }
    warn!(
        "Authorization failed: user_id={}, role={}, operation={:?}",
        user.user_id, user.role, operation
    );
    Err(RentalError::Forbidden(format!(
        "Role {} may not perform {:?}",
        user.role, operation
    )))
}

/// Clients only reach their own records; staff reach every record
pub fn ensure_owner_or_staff(
    user: &AuthenticatedUser,
    owner_id: i64,
    resource: &str,
) -> RentalResult<()> {
    if user.role.is_staff() || user.user_id == owner_id {
        return Ok(());
    }
    warn!(
        "User {} attempted to access {} owned by {}",
        user.user_id, resource, owner_id
    );
    Err(RentalError::Forbidden(format!(
        "You don't have permission to access this {}",
        resource
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: 10,
            email: "someone@example.com".to_string(),
            role,
        }
    }

    #[test]
    fn test_client_can_reserve_but_not_check_out() {
        let client = user(Role::Client);
        assert!(authorize(&client, Operation::CreateReservation).is_ok());
        assert!(matches!(
            authorize(&client, Operation::CheckOutRental),
            Err(RentalError::Forbidden(_))
        ));
    }

    #[test]
    fn test_employee_handles_rentals() {
        let employee = user(Role::Employee);
        for op in [
            Operation::CreateRental,
            Operation::CheckOutRental,
            Operation::CheckInRental,
            Operation::CompleteRental,
            Operation::CancelRental,
        ] {
            assert!(authorize(&employee, op).is_ok(), "{:?}", op);
        }
        assert!(authorize(&employee, Operation::ManageDiscountRules).is_err());
    }

    #[test]
    fn test_admin_allowed_everywhere() {
        let admin = user(Role::Admin);
        for op in [
            Operation::QuotePrice,
            Operation::CheckInRental,
            Operation::ManageDiscountRules,
            Operation::ReconcileOrchestration,
        ] {
            assert!(authorize(&admin, op).is_ok());
        }
    }

    #[test]
    fn test_ownership() {
        let client = user(Role::Client);
        assert!(ensure_owner_or_staff(&client, 10, "reservation").is_ok());
        assert!(ensure_owner_or_staff(&client, 11, "reservation").is_err());
        assert!(ensure_owner_or_staff(&user(Role::Employee), 11, "reservation").is_ok());
    }
}
