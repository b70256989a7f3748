// Rental contract generation

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::clients::VehicleSnapshot;
use crate::rentals::{ChargeRates, NewContract, Rental};

/// Contract number derived from the check-out day and the rental id
pub fn contract_number(rental_id: i64, issued_at: DateTime<Utc>) -> String {
    format!("CTR-{}-{:06}", issued_at.format("%Y%m%d"), rental_id)
}

/// SHA-256 of the contract text, hex encoded
pub fn content_hash(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

pub fn terms_and_conditions(rates: &ChargeRates) -> String {
    [
        "1. The vehicle is returned at the agreed return location by the planned end date.".to_string(),
        format!(
            "2. Each rental day includes {} km; every extra km is charged {}.",
            rates.included_km_per_day, rates.extra_km_rate
        ),
        format!(
            "3. Each fuel gauge quarter missing at return is charged {}.",
            rates.fuel_tier_surcharge
        ),
        format!(
            "4. Every started day of late return is charged at {} times the daily rate.",
            rates.late_fee_multiplier
        ),
        "5. Damage not recorded at check-out is the renter's responsibility.".to_string(),
        "6. The deposit is released once the check-in inspection is completed.".to_string(),
    ]
    .join("\n")
}

/// Build the contract issued at check-out
pub fn generate(
    rental: &Rental,
    vehicle: &VehicleSnapshot,
    rates: &ChargeRates,
    issued_at: DateTime<Utc>,
) -> NewContract {
    let number = contract_number(rental.id, issued_at);
    let content = [
        format!("RENTAL CONTRACT {}", number),
        format!("Issued: {}", issued_at.to_rfc3339()),
        format!("Rental: {} (reservation {})", rental.id, rental.reservation_id),
        format!("Customer: {}", rental.user_id),
        format!(
            "Vehicle: {} {} ({})",
            vehicle.brand, vehicle.model, vehicle.license_plate
        ),
        format!(
            "Period: {} to {}",
            rental.start_date.to_rfc3339(),
            rental.end_date.to_rfc3339()
        ),
        format!("Pickup: {}", rental.pickup_location),
        format!("Return: {}", rental.return_location),
        format!("Price: {}", rental.base_price),
        format!("Deposit: {}", rental.deposit),
    ]
    .join("\n");

    NewContract {
        rental_id: rental.id,
        contract_number: number,
        content_hash: content_hash(&content),
        content,
        terms_and_conditions: terms_and_conditions(rates),
    }
}
