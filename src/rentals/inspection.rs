use serde::{Deserialize, Serialize};

use crate::error::{RentalError, RentalResult};
use crate::rentals::{ConditionGrade, FuelLevel, InspectionType, VehicleInspection};

/// Difference between the check-out and check-in inspections of a rental
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionComparison {
    pub rental_id: i64,
    pub kilometers_driven: i32,
    pub fuel_at_check_out: FuelLevel,
    pub fuel_at_check_in: FuelLevel,
    pub condition_at_check_out: ConditionGrade,
    pub condition_at_check_in: ConditionGrade,
    /// Checklist items fine at check-out and not at check-in
    pub degraded_items: Vec<String>,
    /// Damage reported at check-in and absent at check-out
    pub new_damages: Option<String>,
    pub has_new_issues: bool,
}

/// Compare the two inspections of a rental
pub fn compare(
    check_out: &VehicleInspection,
    check_in: &VehicleInspection,
) -> RentalResult<InspectionComparison> {
    if check_out.inspection_type != InspectionType::CheckOut
        || check_in.inspection_type != InspectionType::CheckIn
    {
        return Err(RentalError::Validation(
            "Comparison needs a CHECK_OUT and a CHECK_IN inspection".to_string(),
        ));
    }

    let degraded_items: Vec<String> = check_out
        .checklist()
        .items()
        .iter()
        .zip(check_in.checklist().items().iter())
        .filter(|((_, before), (_, after))| *before && !*after)
        .map(|((name, _), _)| name.to_string())
        .collect();

    let new_damages = match (
        non_blank(&check_out.damages_description),
        non_blank(&check_in.damages_description),
    ) {
        (_, None) => None,
        (None, Some(after)) => Some(after.to_string()),
        (Some(before), Some(after)) if before != after => Some(after.to_string()),
        _ => None,
    };

    let has_new_issues = !degraded_items.is_empty() || new_damages.is_some();

    Ok(InspectionComparison {
        rental_id: check_out.rental_id,
        kilometers_driven: check_in.kilometers - check_out.kilometers,
        fuel_at_check_out: check_out.fuel_level,
        fuel_at_check_in: check_in.fuel_level,
        condition_at_check_out: check_out.overall_condition,
        condition_at_check_in: check_in.overall_condition,
        degraded_items,
        new_damages,
        has_new_issues,
    })
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
pub(crate) fn inspection(rental_id: i64, kind: InspectionType, km: i32) -> VehicleInspection {
    use chrono::Utc;

    VehicleInspection {
        id: 0,
        rental_id,
        inspection_type: kind,
        inspector_id: 2,
        kilometers: km,
        fuel_level: FuelLevel::Full,
        exterior_clean: true,
        interior_clean: true,
        tires_condition: true,
        lights_working: true,
        wipers_functional: true,
        spare_wheel_present: true,
        documents_present: true,
        first_aid_kit_present: true,
        warning_triangle_present: true,
        overall_condition: ConditionGrade::A,
        damages_description: None,
        photo_urls: Vec::new(),
        notes: None,
        inspection_date: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_inspections_have_no_issues() {
        let out = inspection(1, InspectionType::CheckOut, 10_000);
        let back = inspection(1, InspectionType::CheckIn, 10_300);
        let comparison = compare(&out, &back).unwrap();

        assert_eq!(comparison.kilometers_driven, 300);
        assert!(comparison.degraded_items.is_empty());
        assert!(comparison.new_damages.is_none());
        assert!(!comparison.has_new_issues);
    }

    #[test]
    fn test_degraded_checklist_items_reported() {
        let out = inspection(1, InspectionType::CheckOut, 10_000);
        let mut back = inspection(1, InspectionType::CheckIn, 10_300);
        back.exterior_clean = false;
        back.lights_working = false;

        let comparison = compare(&out, &back).unwrap();
        assert_eq!(comparison.degraded_items, vec!["exterior_clean", "lights_working"]);
        assert!(comparison.has_new_issues);
    }

    #[test]
    fn test_item_already_missing_is_not_degraded() {
        let mut out = inspection(1, InspectionType::CheckOut, 10_000);
        out.spare_wheel_present = false;
        let mut back = inspection(1, InspectionType::CheckIn, 10_300);
        back.spare_wheel_present = false;

        assert!(compare(&out, &back).unwrap().degraded_items.is_empty());
    }

    #[test]
    fn test_new_damage_reported() {
        let mut out = inspection(1, InspectionType::CheckOut, 10_000);
        out.damages_description = Some("Scratch on rear bumper".to_string());
        let mut back = inspection(1, InspectionType::CheckIn, 10_300);
        back.damages_description = Some("Scratch on rear bumper".to_string());
        assert!(compare(&out, &back).unwrap().new_damages.is_none());

        back.damages_description = Some("Dent on driver door".to_string());
        assert_eq!(
            compare(&out, &back).unwrap().new_damages.as_deref(),
            Some("Dent on driver door")
        );
    }

    #[test]
    fn test_inspection_types_must_match_roles() {
        let out = inspection(1, InspectionType::CheckOut, 10_000);
        let err = compare(&out, &out).unwrap_err();
        assert!(matches!(err, RentalError::Validation(_)));
    }
}
