//! Installation cost of an industry job

use serde::{Deserialize, Serialize};

use crate::bonus::FacilityProfile;
use crate::models::{ActivityKind, MaterialQuantity, TypeId};

/// Default facility tax of NPC stations, percent of EIV.
pub const NPC_FACILITY_TAX_PERCENT: f64 = 0.25;
/// Regulatory surcharge rate.
pub const SURCHARGE_RATE: f64 = 0.04;
/// Reaction job base cost as a fraction of EIV.
pub const REACTION_BASE_RATE: f64 = 0.02;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobCost {
    pub activity: ActivityKind,
    pub estimated_item_value: f64,
    pub system_cost_index: f64,
    /// True when the system had no index for this activity and 0 was used.
    pub cost_index_missing: bool,
    pub job_base_cost: f64,
    pub structure_cost_bonus: f64,
    pub gross_cost: f64,
    pub facility_tax_rate: f64,
    pub facility_tax: f64,
    pub surcharge: f64,
    pub total: f64,
    /// Materials left out of EIV for lack of an adjusted price.
    pub unpriced_materials: Vec<TypeId>,
}

/// EIV of `runs` runs over the unreduced base materials.
///
/// Materials without an adjusted price are skipped and returned separately.
pub fn estimated_item_value(
    base_materials: &[MaterialQuantity],
    runs: u32,
    adjusted_price: impl Fn(TypeId) -> Option<f64>,
) -> (f64, Vec<TypeId>) {
    let mut eiv = 0.0;
    let mut unpriced = Vec::new();
    for material in base_materials {
        match adjusted_price(material.type_id) {
            Some(price) => eiv += price * material.quantity as f64 * f64::from(runs),
            None => unpriced.push(material.type_id),
        }
    }
    (eiv, unpriced)
}

/// Facility tax in percent. An explicit rate always wins; otherwise NPC stations
/// charge the default and player structures charge nothing.
pub fn facility_tax_rate(facility: &FacilityProfile) -> f64 {
    match (facility.facility.facility_tax_rate, facility.facility.structure_type_id) {
        (Some(rate), _) => rate,
        (None, None) => NPC_FACILITY_TAX_PERCENT,
        (None, Some(_)) => 0.0,
    }
}

/// Job cost from an already computed EIV.
///
/// Manufacturing and invention share one formula; reactions use their own:
/// the base cost is 2% of EIV and the surcharge is taken from that base, not from EIV.
pub fn job_cost(
    activity: ActivityKind,
    estimated_item_value: f64,
    system_cost_index: Option<f64>,
    facility: &FacilityProfile,
) -> JobCost {
    let index = system_cost_index.unwrap_or(0.0);
    let tax_rate = facility_tax_rate(facility);
    let facility_tax = estimated_item_value * tax_rate / 100.0;

    let (job_base_cost, structure_cost_bonus, gross_cost, surcharge) = match activity {
        ActivityKind::Manufacturing | ActivityKind::Invention => {
            let bonus = facility.structure_cost_bonus();
            let gross = estimated_item_value * index * (1.0 - bonus / 100.0);
            (estimated_item_value, bonus, gross, estimated_item_value * SURCHARGE_RATE)
        }
        ActivityKind::Reaction => {
            let base = estimated_item_value * REACTION_BASE_RATE;
            (base, 0.0, base * index, base * SURCHARGE_RATE)
        }
    };

    JobCost {
        activity,
        estimated_item_value,
        system_cost_index: index,
        cost_index_missing: system_cost_index.is_none(),
        job_base_cost,
        structure_cost_bonus,
        gross_cost,
        facility_tax_rate: tax_rate,
        facility_tax,
        surcharge,
        total: gross_cost + facility_tax + surcharge,
        unpriced_materials: Vec::new(),
    }
}

/// EIV over base materials followed by [`job_cost`].
pub fn job_cost_for_materials(
    activity: ActivityKind,
    base_materials: &[MaterialQuantity],
    runs: u32,
    adjusted_price: impl Fn(TypeId) -> Option<f64>,
    system_cost_index: Option<f64>,
    facility: &FacilityProfile,
) -> JobCost {
    let (eiv, unpriced) = estimated_item_value(base_materials, runs, adjusted_price);
    let mut cost = job_cost(activity, eiv, system_cost_index, facility);
    cost.unpriced_materials = unpriced;
    cost
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bonus::StructureProfile;
    use crate::models::{Facility, SystemId};

    fn profile(structure: Option<u32>, tax: Option<f64>) -> FacilityProfile {
        let structure_type_id = structure.map(TypeId);
        FacilityProfile {
            facility: Facility {
                id: "f".to_string(),
                structure_type_id,
                rigs: vec![],
                security_status: 0.9,
                system_id: Some(SystemId(30000142)),
                facility_tax_rate: tax,
            },
            structure: structure_type_id.and_then(StructureProfile::known),
            rigs: vec![],
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn npc_station_manufacturing_breakdown() {
        let station = profile(None, None);
        let cost = job_cost(ActivityKind::Manufacturing, 100_000.0, Some(0.025), &station);
        assert!(close(cost.gross_cost, 2_500.0));
        assert!(close(cost.facility_tax, 250.0));
        assert!(close(cost.surcharge, 4_000.0));
        assert!(close(cost.total, 6_750.0));
        assert_eq!(cost.facility_tax_rate, NPC_FACILITY_TAX_PERCENT);
        assert_eq!(cost.system_cost_index, 0.025);
        assert!(!cost.cost_index_missing);
    }

    #[test]
    fn structure_bonus_discounts_gross_cost_only() {
        // Sotiyo: 5% cost bonus, no default tax
        let cost = job_cost(
            ActivityKind::Manufacturing,
            100_000.0,
            Some(0.025),
            &profile(Some(35827), None),
        );
        assert!(close(cost.gross_cost, 2_375.0));
        assert_eq!(cost.facility_tax, 0.0);
        assert!(close(cost.surcharge, 4_000.0));
        assert!(close(cost.total, 6_375.0));
    }

    #[test]
    fn explicit_tax_wins() {
        let station = job_cost(
            ActivityKind::Manufacturing,
            100_000.0,
            Some(0.0),
            &profile(None, Some(1.0)),
        );
        let citadel = job_cost(
            ActivityKind::Manufacturing,
            100_000.0,
            Some(0.0),
            &profile(Some(35832), Some(0.5)),
        );
        assert!(close(station.facility_tax, 1_000.0));
        assert!(close(citadel.facility_tax, 500.0));
    }

    #[test]
    fn reactions_take_surcharge_from_job_base() {
        let refinery = profile(Some(35835), None);
        let cost = job_cost(ActivityKind::Reaction, 100_000.0, Some(0.025), &refinery);
        assert!(close(cost.job_base_cost, 2_000.0));
        assert!(close(cost.gross_cost, 50.0));
        assert!(close(cost.surcharge, 80.0));
        assert!(close(cost.total, 130.0));

        let manufacturing =
            job_cost(ActivityKind::Manufacturing, 100_000.0, Some(0.025), &refinery);
        assert!(manufacturing.total > cost.total);
    }

    #[test]
    fn eiv_skips_materials_without_adjusted_price() {
        let materials = [MaterialQuantity::new(34, 1_000), MaterialQuantity::new(11399, 5)];
        let (eiv, unpriced) =
            estimated_item_value(&materials, 3, |t| (t == TypeId(34)).then_some(4.0));
        assert!(close(eiv, 12_000.0));
        assert_eq!(unpriced, vec![TypeId(11399)]);
    }

    #[test]
    fn missing_cost_index_is_flagged() {
        let cost = job_cost_for_materials(
            ActivityKind::Manufacturing,
            &[MaterialQuantity::new(34, 100)],
            1,
            |_| Some(5.0),
            None,
            &profile(None, None),
        );
        assert!(cost.cost_index_missing);
        assert_eq!(cost.gross_cost, 0.0);
        assert!(close(cost.surcharge, 20.0));
    }
}
