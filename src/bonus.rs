//! Material and time multipliers from blueprint efficiency, structures, rigs and skills

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::models::{ActivityKind, CharacterSkills, Facility, GroupId, TypeId};
use crate::provider::StaticDataProvider;

/// Rig attribute: time reduction in percent (negative).
pub const ATTR_RIG_TIME_BONUS: u32 = 2593;
/// Rig attribute: material reduction in percent (negative).
pub const ATTR_RIG_MATERIAL_BONUS: u32 = 2594;
/// Structure role bonus multipliers, e.g. 0.99 for 1% less material.
pub const ATTR_STRUCTURE_MATERIAL_MULTIPLIER: u32 = 2600;
pub const ATTR_STRUCTURE_COST_MULTIPLIER: u32 = 2601;
pub const ATTR_STRUCTURE_TIME_MULTIPLIER: u32 = 2602;

pub const SKILL_INDUSTRY: TypeId = TypeId(3380);
pub const SKILL_ADVANCED_INDUSTRY: TypeId = TypeId(3388);
pub const SKILL_REACTIONS: TypeId = TypeId(45746);

const LOW_SEC_RIG_MULTIPLIER: f64 = 1.9;
const NULL_SEC_RIG_MULTIPLIER: f64 = 2.1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityClass {
    High,
    Low,
    Null,
}

impl SecurityClass {
    /// Non-finite status is treated as unknown space, which scales like null.
    pub fn from_status(security_status: f64) -> Self {
        if security_status >= 0.5 {
            SecurityClass::High
        } else if security_status > 0.0 {
            SecurityClass::Low
        } else {
            SecurityClass::Null
        }
    }

    pub fn rig_multiplier(self) -> f64 {
        match self {
            SecurityClass::High => 1.0,
            SecurityClass::Low => LOW_SEC_RIG_MULTIPLIER,
            SecurityClass::Null => NULL_SEC_RIG_MULTIPLIER,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    EngineeringComplex,
    Refinery,
    Citadel,
}

/// Role bonuses of an Upwell structure, all in percent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructureProfile {
    pub type_id: TypeId,
    pub kind: StructureKind,
    pub material_bonus: f64,
    pub time_bonus: f64,
    pub cost_bonus: f64,
}

// (type id, kind, material %, time %, cost %)
const UPWELL_STRUCTURES: [(u32, StructureKind, f64, f64, f64); 8] = [
    (35825, StructureKind::EngineeringComplex, 1.0, 15.0, 3.0), // Raitaru
    (35826, StructureKind::EngineeringComplex, 1.0, 20.0, 4.0), // Azbel
    (35827, StructureKind::EngineeringComplex, 1.0, 30.0, 5.0), // Sotiyo
    (35835, StructureKind::Refinery, 0.0, 0.0, 0.0),            // Athanor
    (35836, StructureKind::Refinery, 0.0, 25.0, 0.0),           // Tatara
    (35832, StructureKind::Citadel, 0.0, 0.0, 0.0),             // Astrahus
    (35833, StructureKind::Citadel, 0.0, 0.0, 0.0),             // Fortizar
    (35834, StructureKind::Citadel, 0.0, 0.0, 0.0),             // Keepstar
];

impl StructureProfile {
    /// Built-in bonuses for a known Upwell hull.
    pub fn known(type_id: TypeId) -> Option<Self> {
        UPWELL_STRUCTURES
            .iter()
            .find(|(id, ..)| *id == type_id.0)
            .map(|&(_, kind, material_bonus, time_bonus, cost_bonus)| StructureProfile {
                type_id,
                kind,
                material_bonus,
                time_bonus,
                cost_bonus,
            })
    }

    /// Known hull bonuses, overridden by role bonus attributes when the data has them.
    pub fn resolve(type_id: TypeId, data: &dyn StaticDataProvider) -> Result<Option<Self>> {
        let material = data.attribute_value(type_id, ATTR_STRUCTURE_MATERIAL_MULTIPLIER)?;
        let time = data.attribute_value(type_id, ATTR_STRUCTURE_TIME_MULTIPLIER)?;
        let cost = data.attribute_value(type_id, ATTR_STRUCTURE_COST_MULTIPLIER)?;

        let mut profile = match Self::known(type_id) {
            Some(profile) => profile,
            None if material.is_none() && time.is_none() && cost.is_none() => return Ok(None),
            None => StructureProfile {
                type_id,
                kind: StructureKind::EngineeringComplex,
                material_bonus: 0.0,
                time_bonus: 0.0,
                cost_bonus: 0.0,
            },
        };
        let to_percent = |multiplier: f64| (1.0 - multiplier) * 100.0;
        if let Some(m) = material {
            profile.material_bonus = to_percent(m);
        }
        if let Some(t) = time {
            profile.time_bonus = to_percent(t);
        }
        if let Some(c) = cost {
            profile.cost_bonus = to_percent(c);
        }
        Ok(Some(profile))
    }
}

/// A rig's bonuses before security scaling. Bonuses are negative percentages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RigProfile {
    pub type_id: TypeId,
    pub material_bonus: f64,
    pub time_bonus: f64,
    pub target_groups: Vec<GroupId>,
}

impl RigProfile {
    pub fn resolve(type_id: TypeId, data: &dyn StaticDataProvider) -> Result<Self> {
        Ok(RigProfile {
            type_id,
            material_bonus: data
                .attribute_value(type_id, ATTR_RIG_MATERIAL_BONUS)?
                .unwrap_or(0.0),
            time_bonus: data.attribute_value(type_id, ATTR_RIG_TIME_BONUS)?.unwrap_or(0.0),
            target_groups: data.rig_target_groups(type_id)?,
        })
    }

    pub fn applies_to(&self, product_group: Option<GroupId>) -> bool {
        if self.target_groups.is_empty() {
            return true;
        }
        product_group.is_some_and(|g| self.target_groups.contains(&g))
    }
}

/// A facility with its structure and rigs resolved to plain numbers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FacilityProfile {
    pub facility: Facility,
    pub structure: Option<StructureProfile>,
    pub rigs: Vec<RigProfile>,
}

impl FacilityProfile {
    pub fn resolve(facility: &Facility, data: &dyn StaticDataProvider) -> Result<Self> {
        let structure = match facility.structure_type_id {
            Some(id) => StructureProfile::resolve(id, data)?,
            None => None,
        };
        let rigs = facility
            .rigs
            .iter()
            .map(|&rig| RigProfile::resolve(rig, data))
            .collect::<Result<Vec<_>>>()?;
        Ok(FacilityProfile {
            facility: facility.clone(),
            structure,
            rigs,
        })
    }

    pub fn security(&self) -> SecurityClass {
        SecurityClass::from_status(self.facility.security_status)
    }

    pub fn structure_cost_bonus(&self) -> f64 {
        self.structure.as_ref().map_or(0.0, |s| s.cost_bonus)
    }

    /// Sum of applicable rig bonuses after security scaling, in percent.
    fn rig_bonus(&self, product_group: Option<GroupId>, pick: impl Fn(&RigProfile) -> f64) -> f64 {
        let scale = self.security().rig_multiplier();
        self.rigs
            .iter()
            .filter(|r| r.applies_to(product_group))
            .map(|r| pick(r) * scale)
            .sum()
    }
}

/// Combined material multiplier for one node of a production tree.
///
/// Reactions have no material efficiency; `efficiency_level` is ignored for them.
pub fn material_multiplier(
    activity: ActivityKind,
    efficiency_level: u8,
    facility: Option<&FacilityProfile>,
    product_group: Option<GroupId>,
) -> f64 {
    let efficiency = match activity {
        ActivityKind::Reaction => 1.0,
        _ => 1.0 - f64::from(efficiency_level) / 100.0,
    };
    let Some(facility) = facility else {
        return efficiency;
    };
    let structural = 1.0 - facility.structure.as_ref().map_or(0.0, |s| s.material_bonus) / 100.0;
    let rigs = facility.rig_bonus(product_group, |r| r.material_bonus);
    efficiency * structural * (1.0 + rigs / 100.0)
}

/// Combined duration multiplier, built the same way as [`material_multiplier`].
pub fn duration_multiplier(
    activity: ActivityKind,
    te_level: u8,
    facility: Option<&FacilityProfile>,
    product_group: Option<GroupId>,
) -> f64 {
    let efficiency = match activity {
        ActivityKind::Reaction => 1.0,
        _ => 1.0 - f64::from(te_level) / 100.0,
    };
    let Some(facility) = facility else {
        return efficiency;
    };
    let structural = 1.0 - facility.structure.as_ref().map_or(0.0, |s| s.time_bonus) / 100.0;
    let rigs = facility.rig_bonus(product_group, |r| r.time_bonus);
    efficiency * structural * (1.0 + rigs / 100.0)
}

/// Job time reduction from the installing character's skills.
pub fn skill_time_multiplier(activity: ActivityKind, skills: &CharacterSkills) -> f64 {
    let level = |skill| f64::from(skills.level(skill));
    match activity {
        ActivityKind::Manufacturing => {
            (1.0 - 0.04 * level(SKILL_INDUSTRY)) * (1.0 - 0.03 * level(SKILL_ADVANCED_INDUSTRY))
        }
        ActivityKind::Reaction => 1.0 - 0.04 * level(SKILL_REACTIONS),
        ActivityKind::Invention => 1.0 - 0.03 * level(SKILL_ADVANCED_INDUSTRY),
    }
}

/// Quantity of one input for `runs` runs: ceil(runs × base × multiplier), at least `runs`.
///
/// The product is snapped to 1e-6 before the ceiling so that float noise such as
/// 90.00000000000001 does not cost an extra unit.
pub fn apply_to_quantity(base_quantity: u64, runs: u32, multiplier: f64) -> u64 {
    if base_quantity == 0 {
        return 0;
    }
    let raw = f64::from(runs) * base_quantity as f64 * multiplier;
    ceil_snapped(raw).max(u64::from(runs))
}

/// Ceiling after snapping to 1e-6. Negative input gives 0.
pub fn ceil_snapped(value: f64) -> u64 {
    let snapped = (value * 1e6).round() / 1e6;
    snapped.ceil().max(0.0) as u64
}
