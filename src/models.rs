//! Data models for formulas, facilities, characters and calculation results

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{IndustryError, Result};

/// Identifier of any inventory type: items, blueprints, reaction formulas, skills, rigs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(pub u32);

/// Inventory group identifier (rig targeting, decryptor catalog).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u32);

/// Solar system identifier, used for cost index lookups.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SystemId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterId(pub u64);

macro_rules! display_id {
    ($($t:ty),*) => {
        $(impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        })*
    };
}

display_id!(TypeId, GroupId, SystemId, CharacterId);

/// Industry activity a formula belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Manufacturing,
    Reaction,
    Invention,
}

impl ActivityKind {
    /// Activity id as used by the static data export.
    pub fn activity_id(self) -> i64 {
        match self {
            ActivityKind::Manufacturing => 1,
            ActivityKind::Invention => 8,
            ActivityKind::Reaction => 11,
        }
    }

    pub fn from_activity_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(ActivityKind::Manufacturing),
            8 => Some(ActivityKind::Invention),
            // 9 is the retired pre-2017 reaction activity
            9 | 11 => Some(ActivityKind::Reaction),
            _ => None,
        }
    }

    /// Name used by the public cost index feed.
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityKind::Manufacturing => "manufacturing",
            ActivityKind::Reaction => "reaction",
            ActivityKind::Invention => "invention",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "manufacturing" => Some(ActivityKind::Manufacturing),
            "reaction" | "reactions" => Some(ActivityKind::Reaction),
            "invention" => Some(ActivityKind::Invention),
            _ => None,
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct GroupRecord {
    pub group_id: GroupId,
    pub category_id: u32,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct TypeRecord {
    pub type_id: TypeId,
    pub group_id: Option<GroupId>,
    pub name: String,
}

/// One row of the formula listing
#[derive(Debug, Clone, Serialize)]
pub struct FormulaSummary {
    pub formula_id: TypeId,
    pub formula_name: Option<String>,
    pub activity: ActivityKind,
    pub product_id: TypeId,
    pub product_name: Option<String>,
    pub quantity: u64,
}

/// A type id with a quantity: formula inputs/outputs and material requirements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialQuantity {
    pub type_id: TypeId,
    pub quantity: u64,
}

impl MaterialQuantity {
    pub fn new(type_id: u32, quantity: u64) -> Self {
        Self {
            type_id: TypeId(type_id),
            quantity,
        }
    }
}

/// A blueprint activity or reaction formula. Immutable reference data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductionFormula {
    pub formula_id: TypeId,
    pub activity: ActivityKind,
    pub inputs: Vec<MaterialQuantity>,
    pub outputs: Vec<MaterialQuantity>,
    pub base_duration_s: u64,
}

impl ProductionFormula {
    /// The product this formula is built for (first listed output).
    pub fn primary_output(&self) -> Option<MaterialQuantity> {
        self.outputs.first().copied()
    }

    /// Units of `type_id` produced per run, if this formula makes it.
    pub fn output_quantity_of(&self, type_id: TypeId) -> Option<u64> {
        self.outputs
            .iter()
            .find(|o| o.type_id == type_id)
            .map(|o| o.quantity)
    }
}

/// A production facility as supplied by the caller.
///
/// `structure_type_id == None` means an NPC station.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub id: String,
    pub structure_type_id: Option<TypeId>,
    pub rigs: Vec<TypeId>,
    pub security_status: f64,
    pub system_id: Option<SystemId>,
    /// Facility tax in percent; overrides the NPC/player default when set.
    pub facility_tax_rate: Option<f64>,
}

impl Facility {
    /// Reject a negative or non-finite tax and a security status outside -1.0..=1.0.
    ///
    /// NaN security is let through and treated as unknown.
    pub fn validate(&self) -> Result<()> {
        if let Some(rate) = self.facility_tax_rate {
            if !(rate.is_finite() && rate >= 0.0) {
                return Err(IndustryError::invalid(
                    "facility_tax_rate",
                    rate,
                    "must be a non-negative percentage",
                ));
            }
        }
        if self.security_status.abs() > 1.0 {
            return Err(IndustryError::invalid(
                "security_status",
                self.security_status,
                "must be between -1.0 and 1.0",
            ));
        }
        Ok(())
    }

    /// Stable identity of every field that can change a calculation.
    pub fn fingerprint(&self) -> String {
        let rigs: Vec<String> = self.rigs.iter().map(|r| r.to_string()).collect();
        format!(
            "{}|{}|{}|{:016x}|{}|{}",
            self.id,
            self.structure_type_id.map_or_else(|| "npc".to_string(), |s| s.to_string()),
            rigs.join(","),
            self.security_status.to_bits(),
            self.system_id.map_or_else(|| "-".to_string(), |s| s.to_string()),
            self.facility_tax_rate
                .map_or_else(|| "-".to_string(), |t| format!("{:016x}", t.to_bits())),
        )
    }
}

/// Trained skill levels of a character. Skills not present report `default_level`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterSkills {
    pub levels: BTreeMap<TypeId, u8>,
    pub default_level: u8,
}

impl CharacterSkills {
    /// Every skill assumed trained to `level`.
    pub fn assumed(level: u8) -> Self {
        Self {
            levels: BTreeMap::new(),
            default_level: level.min(5),
        }
    }

    pub fn level(&self, skill: TypeId) -> u8 {
        self.levels.get(&skill).copied().unwrap_or(self.default_level)
    }
}

/// The "Encryption Methods" skills; every other invention skill is a datacore science skill.
pub const ENCRYPTION_SKILLS: [TypeId; 6] = [
    TypeId(21790),
    TypeId(21791),
    TypeId(23087),
    TypeId(23121),
    TypeId(52308),
    TypeId(55025),
];

/// Invention activity of a T1 blueprint plus the T2 blueprint it yields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InventionData {
    pub t1_formula_id: TypeId,
    pub t2_formula_id: TypeId,
    pub base_probability: f64,
    /// Runs on a successfully invented copy before decryptor modifiers.
    pub base_runs: u32,
    pub materials: Vec<MaterialQuantity>,
    pub base_duration_s: u64,
    pub skills: Vec<TypeId>,
    /// Manufacturing formula of the invented blueprint.
    pub t2_formula: ProductionFormula,
    pub t2_product_group: Option<GroupId>,
}

impl InventionData {
    pub fn encryption_skill(&self) -> Option<TypeId> {
        self.skills
            .iter()
            .copied()
            .find(|s| ENCRYPTION_SKILLS.contains(s))
    }

    pub fn datacore_skills(&self) -> Vec<TypeId> {
        self.skills
            .iter()
            .copied()
            .filter(|s| !ENCRYPTION_SKILLS.contains(s))
            .collect()
    }
}

/// Invention modifier item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Decryptor {
    pub type_id: TypeId,
    pub name: String,
    pub probability_multiplier: f64,
    pub me_modifier: i32,
    pub te_modifier: i32,
    pub runs_modifier: i32,
}

/// Outcome of resolving a formula into raw materials
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeStatus {
    Complete,
    /// At least one branch hit the depth ceiling and was not expanded.
    Truncated,
    /// The formula id is unknown; aggregates are empty.
    NotFound,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BreakdownNode {
    Leaf {
        type_id: TypeId,
        quantity: u64,
    },
    Intermediate {
        type_id: TypeId,
        formula_id: TypeId,
        activity: ActivityKind,
        quantity_needed: u64,
        quantity_produced: u64,
        sub_runs: u64,
        children: Vec<BreakdownNode>,
    },
    DepthExceeded {
        type_id: TypeId,
        quantity: u64,
        depth: u32,
    },
}

impl BreakdownNode {
    pub fn type_id(&self) -> TypeId {
        match self {
            BreakdownNode::Leaf { type_id, .. }
            | BreakdownNode::Intermediate { type_id, .. }
            | BreakdownNode::DepthExceeded { type_id, .. } => *type_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaterialTree {
    pub formula_id: TypeId,
    pub root_product: Option<TypeId>,
    pub runs: u32,
    pub status: TreeStatus,
    pub aggregated_raw_materials: BTreeMap<TypeId, u64>,
    /// Units of every intermediate product built along the way.
    pub intermediates: BTreeMap<TypeId, u64>,
    pub breakdown: Vec<BreakdownNode>,
}

impl MaterialTree {
    pub fn not_found(formula_id: TypeId, runs: u32) -> Self {
        Self {
            formula_id,
            root_product: None,
            runs,
            status: TreeStatus::NotFound,
            aggregated_raw_materials: BTreeMap::new(),
            intermediates: BTreeMap::new(),
            breakdown: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InventionOutcome {
    pub base_probability: f64,
    pub effective_probability: f64,
    pub decryptor_applied: Option<TypeId>,
    pub resulting_me: i32,
    pub resulting_te: i32,
    pub resulting_runs: u32,
    pub cost_per_attempt: f64,
    pub cost_per_success: f64,
}
