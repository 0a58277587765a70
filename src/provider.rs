//! Boundaries to the reference data, market and character collaborators
//!
//! The engine only talks to these traits. `db.rs` implements all three on a
//! SQLite connection; tests use an in-memory fixture.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::{
    ActivityKind, CharacterId, CharacterSkills, Decryptor, GroupId, InventionData,
    MaterialQuantity, ProductionFormula, SystemId, TypeId,
};

/// Read-only static reference data.
pub trait StaticDataProvider {
    /// Manufacturing or reaction formula with this id.
    fn formula(&self, formula_id: TypeId) -> Result<Option<ProductionFormula>>;

    /// Manufacturing or reaction formula whose output is `product`.
    fn formula_for(&self, product: TypeId) -> Result<Option<ProductionFormula>>;

    /// Invention activity of a T1 blueprint, with the T2 formula it unlocks.
    fn invention_data(&self, t1_formula_id: TypeId) -> Result<Option<InventionData>>;

    fn attribute_value(&self, type_id: TypeId, attribute_id: u32) -> Result<Option<f64>>;

    fn group_of(&self, type_id: TypeId) -> Result<Option<GroupId>>;

    /// Product groups a rig affects. Empty means the rig is not group-restricted.
    fn rig_target_groups(&self, rig: TypeId) -> Result<Vec<GroupId>>;

    fn decryptors(&self) -> Result<Vec<Decryptor>>;

    fn type_name(&self, type_id: TypeId) -> Result<Option<String>>;

    fn inputs_of(&self, formula_id: TypeId) -> Result<Vec<MaterialQuantity>> {
        Ok(self
            .formula(formula_id)?
            .map(|f| f.inputs)
            .unwrap_or_default())
    }

    fn output_of(&self, formula_id: TypeId) -> Result<Option<MaterialQuantity>> {
        Ok(self.formula(formula_id)?.and_then(|f| f.primary_output()))
    }

    fn base_duration(&self, formula_id: TypeId) -> Result<Option<u64>> {
        Ok(self.formula(formula_id)?.map(|f| f.base_duration_s))
    }
}

/// Which side of the order book a price is taken from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSide {
    Buy,
    #[default]
    Sell,
}

impl fmt::Display for PriceSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceSide::Buy => f.write_str("buy"),
            PriceSide::Sell => f.write_str("sell"),
        }
    }
}

impl FromStr for PriceSide {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Ok(PriceSide::Buy),
            "sell" => Ok(PriceSide::Sell),
            other => Err(anyhow::anyhow!("unknown price side '{other}' (expected buy or sell)")),
        }
    }
}

/// Market and regulatory prices.
pub trait PriceOracle {
    /// Unit price for buying/selling `quantity` units. `None` if the type has no usable price.
    fn unit_price(&self, type_id: TypeId, quantity: u64, side: PriceSide) -> Result<Option<f64>>;

    /// Regulatory "adjusted" price used for estimated item value.
    fn adjusted_price(&self, type_id: TypeId) -> Result<Option<f64>>;

    fn system_cost_index(&self, system_id: SystemId, activity: ActivityKind) -> Result<Option<f64>>;
}

/// Character skill persistence.
pub trait SkillSource {
    fn character_skills(&self, character: CharacterId) -> Result<Option<CharacterSkills>>;
}

/// Prices snapshotted from a [`PriceOracle`] so that pure code can run without it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceBook {
    pub unit: HashMap<TypeId, f64>,
    pub adjusted: HashMap<TypeId, f64>,
    pub cost_indices: HashMap<ActivityKind, f64>,
}

impl PriceBook {
    /// Snapshot unit and adjusted prices for `types`, plus every cost index of `system`.
    ///
    /// A failed lookup is logged and leaves that entry out of the book, so callers
    /// see it as a missing price instead of losing the whole snapshot.
    pub fn collect(
        oracle: &dyn PriceOracle,
        types: impl IntoIterator<Item = (TypeId, u64)>,
        side: PriceSide,
        system: Option<SystemId>,
    ) -> Self {
        let mut book = PriceBook::default();
        for (type_id, quantity) in types {
            match oracle.unit_price(type_id, quantity.max(1), side) {
                Ok(Some(price)) => {
                    book.unit.insert(type_id, price);
                }
                Ok(None) => {}
                Err(e) => warn!(type_id = %type_id, error = %e, "unit price lookup failed"),
            }
            match oracle.adjusted_price(type_id) {
                Ok(Some(price)) => {
                    book.adjusted.insert(type_id, price);
                }
                Ok(None) => {}
                Err(e) => warn!(type_id = %type_id, error = %e, "adjusted price lookup failed"),
            }
        }
        if let Some(system) = system {
            for activity in [
                ActivityKind::Manufacturing,
                ActivityKind::Reaction,
                ActivityKind::Invention,
            ] {
                match oracle.system_cost_index(system, activity) {
                    Ok(Some(index)) => {
                        book.cost_indices.insert(activity, index);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(system = %system, %activity, error = %e, "cost index lookup failed")
                    }
                }
            }
        }
        book
    }

    pub fn unit_price(&self, type_id: TypeId) -> Option<f64> {
        self.unit.get(&type_id).copied()
    }

    pub fn adjusted_price(&self, type_id: TypeId) -> Option<f64> {
        self.adjusted.get(&type_id).copied()
    }

    pub fn cost_index(&self, activity: ActivityKind) -> Option<f64> {
        self.cost_indices.get(&activity).copied()
    }
}
