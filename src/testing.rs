//! In-memory providers built from the sample data set, with call counting

use std::cell::Cell;
use std::collections::HashMap;

use anyhow::Result;

use crate::bonus::FacilityProfile;
use crate::models::{
    ActivityKind, CharacterId, CharacterSkills, Decryptor, Facility, GroupId, InventionData,
    MaterialQuantity, ProductionFormula, SystemId, TypeId,
};
use crate::provider::{PriceBook, PriceOracle, PriceSide, SkillSource, StaticDataProvider};
use crate::sample;

pub use crate::sample::{GALLENTE_ENCRYPTION, JITA, MECHANICAL_ENGINEERING};

#[derive(Default)]
pub struct Fixture {
    formulas: Vec<ProductionFormula>,
    inventions: HashMap<TypeId, InventionData>,
    attributes: HashMap<(TypeId, u32), f64>,
    groups: HashMap<TypeId, GroupId>,
    names: HashMap<TypeId, String>,
    rig_targets: HashMap<TypeId, Vec<GroupId>>,
    decryptors: Vec<Decryptor>,
    prices: HashMap<TypeId, (f64, f64)>,
    adjusted: HashMap<TypeId, f64>,
    cost_indices: HashMap<(SystemId, ActivityKind), f64>,
    characters: HashMap<CharacterId, CharacterSkills>,
    static_calls: Cell<usize>,
}

impl Fixture {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn sample() -> Self {
        let mut f = Self::default();
        for &(type_id, group_id, name) in sample::TYPES {
            f.groups.insert(TypeId(type_id), GroupId(group_id));
            f.names.insert(TypeId(type_id), name.to_string());
        }
        f.formulas = sample::FORMULAS.iter().map(|s| s.to_formula()).collect();

        for s in sample::INVENTIONS {
            let t2_formula = f
                .formulas
                .iter()
                .find(|x| x.formula_id == TypeId(s.t2))
                .cloned()
                .expect("sample invention targets a sample formula");
            let t2_product_group = t2_formula
                .primary_output()
                .and_then(|o| f.groups.get(&o.type_id).copied());
            f.inventions.insert(
                TypeId(s.t1),
                InventionData {
                    t1_formula_id: TypeId(s.t1),
                    t2_formula_id: TypeId(s.t2),
                    base_probability: s.probability,
                    base_runs: s.runs as u32,
                    materials: s
                        .materials
                        .iter()
                        .map(|&(t, q)| MaterialQuantity::new(t, q))
                        .collect(),
                    base_duration_s: s.duration_s,
                    skills: s.skills.iter().map(|&id| TypeId(id)).collect(),
                    t2_formula,
                    t2_product_group,
                },
            );
        }

        for &(type_id, probability, me, te, runs) in sample::DECRYPTORS {
            f.decryptors.push(Decryptor {
                type_id: TypeId(type_id),
                name: f.names[&TypeId(type_id)].clone(),
                probability_multiplier: probability,
                me_modifier: me,
                te_modifier: te,
                runs_modifier: runs,
            });
        }
        for &(rig, attribute, value, targets) in sample::RIGS {
            f.attributes.insert((TypeId(rig), attribute), value);
            f.rig_targets
                .insert(TypeId(rig), targets.iter().map(|&g| GroupId(g)).collect());
        }
        for &(type_id, buy, sell, adjusted) in sample::PRICES {
            f.prices.insert(TypeId(type_id), (buy, sell));
            f.adjusted.insert(TypeId(type_id), adjusted);
        }
        for &(system, manufacturing, reaction, invention) in sample::COST_INDICES {
            let system = SystemId(system);
            f.cost_indices.insert((system, ActivityKind::Manufacturing), manufacturing);
            f.cost_indices.insert((system, ActivityKind::Reaction), reaction);
            f.cost_indices.insert((system, ActivityKind::Invention), invention);
        }
        let skills = CharacterSkills {
            levels: sample::CHARACTER_SKILLS.iter().copied().collect(),
            default_level: 0,
        };
        f.characters.insert(sample::SAMPLE_CHARACTER, skills);
        f
    }

    /// A straight chain: formula `1000 + i` makes `2000 + i` from `2000 + i + 1`,
    /// and the last formula consumes raw type 3000. Root is formula 1000.
    pub fn with_chain(mut self, intermediates: u32) -> Self {
        for i in 0..=intermediates {
            let input = if i < intermediates { 2000 + i + 1 } else { 3000 };
            self.formulas.push(ProductionFormula {
                formula_id: TypeId(1000 + i),
                activity: ActivityKind::Manufacturing,
                inputs: vec![MaterialQuantity::new(input, 2)],
                outputs: vec![MaterialQuantity::new(2000 + i, 1)],
                base_duration_s: 60,
            });
        }
        self
    }

    pub fn remove_price(&mut self, type_id: TypeId) {
        self.prices.remove(&type_id);
    }

    /// Number of static data lookups served so far.
    pub fn static_calls(&self) -> usize {
        self.static_calls.get()
    }

    fn count(&self) {
        self.static_calls.set(self.static_calls.get() + 1);
    }
}

impl StaticDataProvider for Fixture {
    fn formula(&self, formula_id: TypeId) -> Result<Option<ProductionFormula>> {
        self.count();
        Ok(self.formulas.iter().find(|f| f.formula_id == formula_id).cloned())
    }

    fn formula_for(&self, product: TypeId) -> Result<Option<ProductionFormula>> {
        self.count();
        Ok(self
            .formulas
            .iter()
            .filter(|f| f.output_quantity_of(product).is_some())
            .min_by_key(|f| f.formula_id)
            .cloned())
    }

    fn invention_data(&self, t1_formula_id: TypeId) -> Result<Option<InventionData>> {
        self.count();
        Ok(self.inventions.get(&t1_formula_id).cloned())
    }

    fn attribute_value(&self, type_id: TypeId, attribute_id: u32) -> Result<Option<f64>> {
        self.count();
        Ok(self.attributes.get(&(type_id, attribute_id)).copied())
    }

    fn group_of(&self, type_id: TypeId) -> Result<Option<GroupId>> {
        self.count();
        Ok(self.groups.get(&type_id).copied())
    }

    fn rig_target_groups(&self, rig: TypeId) -> Result<Vec<GroupId>> {
        self.count();
        Ok(self.rig_targets.get(&rig).cloned().unwrap_or_default())
    }

    fn decryptors(&self) -> Result<Vec<Decryptor>> {
        self.count();
        Ok(self.decryptors.clone())
    }

    fn type_name(&self, type_id: TypeId) -> Result<Option<String>> {
        Ok(self.names.get(&type_id).cloned())
    }
}

impl PriceOracle for Fixture {
    fn unit_price(&self, type_id: TypeId, _quantity: u64, side: PriceSide) -> Result<Option<f64>> {
        Ok(self.prices.get(&type_id).map(|&(buy, sell)| match side {
            PriceSide::Buy => buy,
            PriceSide::Sell => sell,
        }))
    }

    fn adjusted_price(&self, type_id: TypeId) -> Result<Option<f64>> {
        Ok(self.adjusted.get(&type_id).copied())
    }

    fn system_cost_index(
        &self,
        system_id: SystemId,
        activity: ActivityKind,
    ) -> Result<Option<f64>> {
        Ok(self.cost_indices.get(&(system_id, activity)).copied())
    }
}

impl SkillSource for Fixture {
    fn character_skills(&self, character: CharacterId) -> Result<Option<CharacterSkills>> {
        Ok(self.characters.get(&character).cloned())
    }
}

pub fn hobgoblin_invention() -> InventionData {
    Fixture::sample()
        .invention_data(sample::HOBGOBLIN_I_BLUEPRINT)
        .ok()
        .flatten()
        .expect("sample invention present")
}

/// The decryptor catalog, ordered by type id.
pub fn decryptors() -> Vec<Decryptor> {
    Fixture::sample().decryptors
}

/// Sell prices and adjusted prices for every sample type, plus the Jita cost indices.
pub fn price_book() -> PriceBook {
    let fixture = Fixture::sample();
    let types = sample::PRICES.iter().map(|&(t, ..)| (TypeId(t), 1));
    PriceBook::collect(&fixture, types, PriceSide::Sell, Some(JITA))
}

pub fn npc_station_facility() -> Facility {
    Facility {
        id: "jita-4-4".to_string(),
        structure_type_id: None,
        rigs: vec![],
        security_status: 0.9,
        system_id: Some(JITA),
        facility_tax_rate: None,
    }
}

pub fn npc_station() -> FacilityProfile {
    FacilityProfile {
        facility: npc_station_facility(),
        structure: None,
        rigs: vec![],
    }
}

/// Null-sec Tatara with a composite reaction material rig.
pub fn rigged_tatara() -> Facility {
    Facility {
        id: "1dq-tatara".to_string(),
        structure_type_id: Some(sample::TATARA),
        rigs: vec![sample::COMPOSITE_ME_RIG],
        security_status: -0.4,
        system_id: Some(sample::ONE_DQ),
        facility_tax_rate: Some(1.0),
    }
}

/// Null-sec Sotiyo with both drone rigs.
pub fn rigged_sotiyo() -> Facility {
    Facility {
        id: "1dq-sotiyo".to_string(),
        structure_type_id: Some(sample::SOTIYO),
        rigs: vec![sample::DRONE_ME_RIG, sample::DRONE_TE_RIG],
        security_status: -0.4,
        system_id: Some(sample::ONE_DQ),
        facility_tax_rate: Some(1.0),
    }
}
