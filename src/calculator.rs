//! Production tree resolution, pricing and the invention entry points

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bonus::{self, FacilityProfile};
use crate::cache::{FifoCache, DEFAULT_CAPACITY};
use crate::error::{IndustryError, Result};
use crate::invention::{self, DecryptorSearch, Strategy};
use crate::job_cost::{self, JobCost};
use crate::models::{
    ActivityKind, BreakdownNode, CharacterId, CharacterSkills, Facility, GroupId, InventionData,
    MaterialTree, ProductionFormula, TreeStatus, TypeId,
};
use crate::provider::{PriceBook, PriceOracle, PriceSide, SkillSource, StaticDataProvider};
use crate::settings::Settings;

/// Maximum number of nested intermediate expansions below the requested formula.
pub const MAX_DEPTH: u32 = 10;

/// Highest material/time efficiency a blueprint copy can carry.
pub const MAX_EFFICIENCY: i64 = 20;

/// One tree computation. Built through [`TreeRequest::new`], which rejects bad input.
#[derive(Clone, Debug, PartialEq)]
pub struct TreeRequest {
    pub formula_id: TypeId,
    pub runs: u32,
    pub me: u8,
    pub te: u8,
    pub facility: Option<Facility>,
    pub character: Option<CharacterId>,
    pub with_prices: bool,
}

fn efficiency(field: &'static str, level: i64) -> Result<u8> {
    if !(0..=MAX_EFFICIENCY).contains(&level) {
        return Err(IndustryError::invalid(field, level, "must be between 0 and 20"));
    }
    Ok(level as u8)
}

impl TreeRequest {
    pub fn new(formula_id: TypeId, runs: i64, me: i64) -> Result<Self> {
        let runs = u32::try_from(runs)
            .ok()
            .filter(|&r| r >= 1)
            .ok_or_else(|| IndustryError::invalid("runs", runs, "must be a positive run count"))?;
        Ok(TreeRequest {
            formula_id,
            runs,
            me: efficiency("me", me)?,
            te: 0,
            facility: None,
            character: None,
            with_prices: true,
        })
    }

    pub fn te(mut self, te: i64) -> Result<Self> {
        self.te = efficiency("te", te)?;
        Ok(self)
    }

    pub fn facility(mut self, facility: Facility) -> Result<Self> {
        facility.validate()?;
        self.facility = Some(facility);
        Ok(self)
    }

    pub fn character(mut self, character: CharacterId) -> Self {
        self.character = Some(character);
        self
    }

    pub fn without_prices(mut self) -> Self {
        self.with_prices = false;
        self
    }

    fn key(&self) -> TreeKey {
        TreeKey {
            formula_id: self.formula_id,
            runs: self.runs,
            me: self.me,
            te: self.te,
            facility: self.facility.as_ref().map(Facility::fingerprint),
            character: self.character,
            with_prices: self.with_prices,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct TreeKey {
    formula_id: TypeId,
    runs: u32,
    me: u8,
    te: u8,
    facility: Option<String>,
    character: Option<CharacterId>,
    with_prices: bool,
}

/// Wall-clock time of the top-level job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobDuration {
    /// Base duration × runs, before any reduction.
    pub base_seconds: u64,
    pub efficiency_multiplier: f64,
    pub skill_multiplier: f64,
    pub seconds: u64,
}

impl JobDuration {
    pub fn compute(
        formula: &ProductionFormula,
        runs: u32,
        te: u8,
        facility: Option<&FacilityProfile>,
        product_group: Option<GroupId>,
        skills: &CharacterSkills,
    ) -> Self {
        let base_seconds = formula.base_duration_s.saturating_mul(u64::from(runs));
        let efficiency_multiplier =
            bonus::duration_multiplier(formula.activity, te, facility, product_group);
        let skill_multiplier = bonus::skill_time_multiplier(formula.activity, skills);
        JobDuration {
            base_seconds,
            efficiency_multiplier,
            skill_multiplier,
            seconds: bonus::ceil_snapped(
                base_seconds as f64 * efficiency_multiplier * skill_multiplier,
            ),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricedMaterial {
    pub type_id: TypeId,
    pub quantity: u64,
    /// 0 when no price was available.
    pub unit_price: f64,
    pub total: f64,
    pub price_missing: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub material_side: PriceSide,
    pub materials: Vec<PricedMaterial>,
    pub material_cost: f64,
    pub all_prices_available: bool,
    pub product_side: PriceSide,
    pub output_quantity: u64,
    pub product_unit_price: Option<f64>,
    pub output_value: Option<f64>,
    /// Present when the facility has a solar system to take the cost index from.
    pub job_cost: Option<JobCost>,
    pub total_cost: f64,
    pub profit: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeResult {
    pub tree: MaterialTree,
    pub duration: Option<JobDuration>,
    pub pricing: Option<Pricing>,
}

impl TreeResult {
    fn not_found(request: &TreeRequest) -> Self {
        TreeResult {
            tree: MaterialTree::not_found(request.formula_id, request.runs),
            duration: None,
            pricing: None,
        }
    }
}

/// Invention evaluation request.
#[derive(Clone, Debug, PartialEq)]
pub struct InventionRequest {
    pub t1_formula_id: TypeId,
    pub strategy: Strategy,
    pub target_volume: Option<u64>,
    pub facility: Option<Facility>,
    pub character: Option<CharacterId>,
}

impl InventionRequest {
    pub fn new(t1_formula_id: TypeId, strategy: Strategy) -> Self {
        InventionRequest {
            t1_formula_id,
            strategy,
            target_volume: None,
            facility: None,
            character: None,
        }
    }

    pub fn target_volume(mut self, volume: i64) -> Result<Self> {
        let volume = u64::try_from(volume)
            .ok()
            .filter(|&v| v >= 1)
            .ok_or_else(|| {
                IndustryError::invalid("target_volume", volume, "must be at least one unit")
            })?;
        self.target_volume = Some(volume);
        Ok(self)
    }

    pub fn facility(mut self, facility: Facility) -> Result<Self> {
        facility.validate()?;
        self.facility = Some(facility);
        Ok(self)
    }

    pub fn character(mut self, character: CharacterId) -> Self {
        self.character = Some(character);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CalculatorSettings {
    pub material_side: PriceSide,
    pub product_side: PriceSide,
    pub assumed_skill_level: u8,
}

impl Default for CalculatorSettings {
    fn default() -> Self {
        CalculatorSettings {
            material_side: PriceSide::Sell,
            product_side: PriceSide::Sell,
            assumed_skill_level: 5,
        }
    }
}

impl From<&Settings> for CalculatorSettings {
    fn from(settings: &Settings) -> Self {
        CalculatorSettings {
            material_side: settings.material_price_side,
            product_side: settings.product_price_side,
            assumed_skill_level: settings.assumed_skill_level,
        }
    }
}

/// Partial result of expanding one formula node.
#[derive(Default)]
struct Expansion {
    raw: BTreeMap<TypeId, u64>,
    intermediates: BTreeMap<TypeId, u64>,
    nodes: Vec<BreakdownNode>,
    truncated: bool,
}

impl Expansion {
    fn merge(&mut self, child: Expansion) {
        for (type_id, quantity) in child.raw {
            *self.raw.entry(type_id).or_default() += quantity;
        }
        for (type_id, quantity) in child.intermediates {
            *self.intermediates.entry(type_id).or_default() += quantity;
        }
        self.truncated |= child.truncated;
    }
}

/// Long-lived engine owning the tree cache.
pub struct IndustryCalculator<'a> {
    data: &'a dyn StaticDataProvider,
    prices: &'a dyn PriceOracle,
    skills: &'a dyn SkillSource,
    settings: CalculatorSettings,
    cache: Mutex<FifoCache<TreeKey, TreeResult>>,
}

impl<'a> IndustryCalculator<'a> {
    pub fn new(
        data: &'a dyn StaticDataProvider,
        prices: &'a dyn PriceOracle,
        skills: &'a dyn SkillSource,
        settings: CalculatorSettings,
    ) -> Self {
        IndustryCalculator {
            data,
            prices,
            skills,
            settings,
            cache: Mutex::new(FifoCache::new(DEFAULT_CAPACITY)),
        }
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
        info!("tree cache cleared");
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Resolve a formula into raw materials, optionally priced.
    ///
    /// Unknown formulas give a `NotFound` tree; they are not cached.
    pub fn compute_tree(&self, request: &TreeRequest) -> Result<TreeResult> {
        let key = request.key();
        // the lock only covers the lookup; concurrent misses compute twice
        let cached = self.cache.lock().get(&key);
        if let Some(hit) = cached {
            debug!(formula = %request.formula_id, runs = request.runs, "tree cache hit");
            return Ok(hit);
        }
        debug!(formula = %request.formula_id, runs = request.runs, "tree cache miss");

        let Some(formula) = self.data.formula(request.formula_id)? else {
            info!(formula = %request.formula_id, "formula not found");
            return Ok(TreeResult::not_found(request));
        };
        let facility = request
            .facility
            .as_ref()
            .map(|f| FacilityProfile::resolve(f, self.data))
            .transpose()?;

        let expansion = self.expand(&formula, request.runs, request.me, facility.as_ref(), 0)?;
        let root_product = formula.primary_output().map(|o| o.type_id);
        let tree = MaterialTree {
            formula_id: formula.formula_id,
            root_product,
            runs: request.runs,
            status: if expansion.truncated {
                TreeStatus::Truncated
            } else {
                TreeStatus::Complete
            },
            aggregated_raw_materials: expansion.raw,
            intermediates: expansion.intermediates,
            breakdown: expansion.nodes,
        };

        let skills = self.skills_for(request.character)?;
        let product_group = match root_product {
            Some(product) => self.data.group_of(product)?,
            None => None,
        };
        let duration = JobDuration::compute(
            &formula,
            request.runs,
            request.te,
            facility.as_ref(),
            product_group,
            &skills,
        );

        let pricing = if request.with_prices {
            Some(self.price_tree(&formula, &tree, facility.as_ref())?)
        } else {
            None
        };

        let result = TreeResult {
            tree,
            duration: Some(duration),
            pricing,
        };
        self.cache.lock().insert(key, &result);
        Ok(result)
    }

    /// Expand the inputs of `formula` for `runs` runs. `depth` is the level of this node.
    fn expand(
        &self,
        formula: &ProductionFormula,
        runs: u32,
        me: u8,
        facility: Option<&FacilityProfile>,
        depth: u32,
    ) -> Result<Expansion> {
        let product_group = match formula.primary_output() {
            Some(product) => self.data.group_of(product.type_id)?,
            None => None,
        };
        let multiplier = bonus::material_multiplier(formula.activity, me, facility, product_group);

        let mut expansion = Expansion::default();
        for input in &formula.inputs {
            let quantity = bonus::apply_to_quantity(input.quantity, runs, multiplier);

            let Some(producer) = self.data.formula_for(input.type_id)? else {
                *expansion.raw.entry(input.type_id).or_default() += quantity;
                expansion.nodes.push(BreakdownNode::Leaf {
                    type_id: input.type_id,
                    quantity,
                });
                continue;
            };

            if depth + 1 > MAX_DEPTH {
                warn!(
                    type_id = %input.type_id,
                    formula = %formula.formula_id,
                    depth,
                    "depth limit reached, branch not expanded"
                );
                expansion.truncated = true;
                expansion.nodes.push(BreakdownNode::DepthExceeded {
                    type_id: input.type_id,
                    quantity,
                    depth,
                });
                continue;
            }

            let per_run = producer.output_quantity_of(input.type_id).unwrap_or(1).max(1);
            let sub_runs = quantity.div_ceil(per_run);
            let sub_runs_u32 = u32::try_from(sub_runs).map_err(|_| {
                IndustryError::invalid("sub_runs", sub_runs, "exceeds the run limit")
            })?;
            let produced = sub_runs * per_run;

            let mut child = self.expand(&producer, sub_runs_u32, me, facility, depth + 1)?;
            let children = std::mem::take(&mut child.nodes);
            expansion.merge(child);
            *expansion.intermediates.entry(input.type_id).or_default() += produced;
            expansion.nodes.push(BreakdownNode::Intermediate {
                type_id: input.type_id,
                formula_id: producer.formula_id,
                activity: producer.activity,
                quantity_needed: quantity,
                quantity_produced: produced,
                sub_runs,
                children,
            });
        }
        Ok(expansion)
    }

    fn price_tree(
        &self,
        formula: &ProductionFormula,
        tree: &MaterialTree,
        facility: Option<&FacilityProfile>,
    ) -> Result<Pricing> {
        let side = self.settings.material_side;
        let mut materials = Vec::with_capacity(tree.aggregated_raw_materials.len());
        let mut material_cost = 0.0;
        let mut all_prices_available = true;
        for (&type_id, &quantity) in &tree.aggregated_raw_materials {
            let price = self.prices.unit_price(type_id, quantity, side)?;
            if price.is_none() {
                debug!(type_id = %type_id, "no price for material");
                all_prices_available = false;
            }
            let unit_price = price.unwrap_or(0.0);
            let total = unit_price * quantity as f64;
            material_cost += total;
            materials.push(PricedMaterial {
                type_id,
                quantity,
                unit_price,
                total,
                price_missing: price.is_none(),
            });
        }

        let output_quantity = formula
            .primary_output()
            .map_or(0, |o| o.quantity * u64::from(tree.runs));
        let product_unit_price = match tree.root_product {
            Some(product) => self
                .prices
                .unit_price(product, output_quantity, self.settings.product_side)?,
            None => None,
        };
        let output_value = product_unit_price.map(|p| p * output_quantity as f64);

        let job_cost = match facility {
            Some(profile) => self.job_cost(formula, tree.runs, profile)?,
            None => None,
        };
        let total_cost = material_cost + job_cost.as_ref().map_or(0.0, |j| j.total);

        Ok(Pricing {
            material_side: side,
            materials,
            material_cost,
            all_prices_available,
            product_side: self.settings.product_side,
            output_quantity,
            product_unit_price,
            output_value,
            job_cost,
            total_cost,
            profit: output_value.map(|v| v - total_cost),
        })
    }

    /// Job cost over the formula's unreduced inputs. None without a solar system.
    fn job_cost(
        &self,
        formula: &ProductionFormula,
        runs: u32,
        facility: &FacilityProfile,
    ) -> Result<Option<JobCost>> {
        let Some(system) = facility.facility.system_id else {
            return Ok(None);
        };
        let mut adjusted = HashMap::new();
        for input in &formula.inputs {
            if let Some(price) = self.prices.adjusted_price(input.type_id)? {
                adjusted.insert(input.type_id, price);
            }
        }
        let index = self.prices.system_cost_index(system, formula.activity)?;
        if index.is_none() {
            warn!(system = %system, activity = %formula.activity, "no cost index, using 0");
        }
        Ok(Some(job_cost::job_cost_for_materials(
            formula.activity,
            &formula.inputs,
            runs,
            |t| adjusted.get(&t).copied(),
            index,
            facility,
        )))
    }

    fn skills_for(&self, character: Option<CharacterId>) -> Result<CharacterSkills> {
        let assumed = || CharacterSkills::assumed(self.settings.assumed_skill_level);
        let Some(character) = character else {
            return Ok(assumed());
        };
        match self.skills.character_skills(character)? {
            Some(skills) => Ok(skills),
            None => {
                warn!(
                    character = %character,
                    "unknown character, assuming skill level {}",
                    self.settings.assumed_skill_level
                );
                Ok(assumed())
            }
        }
    }

    /// Invention metadata of a T1 formula, if it can be invented from.
    pub fn invention(&self, t1_formula_id: TypeId) -> Result<Option<InventionData>> {
        Ok(self.data.invention_data(t1_formula_id)?)
    }

    /// Rank every decryptor option for inventing from `request.t1_formula_id`.
    pub fn evaluate_invention(
        &self,
        request: &InventionRequest,
    ) -> Result<Option<DecryptorSearch>> {
        let Some(data) = self.invention(request.t1_formula_id)? else {
            info!(formula = %request.t1_formula_id, "no invention data");
            return Ok(None);
        };
        let decryptors = self.data.decryptors()?;
        let facility = request
            .facility
            .as_ref()
            .map(|f| FacilityProfile::resolve(f, self.data))
            .transpose()?;
        let skills = self.skills_for(request.character)?;

        let types = data
            .materials
            .iter()
            .chain(data.t2_formula.inputs.iter())
            .map(|m| (m.type_id, m.quantity))
            .chain(decryptors.iter().map(|d| (d.type_id, 1)));
        let system = facility.as_ref().and_then(|f| f.facility.system_id);
        let prices = PriceBook::collect(self.prices, types, self.settings.material_side, system);

        let product_price = match data.t2_formula.primary_output() {
            Some(product) => self
                .prices
                .unit_price(product.type_id, product.quantity, self.settings.product_side)?,
            None => None,
        };

        Ok(invention::find_best_decryptor(
            &data,
            &decryptors,
            &prices,
            product_price,
            &skills,
            facility.as_ref(),
            request.strategy,
            request.target_volume,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::sample;
    use crate::models::SystemId;
    use crate::testing::{self, Fixture};
    use rusqlite::Connection;

    fn calculator(fixture: &Fixture) -> IndustryCalculator<'_> {
        IndustryCalculator::new(fixture, fixture, fixture, CalculatorSettings::default())
    }

    /// Price feed that fails for one type and defers to the fixture otherwise.
    struct FailingPrices<'a> {
        inner: &'a Fixture,
        broken: TypeId,
    }

    impl PriceOracle for FailingPrices<'_> {
        fn unit_price(
            &self,
            type_id: TypeId,
            quantity: u64,
            side: PriceSide,
        ) -> anyhow::Result<Option<f64>> {
            if type_id == self.broken {
                return Err(anyhow::anyhow!("price feed failed for {type_id}"));
            }
            self.inner.unit_price(type_id, quantity, side)
        }

        fn adjusted_price(&self, type_id: TypeId) -> anyhow::Result<Option<f64>> {
            if type_id == self.broken {
                return Err(anyhow::anyhow!("adjusted price feed failed for {type_id}"));
            }
            self.inner.adjusted_price(type_id)
        }

        fn system_cost_index(
            &self,
            system_id: SystemId,
            activity: ActivityKind,
        ) -> anyhow::Result<Option<f64>> {
            self.inner.system_cost_index(system_id, activity)
        }
    }

    #[test]
    fn t1_tree_applies_efficiency() {
        let fixture = Fixture::sample();
        let calc = calculator(&fixture);
        let request = TreeRequest::new(sample::HOBGOBLIN_I_BLUEPRINT, 1, 10).expect("valid");
        let result = calc.compute_tree(&request).expect("computed");

        assert_eq!(result.tree.status, TreeStatus::Complete);
        assert_eq!(result.tree.root_product, Some(sample::HOBGOBLIN_I));
        let raw = &result.tree.aggregated_raw_materials;
        assert_eq!(raw.get(&TypeId(34)), Some(&2000));
        assert_eq!(raw.get(&TypeId(35)), Some(&500));
        assert_eq!(raw.get(&TypeId(36)), Some(&100));
        assert!(result.tree.intermediates.is_empty());

        // 600 s × Industry V × Advanced Industry V
        assert_eq!(result.duration.map(|d| d.seconds), Some(408));

        let pricing = result.pricing.expect("priced");
        assert!((pricing.material_cost - 21_800.0).abs() < 1e-6);
        assert!(pricing.all_prices_available);
        assert_eq!(pricing.output_quantity, 1);
        assert_eq!(pricing.output_value, Some(4_200.0));
        assert!(pricing.job_cost.is_none());
        assert!((pricing.profit.unwrap_or_default() - (4_200.0 - 21_800.0)).abs() < 1e-6);
    }

    #[test]
    fn t2_tree_recurses_through_components_and_reactions() {
        let fixture = Fixture::sample();
        let calc = calculator(&fixture);
        let request = TreeRequest::new(sample::HOBGOBLIN_II_BLUEPRINT, 1, 0).expect("valid");
        let tree = calc.compute_tree(&request).expect("computed").tree;

        assert_eq!(tree.status, TreeStatus::Complete);
        let expected: BTreeMap<TypeId, u64> = [
            (34, 2222),
            (35, 555),
            (36, 111),
            (16638, 100),
            (16641, 100),
            (16635, 100),
            (16636, 100),
            (4051, 15),
            (9848, 1),
            (11399, 2),
        ]
        .into_iter()
        .map(|(t, q)| (TypeId(t), q))
        .collect();
        assert_eq!(tree.aggregated_raw_materials, expected);
        assert_eq!(tree.intermediates.get(&TypeId(11532)), Some(&3));
        assert_eq!(tree.intermediates.get(&sample::TITANIUM_CARBIDE), Some(&10_000));

        let thrusters = tree
            .breakdown
            .iter()
            .find(|n| n.type_id() == TypeId(11532))
            .expect("thruster node");
        match thrusters {
            BreakdownNode::Intermediate {
                sub_runs,
                quantity_needed,
                children,
                ..
            } => {
                assert_eq!(*sub_runs, 3);
                assert_eq!(*quantity_needed, 3);
                // 39 carbide needed, one reaction run makes 10 000
                match &children[0] {
                    BreakdownNode::Intermediate {
                        activity,
                        quantity_needed,
                        quantity_produced,
                        sub_runs,
                        ..
                    } => {
                        assert_eq!(*activity, ActivityKind::Reaction);
                        assert_eq!(*quantity_needed, 39);
                        assert_eq!(*quantity_produced, 10_000);
                        assert_eq!(*sub_runs, 1);
                    }
                    other => panic!("expected reaction node, got {other:?}"),
                }
            }
            other => panic!("expected intermediate, got {other:?}"),
        }
    }

    #[test]
    fn facility_bonuses_reach_nested_nodes() {
        let fixture = Fixture::sample();
        let calc = calculator(&fixture);
        let request = TreeRequest::new(sample::HOBGOBLIN_II_BLUEPRINT, 1, 0)
            .and_then(|r| r.facility(testing::rigged_sotiyo()))
            .expect("valid");
        let result = calc.compute_tree(&request).expect("computed");
        let raw = &result.tree.aggregated_raw_materials;
        // Sotiyo 1% and a null-sec drone rig (-2% × 2.1) on the Hobgoblin I sub-job
        assert_eq!(raw.get(&TypeId(34)), Some(&2108));
        assert_eq!(raw.get(&TypeId(35)), Some(&527));
        assert_eq!(raw.get(&TypeId(36)), Some(&106));

        let job = result
            .pricing
            .and_then(|p| p.job_cost)
            .expect("facility has a system");
        assert_eq!(job.structure_cost_bonus, 5.0);
        assert_eq!(job.facility_tax_rate, 1.0);
        // Fusion Thruster, Robotics, Morphite and Hobgoblin I all have adjusted prices
        assert!(job.unpriced_materials.is_empty());
    }

    #[test]
    fn reaction_chain_at_rigged_tatara() {
        let fixture = Fixture::sample();
        let calc = calculator(&fixture);
        let request = TreeRequest::new(sample::TITANIUM_CARBIDE_REACTION, 1, 0)
            .and_then(|r| r.facility(testing::rigged_tatara()))
            .expect("valid");
        let result = calc.compute_tree(&request).expect("computed");
        let tree = &result.tree;
        assert_eq!(tree.status, TreeStatus::Complete);
        assert_eq!(tree.root_product, Some(sample::TITANIUM_CARBIDE));

        // one run of each intermediate reaction covers the 96 needed
        assert_eq!(tree.intermediates.get(&TypeId(16654)), Some(&200));
        assert_eq!(tree.intermediates.get(&TypeId(16659)), Some(&200));
        // composite rig -2% x 2.1 applies to both reaction tiers
        let raw = &tree.aggregated_raw_materials;
        for moon_material in [16638, 16641, 16635, 16636] {
            assert_eq!(raw.get(&TypeId(moon_material)), Some(&96));
        }
        // fuel blocks: 5 per run on each of the three reactions
        assert_eq!(raw.get(&TypeId(4051)), Some(&15));

        let job = result.pricing.and_then(|p| p.job_cost).expect("facility has a system");
        assert_eq!(job.activity, ActivityKind::Reaction);
        assert_eq!(job.structure_cost_bonus, 0.0);
    }

    #[test]
    fn npc_station_job_cost() {
        let fixture = Fixture::sample();
        let calc = calculator(&fixture);
        let request = TreeRequest::new(sample::HOBGOBLIN_I_BLUEPRINT, 1, 10)
            .and_then(|r| r.facility(testing::npc_station_facility()))
            .expect("valid");
        let job = calc
            .compute_tree(&request)
            .expect("computed")
            .pricing
            .and_then(|p| p.job_cost)
            .expect("job cost");
        // EIV uses unreduced inputs: 2222 × 4.2 + 555 × 8.5 + 111 × 55
        assert!((job.estimated_item_value - 20_154.9).abs() < 1e-6);
        assert!((job.total - 1_360.455_75).abs() < 1e-6);
    }

    #[test]
    fn depth_limit_truncates_instead_of_failing() {
        let fixture = Fixture::empty().with_chain(11);
        let calc = calculator(&fixture);
        let request = TreeRequest::new(TypeId(1000), 1, 0).expect("valid");
        let tree = calc.compute_tree(&request).expect("computed").tree;

        assert_eq!(tree.status, TreeStatus::Truncated);
        assert!(tree.aggregated_raw_materials.is_empty());

        let mut node = &tree.breakdown[0];
        let mut levels = 1;
        while let BreakdownNode::Intermediate { children, .. } = node {
            node = &children[0];
            levels += 1;
        }
        assert_eq!(levels, 11);
        assert_eq!(
            node,
            &BreakdownNode::DepthExceeded {
                type_id: TypeId(2011),
                quantity: 2048,
                depth: MAX_DEPTH,
            }
        );
    }

    #[test]
    fn ten_levels_still_resolve() {
        let fixture = Fixture::empty().with_chain(10);
        let calc = calculator(&fixture);
        let request = TreeRequest::new(TypeId(1000), 1, 0).expect("valid");
        let tree = calc.compute_tree(&request).expect("computed").tree;
        assert_eq!(tree.status, TreeStatus::Complete);
        assert_eq!(tree.aggregated_raw_materials.get(&TypeId(3000)), Some(&2048));
    }

    #[test]
    fn unknown_formula_is_marked_not_cached() {
        let fixture = Fixture::sample();
        let calc = calculator(&fixture);
        let request = TreeRequest::new(TypeId(42), 1, 0).expect("valid");
        let result = calc.compute_tree(&request).expect("computed");
        assert_eq!(result.tree.status, TreeStatus::NotFound);
        assert!(result.tree.aggregated_raw_materials.is_empty());
        assert!(result.pricing.is_none());
        assert_eq!(calc.cache_len(), 0);
    }

    #[test]
    fn invalid_requests_are_rejected() {
        let id = sample::HOBGOBLIN_I_BLUEPRINT;
        assert!(TreeRequest::new(id, 0, 0).is_err());
        assert!(TreeRequest::new(id, -3, 0).is_err());
        assert!(TreeRequest::new(id, 1, -1).is_err());
        assert!(TreeRequest::new(id, 1, 21).is_err());
        assert!(TreeRequest::new(id, 1, 0).and_then(|r| r.te(-2)).is_err());

        let mut taxed = testing::npc_station_facility();
        taxed.facility_tax_rate = Some(-1.0);
        let err = TreeRequest::new(id, 1, 0)
            .and_then(|r| r.facility(taxed))
            .expect_err("negative tax");
        assert!(matches!(err, IndustryError::InvalidInput { field: "facility_tax_rate", .. }));
    }

    #[test]
    fn invention_requests_reject_bad_facilities() {
        let id = sample::HOBGOBLIN_I_BLUEPRINT;
        let mut taxed = testing::npc_station_facility();
        taxed.facility_tax_rate = Some(-50.0);
        let err = InventionRequest::new(id, Strategy::TotalPerItem)
            .facility(taxed)
            .expect_err("negative tax");
        assert!(matches!(err, IndustryError::InvalidInput { field: "facility_tax_rate", .. }));

        let mut off_map = testing::npc_station_facility();
        off_map.security_status = 7.0;
        let err = InventionRequest::new(id, Strategy::TotalPerItem)
            .facility(off_map)
            .expect_err("security out of range");
        assert!(matches!(err, IndustryError::InvalidInput { field: "security_status", .. }));

        assert!(InventionRequest::new(id, Strategy::TotalPerItem)
            .facility(testing::rigged_sotiyo())
            .is_ok());
    }

    #[test]
    fn cache_returns_equal_copies_without_provider_calls() {
        let fixture = Fixture::sample();
        let calc = calculator(&fixture);
        let request = TreeRequest::new(sample::HOBGOBLIN_II_BLUEPRINT, 5, 10)
            .and_then(|r| r.facility(testing::rigged_sotiyo()))
            .expect("valid");

        let first = calc.compute_tree(&request).expect("first");
        let calls = fixture.static_calls();
        assert!(calls > 0);

        let mut second = calc.compute_tree(&request).expect("second");
        assert_eq!(fixture.static_calls(), calls);
        assert_eq!(first, second);

        // mutating a returned copy does not leak into the cache
        second.tree.aggregated_raw_materials.clear();
        let third = calc.compute_tree(&request).expect("third");
        assert_eq!(first, third);
    }

    #[test]
    fn cache_key_covers_request_fields() {
        let fixture = Fixture::sample();
        let calc = calculator(&fixture);
        let base = TreeRequest::new(sample::HOBGOBLIN_I_BLUEPRINT, 1, 0).expect("valid");
        let requests = [
            base.clone(),
            TreeRequest::new(sample::HOBGOBLIN_I_BLUEPRINT, 2, 0).expect("valid"),
            TreeRequest::new(sample::HOBGOBLIN_I_BLUEPRINT, 1, 1).expect("valid"),
            base.clone().te(4).expect("valid"),
            base.clone().facility(testing::npc_station_facility()).expect("valid"),
            base.clone().character(sample::SAMPLE_CHARACTER),
            base.clone().without_prices(),
        ];
        for request in &requests {
            calc.compute_tree(request).expect("computed");
        }
        assert_eq!(calc.cache_len(), requests.len());
        calc.clear_cache();
        assert_eq!(calc.cache_len(), 0);
    }

    #[test]
    fn missing_prices_are_flagged() {
        let mut fixture = Fixture::sample();
        fixture.remove_price(TypeId(36));
        let calc = calculator(&fixture);
        let request = TreeRequest::new(sample::HOBGOBLIN_I_BLUEPRINT, 1, 10).expect("valid");
        let pricing = calc.compute_tree(&request).expect("computed").pricing.expect("priced");
        assert!(!pricing.all_prices_available);
        let mexallon = pricing
            .materials
            .iter()
            .find(|m| m.type_id == TypeId(36))
            .expect("listed");
        assert!(mexallon.price_missing);
        assert_eq!(mexallon.total, 0.0);
        assert!((pricing.material_cost - 15_000.0).abs() < 1e-6);
    }

    #[test]
    fn character_skills_shorten_the_job() {
        let fixture = Fixture::sample();
        let calc = calculator(&fixture);
        let request = TreeRequest::new(sample::HOBGOBLIN_I_BLUEPRINT, 10, 10)
            .and_then(|r| r.te(20))
            .map(|r| r.character(sample::SAMPLE_CHARACTER))
            .expect("valid");
        let duration = calc.compute_tree(&request).expect("computed").duration.expect("duration");
        assert_eq!(duration.base_seconds, 6_000);
        // TE 20, Industry V, Advanced Industry IV
        assert!((duration.skill_multiplier - 0.8 * 0.88).abs() < 1e-12);
        assert_eq!(duration.seconds, 3_380);

        // unknown character falls back to the assumed level
        let unknown = TreeRequest::new(sample::HOBGOBLIN_I_BLUEPRINT, 1, 0)
            .map(|r| r.character(CharacterId(1)))
            .expect("valid");
        let duration = calc.compute_tree(&unknown).expect("computed").duration.expect("duration");
        assert_eq!(duration.seconds, 408);
    }

    #[test]
    fn sqlite_and_fixture_agree() {
        let conn = Connection::open_in_memory().expect("in-memory database");
        db::init_schema(&conn).expect("schema");
        sample::load_sample_data(&conn).expect("sample data");
        let fixture = Fixture::sample();

        let request = TreeRequest::new(sample::HOBGOBLIN_II_BLUEPRINT, 3, 10)
            .and_then(|r| r.facility(testing::rigged_sotiyo()))
            .expect("valid");
        let from_db = IndustryCalculator::new(&conn, &conn, &conn, CalculatorSettings::default())
            .compute_tree(&request)
            .expect("db tree");
        let from_fixture = calculator(&fixture).compute_tree(&request).expect("fixture tree");
        assert_eq!(from_db.tree, from_fixture.tree);
        assert_eq!(from_db.duration, from_fixture.duration);
    }

    #[test]
    fn invention_search_through_the_calculator() {
        let fixture = Fixture::sample();
        let calc = calculator(&fixture);
        assert!(calc.invention(sample::HOBGOBLIN_II_BLUEPRINT).expect("query").is_none());

        let request = InventionRequest::new(sample::HOBGOBLIN_I_BLUEPRINT, Strategy::TotalPerItem)
            .facility(testing::npc_station_facility())
            .expect("valid facility")
            .character(sample::SAMPLE_CHARACTER);
        let search = calc
            .evaluate_invention(&request)
            .expect("evaluated")
            .expect("inventable");
        assert_eq!(search.all_options.len(), 9);
        let none = search
            .all_options
            .iter()
            .find(|o| o.decryptor.is_none())
            .expect("no-decryptor option");
        // encryption IV, datacore skills IV and III
        let expected = 0.34 * 1.1 * (1.0 + 7.0 / 30.0);
        assert!((none.outcome.effective_probability - expected).abs() < 1e-9);
        assert!(search.all_options.iter().all(|o| o.prices_complete));
        assert!(none.attempt.job.is_some());

        let missing = InventionRequest::new(sample::HOBGOBLIN_II_BLUEPRINT, Strategy::MaxRuns);
        assert!(calc.evaluate_invention(&missing).expect("evaluated").is_none());
        assert!(InventionRequest::new(sample::HOBGOBLIN_I_BLUEPRINT, Strategy::MaxRuns)
            .target_volume(0)
            .is_err());
    }

    #[test]
    fn one_failing_decryptor_price_keeps_the_search() {
        let fixture = Fixture::sample();
        let failing = FailingPrices {
            inner: &fixture,
            broken: TypeId(34201),
        };
        let calc =
            IndustryCalculator::new(&fixture, &failing, &fixture, CalculatorSettings::default());
        let request = InventionRequest::new(sample::HOBGOBLIN_I_BLUEPRINT, Strategy::TotalPerItem)
            .facility(testing::npc_station_facility())
            .expect("valid facility");
        let search = calc
            .evaluate_invention(&request)
            .expect("search survives the failed lookup")
            .expect("inventable");

        assert_eq!(search.all_options.len(), 9);
        let accelerant = search
            .all_options
            .iter()
            .find(|o| o.decryptor.as_ref().map(|d| d.type_id) == Some(TypeId(34201)))
            .expect("accelerant option kept");
        assert!(!accelerant.prices_complete);
        assert_eq!(accelerant.attempt.decryptor_cost, 0.0);
        assert_eq!(search.all_options.iter().filter(|o| o.prices_complete).count(), 8);
    }
}
