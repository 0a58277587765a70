//! Invention probability, attempt cost and decryptor ranking

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bonus::{self, FacilityProfile};
use crate::error::{IndustryError, Result};
use crate::job_cost::{self, JobCost};
use crate::models::{
    ActivityKind, CharacterSkills, Decryptor, InventionData, InventionOutcome, TypeId,
};
use crate::provider::PriceBook;

/// ME of a freshly invented copy before decryptor modifiers.
pub const INVENTED_BASE_ME: i32 = 2;
/// TE of a freshly invented copy before decryptor modifiers.
pub const INVENTED_BASE_TE: i32 = 4;

/// Skill levels that drive invention chance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventionSkills {
    pub encryption: u8,
    pub datacore: [u8; 2],
}

impl InventionSkills {
    pub fn for_invention(data: &InventionData, skills: &CharacterSkills) -> Self {
        let encryption = data.encryption_skill().map_or(0, |s| skills.level(s));
        let cores = data.datacore_skills();
        let level = |i: usize| cores.get(i).map_or(0, |&s| skills.level(s));
        InventionSkills {
            encryption,
            datacore: [level(0), level(1)],
        }
    }
}

/// Success chance, capped at 1.0.
pub fn probability(
    base_probability: f64,
    skills: &InventionSkills,
    decryptor_multiplier: f64,
) -> f64 {
    let encryption = 1.0 + f64::from(skills.encryption) / 40.0;
    let science = 1.0 + f64::from(skills.datacore[0] + skills.datacore[1]) / 30.0;
    (base_probability * encryption * science * decryptor_multiplier).min(1.0)
}

/// Cost of one invention attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttemptCost {
    pub material_cost: f64,
    pub decryptor_cost: f64,
    pub job_cost: f64,
    pub job: Option<JobCost>,
    pub total_cost_per_attempt: f64,
    /// 0 when the probability is 0.
    pub cost_per_success: f64,
    pub prices_complete: bool,
}

pub fn cost(
    data: &InventionData,
    prices: &PriceBook,
    probability: f64,
    decryptor: Option<&Decryptor>,
    facility: Option<&FacilityProfile>,
) -> AttemptCost {
    let mut prices_complete = true;
    let mut material_cost = 0.0;
    for material in &data.materials {
        match prices.unit_price(material.type_id) {
            Some(price) => material_cost += price * material.quantity as f64,
            None => prices_complete = false,
        }
    }

    let decryptor_cost = match decryptor {
        Some(d) => prices.unit_price(d.type_id).unwrap_or_else(|| {
            prices_complete = false;
            0.0
        }),
        None => 0.0,
    };

    let job = facility.map(|f| {
        job_cost::job_cost_for_materials(
            ActivityKind::Invention,
            &data.materials,
            1,
            |t| prices.adjusted_price(t),
            prices.cost_index(ActivityKind::Invention),
            f,
        )
    });
    let job_total = job.as_ref().map_or(0.0, |j| j.total);

    let total = material_cost + decryptor_cost + job_total;
    AttemptCost {
        material_cost,
        decryptor_cost,
        job_cost: job_total,
        job,
        total_cost_per_attempt: total,
        cost_per_success: if probability > 0.0 { total / probability } else { 0.0 },
        prices_complete,
    }
}

/// Objective used to rank decryptor options.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Highest success chance.
    InventionOnly,
    /// Lowest total cost per manufactured unit over the copy's lifetime.
    TotalPerItem,
    /// Lowest cost per invention attempt.
    TotalFullBpc,
    /// Lowest manufacturing time per unit, weighted by cost per unit.
    TimeEfficiency,
    /// Most expected runs per attempt, or cheapest route to a target volume.
    MaxRuns,
}

impl Strategy {
    pub const ALL: [Strategy; 5] = [
        Strategy::InventionOnly,
        Strategy::TotalPerItem,
        Strategy::TotalFullBpc,
        Strategy::TimeEfficiency,
        Strategy::MaxRuns,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::InventionOnly => "invention-only",
            Strategy::TotalPerItem => "total-per-item",
            Strategy::TotalFullBpc => "total-full-bpc",
            Strategy::TimeEfficiency => "time-efficiency",
            Strategy::MaxRuns => "max-runs",
        }
    }

    fn objective(self, target_volume: Option<u64>) -> Objective {
        match self {
            Strategy::InventionOnly => {
                Objective::maximize(|o| Some(o.outcome.effective_probability))
            }
            Strategy::TotalPerItem => Objective::minimize(|o| o.cost_per_item),
            Strategy::TotalFullBpc => Objective::minimize(|o| Some(o.outcome.cost_per_attempt)),
            Strategy::TimeEfficiency => {
                Objective::minimize(|o| o.cost_per_item.map(|c| o.seconds_per_unit * c))
            }
            Strategy::MaxRuns if target_volume.is_some() => {
                Objective::minimize(|o| o.cost_for_target_volume)
            }
            Strategy::MaxRuns => Objective::maximize(|o| Some(o.expected_runs_per_attempt)),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = IndustryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "invention-only" => Ok(Strategy::InventionOnly),
            "total-per-item" | "profit-per-run" => Ok(Strategy::TotalPerItem),
            "total-full-bpc" | "profit-per-attempt" => Ok(Strategy::TotalFullBpc),
            "time-efficiency" => Ok(Strategy::TimeEfficiency),
            "max-runs" | "custom-volume" => Ok(Strategy::MaxRuns),
            other => Err(IndustryError::invalid("strategy", other, "unknown strategy")),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum SortOrder {
    Ascending,
    Descending,
}

/// Metric extractor; None means the option can never reach the goal and ranks last.
struct Objective {
    metric: fn(&DecryptorOption) -> Option<f64>,
    order: SortOrder,
}

impl Objective {
    fn minimize(metric: fn(&DecryptorOption) -> Option<f64>) -> Self {
        Objective {
            metric,
            order: SortOrder::Ascending,
        }
    }

    fn maximize(metric: fn(&DecryptorOption) -> Option<f64>) -> Self {
        Objective {
            metric,
            order: SortOrder::Descending,
        }
    }
}

/// One evaluated decryptor choice (or no decryptor).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecryptorOption {
    pub decryptor: Option<Decryptor>,
    pub outcome: InventionOutcome,
    pub attempt: AttemptCost,
    /// Units one invented copy manufactures over all its runs.
    pub units_per_copy: u64,
    pub manufacturing_cost_per_unit: f64,
    /// None when the option can never succeed.
    pub cost_per_item: Option<f64>,
    /// None without a product price or a cost per item.
    pub profit_per_item: Option<f64>,
    pub seconds_per_unit: f64,
    pub expected_runs_per_attempt: f64,
    /// Only set with a target volume and a non-zero chance.
    pub cost_for_target_volume: Option<f64>,
    pub prices_complete: bool,
    /// Value of the ranking metric for the chosen strategy, None if unreachable.
    pub metric: Option<f64>,
}

impl DecryptorOption {
    pub fn name(&self) -> &str {
        self.decryptor.as_ref().map_or("(none)", |d| d.name.as_str())
    }

    fn sort_id(&self) -> u32 {
        self.decryptor.as_ref().map_or(0, |d| d.type_id.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecryptorSearch {
    pub t1_formula_id: TypeId,
    pub strategy: Strategy,
    pub target_volume: Option<u64>,
    pub best: DecryptorOption,
    pub all_options: Vec<DecryptorOption>,
}

/// Pure inputs for evaluating one decryptor choice.
struct EvaluationContext<'a> {
    data: &'a InventionData,
    prices: &'a PriceBook,
    product_price: Option<f64>,
    skills: &'a CharacterSkills,
    facility: Option<&'a FacilityProfile>,
    target_volume: Option<u64>,
}

impl EvaluationContext<'_> {
    fn evaluate(&self, decryptor: Option<&Decryptor>) -> Result<DecryptorOption> {
        let data = self.data;
        let invention_skills = InventionSkills::for_invention(data, self.skills);
        let multiplier = decryptor.map_or(1.0, |d| d.probability_multiplier);
        if !(multiplier.is_finite() && multiplier >= 0.0) {
            return Err(IndustryError::invalid(
                "probability_multiplier",
                multiplier,
                "must be a non-negative number",
            ));
        }
        let chance = probability(data.base_probability, &invention_skills, multiplier);

        let runs = i64::from(data.base_runs) + i64::from(decryptor.map_or(0, |d| d.runs_modifier));
        let resulting_runs = u32::try_from(runs)
            .ok()
            .filter(|&r| r > 0)
            .ok_or_else(|| {
                IndustryError::invalid("resulting_runs", runs, "must be at least one run")
            })?;
        let resulting_me = INVENTED_BASE_ME + decryptor.map_or(0, |d| d.me_modifier);
        let resulting_te = INVENTED_BASE_TE + decryptor.map_or(0, |d| d.te_modifier);
        let me = u8::try_from(resulting_me)
            .map_err(|_| IndustryError::invalid("resulting_me", resulting_me, "out of range"))?;
        let te = u8::try_from(resulting_te)
            .map_err(|_| IndustryError::invalid("resulting_te", resulting_te, "out of range"))?;

        let attempt = cost(data, self.prices, chance, decryptor, self.facility);
        let mut prices_complete = attempt.prices_complete;

        let t2 = &data.t2_formula;
        let per_run = t2
            .primary_output()
            .map_or(1, |o| o.quantity)
            .max(1);
        let units_per_copy = u64::from(resulting_runs) * per_run;

        let group = data.t2_product_group;
        let material_multiplier =
            bonus::material_multiplier(ActivityKind::Manufacturing, me, self.facility, group);
        let mut manufacturing_cost = 0.0;
        for input in &t2.inputs {
            let quantity =
                bonus::apply_to_quantity(input.quantity, resulting_runs, material_multiplier);
            match self.prices.unit_price(input.type_id) {
                Some(price) => manufacturing_cost += price * quantity as f64,
                None => prices_complete = false,
            }
        }
        let manufacturing_cost_per_unit = manufacturing_cost / units_per_copy as f64;

        let cost_per_item = (chance > 0.0)
            .then(|| (attempt.cost_per_success + manufacturing_cost) / units_per_copy as f64);
        let profit_per_item = self.product_price.zip(cost_per_item).map(|(p, c)| p - c);

        let duration =
            bonus::duration_multiplier(ActivityKind::Manufacturing, te, self.facility, group)
                * bonus::skill_time_multiplier(ActivityKind::Manufacturing, self.skills);
        let seconds_per_unit = t2.base_duration_s as f64 * duration / per_run as f64;

        let cost_for_target_volume = self.target_volume.filter(|_| chance > 0.0).map(|volume| {
            let copies = volume.div_ceil(units_per_copy);
            copies as f64 * attempt.cost_per_success + volume as f64 * manufacturing_cost_per_unit
        });

        Ok(DecryptorOption {
            decryptor: decryptor.cloned(),
            outcome: InventionOutcome {
                base_probability: data.base_probability,
                effective_probability: chance,
                decryptor_applied: decryptor.map(|d| d.type_id),
                resulting_me,
                resulting_te,
                resulting_runs,
                cost_per_attempt: attempt.total_cost_per_attempt,
                cost_per_success: attempt.cost_per_success,
            },
            attempt,
            units_per_copy,
            manufacturing_cost_per_unit,
            cost_per_item,
            profit_per_item,
            seconds_per_unit,
            expected_runs_per_attempt: chance * f64::from(resulting_runs),
            cost_for_target_volume,
            prices_complete,
            metric: None,
        })
    }
}

/// Evaluate "no decryptor" plus every catalog decryptor and rank them by `strategy`.
///
/// Options that fail to evaluate are logged and left out; the rest are still ranked.
/// Equal metrics are ordered by decryptor type id, never by evaluation order.
#[allow(clippy::too_many_arguments)]
pub fn find_best_decryptor(
    data: &InventionData,
    decryptors: &[Decryptor],
    prices: &PriceBook,
    product_price: Option<f64>,
    skills: &CharacterSkills,
    facility: Option<&FacilityProfile>,
    strategy: Strategy,
    target_volume: Option<u64>,
) -> Option<DecryptorSearch> {
    let ctx = EvaluationContext {
        data,
        prices,
        product_price,
        skills,
        facility,
        target_volume,
    };
    let objective = strategy.objective(target_volume);

    let candidates: Vec<Option<&Decryptor>> =
        std::iter::once(None).chain(decryptors.iter().map(Some)).collect();

    let mut options: Vec<DecryptorOption> = candidates
        .into_par_iter()
        .filter_map(|decryptor| match ctx.evaluate(decryptor) {
            Ok(mut option) => {
                option.metric = (objective.metric)(&option);
                Some(option)
            }
            Err(e) => {
                warn!(
                    decryptor = decryptor.map_or("(none)", |d| d.name.as_str()),
                    error = %e,
                    "skipping decryptor option"
                );
                None
            }
        })
        .collect();

    options.sort_by(|a, b| {
        let by_metric = match (a.metric, b.metric) {
            (Some(x), Some(y)) => match objective.order {
                SortOrder::Ascending => x.total_cmp(&y),
                SortOrder::Descending => y.total_cmp(&x),
            },
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        match by_metric {
            Ordering::Equal => a.sort_id().cmp(&b.sort_id()),
            other => other,
        }
    });

    let best = options.first()?.clone();
    debug!(strategy = %strategy, best = best.name(), options = options.len(), "ranked decryptors");
    Some(DecryptorSearch {
        t1_formula_id: data.t1_formula_id,
        strategy,
        target_volume,
        best,
        all_options: options,
    })
}
