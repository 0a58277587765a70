//! Plain-text rendering of trees, costs and decryptor rankings

use std::fmt;

use crate::calculator::{JobDuration, Pricing, TreeResult};
use crate::invention::DecryptorSearch;
use crate::job_cost::JobCost;
use crate::models::{BreakdownNode, TreeStatus, TypeId};
use crate::provider::StaticDataProvider;

/// Type name lookup for output. Falls back to the numeric id.
pub struct Names<'a>(pub &'a dyn StaticDataProvider);

impl Names<'_> {
    pub fn name(&self, type_id: TypeId) -> String {
        match self.0.type_name(type_id) {
            Ok(Some(name)) => name,
            _ => format!("#{type_id}"),
        }
    }
}

/// ISK amount with thousands separators and two decimals
pub fn format_isk(amount: f64) -> String {
    if !amount.is_finite() {
        return "n/a".to_string();
    }
    let cents = (amount.abs() * 100.0).round() as u128;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}{grouped}.{:02}", cents % 100)
}

pub fn format_duration(seconds: u64) -> String {
    let days = seconds / 86_400;
    let rest = seconds % 86_400;
    let clock = format!("{:02}:{:02}:{:02}", rest / 3600, rest % 3600 / 60, rest % 60);
    if days > 0 {
        format!("{days}d {clock}")
    } else {
        clock
    }
}

/// Indented breakdown, one line per node
pub fn format_breakdown(nodes: &[BreakdownNode], names: &Names<'_>, indent: usize) -> String {
    let mut output = String::new();
    let prefix = "  ".repeat(indent);

    for node in nodes {
        match node {
            BreakdownNode::Leaf { type_id, quantity } => {
                output.push_str(&format!("{}{} x {}\n", prefix, quantity, names.name(*type_id)));
            }
            BreakdownNode::Intermediate {
                type_id,
                activity,
                quantity_needed,
                quantity_produced,
                sub_runs,
                children,
                ..
            } => {
                output.push_str(&format!(
                    "{}{} x {} ({} run{} of {}, makes {})\n",
                    prefix,
                    quantity_needed,
                    names.name(*type_id),
                    sub_runs,
                    if *sub_runs == 1 { "" } else { "s" },
                    activity,
                    quantity_produced
                ));
                output.push_str(&format_breakdown(children, names, indent + 1));
            }
            BreakdownNode::DepthExceeded { type_id, quantity, depth } => {
                output.push_str(&format!(
                    "{}{} x {} (not expanded: depth limit at level {})\n",
                    prefix,
                    quantity,
                    names.name(*type_id),
                    depth
                ));
            }
        }
    }

    output
}

/// Summary of a tree result: materials, build list, time and costs
pub fn format_tree(result: &TreeResult, names: &Names<'_>) -> String {
    let tree = &result.tree;
    let mut output = String::new();

    if tree.status == TreeStatus::NotFound {
        output.push_str(&format!("Formula {} not found\n", tree.formula_id));
        return output;
    }

    let product = tree.root_product.map_or_else(|| "?".to_string(), |p| names.name(p));
    output.push_str(&format!(
        "=== {} x {} run{} ({}) ===\n",
        product,
        tree.runs,
        if tree.runs == 1 { "" } else { "s" },
        names.name(tree.formula_id)
    ));
    if tree.status == TreeStatus::Truncated {
        output.push_str("WARNING: some branches exceeded the depth limit and are not included\n");
    }

    output.push_str("\nRaw materials:\n");
    let priced = result.pricing.as_ref();
    for (type_id, quantity) in &tree.aggregated_raw_materials {
        let cost = priced
            .and_then(|p| p.materials.iter().find(|m| m.type_id == *type_id))
            .map(|m| {
                if m.price_missing {
                    "no price".to_string()
                } else {
                    format_isk(m.total)
                }
            });
        match cost {
            Some(cost) => output.push_str(&format!(
                "  {:<40} {:>12} {:>20}\n",
                names.name(*type_id),
                quantity,
                cost
            )),
            None => output.push_str(&format!("  {:<40} {:>12}\n", names.name(*type_id), quantity)),
        }
    }

    if !tree.intermediates.is_empty() {
        output.push_str("\nBuild list:\n");
        for (type_id, quantity) in &tree.intermediates {
            output.push_str(&format!("  {:<40} {:>12}\n", names.name(*type_id), quantity));
        }
    }

    if let Some(duration) = &result.duration {
        output.push_str(&format!("\n{duration}\n"));
    }
    if let Some(pricing) = &result.pricing {
        output.push_str(&format!("\n{pricing}"));
    }
    output
}

impl fmt::Display for JobDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Job time: {} (base {}, efficiency x{:.3}, skills x{:.3})",
            format_duration(self.seconds),
            format_duration(self.base_seconds),
            self.efficiency_multiplier,
            self.skill_multiplier
        )
    }
}

impl fmt::Display for JobCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Job cost ({}):", self.activity)?;
        writeln!(f, "  Estimated item value: {:>20}", format_isk(self.estimated_item_value))?;
        write!(f, "  System cost index:    {:>20.4}", self.system_cost_index)?;
        if self.cost_index_missing {
            write!(f, " (missing)")?;
        }
        writeln!(f)?;
        if self.structure_cost_bonus != 0.0 {
            writeln!(f, "  Structure bonus:      {:>19.1}%", self.structure_cost_bonus)?;
        }
        writeln!(f, "  Gross cost:           {:>20}", format_isk(self.gross_cost))?;
        writeln!(
            f,
            "  Facility tax ({:.2}%): {:>20}",
            self.facility_tax_rate,
            format_isk(self.facility_tax)
        )?;
        writeln!(f, "  Surcharge:            {:>20}", format_isk(self.surcharge))?;
        writeln!(f, "  Total:                {:>20}", format_isk(self.total))?;
        if !self.unpriced_materials.is_empty() {
            writeln!(f, "  ({} inputs without adjusted price)", self.unpriced_materials.len())?;
        }
        Ok(())
    }
}

impl fmt::Display for Pricing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Material cost ({}):  {:>20}",
            self.material_side,
            format_isk(self.material_cost)
        )?;
        if !self.all_prices_available {
            let missing = self.materials.iter().filter(|m| m.price_missing).count();
            writeln!(f, "  WARNING: {missing} material(s) without price, counted as 0")?;
        }
        if let Some(job) = &self.job_cost {
            write!(f, "{job}")?;
        }
        writeln!(f, "Total cost:           {:>20}", format_isk(self.total_cost))?;
        if self.output_quantity > 0 {
            writeln!(
                f,
                "Cost per unit:        {:>20}",
                format_isk(self.total_cost / self.output_quantity as f64)
            )?;
        }
        match (self.output_value, self.profit) {
            (Some(value), Some(profit)) => {
                writeln!(f, "Output value ({}):    {:>20}", self.product_side, format_isk(value))?;
                writeln!(f, "Profit:               {:>20}", format_isk(profit))?;
            }
            _ => writeln!(f, "Output value:         {:>20}", "no price")?,
        }
        Ok(())
    }
}

impl fmt::Display for DecryptorSearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Strategy: {}", self.strategy)?;
        if let Some(volume) = self.target_volume {
            write!(f, " (target {volume} units)")?;
        }
        writeln!(f)?;
        writeln!(f, "Best: {}", self.best.name())?;
        writeln!(f)?;
        writeln!(
            f,
            "{:<34} {:>7} {:>3} {:>3} {:>4} {:>18} {:>16} {:>16}",
            "Decryptor", "Chance", "ME", "TE", "Runs", "Cost/attempt", "Cost/item", "Metric"
        )?;
        writeln!(f, "{}", "-".repeat(108))?;
        for option in &self.all_options {
            let outcome = &option.outcome;
            writeln!(
                f,
                "{:<34} {:>6.2}% {:>3} {:>3} {:>4} {:>18} {:>16} {:>16}{}",
                option.name(),
                outcome.effective_probability * 100.0,
                outcome.resulting_me,
                outcome.resulting_te,
                outcome.resulting_runs,
                format_isk(outcome.cost_per_attempt),
                option.cost_per_item.map_or_else(|| "n/a".to_string(), format_isk),
                option.metric.map_or_else(|| "n/a".to_string(), |m| format!("{m:.2}")),
                if option.prices_complete { "" } else { " *" }
            )?;
        }
        if self.all_options.iter().any(|o| !o.prices_complete) {
            writeln!(f, "* some prices missing")?;
        }
        Ok(())
    }
}
