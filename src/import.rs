//! Bulk import of static data dumps, public price feeds and market snapshots
//!
//! Walks a directory for the standard SDE CSV files plus `prices.json`,
//! `systems.json`, `market.csv` and `rigTargets.csv`. Rows that do not parse
//! are counted and skipped.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use rusqlite::Connection;
use serde::Deserialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::bonus::{
    ATTR_RIG_MATERIAL_BONUS, ATTR_RIG_TIME_BONUS, ATTR_STRUCTURE_COST_MULTIPLIER,
    ATTR_STRUCTURE_MATERIAL_MULTIPLIER, ATTR_STRUCTURE_TIME_MULTIPLIER,
};
use crate::db;
use crate::models::{
    ActivityKind, CharacterId, GroupId, GroupRecord, MaterialQuantity, SystemId, TypeId, TypeRecord,
};

/// Dogma attributes the engine reads; everything else in the attribute dump is ignored.
const USED_ATTRIBUTES: [u32; 9] = [
    db::ATTR_DECRYPTOR_PROBABILITY,
    db::ATTR_DECRYPTOR_ME,
    db::ATTR_DECRYPTOR_TE,
    db::ATTR_DECRYPTOR_RUNS,
    ATTR_RIG_TIME_BONUS,
    ATTR_RIG_MATERIAL_BONUS,
    ATTR_STRUCTURE_MATERIAL_MULTIPLIER,
    ATTR_STRUCTURE_COST_MULTIPLIER,
    ATTR_STRUCTURE_TIME_MULTIPLIER,
];

/// Input files in the order they are loaded.
const KNOWN_FILES: [&str; 13] = [
    "invgroups.csv",
    "invtypes.csv",
    "industryactivity.csv",
    "industryactivitymaterials.csv",
    "industryactivityproducts.csv",
    "industryactivityprobabilities.csv",
    "industryactivityskills.csv",
    "dgmtypeattributes.csv",
    "rigtargets.csv",
    "prices.json",
    "systems.json",
    "market.csv",
    "characterskills.csv",
];

#[derive(Debug, Default)]
pub struct ImportStats {
    pub files: usize,
    pub groups: usize,
    pub types: usize,
    pub activities: usize,
    pub materials: usize,
    pub products: usize,
    pub probabilities: usize,
    pub skills: usize,
    pub attributes: usize,
    pub rig_targets: usize,
    pub reference_prices: usize,
    pub market_prices: usize,
    pub cost_indices: usize,
    pub character_skills: usize,
    pub skipped: usize,
}

impl std::fmt::Display for ImportStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Imported {} files:", self.files)?;
        writeln!(f, "  {} groups, {} types", self.groups, self.types)?;
        writeln!(
            f,
            "  {} activities ({} materials, {} products, {} probabilities, {} skills)",
            self.activities, self.materials, self.products, self.probabilities, self.skills
        )?;
        writeln!(f, "  {} attributes, {} rig targets", self.attributes, self.rig_targets)?;
        writeln!(
            f,
            "  {} reference prices, {} market prices, {} cost indices, {} character skills",
            self.reference_prices, self.market_prices, self.cost_indices, self.character_skills
        )?;
        write!(f, "Skipped rows: {}", self.skipped)
    }
}

/// Locate the known input files under `dir`, matching file names case-insensitively
pub fn find_input_files(dir: &Path) -> Result<HashMap<&'static str, PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("{} is not a directory", dir.display());
    }
    let mut found = HashMap::new();
    for entry in WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_ascii_lowercase();
        if let Some(known) = KNOWN_FILES.iter().find(|k| **k == name) {
            if found.insert(*known, entry.path().to_path_buf()).is_some() {
                warn!(file = *known, "found more than once, using {}", entry.path().display());
            }
        }
    }
    Ok(found)
}

/// Data rows of a CSV file (header dropped)
fn data_lines(path: &Path) -> Result<Vec<String>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(content.lines().skip(1).map(|l| l.trim_end().to_string()).collect())
}

fn parse_number(field: &str) -> Option<f64> {
    let field = field.trim().trim_matches('"');
    if field.is_empty() || field.eq_ignore_ascii_case("none") {
        return None;
    }
    field.parse().ok()
}

/// `"quoted, text"` or a bare field, with doubled quotes unescaped
fn unquote(field: &str) -> String {
    let field = field.trim();
    match field.strip_prefix('"').and_then(|f| f.strip_suffix('"')) {
        Some(inner) => inner.replace("\"\"", "\""),
        None => field.to_string(),
    }
}

/// Rows of `typeID,activityID,otherTypeID,value` files
struct ActivityRow {
    formula_id: TypeId,
    activity: Option<ActivityKind>,
    type_id: TypeId,
    value: f64,
}

fn parse_activity_rows(path: &Path, stats: &mut ImportStats) -> Result<Vec<ActivityRow>> {
    let row_re = Regex::new(r"^(\d+),(\d+),(\d+),([\d.eE+-]+)$")?;
    let mut rows = Vec::new();
    for line in data_lines(path)? {
        let Some(cap) = row_re.captures(&line) else {
            stats.skipped += 1;
            continue;
        };
        let (Ok(formula_id), Ok(activity), Ok(type_id), Ok(value)) = (
            cap[1].parse::<u32>(),
            cap[2].parse::<i64>(),
            cap[3].parse::<u32>(),
            cap[4].parse::<f64>(),
        ) else {
            stats.skipped += 1;
            continue;
        };
        rows.push(ActivityRow {
            formula_id: TypeId(formula_id),
            activity: ActivityKind::from_activity_id(activity),
            type_id: TypeId(type_id),
            value,
        });
    }
    Ok(rows)
}

fn import_groups(conn: &Connection, path: &Path, stats: &mut ImportStats) -> Result<()> {
    let row_re = Regex::new(r#"^(\d+),(\d+),("(?:[^"]|"")*"|[^,]*)"#)?;
    for line in data_lines(path)? {
        let Some(cap) = row_re.captures(&line) else {
            stats.skipped += 1;
            continue;
        };
        let (Ok(group_id), Ok(category_id)) = (cap[1].parse(), cap[2].parse()) else {
            stats.skipped += 1;
            continue;
        };
        db::upsert_group(
            conn,
            &GroupRecord {
                group_id: GroupId(group_id),
                category_id,
                name: unquote(&cap[3]),
            },
        )?;
        stats.groups += 1;
    }
    Ok(())
}

fn import_types(conn: &Connection, path: &Path, stats: &mut ImportStats) -> Result<()> {
    // description and later columns may hold commas or span lines; only the first three matter
    let row_re = Regex::new(r#"^(\d+),(\d*|None),("(?:[^"]|"")*"|[^,]*)"#)?;
    for line in data_lines(path)? {
        let Some(cap) = row_re.captures(&line) else {
            stats.skipped += 1;
            continue;
        };
        let Ok(type_id) = cap[1].parse() else {
            stats.skipped += 1;
            continue;
        };
        db::upsert_type(
            conn,
            &TypeRecord {
                type_id: TypeId(type_id),
                group_id: cap[2].parse().ok().map(GroupId),
                name: unquote(&cap[3]),
            },
        )?;
        stats.types += 1;
    }
    Ok(())
}

fn import_activities(conn: &Connection, path: &Path, stats: &mut ImportStats) -> Result<()> {
    let row_re = Regex::new(r"^(\d+),(\d+),(\d+)$")?;
    for line in data_lines(path)? {
        let Some(cap) = row_re.captures(&line) else {
            stats.skipped += 1;
            continue;
        };
        let (Ok(formula_id), Ok(activity), Ok(duration)) =
            (cap[1].parse::<u32>(), cap[2].parse::<i64>(), cap[3].parse::<u64>())
        else {
            stats.skipped += 1;
            continue;
        };
        // research and copying activities are not modelled
        let Some(activity) = ActivityKind::from_activity_id(activity) else {
            continue;
        };
        db::upsert_activity(conn, TypeId(formula_id), activity, duration)?;
        stats.activities += 1;
    }
    Ok(())
}

fn import_materials(conn: &Connection, path: &Path, stats: &mut ImportStats) -> Result<()> {
    for row in parse_activity_rows(path, stats)? {
        let Some(activity) = row.activity else { continue };
        let material = MaterialQuantity {
            type_id: row.type_id,
            quantity: row.value as u64,
        };
        db::insert_activity_material(conn, row.formula_id, activity, &material)?;
        stats.materials += 1;
    }
    Ok(())
}

fn import_products(conn: &Connection, path: &Path, stats: &mut ImportStats) -> Result<()> {
    for row in parse_activity_rows(path, stats)? {
        let Some(activity) = row.activity else { continue };
        let product = MaterialQuantity {
            type_id: row.type_id,
            quantity: row.value as u64,
        };
        db::insert_activity_product(conn, row.formula_id, activity, &product, None)?;
        stats.products += 1;
    }
    Ok(())
}

fn import_probabilities(conn: &Connection, path: &Path, stats: &mut ImportStats) -> Result<()> {
    for row in parse_activity_rows(path, stats)? {
        let Some(activity) = row.activity else { continue };
        let updated =
            db::set_activity_probability(conn, row.formula_id, activity, row.type_id, row.value)?;
        if updated == 0 {
            debug!(
                formula = %row.formula_id,
                product = %row.type_id,
                "probability without product row"
            );
            stats.skipped += 1;
            continue;
        }
        stats.probabilities += 1;
    }
    Ok(())
}

fn import_skills(conn: &Connection, path: &Path, stats: &mut ImportStats) -> Result<()> {
    for row in parse_activity_rows(path, stats)? {
        let Some(activity) = row.activity else { continue };
        db::insert_activity_skill(conn, row.formula_id, activity, row.type_id, row.value as u8)?;
        stats.skills += 1;
    }
    Ok(())
}

fn import_attributes(conn: &Connection, path: &Path, stats: &mut ImportStats) -> Result<()> {
    let row_re = Regex::new(r"^(\d+),(\d+),([^,]*),([^,]*)$")?;
    for line in data_lines(path)? {
        let Some(cap) = row_re.captures(&line) else {
            stats.skipped += 1;
            continue;
        };
        let (Ok(type_id), Ok(attribute_id)) = (cap[1].parse::<u32>(), cap[2].parse::<u32>()) else {
            stats.skipped += 1;
            continue;
        };
        if !USED_ATTRIBUTES.contains(&attribute_id) {
            continue;
        }
        let Some(value) = parse_number(&cap[4]).or_else(|| parse_number(&cap[3])) else {
            stats.skipped += 1;
            continue;
        };
        db::upsert_type_attribute(conn, TypeId(type_id), attribute_id, value)?;
        stats.attributes += 1;
    }
    Ok(())
}

fn import_rig_targets(conn: &Connection, path: &Path, stats: &mut ImportStats) -> Result<()> {
    let row_re = Regex::new(r"^(\d+),(\d+)$")?;
    for line in data_lines(path)? {
        let parsed = row_re
            .captures(&line)
            .and_then(|cap| Some((cap[1].parse::<u32>().ok()?, cap[2].parse::<u32>().ok()?)));
        let Some((rig, group)) = parsed else {
            stats.skipped += 1;
            continue;
        };
        db::insert_rig_target(conn, TypeId(rig), GroupId(group))?;
        stats.rig_targets += 1;
    }
    Ok(())
}

fn import_market_csv(conn: &Connection, path: &Path, stats: &mut ImportStats) -> Result<()> {
    let row_re = Regex::new(r"^(\d+),([^,]*),([^,]*)$")?;
    for line in data_lines(path)? {
        let Some(cap) = row_re.captures(&line) else {
            stats.skipped += 1;
            continue;
        };
        let Ok(type_id) = cap[1].parse::<u32>() else {
            stats.skipped += 1;
            continue;
        };
        let (buy, sell) = (parse_number(&cap[2]), parse_number(&cap[3]));
        db::upsert_market_price(conn, TypeId(type_id), buy, sell)?;
        stats.market_prices += 1;
    }
    Ok(())
}

fn import_character_skills(conn: &Connection, path: &Path, stats: &mut ImportStats) -> Result<()> {
    let row_re = Regex::new(r"^(\d+),(\d+),([0-5])$")?;
    for line in data_lines(path)? {
        let parsed = row_re.captures(&line).and_then(|cap| {
            Some((
                cap[1].parse::<u64>().ok()?,
                cap[2].parse::<u32>().ok()?,
                cap[3].parse::<u8>().ok()?,
            ))
        });
        let Some((character, skill, level)) = parsed else {
            stats.skipped += 1;
            continue;
        };
        db::upsert_character_skill(conn, CharacterId(character), TypeId(skill), level)?;
        stats.character_skills += 1;
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct PriceRecord {
    type_id: u32,
    #[serde(default)]
    adjusted_price: Option<f64>,
    #[serde(default)]
    average_price: Option<f64>,
}

fn import_prices_json(conn: &Connection, path: &Path, stats: &mut ImportStats) -> Result<()> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let records: Vec<PriceRecord> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    for record in records {
        db::upsert_reference_price(
            conn,
            TypeId(record.type_id),
            record.adjusted_price,
            record.average_price,
        )?;
        stats.reference_prices += 1;
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct SystemRecord {
    solar_system_id: u32,
    cost_indices: Vec<CostIndexRecord>,
}

#[derive(Debug, Deserialize)]
struct CostIndexRecord {
    activity: String,
    cost_index: f64,
}

fn import_systems_json(conn: &Connection, path: &Path, stats: &mut ImportStats) -> Result<()> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let systems: Vec<SystemRecord> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    for system in systems {
        for index in &system.cost_indices {
            // research and copying indices are not used
            let Some(activity) = ActivityKind::from_name(&index.activity) else {
                continue;
            };
            let system_id = SystemId(system.solar_system_id);
            db::upsert_cost_index(conn, system_id, activity, index.cost_index)?;
            stats.cost_indices += 1;
        }
    }
    Ok(())
}

type Importer = fn(&Connection, &Path, &mut ImportStats) -> Result<()>;

fn importer_for(file: &str) -> Option<Importer> {
    let importer: Importer = match file {
        "invgroups.csv" => import_groups,
        "invtypes.csv" => import_types,
        "industryactivity.csv" => import_activities,
        "industryactivitymaterials.csv" => import_materials,
        "industryactivityproducts.csv" => import_products,
        "industryactivityprobabilities.csv" => import_probabilities,
        "industryactivityskills.csv" => import_skills,
        "dgmtypeattributes.csv" => import_attributes,
        "rigtargets.csv" => import_rig_targets,
        "prices.json" => import_prices_json,
        "systems.json" => import_systems_json,
        "market.csv" => import_market_csv,
        "characterskills.csv" => import_character_skills,
        _ => return None,
    };
    Some(importer)
}

/// Import every known file found under `dir` in one transaction
pub fn import_directory(conn: &Connection, dir: &Path) -> Result<ImportStats> {
    let mut stats = ImportStats::default();

    info!(dir = %dir.display(), "scanning for data files");
    let files = find_input_files(dir)?;
    if files.is_empty() {
        warn!(dir = %dir.display(), "no known data files found");
        return Ok(stats);
    }

    let tx = conn.unchecked_transaction()?;
    for name in KNOWN_FILES {
        let (Some(path), Some(importer)) = (files.get(name), importer_for(name)) else {
            continue;
        };
        let skipped_before = stats.skipped;
        importer(&tx, path, &mut stats).with_context(|| format!("importing {}", path.display()))?;
        stats.files += 1;
        info!(file = name, skipped = stats.skipped - skipped_before, "imported");
    }
    tx.commit()?;

    Ok(stats)
}
