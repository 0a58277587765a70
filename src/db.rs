//! Database schema and operations

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::models::{
    ActivityKind, CharacterId, CharacterSkills, Decryptor, FormulaSummary, GroupId, GroupRecord,
    InventionData, MaterialQuantity, ProductionFormula, SystemId, TypeId, TypeRecord,
};
use crate::provider::{PriceOracle, PriceSide, SkillSource, StaticDataProvider};

pub const ATTR_DECRYPTOR_PROBABILITY: u32 = 1112;
pub const ATTR_DECRYPTOR_ME: u32 = 1113;
pub const ATTR_DECRYPTOR_TE: u32 = 1114;
pub const ATTR_DECRYPTOR_RUNS: u32 = 1124;

/// Activities that turn inputs into a product (legacy reactions included).
const PRODUCING_ACTIVITIES: &str = "(1, 9, 11)";

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS groups (
            group_id INTEGER PRIMARY KEY,
            category_id INTEGER,
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS types (
            type_id INTEGER PRIMARY KEY,
            group_id INTEGER,
            name TEXT NOT NULL
        );

        -- One row per blueprint/formula activity (1 manufacturing, 8 invention, 11 reaction)
        CREATE TABLE IF NOT EXISTS activities (
            formula_id INTEGER,
            activity INTEGER,
            duration_s INTEGER NOT NULL,
            PRIMARY KEY (formula_id, activity)
        );

        CREATE TABLE IF NOT EXISTS activity_materials (
            formula_id INTEGER,
            activity INTEGER,
            type_id INTEGER,
            quantity INTEGER NOT NULL,
            PRIMARY KEY (formula_id, activity, type_id)
        );

        CREATE TABLE IF NOT EXISTS activity_products (
            formula_id INTEGER,
            activity INTEGER,
            type_id INTEGER,
            quantity INTEGER NOT NULL,
            probability REAL,
            PRIMARY KEY (formula_id, activity, type_id)
        );

        CREATE TABLE IF NOT EXISTS activity_skills (
            formula_id INTEGER,
            activity INTEGER,
            skill_id INTEGER,
            level INTEGER NOT NULL,
            PRIMARY KEY (formula_id, activity, skill_id)
        );

        CREATE TABLE IF NOT EXISTS type_attributes (
            type_id INTEGER,
            attribute_id INTEGER,
            value REAL NOT NULL,
            PRIMARY KEY (type_id, attribute_id)
        );

        -- Product groups a structure rig applies to
        CREATE TABLE IF NOT EXISTS rig_targets (
            rig_type_id INTEGER,
            group_id INTEGER,
            PRIMARY KEY (rig_type_id, group_id)
        );

        CREATE TABLE IF NOT EXISTS market_prices (
            type_id INTEGER PRIMARY KEY,
            buy REAL,
            sell REAL
        );

        -- Regulatory prices from the public price feed
        CREATE TABLE IF NOT EXISTS reference_prices (
            type_id INTEGER PRIMARY KEY,
            adjusted_price REAL,
            average_price REAL
        );

        CREATE TABLE IF NOT EXISTS cost_indices (
            system_id INTEGER,
            activity TEXT,
            cost_index REAL NOT NULL,
            PRIMARY KEY (system_id, activity)
        );

        CREATE TABLE IF NOT EXISTS character_skills (
            character_id INTEGER,
            skill_id INTEGER,
            level INTEGER NOT NULL,
            PRIMARY KEY (character_id, skill_id)
        );

        CREATE INDEX IF NOT EXISTS idx_activity_products_type ON activity_products(type_id);
        CREATE INDEX IF NOT EXISTS idx_types_group ON types(group_id);
        "#,
    )?;
    Ok(())
}

/// Clear reference data (for re-import)
pub fn clear_static_data(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM rig_targets;
        DELETE FROM type_attributes;
        DELETE FROM activity_skills;
        DELETE FROM activity_products;
        DELETE FROM activity_materials;
        DELETE FROM activities;
        DELETE FROM types;
        DELETE FROM groups;
        "#,
    )?;
    Ok(())
}

/// Clear prices, cost indices and character skills
pub fn clear_market_data(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM market_prices;
        DELETE FROM reference_prices;
        DELETE FROM cost_indices;
        DELETE FROM character_skills;
        "#,
    )?;
    Ok(())
}

pub fn upsert_group(conn: &Connection, group: &GroupRecord) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO groups (group_id, category_id, name) VALUES (?1, ?2, ?3)",
        (group.group_id.0, group.category_id, &group.name),
    )?;
    Ok(())
}

pub fn upsert_type(conn: &Connection, record: &TypeRecord) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO types (type_id, group_id, name) VALUES (?1, ?2, ?3)",
        (record.type_id.0, record.group_id.map(|g| g.0), &record.name),
    )?;
    Ok(())
}

pub fn upsert_activity(
    conn: &Connection,
    formula_id: TypeId,
    activity: ActivityKind,
    duration_s: u64,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO activities (formula_id, activity, duration_s) VALUES (?1, ?2, ?3)",
        (formula_id.0, activity.activity_id(), duration_s),
    )?;
    Ok(())
}

pub fn insert_activity_material(
    conn: &Connection,
    formula_id: TypeId,
    activity: ActivityKind,
    material: &MaterialQuantity,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO activity_materials (formula_id, activity, type_id, quantity)
         VALUES (?1, ?2, ?3, ?4)",
        (
            formula_id.0,
            activity.activity_id(),
            material.type_id.0,
            material.quantity,
        ),
    )?;
    Ok(())
}

pub fn insert_activity_product(
    conn: &Connection,
    formula_id: TypeId,
    activity: ActivityKind,
    product: &MaterialQuantity,
    probability: Option<f64>,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO activity_products (formula_id, activity, type_id, quantity, probability)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            formula_id.0,
            activity.activity_id(),
            product.type_id.0,
            product.quantity,
            probability,
        ),
    )?;
    Ok(())
}

/// Attach a success probability to an already inserted product row
pub fn set_activity_probability(
    conn: &Connection,
    formula_id: TypeId,
    activity: ActivityKind,
    product: TypeId,
    probability: f64,
) -> Result<usize> {
    let updated = conn.execute(
        "UPDATE activity_products SET probability = ?4
         WHERE formula_id = ?1 AND activity = ?2 AND type_id = ?3",
        (formula_id.0, activity.activity_id(), product.0, probability),
    )?;
    Ok(updated)
}

pub fn insert_activity_skill(
    conn: &Connection,
    formula_id: TypeId,
    activity: ActivityKind,
    skill: TypeId,
    level: u8,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO activity_skills (formula_id, activity, skill_id, level)
         VALUES (?1, ?2, ?3, ?4)",
        (formula_id.0, activity.activity_id(), skill.0, level),
    )?;
    Ok(())
}

pub fn upsert_type_attribute(
    conn: &Connection,
    type_id: TypeId,
    attribute_id: u32,
    value: f64,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO type_attributes (type_id, attribute_id, value) VALUES (?1, ?2, ?3)",
        (type_id.0, attribute_id, value),
    )?;
    Ok(())
}

pub fn insert_rig_target(conn: &Connection, rig: TypeId, group: GroupId) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO rig_targets (rig_type_id, group_id) VALUES (?1, ?2)",
        (rig.0, group.0),
    )?;
    Ok(())
}

pub fn upsert_market_price(
    conn: &Connection,
    type_id: TypeId,
    buy: Option<f64>,
    sell: Option<f64>,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO market_prices (type_id, buy, sell) VALUES (?1, ?2, ?3)",
        (type_id.0, buy, sell),
    )?;
    Ok(())
}

pub fn upsert_reference_price(
    conn: &Connection,
    type_id: TypeId,
    adjusted_price: Option<f64>,
    average_price: Option<f64>,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO reference_prices (type_id, adjusted_price, average_price)
         VALUES (?1, ?2, ?3)",
        (type_id.0, adjusted_price, average_price),
    )?;
    Ok(())
}

pub fn upsert_cost_index(
    conn: &Connection,
    system_id: SystemId,
    activity: ActivityKind,
    cost_index: f64,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO cost_indices (system_id, activity, cost_index) VALUES (?1, ?2, ?3)",
        (system_id.0, activity.as_str(), cost_index),
    )?;
    Ok(())
}

pub fn upsert_character_skill(
    conn: &Connection,
    character: CharacterId,
    skill: TypeId,
    level: u8,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO character_skills (character_id, skill_id, level) VALUES (?1, ?2, ?3)",
        (character.0, skill.0, level),
    )?;
    Ok(())
}

/// Insert a full formula: activity row, inputs and outputs
pub fn insert_formula(conn: &Connection, formula: &ProductionFormula) -> Result<()> {
    upsert_activity(conn, formula.formula_id, formula.activity, formula.base_duration_s)?;
    for input in &formula.inputs {
        insert_activity_material(conn, formula.formula_id, formula.activity, input)?;
    }
    for output in &formula.outputs {
        insert_activity_product(conn, formula.formula_id, formula.activity, output, None)?;
    }
    Ok(())
}

fn activity_materials(
    conn: &Connection,
    formula_id: TypeId,
    activity: i64,
) -> Result<Vec<MaterialQuantity>> {
    let mut stmt = conn.prepare(
        "SELECT type_id, quantity FROM activity_materials
         WHERE formula_id = ?1 AND activity = ?2
         ORDER BY rowid",
    )?;
    let rows = stmt.query_map((formula_id.0, activity), |row| {
        Ok(MaterialQuantity {
            type_id: TypeId(row.get(0)?),
            quantity: row.get(1)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

fn activity_products(
    conn: &Connection,
    formula_id: TypeId,
    activity: i64,
) -> Result<Vec<(MaterialQuantity, Option<f64>)>> {
    let mut stmt = conn.prepare(
        "SELECT type_id, quantity, probability FROM activity_products
         WHERE formula_id = ?1 AND activity = ?2
         ORDER BY rowid",
    )?;
    let rows = stmt.query_map((formula_id.0, activity), |row| {
        Ok((
            MaterialQuantity {
                type_id: TypeId(row.get(0)?),
                quantity: row.get(1)?,
            },
            row.get::<_, Option<f64>>(2)?,
        ))
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

fn activity_duration(conn: &Connection, formula_id: TypeId, activity: i64) -> Result<Option<u64>> {
    let duration = conn
        .query_row(
            "SELECT duration_s FROM activities WHERE formula_id = ?1 AND activity = ?2",
            (formula_id.0, activity),
            |row| row.get(0),
        )
        .optional()?;
    Ok(duration)
}

/// Load one activity of a formula. Returns None when it has neither inputs nor outputs.
pub fn load_formula(
    conn: &Connection,
    formula_id: TypeId,
    activity_id: i64,
) -> Result<Option<ProductionFormula>> {
    let Some(activity) = ActivityKind::from_activity_id(activity_id) else {
        return Ok(None);
    };
    let inputs = activity_materials(conn, formula_id, activity_id)?;
    let outputs: Vec<MaterialQuantity> = activity_products(conn, formula_id, activity_id)?
        .into_iter()
        .map(|(product, _)| product)
        .collect();
    let duration = activity_duration(conn, formula_id, activity_id)?;

    if inputs.is_empty() && outputs.is_empty() && duration.is_none() {
        return Ok(None);
    }
    Ok(Some(ProductionFormula {
        formula_id,
        activity,
        inputs,
        outputs,
        base_duration_s: duration.unwrap_or(0),
    }))
}

/// List every manufacturing/reaction formula with its product
pub fn list_formulas(conn: &Connection) -> Result<Vec<FormulaSummary>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT p.formula_id, f.name, p.activity, p.type_id, t.name, p.quantity
         FROM activity_products p
         LEFT JOIN types f ON f.type_id = p.formula_id
         LEFT JOIN types t ON t.type_id = p.type_id
         WHERE p.activity IN {PRODUCING_ACTIVITIES}
         ORDER BY t.name, p.formula_id"
    ))?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, u32>(0)?,
            row.get::<_, Option<String>>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, u32>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, u64>(5)?,
        ))
    })?;

    let mut results = Vec::new();
    for row in rows {
        let (formula_id, formula_name, activity, product_id, product_name, quantity) = row?;
        let Some(activity) = ActivityKind::from_activity_id(activity) else {
            continue;
        };
        results.push(FormulaSummary {
            formula_id: TypeId(formula_id),
            formula_name,
            activity,
            product_id: TypeId(product_id),
            product_name,
            quantity,
        });
    }
    Ok(results)
}

/// Number of rows in the main reference tables, for status output
pub fn count_rows(conn: &Connection, table: &str) -> Result<u64> {
    let count = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
    Ok(count)
}

impl StaticDataProvider for Connection {
    fn formula(&self, formula_id: TypeId) -> Result<Option<ProductionFormula>> {
        let activity: Option<i64> = self
            .query_row(
                &format!(
                    "SELECT activity FROM activity_products
                     WHERE formula_id = ?1 AND activity IN {PRODUCING_ACTIVITIES}
                     ORDER BY activity LIMIT 1"
                ),
                [formula_id.0],
                |row| row.get(0),
            )
            .optional()?;
        match activity {
            Some(activity) => load_formula(self, formula_id, activity)
                .with_context(|| format!("loading formula {formula_id}")),
            None => Ok(None),
        }
    }

    fn formula_for(&self, product: TypeId) -> Result<Option<ProductionFormula>> {
        let found: Option<(u32, i64)> = self
            .query_row(
                &format!(
                    "SELECT formula_id, activity FROM activity_products
                     WHERE type_id = ?1 AND activity IN {PRODUCING_ACTIVITIES}
                     ORDER BY activity, formula_id LIMIT 1"
                ),
                [product.0],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        match found {
            Some((formula_id, activity)) => load_formula(self, TypeId(formula_id), activity)
                .with_context(|| format!("loading producer of {product}")),
            None => Ok(None),
        }
    }

    fn invention_data(&self, t1_formula_id: TypeId) -> Result<Option<InventionData>> {
        let invention = ActivityKind::Invention.activity_id();
        let products = activity_products(self, t1_formula_id, invention)?;
        let Some((t2_blueprint, probability)) = products.into_iter().next() else {
            return Ok(None);
        };
        let Some(t2_formula) = self.formula(t2_blueprint.type_id)? else {
            return Ok(None);
        };
        let t2_product_group = match t2_formula.primary_output() {
            Some(product) => self.group_of(product.type_id)?,
            None => None,
        };

        let mut stmt = self.prepare(
            "SELECT skill_id FROM activity_skills
             WHERE formula_id = ?1 AND activity = ?2
             ORDER BY rowid",
        )?;
        let skills = stmt
            .query_map((t1_formula_id.0, invention), |row| Ok(TypeId(row.get(0)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Some(InventionData {
            t1_formula_id,
            t2_formula_id: t2_blueprint.type_id,
            base_probability: probability.unwrap_or(0.0),
            base_runs: u32::try_from(t2_blueprint.quantity).unwrap_or(u32::MAX),
            materials: activity_materials(self, t1_formula_id, invention)?,
            base_duration_s: activity_duration(self, t1_formula_id, invention)?.unwrap_or(0),
            skills,
            t2_formula,
            t2_product_group,
        }))
    }

    fn attribute_value(&self, type_id: TypeId, attribute_id: u32) -> Result<Option<f64>> {
        let value = self
            .query_row(
                "SELECT value FROM type_attributes WHERE type_id = ?1 AND attribute_id = ?2",
                (type_id.0, attribute_id),
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn group_of(&self, type_id: TypeId) -> Result<Option<GroupId>> {
        let group: Option<Option<u32>> = self
            .query_row(
                "SELECT group_id FROM types WHERE type_id = ?1",
                [type_id.0],
                |row| row.get(0),
            )
            .optional()?;
        Ok(group.flatten().map(GroupId))
    }

    fn rig_target_groups(&self, rig: TypeId) -> Result<Vec<GroupId>> {
        let mut stmt = self.prepare(
            "SELECT group_id FROM rig_targets WHERE rig_type_id = ?1 ORDER BY group_id",
        )?;
        let groups = stmt
            .query_map([rig.0], |row| Ok(GroupId(row.get(0)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(groups)
    }

    fn decryptors(&self) -> Result<Vec<Decryptor>> {
        let mut stmt = self.prepare(
            "SELECT t.type_id, t.name, a.value
             FROM types t
             JOIN type_attributes a ON a.type_id = t.type_id AND a.attribute_id = ?1
             ORDER BY t.type_id",
        )?;
        let rows = stmt
            .query_map([ATTR_DECRYPTOR_PROBABILITY], |row| {
                Ok((TypeId(row.get(0)?), row.get::<_, String>(1)?, row.get::<_, f64>(2)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut results = Vec::with_capacity(rows.len());
        for (type_id, name, probability_multiplier) in rows {
            let modifier = |attribute| -> Result<i32> {
                Ok(self.attribute_value(type_id, attribute)?.unwrap_or(0.0).round() as i32)
            };
            results.push(Decryptor {
                type_id,
                name,
                probability_multiplier,
                me_modifier: modifier(ATTR_DECRYPTOR_ME)?,
                te_modifier: modifier(ATTR_DECRYPTOR_TE)?,
                runs_modifier: modifier(ATTR_DECRYPTOR_RUNS)?,
            });
        }
        Ok(results)
    }

    fn type_name(&self, type_id: TypeId) -> Result<Option<String>> {
        let name = self
            .query_row("SELECT name FROM types WHERE type_id = ?1", [type_id.0], |row| row.get(0))
            .optional()?;
        Ok(name)
    }
}

impl PriceOracle for Connection {
    /// The local snapshot holds one price per side, so `quantity` does not move the price.
    /// Falls back to the feed's average price when no order price is stored.
    fn unit_price(&self, type_id: TypeId, _quantity: u64, side: PriceSide) -> Result<Option<f64>> {
        let sql = match side {
            PriceSide::Buy => "SELECT buy FROM market_prices WHERE type_id = ?1",
            PriceSide::Sell => "SELECT sell FROM market_prices WHERE type_id = ?1",
        };
        let market: Option<Option<f64>> =
            self.query_row(sql, [type_id.0], |row| row.get(0)).optional()?;
        if let Some(price) = market.flatten().filter(|p| *p > 0.0) {
            return Ok(Some(price));
        }

        let average: Option<Option<f64>> = self
            .query_row(
                "SELECT average_price FROM reference_prices WHERE type_id = ?1",
                [type_id.0],
                |row| row.get(0),
            )
            .optional()?;
        Ok(average.flatten().filter(|p| *p > 0.0))
    }

    fn adjusted_price(&self, type_id: TypeId) -> Result<Option<f64>> {
        let adjusted: Option<Option<f64>> = self
            .query_row(
                "SELECT adjusted_price FROM reference_prices WHERE type_id = ?1",
                [type_id.0],
                |row| row.get(0),
            )
            .optional()?;
        Ok(adjusted.flatten())
    }

    fn system_cost_index(
        &self,
        system_id: SystemId,
        activity: ActivityKind,
    ) -> Result<Option<f64>> {
        let index = self
            .query_row(
                "SELECT cost_index FROM cost_indices WHERE system_id = ?1 AND activity = ?2",
                (system_id.0, activity.as_str()),
                |row| row.get(0),
            )
            .optional()?;
        Ok(index)
    }
}

impl SkillSource for Connection {
    fn character_skills(&self, character: CharacterId) -> Result<Option<CharacterSkills>> {
        let mut stmt =
            self.prepare("SELECT skill_id, level FROM character_skills WHERE character_id = ?1")?;
        let rows = stmt.query_map([character.0], |row| {
            Ok((TypeId(row.get(0)?), row.get::<_, u8>(1)?))
        })?;

        let mut skills = CharacterSkills::default();
        for row in rows {
            let (skill, level) = row?;
            skills.levels.insert(skill, level.min(5));
        }
        if skills.levels.is_empty() {
            return Ok(None);
        }
        Ok(Some(skills))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample;

    fn sample_db() -> Connection {
        let conn = Connection::open_in_memory().expect("in-memory database");
        init_schema(&conn).expect("schema");
        sample::load_sample_data(&conn).expect("sample data");
        conn
    }

    #[test]
    fn formulas_keep_input_order() {
        let conn = sample_db();
        let formula = conn
            .formula(sample::HOBGOBLIN_II_BLUEPRINT)
            .expect("query")
            .expect("formula present");
        assert_eq!(formula.activity, ActivityKind::Manufacturing);
        let expected: Vec<TypeId> = sample::FORMULAS
            .iter()
            .find(|f| f.id == sample::HOBGOBLIN_II_BLUEPRINT.0)
            .map(|f| f.inputs.iter().map(|&(t, _)| TypeId(t)).collect())
            .unwrap_or_default();
        let actual: Vec<TypeId> = formula.inputs.iter().map(|m| m.type_id).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn producer_lookup_distinguishes_raw_materials() {
        let conn = sample_db();
        let carbide = conn.formula_for(sample::TITANIUM_CARBIDE).expect("query");
        assert_eq!(carbide.map(|f| f.activity), Some(ActivityKind::Reaction));
        assert!(conn.formula_for(sample::TRITANIUM).expect("query").is_none());
        assert!(conn.formula(TypeId(1)).expect("query").is_none());
    }

    #[test]
    fn per_formula_lookups() {
        let conn = sample_db();
        assert_eq!(
            conn.inputs_of(sample::FUSION_THRUSTER_BLUEPRINT).expect("query"),
            vec![MaterialQuantity::new(sample::TITANIUM_CARBIDE.0, 13)]
        );
        assert_eq!(
            conn.output_of(sample::HOBGOBLIN_II_BLUEPRINT).expect("query"),
            Some(MaterialQuantity::new(sample::HOBGOBLIN_II.0, 1))
        );
        let reaction_time = conn.base_duration(sample::TITANIUM_CARBIDE_REACTION).expect("query");
        assert_eq!(reaction_time, Some(10_800));
        assert!(conn.inputs_of(sample::TRITANIUM).expect("query").is_empty());
        assert_eq!(conn.output_of(sample::TRITANIUM).expect("query"), None);
    }

    #[test]
    fn invention_data_includes_t2_formula_and_skills() {
        let conn = sample_db();
        let data = conn
            .invention_data(sample::HOBGOBLIN_I_BLUEPRINT)
            .expect("query")
            .expect("invention present");
        assert_eq!(data.t2_formula_id, sample::HOBGOBLIN_II_BLUEPRINT);
        assert!((data.base_probability - 0.34).abs() < 1e-12);
        assert_eq!(data.base_runs, 10);
        assert_eq!(data.encryption_skill(), Some(sample::GALLENTE_ENCRYPTION));
        assert_eq!(data.datacore_skills().len(), 2);
        assert_eq!(data.t2_product_group, Some(GroupId(100)));
        assert!(conn.invention_data(sample::HOBGOBLIN_II_BLUEPRINT).expect("query").is_none());
    }

    #[test]
    fn decryptors_come_from_attributes() {
        let conn = sample_db();
        let decryptors = conn.decryptors().expect("query");
        assert_eq!(decryptors.len(), 8);
        let attainment = decryptors
            .iter()
            .find(|d| d.name == "Attainment Decryptor")
            .expect("attainment");
        assert_eq!(attainment.probability_multiplier, 1.8);
        assert_eq!(attainment.me_modifier, -1);
        assert_eq!(attainment.te_modifier, 4);
        assert_eq!(attainment.runs_modifier, 4);
    }

    #[test]
    fn prices_fall_back_to_average() {
        let conn = sample_db();
        upsert_reference_price(&conn, TypeId(777), Some(10.0), Some(12.0)).expect("insert");
        assert_eq!(conn.unit_price(TypeId(777), 1, PriceSide::Sell).expect("query"), Some(12.0));
        assert_eq!(conn.adjusted_price(TypeId(777)).expect("query"), Some(10.0));
        assert_eq!(conn.unit_price(TypeId(778), 1, PriceSide::Buy).expect("query"), None);

        let sell = conn.unit_price(sample::TRITANIUM, 1, PriceSide::Sell).expect("query");
        let buy = conn.unit_price(sample::TRITANIUM, 1, PriceSide::Buy).expect("query");
        assert!(sell > buy);
    }

    #[test]
    fn character_skills_and_cost_indices() {
        let conn = sample_db();
        let skills = conn
            .character_skills(sample::SAMPLE_CHARACTER)
            .expect("query")
            .expect("character present");
        assert_eq!(skills.level(crate::bonus::SKILL_INDUSTRY), 5);
        assert!(conn.character_skills(CharacterId(1)).expect("query").is_none());

        let index = conn
            .system_cost_index(sample::JITA, ActivityKind::Manufacturing)
            .expect("query");
        assert!(index.is_some());
    }

    #[test]
    fn listing_covers_manufacturing_and_reactions() {
        let conn = sample_db();
        let formulas = list_formulas(&conn).expect("list");
        assert!(formulas.iter().any(|f| f.activity == ActivityKind::Reaction));
        assert!(formulas.iter().any(|f| f.activity == ActivityKind::Manufacturing));
        assert!(formulas.iter().all(|f| f.activity != ActivityKind::Invention));
        assert_eq!(
            count_rows(&conn, "activities").expect("count") as usize,
            sample::FORMULAS.len() + sample::INVENTIONS.len()
        );
    }
}
