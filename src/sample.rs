//! Small built-in data set: a T1 → T2 drone chain with a component intermediate,
//! a two-step reaction chain, datacores, the decryptor catalog, structures and rigs.

use anyhow::Result;
use rusqlite::Connection;

use crate::bonus::{
    ATTR_RIG_MATERIAL_BONUS, ATTR_RIG_TIME_BONUS, SKILL_ADVANCED_INDUSTRY, SKILL_INDUSTRY,
    SKILL_REACTIONS,
};
use crate::db;
use crate::models::{
    ActivityKind, CharacterId, GroupId, GroupRecord, MaterialQuantity, ProductionFormula, SystemId,
    TypeId, TypeRecord,
};

pub const TRITANIUM: TypeId = TypeId(34);
pub const TITANIUM_CARBIDE: TypeId = TypeId(16672);
pub const HOBGOBLIN_I: TypeId = TypeId(2454);
pub const HOBGOBLIN_II: TypeId = TypeId(2456);
pub const HOBGOBLIN_I_BLUEPRINT: TypeId = TypeId(2455);
pub const HOBGOBLIN_II_BLUEPRINT: TypeId = TypeId(2457);
pub const FUSION_THRUSTER_BLUEPRINT: TypeId = TypeId(17330);
pub const TITANIUM_CARBIDE_REACTION: TypeId = TypeId(46204);
pub const GALLENTE_ENCRYPTION: TypeId = TypeId(23121);
pub const MECHANICAL_ENGINEERING: TypeId = TypeId(3409);
pub const ELECTRONIC_ENGINEERING: TypeId = TypeId(3411);

pub const SOTIYO: TypeId = TypeId(35827);
pub const TATARA: TypeId = TypeId(35836);
pub const DRONE_ME_RIG: TypeId = TypeId(37180);
pub const DRONE_TE_RIG: TypeId = TypeId(37181);
pub const COMPOSITE_ME_RIG: TypeId = TypeId(43704);

pub const JITA: SystemId = SystemId(30000142);
pub const ONE_DQ: SystemId = SystemId(30004759);
pub const SAMPLE_CHARACTER: CharacterId = CharacterId(90000001);

// (group id, category id, name)
pub(crate) const GROUPS: &[(u32, u32, &str)] = &[
    (18, 4, "Mineral"),
    (1136, 4, "Fuel Block"),
    (427, 4, "Moon Materials"),
    (428, 4, "Intermediate Materials"),
    (429, 4, "Composite"),
    (334, 17, "Construction Components"),
    (1041, 43, "Advanced Commodities"),
    (333, 17, "Datacores"),
    (100, 18, "Combat Drone"),
    (176, 9, "Drone Blueprint"),
    (447, 9, "Construction Component Blueprints"),
    (1888, 24, "Composite Reaction Formulas"),
    (1889, 24, "Intermediate Reaction Formulas"),
    (1304, 35, "Generic Decryptor"),
    (1404, 65, "Engineering Complex"),
    (1406, 65, "Refinery"),
    (1708, 66, "Structure Engineering Rig"),
    (268, 16, "Production"),
    (270, 16, "Science"),
];

// (type id, group id, name)
pub(crate) const TYPES: &[(u32, u32, &str)] = &[
    (34, 18, "Tritanium"),
    (35, 18, "Pyerite"),
    (36, 18, "Mexallon"),
    (11399, 18, "Morphite"),
    (4051, 1136, "Nitrogen Fuel Block"),
    (16638, 427, "Titanium"),
    (16641, 427, "Chromium"),
    (16635, 427, "Evaporite Deposits"),
    (16636, 427, "Silicates"),
    (16654, 428, "Titanium Chromide"),
    (16659, 428, "Silicon Diborite"),
    (16672, 429, "Titanium Carbide"),
    (11532, 334, "Fusion Thruster"),
    (9848, 1041, "Robotics"),
    (20424, 333, "Datacore - Mechanical Engineering"),
    (20418, 333, "Datacore - Electronic Engineering"),
    (2454, 100, "Hobgoblin I"),
    (2456, 100, "Hobgoblin II"),
    (2455, 176, "Hobgoblin I Blueprint"),
    (2457, 176, "Hobgoblin II Blueprint"),
    (17330, 447, "Fusion Thruster Blueprint"),
    (46204, 1888, "Titanium Carbide Reaction Formula"),
    (46172, 1889, "Titanium Chromide Reaction Formula"),
    (46173, 1889, "Silicon Diborite Reaction Formula"),
    (34201, 1304, "Accelerant Decryptor"),
    (34202, 1304, "Attainment Decryptor"),
    (34203, 1304, "Augmentation Decryptor"),
    (34204, 1304, "Parity Decryptor"),
    (34205, 1304, "Process Decryptor"),
    (34206, 1304, "Symmetry Decryptor"),
    (34207, 1304, "Optimized Attainment Decryptor"),
    (34208, 1304, "Optimized Augmentation Decryptor"),
    (35825, 1404, "Raitaru"),
    (35826, 1404, "Azbel"),
    (35827, 1404, "Sotiyo"),
    (35835, 1406, "Athanor"),
    (35836, 1406, "Tatara"),
    (37180, 1708, "Standup M-Set Drone and Fighter Manufacturing Material Efficiency I"),
    (37181, 1708, "Standup M-Set Drone and Fighter Manufacturing Time Efficiency I"),
    (43704, 1708, "Standup M-Set Composite Reactor Material Efficiency I"),
    (43920, 1708, "Standup M-Set Advanced Component Manufacturing Material Efficiency I"),
    (3380, 268, "Industry"),
    (3388, 268, "Advanced Industry"),
    (45746, 268, "Reactions"),
    (23121, 270, "Gallente Encryption Methods"),
    (3409, 270, "Mechanical Engineering"),
    (3411, 270, "Electronic Engineering"),
];

pub(crate) struct SampleFormula {
    pub id: u32,
    pub activity: ActivityKind,
    pub inputs: &'static [(u32, u64)],
    pub outputs: &'static [(u32, u64)],
    pub duration_s: u64,
}

impl SampleFormula {
    pub fn to_formula(&self) -> ProductionFormula {
        let list = |items: &[(u32, u64)]| {
            items
                .iter()
                .map(|&(t, q)| MaterialQuantity::new(t, q))
                .collect::<Vec<_>>()
        };
        ProductionFormula {
            formula_id: TypeId(self.id),
            activity: self.activity,
            inputs: list(self.inputs),
            outputs: list(self.outputs),
            base_duration_s: self.duration_s,
        }
    }
}

pub(crate) const FORMULAS: &[SampleFormula] = &[
    SampleFormula {
        id: 2455,
        activity: ActivityKind::Manufacturing,
        inputs: &[(34, 2222), (35, 555), (36, 111)],
        outputs: &[(2454, 1)],
        duration_s: 600,
    },
    SampleFormula {
        id: 2457,
        activity: ActivityKind::Manufacturing,
        inputs: &[(2454, 1), (11532, 3), (9848, 1), (11399, 2)],
        outputs: &[(2456, 1)],
        duration_s: 1800,
    },
    SampleFormula {
        id: 17330,
        activity: ActivityKind::Manufacturing,
        inputs: &[(16672, 13)],
        outputs: &[(11532, 1)],
        duration_s: 300,
    },
    SampleFormula {
        id: 46204,
        activity: ActivityKind::Reaction,
        inputs: &[(16654, 100), (16659, 100), (4051, 5)],
        outputs: &[(16672, 10000)],
        duration_s: 10800,
    },
    SampleFormula {
        id: 46172,
        activity: ActivityKind::Reaction,
        inputs: &[(16638, 100), (16641, 100), (4051, 5)],
        outputs: &[(16654, 200)],
        duration_s: 10800,
    },
    SampleFormula {
        id: 46173,
        activity: ActivityKind::Reaction,
        inputs: &[(16635, 100), (16636, 100), (4051, 5)],
        outputs: &[(16659, 200)],
        duration_s: 10800,
    },
];

pub(crate) struct SampleInvention {
    pub t1: u32,
    pub t2: u32,
    pub probability: f64,
    pub runs: u64,
    pub materials: &'static [(u32, u64)],
    pub skills: &'static [u32],
    pub duration_s: u64,
}

pub(crate) const INVENTIONS: &[SampleInvention] = &[SampleInvention {
    t1: 2455,
    t2: 2457,
    probability: 0.34,
    runs: 10,
    materials: &[(20424, 2), (20418, 2)],
    skills: &[23121, 3409, 3411],
    duration_s: 63900,
}];

// (type id, probability multiplier, ME, TE, runs)
pub(crate) const DECRYPTORS: &[(u32, f64, i32, i32, i32)] = &[
    (34201, 1.2, 2, 10, 1),
    (34202, 1.8, -1, 4, 4),
    (34203, 0.6, -2, 2, 9),
    (34204, 1.5, 1, -2, 3),
    (34205, 1.1, 3, 6, 0),
    (34206, 1.0, 1, 8, 2),
    (34207, 1.9, 1, -2, 2),
    (34208, 0.9, 2, 0, 7),
];

// (rig type id, attribute id, value, target groups)
pub(crate) const RIGS: &[(u32, u32, f64, &[u32])] = &[
    (37180, ATTR_RIG_MATERIAL_BONUS, -2.0, &[100]),
    (37181, ATTR_RIG_TIME_BONUS, -20.0, &[100]),
    (43704, ATTR_RIG_MATERIAL_BONUS, -2.0, &[429, 428]),
    (43920, ATTR_RIG_MATERIAL_BONUS, -2.0, &[334]),
];

// (type id, buy, sell, adjusted)
pub(crate) const PRICES: &[(u32, f64, f64, f64)] = &[
    (34, 4.5, 5.0, 4.2),
    (35, 9.0, 10.0, 8.5),
    (36, 60.0, 68.0, 55.0),
    (11399, 9_000.0, 10_500.0, 9_800.0),
    (4051, 14_000.0, 15_500.0, 14_500.0),
    (16638, 500.0, 560.0, 520.0),
    (16641, 1_200.0, 1_300.0, 1_100.0),
    (16635, 900.0, 1_000.0, 850.0),
    (16636, 300.0, 350.0, 320.0),
    (16654, 1_800.0, 2_000.0, 1_900.0),
    (16659, 1_200.0, 1_400.0, 1_300.0),
    (16672, 40.0, 45.0, 42.0),
    (11532, 600.0, 700.0, 650.0),
    (9848, 60_000.0, 70_000.0, 65_000.0),
    (20424, 90_000.0, 100_000.0, 95_000.0),
    (20418, 140_000.0, 150_000.0, 140_000.0),
    (2454, 3_800.0, 4_200.0, 4_000.0),
    (2456, 280_000.0, 320_000.0, 250_000.0),
    (34201, 540_000.0, 600_000.0, 580_000.0),
    (34202, 990_000.0, 1_100_000.0, 1_050_000.0),
    (34203, 225_000.0, 250_000.0, 240_000.0),
    (34204, 810_000.0, 900_000.0, 870_000.0),
    (34205, 450_000.0, 500_000.0, 480_000.0),
    (34206, 270_000.0, 300_000.0, 290_000.0),
    (34207, 2_250_000.0, 2_500_000.0, 2_400_000.0),
    (34208, 1_620_000.0, 1_800_000.0, 1_750_000.0),
];

// (system, manufacturing, reaction, invention)
pub(crate) const COST_INDICES: &[(u32, f64, f64, f64)] = &[
    (30000142, 0.025, 0.012, 0.031),
    (30004759, 0.0021, 0.0038, 0.0045),
];

pub(crate) const CHARACTER_SKILLS: &[(TypeId, u8)] = &[
    (SKILL_INDUSTRY, 5),
    (SKILL_ADVANCED_INDUSTRY, 4),
    (SKILL_REACTIONS, 4),
    (GALLENTE_ENCRYPTION, 4),
    (MECHANICAL_ENGINEERING, 4),
    (ELECTRONIC_ENGINEERING, 3),
];

/// Replace the database contents with the built-in data set
pub fn load_sample_data(conn: &Connection) -> Result<()> {
    db::clear_static_data(conn)?;
    db::clear_market_data(conn)?;

    for &(group_id, category_id, name) in GROUPS {
        db::upsert_group(
            conn,
            &GroupRecord {
                group_id: GroupId(group_id),
                category_id,
                name: name.to_string(),
            },
        )?;
    }
    for &(type_id, group_id, name) in TYPES {
        db::upsert_type(
            conn,
            &TypeRecord {
                type_id: TypeId(type_id),
                group_id: Some(GroupId(group_id)),
                name: name.to_string(),
            },
        )?;
    }

    for formula in FORMULAS {
        db::insert_formula(conn, &formula.to_formula())?;
    }

    for invention in INVENTIONS {
        let t1 = TypeId(invention.t1);
        db::upsert_activity(conn, t1, ActivityKind::Invention, invention.duration_s)?;
        for &(type_id, quantity) in invention.materials {
            let material = MaterialQuantity::new(type_id, quantity);
            db::insert_activity_material(conn, t1, ActivityKind::Invention, &material)?;
        }
        db::insert_activity_product(
            conn,
            t1,
            ActivityKind::Invention,
            &MaterialQuantity::new(invention.t2, invention.runs),
            Some(invention.probability),
        )?;
        for &skill in invention.skills {
            db::insert_activity_skill(conn, t1, ActivityKind::Invention, TypeId(skill), 1)?;
        }
    }

    for &(type_id, probability, me, te, runs) in DECRYPTORS {
        let type_id = TypeId(type_id);
        db::upsert_type_attribute(conn, type_id, db::ATTR_DECRYPTOR_PROBABILITY, probability)?;
        db::upsert_type_attribute(conn, type_id, db::ATTR_DECRYPTOR_ME, f64::from(me))?;
        db::upsert_type_attribute(conn, type_id, db::ATTR_DECRYPTOR_TE, f64::from(te))?;
        db::upsert_type_attribute(conn, type_id, db::ATTR_DECRYPTOR_RUNS, f64::from(runs))?;
    }

    for &(rig, attribute, value, targets) in RIGS {
        db::upsert_type_attribute(conn, TypeId(rig), attribute, value)?;
        for &group in targets {
            db::insert_rig_target(conn, TypeId(rig), GroupId(group))?;
        }
    }

    for &(type_id, buy, sell, adjusted) in PRICES {
        let type_id = TypeId(type_id);
        db::upsert_market_price(conn, type_id, Some(buy), Some(sell))?;
        db::upsert_reference_price(conn, type_id, Some(adjusted), Some((buy + sell) / 2.0))?;
    }

    for &(system, manufacturing, reaction, invention) in COST_INDICES {
        let system = SystemId(system);
        db::upsert_cost_index(conn, system, ActivityKind::Manufacturing, manufacturing)?;
        db::upsert_cost_index(conn, system, ActivityKind::Reaction, reaction)?;
        db::upsert_cost_index(conn, system, ActivityKind::Invention, invention)?;
    }

    for &(skill, level) in CHARACTER_SKILLS {
        db::upsert_character_skill(conn, SAMPLE_CHARACTER, skill, level)?;
    }

    Ok(())
}
