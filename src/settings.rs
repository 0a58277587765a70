//! Optional TOML settings: price sides, assumed skills and named facilities

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::models::{Facility, SystemId, TypeId};
use crate::provider::PriceSide;

pub const DEFAULT_CONFIG_FILE: &str = "industry.toml";

/// Rig reference as written by hand: `37180`, `"37180"` or `{ type_id = 37180 }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RigRef {
    Id(u32),
    Text(String),
    Record { type_id: u32 },
}

impl RigRef {
    pub fn normalize(&self) -> Result<TypeId> {
        match self {
            RigRef::Id(id) | RigRef::Record { type_id: id } => Ok(TypeId(*id)),
            RigRef::Text(text) => text
                .trim()
                .parse()
                .map(TypeId)
                .map_err(|_| anyhow!("rig reference '{text}' is not a type id")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FacilityEntry {
    pub id: String,
    #[serde(default)]
    pub structure_type_id: Option<u32>,
    #[serde(default)]
    pub rigs: Vec<RigRef>,
    pub security_status: f64,
    #[serde(default)]
    pub system_id: Option<u32>,
    #[serde(default)]
    pub facility_tax_rate: Option<f64>,
}

impl FacilityEntry {
    pub fn to_facility(&self) -> Result<Facility> {
        let rigs = self
            .rigs
            .iter()
            .map(RigRef::normalize)
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("facility '{}'", self.id))?;
        let facility = Facility {
            id: self.id.clone(),
            structure_type_id: self.structure_type_id.map(TypeId),
            rigs,
            security_status: self.security_status,
            system_id: self.system_id.map(SystemId),
            facility_tax_rate: self.facility_tax_rate,
        };
        facility
            .validate()
            .with_context(|| format!("facility '{}'", self.id))?;
        Ok(facility)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct SettingsFile {
    material_price_side: PriceSide,
    product_price_side: PriceSide,
    assumed_skill_level: u8,
    #[serde(rename = "facility")]
    facilities: Vec<FacilityEntry>,
}

impl Default for SettingsFile {
    fn default() -> Self {
        Self {
            material_price_side: PriceSide::Sell,
            product_price_side: PriceSide::Sell,
            assumed_skill_level: 5,
            facilities: Vec::new(),
        }
    }
}

/// Settings with rig references already normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub material_price_side: PriceSide,
    pub product_price_side: PriceSide,
    /// Level assumed for every skill when no character is given.
    pub assumed_skill_level: u8,
    pub facilities: Vec<Facility>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            material_price_side: PriceSide::Sell,
            product_price_side: PriceSide::Sell,
            assumed_skill_level: 5,
            facilities: default_facilities(),
        }
    }
}

/// Facilities usable against the sample data without a settings file
fn default_facilities() -> Vec<Facility> {
    vec![
        Facility {
            id: "jita-4-4".to_string(),
            structure_type_id: None,
            rigs: vec![],
            security_status: 0.9,
            system_id: Some(SystemId(30000142)),
            facility_tax_rate: None,
        },
        Facility {
            id: "1dq-sotiyo".to_string(),
            structure_type_id: Some(TypeId(35827)),
            rigs: vec![TypeId(37180), TypeId(37181)],
            security_status: -0.4,
            system_id: Some(SystemId(30004759)),
            facility_tax_rate: Some(1.0),
        },
        Facility {
            id: "1dq-tatara".to_string(),
            structure_type_id: Some(TypeId(35836)),
            rigs: vec![TypeId(43704)],
            security_status: -0.4,
            system_id: Some(SystemId(30004759)),
            facility_tax_rate: Some(1.0),
        },
    ]
}

impl Settings {
    pub fn parse(text: &str) -> Result<Self> {
        let file: SettingsFile = toml::from_str(text).context("parsing settings")?;
        if file.assumed_skill_level > 5 {
            return Err(anyhow!(
                "assumed_skill_level must be between 0 and 5, got {}",
                file.assumed_skill_level
            ));
        }
        let facilities = if file.facilities.is_empty() {
            default_facilities()
        } else {
            file.facilities
                .iter()
                .map(FacilityEntry::to_facility)
                .collect::<Result<Vec<_>>>()?
        };
        Ok(Settings {
            material_price_side: file.material_price_side,
            product_price_side: file.product_price_side,
            assumed_skill_level: file.assumed_skill_level,
            facilities,
        })
    }

    /// Load `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Settings::default());
        }
        let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("in {}", path.display()))
    }

    pub fn facility(&self, id: &str) -> Option<&Facility> {
        self.facilities.iter().find(|f| f.id == id)
    }
}
