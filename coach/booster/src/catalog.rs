use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    calendar::PROGRAM_WEEKS,
    error::{BoosterError, BoosterResult},
    model::TemplateVariant,
};

const EMBEDDED_CATALOG: &str = include_str!("../catalog/booster_templates.toml");

/// Mission content for one program week.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MissionTemplate {
    /// Mission title.
    pub title: String,
    /// Mission body.
    pub mission_text: String,
    /// Practical tip.
    pub tip_text: String,
    /// Motivational text.
    pub booster_text: String,
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    version: String,
    #[serde(default)]
    female: Vec<TemplateEntry>,
    #[serde(default)]
    male: Vec<TemplateEntry>,
}

#[derive(Debug, Deserialize)]
struct TemplateEntry {
    week: u8,
    title: String,
    mission_text: String,
    tip_text: String,
    booster_text: String,
}

/// Immutable lookup of mission content keyed by `(variant, week)`.
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    version: String,
    entries: IndexMap<(TemplateVariant, u8), MissionTemplate>,
}

impl TemplateCatalog {
    /// Catalog compiled into the crate.
    pub fn embedded() -> Result<Self> {
        Self::from_toml_str(EMBEDDED_CATALOG).context("parsing embedded booster catalog")
    }

    /// Loads a catalog from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading booster catalog {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    /// Parses and validates catalog TOML.
    ///
    /// Each variant must define weeks 1..=12 exactly once.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let document: CatalogDocument = toml::from_str(raw)?;
        if document.version.trim().is_empty() {
            bail!("catalog version must not be empty");
        }
        let mut entries = IndexMap::new();
        for (variant, rows) in [
            (TemplateVariant::Female, document.female),
            (TemplateVariant::Male, document.male),
        ] {
            for row in rows {
                if !(1..=PROGRAM_WEEKS).contains(&row.week) {
                    bail!("{variant} week {} is outside 1..={PROGRAM_WEEKS}", row.week);
                }
                let template = MissionTemplate {
                    title: row.title,
                    mission_text: row.mission_text,
                    tip_text: row.tip_text,
                    booster_text: row.booster_text,
                };
                if entries.insert((variant, row.week), template).is_some() {
                    bail!("{variant} week {} is defined twice", row.week);
                }
            }
            for week in 1..=PROGRAM_WEEKS {
                if !entries.contains_key(&(variant, week)) {
                    bail!("{variant} week {week} is missing");
                }
            }
        }
        Ok(Self {
            version: document.version,
            entries,
        })
    }

    /// Content version string.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Content for `week` of `variant`.
    pub fn template(&self, variant: TemplateVariant, week: u8) -> BoosterResult<&MissionTemplate> {
        self.entries.get(&(variant, week)).ok_or_else(|| {
            BoosterError::validation(format!(
                "no {variant} template for week {week}; weeks run 1..={PROGRAM_WEEKS}"
            ))
        })
    }
}
