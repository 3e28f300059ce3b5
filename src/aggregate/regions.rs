//! Regions file: which units exist and how they are known upstream

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionsFile {
    pub divisions: Vec<Division>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Division {
    #[serde(default, deserialize_with = "optional_id")]
    pub trendyol_supplier_id: Option<String>,
    pub region_name: String,
    pub franchise: String,
    #[serde(default)]
    pub units: Vec<Unit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    #[serde(deserialize_with = "required_id")]
    pub dodois_unit_id: String,
    pub dodois_name: String,
    #[serde(default, deserialize_with = "optional_id")]
    pub trendyol_id: Option<String>,
    #[serde(default, deserialize_with = "optional_id")]
    pub yemeksepeti_pos_id: Option<String>,
}

impl RegionsFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read regions file: {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Failed to parse regions file: {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Every unit together with the division it belongs to
    pub fn units(&self) -> impl Iterator<Item = (&Division, &Unit)> {
        self.divisions
            .iter()
            .flat_map(|division| division.units.iter().map(move |unit| (division, unit)))
    }
}

/// Ids appear both as strings and as numbers; empty strings and null mean "none".
fn id_from_value(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn optional_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(id_from_value(Value::deserialize(deserializer)?))
}

fn required_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    id_from_value(Value::deserialize(deserializer)?)
        .ok_or_else(|| serde::de::Error::custom("expected a non-empty id"))
}
