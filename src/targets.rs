use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use crate::geo::Coord;

/// One country's capital and the candidate city compared against it.
#[derive(Clone, Debug, PartialEq)]
pub struct Target {
    pub country: String,
    pub capital: Coord,
    pub city: Coord,
    pub city_name: String,
    /// Search radius override for the city (km).
    pub city_radius_km: Option<f64>,
    /// Search radius override for the capital (km).
    pub capital_radius_km: Option<f64>,
}

impl Target {
    pub fn city_radius(&self, default_km: f64) -> f64 {
        self.city_radius_km.unwrap_or(default_km)
    }

    pub fn capital_radius(&self, default_km: f64) -> f64 {
        self.capital_radius_km.unwrap_or(default_km)
    }
}

#[derive(Deserialize)]
struct TargetRecord {
    #[serde(rename = "Capital")]
    capital: [f64; 2],
    #[serde(rename = "City")]
    city: [f64; 2],
    #[serde(rename = "City_Name")]
    city_name: String,
    #[serde(rename = "Radius", default)]
    radius: Option<f64>,
    #[serde(rename = "Cap_Radius", default)]
    cap_radius: Option<f64>,
}

/// Parse a target document, keeping the order countries appear in.
pub fn parse_targets(json: &str) -> Result<Vec<Target>> {
    let doc: Map<String, Value> =
        serde_json::from_str(json).context("target file is not a JSON object")?;
    let mut targets = Vec::with_capacity(doc.len());
    for (country, value) in doc {
        let record: TargetRecord = serde_json::from_value(value)
            .with_context(|| format!("invalid target entry for {}", country))?;
        targets.push(Target {
            country,
            capital: Coord::new(record.capital[0], record.capital[1]),
            city: Coord::new(record.city[0], record.city[1]),
            city_name: record.city_name,
            city_radius_km: record.radius,
            capital_radius_km: record.cap_radius,
        });
    }
    Ok(targets)
}

pub const MISSING_FILE_EXIT_CODE: i32 = 1;

/// The message to print before exiting when the target file does not exist.
pub fn missing_file_message<P: AsRef<Path>>(path: P) -> Option<String> {
    let path = path.as_ref();
    if path.exists() {
        None
    } else {
        Some(format!("Error: {} not found.", path.display()))
    }
}

pub fn load_targets<P: AsRef<Path>>(path: P) -> Result<Vec<Target>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_targets(&text).with_context(|| format!("parsing {}", path.display()))
}
