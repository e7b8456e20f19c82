use anyhow::{Context, Result};
use csv::{ReaderBuilder, Writer};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

pub const DEFAULT_CSV: &str = "light_analysis_results.csv";

const RULE_WIDTH: usize = 170;

/// One compared country. Field names follow the CSV header.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Capital_SOL")]
    pub capital_light: f64,
    #[serde(rename = "Capital_Pop_Strict")]
    pub capital_pop_strict: f64,
    #[serde(rename = "Capital_Pop_Metro")]
    pub capital_pop_metro: f64,
    /// Kept for callers; not part of the exported file.
    #[serde(skip)]
    pub capital_area_km2: f64,
    #[serde(rename = "City_City")]
    pub city_name: String,
    #[serde(rename = "City_SOL")]
    pub city_light: f64,
    #[serde(rename = "City_Pop_Strict")]
    pub city_pop_strict: f64,
    #[serde(rename = "City_Pop_Metro")]
    pub city_pop_metro: f64,
    #[serde(rename = "City_Area")]
    pub city_area_km2: f64,
    #[serde(rename = "Distance_km")]
    pub distance_km: f64,
    /// City light as a percentage of the capital's, rounded to 0.1.
    #[serde(rename = "Score (%)")]
    pub score: f64,
    /// City light per strict-mask resident, rounded to 0.001.
    #[serde(rename = "Light/Cap")]
    pub light_per_capita: f64,
}

pub const CSV_COLUMNS: [&str; 12] = [
    "Country",
    "Capital_SOL",
    "Capital_Pop_Strict",
    "Capital_Pop_Metro",
    "City_City",
    "City_SOL",
    "City_Pop_Strict",
    "City_Pop_Metro",
    "City_Area",
    "Distance_km",
    "Score (%)",
    "Light/Cap",
];

pub fn render_table(rows: &[ResultRow]) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = String::new();
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(
        out,
        "{:<15} {:<20} {:<12} {:<12} {:<12} {:<10} {:<12} {:<12} {:<12} {:<10} {:<10} {}",
        "COUNTRY",
        "CITY",
        "POP(Strict)",
        "POP(Metro)",
        "CITY SOL",
        "AREA km2",
        "CAP SOL",
        "CAP POP(S)",
        "CAP POP(M)",
        "DIST km",
        "% of CAP",
        "LIGHT/CAP"
    );
    let _ = writeln!(out, "{}", rule);
    for row in rows {
        let _ = writeln!(
            out,
            "{:<15} {:<20} {:<12.0} {:<12.0} {:<12.0} {:<10.1} {:<12.0} {:<12.0} {:<12.0} {:<10.0} {:<10.1} {:.3}",
            row.country,
            row.city_name,
            row.city_pop_strict,
            row.city_pop_metro,
            row.city_light,
            row.city_area_km2,
            row.capital_light,
            row.capital_pop_strict,
            row.capital_pop_metro,
            row.distance_km,
            row.score,
            row.light_per_capita
        );
    }
    let _ = writeln!(out, "{}", rule);
    out
}

pub fn print_table(rows: &[ResultRow]) {
    println!();
    print!("{}", render_table(rows));
}

/// Write all rows, replacing any existing file at `path`.
pub fn write_csv<P: AsRef<Path>>(path: P, rows: &[ResultRow]) -> Result<()> {
    let path = path.as_ref();
    let mut wtr =
        Writer::from_path(path).with_context(|| format!("creating CSV {}", path.display()))?;
    if rows.is_empty() {
        wtr.write_record(CSV_COLUMNS)?;
    }
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

// Only the table viewer reads results back.
#[cfg_attr(not(test), allow(dead_code))]
pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Vec<ResultRow>> {
    let path = path.as_ref();
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening CSV {}", path.display()))?;
    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let row: ResultRow = result.with_context(|| format!("reading {}", path.display()))?;
        rows.push(row);
    }
    Ok(rows)
}
