use anyhow::{bail, Result};
use clap::Parser;
use std::env;

use crate::analysis::{AnalysisSettings, DEFAULT_RADIUS_KM, DEFAULT_YEAR};
use crate::engine::DEFAULT_API_URL;
use crate::report::DEFAULT_CSV;

pub const FALLBACK_PROJECT_ENV: &str = "GOOGLE_CLOUD_PROJECT";

#[derive(Parser, Debug)]
#[command(name = "nightlights")]
#[command(about = "Compare capitals and candidate cities by night light and population.")]
pub struct Cli {
    /// JSON file mapping country -> capital/city coordinates
    #[arg(short, long, default_value = "targets.json")]
    pub targets: String,

    /// Output CSV, overwritten on each run
    #[arg(short, long, default_value_t = String::from(DEFAULT_CSV))]
    pub out: String,

    /// Year of night-light data to average
    #[arg(short, long, default_value_t = DEFAULT_YEAR)]
    pub year: i32,

    /// Search radius in km when a target gives none
    #[arg(short, long, default_value_t = DEFAULT_RADIUS_KM)]
    pub radius: f64,

    /// Cloud project billed for Earth Engine requests
    #[arg(short, long, env = "PROJECT_ID")]
    pub project: Option<String>,

    #[arg(long, default_value_t = String::from(DEFAULT_API_URL))]
    pub api_url: String,
}

impl Cli {
    pub fn settings(&self) -> AnalysisSettings {
        AnalysisSettings {
            year: self.year,
            default_radius_km: self.radius,
        }
    }

    /// The explicit project, else `GOOGLE_CLOUD_PROJECT`.
    pub fn project_id(&self) -> Result<String> {
        resolve_project(self.project.clone(), env::var(FALLBACK_PROJECT_ENV).ok())
    }
}

fn resolve_project(explicit: Option<String>, fallback: Option<String>) -> Result<String> {
    match explicit.or(fallback).map(|p| p.trim().to_string()) {
        Some(p) if !p.is_empty() => Ok(p),
        _ => bail!(
            "PROJECT_ID not found in environment variables. Set it, {}, or --project.",
            FALLBACK_PROJECT_ENV
        ),
    }
}
