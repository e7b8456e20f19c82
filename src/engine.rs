use anyhow::Result;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};

use crate::auth::AccessToken;
use crate::expr::{self, Expression, ValueNode};
use crate::stats::{Layer, RegionAggregator, SearchRegion};

pub const DEFAULT_API_URL: &str = "https://earthengine.googleapis.com";

pub const LANDCOVER_COLLECTION: &str = "ESA/WorldCover/v200";
pub const LIGHTS_COLLECTION: &str = "NOAA/VIIRS/DNB/MONTHLY_V1/VCMCFG";
pub const LIGHTS_BAND: &str = "avg_rad";
pub const POPULATION_COLLECTION: &str = "WorldPop/GP/100m/pop";
pub const POPULATION_BAND: &str = "population";
pub const AREA_BAND: &str = "area";
pub const MAX_PIXELS: f64 = 1e10;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Earth Engine returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Response(String),

    #[error("credentials unavailable: {0}")]
    Credentials(String),
}

#[derive(Serialize)]
struct ComputeRequest<'a> {
    expression: &'a Expression,
}

#[derive(Deserialize)]
struct ComputeResponse {
    #[serde(default)]
    result: Value,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Blocking client for the Earth Engine `value:compute` endpoint.
pub struct EarthEngine {
    client: Client,
    api_url: String,
    project: String,
    token: AccessToken,
}

impl EarthEngine {
    pub fn new(api_url: &str, project: &str, token: AccessToken) -> Result<Self, EngineError> {
        // No client-side timeout: a stalled call stalls the run.
        let client = Client::builder()
            .timeout(None::<Duration>)
            .user_agent(concat!("nightlights/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            project: project.to_string(),
            token,
        })
    }

    fn compute_url(&self) -> String {
        format!("{}/v1/projects/{}/value:compute", self.api_url, self.project)
    }

    /// Evaluate `node` remotely and return its JSON value.
    pub fn compute(&self, node: ValueNode) -> Result<Value, EngineError> {
        let name = node.function_name().unwrap_or("constant").to_string();
        let expression = Expression::new(node);
        let started = Instant::now();

        let response = self
            .client
            .post(self.compute_url())
            .bearer_auth(&self.token.token)
            .header("x-goog-user-project", &self.project)
            .json(&ComputeRequest {
                expression: &expression,
            })
            .send()?;

        let status = response.status();
        let body = response.text()?;
        log::debug!(
            "{} -> HTTP {} in {:.2}s",
            name,
            status.as_u16(),
            started.elapsed().as_secs_f64()
        );
        if !status.is_success() {
            return Err(EngineError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }
        let parsed: ComputeResponse = serde_json::from_str(&body)
            .map_err(|e| EngineError::Response(format!("{}: {}", e, body)))?;
        Ok(parsed.result)
    }

    fn region_geometry(region: &SearchRegion) -> ValueNode {
        expr::buffer(expr::point(region.center.lat, region.center.lon), region.radius_m())
    }

    fn layer_image(layer: Layer, region: &ValueNode) -> (ValueNode, &'static str) {
        match layer {
            Layer::NightLights { year } => {
                let monthly = expr::filter_date(
                    expr::load_collection(LIGHTS_COLLECTION),
                    &format!("{}-01-01", year),
                    &format!("{}-12-31", year),
                );
                let annual = expr::select(expr::mean(monthly), LIGHTS_BAND);
                (expr::clip(annual, region.clone()), LIGHTS_BAND)
            }
            Layer::Population { year } => {
                let collection = expr::load_collection(POPULATION_COLLECTION);
                let tiles = expr::filter_equals(collection, "year", year);
                let pop = expr::select(expr::mosaic(tiles), POPULATION_BAND);
                (expr::clip(pop, region.clone()), POPULATION_BAND)
            }
            Layer::PixelArea => (expr::pixel_area(), AREA_BAND),
        }
    }
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

/// Read `band` from a reduceRegion dictionary. Null or missing is `None`.
pub fn band_value(result: &Value, band: &str) -> Result<Option<f64>, EngineError> {
    match result {
        Value::Object(dict) => match dict.get(band) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(other) => Err(EngineError::Response(format!(
                "band {} is not numeric: {}",
                band, other
            ))),
        },
        Value::Null => Ok(None),
        other => Err(EngineError::Response(format!("expected a dictionary, got {}", other))),
    }
}

impl RegionAggregator for EarthEngine {
    type Mask = ValueNode;

    fn classify(&self, region: &SearchRegion, class: u8) -> Result<ValueNode> {
        let landcover = expr::first(expr::load_collection(LANDCOVER_COLLECTION));
        let mask = expr::eq_constant(landcover, f64::from(class));
        Ok(expr::clip(mask, Self::region_geometry(region)))
    }

    fn dilate(&self, mask: &ValueNode, radius_m: f64) -> Result<ValueNode> {
        Ok(expr::focal_max(mask.clone(), radius_m))
    }

    fn masked_sum(
        &self,
        layer: Layer,
        mask: &ValueNode,
        region: &SearchRegion,
    ) -> Result<Option<f64>> {
        let geometry = Self::region_geometry(region);
        let (image, band) = Self::layer_image(layer, &geometry);
        let masked = expr::update_mask(image, mask.clone());
        let reduction = expr::reduce_region_sum(masked, geometry, layer.scale_m(), MAX_PIXELS);
        let result = self.compute(reduction)?;
        Ok(band_value(&result, band)?)
    }
}
