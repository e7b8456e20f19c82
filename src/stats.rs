use anyhow::Result;
use fnv::FnvHashMap;
use ordered_float::OrderedFloat;

use crate::geo::Coord;

/// ESA WorldCover class for built-up / impervious surface.
pub const BUILT_UP_CLASS: u8 = 50;
/// Dilation applied to the built-up mask to reach the metro extent.
pub const METRO_DILATION_M: f64 = 2_000.0;
/// WorldPop reference year; population is not tracked per analysis year.
pub const POPULATION_YEAR: i32 = 2020;

pub const LIGHT_SCALE_M: f64 = 500.0;
pub const POPULATION_SCALE_M: f64 = 100.0;
pub const AREA_SCALE_M: f64 = 100.0;

// Values substituted when a reduction comes back empty. Population floors at
// one so later divisions stay defined; it is not a head count.
pub const LIGHT_FLOOR: f64 = 0.0;
pub const POPULATION_FLOOR: f64 = 1.0;
pub const AREA_FLOOR: f64 = 0.0;

/// Circular search region around a point.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SearchRegion {
    pub center: Coord,
    pub radius_km: f64,
}

impl SearchRegion {
    pub fn radius_m(&self) -> f64 {
        self.radius_km * 1000.0
    }
}

/// Raster summed under a mask.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Layer {
    /// Mean nighttime radiance over a calendar year.
    NightLights { year: i32 },
    /// Population count for a reference year.
    Population { year: i32 },
    /// Per-pixel area in square meters.
    PixelArea,
}

impl Layer {
    pub fn scale_m(&self) -> f64 {
        match self {
            Layer::NightLights { .. } => LIGHT_SCALE_M,
            Layer::Population { .. } => POPULATION_SCALE_M,
            Layer::PixelArea => AREA_SCALE_M,
        }
    }
}

/// The image algebra the fetcher needs from a geospatial engine.
///
/// Masks are opaque to the fetcher: an implementation may hand back a lazy
/// expression (remote engines) or a concrete raster (tests).
pub trait RegionAggregator {
    type Mask;

    /// Pixels of land-cover `class` inside `region`.
    fn classify(&self, region: &SearchRegion, class: u8) -> Result<Self::Mask>;

    /// Morphological dilation of `mask` by a circular kernel of `radius_m`.
    fn dilate(&self, mask: &Self::Mask, radius_m: f64) -> Result<Self::Mask>;

    /// Sum of `layer` over the pixels of `region` selected by `mask`.
    /// `None` when the engine reports no value.
    fn masked_sum(
        &self,
        layer: Layer,
        mask: &Self::Mask,
        region: &SearchRegion,
    ) -> Result<Option<f64>>;
}

/// Aggregates for one location.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LocationStats {
    /// Summed nighttime radiance under the strict mask.
    pub light: f64,
    pub pop_strict: f64,
    pub pop_metro: f64,
    /// Built-up area in km².
    pub area_km2: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct StatsKey {
    lat: OrderedFloat<f64>,
    lon: OrderedFloat<f64>,
    radius_km: OrderedFloat<f64>,
    year: i32,
}

impl StatsKey {
    pub fn new(lat: f64, lon: f64, radius_km: f64, year: i32) -> Self {
        Self {
            lat: OrderedFloat(lat),
            lon: OrderedFloat(lon),
            radius_km: OrderedFloat(radius_km),
            year,
        }
    }
}

/// Process-lifetime memo of fetched statistics. Never evicts.
#[derive(Debug, Default)]
pub struct StatsCache {
    entries: FnvHashMap<StatsKey, LocationStats>,
}

impl StatsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &StatsKey) -> Option<LocationStats> {
        self.entries.get(key).copied()
    }

    pub fn insert(&mut self, key: StatsKey, stats: LocationStats) {
        self.entries.insert(key, stats);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

// An exact zero is treated like a missing value.
fn or_floor(value: Option<f64>, floor: f64) -> f64 {
    match value {
        Some(v) if v != 0.0 => v,
        _ => floor,
    }
}

pub struct StatsFetcher<A> {
    aggregator: A,
    cache: StatsCache,
}

impl<A: RegionAggregator> StatsFetcher<A> {
    #[cfg(test)]
    pub fn new(aggregator: A) -> Self {
        Self::with_cache(aggregator, StatsCache::new())
    }

    pub fn with_cache(aggregator: A, cache: StatsCache) -> Self {
        Self { aggregator, cache }
    }

    #[cfg(test)]
    pub fn aggregator(&self) -> &A {
        &self.aggregator
    }

    pub fn cache(&self) -> &StatsCache {
        &self.cache
    }

    /// Light, strict/metro population and built-up area around a point.
    /// Repeated calls with the same arguments are served from the cache.
    pub fn fetch(
        &mut self,
        lat: f64,
        lon: f64,
        radius_km: f64,
        year: i32,
    ) -> Result<LocationStats> {
        let key = StatsKey::new(lat, lon, radius_km, year);
        if let Some(stats) = self.cache.get(&key) {
            log::debug!("cache hit for ({}, {}) r={} km y={}", lat, lon, radius_km, year);
            return Ok(stats);
        }

        let region = SearchRegion {
            center: Coord::new(lat, lon),
            radius_km,
        };
        let strict = self.aggregator.classify(&region, BUILT_UP_CLASS)?;
        let metro = self.aggregator.dilate(&strict, METRO_DILATION_M)?;

        // Light is measured on built structures only, not the dilated halo.
        let light = self
            .aggregator
            .masked_sum(Layer::NightLights { year }, &strict, &region)?;
        let population = Layer::Population { year: POPULATION_YEAR };
        let pop_strict = self.aggregator.masked_sum(population, &strict, &region)?;
        let pop_metro = self.aggregator.masked_sum(population, &metro, &region)?;
        let area_m2 = self.aggregator.masked_sum(Layer::PixelArea, &strict, &region)?;

        let stats = LocationStats {
            light: or_floor(light, LIGHT_FLOOR),
            pop_strict: or_floor(pop_strict, POPULATION_FLOOR),
            pop_metro: or_floor(pop_metro, POPULATION_FLOOR),
            area_km2: or_floor(area_m2, AREA_FLOOR) / 1e6,
        };
        self.cache.insert(key, stats);
        Ok(stats)
    }
}

/// In-memory aggregator returning fixed sums and counting every call.
#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[derive(Copy, Clone, Debug, PartialEq)]
    pub enum FakeMask {
        Strict,
        Metro,
    }

    #[derive(Debug, Default)]
    pub struct FakeAggregator {
        pub light: Option<f64>,
        pub pop_strict: Option<f64>,
        pub pop_metro: Option<f64>,
        pub area_m2: Option<f64>,
        /// Light per region center, overriding `light`.
        pub light_at: Vec<(Coord, f64)>,
        pub calls: Cell<usize>,
        pub regions: RefCell<Vec<SearchRegion>>,
    }

    impl FakeAggregator {
        pub fn with_sums(light: f64, pop_strict: f64, pop_metro: f64, area_m2: f64) -> Self {
            Self {
                light: Some(light),
                pop_strict: Some(pop_strict),
                pop_metro: Some(pop_metro),
                area_m2: Some(area_m2),
                ..Default::default()
            }
        }

        pub fn empty() -> Self {
            Self::default()
        }

        fn tick(&self) {
            self.calls.set(self.calls.get() + 1);
        }
    }

    impl RegionAggregator for FakeAggregator {
        type Mask = FakeMask;

        fn classify(&self, region: &SearchRegion, class: u8) -> Result<FakeMask> {
            assert_eq!(class, BUILT_UP_CLASS);
            self.tick();
            self.regions.borrow_mut().push(*region);
            Ok(FakeMask::Strict)
        }

        fn dilate(&self, mask: &FakeMask, radius_m: f64) -> Result<FakeMask> {
            assert_eq!(*mask, FakeMask::Strict);
            assert_eq!(radius_m, METRO_DILATION_M);
            self.tick();
            Ok(FakeMask::Metro)
        }

        fn masked_sum(
            &self,
            layer: Layer,
            mask: &FakeMask,
            region: &SearchRegion,
        ) -> Result<Option<f64>> {
            self.tick();
            Ok(match (layer, mask) {
                (Layer::NightLights { .. }, FakeMask::Strict) => self
                    .light_at
                    .iter()
                    .find(|(c, _)| *c == region.center)
                    .map(|(_, v)| *v)
                    .or(self.light),
                (Layer::Population { .. }, FakeMask::Strict) => self.pop_strict,
                (Layer::Population { .. }, FakeMask::Metro) => self.pop_metro,
                (Layer::PixelArea, FakeMask::Strict) => self.area_m2,
                (layer, mask) => panic!("unexpected sum of {:?} under {:?}", layer, mask),
            })
        }
    }
}
