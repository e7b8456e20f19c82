use anyhow::Result;

use crate::report::ResultRow;
use crate::stats::{RegionAggregator, StatsFetcher};
use crate::targets::Target;

pub const DEFAULT_YEAR: i32 = 2023;
pub const DEFAULT_RADIUS_KM: f64 = 100.0;

#[derive(Copy, Clone, Debug)]
pub struct AnalysisSettings {
    pub year: i32,
    /// Used when a target has no radius override.
    pub default_radius_km: f64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            year: DEFAULT_YEAR,
            default_radius_km: DEFAULT_RADIUS_KM,
        }
    }
}

/// City light as a percentage of capital light; 0 when the capital is dark.
pub fn economic_score(city_light: f64, capital_light: f64) -> f64 {
    if capital_light > 0.0 {
        city_light / capital_light * 100.0
    } else {
        0.0
    }
}

/// Light per strict-mask resident. Normal cities sit roughly between 0.05
/// and 0.5; industrial or oil sites tend to exceed 1.0.
pub fn light_per_capita(light: f64, pop_strict: f64) -> f64 {
    if pop_strict > 0.0 {
        light / pop_strict
    } else {
        0.0
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

pub fn analyze_target<A: RegionAggregator>(
    target: &Target,
    fetcher: &mut StatsFetcher<A>,
    settings: &AnalysisSettings,
) -> Result<ResultRow> {
    let city_radius = target.city_radius(settings.default_radius_km);
    let capital_radius = target.capital_radius(settings.default_radius_km);

    let capital = fetcher.fetch(
        target.capital.lat,
        target.capital.lon,
        capital_radius,
        settings.year,
    )?;
    let city = fetcher.fetch(target.city.lat, target.city.lon, city_radius, settings.year)?;

    let score = economic_score(city.light, capital.light);
    let distance_km = target.capital.distance_km(&target.city);
    let per_capita = light_per_capita(city.light, city.pop_strict);

    Ok(ResultRow {
        country: target.country.clone(),
        capital_light: capital.light,
        capital_pop_strict: capital.pop_strict,
        capital_pop_metro: capital.pop_metro,
        capital_area_km2: capital.area_km2,
        city_name: target.city_name.clone(),
        city_light: city.light,
        city_pop_strict: city.pop_strict,
        city_pop_metro: city.pop_metro,
        city_area_km2: city.area_km2,
        distance_km,
        score: round_to(score, 1),
        light_per_capita: round_to(per_capita, 3),
    })
}

/// Analyze every target in order. The first failure aborts the run.
pub fn analyze_all<A: RegionAggregator>(
    targets: &[Target],
    fetcher: &mut StatsFetcher<A>,
    settings: &AnalysisSettings,
) -> Result<Vec<ResultRow>> {
    let mut rows = Vec::with_capacity(targets.len());
    for target in targets {
        println!("Analyzing {}...", target.country);
        rows.push(analyze_target(target, fetcher, settings)?);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coord;
    use crate::report::{read_csv, write_csv};
    use crate::stats::fake::FakeAggregator;
    use crate::targets::parse_targets;
    use approx::assert_relative_eq;

    fn target(capital: Coord, city: Coord) -> Target {
        Target {
            country: "Testland".to_string(),
            capital,
            city,
            city_name: "Testville".to_string(),
            city_radius_km: None,
            capital_radius_km: None,
        }
    }

    #[test]
    fn dark_capital_scores_zero() {
        assert_eq!(economic_score(5_000.0, 0.0), 0.0);
        assert_eq!(economic_score(0.0, 0.0), 0.0);
    }

    #[test]
    fn equal_light_scores_hundred() {
        assert_eq!(economic_score(1234.5, 1234.5), 100.0);
        assert_eq!(economic_score(50.0, 200.0), 25.0);
    }

    #[test]
    fn zero_population_ratio_is_zero() {
        assert_eq!(light_per_capita(900.0, 0.0), 0.0);
        assert_eq!(light_per_capita(900.0, 300.0), 3.0);
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to(66.666_666, 1), 66.7);
        assert_eq!(round_to(0.123_456, 3), 0.123);
    }

    #[test]
    fn coinciding_capital_and_city() {
        let here = Coord::new(14.6928, -17.4467);
        let aggregator = FakeAggregator::with_sums(420.0, 3_000.0, 7_500.0, 2e7);
        let mut fetcher = StatsFetcher::new(aggregator);
        let settings = AnalysisSettings::default();
        let row = analyze_target(&target(here, here), &mut fetcher, &settings).unwrap();

        assert_eq!(row.distance_km, 0.0);
        assert_eq!(row.score, 100.0);
        assert_eq!(row.capital_light, row.city_light);
        assert_eq!(row.capital_pop_strict, row.city_pop_strict);
        assert_eq!(row.capital_pop_metro, row.city_pop_metro);
        assert_eq!(row.capital_area_km2, row.city_area_km2);
        assert_eq!(row.light_per_capita, 0.14);
        // The city lookup is a cache hit.
        assert_eq!(fetcher.cache().len(), 1);
    }

    #[test]
    fn radius_overrides_apply_per_location() {
        let mut t = target(Coord::new(1.0, 1.0), Coord::new(2.0, 2.0));
        t.city_radius_km = Some(30.0);
        let mut fetcher = StatsFetcher::new(FakeAggregator::with_sums(1.0, 1.0, 1.0, 1.0));
        let settings = AnalysisSettings { year: 2021, default_radius_km: 80.0 };
        analyze_target(&t, &mut fetcher, &settings).unwrap();

        let regions = fetcher.aggregator().regions.borrow();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].center, Coord::new(1.0, 1.0));
        assert_eq!(regions[0].radius_km, 80.0);
        assert_eq!(regions[1].center, Coord::new(2.0, 2.0));
        assert_eq!(regions[1].radius_km, 30.0);
    }

    #[test]
    fn per_location_light_drives_score() {
        let capital = Coord::new(9.0765, 7.3986);
        let city = Coord::new(6.5244, 3.3792);
        let mut agg = FakeAggregator::with_sums(0.0, 2_000.0, 5_000.0, 1e6);
        agg.light_at = vec![(capital, 300.0), (city, 200.0)];
        let mut fetcher = StatsFetcher::new(agg);
        let settings = AnalysisSettings::default();
        let row = analyze_target(&target(capital, city), &mut fetcher, &settings).unwrap();

        assert_eq!(row.score, 66.7);
        assert_eq!(row.light_per_capita, 0.1);
        assert_relative_eq!(row.distance_km, 524.0, epsilon = 10.0);
    }

    #[test]
    fn dark_capital_in_full_run() {
        let capital = Coord::new(0.0, 0.0);
        let city = Coord::new(0.0, 1.0);
        let mut agg = FakeAggregator::empty();
        agg.light_at = vec![(city, 50.0)];
        let mut fetcher = StatsFetcher::new(agg);
        let settings = AnalysisSettings::default();
        let row = analyze_target(&target(capital, city), &mut fetcher, &settings).unwrap();

        assert_eq!(row.capital_light, 0.0);
        assert_eq!(row.capital_pop_strict, 1.0);
        assert_eq!(row.score, 0.0);
        // Floored population of one.
        assert_eq!(row.light_per_capita, 50.0);
    }

    #[test]
    fn end_to_end_from_target_file_to_csv() {
        let targets = parse_targets(
            r#"{
                "Senegal": {
                    "Capital": [14.6928, -17.4467], "City": [14.6928, -17.4467],
                    "City_Name": "Dakar"
                },
                "Kenya": {
                    "Capital": [-1.2921, 36.8219], "City": [-4.0435, 39.6682],
                    "City_Name": "Mombasa", "Radius": 50
                }
            }"#,
        )
        .unwrap();
        let aggregator = FakeAggregator::with_sums(800.0, 4_000.0, 9_000.0, 5e6);
        let mut fetcher = StatsFetcher::new(aggregator);
        let rows = analyze_all(&targets, &mut fetcher, &AnalysisSettings::default()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].country, "Senegal");
        assert_eq!(rows[0].distance_km, 0.0);
        assert_eq!(rows[0].score, 100.0);
        assert_eq!(rows[1].city_name, "Mombasa");
        // Dakar once, Nairobi and Mombasa once each.
        assert_eq!(fetcher.cache().len(), 3);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        write_csv(&path, &rows).unwrap();
        let reloaded = read_csv(&path).unwrap();
        assert_eq!(reloaded.len(), rows.len());
        for (a, b) in reloaded.iter().zip(rows.iter()) {
            assert_eq!(a.country, b.country);
            assert_eq!(a.score, b.score);
            assert_eq!(a.light_per_capita, b.light_per_capita);
            assert_eq!(a.city_area_km2, b.city_area_km2);
        }
    }
}
