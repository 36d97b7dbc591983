//! Versioned factor → multiplier table and the context it is applied to.
//!
//! Everything here is data: adding or re-weighting a factor means editing the
//! table (or a TOML override file), never the scorer.

use crate::errors::{SafeTravelsError, SafeTravelsResult};
use chrono::{DateTime, Datelike, TimeZone, Timelike, Weekday};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

pub const TABLE_VERSION: &str = "2024.1";

/// Factor categories a context can carry, in the order they are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorCategory {
    TimeOfDay,
    DayOfWeek,
    Month,
    Season,
    Commodity,
    CargoValue,
    LocationType,
    State,
    Weather,
    Event,
    Traffic,
    IncidentDensity,
}

impl FactorCategory {
    pub const ALL: [FactorCategory; 12] = [
        FactorCategory::TimeOfDay,
        FactorCategory::DayOfWeek,
        FactorCategory::Month,
        FactorCategory::Season,
        FactorCategory::Commodity,
        FactorCategory::CargoValue,
        FactorCategory::LocationType,
        FactorCategory::State,
        FactorCategory::Weather,
        FactorCategory::Event,
        FactorCategory::Traffic,
        FactorCategory::IncidentDensity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FactorCategory::TimeOfDay => "time_of_day",
            FactorCategory::DayOfWeek => "day_of_week",
            FactorCategory::Month => "month",
            FactorCategory::Season => "season",
            FactorCategory::Commodity => "commodity",
            FactorCategory::CargoValue => "cargo_value",
            FactorCategory::LocationType => "location_type",
            FactorCategory::State => "state",
            FactorCategory::Weather => "weather",
            FactorCategory::Event => "event",
            FactorCategory::Traffic => "traffic",
            FactorCategory::IncidentDensity => "incident_density",
        }
    }

    /// Canonical form of a category value as stored in the table.
    pub fn normalize(&self, raw: &str) -> String {
        let cleaned: String = raw
            .trim()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();
        match self {
            FactorCategory::State => cleaned.to_uppercase(),
            _ => cleaned.to_lowercase(),
        }
    }
}

impl std::fmt::Display for FactorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cargo value band, matched when the value is at least `min_usd`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueBand {
    pub min_usd: f64,
    pub label: String,
    pub multiplier: f64,
}

/// Route length band, matched at or above `min_miles`, or strictly above it when `exclusive`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LengthBand {
    pub min_miles: f64,
    #[serde(default)]
    pub exclusive: bool,
    pub multiplier: f64,
}

impl LengthBand {
    pub fn matches(&self, miles: f64) -> bool {
        if self.exclusive {
            miles > self.min_miles
        } else {
            miles >= self.min_miles
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactorTable {
    pub version: String,
    /// category name → normalized value → multiplier
    pub factors: BTreeMap<String, BTreeMap<String, f64>>,
    /// Sorted by `min_usd` descending.
    pub cargo_value_bands: Vec<ValueBand>,
    /// Sorted by `min_miles` descending.
    pub route_length_bands: Vec<LengthBand>,
}

fn entries(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn builtin_table() -> RiskFactorTable {
    let mut factors = BTreeMap::new();

    factors.insert(
        FactorCategory::TimeOfDay.as_str().to_string(),
        entries(&[("night", 1.5), ("evening", 1.25), ("day", 1.0)]),
    );
    factors.insert(
        FactorCategory::DayOfWeek.as_str().to_string(),
        entries(&[
            ("monday", 1.0),
            ("tuesday", 1.0),
            ("wednesday", 1.0),
            ("thursday", 1.05),
            ("friday", 1.15),
            ("saturday", 1.2),
            ("sunday", 1.1),
        ]),
    );
    factors.insert(
        FactorCategory::Month.as_str().to_string(),
        entries(&[
            ("january", 1.1),
            ("february", 1.0),
            ("march", 1.0),
            ("april", 1.0),
            ("may", 1.0),
            ("june", 1.1),
            ("july", 1.1),
            ("august", 1.2),
            ("september", 1.15),
            ("october", 1.1),
            ("november", 1.3),
            ("december", 1.4),
        ]),
    );
    factors.insert(
        FactorCategory::Season.as_str().to_string(),
        entries(&[
            ("black_friday_week", 1.5),
            ("christmas_week", 1.45),
            ("holiday_peak", 1.4),
            ("new_years_week", 1.3),
            ("back_to_school", 1.2),
            ("summer", 1.1),
            ("normal", 1.0),
        ]),
    );
    factors.insert(
        FactorCategory::Commodity.as_str().to_string(),
        entries(&[
            ("electronics", 1.5),
            ("consumer_electronics", 1.5),
            ("pharmaceuticals", 1.45),
            ("computers", 1.45),
            ("phones", 1.4),
            ("alcohol", 1.3),
            ("tobacco", 1.3),
            ("automotive_parts", 1.25),
            ("appliances", 1.2),
            ("clothing", 1.2),
            ("footwear", 1.2),
            ("cosmetics", 1.15),
            ("household_goods", 1.1),
            ("tools", 1.1),
            ("food_beverage", 1.0),
            ("general", 1.0),
            ("produce", 0.95),
            ("raw_materials", 0.9),
            ("lumber", 0.85),
        ]),
    );
    factors.insert(
        FactorCategory::LocationType.as_str().to_string(),
        entries(&[
            ("abandoned_area", 1.7),
            ("random_roadside", 1.6),
            ("unsecured_lot", 1.5),
            ("rest_area", 1.3),
            ("industrial_area", 1.2),
            ("truck_stop_basic", 1.1),
            ("truck_stop_secured", 0.8),
            ("truck_stop_premium", 0.7),
            ("distribution_center", 0.6),
            ("shipper_facility", 0.5),
        ]),
    );
    factors.insert(
        FactorCategory::State.as_str().to_string(),
        entries(&[
            ("CA", 1.35),
            ("TX", 1.3),
            ("FL", 1.25),
            ("IL", 1.2),
            ("GA", 1.2),
            ("NJ", 1.15),
            ("PA", 1.1),
            ("TN", 1.1),
            ("AZ", 1.1),
            ("NM", 1.05),
        ]),
    );
    factors.insert(
        FactorCategory::Weather.as_str().to_string(),
        entries(&[
            ("severe_storm", 1.35),
            ("storm", 1.25),
            ("fog", 1.2),
            ("ice", 1.2),
            ("heavy_rain", 1.15),
            ("snow", 1.15),
            ("extreme_heat", 1.05),
            ("clear", 1.0),
            ("cloudy", 1.0),
            ("light_rain", 1.0),
        ]),
    );
    factors.insert(
        FactorCategory::Event.as_str().to_string(),
        entries(&[
            ("civil_unrest", 2.0),
            ("riot", 2.0),
            ("major_protest", 1.6),
            ("emergency_evacuation", 1.5),
            ("large_event", 1.3),
            ("festival", 1.25),
            ("convention", 1.2),
            ("holiday", 1.15),
            ("construction", 1.1),
            ("none", 1.0),
        ]),
    );
    factors.insert(
        FactorCategory::Traffic.as_str().to_string(),
        entries(&[
            ("standstill", 1.5),
            ("severe", 1.4),
            ("heavy", 1.25),
            ("moderate", 1.1),
            ("light", 1.0),
            ("free_flow", 0.95),
        ]),
    );
    factors.insert(
        FactorCategory::IncidentDensity.as_str().to_string(),
        entries(&[
            ("very_high", 1.4),
            ("high", 1.25),
            ("moderate", 1.1),
            ("low", 1.0),
            ("very_low", 0.95),
        ]),
    );

    RiskFactorTable {
        version: TABLE_VERSION.to_string(),
        factors,
        cargo_value_bands: vec![
            ValueBand { min_usd: 1_000_000.0, label: "over_1m".into(), multiplier: 1.6 },
            ValueBand { min_usd: 500_000.0, label: "500k_1m".into(), multiplier: 1.4 },
            ValueBand { min_usd: 250_000.0, label: "250k_500k".into(), multiplier: 1.25 },
            ValueBand { min_usd: 100_000.0, label: "100k_250k".into(), multiplier: 1.1 },
        ],
        route_length_bands: vec![
            LengthBand { min_miles: 1500.0, exclusive: true, multiplier: 1.4 },
            LengthBand { min_miles: 1000.0, exclusive: false, multiplier: 1.25 },
            LengthBand { min_miles: 500.0, exclusive: false, multiplier: 1.1 },
        ],
    }
}

lazy_static! {
    static ref DEFAULT_TABLE: Arc<RiskFactorTable> = Arc::new(builtin_table());
}

/// Shared handle to the built-in table.
pub fn default_table() -> Arc<RiskFactorTable> {
    Arc::clone(&DEFAULT_TABLE)
}

impl Default for RiskFactorTable {
    fn default() -> Self {
        builtin_table()
    }
}

impl RiskFactorTable {
    pub fn from_toml_str(raw: &str) -> SafeTravelsResult<Self> {
        let mut table: RiskFactorTable = toml::from_str(raw)?;
        table.sort_bands();
        table.validate()?;
        Ok(table)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> SafeTravelsResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SafeTravelsError::io(format!("reading factor table {}", path.display()), e)
        })?;
        Self::from_toml_str(&raw)
    }

    /// Returns a copy with one factor set, used for overrides and tests.
    pub fn with_factor(mut self, category: FactorCategory, value: &str, multiplier: f64) -> Self {
        self.factors
            .entry(category.as_str().to_string())
            .or_default()
            .insert(category.normalize(value), multiplier);
        self
    }

    fn sort_bands(&mut self) {
        self.cargo_value_bands
            .sort_by(|a, b| b.min_usd.total_cmp(&a.min_usd));
        self.route_length_bands
            .sort_by(|a, b| b.min_miles.total_cmp(&a.min_miles));
    }

    /// Every multiplier must be finite and strictly positive.
    pub fn validate(&self) -> SafeTravelsResult<()> {
        if self.version.trim().is_empty() {
            return Err(SafeTravelsError::validation("version", "must not be empty"));
        }
        for (category, values) in &self.factors {
            for (value, multiplier) in values {
                if !multiplier.is_finite() || *multiplier <= 0.0 {
                    return Err(SafeTravelsError::validation(
                        format!("{category}.{value}"),
                        format!("multiplier {multiplier} must be finite and positive"),
                    ));
                }
            }
        }
        let bands = self
            .cargo_value_bands
            .iter()
            .map(|b| b.multiplier)
            .chain(self.route_length_bands.iter().map(|b| b.multiplier));
        for multiplier in bands {
            if !multiplier.is_finite() || multiplier <= 0.0 {
                return Err(SafeTravelsError::validation(
                    "bands",
                    format!("multiplier {multiplier} must be finite and positive"),
                ));
            }
        }
        Ok(())
    }

    /// Multiplier for a categorical value, `None` when the value is unknown.
    pub fn lookup(&self, category: FactorCategory, value: &str) -> Option<f64> {
        self.factors
            .get(category.as_str())
            .and_then(|values| values.get(&category.normalize(value)))
            .copied()
    }

    pub fn multiplier(&self, category: FactorCategory, value: &str) -> f64 {
        self.lookup(category, value).unwrap_or(1.0)
    }

    /// Band label and multiplier for a cargo value; below every band is neutral.
    pub fn cargo_value_band(&self, value_usd: f64) -> (String, f64) {
        self.cargo_value_bands
            .iter()
            .find(|band| value_usd >= band.min_usd)
            .map(|band| (band.label.clone(), band.multiplier))
            .unwrap_or_else(|| ("under_100k".to_string(), 1.0))
    }

    pub fn route_length_multiplier(&self, total_miles: f64) -> f64 {
        self.route_length_bands
            .iter()
            .find(|band| band.matches(total_miles))
            .map(|band| band.multiplier)
            .unwrap_or(1.0)
    }

    /// Largest multiplier available in a category, used to build worst-case contexts.
    pub fn max_entry(&self, category: FactorCategory) -> Option<(String, f64)> {
        if category == FactorCategory::CargoValue {
            return self
                .cargo_value_bands
                .iter()
                .max_by(|a, b| a.multiplier.total_cmp(&b.multiplier))
                .map(|band| (band.label.clone(), band.multiplier));
        }
        self.factors.get(category.as_str()).and_then(|values| {
            values
                .iter()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(k, v)| (k.clone(), *v))
        })
    }
}

/// Time-of-day bucket for an hour (0-23).
pub fn time_category(hour: u32) -> &'static str {
    if hour >= 22 || hour < 5 {
        "night"
    } else if hour >= 17 {
        "evening"
    } else {
        "day"
    }
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

pub fn month_name(month: u32) -> Option<&'static str> {
    const NAMES: [&str; 12] = [
        "january", "february", "march", "april", "may", "june", "july", "august",
        "september", "october", "november", "december",
    ];
    NAMES.get(month.checked_sub(1)? as usize).copied()
}

/// Contextual attributes for a single scoring call. Absent fields are neutral.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskContext {
    pub time_of_day: Option<String>,
    pub day_of_week: Option<String>,
    pub month: Option<String>,
    pub season: Option<String>,
    pub commodity: Option<String>,
    pub cargo_value_usd: Option<f64>,
    pub location_type: Option<String>,
    /// Two-letter region code
    pub region: Option<String>,
    pub weather: Option<String>,
    pub event: Option<String>,
    pub traffic: Option<String>,
    /// Prior incident/accident density bucket
    pub incident_density: Option<String>,
}

impl RiskContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fills time-of-day, day and month from a local timestamp.
    pub fn at<Tz: TimeZone>(self, when: &DateTime<Tz>) -> Self {
        let mut ctx = self
            .with_time_of_day(time_category(when.hour()))
            .with_day_of_week(weekday_name(when.weekday()));
        ctx.month = month_name(when.month()).map(str::to_string);
        ctx
    }

    pub fn with_time_of_day(mut self, value: impl Into<String>) -> Self {
        self.time_of_day = Some(value.into());
        self
    }

    pub fn with_day_of_week(mut self, value: impl Into<String>) -> Self {
        self.day_of_week = Some(value.into());
        self
    }

    pub fn with_month(mut self, value: impl Into<String>) -> Self {
        self.month = Some(value.into());
        self
    }

    pub fn with_season(mut self, value: impl Into<String>) -> Self {
        self.season = Some(value.into());
        self
    }

    pub fn with_commodity(mut self, value: impl Into<String>) -> Self {
        self.commodity = Some(value.into());
        self
    }

    pub fn with_cargo_value(mut self, value_usd: f64) -> Self {
        self.cargo_value_usd = Some(value_usd);
        self
    }

    pub fn with_location_type(mut self, value: impl Into<String>) -> Self {
        self.location_type = Some(value.into());
        self
    }

    pub fn with_region(mut self, value: Option<String>) -> Self {
        self.region = value;
        self
    }

    pub fn with_weather(mut self, value: impl Into<String>) -> Self {
        self.weather = Some(value.into());
        self
    }

    pub fn with_event(mut self, value: impl Into<String>) -> Self {
        self.event = Some(value.into());
        self
    }

    pub fn with_traffic(mut self, value: impl Into<String>) -> Self {
        self.traffic = Some(value.into());
        self
    }

    pub fn with_incident_density(mut self, value: impl Into<String>) -> Self {
        self.incident_density = Some(value.into());
        self
    }

    /// Categorical (non-banded) values present, in application order.
    pub fn categorical(&self) -> Vec<(FactorCategory, &str)> {
        let fields = [
            (FactorCategory::TimeOfDay, &self.time_of_day),
            (FactorCategory::DayOfWeek, &self.day_of_week),
            (FactorCategory::Month, &self.month),
            (FactorCategory::Season, &self.season),
            (FactorCategory::Commodity, &self.commodity),
            (FactorCategory::LocationType, &self.location_type),
            (FactorCategory::State, &self.region),
            (FactorCategory::Weather, &self.weather),
            (FactorCategory::Event, &self.event),
            (FactorCategory::Traffic, &self.traffic),
            (FactorCategory::IncidentDensity, &self.incident_density),
        ];
        fields
            .into_iter()
            .filter_map(|(category, value)| value.as_deref().map(|v| (category, v)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    #[test]
    fn unknown_values_are_neutral() {
        let table = RiskFactorTable::default();
        assert_eq!(table.lookup(FactorCategory::Commodity, "moon_rocks"), None);
        assert_eq!(table.multiplier(FactorCategory::Commodity, "moon_rocks"), 1.0);
        assert_eq!(table.multiplier(FactorCategory::Weather, "clear"), 1.0);
    }

    #[test]
    fn lookups_normalize_case_and_separators() {
        let table = RiskFactorTable::default();
        assert_eq!(table.lookup(FactorCategory::State, "ca"), Some(1.35));
        assert_eq!(table.lookup(FactorCategory::LocationType, "Truck Stop-Secured"), Some(0.8));
        assert_eq!(table.lookup(FactorCategory::Event, "CIVIL_UNREST"), Some(2.0));
    }

    #[test]
    fn cargo_bands_use_inclusive_lower_bounds() {
        let table = RiskFactorTable::default();
        assert_eq!(table.cargo_value_band(1_000_000.0).1, 1.6);
        assert_eq!(table.cargo_value_band(999_999.0).1, 1.4);
        assert_eq!(table.cargo_value_band(250_000.0).1, 1.25);
        assert_eq!(table.cargo_value_band(100_000.0).1, 1.1);
        assert_eq!(table.cargo_value_band(99_999.0), ("under_100k".to_string(), 1.0));
    }

    #[test]
    fn route_length_bands_include_their_lower_edge() {
        let table = RiskFactorTable::default();
        assert_eq!(table.route_length_multiplier(1600.0), 1.4);
        assert_eq!(table.route_length_multiplier(1500.0), 1.25);
        assert_eq!(table.route_length_multiplier(1000.0), 1.25);
        assert_eq!(table.route_length_multiplier(999.9), 1.1);
        assert_eq!(table.route_length_multiplier(500.0), 1.1);
        assert_eq!(table.route_length_multiplier(499.9), 1.0);
        assert_eq!(table.route_length_multiplier(12.0), 1.0);
    }

    #[test]
    fn time_buckets_match_boundaries() {
        assert_eq!(time_category(4), "night");
        assert_eq!(time_category(5), "day");
        assert_eq!(time_category(16), "day");
        assert_eq!(time_category(17), "evening");
        assert_eq!(time_category(21), "evening");
        assert_eq!(time_category(22), "night");
    }

    #[test]
    fn context_from_timestamp() {
        let when = NaiveDate::from_ymd_opt(2024, 11, 29)
            .unwrap()
            .and_hms_opt(23, 15, 0)
            .unwrap()
            .and_utc();
        let ctx = RiskContext::new().at(&when.with_timezone(&Utc));
        assert_eq!(ctx.time_of_day.as_deref(), Some("night"));
        assert_eq!(ctx.day_of_week.as_deref(), Some("friday"));
        assert_eq!(ctx.month.as_deref(), Some("november"));
    }

    #[test]
    fn toml_override_round_trips_and_validates() {
        let raw = r#"
            version = "test.2"
            cargo_value_bands = [
                { min_usd = 100.0, label = "small", multiplier = 1.1 },
                { min_usd = 1000.0, label = "big", multiplier = 2.0 },
            ]
            route_length_bands = []

            [factors.commodity]
            gold = 3.0
        "#;
        let table = RiskFactorTable::from_toml_str(raw).expect("valid table");
        assert_eq!(table.version, "test.2");
        assert_eq!(table.lookup(FactorCategory::Commodity, "gold"), Some(3.0));
        // bands sorted descending after load
        assert_eq!(table.cargo_value_band(5000.0).0, "big");
        assert_eq!(table.route_length_multiplier(5000.0), 1.0);

        let bad = raw.replace("gold = 3.0", "gold = -1.0");
        assert!(RiskFactorTable::from_toml_str(&bad).is_err());
    }

    #[test]
    fn default_table_is_shared() {
        let a = default_table();
        let b = default_table();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.version, TABLE_VERSION);
        assert!(a.validate().is_ok());
    }
}
