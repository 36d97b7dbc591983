//! Offline collaborators: a city gazetteer for routing, keyword retrieval
//! over a small built-in corpus, template synthesis and in-memory stores.
//! Used by the CLI when no external services are configured, and by tests.

use crate::collaborators::{
    CandidatePath, DriverPreferences, IncidentProvider, IncidentSummary, PreferenceStore, RetrievalProvider,
    RetrievedDocument, RoutingProvider, SynthesisProvider, TripOutcome,
};
use crate::errors::{SafeLock, SafeTravelsError, SafeTravelsResult};
use crate::geo::Coordinate;
use crate::route_scanner::AVERAGE_SPEED_MPH;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use tracing::debug;

lazy_static! {
    static ref GAZETTEER: HashMap<&'static str, Coordinate> = {
        let mut m = HashMap::new();
        m.insert("los angeles", Coordinate::new(34.0522, -118.2437));
        m.insert("phoenix", Coordinate::new(33.4484, -112.0740));
        m.insert("dallas", Coordinate::new(32.7767, -96.7970));
        m.insert("houston", Coordinate::new(29.7604, -95.3698));
        m.insert("atlanta", Coordinate::new(33.7490, -84.3880));
        m.insert("memphis", Coordinate::new(35.1495, -90.0490));
        m.insert("miami", Coordinate::new(25.7617, -80.1918));
        m.insert("chicago", Coordinate::new(41.8781, -87.6298));
        m.insert("new york", Coordinate::new(40.7128, -74.0060));
        m.insert("denver", Coordinate::new(39.7392, -104.9903));
        m.insert("oklahoma city", Coordinate::new(35.4676, -97.5164));
        m.insert("albuquerque", Coordinate::new(35.0844, -106.6504));
        m.insert("el paso", Coordinate::new(31.7619, -106.4850));
        m.insert("laredo", Coordinate::new(27.5306, -99.4803));
        m.insert("jacksonville", Coordinate::new(30.3322, -81.6557));
        m.insert("seattle", Coordinate::new(47.6062, -122.3321));
        m
    };
}

/// Resolves `"City, ST"`, `"city"` or `"lat,lon"`.
pub fn resolve_location(name: &str) -> Option<Coordinate> {
    if let Ok(coord) = name.parse::<Coordinate>() {
        return Some(coord);
    }
    let key = name.split(',').next().unwrap_or(name).trim().to_lowercase();
    GAZETTEER.get(key.as_str()).copied()
}

fn polyline_miles(points: &[Coordinate]) -> f64 {
    points.windows(2).map(|w| w[0].distance_to(&w[1])).sum()
}

/// Direct route plus northern and southern detours through an offset midpoint.
#[derive(Debug, Clone, Default)]
pub struct GazetteerRouting;

impl GazetteerRouting {
    pub fn new() -> Self {
        Self
    }

    fn path(name: &str, points: Vec<Coordinate>) -> CandidatePath {
        let miles = polyline_miles(&points);
        CandidatePath {
            name: Some(name.to_string()),
            total_distance_miles: miles,
            estimated_duration_minutes: miles / AVERAGE_SPEED_MPH * 60.0,
            coordinates: points,
        }
    }
}

#[async_trait]
impl RoutingProvider for GazetteerRouting {
    fn name(&self) -> &'static str {
        "gazetteer"
    }

    async fn get_routes(&self, origin: &str, destination: &str) -> SafeTravelsResult<Vec<CandidatePath>> {
        let from = resolve_location(origin)
            .ok_or_else(|| SafeTravelsError::routing_unavailable(format!("unknown location '{origin}'")))?;
        let to = resolve_location(destination)
            .ok_or_else(|| SafeTravelsError::routing_unavailable(format!("unknown location '{destination}'")))?;

        let mid = from.lerp(&to, 0.5);
        let north = Coordinate::new((mid.lat + 1.0).min(90.0), (mid.lon - 0.5).max(-180.0));
        let south = Coordinate::new((mid.lat - 1.0).max(-90.0), (mid.lon + 0.5).min(180.0));

        debug!("gazetteer routes {origin} -> {destination}");
        Ok(vec![
            Self::path("Direct", vec![from, to]),
            Self::path("Northern detour", vec![from, north, to]),
            Self::path("Southern detour", vec![from, south, to]),
        ])
    }
}

struct CorpusEntry {
    source: &'static str,
    text: &'static str,
}

const CORPUS: &[CorpusEntry] = &[
    CorpusEntry {
        source: "CargoNet Theft Statistics",
        text: "California, Texas and Florida consistently report the most cargo theft events. \
               Electronics, food and beverage, and household goods are the most stolen commodities.",
    },
    CorpusEntry {
        source: "CargoNet Theft Statistics",
        text: "Theft risk peaks over holiday weekends and from Friday evening through Sunday, \
               when loaded trailers sit unattended at truck stops and drop lots.",
    },
    CorpusEntry {
        source: "FBI Uniform Crime Reporting: Cargo Theft",
        text: "Most cargo theft occurs at unsecured parking such as truck stops, rest areas and \
               vacant lots, typically within a few hundred miles of the load origin.",
    },
    CorpusEntry {
        source: "TAPA Facility Security Requirements",
        text: "Secure parking should provide perimeter fencing, lighting, CCTV coverage and \
               guarded access. Parking with a single exit or adjacent to highway ramps is higher risk.",
    },
    CorpusEntry {
        source: "NICB Cargo Theft Advisory",
        text: "Pharmaceutical and electronics loads should not stop within 200 miles of origin. \
               Drivers should avoid discussing cargo or routes at truck stops.",
    },
    CorpusEntry {
        source: "Southern California Cargo Theft Task Force",
        text: "The Los Angeles port region and the I-10 corridor toward Phoenix are recurring \
               hotspots for full trailer theft and fictitious pickups.",
    },
    CorpusEntry {
        source: "Texas DPS Cargo Theft Unit",
        text: "Dallas, Houston and Laredo see organized theft targeting loads on I-35 and I-10, \
               often at night and near distribution centers.",
    },
    CorpusEntry {
        source: "Florida Highway Patrol Commercial Vehicle Report",
        text: "Miami-Dade and the I-95 corridor record frequent trailer burglary; use staffed, \
               fenced lots for overnight parking in South Florida.",
    },
];

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 3)
        .map(str::to_lowercase)
        .collect()
}

/// Ranks built-in corpus entries by the share of query terms they contain.
#[derive(Debug, Clone, Default)]
pub struct KeywordRetrieval;

impl KeywordRetrieval {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RetrievalProvider for KeywordRetrieval {
    async fn retrieve(&self, query: &str, k: usize) -> SafeTravelsResult<Vec<RetrievedDocument>> {
        let mut terms = tokens(query);
        terms.sort();
        terms.dedup();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<RetrievedDocument> = CORPUS
            .iter()
            .filter_map(|entry| {
                let doc_terms = tokens(entry.text);
                let matched = terms.iter().filter(|t| doc_terms.contains(t)).count();
                (matched > 0).then(|| RetrievedDocument {
                    text: entry.text.to_string(),
                    source_label: entry.source.to_string(),
                    relevance: matched as f64 / terms.len() as f64,
                })
            })
            .collect();
        hits.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
        hits.truncate(k);
        Ok(hits)
    }
}

/// Deterministic synthesis: echoes the findings and lists the sources.
#[derive(Debug, Clone, Default)]
pub struct TemplateSynthesizer;

#[async_trait]
impl SynthesisProvider for TemplateSynthesizer {
    async fn synthesize(&self, prompt: &str, documents: &[RetrievedDocument]) -> SafeTravelsResult<String> {
        let findings = prompt.split_once("\n\n").map(|(_, rest)| rest).unwrap_or(prompt);
        let mut out = findings.trim().to_string();
        if !documents.is_empty() {
            let mut sources: Vec<&str> = documents.iter().map(|d| d.source_label.as_str()).collect();
            sources.dedup();
            out.push_str("\nSources consulted: ");
            out.push_str(&sources.join("; "));
        }
        Ok(out)
    }
}

#[derive(Default)]
pub struct InMemoryPreferenceStore {
    preferences: Mutex<HashMap<String, DriverPreferences>>,
    outcomes: Mutex<Vec<TripOutcome>>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_preferences(self, preferences: DriverPreferences) -> SafeTravelsResult<Self> {
        self.preferences
            .safe_lock()?
            .insert(preferences.driver_id.clone(), preferences);
        Ok(self)
    }

    pub fn outcomes(&self) -> SafeTravelsResult<Vec<TripOutcome>> {
        Ok(self.outcomes.safe_lock()?.clone())
    }
}

#[async_trait]
impl PreferenceStore for InMemoryPreferenceStore {
    async fn load_driver_preferences(&self, driver_id: &str) -> SafeTravelsResult<DriverPreferences> {
        let prefs = self.preferences.safe_lock()?;
        Ok(prefs.get(driver_id).cloned().unwrap_or_else(|| DriverPreferences {
            driver_id: driver_id.to_string(),
            ..DriverPreferences::default()
        }))
    }

    async fn record_trip_outcome(&self, outcome: &TripOutcome) -> SafeTravelsResult<()> {
        self.outcomes.safe_lock()?.push(outcome.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IncidentRecord {
    pub at: Coordinate,
    pub kind: String,
    pub occurred_at: DateTime<Utc>,
}

/// Counts pre-loaded incidents inside a radius and time window.
#[derive(Debug, Clone, Default)]
pub struct StaticIncidentProvider {
    records: Vec<IncidentRecord>,
}

impl StaticIncidentProvider {
    pub fn new(records: Vec<IncidentRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl IncidentProvider for StaticIncidentProvider {
    async fn incident_summary(
        &self,
        at: Coordinate,
        radius_miles: f64,
        since: DateTime<Utc>,
    ) -> SafeTravelsResult<IncidentSummary> {
        let mut by_type = BTreeMap::new();
        let mut total = 0;
        for record in self
            .records
            .iter()
            .filter(|r| r.occurred_at >= since && r.at.distance_to(&at) <= radius_miles)
        {
            total += 1;
            *by_type.entry(record.kind.clone()).or_insert(0) += 1;
        }
        Ok(IncidentSummary {
            total_incidents: total,
            by_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn resolves_city_names_and_coordinates() {
        assert!(resolve_location("Los Angeles, CA").is_some());
        assert!(resolve_location("  phoenix ").is_some());
        assert_eq!(resolve_location("35.0,-97.0"), Some(Coordinate::new(35.0, -97.0)));
        assert!(resolve_location("Atlantis").is_none());
    }

    #[tokio::test]
    async fn gazetteer_returns_three_alternatives() {
        let routes = GazetteerRouting::new().get_routes("Los Angeles, CA", "Phoenix, AZ").await.unwrap();
        assert_eq!(routes.len(), 3);
        assert_eq!(routes[0].coordinates.len(), 2);
        assert!(routes[1].total_distance_miles > routes[0].total_distance_miles);
        assert!(routes[2].total_distance_miles > routes[0].total_distance_miles);

        let err = GazetteerRouting::new().get_routes("Atlantis", "Phoenix").await.unwrap_err();
        assert!(matches!(err, SafeTravelsError::RoutingUnavailable { .. }));
    }

    #[tokio::test]
    async fn keyword_retrieval_ranks_and_limits() {
        let docs = KeywordRetrieval::new()
            .retrieve("cargo theft electronics Los Angeles", 2)
            .await
            .unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs[0].relevance >= docs[1].relevance);
        assert!(KeywordRetrieval::new().retrieve("", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn incidents_filtered_by_radius_and_window() {
        let now = Utc::now();
        let here = Coordinate::new(32.78, -96.80);
        let records = vec![
            IncidentRecord { at: here, kind: "theft".into(), occurred_at: now },
            IncidentRecord { at: here, kind: "burglary".into(), occurred_at: now },
            IncidentRecord { at: here, kind: "theft".into(), occurred_at: now - Duration::days(400) },
            IncidentRecord { at: Coordinate::new(40.0, -75.0), kind: "theft".into(), occurred_at: now },
        ];
        let provider = StaticIncidentProvider::new(records);
        let summary = provider
            .incident_summary(here, 25.0, now - Duration::days(90))
            .await
            .unwrap();
        assert_eq!(summary.total_incidents, 2);
        assert_eq!(summary.by_type.get("theft"), Some(&1));
    }
}
