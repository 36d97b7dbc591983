//! Narrow async contracts for the services the core depends on but does not own.

use crate::errors::{SafeTravelsError, SafeTravelsResult};
use crate::geo::Coordinate;
use crate::stop_security::StopFeature;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// One alternative returned by a routing provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePath {
    #[serde(default)]
    pub name: Option<String>,
    pub coordinates: Vec<Coordinate>,
    pub total_distance_miles: f64,
    pub estimated_duration_minutes: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncidentSummary {
    pub total_incidents: u32,
    #[serde(default)]
    pub by_type: BTreeMap<String, u32>,
}

impl IncidentSummary {
    /// Bucket name understood by the `incident_density` factor.
    pub fn density_category(&self) -> &'static str {
        match self.total_incidents {
            0..=2 => "very_low",
            3..=9 => "low",
            10..=24 => "moderate",
            25..=49 => "high",
            _ => "very_high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub text: String,
    pub source_label: String,
    pub relevance: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriverPreferences {
    pub driver_id: String,
    #[serde(default)]
    pub disliked_stop_features: Vec<StopFeature>,
    #[serde(default)]
    pub preferred_brands: Vec<String>,
    /// Stops the driver rated unsafe in past feedback
    #[serde(default)]
    pub unsafe_stop_ids: Vec<String>,
}

impl DriverPreferences {
    pub fn personalized_recommendations(&self) -> Vec<String> {
        let mut out = Vec::new();
        if !self.unsafe_stop_ids.is_empty() {
            out.push(format!(
                "Avoiding {} stop(s) you previously rated as unsafe.",
                self.unsafe_stop_ids.len()
            ));
        }
        if !self.preferred_brands.is_empty() {
            out.push(format!("Prioritizing {} stops.", self.preferred_brands.join(", ")));
        }
        if !self.disliked_stop_features.is_empty() {
            let names: Vec<String> = self
                .disliked_stop_features
                .iter()
                .map(|f| {
                    serde_json::to_value(f)
                        .ok()
                        .and_then(|v| v.as_str().map(str::to_string))
                        .unwrap_or_default()
                })
                .collect();
            out.push(format!("Deprioritizing stops with: {}.", names.join(", ")));
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripOutcome {
    pub trip_id: String,
    pub driver_id: String,
    pub recorded_at: DateTime<Utc>,
    pub origin: String,
    pub destination: String,
    pub route_id: String,
    pub route_name: String,
    pub commodity: Option<String>,
    pub cargo_value_usd: Option<f64>,
    pub total_miles: f64,
    pub composite_score: f64,
    pub confidence: f64,
    pub best_effort: bool,
}

#[async_trait]
pub trait RoutingProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn get_routes(&self, origin: &str, destination: &str) -> SafeTravelsResult<Vec<CandidatePath>>;
}

#[async_trait]
pub trait IncidentProvider: Send + Sync {
    async fn incident_summary(
        &self,
        at: Coordinate,
        radius_miles: f64,
        since: DateTime<Utc>,
    ) -> SafeTravelsResult<IncidentSummary>;
}

#[async_trait]
pub trait RetrievalProvider: Send + Sync {
    async fn retrieve(&self, query: &str, k: usize) -> SafeTravelsResult<Vec<RetrievedDocument>>;
}

#[async_trait]
pub trait SynthesisProvider: Send + Sync {
    async fn synthesize(&self, prompt: &str, documents: &[RetrievedDocument]) -> SafeTravelsResult<String>;
}

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn load_driver_preferences(&self, driver_id: &str) -> SafeTravelsResult<DriverPreferences>;
    async fn record_trip_outcome(&self, outcome: &TripOutcome) -> SafeTravelsResult<()>;
}

/// Runs a collaborator call under a deadline.
pub async fn with_timeout<T, F>(operation: &str, limit: Duration, call: F) -> SafeTravelsResult<T>
where
    F: Future<Output = SafeTravelsResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(SafeTravelsError::timeout(operation, limit)),
    }
}

/// The set of collaborators one core instance talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub routing: Arc<dyn RoutingProvider>,
    pub incidents: Option<Arc<dyn IncidentProvider>>,
    pub retrieval: Option<Arc<dyn RetrievalProvider>>,
    pub synthesis: Option<Arc<dyn SynthesisProvider>>,
    pub preferences: Option<Arc<dyn PreferenceStore>>,
    pub call_timeout: Duration,
}

impl Collaborators {
    pub fn new(routing: Arc<dyn RoutingProvider>) -> Self {
        Self {
            routing,
            incidents: None,
            retrieval: None,
            synthesis: None,
            preferences: None,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_incidents(mut self, provider: Arc<dyn IncidentProvider>) -> Self {
        self.incidents = Some(provider);
        self
    }

    pub fn with_retrieval(mut self, provider: Arc<dyn RetrievalProvider>) -> Self {
        self.retrieval = Some(provider);
        self
    }

    pub fn with_synthesis(mut self, provider: Arc<dyn SynthesisProvider>) -> Self {
        self.synthesis = Some(provider);
        self
    }

    pub fn with_preferences(mut self, store: Arc<dyn PreferenceStore>) -> Self {
        self.preferences = Some(store);
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incident_density_buckets() {
        let summary = |n| IncidentSummary { total_incidents: n, by_type: BTreeMap::new() };
        assert_eq!(summary(0).density_category(), "very_low");
        assert_eq!(summary(3).density_category(), "low");
        assert_eq!(summary(10).density_category(), "moderate");
        assert_eq!(summary(49).density_category(), "high");
        assert_eq!(summary(50).density_category(), "very_high");
    }

    #[tokio::test]
    async fn timeout_maps_to_error() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, SafeTravelsError>(1)
        };
        let result = with_timeout("slow_call", Duration::from_millis(10), slow).await;
        assert!(matches!(result, Err(SafeTravelsError::Timeout { .. })));

        let fast = async { Ok::<_, SafeTravelsError>(7) };
        assert_eq!(with_timeout("fast_call", Duration::from_secs(1), fast).await.unwrap(), 7);
    }

    #[test]
    fn personalized_recommendations_mention_preferences() {
        let prefs = DriverPreferences {
            driver_id: "d1".into(),
            disliked_stop_features: vec![StopFeature::SingleExit],
            preferred_brands: vec!["Pilot".into()],
            unsafe_stop_ids: vec!["stop-9".into()],
        };
        let recs = prefs.personalized_recommendations();
        assert_eq!(recs.len(), 3);
        assert!(recs[0].contains("1 stop"));
        assert!(recs[1].contains("Pilot"));
        assert!(recs[2].contains("single_exit"));
    }
}
