//! End-to-end tests for the risk core using the offline collaborators.
//!
//! These drive `SafeTravelsCore` the way the CLI does:
//! - full reviews over gazetteer routes
//! - fatal routing failures
//! - context enrichment from incident history
//! - sled-backed trip memory

use chrono::{Duration, Utc};
use std::sync::Arc;
use tempfile::TempDir;

use safetravels::{
    agent_state::{ReviewRequest, Verdict},
    collaborators::Collaborators,
    config_loader::SafeTravelsConfig,
    errors::SafeTravelsError,
    geo::Coordinate,
    risk_factors::RiskContext,
    runtime_core::SafeTravelsCore,
    static_providers::{
        resolve_location, GazetteerRouting, IncidentRecord, InMemoryPreferenceStore, KeywordRetrieval,
        StaticIncidentProvider, TemplateSynthesizer,
    },
};

fn offline_collaborators() -> Collaborators {
    Collaborators::new(Arc::new(GazetteerRouting::new()))
        .with_retrieval(Arc::new(KeywordRetrieval::new()))
        .with_synthesis(Arc::new(TemplateSynthesizer))
}

fn electronics() -> RiskContext {
    RiskContext::new()
        .with_commodity("electronics")
        .with_cargo_value(400_000.0)
        .with_time_of_day("night")
}

#[tokio::test]
async fn review_between_known_cities_completes() {
    let core = SafeTravelsCore::new(SafeTravelsConfig::default(), offline_collaborators()).unwrap();
    let outcome = core
        .run_review("Los Angeles, CA", "Phoenix, AZ", electronics())
        .await
        .unwrap();

    assert!(outcome.verdict.is_terminal());
    assert!(outcome.revisions_used <= 3);
    assert!(["route_A", "route_B", "route_C"].contains(&outcome.route.route_id.as_str()));
    assert!((0.0..=1.0).contains(&outcome.confidence));
    assert!((1.0..=10.0).contains(&outcome.route.composite_score));
    assert!(outcome.degraded.is_empty());
    assert!(outcome.rationale.contains("Sources consulted"));
    assert!(outcome
        .claims
        .iter()
        .any(|c| c.source.as_deref() == Some("Hotspot Registry")));
    assert!(!outcome.reasoning.is_empty());
    assert_eq!(outcome.transcript_hash.len(), 64);
}

#[tokio::test]
async fn selected_route_is_never_riskier_than_an_alternative_when_approved() {
    let core = SafeTravelsCore::new(SafeTravelsConfig::default(), offline_collaborators()).unwrap();
    let cargo = electronics();
    let outcome = core.run_review("Dallas, TX", "Atlanta, GA", cargo.clone()).await.unwrap();
    assert_eq!(outcome.verdict, Verdict::Approved);

    let from = resolve_location("Dallas").unwrap();
    let to = resolve_location("Atlanta").unwrap();
    let direct = core.scan_route(&[from, to], &cargo).unwrap();
    assert!(outcome.route.composite_score <= direct.composite_score + 1e-9);
}

#[tokio::test]
async fn unknown_origin_fails_in_planning() {
    let core = SafeTravelsCore::new(SafeTravelsConfig::default(), offline_collaborators()).unwrap();
    let err = core
        .run_review("Atlantis", "Phoenix, AZ", RiskContext::new())
        .await
        .unwrap_err();
    assert_eq!(err.stage(), Some("planning"));
    assert!(matches!(err.root(), SafeTravelsError::RoutingUnavailable { .. }));
}

#[tokio::test]
async fn invalid_config_is_rejected_at_construction() {
    let mut config = SafeTravelsConfig::default();
    config.planner.time_weight = 0.9;
    assert!(SafeTravelsCore::new(config, offline_collaborators()).is_err());
}

#[tokio::test]
async fn enrichment_fills_region_and_incident_density() {
    let dallas = Coordinate::new(32.7767, -96.7970);
    let recent = Utc::now() - Duration::days(3);
    let mut records: Vec<IncidentRecord> = (0..12)
        .map(|i| IncidentRecord {
            at: Coordinate::new(32.78 + i as f64 * 0.01, -96.80),
            kind: if i % 2 == 0 { "full_trailer".into() } else { "pilferage".into() },
            occurred_at: recent,
        })
        .collect();
    // outside the window and outside the radius
    records.push(IncidentRecord {
        at: dallas,
        kind: "full_trailer".into(),
        occurred_at: Utc::now() - Duration::days(400),
    });
    records.push(IncidentRecord {
        at: Coordinate::new(29.7604, -95.3698),
        kind: "full_trailer".into(),
        occurred_at: recent,
    });

    let collaborators = offline_collaborators().with_incidents(Arc::new(StaticIncidentProvider::new(records)));
    let core = SafeTravelsCore::new(SafeTravelsConfig::default(), collaborators).unwrap();

    let context = core.enrich_context(RiskContext::new(), dallas).await;
    assert_eq!(context.region.as_deref(), Some("TX"));
    assert_eq!(context.incident_density.as_deref(), Some("moderate"));

    let score = core.score_location(&context);
    assert!(score.multiplier_for("incident_density").is_some());
}

#[tokio::test]
async fn enrichment_without_incident_provider_only_sets_region() {
    let core = SafeTravelsCore::new(SafeTravelsConfig::default(), offline_collaborators()).unwrap();
    let context = core
        .enrich_context(RiskContext::new(), Coordinate::new(0.0, 0.0))
        .await;
    assert_eq!(context.region, None);
    assert_eq!(context.incident_density, None);
}

#[tokio::test]
async fn driver_trips_are_remembered_in_sled() {
    let dir = TempDir::new().unwrap();
    let mut config = SafeTravelsConfig::default();
    config.storage.db_path = dir.path().join("db").to_string_lossy().into_owned();

    let core = SafeTravelsCore::from_config(config).unwrap();
    let store = core.preference_store().unwrap();
    store
        .record_stop_feedback("driver-1", "stop-77", 1, Some("lot was dark".into()))
        .unwrap();

    let request = ReviewRequest::new("Houston", "Memphis", electronics()).with_driver("driver-1");
    let outcome = core.run_review_request(request).await.unwrap();

    let history = store.trip_history("driver-1").unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].route_id, outcome.route.route_id);
    assert_eq!(history[0].commodity.as_deref(), Some("electronics"));
    assert!(outcome
        .recommendations
        .iter()
        .any(|r| r.contains("previously rated as unsafe")));
}

#[tokio::test]
async fn in_memory_store_records_outcomes_without_disk() {
    let store = Arc::new(InMemoryPreferenceStore::new());
    let collaborators = offline_collaborators().with_preferences(store.clone());
    let core = SafeTravelsCore::new(SafeTravelsConfig::default(), collaborators).unwrap();

    core.run_review("Chicago", "Denver", RiskContext::new()).await.unwrap();
    assert!(store.outcomes().unwrap().is_empty());

    let request = ReviewRequest::new("Chicago", "Denver", RiskContext::new()).with_driver("d-9");
    core.run_review_request(request).await.unwrap();
    assert_eq!(store.outcomes().unwrap().len(), 1);
}
