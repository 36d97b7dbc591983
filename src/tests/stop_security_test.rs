// src/tests/stop_security_test.rs
// Point model, tiers and preference-aware ranking

use crate::collaborators::DriverPreferences;
use crate::geo::Coordinate;
use crate::stop_security::{
    nearest_acceptable, rank_stops, RestNeed, StopCandidate, StopFeature, StopFeatureChecklist, StopSecurityScorer,
    Tier,
};

fn stop(id: &str, name: &str, lat: f64, features: &[StopFeature]) -> StopCandidate {
    StopCandidate {
        stop_id: id.to_string(),
        name: name.to_string(),
        brand: None,
        coordinate: Coordinate::new(lat, -97.0),
        checklist: StopFeatureChecklist::from_features(features),
        driver_rating: None,
    }
}

#[test]
fn all_positive_features_score_full_marks() {
    let positives: Vec<StopFeature> = StopFeature::ALL.iter().copied().filter(|f| !f.is_risk()).collect();
    let score = StopSecurityScorer::new().score(&StopFeatureChecklist::from_features(&positives));
    assert_eq!(score.score, 100);
    assert_eq!(score.tier, Tier::Tier1);
    assert_eq!(score.contributions.len(), positives.len());
}

#[test]
fn all_negative_features_floor_at_zero() {
    let negatives: Vec<StopFeature> = StopFeature::ALL.iter().copied().filter(|f| f.is_risk()).collect();
    let score = StopSecurityScorer::new().score(&StopFeatureChecklist::from_features(&negatives));
    assert_eq!(score.score, 0);
    assert_eq!(score.tier, Tier::Avoid);
}

#[test]
fn every_feature_at_once_nets_the_difference() {
    let score = StopSecurityScorer::new().score(&StopFeatureChecklist::from_features(&StopFeature::ALL));
    assert_eq!(score.score, 100 - 24);
    assert_eq!(score.tier, Tier::Tier2);
}

#[test]
fn tier_boundaries() {
    assert_eq!(Tier::from_score(85), Tier::Tier1);
    assert_eq!(Tier::from_score(84), Tier::Tier2);
    assert_eq!(Tier::from_score(65), Tier::Tier2);
    assert_eq!(Tier::from_score(64), Tier::Tier3);
    assert_eq!(Tier::from_score(45), Tier::Tier3);
    assert_eq!(Tier::from_score(44), Tier::Avoid);
}

#[test]
fn checklist_serializes_with_feature_names() {
    let checklist = StopFeatureChecklist::from_features(&[StopFeature::Staffed24x7, StopFeature::Gated]);
    let json = serde_json::to_value(&checklist).unwrap();
    assert_eq!(json["staffed_24_7"], true);
    assert_eq!(json["gated"], true);
    assert_eq!(json["cctv"], false);

    let feature: StopFeature = serde_json::from_str("\"staffed_24_7\"").unwrap();
    assert_eq!(feature, StopFeature::Staffed24x7);
    let parsed: StopFeatureChecklist = serde_json::from_str(r#"{"gated": true}"#).unwrap();
    assert!(parsed.gated && !parsed.guarded);
}

#[test]
fn ranking_filters_by_need_and_applies_preferences() {
    let scorer = StopSecurityScorer::new();
    use StopFeature::*;
    let fortress = stop("a", "Fortress Plaza", 35.0, &[Gated, Guarded, Cctv, NoTheftHistory, LowRiskState, HighwayAccess]); // 73
    let pilot = stop("b", "Pilot #12", 35.1, &[Gated, Guarded, Cctv, NoTheftHistory, HighwayAccess]); // 65 + 8 brand
    let lot = stop("c", "Dirt Lot", 35.2, &[Cctv, WellLit, Isolated]); // 7

    let overnight = rank_stops(&scorer, &[fortress.clone(), pilot.clone(), lot.clone()], None, RestNeed::Overnight);
    let ids: Vec<&str> = overnight.iter().map(|r| r.candidate.stop_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(overnight[0].security.score, 73);
    assert_eq!(overnight[1].security.score, 73);

    let prefs = DriverPreferences {
        driver_id: "d1".into(),
        disliked_stop_features: vec![LowRiskState],
        preferred_brands: vec!["pilot".into()],
        unsafe_stop_ids: vec![],
    };
    let biased = rank_stops(&scorer, &[fortress.clone(), pilot.clone()], Some(&prefs), RestNeed::Overnight);
    assert_eq!(biased[0].candidate.stop_id, "b");
    assert_eq!(biased[0].preference_adjustment, 5);
    assert_eq!(biased[1].preference_adjustment, -10);
    // the security score itself is untouched
    assert_eq!(biased[1].security.score, 73);

    let flagged = DriverPreferences {
        driver_id: "d1".into(),
        unsafe_stop_ids: vec!["b".into()],
        ..DriverPreferences::default()
    };
    let filtered = rank_stops(&scorer, &[fortress, pilot], Some(&flagged), RestNeed::Overnight);
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].candidate.stop_id, "a");
}

#[test]
fn emergency_finder_skips_avoid_tier_and_far_stops() {
    let scorer = StopSecurityScorer::new();
    use StopFeature::*;
    let here = Coordinate::new(35.0, -97.0);
    let unsafe_close = stop("near", "Dirt Lot", 35.05, &[Isolated]);
    let decent = stop("mid", "County Yard", 35.3, &[Gated, NoTheftHistory, Cctv, HighwayAccess]); // 50
    let far = stop("far", "Secure Depot", 37.0, &[Gated, Guarded, NoTheftHistory]);

    let (found, security, distance) =
        nearest_acceptable(&scorer, &here, &[unsafe_close, decent, far], 50.0).unwrap();
    assert_eq!(found.stop_id, "mid");
    assert_eq!(security.tier, Tier::Tier3);
    assert!(distance > 20.0 && distance < 21.5);

    assert!(nearest_acceptable(&scorer, &here, &[], 50.0).is_none());
}
