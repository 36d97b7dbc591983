// src/tests/route_scanner_test.rs
// Segmentation, zones, hotspots and composite scoring

use super::test_utils::{equator_path, load_context, plain_scanner, table_with_load, MILES_PER_DEGREE};
use crate::errors::SafeTravelsError;
use crate::geo::{BoundingBox, Coordinate, Hotspot};
use crate::risk_factors::RiskContext;
use crate::risk_scorer::{RiskLevel, RiskScorer};
use crate::route_scanner::{RouteZoneScanner, Zone};
use std::sync::Arc;

#[test]
fn zone_thresholds() {
    assert_eq!(Zone::from_score(4.9), Zone::Green);
    assert_eq!(Zone::from_score(5.0), Zone::Yellow);
    assert_eq!(Zone::from_score(6.9), Zone::Yellow);
    assert_eq!(Zone::from_score(7.0), Zone::Red);
    assert_eq!(Zone::from_score(10.0), Zone::Red);
}

#[test]
fn long_haul_composite_applies_length_multiplier() {
    let scanner = plain_scanner(table_with_load(4.0));
    let route = scanner.scan(&equator_path(1600.0), &load_context()).unwrap();

    assert!((route.total_miles - 1600.0).abs() < 0.1, "total {}", route.total_miles);
    assert!(route.segments.iter().all(|s| (s.risk.score - 4.0).abs() < 1e-9));
    assert!((route.weighted_mean - 4.0).abs() < 1e-9);
    assert_eq!(route.route_length_multiplier, 1.4);
    assert!((route.composite_score - 5.6).abs() < 1e-6, "composite {}", route.composite_score);
    assert_eq!(route.composite_level, RiskLevel::High);
    // 80 full segments plus a sliver for the last few yards
    assert!((80..=81).contains(&route.segments.len()));
}

#[test]
fn scanning_is_idempotent_and_ordered() {
    let scanner = RouteZoneScanner::default();
    let path = vec![
        Coordinate::new(34.0522, -118.2437),
        Coordinate::new(33.8, -116.5),
        Coordinate::new(33.4484, -112.0740),
    ];
    let ctx = RiskContext::new().with_commodity("electronics").with_time_of_day("night");
    let first = scanner.scan(&path, &ctx).unwrap();
    let second = scanner.scan(&path, &ctx).unwrap();
    assert_eq!(first, second);

    for (i, pair) in first.segments.windows(2).enumerate() {
        assert_eq!(pair[0].index, i);
        assert_eq!(pair[1].index, i + 1);
        assert!(pair[0].start_mile < pair[1].start_mile);
        assert!((pair[0].end_mile() - pair[1].start_mile).abs() < 1e-6);
    }
    let covered: f64 = first.segments.iter().map(|s| s.length_miles).sum();
    assert!((covered - first.total_miles).abs() < 1e-6);
}

#[test]
fn empty_and_invalid_routes_are_rejected() {
    let scanner = RouteZoneScanner::default();
    let ctx = RiskContext::new();
    assert!(matches!(scanner.scan(&[], &ctx), Err(SafeTravelsError::InvalidRoute { .. })));
    let bad = [Coordinate::new(0.0, 0.0), Coordinate::new(95.0, 0.0)];
    assert!(matches!(scanner.scan(&bad, &ctx), Err(SafeTravelsError::InvalidRoute { .. })));
}

#[test]
fn single_point_and_short_routes_get_one_segment() {
    let scanner = plain_scanner(table_with_load(3.0));
    let ctx = load_context();

    let point = scanner.scan(&[Coordinate::new(0.0, 0.0)], &ctx).unwrap();
    assert_eq!(point.segments.len(), 1);
    assert_eq!(point.total_miles, 0.0);
    assert!((point.composite_score - 3.0).abs() < 1e-9);

    let short = scanner.scan(&equator_path(10.0), &ctx).unwrap();
    assert_eq!(short.segments.len(), 1);
    assert!((short.segments[0].length_miles - short.total_miles).abs() < 1e-9);
}

#[test]
fn segment_count_is_capped() {
    let scanner = plain_scanner(table_with_load(2.0)).with_max_segments(10);
    let route = scanner.scan(&equator_path(1600.0), &load_context()).unwrap();
    assert!(route.segments.len() <= 11);
    assert!(route.segments[0].length_miles > 150.0);
}

#[test]
fn segments_take_the_state_they_fall_in() {
    let scanner = RouteZoneScanner::new(RiskScorer::default(), Arc::new(Vec::new()));
    // Los Angeles to Phoenix starts in California and ends in Arizona
    let path = [Coordinate::new(34.0522, -118.2437), Coordinate::new(33.4484, -112.0740)];
    let route = scanner.scan(&path, &RiskContext::new()).unwrap();
    let first = &route.segments[0];
    let last = &route.segments[route.segments.len() - 1];
    assert_eq!(first.risk.multiplier_for("state"), Some(1.35));
    assert_eq!(last.risk.multiplier_for("state"), Some(1.1));
}

#[test]
fn hotspots_raise_segments_into_red() {
    let hotspot = Hotspot {
        name: "Test Yard".into(),
        bounds: BoundingBox::new(-1.0, 1.0, 2.0, 3.0),
        multiplier: 1.5,
    };
    let scanner = RouteZoneScanner::new(RiskScorer::new(table_with_load(5.0)), Arc::new(vec![hotspot]));
    let route = scanner.scan(&equator_path(400.0), &load_context()).unwrap();

    assert_eq!(route.hotspots(), vec!["Test Yard"]);
    assert!(!route.avoids_hotspots());
    for segment in &route.segments {
        let lon = segment.coordinate.lon;
        if (2.0..=3.0).contains(&lon) {
            assert_eq!(segment.zone, Zone::Red);
            assert!((segment.risk.score - 7.5).abs() < 1e-9);
        } else {
            assert_eq!(segment.zone, Zone::Yellow);
        }
    }

    let spans = route.zone_spans();
    let zones: Vec<Zone> = spans.iter().map(|s| s.zone).collect();
    assert_eq!(zones, vec![Zone::Yellow, Zone::Red, Zone::Yellow]);
    let red = &spans[1];
    assert!(red.start_mile >= 2.0 * MILES_PER_DEGREE - 20.0);
    assert!(red.end_mile <= 3.0 * MILES_PER_DEGREE + 20.0);
    assert!((red.peak_risk - 7.5).abs() < 1e-9);

    let breakdown = route.zone_breakdown();
    assert_eq!(breakdown.red_segments, route.red_segment_count());
    assert_eq!(breakdown.green_segments, 0);
    let miles = breakdown.green_miles + breakdown.yellow_miles + breakdown.red_miles;
    assert!((miles - route.total_miles).abs() < 1e-6);
    assert!(route.recommendations().iter().any(|r| r.contains("red zone")));
}

#[test]
fn hotspots_boost_segments_that_score_below_the_floor() {
    let hotspot = Hotspot {
        name: "Lumber Yard".into(),
        bounds: BoundingBox::new(-1.0, 1.0, 2.0, 3.0),
        multiplier: 1.5,
    };
    let scanner = RouteZoneScanner::new(RiskScorer::new(table_with_load(0.5)), Arc::new(vec![hotspot]));
    let route = scanner.scan(&equator_path(400.0), &load_context()).unwrap();

    let (inside, outside): (Vec<_>, Vec<_>) = route
        .segments
        .iter()
        .partition(|s| s.hotspot.as_deref() == Some("Lumber Yard"));
    assert!(!inside.is_empty());
    assert!(inside.iter().all(|s| (s.risk.score - 1.5).abs() < 1e-9));
    assert!(outside.iter().all(|s| s.risk.score == 1.0));
}

#[test]
fn default_hotspot_covers_los_angeles_corridor() {
    let scanner = RouteZoneScanner::default();
    let path = [Coordinate::new(34.0522, -118.2437), Coordinate::new(33.4484, -112.0740)];
    let route = scanner.scan(&path, &RiskContext::new()).unwrap();
    assert!(route.hotspots().contains(&"I-10 Corridor LA-Phoenix"));
    let first = &route.segments[0];
    assert_eq!(first.hotspot.as_deref(), Some("I-10 Corridor LA-Phoenix"));
    assert!((first.risk.score - 1.35 * 1.5).abs() < 1e-9);
}
