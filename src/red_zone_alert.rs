//! Proximity alerts for a moving vehicle approaching red-zone spans.

use crate::geo::Coordinate;
use crate::route_scanner::{Zone, ZoneSpan};
use serde::{Deserialize, Serialize};

pub const CRITICAL_MILES: f64 = 50.0;
pub const WARNING_MILES: f64 = 100.0;
pub const CAUTION_MILES: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Safe,
    Caution,
    Warning,
    Critical,
}

impl AlertLevel {
    pub fn from_distance(miles: f64) -> Self {
        if miles <= CRITICAL_MILES {
            AlertLevel::Critical
        } else if miles <= WARNING_MILES {
            AlertLevel::Warning
        } else if miles <= CAUTION_MILES {
            AlertLevel::Caution
        } else {
            AlertLevel::Safe
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProximityAlert {
    pub level: AlertLevel,
    pub should_alert: bool,
    /// `None` when no red zone is known
    pub distance_miles: Option<f64>,
    pub eta_minutes: Option<f64>,
    pub zone_description: Option<String>,
    pub message: String,
    pub recommended_action: String,
}

impl ProximityAlert {
    fn clear() -> Self {
        Self {
            level: AlertLevel::Safe,
            should_alert: false,
            distance_miles: None,
            eta_minutes: None,
            zone_description: None,
            message: "No red zones detected on your route.".into(),
            recommended_action: "Continue on planned route.".into(),
        }
    }
}

/// Alert for the red span nearest to `position`. Non-red spans are ignored.
pub fn check_proximity(position: &Coordinate, spans: &[ZoneSpan], speed_mph: f64) -> ProximityAlert {
    let nearest = spans
        .iter()
        .filter(|s| s.zone == Zone::Red)
        .map(|s| (s, position.distance_to(&s.center)))
        .min_by(|a, b| a.1.total_cmp(&b.1));

    let Some((span, distance)) = nearest else {
        return ProximityAlert::clear();
    };

    let level = AlertLevel::from_distance(distance);
    let eta = if speed_mph > 0.0 {
        Some(distance / speed_mph * 60.0)
    } else {
        None
    };
    let eta_text = eta
        .map(|m| format!("~{m:.0} min"))
        .unwrap_or_else(|| "stationary".to_string());

    let (message, action) = match level {
        AlertLevel::Critical => (
            format!(
                "CRITICAL: entering {} in {distance:.0} miles ({eta_text}). Find secure parking now.",
                span.description
            ),
            "Find a secured truck stop or distribution center. Do not stop in unsecured areas.",
        ),
        AlertLevel::Warning => (
            format!("WARNING: {} in {distance:.0} miles ({eta_text}). Plan your stop soon.", span.description),
            "Plan your next stop at a secured location before entering the zone.",
        ),
        AlertLevel::Caution => (
            format!("HEADS UP: {} in {distance:.0} miles ({eta_text}). Monitor for safe stops.", span.description),
            "Begin monitoring for safe stopping options and consider passing through in daylight.",
        ),
        AlertLevel::Safe => (
            "Route is clear of nearby red zones.".to_string(),
            "Continue on planned route.",
        ),
    };

    ProximityAlert {
        level,
        should_alert: level != AlertLevel::Safe,
        distance_miles: Some(distance),
        eta_minutes: eta,
        zone_description: Some(span.description.clone()),
        message,
        recommended_action: action.to_string(),
    }
}
