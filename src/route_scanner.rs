//! Walks a coordinate path, scores fixed-length segments and buckets them
//! into green/yellow/red zones.

use crate::errors::{SafeTravelsError, SafeTravelsResult};
use crate::geo::{default_hotspots, hotspot_at, state_for, Coordinate, Hotspot};
use crate::risk_factors::RiskContext;
use crate::risk_scorer::{clamp_risk, AppliedFactor, RiskLevel, RiskScore, RiskScorer};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

pub const RED_THRESHOLD: f64 = 7.0;
pub const YELLOW_THRESHOLD: f64 = 5.0;
pub const DEFAULT_SEGMENT_MILES: f64 = 20.0;
pub const DEFAULT_MAX_SEGMENTS: usize = 100;
pub const AVERAGE_SPEED_MPH: f64 = 55.0;

// Tolerance for floating-point drift when comparing accumulated miles.
const MILE_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    Green,
    Yellow,
    Red,
}

impl Zone {
    pub fn from_score(score: f64) -> Self {
        if score >= RED_THRESHOLD {
            Zone::Red
        } else if score >= YELLOW_THRESHOLD {
            Zone::Yellow
        } else {
            Zone::Green
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Green => "green",
            Zone::Yellow => "yellow",
            Zone::Red => "red",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSegment {
    pub index: usize,
    pub coordinate: Coordinate,
    pub start_mile: f64,
    pub length_miles: f64,
    pub risk: RiskScore,
    pub zone: Zone,
    pub hotspot: Option<String>,
}

impl RouteSegment {
    pub fn end_mile(&self) -> f64 {
        self.start_mile + self.length_miles
    }
}

/// Consecutive segments sharing a zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneSpan {
    pub zone: Zone,
    pub start_mile: f64,
    pub end_mile: f64,
    pub peak_risk: f64,
    pub center: Coordinate,
    pub segment_count: usize,
    pub description: String,
    pub recommended_action: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneBreakdown {
    pub green_segments: usize,
    pub yellow_segments: usize,
    pub red_segments: usize,
    pub green_miles: f64,
    pub yellow_miles: f64,
    pub red_miles: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteOption {
    pub route_id: String,
    pub name: String,
    pub segments: Vec<RouteSegment>,
    pub total_miles: f64,
    pub estimated_minutes: f64,
    /// Distance-weighted mean of segment scores before the length multiplier
    pub weighted_mean: f64,
    pub route_length_multiplier: f64,
    pub composite_score: f64,
    pub composite_level: RiskLevel,
    /// Hotspot and route-length multipliers that were applied
    pub multipliers: Vec<AppliedFactor>,
}

impl RouteOption {
    pub fn with_identity(mut self, route_id: impl Into<String>, name: impl Into<String>) -> Self {
        self.route_id = route_id.into();
        self.name = name.into();
        self
    }

    pub fn with_estimated_minutes(mut self, minutes: f64) -> Self {
        self.estimated_minutes = minutes;
        self
    }

    pub fn hotspots(&self) -> Vec<&str> {
        self.multipliers
            .iter()
            .filter(|m| m.factor == "hotspot")
            .map(|m| m.value.as_str())
            .collect()
    }

    pub fn avoids_hotspots(&self) -> bool {
        self.segments.iter().all(|s| s.hotspot.is_none())
    }

    pub fn red_segment_count(&self) -> usize {
        self.segments.iter().filter(|s| s.zone == Zone::Red).count()
    }

    pub fn zone_spans(&self) -> Vec<ZoneSpan> {
        let mut spans = Vec::new();
        let mut start = 0;
        for i in 1..=self.segments.len() {
            let boundary = i == self.segments.len() || self.segments[i].zone != self.segments[start].zone;
            if boundary {
                spans.push(build_span(&self.segments[start..i]));
                start = i;
            }
        }
        spans
    }

    pub fn spans_of(&self, zone: Zone) -> Vec<ZoneSpan> {
        self.zone_spans().into_iter().filter(|s| s.zone == zone).collect()
    }

    pub fn zone_breakdown(&self) -> ZoneBreakdown {
        let mut breakdown = ZoneBreakdown::default();
        for segment in &self.segments {
            match segment.zone {
                Zone::Green => {
                    breakdown.green_segments += 1;
                    breakdown.green_miles += segment.length_miles;
                }
                Zone::Yellow => {
                    breakdown.yellow_segments += 1;
                    breakdown.yellow_miles += segment.length_miles;
                }
                Zone::Red => {
                    breakdown.red_segments += 1;
                    breakdown.red_miles += segment.length_miles;
                }
            }
        }
        breakdown
    }

    pub fn recommendations(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.composite_score >= 8.0 {
            out.push("Critical route. Consider alternative routing or additional security.".to_string());
        } else if self.composite_score >= 6.0 {
            out.push("High risk route. Plan stops carefully and maintain communication.".to_string());
        }

        let red = self.spans_of(Zone::Red).len();
        if red > 0 {
            out.push(format!("{red} red zone(s) detected. Avoid stopping in these areas."));
        }
        if self.spans_of(Zone::Yellow).len() > 3 {
            out.push("Multiple caution zones. Stay alert throughout the route.".to_string());
        }

        if self.total_miles > 1000.0 {
            out.push("Long haul (1000+ miles). Plan multiple secured rest stops.".to_string());
        } else if self.total_miles > 500.0 {
            out.push("Regional haul. Plan at least one secured rest stop.".to_string());
        }

        out.push("Keep dispatch informed of your location and any unusual activity.".to_string());
        out
    }
}

fn build_span(segments: &[RouteSegment]) -> ZoneSpan {
    let zone = segments[0].zone;
    let start_mile = segments[0].start_mile;
    let end_mile = segments[segments.len() - 1].end_mile();
    let peak_risk = segments
        .iter()
        .map(|s| s.risk.score)
        .fold(f64::MIN, f64::max);
    let center = segments[segments.len() / 2].coordinate;

    let (description, recommended_action) = match zone {
        Zone::Red => (
            format!("High-risk zone from mile {start_mile:.0} to {end_mile:.0}"),
            "Avoid stopping in this area. Proceed through quickly if possible.",
        ),
        Zone::Yellow => (
            format!("Caution zone from mile {start_mile:.0} to {end_mile:.0}"),
            "Maintain awareness. Stop only at secured locations.",
        ),
        Zone::Green => (
            format!("Low-risk stretch from mile {start_mile:.0} to {end_mile:.0}"),
            "Standard precautions.",
        ),
    };

    ZoneSpan {
        zone,
        start_mile,
        end_mile,
        peak_risk,
        center,
        segment_count: segments.len(),
        description,
        recommended_action: recommended_action.to_string(),
    }
}

/// Stateless route scanner; cheap to clone and share across tasks.
#[derive(Debug, Clone)]
pub struct RouteZoneScanner {
    scorer: RiskScorer,
    hotspots: Arc<Vec<Hotspot>>,
    segment_miles: f64,
    max_segments: usize,
}

impl Default for RouteZoneScanner {
    fn default() -> Self {
        Self::new(RiskScorer::default(), Arc::new(default_hotspots()))
    }
}

impl RouteZoneScanner {
    pub fn new(scorer: RiskScorer, hotspots: Arc<Vec<Hotspot>>) -> Self {
        Self {
            scorer,
            hotspots,
            segment_miles: DEFAULT_SEGMENT_MILES,
            max_segments: DEFAULT_MAX_SEGMENTS,
        }
    }

    pub fn with_segment_miles(mut self, miles: f64) -> Self {
        self.segment_miles = miles;
        self
    }

    pub fn with_max_segments(mut self, max: usize) -> Self {
        self.max_segments = max.max(1);
        self
    }

    pub fn scorer(&self) -> &RiskScorer {
        &self.scorer
    }

    pub fn hotspots(&self) -> &[Hotspot] {
        &self.hotspots
    }

    pub fn scan(&self, coordinates: &[Coordinate], template: &RiskContext) -> SafeTravelsResult<RouteOption> {
        if coordinates.is_empty() {
            return Err(SafeTravelsError::invalid_route("empty coordinate sequence"));
        }
        if !(self.segment_miles.is_finite() && self.segment_miles > 0.0) {
            return Err(SafeTravelsError::invalid_route(format!(
                "segment length {} must be positive",
                self.segment_miles
            )));
        }
        for c in coordinates {
            c.validate()?;
        }

        // cumulative miles at each vertex
        let mut cumulative = Vec::with_capacity(coordinates.len());
        cumulative.push(0.0);
        for pair in coordinates.windows(2) {
            let last = cumulative[cumulative.len() - 1];
            cumulative.push(last + pair[0].distance_to(&pair[1]));
        }
        let total_miles = cumulative[cumulative.len() - 1];
        let interval = self.segment_miles.max(total_miles / self.max_segments as f64);

        let mut samples: Vec<(Coordinate, f64, f64)> = Vec::new();
        let mut leg = 0;
        let mut k = 1usize;
        loop {
            let mile = k as f64 * interval;
            if mile > total_miles + MILE_EPSILON {
                break;
            }
            while leg + 2 < cumulative.len() && cumulative[leg + 1] < mile {
                leg += 1;
            }
            samples.push((point_at(coordinates, &cumulative, leg, mile), mile - interval, interval));
            k += 1;
        }
        let covered = samples.len() as f64 * interval;
        if samples.is_empty() || total_miles - covered > MILE_EPSILON {
            samples.push((coordinates[coordinates.len() - 1], covered, (total_miles - covered).max(0.0)));
        }

        let segments: Vec<RouteSegment> = samples
            .into_iter()
            .enumerate()
            .map(|(index, (coordinate, start_mile, length_miles))| {
                self.score_segment(index, coordinate, start_mile, length_miles, template)
            })
            .collect();

        let weight: f64 = segments.iter().map(|s| s.length_miles).sum();
        let weighted_mean = if weight > 0.0 {
            segments.iter().map(|s| s.risk.score * s.length_miles).sum::<f64>() / weight
        } else {
            segments.iter().map(|s| s.risk.score).sum::<f64>() / segments.len() as f64
        };

        let length_multiplier = self.scorer.table().route_length_multiplier(total_miles);
        let composite_score = clamp_risk(weighted_mean * length_multiplier);

        let mut multipliers: Vec<AppliedFactor> = Vec::new();
        for segment in &segments {
            if let Some(name) = &segment.hotspot {
                if !multipliers.iter().any(|m| &m.value == name) {
                    let multiplier = segment.risk.multiplier_for("hotspot").unwrap_or(1.0);
                    multipliers.push(AppliedFactor {
                        factor: "hotspot".into(),
                        value: name.clone(),
                        multiplier,
                    });
                }
            }
        }
        multipliers.push(AppliedFactor {
            factor: "route_length".into(),
            value: format!("{total_miles:.0} mi"),
            multiplier: length_multiplier,
        });

        debug!(
            "scanned {:.1} mi into {} segments, composite {:.2}",
            total_miles,
            segments.len(),
            composite_score
        );

        Ok(RouteOption {
            route_id: "route".to_string(),
            name: "Scanned route".to_string(),
            segments,
            total_miles,
            estimated_minutes: total_miles / AVERAGE_SPEED_MPH * 60.0,
            weighted_mean,
            route_length_multiplier: length_multiplier,
            composite_score,
            composite_level: RiskLevel::from_score(composite_score),
            multipliers,
        })
    }

    fn score_segment(
        &self,
        index: usize,
        coordinate: Coordinate,
        start_mile: f64,
        length_miles: f64,
        template: &RiskContext,
    ) -> RouteSegment {
        let context = template
            .clone()
            .with_region(state_for(&coordinate).map(str::to_string));
        let mut risk = self.scorer.score(&context);
        let hotspot = hotspot_at(&self.hotspots, &coordinate);
        if let Some(h) = hotspot {
            risk = risk.with_multiplier("hotspot", &h.name, h.multiplier);
        }
        RouteSegment {
            index,
            coordinate,
            start_mile,
            length_miles,
            zone: Zone::from_score(risk.score),
            risk,
            hotspot: hotspot.map(|h| h.name.clone()),
        }
    }
}

fn point_at(coordinates: &[Coordinate], cumulative: &[f64], leg: usize, mile: f64) -> Coordinate {
    if coordinates.len() == 1 {
        return coordinates[0];
    }
    let from = cumulative[leg];
    let length = cumulative[leg + 1] - from;
    if length <= 0.0 {
        return coordinates[leg + 1];
    }
    coordinates[leg].lerp(&coordinates[leg + 1], (mile - from) / length)
}
