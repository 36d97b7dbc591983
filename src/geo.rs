use crate::errors::{SafeTravelsError, SafeTravelsResult};
use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_MILES: f64 = 3958.8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn validate(&self) -> SafeTravelsResult<()> {
        if !self.lat.is_finite() || !self.lon.is_finite() {
            return Err(SafeTravelsError::invalid_route(format!(
                "non-finite coordinate ({}, {})",
                self.lat, self.lon
            )));
        }
        if !(-90.0..=90.0).contains(&self.lat) || !(-180.0..=180.0).contains(&self.lon) {
            return Err(SafeTravelsError::invalid_route(format!(
                "coordinate out of range ({}, {})",
                self.lat, self.lon
            )));
        }
        Ok(())
    }

    /// Great-circle distance in miles.
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        haversine_miles(self, other)
    }

    /// Linear interpolation, adequate over segment-scale distances.
    pub fn lerp(&self, other: &Coordinate, fraction: f64) -> Coordinate {
        let t = fraction.clamp(0.0, 1.0);
        Coordinate {
            lat: self.lat + (other.lat - self.lat) * t,
            lon: self.lon + (other.lon - self.lon) * t,
        }
    }
}

impl std::str::FromStr for Coordinate {
    type Err = SafeTravelsError;

    /// Parses `lat,lon`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lon) = s
            .split_once(',')
            .ok_or_else(|| SafeTravelsError::validation("coordinate", format!("expected 'lat,lon', got '{s}'")))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<f64>()
                .map_err(|e| SafeTravelsError::validation("coordinate", format!("'{v}': {e}")))
        };
        let coord = Coordinate::new(parse(lat)?, parse(lon)?);
        coord.validate()?;
        Ok(coord)
    }
}

pub fn haversine_miles(a: &Coordinate, b: &Coordinate) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MILES * h.sqrt().min(1.0).asin()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub const fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        Self { min_lat, max_lat, min_lon, max_lon }
    }

    pub fn contains(&self, c: &Coordinate) -> bool {
        c.lat >= self.min_lat && c.lat <= self.max_lat && c.lon >= self.min_lon && c.lon <= self.max_lon
    }

    pub fn center(&self) -> Coordinate {
        Coordinate::new((self.min_lat + self.max_lat) / 2.0, (self.min_lon + self.max_lon) / 2.0)
    }
}

/// Named high-theft area with its own multiplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    pub name: String,
    pub bounds: BoundingBox,
    #[serde(default = "default_hotspot_multiplier")]
    pub multiplier: f64,
}

pub const HOTSPOT_MULTIPLIER: f64 = 1.5;

fn default_hotspot_multiplier() -> f64 {
    HOTSPOT_MULTIPLIER
}

pub fn default_hotspots() -> Vec<Hotspot> {
    vec![
        Hotspot {
            name: "I-10 Corridor LA-Phoenix".into(),
            bounds: BoundingBox::new(32.0, 34.5, -118.5, -111.0),
            multiplier: HOTSPOT_MULTIPLIER,
        },
        Hotspot {
            name: "I-95 Miami Corridor".into(),
            bounds: BoundingBox::new(25.0, 28.0, -81.0, -79.5),
            multiplier: HOTSPOT_MULTIPLIER,
        },
        Hotspot {
            name: "Chicago South Side".into(),
            bounds: BoundingBox::new(41.6, 42.0, -87.9, -87.5),
            multiplier: HOTSPOT_MULTIPLIER,
        },
    ]
}

pub fn hotspot_at<'a>(hotspots: &'a [Hotspot], c: &Coordinate) -> Option<&'a Hotspot> {
    hotspots.iter().find(|h| h.bounds.contains(c))
}

// Coarse state boxes, checked in order. A state may span several boxes; the first match wins,
// so narrower states precede the Texas boxes that border them.
const STATE_BOUNDS: [(&str, BoundingBox); 11] = [
    ("CA", BoundingBox::new(32.5, 42.0, -124.5, -114.0)),
    ("AZ", BoundingBox::new(31.3, 37.0, -114.8, -109.05)),
    // El Paso and the trans-Pecos, south of the New Mexico line
    ("TX", BoundingBox::new(28.9, 32.0, -106.65, -103.05)),
    ("NM", BoundingBox::new(31.3, 37.0, -109.05, -103.05)),
    ("OK", BoundingBox::new(33.9, 37.0, -100.0, -94.45)),
    ("OK", BoundingBox::new(36.5, 37.0, -103.05, -100.0)),
    ("TX", BoundingBox::new(34.0, 36.5, -103.05, -100.0)),
    ("TX", BoundingBox::new(25.8, 34.0, -103.05, -94.05)),
    ("FL", BoundingBox::new(24.5, 31.0, -87.6, -80.0)),
    ("IL", BoundingBox::new(36.9, 42.5, -91.5, -87.0)),
    ("GA", BoundingBox::new(30.3, 35.0, -85.6, -80.8)),
];

/// Two-letter state code for a coordinate, if covered.
pub fn state_for(c: &Coordinate) -> Option<&'static str> {
    STATE_BOUNDS
        .iter()
        .find(|(_, bounds)| bounds.contains(c))
        .map(|(code, _)| *code)
}
