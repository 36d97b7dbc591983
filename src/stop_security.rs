//! Physical security scoring for candidate stops.

use crate::collaborators::DriverPreferences;
use crate::geo::Coordinate;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

pub const MAX_SECURITY: i32 = 100;
pub const TIER_1_MIN: u8 = 85;
pub const TIER_2_MIN: u8 = 65;
pub const TIER_3_MIN: u8 = 45;

// Ranking bias only; never applied to the security score itself.
const DISLIKED_FEATURE_PENALTY: i32 = 10;
const PREFERRED_BRAND_BONUS: i32 = 5;

lazy_static! {
    static ref MAJOR_BRANDS: Vec<&'static str> = vec![
        "pilot", "love's", "flying j", "ta", "petro", "sapp", "buc-ee", "quiktrip",
    ];
}

fn strip_possessive(word: &str) -> &str {
    word.strip_suffix("'s").unwrap_or(word)
}

/// Whether a brand or stop name belongs to a major truck stop chain.
pub fn is_major_brand(name: &str) -> bool {
    let lowered = name.to_lowercase();
    MAJOR_BRANDS.iter().any(|brand| {
        lowered
            .split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '-'))
            .any(|word| strip_possessive(word) == strip_possessive(brand))
            || (brand.contains(' ') && lowered.contains(brand))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopFeature {
    Gated,
    Guarded,
    Cctv,
    WellLit,
    NoTheftHistory,
    LowRiskState,
    HighwayAccess,
    NearbyPolice,
    MajorBrand,
    #[serde(rename = "staffed_24_7")]
    Staffed24x7,
    HighRating,
    SingleExit,
    PoorLighting,
    Isolated,
    HighCrimeState,
}

impl StopFeature {
    pub const ALL: [StopFeature; 15] = [
        StopFeature::Gated,
        StopFeature::Guarded,
        StopFeature::Cctv,
        StopFeature::WellLit,
        StopFeature::NoTheftHistory,
        StopFeature::LowRiskState,
        StopFeature::HighwayAccess,
        StopFeature::NearbyPolice,
        StopFeature::MajorBrand,
        StopFeature::Staffed24x7,
        StopFeature::HighRating,
        StopFeature::SingleExit,
        StopFeature::PoorLighting,
        StopFeature::Isolated,
        StopFeature::HighCrimeState,
    ];

    pub fn points(&self) -> i32 {
        match self {
            StopFeature::Gated => 18,
            StopFeature::Guarded => 15,
            StopFeature::Cctv => 8,
            StopFeature::WellLit => 4,
            StopFeature::NoTheftHistory => 18,
            StopFeature::LowRiskState => 8,
            StopFeature::HighwayAccess => 6,
            StopFeature::NearbyPolice => 3,
            StopFeature::MajorBrand => 8,
            StopFeature::Staffed24x7 => 7,
            StopFeature::HighRating => 5,
            StopFeature::SingleExit => -8,
            StopFeature::PoorLighting => -6,
            StopFeature::Isolated => -5,
            StopFeature::HighCrimeState => -5,
        }
    }

    pub fn is_risk(&self) -> bool {
        self.points() < 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopFeatureChecklist {
    pub gated: bool,
    pub guarded: bool,
    pub cctv: bool,
    pub well_lit: bool,
    pub no_theft_history: bool,
    pub low_risk_state: bool,
    pub highway_access: bool,
    pub nearby_police: bool,
    pub major_brand: bool,
    pub staffed_24_7: bool,
    pub high_rating: bool,
    pub single_exit: bool,
    pub poor_lighting: bool,
    pub isolated: bool,
    pub high_crime_state: bool,
}

impl StopFeatureChecklist {
    pub fn has(&self, feature: StopFeature) -> bool {
        match feature {
            StopFeature::Gated => self.gated,
            StopFeature::Guarded => self.guarded,
            StopFeature::Cctv => self.cctv,
            StopFeature::WellLit => self.well_lit,
            StopFeature::NoTheftHistory => self.no_theft_history,
            StopFeature::LowRiskState => self.low_risk_state,
            StopFeature::HighwayAccess => self.highway_access,
            StopFeature::NearbyPolice => self.nearby_police,
            StopFeature::MajorBrand => self.major_brand,
            StopFeature::Staffed24x7 => self.staffed_24_7,
            StopFeature::HighRating => self.high_rating,
            StopFeature::SingleExit => self.single_exit,
            StopFeature::PoorLighting => self.poor_lighting,
            StopFeature::Isolated => self.isolated,
            StopFeature::HighCrimeState => self.high_crime_state,
        }
    }

    pub fn set(mut self, feature: StopFeature, present: bool) -> Self {
        let slot = match feature {
            StopFeature::Gated => &mut self.gated,
            StopFeature::Guarded => &mut self.guarded,
            StopFeature::Cctv => &mut self.cctv,
            StopFeature::WellLit => &mut self.well_lit,
            StopFeature::NoTheftHistory => &mut self.no_theft_history,
            StopFeature::LowRiskState => &mut self.low_risk_state,
            StopFeature::HighwayAccess => &mut self.highway_access,
            StopFeature::NearbyPolice => &mut self.nearby_police,
            StopFeature::MajorBrand => &mut self.major_brand,
            StopFeature::Staffed24x7 => &mut self.staffed_24_7,
            StopFeature::HighRating => &mut self.high_rating,
            StopFeature::SingleExit => &mut self.single_exit,
            StopFeature::PoorLighting => &mut self.poor_lighting,
            StopFeature::Isolated => &mut self.isolated,
            StopFeature::HighCrimeState => &mut self.high_crime_state,
        };
        *slot = present;
        self
    }

    pub fn from_features(features: &[StopFeature]) -> Self {
        features
            .iter()
            .fold(Self::default(), |checklist, f| checklist.set(*f, true))
    }

    pub fn present(&self) -> Vec<StopFeature> {
        StopFeature::ALL.iter().copied().filter(|f| self.has(*f)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "1")]
    Tier1,
    #[serde(rename = "2")]
    Tier2,
    #[serde(rename = "3")]
    Tier3,
    #[serde(rename = "avoid")]
    Avoid,
}

impl Tier {
    pub fn from_score(score: u8) -> Self {
        if score >= TIER_1_MIN {
            Tier::Tier1
        } else if score >= TIER_2_MIN {
            Tier::Tier2
        } else if score >= TIER_3_MIN {
            Tier::Tier3
        } else {
            Tier::Avoid
        }
    }

    /// True when this tier is at least as secure as `minimum`.
    pub fn meets(&self, minimum: Tier) -> bool {
        *self <= minimum
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Tier::Tier1 => "tier 1",
            Tier::Tier2 => "tier 2",
            Tier::Tier3 => "tier 3",
            Tier::Avoid => "avoid",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityScore {
    pub score: u8,
    pub tier: Tier,
    pub contributions: Vec<(StopFeature, i32)>,
}

/// Additive point model over a feature checklist.
#[derive(Debug, Clone, Copy, Default)]
pub struct StopSecurityScorer;

impl StopSecurityScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, checklist: &StopFeatureChecklist) -> SecurityScore {
        let contributions: Vec<(StopFeature, i32)> = checklist
            .present()
            .into_iter()
            .map(|f| (f, f.points()))
            .collect();
        let raw: i32 = contributions.iter().map(|(_, p)| p).sum();
        let score = raw.clamp(0, MAX_SECURITY) as u8;
        SecurityScore {
            score,
            tier: Tier::from_score(score),
            contributions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopCandidate {
    pub stop_id: String,
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    pub coordinate: Coordinate,
    #[serde(default)]
    pub checklist: StopFeatureChecklist,
    /// Average driver rating, 1-5
    #[serde(default)]
    pub driver_rating: Option<f64>,
}

impl StopCandidate {
    /// Checklist with brand and rating derived features filled in.
    pub fn effective_checklist(&self) -> StopFeatureChecklist {
        let mut checklist = self.checklist.clone();
        let branded = self
            .brand
            .as_deref()
            .map(is_major_brand)
            .unwrap_or(false)
            || is_major_brand(&self.name);
        checklist.major_brand |= branded;
        checklist.high_rating |= self.driver_rating.map(|r| r >= 4.0).unwrap_or(false);
        checklist
    }

    pub fn security(&self, scorer: &StopSecurityScorer) -> SecurityScore {
        scorer.score(&self.effective_checklist())
    }

    fn matches_brand(&self, brand: &str) -> bool {
        let wanted = brand.to_lowercase();
        self.brand
            .as_deref()
            .map(|b| b.to_lowercase().contains(&wanted))
            .unwrap_or(false)
            || self.name.to_lowercase().contains(&wanted)
    }
}

/// Why the driver is stopping, which sets the minimum acceptable tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestNeed {
    Overnight,
    QuickBreak,
    Emergency,
}

impl RestNeed {
    pub fn minimum_tier(&self) -> Tier {
        match self {
            RestNeed::Overnight => Tier::Tier2,
            RestNeed::QuickBreak | RestNeed::Emergency => Tier::Tier3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedStop {
    pub candidate: StopCandidate,
    pub security: SecurityScore,
    pub preference_adjustment: i32,
    pub ranking_score: i32,
}

/// Filters stops by rest need and driver history, then orders by security
/// score biased by driver preferences.
pub fn rank_stops(
    scorer: &StopSecurityScorer,
    candidates: &[StopCandidate],
    preferences: Option<&DriverPreferences>,
    need: RestNeed,
) -> Vec<RankedStop> {
    let minimum = need.minimum_tier();
    let mut ranked: Vec<RankedStop> = candidates
        .iter()
        .filter(|c| {
            preferences
                .map(|p| !p.unsafe_stop_ids.iter().any(|id| id == &c.stop_id))
                .unwrap_or(true)
        })
        .filter_map(|c| {
            let security = c.security(scorer);
            if !security.tier.meets(minimum) {
                return None;
            }
            let checklist = c.effective_checklist();
            let adjustment = preferences
                .map(|p| {
                    let disliked = p
                        .disliked_stop_features
                        .iter()
                        .filter(|f| checklist.has(**f))
                        .count() as i32;
                    let preferred = p.preferred_brands.iter().any(|b| c.matches_brand(b));
                    -disliked * DISLIKED_FEATURE_PENALTY
                        + if preferred { PREFERRED_BRAND_BONUS } else { 0 }
                })
                .unwrap_or(0);
            Some(RankedStop {
                candidate: c.clone(),
                ranking_score: security.score as i32 + adjustment,
                security,
                preference_adjustment: adjustment,
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.ranking_score
            .cmp(&a.ranking_score)
            .then_with(|| a.candidate.stop_id.cmp(&b.candidate.stop_id))
    });
    ranked
}

/// Emergency finder: nearest stop within `radius_miles` that is not `avoid`.
pub fn nearest_acceptable(
    scorer: &StopSecurityScorer,
    position: &Coordinate,
    candidates: &[StopCandidate],
    radius_miles: f64,
) -> Option<(StopCandidate, SecurityScore, f64)> {
    candidates
        .iter()
        .map(|c| (c, c.security(scorer), position.distance_to(&c.coordinate)))
        .filter(|(_, security, distance)| security.tier != Tier::Avoid && *distance <= radius_miles)
        .min_by(|a, b| a.2.total_cmp(&b.2).then_with(|| b.1.score.cmp(&a.1.score)))
        .map(|(c, security, distance)| (c.clone(), security, distance))
}
