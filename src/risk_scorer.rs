use crate::risk_factors::{default_table, FactorCategory, RiskContext, RiskFactorTable};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

pub const MIN_RISK: f64 = 1.0;
pub const MAX_RISK: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score <= 3.0 {
            RiskLevel::Low
        } else if score <= 5.0 {
            RiskLevel::Moderate
        } else if score <= 7.0 {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One multiplier that contributed to a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedFactor {
    pub factor: String,
    pub value: String,
    pub multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    pub score: f64,
    /// Unclamped product of the applied multipliers.
    pub raw: f64,
    pub level: RiskLevel,
    pub factors: Vec<AppliedFactor>,
}

pub fn clamp_risk(value: f64) -> f64 {
    value.clamp(MIN_RISK, MAX_RISK)
}

impl RiskScore {
    fn from_raw(raw: f64, factors: Vec<AppliedFactor>) -> Self {
        let score = clamp_risk(raw);
        Self {
            score,
            raw,
            level: RiskLevel::from_score(score),
            factors,
        }
    }

    /// New score with one more multiplier applied to the clamped score, then re-clamped.
    pub fn with_multiplier(&self, factor: &str, value: &str, multiplier: f64) -> Self {
        let mut factors = self.factors.clone();
        factors.push(AppliedFactor {
            factor: factor.to_string(),
            value: value.to_string(),
            multiplier,
        });
        Self::from_raw(self.score * multiplier, factors)
    }

    pub fn multiplier_for(&self, factor: &str) -> Option<f64> {
        self.factors
            .iter()
            .find(|f| f.factor == factor)
            .map(|f| f.multiplier)
    }
}

/// Multiplicative single-point scorer over a shared factor table.
#[derive(Debug, Clone)]
pub struct RiskScorer {
    table: Arc<RiskFactorTable>,
}

impl Default for RiskScorer {
    fn default() -> Self {
        Self::new(default_table())
    }
}

impl RiskScorer {
    pub fn new(table: Arc<RiskFactorTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &RiskFactorTable {
        &self.table
    }

    pub fn shared_table(&self) -> Arc<RiskFactorTable> {
        Arc::clone(&self.table)
    }

    pub fn score(&self, context: &RiskContext) -> RiskScore {
        let mut raw = MIN_RISK;
        let mut factors = Vec::new();

        for (category, value) in context.categorical() {
            match self.table.lookup(category, value) {
                Some(multiplier) => {
                    raw *= multiplier;
                    factors.push(AppliedFactor {
                        factor: category.as_str().to_string(),
                        value: category.normalize(value),
                        multiplier,
                    });
                }
                None => debug!("no multiplier for {}={}, treating as neutral", category, value),
            }
        }

        if let Some(value_usd) = context.cargo_value_usd {
            let (label, multiplier) = self.table.cargo_value_band(value_usd);
            raw *= multiplier;
            factors.push(AppliedFactor {
                factor: FactorCategory::CargoValue.as_str().to_string(),
                value: label,
                multiplier,
            });
        }

        RiskScore::from_raw(raw, factors)
    }

    /// Human-readable warnings for the factors that dominate a score.
    pub fn warnings(&self, score: &RiskScore) -> Vec<String> {
        let get = |category: FactorCategory| score.multiplier_for(category.as_str()).unwrap_or(1.0);
        let mut warnings = Vec::new();

        if get(FactorCategory::Event) >= 1.5 {
            warnings.push("Active civil or emergency event in the area. Avoid stopping.".to_string());
        }
        if get(FactorCategory::TimeOfDay) >= 1.5 && get(FactorCategory::CargoValue) >= 1.25 {
            warnings.push("High-value cargo at night. Use secured parking only.".to_string());
        }
        if get(FactorCategory::Weather) >= 1.2 {
            warnings.push("Adverse weather reduces visibility and response times.".to_string());
        }
        if get(FactorCategory::Traffic) >= 1.3 {
            warnings.push("Heavy congestion. Stationary trucks are exposed to theft.".to_string());
        }
        if get(FactorCategory::LocationType) >= 1.4 {
            warnings.push("Unsecured location type. Do not leave the load unattended.".to_string());
        }
        if get(FactorCategory::State) >= 1.2 {
            warnings.push("Region has elevated cargo theft rates.".to_string());
        }
        if get(FactorCategory::Commodity) >= 1.4 {
            warnings.push("Commodity is a frequent theft target.".to_string());
        }
        warnings
    }
}
