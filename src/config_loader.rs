use crate::errors::{SafeTravelsError, SafeTravelsResult};
use crate::geo::{default_hotspots, Hotspot};
use crate::risk_factors::{default_table, RiskFactorTable};
use crate::route_scanner::{DEFAULT_MAX_SEGMENTS, DEFAULT_SEGMENT_MILES};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "safetravels.toml";
pub const ENV_PREFIX: &str = "SAFETRAVELS_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub segment_miles: f64,
    pub max_segments: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            segment_miles: DEFAULT_SEGMENT_MILES,
            max_segments: DEFAULT_MAX_SEGMENTS,
        }
    }
}

/// Blend weights for ranking candidate routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub safety_weight: f64,
    pub time_weight: f64,
    pub distance_weight: f64,
    pub average_speed_mph: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            safety_weight: 0.60,
            time_weight: 0.25,
            distance_weight: 0.15,
            average_speed_mph: 55.0,
        }
    }
}

/// Confidence heuristics and loop bounds for the review workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    pub max_revisions: u32,
    pub analyst_base_confidence: f64,
    pub source_boost: f64,
    pub max_counted_sources: usize,
    pub claim_boost: f64,
    pub red_zone_penalty: f64,
    pub analyst_min_confidence: f64,
    pub analyst_max_confidence: f64,
    pub critic_base_confidence: f64,
    pub failed_check_penalty: f64,
    pub critic_min_confidence: f64,
    pub critic_max_confidence: f64,
    pub escalation_threshold: f64,
    /// Citation check applies only above this many claims
    pub citation_claim_threshold: usize,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            max_revisions: 3,
            analyst_base_confidence: 0.70,
            source_boost: 0.05,
            max_counted_sources: 5,
            claim_boost: 0.02,
            red_zone_penalty: 0.10,
            analyst_min_confidence: 0.50,
            analyst_max_confidence: 0.95,
            critic_base_confidence: 0.80,
            failed_check_penalty: 0.15,
            critic_min_confidence: 0.40,
            critic_max_confidence: 0.95,
            escalation_threshold: 0.65,
            citation_claim_threshold: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaboratorConfig {
    pub timeout_ms: u64,
    pub retrieval_k: usize,
    pub llm_url: String,
    pub llm_model: String,
    pub llm_api_key: Option<String>,
    pub llm_max_tokens: u32,
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            retrieval_k: 5,
            llm_url: "https://api.openai.com/v1/chat/completions".into(),
            llm_model: "gpt-4o-mini".into(),
            llm_api_key: None,
            llm_max_tokens: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "data/safetravels".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub factor_table_path: Option<String>,
    pub hotspots: Vec<Hotspot>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            factor_table_path: None,
            hotspots: default_hotspots(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafeTravelsConfig {
    pub log_level: String,
    pub scanner: ScannerConfig,
    pub planner: PlannerConfig,
    pub review: ReviewConfig,
    pub collaborators: CollaboratorConfig,
    pub storage: StorageConfig,
    pub risk: RiskConfig,
}

impl Default for SafeTravelsConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            scanner: ScannerConfig::default(),
            planner: PlannerConfig::default(),
            review: ReviewConfig::default(),
            collaborators: CollaboratorConfig::default(),
            storage: StorageConfig::default(),
            risk: RiskConfig::default(),
        }
    }
}

impl SafeTravelsConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.collaborators.timeout_ms)
    }

    /// Factor table named by the config, or the built-in one.
    pub fn load_factor_table(&self) -> SafeTravelsResult<Arc<RiskFactorTable>> {
        match &self.risk.factor_table_path {
            Some(path) => Ok(Arc::new(RiskFactorTable::from_toml_file(path)?)),
            None => Ok(default_table()),
        }
    }

    pub fn validate(&self) -> SafeTravelsResult<()> {
        if !(self.scanner.segment_miles.is_finite() && self.scanner.segment_miles > 0.0) {
            return Err(SafeTravelsError::config("scanner.segment_miles must be positive"));
        }
        if self.scanner.max_segments == 0 {
            return Err(SafeTravelsError::config("scanner.max_segments must be at least 1"));
        }

        let p = &self.planner;
        if [p.safety_weight, p.time_weight, p.distance_weight].iter().any(|w| *w < 0.0) {
            return Err(SafeTravelsError::config("planner weights must not be negative"));
        }
        let sum = p.safety_weight + p.time_weight + p.distance_weight;
        if (sum - 1.0).abs() > 1e-3 {
            return Err(SafeTravelsError::config(format!(
                "planner weights must sum to 1.0, got {sum:.3}"
            )));
        }
        if p.average_speed_mph <= 0.0 {
            return Err(SafeTravelsError::config("planner.average_speed_mph must be positive"));
        }

        let r = &self.review;
        if r.analyst_min_confidence > r.analyst_max_confidence
            || r.critic_min_confidence > r.critic_max_confidence
        {
            return Err(SafeTravelsError::config("review confidence bounds are inverted"));
        }
        let bounds = [
            r.analyst_min_confidence,
            r.analyst_max_confidence,
            r.critic_min_confidence,
            r.critic_max_confidence,
        ];
        if bounds.iter().any(|b| !(0.0..=1.0).contains(b)) {
            return Err(SafeTravelsError::config("review confidence bounds must lie in [0, 1]"));
        }

        if self.collaborators.timeout_ms == 0 {
            return Err(SafeTravelsError::config("collaborators.timeout_ms must be positive"));
        }
        if self.collaborators.retrieval_k == 0 {
            return Err(SafeTravelsError::config("collaborators.retrieval_k must be at least 1"));
        }

        for hotspot in &self.risk.hotspots {
            if hotspot.multiplier <= 0.0 {
                return Err(SafeTravelsError::config(format!(
                    "hotspot '{}' multiplier must be positive",
                    hotspot.name
                )));
            }
        }
        Ok(())
    }
}

/// Defaults, then the TOML file, then `SAFETRAVELS_` environment variables
/// (nested keys separated by `__`, e.g. `SAFETRAVELS_REVIEW__MAX_REVISIONS`).
pub fn load_config(path: Option<&str>) -> SafeTravelsResult<SafeTravelsConfig> {
    let figment = Figment::from(Serialized::defaults(SafeTravelsConfig::default()))
        .merge(Toml::file(path.unwrap_or(DEFAULT_CONFIG_FILE)))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: SafeTravelsConfig = figment.extract()?;
    config.validate()?;
    Ok(config)
}
