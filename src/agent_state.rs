//! State threaded through the review workflow.
//!
//! Every transition consumes an `AgentState` and returns a new one. The
//! reasoning log only grows, and the revision counter can never pass the
//! ceiling fixed at construction.

use crate::collaborators::DriverPreferences;
use crate::errors::{SafeTravelsError, SafeTravelsResult};
use crate::risk_factors::RiskContext;
use crate::route_scanner::RouteOption;
use crate::stop_security::{RankedStop, StopCandidate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    Planning,
    Analyzing,
    Critiquing,
    Finalized,
}

impl WorkflowStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStage::Planning => "planning",
            WorkflowStage::Analyzing => "analyzing",
            WorkflowStage::Critiquing => "critiquing",
            WorkflowStage::Finalized => "finalized",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pending,
    Approved,
    NeedsRevision,
    /// Ceiling reached without approval; result is best-effort
    ForcedApproved,
}

impl Verdict {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Verdict::Approved | Verdict::ForcedApproved)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Planner,
    Analyst,
    Critic,
    Workflow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningEntry {
    pub role: AgentRole,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub origin: String,
    pub destination: String,
    pub cargo: RiskContext,
    #[serde(default)]
    pub driver_id: Option<String>,
    #[serde(default)]
    pub stop_candidates: Vec<StopCandidate>,
}

impl ReviewRequest {
    pub fn new(origin: impl Into<String>, destination: impl Into<String>, cargo: RiskContext) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            cargo,
            driver_id: None,
            stop_candidates: Vec::new(),
        }
    }

    pub fn with_driver(mut self, driver_id: impl Into<String>) -> Self {
        self.driver_id = Some(driver_id.into());
        self
    }

    pub fn with_stop_candidates(mut self, stops: Vec<StopCandidate>) -> Self {
        self.stop_candidates = stops;
        self
    }
}

/// A scanned route with its position in the planner's ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedRoute {
    pub rank: usize,
    pub route: RouteOption,
    pub blended_score: f64,
    pub safety_component: f64,
    pub time_component: f64,
    pub distance_component: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub statement: String,
    pub source: Option<String>,
    pub verifiable: bool,
}

impl Claim {
    pub fn sourced(statement: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            source: Some(source.into()),
            verifiable: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub selected_route_id: String,
    pub claims: Vec<Claim>,
    pub risk_factors: Vec<String>,
    pub recommendations: Vec<String>,
    pub rationale: String,
    pub confidence: f64,
    pub documents_used: usize,
    pub recommended_stops: Vec<RankedStop>,
    /// Critique issues this analysis responded to
    pub addressed_feedback: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticReview {
    pub verdict: Verdict,
    pub citation_check: bool,
    pub logic_check: bool,
    pub confidence: f64,
    pub escalation_advised: bool,
    pub issues: Vec<String>,
    pub feedback: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub request_id: Uuid,
    pub request: ReviewRequest,
    pub stage: WorkflowStage,
    pub ranked_routes: Vec<RankedRoute>,
    pub current_best: Option<RouteOption>,
    pub analysis: Option<Analysis>,
    pub review: Option<CriticReview>,
    pub preferences: Option<DriverPreferences>,
    pub verdict: Verdict,
    pub best_effort: bool,
    /// Degraded collaborators noted during the run
    pub degraded: Vec<String>,
    revision_count: u32,
    revision_ceiling: u32,
    reasoning: Vec<ReasoningEntry>,
}

impl AgentState {
    pub fn new(request: ReviewRequest, revision_ceiling: u32) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            request,
            stage: WorkflowStage::Planning,
            ranked_routes: Vec::new(),
            current_best: None,
            analysis: None,
            review: None,
            preferences: None,
            verdict: Verdict::Pending,
            best_effort: false,
            degraded: Vec::new(),
            revision_count: 0,
            revision_ceiling,
            reasoning: Vec::new(),
        }
    }

    pub fn revision_count(&self) -> u32 {
        self.revision_count
    }

    pub fn revision_ceiling(&self) -> u32 {
        self.revision_ceiling
    }

    pub fn ceiling_reached(&self) -> bool {
        self.revision_count >= self.revision_ceiling
    }

    pub fn reasoning(&self) -> &[ReasoningEntry] {
        &self.reasoning
    }

    pub fn with_reasoning(mut self, role: AgentRole, summary: impl Into<String>) -> Self {
        self.reasoning.push(ReasoningEntry {
            role,
            timestamp: Utc::now(),
            summary: summary.into(),
        });
        self
    }

    pub fn with_stage(mut self, stage: WorkflowStage) -> Self {
        self.stage = stage;
        self
    }

    pub fn with_preferences(mut self, preferences: DriverPreferences) -> Self {
        self.preferences = Some(preferences);
        self
    }

    pub fn with_ranking(mut self, ranked: Vec<RankedRoute>) -> Self {
        self.current_best = ranked.first().map(|r| r.route.clone());
        self.ranked_routes = ranked;
        self
    }

    pub fn with_analysis(mut self, analysis: Analysis) -> Self {
        self.current_best = self
            .ranked_routes
            .iter()
            .find(|r| r.route.route_id == analysis.selected_route_id)
            .map(|r| r.route.clone())
            .or(self.current_best);
        self.analysis = Some(analysis);
        self
    }

    pub fn with_review(mut self, review: CriticReview) -> Self {
        self.verdict = review.verdict;
        self.review = Some(review);
        self
    }

    pub fn with_degradation(mut self, note: impl Into<String>) -> Self {
        self.degraded.push(note.into());
        self
    }

    /// Counts one revision. Fails rather than exceed the ceiling.
    pub fn increment_revision(mut self) -> SafeTravelsResult<Self> {
        if self.revision_count >= self.revision_ceiling {
            return Err(SafeTravelsError::internal(format!(
                "revision ceiling {} already reached",
                self.revision_ceiling
            )));
        }
        self.revision_count += 1;
        self.verdict = Verdict::NeedsRevision;
        Ok(self)
    }

    /// Terminal transition when the ceiling stops the loop.
    pub fn force_approval(mut self) -> Self {
        self.verdict = Verdict::ForcedApproved;
        self.best_effort = true;
        self
    }

    /// sha256 over the ordered reasoning log.
    pub fn transcript_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.request_id.as_bytes());
        for entry in &self.reasoning {
            hasher.update(entry.timestamp.to_rfc3339().as_bytes());
            hasher.update(format!("{:?}", entry.role).as_bytes());
            hasher.update(entry.summary.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ReviewRequest {
        ReviewRequest::new("Los Angeles, CA", "Phoenix, AZ", RiskContext::new())
    }

    #[test]
    fn reasoning_log_is_append_only_across_transitions() {
        let state = AgentState::new(request(), 3)
            .with_reasoning(AgentRole::Planner, "first")
            .with_reasoning(AgentRole::Analyst, "second");
        let before = state.reasoning().to_vec();
        let state = state.with_reasoning(AgentRole::Critic, "third");
        assert_eq!(&state.reasoning()[..2], &before[..]);
        assert_eq!(state.reasoning().len(), 3);
        assert_eq!(state.reasoning()[2].role, AgentRole::Critic);
    }

    #[test]
    fn revision_counter_cannot_pass_ceiling() {
        let mut state = AgentState::new(request(), 2);
        state = state.increment_revision().unwrap();
        state = state.increment_revision().unwrap();
        assert!(state.ceiling_reached());
        assert!(state.clone().increment_revision().is_err());
        let forced = state.force_approval();
        assert_eq!(forced.verdict, Verdict::ForcedApproved);
        assert!(forced.best_effort);
        assert_eq!(forced.revision_count(), 2);
    }

    #[test]
    fn transcript_hash_tracks_log() {
        let state = AgentState::new(request(), 3).with_reasoning(AgentRole::Planner, "ranked 2 routes");
        let h1 = state.transcript_hash();
        assert_eq!(h1, state.transcript_hash());
        assert_eq!(h1.len(), 64);
        let h2 = state.with_reasoning(AgentRole::Analyst, "selected route_B").transcript_hash();
        assert_ne!(h1, h2);
    }
}
