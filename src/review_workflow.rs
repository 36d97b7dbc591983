//! Bounded plan → analyze → critique loop and the released outcome.

use crate::agent_state::{AgentRole, AgentState, Claim, ReasoningEntry, ReviewRequest, Verdict, WorkflowStage};
use crate::analyst::Analyst;
use crate::collaborators::{with_timeout, Collaborators, TripOutcome};
use crate::config_loader::{PlannerConfig, ReviewConfig};
use crate::critic::{critique, Critic, RouteCritic};
use crate::errors::{SafeTravelsError, SafeTravelsResult};
use crate::planner::plan;
use crate::route_scanner::{RouteOption, RouteZoneScanner, ZoneBreakdown, ZoneSpan};
use crate::stop_security::RankedStop;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewOutcome {
    pub request_id: Uuid,
    pub route: RouteOption,
    pub rationale: String,
    pub confidence: f64,
    pub analyst_confidence: f64,
    pub critic_confidence: f64,
    pub zone_breakdown: ZoneBreakdown,
    pub zone_spans: Vec<ZoneSpan>,
    pub revisions_used: u32,
    pub verdict: Verdict,
    pub best_effort: bool,
    pub escalation_advised: bool,
    pub claims: Vec<Claim>,
    pub risk_factors: Vec<String>,
    pub recommendations: Vec<String>,
    pub recommended_stops: Vec<RankedStop>,
    pub degraded: Vec<String>,
    pub reasoning: Vec<ReasoningEntry>,
    pub transcript_hash: String,
}

/// Geometric mean of the analyst and critic confidences.
pub fn finalize_confidence(analyst: f64, critic: f64) -> f64 {
    (analyst * critic).max(0.0).sqrt()
}

pub struct ReviewWorkflow {
    scanner: RouteZoneScanner,
    planner: PlannerConfig,
    review: ReviewConfig,
    analyst: Analyst,
    critic: Arc<dyn Critic>,
    collaborators: Collaborators,
}

impl ReviewWorkflow {
    pub fn new(
        scanner: RouteZoneScanner,
        planner: PlannerConfig,
        review: ReviewConfig,
        retrieval_k: usize,
        collaborators: Collaborators,
    ) -> Self {
        let table = scanner.scorer().shared_table();
        Self {
            analyst: Analyst::new(review.clone(), retrieval_k, table),
            critic: Arc::new(RouteCritic::new(review.clone())),
            scanner,
            planner,
            review,
            collaborators,
        }
    }

    pub fn with_critic(mut self, critic: Arc<dyn Critic>) -> Self {
        self.critic = critic;
        self
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    pub async fn run(&self, request: ReviewRequest) -> SafeTravelsResult<ReviewOutcome> {
        let state = AgentState::new(request, self.review.max_revisions);
        info!(
            "review {} started: {} -> {}",
            state.request_id, state.request.origin, state.request.destination
        );

        let routing = &self.collaborators.routing;
        let call = routing.get_routes(&state.request.origin, &state.request.destination);
        let paths = with_timeout("routing", self.collaborators.call_timeout, call)
            .await
            .map_err(|err| {
                let err = match err {
                    SafeTravelsError::RoutingUnavailable { .. } => err,
                    other => SafeTravelsError::routing_unavailable(other.to_string()),
                };
                SafeTravelsError::in_stage(WorkflowStage::Planning.as_str(), err)
            })?;

        let state = self.load_preferences(state).await;
        let mut state = plan(state, &paths, &self.scanner, &self.planner)
            .map_err(|e| SafeTravelsError::in_stage(WorkflowStage::Planning.as_str(), e))?;

        loop {
            state = self
                .analyst
                .analyze(state, &self.collaborators)
                .await
                .map_err(|e| SafeTravelsError::in_stage(WorkflowStage::Analyzing.as_str(), e))?;
            state = critique(state, self.critic.as_ref())
                .map_err(|e| SafeTravelsError::in_stage(WorkflowStage::Critiquing.as_str(), e))?;

            if state.verdict != Verdict::NeedsRevision {
                break;
            }
            if state.ceiling_reached() {
                state = self.force(state);
                break;
            }
            state = state.increment_revision()?;
            if state.ceiling_reached() {
                state = self.force(state);
                break;
            }
            let note = format!(
                "Revision {}/{} requested",
                state.revision_count(),
                state.revision_ceiling()
            );
            state = state.with_reasoning(AgentRole::Workflow, note);
        }

        let request = state.request.clone();
        let outcome = self.finalize(state)?;
        self.record_outcome(&request, &outcome).await;
        Ok(outcome)
    }

    fn force(&self, state: AgentState) -> AgentState {
        warn!(
            "review {} hit the revision ceiling ({}); releasing best-effort result",
            state.request_id,
            state.revision_ceiling()
        );
        let note = format!(
            "Revision ceiling {} reached; forcing approval of best-effort result",
            state.revision_ceiling()
        );
        state.with_reasoning(AgentRole::Workflow, note).force_approval()
    }

    async fn load_preferences(&self, state: AgentState) -> AgentState {
        let (Some(store), Some(driver_id)) = (&self.collaborators.preferences, state.request.driver_id.clone()) else {
            return state;
        };
        let call = store.load_driver_preferences(&driver_id);
        match with_timeout("preferences", self.collaborators.call_timeout, call).await {
            Ok(prefs) => state.with_preferences(prefs),
            Err(err) => {
                warn!("could not load preferences for {driver_id}: {err}");
                state.with_reasoning(
                    AgentRole::Workflow,
                    format!("Driver preferences unavailable: {err}"),
                )
            }
        }
    }

    fn finalize(&self, state: AgentState) -> SafeTravelsResult<ReviewOutcome> {
        let state = state.with_stage(WorkflowStage::Finalized);
        let (Some(analysis), Some(review)) = (state.analysis.clone(), state.review.clone()) else {
            return Err(SafeTravelsError::internal("finalize reached without analysis and critique"));
        };
        let route = state
            .current_best
            .clone()
            .ok_or_else(|| SafeTravelsError::internal("finalize reached without a selected route"))?;

        let confidence = finalize_confidence(analysis.confidence, review.confidence);
        let note = format!(
            "Finalized {} as {:?} after {} revision(s), confidence {:.3}",
            route.route_id,
            state.verdict,
            state.revision_count(),
            confidence
        );
        let state = state.with_reasoning(AgentRole::Workflow, note);
        info!(
            "review {} finalized: {} ({:?}, confidence {:.3})",
            state.request_id, route.route_id, state.verdict, confidence
        );

        Ok(ReviewOutcome {
            request_id: state.request_id,
            zone_breakdown: route.zone_breakdown(),
            zone_spans: route.zone_spans(),
            rationale: analysis.rationale,
            confidence,
            analyst_confidence: analysis.confidence,
            critic_confidence: review.confidence,
            revisions_used: state.revision_count(),
            verdict: state.verdict,
            best_effort: state.best_effort,
            escalation_advised: review.escalation_advised,
            claims: analysis.claims,
            risk_factors: analysis.risk_factors,
            recommendations: analysis.recommendations,
            recommended_stops: analysis.recommended_stops,
            degraded: state.degraded.clone(),
            reasoning: state.reasoning().to_vec(),
            transcript_hash: state.transcript_hash(),
            route,
        })
    }

    async fn record_outcome(&self, request: &ReviewRequest, outcome: &ReviewOutcome) {
        let (Some(store), Some(driver_id)) = (&self.collaborators.preferences, &request.driver_id) else {
            return;
        };
        let trip = TripOutcome {
            trip_id: Uuid::new_v4().to_string(),
            driver_id: driver_id.clone(),
            recorded_at: Utc::now(),
            origin: request.origin.clone(),
            destination: request.destination.clone(),
            route_id: outcome.route.route_id.clone(),
            route_name: outcome.route.name.clone(),
            commodity: request.cargo.commodity.clone(),
            cargo_value_usd: request.cargo.cargo_value_usd,
            total_miles: outcome.route.total_miles,
            composite_score: outcome.route.composite_score,
            confidence: outcome.confidence,
            best_effort: outcome.best_effort,
        };
        let call = store.record_trip_outcome(&trip);
        if let Err(err) = with_timeout("record_trip_outcome", self.collaborators.call_timeout, call).await {
            warn!("trip outcome for {driver_id} not persisted: {err}");
        }
    }
}
