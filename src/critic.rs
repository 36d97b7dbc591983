//! Critique step. A `Critic` inspects an analysis against the ranked routes
//! and returns a verdict; the workflow only reads that verdict.

use crate::agent_state::{AgentRole, AgentState, Analysis, CriticReview, RankedRoute, Verdict, WorkflowStage};
use crate::config_loader::ReviewConfig;
use crate::errors::{SafeTravelsError, SafeTravelsResult};
use tracing::{debug, info};

const GENERIC_SOURCES: [&str; 4] = ["", "unknown", "none", "n/a"];
const MAX_FEEDBACK_ISSUES: usize = 5;
const SCORE_EPSILON: f64 = 1e-9;

/// True when `source` names something a reader could look up.
pub fn is_concrete_source(source: Option<&str>) -> bool {
    match source {
        Some(s) => {
            let s = s.trim().to_lowercase();
            !GENERIC_SOURCES.contains(&s.as_str())
        }
        None => false,
    }
}

pub trait Critic: Send + Sync {
    fn critique(&self, analysis: &Analysis, ranked: &[RankedRoute]) -> CriticReview;
}

/// Citation and logic checks with configured confidence heuristics.
#[derive(Debug, Clone, Default)]
pub struct RouteCritic {
    config: ReviewConfig,
}

impl RouteCritic {
    pub fn new(config: ReviewConfig) -> Self {
        Self { config }
    }

    fn citation_issues(&self, analysis: &Analysis) -> Vec<String> {
        if analysis.claims.len() <= self.config.citation_claim_threshold {
            return Vec::new();
        }
        analysis
            .claims
            .iter()
            .filter(|c| !is_concrete_source(c.source.as_deref()))
            .map(|c| format!("Claim lacks a concrete source: \"{}\"", c.statement))
            .collect()
    }

    fn logic_issues(&self, analysis: &Analysis, ranked: &[RankedRoute]) -> Vec<String> {
        let Some(selected) = ranked
            .iter()
            .find(|r| r.route.route_id == analysis.selected_route_id)
        else {
            return vec![format!(
                "Selected route {} is not among the ranked routes",
                analysis.selected_route_id
            )];
        };

        let lowest = ranked
            .iter()
            .min_by(|a, b| a.route.composite_score.total_cmp(&b.route.composite_score));
        match lowest {
            Some(best) if selected.route.composite_score > best.route.composite_score + SCORE_EPSILON => {
                vec![format!(
                    "Selected {} ({:.1}/10) while {} scores lower ({:.1}/10)",
                    selected.route.route_id,
                    selected.route.composite_score,
                    best.route.route_id,
                    best.route.composite_score
                )]
            }
            _ => Vec::new(),
        }
    }

    pub fn confidence(&self, failed_checks: usize) -> f64 {
        let c = &self.config;
        (c.critic_base_confidence - c.failed_check_penalty * failed_checks as f64)
            .clamp(c.critic_min_confidence, c.critic_max_confidence)
    }
}

impl Critic for RouteCritic {
    fn critique(&self, analysis: &Analysis, ranked: &[RankedRoute]) -> CriticReview {
        let citation = self.citation_issues(analysis);
        let logic = self.logic_issues(analysis, ranked);
        let citation_check = citation.is_empty();
        let logic_check = logic.is_empty();
        let failed = [citation_check, logic_check].iter().filter(|ok| !**ok).count();

        let confidence = self.confidence(failed);
        let mut issues: Vec<String> = logic.into_iter().chain(citation).collect();
        issues.truncate(MAX_FEEDBACK_ISSUES);

        let verdict = if failed == 0 {
            Verdict::Approved
        } else {
            Verdict::NeedsRevision
        };
        let feedback = if issues.is_empty() {
            "All checks passed.".to_string()
        } else {
            issues
                .iter()
                .enumerate()
                .map(|(i, issue)| format!("{}. {}", i + 1, issue))
                .collect::<Vec<_>>()
                .join("\n")
        };

        CriticReview {
            verdict,
            citation_check,
            logic_check,
            confidence,
            escalation_advised: confidence < self.config.escalation_threshold,
            issues,
            feedback,
        }
    }
}

/// Runs `critic` over the current analysis and records its verdict.
pub fn critique(state: AgentState, critic: &dyn Critic) -> SafeTravelsResult<AgentState> {
    let analysis = state
        .analysis
        .as_ref()
        .ok_or_else(|| SafeTravelsError::internal("critique requested before analysis"))?;
    let review = critic.critique(analysis, &state.ranked_routes);
    debug!("critic issues: {:?}", review.issues);
    info!(
        "critic verdict {:?} (citation {}, logic {}, confidence {:.2})",
        review.verdict, review.citation_check, review.logic_check, review.confidence
    );

    let summary = format!(
        "Verdict {:?}: citation check {}, logic check {}, confidence {:.2}{}",
        review.verdict,
        if review.citation_check { "passed" } else { "failed" },
        if review.logic_check { "passed" } else { "failed" },
        review.confidence,
        if review.escalation_advised { ", escalation advised" } else { "" }
    );
    Ok(state
        .with_stage(WorkflowStage::Critiquing)
        .with_reasoning(AgentRole::Critic, summary)
        .with_review(review))
}
