//! Analyze step: pick a route, justify it with sourced claims and compute a
//! confidence. Retrieval and synthesis are optional; when they fail the
//! numeric result still goes out with a placeholder rationale.

use crate::agent_state::{AgentRole, AgentState, Analysis, Claim, RankedRoute, WorkflowStage};
use crate::collaborators::{with_timeout, Collaborators, RetrievedDocument};
use crate::config_loader::ReviewConfig;
use crate::critic::is_concrete_source;
use crate::errors::{SafeTravelsError, SafeTravelsResult};
use crate::risk_factors::{FactorCategory, RiskContext, RiskFactorTable};
use crate::route_scanner::{RouteOption, Zone};
use crate::stop_security::{rank_stops, RestNeed, StopSecurityScorer};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const SCANNER_SOURCE: &str = "SafeTravels Route Scanner";
pub const RED_ZONE_SOURCE: &str = "Route Scanner Red Zone Detection";
pub const HOTSPOT_SOURCE: &str = "Hotspot Registry";
pub const COMMODITY_SOURCE: &str = "CargoNet Theft Statistics";

// Federal hours-of-service driving limit; longer trips need an overnight stop.
const HOS_DRIVING_MINUTES: f64 = 11.0 * 60.0;
const MAX_DOCUMENT_CLAIMS: usize = 2;
const MAX_RECOMMENDED_STOPS: usize = 3;

pub struct Analyst {
    config: ReviewConfig,
    retrieval_k: usize,
    table: Arc<RiskFactorTable>,
    stop_scorer: StopSecurityScorer,
}

impl Analyst {
    pub fn new(config: ReviewConfig, retrieval_k: usize, table: Arc<RiskFactorTable>) -> Self {
        Self {
            config,
            retrieval_k,
            table,
            stop_scorer: StopSecurityScorer::new(),
        }
    }

    /// Confidence from evidence counts, clamped to the configured band.
    pub fn confidence(&self, sources: usize, verifiable_claims: usize, red_zones: usize) -> f64 {
        let c = &self.config;
        let value = c.analyst_base_confidence
            + c.source_boost * sources.min(c.max_counted_sources) as f64
            + c.claim_boost * verifiable_claims as f64
            - c.red_zone_penalty * red_zones as f64;
        value.clamp(c.analyst_min_confidence, c.analyst_max_confidence)
    }

    pub async fn analyze(&self, state: AgentState, collaborators: &Collaborators) -> SafeTravelsResult<AgentState> {
        let mut state = state.with_stage(WorkflowStage::Analyzing);
        let selected = select_route(&state)?.clone();
        let route = &selected.route;

        let addressed = state.review.as_ref().map(|r| r.issues.clone()).unwrap_or_default();
        if state.review.is_some() {
            state = state.with_reasoning(
                AgentRole::Analyst,
                format!("Revising after critique with {} issue(s)", addressed.len()),
            );
        }
        let citation_failed = state.review.as_ref().map(|r| !r.citation_check).unwrap_or(false);

        let query = retrieval_query(&state.request.cargo, &state.request.origin, &state.request.destination, route);
        let documents = match &collaborators.retrieval {
            Some(retrieval) => {
                let call = retrieval.retrieve(&query, self.retrieval_k);
                match with_timeout("retrieval", collaborators.call_timeout, call).await {
                    Ok(docs) => {
                        debug!("retrieved {} documents", docs.len());
                        docs
                    }
                    Err(err) => {
                        let degraded = SafeTravelsError::retrieval_degraded(err.to_string());
                        warn!("{degraded}");
                        state = state
                            .with_reasoning(AgentRole::Analyst, degraded.to_string())
                            .with_degradation(degraded.to_string());
                        Vec::new()
                    }
                }
            }
            None => Vec::new(),
        };

        let mut claims = self.build_claims(route, &state.request.cargo, &documents);
        if citation_failed {
            let before = claims.len();
            claims.retain(|c| is_concrete_source(c.source.as_deref()));
            state = state.with_reasoning(
                AgentRole::Analyst,
                format!("Withdrew {} claim(s) without a concrete source", before - claims.len()),
            );
        }

        let documents_used = documents
            .iter()
            .filter(|d| is_concrete_source(Some(&d.source_label)))
            .count();
        let verifiable = claims.iter().filter(|c| c.verifiable).count();
        let red_zones = route.spans_of(Zone::Red).len();
        let confidence = self.confidence(documents_used, verifiable, red_zones);

        let risk_factors = self.risk_factors(route, &state.request.cargo);
        let mut recommendations = route.recommendations();
        recommendations.extend(self.cargo_recommendations(&state.request.cargo));
        if let Some(prefs) = &state.preferences {
            recommendations.extend(prefs.personalized_recommendations());
        }

        let need = if route.estimated_minutes > HOS_DRIVING_MINUTES {
            RestNeed::Overnight
        } else {
            RestNeed::QuickBreak
        };
        let mut recommended_stops = rank_stops(
            &self.stop_scorer,
            &state.request.stop_candidates,
            state.preferences.as_ref(),
            need,
        );
        recommended_stops.truncate(MAX_RECOMMENDED_STOPS);

        let is_top_ranked = selected.rank == 1;
        let placeholder = build_rationale(route, &claims, &risk_factors, is_top_ranked);
        let rationale = match &collaborators.synthesis {
            Some(synthesis) => {
                let prompt = build_prompt(&state.request.origin, &state.request.destination, &placeholder);
                let call = synthesis.synthesize(&prompt, &documents);
                match with_timeout("synthesis", collaborators.call_timeout, call).await {
                    Ok(text) if !text.trim().is_empty() => text,
                    Ok(_) => {
                        let degraded = SafeTravelsError::synthesis_degraded("empty response");
                        state = state
                            .with_reasoning(AgentRole::Analyst, degraded.to_string())
                            .with_degradation(degraded.to_string());
                        placeholder
                    }
                    Err(err) => {
                        let degraded = SafeTravelsError::synthesis_degraded(err.to_string());
                        warn!("{degraded}");
                        state = state
                            .with_reasoning(AgentRole::Analyst, degraded.to_string())
                            .with_degradation(degraded.to_string());
                        placeholder
                    }
                }
            }
            None => placeholder,
        };

        info!(
            "analyst selected {} with confidence {:.2} ({} claims)",
            route.route_id,
            confidence,
            claims.len()
        );
        let summary = format!(
            "Selected {} (rank {}, composite {:.1}/10) with confidence {:.2} from {} claim(s) and {} document(s)",
            route.route_id,
            selected.rank,
            route.composite_score,
            confidence,
            claims.len(),
            documents_used
        );

        let analysis = Analysis {
            selected_route_id: route.route_id.clone(),
            claims,
            risk_factors,
            recommendations,
            rationale,
            confidence,
            documents_used,
            recommended_stops,
            addressed_feedback: addressed,
        };
        Ok(state.with_reasoning(AgentRole::Analyst, summary).with_analysis(analysis))
    }

    fn is_high_value_commodity(&self, cargo: &RiskContext) -> Option<String> {
        let commodity = cargo.commodity.as_deref()?;
        let multiplier = self.table.lookup(FactorCategory::Commodity, commodity)?;
        (multiplier >= 1.4).then(|| FactorCategory::Commodity.normalize(commodity))
    }

    fn build_claims(&self, route: &RouteOption, cargo: &RiskContext, documents: &[RetrievedDocument]) -> Vec<Claim> {
        let mut claims = vec![Claim::sourced(
            format!(
                "{} has a composite risk score of {:.1}/10 ({})",
                route.route_id, route.composite_score, route.composite_level
            ),
            SCANNER_SOURCE,
        )];

        let red = route.spans_of(Zone::Red).len();
        claims.push(Claim::sourced(
            if red > 0 {
                format!("Route contains {red} red zone(s)")
            } else {
                "Route contains no red zones".to_string()
            },
            RED_ZONE_SOURCE,
        ));

        let hotspots = route.hotspots();
        claims.push(Claim::sourced(
            if hotspots.is_empty() {
                "Route avoids known theft hotspots".to_string()
            } else {
                format!("Route passes through known theft hotspots: {}", hotspots.join(", "))
            },
            HOTSPOT_SOURCE,
        ));

        if let Some(commodity) = self.is_high_value_commodity(cargo) {
            claims.push(Claim::sourced(
                format!("Cargo type ({commodity}) is a high-value theft target"),
                COMMODITY_SOURCE,
            ));
        }

        for doc in documents.iter().take(MAX_DOCUMENT_CLAIMS) {
            let preview: String = doc.text.chars().take(100).collect();
            claims.push(Claim {
                statement: format!("Supporting evidence: {preview}"),
                source: Some(doc.source_label.clone()),
                verifiable: true,
            });
        }
        claims
    }

    fn risk_factors(&self, route: &RouteOption, cargo: &RiskContext) -> Vec<String> {
        let mut factors = Vec::new();
        if route.composite_score >= 7.0 {
            factors.push(format!("Critical risk level: {:.1}/10", route.composite_score));
        } else if route.composite_score >= 5.0 {
            factors.push(format!("Elevated risk level: {:.1}/10", route.composite_score));
        }
        let red = route.spans_of(Zone::Red).len();
        if red > 0 {
            factors.push(format!("{red} red zone(s) on route"));
        }
        if !route.avoids_hotspots() {
            factors.push("Route passes through theft hotspots".to_string());
        }
        if route.total_miles > 1000.0 {
            factors.push(format!("Long haul ({:.0} mi) means extended exposure", route.total_miles));
        }
        if let Some(commodity) = self.is_high_value_commodity(cargo) {
            factors.push(format!("High-value cargo: {commodity}"));
        }
        match cargo.cargo_value_usd {
            Some(v) if v >= 500_000.0 => factors.push(format!("Very high cargo value: ${v:.0}")),
            Some(v) if v >= 100_000.0 => factors.push(format!("High cargo value: ${v:.0}")),
            _ => {}
        }
        factors
    }

    fn cargo_recommendations(&self, cargo: &RiskContext) -> Vec<String> {
        let valuable = self.is_high_value_commodity(cargo).is_some()
            || cargo.cargo_value_usd.map(|v| v >= 250_000.0).unwrap_or(false);
        if valuable {
            vec![
                "Use secured truck stops only (fenced, guarded, CCTV).".to_string(),
                "Keep tracking active and check in with dispatch regularly.".to_string(),
            ]
        } else {
            Vec::new()
        }
    }
}

/// Route to analyze given the previous critique, if any.
fn select_route(state: &AgentState) -> SafeTravelsResult<&RankedRoute> {
    let ranked = &state.ranked_routes;
    let top = ranked
        .first()
        .ok_or_else(|| SafeTravelsError::internal("analysis requested before any route was ranked"))?;

    let logic_failed = state.review.as_ref().map(|r| !r.logic_check).unwrap_or(false);
    if logic_failed {
        let lowest = ranked
            .iter()
            .min_by(|a, b| {
                a.route
                    .composite_score
                    .total_cmp(&b.route.composite_score)
                    .then_with(|| a.rank.cmp(&b.rank))
            })
            .unwrap_or(top);
        return Ok(lowest);
    }

    // keep an earlier choice that already passed the logic check
    if let Some(previous) = &state.analysis {
        if let Some(kept) = ranked.iter().find(|r| r.route.route_id == previous.selected_route_id) {
            return Ok(kept);
        }
    }
    Ok(top)
}

fn retrieval_query(cargo: &RiskContext, origin: &str, destination: &str, route: &RouteOption) -> String {
    let commodity = cargo.commodity.as_deref().unwrap_or("general freight");
    let mut query = format!("cargo theft {commodity} {origin} to {destination}");
    for hotspot in route.hotspots() {
        query.push(' ');
        query.push_str(hotspot);
    }
    query
}

fn build_prompt(origin: &str, destination: &str, findings: &str) -> String {
    format!(
        "You are a cargo security analyst. Rewrite the findings below as a short briefing \
         for a truck driver travelling from {origin} to {destination}. Keep every number \
         and every cited source.\n\n{findings}"
    )
}

fn build_rationale(route: &RouteOption, claims: &[Claim], factors: &[String], is_top_ranked: bool) -> String {
    let mut lines = vec![
        format!("Analysis summary for {} ({})", route.name, route.route_id),
        format!(
            "This route scores {:.1}/10 ({} risk) over {:.0} miles.",
            route.composite_score, route.composite_level, route.total_miles
        ),
    ];
    if !factors.is_empty() {
        lines.push("Key findings:".to_string());
        lines.extend(factors.iter().take(3).map(|f| format!("- {f}")));
    }
    lines.push("Evidence:".to_string());
    for claim in claims.iter().take(3) {
        let source = claim.source.as_deref().unwrap_or("unsourced");
        lines.push(format!("- {} (source: {})", claim.statement, source));
    }
    lines.push(if is_top_ranked {
        "This route is recommended as the best option among the alternatives analyzed.".to_string()
    } else {
        "This route was chosen as the lowest-risk alternative over the planner's top pick.".to_string()
    });
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk_factors::default_table;

    #[test]
    fn confidence_is_clamped() {
        let analyst = Analyst::new(ReviewConfig::default(), 5, default_table());
        // base only
        assert!((analyst.confidence(0, 0, 0) - 0.70).abs() < 1e-9);
        // 3 sources, 4 claims
        assert!((analyst.confidence(3, 4, 0) - (0.70 + 0.15 + 0.08)).abs() < 1e-9);
        // sources beyond five are not counted; upper clamp
        assert!((analyst.confidence(12, 10, 0) - 0.95).abs() < 1e-9);
        // red zones pull it down to the floor
        assert!((analyst.confidence(0, 3, 4) - 0.50).abs() < 1e-9);
    }
}
