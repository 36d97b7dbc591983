//! Plan step: scan every candidate path and rank the results.
//!
//! Pure computation. Routing has already happened by the time this runs, so
//! nothing here touches the network.

use crate::agent_state::{AgentRole, AgentState, RankedRoute, WorkflowStage};
use crate::collaborators::CandidatePath;
use crate::config_loader::PlannerConfig;
use crate::errors::{SafeTravelsError, SafeTravelsResult};
use crate::risk_scorer::MAX_RISK;
use crate::route_scanner::{RouteOption, RouteZoneScanner};
use tracing::{info, warn};

/// `route_A`, `route_B`, ... `route_Z`, then `route_27` onward.
pub fn route_id(index: usize) -> String {
    if index < 26 {
        format!("route_{}", (b'A' + index as u8) as char)
    } else {
        format!("route_{}", index + 1)
    }
}

/// Weighted blend of inverse risk, relative time and relative distance.
pub fn rank_routes(routes: Vec<RouteOption>, weights: &PlannerConfig) -> Vec<RankedRoute> {
    let fastest = routes
        .iter()
        .map(|r| r.estimated_minutes)
        .fold(f64::INFINITY, f64::min);
    let shortest = routes
        .iter()
        .map(|r| r.total_miles)
        .fold(f64::INFINITY, f64::min);

    let relative = |best: f64, value: f64| if value > 0.0 { (best / value).clamp(0.0, 1.0) } else { 1.0 };

    let mut ranked: Vec<RankedRoute> = routes
        .into_iter()
        .map(|route| {
            let safety = (MAX_RISK - route.composite_score) / (MAX_RISK - 1.0);
            let time = relative(fastest, route.estimated_minutes);
            let distance = relative(shortest, route.total_miles);
            RankedRoute {
                rank: 0,
                blended_score: weights.safety_weight * safety
                    + weights.time_weight * time
                    + weights.distance_weight * distance,
                safety_component: safety,
                time_component: time,
                distance_component: distance,
                route,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.blended_score
            .total_cmp(&a.blended_score)
            .then_with(|| a.route.composite_score.total_cmp(&b.route.composite_score))
            .then_with(|| a.route.route_id.cmp(&b.route.route_id))
    });
    for (i, r) in ranked.iter_mut().enumerate() {
        r.rank = i + 1;
    }
    ranked
}

pub fn plan(
    state: AgentState,
    paths: &[CandidatePath],
    scanner: &RouteZoneScanner,
    weights: &PlannerConfig,
) -> SafeTravelsResult<AgentState> {
    let opening = format!(
        "Planning {} candidate route(s) from {} to {}",
        paths.len(),
        state.request.origin,
        state.request.destination
    );
    let mut state = state
        .with_stage(WorkflowStage::Planning)
        .with_reasoning(AgentRole::Planner, opening);

    if paths.is_empty() {
        return Err(SafeTravelsError::routing_unavailable("no candidate routes returned"));
    }

    let mut scanned = Vec::with_capacity(paths.len());
    for (index, path) in paths.iter().enumerate() {
        let id = route_id(index);
        let name = path
            .name
            .clone()
            .unwrap_or_else(|| format!("Alternative {}", index + 1));

        match scanner.scan(&path.coordinates, &state.request.cargo) {
            Ok(option) => {
                let minutes = if path.estimated_duration_minutes > 0.0 {
                    path.estimated_duration_minutes
                } else {
                    option.total_miles / weights.average_speed_mph * 60.0
                };
                let option = option.with_identity(&id, &name).with_estimated_minutes(minutes);
                state = state.with_reasoning(
                    AgentRole::Planner,
                    format!(
                        "Scored {} ({}): composite {:.1}/10, {} red segment(s), {:.0} mi",
                        id,
                        name,
                        option.composite_score,
                        option.red_segment_count(),
                        option.total_miles
                    ),
                );
                scanned.push(option);
            }
            Err(err) => {
                warn!("skipping {id}: {err}");
                state = state.with_reasoning(AgentRole::Planner, format!("Skipped {id}: {err}"));
            }
        }
    }

    if scanned.is_empty() {
        return Err(SafeTravelsError::invalid_route("no candidate route could be scanned"));
    }

    let ranked = rank_routes(scanned, weights);
    let summary = ranked
        .iter()
        .map(|r| format!("#{} {} ({:.3})", r.rank, r.route.route_id, r.blended_score))
        .collect::<Vec<_>>()
        .join(", ");
    info!("planner ranked {} routes", ranked.len());

    Ok(state
        .with_reasoning(
            AgentRole::Planner,
            format!(
                "Ranking by {:.0}% inverse risk, {:.0}% time, {:.0}% distance: {}",
                weights.safety_weight * 100.0,
                weights.time_weight * 100.0,
                weights.distance_weight * 100.0,
                summary
            ),
        )
        .with_ranking(ranked))
}
