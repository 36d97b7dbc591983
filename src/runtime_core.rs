//! SafeTravelsCore: the entry point the CLI and embedding services call into.
//! Holds the shared factor table, scorers and the review workflow.

use crate::agent_state::ReviewRequest;
use crate::collaborators::{with_timeout, Collaborators};
use crate::config_loader::SafeTravelsConfig;
use crate::critic::Critic;
use crate::departure_window::{self, DepartureProfile};
use crate::errors::SafeTravelsResult;
use crate::geo::{state_for, Coordinate};
use crate::http_providers::ChatCompletionSynthesizer;
use crate::preference_store::SledPreferenceStore;
use crate::red_zone_alert::{check_proximity, ProximityAlert};
use crate::review_workflow::{ReviewOutcome, ReviewWorkflow};
use crate::risk_factors::RiskContext;
use crate::risk_scorer::{RiskScore, RiskScorer};
use crate::route_scanner::{RouteOption, RouteZoneScanner};
use crate::static_providers::{GazetteerRouting, KeywordRetrieval, TemplateSynthesizer};
use crate::stop_security::{SecurityScore, StopFeatureChecklist, StopSecurityScorer};
use chrono::{Duration, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{info, warn};

pub const INCIDENT_RADIUS_MILES: f64 = 25.0;
pub const INCIDENT_WINDOW_DAYS: i64 = 90;

pub struct SafeTravelsCore {
    config: SafeTravelsConfig,
    scorer: RiskScorer,
    scanner: RouteZoneScanner,
    stop_scorer: StopSecurityScorer,
    workflow: ReviewWorkflow,
    store: Option<Arc<SledPreferenceStore>>,
}

impl SafeTravelsCore {
    pub fn new(config: SafeTravelsConfig, collaborators: Collaborators) -> SafeTravelsResult<Self> {
        config.validate()?;
        let table = config.load_factor_table()?;
        let scorer = RiskScorer::new(table);
        let scanner = RouteZoneScanner::new(scorer.clone(), Arc::new(config.risk.hotspots.clone()))
            .with_segment_miles(config.scanner.segment_miles)
            .with_max_segments(config.scanner.max_segments);
        let collaborators = collaborators.with_call_timeout(config.call_timeout());
        let workflow = ReviewWorkflow::new(
            scanner.clone(),
            config.planner.clone(),
            config.review.clone(),
            config.collaborators.retrieval_k,
            collaborators,
        );
        info!(
            "risk core ready (factor table {}, {} hotspots)",
            scorer.table().version,
            config.risk.hotspots.len()
        );
        Ok(Self {
            config,
            scorer,
            scanner,
            stop_scorer: StopSecurityScorer::new(),
            workflow,
            store: None,
        })
    }

    /// Offline collaborators, sled preferences at `storage.db_path`, and HTTP
    /// synthesis when an API key is configured.
    pub fn from_config(config: SafeTravelsConfig) -> SafeTravelsResult<Self> {
        let store = Arc::new(SledPreferenceStore::open(&config.storage.db_path)?);
        let mut collaborators = Collaborators::new(Arc::new(GazetteerRouting::new()))
            .with_retrieval(Arc::new(KeywordRetrieval::new()))
            .with_preferences(store.clone());
        collaborators = match ChatCompletionSynthesizer::from_config(&config.collaborators)? {
            Some(http) => collaborators.with_synthesis(Arc::new(http)),
            None => collaborators.with_synthesis(Arc::new(TemplateSynthesizer)),
        };
        let mut core = Self::new(config, collaborators)?;
        core.store = Some(store);
        Ok(core)
    }

    pub fn with_critic(mut self, critic: Arc<dyn Critic>) -> Self {
        self.workflow = self.workflow.with_critic(critic);
        self
    }

    pub fn config(&self) -> &SafeTravelsConfig {
        &self.config
    }

    pub fn scorer(&self) -> &RiskScorer {
        &self.scorer
    }

    pub fn preference_store(&self) -> Option<&SledPreferenceStore> {
        self.store.as_deref()
    }

    pub fn score_location(&self, context: &RiskContext) -> RiskScore {
        self.scorer.score(context)
    }

    pub fn scan_route(&self, coordinates: &[Coordinate], template: &RiskContext) -> SafeTravelsResult<RouteOption> {
        self.scanner.scan(coordinates, template)
    }

    pub fn score_stop(&self, checklist: &StopFeatureChecklist) -> SecurityScore {
        self.stop_scorer.score(checklist)
    }

    pub fn departure_profile(&self, context: &RiskContext, date: NaiveDate) -> DepartureProfile {
        departure_window::profile(&self.scorer, context, date)
    }

    pub fn proximity_alert(&self, position: &Coordinate, route: &RouteOption, speed_mph: f64) -> ProximityAlert {
        check_proximity(position, &route.zone_spans(), speed_mph)
    }

    /// Fills region and incident density for `at`. Incident lookup failures
    /// leave the density unset.
    pub async fn enrich_context(&self, context: RiskContext, at: Coordinate) -> RiskContext {
        let mut context = context;
        if context.region.is_none() {
            context = context.with_region(state_for(&at).map(str::to_string));
        }
        let collaborators = self.workflow.collaborators();
        let Some(incidents) = &collaborators.incidents else {
            return context;
        };
        let since = Utc::now() - Duration::days(INCIDENT_WINDOW_DAYS);
        let call = incidents.incident_summary(at, INCIDENT_RADIUS_MILES, since);
        match with_timeout("incident_summary", collaborators.call_timeout, call).await {
            Ok(summary) => context.with_incident_density(summary.density_category()),
            Err(err) => {
                warn!("incident lookup failed at ({}, {}): {err}", at.lat, at.lon);
                context
            }
        }
    }

    pub async fn run_review(
        &self,
        origin: &str,
        destination: &str,
        cargo: RiskContext,
    ) -> SafeTravelsResult<ReviewOutcome> {
        self.run_review_request(ReviewRequest::new(origin, destination, cargo)).await
    }

    pub async fn run_review_request(&self, request: ReviewRequest) -> SafeTravelsResult<ReviewOutcome> {
        self.workflow.run(request).await
    }
}
