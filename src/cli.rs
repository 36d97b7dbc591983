use crate::agent_state::ReviewRequest;
use crate::collaborators::Collaborators;
use crate::config_loader::SafeTravelsConfig;
use crate::geo::Coordinate;
use crate::risk_factors::RiskContext;
use crate::runtime_core::SafeTravelsCore;
use crate::static_providers::{resolve_location, GazetteerRouting};
use crate::stop_security::{StopCandidate, StopFeature, StopFeatureChecklist};
use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::sync::Arc;

/// Top-level CLI interface for SafeTravels
#[derive(Parser)]
#[command(name = "safetravels", version, about = "Cargo theft risk scoring and route review")]
pub struct Cli {
    /// Path to a TOML config file (default: safetravels.toml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Overrides `log_level` from the config
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Risk context fields shared by several commands.
#[derive(Args, Debug, Clone, Default)]
pub struct ContextArgs {
    #[arg(long)]
    pub commodity: Option<String>,
    #[arg(long)]
    pub cargo_value: Option<f64>,
    /// Two-letter state code
    #[arg(long)]
    pub region: Option<String>,
    /// RFC 3339 timestamp; fills time of day, weekday, month and season
    #[arg(long)]
    pub at: Option<String>,
    #[arg(long)]
    pub time_of_day: Option<String>,
    #[arg(long)]
    pub day_of_week: Option<String>,
    #[arg(long)]
    pub location_type: Option<String>,
    #[arg(long)]
    pub weather: Option<String>,
    #[arg(long)]
    pub event: Option<String>,
    #[arg(long)]
    pub traffic: Option<String>,
    #[arg(long)]
    pub incident_density: Option<String>,
}

impl ContextArgs {
    pub fn to_context(&self) -> anyhow::Result<RiskContext> {
        let mut ctx = RiskContext::new();
        if let Some(at) = &self.at {
            let when: DateTime<Utc> = DateTime::parse_from_rfc3339(at)
                .with_context(|| format!("invalid --at timestamp '{at}'"))?
                .with_timezone(&Utc);
            ctx = ctx.at(&when);
        }
        if let Some(v) = &self.commodity {
            ctx = ctx.with_commodity(v);
        }
        if let Some(v) = self.cargo_value {
            ctx = ctx.with_cargo_value(v);
        }
        if self.region.is_some() {
            ctx = ctx.with_region(self.region.clone());
        }
        if let Some(v) = &self.time_of_day {
            ctx = ctx.with_time_of_day(v);
        }
        if let Some(v) = &self.day_of_week {
            ctx = ctx.with_day_of_week(v);
        }
        if let Some(v) = &self.location_type {
            ctx = ctx.with_location_type(v);
        }
        if let Some(v) = &self.weather {
            ctx = ctx.with_weather(v);
        }
        if let Some(v) = &self.event {
            ctx = ctx.with_event(v);
        }
        if let Some(v) = &self.traffic {
            ctx = ctx.with_traffic(v);
        }
        if let Some(v) = &self.incident_density {
            ctx = ctx.with_incident_density(v);
        }
        Ok(ctx)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Score a single location and time
    Score {
        #[command(flatten)]
        context: ContextArgs,
    },

    /// Scan a route given as waypoints (`lat,lon` or a known city)
    Scan {
        #[arg(long = "waypoint", required = true, num_args = 1..)]
        waypoints: Vec<String>,
        #[command(flatten)]
        context: ContextArgs,
    },

    /// Score a truck stop from its feature checklist
    Stop {
        /// Comma-separated features, e.g. `gated,cctv,staffed_24_7`
        #[arg(long, value_delimiter = ',')]
        features: Vec<String>,
    },

    /// Run the full plan, analyze and critique review
    Review {
        origin: String,
        destination: String,
        #[arg(long)]
        driver: Option<String>,
        /// JSON file with a list of candidate stops
        #[arg(long)]
        stops_file: Option<String>,
        #[command(flatten)]
        context: ContextArgs,
    },

    /// Compare risk across every departure hour of a day
    Departure {
        /// YYYY-MM-DD, defaults to today
        #[arg(long)]
        date: Option<String>,
        #[command(flatten)]
        context: ContextArgs,
    },

    /// Check how close a position is to the route's red zones
    Alert {
        #[arg(long)]
        position: String,
        #[arg(long, default_value_t = 55.0)]
        speed: f64,
        #[arg(long = "waypoint", required = true, num_args = 1..)]
        waypoints: Vec<String>,
        #[command(flatten)]
        context: ContextArgs,
    },

    /// Rate a stop (1-5) for a driver; ratings of 2 or less mark it unsafe
    Feedback {
        #[arg(long)]
        driver: String,
        #[arg(long)]
        stop: String,
        #[arg(long)]
        rating: u8,
        #[arg(long)]
        comment: Option<String>,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_waypoints(raw: &[String]) -> anyhow::Result<Vec<Coordinate>> {
    raw.iter()
        .map(|w| resolve_location(w).ok_or_else(|| anyhow!("cannot resolve waypoint '{w}'")))
        .collect()
}

fn parse_features(raw: &[String]) -> anyhow::Result<Vec<StopFeature>> {
    raw.iter()
        .filter(|f| !f.trim().is_empty())
        .map(|f| {
            serde_json::from_value(serde_json::Value::String(f.trim().to_lowercase()))
                .map_err(|_| anyhow!("unknown stop feature '{f}'"))
        })
        .collect()
}

/// Core without persistent storage, for commands that only score.
fn scoring_core(config: SafeTravelsConfig) -> anyhow::Result<SafeTravelsCore> {
    let collaborators = Collaborators::new(Arc::new(GazetteerRouting::new()));
    Ok(SafeTravelsCore::new(config, collaborators)?)
}

pub async fn dispatch(cli: Cli, config: SafeTravelsConfig) -> anyhow::Result<()> {
    match cli.command {
        Commands::Score { context } => {
            let core = scoring_core(config)?;
            let score = core.score_location(&context.to_context()?);
            let warnings = core.scorer().warnings(&score);
            print_json(&serde_json::json!({ "score": score, "warnings": warnings }))
        }
        Commands::Scan { waypoints, context } => {
            let core = scoring_core(config)?;
            let route = core.scan_route(&parse_waypoints(&waypoints)?, &context.to_context()?)?;
            print_json(&serde_json::json!({
                "composite_score": route.composite_score,
                "composite_level": route.composite_level,
                "total_miles": route.total_miles,
                "zone_breakdown": route.zone_breakdown(),
                "zone_spans": route.zone_spans(),
                "recommendations": route.recommendations(),
                "segments": route.segments,
            }))
        }
        Commands::Stop { features } => {
            let core = scoring_core(config)?;
            let checklist = StopFeatureChecklist::from_features(&parse_features(&features)?);
            print_json(&core.score_stop(&checklist))
        }
        Commands::Review {
            origin,
            destination,
            driver,
            stops_file,
            context,
        } => {
            let core = SafeTravelsCore::from_config(config)?;
            let mut request = ReviewRequest::new(origin, destination, context.to_context()?);
            if let Some(driver) = driver {
                request = request.with_driver(driver);
            }
            if let Some(path) = stops_file {
                let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
                let stops: Vec<StopCandidate> =
                    serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))?;
                request = request.with_stop_candidates(stops);
            }
            let outcome = core.run_review_request(request).await?;
            print_json(&outcome)
        }
        Commands::Departure { date, context } => {
            let core = scoring_core(config)?;
            let date = match date {
                Some(d) => NaiveDate::parse_from_str(&d, "%Y-%m-%d").with_context(|| format!("invalid date '{d}'"))?,
                None => Utc::now().date_naive(),
            };
            print_json(&core.departure_profile(&context.to_context()?, date))
        }
        Commands::Alert {
            position,
            speed,
            waypoints,
            context,
        } => {
            let core = scoring_core(config)?;
            let position: Coordinate = position.parse()?;
            let route = core.scan_route(&parse_waypoints(&waypoints)?, &context.to_context()?)?;
            print_json(&core.proximity_alert(&position, &route, speed))
        }
        Commands::Feedback {
            driver,
            stop,
            rating,
            comment,
        } => {
            if !(1..=5).contains(&rating) {
                bail!("rating must be between 1 and 5");
            }
            let core = SafeTravelsCore::from_config(config)?;
            let store = core
                .preference_store()
                .ok_or_else(|| anyhow!("preference store unavailable"))?;
            let feedback = store.record_stop_feedback(&driver, &stop, rating, comment)?;
            let rating = store.stop_rating(&stop)?;
            print_json(&serde_json::json!({ "feedback": feedback, "stop_rating": rating, "average": rating.average() }))
        }
    }
}
