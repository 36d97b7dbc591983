//! sled-backed driver memory: preferences, trip outcomes and stop feedback.

use crate::collaborators::{DriverPreferences, PreferenceStore, TripOutcome};
use crate::errors::{SafeTravelsError, SafeTravelsResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::Db;
use tracing::{debug, info};

const PREFERENCES_TREE: &str = "driver_preferences";
const OUTCOMES_TREE: &str = "trip_outcomes";
const FEEDBACK_TREE: &str = "stop_feedback";
const RATINGS_TREE: &str = "stop_ratings";

/// Ratings at or below this mark a stop unsafe for that driver.
pub const UNSAFE_RATING: u8 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopFeedback {
    pub driver_id: String,
    pub stop_id: String,
    pub rating: u8,
    pub comment: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StopRating {
    pub count: u32,
    pub total: u32,
}

impl StopRating {
    pub fn average(&self) -> Option<f64> {
        (self.count > 0).then(|| self.total as f64 / self.count as f64)
    }
}

pub struct SledPreferenceStore {
    db: Db,
}

impl SledPreferenceStore {
    pub fn open(path: &str) -> SafeTravelsResult<Self> {
        let db = sled::open(path).map_err(|e| SafeTravelsError::database(format!("open {path}"), e))?;
        info!("preference store opened at {path}");
        Ok(Self { db })
    }

    fn tree(&self, name: &str) -> SafeTravelsResult<sled::Tree> {
        self.db
            .open_tree(name)
            .map_err(|e| SafeTravelsError::database(format!("open tree {name}"), e))
    }

    pub fn save_driver_preferences(&self, prefs: &DriverPreferences) -> SafeTravelsResult<()> {
        let bytes = serde_json::to_vec(prefs)?;
        self.tree(PREFERENCES_TREE)?.insert(prefs.driver_id.as_bytes(), bytes)?;
        Ok(())
    }

    /// Stored preferences merged with stops this driver rated unsafe.
    pub fn driver_preferences(&self, driver_id: &str) -> SafeTravelsResult<DriverPreferences> {
        let mut prefs = match self.tree(PREFERENCES_TREE)?.get(driver_id.as_bytes())? {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => DriverPreferences {
                driver_id: driver_id.to_string(),
                ..DriverPreferences::default()
            },
        };
        for stop_id in self.unsafe_stops(driver_id)? {
            if !prefs.unsafe_stop_ids.contains(&stop_id) {
                prefs.unsafe_stop_ids.push(stop_id);
            }
        }
        Ok(prefs)
    }

    /// Stores a rating (clamped to 1..=5); the latest rating per driver and stop wins.
    pub fn record_stop_feedback(
        &self,
        driver_id: &str,
        stop_id: &str,
        rating: u8,
        comment: Option<String>,
    ) -> SafeTravelsResult<StopFeedback> {
        let feedback = StopFeedback {
            driver_id: driver_id.to_string(),
            stop_id: stop_id.to_string(),
            rating: rating.clamp(1, 5),
            comment,
            recorded_at: Utc::now(),
        };
        let key = format!("{driver_id}:{stop_id}");
        self.tree(FEEDBACK_TREE)?
            .insert(key.as_bytes(), serde_json::to_vec(&feedback)?)?;

        let ratings = self.tree(RATINGS_TREE)?;
        let mut aggregate: StopRating = match ratings.get(stop_id.as_bytes())? {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => StopRating::default(),
        };
        aggregate.count += 1;
        aggregate.total += feedback.rating as u32;
        ratings.insert(stop_id.as_bytes(), serde_json::to_vec(&aggregate)?)?;

        debug!("feedback {}/5 for {stop_id} from {driver_id}", feedback.rating);
        Ok(feedback)
    }

    pub fn stop_rating(&self, stop_id: &str) -> SafeTravelsResult<StopRating> {
        match self.tree(RATINGS_TREE)?.get(stop_id.as_bytes())? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(StopRating::default()),
        }
    }

    pub fn unsafe_stops(&self, driver_id: &str) -> SafeTravelsResult<Vec<String>> {
        let prefix = format!("{driver_id}:");
        let mut out = Vec::new();
        for item in self.tree(FEEDBACK_TREE)?.scan_prefix(prefix.as_bytes()) {
            let (_, bytes) = item?;
            let feedback: StopFeedback = serde_json::from_slice(&bytes)?;
            if feedback.rating <= UNSAFE_RATING {
                out.push(feedback.stop_id);
            }
        }
        Ok(out)
    }

    /// Trips for one driver, oldest first.
    pub fn trip_history(&self, driver_id: &str) -> SafeTravelsResult<Vec<TripOutcome>> {
        let prefix = format!("{driver_id}:");
        self.tree(OUTCOMES_TREE)?
            .scan_prefix(prefix.as_bytes())
            .map(|item| -> SafeTravelsResult<TripOutcome> {
                let (_, bytes) = item?;
                Ok(serde_json::from_slice(&bytes)?)
            })
            .collect()
    }

    fn insert_outcome(&self, outcome: &TripOutcome) -> SafeTravelsResult<()> {
        let key = format!(
            "{}:{}:{}",
            outcome.driver_id,
            outcome.recorded_at.format("%Y%m%dT%H%M%S%.6f"),
            outcome.trip_id
        );
        self.tree(OUTCOMES_TREE)?
            .insert(key.as_bytes(), serde_json::to_vec(outcome)?)?;
        self.db.flush()?;
        Ok(())
    }
}

#[async_trait]
impl PreferenceStore for SledPreferenceStore {
    async fn load_driver_preferences(&self, driver_id: &str) -> SafeTravelsResult<DriverPreferences> {
        self.driver_preferences(driver_id)
    }

    async fn record_trip_outcome(&self, outcome: &TripOutcome) -> SafeTravelsResult<()> {
        self.insert_outcome(outcome)
    }
}
