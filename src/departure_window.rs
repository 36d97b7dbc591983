//! What-if analysis over departure hours for a fixed context.

use crate::risk_factors::{month_name, time_category, weekday_name, RiskContext};
use crate::risk_scorer::{RiskLevel, RiskScorer};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyRisk {
    pub hour: u32,
    pub time_of_day: String,
    pub score: f64,
    pub level: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartureProfile {
    pub date: NaiveDate,
    pub hours: Vec<HourlyRisk>,
    pub best_hour: u32,
    pub worst_hour: u32,
    pub range: f64,
    pub recommendation: String,
}

/// 12-hour clock label, e.g. `2:00 PM`.
pub fn hour_label(hour: u32) -> String {
    let twelve = if hour % 12 == 0 { 12 } else { hour % 12 };
    let suffix = if hour < 12 { "AM" } else { "PM" };
    format!("{twelve}:00 {suffix}")
}

/// Scores `context` for every hour of `date`, overriding its time fields.
pub fn profile(scorer: &RiskScorer, context: &RiskContext, date: NaiveDate) -> DepartureProfile {
    let day = weekday_name(date.weekday());
    let month = month_name(date.month()).unwrap_or("january");

    let hours: Vec<HourlyRisk> = (0..24)
        .map(|hour| {
            let bucket = time_category(hour);
            let ctx = context
                .clone()
                .with_time_of_day(bucket)
                .with_day_of_week(day)
                .with_month(month);
            let score = scorer.score(&ctx);
            HourlyRisk {
                hour,
                time_of_day: bucket.to_string(),
                score: score.score,
                level: score.level,
            }
        })
        .collect();

    // first occurrence wins ties so the earliest hour is preferred
    let mut best = &hours[0];
    let mut worst = &hours[0];
    for h in &hours {
        if h.score < best.score {
            best = h;
        }
        if h.score > worst.score {
            worst = h;
        }
    }

    let recommendation = match best.level {
        RiskLevel::Critical => "Every departure hour is critical risk. Consider rescheduling the load.".to_string(),
        RiskLevel::High => format!(
            "Elevated risk all day. Depart around {} and use secured stops only.",
            hour_label(best.hour)
        ),
        _ => format!("Lowest risk window starts at {}.", hour_label(best.hour)),
    };

    DepartureProfile {
        date,
        best_hour: best.hour,
        worst_hour: worst.hour,
        range: worst.score - best.score,
        recommendation,
        hours,
    }
}
