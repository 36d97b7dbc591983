//! Library root for the `safetravels` crate: cargo theft risk scoring, route
//! zone scanning, stop security and the bounded route review workflow.

// Core error handling
pub mod errors;

// Configuration & CLI
pub mod cli;
pub mod config_loader;

// Risk scoring
pub mod departure_window;
pub mod risk_factors;
pub mod risk_scorer;

// Routes and stops
pub mod geo;
pub mod red_zone_alert;
pub mod route_scanner;
pub mod stop_security;

// External collaborators
pub mod collaborators;
pub mod http_providers;
pub mod preference_store;
pub mod static_providers;

// Review workflow
pub mod agent_state;
pub mod analyst;
pub mod critic;
pub mod planner;
pub mod review_workflow;

// Runtime core
pub mod runtime_core;
