// src/lib.rs
// Public library surface for the binary and integration tests.

// Scoring core (pure, synchronous)
pub mod composite;
pub mod congestion;
pub mod display;
pub mod engine;
pub mod indicator;
pub mod picks;
pub mod seed;

// Race data
pub mod race;
pub mod venue;

// Configuration, publishing and settlement
pub mod config;
pub mod report;
pub mod settlement;
pub mod store;

// HTTP surface
pub mod api;
pub mod metrics;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::config::{AppConfig, PipelineConfig, SettlementConfig};
pub use crate::engine::{predict_race, RaceOutcome, RacePrediction, SkipReason};
pub use crate::race::{Horse, RaceCard, RaceInput};
