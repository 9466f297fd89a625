//! Polling dashboard client for sensor-node telemetry
//!
//! This crate implements the client-side pipeline of a sensor monitoring
//! dashboard: polling view subscriptions over a REST backend, symbolic
//! time-range resolution, anomaly aggregation, and CSV/PDF report export.
//!
//! # Features
//!
//! - Cancellable polling subscriptions with loading/ready/failed view state
//! - Pure time-range resolution shared by views, reports and the simulator
//! - Anomaly aggregation from per-reading threshold tags
//! - CSV and paginated vector-chart PDF report export
//! - An axum simulator backend with a seeded data generator

// Core modules
pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod notice;
pub mod pipeline;
pub mod poll;
pub mod range;
pub mod report;
pub mod simulator;
pub mod validation;
pub mod views;

// Test support modules - available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

// Re-export main types for convenience
pub use client::{ApiClient, HttpApiClient, ReadingsQuery};
pub use config::AppConfig;
pub use error::{Result, SensorViewError};
pub use range::{RangeAnchor, RangePreset, RangeSelector, ResolvedRange};
