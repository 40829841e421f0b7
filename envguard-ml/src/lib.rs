//! Model Lifecycle for Environmental Parameter Forecasting and Anomaly Detection
//!
//! ## Overview
//!
//! Every monitored parameter (PM2.5, CO2, pH, ...) owns a *model triple*:
//!
//! ```text
//! FeatureVector ──► StandardScaler ──► RandomForestRegressor ──► predicted value
//!                                                                      │
//! [hour, day_of_week, month, value] ──► StandardScaler ──► IsolationForest ──► anomaly score + flag
//! ```
//!
//! The detector judges a value against the time it was observed at. A
//! real-time check supplies the value directly; a forecast supplies the
//! predicted value at the prediction time.
//!
//! The triples live in a [`ModelRegistry`] that request handlers read while a
//! [`TrainingOrchestrator`] periodically refits and replaces them. Readers
//! always get a whole triple from a single generation: replacement swaps an
//! `Arc`, never individual fields.
//!
//! ## Why Isolation Forest?
//!
//! The detector must be fitted without labels on whatever the last 30 days
//! of readings look like. Isolation Forest fits that well:
//!
//! 1. **Unsupervised**: No labeled anomalies required
//! 2. **Small State**: Stores tree structures, not training data
//! 3. **Fast Scoring**: O(trees × depth) per vector
//!
//! ### How Isolation Forest Works
//!
//! The algorithm isolates points by random partitioning:
//! ```text
//! Normal points: Need many partitions to isolate
//! Anomalies: Isolated with few partitions
//!
//! s(x) = 2^(-E[h(x)] / c(n))
//! decision(x) = -s(x) - offset        offset = contamination percentile
//! anomaly     <=> decision(x) < 0
//! ```
//!
//! ## Lifecycle
//!
//! ```text
//! Datastore ──► TrainingTable ──► per parameter: split → scale → fit → R²
//!                                        │
//!                          ModelRegistry::replace + ModelStore::save
//!                                        │
//! PredictionEngine::forecast / anomaly_check ◄──┘
//! ```
//!
//! A [`RetrainingClock`] drives [`TrainingOrchestrator::run_training_cycle`]
//! every six hours on a blocking thread, separate from request handling.
//!
//! ## Failure Containment
//!
//! | Failure                          | Effect                                  |
//! |----------------------------------|-----------------------------------------|
//! | Empty training window            | Cycle reports failure, nothing replaced |
//! | Fewer than 10 rows for a target  | Parameter skipped, old triple kept      |
//! | Error fitting one parameter      | Recorded in the report, others proceed  |
//! | Incomplete artifacts at startup  | Parameter stays untrained               |
//! | Error predicting one parameter   | Parameter omitted from the response     |
//! | Datastore unreachable            | Whole operation fails                   |
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use envguard_core::{Datastore, SystemTime};
//! use envguard_ml::{LifecycleConfig, ModelRegistry, ModelStore, PredictionEngine, TrainingOrchestrator};
//!
//! # fn wire(datastore: Arc<dyn Datastore>, store: ModelStore) -> Result<(), envguard_ml::LifecycleError> {
//! let registry = Arc::new(ModelRegistry::new());
//! let config = LifecycleConfig::default();
//!
//! let trainer = TrainingOrchestrator::new(
//!     datastore.clone(), registry.clone(), store, Arc::new(SystemTime), config.clone(),
//! );
//! let report = trainer.run_training_cycle()?;
//! println!("trained: {:?}", report.trained());
//!
//! let engine = PredictionEngine::new(datastore, registry, Arc::new(SystemTime), &config);
//! let forecast = engine.forecast("WATER_001", 1)?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod clock;
pub mod config;
pub mod engine;
pub mod errors;
pub mod forest;
pub mod metrics;
pub mod node;
pub mod persistence;
pub mod registry;
pub mod regressor;
pub mod rng;
pub mod scaler;
pub mod scoring;
pub mod split;
pub mod training;
pub mod tree;
pub mod triple;

pub use clock::{RetrainingClock, RetrainingHandle};
pub use config::LifecycleConfig;
pub use engine::{AnomalyFinding, AnomalyReport, ForecastReport, ParameterForecast, PredictionEngine};
pub use errors::{ConfigError, LifecycleError, MLError, MLResult, PersistenceError};
pub use forest::{ForestConfig, IsolationForest};
pub use metrics::r2_score;
pub use node::{average_path_length, Node, NodeType};
pub use persistence::{artifact_key, ArtifactKind, LoadedModels, ModelStore};
pub use registry::{ModelRegistry, ParameterStatus};
pub use regressor::{RandomForestRegressor, RegressionTree, RegressorConfig};
pub use rng::Rng;
pub use scaler::StandardScaler;
pub use scoring::{calculate_anomaly_score, percentile, AnomalyScore};
pub use split::train_test_split;
pub use training::{CycleReport, ParameterOutcome, StartupOutcome, TrainingOrchestrator};
pub use tree::{IsolationTree, TreeConfig};
pub use triple::{FitMetrics, ModelTriple, Prediction};
