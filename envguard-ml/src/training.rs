//! Training orchestrator
//!
//! One cycle fetches the training window once, then trains every parameter
//! independently:
//!
//! ```text
//! readings_between(now - lookback, now)
//!        │
//!        ▼
//!  TrainingTable ──► for each parameter:
//!                      usable rows < min?  → Skipped
//!                      design / fit error? → Failed
//!                      otherwise           → publish, persist → Trained
//! ```
//!
//! A failure for one parameter never stops the others. The cycle as a whole
//! reports failure only when the window is empty; an unreachable datastore is
//! an error for the caller.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, TryLockError};

use chrono::{DateTime, Utc};
use envguard_core::{build_training_table, Datastore, Parameter, TimeSource, TrainingTable};
use serde::Serialize;

use crate::{
    FitMetrics, LifecycleConfig, LifecycleError, MLError, ModelRegistry, ModelStore, ModelTriple,
};

/// What happened to one parameter in a cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ParameterOutcome {
    /// A new triple was published
    Trained {
        /// Fit quality
        metrics: FitMetrics,
        /// Whether the artifacts were written
        persisted: bool,
    },
    /// Too few usable rows; the previous triple stays
    Skipped {
        /// Rows with a value for the parameter
        available: usize,
        /// Configured minimum
        required: usize,
    },
    /// Building or fitting failed; the previous triple stays
    Failed {
        /// Error description
        error: String,
    },
}

/// Summary of one training cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    /// When the cycle started; also the end of the window
    pub started_at: DateTime<Utc>,
    /// Start of the training window
    pub window_start: DateTime<Utc>,
    /// When the cycle finished
    pub finished_at: DateTime<Utc>,
    /// Readings in the window
    pub rows_fetched: usize,
    /// Per-parameter results; empty when nothing was fetched
    pub outcomes: BTreeMap<Parameter, ParameterOutcome>,
}

impl CycleReport {
    /// False only when the training window held no readings
    pub fn success(&self) -> bool {
        self.rows_fetched > 0
    }

    /// Outcome for one parameter
    pub fn outcome(&self, parameter: Parameter) -> Option<&ParameterOutcome> {
        self.outcomes.get(&parameter)
    }

    fn matching(&self, pred: impl Fn(&ParameterOutcome) -> bool) -> Vec<Parameter> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| pred(outcome))
            .map(|(p, _)| *p)
            .collect()
    }

    /// Parameters that got a new triple
    pub fn trained(&self) -> Vec<Parameter> {
        self.matching(|o| matches!(o, ParameterOutcome::Trained { .. }))
    }

    /// Parameters skipped for lack of rows
    pub fn skipped(&self) -> Vec<Parameter> {
        self.matching(|o| matches!(o, ParameterOutcome::Skipped { .. }))
    }

    /// Parameters whose training failed
    pub fn failed(&self) -> Vec<Parameter> {
        self.matching(|o| matches!(o, ParameterOutcome::Failed { .. }))
    }
}

/// How the registry was populated at startup
#[derive(Debug, Clone)]
pub enum StartupOutcome {
    /// Persisted triples were installed
    Loaded {
        /// Parameters that loaded completely
        parameters: Vec<Parameter>,
    },
    /// Nothing loaded, so a cycle ran immediately
    Trained(CycleReport),
}

/// Runs training cycles against the shared registry
pub struct TrainingOrchestrator {
    datastore: Arc<dyn Datastore>,
    registry: Arc<ModelRegistry>,
    store: ModelStore,
    clock: Arc<dyn TimeSource>,
    config: LifecycleConfig,
    last_report: RwLock<Option<CycleReport>>,
    // Held for a whole cycle so two cycles never interleave their writes.
    // Registry readers never take it.
    cycle_guard: Mutex<()>,
}

impl TrainingOrchestrator {
    /// Wire up an orchestrator
    pub fn new(
        datastore: Arc<dyn Datastore>,
        registry: Arc<ModelRegistry>,
        store: ModelStore,
        clock: Arc<dyn TimeSource>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            datastore,
            registry,
            store,
            clock,
            config,
            last_report: RwLock::new(None),
            cycle_guard: Mutex::new(()),
        }
    }

    /// Shared registry this orchestrator publishes to
    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Active configuration
    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Report of the most recent completed cycle
    pub fn last_report(&self) -> Option<CycleReport> {
        self.last_report
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Populate the registry at startup
    ///
    /// Installs whatever loads from the artifact store; when nothing does,
    /// runs a training cycle right away.
    pub fn initialize(&self) -> Result<StartupOutcome, LifecycleError> {
        let loaded = self.store.load_all();

        if loaded.success() {
            for (parameter, err) in &loaded.skipped {
                log::warn!("Parameter {} stays untrained: {}", parameter, err);
            }
            let parameters: Vec<Parameter> = loaded.triples.iter().map(|t| t.parameter()).collect();
            self.registry.install(loaded);
            log::info!("Loaded persisted models for {:?}", parameters);
            return Ok(StartupOutcome::Loaded { parameters });
        }

        log::info!("No persisted models found, training now");
        Ok(StartupOutcome::Trained(self.run_training_cycle()?))
    }

    /// Run one training cycle
    ///
    /// Returns [`LifecycleError::CycleInProgress`] if another cycle is
    /// running and [`LifecycleError::Upstream`] if the window cannot be
    /// fetched.
    pub fn run_training_cycle(&self) -> Result<CycleReport, LifecycleError> {
        let _guard = match self.cycle_guard.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(LifecycleError::CycleInProgress),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        let started_at = self.clock.now();
        let window_start = self
            .config
            .lookback()
            .and_then(|lookback| started_at.checked_sub_signed(lookback))
            .ok_or(LifecycleError::InvalidLookback(self.config.lookback_days))?;
        log::info!("Training cycle started, window {} .. {}", window_start, started_at);

        let readings = self.datastore.readings_between(window_start, started_at)?;

        let mut outcomes = BTreeMap::new();
        if readings.is_empty() {
            log::warn!("No readings in the training window, keeping current models");
        } else {
            let table = build_training_table(&readings);
            for parameter in Parameter::ALL {
                let outcome = self.train_parameter(&table, parameter, started_at);
                outcomes.insert(parameter, outcome);
            }
        }

        let report = CycleReport {
            started_at,
            window_start,
            finished_at: self.clock.now(),
            rows_fetched: readings.len(),
            outcomes,
        };

        log::info!(
            "Training cycle finished: trained {:?}, skipped {:?}, failed {:?}",
            report.trained(),
            report.skipped(),
            report.failed()
        );

        *self
            .last_report
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(report.clone());

        Ok(report)
    }

    fn train_parameter(
        &self,
        table: &TrainingTable,
        parameter: Parameter,
        trained_at: DateTime<Utc>,
    ) -> ParameterOutcome {
        let available = table.usable_rows(parameter);
        let required = self.config.min_training_rows;
        if available < required {
            log::warn!(
                "Skipping {}: {} usable rows, need {}",
                parameter,
                available,
                required
            );
            return ParameterOutcome::Skipped { available, required };
        }

        let fitted = table
            .design_for(parameter)
            .map_err(MLError::from)
            .and_then(|design| ModelTriple::fit(design, &self.config, trained_at));

        let (triple, metrics) = match fitted {
            Ok(fitted) => fitted,
            Err(err) => {
                log::error!("Training failed for {}: {}", parameter, err);
                return ParameterOutcome::Failed {
                    error: err.to_string(),
                };
            }
        };

        log::info!(
            "Trained {}: train R² {:.3}, test R² {:.3} ({} / {} rows)",
            parameter,
            metrics.train_r2,
            metrics.test_r2,
            metrics.train_rows,
            metrics.test_rows
        );

        let triple = Arc::new(triple);
        self.registry.replace(Arc::clone(&triple));

        let persisted = match self.store.save(&triple) {
            Ok(()) => true,
            Err(err) => {
                log::error!("Could not persist {} models: {}", parameter, err);
                false
            }
        };

        ParameterOutcome::Trained { metrics, persisted }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use envguard_connectors::{MemoryArtifactStore, MemoryDatastore};
    use envguard_core::{FixedTime, Quantity, Reading};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn fast_config() -> LifecycleConfig {
        let mut config = LifecycleConfig::default();
        config.regressor.num_trees = 8;
        config.detector.num_trees = 16;
        config
    }

    fn water(hours_ago: i64, ph: f64) -> Reading {
        Reading::new(now() - chrono::Duration::hours(hours_ago), "WATER_001", "water")
            .with_value(Quantity::Ph, ph)
            .with_value(Quantity::Turbidity, 2.0 + (hours_ago % 3) as f64)
            .with_value(Quantity::DissolvedOxygen, 8.0 - (hours_ago % 4) as f64 * 0.2)
    }

    struct Fixture {
        datastore: Arc<MemoryDatastore>,
        artifacts: Arc<MemoryArtifactStore>,
        orchestrator: TrainingOrchestrator,
    }

    fn fixture(readings: Vec<Reading>) -> Fixture {
        let datastore = Arc::new(MemoryDatastore::with_readings(readings));
        let artifacts = Arc::new(MemoryArtifactStore::new());
        let orchestrator = TrainingOrchestrator::new(
            datastore.clone(),
            Arc::new(ModelRegistry::new()),
            ModelStore::new(artifacts.clone()),
            Arc::new(FixedTime::new(now())),
            fast_config(),
        );
        Fixture {
            datastore,
            artifacts,
            orchestrator,
        }
    }

    #[test]
    fn test_cycle_trains_available_parameters() {
        let readings = (0..24).map(|h| water(h, 7.0 + (h % 6) as f64 * 0.1)).collect();
        let f = fixture(readings);

        let report = f.orchestrator.run_training_cycle().unwrap();

        assert!(report.success());
        assert_eq!(report.rows_fetched, 24);
        assert_eq!(
            report.trained(),
            vec![Parameter::Ph, Parameter::Turbidity, Parameter::DissolvedOxygen]
        );
        assert_eq!(report.skipped().len(), 4);
        assert!(report.failed().is_empty());
        assert_eq!(
            report.outcome(Parameter::Pm25),
            Some(&ParameterOutcome::Skipped {
                available: 0,
                required: 10
            })
        );

        // One fetch for the whole cycle
        assert_eq!(f.datastore.stats().range_queries, 1);
        // Three blobs per trained parameter
        assert_eq!(f.artifacts.len(), 9);
        assert!(f.orchestrator.registry().get(Parameter::Ph).is_trained());
        assert!(f.orchestrator.last_report().is_some());
    }

    #[test]
    fn test_window_excludes_old_readings() {
        // 9 readings inside the 30-day window, 5 older ones
        let mut readings: Vec<Reading> = (0..9).map(|h| water(h, 7.0)).collect();
        readings.extend((0..5).map(|d| water(24 * (40 + d), 7.2)));
        let f = fixture(readings);

        let report = f.orchestrator.run_training_cycle().unwrap();
        assert_eq!(report.rows_fetched, 9);
        assert_eq!(report.skipped().len(), 7);
        assert!(f.orchestrator.registry().trained_parameters().is_empty());
    }

    #[test]
    fn test_empty_window() {
        let f = fixture(Vec::new());
        let report = f.orchestrator.run_training_cycle().unwrap();

        assert!(!report.success());
        assert!(report.outcomes.is_empty());
        assert!(f.artifacts.is_empty());
        assert!(f.orchestrator.registry().trained_parameters().is_empty());
    }

    #[test]
    fn test_upstream_failure() {
        let f = fixture(vec![water(1, 7.0)]);
        f.datastore.set_available(false);

        assert!(matches!(
            f.orchestrator.run_training_cycle(),
            Err(LifecycleError::Upstream(_))
        ));
        assert!(f.orchestrator.last_report().is_none());
    }

    #[test]
    fn test_unrepresentable_lookback_is_an_error() {
        let datastore = Arc::new(MemoryDatastore::with_readings(vec![water(1, 7.0)]));
        let mut config = fast_config();
        config.lookback_days = 100_000_000_000;
        let orchestrator = TrainingOrchestrator::new(
            datastore.clone(),
            Arc::new(ModelRegistry::new()),
            ModelStore::new(Arc::new(MemoryArtifactStore::new())),
            Arc::new(FixedTime::new(now())),
            config,
        );

        assert!(matches!(
            orchestrator.run_training_cycle(),
            Err(LifecycleError::InvalidLookback(100_000_000_000))
        ));
        assert_eq!(datastore.stats().range_queries, 0);
        assert!(orchestrator.last_report().is_none());
    }

    #[test]
    fn test_concurrent_cycle_rejected() {
        let f = fixture(Vec::new());
        let _held = f.orchestrator.cycle_guard.lock().unwrap();

        assert!(matches!(
            f.orchestrator.run_training_cycle(),
            Err(LifecycleError::CycleInProgress)
        ));
    }

    #[test]
    fn test_persist_failure_still_publishes() {
        let readings = (0..12).map(|h| water(h, 7.0 + (h % 4) as f64 * 0.1)).collect();
        let f = fixture(readings);
        f.artifacts.set_read_only(true);

        let report = f.orchestrator.run_training_cycle().unwrap();

        assert!(matches!(
            report.outcome(Parameter::Ph),
            Some(ParameterOutcome::Trained {
                persisted: false,
                ..
            })
        ));
        assert!(f.orchestrator.registry().get(Parameter::Ph).is_trained());
    }

    #[test]
    fn test_initialize_prefers_persisted_models() {
        let readings: Vec<Reading> = (0..12).map(|h| water(h, 7.0 + (h % 4) as f64 * 0.1)).collect();
        let first = fixture(readings.clone());
        first.orchestrator.run_training_cycle().unwrap();

        // Fresh process over the same artifacts
        let datastore = Arc::new(MemoryDatastore::with_readings(readings));
        let orchestrator = TrainingOrchestrator::new(
            datastore.clone(),
            Arc::new(ModelRegistry::new()),
            ModelStore::new(first.artifacts.clone()),
            Arc::new(FixedTime::new(now())),
            fast_config(),
        );

        match orchestrator.initialize().unwrap() {
            StartupOutcome::Loaded { parameters } => assert_eq!(parameters.len(), 3),
            other => panic!("expected Loaded, got {:?}", other),
        }
        assert_eq!(datastore.stats().range_queries, 0);
        assert_eq!(orchestrator.registry().trained_parameters().len(), 3);
    }

    #[test]
    fn test_initialize_trains_when_nothing_persisted() {
        let readings = (0..12).map(|h| water(h, 7.0 + (h % 4) as f64 * 0.1)).collect();
        let f = fixture(readings);

        match f.orchestrator.initialize().unwrap() {
            StartupOutcome::Trained(report) => assert_eq!(report.trained().len(), 3),
            other => panic!("expected Trained, got {:?}", other),
        }
    }

    #[test]
    fn test_report_serializes() {
        let readings = (0..12).map(|h| water(h, 7.0 + (h % 4) as f64 * 0.1)).collect();
        let f = fixture(readings);
        let report = f.orchestrator.run_training_cycle().unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcomes"]["ph"]["status"], "trained");
        assert_eq!(json["outcomes"]["co2"]["status"], "skipped");
    }
}
