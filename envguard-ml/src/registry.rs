//! In-memory model registry
//!
//! Holds the current triple for every parameter, one slot each. Readers
//! clone an `Arc` out of a slot under a short read lock and then work on
//! that snapshot, so a concurrent [`replace`](ModelRegistry::replace) never
//! mixes generations inside one prediction.

use std::mem;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use envguard_core::Parameter;
use serde::Serialize;

use crate::{LifecycleConfig, LoadedModels, ModelTriple};

/// Training state of one parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterStatus {
    /// Parameter
    pub parameter: Parameter,
    /// Whether a fitted triple is published
    pub trained: bool,
    /// When the published triple was trained
    pub trained_at: Option<DateTime<Utc>>,
}

/// One triple per parameter, indexed by [`Parameter::index`]
type Slots = [Arc<ModelTriple>; Parameter::COUNT];

/// Current model triple for every parameter
pub struct ModelRegistry {
    triples: RwLock<Slots>,
}

impl ModelRegistry {
    /// Registry with an untrained triple for every parameter
    pub fn new() -> Self {
        Self::with_config(&LifecycleConfig::default())
    }

    /// Registry whose untrained triples carry `config`'s hyperparameters
    pub fn with_config(config: &LifecycleConfig) -> Self {
        let triples = Parameter::ALL.map(|p| Arc::new(ModelTriple::untrained(p, config)));
        Self {
            triples: RwLock::new(triples),
        }
    }

    // A panicking writer can only have been between whole-slot writes,
    // so every slot is still consistent
    fn read(&self) -> RwLockReadGuard<'_, Slots> {
        self.triples.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Slots> {
        self.triples.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current triple for a parameter
    pub fn get(&self, parameter: Parameter) -> Arc<ModelTriple> {
        Arc::clone(&self.read()[parameter.index()])
    }

    /// Publish a new triple, returning the one it replaced
    pub fn replace(&self, triple: impl Into<Arc<ModelTriple>>) -> Arc<ModelTriple> {
        let triple = triple.into();
        let parameter = triple.parameter();
        let previous = mem::replace(&mut self.write()[parameter.index()], triple);
        log::debug!("Published new model triple for {}", parameter);
        previous
    }

    /// Publish every triple that was loaded from storage
    pub fn install(&self, loaded: LoadedModels) -> usize {
        let mut triples = self.write();
        let count = loaded.triples.len();
        for triple in loaded.triples {
            let idx = triple.parameter().index();
            triples[idx] = Arc::new(triple);
        }
        count
    }

    /// Training state of every parameter, in canonical order
    pub fn status(&self) -> Vec<ParameterStatus> {
        let triples = self.read();
        Parameter::ALL
            .iter()
            .map(|&parameter| {
                let triple = &triples[parameter.index()];
                ParameterStatus {
                    parameter,
                    trained: triple.is_trained(),
                    trained_at: triple.trained_at(),
                }
            })
            .collect()
    }

    /// Parameters with a fitted triple
    pub fn trained_parameters(&self) -> Vec<Parameter> {
        let triples = self.read();
        Parameter::ALL
            .into_iter()
            .filter(|p| triples[p.index()].is_trained())
            .collect()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
