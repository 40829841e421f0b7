//! Model artifact persistence
//!
//! Each triple is stored as three JSON blobs:
//!
//! | Key                   | Body                           |
//! |-----------------------|--------------------------------|
//! | `{parameter}_model`   | Random forest regressor        |
//! | `{parameter}_scaler`  | Feature layout + scaler        |
//! | `{parameter}_anomaly` | Isolation forest               |
//!
//! Every blob carries a header with the parameter, the blob kind and the
//! training time of the triple it came from. Loading requires all three
//! blobs to exist and to agree on parameter and training time, so a save
//! that was interrupted halfway never produces a mixed triple.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use envguard_core::{ArtifactStore, FeatureLayout, Parameter};
use serde::{Deserialize, Serialize};

use crate::triple::DETECTOR_WIDTH;
use crate::{IsolationForest, ModelTriple, PersistenceError, RandomForestRegressor, StandardScaler};

/// Bumped whenever a body format changes incompatibly
const FORMAT_VERSION: u32 = 1;

/// The three blobs of a triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Regressor
    Model,
    /// Layout and scaler
    Scaler,
    /// Anomaly detector
    Anomaly,
}

impl ArtifactKind {
    /// All kinds, in write order
    pub const ALL: [ArtifactKind; 3] = [ArtifactKind::Model, ArtifactKind::Scaler, ArtifactKind::Anomaly];

    fn suffix(self) -> &'static str {
        match self {
            ArtifactKind::Model => "model",
            ArtifactKind::Scaler => "scaler",
            ArtifactKind::Anomaly => "anomaly",
        }
    }
}

/// Store key for one blob, e.g. `"ph_scaler"`
pub fn artifact_key(parameter: Parameter, kind: ArtifactKind) -> String {
    format!("{}_{}", parameter.name(), kind.suffix())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ArtifactHeader {
    format_version: u32,
    parameter: Parameter,
    kind: ArtifactKind,
    generation: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct Artifact<T> {
    header: ArtifactHeader,
    body: T,
}

#[derive(Serialize, Deserialize)]
struct ScalerBody {
    layout: FeatureLayout,
    scaler: StandardScaler,
}

/// Result of loading every parameter at startup
#[derive(Debug, Default)]
pub struct LoadedModels {
    /// Triples that loaded completely
    pub triples: Vec<ModelTriple>,
    /// Parameters that stay untrained, and why
    pub skipped: Vec<(Parameter, PersistenceError)>,
}

impl LoadedModels {
    /// Whether at least one triple loaded
    pub fn success(&self) -> bool {
        !self.triples.is_empty()
    }
}

/// Saves and loads model triples through an [`ArtifactStore`]
#[derive(Clone)]
pub struct ModelStore {
    store: Arc<dyn ArtifactStore>,
}

impl ModelStore {
    /// Wrap an artifact store
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }

    /// Persist a trained triple
    ///
    /// All three blobs are encoded before the first write.
    pub fn save(&self, triple: &ModelTriple) -> Result<(), PersistenceError> {
        let parameter = triple.parameter();
        let generation = match triple.trained_at() {
            Some(at) if triple.is_trained() => at,
            _ => return Err(PersistenceError::Untrained(parameter)),
        };
        let header = |kind| ArtifactHeader {
            format_version: FORMAT_VERSION,
            parameter,
            kind,
            generation,
        };

        let model = serde_json::to_vec(&Artifact {
            header: header(ArtifactKind::Model),
            body: triple.regressor(),
        })?;
        let scaler = serde_json::to_vec(&Artifact {
            header: header(ArtifactKind::Scaler),
            body: ScalerBody {
                layout: triple.layout().clone(),
                scaler: triple.scaler().clone(),
            },
        })?;
        let anomaly = serde_json::to_vec(&Artifact {
            header: header(ArtifactKind::Anomaly),
            body: triple.detector(),
        })?;

        for (kind, blob) in ArtifactKind::ALL.into_iter().zip([model, scaler, anomaly]) {
            self.store.write(&artifact_key(parameter, kind), &blob)?;
        }

        log::debug!("Saved model artifacts for {} (generation {})", parameter, generation);
        Ok(())
    }

    /// Load one parameter's triple
    pub fn load(&self, parameter: Parameter) -> Result<ModelTriple, PersistenceError> {
        let mut missing = Vec::new();
        for kind in ArtifactKind::ALL {
            let key = artifact_key(parameter, kind);
            if !self.store.exists(&key)? {
                missing.push(key);
            }
        }
        if !missing.is_empty() {
            return Err(PersistenceError::Incomplete { parameter, missing });
        }

        let model: Artifact<RandomForestRegressor> = self.read(parameter, ArtifactKind::Model)?;
        let scaler: Artifact<ScalerBody> = self.read(parameter, ArtifactKind::Scaler)?;
        let anomaly: Artifact<IsolationForest> = self.read(parameter, ArtifactKind::Anomaly)?;

        let inconsistent = |reason| PersistenceError::Inconsistent { parameter, reason };

        let generation = model.header.generation;
        if scaler.header.generation != generation || anomaly.header.generation != generation {
            return Err(inconsistent("artifacts come from different training runs"));
        }

        let ScalerBody { layout, scaler } = scaler.body;
        let (regressor, detector) = (model.body, anomaly.body);

        if layout.target() != parameter {
            return Err(inconsistent("layout targets another parameter"));
        }
        if !(scaler.is_fitted() && regressor.is_fitted() && detector.is_fitted()) {
            return Err(inconsistent("artifact holds an unfitted model"));
        }
        let width = layout.width();
        if scaler.width() != width + 1
            || regressor.num_features() != width
            || detector.num_features() != DETECTOR_WIDTH
        {
            return Err(inconsistent("model widths do not match the layout"));
        }

        Ok(ModelTriple::from_parts(layout, scaler, regressor, detector, generation))
    }

    fn read<T>(&self, parameter: Parameter, kind: ArtifactKind) -> Result<Artifact<T>, PersistenceError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let blob = self.store.read(&artifact_key(parameter, kind))?;
        let artifact: Artifact<T> = serde_json::from_slice(&blob)?;

        let header = &artifact.header;
        if header.format_version != FORMAT_VERSION {
            return Err(PersistenceError::Inconsistent {
                parameter,
                reason: "unsupported artifact format version",
            });
        }
        if header.parameter != parameter || header.kind != kind {
            return Err(PersistenceError::Inconsistent {
                parameter,
                reason: "artifact header does not match its key",
            });
        }
        Ok(artifact)
    }

    /// Load every parameter, collecting failures instead of stopping
    pub fn load_all(&self) -> LoadedModels {
        let mut loaded = LoadedModels::default();
        for parameter in Parameter::ALL {
            match self.load(parameter) {
                Ok(triple) => loaded.triples.push(triple),
                Err(err) => {
                    log::debug!("No usable artifacts for {}: {}", parameter, err);
                    loaded.skipped.push((parameter, err));
                }
            }
        }
        loaded
    }
}
