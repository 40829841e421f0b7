//! Retraining Service
//!
//! Wires the lifecycle to file-backed collaborators and keeps models fresh
//! until interrupted:
//!
//! ```text
//! readings.jsonl ──► TrainingOrchestrator ──► ModelRegistry ──► PredictionEngine
//!                          │    ▲                                     │
//!                          ▼    │ startup                             ▼
//!                        models/*.json                          forecast printout
//! ```
//!
//! Usage:
//!
//! ```text
//! cargo run -p envguard-ml --example retraining_service -- \
//!     readings.jsonl models/ WATER_001
//! ```
//!
//! Set `ENVGUARD_CONFIG` to a JSON file to override lifecycle settings.

use std::sync::Arc;

use envguard_connectors::{FileArtifactStore, JsonlDatastore};
use envguard_core::SystemTime;
use envguard_ml::{
    LifecycleConfig, ModelRegistry, ModelStore, PredictionEngine, RetrainingClock, StartupOutcome,
    TrainingOrchestrator,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let readings_path = args.next().unwrap_or_else(|| "readings.jsonl".to_string());
    let models_dir = args.next().unwrap_or_else(|| "models".to_string());
    let sensor_id = args.next().unwrap_or_else(|| "WATER_001".to_string());

    let config = match std::env::var("ENVGUARD_CONFIG") {
        Ok(path) => LifecycleConfig::from_json_file(path)?,
        Err(_) => LifecycleConfig::default(),
    };
    config.validate()?;

    let datastore = Arc::new(JsonlDatastore::new(&readings_path));
    let registry = Arc::new(ModelRegistry::with_config(&config));
    let store = ModelStore::new(Arc::new(FileArtifactStore::new(&models_dir)?));
    let clock = Arc::new(SystemTime);

    let orchestrator = Arc::new(TrainingOrchestrator::new(
        datastore.clone(),
        registry.clone(),
        store,
        clock.clone(),
        config.clone(),
    ));
    let engine = PredictionEngine::new(datastore, registry.clone(), clock, &config);

    println!("=== EnvGuard Retraining Service ===");
    println!("Readings: {}", readings_path);
    println!("Models:   {}", models_dir);

    let startup = Arc::clone(&orchestrator);
    match tokio::task::spawn_blocking(move || startup.initialize()).await? {
        Ok(StartupOutcome::Loaded { parameters }) => {
            println!("Loaded persisted models for {:?}", parameters)
        }
        Ok(StartupOutcome::Trained(report)) => {
            println!("Trained at startup: {:?}", report.trained());
            println!("Skipped: {:?}", report.skipped());
        }
        Err(err) => println!("Startup training failed, serving untrained: {}", err),
    }

    println!("\nModel status:");
    for status in registry.status() {
        let trained_at = status
            .trained_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        println!("  {:<16} trained: {:<5} at {}", status.parameter.to_string(), status.trained, trained_at);
    }

    let forecast = engine.forecast(&sensor_id, 1)?;
    if forecast.is_empty() {
        println!("\nNo forecast for {}", sensor_id);
    } else {
        println!("\nOne-hour forecast for {}:", sensor_id);
        for (parameter, p) in &forecast.predictions {
            println!(
                "  {:<16} {:>8.2} -> {:>8.2} ({:?}){}",
                parameter.to_string(),
                p.current_value,
                p.predicted_value,
                p.predicted_status,
                if p.is_anomaly { "  ANOMALY" } else { "" }
            );
        }
    }

    let handle = RetrainingClock::start(Arc::clone(&orchestrator), config.retrain_interval());
    println!(
        "\nRetraining every {:?}; press Ctrl-C to stop",
        config.retrain_interval()
    );

    tokio::signal::ctrl_c().await?;
    let cycles = handle.shutdown().await;
    println!("Stopped after {} scheduled cycles", cycles);

    Ok(())
}
