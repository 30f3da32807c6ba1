use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use gesture_intent::clock::{Clock, ManualClock};
use gesture_intent::config::{load_config, LoadedConfig};
use gesture_intent::confirmation::AgreementPolicy;
use gesture_intent::dispatch::{DispatchMode, Dispatcher};
use gesture_intent::engine::{Engine, Outcome};
use gesture_intent::hid::{shared, RecordingSink};
use gesture_intent::logging::{init_logging, LogConfig};
use gesture_intent::prediction_loader::load_predictions_csv;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Policy {
    Contiguous,
    Majority,
}

/// Reproduce un CSV `timestamp_ms,label,confidence` sin tocar el sistema
#[derive(Parser, Debug)]
#[command(name = "replay_predictions", version)]
struct Args {
    csv: PathBuf,

    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Sustituye la política de acuerdo del archivo de configuración
    #[arg(long, value_enum)]
    policy: Option<Policy>,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(LogConfig {
        verbose: args.verbose,
    })?;

    let mut config = match &args.config {
        Some(path) => load_config(path)
            .with_context(|| format!("No se pudo cargar la configuración {:?}", path))?,
        None => LoadedConfig::default(),
    };
    if let Some(policy) = args.policy {
        config.smoothing.policy = match policy {
            Policy::Contiguous => AgreementPolicy::Contiguous,
            Policy::Majority => AgreementPolicy::Majority,
        };
    }

    let clock = Arc::new(ManualClock::new());
    let predictions = load_predictions_csv(&args.csv, clock.now())
        .with_context(|| format!("No se pudo leer {:?}", args.csv))?;
    println!(
        "🎞️  Reproduciendo {} predicciones desde {:?} ({:?})",
        predictions.len(),
        args.csv,
        config.smoothing.policy
    );

    let recorder = RecordingSink::new();
    let dispatcher = Dispatcher::new(shared(recorder.clone()), DispatchMode::DryRun)?;
    let engine = Engine::new(config, dispatcher, clock.clone());
    let start = clock.now();

    for prediction in &predictions {
        clock.set(prediction.timestamp);
        let Some(outcome) = engine.process(prediction) else {
            continue;
        };

        let t_ms = prediction.timestamp.saturating_duration_since(start).as_millis();
        let intent = outcome.intent();
        let verdict = match &outcome {
            Outcome::Dispatched { binding, result, .. } => {
                let events = recorder.take();
                format!(
                    "{} {} `{}` ({}, {} eventos HID)",
                    if result.ok { "✅" } else { "❌" },
                    binding.kind,
                    binding.command,
                    result.detail,
                    events.len()
                )
            }
            Outcome::Disabled { .. } => "⏸️  deshabilitado".to_string(),
            Outcome::CoolingDown { remaining, .. } => {
                format!("⏳ cooldown ({} ms)", remaining.as_millis())
            }
            Outcome::Unbound { .. } => "⚠️  sin acción".to_string(),
        };
        println!(
            "  {:>7} ms  🎯 {:<12} {:>5.1}%  {}",
            t_ms,
            intent.group.as_str(),
            intent.confidence * 100.0,
            verdict
        );
    }

    let snapshot = engine.metrics_snapshot();
    println!(
        "\n📊 {} predicciones, {} confirmaciones, {} ejecutadas, {} en cooldown, {:.1} fps",
        snapshot.counters.predictions,
        snapshot.counters.confirmations,
        snapshot.counters.dispatched_ok,
        snapshot.counters.suppressed_cooldown,
        snapshot.fps
    );
    Ok(())
}
