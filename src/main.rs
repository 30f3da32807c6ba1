use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::unbounded;
use tracing::{error, info, warn};

use gesture_intent::clock::SystemClock;
use gesture_intent::config::{load_config, LoadedConfig};
use gesture_intent::control::spawn_hotkey_listener;
use gesture_intent::dispatch::{DispatchMode, Dispatcher};
use gesture_intent::engine::Engine;
use gesture_intent::hid::{shared, HidOutput, LogSink, SharedSink};
use gesture_intent::logging::{init_logging, LogConfig};
use gesture_intent::prediction_loader::spawn_line_reader;
use gesture_intent::runtime::Runtime;

/// Convierte predicciones de gestos en acciones de teclado, ratón, multimedia o HTTP
#[derive(Parser, Debug)]
#[command(name = "gesture-intent", version, about)]
struct Args {
    /// Documento JSON de configuración (recargable con F5 o `{"control": "reload_config"}`)
    #[arg(short, long, env = "GESTURE_INTENT_CONFIG")]
    config: Option<PathBuf>,

    /// Predicciones en líneas JSON; `-` para stdin
    #[arg(short, long, default_value = "-")]
    input: String,

    /// Registra las acciones en lugar de emitirlas por /dev/uinput
    #[arg(long)]
    dry_run: bool,

    /// Escucha F9/F10/F5/F12 en el teclado físico
    #[arg(long)]
    hotkeys: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(LogConfig {
        verbose: args.verbose,
    })?;

    info!("🎯 Gesture Intent - confirmación temporal y despacho de acciones");

    let config = match &args.config {
        Some(path) => load_config(path)
            .with_context(|| format!("No se pudo cargar la configuración {:?}", path))?,
        None => {
            warn!("⚠️  Sin archivo de configuración: ninguna acción enlazada");
            LoadedConfig::default()
        }
    };

    let (sink, mode): (SharedSink, DispatchMode) = if args.dry_run {
        info!("🔧 Modo: DRY-RUN (sin /dev/uinput ni peticiones HTTP)");
        (shared(LogSink), DispatchMode::DryRun)
    } else {
        let hid = HidOutput::new().context("No se pudo inicializar HID (/dev/uinput)")?;
        info!("✅ HID inicializado (/dev/uinput)");
        (shared(hid), DispatchMode::Live)
    };

    let dispatcher = Dispatcher::new(sink, mode).context("No se pudo crear el cliente HTTP")?;
    dispatcher.plugins().register_fn("log", |binding, ctx| {
        info!(
            "🔌 plugin log: {} ({:.0}%) {:?}",
            ctx.gesture,
            ctx.confidence * 100.0,
            binding.params
        );
        Ok(format!("registrado {}", ctx.gesture))
    });

    let engine = Engine::new(config, dispatcher, Arc::new(SystemClock));
    info!("📋 Acciones disponibles:");
    engine.log_available_actions();

    let (pred_tx, pred_rx) = unbounded();
    let (ctl_tx, ctl_rx) = unbounded();

    if args.hotkeys {
        match spawn_hotkey_listener(ctl_tx.clone()) {
            Ok(_) => info!("✅ Teclas de control activadas"),
            Err(e) => error!("❌ Teclas de control no disponibles: {}", e),
        }
    }

    let reader: Box<dyn BufRead + Send> = if args.input == "-" {
        info!("🎧 Leyendo predicciones de stdin");
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = File::open(&args.input)
            .with_context(|| format!("No se pudo abrir la entrada {:?}", args.input))?;
        info!("🎧 Leyendo predicciones de {}", args.input);
        Box::new(BufReader::new(file))
    };
    spawn_line_reader(reader, Arc::new(SystemClock), pred_tx, ctl_tx);

    let runtime = Runtime::new(&engine, args.config.clone());
    runtime.run(pred_rx, ctl_rx);

    let counters = engine.metrics_snapshot().counters;
    info!(
        "✅ {} confirmaciones, {} acciones ejecutadas, {} fallidas",
        counters.confirmations, counters.dispatched_ok, counters.dispatched_failed
    );
    Ok(())
}
