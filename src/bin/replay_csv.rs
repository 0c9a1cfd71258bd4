use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use quirobrazo::assembler::TrackingState;
use quirobrazo::calibration::CalibrationConfig;
use quirobrazo::csv_loader::load_frames_from_csv;
use quirobrazo::link::RecordingLink;
use quirobrazo::pipeline::Pipeline;

/// Reproduce un CSV de landmarks a través del pipeline completo sin hardware
#[derive(Parser, Debug)]
#[command(name = "replay_csv", version)]
struct Args {
    /// CSV con columnas frame,landmark,x,y,z
    csv: PathBuf,

    /// JSON de calibración (por defecto la tabla de fábrica)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Muestra las características geométricas de cada frame
    #[arg(long)]
    dump_features: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();
    println!("🎞️  Reproduciendo landmarks desde {:?}", args.csv);

    let config = match &args.config {
        Some(path) => CalibrationConfig::load(path)
            .with_context(|| format!("No se pudo leer la calibración {:?}", path))?,
        None => CalibrationConfig::default(),
    };
    let calibration = config.validate().context("Calibración inválida")?;

    let frames = load_frames_from_csv(&args.csv)?;
    let mut pipeline = Pipeline::new(&calibration, RecordingLink::new());

    println!("\n{:>6}  {:<8} {:<22} {}", "frame", "estado", "comando", "enviado");
    for (idx, detection) in frames.iter().enumerate() {
        let outcome = pipeline
            .process(detection.as_ref())
            .with_context(|| format!("Error procesando frame {}", idx))?;

        let state = match outcome.state {
            TrackingState::Tracking => "mano",
            TrackingState::NoHand => "sin mano",
        };
        println!(
            "{:>6}  {:<8} {:<22} {}",
            idx,
            state,
            outcome.command.to_string(),
            if outcome.transmitted { "📤" } else { "" }
        );

        if args.dump_features {
            if let Some(f) = outcome.features {
                println!(
                    "        palma={:>6.1} muñeca={:.4} tamaño={:.4} cierre={:.3}",
                    f.palm_angle, f.wrist_height, f.hand_size, f.closure_ratio
                );
            }
        }
    }

    let stats = pipeline.stats();
    println!(
        "\n📊 Frames: {}  con mano: {}  envíos: {}",
        stats.frames, stats.frames_with_hand, stats.writes
    );

    println!("\n🧱 Bytes enviados:");
    for bytes in pipeline.link().writes() {
        println!("  {:?}", bytes);
    }

    Ok(())
}
