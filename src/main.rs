/*
Control de brazo robótico por pose de la mano - Rust + detector externo

Sistema que:
1. Recibe los 21 landmarks de la mano por frame (JSON por línea) desde
   stdin, un archivo o un subproceso detector (MediaPipe)
2. Calcula ángulo de palma, altura de muñeca, tamaño de mano y cierre
3. Calibra cada valor al rango del actuador
4. Envía [joint1, joint2, joint3, pinza] por puerto serie sólo si cambió

Para ejecutar con un detector:
     ./target/release/quirobrazo --port /dev/ttyACM0 -- python3 hand_detect.py

Sin hardware (modo DEBUG):
     ./target/release/quirobrazo --dry-run --input landmarks.jsonl
*/

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossbeam_channel::bounded;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use quirobrazo::calibration::CalibrationConfig;
use quirobrazo::csv_loader::LandmarkCsvWriter;
use quirobrazo::landmark_source::{start_landmark_reader, DetectorProcess, SourceError};
use quirobrazo::link::{ActuatorLink, DryRunLink, SerialLink};
use quirobrazo::pipeline::Pipeline;
use quirobrazo::types::Detection;

/// Frames en vuelo entre el lector y el bucle de proceso
const FRAME_QUEUE: usize = 4;

#[derive(Parser, Debug)]
#[command(name = "quirobrazo", version, about = "Pose de la mano -> comandos seriales del brazo")]
struct Args {
    /// Puerto serie del microcontrolador
    #[arg(long, default_value = "/dev/ttyACM0")]
    port: String,

    #[arg(long, default_value_t = 115_200)]
    baud: u32,

    /// Timeout de escritura del puerto serie; al vencer es un error fatal
    #[arg(long, default_value_t = 1000)]
    write_timeout_ms: u64,

    /// No abre el puerto serie: sólo muestra los comandos
    #[arg(long)]
    dry_run: bool,

    /// JSON de calibración (por defecto la tabla de fábrica)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Imprime la calibración efectiva en JSON y sale
    #[arg(long)]
    print_config: bool,

    /// Archivo JSON-lines con detecciones, o "-" para stdin
    #[arg(long, default_value = "-")]
    input: String,

    /// Graba los landmarks recibidos en CSV (reproducible con replay_csv)
    #[arg(long)]
    record: Option<PathBuf>,

    /// Comando del detector y sus argumentos (tras `--`)
    #[arg(last = true)]
    detector: Vec<String>,
}

type ReaderHandle = JoinHandle<Result<u64, SourceError>>;

/// Lanza el hilo lector. Con detector, el proceso queda en manos del
/// llamador: se mata al soltarlo y su código de salida se comprueba al final.
fn spawn_source(
    args: &Args,
    tx: crossbeam_channel::Sender<Detection>,
) -> Result<(ReaderHandle, Option<DetectorProcess>)> {
    if let Some((program, program_args)) = args.detector.split_first() {
        println!("🔧 Fuente: detector {:?}", args.detector);
        let (detector, output) = DetectorProcess::spawn(program, program_args)
            .context("No se pudo iniciar el detector de landmarks")?;
        let reader = thread::spawn(move || start_landmark_reader(output, tx));
        return Ok((reader, Some(detector)));
    }

    if args.input == "-" {
        println!("🔧 Fuente: stdin");
        let reader = thread::spawn(move || {
            let stdin = io::stdin();
            start_landmark_reader(stdin.lock(), tx)
        });
        return Ok((reader, None));
    }

    println!("🔧 Fuente: {}", args.input);
    let file = File::open(&args.input)
        .with_context(|| format!("No se pudo abrir la entrada {:?}", args.input))?;
    let reader = thread::spawn(move || start_landmark_reader(BufReader::new(file), tx));
    Ok((reader, None))
}

fn open_link(args: &Args) -> Result<Box<dyn ActuatorLink>> {
    if args.dry_run {
        println!("🔧 Modo: DEBUG - sin puerto serie\n");
        return Ok(Box::new(DryRunLink::new()));
    }

    let link = SerialLink::open(
        &args.port,
        args.baud,
        Duration::from_millis(args.write_timeout_ms),
    )
    .with_context(|| format!("No se pudo abrir el puerto serie {}", args.port))?;
    println!("✅ Puerto serie {} @ {} baudios\n", args.port, args.baud);
    Ok(Box::new(link))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => CalibrationConfig::load(path)
            .with_context(|| format!("No se pudo leer la calibración {:?}", path))?,
        None => CalibrationConfig::default(),
    };

    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    println!("🤖 Control de brazo por pose de la mano\n");

    // Configuración inválida: no se arranca
    let calibration = config.validate().context("Calibración inválida")?;
    info!(?calibration, "calibración validada");

    // El puerto se abre antes que la fuente: sin actuador no tiene sentido
    // lanzar el detector
    let link = open_link(&args)?;

    let mut recorder = args
        .record
        .as_ref()
        .map(LandmarkCsvWriter::create)
        .transpose()?;

    let (tx, rx) = bounded::<Detection>(FRAME_QUEUE);
    // Si el bucle sale con error, `detector` se suelta y el hijo muere
    let (reader, detector) = spawn_source(&args, tx)?;

    let mut pipeline = Pipeline::new(&calibration, link);
    println!("🎬 Estado inicial {}\n", pipeline.command());

    for detection in rx.iter() {
        if let Some(recorder) = recorder.as_mut() {
            recorder.write_detection(&detection)?;
        }

        let outcome = pipeline.process(detection.as_ref())?;
        if outcome.transmitted {
            println!("📤 {}", outcome.command);
        }
    }

    if let Some(recorder) = recorder.as_mut() {
        recorder.flush()?;
    }

    let frames = reader
        .join()
        .map_err(|_| anyhow!("El hilo lector de landmarks terminó con pánico"))?
        .context("Error en la fuente de landmarks")?;

    // EOF del detector: sólo es fin de entrada si salió limpio
    if let Some(detector) = detector {
        detector
            .finish()
            .context("El detector de landmarks terminó con error")?;
    }

    let stats = pipeline.stats();
    if stats.frames != frames {
        warn!(read = frames, processed = stats.frames, "frames leídos y procesados no coinciden");
    }
    println!(
        "\n👋 Fin de la entrada. Frames: {}  con mano: {}  envíos: {}",
        stats.frames, stats.frames_with_hand, stats.writes
    );

    Ok(())
}
