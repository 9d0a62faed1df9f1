use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::Level;

use vocal_coach_core::config::EngineConfig;
use vocal_coach_core::engine::{EngineFacade, SimulatedProbe};
use vocal_coach_core::math::{
    self, analyze_frequency, calculate_rms, db_to_linear, linear_to_db, midi_to_frequency,
    midi_to_note_name, MinMax,
};
use vocal_coach_core::telemetry::{DiagnosticsCollector, DiagnosticsSink, FanoutSink, TracingSink};

/// Every event the engine publishes; `simulate` echoes these.
const ENGINE_EVENTS: &[&str] = &[
    "context:created",
    "context:statechange",
    "context:resumed",
    "context:suspended",
    "context:interrupted",
    "context:closed",
    "context:resume-escalated",
    "engine:initialized",
    "engine:started",
    "engine:stopped",
    "engine:destroyed",
    "microphone:attached",
    "error:occurred",
];

#[derive(Parser, Debug)]
#[command(
    name = "coach_cli",
    about = "Pitch math and simulated engine harness for Vocal Coach"
)]
struct Cli {
    /// Engine configuration JSON (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Nearest note, cents deviation and accuracy for a frequency
    Note {
        #[arg(long)]
        freq: f64,
    },
    /// Frequency and note name for a MIDI number
    Midi {
        #[arg(long)]
        number: i32,
    },
    /// Convert between linear amplitude and decibels
    Level {
        #[arg(long, conflicts_with = "db")]
        linear: Option<f64>,
        #[arg(long)]
        db: Option<f64>,
    },
    /// Summary statistics for comma-separated values
    Stats {
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        values: Vec<f64>,
    },
    /// Drive the engine against a simulated audio resource, printing every
    /// bus envelope as a JSON line
    Simulate {
        /// Number of resume requests the simulated platform rejects
        #[arg(long, default_value_t = 0)]
        fail_resumes: u32,
        /// Interrupt the running resource from outside, then resume again
        #[arg(long)]
        interrupt: bool,
        /// Print the collected diagnostics after the run
        #[arg(long)]
        trace: bool,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    vocal_coach_core::init_logging(if cli.verbose { Level::DEBUG } else { Level::WARN });

    let config = cli
        .config
        .as_ref()
        .map(EngineConfig::load_from_file)
        .unwrap_or_default();

    match cli.command {
        Commands::Note { freq } => run_note(&config, freq),
        Commands::Midi { number } => run_midi(number),
        Commands::Level { linear, db } => run_level(linear, db),
        Commands::Stats { values } => run_stats(&values),
        Commands::Simulate {
            fail_resumes,
            interrupt,
            trace,
        } => run_simulate(config, fail_resumes, interrupt, trace),
    }
}

fn run_note(config: &EngineConfig, freq: f64) -> Result<ExitCode> {
    let reading = analyze_frequency(freq, &config.accuracy)
        .ok_or_else(|| anyhow!("{} Hz is outside the MIDI range", freq))?;
    print_json(&reading)?;
    Ok(ExitCode::from(0))
}

fn run_midi(number: i32) -> Result<ExitCode> {
    let frequency = midi_to_frequency(number)
        .ok_or_else(|| anyhow!("MIDI number {} is outside 0..=127", number))?;
    let note = midi_to_note_name(number)
        .ok_or_else(|| anyhow!("MIDI number {} has no note name", number))?;
    print_json(&json!({ "midi": number, "frequency": frequency, "note": note }))?;
    Ok(ExitCode::from(0))
}

fn run_level(linear: Option<f64>, db: Option<f64>) -> Result<ExitCode> {
    let payload = match (linear, db) {
        (Some(linear), _) => json!({ "linear": linear, "db": finite_or_null(linear_to_db(linear)) }),
        (None, Some(db)) => json!({ "db": db, "linear": db_to_linear(db) }),
        (None, None) => return Err(anyhow!("pass --linear or --db")),
    };
    print_json(&payload)?;
    Ok(ExitCode::from(0))
}

#[derive(Serialize)]
struct StatsReport {
    count: usize,
    average: f64,
    standard_deviation: f64,
    range: MinMax,
    rms: f32,
}

fn run_stats(values: &[f64]) -> Result<ExitCode> {
    let samples: Vec<f32> = values.iter().map(|v| *v as f32).collect();
    let report = StatsReport {
        count: values.len(),
        average: math::average(values),
        standard_deviation: math::standard_deviation(values),
        range: math::min_max(values),
        rms: calculate_rms(&samples),
    };
    print_json(&report)?;
    Ok(ExitCode::from(0))
}

fn run_simulate(
    config: EngineConfig,
    fail_resumes: u32,
    interrupt: bool,
    trace: bool,
) -> Result<ExitCode> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    runtime.block_on(async move {
        let probe = Arc::new(SimulatedProbe::new().with_failing_resumes(fail_resumes));
        let collector = Arc::new(DiagnosticsCollector::default());
        let sink = FanoutSink::new(vec![
            Arc::new(TracingSink) as Arc<dyn DiagnosticsSink>,
            collector.clone() as Arc<dyn DiagnosticsSink>,
        ]);

        let mut engine = EngineFacade::builder()
            .config(config)
            .probe(probe.clone())
            .sink(Arc::new(sink))
            .build()?;

        for event in ENGINE_EVENTS {
            engine.bus().subscribe(
                event,
                |envelope| {
                    println!("{}", serde_json::to_string(envelope)?);
                    Ok(())
                },
                0,
            );
        }

        let mut exit = ExitCode::from(0);
        if let Err(err) = engine.start().await {
            eprintln!("start failed: {err}");
            exit = ExitCode::from(2);
        }

        if engine.is_ready() {
            engine.attach_microphone("simulated-mic")?;
        }

        if interrupt {
            if let Some(resource) = probe.last_resource() {
                resource.interrupt();
                engine.sync_external_state();
                // A fresh user gesture is what brings the resource back.
                if let Err(err) = engine.start().await {
                    eprintln!("restart after interruption failed: {err}");
                    exit = ExitCode::from(2);
                }
            }
        }

        let status = engine.status();
        engine.stop().await?;
        engine.destroy().await?;

        eprintln!("{}", serde_json::to_string_pretty(&status)?);
        if trace {
            eprintln!("{}", serde_json::to_string_pretty(&collector.snapshot())?);
        }
        Ok::<_, anyhow::Error>(exit)
    })
}

fn finite_or_null(value: f64) -> serde_json::Value {
    if value.is_finite() {
        json!(value)
    } else {
        serde_json::Value::Null
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
