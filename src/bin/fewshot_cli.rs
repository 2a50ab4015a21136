use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use few_shot_classifier::analysis::ClassificationResult;
use few_shot_classifier::config::AppConfig;
use few_shot_classifier::engine::{ClassifierEngine, SceneControl, SyntheticFrameSource};
use futures::StreamExt;
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "fewshot_cli",
    about = "Synthetic-camera harness for the few-shot classifier"
)]
struct Cli {
    /// Configuration file (defaults are used when missing or invalid)
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record examples for every class, then classify one frame per class
    Session {
        #[arg(long, default_value_t = 5)]
        examples_per_class: usize,
        /// Per-pixel noise of the synthetic camera
        #[arg(long, default_value_t = 0.02)]
        noise: f32,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Record examples, then run the tick loop and print predictions as JSON lines
    Stream {
        #[arg(long, default_value_t = 5)]
        examples_per_class: usize,
        /// Scene the camera shows while streaming
        #[arg(long, default_value_t = 0)]
        scene: usize,
        #[arg(long, default_value_t = 500)]
        duration_ms: u64,
    },
    /// Print the effective configuration
    DumpConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    few_shot_classifier::init_logging();
    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli
        .config
        .map(AppConfig::load_from_file)
        .unwrap_or_default();

    match cli.command {
        Commands::Session {
            examples_per_class,
            noise,
            output,
        } => run_session(config, examples_per_class, noise, output).await,
        Commands::Stream {
            examples_per_class,
            scene,
            duration_ms,
        } => run_stream(config, examples_per_class, scene, duration_ms).await,
        Commands::DumpConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::from(0))
        }
    }
}

/// Engine over a synthetic camera, started, with `per_class` examples of
/// scene `i` recorded for class `i`
fn trained_engine(
    config: AppConfig,
    per_class: usize,
    noise: f32,
) -> Result<(ClassifierEngine, SceneControl)> {
    let source = SyntheticFrameSource::new(&config.extractor, config.extractor.seed).with_noise(noise);
    let scene = source.scene_control();
    let mut engine = ClassifierEngine::builder(config)
        .frame_source(source)
        .build()
        .context("building engine")?;
    engine.start().context("starting engine")?;

    for class in 0..engine.labels().len() {
        scene.set(class);
        for _ in 0..per_class {
            engine
                .record_example(class)
                .with_context(|| format!("recording class {}", class))?;
        }
    }
    Ok((engine, scene))
}

async fn run_session(
    config: AppConfig,
    per_class: usize,
    noise: f32,
    output_path: Option<PathBuf>,
) -> Result<ExitCode> {
    let (mut engine, scene) = trained_engine(config, per_class, noise)?;

    let mut checks = Vec::new();
    for class in 0..engine.labels().len() {
        scene.set(class);
        let result = engine
            .classify()
            .await
            .with_context(|| format!("classifying scene {}", class))?;
        checks.push(CheckPayload {
            scene: class,
            correct: result.top_class() == Some(class),
            result,
        });
    }
    engine.shutdown();

    let correct = checks.iter().filter(|check| check.correct).count();
    let report = SessionReportPayload {
        classes: engine.labels().iter().map(|label| label.name.as_str()).collect(),
        examples_per_class: per_class,
        correct,
        checks: &checks,
    };
    let json = serde_json::to_string_pretty(&report)?;

    if let Some(path) = output_path {
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    } else {
        println!("{json}");
    }

    if correct == checks.len() {
        Ok(ExitCode::from(0))
    } else {
        Ok(ExitCode::from(2))
    }
}

async fn run_stream(
    config: AppConfig,
    per_class: usize,
    scene_index: usize,
    duration_ms: u64,
) -> Result<ExitCode> {
    let noise = 0.02;
    let (mut engine, scene) = trained_engine(config, per_class, noise)?;
    scene.set(scene_index);

    let mut predictions = engine.broadcasts().prediction_stream();
    let printer = tokio::spawn(async move {
        while let Some(item) = predictions.next().await {
            // Lagged receivers skip ahead; nothing to report for the gap
            if let Ok(result) = item {
                match serde_json::to_string(&result) {
                    Ok(line) => println!("{line}"),
                    Err(err) => eprintln!("Error: {err}"),
                }
            }
        }
    });

    let controller = engine.controller();
    let stopper = async {
        tokio::time::sleep(Duration::from_millis(duration_ms)).await;
        controller.stop()
    };
    let (outcome, stopped) = tokio::join!(engine.run(), stopper);
    outcome.context("running tick loop")?;
    stopped.context("stopping tick loop")?;

    drop(engine);
    printer.await.context("joining prediction printer")?;
    Ok(ExitCode::from(0))
}

#[derive(Serialize)]
struct CheckPayload {
    scene: usize,
    correct: bool,
    result: ClassificationResult,
}

#[derive(Serialize)]
struct SessionReportPayload<'a> {
    classes: Vec<&'a str>,
    examples_per_class: usize,
    correct: usize,
    #[serde(skip_serializing_if = "slice_empty")]
    checks: &'a [CheckPayload],
}

fn slice_empty(checks: &&[CheckPayload]) -> bool {
    checks.is_empty()
}
