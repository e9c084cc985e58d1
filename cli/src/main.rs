
use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use motion2d::MotionError;
use motion2d::memory::OutputBuffer;
use motion2d::scene::Scene;
use motion2d::world::WorldConfig;
use tokio::time::MissedTickBehavior;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Scene(#[from] MotionError),
    #[error("json output failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("tick rate must be a positive number of ticks per second, got {0}")]
    InvalidRate(f64),
}

#[derive(Parser, Debug)]
#[command(name = "motion-cli", about = "Headless runner for motion2d scenes")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Drive a scene for a number of ticks.
    Run(RunArgs),
    /// Print the built-in demo scene as JSON.
    DemoScene,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[arg(long, env = "MOTION_SCENE", help = "Scene JSON file; the demo scene if omitted")]
    scene: Option<PathBuf>,

    #[arg(long, env = "MOTION_TICKS", default_value_t = 48)]
    ticks: u64,

    #[arg(long, default_value_t = false, help = "Pace ticks at the configured rate")]
    realtime: bool,

    #[arg(long, default_value_t = false, help = "Print one JSON tick report per line")]
    json: bool,

    #[command(flatten)]
    overrides: ConfigOverrides,
}

#[derive(Args, Debug, Default, Clone, Copy)]
struct ConfigOverrides {
    #[arg(long, env = "MOTION_TICK_HZ")]
    hz: Option<f64>,

    #[arg(long, env = "MOTION_ELASTICITY")]
    elasticity: Option<f64>,

    #[arg(long, env = "MOTION_MAX_VELOCITY")]
    max_velocity: Option<f64>,

    #[arg(long, env = "MOTION_MAX_ACCELERATION")]
    max_acceleration: Option<f64>,
}

impl ConfigOverrides {
    fn apply(self, config: &mut WorldConfig) -> Result<(), CliError> {
        if let Some(hz) = self.hz {
            config.tick_hz = hz;
        }
        if let Some(elasticity) = self.elasticity {
            config.elasticity = elasticity;
        }
        if self.max_velocity.is_some() {
            config.max_velocity = self.max_velocity;
        }
        if self.max_acceleration.is_some() {
            config.max_acceleration = self.max_acceleration;
        }
        if config.tick_period().is_zero() {
            return Err(CliError::InvalidRate(config.tick_hz));
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_writer(io::stderr).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => {
            let scene = load_scene(args.scene.as_ref())?;
            let mut stdout = io::stdout().lock();
            run_scene(scene, &args, &mut stdout).await?;
            Ok(())
        }
        Command::DemoScene => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{}", Scene::demo().to_json()?)?;
            Ok(())
        }
    }
}

fn load_scene(path: Option<&PathBuf>) -> Result<Scene, CliError> {
    let Some(path) = path else {
        return Ok(Scene::demo());
    };
    let json = std::fs::read_to_string(path)?;
    let scene = Scene::from_json(&json)?;
    tracing::info!(path = %path.display(), primary = %scene.primary, falling = %scene.falling, "scene loaded");
    Ok(scene)
}

/// Run `args.ticks` ticks of `scene`, writing diagnostics or tick reports to `out`.
/// Returns the number of ticks run.
async fn run_scene<W: Write>(mut scene: Scene, args: &RunArgs, out: &mut W) -> Result<u64, CliError> {
    args.overrides.apply(&mut scene.config)?;
    let period = scene.config.tick_period();
    let (mut world, mut host) = scene.into_world();
    let mut buffer = OutputBuffer::new();

    let mut interval = args.realtime.then(|| {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    for _ in 0..args.ticks {
        if let Some(interval) = interval.as_mut() {
            interval.tick().await;
        }
        let report = world.tick(&mut host, &mut buffer);
        if args.json {
            serde_json::to_writer(&mut *out, &report)?;
            writeln!(out)?;
        } else {
            writeln!(out, "tick {}", report.tick)?;
            for line in buffer.lines() {
                writeln!(out, "  {line}")?;
            }
        }
    }
    out.flush()?;

    tracing::info!(ticks = world.ticks(), period_ms = period.as_millis(), "run complete");
    Ok(world.ticks())
}
