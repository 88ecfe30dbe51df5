//! furcat - interactive 3D cat viewer
//!
//! Main entry point for the CLI application.

use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use furcat::{
    assets::SceneAssets,
    avatar::PresentationMode,
    clock::FrameClock,
    config::Config,
    CatScene, HeadlessSink,
};

/// Headless frame rate.
const HEADLESS_STEP: f32 = 1.0 / 60.0;

/// furcat - shell-furred cat with expressions and a horror mode
#[derive(Parser, Debug)]
#[command(name = "furcat", version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// glTF/GLB model (overrides config)
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Fur pattern image (overrides config)
    #[arg(long)]
    fur_texture: Option<PathBuf>,

    /// Environment image for ambient light (overrides config)
    #[arg(long)]
    environment: Option<PathBuf>,

    /// Number of fur shells (overrides config)
    #[arg(long)]
    shells: Option<u32>,

    /// Start in horror mode
    #[arg(long)]
    horror: bool,

    /// Run the frame loop without a window
    #[arg(long)]
    headless: bool,

    /// Frames to run in headless mode
    #[arg(long, default_value_t = 120)]
    frames: u64,

    /// Expression to trigger on the first headless frame (repeatable)
    #[arg(long = "trigger", value_name = "NAME")]
    triggers: Vec<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .init();

    info!("Starting {} v{}", furcat::NAME, furcat::VERSION);

    let config = load_config(&args)?;

    info!("Model: {}", config.assets.model.display());
    info!("Fur shells: {}", config.fur.shell_count);
    info!("Start mode: {:?}", config.appearance.mode);

    let assets = SceneAssets::load(&config)?;
    let scene = CatScene::new(assets, &config)?;

    if args.headless {
        return run_headless(scene, args.frames, &args.triggers);
    }

    run_window(scene, &config)
}

/// Load configuration and apply CLI overrides, then validate.
fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = Config::load(args.config.as_deref())?;

    if let Some(ref model) = args.model {
        config.assets.model = model.clone();
    }
    if let Some(ref texture) = args.fur_texture {
        config.assets.fur_texture = texture.clone();
    }
    if let Some(ref environment) = args.environment {
        config.assets.environment = Some(environment.clone());
    }
    if let Some(shells) = args.shells {
        config.fur.shell_count = shells;
    }
    if args.horror {
        config.appearance.mode = PresentationMode::Horror;
    }

    config.validate()?;
    Ok(config)
}

fn run_headless(mut scene: CatScene, frames: u64, triggers: &[String]) -> anyhow::Result<()> {
    info!("Running {} headless frames", frames);

    let mut clock = FrameClock::fixed(HEADLESS_STEP);
    let mut sink = HeadlessSink::default();

    for frame in 0..frames {
        let time = clock.tick();
        if frame == 0 {
            for name in triggers {
                if !scene.trigger_expression(name) {
                    warn!("Unknown expression: {}", name);
                }
            }
        }
        scene.run_frame(time, &mut sink)?;
    }

    let mut peaks: Vec<_> = sink.peak_weights.iter().filter(|(_, w)| **w > 0.0).collect();
    peaks.sort_by(|a, b| a.0.cmp(b.0));

    info!(
        "Rendered {} frames over {:.2}s (mode: {:?}, placeholder: {})",
        sink.frames,
        sink.last_elapsed,
        scene.presentation().mode(),
        scene.model().is_placeholder
    );
    for (name, weight) in peaks {
        info!("Peak {}: {:.3}", name, weight);
    }
    if let Some(fur) = scene.fur() {
        info!("Fur: {} shells, time {:.2}", fur.shell_count(), fur.time());
    }

    Ok(())
}

#[cfg(feature = "native-ui")]
fn run_window(scene: CatScene, config: &Config) -> anyhow::Result<()> {
    info!("Launching native UI window");
    furcat::ui::FurcatApp::run(scene, &config.window)
        .map_err(|e| anyhow::anyhow!("UI error: {}", e))?;
    info!("UI window closed");
    Ok(())
}

#[cfg(not(feature = "native-ui"))]
fn run_window(_scene: CatScene, _config: &Config) -> anyhow::Result<()> {
    anyhow::bail!("built without the native-ui feature; use --headless")
}
