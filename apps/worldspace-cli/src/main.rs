use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use worldspace_kernel::{UpdatePhase, World, WorldConfig, saturating_duration};
use worldspace_persist::{SceneSnapshot, SnapshotStore};
use worldspace_tools::WorldInspector;

mod demo;

#[derive(Parser)]
#[command(name = "worldspace-cli", about = "Drive a worldspace world from the command line")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// World configuration as JSON; missing fields take their defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and the effective world configuration
    Info,
    /// Run the demo scene and report frame statistics
    Simulate {
        /// Number of frames to run
        #[arg(short, long, default_value = "120")]
        frames: u64,
        /// Number of orbiting bodies
        #[arg(short, long, default_value = "1000")]
        bodies: usize,
        /// Override the time step in milliseconds
        #[arg(long)]
        step_ms: Option<f64>,
        /// Print the object hierarchy at the end
        #[arg(long)]
        hierarchy: bool,
    },
    /// Simulate, save a snapshot, then restore it into a fresh world
    Snapshot {
        /// Snapshot store directory
        #[arg(short, long, default_value = "worldspace-snapshots")]
        out: PathBuf,
        /// Number of orbiting bodies
        #[arg(short, long, default_value = "50")]
        bodies: usize,
        /// Frames to run before capturing
        #[arg(short, long, default_value = "60")]
        frames: u64,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<WorldConfig> {
    let Some(path) = path else {
        return Ok(WorldConfig::default());
    };
    let file = std::fs::File::open(path).with_context(|| format!("opening config {}", path.display()))?;
    let config = serde_json::from_reader(file).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Info => {
            println!("worldspace-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("max worlds: {}", worldspace_kernel::MAX_WORLDS);
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Simulate {
            frames,
            bodies,
            step_ms,
            hierarchy,
        } => {
            let mut world = World::new(config)?;
            demo::build_scene(&mut world, bodies)?;
            let step = step_ms.map(|ms| saturating_duration(ms / 1000.0));

            for _ in 0..frames {
                match step {
                    Some(step) => world.update_with_step(step),
                    None => world.update(),
                };
            }

            println!("{}", WorldInspector::summary(&world));
            let stats = world.stats();
            println!(
                "frame time: avg={:?} min={:?} max={:?}",
                stats.frame_time.average(),
                stats.frame_time.min(),
                stats.frame_time.max()
            );
            for phase in UpdatePhase::ALL {
                println!("  {:<15} avg={:?}", phase.name(), stats.phase_time(phase).average());
            }
            if hierarchy {
                for line in WorldInspector::hierarchy(&world) {
                    println!("{line}");
                }
            }
        }
        Commands::Snapshot { out, bodies, frames } => {
            let mut world = World::new(config.clone())?;
            demo::build_scene(&mut world, bodies)?;
            for _ in 0..frames {
                world.update();
            }

            let snapshot = SceneSnapshot::capture(&world)?;
            let mut store = SnapshotStore::open(&out)?;
            let index = store.save(&snapshot)?;
            println!(
                "Saved snapshot #{index} ({}): frame={} objects={} components={}",
                snapshot.id,
                snapshot.frame,
                snapshot.objects.len(),
                snapshot.component_count()
            );

            let store = SnapshotStore::open(&out)?;
            store.verify_integrity()?;
            let loaded = store.load(index)?;

            let mut restored = World::new(config)?;
            restored.get_or_create_module::<worldspace_stream::SpatialGridModule>()?;
            let report = loaded.restore(&mut restored, &demo::loaders())?;
            restored.update();
            println!(
                "Restored: objects={} components={} (source: objects={})",
                report.objects.len(),
                report.components.len(),
                world.objects().len()
            );
        }
    }

    Ok(())
}
