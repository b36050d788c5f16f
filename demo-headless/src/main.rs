use atmos_sim_core::{AtmosConfig, AtmosSimulation, TileCoord, TileKind, TileMap, Vec3};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Atmosphere simulation demo: a pressurised room breached to space
#[derive(Parser, Debug)]
#[command(name = "atmos-sim-demo")]
#[command(about = "Headless atmos simulation demo", long_about = None)]
struct Args {
    /// Room width in tiles, walls included
    #[arg(long, default_value_t = 12)]
    width: i32,

    /// Room depth in tiles, walls included
    #[arg(long, default_value_t = 12)]
    depth: i32,

    /// Number of ticks to run
    #[arg(short, long, default_value_t = 600)]
    ticks: u64,

    /// Tick at which the east wall is opened to space (0 = never)
    #[arg(short, long, default_value_t = 100)]
    breach_tick: u64,

    /// Report every N ticks
    #[arg(short, long, default_value_t = 25)]
    report_interval: u64,

    /// Tiles per chunk side
    #[arg(long, default_value_t = 16)]
    chunk_size: usize,

    /// Dedicated worker threads (default: shared rayon pool)
    #[arg(long)]
    threads: Option<usize>,

    /// JSON file with config overrides
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the final statistics as JSON
    #[arg(long)]
    json: bool,
}

fn load_config(args: &Args) -> Result<AtmosConfig, String> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
            serde_json::from_str(&text)
                .map_err(|e| format!("failed to parse {}: {e}", path.display()))?
        }
        None => AtmosConfig::default(),
    };
    if args.threads.is_some() {
        config.worker_threads = args.threads;
    }
    Ok(config)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    if args.width < 3 || args.depth < 3 {
        error!("Room must be at least 3x3 tiles to hold any floor");
        return ExitCode::FAILURE;
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    println!("=== Atmos Simulation Demo ===\n");

    let max = TileCoord::new(args.width - 1, args.depth - 1);
    let mut map = TileMap::new(args.chunk_size, args.chunk_size);
    map.room(TileCoord::new(0, 0), max);

    let mut sim = match AtmosSimulation::new(config, &map) {
        Ok(sim) => sim,
        Err(e) => {
            error!("Failed to create simulation: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mid = args.depth / 2;
    let breach = TileCoord::new(max.x, mid);
    let centre = Vec3::new((args.width / 2) as f32, 0.0, mid as f32);
    let near_breach = Vec3::new((max.x - 1) as f32, 0.0, mid as f32);

    println!(
        "Room {}x{} tiles, {} cells, {:.1} mol of gas",
        args.width,
        args.depth,
        sim.cells().len(),
        sim.total_moles()
    );
    println!("Centre pressure: {:.2} kPa\n", sim.pressure_at(centre));

    println!("  Tick | Active | Semi | Inactive | Total mol | Drained | Centre kPa | Breach kPa | Breathable");
    println!("-------|--------|------|----------|-----------|---------|------------|------------|-----------");

    for tick in 1..=args.ticks {
        if tick == args.breach_tick {
            map.set(breach, TileKind::Space);
            if let Err(e) = sim.rebuild(&map) {
                error!("Rebuild after breach failed: {e}");
                return ExitCode::FAILURE;
            }
            info!("Hull breached at ({}, {})", breach.x, breach.y);
        }

        let stats = *sim.step();

        if tick % args.report_interval.max(1) == 0 || tick == args.ticks {
            println!(
                "{:6} | {:6} | {:4} | {:8} | {:9.2} | {:7.3} | {:10.2} | {:10.2} | {}",
                stats.tick,
                stats.active_cells,
                stats.semiactive_cells,
                stats.inactive_cells,
                stats.total_moles,
                stats.drained_moles,
                sim.pressure_at(centre),
                sim.pressure_at(near_breach),
                if sim.breathable_at(centre) { "yes" } else { "NO" }
            );
        }

        if sim.is_stabilized() && (args.breach_tick == 0 || tick > args.breach_tick) {
            println!("\nAtmosphere settled after {tick} ticks");
            break;
        }
    }

    println!("\n=== Simulation Complete ===");
    let stats = sim.stats();
    println!("Simulated time: {:.1}s", stats.simulation_time);
    println!("Gas remaining: {:.2} mol", stats.total_moles);
    println!("Last tick took {:.3} ms", stats.step_time_ms);

    if args.json {
        match serde_json::to_string_pretty(stats) {
            Ok(json) => println!("{json}"),
            Err(e) => error!("Failed to serialise stats: {e}"),
        }
    }

    ExitCode::SUCCESS
}
