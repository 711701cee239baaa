use std::path::PathBuf;

use clap::Parser;
use tracing::error;

use world_generator::biomes::Biome;
use world_generator::logging::init_logging;
use world_generator::{GeneratorConfig, WorldGenerator, WorldSeeds};

#[derive(Parser, Debug)]
#[command(name = "world_generator")]
#[command(about = "Generate procedural 2D world maps with rivers, biomes and regions")]
struct Args {
    /// Width of the map in cells
    #[arg(short = 'W', long, default_value = "256")]
    width: usize,

    /// Height of the map in cells
    #[arg(short = 'H', long, default_value = "256")]
    height: usize,

    /// Random seed (uses random seed if not specified)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Minimum region area before merging (overrides config)
    #[arg(long)]
    min_area: Option<usize>,

    /// Number of rivers to trace (overrides config)
    #[arg(long)]
    rivers: Option<usize>,

    /// JSON configuration file; missing fields keep their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let args = Args::parse();
    init_logging(&args.log_level);

    let mut config = match &args.config {
        Some(path) => match GeneratorConfig::from_json_file(path) {
            Ok(config) => config,
            Err(e) => {
                error!(path = %path.display(), "{}", e);
                std::process::exit(1);
            }
        },
        None => GeneratorConfig::default(),
    };
    if let Some(min_area) = args.min_area {
        config.regions.min_area = min_area;
    }
    if let Some(rivers) = args.rivers {
        config.hydrology.river_count = rivers;
    }

    let seeds = match args.seed {
        Some(seed) => WorldSeeds::from_master(seed),
        None => WorldSeeds::default(),
    };

    println!("Generating world with seed: {}", seeds.master);
    println!("Map size: {}x{}", args.width, args.height);

    let world = match WorldGenerator::with_seeds(args.width, args.height, seeds, config) {
        Ok(world) => world,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    println!("{}", world.seeds());
    let config = world.config();
    println!(
        "Config: {} rivers, min region area {}, {} erosion passes",
        config.hydrology.river_count, config.regions.min_area, config.erosion_iterations
    );

    let elevation = world.elevation_stats();
    println!("Elevation: min {:.3} max {:.3} mean {:.3}", elevation.min, elevation.max, elevation.mean);

    let rs = world.river_stats();
    println!(
        "Rivers: {} traced, {} skipped, {} steps, {} branches",
        rs.rivers_traced, rs.rivers_skipped, rs.steps, rs.branches
    );
    let lakes = world.lake_counts();
    println!(
        "Lakes: {} cells ({:.1}%)",
        lakes.true_count,
        100.0 * lakes.true_count as f64 / lakes.total as f64
    );

    let total = (world.width() * world.height()) as f64;
    println!("\nBiome distribution:");
    for (biome, count) in Biome::ALL.iter().zip(world.biome_counts()) {
        if count > 0 {
            println!("  {:<20} {:>8} ({:>5.1}%)", biome.display_name(), count, 100.0 * count as f64 / total);
        }
    }

    let stats = world.region_stats();
    println!("\nRegions: {} ({} found, {} merged)", stats.count, stats.discovered, stats.merged);
    println!(
        "  Size: smallest {} largest {} mean {:.1}, {} below minimum",
        stats.smallest, stats.largest, stats.mean_size, stats.undersized
    );

    println!("\nTimings:");
    for timing in world.timings() {
        println!("  {:<12} {:?}", timing.phase, timing.elapsed);
    }
}
