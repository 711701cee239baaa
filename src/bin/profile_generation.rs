//! Profiling tool to identify performance bottlenecks

use std::time::{Duration, Instant};

use world_generator::{GeneratorConfig, WorldGenerator};

fn main() {
    let seed = 1337u64;
    let sizes = [(128, 128), (256, 256), (512, 256)];

    println!("=== Performance Profiling ===");
    println!("Rayon threads: {}", rayon::current_num_threads());
    println!();

    let config = GeneratorConfig::default();

    for (width, height) in sizes {
        println!("Map size: {}x{} ({} cells)", width, height, width * height);

        let start = Instant::now();
        let world = match WorldGenerator::with_config(width, height, seed, config.clone()) {
            Ok(world) => world,
            Err(e) => {
                eprintln!("generation failed: {}", e);
                std::process::exit(1);
            }
        };
        let total = start.elapsed();

        let phase_total: Duration = world.timings().iter().map(|t| t.elapsed).sum();
        for timing in world.timings() {
            println!(
                "  {:<12} {:>8.2}% ({:?})",
                timing.phase,
                100.0 * timing.elapsed.as_secs_f64() / phase_total.as_secs_f64(),
                timing.elapsed
            );
        }
        println!("  ─────────────────────────────────");
        println!("  Total:       {:?}", total);
        println!(
            "  {} rivers, {} regions ({} merged)",
            world.river_stats().rivers_traced,
            world.region_stats().count,
            world.region_stats().merged
        );
        println!();
    }
}
