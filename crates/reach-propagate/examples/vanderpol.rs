//! Example: Van der Pol reachability, printed as JSON.
//!
//! Usage: cargo run --example vanderpol -- [t_end] [tensor_order]
//!
//! Set RUST_LOG=debug for per-step summaries.

use ndarray::arr1;
use reach_propagate::models::VanDerPol;
use reach_propagate::{Model, NonlinearSystem, ReachOptions, Zonotope};
use std::env;

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let t_end: f64 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(1.0);
    let tensor_order: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(2);

    let r0 = match Zonotope::from_bounds(arr1(&[1.35, 2.35]), arr1(&[1.45, 2.45])) {
        Ok(z) => z,
        Err(e) => {
            eprintln!("Invalid initial set: {}", e);
            std::process::exit(1);
        }
    };
    let options = ReachOptions::new(t_end, 0.02, vec![r0], Zonotope::zero(1))
        .with_tensor_order(tensor_order);
    let system = NonlinearSystem::new(Model::new(VanDerPol));

    match system.reach(&options) {
        Ok(result) => {
            eprintln!(
                "{} steps, {} error iterations, {} ms",
                result.stats.steps, result.stats.error_iterations, result.stats.wall_time_ms
            );
            let hulls: Vec<_> = (0..result.len())
                .filter_map(|k| result.time_point_hull(k))
                .map(|h| (h.lower.to_vec(), h.upper.to_vec()))
                .collect();
            match serde_json::to_string_pretty(&hulls) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("Serialization failed: {}", e),
            }
        }
        Err(failure) => {
            eprintln!("{}", failure);
            std::process::exit(1);
        }
    }
}
