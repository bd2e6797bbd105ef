//! qlink Simulator CLI
//!
//! Run canned quantum network scenarios over parallel agents.

use clap::Parser;
use qlink_sim::scenarios::ScenarioId;
use qlink_sim::{RunExport, ScenarioRunner, SimConfig};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// qlink quantum network simulator CLI
#[derive(Parser, Debug)]
#[command(name = "qlink-sim")]
#[command(about = "Run quantum network scenarios over parallel agents", long_about = None)]
struct Args {
    /// Scenario to run (teleportation, superdense_coding, lossy_relay, swarm, corrupted_link, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Master seed for determinism (0 = random from time) [default: from config, 42]
    #[arg(short, long)]
    seed: Option<u64>,

    /// Number of consecutive seeds to run (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Systems in the arena
    #[arg(long)]
    systems: Option<usize>,

    /// Agents in the swarm ring
    #[arg(short, long)]
    agents: Option<usize>,

    /// Link length in km
    #[arg(short, long)]
    length: Option<f64>,

    /// Per-hop loss probability on the relay
    #[arg(long)]
    loss: Option<f64>,

    /// JSON config file; flags override its fields
    #[arg(short, long)]
    config: Option<String>,

    /// Draw per-agent progress bars
    #[arg(long)]
    progress: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export every result to a JSON file
    #[arg(long)]
    export: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Loads the config file (if any) and applies flag overrides.
    fn sim_config(&self) -> Result<SimConfig, qlink_sim::HarnessError> {
        let mut config = match &self.config {
            Some(path) => SimConfig::load(path)?,
            None => SimConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(systems) = self.systems {
            config.systems = systems;
        }
        if let Some(agents) = self.agents {
            config.agents = agents;
        }
        if let Some(length) = self.length {
            config.length_km = length;
        }
        if let Some(loss) = self.loss {
            config.loss = loss;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    if !args.json {
        info!("qlink Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let config = args.sim_config().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    });

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            eprintln!("Available scenarios: teleportation, superdense_coding, lossy_relay, swarm, corrupted_link, all");
            std::process::exit(1);
        })]
    };

    // Determine base seed
    let base_seed = if config.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos() as u64)
            .unwrap_or(1)
    } else {
        config.seed
    };

    let mut export = RunExport::new(base_seed, config.clone());

    // Run simulations
    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = ScenarioRunner::new(seed, config.clone()).with_progress(args.progress && !args.json);

        for scenario in &scenarios {
            let result = runner.run(*scenario);

            if !args.json {
                if result.passed {
                    info!(
                        "✓ {} (seed={}) PASSED in {:.2}s wall, {:.3e}s simulated",
                        scenario.name(),
                        seed,
                        result.wall_time_secs,
                        result.final_time_secs
                    );
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }

            export.add_result(result);
        }
    }

    if let Some(path) = &args.export {
        match export.write_to_file(path) {
            Ok(()) => info!("Exported {} results to {}", export.total, path),
            Err(e) => error!("Failed to write export: {:?}", e),
        }
    }

    if args.json {
        // JSON output for CI parsing
        let summary = serde_json::json!({
            "run_id": export.run_id,
            "total": export.total,
            "passed": export.passed,
            "failed": export.failed,
            "results": export.results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "time_secs": r.final_time_secs,
                    "wall_secs": r.wall_time_secs,
                    "failure_reason": r.failure_reason,
                    "metrics": r.metrics,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("Failed to render summary: {}", e),
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if export.failed == 0 {
            info!("✅ All {} scenario runs passed!", export.total);
        } else {
            error!("❌ {}/{} scenario runs failed!", export.failed, export.total);

            // List failed seeds
            for result in export.failures() {
                error!(
                    "  - {} seed={}: {}",
                    result.scenario.name(),
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    // Exit with proper code for CI
    if export.failed > 0 {
        std::process::exit(1);
    }
}
