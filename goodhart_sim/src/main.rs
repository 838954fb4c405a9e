//! Goodhart ecosystem simulator CLI
//!
//! Run seeded multi-actor evaluation-ecosystem scenarios.

use clap::Parser;
use goodhart_sim::scenarios::ScenarioId;
use goodhart_sim::{RunExport, ScenarioResult, ScenarioRunner};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Goodhart ecosystem simulation CLI
#[derive(Parser, Debug)]
#[command(name = "goodhart-sim")]
#[command(about = "Run seeded AI-evaluation ecosystem scenarios", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Override the scenario's default round count
    #[arg(short, long)]
    rounds: Option<u64>,

    /// Scenario to run (stable_duopoly, gaming_spiral, regulator_response,
    /// vc_momentum, full_ecosystem, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of consecutive seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export the full round history to a JSON file (single scenario only)
    #[arg(long)]
    export: Option<String>,

    /// Append each completed round to a JSON-lines log as the run
    /// progresses; an interrupted run keeps every finished round
    #[arg(long)]
    round_log: Option<String>,
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("failed to set tracing subscriber");
    }

    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            eprintln!(
                "Available scenarios: stable_duopoly, gaming_spiral, regulator_response, vc_momentum, full_ecosystem, all"
            );
            std::process::exit(1);
        })]
    };

    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    if !args.json {
        info!("Goodhart ecosystem simulator");
    }

    // Export mode: single scenario, full history to disk.
    if let Some(export_path) = &args.export {
        if scenarios.len() > 1 {
            eprintln!("Error: --export only supports a single scenario, not 'all'");
            std::process::exit(1);
        }
        let scenario = scenarios[0];

        let mut runner = ScenarioRunner::new(base_seed);
        if let Some(rounds) = args.rounds {
            runner = runner.with_rounds(rounds);
        }
        if let Some(path) = &args.round_log {
            runner = runner.with_round_log(path);
        }
        let (result, history) = runner.run_collecting(scenario);

        let mut export = RunExport::new(scenario.name(), base_seed);
        for record in history {
            export.add_record(record);
        }
        export.finalize(result.passed, result.failure_reason.clone());
        if let Err(e) = export.write_to_file(export_path) {
            error!("Failed to write export: {e}");
        } else {
            info!("Exported {} rounds to {}", export.records.len(), export_path);
        }

        report_and_exit(&[result], args.json);
    }

    let mut all_results: Vec<ScenarioResult> = Vec::new();
    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let mut runner = ScenarioRunner::new(seed);
        if let Some(rounds) = args.rounds {
            runner = runner.with_rounds(rounds);
        }
        if let Some(path) = &args.round_log {
            runner = runner.with_round_log(path);
        }

        for scenario in &scenarios {
            let result = runner.run(*scenario);
            if !args.json {
                if result.passed {
                    info!("PASS {} (seed={})", scenario.name(), seed);
                } else {
                    error!(
                        "FAIL {} (seed={}): {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }
            all_results.push(result);
        }
    }

    report_and_exit(&all_results, args.json);
}

fn report_and_exit(results: &[ScenarioResult], json: bool) -> ! {
    let total = results.len();
    let failed: Vec<&ScenarioResult> = results.iter().filter(|r| !r.passed).collect();
    let passed = total - failed.len();

    if json {
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed.len(),
            "results": results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "rounds": r.rounds,
                    "validity_correlation": r.metrics.validity_correlation,
                    "min_validity": r.metrics.min_validity,
                    "benchmark_count": r.metrics.benchmark_count,
                    "mandates_issued": r.metrics.mandates_issued,
                    "avg_satisfaction": r.metrics.avg_satisfaction,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("failed to serialize summary: {e}"),
        }
    } else if failed.is_empty() {
        info!("All {} scenario runs passed", total);
    } else {
        error!("{}/{} scenario runs failed", failed.len(), total);
        for result in &failed {
            error!(
                "  - {} seed={}: {}",
                result.scenario.name(),
                result.seed,
                result.failure_reason.as_deref().unwrap_or("unknown")
            );
        }
    }

    std::process::exit(if failed.is_empty() { 0 } else { 1 });
}
