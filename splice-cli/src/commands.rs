//! CLI command implementations

use std::time::Duration;

use anyhow::Context;
use clap::Subcommand;
use splice_core::TrackType;
use splice_core::config::SpliceConfig;
use splice_sim::{PlaybackReport, ScenarioKind, ScenarioRunner};

/// Seed used when neither the flag nor `SPLICE_SIMULATION_SEED` provides one.
const DEFAULT_SEED: u64 = 42;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Play a simulated segment layout through the reader
    Simulate {
        /// Scenario to run; all scenarios when omitted
        #[arg(short, long)]
        scenario: Option<ScenarioKind>,
        /// Seed for the segment layout
        #[arg(long)]
        seed: Option<u64>,
        /// Segments per track
        #[arg(long, default_value = "8")]
        segments: usize,
        /// Simulated per-call reader latency in milliseconds
        #[arg(long)]
        latency_ms: Option<u64>,
        /// Print reports as JSON
        #[arg(long)]
        json: bool,
        /// Include the reader's debug dump in text output
        #[arg(long)]
        debug_report: bool,
    },
    /// List available scenarios
    Scenarios,
}

/// Handle the CLI command
///
/// # Errors
/// Returns an error if a scenario fails to run or violates an invariant
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Simulate {
            scenario,
            seed,
            segments,
            latency_ms,
            json,
            debug_report,
        } => {
            let mut config = SpliceConfig::from_env();
            config.simulation.deterministic_seed =
                Some(seed.or(config.simulation.deterministic_seed).unwrap_or(DEFAULT_SEED));
            if let Some(latency) = latency_ms {
                config.simulation.reader_latency_ms = latency;
            }
            run_simulation(config, scenario, segments, json, debug_report).await
        }
        Commands::Scenarios => {
            list_scenarios();
            Ok(())
        }
    }
}

async fn run_simulation(
    config: SpliceConfig,
    scenario: Option<ScenarioKind>,
    segments: usize,
    json: bool,
    debug_report: bool,
) -> anyhow::Result<()> {
    let kinds = match scenario {
        Some(kind) => vec![kind],
        None => ScenarioKind::ALL.to_vec(),
    };
    let runner = ScenarioRunner::new(config).segments(segments);

    let mut failed = 0;
    for kind in kinds {
        let report = runner
            .run(kind)
            .await
            .with_context(|| format!("scenario {kind} failed"))?;
        if !report.is_clean() {
            failed += 1;
        }

        if json {
            println!("{}", report.to_json()?);
        } else {
            print_report(&report, debug_report);
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} scenario(s) violated playback invariants");
    }
    Ok(())
}

fn print_report(report: &PlaybackReport, debug_report: bool) {
    println!("Scenario: {} (seed {})", report.scenario, report.seed);
    println!("{:-<60}", "");
    println!("Duration: {:.3}s", report.duration().as_secs_f64());
    if let Some(target) = report.seek_target_ms {
        let landed = report
            .seek_landed_ms
            .map(|ms| format_secs(Duration::from_millis(ms)))
            .unwrap_or_else(|| "canceled".to_string());
        println!(
            "Seek: {} -> {}",
            format_secs(Duration::from_millis(target)),
            landed
        );
    }

    for track in TrackType::ALL {
        let Some(summary) = report.track(track) else {
            continue;
        };
        println!(
            "  {:<5} samples={:<4} keyframes={:<4} segments={:<3} waits={:<3} max_gap={}ms end={}",
            track,
            summary.samples,
            summary.keyframes,
            summary.readers_used.len(),
            summary.waits,
            summary.max_gap_ms,
            summary
                .last_end_ms
                .map(|ms| format_secs(Duration::from_millis(ms)))
                .unwrap_or_else(|| "-".to_string()),
        );
    }
    println!("Buffered: {}", report.buffered);

    if report.is_clean() {
        println!("Invariants: ok");
    } else {
        println!("Invariants:");
        for violation in &report.violations {
            println!("  {violation}");
        }
    }

    if debug_report {
        println!();
        print!("{}", report.debug);
    }
    println!();
}

fn list_scenarios() {
    println!("Available scenarios");
    println!("{:-<60}", "");
    for kind in ScenarioKind::ALL {
        println!("  {:<12} {}", kind.as_str(), kind.description());
    }
}

fn format_secs(duration: Duration) -> String {
    format!("{:.3}s", duration.as_secs_f64())
}
