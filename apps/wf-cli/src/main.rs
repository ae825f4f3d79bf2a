use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use wf_engine::CircuitType;
use wf_sim::{SimOptions, SimRun};
use wf_store::SnapshotStore;

#[derive(Parser)]
#[command(name = "wf")]
#[command(about = "warmflow - multi-zone heating controller toolkit", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a controller configuration file
    Validate {
        /// Path to the controller YAML file
        config_path: PathBuf,
    },
    /// Run a simulation scenario
    Run {
        /// Path to the scenario YAML file
        scenario_path: PathBuf,
        /// Directory for the manifest and timeseries output
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Override the scenario duration in seconds
        #[arg(long)]
        duration: Option<f64>,
        /// Seconds of simulated time between controller ticks
        #[arg(long)]
        interval: Option<f64>,
        /// Record every Nth tick
        #[arg(long, default_value_t = 1)]
        record_every: usize,
    },
    /// Inspect a runtime snapshot file
    Snapshot {
        /// Path to the snapshot JSON file
        snapshot_path: PathBuf,
    },
}

/// Result type for CLI commands
type CliResult<T> = Result<T, CliError>;

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Store(#[from] wf_store::StoreError),

    #[error(transparent)]
    Sim(#[from] wf_sim::SimError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn main() -> CliResult<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config_path } => cmd_validate(&config_path),
        Commands::Run {
            scenario_path,
            out,
            duration,
            interval,
            record_every,
        } => cmd_run(&scenario_path, out.as_deref(), duration, interval, record_every),
        Commands::Snapshot { snapshot_path } => cmd_snapshot(&snapshot_path),
    }
}

fn cmd_validate(config_path: &Path) -> CliResult<()> {
    println!("Validating configuration: {}", config_path.display());
    let config = wf_store::load_config(config_path)?;
    println!("✓ Configuration is valid");

    if !config.name.is_empty() {
        println!("  Controller: {}", config.name);
    }
    println!("  Zones: {}", config.zones.len());
    for zone in &config.zones {
        let circuit = match zone.circuit {
            CircuitType::Regular => "regular",
            CircuitType::Flush => "flush",
        };
        println!(
            "    {} - {} ({}, setpoint {:.1} C)",
            zone.id,
            zone.display_name(),
            circuit,
            zone.setpoint_c
        );
    }
    println!(
        "  Observation period: {:.0} s, min run {:.0} s",
        config.timing.observation_period_s, config.timing.min_run_time_s
    );
    println!(
        "  Flush circuit: {}",
        if config.flush_enabled {
            "enabled"
        } else {
            "disabled"
        }
    );
    Ok(())
}

fn cmd_run(
    scenario_path: &Path,
    out: Option<&Path>,
    duration: Option<f64>,
    interval: Option<f64>,
    record_every: usize,
) -> CliResult<()> {
    println!("Running scenario: {}", scenario_path.display());
    let scenario = wf_sim::load_scenario(scenario_path)?;

    let mut options = SimOptions {
        t_end_s: duration,
        record_every,
        ..Default::default()
    };
    if let Some(interval) = interval {
        options.loop_interval_s = interval;
    }

    let run = wf_sim::run_scenario(&scenario, &options)?;

    println!("✓ Simulation completed: {}", run.manifest.run_id);
    println!(
        "  Simulated {:.0} s from {} in {} ticks",
        run.manifest.duration_s, run.manifest.started_at, run.manifest.ticks
    );
    println!("  Records: {}", run.records.len());

    if let Some(last) = run.records.last() {
        println!(
            "  Final state: mode {} ({}), heat {}",
            last.mode.as_str(),
            last.status.as_str(),
            if last.heat_request { "on" } else { "off" }
        );
        for (id, zone) in &last.zones {
            let temperature = zone
                .temperature_c
                .map(|t| format!("{:.1} C", t))
                .unwrap_or_else(|| "no reading".to_string());
            let duty = zone
                .duty_cycle
                .map(|d| format!("{:.0}%", d))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "    {}: valve {}, {}, duty {}",
                id,
                if zone.valve_on { "on" } else { "off" },
                temperature,
                duty
            );
        }
    }

    if let Some(dir) = out {
        write_run(dir, &run)?;
    }

    Ok(())
}

fn write_run(dir: &Path, run: &SimRun) -> CliResult<()> {
    std::fs::create_dir_all(dir)?;

    let manifest_path = dir.join("manifest.json");
    std::fs::write(&manifest_path, serde_json::to_string_pretty(&run.manifest)?)?;
    println!("✓ Wrote {}", manifest_path.display());

    // One JSON record per line, ready for streaming consumers.
    let records_path = dir.join("records.jsonl");
    let mut lines = String::new();
    for record in &run.records {
        lines.push_str(&serde_json::to_string(record)?);
        lines.push('\n');
    }
    std::fs::write(&records_path, lines)?;
    println!(
        "✓ Wrote {} ({} records)",
        records_path.display(),
        run.records.len()
    );

    Ok(())
}

fn cmd_snapshot(snapshot_path: &Path) -> CliResult<()> {
    println!("Loading snapshot: {}", snapshot_path.display());

    let store = SnapshotStore::new(snapshot_path);
    let Some(snapshot) = store.load()? else {
        println!("No snapshot file at this path");
        return Ok(());
    };

    println!("✓ Snapshot is readable (version {})", snapshot.version);
    if let Some(mode) = snapshot.controller_mode {
        println!("  Mode: {}", mode.as_str());
    }
    if let Some(flush_enabled) = snapshot.flush_enabled {
        println!(
            "  Flush circuit: {}",
            if flush_enabled { "enabled" } else { "disabled" }
        );
    }
    println!("  Zones: {}", snapshot.zones.len());
    for (id, zone) in &snapshot.zones {
        let mut parts = Vec::new();
        if let Some(setpoint) = zone.setpoint {
            parts.push(format!("setpoint {:.1} C", setpoint));
        }
        if let Some(temperature) = zone.temperature {
            parts.push(format!("temp {:.1} C", temperature));
        }
        if let Some(duty) = zone.duty_cycle {
            parts.push(format!("duty {:.0}%", duty));
        }
        if let Some(status) = zone.zone_status {
            parts.push(status.as_str().to_string());
        }
        if let Some(enabled) = zone.enabled {
            if !enabled {
                parts.push("disabled".to_string());
            }
        }
        if parts.is_empty() {
            println!("    {}", id);
        } else {
            println!("    {}: {}", id, parts.join(", "));
        }
    }

    Ok(())
}
