//! Deadlock CLI - Command-line front end for the analysis core
//!
//! Usage:
//!   deadlock-cli scenarios
//!   deadlock-cli scenario dining_philosophers:5 > state.json
//!   deadlock-cli predict state.json
//!   deadlock-cli detect --algorithm dfs state.json
//!   cat state.json | deadlock-cli recover --format json
//!   deadlock-cli map-processes listing.json

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use deadlock_core::live::{self, ProcessListing};
use deadlock_core::scenarios::Scenario;
use deadlock_core::snapshot::{ProcessId, SystemSnapshot};
use deadlock_core::{AnalyzerConfig, CycleAlgorithm, DeadlockAnalyzer};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "deadlock-cli")]
#[command(about = "Deadlock prediction, detection and recovery", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    format: Format,

    /// Cycle detection algorithm: scc, dfs
    #[arg(short, long, env = "DEADLOCK_ALGORITHM", global = true)]
    algorithm: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List built-in scenarios
    Scenarios,

    /// Print a scenario snapshot (e.g. dining_philosophers:6)
    Scenario { name: String },

    /// Banker's safety check
    Predict { file: Option<PathBuf> },

    /// Wait-for graph cycle detection
    Detect { file: Option<PathBuf> },

    /// Detect, choose victims and preempt
    Recover { file: Option<PathBuf> },

    /// Enumerate every safe sequence (small inputs only)
    Sequences { file: Option<PathBuf> },

    /// Hot-spots, wait chains and capacity violations
    Diagnose { file: Option<PathBuf> },

    /// Map a {"processes": [...]} listing to a snapshot
    MapProcesses { file: Option<PathBuf> },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AnalyzerConfig::from_env().context("invalid DEADLOCK_* configuration")?;
    if let Some(algorithm) = &cli.algorithm {
        config.wfg.algorithm = algorithm.parse::<CycleAlgorithm>()?;
    }

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str())),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(config.logging.ansi),
        )
        .init();

    let analyzer = DeadlockAnalyzer::new(config);
    let format = cli.format;

    match cli.command {
        Commands::Scenarios => cmd_scenarios(format)?,
        Commands::Scenario { name } => {
            let scenario: Scenario = name.parse()?;
            print_snapshot(&scenario.build(), format)?;
        }
        Commands::Predict { file } => {
            let report = analyzer.predict(&load_snapshot(file)?)?;
            emit(&report, format, |r| {
                let verdict = if r.safe {
                    r.message.green().bold()
                } else {
                    r.message.red().bold()
                };
                println!("{} {}", verdict, r.details);
                if r.safe {
                    println!("  Safe sequence: {}", pid_list(&r.safe_sequence));
                }
                for violation in &r.over_allocated {
                    println!(
                        "  {} {} allocated {} of {}",
                        "!".yellow(),
                        violation.rid,
                        violation.allocated,
                        violation.total
                    );
                }
            })?;
        }
        Commands::Detect { file } => {
            let report = analyzer.detect(&load_snapshot(file)?)?;
            emit(&report, format, |r| {
                let message = if r.has_deadlock {
                    r.message.red().bold()
                } else {
                    r.message.green().bold()
                };
                println!("{} ({})", message, r.algorithm);
                for (i, cycle) in r.cycles.iter().enumerate() {
                    let pids: Vec<ProcessId> = cycle.iter().copied().collect();
                    println!("  Cycle {}: {}", i + 1, pid_list(&pids));
                }
            })?;
        }
        Commands::Recover { file } => {
            let report = analyzer.recover(&load_snapshot(file)?)?;
            emit(&report, format, |r| {
                println!("{}", r.message.cyan().bold());
                if !r.victims.is_empty() {
                    let status = if r.resolved {
                        "Deadlock resolved".green()
                    } else {
                        "Cycles remain after preemption".yellow()
                    };
                    println!("  {}", status);
                }
            })?;
        }
        Commands::Sequences { file } => {
            let report = analyzer.safe_sequences(&load_snapshot(file)?)?;
            emit(&report, format, |r| {
                println!("{} safe sequence(s)", r.count.to_string().bold());
                for sequence in &r.sequences {
                    println!("  {}", pid_list(sequence));
                }
            })?;
        }
        Commands::Diagnose { file } => {
            let report = analyzer.diagnose(&load_snapshot(file)?)?;
            emit(&report, format, |r| {
                println!("{}", "Diagnostics".cyan().bold());
                println!("  Hot-spots: {}", pid_list(&r.hotspots));
                println!("  Wait chains: {}", r.wait_chains.len());
                for chain in &r.wait_chains {
                    let marker = if chain.closes_cycle { " (cycle)" } else { "" };
                    println!("    {}{}", pid_list(&chain.path), marker);
                }
                if !r.dangling_pids.is_empty() {
                    println!("  Unknown pids in tables: {}", pid_list(&r.dangling_pids));
                }
                for violation in &r.over_allocated {
                    println!(
                        "  {} {} allocated {} of {}",
                        "!".yellow(),
                        violation.rid,
                        violation.allocated,
                        violation.total
                    );
                }
            })?;
        }
        Commands::MapProcesses { file } => {
            let listing: ProcessListing = serde_json::from_str(&read_input(file)?)
                .context("invalid process listing")?;
            print_snapshot(&live::to_snapshot(&listing), format)?;
        }
    }

    Ok(())
}

fn read_input(file: Option<PathBuf>) -> Result<String> {
    let mut raw = String::new();
    match file {
        Some(path) => {
            BufReader::new(File::open(&path).with_context(|| format!("cannot open {:?}", path))?)
                .read_to_string(&mut raw)?;
        }
        None => {
            io::stdin().read_to_string(&mut raw)?;
        }
    }
    Ok(raw)
}

fn load_snapshot(file: Option<PathBuf>) -> Result<SystemSnapshot> {
    let raw = read_input(file)?;
    let snapshot = SystemSnapshot::from_json(&raw).context("invalid snapshot")?;
    Ok(snapshot)
}

fn emit<T: Serialize>(report: &T, format: Format, text: impl FnOnce(&T)) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(report)?),
        Format::Text => text(report),
    }
    Ok(())
}

fn print_snapshot(snapshot: &SystemSnapshot, format: Format) -> Result<()> {
    if format == Format::Json {
        println!("{}", snapshot.to_json_pretty()?);
        return Ok(());
    }

    println!("{}", "Processes:".green().bold());
    for process in &snapshot.processes {
        println!("  {:>4}  {}", process.pid.as_u64(), process.name);
    }
    println!("{}", "Resources:".green().bold());
    for (rid, resource) in &snapshot.resources {
        println!("  {:<12} total {}", rid.as_str(), resource.total);
    }
    println!("{}", "Available:".green().bold());
    for (rid, units) in snapshot.available() {
        println!("  {:<12} {}", rid.as_str(), units);
    }
    Ok(())
}

fn cmd_scenarios(format: Format) -> Result<()> {
    let infos: Vec<_> = Scenario::ALL.iter().map(Scenario::info).collect();
    if format == Format::Json {
        println!("{}", serde_json::to_string_pretty(&infos)?);
        return Ok(());
    }

    println!("{}", "Scenarios".cyan().bold());
    println!("{}", "-".repeat(60));
    for info in infos {
        println!(
            "{:<22} {} [{} / {}]",
            info.key.bold(),
            info.name,
            info.kind,
            info.difficulty
        );
        println!("{:<22} {}", "", info.description.dimmed());
    }
    Ok(())
}

fn pid_list(pids: &[ProcessId]) -> String {
    let raw: Vec<u64> = pids.iter().map(ProcessId::as_u64).collect();
    format!("{:?}", raw)
}
