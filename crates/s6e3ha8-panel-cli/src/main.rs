//! S6E3HA8 Panel Control Tool
//!
//! Rehearses the panel bring-up sequence against bench hardware, with
//! optional fault injection, and prints the panel's display mode.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use s6e3ha8_panel_hw::bench::{Bench, Fault};
use s6e3ha8_panel_hw::binding::{self, PanelRegistry, COMPATIBLE};
use s6e3ha8_panel_hw::{Connector, FailurePolicy, Operation, Panel};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "s6e3ha8ctl")]
#[command(about = "Bring-up rehearsal tool for the S6E3HA8 panel")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the display mode the panel reports
    Modes {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run bind, prepare, enable, disable, unprepare and unbind on the bench
    Sequence {
        /// Inject a fault: supply:NAME, command:NAME|0xNN, not-ready:NAME, acquire:NAME, attach
        #[arg(long = "fail", value_name = "FAULT")]
        faults: Vec<Fault>,

        /// Run without a reset GPIO
        #[arg(long)]
        no_reset: bool,

        /// Power the panel down again when prepare fails
        #[arg(long)]
        power_down_on_failure: bool,
    },
    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Modes { json } => handle_modes(&config, json),
        Commands::Sequence {
            faults,
            no_reset,
            power_down_on_failure,
        } => handle_sequence(config, faults, no_reset, power_down_on_failure),
        Commands::Config => handle_config(&config),
    }
}

fn handle_modes(config: &Config, json: bool) -> Result<()> {
    let bench = Bench::new();
    let mut provider = bench.clone();
    let mut registry = PanelRegistry::new();

    let panel = binding::probe(
        COMPATIBLE,
        bench.dsi(&config.bench.dsi_device),
        &mut provider,
        bench.delay(),
        &mut registry,
        &config.panel,
    )
    .map_err(|e| e.error)
    .context("Failed to bind panel")?;

    let mut connector = Connector::default();
    let count = panel.get_modes(&mut connector)?;
    binding::remove(panel, &mut registry);
    debug!("Panel reported {} mode(s)", count);

    if json {
        println!("{}", serde_json::to_string_pretty(&connector)?);
        return Ok(());
    }

    let info = &connector.display_info;
    println!("Panel: {} ({}x{} mm)", info.name, info.width_mm, info.height_mm);
    for mode in &connector.probed_modes {
        let t = &mode.timing;
        println!(
            "  {}{} @ {} Hz (computed {} Hz), clock {} kHz, type {:#04x}",
            mode.name,
            if mode.is_preferred() { " (preferred)" } else { "" },
            t.vrefresh,
            t.computed_refresh(),
            t.clock_khz,
            mode.mode_type.bits()
        );
        println!(
            "    h: {} {} {} {}",
            t.hdisplay, t.hsync_start, t.hsync_end, t.htotal
        );
        println!(
            "    v: {} {} {} {}",
            t.vdisplay, t.vsync_start, t.vsync_end, t.vtotal
        );
    }
    Ok(())
}

fn handle_sequence(
    mut config: Config,
    faults: Vec<Fault>,
    no_reset: bool,
    power_down_on_failure: bool,
) -> Result<()> {
    let bench = if no_reset || !config.bench.reset_wired {
        Bench::without_reset_gpio()
    } else {
        Bench::new()
    };
    for fault in config.bench.parsed_faults()?.into_iter().chain(faults) {
        bench.inject(fault);
    }
    if power_down_on_failure {
        config.panel.failure_policy = FailurePolicy::PowerDown;
    }

    let mut provider = bench.clone();
    let mut registry = PanelRegistry::new();
    let bound = binding::probe(
        COMPATIBLE,
        bench.dsi(&config.bench.dsi_device),
        &mut provider,
        bench.delay(),
        &mut registry,
        &config.panel,
    );
    let mut panel = match bound {
        Ok(panel) => panel,
        Err(e) => {
            print_trace(&bench);
            if e.is_retry_later() {
                println!("bind deferred: {}", e);
                return Ok(());
            }
            return Err(e.error).context("Failed to bind panel");
        }
    };
    println!(
        "bound {} (failure policy {})",
        config.bench.dsi_device,
        panel.failure_policy()
    );

    let mut outcome = Ok(());
    for operation in Operation::SEQUENCE {
        let before = panel.state();
        match panel.run(operation) {
            Ok(()) => println!("{:<10} {} -> {}", operation, before, panel.state()),
            Err(e) => {
                println!("{:<10} failed in {}: {}", operation, panel.state(), e);
                outcome = Err(e);
                break;
            }
        }
    }

    binding::remove(panel, &mut registry);
    println!("unbound {}", config.bench.dsi_device);
    print_trace(&bench);

    outcome.context("Sequence aborted")
}

fn handle_config(config: &Config) -> Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}

fn print_trace(bench: &Bench) {
    println!("trace:");
    for record in bench.records() {
        println!(
            "  {:>10.3} ms  {}",
            record.at_ns as f64 / 1_000_000.0,
            record.event
        );
    }
}
