//! Command-line front end for the device classes
//!
//! - `check`: load and validate a station file
//! - `table`: print an instrument's waveform command table
//! - `dry-run`: take every enabled device once through its lifecycle against a
//!   scripted mock port and print what would be sent
//! - `run`: the same pass against the real instruments

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use daq_device_classes::adapters::mock::TranscriptEntry;
use daq_device_classes::adapters::{self, MockAdapter};
use daq_device_classes::config::{DeviceDefinition, DeviceType, StationConfig};
use daq_device_classes::instrument;
use daq_device_classes::sequence::{run_cycle, CycleSummary};
use daq_device_classes::telemetry::init_tracing;
use daq_device_classes::waveform::CommandTable;
use serde::Serialize;

#[derive(Parser)]
#[command(name = "devclass", version, about = "SCPI device classes for lab automation")]
struct Cli {
    /// Log level when RUST_LOG is not set; defaults to the station's level
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a station file and list its devices
    Check { station: PathBuf },
    /// Print the waveform command table of an instrument
    Table {
        #[arg(value_enum)]
        instrument: TableName,
    },
    /// Run one point against mock ports and print the command transcript
    DryRun {
        station: PathBuf,
        #[command(flatten)]
        point: PointArgs,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Run one point against the configured instruments
    Run {
        station: PathBuf,
        #[command(flatten)]
        point: PointArgs,
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args)]
struct PointArgs {
    /// Only this device
    #[arg(long)]
    device: Option<String>,
    /// Value handed to `apply` before measuring
    #[arg(long, allow_hyphen_values = true)]
    value: Option<f64>,
}

#[derive(Clone, Copy, ValueEnum)]
enum TableName {
    Agilent33220a,
    KeysightN6705,
    AgilentN6705a,
}

#[derive(Serialize)]
struct DryRunReport {
    id: String,
    summary: CycleSummary,
    transcript: Vec<TranscriptEntry>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Check { station } => {
            let config = load(&station, cli.log_level.as_deref())?;
            println!("{}: {} device(s)", config.application.name, config.devices.len());
            for device in &config.devices {
                let state = if device.enabled { "" } else { " (disabled)" };
                println!(
                    "  {:<16} {:<24} {}{state}",
                    device.id, device.device_type, device.port.resource
                );
            }
        }
        Command::Table { instrument } => {
            init_tracing(cli.log_level.as_deref().unwrap_or("warn"));
            print_table(&table(instrument))?;
        }
        Command::DryRun {
            station,
            point,
            json,
        } => {
            let config = load(&station, cli.log_level.as_deref())?;
            let mut reports = Vec::new();
            for definition in selected(&config, point.device.as_deref())? {
                let port = scripted_port(definition.device_type);
                let log = port.log();
                let mut device = instrument::create(definition, port)?;
                let summary = run_cycle(device.as_mut(), point.value)
                    .await
                    .with_context(|| format!("dry run of '{}' failed", definition.id))?;
                reports.push(DryRunReport {
                    id: definition.id.clone(),
                    summary,
                    transcript: log.entries(),
                });
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                for report in &reports {
                    println!("== {} ({})", report.id, report.summary.device);
                    for entry in &report.transcript {
                        match entry {
                            TranscriptEntry::Write(cmd) => println!("  > {cmd}"),
                            TranscriptEntry::Read(reply) => println!("  < {reply}"),
                            TranscriptEntry::StatusByte(stb) => println!("  ? STB {stb:#04x}"),
                        }
                    }
                    print_summary(&report.summary);
                }
            }
        }
        Command::Run {
            station,
            point,
            json,
        } => {
            let config = load(&station, cli.log_level.as_deref())?;
            let mut summaries = Vec::new();
            for definition in selected(&config, point.device.as_deref())? {
                let port = adapters::open(&definition.port)
                    .await
                    .with_context(|| format!("cannot open port of '{}'", definition.id))?;
                let mut device = instrument::create(definition, port)?;
                let summary = run_cycle(device.as_mut(), point.value)
                    .await
                    .with_context(|| format!("run of '{}' failed", definition.id))?;
                summaries.push(summary);
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else {
                summaries.iter().for_each(print_summary);
            }
        }
    }
    Ok(())
}

fn load(station: &Path, log_level: Option<&str>) -> Result<StationConfig> {
    let config = StationConfig::load_from(station)
        .with_context(|| format!("cannot load station file {}", station.display()))?;
    init_tracing(log_level.unwrap_or(&config.application.log_level));
    Ok(config)
}

fn selected<'c>(
    config: &'c StationConfig,
    device: Option<&str>,
) -> Result<Vec<&'c DeviceDefinition>> {
    let devices: Vec<_> = config
        .enabled_devices()
        .filter(|d| device.map_or(true, |id| d.id == id))
        .collect();
    if devices.is_empty() {
        anyhow::bail!("no enabled device matches {}", device.unwrap_or("the station"));
    }
    Ok(devices)
}

/// Mock port answering the way an idle instrument of `device_type` would.
fn scripted_port(device_type: DeviceType) -> MockAdapter {
    let default_reply = match device_type {
        DeviceType::Fluke8842A => "+0.00000E+00,VDC",
        DeviceType::Keithley617 => "NDCV+0.00000E+00",
        // Period and frequency read-backs must be positive.
        DeviceType::Agilent33220A
        | DeviceType::KeysightN6705Signal
        | DeviceType::AgilentN6705ASignal => "1",
        DeviceType::KeysightN6705Smu | DeviceType::NfCa5351 => "0",
    };
    // Data available, so externally triggered meters do not wait.
    let mut port = MockAdapter::new()
        .with_default_response(default_reply)
        .with_default_status_byte(0x20);
    for channel in 1..=4 {
        port.on_query(format!("SYST:CHAN:MODEL? (@{channel})"), "N6781A");
    }
    port.on_query("*OPC?", "1");
    port
}

fn table(name: TableName) -> CommandTable {
    match name {
        TableName::Agilent33220a => CommandTable::agilent_33220a(),
        TableName::KeysightN6705 => CommandTable::keysight_n6705(),
        TableName::AgilentN6705a => CommandTable::agilent_n6705a(),
    }
}

fn print_table(table: &CommandTable) -> Result<()> {
    for kind in table.kinds() {
        println!("{kind} ({})", table.label(kind)?);
        for (parameter, entry) in table.parameters(kind)? {
            println!("  {:<20} {:<10} {}", parameter.name(), entry.mnemonic, entry.unit);
        }
    }
    Ok(())
}

fn print_summary(summary: &CycleSummary) {
    if let Some(value) = summary.set_value {
        println!("  applied {value}");
    }
    for (variable, value) in summary.variables.iter().zip(&summary.values) {
        println!("  {:<24} {value} {}", variable.name, variable.unit);
    }
    if !summary.reason.is_empty() {
        println!("  stopped: {}", summary.reason);
    }
}
