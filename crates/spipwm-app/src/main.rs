use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand};
use log::info;
use spipwm_app::{capture_transaction, scenario, settings, ScenarioReport, SCENARIOS};
use spipwm_core::{Direction, HarnessConfig, Transaction};

/// Drive the serial control port of the simulated PWM peripheral and check its output
#[derive(Parser, Debug)]
#[command(name = "spipwm", version, long_about = None)]
struct Cli {
    /// Harness config (TOML). Falls back to $SPIPWM_CONFIG, then the per-user config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run scenarios against the simulated bench
    Run {
        /// Scenario to run (repeatable). Runs all when omitted
        #[arg(short, long)]
        scenario: Vec<String>,

        /// Print reports as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Drive one transaction and print the recorded pin trace
    Frame(FrameArgs),
    /// List scenario names
    List,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("direction").required(true).args(["write", "read"])))]
struct FrameArgs {
    /// Send a write transaction
    #[arg(long, default_value_t = false)]
    write: bool,

    /// Send a read transaction
    #[arg(long, default_value_t = false)]
    read: bool,

    /// 7-bit register address, decimal or 0x-prefixed hex
    #[arg(value_parser = parse_number)]
    address: u32,

    /// 8-bit data, decimal or 0x-prefixed hex
    #[arg(value_parser = parse_number)]
    data: u32,

    /// Print pin words in hex instead of binary
    #[arg(long, default_value_t = false)]
    hex: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    let config = settings::resolve_config(cli.config.as_deref()).context("loading config")?;

    match cli.command {
        Command::Run { scenario, json } => run(&config, &scenario, json),
        Command::Frame(args) => {
            frame(&config, &args)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::List => {
            for s in SCENARIOS {
                println!("{:<16} {}", s.name, s.description);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn parse_number(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid number '{s}': {e}"))
}

fn run(config: &HarnessConfig, names: &[String], json: bool) -> Result<ExitCode> {
    let selected: Vec<&scenario::Scenario> = if names.is_empty() {
        SCENARIOS.iter().collect()
    } else {
        names
            .iter()
            .map(|name| {
                scenario::find(name).with_context(|| format!("unknown scenario '{name}'"))
            })
            .collect::<Result<_>>()?
    };

    let reports: Vec<ScenarioReport> = selected.iter().map(|s| s.run(config)).collect();
    let failed = reports.iter().filter(|r| !r.passed).count();

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            let status = if report.passed { "PASS" } else { "FAIL" };
            match &report.message {
                Some(message) => println!("{status} {} ({message})", report.name),
                None => println!("{status} {}", report.name),
            }
        }
    }
    info!("{} passed, {failed} failed", reports.len() - failed);

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn frame(config: &HarnessConfig, args: &FrameArgs) -> Result<()> {
    let direction = if args.read {
        Direction::Read
    } else {
        Direction::Write
    };
    let tx = Transaction::new(direction, args.address, args.data)?;
    let capture = capture_transaction(config, direction, args.address, args.data)?;

    print!("{}", capture.trace.to_text(true, args.hex));
    println!("control word: {}", hex::encode_upper(tx.to_word().to_be_bytes()));
    println!("pin words:    {}", hex::encode_upper(capture.trace.words()));

    let Some(decoded) = capture.frames.first().and_then(|f| f.control_word()) else {
        bail!("decoder did not recover a 16-bit frame");
    };
    println!(
        "decoded:      {} addr=0x{:02X} data=0x{:02X}",
        if decoded.write { "write" } else { "read" },
        decoded.address,
        decoded.data
    );
    println!(
        "outputs:      uo_out=0x{:02X} uio_out=0x{:02X}",
        capture.bench.uo_out(),
        capture.bench.uio_out()
    );
    Ok(())
}
