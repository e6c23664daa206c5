//! Command-line console for the ASG electronic tilt platform.
//!
//! Connects with the saved settings (overridable per invocation),
//! runs one operation, prints every response line, and persists any
//! settings changes.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};

use tilt_core::serial::{available_ports, SUPPORTED_BAUD_RATES};
use tilt_core::Settings;
use tilt_driver::{CommandOutcome, Coordinator, Corner, Direction, Orientation};

#[derive(Parser)]
#[command(name = "tilt", about = "Console for the ASG electronic tilt platform")]
struct Cli {
    /// Serial port (defaults to the saved setting).
    #[arg(long, global = true)]
    port: Option<String>,

    /// Baud rate (defaults to the saved setting).
    #[arg(long, global = true)]
    baud: Option<u32>,

    #[command(subcommand)]
    command: Operation,
}

#[derive(Subcommand)]
enum Operation {
    /// List available serial ports.
    Ports,
    /// Tilt in a screen-relative direction (top/right/bottom/left).
    Tilt {
        direction: String,
        /// Step count; defaults to the saved step size.
        #[arg(long, allow_negative_numbers = true)]
        steps: Option<i32>,
    },
    /// Tilt a screen-relative corner (tl/tr/br/bl).
    Corner {
        corner: String,
        #[arg(long, allow_negative_numbers = true)]
        steps: Option<i32>,
    },
    /// Move all four motors the same direction.
    Backfocus {
        #[arg(allow_negative_numbers = true)]
        steps: i32,
    },
    /// Zero/reset all axes.
    Zero,
    /// Query and display motor positions.
    Positions,
    /// Query and display the device's persisted values.
    Eeprom,
    /// Persist current positions to device non-volatile storage.
    Save,
    /// Query the firmware version.
    Firmware,
    /// Store the mounting orientation (1-4) on the device.
    Orientation { code: u8 },
    /// Send a raw command line (diagnostics).
    Send { text: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    if let Operation::Ports = cli.command {
        let ports = available_ports();
        if ports.is_empty() {
            println!("No serial ports detected.");
        } else {
            for port in ports {
                println!("{port}");
            }
        }
        return Ok(());
    }

    let mut settings = Settings::load();
    if let Some(port) = &cli.port {
        settings.selected_port = port.clone();
    }
    if let Some(baud) = cli.baud {
        settings.set_baud_rate(baud)?;
    }
    if settings.selected_port.is_empty() {
        return Err(anyhow!(
            "no serial port configured; pass --port or list candidates with `tilt ports`"
        ));
    }

    let coordinator = Coordinator::new(settings.clone());
    if !coordinator
        .connect(&settings.selected_port, settings.baud_rate)
        .await
    {
        return Err(anyhow!(
            "could not connect to {} @ {} baud (supported rates: {:?})",
            settings.selected_port,
            settings.baud_rate,
            SUPPORTED_BAUD_RATES
        ));
    }

    let result = run(&cli.command, &coordinator, &settings).await;

    // Persist the connection parameters and anything an `ep` reply
    // folded into the settings.
    if let Err(e) = coordinator.settings().save() {
        tracing::warn!(error = %e, "could not save settings");
    }
    coordinator.disconnect().await;
    result
}

async fn run(operation: &Operation, coordinator: &Coordinator, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Ports => unreachable!("handled before connecting"),
        Operation::Tilt { direction, steps } => {
            let direction: Direction = direction.parse().map_err(|e: String| anyhow!(e))?;
            let steps = steps.unwrap_or(settings.default_step_size);
            print_lines(&coordinator.tilt(direction, steps).await);
        }
        Operation::Corner { corner, steps } => {
            let corner: Corner = corner.parse().map_err(|e: String| anyhow!(e))?;
            let steps = steps.unwrap_or(settings.default_step_size);
            print_lines(&coordinator.tilt_corner(corner, steps).await);
        }
        Operation::Backfocus { steps } => {
            print_lines(&coordinator.backfocus(*steps).await);
        }
        Operation::Zero => {
            print_lines(&coordinator.zero().await);
        }
        Operation::Positions => {
            coordinator.refresh_positions().await;
            let logical = coordinator.logical_positions();
            let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "unknown".into());
            println!("TL: {}  TR: {}", show(&logical.tl), show(&logical.tr));
            println!("BL: {}  BR: {}", show(&logical.bl), show(&logical.br));
        }
        Operation::Eeprom => match coordinator.load_eeprom().await {
            Some(eeprom) => println!("{eeprom:#?}"),
            None => println!("Device returned no EEPROM block."),
        },
        Operation::Save => {
            print_lines(&coordinator.save_to_eeprom().await);
        }
        Operation::Firmware => match coordinator.firmware_version().await {
            Some(version) => println!("Firmware {version}"),
            None => println!("Device returned no firmware version."),
        },
        Operation::Orientation { code } => {
            let orientation = Orientation::from_code(*code)
                .ok_or_else(|| anyhow!("orientation must be 1-4, got {code}"))?;
            print_lines(&coordinator.set_orientation(orientation).await);
        }
        Operation::Send { text } => {
            print_lines(&coordinator.send_raw(text).await);
        }
    }
    Ok(())
}

fn print_lines(outcome: &CommandOutcome) {
    for line in &outcome.lines {
        println!("<< {line}");
    }
    if outcome.parsed.finished_movement {
        println!("Movement complete.");
    }
}
