//! BoxCar controller entry point.
//!
//! Loads the configuration, opens the vehicle link, and runs the drive state
//! machine until the console says `quit`, Ctrl+C arrives or the machine halts.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()             -- controller.toml, defaults if absent
//!  └─ VehicleLink::connect()    -- TCP bridge or --simulate
//!  └─ StateMachine::start(Idle) -- 10 ms tick task
//!  └─ select! loop
//!       ├─ run_console()        -- UI events, pad reports, sensor injection
//!       ├─ ctrl_c()             -- shutdown
//!       └─ StateMachine::join() -- halted by a fatal link fault
//!  └─ stop machine, stop vehicle, disconnect
//! ```
//!
//! # Control surfaces (for beginners)
//!
//! There is no phone app or controller driver in this binary.  Instead the
//! console plays both roles: `forward`, `auto on`, `speed 200` and friends
//! are published as UI events exactly as the touch buttons would be, and
//! `pad r2 dpad_up 0.8` feeds a raw controller report into the same input
//! pipeline a real PS4 adapter would use.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use boxcar_controller::application::drive::{shared_input, DriveContext, DriveState};
use boxcar_controller::application::state_machine::StateMachine;
use boxcar_controller::application::ui_events::UiEventBus;
use boxcar_controller::application::vehicle_link::VehicleLink;
use boxcar_controller::infrastructure::console::{run_console, ConsoleExit, ConsoleTargets};
use boxcar_controller::infrastructure::input::ScriptedInput;
use boxcar_controller::infrastructure::storage::{
    config_file_path, load_config, save_config, AppConfig,
};
use boxcar_controller::infrastructure::transport::{SimulatedVehicle, TcpTransport};

// ── CLI ───────────────────────────────────────────────────────────────────────

/// Command-line arguments.
///
/// Every option can also be supplied through the environment variable named
/// in its `env` attribute.
#[derive(Debug, Parser)]
#[command(
    name = "boxcar-controller",
    about = "Drives a BoxCar over its serial link from a console, controller or autopilot",
    version
)]
struct Cli {
    /// Path to controller.toml.  Defaults to the platform config directory.
    #[arg(long, env = "BOXCAR_CONFIG")]
    config: Option<PathBuf>,

    /// host:port of the vehicle's serial bridge; overrides `[link] address`.
    #[arg(long, env = "BOXCAR_ADDRESS")]
    address: Option<String>,

    /// Drive an in-memory vehicle instead of a real one.
    #[arg(long)]
    simulate: bool,

    /// Write the default configuration to the config path and exit.
    #[arg(long)]
    init_config: bool,
}

impl Cli {
    fn config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => config_file_path().context("cannot locate the config directory"),
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config_path()?;

    if cli.init_config {
        save_config(&AppConfig::default(), &config_path)
            .with_context(|| format!("writing {}", config_path.display()))?;
        println!("wrote default configuration to {}", config_path.display());
        return Ok(());
    }

    let mut config = load_config(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if let Some(address) = cli.address.clone() {
        config.link.address = address;
    }

    // ── Logging setup ─────────────────────────────────────────────────────────
    //
    // RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("BoxCar controller starting (config {})", config_path.display());

    // ── Vehicle link ──────────────────────────────────────────────────────────
    let timing = config.link.timing();
    let (link, simulator) = if cli.simulate {
        let (vehicle, handle) = SimulatedVehicle::new();
        info!("using the simulated vehicle");
        (VehicleLink::new(vehicle, timing), Some(handle))
    } else {
        info!("using the serial bridge at {}", config.link.address);
        (
            VehicleLink::new(TcpTransport::new(config.link.address.clone()), timing),
            None,
        )
    };
    let link = Arc::new(link);
    link.connect()
        .await
        .context("could not connect to the vehicle")?;

    // ── Drive state machine ───────────────────────────────────────────────────
    let (input, gamepad) = ScriptedInput::with_dead_zone(config.input.dead_zone);
    let ui = UiEventBus::default();
    let ctx = DriveContext::new(Arc::clone(&link), shared_input(input), ui.clone())
        .with_tuning(config.drive.tuning())
        .with_bindings(config.bindings);

    let mut machine = StateMachine::new(config.drive.tick_period());
    machine
        .start(DriveState::idle(ctx))
        .await
        .context("could not start the drive state machine")?;

    let targets = ConsoleTargets {
        ui,
        gamepad: Some(gamepad),
        simulator,
    };

    // ── Main loop ─────────────────────────────────────────────────────────────
    info!("ready; type `quit` or press Ctrl+C to stop");

    let console = run_console(BufReader::new(tokio::io::stdin()), &targets);
    tokio::pin!(console);
    let mut console_open = true;

    loop {
        tokio::select! {
            exit = &mut console, if console_open => match exit {
                Ok(ConsoleExit::Quit) => break,
                Ok(ConsoleExit::EndOfInput) => {
                    info!("stdin closed; press Ctrl+C to stop");
                    console_open = false;
                }
                Err(e) => {
                    warn!("console read failed: {e}");
                    console_open = false;
                }
            },
            signal = tokio::signal::ctrl_c() => {
                match signal {
                    Ok(()) => info!("received Ctrl+C, shutting down"),
                    Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
                }
                break;
            }
            halted = machine.join() => {
                match halted {
                    Ok(()) => info!("drive state machine halted"),
                    Err(e) => error!("drive state machine halted: {e}"),
                }
                break;
            }
        }
    }

    // ── Shutdown ──────────────────────────────────────────────────────────────
    if let Err(e) = machine.stop().await {
        error!("drive state machine stopped with error: {e}");
    }
    if link.is_connected() {
        if let Err(e) = link.force_stop().await {
            warn!("could not stop the vehicle: {e}");
        }
    }
    if let Err(e) = link.disconnect().await {
        warn!("disconnect failed: {e}");
    }

    info!("BoxCar controller stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        // Arrange: parse with no arguments
        let cli = Cli::try_parse_from(["boxcar-controller"]).unwrap();

        // Assert
        assert!(!cli.simulate);
        assert!(!cli.init_config);
    }

    #[test]
    fn test_cli_explicit_config_path_is_used() {
        let cli = Cli::try_parse_from([
            "boxcar-controller",
            "--config",
            "/tmp/boxcar/controller.toml",
            "--simulate",
        ])
        .unwrap();

        assert!(cli.simulate);
        assert_eq!(
            cli.config_path().unwrap(),
            PathBuf::from("/tmp/boxcar/controller.toml")
        );
    }

    #[test]
    fn test_cli_address_override() {
        let cli = Cli::try_parse_from(["boxcar-controller", "--address", "10.0.0.7:5331"]).unwrap();

        assert_eq!(cli.address.as_deref(), Some("10.0.0.7:5331"));
    }
}
