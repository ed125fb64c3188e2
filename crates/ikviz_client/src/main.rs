//! ikviz - terminal client for a remote inverse-kinematics solver
//!
//! Connects to the solver over WebSocket, keeps a target position and arm
//! configuration, and shows what the solver answers.
//!
//! Logging goes to stderr; set `RUST_LOG` to override the default
//! `ikviz=info,ikviz_client=info`.

use std::error::Error;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use ikviz::grid::generate;
use ikviz::model::{ArmConfiguration, Sign, SolverOutcome};
use ikviz::profile::{ConfigurationSchema, ScaleProfile};
use ikviz_client::config::{ClientArgs, ClientConfig};
use ikviz_client::panel::results_panel;
use ikviz_client::session::Session;
use tokio::io::BufReader;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ikviz", version, about = "Visualize a remote inverse-kinematics solver")]
struct Cli {
    #[command(flatten)]
    client: ClientArgs,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Line-oriented view reading commands from stdin (default).
    Interactive,
    /// Send one request and print the result.
    #[command(allow_negative_numbers = true)]
    Solve {
        x: f64,
        y: f64,
        z: f64,
        /// Arm selector: 1 right, -1 left.
        #[arg(long, allow_negative_numbers = true, conflicts_with = "config")]
        arm: Option<i8>,
        /// Elbow selector: 1 up, -1 down.
        #[arg(long, allow_negative_numbers = true, conflicts_with = "config")]
        elbow: Option<i8>,
        /// Configuration label, for profiles that use one.
        #[arg(long)]
        config: Option<String>,
    },
    /// Print the profile's grid tick labels.
    Grid,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ikviz=info,ikviz_client=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::from_args(&cli.client)?;

    match cli.command.unwrap_or(Cmd::Interactive) {
        Cmd::Interactive => {
            let mut session = Session::new(&config);
            let stdin = BufReader::new(tokio::io::stdin());
            let result = session
                .run_interactive(stdin, &mut std::io::stdout())
                .await;
            session.close().await;
            result?;
        }
        Cmd::Solve {
            x,
            y,
            z,
            arm,
            elbow,
            config: label,
        } => {
            let configuration = solve_configuration(&config.profile, arm, elbow, label)?;
            let mut session = Session::new(&config);
            let result = session.solve([x, y, z], configuration).await;
            session.close().await;
            let outcome = result?;
            for line in results_panel(&outcome) {
                println!("{line}");
            }
            if !matches!(outcome, SolverOutcome::Success(_)) {
                error!("solver did not produce a solution");
                return Ok(ExitCode::FAILURE);
            }
        }
        Cmd::Grid => print_grid(&config.profile),
    }

    Ok(ExitCode::SUCCESS)
}

fn solve_configuration(
    profile: &ScaleProfile,
    arm: Option<i8>,
    elbow: Option<i8>,
    label: Option<String>,
) -> Result<Option<ArmConfiguration>, Box<dyn Error>> {
    if let Some(config_label) = label {
        return Ok(Some(ArmConfiguration::Labeled { config_label }));
    }
    if arm.is_none() && elbow.is_none() {
        return Ok(None);
    }
    let (default_arm, default_elbow) = match &profile.schema {
        ConfigurationSchema::SixDof {
            default_arm,
            default_elbow,
        } => (*default_arm, *default_elbow),
        ConfigurationSchema::Labeled { .. } => {
            return Err(format!("profile '{}' takes --config, not --arm/--elbow", profile.name).into())
        }
    };
    Ok(Some(ArmConfiguration::SixDof {
        arm: arm.map(Sign::try_from).transpose()?.unwrap_or(default_arm),
        elbow: elbow.map(Sign::try_from).transpose()?.unwrap_or(default_elbow),
    }))
}

fn print_grid(profile: &ScaleProfile) {
    println!(
        "profile {}: {} .. {} step {} (same ticks on X, Y and Z)",
        profile.name, profile.grid.min, profile.grid.max, profile.grid.step
    );
    for tick in generate(&profile.grid) {
        println!("{:>4}  {}", tick.index, tick.label);
    }
}
