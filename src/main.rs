use clap::Parser;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

use retiro::api;
use retiro::cli::{Cli, Command, SimulateArgs};
use retiro::core::run_simulation;

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => {
            if let Err(e) = api::run_http_server(args.socket_addr()).await {
                error!(error = %e, "server error");
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Command::Simulate(args) => match simulate(&args) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {e}");
                ExitCode::FAILURE
            }
        },
    }
}

fn simulate(args: &SimulateArgs) -> Result<String, Box<dyn std::error::Error>> {
    let params = args.to_parameters(api::current_year())?;
    let report = run_simulation(&params).map_err(|err| args.describe_error(err))?;
    let response = api::SimulateResponse::from_report(&report);
    let json = if args.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    Ok(json)
}
