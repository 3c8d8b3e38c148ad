use clap::{Args, Parser, Subcommand};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use crate::api::{self, ApiError, SimulatePayload};
use crate::core::{SimulationError, SimulationParameters};

#[derive(Parser, Debug)]
#[command(
    name = "retiro",
    about = "Two-pool retirement projection (operating cash + retirement reserve)"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the web form and the JSON projection API.
    Serve(ServeArgs),
    /// Run one projection and print the JSON report to stdout.
    Simulate(SimulateArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long, env = "RETIRO_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,
    #[arg(long, env = "RETIRO_PORT", default_value_t = 5001)]
    pub port: u16,
}

impl ServeArgs {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("cannot read config {}: {source}", path.display())]
    ReadConfig {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("config {} is not valid JSON: {source}", path.display())]
    ParseConfig {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Config(#[from] ApiError),

    #[error("invalid value for {flag}: {message}")]
    InvalidFlag { flag: &'static str, message: String },

    #[error(transparent)]
    Simulation(SimulationError),
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    #[arg(
        long,
        value_name = "FILE",
        conflicts_with_all = [
            "current_age", "retirement_age", "life_expectancy", "initial_caja",
            "initial_reserve", "monthly_income", "monthly_expense", "monthly_contribution",
            "caja_return", "reserve_return", "inflation", "desired_monthly_expense",
        ],
        help = "Settings file saved from the web page (same keys as the POST body)"
    )]
    pub config: Option<PathBuf>,
    #[arg(long, required_unless_present = "config")]
    pub current_age: Option<u32>,
    #[arg(long, required_unless_present = "config")]
    pub retirement_age: Option<u32>,
    #[arg(long, default_value_t = 85)]
    pub life_expectancy: u32,
    #[arg(long, default_value_t = 0.0, help = "Operating cash pool at start")]
    pub initial_caja: f64,
    #[arg(long, default_value_t = 0.0, help = "Retirement reserve at start")]
    pub initial_reserve: f64,
    #[arg(long, required_unless_present = "config")]
    pub monthly_income: Option<f64>,
    #[arg(long, required_unless_present = "config")]
    pub monthly_expense: Option<f64>,
    #[arg(long, default_value_t = 0.0)]
    pub monthly_contribution: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        allow_negative_numbers = true,
        help = "Annual nominal return of the cash pool in percent"
    )]
    pub caja_return: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        allow_negative_numbers = true,
        help = "Annual nominal return of the reserve in percent"
    )]
    pub reserve_return: f64,
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub inflation: f64,
    #[arg(long, help = "Monthly spending in retirement; defaults to --monthly-expense")]
    pub desired_monthly_expense: Option<f64>,
    #[arg(long)]
    pub pretty: bool,
}

impl SimulateArgs {
    pub fn to_parameters(&self, start_year: i32) -> Result<SimulationParameters, CliError> {
        match &self.config {
            Some(path) => parameters_from_config(path, start_year),
            None => self.parameters_from_flags(start_year),
        }
    }

    /// Rewrites engine validation errors in terms of what the user typed: the
    /// flag name, or the config key when the run came from a file.
    pub fn describe_error(&self, err: SimulationError) -> CliError {
        match (err, &self.config) {
            (SimulationError::Validation { field, message }, None) => CliError::InvalidFlag {
                flag: flag_name(field),
                message,
            },
            (err @ SimulationError::Validation { .. }, Some(_)) => CliError::Config(err.into()),
            (err, _) => CliError::Simulation(err),
        }
    }

    fn parameters_from_flags(&self, start_year: i32) -> Result<SimulationParameters, CliError> {
        let monthly_expense = required_flag("daily_expense", self.monthly_expense)?;
        Ok(SimulationParameters {
            current_age: required_flag("current_age", self.current_age)?,
            retirement_age: required_flag("retirement_age", self.retirement_age)?,
            life_expectancy: self.life_expectancy,
            start_year,
            initial_caja: self.initial_caja,
            initial_reserve: self.initial_reserve,
            monthly_income: required_flag("monthly_income", self.monthly_income)?,
            daily_expense: monthly_expense * 12.0 / 365.0,
            monthly_contribution: self.monthly_contribution,
            caja_return_annual: self.caja_return,
            reserve_return_annual: self.reserve_return,
            inflation_annual: self.inflation,
            desired_monthly_expense: self.desired_monthly_expense.unwrap_or(monthly_expense),
        })
    }
}

fn parameters_from_config(path: &Path, start_year: i32) -> Result<SimulationParameters, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::ReadConfig {
        path: path.to_path_buf(),
        source,
    })?;
    let payload: SimulatePayload =
        serde_json::from_str(&text).map_err(|source| CliError::ParseConfig {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(api::parameters_from_payload(payload, start_year)?)
}

fn required_flag<T>(field: &'static str, value: Option<T>) -> Result<T, CliError> {
    value.ok_or_else(|| CliError::InvalidFlag {
        flag: flag_name(field),
        message: "is required".to_string(),
    })
}

fn flag_name(field: &'static str) -> &'static str {
    match field {
        "current_age" => "--current-age",
        "retirement_age" => "--retirement-age",
        "life_expectancy" => "--life-expectancy",
        "initial_caja" => "--initial-caja",
        "initial_reserve" => "--initial-reserve",
        "monthly_income" => "--monthly-income",
        "daily_expense" => "--monthly-expense",
        "monthly_contribution" => "--monthly-contribution",
        "caja_return_annual" => "--caja-return",
        "reserve_return_annual" => "--reserve-return",
        "inflation_annual" => "--inflation",
        "desired_monthly_expense" => "--desired-monthly-expense",
        other => other,
    }
}
