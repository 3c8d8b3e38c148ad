mod accumulation;
mod engine;
mod error;
mod rates;
mod retirement;
mod types;

pub use accumulation::simulate_accumulation;
pub use engine::{
    MAX_AGE, classify_plan, perpetual_monthly_income, run_simulation, validate_parameters,
};
pub use error::SimulationError;
pub use rates::{DAYS_PER_MONTH, DAYS_PER_YEAR, DailyRates, daily_rate};
pub use retirement::simulate_retirement;
pub use types::{
    AccumulationResult, AccumulationSnapshot, AnnualSnapshot, PlanStatus, Report,
    RetirementResult, RetirementSnapshot, SimulationParameters,
};
