use tracing::{debug, instrument};

use super::accumulation::simulate_accumulation;
use super::error::SimulationError;
use super::rates::{DAYS_PER_MONTH, DailyRates};
use super::retirement::simulate_retirement;
use super::types::{
    AccumulationSnapshot, AnnualSnapshot, PlanStatus, Report, RetirementResult,
    RetirementSnapshot, SimulationParameters,
};

/// Oldest age accepted for any of the three age parameters.
pub const MAX_AGE: u32 = 150;

/// Retirement capital above this share of the reserve at retirement rates the
/// plan as excellent.
const EXCELLENT_CAPITAL_SHARE: f64 = 0.5;

#[instrument(level = "debug", skip_all, fields(
    current_age = params.current_age,
    retirement_age = params.retirement_age,
    life_expectancy = params.life_expectancy,
))]
pub fn run_simulation(params: &SimulationParameters) -> Result<Report, SimulationError> {
    validate_parameters(params)?;

    let rates = DailyRates::from_parameters(params);
    let accumulation = simulate_accumulation(params, &rates);
    let retirement = simulate_retirement(
        params,
        &rates,
        accumulation.final_caja,
        accumulation.final_reserve,
    );
    let perpetual_monthly_income = perpetual_monthly_income(accumulation.final_reserve, &rates);
    let status = classify_plan(&retirement, accumulation.final_reserve);

    let annual_table = accumulation
        .snapshots
        .iter()
        .copied()
        .map(AnnualSnapshot::Accumulation)
        .chain(
            retirement
                .snapshots
                .iter()
                .copied()
                .map(AnnualSnapshot::Retirement),
        )
        .collect();

    let report = Report {
        accumulation,
        retirement,
        perpetual_monthly_income,
        status,
        annual_table,
    };
    ensure_finite(&report)?;

    debug!(?status, perpetual_monthly_income, "simulation finished");
    Ok(report)
}

/// Monthly amount that can be withdrawn from `capital` forever: the part of a
/// 30-day compounded reserve return that exceeds 30 days of inflation.
pub fn perpetual_monthly_income(capital: f64, rates: &DailyRates) -> f64 {
    let month = DAYS_PER_MONTH as f64;
    let reserve_growth = (1.0 + rates.reserve).powf(month) - 1.0;
    let inflation_growth = (1.0 + rates.inflation).powf(month) - 1.0;
    capital * (reserve_growth - inflation_growth)
}

pub fn classify_plan(retirement: &RetirementResult, reserve_at_retirement: f64) -> PlanStatus {
    if !retirement.is_sufficient {
        PlanStatus::Insufficient
    } else if retirement.final_capital > reserve_at_retirement * EXCELLENT_CAPITAL_SHARE {
        PlanStatus::Excellent
    } else {
        PlanStatus::Reachable
    }
}

pub fn validate_parameters(params: &SimulationParameters) -> Result<(), SimulationError> {
    for (field, age) in [
        ("current_age", params.current_age),
        ("retirement_age", params.retirement_age),
        ("life_expectancy", params.life_expectancy),
    ] {
        if age > MAX_AGE {
            return Err(SimulationError::validation(
                field,
                format!("must be <= {MAX_AGE}"),
            ));
        }
    }

    if params.retirement_age <= params.current_age {
        return Err(SimulationError::validation(
            "retirement_age",
            "must be greater than the current age",
        ));
    }

    if params.life_expectancy <= params.retirement_age {
        return Err(SimulationError::validation(
            "life_expectancy",
            "must be greater than the retirement age",
        ));
    }

    for (field, amount) in [
        ("initial_caja", params.initial_caja),
        ("initial_reserve", params.initial_reserve),
        ("monthly_income", params.monthly_income),
        ("daily_expense", params.daily_expense),
        ("monthly_contribution", params.monthly_contribution),
        ("desired_monthly_expense", params.desired_monthly_expense),
    ] {
        if !amount.is_finite() || amount < 0.0 {
            return Err(SimulationError::validation(field, "must be a finite amount >= 0"));
        }
    }

    for (field, rate) in [
        ("caja_return_annual", params.caja_return_annual),
        ("reserve_return_annual", params.reserve_return_annual),
        ("inflation_annual", params.inflation_annual),
    ] {
        if !rate.is_finite() || rate <= -100.0 {
            return Err(SimulationError::validation(field, "must be a finite rate > -100"));
        }
    }

    Ok(())
}

fn ensure_finite(report: &Report) -> Result<(), SimulationError> {
    let accumulation = &report.accumulation;
    let retirement = &report.retirement;
    for (label, value) in [
        ("final caja", accumulation.final_caja),
        ("final reserve", accumulation.final_reserve),
        ("retirement capital", retirement.final_capital),
        ("perpetual income", report.perpetual_monthly_income),
    ] {
        if !value.is_finite() {
            return Err(SimulationError::Computation(format!("{label} is {value}")));
        }
    }

    for row in &report.annual_table {
        let finite = match row {
            AnnualSnapshot::Accumulation(row) => accumulation_row_is_finite(row),
            AnnualSnapshot::Retirement(row) => retirement_row_is_finite(row),
        };
        if !finite {
            return Err(SimulationError::Computation(format!(
                "annual row for {} (age {}) is not finite",
                row.year(),
                row.age()
            )));
        }
    }

    Ok(())
}

fn accumulation_row_is_finite(row: &AccumulationSnapshot) -> bool {
    [
        row.caja,
        row.reserve,
        row.total,
        row.income,
        row.monthly_expenses,
        row.annual_expenses,
        row.contributions,
        row.net_flow,
        row.yield_caja,
        row.yield_reserve,
        row.yield_total,
    ]
    .iter()
    .all(|value| value.is_finite())
}

fn retirement_row_is_finite(row: &RetirementSnapshot) -> bool {
    [
        row.caja,
        row.reserve,
        row.total,
        row.monthly_expenses,
        row.annual_expenses,
        row.adjusted_monthly_expense,
        row.annual_deficit,
        row.yield_caja,
        row.yield_reserve,
        row.yield_total,
    ]
    .iter()
    .all(|value| value.is_finite())
}
