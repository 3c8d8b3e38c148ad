use tracing::debug;

use super::rates::{DAYS_PER_MONTH, DAYS_PER_YEAR, DailyRates};
use super::types::{AccumulationResult, AccumulationSnapshot, Pools, SimulationParameters};

#[derive(Debug, Clone, Copy, Default)]
struct YearFlows {
    income: f64,
    expenses: f64,
    contributions: f64,
}

pub fn simulate_accumulation(
    params: &SimulationParameters,
    rates: &DailyRates,
) -> AccumulationResult {
    let years = params.years_to_retirement();
    let total_days = years * DAYS_PER_YEAR;

    let mut pools = Pools {
        caja: params.initial_caja,
        reserve: params.initial_reserve,
    };
    let mut snapshots = Vec::with_capacity(years as usize + 1);
    snapshots.push(opening_snapshot(params, pools));

    let mut omitted_contributions = 0_u32;
    let mut year_start = pools;
    let mut flows = YearFlows::default();

    for day in 1..=total_days {
        if !step_day(params, rates, day, &mut pools, &mut flows) {
            omitted_contributions += 1;
        }

        if day % DAYS_PER_YEAR == 0 {
            let years_elapsed = day / DAYS_PER_YEAR;
            snapshots.push(year_snapshot(params, years_elapsed, pools, year_start, flows));
            year_start = pools;
            flows = YearFlows::default();
        }
    }

    let contributions_made = (total_days / DAYS_PER_MONTH).saturating_sub(omitted_contributions);
    debug!(
        days = total_days,
        final_caja = pools.caja,
        final_reserve = pools.reserve,
        omitted_contributions,
        "accumulation phase finished"
    );

    AccumulationResult {
        final_caja: pools.caja,
        final_reserve: pools.reserve,
        final_total: pools.total(),
        snapshots,
        omitted_contributions,
        contributions_made,
    }
}

/// Advances both pools by one day. Returns `false` when the day was a payday
/// and the caja could not fund the contribution.
fn step_day(
    params: &SimulationParameters,
    rates: &DailyRates,
    day: u32,
    pools: &mut Pools,
    flows: &mut YearFlows,
) -> bool {
    pools.caja *= 1.0 + rates.caja;
    pools.reserve *= 1.0 + rates.reserve;

    let inflation = rates.inflation_factor(day);
    let expense = params.daily_expense * inflation;
    pay_expense(pools, expense);
    flows.expenses += expense;

    if day % DAYS_PER_MONTH != 0 {
        return true;
    }

    let income = params.monthly_income * inflation;
    pools.caja += income;
    flows.income += income;

    if pools.caja >= params.monthly_contribution {
        pools.caja -= params.monthly_contribution;
        pools.reserve += params.monthly_contribution;
        flows.contributions += params.monthly_contribution;
        true
    } else {
        false
    }
}

// Unfunded expense is dropped here, no deficit is tracked before retirement.
fn pay_expense(pools: &mut Pools, expense: f64) {
    pools.caja -= expense;
    if pools.caja < 0.0 {
        pools.caja = 0.0;
    }
}

fn opening_snapshot(params: &SimulationParameters, pools: Pools) -> AccumulationSnapshot {
    AccumulationSnapshot {
        year: params.start_year,
        age: params.current_age,
        caja: pools.caja,
        reserve: pools.reserve,
        total: pools.total(),
        income: 0.0,
        monthly_expenses: 0.0,
        annual_expenses: 0.0,
        contributions: 0.0,
        net_flow: 0.0,
        yield_caja: 0.0,
        yield_reserve: 0.0,
        yield_total: 0.0,
    }
}

/// Yields are reconstructed from the balance change once the year's known
/// cash flows are backed out, not summed from daily interest.
fn year_snapshot(
    params: &SimulationParameters,
    years_elapsed: u32,
    pools: Pools,
    year_start: Pools,
    flows: YearFlows,
) -> AccumulationSnapshot {
    let yield_caja =
        pools.caja - year_start.caja - flows.income + flows.expenses + flows.contributions;
    let yield_reserve = pools.reserve - year_start.reserve - flows.contributions;

    AccumulationSnapshot {
        year: params.start_year + years_elapsed as i32,
        age: params.current_age + years_elapsed,
        caja: pools.caja,
        reserve: pools.reserve,
        total: pools.total(),
        income: flows.income,
        monthly_expenses: flows.expenses / 12.0,
        annual_expenses: flows.expenses,
        contributions: flows.contributions,
        net_flow: flows.income - flows.expenses - flows.contributions,
        yield_caja,
        yield_reserve,
        yield_total: yield_caja + yield_reserve,
    }
}
