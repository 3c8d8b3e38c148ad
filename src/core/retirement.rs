use tracing::debug;

use super::rates::{DAYS_PER_YEAR, DailyRates};
use super::types::{Pools, RetirementResult, RetirementSnapshot, SimulationParameters};

/// Both pools at or below this count as exhausted.
const DEPLETION_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, Default)]
struct YearTotals {
    expenses: f64,
    deficit: f64,
    yield_caja: f64,
    yield_reserve: f64,
}

pub fn simulate_retirement(
    params: &SimulationParameters,
    rates: &DailyRates,
    caja_at_retirement: f64,
    reserve_at_retirement: f64,
) -> RetirementResult {
    let opening = Pools {
        caja: caja_at_retirement.max(0.0),
        reserve: reserve_at_retirement.max(0.0),
    };
    let horizon_days = params.years_in_retirement() * DAYS_PER_YEAR;
    run_drawdown(params, rates, opening, horizon_days)
}

fn run_drawdown(
    params: &SimulationParameters,
    rates: &DailyRates,
    mut pools: Pools,
    horizon_days: u32,
) -> RetirementResult {
    let days_accumulated = params.years_to_retirement() * DAYS_PER_YEAR;
    let base_daily_expense = (params.desired_monthly_expense * 12.0) / DAYS_PER_YEAR as f64;

    let mut snapshots = Vec::with_capacity(horizon_days.div_ceil(DAYS_PER_YEAR) as usize);
    let mut totals = YearTotals::default();
    let mut depletion_day = None;

    for day in 1..=horizon_days {
        let interest_caja = pools.caja.max(0.0) * rates.caja;
        let interest_reserve = pools.reserve.max(0.0) * rates.reserve;
        pools.caja += interest_caja;
        pools.reserve += interest_reserve;
        totals.yield_caja += interest_caja;
        totals.yield_reserve += interest_reserve;

        let expense = base_daily_expense * rates.inflation_factor(days_accumulated + day);
        let unmet = withdraw(&mut pools, expense);
        totals.expenses += expense - unmet;
        totals.deficit += unmet;

        if depletion_day.is_none()
            && pools.caja <= DEPLETION_TOLERANCE
            && pools.reserve <= DEPLETION_TOLERANCE
            && unmet > 0.0
        {
            depletion_day = Some(day);
        }

        if day % DAYS_PER_YEAR == 0 || day == horizon_days {
            snapshots.push(year_snapshot(params, day, pools, expense, totals));
            totals = YearTotals::default();
        }
    }

    let years_covered = match depletion_day {
        Some(day) => day as f64 / DAYS_PER_YEAR as f64,
        None => horizon_days as f64 / DAYS_PER_YEAR as f64,
    };
    debug!(
        days = horizon_days,
        final_capital = pools.total(),
        ?depletion_day,
        "retirement phase finished"
    );

    RetirementResult {
        final_capital: pools.total().max(0.0),
        years_covered: round_to_tenth(years_covered),
        snapshots,
        is_sufficient: depletion_day.is_none(),
        depletion_day,
    }
}

/// Draws `amount` from caja first and then reserve. Returns the part neither
/// pool could fund; it is not carried to the next day.
fn withdraw(pools: &mut Pools, amount: f64) -> f64 {
    let mut remaining = amount;

    if pools.caja > 0.0 {
        let from_caja = pools.caja.min(remaining);
        pools.caja -= from_caja;
        remaining -= from_caja;
    }

    if remaining > 0.0 && pools.reserve > 0.0 {
        let from_reserve = pools.reserve.min(remaining);
        pools.reserve -= from_reserve;
        remaining -= from_reserve;
    }

    remaining
}

fn year_snapshot(
    params: &SimulationParameters,
    day: u32,
    pools: Pools,
    last_daily_expense: f64,
    totals: YearTotals,
) -> RetirementSnapshot {
    // A trailing partial year counts as a year of its own.
    let retirement_year = day.div_ceil(DAYS_PER_YEAR);
    let years_before = params.years_to_retirement() + retirement_year - 1;

    RetirementSnapshot {
        year: params.start_year + years_before as i32,
        age: params.retirement_age + retirement_year - 1,
        caja: pools.caja.max(0.0),
        reserve: pools.reserve.max(0.0),
        total: pools.total().max(0.0),
        monthly_expenses: totals.expenses / 12.0,
        annual_expenses: totals.expenses,
        adjusted_monthly_expense: last_daily_expense * DAYS_PER_YEAR as f64 / 12.0,
        annual_deficit: totals.deficit,
        yield_caja: totals.yield_caja,
        yield_reserve: totals.yield_reserve,
        yield_total: totals.yield_caja + totals.yield_reserve,
    }
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn assert_approx_tol(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn retiree_params() -> SimulationParameters {
        SimulationParameters {
            current_age: 60,
            retirement_age: 65,
            life_expectancy: 85,
            start_year: 2030,
            initial_caja: 0.0,
            initial_reserve: 0.0,
            monthly_income: 0.0,
            daily_expense: 0.0,
            monthly_contribution: 0.0,
            caja_return_annual: 0.0,
            reserve_return_annual: 0.0,
            inflation_annual: 0.0,
            desired_monthly_expense: 1_000.0,
        }
    }

    fn run(params: &SimulationParameters, caja: f64, reserve: f64) -> RetirementResult {
        simulate_retirement(params, &DailyRates::from_parameters(params), caja, reserve)
    }

    #[test]
    fn ample_capital_is_sufficient_for_full_horizon() {
        let params = retiree_params();
        let result = run(&params, 50_000.0, 500_000.0);

        assert!(result.is_sufficient);
        assert_eq!(result.depletion_day, None);
        assert_eq!(result.years_covered, 20.0);
        assert_eq!(result.snapshots.len(), 20);
        // 20 years of 12000 with no growth and no inflation.
        assert_approx_tol(result.final_capital, 550_000.0 - 20.0 * 12_000.0, 1e-4);
    }

    #[test]
    fn caja_is_drained_before_reserve() {
        let params = retiree_params();
        let result = run(&params, 12_000.0, 100_000.0);

        let first = result.snapshots[0];
        assert_approx(first.caja, 0.0);
        assert_approx(first.reserve, 100_000.0);
        assert_approx(first.annual_expenses, 12_000.0);

        let second = result.snapshots[1];
        assert_approx(second.caja, 0.0);
        assert_approx(second.reserve, 88_000.0);
    }

    #[test]
    fn unaffordable_expense_depletes_and_records_deficit() {
        let mut params = retiree_params();
        params.desired_monthly_expense = 50_000.0;
        params.reserve_return_annual = 5.0;

        let result = run(&params, 10_000.0, 200_000.0);
        assert!(!result.is_sufficient);
        let day = result.depletion_day.expect("capital must run out");
        assert!(day < 365 * 20);
        assert!(result.years_covered < 20.0);
        assert_approx(result.final_capital, 0.0);
        assert_eq!(result.snapshots.len(), 20);

        let last = result.snapshots[19];
        assert_eq!(last.annual_expenses, 0.0);
        assert_approx(last.annual_deficit, 600_000.0);
        for row in &result.snapshots {
            assert!(row.caja >= 0.0 && row.reserve >= 0.0);
        }
    }

    #[test]
    fn empty_pools_deplete_on_the_first_day() {
        let params = retiree_params();
        let result = run(&params, 0.0, 0.0);

        assert_eq!(result.depletion_day, Some(1));
        assert_eq!(result.years_covered, 0.0);
        assert_approx(result.snapshots[0].annual_deficit, 12_000.0);
        assert_eq!(result.snapshots[0].annual_expenses, 0.0);
    }

    #[test]
    fn negative_terminal_balances_are_floored_on_entry() {
        let params = retiree_params();
        let result = run(&params, -5_000.0, 250_000.0);
        assert!(result.is_sufficient);
        assert_approx_tol(result.final_capital, 10_000.0, 1e-4);
        assert_approx_tol(result.snapshots[0].reserve, 238_000.0, 1e-4);
        assert_eq!(result.snapshots[0].caja, 0.0);
    }

    #[test]
    fn yields_are_exact_interest_sums() {
        let mut params = retiree_params();
        params.desired_monthly_expense = 0.0;
        params.caja_return_annual = 3.65;
        params.reserve_return_annual = 7.3;

        let result = run(&params, 1_000.0, 10_000.0);
        let first = result.snapshots[0];
        assert_approx(first.yield_caja, first.caja - 1_000.0);
        assert_approx(first.yield_reserve, first.reserve - 10_000.0);
        assert_approx(first.yield_total, first.yield_caja + first.yield_reserve);
    }

    #[test]
    fn inflation_clock_continues_from_accumulation() {
        let mut params = retiree_params();
        params.inflation_annual = 4.0;
        let rates = DailyRates::from_parameters(&params);

        let result = run(&params, 0.0, 10_000_000.0);
        let first = result.snapshots[0];
        let base_daily = 12_000.0 / 365.0;
        // The first retirement year ends 6 years (5 accumulated + 1) into the clock.
        let expected = base_daily * rates.inflation_factor(6 * 365) * 365.0 / 12.0;
        assert_approx(first.adjusted_monthly_expense, expected);
        assert!(first.annual_expenses > 12_000.0 * rates.inflation_factor(5 * 365));
    }

    #[test]
    fn snapshots_are_labelled_from_retirement_age() {
        let params = retiree_params();
        let result = run(&params, 0.0, 1_000_000.0);

        assert_eq!(result.snapshots[0].age, 65);
        assert_eq!(result.snapshots[0].year, 2035);
        assert_eq!(result.snapshots[19].age, 84);
        assert_eq!(result.snapshots[19].year, 2054);
    }

    #[test]
    fn partial_final_year_gets_its_own_snapshot() {
        let params = retiree_params();
        let rates = DailyRates::from_parameters(&params);
        let opening = Pools {
            caja: 0.0,
            reserve: 1_000_000.0,
        };

        let result = run_drawdown(&params, &rates, opening, 400);
        assert_eq!(result.snapshots.len(), 2);
        assert_eq!(result.snapshots[1].age, 66);
        assert_approx(result.snapshots[1].annual_expenses, 35.0 * 12_000.0 / 365.0);
        assert_eq!(result.years_covered, 1.1);
    }

    #[test]
    fn years_covered_rounds_to_one_decimal() {
        assert_eq!(round_to_tenth(3.0 + 200.0 / 365.0), 3.5);
        assert_eq!(round_to_tenth(0.04), 0.0);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_withdraw_conserves_value_and_never_goes_negative(
            caja in 0u32..100_000,
            reserve in 0u32..100_000,
            amount in 0u32..250_000,
        ) {
            let mut pools = Pools { caja: caja as f64, reserve: reserve as f64 };
            let before = pools.total();
            let amount = amount as f64;

            let unmet = withdraw(&mut pools, amount);
            prop_assert!(pools.caja >= 0.0);
            prop_assert!(pools.reserve >= 0.0);
            prop_assert!(unmet >= 0.0);
            prop_assert!((before - pools.total() - (amount - unmet)).abs() <= 1e-6);
            if unmet > 0.0 {
                prop_assert_eq!(pools.total(), 0.0);
            }
        }
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(24))]

        #[test]
        fn prop_one_snapshot_per_retirement_year(
            years in 1u32..25,
            reserve in 0u32..2_000_000,
            expense in 0u32..20_000,
            reserve_bp in -300i32..1200,
            inflation_bp in 0u32..1000,
        ) {
            let mut params = retiree_params();
            params.life_expectancy = params.retirement_age + years;
            params.desired_monthly_expense = expense as f64;
            params.reserve_return_annual = reserve_bp as f64 / 100.0;
            params.inflation_annual = inflation_bp as f64 / 100.0;

            let result = run(&params, 0.0, reserve as f64);
            prop_assert_eq!(result.snapshots.len(), years as usize);
            prop_assert!(result.final_capital >= 0.0);
            prop_assert!(result.years_covered <= years as f64);
            prop_assert_eq!(result.is_sufficient, result.depletion_day.is_none());
            for row in &result.snapshots {
                prop_assert!(row.caja >= 0.0 && row.reserve >= 0.0);
                prop_assert!(row.annual_deficit >= 0.0);
            }
        }
    }
}
