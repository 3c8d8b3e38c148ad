#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParameters {
    pub current_age: u32,
    pub retirement_age: u32,
    pub life_expectancy: u32,
    /// Calendar year of the year-0 snapshot.
    pub start_year: i32,
    pub initial_caja: f64,
    pub initial_reserve: f64,
    pub monthly_income: f64,
    pub daily_expense: f64,
    pub monthly_contribution: f64,
    /// Annual nominal rates in percent, e.g. 8.0 for 8%.
    pub caja_return_annual: f64,
    pub reserve_return_annual: f64,
    pub inflation_annual: f64,
    pub desired_monthly_expense: f64,
}

impl SimulationParameters {
    pub fn years_to_retirement(&self) -> u32 {
        self.retirement_age.saturating_sub(self.current_age)
    }

    pub fn years_in_retirement(&self) -> u32 {
        self.life_expectancy.saturating_sub(self.retirement_age)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccumulationSnapshot {
    pub year: i32,
    pub age: u32,
    pub caja: f64,
    pub reserve: f64,
    pub total: f64,
    pub income: f64,
    pub monthly_expenses: f64,
    pub annual_expenses: f64,
    pub contributions: f64,
    pub net_flow: f64,
    pub yield_caja: f64,
    pub yield_reserve: f64,
    pub yield_total: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetirementSnapshot {
    pub year: i32,
    pub age: u32,
    pub caja: f64,
    pub reserve: f64,
    pub total: f64,
    pub monthly_expenses: f64,
    pub annual_expenses: f64,
    /// Inflated daily expense on the snapshot day, expressed per month.
    pub adjusted_monthly_expense: f64,
    pub annual_deficit: f64,
    pub yield_caja: f64,
    pub yield_reserve: f64,
    pub yield_total: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnnualSnapshot {
    Accumulation(AccumulationSnapshot),
    Retirement(RetirementSnapshot),
}

impl AnnualSnapshot {
    pub fn year(&self) -> i32 {
        match self {
            AnnualSnapshot::Accumulation(row) => row.year,
            AnnualSnapshot::Retirement(row) => row.year,
        }
    }

    pub fn age(&self) -> u32 {
        match self {
            AnnualSnapshot::Accumulation(row) => row.age,
            AnnualSnapshot::Retirement(row) => row.age,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccumulationResult {
    pub final_caja: f64,
    pub final_reserve: f64,
    pub final_total: f64,
    pub snapshots: Vec<AccumulationSnapshot>,
    pub omitted_contributions: u32,
    pub contributions_made: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetirementResult {
    pub final_capital: f64,
    pub years_covered: f64,
    pub snapshots: Vec<RetirementSnapshot>,
    pub is_sufficient: bool,
    pub depletion_day: Option<u32>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PlanStatus {
    Excellent,
    Reachable,
    Insufficient,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub accumulation: AccumulationResult,
    pub retirement: RetirementResult,
    pub perpetual_monthly_income: f64,
    pub status: PlanStatus,
    pub annual_table: Vec<AnnualSnapshot>,
}

/// Balances of both pools while a phase loop runs.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Pools {
    pub caja: f64,
    pub reserve: f64,
}

impl Pools {
    pub fn total(self) -> f64 {
        self.caja + self.reserve
    }
}
