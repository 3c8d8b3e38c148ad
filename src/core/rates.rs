use super::types::SimulationParameters;

pub const DAYS_PER_YEAR: u32 = 365;
pub const DAYS_PER_MONTH: u32 = 30;

/// Converts an annual nominal rate in percent (TNA) to a daily rate by plain
/// division. This is not an effective-annual conversion: compounding the result
/// daily for a year yields slightly more than the nominal rate.
pub fn daily_rate(annual_percent: f64) -> f64 {
    (annual_percent / 100.0) / DAYS_PER_YEAR as f64
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyRates {
    pub caja: f64,
    pub reserve: f64,
    pub inflation: f64,
}

impl DailyRates {
    pub fn from_parameters(params: &SimulationParameters) -> Self {
        Self {
            caja: daily_rate(params.caja_return_annual),
            reserve: daily_rate(params.reserve_return_annual),
            inflation: daily_rate(params.inflation_annual),
        }
    }

    /// Cumulative price level after `day` days counted from the start of the
    /// projection. The exponent never resets between years or phases.
    pub fn inflation_factor(&self, day: u32) -> f64 {
        (1.0 + self.inflation).powf(day as f64)
    }
}
