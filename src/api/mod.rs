use axum::{
    Router,
    extract::{Json, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::core::{
    AccumulationSnapshot, AnnualSnapshot, PlanStatus, Report, RetirementSnapshot,
    SimulationError, SimulationParameters, run_simulation,
};

const INDEX_HTML: &str = include_str!("../../web/index.html");

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid parameter `{field}`: {message}")]
    Validation { field: &'static str, message: String },

    #[error("the projection could not be computed for these parameters")]
    Computation(String),

    #[error("internal server error")]
    Internal(String),

    #[error("not found")]
    NotFound,
}

impl ApiError {
    fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ApiError::Validation {
            field,
            message: message.into(),
        }
    }
}

impl From<SimulationError> for ApiError {
    fn from(err: SimulationError) -> Self {
        match err {
            SimulationError::Validation { field, message } => ApiError::Validation {
                field: wire_field(field),
                message,
            },
            SimulationError::Computation(detail) => ApiError::Computation(detail),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, field) = match &self {
            ApiError::Validation { field, .. } => {
                warn!(error = %self, "rejected simulation request");
                (StatusCode::BAD_REQUEST, "validation", Some(*field))
            }
            ApiError::Computation(detail) => {
                error!(%detail, "simulation produced non-finite figures");
                (StatusCode::UNPROCESSABLE_ENTITY, "computation", None)
            }
            ApiError::Internal(detail) => {
                error!(%detail, "simulation task failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal", None)
            }
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not_found", None),
        };

        json_response(
            status,
            ErrorResponse {
                success: false,
                kind,
                error: self.to_string(),
                field,
            },
        )
    }
}

/// Maps engine parameter names to the request keys the client sent.
pub(crate) fn wire_field(field: &'static str) -> &'static str {
    match field {
        "current_age" => "edad_actual",
        "retirement_age" => "edad_jubilacion",
        "life_expectancy" => "esperanza_vida",
        "initial_caja" => "capital_inicial_caja",
        "initial_reserve" => "capital_inicial_reserva",
        "monthly_income" => "ingreso_mensual",
        "daily_expense" => "gasto_mensual",
        "monthly_contribution" => "aporte_mensual_jubilacion",
        "caja_return_annual" => "tasa_retorno_caja_anual",
        "reserve_return_annual" => "tasa_retorno_reserva_anual",
        "inflation_annual" => "inflacion_anual",
        "desired_monthly_expense" => "gasto_mensual_deseado",
        other => other,
    }
}

/// A projection request as posted by the page or saved by its export button.
///
/// Fields stay untyped until [`parameters_from_payload`] so a bad value is
/// reported against its key instead of failing the whole body.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SimulatePayload {
    edad_actual: Option<Value>,
    edad_jubilacion: Option<Value>,
    esperanza_vida: Option<Value>,
    capital_inicial_caja: Option<Value>,
    capital_inicial_reserva: Option<Value>,
    ingreso_mensual: Option<Value>,
    gasto_mensual: Option<Value>,
    aporte_mensual_jubilacion: Option<Value>,
    tasa_retorno_caja_anual: Option<Value>,
    tasa_retorno_reserva_anual: Option<Value>,
    inflacion_anual: Option<Value>,
    gasto_mensual_deseado: Option<Value>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    kind: &'static str,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
enum ApiPlanStatus {
    #[serde(rename = "excelente")]
    Excellent,
    #[serde(rename = "alcanzable")]
    Reachable,
    #[serde(rename = "insuficiente")]
    Insufficient,
}

impl From<PlanStatus> for ApiPlanStatus {
    fn from(value: PlanStatus) -> Self {
        match value {
            PlanStatus::Excellent => ApiPlanStatus::Excellent,
            PlanStatus::Reachable => ApiPlanStatus::Reachable,
            PlanStatus::Insufficient => ApiPlanStatus::Insufficient,
        }
    }
}

#[derive(Debug, Serialize)]
struct AccumulationRow {
    #[serde(rename = "ano")]
    year: i32,
    #[serde(rename = "edad")]
    age: u32,
    #[serde(rename = "capital_caja")]
    caja: f64,
    #[serde(rename = "capital_reserva")]
    reserve: f64,
    #[serde(rename = "capital_total")]
    total: f64,
    #[serde(rename = "ingresos_trabajo")]
    income: f64,
    #[serde(rename = "gastos_mensuales")]
    monthly_expenses: f64,
    #[serde(rename = "gastos_anuales")]
    annual_expenses: f64,
    #[serde(rename = "aportes")]
    contributions: f64,
    #[serde(rename = "flujo_neto")]
    net_flow: f64,
    #[serde(rename = "rendimiento_caja")]
    yield_caja: f64,
    #[serde(rename = "rendimiento_reserva")]
    yield_reserve: f64,
    #[serde(rename = "rendimiento_total")]
    yield_total: f64,
}

impl From<&AccumulationSnapshot> for AccumulationRow {
    fn from(row: &AccumulationSnapshot) -> Self {
        Self {
            year: row.year,
            age: row.age,
            caja: round2(row.caja),
            reserve: round2(row.reserve),
            total: round2(row.total),
            income: round2(row.income),
            monthly_expenses: round2(row.monthly_expenses),
            annual_expenses: round2(row.annual_expenses),
            contributions: round2(row.contributions),
            net_flow: round2(row.net_flow),
            yield_caja: round2(row.yield_caja),
            yield_reserve: round2(row.yield_reserve),
            yield_total: round2(row.yield_total),
        }
    }
}

#[derive(Debug, Serialize)]
struct RetirementRow {
    #[serde(rename = "ano")]
    year: i32,
    #[serde(rename = "edad")]
    age: u32,
    #[serde(rename = "capital_caja")]
    caja: f64,
    #[serde(rename = "capital_reserva")]
    reserve: f64,
    #[serde(rename = "capital_total")]
    total: f64,
    #[serde(rename = "gastos_mensuales")]
    monthly_expenses: f64,
    #[serde(rename = "gastos_anuales")]
    annual_expenses: f64,
    #[serde(rename = "gasto_mensual_ajustado")]
    adjusted_monthly_expense: f64,
    #[serde(rename = "deficit_anual")]
    annual_deficit: f64,
    #[serde(rename = "rendimiento_caja")]
    yield_caja: f64,
    #[serde(rename = "rendimiento_reserva")]
    yield_reserve: f64,
    #[serde(rename = "rendimiento_total")]
    yield_total: f64,
}

impl From<&RetirementSnapshot> for RetirementRow {
    fn from(row: &RetirementSnapshot) -> Self {
        Self {
            year: row.year,
            age: row.age,
            caja: round2(row.caja),
            reserve: round2(row.reserve),
            total: round2(row.total),
            monthly_expenses: round2(row.monthly_expenses),
            annual_expenses: round2(row.annual_expenses),
            adjusted_monthly_expense: round2(row.adjusted_monthly_expense),
            annual_deficit: round2(row.annual_deficit),
            yield_caja: round2(row.yield_caja),
            yield_reserve: round2(row.yield_reserve),
            yield_total: round2(row.yield_total),
        }
    }
}

/// The page tells the phases apart by which keys a row carries.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum AnnualRow {
    Accumulation(AccumulationRow),
    Retirement(RetirementRow),
}

impl From<&AnnualSnapshot> for AnnualRow {
    fn from(row: &AnnualSnapshot) -> Self {
        match row {
            AnnualSnapshot::Accumulation(row) => AnnualRow::Accumulation(row.into()),
            AnnualSnapshot::Retirement(row) => AnnualRow::Retirement(row.into()),
        }
    }
}

#[derive(Debug, Serialize)]
struct AccumulationResponse {
    #[serde(rename = "capital_caja_final")]
    final_caja: f64,
    #[serde(rename = "capital_reserva_final")]
    final_reserve: f64,
    #[serde(rename = "capital_total_final")]
    final_total: f64,
    #[serde(rename = "datos_anuales")]
    annual_rows: Vec<AccumulationRow>,
    #[serde(rename = "aportes_omitidos")]
    omitted_contributions: u32,
    #[serde(rename = "aportes_realizados")]
    contributions_made: u32,
}

#[derive(Debug, Serialize)]
struct RetirementResponse {
    #[serde(rename = "capital_final")]
    final_capital: f64,
    #[serde(rename = "anos_cubiertos")]
    years_covered: f64,
    #[serde(rename = "datos_anuales")]
    annual_rows: Vec<RetirementRow>,
    #[serde(rename = "es_suficiente")]
    is_sufficient: bool,
    #[serde(rename = "dia_agotamiento")]
    depletion_day: Option<u32>,
}

/// Wire shape of a finished projection, shared by the HTTP API and the
/// `simulate` command.
#[derive(Debug, Serialize)]
pub struct SimulateResponse {
    success: bool,
    #[serde(rename = "acumulacion")]
    accumulation: AccumulationResponse,
    #[serde(rename = "retiro")]
    retirement: RetirementResponse,
    #[serde(rename = "ingreso_perpetuo_mensual")]
    perpetual_monthly_income: f64,
    #[serde(rename = "estado")]
    status: ApiPlanStatus,
    #[serde(rename = "tabla_anual")]
    annual_table: Vec<AnnualRow>,
}

impl SimulateResponse {
    pub fn from_report(report: &Report) -> Self {
        let accumulation = &report.accumulation;
        let retirement = &report.retirement;
        Self {
            success: true,
            accumulation: AccumulationResponse {
                final_caja: round2(accumulation.final_caja),
                final_reserve: round2(accumulation.final_reserve),
                final_total: round2(accumulation.final_total),
                annual_rows: accumulation.snapshots.iter().map(Into::into).collect(),
                omitted_contributions: accumulation.omitted_contributions,
                contributions_made: accumulation.contributions_made,
            },
            retirement: RetirementResponse {
                final_capital: round2(retirement.final_capital),
                years_covered: retirement.years_covered,
                annual_rows: retirement.snapshots.iter().map(Into::into).collect(),
                is_sufficient: retirement.is_sufficient,
                depletion_day: retirement.depletion_day,
            },
            perpetual_monthly_income: round2(report.perpetual_monthly_income),
            status: report.status.into(),
            annual_table: report.annual_table.iter().map(Into::into).collect(),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Calendar year used to label the year-0 row.
pub fn current_year() -> i32 {
    chrono::Local::now().year()
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/calcular", post(simulate_handler))
        .route("/api/simulate", post(simulate_handler))
        .fallback(not_found_handler)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_http_server(addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "retirement projection API listening");

    axum::serve(listener, router()).await
}

async fn index_handler() -> impl IntoResponse {
    with_cache_control(Html(INDEX_HTML))
}

async fn not_found_handler() -> Response {
    ApiError::NotFound.into_response()
}

async fn simulate_handler(payload: Result<Json<SimulatePayload>, JsonRejection>) -> Response {
    match simulate(payload).await {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(err) => err.into_response(),
    }
}

async fn simulate(
    payload: Result<Json<SimulatePayload>, JsonRejection>,
) -> Result<SimulateResponse, ApiError> {
    let Json(payload) =
        payload.map_err(|rejection| ApiError::validation("body", rejection.body_text()))?;
    let params = parameters_from_payload(payload, current_year())?;

    let report = tokio::task::spawn_blocking(move || run_simulation(&params))
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))??;

    Ok(SimulateResponse::from_report(&report))
}

pub fn parameters_from_payload(
    payload: SimulatePayload,
    start_year: i32,
) -> Result<SimulationParameters, ApiError> {
    let monthly_expense = required_number("gasto_mensual", payload.gasto_mensual)?;
    let desired_monthly_expense =
        optional_number("gasto_mensual_deseado", payload.gasto_mensual_deseado)?
            .unwrap_or(monthly_expense);

    Ok(SimulationParameters {
        current_age: required_age("edad_actual", payload.edad_actual)?,
        retirement_age: required_age("edad_jubilacion", payload.edad_jubilacion)?,
        life_expectancy: required_age("esperanza_vida", payload.esperanza_vida)?,
        start_year,
        initial_caja: required_number("capital_inicial_caja", payload.capital_inicial_caja)?,
        initial_reserve: required_number(
            "capital_inicial_reserva",
            payload.capital_inicial_reserva,
        )?,
        monthly_income: required_number("ingreso_mensual", payload.ingreso_mensual)?,
        daily_expense: monthly_expense * 12.0 / 365.0,
        monthly_contribution: required_number(
            "aporte_mensual_jubilacion",
            payload.aporte_mensual_jubilacion,
        )?,
        caja_return_annual: required_number(
            "tasa_retorno_caja_anual",
            payload.tasa_retorno_caja_anual,
        )?,
        reserve_return_annual: required_number(
            "tasa_retorno_reserva_anual",
            payload.tasa_retorno_reserva_anual,
        )?,
        inflation_annual: required_number("inflacion_anual", payload.inflacion_anual)?,
        desired_monthly_expense,
    })
}

fn optional_number(field: &'static str, value: Option<Value>) -> Result<Option<f64>, ApiError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        // Exported configs keep blank inputs as empty strings.
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(value) => parse_number(field, &value).map(Some),
    }
}

fn required_number(field: &'static str, value: Option<Value>) -> Result<f64, ApiError> {
    optional_number(field, value)?.ok_or_else(|| ApiError::validation(field, "is required"))
}

fn required_age(field: &'static str, value: Option<Value>) -> Result<u32, ApiError> {
    let years = required_number(field, value)?;
    if years < 0.0 || years.fract() != 0.0 || years > u32::MAX as f64 {
        return Err(ApiError::validation(field, "must be a whole number of years"));
    }
    Ok(years as u32)
}

// Numeric strings are accepted because form fields arrive as text.
fn parse_number(field: &'static str, value: &Value) -> Result<f64, ApiError> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|number| number.is_finite())
        .ok_or_else(|| ApiError::validation(field, "must be a number"))
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}
