use axum::{
    Router,
    extract::{Json, Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use crate::core::{BuyerType, DealInputs, LoanType, analyze_deal};
use crate::signals::{Location, OfflineBackend, fetch_property_signals};
use crate::store::{NewScenario, ScenarioPatch, ScenarioRecord, ScenarioStore, StoreError};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliBuyerType {
    Individual,
    Company,
}

impl From<CliBuyerType> for BuyerType {
    fn from(value: CliBuyerType) -> Self {
        match value {
            CliBuyerType::Individual => BuyerType::Individual,
            CliBuyerType::Company => BuyerType::Company,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliLoanType {
    Repayment,
    InterestOnly,
}

impl From<CliLoanType> for LoanType {
    fn from(value: CliLoanType) -> Self {
        match value {
            CliLoanType::Repayment => LoanType::Repayment,
            CliLoanType::InterestOnly => LoanType::InterestOnly,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiBuyerType {
    Individual,
    #[serde(alias = "ltd", alias = "limited-company")]
    Company,
}

impl From<ApiBuyerType> for CliBuyerType {
    fn from(value: ApiBuyerType) -> Self {
        match value {
            ApiBuyerType::Individual => CliBuyerType::Individual,
            ApiBuyerType::Company => CliBuyerType::Company,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiLoanType {
    Repayment,
    #[serde(alias = "interestOnly", alias = "interest_only", alias = "io")]
    InterestOnly,
}

impl From<ApiLoanType> for CliLoanType {
    fn from(value: ApiLoanType) -> Self {
        match value {
            ApiLoanType::Repayment => CliLoanType::Repayment,
            ApiLoanType::InterestOnly => CliLoanType::InterestOnly,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AnalyzePayload {
    purchase_price: Option<f64>,
    deposit_pct: Option<f64>,
    closing_costs_pct: Option<f64>,
    renovation_cost: Option<f64>,
    buyer_type: Option<ApiBuyerType>,
    properties_owned: Option<u32>,
    first_time_buyer: Option<bool>,

    interest_rate: Option<f64>,
    mortgage_years: Option<u32>,
    loan_type: Option<ApiLoanType>,

    monthly_rent: Option<f64>,
    vacancy_pct: Option<f64>,
    mgmt_pct: Option<f64>,
    repairs_pct: Option<f64>,
    insurance_per_year: Option<f64>,
    other_opex_per_year: Option<f64>,

    annual_appreciation: Option<f64>,
    rent_growth: Option<f64>,
    exit_year: Option<u32>,
    selling_costs_pct: Option<f64>,
    discount_rate: Option<f64>,

    income_person_1: Option<f64>,
    income_person_2: Option<f64>,
    ownership_share_1: Option<f64>,
    ownership_share_2: Option<f64>,
    reinvest_income: Option<bool>,
    reinvest_pct: Option<f64>,
    index_fund_growth: Option<f64>,
}

// Percentages on this surface are human-scale (5.5 means 5.5%); build_inputs
// converts them to fractions.
#[derive(Parser, Debug)]
#[command(
    name = "rentroll",
    about = "Buy-to-let deal analyzer (UK stamp duty + income tax + exit projection)"
)]
struct Cli {
    #[arg(long)]
    purchase_price: f64,
    #[arg(long, default_value_t = 25.0, help = "Deposit as percent of price")]
    deposit_pct: f64,
    #[arg(
        long,
        default_value_t = 1.5,
        help = "Legal and survey costs as percent of price, excluding stamp duty"
    )]
    closing_costs_pct: f64,
    #[arg(long, default_value_t = 0.0)]
    renovation_cost: f64,
    #[arg(long, value_enum, default_value_t = CliBuyerType::Individual)]
    buyer_type: CliBuyerType,
    #[arg(
        long,
        default_value_t = 0,
        help = "Dwellings already owned by the buyer, drives the stamp duty surcharge"
    )]
    properties_owned: u32,
    #[arg(long, default_value_t = false)]
    first_time_buyer: bool,
    #[arg(long, default_value_t = 5.5, help = "Mortgage interest rate in percent")]
    interest_rate: f64,
    #[arg(long, default_value_t = 30)]
    mortgage_years: u32,
    #[arg(long, value_enum, default_value_t = CliLoanType::Repayment)]
    loan_type: CliLoanType,
    #[arg(long, default_value_t = 1400.0)]
    monthly_rent: f64,
    #[arg(long, default_value_t = 5.0, help = "Vacancy allowance in percent of rent")]
    vacancy_pct: f64,
    #[arg(
        long,
        default_value_t = 10.0,
        help = "Letting management fee in percent of collected rent"
    )]
    mgmt_pct: f64,
    #[arg(
        long,
        default_value_t = 8.0,
        help = "Repairs reserve in percent of collected rent"
    )]
    repairs_pct: f64,
    #[arg(long, default_value_t = 500.0)]
    insurance_per_year: f64,
    #[arg(long, default_value_t = 300.0)]
    other_opex_per_year: f64,
    #[arg(
        long,
        default_value_t = 3.0,
        help = "Expected annual property appreciation in percent"
    )]
    annual_appreciation: f64,
    #[arg(long, default_value_t = 2.0, help = "Annual rent growth in percent")]
    rent_growth: f64,
    #[arg(long, default_value_t = 10, help = "Year the property is sold")]
    exit_year: u32,
    #[arg(
        long,
        default_value_t = 2.0,
        help = "Agent and legal costs at sale in percent of sale price"
    )]
    selling_costs_pct: f64,
    #[arg(long, default_value_t = 5.0, help = "NPV discount rate in percent")]
    discount_rate: f64,
    #[arg(
        long,
        default_value_t = 40000.0,
        help = "Owner 1 employment income, sets their marginal tax band"
    )]
    income_person_1: f64,
    #[arg(long, default_value_t = 0.0)]
    income_person_2: f64,
    #[arg(
        long,
        default_value_t = 100.0,
        help = "Owner 1 share of rental profit in percent"
    )]
    ownership_share_1: f64,
    #[arg(long, default_value_t = 0.0)]
    ownership_share_2: f64,
    #[arg(long, default_value_t = false)]
    reinvest_income: bool,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Share of after-tax cash flow diverted into the reinvestment fund, in percent"
    )]
    reinvest_pct: f64,
    #[arg(
        long,
        default_value_t = 7.0,
        help = "Index fund growth rate in percent, for the opportunity-cost benchmark"
    )]
    index_fund_growth: f64,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_inputs(cli: Cli) -> Result<DealInputs, String> {
    if !cli.purchase_price.is_finite() || cli.purchase_price <= 0.0 {
        return Err("--purchase-price must be > 0".to_string());
    }

    for (name, pct) in [
        ("--deposit-pct", cli.deposit_pct),
        ("--closing-costs-pct", cli.closing_costs_pct),
        ("--vacancy-pct", cli.vacancy_pct),
        ("--mgmt-pct", cli.mgmt_pct),
        ("--repairs-pct", cli.repairs_pct),
        ("--selling-costs-pct", cli.selling_costs_pct),
        ("--reinvest-pct", cli.reinvest_pct),
        ("--interest-rate", cli.interest_rate),
    ] {
        if !(0.0..=100.0).contains(&pct) {
            return Err(format!("{name} must be between 0 and 100"));
        }
    }

    if !cli.renovation_cost.is_finite() || cli.renovation_cost < 0.0 {
        return Err("--renovation-cost must be >= 0".to_string());
    }

    if cli.mortgage_years == 0 || cli.mortgage_years > 100 {
        return Err("--mortgage-years must be between 1 and 100".to_string());
    }

    if !cli.monthly_rent.is_finite() || cli.monthly_rent < 0.0 {
        return Err("--monthly-rent must be >= 0".to_string());
    }

    if cli.insurance_per_year < 0.0 || cli.other_opex_per_year < 0.0 {
        return Err("--insurance-per-year and --other-opex-per-year must be >= 0".to_string());
    }

    for (name, rate) in [
        ("--annual-appreciation", cli.annual_appreciation),
        ("--rent-growth", cli.rent_growth),
        ("--discount-rate", cli.discount_rate),
        ("--index-fund-growth", cli.index_fund_growth),
    ] {
        if !rate.is_finite() || rate <= -100.0 {
            return Err(format!("{name} must be > -100"));
        }
    }

    if cli.exit_year == 0 || cli.exit_year > 100 {
        return Err("--exit-year must be between 1 and 100".to_string());
    }

    if cli.income_person_1 < 0.0 || cli.income_person_2 < 0.0 {
        return Err("--income-person-1 and --income-person-2 must be >= 0".to_string());
    }

    if !cli.ownership_share_1.is_finite()
        || !cli.ownership_share_2.is_finite()
        || cli.ownership_share_1 < 0.0
        || cli.ownership_share_2 < 0.0
    {
        return Err("--ownership-share-1 and --ownership-share-2 must be >= 0".to_string());
    }

    Ok(DealInputs {
        purchase_price: cli.purchase_price,
        deposit_pct: cli.deposit_pct / 100.0,
        closing_costs_pct: cli.closing_costs_pct / 100.0,
        renovation_cost: cli.renovation_cost,
        buyer_type: cli.buyer_type.into(),
        properties_owned: cli.properties_owned,
        first_time_buyer: cli.first_time_buyer,
        interest_rate: cli.interest_rate / 100.0,
        mortgage_years: cli.mortgage_years,
        loan_type: cli.loan_type.into(),
        monthly_rent: cli.monthly_rent,
        vacancy_pct: cli.vacancy_pct / 100.0,
        mgmt_pct: cli.mgmt_pct / 100.0,
        repairs_pct: cli.repairs_pct / 100.0,
        insurance_per_year: cli.insurance_per_year,
        other_opex_per_year: cli.other_opex_per_year,
        annual_appreciation: cli.annual_appreciation / 100.0,
        rent_growth: cli.rent_growth / 100.0,
        exit_year: cli.exit_year,
        selling_costs_pct: cli.selling_costs_pct / 100.0,
        discount_rate: cli.discount_rate / 100.0,
        income_person_1: cli.income_person_1,
        income_person_2: cli.income_person_2,
        ownership_share_1: cli.ownership_share_1 / 100.0,
        ownership_share_2: cli.ownership_share_2 / 100.0,
        reinvest_income: cli.reinvest_income,
        reinvest_pct: cli.reinvest_pct / 100.0,
        index_fund_growth: cli.index_fund_growth / 100.0,
    })
}

fn inputs_from_payload(payload: AnalyzePayload) -> Result<DealInputs, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.purchase_price {
        cli.purchase_price = v;
    }
    if let Some(v) = payload.deposit_pct {
        cli.deposit_pct = v;
    }
    if let Some(v) = payload.closing_costs_pct {
        cli.closing_costs_pct = v;
    }
    if let Some(v) = payload.renovation_cost {
        cli.renovation_cost = v;
    }
    if let Some(v) = payload.buyer_type {
        cli.buyer_type = v.into();
    }
    if let Some(v) = payload.properties_owned {
        cli.properties_owned = v;
    }
    if let Some(v) = payload.first_time_buyer {
        cli.first_time_buyer = v;
    }

    if let Some(v) = payload.interest_rate {
        cli.interest_rate = v;
    }
    if let Some(v) = payload.mortgage_years {
        cli.mortgage_years = v;
    }
    if let Some(v) = payload.loan_type {
        cli.loan_type = v.into();
    }

    if let Some(v) = payload.monthly_rent {
        cli.monthly_rent = v;
    }
    if let Some(v) = payload.vacancy_pct {
        cli.vacancy_pct = v;
    }
    if let Some(v) = payload.mgmt_pct {
        cli.mgmt_pct = v;
    }
    if let Some(v) = payload.repairs_pct {
        cli.repairs_pct = v;
    }
    if let Some(v) = payload.insurance_per_year {
        cli.insurance_per_year = v;
    }
    if let Some(v) = payload.other_opex_per_year {
        cli.other_opex_per_year = v;
    }

    if let Some(v) = payload.annual_appreciation {
        cli.annual_appreciation = v;
    }
    if let Some(v) = payload.rent_growth {
        cli.rent_growth = v;
    }
    if let Some(v) = payload.exit_year {
        cli.exit_year = v;
    }
    if let Some(v) = payload.selling_costs_pct {
        cli.selling_costs_pct = v;
    }
    if let Some(v) = payload.discount_rate {
        cli.discount_rate = v;
    }

    if let Some(v) = payload.income_person_1 {
        cli.income_person_1 = v;
    }
    if let Some(v) = payload.income_person_2 {
        cli.income_person_2 = v;
    }
    if let Some(v) = payload.ownership_share_1 {
        cli.ownership_share_1 = v;
    }
    if let Some(v) = payload.ownership_share_2 {
        cli.ownership_share_2 = v;
    }
    if let Some(v) = payload.reinvest_income {
        cli.reinvest_income = v;
    }
    if let Some(v) = payload.reinvest_pct {
        cli.reinvest_pct = v;
    }
    if let Some(v) = payload.index_fund_growth {
        cli.index_fund_growth = v;
    }

    build_inputs(cli)
}

fn default_cli_for_api() -> Cli {
    Cli {
        purchase_price: 250_000.0,
        deposit_pct: 25.0,
        closing_costs_pct: 1.5,
        renovation_cost: 0.0,
        buyer_type: CliBuyerType::Individual,
        properties_owned: 0,
        first_time_buyer: false,
        interest_rate: 5.5,
        mortgage_years: 30,
        loan_type: CliLoanType::Repayment,
        monthly_rent: 1_400.0,
        vacancy_pct: 5.0,
        mgmt_pct: 10.0,
        repairs_pct: 8.0,
        insurance_per_year: 500.0,
        other_opex_per_year: 300.0,
        annual_appreciation: 3.0,
        rent_growth: 2.0,
        exit_year: 10,
        selling_costs_pct: 2.0,
        discount_rate: 5.0,
        income_person_1: 40_000.0,
        income_person_2: 0.0,
        ownership_share_1: 100.0,
        ownership_share_2: 0.0,
        reinvest_income: false,
        reinvest_pct: 0.0,
        index_fund_growth: 7.0,
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub db_path: PathBuf,
    pub user: String,
    pub pass: String,
}

impl ServerConfig {
    pub fn from_env(port: u16) -> Self {
        Self {
            port,
            db_path: std::env::var("RENTROLL_DB")
                .unwrap_or_else(|_| "rentroll.db".to_string())
                .into(),
            user: std::env::var("RENTROLL_USER").unwrap_or_else(|_| "admin".to_string()),
            pass: std::env::var("RENTROLL_PASS").unwrap_or_else(|_| "changeme".to_string()),
        }
    }
}

#[derive(Clone)]
struct AuthConfig {
    user: String,
    pass: String,
}

#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<ScenarioStore>>,
    auth: AuthConfig,
}

pub async fn run_http_server(config: ServerConfig) -> std::io::Result<()> {
    let store = ScenarioStore::open(&config.db_path).map_err(std::io::Error::other)?;
    let state = AppState {
        store: Arc::new(Mutex::new(store)),
        auth: AuthConfig {
            user: config.user,
            pass: config.pass,
        },
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = Router::new()
        .route(
            "/api/analyze",
            get(analyze_get_handler).post(analyze_post_handler),
        )
        .route("/api/signals", get(signals_handler))
        .route(
            "/api/scenarios",
            get(list_scenarios_handler).post(create_scenario_handler),
        )
        .route(
            "/api/scenarios/:id",
            get(get_scenario_handler)
                .put(put_scenario_handler)
                .patch(patch_scenario_handler)
                .delete(delete_scenario_handler),
        )
        .fallback(not_found_handler)
        .with_state(state);

    let listener = TcpListener::bind(addr).await?;
    println!("rentroll HTTP API listening on http://{addr}");
    println!("Local access: http://127.0.0.1:{}/", config.port);

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn analyze_get_handler(Query(payload): Query<AnalyzePayload>) -> Response {
    analyze_handler_impl(payload)
}

async fn analyze_post_handler(Json(payload): Json<AnalyzePayload>) -> Response {
    analyze_handler_impl(payload)
}

fn analyze_handler_impl(payload: AnalyzePayload) -> Response {
    match inputs_from_payload(payload) {
        Ok(inputs) => json_response(StatusCode::OK, analyze_deal(&inputs)),
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SignalsQuery {
    postcode: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    area_code: Option<String>,
}

async fn signals_handler(Query(query): Query<SignalsQuery>) -> Response {
    let Some(postcode) = query.postcode.filter(|p| !p.trim().is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "postcode query parameter is required");
    };
    let location = Location {
        postcode,
        lat: query.lat,
        lon: query.lon,
        area_code: query.area_code,
    };
    let signals = fetch_property_signals(&OfflineBackend, &location).await;
    json_response(StatusCode::OK, signals)
}

/// Full scenario body for create and PUT. `derived` and `columns` are
/// caller-owned JSON and default to empty.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScenarioPayload {
    name: String,
    inputs: Value,
    #[serde(default)]
    derived: Option<Value>,
    #[serde(default)]
    show_derived: bool,
    #[serde(default)]
    columns: Option<Value>,
}

impl From<ScenarioPayload> for NewScenario {
    fn from(payload: ScenarioPayload) -> Self {
        Self {
            name: payload.name,
            inputs: payload.inputs,
            derived: payload.derived.unwrap_or_else(|| json!({})),
            show_derived: payload.show_derived,
            columns: payload.columns.unwrap_or_else(|| json!([])),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ScenarioPatchPayload {
    name: Option<String>,
    inputs: Option<Value>,
    derived: Option<Value>,
    show_derived: Option<bool>,
    columns: Option<Value>,
}

impl From<ScenarioPatchPayload> for ScenarioPatch {
    fn from(payload: ScenarioPatchPayload) -> Self {
        Self {
            name: payload.name,
            inputs: payload.inputs,
            derived: payload.derived,
            show_derived: payload.show_derived,
            columns: payload.columns,
        }
    }
}

async fn list_scenarios_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !authorized(&headers, &state.auth) {
        return unauthorized_response();
    }
    let store = match state.store.lock() {
        Ok(store) => store,
        Err(_) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, "datastore unavailable"),
    };
    match store.list() {
        Ok(records) => json_response(StatusCode::OK, records),
        Err(e) => store_error_response(e),
    }
}

async fn create_scenario_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ScenarioPayload>,
) -> Response {
    if !authorized(&headers, &state.auth) {
        return unauthorized_response();
    }
    let store = match state.store.lock() {
        Ok(store) => store,
        Err(_) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, "datastore unavailable"),
    };
    record_response(store.create(payload.into()), StatusCode::CREATED)
}

async fn get_scenario_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers, &state.auth) {
        return unauthorized_response();
    }
    let store = match state.store.lock() {
        Ok(store) => store,
        Err(_) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, "datastore unavailable"),
    };
    record_response(store.get(&id), StatusCode::OK)
}

async fn put_scenario_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<ScenarioPayload>,
) -> Response {
    if !authorized(&headers, &state.auth) {
        return unauthorized_response();
    }
    let store = match state.store.lock() {
        Ok(store) => store,
        Err(_) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, "datastore unavailable"),
    };
    record_response(store.update_full(&id, payload.into()), StatusCode::OK)
}

async fn patch_scenario_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<ScenarioPatchPayload>,
) -> Response {
    if !authorized(&headers, &state.auth) {
        return unauthorized_response();
    }
    let store = match state.store.lock() {
        Ok(store) => store,
        Err(_) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, "datastore unavailable"),
    };
    record_response(store.update_partial(&id, payload.into()), StatusCode::OK)
}

async fn delete_scenario_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers, &state.auth) {
        return unauthorized_response();
    }
    let store = match state.store.lock() {
        Ok(store) => store,
        Err(_) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, "datastore unavailable"),
    };
    match store.delete(&id) {
        Ok(()) => with_cache_control(StatusCode::NO_CONTENT),
        Err(e) => store_error_response(e),
    }
}

fn record_response(
    result: Result<ScenarioRecord, StoreError>,
    success_status: StatusCode,
) -> Response {
    match result {
        Ok(record) => json_response(success_status, record),
        Err(e) => store_error_response(e),
    }
}

fn store_error_response(e: StoreError) -> Response {
    match e {
        StoreError::NotFound(id) => {
            error_response(StatusCode::NOT_FOUND, &format!("scenario not found: {id}"))
        }
        other => error_response(StatusCode::INTERNAL_SERVER_ERROR, &other.to_string()),
    }
}

fn authorized(headers: &HeaderMap, auth: &AuthConfig) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(credentials_from_header)
        .is_some_and(|(user, pass)| user == auth.user && pass == auth.pass)
}

fn credentials_from_header(value: &str) -> Option<(String, String)> {
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = BASE64_STANDARD.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, pass) = text.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

fn unauthorized_response() -> Response {
    let mut response = error_response(StatusCode::UNAUTHORIZED, "authentication required");
    response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        "Basic realm=\"rentroll\"".parse().expect("valid header"),
    );
    response
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn inputs_from_json(json: &str) -> Result<DealInputs, String> {
    let payload = serde_json::from_str::<AnalyzePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    inputs_from_payload(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_cli() -> Cli {
        default_cli_for_api()
    }

    #[test]
    fn build_inputs_converts_percent_fields_to_fractions() {
        let inputs = build_inputs(sample_cli()).expect("valid inputs");
        assert_approx(inputs.deposit_pct, 0.25);
        assert_approx(inputs.closing_costs_pct, 0.015);
        assert_approx(inputs.interest_rate, 0.055);
        assert_approx(inputs.vacancy_pct, 0.05);
        assert_approx(inputs.ownership_share_1, 1.0);
        assert_approx(inputs.index_fund_growth, 0.07);
    }

    #[test]
    fn build_inputs_rejects_non_positive_price() {
        let mut cli = sample_cli();
        cli.purchase_price = 0.0;
        let err = build_inputs(cli).expect_err("must reject zero price");
        assert!(err.contains("--purchase-price"));
    }

    #[test]
    fn build_inputs_rejects_out_of_range_percentages() {
        let mut cli = sample_cli();
        cli.deposit_pct = 120.0;
        let err = build_inputs(cli).expect_err("must reject deposit > 100");
        assert!(err.contains("--deposit-pct"));

        let mut cli = sample_cli();
        cli.reinvest_pct = -5.0;
        let err = build_inputs(cli).expect_err("must reject negative reinvest");
        assert!(err.contains("--reinvest-pct"));
    }

    #[test]
    fn build_inputs_rejects_zero_term_and_zero_exit() {
        let mut cli = sample_cli();
        cli.mortgage_years = 0;
        let err = build_inputs(cli).expect_err("must reject zero term");
        assert!(err.contains("--mortgage-years"));

        let mut cli = sample_cli();
        cli.exit_year = 0;
        let err = build_inputs(cli).expect_err("must reject zero exit year");
        assert!(err.contains("--exit-year"));
    }

    #[test]
    fn build_inputs_rejects_absurd_term_and_exit() {
        // The schedule math works in months as u32, so unbounded year counts
        // must never reach the engine.
        let mut cli = sample_cli();
        cli.mortgage_years = 400_000_000;
        let err = build_inputs(cli).expect_err("must reject oversized term");
        assert!(err.contains("--mortgage-years"));

        let mut cli = sample_cli();
        cli.mortgage_years = 101;
        let err = build_inputs(cli).expect_err("must reject term above cap");
        assert!(err.contains("--mortgage-years"));

        let mut cli = sample_cli();
        cli.exit_year = 400_000_000;
        let err = build_inputs(cli).expect_err("must reject oversized exit year");
        assert!(err.contains("--exit-year"));

        let inputs = inputs_from_json(r#"{"mortgageYears": 400000000}"#);
        assert!(inputs.expect_err("payload path must reject too").contains("--mortgage-years"));
    }

    #[test]
    fn inputs_from_json_parses_web_keys() {
        let json = r#"{
          "purchasePrice": 300000,
          "depositPct": 30,
          "buyerType": "company",
          "loanType": "interest-only",
          "firstTimeBuyer": true,
          "propertiesOwned": 2,
          "monthlyRent": 1650,
          "exitYear": 5,
          "incomePerson2": 28000,
          "ownershipShare1": 60,
          "ownershipShare2": 40,
          "reinvestIncome": true,
          "reinvestPct": 50
        }"#;
        let inputs = inputs_from_json(json).expect("json should parse");

        assert_approx(inputs.purchase_price, 300_000.0);
        assert_approx(inputs.deposit_pct, 0.30);
        assert_eq!(inputs.buyer_type, BuyerType::Company);
        assert_eq!(inputs.loan_type, LoanType::InterestOnly);
        assert!(inputs.first_time_buyer);
        assert_eq!(inputs.properties_owned, 2);
        assert_approx(inputs.monthly_rent, 1_650.0);
        assert_eq!(inputs.exit_year, 5);
        assert_approx(inputs.income_person_2, 28_000.0);
        assert_approx(inputs.ownership_share_1, 0.60);
        assert_approx(inputs.ownership_share_2, 0.40);
        assert!(inputs.reinvest_income);
        assert_approx(inputs.reinvest_pct, 0.50);
    }

    #[test]
    fn inputs_from_json_accepts_loan_type_aliases() {
        let inputs = inputs_from_json(r#"{"loanType": "interestOnly"}"#).expect("alias parses");
        assert_eq!(inputs.loan_type, LoanType::InterestOnly);
        let inputs = inputs_from_json(r#"{"loanType": "io"}"#).expect("alias parses");
        assert_eq!(inputs.loan_type, LoanType::InterestOnly);
    }

    #[test]
    fn analyze_response_serialization_contains_expected_fields() {
        let inputs = build_inputs(sample_cli()).expect("valid inputs");
        let summary = analyze_deal(&inputs);
        let json = serde_json::to_string(&summary).expect("summary should serialize");
        assert!(json.contains("\"stampDuty\""));
        assert!(json.contains("\"capRate\""));
        assert!(json.contains("\"cashOnCash\""));
        assert!(json.contains("\"npv\""));
        assert!(json.contains("\"score\""));
        assert!(json.contains("\"yearlyLedger\""));
        assert!(json.contains("\"netWealthAfterTax\""));
    }

    #[test]
    fn scenario_payload_defaults_fill_empty_blobs() {
        let payload: ScenarioPayload =
            serde_json::from_str(r#"{"name": "bare", "inputs": {"purchasePrice": 1}}"#)
                .expect("payload should parse");
        let new: NewScenario = payload.into();
        assert_eq!(new.name, "bare");
        assert_eq!(new.derived, json!({}));
        assert!(!new.show_derived);
        assert_eq!(new.columns, json!([]));
    }

    #[test]
    fn basic_auth_header_round_trips() {
        let auth = AuthConfig {
            user: "admin".to_string(),
            pass: "changeme".to_string(),
        };
        let encoded = BASE64_STANDARD.encode("admin:changeme");

        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            format!("Basic {encoded}").parse().expect("valid header"),
        );
        assert!(authorized(&headers, &auth));

        let wrong = BASE64_STANDARD.encode("admin:nope");
        headers.insert(
            header::AUTHORIZATION,
            format!("Basic {wrong}").parse().expect("valid header"),
        );
        assert!(!authorized(&headers, &auth));

        assert!(!authorized(&HeaderMap::new(), &auth));
    }

    #[test]
    fn credentials_reject_malformed_headers() {
        assert!(credentials_from_header("Bearer abc").is_none());
        assert!(credentials_from_header("Basic !!!not-base64!!!").is_none());
        let no_colon = BASE64_STANDARD.encode("adminchangeme");
        assert!(credentials_from_header(&format!("Basic {no_colon}")).is_none());
    }

    #[test]
    fn unauthorized_response_issues_basic_challenge() {
        let response = unauthorized_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let challenge = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .expect("challenge header")
            .to_str()
            .expect("ascii header");
        assert!(challenge.starts_with("Basic"));
    }

    #[test]
    fn store_errors_map_to_not_found() {
        let response = store_error_response(StoreError::NotFound("abc".to_string()));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
